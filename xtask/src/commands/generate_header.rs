use std::{fs, path::Path};

use anyhow::{Context, Result};
use clap::Args;
use esp_regmap_metadata::Chip;

// ----------------------------------------------------------------------------
// Subcommand Arguments

#[derive(Debug, Args)]
pub struct GenerateHeaderArgs {
    /// Chip to generate headers for.
    #[arg(value_enum)]
    pub chip: Chip,
    /// Only generate the header of this peripheral.
    #[arg(long)]
    pub peripheral: Option<String>,
    /// Output directory. Defaults to `target/headers/<chip>` in the workspace.
    #[arg(long)]
    pub out: Option<std::path::PathBuf>,
}

// ----------------------------------------------------------------------------
// Subcommand Actions

/// Writes one `<peripheral>_reg.h` per peripheral.
pub fn generate_header(workspace: &Path, args: GenerateHeaderArgs) -> Result<()> {
    let config = crate::load_device(workspace, args.chip)?;

    let out_dir = match args.out {
        Some(out) => out,
        None => workspace
            .join("target")
            .join("headers")
            .join(args.chip.to_string()),
    };
    let out_dir = crate::windows_safe_path(&out_dir);
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let peripherals = match &args.peripheral {
        Some(peripheral) => vec![peripheral.clone()],
        None => config.peripherals().iter().map(|p| p.name.clone()).collect(),
    };

    for peripheral in peripherals {
        let header = config.generate_c_header(&peripheral)?;
        let path = out_dir.join(format!("{}_reg.h", peripheral.to_lowercase()));

        fs::write(&path, header).with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("Wrote {}", path.display());
    }

    Ok(())
}
