use std::path::Path;

use anyhow::{Result, bail};
use clap::Args;
use esp_regmap_metadata::{Chip, generate_peripheral_overview};
use strum::IntoEnumIterator;

// ----------------------------------------------------------------------------
// Subcommand Arguments

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Chip(s) whose device file to check.
    #[arg(value_enum, default_values_t = Chip::iter())]
    pub chips: Vec<Chip>,
    /// Also print the register count of each peripheral on each chip.
    #[arg(long)]
    pub overview: bool,
}

// ----------------------------------------------------------------------------
// Subcommand Actions

pub fn check(workspace: &Path, args: CheckArgs) -> Result<()> {
    let mut failed = Vec::new();

    for chip in args.chips {
        let config = match crate::load_device(workspace, chip) {
            Ok(config) => config,
            Err(error) => {
                log::error!("{}: {error:#}", chip.pretty_name());
                failed.push(chip);
                continue;
            }
        };

        let registers = config.registers();
        let fields = registers.iter().map(|r| r.fields.len()).sum::<usize>();

        log::info!(
            "{}: {} peripherals, {} registers, {} fields",
            chip.pretty_name(),
            config.peripherals().len(),
            registers.len(),
            fields
        );
        for (name, value) in config.properties() {
            log::info!("  {name} = {value}");
        }
    }

    if args.overview {
        let mut table = String::new();
        generate_peripheral_overview(&mut table)?;
        println!("{table}");
    }

    if !failed.is_empty() {
        bail!("Invalid device files for: {failed:?}");
    }

    Ok(())
}
