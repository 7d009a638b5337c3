use std::{fmt::Write as _, path::Path};

use anyhow::{Result, bail};
use clap::Args;
use esp_regmap_metadata::{Chip, Config, Shadow};

// ----------------------------------------------------------------------------
// Subcommand Arguments

#[derive(Debug, Args)]
pub struct DumpArgs {
    /// Chip to dump.
    #[arg(value_enum)]
    pub chip: Chip,
    /// Only dump this peripheral.
    #[arg(long)]
    pub peripheral: Option<String>,
}

// ----------------------------------------------------------------------------
// Subcommand Actions

pub fn dump(workspace: &Path, args: DumpArgs) -> Result<()> {
    let config = crate::load_device(workspace, args.chip)?;

    if let Some(peripheral) = &args.peripheral {
        if config.peripheral(peripheral).is_none() {
            bail!("{} has no peripheral named '{peripheral}'", args.chip);
        }
    }

    print!("{}", render(&config, args.peripheral.as_deref())?);

    Ok(())
}

/// One line per register with its fields indented below, in address order.
pub(crate) fn render(config: &Config, peripheral: Option<&str>) -> Result<String> {
    let mut out = String::new();

    let registers = config
        .registers()
        .iter()
        .filter(|r| peripheral.is_none_or(|p| r.peripheral.eq_ignore_ascii_case(p)));

    for reg in registers {
        write!(
            out,
            "{:#010x}  {:<32} reset={:#010x}",
            reg.address,
            reg.reg_symbol(),
            reg.reset()
        )?;
        match reg.shadow_of {
            Some(Shadow::Set(primary)) => write!(out, "  (sets {primary:#010x})")?,
            Some(Shadow::Clear(primary)) => write!(out, "  (clears {primary:#010x})")?,
            None => {}
        }
        writeln!(out)?;

        for field in &reg.fields {
            writeln!(
                out,
                "    [{:>5}] {:<40} {:<10} reset={}",
                field.bits.to_string(),
                field.symbol,
                field.access.to_string(),
                field.reset
            )?;
        }
    }

    Ok(out)
}
