use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use xtask::commands::*;

// ----------------------------------------------------------------------------
// Command-line Interface

#[derive(Debug, Parser)]
enum Cli {
    /// Load and validate the device files of the specified chips.
    Check(CheckArgs),
    /// Print every register of a chip with its address, reset value and
    /// fields.
    Dump(DumpArgs),
    /// Write vendor-style `<peripheral>_reg.h` headers for a chip.
    GenerateHeader(GenerateHeaderArgs),
    /// Convert a vendor `<peripheral>_reg.h` header into a device file.
    ImportHeader(ImportHeaderArgs),
}

// ----------------------------------------------------------------------------
// Application

fn main() -> Result<()> {
    env_logger::Builder::new()
        .filter_module("xtask", log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let workspace = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let workspace = workspace
        .parent()
        .context("xtask is not inside a workspace")?
        .canonicalize()?;

    match Cli::parse() {
        Cli::Check(args) => check(&workspace, args),
        Cli::Dump(args) => dump(&workspace, args),
        Cli::GenerateHeader(args) => generate_header(&workspace, args),
        Cli::ImportHeader(args) => import_header(args),
    }
}
