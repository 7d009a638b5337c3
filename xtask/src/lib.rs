use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use esp_regmap_metadata::{Chip, Config};

pub mod commands;

/// Path of a chip's device file inside the workspace.
pub fn device_file(workspace: &Path, chip: Chip) -> PathBuf {
    workspace
        .join("esp-regmap-metadata")
        .join("devices")
        .join(format!("{chip}.toml"))
}

/// Loads and validates a chip's device file from disk, so that errors are
/// reported instead of panicking like the embedded copy.
pub fn load_device(workspace: &Path, chip: Chip) -> Result<Config> {
    let path = device_file(workspace, chip);
    let source = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    Config::from_toml(&source).with_context(|| format!("Invalid device file {}", path.display()))
}

/// Make the path "Windows"-safe
pub fn windows_safe_path(path: &Path) -> PathBuf {
    PathBuf::from(path.to_str().unwrap_or_default().to_string().replace("\\\\?\\", ""))
}
