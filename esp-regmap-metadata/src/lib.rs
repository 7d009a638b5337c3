//! Register maps for Espressif devices, primarily intended for use in build
//! scripts.
mod cfg;
mod generate;
mod header;
mod regmap;

use core::str::FromStr;
use std::{fmt::Write, path::Path, sync::OnceLock};

use anyhow::{Context, Result};
use proc_macro2::TokenStream;
use strum::IntoEnumIterator;

pub use crate::{
    cfg::{
        Access,
        BitRange,
        FieldConfig,
        GpioProperties,
        PeripheralConfig,
        RegisterConfig,
        TeeProperties,
        Value,
    },
    regmap::{Field, Register, Shadow},
};

macro_rules! include_toml {
    (Config, $file:expr) => {{
        static LOADED_TOML: OnceLock<Config> = OnceLock::new();
        LOADED_TOML.get_or_init(|| {
            let config: Config = basic_toml::from_str(include_str!($file)).unwrap();

            config.validate().expect("Invalid device configuration");

            config
        })
    }};
}

/// Supported devices.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Deserialize,
    serde::Serialize,
    strum::Display,
    strum::EnumIter,
    strum::EnumString,
    strum::AsRefStr,
)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Chip {
    /// ESP32-C5
    Esp32c5,
    /// ESP32-P4
    Esp32p4,
}

impl Chip {
    pub fn pretty_name(&self) -> &str {
        match self {
            Chip::Esp32c5 => "ESP32-C5",
            Chip::Esp32p4 => "ESP32-P4",
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
struct Device {
    name: String,
    trm: String,

    #[serde(default)]
    gpio: Option<GpioProperties>,
    #[serde(default)]
    tee: Option<TeeProperties>,

    peripherals: Vec<PeripheralConfig>,
}

// Output a Display-able value as a TokenStream, intended to generate numbers
// without the type suffix.
fn number(n: impl std::fmt::Display) -> TokenStream {
    TokenStream::from_str(&format!("{n}")).unwrap()
}

// Same as `number`, in hexadecimal.
fn hex(n: u32) -> TokenStream {
    TokenStream::from_str(&format!("{n:#x}")).unwrap()
}

/// Device configuration file format.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct Config {
    device: Device,
    #[serde(skip)]
    registers: OnceLock<Vec<Register>>,
}

impl Config {
    /// The configuration for the specified chip.
    pub fn for_chip(chip: &Chip) -> &'static Self {
        match chip {
            Chip::Esp32c5 => include_toml!(Config, "../devices/esp32c5.toml"),
            Chip::Esp32p4 => include_toml!(Config, "../devices/esp32p4.toml"),
        }
    }

    /// Loads and validates a device file that is not embedded in this crate.
    pub fn from_toml(source: &str) -> Result<Self> {
        let config: Config =
            basic_toml::from_str(source).context("Failed to parse device configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Checks the register map and the peripheral properties against each
    /// other.
    pub fn validate(&self) -> Result<()> {
        for peripheral in &self.device.peripherals {
            regmap::validate_peripheral(peripheral)
                .with_context(|| format!("In peripheral {}", peripheral.name))?;
        }
        regmap::validate_symbols(self.registers())?;

        if let Some(gpio) = &self.device.gpio {
            gpio.validate(self).context("In [device.gpio]")?;
        }
        if let Some(tee) = &self.device.tee {
            tee.validate(self).context("In [device.tee]")?;
        }

        Ok(())
    }

    /// The name of the device.
    pub fn name(&self) -> String {
        self.device.name.clone()
    }

    /// A link to the Technical Reference Manual (TRM) for the device.
    pub fn trm(&self) -> &str {
        &self.device.trm
    }

    /// The peripherals of the device, in file order.
    pub fn peripherals(&self) -> &[PeripheralConfig] {
        &self.device.peripherals
    }

    pub fn peripheral(&self, name: &str) -> Option<&PeripheralConfig> {
        self.device
            .peripherals
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// GPIO matrix properties, if the device has any.
    pub fn gpio(&self) -> Option<&GpioProperties> {
        self.device.gpio.as_ref()
    }

    /// TEE controller properties, if the device has any.
    pub fn tee(&self) -> Option<&TeeProperties> {
        self.device.tee.as_ref()
    }

    /// Every concrete register of the device, sorted by address. Arrays are
    /// expanded per index.
    pub fn registers(&self) -> &[Register] {
        self.registers
            .get_or_init(|| regmap::expand(&self.device.peripherals))
    }

    /// Looks up a register by its full symbol, e.g. `GPIO_PIN3`.
    pub fn register(&self, symbol: &str) -> Option<&Register> {
        self.registers().iter().find(|r| r.symbol == symbol)
    }

    /// Named properties of the device, as shown in the overview table.
    pub fn properties(&self) -> impl Iterator<Item = (&'static str, Value)> + '_ {
        self.device
            .gpio
            .iter()
            .flat_map(|gpio| gpio.properties())
            .chain(
                self.device
                    .tee
                    .iter()
                    .map(|tee| ("tee.controllers", Value::Number(tee.controllers.len() as u32))),
            )
    }

    /// Writes `_generated_<chip>.rs` into `OUT_DIR`.
    pub fn generate_metadata(&self) -> Result<()> {
        let out_dir = std::env::var_os("OUT_DIR").context("OUT_DIR is not set")?;
        let out_dir = Path::new(&out_dir);

        let out_file = out_dir.join(format!("_generated_{}.rs", self.device.name));
        let tokens = generate::generate(self)?;

        std::fs::write(&out_file, tokens.to_string())
            .with_context(|| format!("Failed to write {}", out_file.display()))?;

        Ok(())
    }

    /// Renders the vendor-style C header for one peripheral.
    pub fn generate_c_header(&self, peripheral: &str) -> Result<String> {
        let Some(peripheral) = self.peripheral(peripheral) else {
            anyhow::bail!(
                "{} has no peripheral named '{peripheral}'",
                self.device.name
            );
        };

        header::render(self, peripheral).context("Failed to render header")
    }
}

/// Writes a markdown table of the register count of each peripheral on each
/// chip.
pub fn generate_peripheral_overview(output: &mut impl Write) -> std::fmt::Result {
    let nothing = "";

    let mut peripherals = Chip::iter()
        .flat_map(|chip| Config::for_chip(&chip).peripherals().iter())
        .map(|p| p.name.as_str())
        .collect::<Vec<_>>();
    peripherals.sort_unstable();
    peripherals.dedup();

    // Calculate the width of the first column.
    let peri_col_width = std::iter::once("Peripheral")
        .chain(peripherals.iter().copied())
        .map(|c| c.len())
        .max()
        .unwrap_or(0);

    // Header
    write!(output, "| {:peri_col_width$} |", "Peripheral")?;
    for chip in Chip::iter() {
        write!(output, " {} |", chip.pretty_name())?;
    }
    writeln!(output)?;

    // Header separator
    write!(output, "| {nothing:-<peri_col_width$} |")?;
    for chip in Chip::iter() {
        write!(
            output,
            ":{nothing:-<width$}:|",
            width = chip.pretty_name().len()
        )?;
    }
    writeln!(output)?;

    for name in peripherals {
        write!(output, "| {name:peri_col_width$} |")?;
        for chip in Chip::iter() {
            let config = Config::for_chip(&chip);
            let count = config
                .registers()
                .iter()
                .filter(|r| r.peripheral == name)
                .count();

            let cell = if count == 0 {
                String::new()
            } else {
                count.to_string()
            };
            let width = chip.pretty_name().len();
            write!(output, " {cell:>width$} |")?;
        }
        writeln!(output)?;
    }

    writeln!(output)?;

    // Print legend
    writeln!(output, " * Empty cell: not available")?;
    writeln!(output, " * Number: registers after array expansion")?;

    Ok(())
}
