pub(crate) mod gpio;
pub(crate) mod tee;

use core::fmt;

use anyhow::{Context, bail, ensure};

pub use gpio::GpioProperties;
pub use tee::TeeProperties;

/// Represents a value in the device properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Unset,
    /// A numeric value. The generated constant will not include a type suffix
    /// (i.e. will not be generated as `0u32`).
    Number(u32),
    /// A boolean value.
    Boolean(bool),
}

impl From<Option<u32>> for Value {
    fn from(value: Option<u32>) -> Self {
        match value {
            Some(v) => Value::Number(v),
            None => Value::Unset,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unset => Ok(()),
            Value::Number(n) => write!(f, "{n}"),
            Value::Boolean(b) => write!(f, "{b}"),
        }
    }
}

/// Field access modes, as tagged in the vendor register descriptions.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    serde::Deserialize,
    serde::Serialize,
    strum::Display,
    strum::EnumIter,
    strum::EnumString,
    strum::AsRefStr,
)]
pub enum Access {
    /// Read-only.
    #[serde(rename = "RO")]
    #[strum(serialize = "RO")]
    ReadOnly,
    /// Read/write.
    #[serde(rename = "R/W")]
    #[strum(serialize = "R/W")]
    ReadWrite,
    /// Write-only, typically a one-shot trigger. Reads back as 0.
    #[serde(rename = "WT")]
    #[strum(serialize = "WT")]
    WriteOnly,
    /// Read/write, cleared by hardware once the requested action completes.
    #[serde(rename = "R/W/SC")]
    #[strum(serialize = "R/W/SC")]
    ReadWriteSelfClear,
    /// Read/write, also cleared through a write-1-to-clear companion.
    #[serde(rename = "R/W/WTC")]
    #[strum(serialize = "R/W/WTC")]
    ReadWriteW1tc,
    /// Combination of [`Access::ReadWriteSelfClear`] and
    /// [`Access::ReadWriteW1tc`].
    #[serde(rename = "R/W/SC/WTC")]
    #[strum(serialize = "R/W/SC/WTC")]
    ReadWriteSelfClearW1tc,
    /// Set by hardware, cleared by writing 1.
    #[serde(rename = "R/WTC/SS")]
    #[strum(serialize = "R/WTC/SS")]
    ReadW1cSelfSet,
    /// Hardware read-only. Reserved on this chip, kept for other revisions.
    #[serde(rename = "HRO")]
    #[strum(serialize = "HRO")]
    HardwareReadOnly,
}

impl Access {
    /// Whether software writes have any effect on the field.
    pub fn is_writable(self) -> bool {
        !matches!(self, Access::ReadOnly | Access::HardwareReadOnly)
    }

    /// Whether reading the field reflects state.
    pub fn is_readable(self) -> bool {
        !matches!(self, Access::WriteOnly)
    }

    /// Whether the field may be part of a read-modify-write sequence.
    pub fn allows_read_modify_write(self) -> bool {
        self.is_writable() && self.is_readable()
    }
}

/// An inclusive bit range, written as `"hi:lo"` or `"bit"` in the device
/// files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct BitRange {
    pub hi: u8,
    pub lo: u8,
}

impl BitRange {
    pub fn width(&self) -> u8 {
        self.hi - self.lo + 1
    }

    pub fn overlaps(&self, other: &BitRange) -> bool {
        self.lo <= other.hi && other.lo <= self.hi
    }
}

impl TryFrom<String> for BitRange {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let parse = |s: &str| {
            s.trim()
                .parse::<u8>()
                .with_context(|| format!("Invalid bit position '{s}' in '{value}'"))
        };

        let (hi, lo) = match value.split_once(':') {
            Some((hi, lo)) => (parse(hi)?, parse(lo)?),
            None => {
                let bit = parse(&value)?;
                (bit, bit)
            }
        };

        ensure!(hi >= lo, "Bit range '{value}' is reversed");
        ensure!(hi < 32, "Bit range '{value}' exceeds a 32-bit register");

        Ok(Self { hi, lo })
    }
}

impl From<BitRange> for String {
    fn from(value: BitRange) -> Self {
        value.to_string()
    }
}

impl fmt::Display for BitRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hi == self.lo {
            write!(f, "{}", self.lo)
        } else {
            write!(f, "{}:{}", self.hi, self.lo)
        }
    }
}

/// A bitfield as written in the device file. The name may contain the `{n}`
/// placeholder when the owning register is an array.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct FieldConfig {
    pub name: String,
    pub bits: BitRange,
    pub access: Access,
    #[serde(default)]
    pub reset: u32,
    /// `(index, reset)` pairs for array instances that deviate from `reset`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reset_overrides: Vec<(u32, u32)>,
    #[serde(default)]
    pub description: String,
}

impl FieldConfig {
    pub(crate) fn reset_for(&self, index: Option<u32>) -> u32 {
        index
            .and_then(|n| {
                self.reset_overrides
                    .iter()
                    .find(|(i, _)| *i == n)
                    .map(|(_, reset)| *reset)
            })
            .unwrap_or(self.reset)
    }
}

/// A register, or a register array when `stride` is present.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct RegisterConfig {
    pub name: String,
    pub offset: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stride: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indices: Option<Vec<u32>>,
    /// Name of the write-1-to-set companion register.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w1ts: Option<String>,
    /// Name of the write-1-to-clear companion register.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w1tc: Option<String>,
    #[serde(default)]
    pub description: String,
    pub fields: Vec<FieldConfig>,
}

impl RegisterConfig {
    pub fn is_array(&self) -> bool {
        self.stride.is_some()
    }

    /// The instance indices of this register. Plain registers have a single
    /// `None` instance.
    pub fn instances(&self) -> Vec<Option<u32>> {
        match (self.stride, &self.indices, self.count) {
            (None, _, _) => vec![None],
            (Some(_), Some(indices), _) => indices.iter().copied().map(Some).collect(),
            (Some(_), None, Some(count)) => (0..count).map(Some).collect(),
            (Some(_), None, None) => Vec::new(),
        }
    }

    /// Offset of instance `index`, relative to the peripheral base.
    pub fn offset_of(&self, index: Option<u32>) -> u32 {
        match (self.stride, index) {
            (Some(stride), Some(n)) => self.offset + stride * n,
            _ => self.offset,
        }
    }

    /// The array name with the placeholder removed, e.g. `FUNC_IN_SEL_CFG`
    /// for `FUNC{n}_IN_SEL_CFG`.
    pub fn array_name(&self) -> String {
        self.name.replace("{n}", "").replace("__", "_")
    }

    /// The name of a template field relative to this array, e.g. `IN_SEL`
    /// for `FUNC{n}_IN_SEL` in `FUNC{n}_IN_SEL_CFG`.
    pub fn template_field_name(&self, field: &str) -> String {
        let prefix = match self.name.find("{n}") {
            Some(pos) => format!("{}{{n}}_", &self.name[..pos]),
            None => String::new(),
        };

        match field.strip_prefix(prefix.as_str()) {
            Some(short) if !prefix.is_empty() => short.to_string(),
            _ => field.replace("{n}", "").replace("__", "_"),
        }
    }

    pub(crate) fn validate_shape(&self) -> anyhow::Result<()> {
        ensure!(!self.fields.is_empty(), "Register {} has no fields", self.name);

        if !self.is_array() {
            ensure!(
                !self.name.contains("{n}"),
                "Register {} uses a placeholder but has no stride",
                self.name
            );
            ensure!(
                self.count.is_none() && self.indices.is_none(),
                "Register {} has a count or indices but no stride",
                self.name
            );
            for field in &self.fields {
                ensure!(
                    field.reset_overrides.is_empty(),
                    "Field {} overrides resets of a plain register",
                    field.name
                );
            }
            return Ok(());
        }

        ensure!(
            self.name.matches("{n}").count() == 1,
            "Register array {} must contain exactly one {{n}}",
            self.name
        );
        ensure!(
            self.stride.unwrap_or(0) >= 4 && self.stride.unwrap_or(0) % 4 == 0,
            "Register array {} must have a word-aligned stride",
            self.name
        );

        match (&self.indices, self.count) {
            (Some(_), Some(_)) => bail!("Register array {} has both count and indices", self.name),
            (None, None) => bail!("Register array {} has neither count nor indices", self.name),
            (Some(indices), None) => {
                ensure!(!indices.is_empty(), "Register array {} is empty", self.name);
                ensure!(
                    indices.windows(2).all(|w| w[0] < w[1]),
                    "Indices of register array {} must be strictly increasing",
                    self.name
                );
            }
            (None, Some(count)) => {
                ensure!(count > 0, "Register array {} is empty", self.name)
            }
        }

        let instances = self.instances();
        for field in &self.fields {
            for (index, _) in &field.reset_overrides {
                ensure!(
                    instances.contains(&Some(*index)),
                    "Field {} overrides the reset of missing instance {index}",
                    field.name
                );
            }
        }

        Ok(())
    }
}

/// A peripheral instance with its base address and registers.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct PeripheralConfig {
    pub name: String,
    pub base: u32,
    #[serde(default)]
    pub description: String,
    pub registers: Vec<RegisterConfig>,
}

impl PeripheralConfig {
    pub fn register(&self, name: &str) -> Option<&RegisterConfig> {
        self.registers.iter().find(|r| r.name == name)
    }

    /// `DR_REG_<NAME>_BASE`
    pub fn base_symbol(&self) -> String {
        format!("DR_REG_{}_BASE", self.name)
    }
}
