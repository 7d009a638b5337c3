//! Array expansion and the structural checks every device file has to pass.

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result, bail, ensure};

use crate::cfg::{Access, BitRange, FieldConfig, PeripheralConfig, RegisterConfig};

/// The relation of a W1TS/W1TC register to the register it modifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shadow {
    /// Writing 1 sets the bit in the register at this address.
    Set(u32),
    /// Writing 1 clears the bit in the register at this address.
    Clear(u32),
}

/// A concrete field of a concrete register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Name without the peripheral prefix, e.g. `PIN3_INT_TYPE`.
    pub name: String,
    /// Full symbol, e.g. `GPIO_PIN3_INT_TYPE`.
    pub symbol: String,
    pub bits: BitRange,
    pub access: Access,
    pub reset: u32,
    pub description: String,
}

impl Field {
    /// `_S`
    pub fn shift(&self) -> u32 {
        self.bits.lo as u32
    }

    pub fn width(&self) -> u32 {
        self.bits.width() as u32
    }

    /// `_V`
    pub fn max(&self) -> u32 {
        field_max(&self.bits)
    }

    /// `_M`
    pub fn mask(&self) -> u32 {
        self.max() << self.shift()
    }
}

/// A concrete register. Array registers yield one of these per index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Register {
    pub peripheral: String,
    /// Name without the peripheral prefix, e.g. `PIN3`.
    pub name: String,
    /// Full symbol without the `_REG` suffix, e.g. `GPIO_PIN3`.
    pub symbol: String,
    /// The array template name, e.g. `PIN{n}`.
    pub array: Option<String>,
    pub index: Option<u32>,
    /// Offset from the peripheral base.
    pub offset: u32,
    pub address: u32,
    pub description: String,
    pub fields: Vec<Field>,
    /// Address of the write-1-to-set companion.
    pub w1ts: Option<u32>,
    /// Address of the write-1-to-clear companion.
    pub w1tc: Option<u32>,
    pub shadow_of: Option<Shadow>,
}

impl Register {
    /// The OR of the field resets placed at their shifts.
    pub fn reset(&self) -> u32 {
        self.fields
            .iter()
            .fold(0, |acc, f| acc | (f.reset << f.shift()))
    }

    /// Looks up a field by its full symbol.
    pub fn field(&self, symbol: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.symbol == symbol)
    }

    /// `<SYMBOL>_REG`
    pub fn reg_symbol(&self) -> String {
        format!("{}_REG", self.symbol)
    }
}

pub(crate) fn field_max(bits: &BitRange) -> u32 {
    match bits.width() {
        32 => u32::MAX,
        w => (1 << w) - 1,
    }
}

fn substitute(name: &str, index: Option<u32>) -> String {
    match index {
        Some(n) => name.replace("{n}", &n.to_string()),
        None => name.to_string(),
    }
}

fn expand_register(peripheral: &PeripheralConfig, reg: &RegisterConfig) -> Vec<Register> {
    reg.instances()
        .into_iter()
        .map(|index| {
            let name = substitute(&reg.name, index);
            let offset = reg.offset_of(index);

            let fields = reg
                .fields
                .iter()
                .map(|f: &FieldConfig| {
                    let name = substitute(&f.name, index);
                    Field {
                        symbol: format!("{}_{name}", peripheral.name),
                        name,
                        bits: f.bits,
                        access: f.access,
                        reset: f.reset_for(index),
                        description: substitute(&f.description, index),
                    }
                })
                .collect();

            Register {
                peripheral: peripheral.name.clone(),
                symbol: format!("{}_{name}", peripheral.name),
                name,
                array: reg.is_array().then(|| reg.name.clone()),
                index,
                offset,
                address: peripheral.base.wrapping_add(offset),
                description: reg.description.clone(),
                fields,
                w1ts: None,
                w1tc: None,
                shadow_of: None,
            }
        })
        .collect()
}

/// Expands every peripheral into concrete registers, sorted by address.
///
/// Companion links are resolved by name; links that don't resolve are left
/// empty, [`validate_peripheral`] reports them.
pub(crate) fn expand(peripherals: &[PeripheralConfig]) -> Vec<Register> {
    let mut all = Vec::new();

    for peripheral in peripherals {
        let mut registers = peripheral
            .registers
            .iter()
            .flat_map(|reg| expand_register(peripheral, reg))
            .collect::<Vec<_>>();

        let by_name = registers
            .iter()
            .enumerate()
            .map(|(i, r)| (r.name.clone(), i))
            .collect::<HashMap<_, _>>();

        for reg in peripheral.registers.iter().filter(|r| !r.is_array()) {
            let Some(&primary) = by_name.get(&reg.name) else {
                continue;
            };
            let primary_address = registers[primary].address;

            if let Some(&set) = reg.w1ts.as_ref().and_then(|name| by_name.get(name)) {
                registers[primary].w1ts = Some(registers[set].address);
                registers[set].shadow_of = Some(Shadow::Set(primary_address));
            }
            if let Some(&clear) = reg.w1tc.as_ref().and_then(|name| by_name.get(name)) {
                registers[primary].w1tc = Some(registers[clear].address);
                registers[clear].shadow_of = Some(Shadow::Clear(primary_address));
            }
        }

        all.extend(registers);
    }

    all.sort_by_key(|r| r.address);
    all
}

fn validate_fields(reg: &RegisterConfig) -> Result<()> {
    let mut names = HashSet::new();

    for (i, field) in reg.fields.iter().enumerate() {
        ensure!(
            names.insert(field.name.as_str()),
            "Duplicate field {}",
            field.name
        );

        let max = field_max(&field.bits);
        ensure!(
            field.reset <= max,
            "Reset value {:#x} of {} does not fit in {} bits",
            field.reset,
            field.name,
            field.bits.width()
        );
        for (index, reset) in &field.reset_overrides {
            ensure!(
                *reset <= max,
                "Reset override {reset:#x} for instance {index} of {} does not fit",
                field.name
            );
        }

        if reg.is_array() {
            ensure!(
                field.name.contains("{n}"),
                "Field {} of register array {} has no {{n}} placeholder",
                field.name,
                reg.name
            );
        }

        for other in &reg.fields[i + 1..] {
            ensure!(
                !field.bits.overlaps(&other.bits),
                "Fields {} ({}) and {} ({}) overlap",
                field.name,
                field.bits,
                other.name,
                other.bits
            );
        }
    }

    Ok(())
}

fn validate_companion(
    peripheral: &PeripheralConfig,
    primary: &RegisterConfig,
    companion: &str,
) -> Result<()> {
    let Some(companion) = peripheral.register(companion) else {
        bail!("Companion {companion} of {} does not exist", primary.name);
    };

    ensure!(
        !primary.is_array() && !companion.is_array(),
        "Register arrays can't have companions ({} / {})",
        primary.name,
        companion.name
    );

    for field in &primary.fields {
        let covered = companion
            .fields
            .iter()
            .any(|c| c.bits.lo <= field.bits.lo && c.bits.hi >= field.bits.hi);
        ensure!(
            covered,
            "Companion {} does not cover {} ({})",
            companion.name,
            field.name,
            field.bits
        );
    }

    Ok(())
}

/// Checks one peripheral: register shapes, field layout, offsets and
/// companions.
pub(crate) fn validate_peripheral(peripheral: &PeripheralConfig) -> Result<()> {
    ensure!(!peripheral.registers.is_empty(), "Peripheral has no registers");

    let mut offsets = HashMap::new();

    for reg in &peripheral.registers {
        reg.validate_shape()?;
        validate_fields(reg).with_context(|| format!("In register {}", reg.name))?;

        for index in reg.instances() {
            let offset = reg.offset_of(index);
            let name = substitute(&reg.name, index);

            ensure!(offset % 4 == 0, "Register {name} is not word-aligned");
            ensure!(
                peripheral.base.checked_add(offset).is_some(),
                "Register {name} lies outside the address space"
            );
            if let Some(previous) = offsets.insert(offset, name.clone()) {
                bail!("Registers {previous} and {name} share offset {offset:#x}");
            }
        }

        for companion in reg.w1ts.iter().chain(reg.w1tc.iter()) {
            validate_companion(peripheral, reg, companion)?;
        }
    }

    Ok(())
}

/// Every `_REG` symbol and every field symbol must be unique across the
/// device.
pub(crate) fn validate_symbols(registers: &[Register]) -> Result<()> {
    let mut symbols = HashSet::new();

    for reg in registers {
        let reg_symbol = reg.reg_symbol();
        ensure!(
            symbols.insert(reg_symbol.clone()),
            "Duplicate symbol {reg_symbol}"
        );

        for field in &reg.fields {
            ensure!(
                symbols.insert(field.symbol.clone()),
                "Duplicate symbol {}",
                field.symbol
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{Chip, Config};

    fn peripheral(source: &str) -> PeripheralConfig {
        #[derive(serde::Deserialize)]
        struct Wrapper {
            peripheral: PeripheralConfig,
        }

        basic_toml::from_str::<Wrapper>(source).unwrap().peripheral
    }

    #[test]
    fn array_instances_follow_the_stride() {
        let config = Config::for_chip(&Chip::Esp32p4);
        let pins = config
            .registers()
            .iter()
            .filter(|r| r.array.as_deref() == Some("PIN{n}"))
            .collect::<Vec<_>>();

        assert_eq!(pins.len(), 57);
        for pin in pins {
            let n = pin.index.unwrap();
            assert_eq!(pin.address, 0x500E_0000 + 0x74 + 4 * n);
            assert_eq!(pin.symbol, format!("GPIO_PIN{n}"));
        }
    }

    #[test]
    fn reset_overrides_apply_per_instance() {
        let config = Config::for_chip(&Chip::Esp32c5);

        let overridden = config.register("GPIO_FUNC9_IN_SEL_CFG").unwrap();
        assert_eq!(overridden.field("GPIO_FUNC9_IN_SEL").unwrap().reset, 0x38);

        let plain = config.register("GPIO_FUNC6_IN_SEL_CFG").unwrap();
        assert_eq!(plain.field("GPIO_FUNC6_IN_SEL").unwrap().reset, 0x3C);

        // Sparse: signal 1 has no register on this chip.
        assert!(config.register("GPIO_FUNC1_IN_SEL_CFG").is_none());
    }

    #[test]
    fn companions_are_linked_both_ways() {
        let config = Config::for_chip(&Chip::Esp32p4);

        let out1 = config.register("GPIO_OUT1").unwrap();
        let set = config.register("GPIO_OUT1_W1TS").unwrap();
        let clear = config.register("GPIO_OUT1_W1TC").unwrap();

        assert_eq!(out1.w1ts, Some(set.address));
        assert_eq!(out1.w1tc, Some(clear.address));
        assert_eq!(set.shadow_of, Some(Shadow::Set(out1.address)));
        assert_eq!(clear.shadow_of, Some(Shadow::Clear(out1.address)));
    }

    #[test]
    fn registers_are_sorted_and_unique() {
        for chip in [Chip::Esp32c5, Chip::Esp32p4] {
            let registers = Config::for_chip(&chip).registers();
            assert!(registers.windows(2).all(|w| w[0].address < w[1].address));
        }
    }

    #[test]
    fn overlapping_fields_are_rejected() {
        let p = peripheral(
            r#"
            [peripheral]
            name = "X"
            base = 0x1000

            [[peripheral.registers]]
            name   = "CTRL"
            offset = 0x0
            fields = [
                { name = "A", bits = "3:0", access = "R/W" },
                { name = "B", bits = "4:3", access = "R/W" },
            ]
            "#,
        );

        let err = validate_peripheral(&p).unwrap_err();
        assert!(format!("{err:#}").contains("overlap"));
    }

    #[test]
    fn duplicate_offsets_are_rejected() {
        let p = peripheral(
            r#"
            [peripheral]
            name = "X"
            base = 0x1000

            [[peripheral.registers]]
            name   = "A"
            offset = 0x8
            fields = [ { name = "A", bits = "0", access = "R/W" } ]

            [[peripheral.registers]]
            name   = "R{n}"
            offset = 0x0
            stride = 4
            count  = 4
            fields = [ { name = "R{n}_V", bits = "0", access = "R/W" } ]
            "#,
        );

        let err = validate_peripheral(&p).unwrap_err();
        assert!(format!("{err:#}").contains("share offset 0x8"));
    }

    #[test]
    fn wide_reset_is_rejected() {
        let p = peripheral(
            r#"
            [peripheral]
            name = "X"
            base = 0x1000

            [[peripheral.registers]]
            name   = "A"
            offset = 0x0
            fields = [ { name = "A", bits = "1:0", access = "R/W", reset = 4 } ]
            "#,
        );

        assert!(validate_peripheral(&p).is_err());
    }

    #[test]
    fn missing_companion_is_rejected() {
        let p = peripheral(
            r#"
            [peripheral]
            name = "X"
            base = 0x1000

            [[peripheral.registers]]
            name   = "OUT"
            offset = 0x0
            w1ts   = "OUT_W1TS"
            fields = [ { name = "OUT", bits = "7:0", access = "R/W" } ]
            "#,
        );

        let err = validate_peripheral(&p).unwrap_err();
        assert!(format!("{err:#}").contains("does not exist"));
    }

    #[test]
    fn narrow_companion_is_rejected() {
        let p = peripheral(
            r#"
            [peripheral]
            name = "X"
            base = 0x1000

            [[peripheral.registers]]
            name   = "OUT"
            offset = 0x0
            w1tc   = "OUT_W1TC"
            fields = [ { name = "OUT", bits = "7:0", access = "R/W" } ]

            [[peripheral.registers]]
            name   = "OUT_W1TC"
            offset = 0x4
            fields = [ { name = "OUT_W1TC", bits = "3:0", access = "WT" } ]
            "#,
        );

        let err = validate_peripheral(&p).unwrap_err();
        assert!(format!("{err:#}").contains("does not cover"));
    }

    #[test]
    fn sparse_indices_must_increase() {
        let p = peripheral(
            r#"
            [peripheral]
            name = "X"
            base = 0x1000

            [[peripheral.registers]]
            name    = "R{n}"
            offset  = 0x0
            stride  = 4
            indices = [0, 3, 2]
            fields  = [ { name = "R{n}_V", bits = "0", access = "R/W" } ]
            "#,
        );

        assert!(validate_peripheral(&p).is_err());
    }

    #[test]
    fn empty_peripheral_is_rejected() {
        let p = peripheral(
            r#"
            [peripheral]
            name      = "X"
            base      = 0x1000
            registers = []
            "#,
        );

        let err = validate_peripheral(&p).unwrap_err();
        assert!(format!("{err:#}").contains("has no registers"));
    }

    #[test]
    fn array_without_placeholder_is_rejected() {
        let p = peripheral(
            r#"
            [peripheral]
            name = "X"
            base = 0x1000

            [[peripheral.registers]]
            name   = "R"
            offset = 0x0
            stride = 4
            count  = 4
            fields = [ { name = "R{n}_V", bits = "0", access = "R/W" } ]
            "#,
        );

        let err = validate_peripheral(&p).unwrap_err();
        assert!(format!("{err:#}").contains("must contain exactly one {n}"));

        let p = peripheral(
            r#"
            [peripheral]
            name = "X"
            base = 0x1000

            [[peripheral.registers]]
            name   = "R{n}"
            offset = 0x0
            stride = 4
            count  = 4
            fields = [ { name = "V", bits = "0", access = "R/W" } ]
            "#,
        );

        let err = validate_peripheral(&p).unwrap_err();
        assert!(format!("{err:#}").contains("has no {n} placeholder"));
    }

    #[test]
    fn override_of_missing_instance_is_rejected() {
        let p = peripheral(
            r#"
            [peripheral]
            name = "X"
            base = 0x1000

            [[peripheral.registers]]
            name    = "R{n}"
            offset  = 0x0
            stride  = 4
            indices = [0, 2, 4]
            fields  = [
                { name = "R{n}_V", bits = "0", access = "R/W", reset_overrides = [[3, 1]] },
            ]
            "#,
        );

        let err = validate_peripheral(&p).unwrap_err();
        assert!(format!("{err:#}").contains("missing instance 3"));
    }

    #[test]
    fn duplicate_symbols_are_rejected() {
        let p = peripheral(
            r#"
            [peripheral]
            name = "X"
            base = 0x1000

            [[peripheral.registers]]
            name   = "R{n}"
            offset = 0x0
            stride = 4
            count  = 2
            fields = [ { name = "R{n}_V", bits = "0", access = "R/W" } ]

            [[peripheral.registers]]
            name   = "R1"
            offset = 0x10
            fields = [ { name = "W", bits = "0", access = "R/W" } ]
            "#,
        );

        // Each register is fine on its own.
        validate_peripheral(&p).unwrap();

        let err = validate_symbols(&expand(&[p])).unwrap_err();
        assert_eq!(err.to_string(), "Duplicate symbol X_R1_REG");
    }

    #[test]
    fn bit_ranges_parse() {
        assert_eq!(
            BitRange::try_from("7:3".to_string()).unwrap(),
            BitRange { hi: 7, lo: 3 }
        );
        assert_eq!(
            BitRange::try_from("31".to_string()).unwrap(),
            BitRange { hi: 31, lo: 31 }
        );
        assert!(BitRange::try_from("3:7".to_string()).is_err());
        assert!(BitRange::try_from("32".to_string()).is_err());
    }
}
