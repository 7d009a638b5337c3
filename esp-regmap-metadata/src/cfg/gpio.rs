//! This module contains configuration used in [device.gpio], as well as
//! functions that generate code for esp-regmap.

use anyhow::{Context, Result, bail, ensure};
use proc_macro2::TokenStream;
use quote::quote;

use crate::{
    Config,
    cfg::{FieldConfig, PeripheralConfig, RegisterConfig, Value},
    generate::{array_module, reg_const, template_const},
    hex,
    number,
    regmap::field_max,
};

const PIN_ARRAY: &str = "PIN{n}";
const FUNC_IN_ARRAY: &str = "FUNC{n}_IN_SEL_CFG";
const FUNC_OUT_ARRAY: &str = "FUNC{n}_OUT_SEL_CFG";

/// Bank registers, primary names. Bank 1 appends `1` to each.
const BANK_REGISTERS: [&str; 4] = ["OUT", "ENABLE", "IN", "STATUS"];

/// Properties of the GPIO matrix, used in [device.gpio].
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct GpioProperties {
    /// The peripheral holding the GPIO registers.
    pub peripheral: String,

    /// The number of GPIO pins.
    pub pin_count: u32,

    /// Whether GPIO32 and up live in a second set of bank registers.
    #[serde(default)]
    pub has_bank_1: bool,

    /// The `IN_SEL` value that ties an input signal low.
    pub constant_0_input: u32,

    /// The `IN_SEL` value that ties an input signal high.
    pub constant_1_input: u32,

    /// The highest peripheral input signal index.
    pub input_signal_max: u32,

    /// The `OUT_SEL` value that routes `GPIO_OUT_REG` to the pin.
    pub output_signal_max: u32,
}

fn template<'a>(peripheral: &'a PeripheralConfig, name: &str) -> Result<&'a RegisterConfig> {
    peripheral
        .register(name)
        .with_context(|| format!("{} has no register array {name}", peripheral.name))
}

fn template_field<'a>(reg: &'a RegisterConfig, name: &str) -> Result<&'a FieldConfig> {
    reg.fields
        .iter()
        .find(|f| reg.template_field_name(&f.name) == name)
        .with_context(|| format!("{} has no field {name}", reg.name))
}

impl GpioProperties {
    pub(crate) fn properties(&self) -> impl Iterator<Item = (&'static str, Value)> {
        [
            ("gpio.pin_count", Value::Number(self.pin_count)),
            ("gpio.has_bank_1", Value::Boolean(self.has_bank_1)),
            ("gpio.constant_0_input", Value::Number(self.constant_0_input)),
            ("gpio.constant_1_input", Value::Number(self.constant_1_input)),
            ("gpio.input_signal_max", Value::Number(self.input_signal_max)),
            ("gpio.output_signal_max", Value::Number(self.output_signal_max)),
        ]
        .into_iter()
    }

    /// The bank register names, `[OUT, ENABLE, IN, STATUS]` per bank.
    pub fn bank_registers(&self) -> Vec<[String; 4]> {
        let mut banks = vec![BANK_REGISTERS.map(String::from)];
        if self.has_bank_1 {
            banks.push(BANK_REGISTERS.map(|r| format!("{r}1")));
        }
        banks
    }

    pub(crate) fn validate(&self, config: &Config) -> Result<()> {
        let Some(peripheral) = config.peripheral(&self.peripheral) else {
            bail!("Peripheral {} does not exist", self.peripheral);
        };

        let bank_bits = if self.has_bank_1 { 64 } else { 32 };
        ensure!(
            self.pin_count > 0 && self.pin_count <= bank_bits,
            "{} pins don't fit in the bank registers",
            self.pin_count
        );

        let pins = template(peripheral, PIN_ARRAY)?;
        ensure!(
            pins.instances().len() == self.pin_count as usize,
            "pin_count is {} but {PIN_ARRAY} has {} instances",
            self.pin_count,
            pins.instances().len()
        );
        for name in ["INT_TYPE", "PAD_DRIVER", "WAKEUP_ENABLE", "INT_ENA"] {
            template_field(pins, name)?;
        }

        let func_in = template(peripheral, FUNC_IN_ARRAY)?;
        let in_sel = template_field(func_in, "IN_SEL")?;
        template_field(func_in, "IN_INV_SEL")?;
        template_field(func_in, "SIG_IN_SEL")?;

        let in_sel_max = field_max(&in_sel.bits);
        for constant in [self.constant_0_input, self.constant_1_input] {
            ensure!(
                constant <= in_sel_max,
                "Constant selector {constant:#x} does not fit in IN_SEL"
            );
            ensure!(
                constant >= self.pin_count,
                "Constant selector {constant:#x} collides with a pin index"
            );
        }
        ensure!(
            self.constant_0_input != self.constant_1_input,
            "The constant selectors must differ"
        );

        let last_signal = func_in
            .instances()
            .last()
            .copied()
            .flatten()
            .unwrap_or(0);
        ensure!(
            last_signal <= self.input_signal_max,
            "Input signal {last_signal} exceeds input_signal_max"
        );

        let func_out = template(peripheral, FUNC_OUT_ARRAY)?;
        ensure!(
            func_out.instances().len() == self.pin_count as usize,
            "{FUNC_OUT_ARRAY} must have one instance per pin"
        );
        let out_sel = template_field(func_out, "OUT_SEL")?;
        ensure!(
            self.output_signal_max <= field_max(&out_sel.bits),
            "output_signal_max does not fit in OUT_SEL"
        );
        for name in ["OUT_INV_SEL", "OEN_SEL", "OEN_INV_SEL"] {
            template_field(func_out, name)?;
        }

        for bank in self.bank_registers() {
            for (i, name) in bank.iter().enumerate() {
                let Some(reg) = peripheral.register(name) else {
                    bail!("Bank register {name} does not exist");
                };
                // IN has no companions.
                if i != 2 {
                    ensure!(
                        reg.w1ts.is_some() && reg.w1tc.is_some(),
                        "Bank register {name} needs W1TS and W1TC companions"
                    );
                }
            }
        }

        Ok(())
    }

    /// Generates the GPIO constants and the `GPIO_LAYOUT` static.
    pub(crate) fn generate(&self, config: &Config) -> Result<TokenStream> {
        let Some(peripheral) = config.peripheral(&self.peripheral) else {
            bail!("Peripheral {} does not exist", self.peripheral);
        };
        let p = &peripheral.name;

        let pin_count = number(self.pin_count);
        let has_bank_1 = self.has_bank_1;
        let constant_0 = hex(self.constant_0_input);
        let constant_1 = hex(self.constant_1_input);
        let input_signal_max = number(self.input_signal_max);
        let output_signal_max = number(self.output_signal_max);

        let banks = self
            .bank_registers()
            .into_iter()
            .map(|[out, enable, input, status]| -> Result<TokenStream> {
                let companions = |name: &str| -> Result<(TokenStream, TokenStream, TokenStream)> {
                    let reg = template(peripheral, name)?;
                    let (Some(set), Some(clear)) = (&reg.w1ts, &reg.w1tc) else {
                        bail!("Bank register {name} needs W1TS and W1TC companions");
                    };
                    let primary = reg_const(p, name);
                    let set = reg_const(p, set);
                    let clear = reg_const(p, clear);
                    Ok((quote! { #primary }, quote! { #set }, quote! { #clear }))
                };

                let (out, out_w1ts, out_w1tc) = companions(&out)?;
                let (enable, enable_w1ts, enable_w1tc) = companions(&enable)?;
                let (status, status_w1ts, status_w1tc) = companions(&status)?;
                let input = reg_const(p, &input);

                Ok(quote! {
                    crate::gpio::GpioBankRegisters {
                        out: #out,
                        out_w1ts: #out_w1ts,
                        out_w1tc: #out_w1tc,
                        enable: #enable,
                        enable_w1ts: #enable_w1ts,
                        enable_w1tc: #enable_w1tc,
                        input: #input,
                        status: #status,
                        status_w1ts: #status_w1ts,
                        status_w1tc: #status_w1tc,
                    }
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let pins = template(peripheral, PIN_ARRAY)?;
        let func_in = template(peripheral, FUNC_IN_ARRAY)?;
        let func_out = template(peripheral, FUNC_OUT_ARRAY)?;

        let pin_mod = array_module(p, pins);
        let func_in_mod = array_module(p, func_in);
        let func_out_mod = array_module(p, func_out);

        let t = |reg: &RegisterConfig, field: &str| {
            let module = array_module(p, reg);
            let field = template_const(field);
            quote! { #module::#field }
        };

        let int_type = t(pins, "INT_TYPE");
        let pad_driver = t(pins, "PAD_DRIVER");
        let wakeup_enable = t(pins, "WAKEUP_ENABLE");
        let int_ena = t(pins, "INT_ENA");
        let in_sel = t(func_in, "IN_SEL");
        let in_inv_sel = t(func_in, "IN_INV_SEL");
        let sig_in_sel = t(func_in, "SIG_IN_SEL");
        let out_sel = t(func_out, "OUT_SEL");
        let out_inv_sel = t(func_out, "OUT_INV_SEL");
        let oen_sel = t(func_out, "OEN_SEL");
        let oen_inv_sel = t(func_out, "OEN_INV_SEL");

        Ok(quote! {
            /// The number of GPIO pins.
            pub const GPIO_PIN_COUNT: u8 = #pin_count;
            /// Whether GPIO32 and up are controlled through a second bank.
            pub const GPIO_HAS_BANK_1: bool = #has_bank_1;
            /// `IN_SEL` value that ties an input signal low.
            pub const GPIO_CONSTANT_0_INPUT: u32 = #constant_0;
            /// `IN_SEL` value that ties an input signal high.
            pub const GPIO_CONSTANT_1_INPUT: u32 = #constant_1;
            /// The highest peripheral input signal index.
            pub const GPIO_INPUT_SIGNAL_MAX: u32 = #input_signal_max;
            /// `OUT_SEL` value that routes `GPIO_OUT_REG` to the pin.
            pub const GPIO_OUTPUT_SIGNAL_MAX: u32 = #output_signal_max;

            /// Register layout of the GPIO matrix.
            pub static GPIO_LAYOUT: crate::gpio::GpioLayout = crate::gpio::GpioLayout {
                pin_count: GPIO_PIN_COUNT,
                banks: &[#(#banks),*],
                pin: #pin_mod::ARRAY,
                int_type: #int_type,
                pad_driver: #pad_driver,
                wakeup_enable: #wakeup_enable,
                int_ena: #int_ena,
                func_in: #func_in_mod::ARRAY,
                in_sel: #in_sel,
                in_inv_sel: #in_inv_sel,
                sig_in_sel: #sig_in_sel,
                func_out: #func_out_mod::ARRAY,
                out_sel: #out_sel,
                out_inv_sel: #out_inv_sel,
                oen_sel: #oen_sel,
                oen_inv_sel: #oen_inv_sel,
                constant_0_input: GPIO_CONSTANT_0_INPUT,
                constant_1_input: GPIO_CONSTANT_1_INPUT,
                input_signal_max: GPIO_INPUT_SIGNAL_MAX,
                output_signal_max: GPIO_OUTPUT_SIGNAL_MAX,
            };
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Chip;

    #[test]
    fn bank_registers_per_chip() {
        let c5 = Config::for_chip(&Chip::Esp32c5).gpio().unwrap();
        assert_eq!(c5.bank_registers().len(), 1);

        let p4 = Config::for_chip(&Chip::Esp32p4).gpio().unwrap();
        let banks = p4.bank_registers();
        assert_eq!(banks.len(), 2);
        assert_eq!(banks[1][0], "OUT1");
        assert_eq!(banks[1][3], "STATUS1");
    }

    #[test]
    fn constant_selector_must_not_hit_a_pin() {
        let config = Config::for_chip(&Chip::Esp32p4);
        let mut gpio = config.gpio().unwrap().clone();
        gpio.constant_0_input = 12;

        let err = gpio.validate(config).unwrap_err();
        assert!(err.to_string().contains("collides with a pin index"));
    }

    #[test]
    fn constant_selector_must_fit_in_sel() {
        let config = Config::for_chip(&Chip::Esp32p4);
        let mut gpio = config.gpio().unwrap().clone();
        gpio.constant_1_input = 0x40;

        assert!(gpio.validate(config).is_err());
    }

    #[test]
    fn pin_count_must_match_the_pin_array() {
        let config = Config::for_chip(&Chip::Esp32c5);
        let mut gpio = config.gpio().unwrap().clone();
        gpio.pin_count = 30;

        assert!(gpio.validate(config).is_err());
    }

    #[test]
    fn output_signal_max_must_fit_out_sel() {
        let config = Config::for_chip(&Chip::Esp32c5);
        let mut gpio = config.gpio().unwrap().clone();
        gpio.output_signal_max = 256;

        assert!(gpio.validate(config).is_err());
    }
}
