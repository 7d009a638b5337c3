//! [device.tee]: security mode and permission controllers.

use anyhow::{Context, Result, bail, ensure};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};

use crate::{
    Config,
    cfg::{FieldConfig, PeripheralConfig, RegisterConfig},
    generate::{array_module, reg_const, template_const},
};

const MASTER_ARRAY: &str = "M{n}_MODE_CTRL";

/// Security modes, in the bit order of the permission registers.
const MODES: [&str; 4] = ["TEE", "REE0", "REE1", "REE2"];

/// Properties of the TEE controllers, used in [device.tee].
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct TeeProperties {
    /// Peripherals that follow the TEE controller layout.
    pub controllers: Vec<String>,
}

/// A permission register: 4 read bits followed by 4 write bits, one per
/// security mode.
#[derive(Debug, Clone)]
pub struct PermissionTarget<'a> {
    pub name: String,
    pub register: &'a RegisterConfig,
    pub read: [&'a FieldConfig; 4],
    pub write: [&'a FieldConfig; 4],
}

fn permission_field<'a>(
    reg: &'a RegisterConfig,
    name: &str,
    bit: u8,
) -> Result<&'a FieldConfig> {
    let Some(field) = reg.fields.iter().find(|f| f.name == name) else {
        bail!("{} has no field {name}", reg.name);
    };

    ensure!(
        field.bits.lo == bit && field.bits.hi == bit,
        "{name} must be bit {bit}, found {}",
        field.bits
    );

    Ok(field)
}

/// Collects the permission registers of a controller. A register is a
/// permission register when it has a `READ_TEE_<X>` field.
pub fn permission_targets(peripheral: &PeripheralConfig) -> Result<Vec<PermissionTarget<'_>>> {
    let mut targets = Vec::new();

    for reg in peripheral.registers.iter().filter(|r| !r.is_array()) {
        let Some(suffix) = reg
            .fields
            .iter()
            .find_map(|f| f.name.strip_prefix("READ_TEE_"))
        else {
            continue;
        };

        let mut read = Vec::with_capacity(4);
        let mut write = Vec::with_capacity(4);
        for (bit, mode) in MODES.iter().enumerate() {
            read.push(permission_field(reg, &format!("READ_{mode}_{suffix}"), bit as u8)?);
            write.push(permission_field(
                reg,
                &format!("WRITE_{mode}_{suffix}"),
                bit as u8 + 4,
            )?);
        }

        let name = reg.name.strip_suffix("_CTRL").unwrap_or(&reg.name);
        targets.push(PermissionTarget {
            name: name.to_string(),
            register: reg,
            read: [read[0], read[1], read[2], read[3]],
            write: [write[0], write[1], write[2], write[3]],
        });
    }

    Ok(targets)
}

fn masters(peripheral: &PeripheralConfig) -> Result<&RegisterConfig> {
    let reg = peripheral
        .register(MASTER_ARRAY)
        .with_context(|| format!("{} has no {MASTER_ARRAY}", peripheral.name))?;

    ensure!(reg.is_array(), "{MASTER_ARRAY} must be a register array");

    for (name, width) in [("MODE", 2), ("LOCK", 1)] {
        let Some(field) = reg
            .fields
            .iter()
            .find(|f| reg.template_field_name(&f.name) == name)
        else {
            bail!("{MASTER_ARRAY} has no {name} field");
        };
        ensure!(
            field.bits.width() == width,
            "{} must be {width} bits wide",
            field.name
        );
    }

    Ok(reg)
}

// `Some(<P>_<FIELD>)` if the register and field exist.
fn optional_field(peripheral: &PeripheralConfig, reg: &str, field: &str) -> TokenStream {
    let exists = peripheral
        .register(reg)
        .is_some_and(|r| r.fields.iter().any(|f| f.name == field));

    if exists {
        let ident = format_ident!("{}_{field}", peripheral.name);
        quote! { Some(#ident) }
    } else {
        quote! { None }
    }
}

impl TeeProperties {
    pub(crate) fn validate(&self, config: &Config) -> Result<()> {
        ensure!(!self.controllers.is_empty(), "No controllers listed");

        for name in &self.controllers {
            let Some(peripheral) = config.peripheral(name) else {
                bail!("Controller {name} does not exist");
            };

            masters(peripheral).with_context(|| format!("In controller {name}"))?;
            let targets =
                permission_targets(peripheral).with_context(|| format!("In controller {name}"))?;
            ensure!(!targets.is_empty(), "Controller {name} has no permission registers");
        }

        Ok(())
    }

    /// Generates one `<P>_LAYOUT` static per controller.
    pub(crate) fn generate(&self, config: &Config) -> Result<TokenStream> {
        let mut tokens = TokenStream::new();

        for name in &self.controllers {
            let Some(peripheral) = config.peripheral(name) else {
                bail!("Controller {name} does not exist");
            };
            let p = &peripheral.name;

            let master_reg = masters(peripheral)?;
            let masters = array_module(p, master_reg);
            let mode = template_const("MODE");
            let lock = template_const("LOCK");

            let targets = permission_targets(peripheral)?
                .into_iter()
                .map(|target| {
                    let name = &target.name;
                    let register = reg_const(p, &target.register.name);
                    let read = target.read.map(|f| format_ident!("{p}_{}", f.name));
                    let write = target.write.map(|f| format_ident!("{p}_{}", f.name));

                    quote! {
                        crate::tee::TeeTarget {
                            name: #name,
                            register: #register,
                            read: [#(#read),*],
                            write: [#(#write),*],
                        }
                    }
                });

            let bus_err_resp_en = optional_field(peripheral, "BUS_ERR_CONF", "BUS_ERR_RESP_EN");
            let clk_en = optional_field(peripheral, "CLOCK_GATE", "CLK_EN");
            let date = optional_field(peripheral, "DATE", "DATE");
            let force_hp_mem = optional_field(peripheral, "FORCE_ACC_HP", "FORCE_ACC_HPMEM_EN");

            let layout = format_ident!("{p}_LAYOUT");
            let doc = format!(" Register layout of the {p} controller.");

            tokens.extend(quote! {
                #[doc = #doc]
                pub static #layout: crate::tee::TeeLayout = crate::tee::TeeLayout {
                    name: #p,
                    masters: #masters::ARRAY,
                    mode: #masters::#mode,
                    lock: #masters::#lock,
                    targets: &[#(#targets),*],
                    bus_err_resp_en: #bus_err_resp_en,
                    clk_en: #clk_en,
                    date: #date,
                    force_hp_mem: #force_hp_mem,
                };
            });
        }

        Ok(tokens)
    }
}
