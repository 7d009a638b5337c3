//! Generates `_generated_<chip>.rs`, included by `esp-regmap::soc`.

use std::collections::HashMap;

use anyhow::Result;
use proc_macro2::{Ident, TokenStream};
use quote::{format_ident, quote};

use crate::{
    Config,
    cfg::{Access, PeripheralConfig, RegisterConfig},
    hex,
    number,
    regmap::{Register, Shadow},
};

/// `gpio_func_in_sel_cfg` for `FUNC{n}_IN_SEL_CFG` in GPIO.
pub(crate) fn array_module(peripheral: &str, reg: &RegisterConfig) -> Ident {
    format_ident!(
        "{}",
        format!("{peripheral}_{}", reg.array_name()).to_lowercase()
    )
}

/// `GPIO_OUT_REG` for `OUT` in GPIO.
pub(crate) fn reg_const(peripheral: &str, name: &str) -> Ident {
    format_ident!("{peripheral}_{name}_REG")
}

/// A field of an array module, named relative to the array.
pub(crate) fn template_const(name: &str) -> Ident {
    format_ident!("{name}")
}

fn access(access: Access) -> TokenStream {
    let variant = format_ident!("{access:?}");
    quote! { crate::register::Access::#variant }
}

fn doc(text: &str) -> String {
    format!(" {text}")
}

pub(crate) fn generate(config: &Config) -> Result<TokenStream> {
    let mut g = TokenStream::new();

    let chip_name = config.name();
    let trm = config.trm();
    g.extend(quote! {
        /// The name of the chip.
        pub const CHIP: &str = #chip_name;
        /// A link to the Technical Reference Manual (TRM) for the chip.
        pub const TRM: &str = #trm;
    });

    for peripheral in config.peripherals() {
        g.extend(peripheral_consts(config, peripheral));
        for reg in peripheral.registers.iter().filter(|r| r.is_array()) {
            g.extend(array_module_tokens(peripheral, reg));
        }
    }

    g.extend(register_table(config.registers()));

    if let Some(gpio) = config.gpio() {
        g.extend(gpio.generate(config)?);
    }
    if let Some(tee) = config.tee() {
        g.extend(tee.generate(config)?);
    }

    Ok(g)
}

fn peripheral_consts(config: &Config, peripheral: &PeripheralConfig) -> TokenStream {
    let base_ident = format_ident!("{}", peripheral.base_symbol());
    let base = hex(peripheral.base);
    let base_doc = doc(&format!("{} base address.", peripheral.description));

    let registers = config
        .registers()
        .iter()
        .filter(|r| r.peripheral == peripheral.name)
        .map(|reg| {
            let reg_ident = format_ident!("{}", reg.reg_symbol());
            let offset = hex(reg.offset);
            let reg_doc = doc(&reg.description);

            let fields = reg.fields.iter().map(|field| {
                let ident = format_ident!("{}", field.symbol);
                let ident_v = format_ident!("{}_V", field.symbol);
                let ident_s = format_ident!("{}_S", field.symbol);
                let ident_m = format_ident!("{}_M", field.symbol);

                let shift = number(field.shift());
                let width = number(field.width());
                let max = hex(field.max());
                let mask = hex(field.mask());
                let reset = hex(field.reset);
                let access = access(field.access);
                let field_doc = doc(&format!(
                    "{}; bits {}; reset {}. {}",
                    field.access, field.bits, field.reset, field.description
                ));

                quote! {
                    #[doc = #field_doc]
                    pub const #ident: crate::register::Field =
                        crate::register::Field::new(#reg_ident, #shift, #width, #access, #reset);
                    pub const #ident_v: u32 = #max;
                    pub const #ident_s: u32 = #shift;
                    pub const #ident_m: u32 = #mask;
                    const _: () = ::core::assert!(
                        #ident_m == #ident_v << #ident_s
                            && #ident_m == #ident.mask()
                            && #ident_s == #ident.shift()
                    );
                }
            });

            quote! {
                #[doc = #reg_doc]
                pub const #reg_ident: u32 = #base_ident + #offset;
                #(#fields)*
            }
        });

    quote! {
        #[doc = #base_doc]
        pub const #base_ident: u32 = #base;
        #(#registers)*
    }
}

fn array_module_tokens(peripheral: &PeripheralConfig, reg: &RegisterConfig) -> TokenStream {
    let module = array_module(&peripheral.name, reg);
    let base_ident = format_ident!("{}", peripheral.base_symbol());
    let offset = hex(reg.offset);
    let stride = number(reg.stride.unwrap_or(4));
    let indices = reg.instances().into_iter().flatten().map(number);
    let name = format!("{}_{}", peripheral.name, reg.name);
    let module_doc = doc(&format!("`{name}`: {}", reg.description));

    let fields = reg.fields.iter().map(|field| {
        let ident = template_const(&reg.template_field_name(&field.name));
        let shift = number(field.bits.lo);
        let width = number(field.bits.width());
        let access = access(field.access);
        let reset = hex(field.reset);

        let mut field_doc = format!("{}; bits {}; reset {}.", field.access, field.bits, field.reset);
        if !field.reset_overrides.is_empty() {
            let overrides = field
                .reset_overrides
                .iter()
                .map(|(index, reset)| format!("{index}: {reset}"))
                .collect::<Vec<_>>()
                .join(", ");
            field_doc.push_str(&format!(" Instances resetting differently: {overrides}."));
        }
        let field_doc = doc(&field_doc);

        quote! {
            #[doc = #field_doc]
            pub const #ident: crate::register::Field =
                crate::register::Field::new(BASE, #shift, #width, #access, #reset);
        }
    });

    quote! {
        #[doc = #module_doc]
        pub mod #module {
            /// Address of instance 0.
            pub const BASE: u32 = super::#base_ident + #offset;
            pub const STRIDE: u32 = #stride;
            pub const INDICES: &[u32] = &[#(#indices),*];
            pub const COUNT: usize = INDICES.len();

            /// Address of instance `n`.
            pub const fn reg(n: u32) -> u32 {
                BASE + n * STRIDE
            }

            pub const ARRAY: crate::register::RegisterArray =
                crate::register::RegisterArray::new(#name, BASE, STRIDE, INDICES);

            #(#fields)*
        }
    }
}

fn register_table(registers: &[Register]) -> TokenStream {
    let by_address = registers
        .iter()
        .map(|r| (r.address, format_ident!("{}", r.reg_symbol())))
        .collect::<HashMap<_, _>>();

    let address_of = |address: Option<u32>| match address.and_then(|a| by_address.get(&a)) {
        Some(ident) => quote! { Some(#ident) },
        None => quote! { None },
    };

    let entries = registers.iter().map(|reg| {
        let name = &reg.symbol;
        let address = format_ident!("{}", reg.reg_symbol());
        let reset = hex(reg.reset());

        let fields = reg.fields.iter().map(|field| {
            let ident = format_ident!("{}", field.symbol);
            let name = &field.symbol;
            quote! { crate::register::FieldInfo { name: #name, field: #ident } }
        });

        let w1ts = address_of(reg.w1ts);
        let w1tc = address_of(reg.w1tc);
        let shadow_of = match reg.shadow_of {
            Some(Shadow::Set(primary)) => {
                let primary = &by_address[&primary];
                quote! { Some(crate::register::Shadow::Set(#primary)) }
            }
            Some(Shadow::Clear(primary)) => {
                let primary = &by_address[&primary];
                quote! { Some(crate::register::Shadow::Clear(#primary)) }
            }
            None => quote! { None },
        };

        quote! {
            crate::register::RegisterInfo {
                name: #name,
                address: #address,
                reset: #reset,
                fields: &[#(#fields),*],
                w1ts: #w1ts,
                w1tc: #w1tc,
                shadow_of: #shadow_of,
            }
        }
    });

    let count = number(registers.len());

    quote! {
        /// The number of entries in [`REGISTERS`].
        pub const REGISTER_COUNT: usize = #count;

        /// Every register of the chip, sorted by address.
        pub static REGISTERS: &[crate::register::RegisterInfo] = &[#(#entries),*];
    }
}
