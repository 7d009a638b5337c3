//! Vendor-style C header rendering.

use std::fmt::Write;

use crate::{Config, cfg::PeripheralConfig};

const PROLOGUE: &str = r#"/**
 * SPDX-FileCopyrightText: 2025 Espressif Systems (Shanghai) CO LTD
 *
 *  SPDX-License-Identifier: Apache-2.0
 */
#pragma once

#include <stdint.h>
#include "soc/soc.h"
#ifdef __cplusplus
extern "C" {
#endif
"#;

const EPILOGUE: &str = r#"
#ifdef __cplusplus
}
#endif
"#;

/// Renders `<peripheral>_reg.h`.
///
/// The bare field macro keeps the header convention: `(BIT(s))` for
/// single-bit fields and the value mask otherwise.
pub(crate) fn render(
    config: &Config,
    peripheral: &PeripheralConfig,
) -> Result<String, std::fmt::Error> {
    let mut out = String::from(PROLOGUE);
    let base = peripheral.base_symbol();

    for reg in config
        .registers()
        .iter()
        .filter(|r| r.peripheral == peripheral.name)
    {
        let reg_symbol = reg.reg_symbol();

        writeln!(out)?;
        writeln!(out, "/** {reg_symbol} register")?;
        writeln!(out, " *  {}", reg.description)?;
        writeln!(out, " */")?;
        writeln!(out, "#define {reg_symbol} ({base} + {:#x})", reg.offset)?;

        for field in &reg.fields {
            let symbol = &field.symbol;
            writeln!(
                out,
                "/** {symbol} : {}; bitpos: [{}]; default: {};",
                field.access, field.bits, field.reset
            )?;
            writeln!(out, " *  {}", field.description)?;
            writeln!(out, " */")?;

            if field.width() == 1 {
                writeln!(out, "#define {symbol}    (BIT({}))", field.shift())?;
            } else {
                writeln!(out, "#define {symbol}    {:#010X}U", field.max())?;
            }
            writeln!(out, "#define {symbol}_M  ({symbol}_V << {symbol}_S)")?;
            writeln!(out, "#define {symbol}_V  {:#010X}U", field.max())?;
            writeln!(out, "#define {symbol}_S  {}", field.shift())?;
        }
    }

    out.push_str(EPILOGUE);

    Ok(out)
}

#[cfg(test)]
mod tests {
    use crate::{Chip, Config};

    #[test]
    fn single_bit_fields_use_bit_macro() {
        let header = Config::for_chip(&Chip::Esp32c5)
            .generate_c_header("LP_TEE")
            .unwrap();

        assert!(header.contains("#define LP_TEE_M0_MODE_CTRL_REG (DR_REG_LP_TEE_BASE + 0x0)"));
        assert!(header.contains("#define LP_TEE_M0_LOCK    (BIT(2))"));
        assert!(header.contains("#define LP_TEE_M0_MODE    0x00000003U"));
        assert!(header.contains("#define LP_TEE_M0_MODE_V  0x00000003U"));
        assert!(header.contains("#define LP_TEE_M0_MODE_S  0"));
        assert!(header.contains("#define LP_TEE_DATE_REG (DR_REG_LP_TEE_BASE + 0xffc)"));
    }

    #[test]
    fn unknown_peripheral_is_an_error() {
        assert!(
            Config::for_chip(&Chip::Esp32p4)
                .generate_c_header("LP_TEE")
                .is_err()
        );
    }
}
