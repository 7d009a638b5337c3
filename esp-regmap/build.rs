use std::{env, error::Error};

use esp_regmap_config::{ConfigOption, Stability, Validator, Value, generate_config};
use esp_regmap_metadata::{Chip, Config};
use strum::IntoEnumIterator;

fn main() -> Result<(), Box<dyn Error>> {
    // Log and defmt are mutually exclusive features. Both define the same
    // logging macros.
    if env::var_os("CARGO_FEATURE_LOG").is_some() && env::var_os("CARGO_FEATURE_DEFMT").is_some() {
        panic!("The `log` and `defmt` features are mutually exclusive");
    }

    // Generate the register tables of every supported device:
    for chip in Chip::iter() {
        Config::for_chip(&chip).generate_metadata()?;
    }

    // emit config
    generate_config(
        "esp-regmap",
        &[
            ConfigOption {
                name: "strict-access",
                description: "Fail writes to fields that software can't modify (RO, HRO, WT). \
                When disabled, such writes are skipped with a warning.",
                default_value: Value::Bool(true),
                constraint: None,
                stability: Stability::Stable("0.1.0"),
                active: true,
            },
            ConfigOption {
                name: "trace-writes",
                description: "Log every register write at trace level.",
                default_value: Value::Bool(false),
                constraint: None,
                stability: Stability::Stable("0.1.0"),
                active: true,
            },
            ConfigOption {
                name: "sim-fault-policy",
                description: "What the simulated bus does on an access to an address without \
                a register: `record` the fault, or `panic`.",
                default_value: Value::String(String::from("record")),
                constraint: Some(Validator::Enumeration(vec![
                    String::from("record"),
                    String::from("panic"),
                ])),
                stability: Stability::Unstable,
                active: true,
            },
        ],
        env::var_os("CARGO_FEATURE_UNSTABLE").is_some(),
        true,
    );

    Ok(())
}
