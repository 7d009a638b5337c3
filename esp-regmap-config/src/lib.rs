//! Build-time configuration for the esp-regmap crates.
//!
//! Options are read from `<CRATE>_CONFIG_<NAME>` environment variables by a
//! build script, validated, and turned into `cfg`s and environment variables
//! for the crate being built.

mod generate;

pub use generate::{
    ConfigOption,
    Error,
    Stability,
    generate_config,
    generate_config_internal,
    validator::Validator,
    value::Value,
};
