use std::io::Write;

use serde::Serialize;

use super::{Error, snake_case, value::Value};

/// Configuration value validation functions.
#[derive(Serialize)]
pub enum Validator {
    /// String-Enumeration. Only allows one of the given Strings.
    Enumeration(Vec<String>),
}

impl Validator {
    pub(crate) fn validate(&self, value: &Value) -> Result<(), Error> {
        match self {
            Validator::Enumeration(values) => enumeration(values, value),
        }
    }

    pub(crate) fn description(&self) -> Option<String> {
        match self {
            Validator::Enumeration(values) => Some(format!(
                "One of: <ul>{}</ul>",
                values
                    .iter()
                    .map(|v| format!("<li>{v}</li>"))
                    .collect::<Vec<_>>()
                    .join("")
            )),
        }
    }

    /// Enumerations get one `cfg` per variant, e.g. `sim_fault_policy_record`.
    pub(crate) fn emit_cargo_extras(
        &self,
        mut stdout: impl Write,
        config_key: &str,
        actual_value: &Value,
    ) {
        let Validator::Enumeration(values) = self;

        for possible_value in values {
            writeln!(
                stdout,
                "cargo:rustc-check-cfg=cfg({config_key}_{})",
                snake_case(possible_value)
            )
            .ok();
        }

        writeln!(
            stdout,
            "cargo:rustc-cfg={config_key}_{}",
            snake_case(&actual_value.to_string())
        )
        .ok();
    }
}

fn enumeration(values: &[String], value: &Value) -> Result<(), Error> {
    let Some(value) = value.as_str() else {
        return Err(Error::parse(
            "Validator::Enumeration can only be used with string values",
        ));
    };

    if !values.iter().any(|v| v == value) {
        return Err(Error::validation(format!(
            "Expected one of {values:?}, found '{value}'"
        )));
    }

    Ok(())
}
