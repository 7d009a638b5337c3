use core::fmt::Display;
use std::{collections::HashMap, env, fmt, fs, io::Write, path::PathBuf};

use serde::Serialize;

use crate::generate::{validator::Validator, value::Value};

mod markdown;
pub(crate) mod validator;
pub(crate) mod value;

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Parse errors.
    Parse(String),
    /// Validation errors.
    Validation(String),
}

impl Error {
    /// Convenience function for creating parse errors.
    pub fn parse<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self::Parse(message.into())
    }

    /// Convenience function for creating validation errors.
    pub fn validation<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self::Validation(message.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Parse(message) => write!(f, "{message}"),
            Error::Validation(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for Error {}

/// The stability of the configuration option.
#[derive(Serialize, Clone, Copy)]
pub enum Stability {
    /// Unstable options need to be activated with the `unstable` feature
    /// of the package that defines them.
    Unstable,
    /// Stable options contain the first version in which they were
    /// stabilized.
    Stable(&'static str),
}

impl Display for Stability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stability::Unstable => write!(f, "⚠️ Unstable"),
            Stability::Stable(version) => write!(f, "Stable since {version}"),
        }
    }
}

/// A configuration option.
#[derive(Serialize)]
pub struct ConfigOption {
    /// The name of the configuration option.
    ///
    /// The associated environment variable has the format of
    /// `<PREFIX>_CONFIG_<NAME>`.
    pub name: &'static str,

    /// The description of the configuration option.
    ///
    /// The description will be included in the generated markdown
    /// documentation.
    pub description: &'static str,

    /// The default value of the configuration option.
    pub default_value: Value,

    /// An optional validator for the configuration option.
    pub constraint: Option<Validator>,

    /// The stability of the configuration option.
    pub stability: Stability,

    /// Whether the config option should be offered to the user.
    ///
    /// Inactive options are not included in the documentation, and accessing
    /// them provides the default value.
    pub active: bool,
}

impl ConfigOption {
    fn env_var(&self, prefix: &str) -> String {
        format!("{}{}", prefix, screaming_snake_case(self.name))
    }

    fn cfg_name(&self) -> String {
        snake_case(self.name)
    }

    fn is_stable(&self) -> bool {
        matches!(self.stability, Stability::Stable(_))
    }
}

/// Generate and parse config from a crate name and a list of options.
///
/// This function will parse any `SCREAMING_SNAKE_CASE` environment variables
/// that start with `<CRATE_NAME>_CONFIG_`, parse them into the type of the
/// option's default [`Value`] and run the option's [`Validator`].
///
/// [`Stability::Unstable`] options can only be set if `enable_unstable` is
/// true.
///
/// Every option is then exported as an environment variable of the same name,
/// and as a `snake_case` cfg _without_ the prefix when it is a true boolean.
/// Enumerations additionally get one cfg per variant.
///
/// Passing a value of true for the `emit_md_tables` argument will write
/// `{crate_name}_config_table.md` and `{crate_name}_selected_config.md` into
/// `OUT_DIR`.
///
/// # Panics
///
/// Unknown, invalid or disallowed options fail the build script.
pub fn generate_config(
    crate_name: &str,
    config: &[ConfigOption],
    enable_unstable: bool,
    emit_md_tables: bool,
) -> HashMap<String, Value> {
    let configs =
        match generate_config_internal(std::io::stdout(), crate_name, config, enable_unstable) {
            Ok(configs) => configs,
            Err(error) => panic!("{error}"),
        };

    if emit_md_tables {
        let file_name = snake_case(crate_name);

        let mut doc_table = String::from(markdown::DOC_TABLE_HEADER);
        let mut selected_config = String::from(markdown::SELECTED_TABLE_HEADER);

        for (name, option, value) in configs.iter() {
            if !option.active {
                continue;
            }
            markdown::write_doc_table_line(&mut doc_table, name, option);
            markdown::write_summary_table_line(&mut selected_config, name, value);
        }

        write_out_file(format!("{file_name}_config_table.md"), doc_table);
        write_out_file(format!("{file_name}_selected_config.md"), selected_config);
    }

    // Remove the ConfigOptions from the output
    configs.into_iter().map(|(k, _, v)| (k, v)).collect()
}

/// Like [`generate_config`], writing the cargo directives to `stdout` and
/// returning errors instead of panicking.
pub fn generate_config_internal<'a>(
    mut stdout: impl Write,
    crate_name: &str,
    config: &'a [ConfigOption],
    enable_unstable: bool,
) -> Result<Vec<(String, &'a ConfigOption, Value)>, Error> {
    // Only rebuild if `build.rs` changed. Otherwise, Cargo will rebuild if any
    // other file changed.
    writeln!(stdout, "cargo:rerun-if-changed=build.rs").ok();

    #[cfg(not(test))]
    env_change_work_around(&mut stdout);

    // Ensure that the prefix is `SCREAMING_SNAKE_CASE`:
    let prefix = format!("{}_CONFIG_", screaming_snake_case(crate_name));

    let mut configs = create_config(&prefix, config);
    capture_from_env(crate_name, &prefix, &mut configs, enable_unstable)?;

    for (name, option, value) in configs.iter() {
        if let Some(ref validator) = option.constraint {
            validator.validate(value).map_err(|e| match e {
                Error::Parse(message) => Error::Parse(format!("{name}: {message}")),
                Error::Validation(message) => Error::Validation(format!("{name}: {message}")),
            })?;
        }
    }

    emit_configuration(&mut stdout, &configs);

    #[cfg(not(test))]
    {
        let config_json = config_json(&configs, false);
        write_out_file(format!("{crate_name}_config_data.json"), config_json);
    }

    Ok(configs)
}

fn config_json(config: &[(String, &ConfigOption, Value)], pretty: bool) -> String {
    #[derive(Serialize)]
    struct Item<'a> {
        #[serde(flatten)]
        option: &'a ConfigOption,
        actual_value: Value,
    }

    let to_write = config
        .iter()
        .map(|(_, option, value)| Item {
            actual_value: value.clone(),
            option,
        })
        .collect::<Vec<_>>();

    let json = if pretty {
        serde_json::to_string_pretty(&to_write)
    } else {
        serde_json::to_string(&to_write)
    };

    // Every option type serializes to plain JSON, nothing here can fail.
    json.unwrap_or_default()
}

// A work-around for https://github.com/rust-lang/cargo/issues/10358
// This can be removed when https://github.com/rust-lang/cargo/pull/14058 is merged.
// Unlikely to work on projects in workspaces
#[cfg(not(test))]
fn env_change_work_around(mut stdout: impl Write) {
    let Some(out_dir) = env::var_os("OUT_DIR") else {
        return;
    };
    let mut out_dir = PathBuf::from(out_dir);

    // We clean out_dir by removing all trailing directories, until it ends with
    // target
    while !out_dir.ends_with("target") {
        if !out_dir.pop() {
            return; // We ran out of directories...
        }
    }
    out_dir.pop();

    let dotcargo = out_dir.join(".cargo/");
    for file in ["config.toml", "config"] {
        let path = dotcargo.join(file);
        if path.exists() {
            writeln!(stdout, "cargo:rerun-if-changed={}", path.display()).ok();
        }
    }
}

fn create_config<'a>(
    prefix: &str,
    config: &'a [ConfigOption],
) -> Vec<(String, &'a ConfigOption, Value)> {
    config
        .iter()
        .map(|option| (option.env_var(prefix), option, option.default_value.clone()))
        .collect()
}

fn capture_from_env(
    crate_name: &str,
    prefix: &str,
    configs: &mut [(String, &ConfigOption, Value)],
    enable_unstable: bool,
) -> Result<(), Error> {
    let mut unknown = Vec::new();
    let mut failed = Vec::new();
    let mut unstable = Vec::new();

    // Try and capture input from the environment:
    for (var, value) in env::vars() {
        if !var.starts_with(prefix) {
            continue;
        }

        let Some((_, option, cfg)) = configs.iter_mut().find(|(k, _, _)| k == &var) else {
            unknown.push(var);
            continue;
        };

        if !option.active {
            unknown.push(var);
            continue;
        }

        if !enable_unstable && !option.is_stable() {
            unstable.push(var);
            continue;
        }

        if let Err(e) = cfg.parse_in_place(&value) {
            failed.push(format!("{var}: {e}"));
        }
    }

    if !failed.is_empty() {
        return Err(Error::parse(format!(
            "Invalid configuration options detected: {failed:?}"
        )));
    }

    if !unstable.is_empty() {
        return Err(Error::validation(format!(
            "The following configuration options are unstable: {unstable:?}. You can enable them by \
            activating the 'unstable' feature in {crate_name}."
        )));
    }

    if !unknown.is_empty() {
        return Err(Error::validation(format!(
            "Unknown configuration options detected: {unknown:?}"
        )));
    }

    Ok(())
}

fn emit_configuration(mut stdout: impl Write, configs: &[(String, &ConfigOption, Value)]) {
    for (env_var_name, option, value) in configs.iter() {
        let cfg_name = option.cfg_name();

        // Output the raw configuration as an env var. Values that haven't been seen
        // will be output here with the default value. Also trigger a rebuild if config
        // environment variable changed.
        writeln!(stdout, "cargo:rustc-env={env_var_name}={value}").ok();
        writeln!(stdout, "cargo:rerun-if-env-changed={env_var_name}").ok();

        // Emit known config symbol:
        writeln!(stdout, "cargo:rustc-check-cfg=cfg({cfg_name})").ok();

        if let Value::Bool(true) = value {
            writeln!(stdout, "cargo:rustc-cfg={cfg_name}").ok();
        }

        // Emit extra symbols based on the validator (e.g. enumerated values):
        if let Some(validator) = option.constraint.as_ref() {
            validator.emit_cargo_extras(&mut stdout, &cfg_name, value);
        }
    }
}

fn write_out_file(file_name: String, contents: String) {
    let Some(out_dir) = env::var_os("OUT_DIR") else {
        panic!("OUT_DIR is not set, generate_config must run in a build script");
    };
    let out_file = PathBuf::from(out_dir).join(&file_name);
    if let Err(error) = fs::write(&out_file, contents) {
        panic!("Failed to write {}: {error}", out_file.display());
    }
}

pub(crate) fn snake_case(name: &str) -> String {
    let mut name = name.replace('-', "_");
    name.make_ascii_lowercase();

    name
}

fn screaming_snake_case(name: &str) -> String {
    let mut name = name.replace('-', "_");
    name.make_ascii_uppercase();

    name
}
