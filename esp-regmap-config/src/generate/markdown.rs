use std::fmt::Write;

use super::{ConfigOption, value::Value};

pub(crate) const DOC_TABLE_HEADER: &str = r#"
| Option | Stability | Default value | Allowed values |
|--------|:---------:|:-------------:|:--------------:|
"#;

pub(crate) const SELECTED_TABLE_HEADER: &str = r#"
| Name | Selected value |
|------|----------------|
"#;

pub(crate) fn write_doc_table_line(mut table: impl Write, name: &str, option: &ConfigOption) {
    let allowed_values = option
        .constraint
        .as_ref()
        .and_then(|validator| validator.description())
        .unwrap_or(String::from("-"));

    writeln!(
        table,
        "|<p>**{name}**</p><p>{}</p>|{}|{}|{allowed_values}|",
        option.description.replace('\n', "<br/>"),
        option.stability,
        option.default_value,
    )
    .ok();
}

pub(crate) fn write_summary_table_line(mut table: impl Write, name: &str, value: &Value) {
    writeln!(table, "|**{name}**|{value}|").ok();
}
