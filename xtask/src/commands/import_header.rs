use std::{
    collections::{BTreeMap, HashSet},
    fs,
    path::PathBuf,
};

use anyhow::{Context, Result, bail, ensure};
use clap::Args;
use esp_regmap_metadata::{
    Access,
    BitRange,
    Config,
    FieldConfig,
    PeripheralConfig,
    RegisterConfig,
};
use regex::Regex;

/// Numbered registers are only folded into an array from this many instances
/// on. Bank pairs like `OUT`/`OUT1` stay plain registers.
const MIN_ARRAY_LEN: usize = 4;

// ----------------------------------------------------------------------------
// Subcommand Arguments

#[derive(Debug, Args)]
pub struct ImportHeaderArgs {
    /// Path to the vendor `<peripheral>_reg.h`.
    pub header: PathBuf,
    /// Peripheral whose registers to import, e.g. `GPIO`.
    #[arg(long)]
    pub peripheral: String,
    /// Base address of the peripheral. Taken from `DR_REG_<PERIPHERAL>_BASE`
    /// in the header when omitted.
    #[arg(long, value_parser = parse_number)]
    pub base: Option<u32>,
    /// File to write the map to. Printed to stdout when omitted.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

// ----------------------------------------------------------------------------
// Subcommand Actions

pub fn import_header(args: ImportHeaderArgs) -> Result<()> {
    let source = fs::read_to_string(&args.header)
        .with_context(|| format!("Failed to read {}", args.header.display()))?;

    let peripheral = import(&source, &args.peripheral, args.base)
        .with_context(|| format!("Failed to import {}", args.header.display()))?;
    let toml = render(&peripheral)?;

    match args.out {
        Some(path) => {
            fs::write(&path, toml).with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("Wrote {}", path.display());
        }
        None => print!("{toml}"),
    }

    Ok(())
}

/// Parses the registers of one peripheral out of a vendor header and folds
/// numbered registers into arrays.
pub(crate) fn import(source: &str, peripheral: &str, base: Option<u32>) -> Result<PeripheralConfig> {
    let peripheral = peripheral.to_uppercase();
    let base = match base {
        Some(base) => base,
        None => find_base(source, &peripheral)?,
    };

    let mut registers = parse_header(source, &peripheral)?;
    ensure!(!registers.is_empty(), "No {peripheral} registers found");
    registers.sort_by_key(|r| r.offset);

    let parsed = registers.len();
    let registers = fold_arrays(link_companions(registers));

    log::info!(
        "{peripheral}: {parsed} registers, {} after folding arrays",
        registers.len()
    );

    Ok(PeripheralConfig {
        name: peripheral,
        base,
        description: String::new(),
        registers,
    })
}

fn parse_number(s: &str) -> Result<u32, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };

    parsed.map_err(|e| format!("Invalid number '{s}': {e}"))
}

fn find_base(source: &str, peripheral: &str) -> Result<u32> {
    let base_re = Regex::new(&format!(
        r"#define\s+DR_REG_{}_BASE\s+\(?\s*(0x[0-9A-Fa-f]+)",
        regex::escape(peripheral)
    ))?;

    let Some(caps) = base_re.captures(source) else {
        bail!("The header doesn't define DR_REG_{peripheral}_BASE, pass --base");
    };

    parse_number(&caps[1]).map_err(anyhow::Error::msg)
}

// A doc comment being collected.
enum Doc {
    Register(String),
    Field(FieldConfig),
}

fn append(text: &mut String, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    if !text.is_empty() {
        text.push(' ');
    }
    text.push_str(line);
}

fn parse_header(source: &str, peripheral: &str) -> Result<Vec<RegisterConfig>> {
    let prefix = format!("{peripheral}_");

    let reg_doc_re = Regex::new(r"^/\*\*\s+(\w+)_REG register")?;
    let reg_def_re = Regex::new(&format!(
        r"^#define\s+(\w+)_REG\s+\(DR_REG_{}_BASE\s*\+\s*(0x[0-9A-Fa-f]+|\d+)\)",
        regex::escape(peripheral)
    ))?;
    let field_doc_re = Regex::new(
        r"^/\*\*\s+(\w+)\s*:\s*([A-Z/]+);\s*bitpos:\s*\[(\d+)(?::(\d+))?\];\s*default:\s*(0x[0-9A-Fa-f]+|\d+)\s*;",
    )?;
    let continuation_re = Regex::new(r"^\s*\*\s?(.*)$")?;

    let mut registers: Vec<RegisterConfig> = Vec::new();
    let mut doc = None;
    let mut description = String::new();

    for (n, line) in source.lines().enumerate() {
        let line = line.trim_end();
        let line_no = n + 1;

        if reg_doc_re.is_match(line) {
            doc = Some(Doc::Register(String::new()));
            continue;
        }

        if let Some(caps) = field_doc_re.captures(line) {
            let symbol = &caps[1];
            let Some(name) = symbol.strip_prefix(&prefix) else {
                bail!("line {line_no}: field {symbol} doesn't belong to {peripheral}");
            };
            let access = caps[2]
                .parse::<Access>()
                .with_context(|| format!("line {line_no}: unknown access {}", &caps[2]))?;
            let hi = caps[3].parse::<u8>()?;
            let lo = match caps.get(4) {
                Some(lo) => lo.as_str().parse::<u8>()?,
                None => hi,
            };
            ensure!(hi >= lo && hi < 32, "line {line_no}: invalid bit range of {symbol}");

            doc = Some(Doc::Field(FieldConfig {
                name: name.to_string(),
                bits: BitRange { hi, lo },
                access,
                reset: parse_number(&caps[5]).map_err(anyhow::Error::msg)?,
                reset_overrides: Vec::new(),
                description: String::new(),
            }));
            continue;
        }

        if line.trim_start().starts_with("*/") {
            match doc.take() {
                Some(Doc::Register(text)) => description = text,
                Some(Doc::Field(field)) => {
                    let Some(reg) = registers.last_mut() else {
                        bail!("line {line_no}: field {} precedes every register", field.name);
                    };
                    reg.fields.push(field);
                }
                None => {}
            }
            continue;
        }

        if let Some(doc) = &mut doc {
            if let Some(caps) = continuation_re.captures(line) {
                match doc {
                    Doc::Register(text) => append(text, &caps[1]),
                    Doc::Field(field) => append(&mut field.description, &caps[1]),
                }
            }
            continue;
        }

        if let Some(caps) = reg_def_re.captures(line) {
            let symbol = &caps[1];
            let Some(name) = symbol.strip_prefix(&prefix) else {
                bail!("line {line_no}: register {symbol} doesn't belong to {peripheral}");
            };

            registers.push(RegisterConfig {
                name: name.to_string(),
                offset: parse_number(&caps[2]).map_err(anyhow::Error::msg)?,
                stride: None,
                count: None,
                indices: None,
                w1ts: None,
                w1tc: None,
                description: std::mem::take(&mut description),
                fields: Vec::new(),
            });
        }
    }

    Ok(registers)
}

fn is_companion(name: &str) -> bool {
    name.ends_with("_W1TS") || name.ends_with("_W1TC")
}

/// Links `X` to `X_W1TS` and `X_W1TC` where the header has them.
fn link_companions(mut registers: Vec<RegisterConfig>) -> Vec<RegisterConfig> {
    let names = registers
        .iter()
        .map(|r| r.name.clone())
        .collect::<HashSet<_>>();

    for reg in registers.iter_mut().filter(|r| !is_companion(&r.name)) {
        let w1ts = format!("{}_W1TS", reg.name);
        let w1tc = format!("{}_W1TC", reg.name);

        if names.contains(&w1ts) {
            reg.w1ts = Some(w1ts);
        }
        if names.contains(&w1tc) {
            reg.w1tc = Some(w1tc);
        }
    }

    registers
}

/// Splits a register name at its last number, e.g. `FUNC12_IN_SEL_CFG` into
/// `FUNC{n}_IN_SEL_CFG` and 12.
fn numbered(name: &str) -> Option<(String, u32)> {
    let end = name.rfind(|c: char| c.is_ascii_digit())? + 1;
    let start = name[..end]
        .rfind(|c: char| !c.is_ascii_digit())
        .map_or(0, |i| i + 1);

    let digits = &name[start..end];
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }

    let index = digits.parse().ok()?;
    Some((format!("{}{{n}}{}", &name[..start], &name[end..]), index))
}

/// Replaces the first whole number equal to `index` with `{n}`.
fn templated(text: &str, index: u32) -> Option<String> {
    let needle = index.to_string();
    let bytes = text.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }

        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if text[start..i] == needle {
            return Some(format!("{}{{n}}{}", &text[..start], &text[i..]));
        }
    }

    None
}

// The template of a text that mentions its instance number, if every
// instance agrees on it. Otherwise the first instance's text.
fn common_text<'a>(texts: impl Iterator<Item = (u32, &'a str)> + Clone) -> String {
    let mut templates = texts.clone().map(|(index, text)| templated(text, index));

    match templates.next() {
        Some(Some(first)) if templates.all(|t| t.as_ref() == Some(&first)) => first,
        _ => texts.map(|(_, t)| t.to_string()).next().unwrap_or_default(),
    }
}

// The most common value, ties going to the value seen first.
fn most_common(values: &[u32]) -> u32 {
    let mut counts = BTreeMap::new();
    for v in values {
        *counts.entry(*v).or_insert(0usize) += 1;
    }

    let max = counts.values().copied().max().unwrap_or(0);
    values
        .iter()
        .copied()
        .find(|v| counts[v] == max)
        .unwrap_or_default()
}

/// Folds numbered instances sharing a layout and a constant stride into one
/// array register. Returns `None` if the instances don't qualify.
fn fold(template: &str, mut members: Vec<(u32, &RegisterConfig)>) -> Option<RegisterConfig> {
    members.sort_by_key(|(index, _)| *index);

    let (i0, first) = members[0];
    let (i1, second) = members[1];
    let distance = second.offset.checked_sub(first.offset)?;
    if distance % (i1 - i0) != 0 {
        return None;
    }
    let stride = distance / (i1 - i0);
    if stride == 0 || stride % 4 != 0 {
        return None;
    }
    let offset = first.offset.checked_sub(stride.checked_mul(i0)?)?;

    // Field names with the instance number replaced, per instance.
    let mut layouts = Vec::with_capacity(members.len());
    for (index, reg) in &members {
        if reg.offset != offset.checked_add(stride.checked_mul(*index)?)? {
            return None;
        }

        let layout = reg
            .fields
            .iter()
            .map(|f| Some((templated(&f.name, *index)?, f.bits, f.access)))
            .collect::<Option<Vec<_>>>()?;
        layouts.push(layout);
    }
    if layouts.iter().any(|l| *l != layouts[0]) {
        return None;
    }

    let fields = layouts[0]
        .iter()
        .enumerate()
        .map(|(j, (name, bits, access))| {
            let resets = members
                .iter()
                .map(|(_, reg)| reg.fields[j].reset)
                .collect::<Vec<_>>();
            let reset = most_common(&resets);

            FieldConfig {
                name: name.clone(),
                bits: *bits,
                access: *access,
                reset,
                reset_overrides: members
                    .iter()
                    .zip(&resets)
                    .filter(|(_, r)| **r != reset)
                    .map(|((index, _), r)| (*index, *r))
                    .collect(),
                description: common_text(
                    members
                        .iter()
                        .map(|(index, reg)| (*index, reg.fields[j].description.as_str())),
                ),
            }
        })
        .collect();

    let indices = members.iter().map(|(index, _)| *index).collect::<Vec<_>>();
    let dense = indices.iter().copied().eq(0..indices.len() as u32);

    Some(RegisterConfig {
        name: template.to_string(),
        offset,
        stride: Some(stride),
        count: dense.then_some(indices.len() as u32),
        indices: (!dense).then_some(indices),
        w1ts: None,
        w1tc: None,
        description: common_text(
            members
                .iter()
                .map(|(index, reg)| (*index, reg.description.as_str())),
        ),
        fields,
    })
}

fn fold_arrays(registers: Vec<RegisterConfig>) -> Vec<RegisterConfig> {
    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();

    for (position, reg) in registers.iter().enumerate() {
        if reg.w1ts.is_some() || reg.w1tc.is_some() || is_companion(&reg.name) {
            continue;
        }
        if let Some((template, _)) = numbered(&reg.name) {
            groups.entry(template).or_default().push(position);
        }
    }

    // Position of the first instance -> the array replacing the instances.
    let mut arrays = BTreeMap::new();
    let mut folded = HashSet::new();

    for (template, positions) in groups {
        if positions.len() < MIN_ARRAY_LEN {
            continue;
        }

        let members = positions
            .iter()
            .filter_map(|&p| {
                let reg = &registers[p];
                numbered(&reg.name).map(|(_, index)| (index, reg))
            })
            .collect::<Vec<_>>();

        match fold(&template, members) {
            Some(array) => {
                log::debug!("Folded {} registers into {template}", positions.len());
                arrays.insert(positions[0], array);
                folded.extend(positions);
            }
            None => log::warn!("{template} doesn't have a constant stride and layout, kept as is"),
        }
    }

    registers
        .into_iter()
        .enumerate()
        .filter_map(|(position, reg)| match arrays.remove(&position) {
            Some(array) => Some(array),
            None if folded.contains(&position) => None,
            None => Some(reg),
        })
        .collect()
}

#[derive(serde::Serialize)]
struct DeviceFile<'a> {
    device: ImportedDevice<'a>,
}

#[derive(serde::Serialize)]
struct ImportedDevice<'a> {
    name: &'a str,
    trm: &'a str,
    peripherals: [&'a PeripheralConfig; 1],
}

/// Renders the peripheral as a device file, checked by loading it back.
pub(crate) fn render(peripheral: &PeripheralConfig) -> Result<String> {
    let file = DeviceFile {
        device: ImportedDevice {
            name: "imported",
            trm: "",
            peripherals: [peripheral],
        },
    };

    let toml = basic_toml::to_string(&file).context("Failed to serialize the register map")?;
    Config::from_toml(&toml).context("The imported register map is invalid")?;

    Ok(toml)
}
