//! Template rendering: placeholder substitution inside a zipped markup
//! package.
//!
//! Placeholders are `{{ identifier }}` tokens inside the package's XML parts.
//! Matching is exact-name and case-sensitive with surrounding whitespace
//! trimmed. Values are formatted by inferred type: date-like placeholder
//! names render as `dd.MM.yyyy`, amount-like names with thousands grouping,
//! everything else as plain text.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

lazy_static! {
    static ref PLACEHOLDER_RE: Regex =
        Regex::new(r"\{\{\s*([A-Za-z0-9_][A-Za-z0-9_.\-]*)\s*\}\}").expect("valid regex");
}

/// Errors raised while rendering a template. Fatal for the affected item
/// only.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template source unreadable: {0}")]
    Io(#[from] std::io::Error),

    #[error("Template package corrupt: {0}")]
    Corrupt(String),

    #[error("No value supplied for placeholder '{0}'")]
    MissingValue(String),
}

impl From<zip::result::ZipError> for TemplateError {
    fn from(err: zip::result::ZipError) -> Self {
        TemplateError::Corrupt(err.to_string())
    }
}

/// A caller-supplied value for one placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlaceholderValue {
    Number(f64),
    Date(NaiveDate),
    Text(String),
}

/// What to do when a placeholder has no supplied value.
///
/// The default substitutes the empty string: partial data must not abort a
/// whole item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingValuePolicy {
    #[default]
    Empty,
    Fail,
}

/// Renders a template package by substituting placeholder values.
#[derive(Debug, Clone, Default)]
pub struct TemplateRenderer {
    policy: MissingValuePolicy,
}

impl TemplateRenderer {
    pub fn new(policy: MissingValuePolicy) -> Self {
        Self { policy }
    }

    /// Render the package at `source` with the given values, returning the
    /// populated package bytes.
    ///
    /// XML parts get placeholder substitution; every other entry is copied
    /// verbatim.
    pub fn render(
        &self,
        source: &Path,
        values: &HashMap<String, PlaceholderValue>,
    ) -> Result<Vec<u8>, TemplateError> {
        let mut archive = ZipArchive::new(File::open(source)?)?;
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            if entry.is_dir() {
                writer.add_directory(entry.name().to_string(), options)?;
                continue;
            }

            let name = entry.name().to_string();
            if name.ends_with(".xml") {
                let mut markup = String::new();
                entry
                    .read_to_string(&mut markup)
                    .map_err(|e| TemplateError::Corrupt(format!("{name}: {e}")))?;
                let substituted = self.substitute(&markup, values)?;
                writer.start_file(name, options)?;
                writer.write_all(substituted.as_bytes())?;
            } else {
                let mut raw = Vec::new();
                entry.read_to_end(&mut raw)?;
                writer.start_file(name, options)?;
                writer.write_all(&raw)?;
            }
        }

        Ok(writer.finish()?.into_inner())
    }

    /// Replace every placeholder occurrence in one markup part.
    fn substitute(
        &self,
        markup: &str,
        values: &HashMap<String, PlaceholderValue>,
    ) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(markup.len());
        let mut last = 0;

        for caps in PLACEHOLDER_RE.captures_iter(markup) {
            let token = caps.get(0).expect("group 0 always present");
            let name = &caps[1];

            let replacement = match values.get(name) {
                Some(value) => format_value(name, value),
                None => match self.policy {
                    MissingValuePolicy::Empty => String::new(),
                    MissingValuePolicy::Fail => {
                        return Err(TemplateError::MissingValue(name.to_string()))
                    }
                },
            };

            out.push_str(&markup[last..token.start()]);
            out.push_str(&xml_escape(&replacement));
            last = token.end();
        }
        out.push_str(&markup[last..]);
        Ok(out)
    }

    /// Scan the package for placeholder names, in document order,
    /// deduplicated. Used when a template is registered.
    pub fn extract_placeholders(source: &Path) -> Result<Vec<String>, TemplateError> {
        let mut archive = ZipArchive::new(File::open(source)?)?;
        let mut seen = HashSet::new();
        let mut names = Vec::new();

        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            if entry.is_dir() || !entry.name().ends_with(".xml") {
                continue;
            }
            let name = entry.name().to_string();
            let mut markup = String::new();
            entry
                .read_to_string(&mut markup)
                .map_err(|e| TemplateError::Corrupt(format!("{name}: {e}")))?;

            for caps in PLACEHOLDER_RE.captures_iter(&markup) {
                let placeholder = caps[1].to_string();
                if seen.insert(placeholder.clone()) {
                    names.push(placeholder);
                }
            }
        }

        Ok(names)
    }
}

/// Format a value according to the type inferred from the placeholder name.
fn format_value(name: &str, value: &PlaceholderValue) -> String {
    let lower = name.to_lowercase();
    if lower.contains("date") || lower.contains("datum") || lower.ends_with("_at") {
        return format_date(value);
    }
    if ["amount", "sum", "total", "price"]
        .iter()
        .any(|k| lower.contains(k))
    {
        return format_amount(value);
    }
    format_plain(value)
}

fn format_plain(value: &PlaceholderValue) -> String {
    match value {
        PlaceholderValue::Text(s) => s.clone(),
        PlaceholderValue::Date(d) => d.format("%d.%m.%Y").to_string(),
        PlaceholderValue::Number(n) => {
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                n.to_string()
            }
        }
    }
}

fn format_date(value: &PlaceholderValue) -> String {
    match value {
        PlaceholderValue::Date(d) => d.format("%d.%m.%Y").to_string(),
        PlaceholderValue::Text(s) => match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            Ok(d) => d.format("%d.%m.%Y").to_string(),
            Err(_) => s.clone(),
        },
        PlaceholderValue::Number(_) => format_plain(value),
    }
}

fn format_amount(value: &PlaceholderValue) -> String {
    match value {
        PlaceholderValue::Number(n) => group_amount(*n),
        PlaceholderValue::Text(s) => match s.replace(',', ".").parse::<f64>() {
            Ok(n) => group_amount(n),
            Err(_) => s.clone(),
        },
        PlaceholderValue::Date(_) => format_plain(value),
    }
}

/// Render an amount with space-grouped thousands and two comma decimals,
/// e.g. `1234.5` → `1 234,50`.
fn group_amount(n: f64) -> String {
    let negative = n < 0.0;
    let cents = (n.abs() * 100.0).round() as u128;
    let whole = (cents / 100).to_string();
    let frac = cents % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(c);
    }

    format!("{}{grouped},{frac:02}", if negative { "-" } else { "" })
}

/// Escape characters that would break the surrounding markup.
fn xml_escape(text: &str) -> String {
    if !text.contains(['&', '<', '>']) {
        return text.to_string();
    }
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
