//! Placeholder rendering for user-supplied Dockerfile templates
//!
//! Templates use ERB-style output tags whose names are driver options:
//! - `<%= image %>`: the value of the `image` option
//! - `<%= @username %>`: same, with the instance-variable sigil
//!
//! Text outside tags is copied verbatim. Any other tag (`<% if .. %>`,
//! `<%# .. %>`), an unknown name or an unterminated tag is an error.

use crate::{ConfigError, Result};
use std::collections::BTreeMap;

const TAG_START: &str = "<%";
const OUTPUT_MARKER: char = '=';
const CLOSE_TAG: &str = "%>";

/// Render a template against a set of named bindings
pub fn render_template(input: &str, bindings: &BTreeMap<String, String>) -> Result<String> {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find(TAG_START) {
        result.push_str(&rest[..start]);
        let offset = input.len() - rest.len() + start;
        let after_start = &rest[start + TAG_START.len()..];

        let Some(after_open) = after_start.strip_prefix(OUTPUT_MARKER) else {
            return Err(ConfigError::Template(format!(
                "unsupported tag at offset {}: only <%= name %> output tags are allowed",
                offset
            )));
        };

        let end = after_open.find(CLOSE_TAG).ok_or_else(|| {
            ConfigError::Template(format!("unterminated tag at offset {}", offset))
        })?;

        let name = binding_name(&after_open[..end])?;
        let value = bindings
            .get(name)
            .ok_or_else(|| ConfigError::Template(format!("unknown binding '{}'", name)))?;
        result.push_str(value);

        rest = &after_open[end + CLOSE_TAG.len()..];
    }

    result.push_str(rest);
    Ok(result)
}

fn binding_name(expr: &str) -> Result<&str> {
    let name = expr.trim();
    let name = name.strip_prefix('@').unwrap_or(name);

    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ConfigError::Template(format!(
            "unsupported expression '{}'",
            expr.trim()
        )));
    }
    Ok(name)
}
