//! Value sources: `key=value` pairs and structured values files.
//!
//! Everything here produces a plain nested mapping; [`crate::core::values`]
//! never sees a file format.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use serde_json::{Map, Value};

/// Nest flat `a.b=c` pairs into a mapping. Values stay strings.
///
/// A later pair overrides an earlier one for the same key.
pub fn parse_value_pairs<S: AsRef<str>>(pairs: &[S]) -> Result<Map<String, Value>> {
    let mut root = Map::new();
    for pair in pairs {
        let pair = pair.as_ref();
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("expected key=value, got '{pair}'"))?;
        let key = key.trim();
        if key.is_empty() || key.split('.').any(str::is_empty) {
            bail!("invalid key in '{pair}'");
        }
        insert_dotted(&mut root, key, Value::String(value.to_string()))
            .with_context(|| format!("apply '{pair}'"))?;
    }
    Ok(root)
}

fn insert_dotted(root: &mut Map<String, Value>, key: &str, value: Value) -> Result<()> {
    let mut segments: Vec<&str> = key.split('.').collect();
    let last = segments
        .pop()
        .ok_or_else(|| anyhow!("empty key"))?;
    let mut current = root;
    for segment in segments {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        current = match entry {
            Value::Object(map) => map,
            _ => bail!("'{segment}' already holds a non-mapping value"),
        };
    }
    current.insert(last.to_string(), value);
    Ok(())
}

/// Read a YAML, JSON or TOML file (by extension) whose root is a mapping.
pub fn load_values_file(path: &Path) -> Result<Map<String, Value>> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read values {}", path.display()))?;
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    let value: Value = match extension.as_deref() {
        Some("yaml" | "yml") => serde_yaml::from_str(&contents)
            .with_context(|| format!("parse yaml {}", path.display()))?,
        Some("json") => serde_json::from_str(&contents)
            .with_context(|| format!("parse json {}", path.display()))?,
        Some("toml") => toml::from_str(&contents)
            .with_context(|| format!("parse toml {}", path.display()))?,
        _ => bail!(
            "unsupported values file {} (expected .yaml, .yml, .json or .toml)",
            path.display()
        ),
    };
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => bail!(
            "values file {} must contain a mapping, found {}",
            path.display(),
            kind_name(&other)
        ),
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

/// Deep-merge `overlay` into `base`; overlay wins on conflicts.
pub fn merge_values(base: &mut Map<String, Value>, overlay: Map<String, Value>) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_values(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
