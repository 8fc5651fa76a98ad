//! Read-only store of invocation values with dotted-key lookup.
//!
//! Values arrive as a nested JSON-like mapping (see `io::values_file`). A key
//! such as `docker.tag` descends one mapping per segment.

use serde_json::{Map, Value};

use crate::core::errors::{CoercionError, ValueError};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Values {
    root: Map<String, Value>,
}

impl Values {
    pub fn new(root: Map<String, Value>) -> Self {
        Self { root }
    }

    /// Resolve a dotted key to its raw value.
    pub fn get(&self, key: &str) -> Result<&Value, ValueError> {
        let mut segments = key.split('.');
        // `split` always yields at least one segment.
        let first = segments.next().unwrap_or_default();
        let mut current = self.root.get(first).ok_or_else(|| ValueError::KeyNotFound {
            key: key.to_string(),
            segment: first.to_string(),
        })?;
        let mut parent = first;
        for segment in segments {
            let map = current
                .as_object()
                .ok_or_else(|| ValueError::TypeMismatch {
                    key: key.to_string(),
                    segment: parent.to_string(),
                })?;
            current = map.get(segment).ok_or_else(|| ValueError::KeyNotFound {
                key: key.to_string(),
                segment: segment.to_string(),
            })?;
            parent = segment;
        }
        Ok(current)
    }

    /// Resolve a dotted key and apply `coerce` to the raw value.
    pub fn get_as<T, F>(&self, key: &str, coerce: F) -> Result<T, ValueError>
    where
        F: FnOnce(&Value) -> Result<T, CoercionError>,
    {
        let raw = self.get(key)?;
        coerce(raw).map_err(|source| ValueError::Coercion {
            key: key.to_string(),
            source,
        })
    }
}

impl From<Map<String, Value>> for Values {
    fn from(root: Map<String, Value>) -> Self {
        Self::new(root)
    }
}

/// Coerce to `bool`: booleans, `0`/`1`, and `true/false/yes/no/on/off/1/0` strings.
pub fn as_bool(value: &Value) -> Result<bool, CoercionError> {
    match value {
        Value::Bool(b) => return Ok(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => return Ok(false),
            Some(1) => return Ok(true),
            _ => {}
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => return Ok(true),
            "false" | "0" | "no" | "off" => return Ok(false),
            _ => {}
        },
        _ => {}
    }
    Err(mismatch("a boolean", value))
}

/// Coerce to `i64`: integers, integral floats and numeric strings.
pub fn as_int(value: &Value) -> Result<i64, CoercionError> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(i);
            }
            if let Some(f) = n.as_f64()
                && f.fract() == 0.0
                && f >= i64::MIN as f64
                && f <= i64::MAX as f64
            {
                return Ok(f as i64);
            }
        }
        Value::String(s) => {
            if let Ok(i) = s.trim().parse::<i64>() {
                return Ok(i);
            }
        }
        _ => {}
    }
    Err(mismatch("an integer", value))
}

/// Coerce to `f64`: any number or numeric string.
pub fn as_float(value: &Value) -> Result<f64, CoercionError> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| mismatch("a float", value)),
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| mismatch("a float", value)),
        _ => Err(mismatch("a float", value)),
    }
}

/// Coerce to `String`. Strings are returned as-is, other values as JSON text; null fails.
pub fn as_str(value: &Value) -> Result<String, CoercionError> {
    match value {
        Value::Null => Err(mismatch("a string", value)),
        Value::String(s) => Ok(s.clone()),
        other => Ok(other.to_string()),
    }
}

fn mismatch(expected: &'static str, value: &Value) -> CoercionError {
    CoercionError {
        expected,
        found: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn values(value: Value) -> Values {
        match value {
            Value::Object(map) => Values::new(map),
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn get_descends_nested_mappings() {
        let store = values(json!({"docker": {"tag": "release"}}));
        assert_eq!(store.get("docker.tag").expect("get"), &json!("release"));
    }

    #[test]
    fn get_missing_segment_is_key_not_found() {
        let store = values(json!({"docker": {"tag": "release"}}));
        let err = store.get("docker.missing").expect_err("missing");
        assert_eq!(
            err,
            ValueError::KeyNotFound {
                key: "docker.missing".to_string(),
                segment: "missing".to_string(),
            }
        );
        assert!(store.get("nope").expect_err("missing").is_not_found());
    }

    #[test]
    fn get_through_scalar_is_type_mismatch() {
        let store = values(json!({"docker": {"tag": "release"}}));
        let err = store.get("docker.tag.major").expect_err("mismatch");
        assert_eq!(
            err,
            ValueError::TypeMismatch {
                key: "docker.tag.major".to_string(),
                segment: "tag".to_string(),
            }
        );
    }

    #[test]
    fn get_as_bool_parses_strings() {
        let store = values(json!({"dry_run": "true", "verbose": "Off", "flag": 1}));
        assert!(store.get_as("dry_run", as_bool).expect("dry_run"));
        assert!(!store.get_as("verbose", as_bool).expect("verbose"));
        assert!(store.get_as("flag", as_bool).expect("flag"));
    }

    #[test]
    fn get_as_reports_coercion_error_with_key() {
        let store = values(json!({"dry_run": "maybe", "count": 2}));
        let err = store.get_as("dry_run", as_bool).expect_err("coercion");
        assert_eq!(err.key(), "dry_run");
        assert!(matches!(err, ValueError::Coercion { .. }));
        assert!(store.get_as("count", as_bool).is_err());
    }

    #[test]
    fn as_int_accepts_integral_values_only() {
        assert_eq!(as_int(&json!(7)).expect("int"), 7);
        assert_eq!(as_int(&json!(3.0)).expect("float"), 3);
        assert_eq!(as_int(&json!(" 42 ")).expect("string"), 42);
        assert!(as_int(&json!(3.5)).is_err());
        assert!(as_int(&json!("four")).is_err());
    }

    #[test]
    fn as_float_and_as_str() {
        assert_eq!(as_float(&json!("1.5")).expect("float"), 1.5);
        assert_eq!(as_float(&json!(2)).expect("int"), 2.0);
        assert_eq!(as_str(&json!("x")).expect("str"), "x");
        assert_eq!(as_str(&json!(12)).expect("num"), "12");
        assert!(as_str(&Value::Null).is_err());
    }
}
