//! Tool argument extraction.
//!
//! MCP hosts send arguments as a loose JSON object. Numbers sometimes arrive
//! as strings and lists as comma-separated text, so the helpers accept both.

use serde_json::{Map, Value};

use crate::error::{AdapterError, Result};

fn missing(name: &str) -> AdapterError {
    AdapterError::invalid(format!("Missing required argument: {}", name))
}

/// Required non-empty string.
pub fn str<'a>(args: &'a Value, name: &str) -> Result<&'a str> {
    match args.get(name).and_then(|v| v.as_str()) {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(missing(name)),
    }
}

/// Required string that may be empty, such as file content.
pub fn text<'a>(args: &'a Value, name: &str) -> Result<&'a str> {
    args.get(name).and_then(|v| v.as_str()).ok_or_else(|| missing(name))
}

/// Optional string; empty strings count as absent.
pub fn opt_str<'a>(args: &'a Value, name: &str) -> Option<&'a str> {
    args.get(name)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
}

pub fn str_or<'a>(args: &'a Value, name: &str, default: &'a str) -> &'a str {
    opt_str(args, name).unwrap_or(default)
}

/// Required identifier that may arrive as a string or a number.
pub fn id(args: &Value, name: &str) -> Result<String> {
    match args.get(name) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(missing(name)),
    }
}

pub fn opt_id(args: &Value, name: &str) -> Option<String> {
    id(args, name).ok()
}

pub fn opt_u64(args: &Value, name: &str) -> Option<u64> {
    match args.get(name)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn u64_or(args: &Value, name: &str, default: u64) -> u64 {
    opt_u64(args, name).unwrap_or(default)
}

pub fn opt_i64(args: &Value, name: &str) -> Option<i64> {
    match args.get(name)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn opt_f64(args: &Value, name: &str) -> Option<f64> {
    match args.get(name)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn f64_req(args: &Value, name: &str) -> Result<f64> {
    opt_f64(args, name).ok_or_else(|| missing(name))
}

pub fn opt_bool(args: &Value, name: &str) -> Option<bool> {
    match args.get(name)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

pub fn bool_or(args: &Value, name: &str, default: bool) -> bool {
    opt_bool(args, name).unwrap_or(default)
}

/// List of strings from a JSON array, a JSON-encoded array, or `a,b,c`.
pub fn string_list(args: &Value, name: &str) -> Option<Vec<String>> {
    let items = match args.get(name)? {
        Value::Array(items) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Value::String(s) if s.trim_start().starts_with('[') => {
            serde_json::from_str::<Vec<String>>(s).ok()?
        }
        Value::String(s) => s
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect(),
        _ => return None,
    };
    Some(items)
}

/// Any JSON value, decoding it first if it arrived as a JSON string.
pub fn opt_json(args: &Value, name: &str) -> Result<Option<Value>> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => serde_json::from_str(s)
            .map(Some)
            .map_err(|e| AdapterError::invalid(format!("Invalid JSON in '{}': {}", name, e))),
        Some(other) => Ok(Some(other.clone())),
    }
}

pub fn json(args: &Value, name: &str) -> Result<Value> {
    opt_json(args, name)?.ok_or_else(|| missing(name))
}

/// Required JSON object (or a string holding one).
pub fn object(args: &Value, name: &str) -> Result<Map<String, Value>> {
    match json(args, name)? {
        Value::Object(map) => Ok(map),
        _ => Err(AdapterError::invalid(format!("Argument '{}' must be a JSON object", name))),
    }
}

pub fn opt_object(args: &Value, name: &str) -> Result<Option<Map<String, Value>>> {
    match opt_json(args, name)? {
        None => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(AdapterError::invalid(format!("Argument '{}' must be a JSON object", name))),
    }
}

/// Required JSON array (or a string holding one).
pub fn array(args: &Value, name: &str) -> Result<Vec<Value>> {
    match json(args, name)? {
        Value::Array(items) => Ok(items),
        _ => Err(AdapterError::invalid(format!("Argument '{}' must be a JSON array", name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn required_string_reports_missing_name() {
        let args = json!({ "path": "" });
        let err = str(&args, "path").unwrap_err();
        assert_eq!(err.to_string(), "Missing required argument: path");
        assert!(str(&args, "other").is_err());
        assert_eq!(text(&args, "path").unwrap(), "");
        assert_eq!(text(&args, "other").unwrap_err().to_string(), "Missing required argument: other");
    }

    #[test]
    fn numbers_accept_strings() {
        let args = json!({ "limit": "25", "page": 3, "ratio": "0.5" });
        assert_eq!(u64_or(&args, "limit", 10), 25);
        assert_eq!(u64_or(&args, "page", 1), 3);
        assert_eq!(u64_or(&args, "missing", 7), 7);
        assert_eq!(opt_f64(&args, "ratio"), Some(0.5));
    }

    #[test]
    fn ids_accept_numbers() {
        let args = json!({ "app_id": 1234, "uid": "abc" });
        assert_eq!(id(&args, "app_id").unwrap(), "1234");
        assert_eq!(id(&args, "uid").unwrap(), "abc");
    }

    #[test]
    fn string_lists_from_every_shape() {
        let args = json!({
            "a": ["x", "y"],
            "b": "x, y ,z",
            "c": "[\"n1\",\"n2\"]"
        });
        assert_eq!(string_list(&args, "a").unwrap(), vec!["x", "y"]);
        assert_eq!(string_list(&args, "b").unwrap(), vec!["x", "y", "z"]);
        assert_eq!(string_list(&args, "c").unwrap(), vec!["n1", "n2"]);
        assert!(string_list(&args, "d").is_none());
    }

    #[test]
    fn json_strings_are_decoded() {
        let args = json!({ "settings": "{\"refresh_interval\":\"1s\"}", "bad": "{nope" });
        let settings = object(&args, "settings").unwrap();
        assert_eq!(settings["refresh_interval"], "1s");
        let err = object(&args, "bad").unwrap_err();
        assert!(err.to_string().starts_with("Invalid JSON in 'bad'"));
    }

    #[test]
    fn bools_accept_strings() {
        let args = json!({ "force": "true", "all": false });
        assert!(bool_or(&args, "force", false));
        assert!(!bool_or(&args, "all", true));
        assert!(bool_or(&args, "missing", true));
    }
}
