//! Synthetic monitor payloads for the Synthetics v3 API.

use serde_json::{json, Map, Value};

use crate::args;
use crate::error::{AdapterError, Result};

const MONITOR_TYPES: [&str; 4] = ["SIMPLE", "BROWSER", "SCRIPT_API", "SCRIPT_BROWSER"];
const FREQUENCIES: [u64; 9] = [1, 5, 10, 15, 30, 60, 360, 720, 1440];
const STATUSES: [&str; 3] = ["ENABLED", "DISABLED", "MUTED"];

fn choice<'a>(name: &str, value: &'a str, allowed: &[&str]) -> Result<&'a str> {
    if allowed.contains(&value) {
        Ok(value)
    } else {
        Err(AdapterError::invalid(format!(
            "Invalid {} '{}': must be one of {}",
            name,
            value,
            allowed.join(", ")
        )))
    }
}

fn frequency(value: u64) -> Result<u64> {
    if FREQUENCIES.contains(&value) {
        return Ok(value);
    }
    let allowed: Vec<String> = FREQUENCIES.iter().map(u64::to_string).collect();
    Err(AdapterError::invalid(format!(
        "Invalid frequency '{}': must be one of {} minutes",
        value,
        allowed.join(", ")
    )))
}

fn locations(args: &Value) -> Option<Result<Vec<String>>> {
    let list = args::string_list(args, "locations")?;
    if list.is_empty() {
        return Some(Err(AdapterError::invalid("locations must name at least one location")));
    }
    Some(Ok(list))
}

/// Unwrap `{"monitor": {...}}` replies; some endpoints return the monitor bare.
pub fn monitor(body: &Value) -> &Value {
    match body.get("monitor") {
        Some(inner) if inner.is_object() => inner,
        _ => body,
    }
}

pub fn create_body(args: &Value) -> Result<Value> {
    let kind = choice("type", args::str(args, "type")?, &MONITOR_TYPES)?;
    let every = args::opt_u64(args, "frequency")
        .ok_or_else(|| AdapterError::invalid("Missing required argument: frequency"))?;
    let status = args::str_or(args, "status", "ENABLED").to_ascii_uppercase();
    choice("status", &status, &STATUSES)?;
    let locations = locations(args)
        .ok_or_else(|| AdapterError::invalid("Missing required argument: locations"))??;

    let mut body = Map::new();
    body.insert("name".into(), json!(args::str(args, "name")?));
    body.insert("type".into(), json!(kind));
    body.insert("frequency".into(), json!(frequency(every)?));
    match args::opt_str(args, "uri") {
        Some(uri) => {
            body.insert("uri".into(), json!(uri));
        }
        None if matches!(kind, "SIMPLE" | "BROWSER") => {
            return Err(AdapterError::invalid(format!("{} monitors need a uri", kind)));
        }
        None => {}
    }
    body.insert("locations".into(), json!(locations));
    body.insert("status".into(), json!(status));
    if let Some(sla) = args::opt_f64(args, "sla_threshold") {
        body.insert("slaThreshold".into(), json!(sla));
    }
    Ok(Value::Object(body))
}

/// Changed fields plus whatever the API insists on seeing again: the script
/// of scripted monitors, the uri of simple and browser ones.
pub fn update_body(args: &Value, current: &Value) -> Result<Value> {
    let mut body = Map::new();
    if let Some(name) = args::opt_str(args, "name") {
        body.insert("name".into(), json!(name));
    }
    if let Some(every) = args::opt_u64(args, "frequency") {
        body.insert("frequency".into(), json!(frequency(every)?));
    }
    if let Some(status) = args::opt_str(args, "status") {
        let status = status.to_ascii_uppercase();
        choice("status", &status, &STATUSES)?;
        body.insert("status".into(), json!(status));
    }
    if let Some(sla) = args::opt_f64(args, "sla_threshold") {
        body.insert("slaThreshold".into(), json!(sla));
    }
    if let Some(list) = locations(args) {
        body.insert("locations".into(), json!(list?));
    }
    if body.is_empty() {
        return Err(AdapterError::invalid(
            "Nothing to update: provide name, frequency, status, sla_threshold or locations",
        ));
    }

    let current = monitor(current);
    match current["type"].as_str() {
        Some("SCRIPT_API" | "SCRIPT_BROWSER") => {
            body.insert("script".into(), json!(current["script"].as_str().unwrap_or_default()));
        }
        Some("SIMPLE" | "BROWSER") => {
            body.insert("uri".into(), json!(current["uri"].as_str().unwrap_or_default()));
        }
        _ => {}
    }
    Ok(Value::Object(body))
}
