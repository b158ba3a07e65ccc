//! Markdown rendering of Prometheus API payloads.

use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::DateTime;
use serde_json::{Map, Value};

/// Matrix series longer than this are down-sampled.
const MAX_MATRIX_POINTS: usize = 20;

/// `%Y-%m-%d %H:%M:%S` in UTC for a Unix timestamp in (fractional) seconds.
pub fn fmt_ts(ts: f64) -> String {
    let secs = ts.trunc() as i64;
    let nanos = ((ts.fract()) * 1e9).round().clamp(0.0, 999_999_999.0) as u32;
    match DateTime::from_timestamp(secs, nanos) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => ts.to_string(),
    }
}

/// Six significant digits, trailing zeros dropped (printf `%.6g`).
pub fn fmt_g(v: f64) -> String {
    if v == 0.0 {
        return "0".to_string();
    }
    if !v.is_finite() {
        return v.to_string();
    }
    let exp = v.abs().log10().floor() as i32;
    if !(-4..6).contains(&exp) {
        let sci = format!("{:.5e}", v);
        let (mantissa, exponent) = sci.split_once('e').unwrap_or((&sci, "0"));
        let exponent: i32 = exponent.parse().unwrap_or(0);
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{}e{}{:02}", trim_zeros(mantissa), sign, exponent.abs());
    }
    let decimals = (5 - exp).max(0) as usize;
    trim_zeros(&format!("{:.*}", decimals, v)).to_string()
}

fn trim_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// `k=v, k2=v2` for every label not in `skip`.
pub fn label_pairs(labels: Option<&Value>, skip: &[&str]) -> String {
    let Some(Value::Object(map)) = labels else {
        return String::new();
    };
    map.iter()
        .filter(|(k, _)| !skip.contains(&k.as_str()))
        .map(|(k, v)| format!("{}={}", k, v.as_str().unwrap_or_default()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// PromQL-style `name{k="v"}` for a result's metric labels.
pub fn metric_selector(metric: &Map<String, Value>) -> String {
    let name = metric.get("__name__").and_then(|v| v.as_str()).unwrap_or_default();
    let labels: Vec<String> = metric
        .iter()
        .filter(|(k, _)| k.as_str() != "__name__")
        .map(|(k, v)| format!("{}=\"{}\"", k, v.as_str().unwrap_or_default()))
        .collect();
    if labels.is_empty() {
        if name.is_empty() { "{}".to_string() } else { name.to_string() }
    } else {
        format!("{}{{{}}}", name, labels.join(", "))
    }
}

/// A `[timestamp, "value"]` sample pair.
fn sample(pair: &Value) -> (f64, String) {
    let ts = pair.get(0).and_then(|t| t.as_f64()).unwrap_or(0.0);
    let value = match pair.get(1) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };
    (ts, value)
}

fn empty_map() -> &'static Map<String, Value> {
    static EMPTY: std::sync::OnceLock<Map<String, Value>> = std::sync::OnceLock::new();
    EMPTY.get_or_init(Map::new)
}

/// Render `/api/v1/query` or `/api/v1/query_range` data.
pub fn render_query_result(query: &str, data: &Value) -> String {
    let result_type = data["resultType"].as_str().unwrap_or("unknown");
    let mut out = String::from("# Query Results\n\n");
    let _ = writeln!(out, "Query: `{}`", query);
    let _ = writeln!(out, "Result Type: {}\n", result_type);

    let empty = Vec::new();
    let results = data["result"].as_array().unwrap_or(&empty);

    match result_type {
        "vector" => {
            out.push_str("| Metric | Value | Timestamp |\n");
            out.push_str("| ------ | ----- | --------- |\n");
            for r in results {
                let metric = r["metric"].as_object().unwrap_or_else(|| empty_map());
                let (ts, value) = sample(&r["value"]);
                let _ = writeln!(out, "| {} | {} | {} |", metric_selector(metric), value, fmt_ts(ts));
            }
        }
        "matrix" => {
            for r in results {
                let metric = r["metric"].as_object().unwrap_or_else(|| empty_map());
                let _ = writeln!(out, "## {}\n", metric_selector(metric));
                let values = r["values"].as_array().unwrap_or(&empty);
                let stride = if values.len() > MAX_MATRIX_POINTS {
                    out.push_str("Note: Results are sampled to avoid excessive output.\n\n");
                    values.len() / MAX_MATRIX_POINTS + 1
                } else {
                    1
                };
                out.push_str("| Timestamp | Value |\n");
                out.push_str("| --------- | ----- |\n");
                for pair in values.iter().step_by(stride) {
                    let (ts, value) = sample(pair);
                    let _ = writeln!(out, "| {} | {} |", fmt_ts(ts), value);
                }
                out.push('\n');
            }
        }
        "scalar" | "string" => {
            let (ts, value) = sample(&data["result"]);
            let kind = if result_type == "scalar" { "Scalar" } else { "String" };
            let _ = writeln!(out, "{} value: {} at {}", kind, value, fmt_ts(ts));
        }
        _ => {}
    }
    out
}

pub fn render_targets(targets: &[Value]) -> String {
    let mut out = String::from("# Prometheus Targets\n\n");
    out.push_str("| Target | State | Labels | Last Scrape |\n");
    out.push_str("| ------ | ----- | ------ | ----------- |\n");
    for t in targets {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} |",
            t["scrapeUrl"].as_str().unwrap_or_default(),
            t["health"].as_str().unwrap_or_default(),
            label_pairs(t.get("labels"), &[]),
            t["lastScrape"].as_str().unwrap_or_default(),
        );
    }
    out
}

pub fn render_alerts(alerts: &[Value]) -> String {
    let mut out = String::from("# Prometheus Alerts\n\n");
    if alerts.is_empty() {
        out.push_str("No active alerts.\n");
        return out;
    }
    out.push_str("| Alert | State | Labels | Annotations |\n");
    out.push_str("| ----- | ----- | ------ | ----------- |\n");
    for a in alerts {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} |",
            a["labels"]["alertname"].as_str().unwrap_or("Unknown"),
            a["state"].as_str().unwrap_or_default(),
            label_pairs(a.get("labels"), &[]),
            label_pairs(a.get("annotations"), &[]),
        );
    }
    out
}

pub fn render_rules(groups: &[Value]) -> String {
    let mut out = String::from("# Prometheus Rules\n\n");
    for group in groups {
        let _ = writeln!(out, "## Group: {}\n", group["name"].as_str().unwrap_or_default());
        let empty = Vec::new();
        for rule in group["rules"].as_array().unwrap_or(&empty) {
            let rule_type = rule["type"].as_str().unwrap_or("unknown");
            let _ = writeln!(
                out,
                "### {} Rule: {}\n",
                title_case(rule_type),
                rule["name"].as_str().unwrap_or_default()
            );
            let _ = writeln!(out, "Expression: `{}`\n", rule["query"].as_str().unwrap_or_default());
            if rule_type == "alerting" {
                for key in ["labels", "annotations"] {
                    if let Some(map) = rule[key].as_object() {
                        for (k, v) in map {
                            let _ = writeln!(out, "- {}: {}", k, v.as_str().unwrap_or_default());
                        }
                    }
                }
            }
            out.push('\n');
        }
    }
    out
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Series grouped by metric name with up to five label samples each.
pub fn render_series(pattern: &str, series: &[Value]) -> String {
    let mut out = format!("# Prometheus Metrics matching '{}'\n\n", pattern);
    if series.is_empty() {
        out.push_str("No metrics found matching this pattern.\n");
        return out;
    }
    let mut by_name: BTreeMap<&str, Vec<&Value>> = BTreeMap::new();
    for s in series {
        let name = s["__name__"].as_str().unwrap_or("unknown");
        by_name.entry(name).or_default().push(s);
    }
    for (name, instances) in by_name {
        let _ = writeln!(out, "## {}\n", name);
        out.push_str("Sample label combinations:\n\n");
        for instance in instances.iter().take(5) {
            let _ = writeln!(out, "- {}", label_pairs(Some(instance), &["__name__"]));
        }
        if instances.len() > 5 {
            let _ = writeln!(out, "- ... and {} more", instances.len() - 5);
        }
        out.push('\n');
    }
    out
}

fn health(t: &Value) -> String {
    t["health"].as_str().unwrap_or_default().to_ascii_lowercase()
}

/// Target health summary, optionally keeping only `up` or `down` targets.
pub fn render_targets_health(targets: &[Value], state: Option<&str>) -> String {
    let targets: Vec<&Value> = targets
        .iter()
        .filter(|t| state.is_none_or(|s| health(t) == s))
        .collect();

    let mut out = String::from("# Prometheus Targets Health\n\n");
    if targets.is_empty() {
        out.push_str("No matching targets found.\n");
        return out;
    }

    let up = targets.iter().filter(|t| health(t) == "up").count();
    let down = targets.iter().filter(|t| health(t) == "down").count();
    out.push_str("## Summary\n\n");
    let _ = writeln!(out, "- **Total Targets**: {}", targets.len());
    let _ = writeln!(out, "- **Healthy (Up)**: {}", up);
    let _ = writeln!(out, "- **Unhealthy (Down)**: {}", down);

    if down > 0 {
        out.push_str("\n## Unhealthy Targets\n\n");
        for t in targets.iter().filter(|t| health(t) == "down") {
            let _ = writeln!(out, "### {}\n", t["scrapeUrl"].as_str().unwrap_or_default());
            let _ = writeln!(out, "- **Labels**: {}", label_pairs(t.get("labels"), &[]));
            let _ = writeln!(out, "- **Last Scrape**: {}", t["lastScrape"].as_str().unwrap_or_default());
            if let Some(err) = t["lastError"].as_str().filter(|e| !e.is_empty()) {
                let _ = writeln!(out, "- **Error**: {}", err);
            }
            out.push('\n');
        }
    }

    out.push_str("\n## All Targets\n\n");
    out.push_str("| Target | State | Last Scrape | Scrape Interval |\n");
    out.push_str("| ------ | ----- | ----------- | --------------- |\n");
    for t in &targets {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} |",
            t["scrapeUrl"].as_str().unwrap_or_default(),
            t["health"].as_str().unwrap_or_default(),
            t["lastScrape"].as_str().unwrap_or_default(),
            t["scrapeInterval"].as_str().unwrap_or_default(),
        );
    }
    out
}

fn alert_state(a: &Value) -> String {
    a["state"].as_str().unwrap_or_default().to_ascii_lowercase()
}

/// Alerts grouped by `alertname`, with counts and active instances.
pub fn render_alert_summary(alerts: &[Value], state: Option<&str>) -> String {
    let alerts: Vec<&Value> = alerts
        .iter()
        .filter(|a| state.is_none_or(|s| alert_state(a) == s))
        .collect();

    let mut out = String::from("# Prometheus Alerts Summary\n\n");
    if alerts.is_empty() {
        out.push_str("No alerts matching the specified criteria.\n");
        return out;
    }

    let count = |want: &str| alerts.iter().filter(|a| alert_state(a) == want).count();
    out.push_str("## Summary\n\n");
    let _ = writeln!(out, "- **Total Alerts**: {}", alerts.len());
    let _ = writeln!(out, "- **Firing**: {}", count("firing"));
    let _ = writeln!(out, "- **Pending**: {}", count("pending"));
    let _ = writeln!(out, "- **Inactive**: {}\n", count("inactive"));

    let mut by_name: BTreeMap<&str, Vec<&Value>> = BTreeMap::new();
    for a in &alerts {
        let name = a["labels"]["alertname"].as_str().unwrap_or("Unknown");
        by_name.entry(name).or_default().push(a);
    }

    for (name, group) in by_name {
        let firing = group.iter().filter(|a| alert_state(a) == "firing").count();
        let pending = group.iter().filter(|a| alert_state(a) == "pending").count();
        let _ = writeln!(out, "## {}\n", name);
        let _ = writeln!(out, "- **Instances**: {}", group.len());
        let _ = writeln!(out, "- **Firing**: {}", firing);
        let _ = writeln!(out, "- **Pending**: {}\n", pending);

        if let Some(annotations) = group[0]["annotations"].as_object() {
            if !annotations.is_empty() {
                out.push_str("### Description\n\n");
                for key in ["summary", "description"] {
                    if let Some(text) = annotations.get(key).and_then(|v| v.as_str()) {
                        let _ = writeln!(out, "{}\n", text);
                    }
                }
            }
        }

        if firing + pending > 0 {
            out.push_str("### Active Instances\n\n");
            out.push_str("| State | Labels | Active Since |\n");
            out.push_str("| ----- | ------ | ------------ |\n");
            for a in group.iter().filter(|a| matches!(alert_state(a).as_str(), "firing" | "pending")) {
                let _ = writeln!(
                    out,
                    "| {} | {} | {} |",
                    a["state"].as_str().unwrap_or_default(),
                    label_pairs(a.get("labels"), &["alertname"]),
                    a["activeAt"].as_str().unwrap_or("Unknown"),
                );
            }
            out.push('\n');
        }
    }
    out
}
