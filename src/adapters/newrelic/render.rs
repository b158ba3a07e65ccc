//! Markdown views behind the `nr://` resources.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Scalar as text; missing values print as `N/A`.
fn field(v: &Value) -> String {
    match v {
        Value::Null => "N/A".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn yes_no(v: &Value) -> &'static str {
    if v.as_bool().unwrap_or(false) { "Yes" } else { "No" }
}

fn enabled(v: &Value) -> &'static str {
    if v.as_bool().unwrap_or(false) { "Enabled" } else { "Disabled" }
}

/// Policy timestamps arrive in epoch milliseconds; older accounts report seconds.
fn epoch(v: &Value) -> String {
    let Some(raw) = v.as_i64() else {
        return "N/A".to_string();
    };
    let dt = if raw > 100_000_000_000 {
        DateTime::<Utc>::from_timestamp_millis(raw)
    } else {
        DateTime::<Utc>::from_timestamp(raw, 0)
    };
    dt.map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| raw.to_string())
}

pub fn applications(apps: &[Value]) -> String {
    let mut out = String::from("# New Relic Applications\n\n");
    for app in apps {
        out.push_str(&format!("## {}\n", field(&app["name"])));
        out.push_str(&format!("- ID: {}\n", field(&app["id"])));
        out.push_str(&format!("- Language: {}\n", field(&app["language"])));
        out.push_str(&format!("- Health: {}\n", field(&app["health_status"])));
        out.push_str(&format!("- Reporting: {}\n", yes_no(&app["reporting"])));
        let summary = &app["application_summary"];
        if summary.is_object() {
            out.push_str("- Summary:\n");
            out.push_str(&format!("  - Apdex: {}\n", field(&summary["apdex_score"])));
            out.push_str(&format!("  - Response Time: {}ms\n", field(&summary["response_time"])));
            out.push_str(&format!("  - Throughput: {} rpm\n", field(&summary["throughput"])));
            out.push_str(&format!("  - Error Rate: {}%\n", field(&summary["error_rate"])));
        }
        out.push('\n');
    }
    out
}

pub fn alert_policies(policies: &[Value]) -> String {
    let mut out = String::from("# New Relic Alert Policies\n\n");
    for policy in policies {
        out.push_str(&format!("## {}\n", field(&policy["name"])));
        out.push_str(&format!("- ID: {}\n", field(&policy["id"])));
        out.push_str(&format!("- Incident Preference: {}\n", field(&policy["incident_preference"])));
        out.push_str(&format!("- Created: {}\n", epoch(&policy["created_at"])));
        out.push_str(&format!("- Updated: {}\n\n", epoch(&policy["updated_at"])));
    }
    out
}

pub fn application(app: &Value) -> String {
    let mut out = format!("# New Relic Application: {}\n\n", field(&app["name"]));
    out.push_str(&format!("- ID: {}\n", field(&app["id"])));
    out.push_str(&format!("- Language: {}\n", field(&app["language"])));
    out.push_str(&format!("- Health: {}\n", field(&app["health_status"])));
    out.push_str(&format!("- Last Reported: {}\n", field(&app["last_reported_at"])));
    out.push_str(&format!("- Reporting: {}\n\n", yes_no(&app["reporting"])));

    let summary = &app["application_summary"];
    if summary.is_object() {
        out.push_str("## Application Summary\n");
        out.push_str(&format!("- Apdex Score: {}\n", field(&summary["apdex_score"])));
        out.push_str(&format!("- Apdex Target: {}s\n", field(&summary["apdex_target"])));
        out.push_str(&format!("- Response Time: {}ms\n", field(&summary["response_time"])));
        out.push_str(&format!("- Throughput: {} rpm\n", field(&summary["throughput"])));
        out.push_str(&format!("- Error Rate: {}%\n", field(&summary["error_rate"])));
        out.push_str(&format!("- Instance Count: {}\n", field(&summary["instance_count"])));
        out.push_str(&format!("- Host Count: {}\n\n", field(&summary["host_count"])));
    }

    let end_user = &app["end_user_summary"];
    if end_user.is_object() {
        out.push_str("## End User Summary\n");
        out.push_str(&format!("- Apdex Score: {}\n", field(&end_user["apdex_score"])));
        out.push_str(&format!("- Apdex Target: {}s\n", field(&end_user["apdex_target"])));
        out.push_str(&format!("- Response Time: {}ms\n", field(&end_user["response_time"])));
        out.push_str(&format!("- Throughput: {} rpm\n\n", field(&end_user["throughput"])));
    }

    let settings = &app["settings"];
    if settings.is_object() {
        out.push_str("## Settings\n");
        out.push_str(&format!("- App Apdex Threshold: {}s\n", field(&settings["app_apdex_threshold"])));
        out.push_str(&format!(
            "- End User Apdex Threshold: {}s\n",
            field(&settings["end_user_apdex_threshold"])
        ));
        out.push_str(&format!(
            "- Real User Monitoring: {}\n",
            enabled(&settings["enable_real_user_monitoring"])
        ));
        out.push_str(&format!(
            "- Server-Side Config: {}\n\n",
            enabled(&settings["use_server_side_config"])
        ));
    }
    out
}

/// NerdGraph timestamps are RFC 3339.
fn iso(v: &Value) -> String {
    match v.as_str().map(DateTime::parse_from_rfc3339) {
        Some(Ok(dt)) => dt.with_timezone(&Utc).format("%Y-%m-%d %H:%M:%S").to_string(),
        _ => field(v),
    }
}

/// Objective targets come as ratios.
fn percent(ratio: &Value) -> String {
    match ratio.as_f64() {
        Some(r) => format!("{}", (r * 100.0 * 10_000.0).round() / 10_000.0),
        None => "N/A".to_string(),
    }
}

fn status(item: &Value) -> &'static str {
    if item["closed_at"].is_i64() { "Closed" } else { "Open" }
}

fn opened_closed(out: &mut String, item: &Value) {
    out.push_str(&format!("- Opened: {}\n", epoch(&item["opened_at"])));
    if item["closed_at"].is_i64() {
        out.push_str(&format!("- Closed: {}\n", epoch(&item["closed_at"])));
    }
}

fn open_prefix(only_open: bool) -> &'static str {
    if only_open { "Open " } else { "" }
}

pub fn mobile_applications(apps: &[Value]) -> String {
    let mut out = String::from("# New Relic Mobile Applications\n\n");
    for app in apps {
        out.push_str(&format!("## {}\n", field(&app["name"])));
        out.push_str(&format!("- ID: {}\n", field(&app["id"])));
        out.push_str(&format!("- Health: {}\n", field(&app["health_status"])));
        out.push_str(&format!("- Reporting: {}\n", yes_no(&app["reporting"])));
        let summary = &app["mobile_summary"];
        if summary.is_object() {
            out.push_str("- Summary:\n");
            out.push_str(&format!("  - Active Users: {}\n", field(&summary["active_users"])));
            out.push_str(&format!("  - Launch Count: {}\n", field(&summary["launch_count"])));
            out.push_str(&format!("  - Response Time: {}ms\n", field(&summary["response_time"])));
            out.push_str(&format!("  - Throughput: {} rpm\n", field(&summary["throughput"])));
            out.push_str(&format!("  - Error Rate: {}%\n", field(&summary["remote_error_rate"])));
        }
        let crash = &app["crash_summary"];
        if crash.is_object() {
            out.push_str("- Crash Summary:\n");
            out.push_str(&format!("  - Crash Count: {}\n", field(&crash["crash_count"])));
            out.push_str(&format!("  - Crash Rate: {}%\n", field(&crash["crash_rate"])));
            out.push_str(&format!("  - Unresolved Crashes: {}\n", field(&crash["unresolved_crash_count"])));
        }
        out.push('\n');
    }
    out
}

pub fn mobile_application(app: &Value) -> String {
    let mut out = format!("# New Relic Mobile Application: {}\n\n", field(&app["name"]));
    out.push_str(&format!("- ID: {}\n", field(&app["id"])));
    out.push_str(&format!("- Health: {}\n", field(&app["health_status"])));
    out.push_str(&format!("- Reporting: {}\n\n", yes_no(&app["reporting"])));

    let summary = &app["mobile_summary"];
    if summary.is_object() {
        out.push_str("## Mobile Summary\n");
        out.push_str(&format!("- Active Users: {}\n", field(&summary["active_users"])));
        out.push_str(&format!("- Launch Count: {}\n", field(&summary["launch_count"])));
        out.push_str(&format!("- Response Time: {}ms\n", field(&summary["response_time"])));
        out.push_str(&format!("- Throughput: {} rpm\n", field(&summary["throughput"])));
        out.push_str(&format!("- Remote Error Rate: {}%\n", field(&summary["remote_error_rate"])));
        out.push_str(&format!("- Calls Per Session: {}\n", field(&summary["calls_per_session"])));
        out.push_str(&format!("- Interaction Time: {}ms\n", field(&summary["interaction_time"])));
        out.push_str(&format!("- Failed Call Rate: {}%\n\n", field(&summary["failed_call_rate"])));
    }

    let crash = &app["crash_summary"];
    if crash.is_object() {
        out.push_str("## Crash Summary\n");
        out.push_str(&format!("- Crash Count: {}\n", field(&crash["crash_count"])));
        out.push_str(&format!("- Crash Rate: {}%\n", field(&crash["crash_rate"])));
        out.push_str(&format!("- Unresolved Crashes: {}\n", field(&crash["unresolved_crash_count"])));
        out.push_str(&format!("- Supports Crash Data: {}\n\n", yes_no(&crash["supports_crash_data"])));
    }
    out
}

fn key_transaction_head(out: &mut String, txn: &Value) {
    out.push_str(&format!("- ID: {}\n", field(&txn["id"])));
    out.push_str(&format!("- Transaction Name: {}\n", field(&txn["transaction_name"])));
    out.push_str(&format!("- Health: {}\n", field(&txn["health_status"])));
    out.push_str(&format!("- Last Reported: {}\n", field(&txn["last_reported_at"])));
    out.push_str(&format!("- Reporting: {}\n", yes_no(&txn["reporting"])));
    out.push_str(&format!("- Application ID: {}\n", field(&txn["links"]["application"])));
}

pub fn key_transactions(txns: &[Value]) -> String {
    let mut out = String::from("# New Relic Key Transactions\n\n");
    for txn in txns {
        out.push_str(&format!("## {}\n", field(&txn["name"])));
        key_transaction_head(&mut out, txn);
        let summary = &txn["application_summary"];
        if summary.is_object() {
            out.push_str("- Summary:\n");
            out.push_str(&format!("  - Apdex: {}\n", field(&summary["apdex_score"])));
            out.push_str(&format!("  - Response Time: {}ms\n", field(&summary["response_time"])));
            out.push_str(&format!("  - Throughput: {} rpm\n", field(&summary["throughput"])));
            out.push_str(&format!("  - Error Rate: {}%\n", field(&summary["error_rate"])));
        }
        out.push('\n');
    }
    out
}

pub fn key_transaction(txn: &Value) -> String {
    let mut out = format!("# New Relic Key Transaction: {}\n\n", field(&txn["name"]));
    key_transaction_head(&mut out, txn);
    out.push('\n');

    let summary = &txn["application_summary"];
    if summary.is_object() {
        out.push_str("## Application Summary\n");
        out.push_str(&format!("- Apdex Score: {}\n", field(&summary["apdex_score"])));
        out.push_str(&format!("- Apdex Target: {}s\n", field(&summary["apdex_target"])));
        out.push_str(&format!("- Response Time: {}ms\n", field(&summary["response_time"])));
        out.push_str(&format!("- Throughput: {} rpm\n", field(&summary["throughput"])));
        out.push_str(&format!("- Error Rate: {}%\n", field(&summary["error_rate"])));
        out.push_str(&format!("- Instance Count: {}\n", field(&summary["instance_count"])));
        out.push_str(&format!("- Host Count: {}\n\n", field(&summary["host_count"])));
    }

    let end_user = &txn["end_user_summary"];
    if end_user.is_object() {
        out.push_str("## End User Summary\n");
        out.push_str(&format!("- Apdex Score: {}\n", field(&end_user["apdex_score"])));
        out.push_str(&format!("- Apdex Target: {}s\n", field(&end_user["apdex_target"])));
        out.push_str(&format!("- Response Time: {}ms\n", field(&end_user["response_time"])));
        out.push_str(&format!("- Throughput: {} rpm\n\n", field(&end_user["throughput"])));
    }
    out
}

pub fn incidents(incidents: &[Value], only_open: bool) -> String {
    let mut out = format!("# New Relic {}Alert Incidents\n\n", open_prefix(only_open));
    for incident in incidents {
        out.push_str(&format!("## Incident {}\n", field(&incident["id"])));
        out.push_str(&format!("- Status: {}\n", status(incident)));
        opened_closed(&mut out, incident);
        out.push_str(&format!("- Policy ID: {}\n", field(&incident["links"]["policy_id"])));
        if let Some(violations) = incident["links"]["violations"].as_array().filter(|v| !v.is_empty()) {
            out.push_str("- Violations:\n");
            for violation in violations {
                out.push_str(&format!("  - {}\n", field(violation)));
            }
        }
        out.push('\n');
    }
    out
}

pub fn violations(violations: &[Value], only_open: bool, start: &str, end: &str) -> String {
    let mut out = format!("# New Relic {}Alert Violations\n\n", open_prefix(only_open));
    out.push_str(&format!("Time range: {} to {}\n\n", start, end));
    for violation in violations {
        let entity = &violation["entity"];
        let links = &violation["links"];
        out.push_str(&format!(
            "## {} - {}\n",
            field(&violation["condition_name"]),
            field(&entity["name"])
        ));
        out.push_str(&format!("- ID: {}\n", field(&violation["id"])));
        out.push_str(&format!("- Status: {}\n", status(violation)));
        out.push_str(&format!("- Priority: {}\n", field(&violation["priority"])));
        opened_closed(&mut out, violation);
        out.push_str(&format!("- Duration: {} minutes\n", field(&violation["duration"])));
        out.push_str(&format!(
            "- Policy: {} (ID: {})\n",
            field(&violation["policy_name"]),
            field(&links["policy_id"])
        ));
        out.push_str(&format!("- Condition ID: {}\n", field(&links["condition_id"])));
        out.push_str(&format!("- Incident ID: {}\n", field(&links["incident_id"])));
        out.push_str("- Entity:\n");
        out.push_str(&format!("  - Name: {}\n", field(&entity["name"])));
        out.push_str(&format!("  - Type: {}\n", field(&entity["type"])));
        out.push_str(&format!("  - Product: {}\n", field(&entity["product"])));
        out.push_str(&format!("  - ID: {}\n", field(&entity["id"])));
        out.push_str(&format!("  - Group ID: {}\n\n", field(&entity["group_id"])));
    }
    out
}

/// Account overview: busiest applications, mobile crash rates and open incidents.
pub fn overview(apps: &[Value], mobile: &[Value], policies: &[Value], open_incidents: &[Value]) -> String {
    let mut out = String::from("# New Relic Dashboard\n\n## Applications\n\n");
    out.push_str(&format!("Total Applications: {}\n\n", apps.len()));

    let mut busiest: Vec<&Value> = apps
        .iter()
        .filter(|a| a["application_summary"]["throughput"].is_number())
        .collect();
    busiest.sort_by(|a, b| {
        let rate = |v: &Value| v["application_summary"]["throughput"].as_f64().unwrap_or(0.0);
        rate(*b).total_cmp(&rate(*a))
    });
    if !busiest.is_empty() {
        out.push_str("### Top Applications by Throughput\n\n");
        for app in busiest.into_iter().take(5) {
            let summary = &app["application_summary"];
            out.push_str(&format!("- **{}**\n", field(&app["name"])));
            out.push_str(&format!("  - Throughput: {} rpm\n", field(&summary["throughput"])));
            out.push_str(&format!("  - Response Time: {} ms\n", field(&summary["response_time"])));
            out.push_str(&format!("  - Error Rate: {}%\n\n", field(&summary["error_rate"])));
        }
    }

    out.push_str("## Mobile Applications\n\n");
    out.push_str(&format!("Total Mobile Applications: {}\n\n", mobile.len()));
    if !mobile.is_empty() {
        out.push_str("### Mobile Application Details\n\n");
        for app in mobile.iter().take(5) {
            out.push_str(&format!("- **{}**\n", field(&app["name"])));
            out.push_str(&format!("  - Crash Rate: {}%\n", field(&app["crash_summary"]["crash_rate"])));
            out.push_str(&format!(
                "  - API Error Rate: {}%\n\n",
                field(&app["mobile_summary"]["remote_error_rate"])
            ));
        }
    }

    out.push_str("## Alerts\n\n");
    out.push_str(&format!("Total Alert Policies: {}\n", policies.len()));
    out.push_str(&format!("Open Incidents: {}\n\n", open_incidents.len()));
    if !open_incidents.is_empty() {
        out.push_str("### Open Incidents\n\n");
        for incident in open_incidents.iter().take(5) {
            let policy_id = &incident["links"]["policy_id"];
            let policy = policies
                .iter()
                .find(|p| &p["id"] == policy_id)
                .map(|p| field(&p["name"]))
                .unwrap_or_else(|| format!("Policy {}", field(policy_id)));
            let violations = incident["links"]["violations"].as_array().map_or(0, Vec::len);
            out.push_str(&format!("- **Incident {}**\n", field(&incident["id"])));
            out.push_str(&format!("  - Policy: {}\n", policy));
            out.push_str(&format!("  - Opened: {}\n", epoch(&incident["opened_at"])));
            out.push_str(&format!("  - Violations: {}\n\n", violations));
        }
    }
    out
}

pub fn monitors(monitors: &[Value]) -> String {
    let mut out = String::from("# New Relic Synthetic Monitors\n\n");
    for monitor in monitors {
        out.push_str(&format!("## {}\n", field(&monitor["name"])));
        out.push_str(&format!("- ID: {}\n", field(&monitor["id"])));
        out.push_str(&format!("- Type: {}\n", field(&monitor["type"])));
        out.push_str(&format!("- Status: {}\n", field(&monitor["status"])));
        out.push_str(&format!("- Frequency: {} minutes\n", field(&monitor["frequency"])));
        if matches!(monitor["type"].as_str(), Some("SIMPLE" | "BROWSER")) && !monitor["uri"].is_null() {
            out.push_str(&format!("- URI: {}\n", field(&monitor["uri"])));
        }
        if let Some(locations) = monitor["locations"].as_array() {
            out.push_str("- Locations:\n");
            for location in locations {
                out.push_str(&format!("  - {}\n", field(location)));
            }
        }
        out.push('\n');
    }
    out
}

pub fn account_dashboards(account_id: &str, dashboards: &[Value]) -> String {
    let mut out = format!("# New Relic Dashboards (Account: {})\n\n", account_id);
    for dashboard in dashboards {
        out.push_str(&format!("## {}\n", field(&dashboard["title"])));
        out.push_str(&format!("- ID: {}\n", field(&dashboard["id"])));
        out.push_str(&format!("- Permissions: {}\n", field(&dashboard["permissions"])));
        out.push_str(&format!("- Created: {}\n", iso(&dashboard["createdAt"])));
        out.push_str(&format!("- Updated: {}\n", iso(&dashboard["updatedAt"])));
        if let Some(pages) = dashboard["pages"].as_array().filter(|p| !p.is_empty()) {
            out.push_str("- Pages:\n");
            for page in pages {
                out.push_str(&format!("  - {}\n", field(&page["name"])));
            }
        }
        out.push('\n');
    }
    out
}

pub fn browser_applications(apps: &[Value]) -> String {
    let mut out = String::from("# New Relic Browser Applications\n\n");
    for app in apps {
        out.push_str(&format!("## {}\n", field(&app["name"])));
        out.push_str(&format!("- ID: {}\n", field(&app["id"])));
        out.push_str(&format!("- Browser Monitoring Key: {}\n", field(&app["browser_monitoring_key"])));
        out.push_str(&format!("- JS Agent Version: {}\n", field(&app["js_agent_version"])));
        out.push_str(&format!("- Loader Type: {}\n", field(&app["loader_type"])));
        let summary = &app["application_summary"];
        if summary.is_object() {
            out.push_str("- Summary:\n");
            out.push_str(&format!("  - Page Views: {} per minute\n", field(&summary["page_views_per_minute"])));
            out.push_str(&format!("  - Page Load Time: {}ms\n", field(&summary["page_load_time"])));
            out.push_str(&format!("  - Ajax Response Time: {}ms\n", field(&summary["ajax_response_time"])));
            out.push_str(&format!(
                "  - JavaScript Errors: {} per minute\n",
                field(&summary["javascript_errors_per_minute"])
            ));
        }
        out.push('\n');
    }
    out
}

pub fn service_levels(account_id: &str, indicators: &[Value]) -> String {
    let mut out = format!("# New Relic Service Level Indicators (Account: {})\n\n", account_id);
    for sli in indicators {
        out.push_str(&format!("## {}\n", field(&sli["name"])));
        out.push_str(&format!("- GUID: {}\n", field(&sli["guid"])));
        out.push_str(&format!("- Entity GUID: {}\n", field(&sli["entityGuid"])));
        if let Some(description) = sli["description"].as_str().filter(|d| !d.is_empty()) {
            out.push_str(&format!("- Description: {}\n", description));
        }
        for objective in sli["objectives"].as_array().into_iter().flatten() {
            let rolling = &objective["timeWindow"]["rolling"];
            out.push_str(&format!("- Objective: {}\n", field(&objective["name"])));
            out.push_str(&format!("  - Target: {}%\n", percent(&objective["target"])));
            out.push_str(&format!(
                "  - Time Window: {} {}\n",
                field(&rolling["count"]),
                rolling["unit"].as_str().unwrap_or_default().to_lowercase()
            ));
        }
        let events = &sli["events"];
        if events.is_object() {
            out.push_str("- Events:\n");
            for (key, label) in [("valid", "Valid Events"), ("bad", "Bad Events"), ("total", "Total Events")] {
                let event = &events[key];
                if event.is_object() {
                    out.push_str(&format!("  - {}: {}\n", label, field(&event["name"])));
                    out.push_str(&format!("    - Query: `{}`\n", field(&event["query"])));
                }
            }
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn application_list_with_summary() {
        let apps = vec![
            json!({
                "id": 42, "name": "checkout", "language": "java", "health_status": "green",
                "reporting": true,
                "application_summary": { "apdex_score": 0.98, "response_time": 120.5, "throughput": 300, "error_rate": 0.1 }
            }),
            json!({ "id": 43, "name": "batch", "reporting": false }),
        ];
        let out = applications(&apps);
        assert!(out.starts_with("# New Relic Applications\n\n## checkout\n- ID: 42\n"));
        assert!(out.contains("  - Response Time: 120.5ms\n"));
        assert!(out.contains("## batch\n- ID: 43\n- Language: N/A\n- Health: N/A\n- Reporting: No\n\n"));
    }

    #[test]
    fn policy_timestamps() {
        let out = alert_policies(&[json!({
            "id": 1, "name": "Golden signals", "incident_preference": "PER_POLICY",
            "created_at": 1_700_000_000_000i64, "updated_at": 1_700_000_000
        })]);
        assert!(out.contains("- Created: 2023-11-14 22:13:20\n"));
        assert!(out.contains("- Updated: 2023-11-14 22:13:20\n"));
    }

    #[test]
    fn application_detail_sections() {
        let out = application(&json!({
            "id": 7, "name": "web", "reporting": true,
            "settings": { "app_apdex_threshold": 0.5, "enable_real_user_monitoring": true }
        }));
        assert!(out.starts_with("# New Relic Application: web\n\n"));
        assert!(!out.contains("## Application Summary"));
        assert!(out.contains("- App Apdex Threshold: 0.5s\n"));
        assert!(out.contains("- Real User Monitoring: Enabled\n- Server-Side Config: Disabled\n"));
    }

    #[test]
    fn incidents_mark_closed_ones() {
        let out = incidents(
            &[
                json!({ "id": 11, "opened_at": 1_700_000_000_000i64, "links": { "policy_id": 4, "violations": [91, 92] } }),
                json!({ "id": 12, "opened_at": 1_700_000_000_000i64, "closed_at": 1_700_000_600_000i64, "links": { "policy_id": 4 } }),
            ],
            false,
        );
        assert!(out.starts_with("# New Relic Alert Incidents\n\n## Incident 11\n- Status: Open\n"));
        assert!(out.contains("- Violations:\n  - 91\n  - 92\n"));
        assert!(out.contains("## Incident 12\n- Status: Closed\n- Opened: 2023-11-14 22:13:20\n- Closed: 2023-11-14 22:23:20\n"));
        assert!(incidents(&[], true).starts_with("# New Relic Open Alert Incidents"));
    }

    #[test]
    fn violation_entity_block() {
        let out = violations(
            &[json!({
                "id": 5, "condition_name": "High CPU", "priority": "Critical", "duration": 12,
                "policy_name": "Infra", "opened_at": 1_700_000_000,
                "entity": { "name": "db-1", "type": "Host", "product": "Infrastructure", "id": 77, "group_id": 3 },
                "links": { "policy_id": 4, "condition_id": 8, "incident_id": 11 }
            })],
            true,
            "2024-01-01T00:00:00",
            "2024-01-02T00:00:00",
        );
        assert!(out.starts_with("# New Relic Open Alert Violations\n\nTime range: 2024-01-01T00:00:00 to 2024-01-02T00:00:00\n\n## High CPU - db-1\n"));
        assert!(out.contains("- ID: 5\n- Status: Open\n- Priority: Critical\n- Opened: 2023-11-14 22:13:20\n- Duration"));
        assert!(out.contains("- Duration: 12 minutes\n- Policy: Infra (ID: 4)\n- Condition ID: 8\n- Incident ID: 11\n"));
        assert!(out.contains("  - Product: Infrastructure\n  - ID: 77\n  - Group ID: 3\n"));
    }

    #[test]
    fn overview_ranks_by_throughput() {
        let apps: Vec<Value> = (1..=7)
            .map(|i| json!({ "name": format!("app-{}", i), "application_summary": { "throughput": i * 10, "response_time": 5, "error_rate": 0 } }))
            .chain([json!({ "name": "idle" })])
            .collect();
        let policies = vec![json!({ "id": 4, "name": "Golden signals" })];
        let open = vec![
            json!({ "id": 11, "opened_at": 1_700_000_000, "links": { "policy_id": 4, "violations": [1, 2, 3] } }),
            json!({ "id": 12, "opened_at": 1_700_000_000, "links": { "policy_id": 9 } }),
        ];
        let out = overview(&apps, &[], &policies, &open);
        assert!(out.contains("Total Applications: 8\n"));
        let top = out.find("- **app-7**").unwrap();
        assert!(top < out.find("- **app-3**").unwrap());
        assert!(!out.contains("app-2**"));
        assert!(out.contains("Total Mobile Applications: 0\n\n## Alerts"));
        assert!(out.contains("- **Incident 11**\n  - Policy: Golden signals\n"));
        assert!(out.contains("  - Violations: 3\n"));
        assert!(out.contains("- **Incident 12**\n  - Policy: Policy 9\n"));
    }

    #[test]
    fn monitors_show_uri_only_for_url_checks() {
        let out = monitors(&[
            json!({ "id": "m1", "name": "home", "type": "SIMPLE", "status": "ENABLED", "frequency": 5, "uri": "https://example.com", "locations": ["AWS_US_EAST_1"] }),
            json!({ "id": "m2", "name": "login flow", "type": "SCRIPT_BROWSER", "status": "MUTED", "frequency": 15, "uri": "ignored" }),
        ]);
        assert!(out.contains("- Frequency: 5 minutes\n- URI: https://example.com\n- Locations:\n  - AWS_US_EAST_1\n"));
        assert!(!out.contains("ignored"));
    }

    #[test]
    fn dashboards_format_iso_dates() {
        let out = account_dashboards(
            "123",
            &[json!({
                "id": 1, "title": "Ops", "permissions": "PUBLIC_READ_ONLY",
                "createdAt": "2024-03-01T10:20:30Z", "updatedAt": "not a date",
                "pages": [{ "name": "Overview" }]
            })],
        );
        assert!(out.starts_with("# New Relic Dashboards (Account: 123)\n\n## Ops\n"));
        assert!(out.contains("- Created: 2024-03-01 10:20:30\n- Updated: not a date\n- Pages:\n  - Overview\n"));
    }

    #[test]
    fn service_level_objectives() {
        let out = service_levels(
            "123",
            &[json!({
                "guid": "g1", "name": "Checkout", "entityGuid": "e1", "description": "",
                "objectives": [{ "name": "Target", "target": 0.995, "timeWindow": { "rolling": { "count": 7, "unit": "DAY" } } }],
                "events": { "valid": { "name": "Valid events", "query": "FROM Transaction SELECT count(*)" } }
            })],
        );
        assert!(!out.contains("Description"));
        assert!(out.contains("- Objective: Target\n  - Target: 99.5%\n  - Time Window: 7 day\n"));
        assert!(out.contains("- Events:\n  - Valid Events: Valid events\n    - Query: `FROM Transaction SELECT count(*)`\n"));
        assert!(!out.contains("Bad Events"));
    }

    #[test]
    fn mobile_crash_summary() {
        let out = mobile_application(&json!({
            "id": 3, "name": "ios", "reporting": true,
            "crash_summary": { "crash_count": 2, "crash_rate": 0.4, "unresolved_crash_count": 1, "supports_crash_data": true }
        }));
        assert!(!out.contains("## Mobile Summary"));
        assert!(out.contains("## Crash Summary\n- Crash Count: 2\n- Crash Rate: 0.4%\n- Unresolved Crashes: 1\n- Supports Crash Data: Yes\n"));
    }
}
