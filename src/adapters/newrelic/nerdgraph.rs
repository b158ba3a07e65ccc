//! NerdGraph documents and the variables they take.
//!
//! Every query passes ids and user text as GraphQL variables, never spliced
//! into the document.

use serde_json::{json, Map, Value};

use crate::args;
use crate::error::{AdapterError, Result};

pub const WORKLOADS: &str = "{
  actor {
    workloads {
      collections {
        id
        name
        accountId
        status { value }
        entitySearchQuery
        createdBy
        permalink
        entityCount
      }
    }
  }
}";

pub const WORKLOAD: &str = "query($accountId: Int!, $guid: EntityGuid!) {
  actor {
    account(id: $accountId) {
      workload(guid: $guid) {
        id
        name
        status { value }
        entitySearchQuery
        createdBy
        permalink
        entityCount
        entities {
          results { guid name entityType alertSeverity }
        }
      }
    }
  }
}";

pub const WORKLOAD_CREATE: &str = "mutation($accountId: Int!, $name: String!, $entitySearchQuery: String!, $entityGuids: [EntityGuid]) {
  workloadCreate(accountId: $accountId, workload: {
    name: $name,
    entitySearchQuery: $entitySearchQuery,
    entityGuids: $entityGuids
  }) {
    guid
    name
    permalink
  }
}";

pub const WORKLOAD_UPDATE: &str = "mutation($accountId: Int!, $guid: EntityGuid!, $updateFields: WorkloadUpdateInput!) {
  workloadUpdate(accountId: $accountId, guid: $guid, updateFields: $updateFields) {
    guid
    name
    permalink
    entitySearchQuery
  }
}";

pub const WORKLOAD_DELETE: &str = "mutation($accountId: Int!, $guid: EntityGuid!) {
  workloadDelete(accountId: $accountId, guid: $guid) {
    guid
  }
}";

pub const DASHBOARD_SEARCH: &str = "query($query: String, $cursor: String) {
  actor {
    entitySearch(query: $query) {
      count
      results(cursor: $cursor) {
        nextCursor
        entities {
          guid
          name
          accountId
          permalink
          ... on DashboardEntityOutline {
            dashboardParentGuid
            owner { email userId }
            createdAt
            updatedAt
          }
        }
      }
    }
  }
}";

pub const DASHBOARD: &str = "query($accountId: Int!, $id: ID!) {
  actor {
    account(id: $accountId) {
      dashboard(id: $id) {
        id
        title
        permissions
        pages {
          name
          widgets {
            id
            title
            visualization { id }
            layout { width height row column }
            rawConfiguration
          }
        }
        owner { email userId }
        createdAt
        updatedAt
      }
    }
  }
}";

pub const ACCOUNT_DASHBOARDS: &str = "query($accountId: Int!) {
  actor {
    account(id: $accountId) {
      dashboards {
        dashboards {
          id
          title
          permissions
          createdAt
          updatedAt
          pages { name }
        }
      }
    }
  }
}";

pub const DASHBOARD_CREATE: &str = "mutation($accountId: Int!, $dashboard: DashboardInput!) {
  dashboardCreate(accountId: $accountId, dashboard: $dashboard) {
    entityResult { guid name }
  }
}";

pub const DASHBOARD_DELETE: &str = "mutation($guid: EntityGuid!) {
  dashboardDelete(guid: $guid) {
    status
    error { description }
  }
}";

pub const NRQL: &str = "query($accountId: Int!, $query: Nrql!, $timeout: Int) {
  actor {
    account(id: $accountId) {
      nrql(query: $query, timeout: $timeout) {
        results
        metadata {
          facets
          timeRange { begin end }
        }
      }
    }
  }
}";

pub const SERVICE_LEVELS: &str = "query($accountId: Int!) {
  actor {
    account(id: $accountId) {
      serviceLevels {
        indicators {
          guid
          name
          description
          entityGuid
          events {
            valid { name query }
            bad { name query }
            total { name query }
          }
          objectives {
            name
            target
            timeWindow { rolling { count unit } }
          }
        }
      }
    }
  }
}";

pub const SERVICE_LEVEL_CREATE: &str = "mutation($accountId: Int!, $sli: ServiceLevelIndicatorInput!) {
  serviceLevelIndicatorCreate(accountId: $accountId, indicator: $sli) {
    guid
  }
}";

pub const ERRORS: &str = "query($accountId: Int!, $filters: ErrorTrackingFilterInput, $cursor: String) {
  actor {
    account(id: $accountId) {
      errorTracking {
        errors(filters: $filters, cursor: $cursor) {
          results {
            id
            message
            attributes {
              ... on ErrorTrackingErrorAttribute { key value }
            }
            entityGuid
            occurrences
            occurrenceLocation { file lineNumber columnNumber }
            stackTrace { formatted }
            firstSeen
            lastSeen
          }
          pageInfo { hasNextPage endCursor }
        }
      }
    }
  }
}";

pub const ERROR: &str = "query($accountId: Int!, $errorId: ID!) {
  actor {
    account(id: $accountId) {
      errorTracking {
        error(id: $errorId) {
          id
          message
          entityGuid
          occurrences
          occurrenceLocation { file lineNumber columnNumber }
          attributes {
            ... on ErrorTrackingErrorAttribute { key value }
          }
          stackTrace { formatted rawTrace }
          firstSeen
          lastSeen
        }
      }
    }
  }
}";

pub const ACCOUNTS: &str = "{
  actor {
    accounts {
      id
      name
      reportingEventTypes
    }
  }
}";

pub const ACCOUNT_USERS: &str = "query($accountId: Int!) {
  actor {
    account(id: $accountId) {
      users {
        authenticationDomains {
          name
          users {
            id
            name
            email
            lastActive
            groups { displayName }
          }
        }
      }
    }
  }
}";

const TIME_UNITS: [&str; 5] = ["MINUTE", "HOUR", "DAY", "WEEK", "MONTH"];

/// NerdGraph types account ids as `Int!`, so they travel as numbers.
pub fn account_id(args: &Value) -> Result<i64> {
    let raw = args::id(args, "account_id")?;
    raw.parse()
        .map_err(|_| AdapterError::invalid(format!("account_id must be numeric, got '{}'", raw)))
}

/// Entity search expression for dashboards.
pub fn dashboard_search(account_id: Option<&str>, name: Option<&str>) -> String {
    let mut query = String::from("type = 'DASHBOARD'");
    if let Some(account) = account_id {
        query.push_str(&format!(" AND accountId = {}", account));
    }
    if let Some(name) = name {
        query.push_str(&format!(" AND name LIKE '%{}%'", name.replace('\'', "\\'")));
    }
    query
}

/// Widgets laid out two per row, six columns wide, unless a layout is given.
pub fn dashboard_widgets(widgets: &[Value]) -> Vec<Value> {
    widgets
        .iter()
        .enumerate()
        .map(|(i, widget)| {
            let layout = match widget.get("layout") {
                Some(layout) if layout.is_object() => layout.clone(),
                _ => json!({ "width": 6, "height": 3, "row": i / 2, "column": i % 2 * 6 }),
            };
            let title = widget["title"]
                .as_str()
                .map(String::from)
                .unwrap_or_else(|| format!("Widget {}", i + 1));
            json!({
                "visualization": { "id": widget.get("visualization_id").cloned().unwrap_or(Value::Null) },
                "layout": layout,
                "title": title,
                "rawConfiguration": widget.get("raw_configuration").cloned().unwrap_or_else(|| json!({})),
            })
        })
        .collect()
}

pub fn dashboard_input(title: &str, page_name: &str, widgets: &[Value]) -> Value {
    json!({
        "name": title,
        "permissions": "PUBLIC_READ_WRITE",
        "pages": [{ "name": page_name, "widgets": dashboard_widgets(widgets) }],
    })
}

pub fn workload_update_fields(args: &Value) -> Result<Value> {
    let mut fields = Map::new();
    if let Some(name) = args::opt_str(args, "name") {
        fields.insert("name".into(), json!(name));
    }
    if let Some(query) = args::opt_str(args, "entity_search_query") {
        fields.insert("entitySearchQuery".into(), json!(query));
    }
    if fields.is_empty() {
        return Err(AdapterError::invalid(
            "Nothing to update: provide name or entity_search_query",
        ));
    }
    Ok(Value::Object(fields))
}

/// Complete a log search into NRQL: target `Log`, cap the row count and add
/// the time range unless the query already carries one.
pub fn log_query(query: &str, from: Option<&str>, to: Option<&str>, limit: u64) -> String {
    let mut nrql = query.trim().to_string();
    if !nrql.contains("FROM Log") {
        nrql.push_str(" FROM Log");
    }
    if !nrql.contains("LIMIT") {
        nrql.push_str(&format!(" LIMIT {}", limit));
    }
    if let (Some(from), Some(to)) = (from, to) {
        if !nrql.contains("SINCE") && !nrql.contains("UNTIL") {
            nrql.push_str(&format!(" SINCE '{}' UNTIL '{}'", from, to));
        }
    }
    nrql
}

/// Service level indicator input. The target arrives as a percentage and
/// NerdGraph wants a ratio.
pub fn service_level_input(args: &Value) -> Result<Value> {
    let target = args::f64_req(args, "target_percentage")?;
    if !(0.0..=100.0).contains(&target) {
        return Err(AdapterError::invalid(format!(
            "target_percentage must be between 0 and 100, got {}",
            target
        )));
    }
    let unit = args::str(args, "time_window_unit")?.to_ascii_uppercase();
    if !TIME_UNITS.contains(&unit.as_str()) {
        return Err(AdapterError::invalid(format!(
            "Invalid time_window_unit '{}': must be one of {}",
            unit,
            TIME_UNITS.join(", ")
        )));
    }
    let count = args::opt_u64(args, "time_window_value")
        .ok_or_else(|| AdapterError::invalid("Missing required argument: time_window_value"))?;

    Ok(json!({
        "name": args::str(args, "name")?,
        "entityGuid": args::str(args, "entity_guid")?,
        "description": args::str(args, "description")?,
        "events": {
            "valid": { "name": "Valid events", "query": args::str(args, "valid_events_query")? },
            "bad": { "name": "Bad events", "query": args::str(args, "bad_events_query")? },
            "total": { "name": "Total events", "query": args::str(args, "total_events_query")? },
        },
        "objectives": [{
            "name": "Target",
            "target": target / 100.0,
            "timeWindow": { "rolling": { "count": count, "unit": unit } },
        }],
    }))
}
