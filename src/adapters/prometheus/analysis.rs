//! Metric analysis: time windows, query construction and per-series statistics.

use std::fmt::Write;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use super::format::{fmt_g, fmt_ts, label_pairs};
use crate::error::{AdapterError, Result};

const AGGREGATIONS: [&str; 5] = ["sum", "avg", "min", "max", "count"];

/// Series shown before the output is cut short.
const MAX_SERIES: usize = 5;

/// `1h`, `2d`, `1w` into a duration.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    let Some(unit) = s.chars().last() else {
        return Err(AdapterError::invalid("Invalid duration format: empty. Use format like '1h', '2d', etc."));
    };
    let value: i64 = s[..s.len() - unit.len_utf8()].parse().map_err(|_| {
        AdapterError::invalid(format!("Invalid duration format: {}. Use format like '1h', '2d', etc.", s))
    })?;
    let window = match unit.to_ascii_lowercase() {
        'h' => Duration::try_hours(value),
        'd' => Duration::try_days(value),
        'w' => Duration::try_weeks(value),
        other => {
            return Err(AdapterError::invalid(format!(
                "Unsupported time unit: {}. Use h (hours), d (days), or w (weeks).",
                other
            )));
        }
    };
    window
        .filter(|w| *w > Duration::zero())
        .ok_or_else(|| AdapterError::invalid(format!("Duration out of range: {}", s)))
}

/// RFC3339 or Unix seconds.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    let secs: f64 = s.trim().parse().ok()?;
    DateTime::from_timestamp(secs.trunc() as i64, 0)
}

/// Default step for an ad hoc range query.
pub fn query_step(start: &str, end: &str) -> &'static str {
    let (Some(start), Some(end)) = (parse_timestamp(start), parse_timestamp(end)) else {
        return "5m";
    };
    match (end - start).num_seconds() {
        s if s <= 3_600 => "15s",
        s if s <= 86_400 => "5m",
        _ => "1h",
    }
}

/// Step for `analyze_metric`, which also covers multi-week windows.
pub fn analysis_step(window: Duration) -> &'static str {
    match window.num_seconds() {
        s if s <= 3_600 => "15s",
        s if s <= 86_400 => "5m",
        s if s <= 604_800 => "1h",
        _ => "4h",
    }
}

/// Apply `k=v,...` label filters and an optional aggregation to `metric`.
pub fn build_query(metric: &str, labels: Option<&str>, aggregation: Option<&str>) -> Result<String> {
    let mut query = metric.to_string();

    if let Some(labels) = labels {
        let filters: Vec<String> = labels
            .split(',')
            .filter_map(|pair| pair.split_once('='))
            .map(|(k, v)| format!("{}=\"{}\"", k.trim(), v.trim()))
            .collect();
        if !filters.is_empty() {
            query = format!("{}{{{}}}", metric, filters.join(","));
        }
    }

    if let Some(agg) = aggregation {
        let agg = agg.to_ascii_lowercase();
        if !AGGREGATIONS.contains(&agg.as_str()) {
            return Err(AdapterError::invalid(format!(
                "Unsupported aggregation function: {}. Use sum, avg, min, max, or count.",
                agg
            )));
        }
        query = format!("{}({})", agg, query);
    }
    Ok(query)
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesStats {
    pub min: f64,
    pub min_at: f64,
    pub max: f64,
    pub max_at: f64,
    pub avg: f64,
    pub first: f64,
    pub last: f64,
    pub samples: usize,
    /// Seconds between the first and last sample.
    pub span: f64,
}

impl SeriesStats {
    /// Statistics over the numeric samples of a `[[ts, "v"], ...]` list.
    pub fn from_values(values: &[Value]) -> Option<Self> {
        let points: Vec<(f64, f64)> = values
            .iter()
            .filter_map(|pair| {
                let ts = pair.get(0)?.as_f64()?;
                let v = match pair.get(1)? {
                    Value::String(s) => s.parse::<f64>().ok()?,
                    Value::Number(n) => n.as_f64()?,
                    _ => return None,
                };
                v.is_finite().then_some((ts, v))
            })
            .collect();

        let (first_ts, first) = *points.first()?;
        let (last_ts, last) = *points.last()?;

        let mut min = (first_ts, first);
        let mut max = (first_ts, first);
        let mut sum = 0.0;
        for &(ts, v) in &points {
            if v < min.1 {
                min = (ts, v);
            }
            if v > max.1 {
                max = (ts, v);
            }
            sum += v;
        }

        Some(Self {
            min: min.1,
            min_at: min.0,
            max: max.1,
            max_at: max.0,
            avg: sum / points.len() as f64,
            first,
            last,
            samples: points.len(),
            span: last_ts - first_ts,
        })
    }

    pub fn change(&self) -> f64 {
        self.last - self.first
    }

    /// `None` when the first sample is zero.
    pub fn percent_change(&self) -> Option<f64> {
        (self.first != 0.0).then(|| self.change() / self.first.abs() * 100.0)
    }

    pub fn rate_per_second(&self) -> f64 {
        if self.span > 0.0 { self.change() / self.span } else { 0.0 }
    }

    pub fn trend(&self) -> &'static str {
        let change = self.change();
        if change > 0.0 {
            "increasing"
        } else if change < 0.0 {
            "decreasing"
        } else {
            "stable"
        }
    }

    pub fn variance_note(&self) -> Option<&'static str> {
        let spread = self.max - self.min;
        let scale = self.avg.abs();
        if scale == 0.0 {
            None
        } else if spread < 0.05 * scale {
            Some("The metric shows stable behavior with low variance.")
        } else if spread > 0.5 * scale {
            Some("The metric shows high variability over the period.")
        } else {
            None
        }
    }

    fn render(&self, out: &mut String) {
        out.push_str("### Basic Statistics\n\n");
        let _ = writeln!(out, "- **Minimum**: {} (at {})", fmt_g(self.min), fmt_ts(self.min_at));
        let _ = writeln!(out, "- **Maximum**: {} (at {})", fmt_g(self.max), fmt_ts(self.max_at));
        let _ = writeln!(out, "- **Average**: {}", fmt_g(self.avg));
        let _ = writeln!(out, "- **First Value**: {}", fmt_g(self.first));
        let _ = writeln!(out, "- **Last Value**: {}", fmt_g(self.last));
        let _ = writeln!(out, "- **Absolute Change**: {}", fmt_g(self.change()));
        if let Some(pct) = self.percent_change() {
            let _ = writeln!(out, "- **Percent Change**: {:.2}%", pct);
        }
        let _ = writeln!(out, "- **Rate of Change**: {} per second\n", fmt_g(self.rate_per_second()));

        if self.samples > 1 {
            out.push_str("### Additional Insights\n\n");
            let _ = writeln!(out, "- The metric is {} over the analyzed period.", self.trend());
            if let Some(note) = self.variance_note() {
                let _ = writeln!(out, "- {}", note);
            }
        }
        out.push('\n');
    }
}

/// What was asked for, echoed under "Query Details".
pub struct AnalysisRequest<'a> {
    pub metric: &'a str,
    pub query: &'a str,
    pub duration: &'a str,
    pub aggregation: Option<&'a str>,
    pub labels: Option<&'a str>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

pub fn render_analysis(req: &AnalysisRequest<'_>, results: &[Value]) -> String {
    let mut out = format!("# Analysis of '{}' over {}\n\n", req.metric, req.duration);
    if results.is_empty() {
        out.push_str("No data found for this metric with the given parameters.\n");
        return out;
    }

    for (idx, result) in results.iter().enumerate() {
        let Some(values) = result["values"].as_array().filter(|v| !v.is_empty()) else {
            continue;
        };

        let labels = label_pairs(result.get("metric"), &["__name__"]);
        if labels.is_empty() {
            let _ = writeln!(out, "## Series {}\n", idx + 1);
        } else {
            let _ = writeln!(out, "## Series {}: {}\n", idx + 1, labels);
        }

        match SeriesStats::from_values(values) {
            Some(stats) => stats.render(&mut out),
            None => out.push_str("No numeric values available for analysis.\n\n"),
        }

        if idx + 1 >= MAX_SERIES && results.len() > MAX_SERIES {
            let _ = writeln!(
                out,
                "... and {} more series (output truncated to avoid excessive length)",
                results.len() - MAX_SERIES
            );
            break;
        }
    }

    out.push_str("### Query Details\n\n");
    let _ = writeln!(out, "- **Query**: `{}`", req.query);
    let _ = writeln!(
        out,
        "- **Time Range**: {} to {}",
        req.start.format("%Y-%m-%d %H:%M:%S"),
        req.end.format("%Y-%m-%d %H:%M:%S")
    );
    let _ = writeln!(out, "- **Duration**: {}", req.duration);
    if let Some(agg) = req.aggregation {
        let _ = writeln!(out, "- **Aggregation**: {}", agg);
    }
    if let Some(labels) = req.labels {
        let _ = writeln!(out, "- **Label Filters**: {}", labels);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn durations_in_hours_days_weeks() {
        assert_eq!(parse_duration("1h").unwrap(), Duration::hours(1));
        assert_eq!(parse_duration("7d").unwrap(), Duration::days(7));
        assert_eq!(parse_duration("2W").unwrap(), Duration::weeks(2));
        assert!(parse_duration("5m").is_err());
        assert!(parse_duration("xh").is_err());
        assert!(parse_duration("").is_err());
        assert!(parse_duration("0h").is_err());
        assert!(parse_duration("-2d").is_err());
    }

    #[test]
    fn oversized_durations_are_rejected() {
        for input in ["9999999999999999w", "9223372036854775807h", "100000000000000d"] {
            let err = parse_duration(input).unwrap_err();
            assert_eq!(err.to_string(), format!("Duration out of range: {}", input));
        }
    }

    #[test]
    fn range_query_step_follows_span() {
        assert_eq!(query_step("2024-01-01T00:00:00Z", "2024-01-01T00:30:00Z"), "15s");
        assert_eq!(query_step("2024-01-01T00:00:00Z", "2024-01-01T12:00:00Z"), "5m");
        assert_eq!(query_step("2024-01-01T00:00:00Z", "2024-01-05T00:00:00Z"), "1h");
        assert_eq!(query_step("1700000000", "1700003600"), "15s");
        assert_eq!(query_step("yesterday", "now"), "5m");
    }

    #[test]
    fn analysis_step_covers_long_windows() {
        assert_eq!(analysis_step(Duration::hours(1)), "15s");
        assert_eq!(analysis_step(Duration::hours(6)), "5m");
        assert_eq!(analysis_step(Duration::days(7)), "1h");
        assert_eq!(analysis_step(Duration::weeks(4)), "4h");
    }

    #[test]
    fn query_with_labels_and_aggregation() {
        assert_eq!(build_query("up", None, None).unwrap(), "up");
        assert_eq!(
            build_query("http_requests_total", Some("job=api, code=500"), Some("SUM")).unwrap(),
            r#"sum(http_requests_total{job="api",code="500"})"#
        );
        assert_eq!(build_query("up", Some("garbage"), None).unwrap(), "up");
        assert!(build_query("up", None, Some("median")).is_err());
    }

    #[test]
    fn series_statistics() {
        let values = vec![json!([0, "10"]), json!([30, "5"]), json!([60, "NaN"]), json!([100, "20"])];
        let stats = SeriesStats::from_values(&values).unwrap();
        assert_eq!(stats.min, 5.0);
        assert_eq!(stats.min_at, 30.0);
        assert_eq!(stats.max, 20.0);
        assert_eq!(stats.samples, 3);
        assert!((stats.avg - 35.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.change(), 10.0);
        assert_eq!(stats.percent_change(), Some(100.0));
        assert!((stats.rate_per_second() - 0.1).abs() < 1e-9);
        assert_eq!(stats.trend(), "increasing");
        assert_eq!(stats.variance_note(), Some("The metric shows high variability over the period."));
    }

    #[test]
    fn percent_change_omitted_from_zero() {
        let values = vec![json!([0, "0"]), json!([10, "4"])];
        let stats = SeriesStats::from_values(&values).unwrap();
        assert_eq!(stats.percent_change(), None);
    }

    #[test]
    fn flat_series_is_stable() {
        let values = vec![json!([0, "100"]), json!([10, "101"]), json!([20, "100"])];
        let stats = SeriesStats::from_values(&values).unwrap();
        assert_eq!(stats.trend(), "stable");
        assert_eq!(stats.variance_note(), Some("The metric shows stable behavior with low variance."));
    }

    #[test]
    fn analysis_caps_series_count() {
        let results: Vec<Value> = (0..7)
            .map(|i| json!({ "metric": { "instance": format!("n{}", i) }, "values": [[0, "1"], [60, "2"]] }))
            .collect();
        let req = AnalysisRequest {
            metric: "up",
            query: "up",
            duration: "1h",
            aggregation: None,
            labels: None,
            start: DateTime::from_timestamp(0, 0).unwrap(),
            end: DateTime::from_timestamp(3600, 0).unwrap(),
        };
        let out = render_analysis(&req, &results);
        assert!(out.contains("## Series 5: instance=n4"));
        assert!(!out.contains("## Series 6"));
        assert!(out.contains("... and 2 more series"));
        assert!(out.contains("- **Time Range**: 1970-01-01 00:00:00 to 1970-01-01 01:00:00"));
    }
}
