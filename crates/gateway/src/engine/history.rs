use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use super::catalog;
use super::context::QueryContext;
use super::query::{default_step, MetricQuery, SeriesPoint};
use super::resolver::CandidateResolver;
use super::stats::{classify_unit, summarize, StatSummary};
use crate::Error;

/// Time windows accepted by the history operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "24h")]
    OneDay,
    #[serde(rename = "7d")]
    SevenDays,
    #[serde(rename = "30d")]
    ThirtyDays,
}

impl TimeRange {
    pub const ALL: [TimeRange; 4] = [
        TimeRange::OneHour,
        TimeRange::OneDay,
        TimeRange::SevenDays,
        TimeRange::ThirtyDays,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::OneHour => "1h",
            TimeRange::OneDay => "24h",
            TimeRange::SevenDays => "7d",
            TimeRange::ThirtyDays => "30d",
        }
    }

    pub fn duration(&self) -> Duration {
        const HOUR: u64 = 60 * 60;
        match self {
            TimeRange::OneHour => Duration::from_secs(HOUR),
            TimeRange::OneDay => Duration::from_secs(24 * HOUR),
            TimeRange::SevenDays => Duration::from_secs(7 * 24 * HOUR),
            TimeRange::ThirtyDays => Duration::from_secs(30 * 24 * HOUR),
        }
    }

    pub fn step(&self) -> Duration {
        default_step(self.duration())
    }
}

impl FromStr for TimeRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeRange::ALL
            .into_iter()
            .find(|range| range.as_str() == s.trim())
            .ok_or_else(|| {
                Error::Caller(format!(
                    "Unsupported time range '{}', expected one of 1h, 24h, 7d, 30d",
                    s
                ))
            })
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricHistory {
    pub metric: String,
    pub time_range: TimeRange,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub step_seconds: u64,
    /// Expression that produced the data, absent when nothing resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    pub points: Vec<SeriesPoint>,
    pub summary: StatSummary,
}

/// Range history of a named metric, or of a raw expression when the name is
/// not a known alias.
pub async fn metric_history(
    context: &QueryContext,
    metric: &str,
    time_range: TimeRange,
) -> MetricHistory {
    let end = Utc::now();
    let start = end
        - chrono::Duration::from_std(time_range.duration()).unwrap_or_else(|_| chrono::Duration::hours(1));
    let step = time_range.step();
    let shape = MetricQuery::range("", start, end, Some(step));

    let raw = [metric];
    let candidates: &[&str] = match catalog::history_candidates(metric) {
        Some(known) => known,
        None => &raw,
    };

    let resolution = CandidateResolver::new(context)
        .resolve(candidates, &[], &shape)
        .await;

    let (expression, points, summary) = match resolution.result() {
        Some(result) => {
            let unit_hint = match classify_unit(metric) {
                "" => resolution.expression().unwrap_or_default(),
                _ => metric,
            };
            let points = result
                .first_series()
                .map(|s| s.points.clone())
                .unwrap_or_default();
            (
                resolution.expression().map(str::to_string),
                points,
                summarize(result, unit_hint),
            )
        }
        None => (
            None,
            Vec::new(),
            StatSummary {
                unit: classify_unit(metric).to_string(),
                ..StatSummary::default()
            },
        ),
    };

    info!(
        metric = %metric,
        time_range = %time_range,
        points = points.len(),
        "Fetched metric history"
    );

    MetricHistory {
        metric: metric.to_string(),
        time_range,
        start,
        end,
        step_seconds: step.as_secs(),
        expression,
        points,
        summary,
    }
}
