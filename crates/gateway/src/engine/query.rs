//! Query and result types shared by every part of the engine.
//!
//! The wire structs mirror the Prometheus HTTP API response body. Everything
//! is normalized into [`QueryResult`] before the rest of the engine sees it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Failure talking to the metrics backend. Always recoverable.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BackendError {
    #[error("request to metrics backend failed: {0}")]
    Transport(String),
    #[error("metrics backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response from metrics backend ({reason}): {body}")]
    Malformed { reason: String, body: String },
    #[error("metrics backend rejected query ({error_type}): {error}")]
    Query { error_type: String, error: String },
    #[error("query did not complete before the request deadline")]
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    Instant,
    Range,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Instant => "instant",
            QueryKind::Range => "range",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricQuery {
    pub expression: String,
    pub kind: QueryKind,
    /// Evaluation instant for instant queries, range start otherwise
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub step: Option<Duration>,
}

impl MetricQuery {
    pub fn instant(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            kind: QueryKind::Instant,
            start: None,
            end: None,
            step: None,
        }
    }

    pub fn instant_at(expression: impl Into<String>, time: DateTime<Utc>) -> Self {
        Self {
            start: Some(time),
            ..Self::instant(expression)
        }
    }

    pub fn range(
        expression: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Option<Duration>,
    ) -> Self {
        Self {
            expression: expression.into(),
            kind: QueryKind::Range,
            start: Some(start),
            end: Some(end),
            step,
        }
    }

    /// Same query shape with a different expression.
    pub fn with_expression(&self, expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            ..self.clone()
        }
    }

    /// Step to send with a range query, picking one from the window when unset.
    pub fn effective_step(&self) -> Duration {
        if let Some(step) = self.step {
            return step;
        }
        match (self.start, self.end) {
            (Some(start), Some(end)) => default_step((end - start).to_std().unwrap_or_default()),
            _ => default_step(Duration::ZERO),
        }
    }
}

/// Keeps range queries to a bounded number of points.
pub fn default_step(window: Duration) -> Duration {
    const DAY: u64 = 24 * 60 * 60;

    if window <= Duration::from_secs(DAY) {
        Duration::from_secs(60)
    } else if window <= Duration::from_secs(7 * DAY) {
        Duration::from_secs(5 * 60)
    } else {
        Duration::from_secs(60 * 60)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub timestamp: f64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LabeledSeries {
    pub labels: BTreeMap<String, String>,
    pub points: Vec<SeriesPoint>,
}

impl LabeledSeries {
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels.get(name).map(String::as_str)
    }

    /// Value of the chronologically last point
    pub fn current(&self) -> Option<f64> {
        self.points.last().map(|p| p.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    Scalar,
    Vector,
    Matrix,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub result_kind: ResultKind,
    pub series: Vec<LabeledSeries>,
}

impl QueryResult {
    pub fn empty(result_kind: ResultKind) -> Self {
        Self {
            result_kind,
            series: Vec::new(),
        }
    }

    /// True when at least one series carries at least one point.
    pub fn has_data(&self) -> bool {
        self.series.iter().any(|s| !s.points.is_empty())
    }

    pub fn first_series(&self) -> Option<&LabeledSeries> {
        self.series.first()
    }

    /// Current value of the first series.
    pub fn first_value(&self) -> Option<f64> {
        self.first_series().and_then(LabeledSeries::current)
    }

    /// Current value of the first series that has a point. Always `Some`
    /// when [`has_data`](Self::has_data) holds.
    pub fn current_value(&self) -> Option<f64> {
        self.series.iter().find_map(LabeledSeries::current)
    }
}

// Wire format of the Prometheus HTTP API.

#[derive(Debug, Deserialize)]
pub(crate) struct PrometheusResponse {
    pub status: String,
    #[serde(default)]
    pub data: Option<PrometheusData>,
    #[serde(rename = "errorType", default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub warnings: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PrometheusData {
    #[serde(rename = "resultType")]
    pub result_type: String,
    pub result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct PrometheusSeries {
    #[serde(default)]
    metric: BTreeMap<String, String>,
    #[serde(default)]
    value: Option<(f64, String)>,
    #[serde(default)]
    values: Option<Vec<(f64, String)>>,
}

fn parse_point((timestamp, raw): &(f64, String)) -> Option<SeriesPoint> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|value| SeriesPoint {
            timestamp: *timestamp,
            value,
        })
}

/// Normalize a raw response body into a [`QueryResult`].
pub(crate) fn parse_response(body: &str) -> Result<QueryResult, BackendError> {
    let response: PrometheusResponse =
        serde_json::from_str(body).map_err(|e| BackendError::Malformed {
            reason: e.to_string(),
            body: body.to_string(),
        })?;

    if response.status != "success" {
        return Err(BackendError::Query {
            error_type: response.error_type.unwrap_or_else(|| response.status.clone()),
            error: response.error.unwrap_or_default(),
        });
    }

    if let Some(warnings) = &response.warnings {
        for warning in warnings {
            tracing::debug!(warning = %warning, "Metrics backend returned a warning");
        }
    }

    let data = response.data.ok_or_else(|| BackendError::Malformed {
        reason: "missing data".to_string(),
        body: body.to_string(),
    })?;

    let malformed = |e: serde_json::Error| BackendError::Malformed {
        reason: e.to_string(),
        body: body.to_string(),
    };

    match data.result_type.as_str() {
        "scalar" => {
            let sample: (f64, String) = serde_json::from_value(data.result).map_err(malformed)?;
            let series = LabeledSeries {
                labels: BTreeMap::new(),
                points: parse_point(&sample).into_iter().collect(),
            };
            Ok(QueryResult {
                result_kind: ResultKind::Scalar,
                series: vec![series],
            })
        }
        "vector" => {
            let raw: Vec<PrometheusSeries> =
                serde_json::from_value(data.result).map_err(malformed)?;
            let series = raw
                .into_iter()
                .map(|s| LabeledSeries {
                    labels: s.metric,
                    points: s.value.as_ref().and_then(parse_point).into_iter().collect(),
                })
                .collect();
            Ok(QueryResult {
                result_kind: ResultKind::Vector,
                series,
            })
        }
        "matrix" => {
            let raw: Vec<PrometheusSeries> =
                serde_json::from_value(data.result).map_err(malformed)?;
            let series = raw
                .into_iter()
                .map(|s| {
                    let mut points: Vec<SeriesPoint> = s
                        .values
                        .unwrap_or_default()
                        .iter()
                        .filter_map(parse_point)
                        .collect();
                    points.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
                    LabeledSeries {
                        labels: s.metric,
                        points,
                    }
                })
                .collect();
            Ok(QueryResult {
                result_kind: ResultKind::Matrix,
                series,
            })
        }
        other => Err(BackendError::Malformed {
            reason: format!("unsupported result type '{}'", other),
            body: body.to_string(),
        }),
    }
}
