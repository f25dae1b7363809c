use serde::{Deserialize, Serialize};

use super::query::{QueryResult, ResultKind};

/// Summary of one series. `count == 0` means nothing was summarized.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatSummary {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub current: f64,
    pub count: usize,
    pub unit: String,
}

/// Best-effort unit guess from a metric name or expression.
pub fn classify_unit(text: &str) -> &'static str {
    let text = text.to_lowercase();
    if text.contains("percent") || text.contains("ratio") {
        "percent"
    } else if text.contains("bytes") {
        "bytes"
    } else if text.contains("seconds") {
        "seconds"
    } else if text.contains("requests") {
        "requests/sec"
    } else {
        ""
    }
}

/// Summarize the first series of `result`. Multi-series breakdowns are the
/// caller's job: ask for a single-series expression instead.
pub fn summarize(result: &QueryResult, unit_hint: &str) -> StatSummary {
    let unit = classify_unit(unit_hint).to_string();

    let Some(series) = result.first_series() else {
        return StatSummary {
            unit,
            ..StatSummary::default()
        };
    };

    // Vector and scalar series carry a single point, so the same fold
    // degenerates to min = max = avg = current.
    let points: &[_] = match result.result_kind {
        ResultKind::Matrix => &series.points[..],
        ResultKind::Vector | ResultKind::Scalar => {
            &series.points[series.points.len().saturating_sub(1)..]
        }
    };

    let Some(last) = points.last() else {
        return StatSummary {
            unit,
            ..StatSummary::default()
        };
    };

    let (min, max, sum) = points.iter().fold(
        (f64::INFINITY, f64::NEG_INFINITY, 0.0),
        |(min, max, sum), p| (min.min(p.value), max.max(p.value), sum + p.value),
    );

    StatSummary {
        min,
        max,
        avg: sum / points.len() as f64,
        current: last.value,
        count: points.len(),
        unit,
    }
}
