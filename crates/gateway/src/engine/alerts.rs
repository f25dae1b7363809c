//! Threshold alert evaluation against live values.
//!
//! Local rules come from a fixed catalog. Alerts the backend already knows
//! about (the `ALERTS` series) are appended as a separate, independent view.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

use super::catalog::ACTIVE_ALERTS;
use super::context::QueryContext;
use super::query::{LabeledSeries, MetricQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    GreaterThan,
    LessThan,
}

impl Comparator {
    pub fn breached(&self, value: f64, threshold: f64) -> bool {
        match self {
            Comparator::GreaterThan => value > threshold,
            Comparator::LessThan => value < threshold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Critical,
}

impl Severity {
    fn from_label(label: Option<&str>) -> Self {
        match label.map(str::to_lowercase).as_deref() {
            Some("critical") | Some("page") | Some("error") => Severity::Critical,
            _ => Severity::Warning,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub name: String,
    pub expression: String,
    pub threshold: f64,
    pub comparator: Comparator,
    pub severity: Severity,
}

impl AlertRule {
    pub fn new(
        name: &str,
        expression: &str,
        comparator: Comparator,
        threshold: f64,
        severity: Severity,
    ) -> Self {
        Self {
            name: name.to_string(),
            expression: expression.to_string(),
            threshold,
            comparator,
            severity,
        }
    }
}

/// The built-in rule catalog.
pub fn default_rules() -> Vec<AlertRule> {
    vec![
        AlertRule::new(
            "HighCpuUsage",
            r#"100 - (avg(rate(node_cpu_seconds_total{mode="idle"}[5m])) * 100)"#,
            Comparator::GreaterThan,
            80.0,
            Severity::Warning,
        ),
        AlertRule::new(
            "HighMemoryUsage",
            "(1 - sum(node_memory_MemAvailable_bytes) / sum(node_memory_MemTotal_bytes)) * 100",
            Comparator::GreaterThan,
            85.0,
            Severity::Warning,
        ),
        AlertRule::new(
            "DiskSpaceLow",
            r#"(1 - sum(node_filesystem_avail_bytes{fstype!~"tmpfs|overlay|squashfs",mountpoint="/"}) / sum(node_filesystem_size_bytes{fstype!~"tmpfs|overlay|squashfs",mountpoint="/"})) * 100"#,
            Comparator::GreaterThan,
            90.0,
            Severity::Critical,
        ),
        AlertRule::new(
            "HighLoadAverage",
            r#"avg(node_load1) / count(node_cpu_seconds_total{mode="idle"})"#,
            Comparator::GreaterThan,
            2.0,
            Severity::Warning,
        ),
        AlertRule::new(
            "TargetDown",
            "min(up)",
            Comparator::LessThan,
            1.0,
            Severity::Critical,
        ),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertState {
    Ok,
    Firing,
    Unknown,
    NoData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSource {
    Local,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertStatus {
    pub rule: AlertRule,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_value: Option<f64>,
    pub state: AlertState,
    pub source: AlertSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertReport {
    pub evaluated_at: DateTime<Utc>,
    pub alerts: Vec<AlertStatus>,
    pub firing_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_error: Option<String>,
}

pub struct AlertRuleEvaluator<'a> {
    context: &'a QueryContext,
}

impl<'a> AlertRuleEvaluator<'a> {
    pub fn new(context: &'a QueryContext) -> Self {
        Self { context }
    }

    /// Evaluate every rule, then append the backend's own active alerts.
    pub async fn evaluate(&self, rules: &[AlertRule]) -> AlertReport {
        let local = join_all(rules.iter().map(|rule| self.evaluate_rule(rule)));
        let (local, remote) = tokio::join!(local, self.remote_alerts());

        let mut alerts = local;
        let remote_error = match remote {
            Ok(remote) => {
                alerts.extend(remote);
                None
            }
            Err(e) => {
                warn!(error = %e, "Could not fetch active alerts from backend");
                Some(e)
            }
        };

        let firing_count = alerts
            .iter()
            .filter(|a| a.state == AlertState::Firing)
            .count();

        info!(
            rules = rules.len(),
            total = alerts.len(),
            firing = firing_count,
            "Evaluated alerts"
        );

        AlertReport {
            evaluated_at: Utc::now(),
            alerts,
            firing_count,
            remote_error,
        }
    }

    pub async fn evaluate_rule(&self, rule: &AlertRule) -> AlertStatus {
        let mut status = AlertStatus {
            rule: rule.clone(),
            current_value: None,
            state: AlertState::NoData,
            source: AlertSource::Local,
            labels: None,
            error: None,
        };

        match self
            .context
            .run(&MetricQuery::instant(rule.expression.clone()))
            .await
        {
            Err(e) => {
                status.state = AlertState::Unknown;
                status.error = Some(e.to_string());
            }
            Ok(result) => {
                if let Some(value) = result.first_value() {
                    status.current_value = Some(value);
                    status.state = if rule.comparator.breached(value, rule.threshold) {
                        AlertState::Firing
                    } else {
                        AlertState::Ok
                    };
                }
            }
        }

        status
    }

    async fn remote_alerts(&self) -> Result<Vec<AlertStatus>, String> {
        let result = self
            .context
            .run(&MetricQuery::instant(ACTIVE_ALERTS))
            .await
            .map_err(|e| e.to_string())?;

        Ok(result.series.iter().map(remote_status).collect())
    }
}

fn remote_status(series: &LabeledSeries) -> AlertStatus {
    let value = series.current();
    let name = series.label("alertname").unwrap_or(ACTIVE_ALERTS).to_string();

    // Zero means resolved. Pending alerts have not fired yet, their
    // `alertstate` label stays visible to the caller.
    let state = match value {
        None => AlertState::NoData,
        Some(v) if v == 0.0 => AlertState::Ok,
        Some(_) if series.label("alertstate") == Some("pending") => AlertState::Ok,
        Some(_) => AlertState::Firing,
    };

    AlertStatus {
        rule: AlertRule {
            name,
            expression: ACTIVE_ALERTS.to_string(),
            threshold: 0.0,
            comparator: Comparator::GreaterThan,
            severity: Severity::from_label(series.label("severity")),
        },
        current_value: value,
        state,
        source: AlertSource::Remote,
        labels: Some(series.labels.clone()),
        error: None,
    }
}
