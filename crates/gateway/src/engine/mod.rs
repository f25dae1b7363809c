//! Derived metrics and alert evaluation over a Prometheus-compatible backend.
//!
//! Every operation is computed fresh from the live backend. Nothing is cached
//! between calls and nothing is retried: each candidate or rule gets a single
//! attempt within the request deadline.

pub mod alerts;
pub mod catalog;
pub mod client;
pub mod context;
pub mod health;
pub mod history;
pub mod query;
pub mod resolver;
pub mod snapshot;
pub mod stats;

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::info;

pub use alerts::{AlertReport, AlertRule, AlertState, AlertStatus, AlertSource, Comparator, Severity};
pub use client::{PrometheusClient, QueryBackend};
pub use context::{Deadline, QueryContext};
pub use health::{classify, HealthInputs, HealthStatus};
pub use history::{MetricHistory, TimeRange};
pub use query::{BackendError, LabeledSeries, MetricQuery, QueryKind, QueryResult, ResultKind, SeriesPoint};
pub use resolver::{CandidateResolver, Resolution};
pub use snapshot::{ServiceSnapshot, SystemOverview};
pub use stats::StatSummary;

use crate::config::PrometheusConfig;
use crate::metrics::Reporter;
use crate::{Error, Result};

const MAX_QUERY_LENGTH: usize = 1000;

fn service_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.:\-]{0,127}$").expect("service name pattern is valid")
    })
}

/// Reject service names that could break out of a label matcher.
pub fn validate_service_name(service: &str) -> Result<()> {
    if service_name_pattern().is_match(service) {
        Ok(())
    } else {
        Err(Error::Caller(format!(
            "Invalid service name '{}': use letters, digits, '_', '.', ':' or '-'",
            service
        )))
    }
}

/// Basic checks on a caller-supplied expression.
pub fn validate_expression(expression: &str) -> Result<()> {
    if expression.trim().is_empty() {
        return Err(Error::Caller("Query must not be empty".to_string()));
    }
    if expression.contains(';') || expression.contains("&&") || expression.contains("||") {
        return Err(Error::Caller("Invalid characters in PromQL query".to_string()));
    }
    if expression.len() > MAX_QUERY_LENGTH {
        return Err(Error::Caller(format!(
            "Query too long (max {} characters)",
            MAX_QUERY_LENGTH
        )));
    }
    Ok(())
}

/// Entry point for the caller-facing metrics operations.
#[derive(Clone)]
pub struct MetricsEngine {
    backend: Arc<dyn QueryBackend>,
    reporter: Arc<dyn Reporter>,
    config: PrometheusConfig,
    rules: Arc<Vec<AlertRule>>,
}

impl MetricsEngine {
    /// Fails once, up front, when the backend endpoint is unusable.
    pub fn new(config: &PrometheusConfig, reporter: Arc<dyn Reporter>) -> Result<Self> {
        let client = PrometheusClient::from_config(config)?;
        info!(url = %client.base_url(), "Metrics engine configured");
        Ok(Self::with_backend(Arc::new(client), reporter, config.clone()))
    }

    pub fn with_backend(
        backend: Arc<dyn QueryBackend>,
        reporter: Arc<dyn Reporter>,
        config: PrometheusConfig,
    ) -> Self {
        Self {
            backend,
            reporter,
            config,
            rules: Arc::new(alerts::default_rules()),
        }
    }

    pub fn rules(&self) -> &[AlertRule] {
        &self.rules
    }

    /// Fresh context with its own deadline for one caller request.
    fn context(&self) -> QueryContext {
        QueryContext::new(
            self.backend.clone(),
            self.reporter.clone(),
            Deadline::new(self.config.request_deadline, self.config.query_timeout),
        )
    }

    pub async fn system_overview(&self) -> Result<SystemOverview> {
        Ok(snapshot::system_overview(&self.context()).await)
    }

    pub async fn service_metrics(&self, service: &str) -> Result<ServiceSnapshot> {
        validate_service_name(service)?;
        Ok(snapshot::service_snapshot(&self.context(), service).await)
    }

    pub async fn metric_history(&self, metric: &str, time_range: &str) -> Result<MetricHistory> {
        let time_range: TimeRange = time_range.parse()?;
        if catalog::history_candidates(metric).is_none() {
            validate_expression(metric)?;
        }
        Ok(history::metric_history(&self.context(), metric, time_range).await)
    }

    pub async fn alerts(&self) -> Result<AlertReport> {
        let context = self.context();
        Ok(alerts::AlertRuleEvaluator::new(&context)
            .evaluate(&self.rules)
            .await)
    }

    /// Single raw instant query. Backend failures are returned to the caller.
    pub async fn instant_query(
        &self,
        expression: &str,
        time: Option<DateTime<Utc>>,
    ) -> Result<QueryResult> {
        validate_expression(expression)?;
        let query = match time {
            Some(time) => MetricQuery::instant_at(expression, time),
            None => MetricQuery::instant(expression),
        };
        let result = self.context().run(&query).await?;
        Ok(result)
    }
}
