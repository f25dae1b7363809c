//! Field-by-field composition of independent metric resolutions.
//!
//! A snapshot never fails as a whole: every field resolves on its own and a
//! field that errors or has no data is simply left out.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::catalog;
use super::context::QueryContext;
use super::health::{classify, HealthInputs, HealthStatus};
use super::query::{MetricQuery, QueryResult};
use super::resolver::{CandidateResolver, Resolution};

pub const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

pub fn bytes_to_gb(bytes: f64) -> f64 {
    bytes / BYTES_PER_GB
}

/// One named field and the candidate expressions that can produce it.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub candidates: Vec<String>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, candidates: &[&str]) -> Self {
        Self {
            name: name.into(),
            candidates: candidates.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// A field backed by exactly one expression.
    pub fn query(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            candidates: vec![expression.into()],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedField {
    pub expression: String,
    pub result: QueryResult,
}

/// Fields that resolved. Anything that did not is absent from the map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedFields {
    fields: BTreeMap<String, ResolvedField>,
    missing: Vec<String>,
}

impl ResolvedFields {
    pub fn get(&self, name: &str) -> Option<&ResolvedField> {
        self.fields.get(name)
    }

    /// Current value of the field's first series that has a point.
    pub fn value(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|f| f.result.current_value())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Names of requested fields that did not resolve, in request order.
    pub fn missing(&self) -> &[String] {
        &self.missing
    }

    /// Plain name to value map of every resolved field.
    pub fn values(&self) -> BTreeMap<String, f64> {
        self.fields
            .iter()
            .filter_map(|(name, field)| field.result.current_value().map(|v| (name.clone(), v)))
            .collect()
    }
}

pub struct SnapshotAggregator<'a> {
    context: &'a QueryContext,
}

impl<'a> SnapshotAggregator<'a> {
    pub fn new(context: &'a QueryContext) -> Self {
        Self { context }
    }

    /// Resolve every field concurrently as instant queries.
    pub async fn aggregate(&self, fields: &[FieldSpec], params: &[(&str, &str)]) -> ResolvedFields {
        self.aggregate_with_shape(fields, params, &MetricQuery::instant(""))
            .await
    }

    pub async fn aggregate_with_shape(
        &self,
        fields: &[FieldSpec],
        params: &[(&str, &str)],
        shape: &MetricQuery,
    ) -> ResolvedFields {
        let resolver = CandidateResolver::new(self.context);

        let resolutions = join_all(fields.iter().map(|field| {
            let resolver = &resolver;
            async move {
                let resolution = resolver.resolve(&field.candidates, params, shape).await;
                (field.name.clone(), resolution)
            }
        }))
        .await;

        let mut resolved = ResolvedFields::default();
        for (name, resolution) in resolutions {
            match resolution {
                Resolution::Found { result, expression } => {
                    resolved
                        .fields
                        .insert(name, ResolvedField { expression, result });
                }
                Resolution::NoData => {
                    debug!(field = %name, "Field unavailable, omitting from snapshot");
                    resolved.missing.push(name);
                }
            }
        }

        resolved
    }
}

/// Capacity of a byte-valued resource, reported in gigabytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CapacitySnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_gb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_gb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_gb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_percent: Option<f64>,
}

impl CapacitySnapshot {
    /// Derive used and usage only when their operands resolved.
    pub fn from_bytes(total: Option<f64>, available: Option<f64>) -> Self {
        let used = match (total, available) {
            (Some(total), Some(available)) => Some(total - available),
            _ => None,
        };
        let usage_percent = match (used, total) {
            (Some(used), Some(total)) if total > 0.0 => Some(used / total * 100.0),
            _ => None,
        };

        Self {
            total_gb: total.map(bytes_to_gb),
            available_gb: available.map(bytes_to_gb),
            used_gb: used.map(bytes_to_gb),
            usage_percent,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cores: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_average_1m: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receive_bytes_per_sec: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transmit_bytes_per_sec: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub up: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemOverview {
    pub timestamp: DateTime<Utc>,
    pub cpu: CpuSnapshot,
    pub memory: CapacitySnapshot,
    pub disk: CapacitySnapshot,
    pub network: NetworkSnapshot,
    pub targets: TargetSnapshot,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSnapshot {
    pub service: String,
    pub timestamp: DateTime<Utc>,
    pub metrics: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_codes: Option<BTreeMap<String, i64>>,
    pub health: HealthStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_fields: Vec<String>,
}

fn overview_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new("cpu_usage_percent", catalog::CPU_USAGE_PERCENT),
        FieldSpec::new("cpu_cores", catalog::CPU_CORES),
        FieldSpec::new("load_average_1m", catalog::LOAD_AVERAGE_1M),
        FieldSpec::new("memory_total_bytes", catalog::MEMORY_TOTAL_BYTES),
        FieldSpec::new("memory_available_bytes", catalog::MEMORY_AVAILABLE_BYTES),
        FieldSpec::new("disk_total_bytes", catalog::DISK_TOTAL_BYTES),
        FieldSpec::new("disk_available_bytes", catalog::DISK_AVAILABLE_BYTES),
        FieldSpec::new("network_receive_bytes", catalog::NETWORK_RECEIVE_BYTES),
        FieldSpec::new("network_transmit_bytes", catalog::NETWORK_TRANSMIT_BYTES),
        FieldSpec::new("targets_up", catalog::TARGETS_UP),
        FieldSpec::new("targets_total", catalog::TARGETS_TOTAL),
    ]
}

/// Build the host-level overview from the fields that resolved.
pub fn build_overview(fields: &ResolvedFields) -> SystemOverview {
    SystemOverview {
        timestamp: Utc::now(),
        cpu: CpuSnapshot {
            usage_percent: fields.value("cpu_usage_percent"),
            cores: fields.value("cpu_cores"),
            load_average_1m: fields.value("load_average_1m"),
        },
        memory: CapacitySnapshot::from_bytes(
            fields.value("memory_total_bytes"),
            fields.value("memory_available_bytes"),
        ),
        disk: CapacitySnapshot::from_bytes(
            fields.value("disk_total_bytes"),
            fields.value("disk_available_bytes"),
        ),
        network: NetworkSnapshot {
            receive_bytes_per_sec: fields.value("network_receive_bytes"),
            transmit_bytes_per_sec: fields.value("network_transmit_bytes"),
        },
        targets: TargetSnapshot {
            up: fields.value("targets_up"),
            total: fields.value("targets_total"),
        },
        missing_fields: fields.missing().to_vec(),
    }
}

pub async fn system_overview(context: &QueryContext) -> SystemOverview {
    let fields = SnapshotAggregator::new(context)
        .aggregate(&overview_fields(), &[])
        .await;

    info!(
        resolved = fields.len(),
        missing = fields.missing().len(),
        "Built system overview"
    );

    build_overview(&fields)
}

fn service_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new("request_rate", catalog::SERVICE_REQUEST_RATE),
        FieldSpec::new("error_rate_percent", catalog::SERVICE_ERROR_RATE_PERCENT),
        FieldSpec::new("response_time_ms", catalog::SERVICE_RESPONSE_TIME_MS),
        FieldSpec::new("cpu_percent", catalog::SERVICE_CPU_PERCENT),
        FieldSpec::new("memory_bytes", catalog::SERVICE_MEMORY_BYTES),
        FieldSpec::new("up", catalog::SERVICE_UP),
        FieldSpec::new("status_codes", catalog::SERVICE_STATUS_CODES),
    ]
}

/// Per-status-code request counts, keyed by whichever status label the
/// exporter uses.
pub fn status_code_counts(result: &QueryResult) -> Option<BTreeMap<String, i64>> {
    let mut counts = BTreeMap::new();

    for series in &result.series {
        let Some(code) = catalog::STATUS_CODE_LABELS
            .iter()
            .find_map(|label| series.label(label))
        else {
            continue;
        };
        if let Some(value) = series.current() {
            *counts.entry(code.to_string()).or_insert(0) += value.round() as i64;
        }
    }

    if counts.is_empty() {
        None
    } else {
        Some(counts)
    }
}

/// Build a service snapshot from the fields that resolved.
pub fn build_service_snapshot(service: &str, fields: &ResolvedFields) -> ServiceSnapshot {
    let mut metrics = BTreeMap::new();
    for name in ["request_rate", "error_rate_percent", "response_time_ms", "cpu_percent", "up"] {
        if let Some(value) = fields.value(name) {
            metrics.insert(name.to_string(), value);
        }
    }
    if let Some(bytes) = fields.value("memory_bytes") {
        metrics.insert("memory_gb".to_string(), bytes_to_gb(bytes));
    }

    let status_codes = fields
        .get("status_codes")
        .and_then(|field| status_code_counts(&field.result));

    let health = classify(&HealthInputs {
        error_rate_percent: metrics.get("error_rate_percent").copied(),
        cpu_percent: metrics.get("cpu_percent").copied(),
        response_time_ms: metrics.get("response_time_ms").copied(),
    });

    ServiceSnapshot {
        service: service.to_string(),
        timestamp: Utc::now(),
        metrics,
        status_codes,
        health,
        missing_fields: fields.missing().to_vec(),
    }
}

pub async fn service_snapshot(context: &QueryContext, service: &str) -> ServiceSnapshot {
    let fields = SnapshotAggregator::new(context)
        .aggregate(&service_fields(), &[("service", service)])
        .await;

    let snapshot = build_service_snapshot(service, &fields);
    info!(
        service = %service,
        health = ?snapshot.health,
        resolved = fields.len(),
        "Built service snapshot"
    );
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::client::{MockQueryBackend, QueryBackend};
    use crate::engine::context::Deadline;
    use crate::engine::query::{BackendError, LabeledSeries, ResultKind, SeriesPoint};
    use crate::metrics::NoopReporter;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    /// Answers by exact expression; anything unknown is an empty vector.
    struct FakeBackend {
        values: HashMap<String, f64>,
        failing: Vec<String>,
    }

    impl FakeBackend {
        fn new(values: &[(&str, f64)]) -> Self {
            Self {
                values: values.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
                failing: Vec::new(),
            }
        }

        fn failing(mut self, expression: &str) -> Self {
            self.failing.push(expression.to_string());
            self
        }
    }

    #[async_trait]
    impl QueryBackend for FakeBackend {
        async fn execute(
            &self,
            query: &MetricQuery,
            _timeout: Duration,
        ) -> Result<QueryResult, BackendError> {
            if self.failing.contains(&query.expression) {
                return Err(BackendError::Transport("connection reset".into()));
            }
            Ok(match self.values.get(&query.expression) {
                Some(value) => vector(&[], *value),
                None => QueryResult::empty(ResultKind::Vector),
            })
        }
    }

    fn vector(labels: &[(&str, &str)], value: f64) -> QueryResult {
        QueryResult {
            result_kind: ResultKind::Vector,
            series: vec![series(labels, value)],
        }
    }

    fn series(labels: &[(&str, &str)], value: f64) -> LabeledSeries {
        LabeledSeries {
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            points: vec![SeriesPoint {
                timestamp: 1_700_000_000.0,
                value,
            }],
        }
    }

    fn context(backend: FakeBackend) -> QueryContext {
        QueryContext::new(
            Arc::new(backend),
            Arc::new(NoopReporter),
            Deadline::new(Duration::from_secs(5), Duration::from_secs(5)),
        )
    }

    const GB: f64 = BYTES_PER_GB;

    #[tokio::test]
    async fn test_failed_field_does_not_abort_others() {
        let backend = FakeBackend::new(&[("good", 1.0), ("also_good", 2.0)]).failing("bad");
        let ctx = context(backend);

        let fields = SnapshotAggregator::new(&ctx)
            .aggregate(
                &[
                    FieldSpec::query("a", "good"),
                    FieldSpec::query("b", "bad"),
                    FieldSpec::new("c", &["missing", "also_good"]),
                ],
                &[],
            )
            .await;

        assert_eq!(fields.value("a"), Some(1.0));
        assert!(!fields.contains("b"));
        assert_eq!(fields.value("c"), Some(2.0));
        assert_eq!(fields.get("c").unwrap().expression, "also_good");
        assert_eq!(fields.missing(), &["b".to_string()]);
        assert_eq!(fields.values().len(), 2);
    }

    #[tokio::test]
    async fn test_leading_empty_series_still_yields_value() {
        let mut backend = MockQueryBackend::new();
        backend.expect_execute().returning(|_, _| {
            Ok(QueryResult {
                result_kind: ResultKind::Vector,
                series: vec![LabeledSeries::default(), series(&[("instance", "b")], 5.0)],
            })
        });
        let ctx = QueryContext::new(
            Arc::new(backend),
            Arc::new(NoopReporter),
            Deadline::new(Duration::from_secs(5), Duration::from_secs(5)),
        );

        let overview = system_overview(&ctx).await;
        assert_eq!(overview.cpu.usage_percent, Some(5.0));
        assert_eq!(overview.targets.total, Some(5.0));
        assert!(overview.missing_fields.is_empty());
    }

    #[test]
    fn test_capacity_derivation() {
        let capacity = CapacitySnapshot::from_bytes(Some(16.0 * GB), Some(4.0 * GB));
        assert_eq!(capacity.total_gb, Some(16.0));
        assert_eq!(capacity.available_gb, Some(4.0));
        assert_eq!(capacity.used_gb, Some(12.0));
        assert_eq!(capacity.usage_percent, Some(75.0));
    }

    #[test]
    fn test_capacity_without_available_omits_derived_fields() {
        let capacity = CapacitySnapshot::from_bytes(Some(16.0 * GB), None);
        assert_eq!(capacity.total_gb, Some(16.0));
        assert_eq!(capacity.used_gb, None);
        assert_eq!(capacity.usage_percent, None);

        let json = serde_json::to_value(capacity).unwrap();
        assert_eq!(json, serde_json::json!({"total_gb": 16.0}));
    }

    #[test]
    fn test_capacity_with_zero_total_omits_usage() {
        let capacity = CapacitySnapshot::from_bytes(Some(0.0), Some(0.0));
        assert_eq!(capacity.used_gb, Some(0.0));
        assert_eq!(capacity.usage_percent, None);
    }

    #[tokio::test]
    async fn test_overview_with_partial_memory() {
        let backend = FakeBackend::new(&[
            ("sum(node_memory_MemTotal_bytes)", 8.0 * GB),
            ("count(up)", 3.0),
            ("sum(up)", 2.0),
        ])
        .failing("sum(node_memory_MemAvailable_bytes)");
        let ctx = context(backend);

        let overview = system_overview(&ctx).await;
        assert_eq!(overview.memory.total_gb, Some(8.0));
        assert_eq!(overview.memory.available_gb, None);
        assert_eq!(overview.memory.used_gb, None);
        assert_eq!(overview.memory.usage_percent, None);
        assert_eq!(overview.targets.up, Some(2.0));
        assert_eq!(overview.targets.total, Some(3.0));
        assert_eq!(overview.cpu.usage_percent, None);
        assert!(overview.missing_fields.contains(&"memory_available_bytes".to_string()));

        let json = serde_json::to_value(&overview).unwrap();
        assert_eq!(json["memory"], serde_json::json!({"total_gb": 8.0}));
        assert_eq!(json["cpu"], serde_json::json!({}));
    }

    #[test]
    fn test_status_code_counts_uses_any_status_label() {
        let result = QueryResult {
            result_kind: ResultKind::Vector,
            series: vec![
                series(&[("code", "200")], 1200.4),
                series(&[("code", "500")], 3.0),
                series(&[("status", "404")], 7.6),
                series(&[("instance", "a")], 99.0),
            ],
        };

        let counts = status_code_counts(&result).unwrap();
        assert_eq!(counts.get("200"), Some(&1200));
        assert_eq!(counts.get("500"), Some(&3));
        assert_eq!(counts.get("404"), Some(&8));
        assert_eq!(counts.len(), 3);

        assert_eq!(status_code_counts(&QueryResult::empty(ResultKind::Vector)), None);
    }

    #[tokio::test]
    async fn test_service_snapshot_uses_job_label_fallback() {
        let backend = FakeBackend::new(&[
            (r#"sum(rate(http_requests_total{job="checkout"}[5m]))"#, 25.0),
            (
                r#"sum(rate(http_requests_total{job="checkout",status=~"5.."}[5m])) / sum(rate(http_requests_total{job="checkout"}[5m])) * 100"#,
                12.5,
            ),
            (r#"sum(container_memory_working_set_bytes{container="checkout"})"#, 0.5 * GB),
        ]);
        let ctx = context(backend);

        let snapshot = service_snapshot(&ctx, "checkout").await;
        assert_eq!(snapshot.service, "checkout");
        assert_eq!(snapshot.metrics.get("request_rate"), Some(&25.0));
        assert_eq!(snapshot.metrics.get("error_rate_percent"), Some(&12.5));
        assert_eq!(snapshot.metrics.get("memory_gb"), Some(&0.5));
        assert!(!snapshot.metrics.contains_key("cpu_percent"));
        assert_eq!(snapshot.status_codes, None);
        assert_eq!(snapshot.health, HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_service_snapshot_with_no_data_is_healthy_and_empty() {
        let ctx = context(FakeBackend::new(&[]));
        let snapshot = service_snapshot(&ctx, "ghost").await;
        assert!(snapshot.metrics.is_empty());
        assert_eq!(snapshot.health, HealthStatus::Healthy);
        assert_eq!(snapshot.missing_fields.len(), 7);
    }
}
