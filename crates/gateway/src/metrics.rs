//! Instrumentation sink for tool calls and backend queries.
//!
//! The gateway never owns a process-wide registry: callers inject a
//! [`Reporter`] and decide what happens to the measurements.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

use crate::{Error, Result};

/// Outcome label for a single backend query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
    Data,
    Empty,
    Failed,
}

impl QueryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryOutcome::Data => "data",
            QueryOutcome::Empty => "empty",
            QueryOutcome::Failed => "failed",
        }
    }
}

pub trait Reporter: Send + Sync {
    fn record_tool_call(&self, tool: &str, duration: Duration, success: bool);

    fn record_backend_query(&self, kind: &str, outcome: QueryOutcome, duration: Duration);

    /// Text exposition of everything recorded so far, if the sink keeps it.
    fn gather(&self) -> Result<String> {
        Ok(String::new())
    }
}

/// Discards every measurement.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl Reporter for NoopReporter {
    fn record_tool_call(&self, _tool: &str, _duration: Duration, _success: bool) {}

    fn record_backend_query(&self, _kind: &str, _outcome: QueryOutcome, _duration: Duration) {}
}

pub struct PrometheusReporter {
    registry: Registry,
    tool_calls: IntCounterVec,
    tool_call_duration: HistogramVec,
    backend_queries: IntCounterVec,
    backend_query_duration: HistogramVec,
}

impl PrometheusReporter {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let tool_calls = IntCounterVec::new(
            Opts::new("opsgateway_tool_calls_total", "Total number of tool invocations."),
            &["tool", "status"],
        )
        .map_err(metrics_error)?;
        let tool_call_duration = HistogramVec::new(
            HistogramOpts::new(
                "opsgateway_tool_call_duration_seconds",
                "Tool invocation latency in seconds.",
            ),
            &["tool"],
        )
        .map_err(metrics_error)?;
        let backend_queries = IntCounterVec::new(
            Opts::new(
                "opsgateway_backend_queries_total",
                "Total number of queries sent to the metrics backend.",
            ),
            &["kind", "outcome"],
        )
        .map_err(metrics_error)?;
        let backend_query_duration = HistogramVec::new(
            HistogramOpts::new(
                "opsgateway_backend_query_duration_seconds",
                "Metrics backend query latency in seconds.",
            ),
            &["kind"],
        )
        .map_err(metrics_error)?;

        registry
            .register(Box::new(tool_calls.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(tool_call_duration.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(backend_queries.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(backend_query_duration.clone()))
            .map_err(metrics_error)?;

        Ok(Self {
            registry,
            tool_calls,
            tool_call_duration,
            backend_queries,
            backend_query_duration,
        })
    }
}

impl Reporter for PrometheusReporter {
    fn record_tool_call(&self, tool: &str, duration: Duration, success: bool) {
        let status = if success { "success" } else { "error" };
        self.tool_calls.with_label_values(&[tool, status]).inc();
        self.tool_call_duration
            .with_label_values(&[tool])
            .observe(duration.as_secs_f64());
    }

    fn record_backend_query(&self, kind: &str, outcome: QueryOutcome, duration: Duration) {
        self.backend_queries
            .with_label_values(&[kind, outcome.as_str()])
            .inc();
        self.backend_query_duration
            .with_label_values(&[kind])
            .observe(duration.as_secs_f64());
    }

    fn gather(&self) -> Result<String> {
        let mut buffer = vec![];
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(metrics_error)?;
        String::from_utf8(buffer).map_err(|e| Error::Internal(format!("Invalid metrics encoding: {}", e)))
    }
}

fn metrics_error(e: prometheus::Error) -> Error {
    Error::Internal(format!("Metrics registry error: {}", e))
}
