//! Metrics tools backed by the [`MetricsEngine`].

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{parse_args, Tool, ToolResult};
use crate::engine::{catalog, validate_service_name, MetricsEngine, TimeRange};
use crate::Result;

pub struct SystemOverviewTool {
    engine: MetricsEngine,
}

impl SystemOverviewTool {
    pub fn new(engine: MetricsEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for SystemOverviewTool {
    fn name(&self) -> &str {
        "get_system_overview"
    }

    fn description(&self) -> &str {
        "Current CPU, memory, disk, network and scrape-target overview. \
         Fields the backend cannot provide are omitted."
    }

    async fn execute(&self, _args: serde_json::Value) -> Result<ToolResult> {
        let overview = self.engine.system_overview().await?;
        ToolResult::ok(&overview)
    }
}

#[derive(Debug, Deserialize)]
struct ServiceArgs {
    service: String,
}

pub struct ServiceMetricsTool {
    engine: MetricsEngine,
}

impl ServiceMetricsTool {
    pub fn new(engine: MetricsEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for ServiceMetricsTool {
    fn name(&self) -> &str {
        "get_service_metrics"
    }

    fn description(&self) -> &str {
        "Request rate, error rate, latency, resource usage and health tier for one service. \
         Works with service, job or container label conventions."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "service": { "type": "string", "description": "Service, job or container name" }
            },
            "required": ["service"]
        })
    }

    fn validate(&self, args: &serde_json::Value) -> Result<()> {
        let args: ServiceArgs = parse_args(args)?;
        validate_service_name(&args.service)
    }

    async fn execute(&self, args: serde_json::Value) -> Result<ToolResult> {
        let args: ServiceArgs = parse_args(&args)?;
        let snapshot = self.engine.service_metrics(&args.service).await?;
        ToolResult::ok(&snapshot)
    }
}

#[derive(Debug, Deserialize)]
struct HistoryArgs {
    metric: String,
    #[serde(default = "default_time_range")]
    time_range: String,
}

fn default_time_range() -> String {
    TimeRange::OneHour.as_str().to_string()
}

pub struct MetricHistoryTool {
    engine: MetricsEngine,
}

impl MetricHistoryTool {
    pub fn new(engine: MetricsEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for MetricHistoryTool {
    fn name(&self) -> &str {
        "get_metric_history"
    }

    fn description(&self) -> &str {
        "Time series and min/max/avg/current summary for a named metric or PromQL expression \
         over 1h, 24h, 7d or 30d."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "metric": {
                    "type": "string",
                    "description": "Known metric name or PromQL expression",
                    "examples": catalog::HISTORY_METRICS
                },
                "time_range": {
                    "type": "string",
                    "enum": TimeRange::ALL.iter().map(TimeRange::as_str).collect::<Vec<_>>(),
                    "default": "1h"
                }
            },
            "required": ["metric"]
        })
    }

    fn validate(&self, args: &serde_json::Value) -> Result<()> {
        let args: HistoryArgs = parse_args(args)?;
        args.time_range.parse::<TimeRange>()?;
        Ok(())
    }

    async fn execute(&self, args: serde_json::Value) -> Result<ToolResult> {
        let args: HistoryArgs = parse_args(&args)?;
        let history = self
            .engine
            .metric_history(&args.metric, &args.time_range)
            .await?;
        ToolResult::ok(&history)
    }
}

pub struct AlertsTool {
    engine: MetricsEngine,
}

impl AlertsTool {
    pub fn new(engine: MetricsEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for AlertsTool {
    fn name(&self) -> &str {
        "get_alerts"
    }

    fn description(&self) -> &str {
        "Evaluate the built-in threshold rules and list alerts active in the backend."
    }

    async fn execute(&self, _args: serde_json::Value) -> Result<ToolResult> {
        let report = self.engine.alerts().await?;
        ToolResult::ok(&report)
    }
}
