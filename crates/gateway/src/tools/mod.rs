//! Tools Module
//!
//! Callable tools exposed to automation clients, and the registry that names,
//! validates and instruments them.

pub mod metrics;
pub mod promql;

pub use metrics::{AlertsTool, MetricHistoryTool, ServiceMetricsTool, SystemOverviewTool};
pub use promql::PromQLTool;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::engine::MetricsEngine;
use crate::metrics::Reporter;
use crate::{Error, Result};

/// Result from tool execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok<T: Serialize>(output: &T) -> Result<Self> {
        Ok(Self {
            success: true,
            output: serde_json::to_value(output)?,
            error: None,
        })
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: serde_json::Value::Null,
            error: Some(error.into()),
        }
    }
}

/// What a client sees when listing tools
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Common trait for all gateway tools
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool name
    fn name(&self) -> &str;

    /// Get the tool description for the client
    fn description(&self) -> &str;

    /// JSON schema of the accepted arguments
    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    /// Reject bad arguments before anything reaches a backend
    fn validate(&self, _args: &serde_json::Value) -> Result<()> {
        Ok(())
    }

    async fn execute(&self, args: serde_json::Value) -> Result<ToolResult>;
}

/// Decode tool arguments, treating `null` as an empty object.
pub(crate) fn parse_args<T: DeserializeOwned>(args: &serde_json::Value) -> Result<T> {
    let args = if args.is_null() {
        serde_json::json!({})
    } else {
        args.clone()
    };
    serde_json::from_value(args).map_err(|e| Error::Caller(format!("Invalid arguments: {}", e)))
}

pub struct ToolRegistry {
    prefix: String,
    tools: BTreeMap<String, Arc<dyn Tool>>,
    reporter: Arc<dyn Reporter>,
}

impl ToolRegistry {
    pub fn new(prefix: impl Into<String>, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            prefix: prefix.into(),
            tools: BTreeMap::new(),
            reporter,
        }
    }

    /// Registry with every metrics tool backed by `engine`.
    pub fn with_metrics_tools(
        prefix: impl Into<String>,
        engine: MetricsEngine,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        let mut registry = Self::new(prefix, reporter);
        registry.register(SystemOverviewTool::new(engine.clone()));
        registry.register(ServiceMetricsTool::new(engine.clone()));
        registry.register(MetricHistoryTool::new(engine.clone()));
        registry.register(AlertsTool::new(engine.clone()));
        registry.register(PromQLTool::new(engine));
        registry
    }

    /// Add a tool under the registry prefix
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        let name = format!("{}{}", self.prefix, tool.name());
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn reporter(&self) -> &Arc<dyn Reporter> {
        &self.reporter
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools
            .iter()
            .map(|(name, tool)| ToolDescriptor {
                name: name.clone(),
                description: tool.description().to_string(),
                input_schema: tool.input_schema(),
            })
            .collect()
    }

    /// Validate, execute and record one call by its prefixed name.
    pub async fn call(&self, name: &str, args: serde_json::Value) -> Result<ToolResult> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("Tool '{}'", name)))?;

        let started = Instant::now();
        let outcome = match tool.validate(&args) {
            Ok(()) => tool.execute(args).await,
            Err(e) => Err(e),
        };
        let elapsed = started.elapsed();

        let success = matches!(&outcome, Ok(result) if result.success);
        self.reporter.record_tool_call(name, elapsed, success);

        match &outcome {
            Ok(result) if result.success => {
                info!(tool = %name, elapsed_ms = elapsed.as_millis() as u64, "Tool call completed")
            }
            Ok(result) => warn!(tool = %name, error = ?result.error, "Tool call reported failure"),
            Err(e) => warn!(tool = %name, error = %e, "Tool call rejected"),
        }

        outcome
    }
}
