//! PromQL Tool for raw Prometheus queries
//!
//! Escape hatch for questions the derived tools do not answer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{parse_args, Tool, ToolResult};
use crate::engine::{validate_expression, LabeledSeries, MetricsEngine, QueryResult, ResultKind};
use crate::{Error, Result};

/// PromQL tool for instant queries
pub struct PromQLTool {
    engine: MetricsEngine,
}

impl PromQLTool {
    pub fn new(engine: MetricsEngine) -> Self {
        Self { engine }
    }
}

#[derive(Debug, Deserialize)]
struct QueryArgs {
    query: String,
    /// RFC 3339 evaluation time, defaults to now
    #[serde(default)]
    time: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct QueryOutput {
    result_type: ResultKind,
    series: Vec<LabeledSeries>,
    text: String,
}

#[async_trait]
impl Tool for PromQLTool {
    fn name(&self) -> &str {
        "query_metrics"
    }

    fn description(&self) -> &str {
        "Run a PromQL instant query like 'up{job=\"node\"}' or \
         'rate(http_requests_total[5m])'. Returns metric values and labels."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "PromQL expression" },
                "time": { "type": "string", "format": "date-time" }
            },
            "required": ["query"]
        })
    }

    fn validate(&self, args: &serde_json::Value) -> Result<()> {
        let args: QueryArgs = parse_args(args)?;
        validate_expression(&args.query)
    }

    async fn execute(&self, args: serde_json::Value) -> Result<ToolResult> {
        let args: QueryArgs = parse_args(&args)?;
        let result = match self.engine.instant_query(&args.query, args.time).await {
            Ok(result) => result,
            Err(Error::Backend(e)) => return Ok(ToolResult::failed(e.to_string())),
            Err(e) => return Err(e),
        };
        let text = format_result(&result);
        ToolResult::ok(&QueryOutput {
            result_type: result.result_kind,
            series: result.series,
            text,
        })
    }
}

/// Human-readable rendering of a query result
fn format_result(result: &QueryResult) -> String {
    if !result.has_data() {
        return "No data found for the query".to_string();
    }

    let mut output = String::new();
    for series in &result.series {
        if !series.labels.is_empty() {
            let labels: Vec<String> = series
                .labels
                .iter()
                .map(|(k, v)| format!("{}=\"{}\"", k, v))
                .collect();
            output.push_str(&format!("{{{}}}", labels.join(", ")));
        } else {
            output.push_str("{}");
        }

        match series.points.as_slice() {
            [point] => output.push_str(&format!(" => {} @ {}\n", point.value, point.timestamp)),
            points => {
                output.push('\n');
                for point in points {
                    output.push_str(&format!("  {} @ {}\n", point.value, point.timestamp));
                }
            }
        }
    }

    output
}
