//! First-success resolution over semantically equivalent expressions.
//!
//! Exporters name the same metric differently (`service="x"` vs `job="x"`,
//! histogram vs counter). Callers list every known spelling in preference
//! order and the first one that returns data wins. No scoring, no merging.

use tracing::debug;

use super::context::QueryContext;
use super::query::{MetricQuery, QueryResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Found {
        result: QueryResult,
        expression: String,
    },
    NoData,
}

impl Resolution {
    pub fn result(&self) -> Option<&QueryResult> {
        match self {
            Resolution::Found { result, .. } => Some(result),
            Resolution::NoData => None,
        }
    }

    pub fn expression(&self) -> Option<&str> {
        match self {
            Resolution::Found { expression, .. } => Some(expression),
            Resolution::NoData => None,
        }
    }

    /// Current value of the first series with a point, if anything resolved.
    pub fn value(&self) -> Option<f64> {
        self.result().and_then(QueryResult::current_value)
    }
}

/// Substitute `{{name}}` placeholders in a candidate template.
pub fn render(template: &str, params: &[(&str, &str)]) -> String {
    params
        .iter()
        .fold(template.to_string(), |acc, (key, value)| {
            acc.replace(&format!("{{{{{}}}}}", key), value)
        })
}

pub struct CandidateResolver<'a> {
    context: &'a QueryContext,
}

impl<'a> CandidateResolver<'a> {
    pub fn new(context: &'a QueryContext) -> Self {
        Self { context }
    }

    /// Try each candidate in order using the time parameters of `shape`.
    pub async fn resolve<S: AsRef<str>>(
        &self,
        candidates: &[S],
        params: &[(&str, &str)],
        shape: &MetricQuery,
    ) -> Resolution {
        for (index, template) in candidates.iter().enumerate() {
            let expression = render(template.as_ref(), params);
            let query = shape.with_expression(expression.clone());

            match self.context.run(&query).await {
                Ok(result) if result.has_data() => {
                    debug!(candidate = index, expression = %expression, "Candidate resolved");
                    return Resolution::Found { result, expression };
                }
                Ok(_) => {
                    debug!(candidate = index, expression = %expression, "Candidate returned no data");
                }
                Err(e) => {
                    debug!(candidate = index, expression = %expression, error = %e, "Candidate failed");
                }
            }

            if self.context.deadline().expired() {
                debug!("Request deadline reached, abandoning remaining candidates");
                break;
            }
        }

        Resolution::NoData
    }

    pub async fn resolve_instant<S: AsRef<str>>(
        &self,
        candidates: &[S],
        params: &[(&str, &str)],
    ) -> Resolution {
        self.resolve(candidates, params, &MetricQuery::instant(""))
            .await
    }
}
