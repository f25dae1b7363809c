//! HTTP client for a Prometheus-compatible query API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::query::{parse_response, BackendError, MetricQuery, QueryKind, QueryResult};
use crate::config::PrometheusConfig;

/// Executes a single query against the metrics backend.
///
/// Implementations must not retry and must not keep state between calls.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueryBackend: Send + Sync {
    async fn execute(
        &self,
        query: &MetricQuery,
        timeout: Duration,
    ) -> Result<QueryResult, BackendError>;
}

pub struct PrometheusClient {
    prometheus_url: String,
    client: Client,
    auth_token: Option<String>,
}

impl PrometheusClient {
    pub fn new(prometheus_url: impl Into<String>) -> Self {
        Self {
            prometheus_url: prometheus_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
            auth_token: None,
        }
    }

    pub fn from_config(config: &PrometheusConfig) -> crate::Result<Self> {
        config.validate()?;

        let mut client = Self::new(config.url.clone());
        if let Some(token) = &config.auth_token {
            client = client.with_auth_token(token.clone());
        }
        Ok(client)
    }

    /// Set authentication token
    pub fn with_auth_token(mut self, token: String) -> Self {
        self.auth_token = Some(token);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.prometheus_url
    }

    fn params(query: &MetricQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![("query", query.expression.clone())];

        match query.kind {
            QueryKind::Instant => {
                if let Some(time) = query.start {
                    params.push(("time", unix_seconds(time)));
                }
            }
            QueryKind::Range => {
                let end = query.end.unwrap_or_else(Utc::now);
                let start = query.start.unwrap_or(end);
                params.push(("start", unix_seconds(start)));
                params.push(("end", unix_seconds(end)));
                params.push(("step", query.effective_step().as_secs().max(1).to_string()));
            }
        }

        params
    }
}

fn unix_seconds(time: DateTime<Utc>) -> String {
    let millis = time.timestamp_millis();
    if millis % 1000 == 0 {
        (millis / 1000).to_string()
    } else {
        format!("{:.3}", millis as f64 / 1000.0)
    }
}

#[async_trait]
impl QueryBackend for PrometheusClient {
    async fn execute(
        &self,
        query: &MetricQuery,
        timeout: Duration,
    ) -> Result<QueryResult, BackendError> {
        let path = match query.kind {
            QueryKind::Instant => "query",
            QueryKind::Range => "query_range",
        };
        let url = format!("{}/api/v1/{}", self.prometheus_url, path);

        debug!(kind = query.kind.as_str(), expression = %query.expression, "Querying metrics backend");

        let mut request = self
            .client
            .get(&url)
            .query(&Self::params(query))
            .timeout(timeout);

        if let Some(token) = &self.auth_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout
            } else {
                BackendError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        parse_response(&body)
    }
}
