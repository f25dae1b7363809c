use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[serde(rename = "pretty")]
    #[default]
    Pretty,
    #[serde(rename = "json")]
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub prometheus: PrometheusConfig,
    pub tools: ToolsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrometheusConfig {
    pub url: String,
    pub auth_token: Option<String>,
    /// Upper bound for a single backend query
    pub query_timeout: Duration,
    /// Budget for a whole tool call, shared by every query it fans out to
    pub request_deadline: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolsConfig {
    pub prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl PrometheusConfig {
    /// Reject an unset or unparseable backend endpoint.
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::Config("PROMETHEUS_URL must be set".to_string()));
        }

        let parsed = Url::parse(&self.url)
            .map_err(|e| Error::Config(format!("PROMETHEUS_URL is not a valid URL: {}", e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "PROMETHEUS_URL must use http or https, got {}",
                parsed.scheme()
            )));
        }

        if self.query_timeout.is_zero() || self.request_deadline.is_zero() {
            return Err(Error::Config("Timeouts must be greater than zero".to_string()));
        }

        Ok(())
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load environment variables from .env file if it exists
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secs = |key: &str, default: u64| -> Result<Duration> {
            match lookup(key) {
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|_| Error::Config(format!("{} must be a whole number of seconds", key))),
                None => Ok(Duration::from_secs(default)),
            }
        };

        let config = Config {
            server: ServerConfig {
                addr: lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            },
            prometheus: PrometheusConfig {
                url: lookup("PROMETHEUS_URL")
                    .map(|url| url.trim_end_matches('/').to_string())
                    .unwrap_or_default(),
                auth_token: lookup("PROMETHEUS_TOKEN").filter(|token| !token.is_empty()),
                query_timeout: secs("PROMETHEUS_QUERY_TIMEOUT_SECS", 30)?,
                request_deadline: secs("REQUEST_DEADLINE_SECS", 45)?,
            },
            tools: ToolsConfig {
                prefix: lookup("TOOL_PREFIX").unwrap_or_default(),
            },
            logging: LoggingConfig {
                level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
                format: match lookup("LOG_FORMAT")
                    .unwrap_or_else(|| "pretty".to_string())
                    .to_lowercase()
                    .as_str()
                {
                    "json" => LogFormat::Json,
                    _ => LogFormat::Pretty,
                },
            },
        };

        config.prometheus.validate()?;

        Ok(config)
    }
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9090".to_string(),
            auth_token: None,
            query_timeout: Duration::from_secs(30),
            request_deadline: Duration::from_secs(45),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                addr: "0.0.0.0:8080".to_string(),
            },
            prometheus: PrometheusConfig::default(),
            tools: ToolsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_prometheus_url_is_fatal() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_invalid_prometheus_url_is_fatal() {
        let err = Config::from_lookup(lookup(&[("PROMETHEUS_URL", "not a url")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = Config::from_lookup(lookup(&[("PROMETHEUS_URL", "ftp://prom:9090")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_defaults_and_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("PROMETHEUS_URL", "http://prometheus:9090/"),
            ("PROMETHEUS_QUERY_TIMEOUT_SECS", "5"),
            ("TOOL_PREFIX", "metrics_"),
            ("LOG_FORMAT", "JSON"),
        ]))
        .unwrap();

        assert_eq!(config.prometheus.url, "http://prometheus:9090");
        assert_eq!(config.prometheus.query_timeout, Duration::from_secs(5));
        assert_eq!(config.prometheus.request_deadline, Duration::from_secs(45));
        assert_eq!(config.prometheus.auth_token, None);
        assert_eq!(config.server.addr, "0.0.0.0:8080");
        assert_eq!(config.tools.prefix, "metrics_");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_empty_token_means_no_authentication() {
        let config = Config::from_lookup(lookup(&[
            ("PROMETHEUS_URL", "http://prometheus:9090"),
            ("PROMETHEUS_TOKEN", ""),
        ]))
        .unwrap();
        assert_eq!(config.prometheus.auth_token, None);

        let config = Config::from_lookup(lookup(&[
            ("PROMETHEUS_URL", "http://prometheus:9090"),
            ("PROMETHEUS_TOKEN", "secret"),
        ]))
        .unwrap();
        assert_eq!(config.prometheus.auth_token.as_deref(), Some("secret"));
    }

    #[test]
    fn test_bad_timeout_is_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("PROMETHEUS_URL", "http://prometheus:9090"),
            ("REQUEST_DEADLINE_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
