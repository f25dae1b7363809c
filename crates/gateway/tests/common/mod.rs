//! In-process stand-in for the Prometheus HTTP API.

#![allow(dead_code)]

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    routing::get,
    Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ops_gateway::config::PrometheusConfig;

#[derive(Default)]
pub struct FakeState {
    /// expression -> `data` object for instant queries
    instant: HashMap<String, Value>,
    /// expression -> `data` object for range queries
    range: HashMap<String, Value>,
    /// expression -> raw (status, body) to return instead of data
    raw: HashMap<String, (u16, String)>,
    pub seen: Vec<HashMap<String, String>>,
    pub authorization: Option<String>,
}

#[derive(Clone, Default)]
pub struct FakePrometheus {
    pub state: Arc<Mutex<FakeState>>,
}

impl FakePrometheus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instant(self, expression: &str, data: Value) -> Self {
        self.state
            .lock()
            .unwrap()
            .instant
            .insert(expression.to_string(), data);
        self
    }

    pub fn range(self, expression: &str, data: Value) -> Self {
        self.state
            .lock()
            .unwrap()
            .range
            .insert(expression.to_string(), data);
        self
    }

    pub fn raw(self, expression: &str, status: u16, body: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .raw
            .insert(expression.to_string(), (status, body.to_string()));
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .seen
            .iter()
            .filter_map(|params| params.get("query").cloned())
            .collect()
    }

    pub fn last_params(&self) -> Option<HashMap<String, String>> {
        self.state.lock().unwrap().seen.last().cloned()
    }

    pub fn authorization(&self) -> Option<String> {
        self.state.lock().unwrap().authorization.clone()
    }

    /// Serve on an ephemeral port and return the base URL.
    pub async fn spawn(&self) -> String {
        let app = Router::new()
            .route("/api/v1/query", get(instant_handler))
            .route("/api/v1/query_range", get(range_handler))
            .with_state(self.state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }
}

type Reply = (axum::http::StatusCode, String);

fn answer(
    state: &Arc<Mutex<FakeState>>,
    headers: &HeaderMap,
    params: HashMap<String, String>,
    range: bool,
) -> Reply {
    let mut state = state.lock().unwrap();
    state.authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let query = params.get("query").cloned().unwrap_or_default();
    state.seen.push(params);

    if let Some((status, body)) = state.raw.get(&query) {
        let status = axum::http::StatusCode::from_u16(*status).unwrap();
        return (status, body.clone());
    }

    let table = if range { &state.range } else { &state.instant };
    let data = table.get(&query).cloned().unwrap_or_else(|| {
        if range {
            json!({ "resultType": "matrix", "result": [] })
        } else {
            json!({ "resultType": "vector", "result": [] })
        }
    });

    let body = json!({ "status": "success", "data": data });
    (axum::http::StatusCode::OK, body.to_string())
}

async fn instant_handler(
    State(state): State<Arc<Mutex<FakeState>>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Reply {
    answer(&state, &headers, params, false)
}

async fn range_handler(
    State(state): State<Arc<Mutex<FakeState>>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Reply {
    answer(&state, &headers, params, true)
}

pub fn vector(value: f64) -> Value {
    labeled_vector(&[], value)
}

pub fn labeled_vector(labels: &[(&str, &str)], value: f64) -> Value {
    vector_of(&[(labels, value)])
}

pub fn vector_of(series: &[(&[(&str, &str)], f64)]) -> Value {
    let result: Vec<Value> = series
        .iter()
        .map(|(labels, value)| {
            let metric: serde_json::Map<String, Value> = labels
                .iter()
                .map(|(k, v)| (k.to_string(), json!(v)))
                .collect();
            json!({ "metric": metric, "value": [1_700_000_000.0, value.to_string()] })
        })
        .collect();
    json!({ "resultType": "vector", "result": result })
}

pub fn matrix(values: &[f64]) -> Value {
    let points: Vec<Value> = values
        .iter()
        .enumerate()
        .map(|(i, v)| json!([1_700_000_000.0 + 60.0 * i as f64, v.to_string()]))
        .collect();
    json!({ "resultType": "matrix", "result": [{ "metric": {}, "values": points }] })
}

pub fn config(url: String) -> PrometheusConfig {
    PrometheusConfig {
        url,
        auth_token: None,
        query_timeout: Duration::from_secs(5),
        request_deadline: Duration::from_secs(10),
    }
}

/// URL of a port nothing is listening on.
pub async fn unreachable_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
