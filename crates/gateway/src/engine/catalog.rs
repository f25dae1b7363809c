//! Known spellings of the metrics the gateway reports on.
//!
//! Each list is ordered by preference. Node-exporter and cAdvisor naming come
//! first, then the common client-library conventions. Service templates use the
//! `{{service}}` placeholder.

pub const CPU_USAGE_PERCENT: &[&str] = &[
    r#"100 - (avg(rate(node_cpu_seconds_total{mode="idle"}[5m])) * 100)"#,
    r#"100 - (avg(irate(node_cpu_seconds_total{mode="idle"}[5m])) * 100)"#,
    r#"sum(rate(container_cpu_usage_seconds_total{id="/"}[5m])) / sum(machine_cpu_cores) * 100"#,
    r#"avg(system_cpu_usage) * 100"#,
];

pub const CPU_CORES: &[&str] = &[
    r#"count(node_cpu_seconds_total{mode="idle"})"#,
    r#"sum(machine_cpu_cores)"#,
    r#"sum(system_cpu_count)"#,
];

pub const LOAD_AVERAGE_1M: &[&str] = &["avg(node_load1)", "avg(system_load_average_1m)"];

pub const MEMORY_TOTAL_BYTES: &[&str] = &[
    "sum(node_memory_MemTotal_bytes)",
    "sum(machine_memory_bytes)",
    "sum(node_memory_total_bytes)",
];

pub const MEMORY_AVAILABLE_BYTES: &[&str] = &[
    "sum(node_memory_MemAvailable_bytes)",
    "sum(node_memory_MemFree_bytes + node_memory_Cached_bytes + node_memory_Buffers_bytes)",
    "sum(node_memory_free_bytes)",
];

pub const DISK_TOTAL_BYTES: &[&str] = &[
    r#"sum(node_filesystem_size_bytes{fstype!~"tmpfs|overlay|squashfs",mountpoint="/"})"#,
    r#"sum(node_filesystem_size_bytes{fstype!~"tmpfs|overlay|squashfs"})"#,
    r#"sum(container_fs_limit_bytes{id="/"})"#,
];

pub const DISK_AVAILABLE_BYTES: &[&str] = &[
    r#"sum(node_filesystem_avail_bytes{fstype!~"tmpfs|overlay|squashfs",mountpoint="/"})"#,
    r#"sum(node_filesystem_avail_bytes{fstype!~"tmpfs|overlay|squashfs"})"#,
    r#"sum(container_fs_limit_bytes{id="/"}) - sum(container_fs_usage_bytes{id="/"})"#,
];

pub const NETWORK_RECEIVE_BYTES: &[&str] = &[
    r#"sum(rate(node_network_receive_bytes_total{device!~"lo|veth.*|docker.*|br-.*"}[5m]))"#,
    r#"sum(rate(container_network_receive_bytes_total{id="/"}[5m]))"#,
];

pub const NETWORK_TRANSMIT_BYTES: &[&str] = &[
    r#"sum(rate(node_network_transmit_bytes_total{device!~"lo|veth.*|docker.*|br-.*"}[5m]))"#,
    r#"sum(rate(container_network_transmit_bytes_total{id="/"}[5m]))"#,
];

pub const TARGETS_UP: &[&str] = &["sum(up)"];

pub const TARGETS_TOTAL: &[&str] = &["count(up)"];

pub const MEMORY_USAGE_PERCENT: &[&str] = &[
    "(1 - sum(node_memory_MemAvailable_bytes) / sum(node_memory_MemTotal_bytes)) * 100",
    "(1 - sum(node_memory_MemFree_bytes + node_memory_Cached_bytes + node_memory_Buffers_bytes) / sum(node_memory_MemTotal_bytes)) * 100",
    "sum(container_memory_working_set_bytes{id=\"/\"}) / sum(machine_memory_bytes) * 100",
];

pub const DISK_USAGE_PERCENT: &[&str] = &[
    r#"(1 - sum(node_filesystem_avail_bytes{fstype!~"tmpfs|overlay|squashfs",mountpoint="/"}) / sum(node_filesystem_size_bytes{fstype!~"tmpfs|overlay|squashfs",mountpoint="/"})) * 100"#,
    r#"(1 - sum(node_filesystem_avail_bytes{fstype!~"tmpfs|overlay|squashfs"}) / sum(node_filesystem_size_bytes{fstype!~"tmpfs|overlay|squashfs"})) * 100"#,
];

// Per-service metrics.

pub const SERVICE_REQUEST_RATE: &[&str] = &[
    r#"sum(rate(http_requests_total{service="{{service}}"}[5m]))"#,
    r#"sum(rate(http_requests_total{job="{{service}}"}[5m]))"#,
    r#"sum(rate(http_server_requests_seconds_count{service="{{service}}"}[5m]))"#,
    r#"sum(rate(http_server_requests_seconds_count{job="{{service}}"}[5m]))"#,
    r#"sum(rate(http_server_duration_count{service_name="{{service}}"}[5m]))"#,
];

pub const SERVICE_ERROR_RATE_PERCENT: &[&str] = &[
    r#"sum(rate(http_requests_total{service="{{service}}",status=~"5.."}[5m])) / sum(rate(http_requests_total{service="{{service}}"}[5m])) * 100"#,
    r#"sum(rate(http_requests_total{service="{{service}}",code=~"5.."}[5m])) / sum(rate(http_requests_total{service="{{service}}"}[5m])) * 100"#,
    r#"sum(rate(http_requests_total{job="{{service}}",status=~"5.."}[5m])) / sum(rate(http_requests_total{job="{{service}}"}[5m])) * 100"#,
    r#"sum(rate(http_requests_total{job="{{service}}",code=~"5.."}[5m])) / sum(rate(http_requests_total{job="{{service}}"}[5m])) * 100"#,
    r#"sum(rate(http_server_requests_seconds_count{job="{{service}}",status=~"5.."}[5m])) / sum(rate(http_server_requests_seconds_count{job="{{service}}"}[5m])) * 100"#,
];

pub const SERVICE_RESPONSE_TIME_MS: &[&str] = &[
    r#"histogram_quantile(0.95, sum(rate(http_request_duration_seconds_bucket{service="{{service}}"}[5m])) by (le)) * 1000"#,
    r#"histogram_quantile(0.95, sum(rate(http_request_duration_seconds_bucket{job="{{service}}"}[5m])) by (le)) * 1000"#,
    r#"sum(rate(http_request_duration_seconds_sum{service="{{service}}"}[5m])) / sum(rate(http_request_duration_seconds_count{service="{{service}}"}[5m])) * 1000"#,
    r#"sum(rate(http_request_duration_seconds_sum{job="{{service}}"}[5m])) / sum(rate(http_request_duration_seconds_count{job="{{service}}"}[5m])) * 1000"#,
    r#"sum(rate(http_server_requests_seconds_sum{job="{{service}}"}[5m])) / sum(rate(http_server_requests_seconds_count{job="{{service}}"}[5m])) * 1000"#,
];

pub const SERVICE_CPU_PERCENT: &[&str] = &[
    r#"sum(rate(container_cpu_usage_seconds_total{container="{{service}}"}[5m])) * 100"#,
    r#"sum(rate(process_cpu_seconds_total{service="{{service}}"}[5m])) * 100"#,
    r#"sum(rate(process_cpu_seconds_total{job="{{service}}"}[5m])) * 100"#,
];

pub const SERVICE_MEMORY_BYTES: &[&str] = &[
    r#"sum(container_memory_working_set_bytes{container="{{service}}"})"#,
    r#"sum(process_resident_memory_bytes{service="{{service}}"})"#,
    r#"sum(process_resident_memory_bytes{job="{{service}}"})"#,
];

pub const SERVICE_UP: &[&str] = &[
    r#"min(up{service="{{service}}"})"#,
    r#"min(up{job="{{service}}"})"#,
];

/// Request counts over the last hour, one series per status code.
pub const SERVICE_STATUS_CODES: &[&str] = &[
    r#"sum by (status) (increase(http_requests_total{service="{{service}}"}[1h]))"#,
    r#"sum by (code) (increase(http_requests_total{service="{{service}}"}[1h]))"#,
    r#"sum by (status) (increase(http_requests_total{job="{{service}}"}[1h]))"#,
    r#"sum by (code) (increase(http_requests_total{job="{{service}}"}[1h]))"#,
    r#"sum by (status) (increase(http_server_requests_seconds_count{job="{{service}}"}[1h]))"#,
];

/// Label names that carry an HTTP status code, in lookup order.
pub const STATUS_CODE_LABELS: &[&str] = &["status", "code", "status_code"];

/// Remote active-alerts series exposed by the backend's rule evaluator.
pub const ACTIVE_ALERTS: &str = "ALERTS";

/// Candidate lists for named history metrics. Unknown names are queried
/// verbatim.
pub fn history_candidates(metric: &str) -> Option<&'static [&'static str]> {
    match metric {
        "cpu_usage_percent" => Some(CPU_USAGE_PERCENT),
        "memory_usage_percent" => Some(MEMORY_USAGE_PERCENT),
        "disk_usage_percent" => Some(DISK_USAGE_PERCENT),
        "load_average_1m" => Some(LOAD_AVERAGE_1M),
        "network_receive_bytes" => Some(NETWORK_RECEIVE_BYTES),
        "network_transmit_bytes" => Some(NETWORK_TRANSMIT_BYTES),
        "memory_available_bytes" => Some(MEMORY_AVAILABLE_BYTES),
        "targets_up" => Some(TARGETS_UP),
        _ => None,
    }
}

pub const HISTORY_METRICS: &[&str] = &[
    "cpu_usage_percent",
    "memory_usage_percent",
    "disk_usage_percent",
    "load_average_1m",
    "network_receive_bytes",
    "network_transmit_bytes",
    "memory_available_bytes",
    "targets_up",
];
