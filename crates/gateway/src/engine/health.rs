use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Inputs to the classifier. A missing metric never breaches a threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HealthInputs {
    pub error_rate_percent: Option<f64>,
    pub cpu_percent: Option<f64>,
    pub response_time_ms: Option<f64>,
}

struct Thresholds {
    error_rate_percent: f64,
    cpu_percent: f64,
    response_time_ms: f64,
}

const DEGRADED: Thresholds = Thresholds {
    error_rate_percent: 5.0,
    cpu_percent: 80.0,
    response_time_ms: 1000.0,
};

const UNHEALTHY: Thresholds = Thresholds {
    error_rate_percent: 10.0,
    cpu_percent: 90.0,
    response_time_ms: 5000.0,
};

fn breaches(inputs: &HealthInputs, limits: &Thresholds) -> bool {
    let over = |value: Option<f64>, limit: f64| value.is_some_and(|v| v > limit);

    over(inputs.error_rate_percent, limits.error_rate_percent)
        || over(inputs.cpu_percent, limits.cpu_percent)
        || over(inputs.response_time_ms, limits.response_time_ms)
}

/// Worst tier breached by any single metric.
pub fn classify(inputs: &HealthInputs) -> HealthStatus {
    let mut status = HealthStatus::Healthy;
    if breaches(inputs, &DEGRADED) {
        status = status.max(HealthStatus::Degraded);
    }
    if breaches(inputs, &UNHEALTHY) {
        status = status.max(HealthStatus::Unhealthy);
    }
    status
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(error_rate: f64, cpu: f64, response_time: f64) -> HealthInputs {
        HealthInputs {
            error_rate_percent: Some(error_rate),
            cpu_percent: Some(cpu),
            response_time_ms: Some(response_time),
        }
    }

    #[test]
    fn test_all_zero_is_healthy() {
        assert_eq!(classify(&inputs(0.0, 0.0, 0.0)), HealthStatus::Healthy);
    }

    #[test]
    fn test_single_unhealthy_breach_dominates() {
        assert_eq!(classify(&inputs(11.0, 10.0, 50.0)), HealthStatus::Unhealthy);
        assert_eq!(classify(&inputs(0.0, 95.0, 0.0)), HealthStatus::Unhealthy);
        assert_eq!(classify(&inputs(0.0, 0.0, 6000.0)), HealthStatus::Unhealthy);
    }

    #[test]
    fn test_degraded_tier() {
        assert_eq!(classify(&inputs(6.0, 0.0, 0.0)), HealthStatus::Degraded);
        assert_eq!(classify(&inputs(0.0, 85.0, 0.0)), HealthStatus::Degraded);
        assert_eq!(classify(&inputs(0.0, 0.0, 1500.0)), HealthStatus::Degraded);
    }

    #[test]
    fn test_thresholds_are_exclusive() {
        assert_eq!(classify(&inputs(5.0, 80.0, 1000.0)), HealthStatus::Healthy);
        assert_eq!(classify(&inputs(10.0, 90.0, 5000.0)), HealthStatus::Degraded);
    }

    #[test]
    fn test_mixed_tiers_worse_wins() {
        // cpu alone is Degraded, error rate alone is Unhealthy
        assert_eq!(classify(&inputs(12.0, 85.0, 0.0)), HealthStatus::Unhealthy);
    }

    #[test]
    fn test_missing_metrics_do_not_breach() {
        assert_eq!(classify(&HealthInputs::default()), HealthStatus::Healthy);
        let partial = HealthInputs {
            cpu_percent: Some(82.0),
            ..HealthInputs::default()
        };
        assert_eq!(classify(&partial), HealthStatus::Degraded);
    }
}
