use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

use super::client::QueryBackend;
use super::query::{BackendError, MetricQuery, QueryResult};
use crate::metrics::{QueryOutcome, Reporter};

/// Request-scoped time budget shared by every query of one operation.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
    query_timeout: Duration,
}

impl Deadline {
    pub fn new(budget: Duration, query_timeout: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            query_timeout,
        }
    }

    pub fn instant(&self) -> Instant {
        self.at
    }

    /// Timeout for the next query: whatever is left, capped per query.
    pub fn next_timeout(&self) -> Duration {
        self.at
            .saturating_duration_since(Instant::now())
            .min(self.query_timeout)
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.at
    }
}

/// Everything a single caller request needs to talk to the backend.
#[derive(Clone)]
pub struct QueryContext {
    backend: Arc<dyn QueryBackend>,
    reporter: Arc<dyn Reporter>,
    deadline: Deadline,
}

impl QueryContext {
    pub fn new(
        backend: Arc<dyn QueryBackend>,
        reporter: Arc<dyn Reporter>,
        deadline: Deadline,
    ) -> Self {
        Self {
            backend,
            reporter,
            deadline,
        }
    }

    pub fn deadline(&self) -> Deadline {
        self.deadline
    }

    /// Run one query within the request deadline. A single attempt, no retry.
    pub async fn run(&self, query: &MetricQuery) -> Result<QueryResult, BackendError> {
        let started = std::time::Instant::now();

        let result = if self.deadline.expired() {
            Err(BackendError::Timeout)
        } else {
            let call = self.backend.execute(query, self.deadline.next_timeout());
            match tokio::time::timeout_at(self.deadline.instant(), call).await {
                Ok(result) => result,
                Err(_) => Err(BackendError::Timeout),
            }
        };

        let outcome = match &result {
            Ok(r) if r.has_data() => QueryOutcome::Data,
            Ok(_) => QueryOutcome::Empty,
            Err(e) => {
                warn!(expression = %query.expression, error = %e, "Metrics query failed");
                QueryOutcome::Failed
            }
        };
        self.reporter
            .record_backend_query(query.kind.as_str(), outcome, started.elapsed());

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::client::MockQueryBackend;
    use crate::metrics::NoopReporter;

    fn context(backend: MockQueryBackend, budget: Duration) -> QueryContext {
        QueryContext::new(
            Arc::new(backend),
            Arc::new(NoopReporter),
            Deadline::new(budget, Duration::from_secs(30)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_timeout_is_capped_by_remaining_budget() {
        let deadline = Deadline::new(Duration::from_secs(10), Duration::from_secs(3));
        assert_eq!(deadline.next_timeout(), Duration::from_secs(3));

        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(deadline.next_timeout(), Duration::from_secs(2));
        assert!(!deadline.expired());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(deadline.expired());
        assert_eq!(deadline.next_timeout(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_expired_deadline_skips_backend() {
        let mut backend = MockQueryBackend::new();
        backend.expect_execute().times(0);
        let ctx = context(backend, Duration::ZERO);

        let err = ctx.run(&MetricQuery::instant("up")).await.unwrap_err();
        assert_eq!(err, BackendError::Timeout);
    }
}
