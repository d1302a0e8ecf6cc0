//! The audit recorder: retry semantics on top of a sink
//!
//! Non-terminal appends are retried within the calling state's budget;
//! the orchestrator treats exhaustion like any other transient failure
//! turned fatal. Terminal appends are the one place unlimited retry is
//! correct: an execution must not be considered quarantined or
//! completed until the record of that fact is durable.

use crate::sink::{AuditError, AuditSink};
use std::sync::Arc;
use std::time::Duration;
use triage_types::{AuditEvent, AuditRecord, ExecutionId, RetryPolicy};

/// Ceiling for the terminal-append backoff
const TERMINAL_BACKOFF_CAP: Duration = Duration::from_secs(30);

/// Appends transition records through a sink, owning the retry policy
/// around the write contract.
#[derive(Clone)]
pub struct AuditRecorder {
    sink: Arc<dyn AuditSink>,
}

impl AuditRecorder {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Append with the given retry schedule. Used for non-terminal
    /// transitions, where the state's own budget bounds the retries.
    pub async fn append_with_retry(
        &self,
        event: AuditEvent,
        policy: &RetryPolicy,
    ) -> Result<AuditRecord, AuditError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.sink.append(event.clone()).await {
                Ok(record) => return Ok(record),
                Err(err) if attempt < policy.max_attempts => {
                    tracing::warn!(
                        execution_id = %event.execution_id,
                        attempt,
                        error = %err,
                        "audit append failed, backing off"
                    );
                    tokio::time::sleep(policy.backoff_for(attempt)).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Append a terminal transition, retrying indefinitely with capped
    /// exponential backoff. Blocks until the write is acknowledged:
    /// correctness over liveness for the compliance-critical path.
    pub async fn append_terminal(&self, event: AuditEvent) -> AuditRecord {
        debug_assert!(event.is_terminal());
        let mut backoff = Duration::from_millis(200);
        loop {
            match self.sink.append(event.clone()).await {
                Ok(record) => return record,
                Err(err) => {
                    tracing::error!(
                        execution_id = %event.execution_id,
                        error = %err,
                        backoff_ms = backoff.as_millis() as u64,
                        "terminal audit append failed, will retry until acknowledged"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(TERMINAL_BACKOFF_CAP);
                }
            }
        }
    }

    /// Full trail for one execution, in sequence order
    pub async fn records_for(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<Vec<AuditRecord>, AuditError> {
        self.sink.records_for(execution_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemoryAuditSink;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use triage_types::State;

    /// Fails the first `failures` appends, then delegates
    struct FlakySink {
        inner: MemoryAuditSink,
        failures: AtomicU32,
    }

    impl FlakySink {
        fn new(failures: u32) -> Self {
            Self {
                inner: MemoryAuditSink::new(),
                failures: AtomicU32::new(failures),
            }
        }
    }

    #[async_trait]
    impl AuditSink for FlakySink {
        async fn append(&self, event: AuditEvent) -> Result<AuditRecord, AuditError> {
            if self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(AuditError::WriteFailure("sink contention".into()));
            }
            self.inner.append(event).await
        }

        async fn records_for(
            &self,
            execution_id: &ExecutionId,
        ) -> Result<Vec<AuditRecord>, AuditError> {
            self.inner.records_for(execution_id).await
        }
    }

    fn terminal_event() -> AuditEvent {
        AuditEvent::new(
            ExecutionId::new("exec-1"),
            State::Alert,
            State::Failed,
            "risk_level=HIGH",
        )
    }

    fn working_event() -> AuditEvent {
        AuditEvent::new(
            ExecutionId::new("exec-1"),
            State::ValidateInput,
            State::CheckConsent,
            "input_valid",
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_within_budget() {
        let recorder = AuditRecorder::new(Arc::new(FlakySink::new(2)));
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_backoff_ms: 10,
            backoff_multiplier: 2.0,
        };
        let record = recorder
            .append_with_retry(working_event(), &policy)
            .await
            .unwrap();
        assert_eq!(record.sequence, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_budget_exhausted() {
        let recorder = AuditRecorder::new(Arc::new(FlakySink::new(5)));
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_backoff_ms: 10,
            backoff_multiplier: 2.0,
        };
        let result = recorder.append_with_retry(working_event(), &policy).await;
        assert!(matches!(result, Err(AuditError::WriteFailure(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_append_outlasts_long_outage() {
        // Far more failures than any bounded policy would tolerate
        let recorder = AuditRecorder::new(Arc::new(FlakySink::new(25)));
        let record = recorder.append_terminal(terminal_event()).await;
        assert_eq!(record.to_state, State::Failed);
        assert_eq!(record.sequence, 0);
    }
}
