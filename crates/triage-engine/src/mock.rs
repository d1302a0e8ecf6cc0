//! Mock capabilities for tests and local development
//!
//! Each mock records its calls and can be scripted to fail a fixed
//! number of times, fail permanently, or add latency, so orchestrator
//! tests can exercise every retry and timeout path deterministically.

use crate::capability::{
    Artifact, Capabilities, ConsentService, ConsentUnavailable, EntityExtractor,
    ExtractionError, Notification, NotificationSink, PersistenceSink, StoreError,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use triage_types::{Entity, ExecutionId, Payload};

// ── Extractor ────────────────────────────────────────────────────────

/// Scripted entity extractor
#[derive(Default)]
pub struct MockExtractor {
    entities: Mutex<Vec<Entity>>,
    transient_failures: AtomicU32,
    always_fatal: Mutex<Option<String>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicU32,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return these entities on success
    pub fn with_entities(self, entities: Vec<Entity>) -> Self {
        *self.entities.lock() = entities;
        self
    }

    /// Fail transiently for the first `n` calls
    pub fn with_transient_failures(self, n: u32) -> Self {
        self.transient_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Fail fatally on every call
    pub fn with_fatal_error(self, message: impl Into<String>) -> Self {
        *self.always_fatal.lock() = Some(message.into());
        self
    }

    /// Sleep this long before answering
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.lock() = Some(delay);
        self
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EntityExtractor for MockExtractor {
    async fn extract(&self, _text: &str) -> Result<Vec<Entity>, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = self.always_fatal.lock().clone() {
            return Err(ExtractionError::fatal(message));
        }

        let failing = self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ExtractionError::transient("model endpoint unavailable"));
        }

        Ok(self.entities.lock().clone())
    }
}

// ── Consent ──────────────────────────────────────────────────────────

/// Scripted consent service
pub struct MockConsent {
    granted: bool,
    unavailable_times: AtomicU32,
    calls: AtomicU32,
}

impl MockConsent {
    pub fn granting() -> Self {
        Self {
            granted: true,
            unavailable_times: AtomicU32::new(0),
            calls: AtomicU32::new(0),
        }
    }

    pub fn denying() -> Self {
        Self {
            granted: false,
            unavailable_times: AtomicU32::new(0),
            calls: AtomicU32::new(0),
        }
    }

    /// Fail with `ConsentUnavailable` for the first `n` calls
    pub fn with_unavailable_times(self, n: u32) -> Self {
        self.unavailable_times.store(n, Ordering::SeqCst);
        self
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConsentService for MockConsent {
    async fn check_consent(
        &self,
        _subject_id: &str,
        _purpose: &str,
    ) -> Result<bool, ConsentUnavailable> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .unavailable_times
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ConsentUnavailable("registry timeout".into()));
        }
        Ok(self.granted)
    }
}

// ── Persistence ──────────────────────────────────────────────────────

/// In-memory persistence sink recording everything it stores
#[derive(Default)]
pub struct MockPersistence {
    stored: Mutex<Vec<(ExecutionId, String, HashMap<String, String>)>>,
    artifacts: Mutex<Vec<Artifact>>,
    quarantined: Mutex<Vec<(ExecutionId, Payload, String)>>,
    fail_store: AtomicU32,
    fail_quarantine: AtomicU32,
}

impl MockPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` `store` calls
    pub fn with_store_failures(self, n: u32) -> Self {
        self.fail_store.store(n, Ordering::SeqCst);
        self
    }

    /// Fail the next `n` `quarantine` calls
    pub fn with_quarantine_failures(self, n: u32) -> Self {
        self.fail_quarantine.store(n, Ordering::SeqCst);
        self
    }

    pub fn stored(&self) -> Vec<(ExecutionId, String, HashMap<String, String>)> {
        self.stored.lock().clone()
    }

    pub fn artifacts(&self) -> Vec<Artifact> {
        self.artifacts.lock().clone()
    }

    pub fn quarantined(&self) -> Vec<(ExecutionId, Payload, String)> {
        self.quarantined.lock().clone()
    }
}

fn take_failure(budget: &AtomicU32) -> bool {
    budget
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl PersistenceSink for MockPersistence {
    async fn store(
        &self,
        execution_id: &ExecutionId,
        masked_payload: &str,
        metadata: HashMap<String, String>,
    ) -> Result<(), StoreError> {
        if take_failure(&self.fail_store) {
            return Err(StoreError("storage backend unavailable".into()));
        }
        self.stored
            .lock()
            .push((execution_id.clone(), masked_payload.to_string(), metadata));
        Ok(())
    }

    async fn store_artifact(
        &self,
        _execution_id: &ExecutionId,
        artifact: Artifact,
    ) -> Result<(), StoreError> {
        self.artifacts.lock().push(artifact);
        Ok(())
    }

    async fn quarantine(
        &self,
        execution_id: &ExecutionId,
        payload: &Payload,
        reason: &str,
    ) -> Result<(), StoreError> {
        if take_failure(&self.fail_quarantine) {
            return Err(StoreError("quarantine volume unavailable".into()));
        }
        self.quarantined
            .lock()
            .push((execution_id.clone(), payload.clone(), reason.to_string()));
        Ok(())
    }
}

// ── Notifier ─────────────────────────────────────────────────────────

/// Notification sink recording every notification
#[derive(Default)]
pub struct MockNotifier {
    notifications: Mutex<Vec<Notification>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().clone()
    }
}

#[async_trait]
impl NotificationSink for MockNotifier {
    async fn notify(&self, notification: Notification) {
        self.notifications.lock().push(notification);
    }
}

// ── Bundles ──────────────────────────────────────────────────────────

/// Capabilities where every call succeeds and extraction finds nothing
pub fn passthrough_capabilities() -> Capabilities {
    Capabilities {
        extractor: Arc::new(MockExtractor::new()),
        consent: Arc::new(MockConsent::granting()),
        persistence: Arc::new(MockPersistence::new()),
        notifier: Arc::new(MockNotifier::new()),
    }
}
