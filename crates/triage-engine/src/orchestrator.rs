//! The orchestrator: drives executions through the state machine
//!
//! One worker drives one execution at a time (leases). Each iteration
//! runs the current state's handler under its retry budget, computes
//! the transition, records the audit event, persists the new snapshot,
//! and only then proceeds. Entering `ManualReview` suspends the
//! execution: the snapshot with its resume token is durable before the
//! token is handed to the review gateway.

use crate::capability::{Artifact, Capabilities, Notification};
use crate::errors::EngineError;
use crate::gateway::{Decision, PendingReview, ReviewGateway, ReviewSummary};
use crate::lease::{LeaseGuard, LeaseRegistry};
use crate::store::ExecutionStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use triage_audit::AuditRecorder;
use triage_types::{
    next_state, AuditEvent, AuditRecord, EngineConfig, Execution, ExecutionId, Outcome,
    Payload, ResumeToken, State,
};

/// Leases expire well before any human-scale suspension, so a crashed
/// worker's executions become reclaimable quickly.
const LEASE_TTL: Duration = Duration::from_secs(30);

/// One handler attempt, before retry policy is applied
enum Attempt {
    /// The handler reached a decision
    Done(Outcome),
    /// Retryable failure; the state's budget decides what happens next
    Transient(String),
}

/// What a completed transition means for the driving loop
enum StepFlow {
    Continue,
    Suspended,
    Terminal,
}

pub struct Orchestrator {
    config: EngineConfig,
    capabilities: Capabilities,
    store: Arc<dyn ExecutionStore>,
    recorder: AuditRecorder,
    leases: LeaseRegistry,
    gateway: Arc<ReviewGateway>,
}

impl Orchestrator {
    pub fn new(
        config: EngineConfig,
        capabilities: Capabilities,
        store: Arc<dyn ExecutionStore>,
        recorder: AuditRecorder,
    ) -> Self {
        Self {
            config,
            capabilities,
            store,
            recorder,
            leases: LeaseRegistry::new(LEASE_TTL),
            gateway: Arc::new(ReviewGateway::new()),
        }
    }

    /// The gateway where suspended executions await their decision
    pub fn gateway(&self) -> &Arc<ReviewGateway> {
        &self.gateway
    }

    // ── Entry points ─────────────────────────────────────────────────

    /// Create an execution for the payload and drive it until it
    /// suspends or terminates. Returns the resulting snapshot.
    pub async fn submit(&self, payload: Payload) -> Result<Execution, EngineError> {
        let mut exec = Execution::new(payload);
        let guard = self.leases.acquire(&exec.id)?;
        tracing::info!(execution_id = %exec.id, "execution submitted");

        self.store.save(&exec).await?;
        self.run(&guard, &mut exec).await?;
        Ok(exec)
    }

    /// Drive an existing execution until it suspends or terminates.
    /// Fails on terminal executions and on suspended ones; suspended
    /// executions only move via [`Orchestrator::resume`] or
    /// [`Orchestrator::cancel`].
    pub async fn advance(&self, id: &ExecutionId) -> Result<Execution, EngineError> {
        let guard = self.leases.acquire(id)?;
        let mut exec = self.load(id).await?;

        if exec.is_terminal() {
            return Err(triage_types::TransitionError::TerminalStateViolation(exec.state).into());
        }
        if exec.is_suspended() {
            return Err(EngineError::Suspended(exec.id));
        }

        self.run(&guard, &mut exec).await?;
        Ok(exec)
    }

    /// Apply a reviewer's decision to the suspended execution the
    /// token belongs to, then drive it onward. The token is consumed
    /// whether or not the subsequent run succeeds; only a lease
    /// conflict leaves it valid for a later retry.
    pub async fn resume(
        &self,
        token: &ResumeToken,
        decision: Decision,
    ) -> Result<Execution, EngineError> {
        let pending = self.gateway.take(token)?;

        let guard = match self.leases.acquire(&pending.execution_id) {
            Ok(guard) => guard,
            Err(err) => {
                self.gateway.reinstate(token.clone(), pending);
                return Err(err);
            }
        };

        let mut exec = self.load(&pending.execution_id).await?;
        if !exec.is_suspended() || exec.resume_token.as_ref() != Some(token) {
            return Err(EngineError::InvalidToken);
        }

        tracing::info!(
            execution_id = %exec.id,
            decision = ?decision,
            "resuming suspended execution"
        );
        exec.clear_token();

        let outcome = match decision {
            Decision::Approve => Outcome::Approved,
            Decision::Reject => Outcome::Rejected,
        };
        self.apply(&mut exec, outcome).await?;
        self.run(&guard, &mut exec).await?;
        Ok(exec)
    }

    /// Cancel a suspended execution: the token is invalidated and the
    /// execution moves to the `Quarantined` terminal state.
    pub async fn cancel(&self, id: &ExecutionId) -> Result<Execution, EngineError> {
        let _guard = self.leases.acquire(id)?;
        let mut exec = self.load(id).await?;

        if !exec.is_suspended() {
            return Err(EngineError::NotSuspended(exec.id));
        }

        if let Some(token) = exec.resume_token.clone() {
            self.gateway.retract(&token);
        }
        exec.clear_token();

        tracing::info!(execution_id = %exec.id, "cancelling suspended execution");
        self.apply(&mut exec, Outcome::Cancelled).await?;
        Ok(exec)
    }

    /// Rebuild in-process state after a restart: suspended executions
    /// are re-registered with the gateway under their persisted tokens,
    /// and every other non-terminal execution is driven onward.
    pub async fn recover(&self) -> Result<Vec<ExecutionId>, EngineError> {
        let mut recovered = Vec::new();
        for id in self.store.list_ids().await? {
            let exec = self.load(&id).await?;
            if exec.is_terminal() {
                continue;
            }

            if exec.is_suspended() {
                let token = exec.resume_token.clone();
                let summary = ReviewSummary::from_execution(&exec);
                if let (Some(token), Some(summary)) = (token, summary) {
                    self.gateway.enqueue(
                        token,
                        PendingReview {
                            execution_id: exec.id.clone(),
                            summary,
                            enqueued_at: Utc::now(),
                        },
                    );
                    tracing::info!(execution_id = %id, "re-registered suspended execution");
                    recovered.push(id);
                }
                continue;
            }

            tracing::info!(execution_id = %id, state = %exec.state, "re-driving execution");
            self.advance(&id).await?;
            recovered.push(id);
        }
        Ok(recovered)
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Latest snapshot of an execution
    pub async fn execution(&self, id: &ExecutionId) -> Result<Execution, EngineError> {
        self.load(id).await
    }

    /// The full audit trail of an execution, in sequence order
    pub async fn audit_trail(&self, id: &ExecutionId) -> Result<Vec<AuditRecord>, EngineError> {
        Ok(self.recorder.records_for(id).await?)
    }

    // ── Driving loop ─────────────────────────────────────────────────

    async fn load(&self, id: &ExecutionId) -> Result<Execution, EngineError> {
        self.store
            .load(id)
            .await?
            .ok_or_else(|| EngineError::ExecutionNotFound(id.clone()))
    }

    async fn run(&self, guard: &LeaseGuard, exec: &mut Execution) -> Result<(), EngineError> {
        while !exec.is_terminal() {
            let outcome = self.execute_state(guard, exec).await;
            match self.apply(exec, outcome).await? {
                StepFlow::Continue => {}
                StepFlow::Suspended | StepFlow::Terminal => break,
            }
        }
        Ok(())
    }

    /// Run the current state's handler under its retry budget
    async fn execute_state(&self, guard: &LeaseGuard, exec: &mut Execution) -> Outcome {
        let policy = self.config.retry_for(exec.state);
        loop {
            guard.renew();
            let attempt = exec.record_attempt();
            match self.run_handler(exec).await {
                Attempt::Done(outcome) => return outcome,
                Attempt::Transient(message) if attempt < policy.max_attempts => {
                    let backoff = policy.backoff_for(attempt);
                    tracing::warn!(
                        execution_id = %exec.id,
                        state = %exec.state,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %message,
                        "transient failure, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Attempt::Transient(message) => {
                    return Outcome::Fatal(format!(
                        "retry budget exhausted after {attempt} attempts: {message}"
                    ));
                }
            }
        }
    }

    /// Record the transition for `outcome`, audit it, persist the new
    /// snapshot, and suspend if the new state is `ManualReview`.
    async fn apply(&self, exec: &mut Execution, outcome: Outcome) -> Result<StepFlow, EngineError> {
        let next = next_state(exec.state, &outcome)?;
        let reason = self.reason_for(exec, &outcome);

        let mut event = AuditEvent::new(exec.id.clone(), exec.state, next, reason.clone());
        if let Outcome::Fatal(message) = &outcome {
            event = event.with_error(message.clone());
        }

        // The audit record must be acknowledged before the execution
        // is allowed to move; terminal records block until durable.
        if next.is_terminal() {
            self.recorder.append_terminal(event).await;
        } else {
            let policy = self.config.retry_for(exec.state);
            self.recorder.append_with_retry(event, &policy).await?;
        }

        tracing::info!(
            execution_id = %exec.id,
            from = %exec.state,
            to = %next,
            reason = %reason,
            "transition"
        );
        exec.enter(next, reason);

        if next == State::ManualReview {
            let token = ResumeToken::generate();
            exec.suspend(token.clone());
            // The suspended snapshot is durable before the token is
            // visible to anyone who could consume it.
            self.store.save(exec).await?;
            if let Some(summary) = ReviewSummary::from_execution(exec) {
                self.gateway.enqueue(
                    token,
                    PendingReview {
                        execution_id: exec.id.clone(),
                        summary,
                        enqueued_at: Utc::now(),
                    },
                );
            }
            return Ok(StepFlow::Suspended);
        }

        self.store.save(exec).await?;
        Ok(if next.is_terminal() {
            StepFlow::Terminal
        } else {
            StepFlow::Continue
        })
    }

    /// The decision reason recorded for a transition. Quarantine-path
    /// successes carry the reason that routed the execution there, so
    /// the terminal record names the original cause.
    fn reason_for(&self, exec: &Execution, outcome: &Outcome) -> String {
        match (exec.state, outcome) {
            (State::ValidateInput, Outcome::Success) => "input_valid".into(),
            (State::CheckConsent, Outcome::Success) => "consent_granted".into(),
            (State::ExtractEntities, Outcome::Success) => {
                let count = exec.entities.as_ref().map(Vec::len).unwrap_or(0);
                format!("entities_detected={count}")
            }
            (State::ProcessAndStore, Outcome::Success) => "stored".into(),
            (State::Quarantine | State::Alert, Outcome::Success) => exec
                .decision_reason
                .clone()
                .unwrap_or_else(|| outcome.to_string()),
            _ => outcome.to_string(),
        }
    }

    // ── State handlers ───────────────────────────────────────────────

    async fn run_handler(&self, exec: &mut Execution) -> Attempt {
        match exec.state {
            State::ValidateInput => self.handle_validate(exec),
            State::CheckConsent => self.handle_consent(exec).await,
            State::ExtractEntities => self.handle_extract(exec).await,
            State::AssessRisk => self.handle_assess(exec),
            State::ProcessAndStore => self.handle_process(exec).await,
            State::Quarantine => self.handle_quarantine(exec).await,
            State::Alert => self.handle_alert(exec).await,
            // ManualReview and terminal states never reach the driving
            // loop; suspension and termination are handled in `apply`.
            state => Attempt::Done(Outcome::Fatal(format!("no handler for state {state}"))),
        }
    }

    fn handle_validate(&self, exec: &Execution) -> Attempt {
        if exec.payload.subject_id.trim().is_empty() {
            return Attempt::Done(Outcome::Fatal("payload has no subject id".into()));
        }
        if exec.payload.text.trim().is_empty() {
            return Attempt::Done(Outcome::Fatal("payload text is empty".into()));
        }
        Attempt::Done(Outcome::Success)
    }

    async fn handle_consent(&self, exec: &Execution) -> Attempt {
        let lookup = self
            .capabilities
            .consent
            .check_consent(&exec.payload.subject_id, &self.config.consent_purpose);
        match timeout(self.config.call_timeout(), lookup).await {
            Err(_) => Attempt::Transient("consent lookup timed out".into()),
            Ok(Err(err)) => Attempt::Transient(err.to_string()),
            Ok(Ok(false)) => Attempt::Done(Outcome::Fatal("consent_denied".into())),
            Ok(Ok(true)) => Attempt::Done(Outcome::Success),
        }
    }

    async fn handle_extract(&self, exec: &mut Execution) -> Attempt {
        let extraction = self.capabilities.extractor.extract(&exec.payload.text);
        let entities = match timeout(self.config.call_timeout(), extraction).await {
            Err(_) => return Attempt::Transient("extraction timed out".into()),
            Ok(Err(err)) if err.transient => return Attempt::Transient(err.message),
            Ok(Err(err)) => return Attempt::Done(Outcome::Fatal(err.message)),
            Ok(Ok(entities)) => entities,
        };

        let payload_len = exec.payload.text.chars().count();
        if let Some(bad) = entities.iter().find(|e| !e.is_well_formed(payload_len)) {
            return Attempt::Done(Outcome::Fatal(format!(
                "extractor returned malformed span {}..{} for {}-char payload",
                bad.begin_offset, bad.end_offset, payload_len
            )));
        }

        exec.entities = Some(entities);
        Attempt::Done(Outcome::Success)
    }

    fn handle_assess(&self, exec: &mut Execution) -> Attempt {
        let entities = exec.entities.clone().unwrap_or_default();
        let assessment = triage_risk::assess(&exec.payload, &entities, &self.config.risk);
        let level = assessment.risk_level;
        exec.set_risk_assessment(assessment);
        Attempt::Done(Outcome::Risk(level))
    }

    async fn handle_process(&self, exec: &Execution) -> Attempt {
        let Some(assessment) = exec.risk_assessment.clone() else {
            return Attempt::Done(Outcome::Fatal("no risk assessment recorded".into()));
        };

        let artifact = Artifact::from_assessment(exec.id.clone(), &assessment);
        let fan_out = async {
            tokio::try_join!(
                self.capabilities.persistence.store(
                    &exec.id,
                    &assessment.masked_payload,
                    exec.payload.metadata.clone(),
                ),
                self.capabilities
                    .persistence
                    .store_artifact(&exec.id, artifact),
            )
        };

        match timeout(self.config.call_timeout(), fan_out).await {
            Err(_) => return Attempt::Transient("persistence fan-out timed out".into()),
            Ok(Err(err)) => return Attempt::Transient(err.to_string()),
            Ok(Ok(_)) => {}
        }

        // Emitted only after the join succeeds; a retried attempt
        // must not repeat the event for an unpersisted record.
        self.capabilities
            .notifier
            .notify(Notification::RecordProcessed {
                execution_id: exec.id.clone(),
            })
            .await;
        Attempt::Done(Outcome::Success)
    }

    async fn handle_quarantine(&self, exec: &Execution) -> Attempt {
        let reason = exec
            .decision_reason
            .clone()
            .unwrap_or_else(|| "quarantined".into());
        let isolate = self
            .capabilities
            .persistence
            .quarantine(&exec.id, &exec.payload, &reason);
        match timeout(self.config.call_timeout(), isolate).await {
            Err(_) => Attempt::Transient("quarantine store timed out".into()),
            Ok(Err(err)) => Attempt::Transient(err.to_string()),
            Ok(Ok(())) => Attempt::Done(Outcome::Success),
        }
    }

    async fn handle_alert(&self, exec: &Execution) -> Attempt {
        let assessment = exec.risk_assessment.as_ref();
        self.capabilities
            .notifier
            .notify(Notification::HighRiskAlert {
                execution_id: exec.id.clone(),
                reason: exec.decision_reason.clone().unwrap_or_default(),
                risk_level: assessment.map(|a| a.risk_level),
                sensitive_count: assessment.map(|a| a.sensitive_count).unwrap_or(0),
                high_confidence_sensitive_count: assessment
                    .map(|a| a.high_confidence_sensitive_count)
                    .unwrap_or(0),
                sensitive_types: assessment
                    .map(|a| a.sensitive_types.clone())
                    .unwrap_or_default(),
            })
            .await;
        Attempt::Done(Outcome::Success)
    }
}
