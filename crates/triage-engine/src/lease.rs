//! Per-execution leases enforcing the single-writer invariant
//!
//! At most one worker may advance a given execution at any instant.
//! Leases carry an expiry shorter than any state's own timeout, so a
//! crashed worker's lease becomes reclaimable instead of wedging the
//! execution forever. Active workers renew on every handler attempt.

use crate::errors::EngineError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use triage_types::ExecutionId;

#[derive(Clone, Copy, Debug)]
struct Lease {
    holder: u64,
    expires_at: Instant,
}

/// In-process lock table keyed by execution id
#[derive(Clone)]
pub struct LeaseRegistry {
    inner: Arc<Mutex<HashMap<ExecutionId, Lease>>>,
    next_holder: Arc<AtomicU64>,
    ttl: Duration,
}

impl LeaseRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            next_holder: Arc::new(AtomicU64::new(1)),
            ttl,
        }
    }

    /// Acquire the lease for an execution. Fails with
    /// [`EngineError::LeaseConflict`] while another holder's lease is
    /// live; an expired lease is reclaimed.
    pub fn acquire(&self, id: &ExecutionId) -> Result<LeaseGuard, EngineError> {
        let mut table = self.inner.lock();
        let now = Instant::now();

        if let Some(lease) = table.get(id) {
            if lease.expires_at > now {
                return Err(EngineError::LeaseConflict(id.clone()));
            }
            tracing::warn!(execution_id = %id, "reclaiming expired lease");
        }

        let holder = self.next_holder.fetch_add(1, Ordering::Relaxed);
        table.insert(
            id.clone(),
            Lease {
                holder,
                expires_at: now + self.ttl,
            },
        );

        Ok(LeaseGuard {
            registry: self.clone(),
            id: id.clone(),
            holder,
        })
    }

    fn renew(&self, id: &ExecutionId, holder: u64) {
        let mut table = self.inner.lock();
        if let Some(lease) = table.get_mut(id) {
            if lease.holder == holder {
                lease.expires_at = Instant::now() + self.ttl;
            }
        }
    }

    fn release(&self, id: &ExecutionId, holder: u64) {
        let mut table = self.inner.lock();
        if table.get(id).is_some_and(|l| l.holder == holder) {
            table.remove(id);
        }
    }

    /// Whether a live lease exists for the execution
    pub fn is_held(&self, id: &ExecutionId) -> bool {
        let table = self.inner.lock();
        table
            .get(id)
            .is_some_and(|l| l.expires_at > Instant::now())
    }
}

/// Holding this guard is holding the lease; dropping it releases,
/// unless the lease was already reclaimed by another holder.
pub struct LeaseGuard {
    registry: LeaseRegistry,
    id: ExecutionId,
    holder: u64,
}

impl LeaseGuard {
    /// Extend the lease; called before every handler attempt
    pub fn renew(&self) {
        self.registry.renew(&self.id, self.holder);
    }

    pub fn execution_id(&self) -> &ExecutionId {
        &self.id
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        self.registry.release(&self.id, self.holder);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> LeaseRegistry {
        LeaseRegistry::new(Duration::from_secs(30))
    }

    #[test]
    fn test_acquire_and_release() {
        let leases = registry();
        let id = ExecutionId::new("exec-1");

        let guard = leases.acquire(&id).unwrap();
        assert!(leases.is_held(&id));

        drop(guard);
        assert!(!leases.is_held(&id));
        assert!(leases.acquire(&id).is_ok());
    }

    #[test]
    fn test_conflict_while_held() {
        let leases = registry();
        let id = ExecutionId::new("exec-1");

        let _guard = leases.acquire(&id).unwrap();
        let second = leases.acquire(&id);
        assert!(matches!(second, Err(EngineError::LeaseConflict(_))));
    }

    #[test]
    fn test_independent_executions_do_not_conflict() {
        let leases = registry();
        let _a = leases.acquire(&ExecutionId::new("a")).unwrap();
        let _b = leases.acquire(&ExecutionId::new("b")).unwrap();
    }

    #[test]
    fn test_expired_lease_is_reclaimable() {
        let leases = LeaseRegistry::new(Duration::from_millis(0));
        let id = ExecutionId::new("exec-1");

        let stale = leases.acquire(&id).unwrap();
        // ttl zero: immediately expired, so a new worker can take over
        let fresh = leases.acquire(&id).unwrap();

        // The stale guard's drop must not release the reclaimed lease
        drop(stale);
        assert!(leases.is_held(&id));
        drop(fresh);
        assert!(!leases.is_held(&id));
    }

    #[test]
    fn test_exactly_one_concurrent_winner() {
        let leases = registry();
        let id = ExecutionId::new("contended");
        let barrier = Arc::new(std::sync::Barrier::new(16));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let leases = leases.clone();
            let id = id.clone();
            let barrier = barrier.clone();
            handles.push(std::thread::spawn(move || {
                barrier.wait();
                // Guards are held until every thread has attempted
                leases.acquire(&id)
            }));
        }

        let guards: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect();
        let winners = guards.iter().filter(|g| g.is_ok()).count();
        assert_eq!(winners, 1, "exactly one worker may hold the lease");
    }
}
