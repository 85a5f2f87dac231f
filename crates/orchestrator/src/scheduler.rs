//! One-shot deadline timers.
//!
//! A deadline is armed for a key and fires at most once. Arming a key again
//! aborts the previous timer and issues a fresh token; a firing whose token
//! is no longer the armed one is stale. Fired deadlines are not handled here:
//! they are sent to the receiver returned by [`PhaseScheduler::new`], whose
//! owner re-checks durable state before acting.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::trace;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeadlineKind {
    /// Budget of one phase session runs out.
    Phase(Uuid),
    /// Total budget of the session runs out.
    SessionBudget,
    /// A pending session reaches its scheduled start.
    ScheduledStart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeadlineKey {
    pub session_id: Uuid,
    pub kind: DeadlineKind,
}

impl DeadlineKey {
    pub fn new(session_id: Uuid, kind: DeadlineKind) -> Self {
        Self { session_id, kind }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiredDeadline {
    pub key: DeadlineKey,
    pub token: u64,
}

struct Armed {
    token: u64,
    handle: AbortHandle,
}

pub struct PhaseScheduler {
    armed: Mutex<HashMap<DeadlineKey, Armed>>,
    next_token: AtomicU64,
    fired: mpsc::UnboundedSender<FiredDeadline>,
}

impl PhaseScheduler {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<FiredDeadline>) {
        let (fired, rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            armed: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(1),
            fired,
        };
        (scheduler, rx)
    }

    fn armed(&self) -> MutexGuard<'_, HashMap<DeadlineKey, Armed>> {
        self.armed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Arms `key` to fire after `delay`, replacing any earlier timer for it.
    /// Must be called from within a tokio runtime.
    pub fn arm(&self, key: DeadlineKey, delay: Duration) -> u64 {
        let token = self.next_token.fetch_add(1, Ordering::SeqCst);
        let fired = self.fired.clone();

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The receiver is gone only when the orchestrator is shutting down.
            let _ = fired.send(FiredDeadline { key, token });
        });

        let previous = self.armed().insert(
            key,
            Armed {
                token,
                handle: task.abort_handle(),
            },
        );
        if let Some(previous) = previous {
            previous.handle.abort();
        }

        trace!(session_id = %key.session_id, ?key.kind, token, delay_ms = delay.as_millis() as u64, "Deadline armed");
        token
    }

    /// Cancels the timer for `key`. Returns whether one was armed.
    pub fn disarm(&self, key: DeadlineKey) -> bool {
        match self.armed().remove(&key) {
            Some(armed) => {
                armed.handle.abort();
                trace!(session_id = %key.session_id, ?key.kind, "Deadline disarmed");
                true
            }
            None => false,
        }
    }

    /// Cancels every timer of a session.
    pub fn disarm_session(&self, session_id: Uuid) -> usize {
        let mut armed = self.armed();
        let keys: Vec<DeadlineKey> = armed
            .keys()
            .filter(|k| k.session_id == session_id)
            .copied()
            .collect();
        for key in &keys {
            if let Some(entry) = armed.remove(key) {
                entry.handle.abort();
            }
        }
        keys.len()
    }

    /// Token of the currently armed timer for `key`.
    pub fn token(&self, key: DeadlineKey) -> Option<u64> {
        self.armed().get(&key).map(|a| a.token)
    }

    /// Consumes the armed entry if `token` is still the current one.
    pub fn take_if_current(&self, key: DeadlineKey, token: u64) -> bool {
        let mut armed = self.armed();
        match armed.get(&key) {
            Some(entry) if entry.token == token => {
                armed.remove(&key);
                true
            }
            _ => false,
        }
    }

    pub fn armed_count(&self) -> usize {
        self.armed().len()
    }

    /// Aborts every pending timer.
    fn shutdown(&self) {
        for (_, armed) in self.armed().drain() {
            armed.handle.abort();
        }
    }
}

impl Drop for PhaseScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
