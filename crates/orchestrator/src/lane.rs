//! Per-session execution lanes.
//!
//! Every mutation of a session runs while holding that session's lane, so
//! manual commands and deadline firings for one session form a single total
//! order. Different sessions never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

pub type LaneGuard = OwnedMutexGuard<()>;

#[derive(Default)]
pub struct LaneRegistry {
    lanes: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl LaneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lane(&self, session_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        let mut lanes = self.lanes.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(lanes.entry(session_id).or_default())
    }

    /// Waits for the session's lane. Waiters are served in arrival order.
    pub async fn acquire(&self, session_id: Uuid) -> LaneGuard {
        self.lane(session_id).lock_owned().await
    }

    /// Forgets the lane of a finished session if nobody else holds or waits
    /// on it. Call while holding the lane.
    pub fn retire(&self, session_id: Uuid) {
        let mut lanes = self.lanes.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the map plus the caller's guard.
        if lanes
            .get(&session_id)
            .is_some_and(|lane| Arc::strong_count(lane) <= 2)
        {
            lanes.remove(&session_id);
        }
    }

    pub fn len(&self) -> usize {
        self.lanes.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
