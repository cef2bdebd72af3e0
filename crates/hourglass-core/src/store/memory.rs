//! In-process state store
//!
//! A single mutex-guarded slot. Each primitive takes the lock once, so
//! check-and-write is indivisible across tasks sharing the store.

use super::{check_successor, Consistency, StateStore};
use crate::error::StoreError;
use crate::types::GameState;
use async_trait::async_trait;
use parking_lot::Mutex;

/// Store statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Conditional writes accepted
    pub committed: u64,
    /// Conditional writes rejected on version mismatch
    pub conflicts: u64,
    /// Records created (initialization and resets)
    pub created: u64,
}

#[derive(Debug, Default)]
struct Slot {
    record: Option<GameState>,
    stats: StoreStats,
}

/// Mutex-backed store for single-process deployments and tests
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    slot: Mutex<Slot>,
}

impl InMemoryStateStore {
    /// Create an empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding `state`
    #[must_use]
    pub fn with_state(state: GameState) -> Self {
        Self {
            slot: Mutex::new(Slot {
                record: Some(state),
                stats: StoreStats::default(),
            }),
        }
    }

    /// Current statistics
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        self.slot.lock().stats
    }

    /// Drop the record without recreating it
    pub fn clear(&self) {
        self.slot.lock().record = None;
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn load(&self, _consistency: Consistency) -> Result<GameState, StoreError> {
        self.slot.lock().record.clone().ok_or(StoreError::NotFound)
    }

    async fn create_if_absent(&self, state: GameState) -> Result<GameState, StoreError> {
        let mut slot = self.slot.lock();
        if slot.record.is_some() {
            return Err(StoreError::AlreadyExists);
        }
        slot.record = Some(state.clone());
        slot.stats.created += 1;
        Ok(state)
    }

    async fn compare_and_swap(
        &self,
        expected_version: u64,
        next: GameState,
    ) -> Result<GameState, StoreError> {
        check_successor(expected_version, &next)?;

        let mut slot = self.slot.lock();
        let actual = slot
            .record
            .as_ref()
            .map(|s| s.version)
            .ok_or(StoreError::NotFound)?;

        if actual != expected_version {
            slot.stats.conflicts += 1;
            return Err(StoreError::VersionConflict {
                expected: expected_version,
                actual: Some(actual),
            });
        }

        slot.record = Some(next.clone());
        slot.stats.committed += 1;
        Ok(next)
    }

    async fn recreate(&self, mut fresh: GameState) -> Result<GameState, StoreError> {
        let mut slot = self.slot.lock();
        if let Some(previous) = slot.record.take() {
            fresh.version = previous.version + 1;
        }
        slot.record = Some(fresh.clone());
        slot.stats.created += 1;
        Ok(fresh)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
