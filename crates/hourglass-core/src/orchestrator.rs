//! Update orchestrator
//!
//! Every mutating request follows the same three steps:
//! 1. Read a strongly consistent snapshot
//! 2. Compute a `StateMutation` purely from that snapshot
//! 3. `commit` it as one conditional write keyed on the snapshot's version
//!
//! A conflict is returned as `HourglassError::VersionConflict`, never
//! retried here. Callers that can recompute their mutation from a fresh
//! snapshot may wrap the whole read-compute-commit cycle in
//! [`retry_on_conflict`].

use crate::error::{HourglassError, Result, StoreError};
use crate::store::{Consistency, StateStore};
use crate::types::{GameState, MasterCodes, Puzzle1b, SessionToken};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;

/// Sparse set of full-replace field updates
///
/// Each `Some` field replaces the corresponding path of the snapshot
/// wholesale; `None` leaves it as read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateMutation {
    pub active_token: Option<SessionToken>,
    pub token_claim_time: Option<DateTime<Utc>>,
    pub target_time: Option<DateTime<Utc>>,
    pub hints: Option<Vec<String>>,
    pub master_codes: Option<MasterCodes>,
    pub puzzle_1b: Option<Puzzle1b>,
    pub complete: Option<bool>,
}

impl StateMutation {
    /// Empty mutation
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a new session token
    #[must_use]
    pub fn with_session(mut self, token: SessionToken, claimed_at: DateTime<Utc>) -> Self {
        self.active_token = Some(token);
        self.token_claim_time = Some(claimed_at);
        self
    }

    /// Replace the countdown deadline
    #[must_use]
    pub fn with_target_time(mut self, target_time: DateTime<Utc>) -> Self {
        self.target_time = Some(target_time);
        self
    }

    /// Replace the hint list
    #[must_use]
    pub fn with_hints(mut self, hints: Vec<String>) -> Self {
        self.hints = Some(hints);
        self
    }

    /// Replace the room secrets
    #[must_use]
    pub fn with_master_codes(mut self, master_codes: MasterCodes) -> Self {
        self.master_codes = Some(master_codes);
        self
    }

    /// Replace the drawing sub-puzzle
    #[must_use]
    pub fn with_puzzle(mut self, puzzle: Puzzle1b) -> Self {
        self.puzzle_1b = Some(puzzle);
        self
    }

    /// Set the completion flag
    #[must_use]
    pub fn with_complete(mut self, complete: bool) -> Self {
        self.complete = Some(complete);
        self
    }

    /// Whether no field is targeted
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    /// Names of the targeted fields
    #[must_use]
    pub fn fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.active_token.is_some() {
            fields.push("active_token");
        }
        if self.token_claim_time.is_some() {
            fields.push("token_claim_time");
        }
        if self.target_time.is_some() {
            fields.push("target_time");
        }
        if self.hints.is_some() {
            fields.push("hints");
        }
        if self.master_codes.is_some() {
            fields.push("master_codes");
        }
        if self.puzzle_1b.is_some() {
            fields.push("puzzle_1b");
        }
        if self.complete.is_some() {
            fields.push("complete");
        }
        fields
    }

    /// Write the targeted fields into `state`
    pub fn apply_to(self, state: &mut GameState) {
        if let Some(token) = self.active_token {
            state.active_token = token;
        }
        if let Some(claimed_at) = self.token_claim_time {
            state.token_claim_time = claimed_at;
        }
        if let Some(target_time) = self.target_time {
            state.target_time = target_time;
        }
        if let Some(hints) = self.hints {
            state.hints = hints;
        }
        if let Some(master_codes) = self.master_codes {
            state.master_codes = master_codes;
        }
        if let Some(puzzle) = self.puzzle_1b {
            state.puzzle_1b = puzzle;
        }
        if let Some(complete) = self.complete {
            state.complete = complete;
        }
    }
}

/// Composes mutations onto snapshots and commits them conditionally
#[derive(Debug, Clone)]
pub struct UpdateOrchestrator {
    store: Arc<dyn StateStore>,
}

impl UpdateOrchestrator {
    /// Create over a store
    #[inline]
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Underlying store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// Strongly consistent snapshot for a write path
    ///
    /// # Errors
    /// - `HourglassError::NotInitialized` if the record is absent
    pub async fn snapshot(&self) -> Result<GameState> {
        self.read(Consistency::Strong).await
    }

    /// Snapshot at the requested consistency
    ///
    /// # Errors
    /// - `HourglassError::NotInitialized` if the record is absent
    pub async fn read(&self, consistency: Consistency) -> Result<GameState> {
        let state = self.store.load(consistency).await?;
        tracing::debug!(version = state.version, ?consistency, "loaded game state");
        Ok(state)
    }

    /// Apply `mutation` to `base` and write it iff the store is still at
    /// `base.version`
    ///
    /// On success the returned state has `version = base.version + 1` and a
    /// refreshed `updated_at`.
    ///
    /// # Errors
    /// - `HourglassError::VersionConflict` if another write landed first;
    ///   nothing is applied
    /// - `HourglassError::NotInitialized` if the record was destroyed
    pub async fn commit(&self, base: &GameState, mutation: StateMutation) -> Result<GameState> {
        let fields = mutation.fields();
        let mut next = base.clone();
        mutation.apply_to(&mut next);
        next.version = base.version + 1;
        next.updated_at = Utc::now();

        match self.store.compare_and_swap(base.version, next).await {
            Ok(committed) => {
                tracing::debug!(version = committed.version, ?fields, "committed game state");
                Ok(committed)
            }
            Err(StoreError::VersionConflict { expected, actual }) => {
                tracing::warn!(expected, ?actual, ?fields, "version conflict, write rejected");
                Err(HourglassError::VersionConflict { expected })
            }
            Err(other) => Err(other.into()),
        }
    }
}

/// Run `op` up to `attempts` times while it fails with a version conflict
///
/// `op` must redo its own snapshot read; re-submitting a mutation computed
/// from a stale snapshot would defeat the version check. `attempts` of 0 is
/// treated as 1.
///
/// # Errors
/// Returns the last error once attempts are exhausted, or the first
/// non-retryable error.
pub async fn retry_on_conflict<T, F, Fut>(attempts: u32, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Err(error) if error.is_retryable() && attempt < attempts => {
                tracing::debug!(attempt, attempts, "retrying after version conflict");
                attempt += 1;
            }
            outcome => return outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStateStore;
    use crate::types::{MasterCodes, StagePins};
    use chrono::Duration;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fresh() -> GameState {
        GameState::fresh(
            MasterCodes {
                passphrase: "OPEN".to_string(),
                puzzle_1b_pins: StagePins::new("000", "111"),
            },
            Duration::minutes(60),
            Utc::now(),
        )
    }

    fn orchestrator() -> UpdateOrchestrator {
        UpdateOrchestrator::new(Arc::new(InMemoryStateStore::with_state(fresh())))
    }

    #[test]
    fn mutation_reports_targeted_fields() {
        let mutation = StateMutation::new()
            .with_complete(true)
            .with_hints(vec![]);
        assert_eq!(mutation.fields(), vec!["hints", "complete"]);
        assert!(StateMutation::new().is_empty());
    }

    #[test]
    fn mutation_replaces_only_named_fields() {
        let mut state = fresh();
        state.hints = vec!["old".to_string()];
        let token_before = state.active_token.clone();

        StateMutation::new()
            .with_hints(Vec::new())
            .apply_to(&mut state);

        assert!(state.hints.is_empty());
        assert_eq!(state.active_token, token_before);
    }

    #[tokio::test]
    async fn commit_increments_version_by_one() {
        let orchestrator = orchestrator();
        let base = orchestrator.snapshot().await.unwrap();
        let committed = orchestrator
            .commit(&base, StateMutation::new().with_complete(true))
            .await
            .unwrap();
        assert_eq!(committed.version, base.version + 1);
        assert!(committed.complete);
        assert!(committed.updated_at >= base.updated_at);
    }

    #[tokio::test]
    async fn commit_against_stale_snapshot_conflicts() {
        let orchestrator = orchestrator();
        let base = orchestrator.snapshot().await.unwrap();
        orchestrator
            .commit(&base, StateMutation::new().with_hints(vec!["a".into()]))
            .await
            .unwrap();

        let result = orchestrator
            .commit(&base, StateMutation::new().with_complete(true))
            .await;
        assert!(matches!(
            result,
            Err(HourglassError::VersionConflict { expected: 1 })
        ));

        let current = orchestrator.snapshot().await.unwrap();
        assert!(!current.complete);
        assert_eq!(current.hints, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn snapshot_of_missing_record_is_not_initialized() {
        let orchestrator = UpdateOrchestrator::new(Arc::new(InMemoryStateStore::new()));
        assert!(matches!(
            orchestrator.snapshot().await,
            Err(HourglassError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn retry_stops_on_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = retry_on_conflict(3, move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Err(HourglassError::VersionConflict { expected: 1 })
            } else {
                Ok(n)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn retry_is_bounded() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = retry_on_conflict(3, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(HourglassError::VersionConflict { expected: 1 })
        })
        .await;
        assert!(result.unwrap_err().is_retryable());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_does_not_repeat_terminal_errors() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = retry_on_conflict(5, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(HourglassError::Forbidden("stale token".into()))
        })
        .await;
        assert!(matches!(result, Err(HourglassError::Forbidden(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
