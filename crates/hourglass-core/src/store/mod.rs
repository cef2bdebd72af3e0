//! State store adapter
//!
//! The game record lives outside the process. Every backend offers the
//! same three atomic primitives:
//! - get-by-key with a selectable read consistency
//! - create-if-absent
//! - full-record replace conditioned on the stored `version`
//!
//! No backend ever blocks a writer on a lock held by another request; a
//! losing writer gets `StoreError::VersionConflict` immediately.

use crate::error::StoreError;
use crate::types::GameState;
use async_trait::async_trait;
use std::fmt::Debug;

#[cfg(feature = "dynamodb")]
pub mod dynamodb;
pub mod memory;

#[cfg(feature = "dynamodb")]
pub use dynamodb::DynamoStateStore;
pub use memory::{InMemoryStateStore, StoreStats};

/// Key of the singleton record
pub const GAME_STATE_ID: &str = "hourglass-realm-game-state";

/// Read consistency for `load`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Consistency {
    /// Reflects every accepted write; required for snapshots that feed a CAS
    #[default]
    Strong,
    /// May lag behind the last accepted write; fine for display
    Eventual,
}

/// Backing store for the singleton game record
#[async_trait]
pub trait StateStore: Send + Sync + Debug {
    /// Fetch the record
    ///
    /// # Errors
    /// - `StoreError::NotFound` if the record is absent
    async fn load(&self, consistency: Consistency) -> Result<GameState, StoreError>;

    /// Create the record unless one already exists
    ///
    /// # Errors
    /// - `StoreError::AlreadyExists` if a record is present
    async fn create_if_absent(&self, state: GameState) -> Result<GameState, StoreError>;

    /// Replace the whole record iff its stored version equals `expected_version`
    ///
    /// `next.version` must be `expected_version + 1`.
    ///
    /// # Errors
    /// - `StoreError::VersionConflict` if the stored version differs
    /// - `StoreError::NotFound` if the record is absent
    async fn compare_and_swap(
        &self,
        expected_version: u64,
        next: GameState,
    ) -> Result<GameState, StoreError>;

    /// Replace the record with `fresh`, or create it if absent
    ///
    /// The recreated record's version is the replaced record's version
    /// plus one (or `fresh.version` if nothing existed), so snapshots taken
    /// before the reset can never win a CAS afterwards. The replacement is
    /// a single write; the record is never observably absent.
    ///
    /// # Errors
    /// - `StoreError::VersionConflict` if another write landed during the reset
    async fn recreate(&self, fresh: GameState) -> Result<GameState, StoreError>;

    /// Backend name for logs
    fn name(&self) -> &'static str;
}

/// Reject a CAS whose successor does not advance the version by exactly one
pub(crate) fn check_successor(expected_version: u64, next: &GameState) -> Result<(), StoreError> {
    if next.version == expected_version + 1 {
        Ok(())
    } else {
        Err(StoreError::Backend(format!(
            "successor version {} does not follow {}",
            next.version, expected_version
        )))
    }
}
