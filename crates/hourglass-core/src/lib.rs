//! Hourglass Core - escape-room session and puzzle engine
//!
//! The stateless core behind the Hourglass Realm room:
//! - Single-active-session tokens (a new `enter` supersedes the old one)
//! - The three-stage drawing sub-puzzle
//! - Admin overrides for countdown, hints and secrets
//! - Optimistic compare-and-swap on a versioned singleton record, so any
//!   number of handler replicas can share one external store without locks
//!
//! # Example
//!
//! ```rust,ignore
//! use hourglass_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> hourglass_core::Result<()> {
//! let service = RoomService::new(
//!     RoomConfig::from_env()?,
//!     Arc::new(InMemoryStateStore::new()),
//!     Arc::new(UnavailableClassifier),
//! );
//! service.initialize().await?;
//!
//! let token = service.create_session().await?;
//! let auth = format!("Bearer {token}");
//! let view = service.fetch(Some(&auth)).await?;
//! println!("{} drawings found", view.puzzle_1b.count);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod admin;
pub mod archive;
pub mod classifier;
pub mod config;
pub mod error;
pub mod guard;
pub mod orchestrator;
pub mod puzzle;
pub mod service;
pub mod store;
pub mod types;

// Re-exports for convenience
pub use admin::{
    append_hint, apply_admin_update, deadline_from_now, parse_timestamp, AdminUpdate,
};
pub use archive::{DataUrlImage, DrawingArchive, FsDrawingArchive, NoopArchive};
pub use classifier::{Classification, DrawingClassifier, UnavailableClassifier};
pub use config::RoomConfig;
pub use error::{ArchiveError, ClassifierError, HourglassError, Result, StoreError};
pub use guard::{bearer_credential, SessionGuard};
pub use orchestrator::{retry_on_conflict, StateMutation, UpdateOrchestrator};
pub use puzzle::{advance, Advance, Transition};
pub use service::{RoomService, SessionView};
#[cfg(feature = "dynamodb")]
pub use store::DynamoStateStore;
pub use store::{Consistency, InMemoryStateStore, StateStore, StoreStats, GAME_STATE_ID};
pub use types::{
    BasicCategory, Category, GameState, MasterCodes, Puzzle1b, PuzzleStage, PuzzleSummary,
    SessionToken, Stage1Progress, StagePins,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Hourglass Core
    pub use crate::{
        AdminUpdate, BasicCategory, Category, Classification, Consistency, DrawingArchive,
        DrawingClassifier, GameState, HourglassError, InMemoryStateStore, PuzzleStage,
        RoomConfig, RoomService, SessionToken, SessionView, StagePins, StateStore,
        UnavailableClassifier,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
