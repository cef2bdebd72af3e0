//! Hourglass Server - HTTP surface for Hourglass Realm
//!
//! Wires [`hourglass_core::RoomService`] to:
//! - warp routes for players and the game master
//! - a Gemini drawing classifier
//! - an in-memory or DynamoDB state store
//! - an optional filesystem drawing archive

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod gemini;
pub mod routes;
pub mod telemetry;

pub use config::{cli, ServerConfig, StoreBackend};
pub use gemini::GeminiClassifier;
pub use routes::{api, AppState};
pub use telemetry::init_tracing;

use hourglass_core::{
    DrawingClassifier, FsDrawingArchive, InMemoryStateStore, RoomConfig, RoomService, StateStore,
    UnavailableClassifier,
};
use std::sync::Arc;

/// Build the store selected by `config`
///
/// # Errors
/// Fails when the selected backend is not compiled in.
pub async fn build_store(config: &ServerConfig) -> anyhow::Result<Arc<dyn StateStore>> {
    match &config.store {
        StoreBackend::Memory => Ok(Arc::new(InMemoryStateStore::new())),
        #[cfg(feature = "dynamodb")]
        StoreBackend::DynamoDb { table } => Ok(Arc::new(
            hourglass_core::DynamoStateStore::from_env(table.clone()).await,
        )),
        #[cfg(not(feature = "dynamodb"))]
        StoreBackend::DynamoDb { .. } => {
            anyhow::bail!("built without the `dynamodb` feature")
        }
    }
}

/// Build the classifier selected by `config`
///
/// Without an API key drawing submissions fail with a classifier error.
///
/// # Errors
/// Fails when the HTTP client cannot be built.
pub fn build_classifier(config: &ServerConfig) -> anyhow::Result<Arc<dyn DrawingClassifier>> {
    match &config.gemini_api_key {
        Some(key) => Ok(Arc::new(GeminiClassifier::new(config.gemini_model.clone(), key.clone())?)),
        None => {
            tracing::warn!("GOOGLE_API_KEY not set; drawing classification is unavailable");
            Ok(Arc::new(UnavailableClassifier))
        }
    }
}

/// Assemble the service and make sure the game record exists
///
/// # Errors
/// Fails on a bad room configuration, an unavailable backend or a store
/// failure during initialization.
pub async fn build_service(config: &ServerConfig, room: RoomConfig) -> anyhow::Result<RoomService> {
    let store = build_store(config).await?;
    let classifier = build_classifier(config)?;
    let mut service = RoomService::new(room, store, classifier);
    if let Some(dir) = &config.archive_dir {
        tracing::info!(dir = %dir.display(), "archiving drawings");
        service = service.with_archive(Arc::new(FsDrawingArchive::new(dir)));
    }
    service.initialize().await?;
    Ok(service)
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
