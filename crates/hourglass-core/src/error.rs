//! Error types for Hourglass Core
//!
//! Provides the error taxonomy for:
//! - Credential checks (missing vs. wrong/stale credentials)
//! - Admin field validation
//! - Optimistic-concurrency conflicts
//! - State store, classifier and archive failures

/// Main service error type
#[derive(Debug, thiserror::Error)]
pub enum HourglassError {
    /// No bearer credential supplied
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Credential supplied but wrong or superseded
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Malformed admin field value
    #[error("validation failed: {0}")]
    Validation(String),

    /// A concurrent write won the race against this one
    #[error("version mismatch: state was modified since version {expected}, please retry")]
    VersionConflict { expected: u64 },

    /// The game record does not exist
    #[error("game state not initialized")]
    NotInitialized,

    /// Drawing classification failed
    #[error("classifier error: {0}")]
    Classifier(#[from] ClassifierError),

    /// Backing store failure
    #[error("state store error: {0}")]
    Store(StoreError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl HourglassError {
    /// Check if error is retryable against a fresh snapshot
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }

    /// Check if error is terminal for the request
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Unauthenticated(_) | Self::Forbidden(_) | Self::Validation(_)
        )
    }
}

impl From<StoreError> for HourglassError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::VersionConflict { expected, .. } => Self::VersionConflict { expected },
            StoreError::NotFound => Self::NotInitialized,
            other => Self::Store(other),
        }
    }
}

/// State store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Conditional write rejected: stored version differs from the expected one
    #[error("version conflict: expected {expected}, found {actual:?}")]
    VersionConflict {
        expected: u64,
        actual: Option<u64>,
    },

    /// Record absent
    #[error("record not found")]
    NotFound,

    /// Create-if-absent found an existing record
    #[error("record already exists")]
    AlreadyExists,

    /// Record could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend-specific failure
    #[error("backend error: {0}")]
    Backend(String),
}

/// Drawing classifier errors
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    /// No classifier is configured
    #[error("classifier unavailable")]
    Unavailable,

    /// The submitted payload is not an image data URL
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// Request to the model failed
    #[error("transport error: {0}")]
    Transport(String),

    /// Model answered with something unparsable
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Drawing archive errors (never surfaced to players)
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// Not a `data:image/<fmt>;base64,` URL
    #[error("image payload is not a base64 data URL")]
    InvalidDataUrl,

    /// Base64 payload failed to decode
    #[error("decode error: {0}")]
    Decode(String),

    /// Filesystem failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result alias
pub type Result<T, E = HourglassError> = std::result::Result<T, E>;
