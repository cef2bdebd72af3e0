//! Session guard
//!
//! Gates every player and admin operation:
//! - missing or non-bearer credential -> `Unauthenticated`
//! - bearer credential that does not match -> `Forbidden`
//!
//! A successful check hands back the snapshot it was checked against, so
//! the caller can feed it straight into a conditional write.

use crate::error::{HourglassError, Result};
use crate::orchestrator::UpdateOrchestrator;
use crate::store::Consistency;
use crate::types::GameState;

const BEARER_PREFIX: &str = "Bearer ";

/// Extract the credential from an `Authorization: Bearer <credential>` value
#[must_use]
pub fn bearer_credential(authorization: Option<&str>) -> Option<&str> {
    authorization?
        .strip_prefix(BEARER_PREFIX)
        .map(str::trim)
        .filter(|credential| !credential.is_empty())
}

/// Check `token` against the snapshot's active token
///
/// # Errors
/// - `HourglassError::Forbidden` on mismatch (never issued or superseded)
pub fn check_session(state: &GameState, token: &str) -> Result<()> {
    if state.active_token.as_str() == token {
        Ok(())
    } else {
        Err(HourglassError::Forbidden(
            "invalid or expired session token".to_string(),
        ))
    }
}

/// Validates player tokens and the admin secret
#[derive(Debug, Clone)]
pub struct SessionGuard {
    orchestrator: UpdateOrchestrator,
    admin_secret: String,
}

impl SessionGuard {
    /// Create a guard reading through `orchestrator`
    #[must_use]
    pub fn new(orchestrator: UpdateOrchestrator, admin_secret: impl Into<String>) -> Self {
        Self {
            orchestrator,
            admin_secret: admin_secret.into(),
        }
    }

    /// Validate a player's bearer token
    ///
    /// # Errors
    /// - `HourglassError::Unauthenticated` if no bearer token is supplied
    /// - `HourglassError::Forbidden` if it is not the active token
    /// - `HourglassError::NotInitialized` if the record is absent
    pub async fn validate_session(
        &self,
        authorization: Option<&str>,
        consistency: Consistency,
    ) -> Result<GameState> {
        let token = bearer_credential(authorization)
            .ok_or_else(|| HourglassError::Unauthenticated("missing token".to_string()))?;
        let state = self.orchestrator.read(consistency).await?;
        check_session(&state, token)?;
        Ok(state)
    }

    /// Validate the admin secret
    ///
    /// # Errors
    /// - `HourglassError::Unauthenticated` if no bearer secret is supplied
    /// - `HourglassError::Forbidden` if it is not the configured secret
    /// - `HourglassError::NotInitialized` if the record is absent
    pub async fn validate_admin(
        &self,
        authorization: Option<&str>,
        consistency: Consistency,
    ) -> Result<GameState> {
        self.check_admin(authorization)?;
        self.orchestrator.read(consistency).await
    }

    /// Credential-only admin check, for operations that do not need a
    /// snapshot (reset must work on a missing record too)
    ///
    /// # Errors
    /// Same credential errors as [`Self::validate_admin`].
    pub fn check_admin(&self, authorization: Option<&str>) -> Result<()> {
        let secret = bearer_credential(authorization).ok_or_else(|| {
            HourglassError::Unauthenticated("admin passphrase required".to_string())
        })?;
        if secret == self.admin_secret {
            Ok(())
        } else {
            tracing::warn!("rejected admin request with wrong passphrase");
            Err(HourglassError::Forbidden(
                "invalid admin passphrase".to_string(),
            ))
        }
    }
}
