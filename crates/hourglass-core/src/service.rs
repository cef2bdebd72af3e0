//! Room service
//!
//! The operation surface exposed to a calling layer. Every operation
//! follows the same shape: guard check (which yields a snapshot), pure
//! computation of a mutation from that snapshot, one conditional commit.
//! None of them retries internally; a `VersionConflict` goes back to the
//! caller, which may wrap idempotent operations in
//! [`retry_on_conflict`](crate::orchestrator::retry_on_conflict).

use crate::admin::{append_hint, apply_admin_update, deadline_from_now, AdminUpdate};
use crate::archive::{DrawingArchive, NoopArchive};
use crate::classifier::DrawingClassifier;
use crate::config::RoomConfig;
use crate::error::{HourglassError, Result, StoreError};
use crate::guard::SessionGuard;
use crate::orchestrator::{StateMutation, UpdateOrchestrator};
use crate::puzzle::advance;
use crate::store::{Consistency, StateStore};
use crate::types::{GameState, PuzzleStage, PuzzleSummary, SessionToken};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Player-facing view returned by `fetch`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    /// Countdown deadline
    pub remaining_time: DateTime<Utc>,
    /// Hints in display order
    pub hints: Vec<String>,
    /// Drawing sub-puzzle progress
    pub puzzle_1b: PuzzleSummary,
    /// Whether the room has been unlocked
    pub complete: bool,
}

impl From<&GameState> for SessionView {
    fn from(state: &GameState) -> Self {
        Self {
            remaining_time: state.target_time,
            hints: state.hints.clone(),
            puzzle_1b: state.puzzle_1b.summary(),
            complete: state.complete,
        }
    }
}

/// Escape-room operations over a shared state store
#[derive(Debug, Clone)]
pub struct RoomService {
    config: RoomConfig,
    orchestrator: UpdateOrchestrator,
    guard: SessionGuard,
    classifier: Arc<dyn DrawingClassifier>,
    archive: Arc<dyn DrawingArchive>,
}

impl RoomService {
    /// Create a service; drawings are not archived until
    /// [`with_archive`](Self::with_archive) is called
    #[must_use]
    pub fn new(
        config: RoomConfig,
        store: Arc<dyn StateStore>,
        classifier: Arc<dyn DrawingClassifier>,
    ) -> Self {
        let orchestrator = UpdateOrchestrator::new(store);
        let guard = SessionGuard::new(orchestrator.clone(), config.admin_secret.clone());
        Self {
            config,
            orchestrator,
            guard,
            classifier,
            archive: Arc::new(NoopArchive),
        }
    }

    /// With drawing archive
    #[inline]
    #[must_use]
    pub fn with_archive(mut self, archive: Arc<dyn DrawingArchive>) -> Self {
        self.archive = archive;
        self
    }

    /// Room configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Underlying store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<dyn StateStore> {
        self.orchestrator.store()
    }

    /// Create the game record if none exists; otherwise return the existing one
    ///
    /// Safe to call from many replicas at once.
    ///
    /// # Errors
    /// - `HourglassError::Store` on backend failure
    pub async fn initialize(&self) -> Result<GameState> {
        let fresh = self.config.fresh_state(Utc::now());
        match self.store().create_if_absent(fresh).await {
            Ok(created) => {
                tracing::info!(
                    store = self.store().name(),
                    version = created.version,
                    "initialized game state"
                );
                Ok(created)
            }
            Err(StoreError::AlreadyExists) => {
                let existing = self.orchestrator.snapshot().await?;
                tracing::debug!(version = existing.version, "game state already initialized");
                Ok(existing)
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Issue a new session token, superseding any active one
    ///
    /// # Errors
    /// - `HourglassError::VersionConflict` if another write landed first
    /// - `HourglassError::NotInitialized` if the record is absent
    pub async fn create_session(&self) -> Result<SessionToken> {
        let snapshot = self.orchestrator.snapshot().await?;
        let token = SessionToken::generate();
        let committed = self
            .orchestrator
            .commit(
                &snapshot,
                StateMutation::new().with_session(token.clone(), Utc::now()),
            )
            .await?;
        tracing::info!(
            token = token.redacted(),
            version = committed.version,
            "new session claimed"
        );
        Ok(token)
    }

    /// Player view of the room
    ///
    /// The token is checked against a strongly consistent read, so a token
    /// issued by `enter` is accepted at once and a superseded one is not.
    ///
    /// # Errors
    /// - `HourglassError::Unauthenticated` / `HourglassError::Forbidden` on a
    ///   missing or stale token
    pub async fn fetch(&self, authorization: Option<&str>) -> Result<SessionView> {
        let state = self
            .guard
            .validate_session(authorization, Consistency::Strong)
            .await?;
        Ok(SessionView::from(&state))
    }

    /// Try the room passphrase; a match marks the room complete
    ///
    /// Returns `false` on a wrong passphrase without writing anything.
    ///
    /// # Errors
    /// - `HourglassError::Unauthenticated` / `HourglassError::Forbidden` on a
    ///   missing or stale token
    /// - `HourglassError::VersionConflict` if another write landed first
    pub async fn attempt_unlock(
        &self,
        authorization: Option<&str>,
        passphrase: &str,
    ) -> Result<bool> {
        let snapshot = self
            .guard
            .validate_session(authorization, Consistency::Strong)
            .await?;
        if !snapshot.master_codes.passphrase_matches(passphrase) {
            tracing::debug!("wrong passphrase");
            return Ok(false);
        }
        if snapshot.complete {
            return Ok(true);
        }
        let committed = self
            .orchestrator
            .commit(&snapshot, StateMutation::new().with_complete(true))
            .await?;
        tracing::info!(version = committed.version, "room unlocked");
        Ok(true)
    }

    /// Classify a drawing and advance the sub-puzzle
    ///
    /// Returns the narrative text for the player. The classifier sees the
    /// snapshot's stage; a solved puzzle is classified with the stage-1
    /// vocabulary and never changes.
    ///
    /// # Errors
    /// - `HourglassError::Unauthenticated` / `HourglassError::Forbidden` on a
    ///   missing or stale token
    /// - `HourglassError::Classifier` if classification fails
    /// - `HourglassError::VersionConflict` if another write landed first
    pub async fn submit_drawing(
        &self,
        authorization: Option<&str>,
        image_data: &str,
    ) -> Result<String> {
        let snapshot = self
            .guard
            .validate_session(authorization, Consistency::Strong)
            .await?;
        let stage = snapshot.puzzle_1b.completed_stage;
        let vocabulary_stage = match stage {
            PuzzleStage::Solved => PuzzleStage::AwaitingSpecial,
            other => other,
        };

        let classification = self
            .classifier
            .classify(image_data, vocabulary_stage)
            .await?
            .restricted_to(stage);

        let outcome = advance(
            &snapshot.puzzle_1b,
            classification.category,
            &snapshot.master_codes.puzzle_1b_pins,
            classification.narrative,
        );

        if outcome.changed() {
            let committed = self
                .orchestrator
                .commit(
                    &snapshot,
                    StateMutation::new().with_puzzle(outcome.puzzle.clone()),
                )
                .await?;
            tracing::info!(
                transition = ?outcome.transition,
                stage = %committed.puzzle_1b.completed_stage,
                count = committed.puzzle_1b.stage1_count,
                pin_revealed = outcome.revealed_pin().is_some(),
                version = committed.version,
                "puzzle advanced"
            );
        } else {
            tracing::debug!(transition = ?outcome.transition, %stage, "puzzle unchanged");
        }

        if let Err(error) = self.archive.archive(image_data, &outcome.response).await {
            tracing::warn!(%error, "failed to archive drawing");
        }
        Ok(outcome.response)
    }

    /// Full game record
    ///
    /// # Errors
    /// - `HourglassError::Unauthenticated` / `HourglassError::Forbidden` on a
    ///   missing or wrong admin secret
    pub async fn admin_fetch(&self, authorization: Option<&str>) -> Result<GameState> {
        self.guard
            .validate_admin(authorization, Consistency::Eventual)
            .await
    }

    /// Apply an admin override; all present fields are validated first
    ///
    /// An update with no fields returns the snapshot without writing.
    ///
    /// # Errors
    /// - `HourglassError::Validation` if any field is malformed; nothing is written
    /// - `HourglassError::VersionConflict` if another write landed first
    pub async fn admin_update(
        &self,
        authorization: Option<&str>,
        update: AdminUpdate,
    ) -> Result<GameState> {
        let snapshot = self
            .guard
            .validate_admin(authorization, Consistency::Strong)
            .await?;
        let mutation = apply_admin_update(&snapshot, update)?;
        if mutation.is_empty() {
            return Ok(snapshot);
        }
        let fields = mutation.fields();
        let committed = self.orchestrator.commit(&snapshot, mutation).await?;
        tracing::info!(?fields, version = committed.version, "admin update applied");
        Ok(committed)
    }

    /// Move the countdown deadline to `minutes_from_now` minutes from now
    ///
    /// # Errors
    /// - `HourglassError::Unauthenticated` / `HourglassError::Forbidden` on a
    ///   missing or wrong admin secret
    /// - `HourglassError::Validation` if the offset is out of range
    /// - `HourglassError::VersionConflict` if another write landed first
    pub async fn admin_set_time(
        &self,
        authorization: Option<&str>,
        minutes_from_now: i64,
    ) -> Result<GameState> {
        let snapshot = self
            .guard
            .validate_admin(authorization, Consistency::Strong)
            .await?;
        let target_time = deadline_from_now(Utc::now(), minutes_from_now)?;
        let committed = self
            .orchestrator
            .commit(&snapshot, StateMutation::new().with_target_time(target_time))
            .await?;
        tracing::info!(
            minutes_from_now,
            target_time = %committed.target_time,
            version = committed.version,
            "countdown moved"
        );
        Ok(committed)
    }

    /// Append one hint to the hint list
    ///
    /// # Errors
    /// - `HourglassError::Unauthenticated` / `HourglassError::Forbidden` on a
    ///   missing or wrong admin secret
    /// - `HourglassError::Validation` if the hint is blank
    /// - `HourglassError::VersionConflict` if another write landed first
    pub async fn admin_append_hint(
        &self,
        authorization: Option<&str>,
        hint: &str,
    ) -> Result<GameState> {
        let snapshot = self
            .guard
            .validate_admin(authorization, Consistency::Strong)
            .await?;
        let mutation = append_hint(&snapshot, hint)?;
        let committed = self.orchestrator.commit(&snapshot, mutation).await?;
        tracing::info!(
            hints = committed.hints.len(),
            version = committed.version,
            "hint sent"
        );
        Ok(committed)
    }

    /// Destroy the record and start over with a fresh one
    ///
    /// Works whether or not a record exists.
    ///
    /// # Errors
    /// - `HourglassError::Unauthenticated` / `HourglassError::Forbidden` on a
    ///   missing or wrong admin secret
    /// - `HourglassError::VersionConflict` if a concurrent reset won
    pub async fn admin_reset(&self, authorization: Option<&str>) -> Result<GameState> {
        self.guard.check_admin(authorization)?;
        let fresh = self.config.fresh_state(Utc::now());
        let state = self.store().recreate(fresh).await.map_err(HourglassError::from)?;
        tracing::info!(
            token = state.active_token.redacted(),
            version = state.version,
            "game state reset"
        );
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{Classification, UnavailableClassifier};
    use crate::error::ClassifierError;
    use crate::store::InMemoryStateStore;
    use crate::types::{BasicCategory, Category};
    use async_trait::async_trait;

    #[derive(Debug)]
    struct Fixed(Option<Category>);

    #[async_trait]
    impl DrawingClassifier for Fixed {
        async fn classify(
            &self,
            _image_data: &str,
            _stage: PuzzleStage,
        ) -> std::result::Result<Classification, ClassifierError> {
            Ok(Classification {
                category: self.0,
                narrative: "What a lovely drawing!".to_string(),
            })
        }
    }

    async fn service(classifier: Arc<dyn DrawingClassifier>) -> (RoomService, String) {
        let service = RoomService::new(
            RoomConfig::new().with_admin_secret("admin"),
            Arc::new(InMemoryStateStore::new()),
            classifier,
        );
        service.initialize().await.unwrap();
        let token = service.create_session().await.unwrap();
        (service, format!("Bearer {token}"))
    }

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let (service, _) = service(Arc::new(UnavailableClassifier)).await;
        let before = service.admin_fetch(Some("Bearer admin")).await.unwrap();
        let again = service.initialize().await.unwrap();
        assert_eq!(before, again);
    }

    #[tokio::test]
    async fn operations_before_initialize_fail() {
        let service = RoomService::new(
            RoomConfig::new(),
            Arc::new(InMemoryStateStore::new()),
            Arc::new(UnavailableClassifier),
        );
        assert!(matches!(
            service.create_session().await,
            Err(HourglassError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn fetch_returns_view() {
        let (service, auth) = service(Arc::new(UnavailableClassifier)).await;
        let view = service.fetch(Some(&auth)).await.unwrap();
        assert_eq!(view.puzzle_1b.count, 0);
        assert!(view.puzzle_1b.pins.is_empty());
        assert!(!view.complete);
    }

    #[tokio::test]
    async fn unlock_matches_case_insensitively() {
        let (service, auth) = service(Arc::new(UnavailableClassifier)).await;
        assert!(!service.attempt_unlock(Some(&auth), "closed").await.unwrap());
        assert!(service.attempt_unlock(Some(&auth), "  open ").await.unwrap());
        let version = service.admin_fetch(Some("Bearer admin")).await.unwrap().version;
        assert!(service.attempt_unlock(Some(&auth), "OPEN").await.unwrap());
        let after = service.admin_fetch(Some("Bearer admin")).await.unwrap();
        assert!(after.complete);
        assert_eq!(after.version, version);
    }

    #[tokio::test]
    async fn unchanged_outcome_does_not_write() {
        let (service, auth) = service(Arc::new(Fixed(None))).await;
        let before = service.admin_fetch(Some("Bearer admin")).await.unwrap();
        let response = service
            .submit_drawing(Some(&auth), "data:image/png;base64,AAAA")
            .await
            .unwrap();
        assert_eq!(response, "What a lovely drawing!");
        let after = service.admin_fetch(Some("Bearer admin")).await.unwrap();
        assert_eq!(before.version, after.version);
    }

    #[tokio::test]
    async fn found_category_commits() {
        let love = Some(Category::Basic(BasicCategory::Love));
        let (service, auth) = service(Arc::new(Fixed(love))).await;
        let response = service
            .submit_drawing(Some(&auth), "data:image/png;base64,AAAA")
            .await
            .unwrap();
        assert!(response.contains("4 more"));
        let view = service.fetch(Some(&auth)).await.unwrap();
        assert_eq!(view.puzzle_1b.count, 1);
    }

    #[tokio::test]
    async fn classifier_failure_surfaces() {
        let (service, auth) = service(Arc::new(UnavailableClassifier)).await;
        let result = service.submit_drawing(Some(&auth), "data:image/png;base64,AAAA").await;
        assert!(matches!(result, Err(HourglassError::Classifier(_))));
    }

    #[tokio::test]
    async fn empty_admin_update_does_not_write() {
        let (service, _) = service(Arc::new(UnavailableClassifier)).await;
        let before = service.admin_fetch(Some("Bearer admin")).await.unwrap();
        let after = service
            .admin_update(Some("Bearer admin"), AdminUpdate::new())
            .await
            .unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn fetch_sees_token_issued_just_before() {
        let (service, old) = service(Arc::new(UnavailableClassifier)).await;
        let new = format!("Bearer {}", service.create_session().await.unwrap());
        assert!(service.fetch(Some(&new)).await.is_ok());
        assert!(matches!(
            service.fetch(Some(&old)).await,
            Err(HourglassError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn set_time_moves_deadline_only() {
        let (service, _) = service(Arc::new(UnavailableClassifier)).await;
        let before = service.admin_fetch(Some("Bearer admin")).await.unwrap();
        let lower = Utc::now() + chrono::Duration::minutes(15);
        let after = service
            .admin_set_time(Some("Bearer admin"), 15)
            .await
            .unwrap();
        assert!(after.target_time >= lower);
        assert!(after.target_time <= Utc::now() + chrono::Duration::minutes(15));
        assert_eq!(after.version, before.version + 1);
        assert_eq!(after.hints, before.hints);
        assert!(service.admin_set_time(None, 15).await.is_err());
    }

    #[tokio::test]
    async fn blank_hint_writes_nothing() {
        let (service, _) = service(Arc::new(UnavailableClassifier)).await;
        let before = service.admin_fetch(Some("Bearer admin")).await.unwrap();
        assert!(matches!(
            service.admin_append_hint(Some("Bearer admin"), " ").await,
            Err(HourglassError::Validation(_))
        ));
        let after = service.admin_fetch(Some("Bearer admin")).await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn reset_works_on_missing_record() {
        let service = RoomService::new(
            RoomConfig::new().with_admin_secret("admin"),
            Arc::new(InMemoryStateStore::new()),
            Arc::new(UnavailableClassifier),
        );
        let state = service.admin_reset(Some("Bearer admin")).await.unwrap();
        assert_eq!(state.version, 1);
        assert!(service.admin_reset(Some("Bearer wrong")).await.is_err());
    }
}
