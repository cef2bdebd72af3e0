//! Testing utilities for the Hourglass Realm workspace
//!
//! Shared fixtures: scripted classifiers, inspectable archives and
//! ready-to-use services over the in-memory store.

#![allow(missing_docs)]

use async_trait::async_trait;
use hourglass_core::{
    ArchiveError, BasicCategory, Category, Classification, ClassifierError, DrawingArchive,
    DrawingClassifier, InMemoryStateStore, PuzzleStage, RoomConfig, RoomService, StagePins,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

pub const ADMIN_SECRET: &str = "test-admin";
pub const PASSPHRASE: &str = "OPEN SESAME";
pub const STAGE_ONE_PIN: &str = "4821";
pub const STAGE_TWO_PIN: &str = "9073";

/// Any payload the archive can decode (1x1 PNG)
pub const SAMPLE_DRAWING: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

pub fn admin_auth() -> String {
    format!("Bearer {ADMIN_SECRET}")
}

pub fn bearer(token: impl std::fmt::Display) -> String {
    format!("Bearer {token}")
}

pub fn basic(category: BasicCategory) -> Option<Category> {
    Some(Category::Basic(category))
}

pub fn test_config() -> RoomConfig {
    RoomConfig::new()
        .with_admin_secret(ADMIN_SECRET)
        .with_passphrase(PASSPHRASE)
        .with_stage_pins(StagePins::new(STAGE_ONE_PIN, STAGE_TWO_PIN))
}

/// Classifier answering from a queue; an empty queue answers "no match"
#[derive(Debug, Default)]
pub struct ScriptedClassifier {
    script: Mutex<VecDeque<Result<Classification, ClassifierError>>>,
    stages: Mutex<Vec<PuzzleStage>>,
}

impl ScriptedClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one answer per category, each with a canned narrative
    pub fn with_categories(categories: impl IntoIterator<Item = Option<Category>>) -> Self {
        let classifier = Self::new();
        for category in categories {
            classifier.push(category);
        }
        classifier
    }

    pub fn push(&self, category: Option<Category>) {
        self.script.lock().push_back(Ok(Classification {
            category,
            narrative: "Blub! Let me look at that...".to_string(),
        }));
    }

    pub fn push_error(&self, error: ClassifierError) {
        self.script.lock().push_back(Err(error));
    }

    /// Stages the classifier has been asked about, in order
    pub fn seen_stages(&self) -> Vec<PuzzleStage> {
        self.stages.lock().clone()
    }
}

#[async_trait]
impl DrawingClassifier for ScriptedClassifier {
    async fn classify(
        &self,
        _image_data: &str,
        stage: PuzzleStage,
    ) -> Result<Classification, ClassifierError> {
        self.stages.lock().push(stage);
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(Classification::unmatched("Hmm, I can't tell what that is.")))
    }
}

/// Archive keeping every submission in memory
#[derive(Debug, Default)]
pub struct RecordingArchive {
    entries: Mutex<Vec<(String, String)>>,
}

impl RecordingArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(String, String)> {
        self.entries.lock().clone()
    }
}

#[async_trait]
impl DrawingArchive for RecordingArchive {
    async fn archive(&self, image_data: &str, response: &str) -> Result<(), ArchiveError> {
        self.entries
            .lock()
            .push((image_data.to_string(), response.to_string()));
        Ok(())
    }
}

/// Archive that always fails
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingArchive;

#[async_trait]
impl DrawingArchive for FailingArchive {
    async fn archive(&self, _image_data: &str, _response: &str) -> Result<(), ArchiveError> {
        Err(ArchiveError::Io(std::io::Error::other("disk full")))
    }
}

/// Service over a fresh in-memory store; the record is initialized
pub async fn setup_test_service(
    classifier: Arc<ScriptedClassifier>,
) -> (RoomService, Arc<InMemoryStateStore>) {
    let store = Arc::new(InMemoryStateStore::new());
    let service = RoomService::new(test_config(), store.clone(), classifier);
    service
        .initialize()
        .await
        .expect("in-memory initialization cannot fail");
    (service, store)
}
