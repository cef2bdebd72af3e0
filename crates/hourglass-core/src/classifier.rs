//! Drawing classifier seam
//!
//! Classification is delegated wholesale to an external model. The core
//! only consumes its answer: at most one category plus free narrative text.

use crate::error::ClassifierError;
use crate::types::{Category, PuzzleStage};
use async_trait::async_trait;
use std::fmt::Debug;

/// A classifier's answer for one drawing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Identified category; `None` for no match, ambiguous or excluded drawings
    pub category: Option<Category>,
    /// Text to show the player regardless of category
    pub narrative: String,
}

impl Classification {
    /// Drawing matched `category`
    #[must_use]
    pub fn matched(category: Category, narrative: impl Into<String>) -> Self {
        Self {
            category: Some(category),
            narrative: narrative.into(),
        }
    }

    /// Drawing matched nothing
    #[must_use]
    pub fn unmatched(narrative: impl Into<String>) -> Self {
        Self {
            category: None,
            narrative: narrative.into(),
        }
    }

    /// Drop a category that is not in the vocabulary of `stage`
    #[must_use]
    pub fn restricted_to(mut self, stage: PuzzleStage) -> Self {
        if self.category.is_some_and(|c| !c.allowed_at(stage)) {
            tracing::debug!(
                category = ?self.category,
                %stage,
                "dropping out-of-vocabulary category"
            );
            self.category = None;
        }
        self
    }
}

/// External drawing classifier
///
/// Implementations select the vocabulary from `stage` (5 categories at
/// stage 0, 6 with the special category afterwards) and must demand
/// stricter evidence for the special category.
#[async_trait]
pub trait DrawingClassifier: Send + Sync + Debug {
    /// Classify one drawing given as a `data:image/...;base64,` URL
    async fn classify(
        &self,
        image_data: &str,
        stage: PuzzleStage,
    ) -> Result<Classification, ClassifierError>;
}

/// Classifier used when no model is configured; always fails
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableClassifier;

#[async_trait]
impl DrawingClassifier for UnavailableClassifier {
    async fn classify(
        &self,
        _image_data: &str,
        _stage: PuzzleStage,
    ) -> Result<Classification, ClassifierError> {
        Err(ClassifierError::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BasicCategory;

    #[test]
    fn restriction_drops_special_at_stage_zero() {
        let c = Classification::matched(Category::Jesus, "a cross")
            .restricted_to(PuzzleStage::Classifying);
        assert_eq!(c.category, None);
        assert_eq!(c.narrative, "a cross");
    }

    #[test]
    fn restriction_keeps_vocabulary_members() {
        let car = Category::Basic(BasicCategory::Car);
        let c = Classification::matched(car, "vroom").restricted_to(PuzzleStage::Classifying);
        assert_eq!(c.category, Some(car));
        let c = Classification::matched(Category::Jesus, "")
            .restricted_to(PuzzleStage::AwaitingSpecial);
        assert_eq!(c.category, Some(Category::Jesus));
    }

    #[tokio::test]
    async fn unavailable_classifier_fails() {
        let result = UnavailableClassifier
            .classify("data:image/png;base64,AAAA", PuzzleStage::Classifying)
            .await;
        assert!(matches!(result, Err(ClassifierError::Unavailable)));
    }
}
