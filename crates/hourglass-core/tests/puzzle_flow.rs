//! End-to-end puzzle progression through the service surface.
//!
//! Guarantees exercised here:
//! - Five distinct basic drawings finish stage 0 and reveal the first PIN.
//! - Repeated drawings never double count.
//! - Only the special drawing finishes stage 1, and it blanks the response.
//! - Reset starts over with a new token and a version that keeps climbing.

use hourglass_core::puzzle::{PIN_ALREADY_GIVEN_TEXT, STAGE_ONE_COMPLETE_TEXT};
use hourglass_core::{BasicCategory, Category, HourglassError, PuzzleStage, StateStore};
use hourglass_test_utils::{
    admin_auth, basic, bearer, setup_test_service, FailingArchive, RecordingArchive,
    ScriptedClassifier, SAMPLE_DRAWING, STAGE_ONE_PIN, STAGE_TWO_PIN,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

const STAGE_ONE_ORDER: [BasicCategory; 5] = [
    BasicCategory::Car,
    BasicCategory::House,
    BasicCategory::Love,
    BasicCategory::Money,
    BasicCategory::Family,
];

/// Scenario: CAR, HOUSE, LOVE, MONEY, FAMILY in order.
#[tokio::test]
async fn five_basic_drawings_complete_stage_one() {
    let classifier = Arc::new(ScriptedClassifier::with_categories(
        STAGE_ONE_ORDER.into_iter().map(basic),
    ));
    let (service, _) = setup_test_service(classifier).await;
    let auth = bearer(service.create_session().await.unwrap());

    let response = service.submit_drawing(Some(&auth), SAMPLE_DRAWING).await.unwrap();
    assert!(response.contains("4 more"), "unexpected response: {response}");
    assert_eq!(service.fetch(Some(&auth)).await.unwrap().puzzle_1b.count, 1);

    for _ in 0..3 {
        service.submit_drawing(Some(&auth), SAMPLE_DRAWING).await.unwrap();
    }
    let view = service.fetch(Some(&auth)).await.unwrap();
    assert_eq!(view.puzzle_1b.count, 4);
    assert!(view.puzzle_1b.pins.is_empty());

    let response = service.submit_drawing(Some(&auth), SAMPLE_DRAWING).await.unwrap();
    assert!(response.contains(STAGE_ONE_COMPLETE_TEXT));

    let state = service.admin_fetch(Some(&admin_auth())).await.unwrap();
    assert_eq!(state.puzzle_1b.completed_stage, PuzzleStage::AwaitingSpecial);
    assert_eq!(state.puzzle_1b.stage1_count, 5);
    assert_eq!(state.puzzle_1b.pins, vec![STAGE_ONE_PIN.to_string()]);
    assert!(state.puzzle_1b.is_consistent());
}

#[tokio::test]
async fn repeated_drawing_is_not_double_counted() {
    let classifier = Arc::new(ScriptedClassifier::with_categories([
        basic(BasicCategory::Money),
        basic(BasicCategory::Money),
    ]));
    let (service, _) = setup_test_service(classifier).await;
    let auth = bearer(service.create_session().await.unwrap());

    service.submit_drawing(Some(&auth), SAMPLE_DRAWING).await.unwrap();
    let before = service.admin_fetch(Some(&admin_auth())).await.unwrap();

    let response = service.submit_drawing(Some(&auth), SAMPLE_DRAWING).await.unwrap();
    assert!(response.contains("drawn MONEY before"));

    let after = service.admin_fetch(Some(&admin_auth())).await.unwrap();
    assert_eq!(after.puzzle_1b, before.puzzle_1b);
    assert_eq!(after.version, before.version);
}

#[tokio::test]
async fn special_drawing_completes_stage_two() {
    let mut script: Vec<Option<Category>> = STAGE_ONE_ORDER.into_iter().map(basic).collect();
    script.push(basic(BasicCategory::Car));
    script.push(Some(Category::Jesus));
    script.push(Some(Category::Jesus));
    let classifier = Arc::new(ScriptedClassifier::with_categories(script));
    let (service, _) = setup_test_service(classifier.clone()).await;
    let auth = bearer(service.create_session().await.unwrap());

    for _ in 0..5 {
        service.submit_drawing(Some(&auth), SAMPLE_DRAWING).await.unwrap();
    }

    let response = service.submit_drawing(Some(&auth), SAMPLE_DRAWING).await.unwrap();
    assert!(response.ends_with(PIN_ALREADY_GIVEN_TEXT));

    let response = service.submit_drawing(Some(&auth), SAMPLE_DRAWING).await.unwrap();
    assert_eq!(response, "");

    let state = service.admin_fetch(Some(&admin_auth())).await.unwrap();
    assert_eq!(state.puzzle_1b.completed_stage, PuzzleStage::Solved);
    assert_eq!(
        state.puzzle_1b.pins,
        vec![STAGE_ONE_PIN.to_string(), STAGE_TWO_PIN.to_string()]
    );

    // Solved puzzles still get narrative but never change again
    let response = service.submit_drawing(Some(&auth), SAMPLE_DRAWING).await.unwrap();
    assert!(!response.is_empty());
    let after = service.admin_fetch(Some(&admin_auth())).await.unwrap();
    assert_eq!(after.version, state.version);

    let stages = classifier.seen_stages();
    assert_eq!(&stages[..5], &[PuzzleStage::Classifying; 5]);
    assert_eq!(&stages[5..], &[PuzzleStage::AwaitingSpecial; 3]);
}

#[tokio::test]
async fn special_drawing_is_ignored_during_stage_one() {
    let classifier = Arc::new(ScriptedClassifier::with_categories([Some(Category::Jesus)]));
    let (service, _) = setup_test_service(classifier).await;
    let auth = bearer(service.create_session().await.unwrap());

    let response = service.submit_drawing(Some(&auth), SAMPLE_DRAWING).await.unwrap();
    assert!(!response.is_empty());
    let state = service.admin_fetch(Some(&admin_auth())).await.unwrap();
    assert_eq!(state.puzzle_1b.completed_stage, PuzzleStage::Classifying);
    assert_eq!(state.puzzle_1b.stage1_count, 0);
}

/// Scenario: solve both stages, then reset.
#[tokio::test]
async fn reset_starts_over() {
    let mut script: Vec<Option<Category>> = STAGE_ONE_ORDER.into_iter().map(basic).collect();
    script.push(Some(Category::Jesus));
    let classifier = Arc::new(ScriptedClassifier::with_categories(script));
    let (service, store) = setup_test_service(classifier).await;
    let token = service.create_session().await.unwrap();
    let auth = bearer(&token);

    for _ in 0..6 {
        service.submit_drawing(Some(&auth), SAMPLE_DRAWING).await.unwrap();
    }
    assert!(service.attempt_unlock(Some(&auth), "open sesame").await.unwrap());
    let solved = service.admin_fetch(Some(&admin_auth())).await.unwrap();
    assert_eq!(solved.puzzle_1b.pins.len(), 2);
    assert!(solved.complete);

    let reset = service.admin_reset(Some(&admin_auth())).await.unwrap();
    assert_eq!(reset.puzzle_1b.completed_stage, PuzzleStage::Classifying);
    assert!(reset.puzzle_1b.pins.is_empty());
    assert_eq!(reset.puzzle_1b.stage1_count, 0);
    assert!(!reset.complete);
    assert_ne!(reset.active_token, token);
    assert_eq!(reset.version, solved.version + 1);

    // The pre-reset session is gone
    assert!(matches!(
        service.fetch(Some(&auth)).await,
        Err(HourglassError::Forbidden(_))
    ));
    assert_eq!(store.load(hourglass_core::Consistency::Strong).await.unwrap(), reset);
}

#[tokio::test]
async fn archive_receives_drawing_and_response() {
    let classifier = Arc::new(ScriptedClassifier::with_categories([basic(BasicCategory::House)]));
    let (service, _) = setup_test_service(classifier).await;
    let archive = Arc::new(RecordingArchive::new());
    let service = service.with_archive(archive.clone());
    let auth = bearer(service.create_session().await.unwrap());

    let response = service.submit_drawing(Some(&auth), SAMPLE_DRAWING).await.unwrap();
    assert_eq!(
        archive.entries(),
        vec![(SAMPLE_DRAWING.to_string(), response)]
    );
}

#[tokio::test]
async fn archive_failure_does_not_affect_outcome() {
    let classifier = Arc::new(ScriptedClassifier::with_categories([basic(BasicCategory::Family)]));
    let (service, _) = setup_test_service(classifier).await;
    let service = service.with_archive(Arc::new(FailingArchive));
    let auth = bearer(service.create_session().await.unwrap());

    let response = service.submit_drawing(Some(&auth), SAMPLE_DRAWING).await.unwrap();
    assert!(response.contains("FAMILY"));
    assert_eq!(service.fetch(Some(&auth)).await.unwrap().puzzle_1b.count, 1);
}
