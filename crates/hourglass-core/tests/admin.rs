//! Admin overrides through the service surface.

use hourglass_core::{AdminUpdate, HourglassError, StagePins};
use hourglass_test_utils::{admin_auth, bearer, setup_test_service, ScriptedClassifier};
use pretty_assertions::assert_eq;
use std::sync::Arc;

#[tokio::test]
async fn unparsable_target_time_is_rejected() {
    let (service, _) = setup_test_service(Arc::new(ScriptedClassifier::new())).await;
    let before = service.admin_fetch(Some(&admin_auth())).await.unwrap();

    let result = service
        .admin_update(
            Some(&admin_auth()),
            AdminUpdate::new()
                .with_target_time("not-a-date")
                .with_hints(vec!["should not land".into()]),
        )
        .await;
    assert!(matches!(result, Err(HourglassError::Validation(_))));

    let after = service.admin_fetch(Some(&admin_auth())).await.unwrap();
    assert_eq!(after.target_time, before.target_time);
    assert_eq!(after.hints, before.hints);
    assert_eq!(after.version, before.version);
}

#[tokio::test]
async fn update_applies_all_present_fields() {
    let (service, _) = setup_test_service(Arc::new(ScriptedClassifier::new())).await;
    let before = service.admin_fetch(Some(&admin_auth())).await.unwrap();

    let after = service
        .admin_update(
            Some(&admin_auth()),
            AdminUpdate::new()
                .with_target_time("2030-01-01T12:00:00Z")
                .with_hints(vec!["look under the clock".into(), "count the fish".into()])
                .with_passphrase("TIDEPOOL")
                .with_pins(vec!["1111".into(), "2222".into()]),
        )
        .await
        .unwrap();

    assert_eq!(after.version, before.version + 1);
    assert_eq!(after.target_time.to_rfc3339(), "2030-01-01T12:00:00+00:00");
    assert_eq!(after.hints.len(), 2);
    assert_eq!(after.master_codes.passphrase, "TIDEPOOL");
    assert_eq!(after.master_codes.puzzle_1b_pins, StagePins::new("1111", "2222"));
    assert_eq!(after.active_token, before.active_token);
    assert_eq!(after.puzzle_1b, before.puzzle_1b);
}

#[tokio::test]
async fn empty_hint_list_clears_hints() {
    let (service, _) = setup_test_service(Arc::new(ScriptedClassifier::new())).await;
    service
        .admin_update(Some(&admin_auth()), AdminUpdate::new().with_hints(vec!["x".into()]))
        .await
        .unwrap();
    let cleared = service
        .admin_update(Some(&admin_auth()), AdminUpdate::new().with_hints(Vec::new()))
        .await
        .unwrap();
    assert!(cleared.hints.is_empty());
}

#[tokio::test]
async fn new_passphrase_takes_effect_for_players() {
    let (service, _) = setup_test_service(Arc::new(ScriptedClassifier::new())).await;
    let auth = bearer(service.create_session().await.unwrap());
    service
        .admin_update(Some(&admin_auth()), AdminUpdate::new().with_passphrase("Anchor"))
        .await
        .unwrap();
    assert!(!service.attempt_unlock(Some(&auth), "open sesame").await.unwrap());
    assert!(service.attempt_unlock(Some(&auth), "ANCHOR").await.unwrap());
}

#[tokio::test]
async fn admin_operations_require_the_secret() {
    let (service, _) = setup_test_service(Arc::new(ScriptedClassifier::new())).await;
    let player = bearer(service.create_session().await.unwrap());

    assert!(matches!(
        service.admin_fetch(None).await,
        Err(HourglassError::Unauthenticated(_))
    ));
    assert!(matches!(
        service.admin_fetch(Some(&player)).await,
        Err(HourglassError::Forbidden(_))
    ));
    assert!(matches!(
        service.admin_update(Some("Bearer nope"), AdminUpdate::new()).await,
        Err(HourglassError::Forbidden(_))
    ));
    assert!(matches!(
        service.admin_reset(Some("Basic abc")).await,
        Err(HourglassError::Unauthenticated(_))
    ));
}
