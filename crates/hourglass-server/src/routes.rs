//! HTTP routes
//!
//! Thin warp filters over [`RoomService`]. Handlers never reject: every
//! service error is mapped to a status code and a `{"detail": ...}` body.
//! `enter`, `unlock` and the admin edits are retried on version conflict;
//! drawing submissions are not, because their outcome depends on the stage
//! the classifier was shown.

use hourglass_core::{AdminUpdate, ClassifierError, HourglassError, RoomService};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

/// Request body limit (drawings arrive as base64 data URLs)
pub const BODY_LIMIT: u64 = 10 * 1024 * 1024;

/// Shared handler state
#[derive(Debug, Clone)]
pub struct AppState {
    service: Arc<RoomService>,
    conflict_attempts: u32,
}

impl AppState {
    /// Create handler state; `conflict_attempts` bounds retries after a
    /// version conflict (0 behaves as 1)
    #[must_use]
    pub fn new(service: Arc<RoomService>, conflict_attempts: u32) -> Self {
        Self {
            service,
            conflict_attempts,
        }
    }
}

/// `POST /unlock` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnlockRequest {
    pub passphrase: String,
}

/// `POST /chatbot` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatbotRequest {
    pub image_data: String,
}

/// `POST /admin/set_time` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetTimeRequest {
    pub minutes_from_now: i64,
}

/// `POST /admin/send_hint` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HintRequest {
    pub hint: String,
}

/// All routes, with CORS, request tracing and rejection handling
///
/// Only CORS preflight failures can still reject.
pub fn api(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let health = warp::path!("health")
        .and(warp::get())
        .map(|| warp::reply::json(&json!({ "status": "ok" })));

    let enter = warp::path!("enter")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and_then(handlers::enter);

    let data = warp::path!("data")
        .and(warp::get())
        .and(authorization())
        .and(with_state(state.clone()))
        .and_then(handlers::fetch);

    let unlock = warp::path!("unlock")
        .and(warp::post())
        .and(authorization())
        .and(json_body::<UnlockRequest>())
        .and(with_state(state.clone()))
        .and_then(handlers::unlock);

    let chatbot = warp::path!("chatbot")
        .and(warp::post())
        .and(authorization())
        .and(json_body::<ChatbotRequest>())
        .and(with_state(state.clone()))
        .and_then(handlers::chatbot);

    let admin_get = warp::path!("admin")
        .and(warp::get())
        .and(authorization())
        .and(with_state(state.clone()))
        .and_then(handlers::admin_fetch);

    let admin_post = warp::path!("admin")
        .and(warp::post())
        .and(authorization())
        .and(json_body::<AdminUpdate>())
        .and(with_state(state.clone()))
        .and_then(handlers::admin_update);

    let set_time = warp::path!("admin" / "set_time")
        .and(warp::post())
        .and(authorization())
        .and(json_body::<SetTimeRequest>())
        .and(with_state(state.clone()))
        .and_then(handlers::set_time);

    let send_hint = warp::path!("admin" / "send_hint")
        .and(warp::post())
        .and(authorization())
        .and(json_body::<HintRequest>())
        .and(with_state(state.clone()))
        .and_then(handlers::send_hint);

    let reset = warp::path!("reset")
        .or(warp::path!("admin" / "reset"))
        .unify()
        .and(warp::post())
        .and(authorization())
        .and(with_state(state))
        .and_then(handlers::reset);

    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST", "OPTIONS"])
        .allow_headers(vec!["authorization", "content-type"]);

    health
        .or(enter)
        .or(data)
        .or(unlock)
        .or(chatbot)
        .or(admin_get)
        .or(admin_post)
        .or(set_time)
        .or(send_hint)
        .or(reset)
        .recover(handle_rejection)
        .with(cors)
        .with(warp::trace::request())
}

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn authorization() -> impl Filter<Extract = (Option<String>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
}

fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: serde::de::DeserializeOwned + Send,
{
    warp::body::content_length_limit(BODY_LIMIT).and(warp::body::json())
}

/// Status code for a service error
#[must_use]
pub fn status_for(error: &HourglassError) -> StatusCode {
    match error {
        HourglassError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
        HourglassError::Forbidden(_) => StatusCode::FORBIDDEN,
        HourglassError::Validation(_)
        | HourglassError::Classifier(ClassifierError::InvalidImage(_)) => StatusCode::BAD_REQUEST,
        HourglassError::VersionConflict { .. } => StatusCode::CONFLICT,
        HourglassError::Classifier(_) => StatusCode::BAD_GATEWAY,
        HourglassError::NotInitialized | HourglassError::Store(_) | HourglassError::Config(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn detail(status: StatusCode, message: impl Into<String>) -> Response {
    warp::reply::with_status(
        warp::reply::json(&json!({ "detail": message.into() })),
        status,
    )
    .into_response()
}

fn error_response(error: &HourglassError) -> Response {
    let status = status_for(error);
    if status.is_server_error() || status == StatusCode::BAD_GATEWAY {
        tracing::error!(%error, %status, "request failed");
    } else {
        tracing::debug!(%error, %status, "request rejected");
    }
    detail(status, error.to_string())
}

fn ok_json<T: Serialize>(value: &T) -> Response {
    warp::reply::json(value).into_response()
}

async fn handle_rejection(rejection: Rejection) -> Result<Response, Infallible> {
    let response = if rejection.is_not_found() {
        detail(StatusCode::NOT_FOUND, "Not Found")
    } else if let Some(error) = rejection.find::<warp::filters::body::BodyDeserializeError>() {
        detail(StatusCode::BAD_REQUEST, error.to_string())
    } else if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
        detail(StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large")
    } else if rejection.find::<warp::reject::LengthRequired>().is_some() {
        detail(StatusCode::LENGTH_REQUIRED, "Length Required")
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        detail(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
    } else if let Some(error) = rejection.find::<warp::reject::InvalidHeader>() {
        detail(StatusCode::BAD_REQUEST, error.to_string())
    } else {
        tracing::error!(?rejection, "unhandled rejection");
        detail(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
    };
    Ok(response)
}

mod handlers {
    use super::{
        detail, error_response, ok_json, AppState, ChatbotRequest, HintRequest, SetTimeRequest,
        UnlockRequest,
    };
    use hourglass_core::{retry_on_conflict, AdminUpdate};
    use serde_json::json;
    use std::convert::Infallible;
    use warp::http::StatusCode;
    use warp::reply::Response;

    pub(super) async fn enter(state: AppState) -> Result<Response, Infallible> {
        let service = &state.service;
        Ok(
            match retry_on_conflict(state.conflict_attempts, || service.create_session()).await {
                Ok(token) => ok_json(&json!({ "portalToken": token })),
                Err(error) => error_response(&error),
            },
        )
    }

    pub(super) async fn fetch(
        authorization: Option<String>,
        state: AppState,
    ) -> Result<Response, Infallible> {
        Ok(match state.service.fetch(authorization.as_deref()).await {
            Ok(view) => ok_json(&view),
            Err(error) => error_response(&error),
        })
    }

    pub(super) async fn unlock(
        authorization: Option<String>,
        body: UnlockRequest,
        state: AppState,
    ) -> Result<Response, Infallible> {
        let service = &state.service;
        let outcome = retry_on_conflict(state.conflict_attempts, || {
            service.attempt_unlock(authorization.as_deref(), &body.passphrase)
        })
        .await;
        Ok(match outcome {
            Ok(true) => ok_json(&json!({ "unlocked": true })),
            Ok(false) => detail(StatusCode::FORBIDDEN, "Wrong passphrase"),
            Err(error) => error_response(&error),
        })
    }

    pub(super) async fn chatbot(
        authorization: Option<String>,
        body: ChatbotRequest,
        state: AppState,
    ) -> Result<Response, Infallible> {
        Ok(
            match state
                .service
                .submit_drawing(authorization.as_deref(), &body.image_data)
                .await
            {
                Ok(response) => ok_json(&json!({ "response": response })),
                Err(error) => error_response(&error),
            },
        )
    }

    pub(super) async fn admin_fetch(
        authorization: Option<String>,
        state: AppState,
    ) -> Result<Response, Infallible> {
        Ok(match state.service.admin_fetch(authorization.as_deref()).await {
            Ok(game) => ok_json(&game),
            Err(error) => error_response(&error),
        })
    }

    pub(super) async fn admin_update(
        authorization: Option<String>,
        update: AdminUpdate,
        state: AppState,
    ) -> Result<Response, Infallible> {
        let service = &state.service;
        let outcome = retry_on_conflict(state.conflict_attempts, || {
            service.admin_update(authorization.as_deref(), update.clone())
        })
        .await;
        Ok(match outcome {
            Ok(game) => ok_json(&game),
            Err(error) => error_response(&error),
        })
    }

    pub(super) async fn set_time(
        authorization: Option<String>,
        body: SetTimeRequest,
        state: AppState,
    ) -> Result<Response, Infallible> {
        let service = &state.service;
        let outcome = retry_on_conflict(state.conflict_attempts, || {
            service.admin_set_time(authorization.as_deref(), body.minutes_from_now)
        })
        .await;
        Ok(match outcome {
            Ok(game) => ok_json(&json!({ "ok": true, "target": game.target_time })),
            Err(error) => error_response(&error),
        })
    }

    pub(super) async fn send_hint(
        authorization: Option<String>,
        body: HintRequest,
        state: AppState,
    ) -> Result<Response, Infallible> {
        let service = &state.service;
        let outcome = retry_on_conflict(state.conflict_attempts, || {
            service.admin_append_hint(authorization.as_deref(), &body.hint)
        })
        .await;
        Ok(match outcome {
            Ok(game) => ok_json(&json!({ "ok": true, "hints": game.hints })),
            Err(error) => error_response(&error),
        })
    }

    pub(super) async fn reset(
        authorization: Option<String>,
        state: AppState,
    ) -> Result<Response, Infallible> {
        Ok(match state.service.admin_reset(authorization.as_deref()).await {
            Ok(game) => ok_json(&game),
            Err(error) => error_response(&error),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hourglass_core::StoreError;

    #[test]
    fn error_statuses() {
        assert_eq!(
            status_for(&HourglassError::Unauthenticated("x".into())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_for(&HourglassError::Forbidden("x".into())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_for(&HourglassError::Validation("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&HourglassError::VersionConflict { expected: 1 }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&ClassifierError::InvalidImage("x".into()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&ClassifierError::Unavailable.into()),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&StoreError::Backend("down".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(&HourglassError::NotInitialized),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
