use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::bridge::ChatCompletionClient;
use super::error::AssessmentError;
use super::repository::{RepositoryError, SessionId, SessionRepository};
use super::service::{AssessmentService, AssessmentServiceError};

/// Router builder exposing the chat session and form scoring endpoints.
pub fn assessment_router<R, C>(service: Arc<AssessmentService<R, C>>) -> Router
where
    R: SessionRepository + 'static,
    C: ChatCompletionClient + ?Sized + 'static,
{
    Router::new()
        .route(
            "/api/v1/assessments/sessions",
            post(start_handler::<R, C>),
        )
        .route(
            "/api/v1/assessments/sessions/:session_id",
            get(session_handler::<R, C>).delete(end_handler::<R, C>),
        )
        .route(
            "/api/v1/assessments/sessions/:session_id/messages",
            post(message_handler::<R, C>),
        )
        .route(
            "/api/v1/assessments/sessions/:session_id/reset",
            post(reset_handler::<R, C>),
        )
        .route("/api/v1/assessments/score", post(score_handler::<R, C>))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessageRequest {
    pub message: String,
}

pub(crate) async fn start_handler<R, C>(
    State(service): State<Arc<AssessmentService<R, C>>>,
) -> Response
where
    R: SessionRepository + 'static,
    C: ChatCompletionClient + ?Sized + 'static,
{
    match service.start_session().await {
        Ok(view) => (StatusCode::CREATED, Json(view)).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn session_handler<R, C>(
    State(service): State<Arc<AssessmentService<R, C>>>,
    Path(session_id): Path<String>,
) -> Response
where
    R: SessionRepository + 'static,
    C: ChatCompletionClient + ?Sized + 'static,
{
    match service.get(&SessionId(session_id)).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn message_handler<R, C>(
    State(service): State<Arc<AssessmentService<R, C>>>,
    Path(session_id): Path<String>,
    Json(request): Json<MessageRequest>,
) -> Response
where
    R: SessionRepository + 'static,
    C: ChatCompletionClient + ?Sized + 'static,
{
    match service
        .send_message(&SessionId(session_id), &request.message)
        .await
    {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn reset_handler<R, C>(
    State(service): State<Arc<AssessmentService<R, C>>>,
    Path(session_id): Path<String>,
) -> Response
where
    R: SessionRepository + 'static,
    C: ChatCompletionClient + ?Sized + 'static,
{
    match service.reset(&SessionId(session_id)).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn end_handler<R, C>(
    State(service): State<Arc<AssessmentService<R, C>>>,
    Path(session_id): Path<String>,
) -> Response
where
    R: SessionRepository + 'static,
    C: ChatCompletionClient + ?Sized + 'static,
{
    match service.end_session(&SessionId(session_id)).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn score_handler<R, C>(
    State(service): State<Arc<AssessmentService<R, C>>>,
    Json(raw): Json<Map<String, Value>>,
) -> Response
where
    R: SessionRepository + 'static,
    C: ChatCompletionClient + ?Sized + 'static,
{
    match service.score(&raw) {
        Ok(decision) => (StatusCode::OK, Json(decision)).into_response(),
        Err(error) => assessment_error_response(&error),
    }
}

fn service_error_response(error: AssessmentServiceError) -> Response {
    match error {
        AssessmentServiceError::Assessment(error) => assessment_error_response(&error),
        AssessmentServiceError::Repository(RepositoryError::NotFound) => {
            let payload = json!({
                "error": "session not found",
            });
            (StatusCode::NOT_FOUND, Json(payload)).into_response()
        }
        AssessmentServiceError::EmptyMessage => {
            let payload = json!({
                "error": AssessmentServiceError::EmptyMessage.to_string(),
            });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
        }
        AssessmentServiceError::Repository(RepositoryError::Conflict) => {
            let payload = json!({
                "error": "session already exists",
            });
            (StatusCode::CONFLICT, Json(payload)).into_response()
        }
        other => {
            let payload = json!({
                "error": other.to_string(),
            });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

fn assessment_error_response(error: &AssessmentError) -> Response {
    let status = match error {
        AssessmentError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AssessmentError::ModelUnavailable { .. } | AssessmentError::ServiceUnavailable { .. } => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        AssessmentError::Prediction(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let view = error.view();
    let mut payload = json!({
        "error": view.message,
        "kind": view.kind,
        "retryable": view.retryable,
    });
    if let AssessmentError::Validation(errors) = error {
        payload["field_errors"] = json!(errors);
    }
    (status, Json(payload)).into_response()
}
