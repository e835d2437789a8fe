use super::{AppState, PostMessageBody, WebhookTestBody};
use crate::error::{ChatError, StoreError};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use futures_util::StreamExt;
use std::convert::Infallible;

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

fn chat_error_response(error: &ChatError) -> Response {
    match error {
        ChatError::Store(StoreError::NotFound { .. }) => {
            error_response(StatusCode::NOT_FOUND, &error.to_string())
        }
        ChatError::NoUserMessages(_) => error_response(StatusCode::BAD_REQUEST, &error.to_string()),
        ChatError::Store(_) => {
            tracing::error!(error = %error, "chat request failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

/// GET /health, always public
pub async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// POST /apps/{app_id}/threads/{thread_id}/messages
pub async fn handle_post_message(
    State(state): State<AppState>,
    Path((app_id, thread_id)): Path<(String, String)>,
    Json(body): Json<PostMessageBody>,
) -> Response {
    match state
        .chat
        .post_user_message(&app_id, &thread_id, &body.content, body.content_json)
        .await
    {
        Ok(message) => (StatusCode::CREATED, Json(message)).into_response(),
        Err(e) => chat_error_response(&e),
    }
}

/// POST /apps/{app_id}/threads/{thread_id}/run
pub async fn handle_run(
    State(state): State<AppState>,
    Path((app_id, thread_id)): Path<(String, String)>,
) -> Response {
    match state.chat.run(&app_id, &thread_id).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => chat_error_response(&e),
    }
}

/// GET /apps/{app_id}/threads/{thread_id}/run/stream
pub async fn handle_run_stream(
    State(state): State<AppState>,
    Path((app_id, thread_id)): Path<(String, String)>,
) -> Response {
    let stream = match state.chat.run_stream(&app_id, &thread_id).await {
        Ok(stream) => stream,
        Err(e) => return chat_error_response(&e),
    };

    let mut response = Response::new(Body::from_stream(stream.map(Ok::<_, Infallible>)));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    response
}

/// POST /apps/{app_id}/webhook/test
pub async fn handle_webhook_test(
    State(state): State<AppState>,
    Path(app_id): Path<String>,
    Json(body): Json<WebhookTestBody>,
) -> Response {
    match state
        .chat
        .probe_webhook(&app_id, &body.webhook_url, body.sample_message.as_deref())
        .await
    {
        Ok(report) => Json(report).into_response(),
        Err(e) => chat_error_response(&e),
    }
}
