//! Axum-based HTTP gateway for the chat run endpoints.
//!
//! - Request body size limits (64KB max)
//! - Request timeouts (30s) on everything up to the response head
//! - SSE run stream with proxy buffering disabled

mod handlers;
mod server;

pub use server::{build_app, build_chat_service, run_gateway, run_gateway_with_listener};

use crate::chat::ChatService;
use serde::Deserialize;
use serde_json::Value;

/// Maximum request body size (64KB) -- prevents memory exhaustion
pub const MAX_BODY_SIZE: usize = 65_536;
/// Request timeout (30s) -- prevents slow-loris attacks
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub chat: ChatService,
}

/// `POST /apps/{app}/threads/{thread}/messages` body
#[derive(Debug, Deserialize)]
pub struct PostMessageBody {
    pub content: String,
    #[serde(default)]
    pub content_json: Value,
}

/// `POST /apps/{app}/webhook/test` body
#[derive(Debug, Deserialize)]
pub struct WebhookTestBody {
    pub webhook_url: String,
    #[serde(default)]
    pub sample_message: Option<String>,
}
