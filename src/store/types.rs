use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tenant-owned app: where replies come from and how they are signed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct App {
    pub id: String,
    pub name: String,
    pub webhook_url: Option<String>,
    #[serde(skip_serializing, default)]
    pub webhook_secret: Option<String>,
    /// Nested integration document, e.g. `{"integration": {"mode": "webhook"}}`.
    pub config: Value,
    pub created_at: String,
}

impl App {
    /// Secret used for request signing; blank secrets count as absent.
    pub fn signing_secret(&self) -> Option<&str> {
        self.webhook_secret
            .as_deref()
            .filter(|secret| !secret.is_empty())
    }

    pub fn webhook_target(&self) -> Option<&str> {
        self.webhook_url.as_deref().filter(|url| !url.is_empty())
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewApp {
    pub name: String,
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<String>,
    pub config: Value,
}

/// One customer interaction. Owns the sequence counter for its messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub app_id: String,
    pub customer_id: Option<String>,
    /// Seq the next appended message will receive.
    pub next_seq: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub seq: i64,
    pub role: MessageRole,
    pub content: Option<String>,
    pub content_json: Value,
    pub created_at: String,
}
