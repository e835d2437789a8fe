//! The versioned envelope POSTed to partner webhooks.
//!
//! Field order in these structs is the order on the wire. The signature
//! covers the serialized bytes, so never reorder fields or sort keys.

use crate::store::{App, Conversation, Message, MessageRole};
use serde::Serialize;
use serde_json::{Map, Value};

pub const PAYLOAD_VERSION: &str = "1.0";
pub const EVENT_MESSAGE_RECEIVED: &str = "message_received";

pub const PROBE_THREAD_ID: &str = "00000000-0000-0000-0000-000000000000";
pub const PROBE_MESSAGE_ID: &str = "00000000-0000-0000-0000-000000000001";
pub const PROBE_CUSTOMER_ID: &str = "test-customer";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadRef {
    pub id: String,
    pub customer_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<MessageRole>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_json: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub role: MessageRole,
    pub content: String,
    pub content_json: Value,
}

impl From<&Message> for HistoryEntry {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone().unwrap_or_default(),
            content_json: object_or_empty(&message.content_json),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundPayload {
    pub version: &'static str,
    pub event: &'static str,
    pub app: AppRef,
    pub thread: ThreadRef,
    pub message: MessageBody,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_tail: Option<Vec<HistoryEntry>>,
    pub timestamp: String,
}

impl OutboundPayload {
    /// Full envelope when the message is persisted, minimal one otherwise.
    pub fn build(
        app: &App,
        conversation: &Conversation,
        user_message: &str,
        message: Option<&Message>,
        history: &[Message],
        history_limit: usize,
    ) -> Self {
        match message {
            Some(message) => Self::for_message(app, conversation, message, history, history_limit),
            None => Self::minimal(app, conversation, user_message),
        }
    }

    /// Canonical envelope. `history` is oldest first; only its last
    /// `history_limit` entries are forwarded.
    pub fn for_message(
        app: &App,
        conversation: &Conversation,
        message: &Message,
        history: &[Message],
        history_limit: usize,
    ) -> Self {
        let skip = history.len().saturating_sub(history_limit);
        let history_tail = history[skip..].iter().map(HistoryEntry::from).collect();

        Self {
            version: PAYLOAD_VERSION,
            event: EVENT_MESSAGE_RECEIVED,
            app: app_ref(app),
            thread: thread_ref(conversation),
            message: MessageBody {
                id: Some(message.id.clone()),
                seq: Some(message.seq),
                role: Some(message.role),
                content: message.content.clone().unwrap_or_default(),
                content_json: Some(object_or_empty(&message.content_json)),
            },
            history_tail: Some(history_tail),
            timestamp: now_iso(),
        }
    }

    /// No persisted message: content only, no history.
    pub fn minimal(app: &App, conversation: &Conversation, user_message: &str) -> Self {
        Self {
            version: PAYLOAD_VERSION,
            event: EVENT_MESSAGE_RECEIVED,
            app: app_ref(app),
            thread: thread_ref(conversation),
            message: MessageBody {
                id: None,
                seq: None,
                role: None,
                content: user_message.to_string(),
                content_json: None,
            },
            history_tail: None,
            timestamp: now_iso(),
        }
    }

    /// Fixed sample sent by the webhook probe.
    pub fn probe(app: &App, sample_message: &str) -> Self {
        Self {
            version: PAYLOAD_VERSION,
            event: EVENT_MESSAGE_RECEIVED,
            app: app_ref(app),
            thread: ThreadRef {
                id: PROBE_THREAD_ID.into(),
                customer_id: Some(PROBE_CUSTOMER_ID.into()),
            },
            message: MessageBody {
                id: Some(PROBE_MESSAGE_ID.into()),
                seq: Some(1),
                role: Some(MessageRole::User),
                content: sample_message.to_string(),
                content_json: Some(Value::Object(Map::new())),
            },
            history_tail: Some(Vec::new()),
            timestamp: now_iso(),
        }
    }

    pub fn to_canonical_json(&self) -> Result<String, serde_json::Error> {
        canonical_json(self)
    }
}

/// Compact JSON in field/insertion order. These are the bytes that get signed.
pub fn canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(value)
}

fn app_ref(app: &App) -> AppRef {
    AppRef {
        id: app.id.clone(),
        name: app.name.clone(),
    }
}

fn thread_ref(conversation: &Conversation) -> ThreadRef {
    ThreadRef {
        id: conversation.id.clone(),
        customer_id: conversation.customer_id.clone(),
    }
}

fn object_or_empty(value: &Value) -> Value {
    if value.is_null() {
        Value::Object(Map::new())
    } else {
        value.clone()
    }
}

fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}
