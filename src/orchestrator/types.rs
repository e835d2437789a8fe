use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Which reply source produced a result.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReplySource {
    Simulator,
    Webhook,
}

/// Outcome of one single-shot run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResult {
    /// `None` when the webhook attempt failed.
    pub reply_text: Option<String>,
    pub source: ReplySource,
    pub metadata: Map<String, Value>,
    pub pending: bool,
}

impl RunResult {
    pub fn reply(source: ReplySource, text: impl Into<String>) -> Self {
        Self {
            reply_text: Some(text.into()),
            source,
            metadata: Map::new(),
            pending: false,
        }
    }

    /// Terminal failure. No reply text, error description in metadata.
    pub fn failed(source: ReplySource, error: impl Into<String>) -> Self {
        let mut metadata = Map::new();
        metadata.insert("error".into(), Value::String(error.into()));
        Self {
            reply_text: None,
            source,
            metadata,
            pending: false,
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.metadata.get("error").and_then(Value::as_str)
    }

    pub fn reason(&self) -> Option<&str> {
        self.metadata.get("reason").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StreamStatus {
    Completed,
    Error,
}

/// One item of a streamed run, in the order it reaches the client.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Meta {
        source: ReplySource,
        reason: Option<String>,
    },
    Delta {
        text: String,
    },
    /// Partner bytes, forwarded without interpretation.
    Raw {
        bytes: Bytes,
    },
    Error {
        message: String,
    },
    Done {
        status: StreamStatus,
        full_text: Option<String>,
    },
}

impl StreamEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Meta { .. } => "meta",
            Self::Delta { .. } => "delta",
            Self::Raw { .. } => "raw",
            Self::Error { .. } => "error",
            Self::Done { .. } => "done",
        }
    }

    /// JSON body of the event. `Raw` has none; its bytes are the payload.
    pub fn data(&self) -> Option<Value> {
        match self {
            Self::Meta { source, reason } => {
                let mut data = json!({ "source": source });
                if let Some(reason) = reason {
                    data["reason"] = json!(reason);
                }
                Some(data)
            }
            Self::Delta { text } => Some(json!({ "text": text })),
            Self::Raw { .. } => None,
            Self::Error { message } => Some(json!({ "message": message })),
            Self::Done { status, full_text } => {
                let mut data = json!({ "status": status });
                if let Some(full_text) = full_text {
                    data["full_text"] = json!(full_text);
                }
                Some(data)
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. })
    }
}
