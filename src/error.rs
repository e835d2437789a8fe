use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Errors raised while assembling the service from configuration.
///
/// Request-level failures stay in their subsystem types ([`WebhookError`],
/// [`ChatError`]); binary glue wraps this with `anyhow` for context chains.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("store: {0}")]
    Store(#[from] StoreError),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("validation failed: {0}")]
    Validation(String),
}

// ─── Webhook errors ──────────────────────────────────────────────────────────

/// Failure modes of a single webhook attempt. None of them are retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookError {
    /// The target URL is malformed or points at a blocked host.
    #[error("invalid webhook URL: {0}")]
    InvalidUrl(String),

    #[error("webhook timed out: {0}")]
    TimedOut(String),

    #[error("webhook request failed: {0}")]
    RequestFailed(String),

    /// Non-200 status; `body` is already truncated to 200 characters.
    #[error("webhook returned HTTP {status}: {body}")]
    BadStatus { status: u16, body: String },

    #[error("invalid JSON response from webhook: {0}")]
    InvalidJson(String),

    #[error("webhook response missing required 'reply' field")]
    MissingReply,

    #[error("expected SSE (text/event-stream) but got '{0}'")]
    UnexpectedContentType(String),
}

// ─── Store errors ────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("schema: {0}")]
    Schema(String),

    #[error("sqlx: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

// ─── Chat service errors ─────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("conversation {0} has no user messages")]
    NoUserMessages(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, RelayError>;
