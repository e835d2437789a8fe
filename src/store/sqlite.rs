use super::sequence::{SequenceAllocator, reserve_next_seq};
use super::types::{App, Conversation, Message, MessageRole, NewApp};
use crate::error::StoreError;
use chrono::Utc;
use serde_json::Value;
use sqlx::Row;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

const SCHEMA_META_TABLE: &str = "
CREATE TABLE IF NOT EXISTS relaydesk_schema_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
)";
const SCHEMA_VERSION_KEY: &str = "chat_schema_version";
const SCHEMA_VERSION: u32 = 1;

/// Open a pool suited to concurrent writers: WAL journal plus a busy timeout
/// so a blocked allocator waits for the lock holder instead of failing.
pub async fn connect_pool(
    url: &str,
    max_connections: u32,
    busy_timeout: Duration,
) -> Result<SqlitePool, StoreError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(busy_timeout)
        .foreign_keys(true);

    Ok(SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?)
}

async fn ensure_schema_version(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::query(SCHEMA_META_TABLE).execute(pool).await?;

    let stored_version: Option<(String,)> =
        sqlx::query_as("SELECT value FROM relaydesk_schema_meta WHERE key = $1")
            .bind(SCHEMA_VERSION_KEY)
            .fetch_optional(pool)
            .await?;

    if let Some((value,)) = stored_version {
        let parsed = value.parse::<u32>().map_err(|_| {
            StoreError::Schema(format!("invalid chat schema version value: {value}"))
        })?;
        if parsed != SCHEMA_VERSION {
            return Err(StoreError::Schema(format!(
                "incompatible chat schema version: stored={parsed}, expected={SCHEMA_VERSION}"
            )));
        }
        return Ok(());
    }

    sqlx::query("INSERT INTO relaydesk_schema_meta (key, value) VALUES ($1, $2)")
        .bind(SCHEMA_VERSION_KEY)
        .bind(SCHEMA_VERSION.to_string())
        .execute(pool)
        .await?;

    Ok(())
}

/// SQLite-backed store for apps, conversations and their messages.
#[derive(Debug, Clone)]
pub struct SqliteChatStore {
    pool: SqlitePool,
    allocator: SequenceAllocator,
}

impl SqliteChatStore {
    /// Create a new store with an existing pool and run migrations.
    pub async fn new(pool: SqlitePool) -> Result<Self, StoreError> {
        ensure_schema_version(&pool).await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS apps (
                 id TEXT PRIMARY KEY,
                 name TEXT NOT NULL,
                 webhook_url TEXT,
                 webhook_secret TEXT,
                 config_json TEXT NOT NULL DEFAULT '{}',
                 created_at TEXT NOT NULL
             )",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS conversations (
                 id TEXT PRIMARY KEY,
                 app_id TEXT NOT NULL REFERENCES apps(id) ON DELETE CASCADE,
                 customer_id TEXT,
                 next_seq INTEGER NOT NULL DEFAULT 1,
                 created_at TEXT NOT NULL,
                 updated_at TEXT NOT NULL
             )",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS messages (
                 id TEXT PRIMARY KEY,
                 conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                 seq INTEGER NOT NULL,
                 role TEXT NOT NULL,
                 content TEXT,
                 content_json TEXT NOT NULL DEFAULT '{}',
                 created_at TEXT NOT NULL,
                 UNIQUE(conversation_id, seq)
             )",
        )
        .execute(&pool)
        .await?;

        let allocator = SequenceAllocator::new(pool.clone());
        Ok(Self { pool, allocator })
    }

    /// Access the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn allocator(&self) -> SequenceAllocator {
        self.allocator.clone()
    }

    pub async fn create_app(&self, new_app: NewApp) -> Result<App, StoreError> {
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now().to_rfc3339();
        let config = if new_app.config.is_null() {
            Value::Object(serde_json::Map::new())
        } else {
            new_app.config
        };

        sqlx::query(
            "INSERT INTO apps (id, name, webhook_url, webhook_secret, config_json, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&id)
        .bind(&new_app.name)
        .bind(new_app.webhook_url.as_deref())
        .bind(new_app.webhook_secret.as_deref())
        .bind(serde_json::to_string(&config)?)
        .bind(&created_at)
        .execute(&self.pool)
        .await?;

        Ok(App {
            id,
            name: new_app.name,
            webhook_url: new_app.webhook_url,
            webhook_secret: new_app.webhook_secret,
            config,
            created_at,
        })
    }

    pub async fn get_app(&self, app_id: &str) -> Result<App, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, webhook_url, webhook_secret, config_json, created_at
             FROM apps
             WHERE id = $1",
        )
        .bind(app_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| map_app_row(&r))
            .transpose()?
            .ok_or_else(|| StoreError::not_found("app", app_id))
    }

    pub async fn create_conversation(
        &self,
        app_id: &str,
        customer_id: Option<&str>,
    ) -> Result<Conversation, StoreError> {
        self.get_app(app_id).await?;

        let id = Uuid::new_v4().to_string();
        let timestamp = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO conversations (id, app_id, customer_id, next_seq, created_at, updated_at)
             VALUES ($1, $2, $3, 1, $4, $4)",
        )
        .bind(&id)
        .bind(app_id)
        .bind(customer_id)
        .bind(&timestamp)
        .execute(&self.pool)
        .await?;

        Ok(Conversation {
            id,
            app_id: app_id.to_string(),
            customer_id: customer_id.map(ToString::to_string),
            next_seq: 1,
            created_at: timestamp.clone(),
            updated_at: timestamp,
        })
    }

    /// Load a conversation that belongs to `app_id`.
    pub async fn get_conversation(
        &self,
        app_id: &str,
        conversation_id: &str,
    ) -> Result<Conversation, StoreError> {
        let row = sqlx::query(
            "SELECT id, app_id, customer_id, next_seq, created_at, updated_at
             FROM conversations
             WHERE id = $1 AND app_id = $2",
        )
        .bind(conversation_id)
        .bind(app_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| map_conversation_row(&r))
            .transpose()?
            .ok_or_else(|| StoreError::not_found("conversation", conversation_id))
    }

    /// Insert a message at the next seq. Allocation and insert commit together,
    /// so a failed insert never burns a seq.
    pub async fn append_message(
        &self,
        conversation_id: &str,
        role: MessageRole,
        content: Option<&str>,
        content_json: Value,
    ) -> Result<Message, StoreError> {
        self.allocator.ensure_exists(conversation_id).await?;

        let id = Uuid::new_v4().to_string();
        let content_json = if content_json.is_null() {
            Value::Object(serde_json::Map::new())
        } else {
            content_json
        };
        let content_json_raw = serde_json::to_string(&content_json)?;

        let mut tx = self.pool.begin().await?;
        let seq = reserve_next_seq(&mut tx, conversation_id).await?;
        let created_at = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO messages (id, conversation_id, seq, role, content, content_json, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&id)
        .bind(conversation_id)
        .bind(seq)
        .bind(role.as_ref())
        .bind(content)
        .bind(&content_json_raw)
        .bind(&created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Message {
            id,
            conversation_id: conversation_id.to_string(),
            seq,
            role,
            content: content.map(ToString::to_string),
            content_json,
            created_at,
        })
    }

    pub async fn persist_assistant_message(
        &self,
        conversation_id: &str,
        content: &str,
        content_json: Value,
    ) -> Result<Message, StoreError> {
        self.append_message(
            conversation_id,
            MessageRole::Assistant,
            Some(content),
            content_json,
        )
        .await
    }

    pub async fn last_user_message(
        &self,
        conversation_id: &str,
    ) -> Result<Option<Message>, StoreError> {
        let row = sqlx::query(
            "SELECT id, conversation_id, seq, role, content, content_json, created_at
             FROM messages
             WHERE conversation_id = $1 AND role = 'user'
             ORDER BY seq DESC
             LIMIT 1",
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| map_message_row(&r)).transpose()
    }

    /// The newest `limit` messages, oldest first.
    pub async fn history(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query(
            "SELECT id, conversation_id, seq, role, content, content_json, created_at
             FROM messages
             WHERE conversation_id = $1
             ORDER BY seq DESC
             LIMIT $2",
        )
        .bind(conversation_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut messages: Vec<Message> = rows
            .iter()
            .map(map_message_row)
            .collect::<Result<_, _>>()?;
        messages.reverse();
        Ok(messages)
    }
}

fn parse_json_column(raw: Option<String>) -> Result<Value, StoreError> {
    match raw {
        Some(text) if !text.is_empty() => Ok(serde_json::from_str(&text)?),
        _ => Ok(Value::Object(serde_json::Map::new())),
    }
}

fn map_app_row(row: &SqliteRow) -> Result<App, StoreError> {
    Ok(App {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        webhook_url: row.try_get("webhook_url")?,
        webhook_secret: row.try_get("webhook_secret")?,
        config: parse_json_column(row.try_get("config_json")?)?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_conversation_row(row: &SqliteRow) -> Result<Conversation, StoreError> {
    Ok(Conversation {
        id: row.try_get("id")?,
        app_id: row.try_get("app_id")?,
        customer_id: row.try_get("customer_id")?,
        next_seq: row.try_get("next_seq")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_message_row(row: &SqliteRow) -> Result<Message, StoreError> {
    let role_raw: String = row.try_get("role")?;
    let role = MessageRole::from_str(&role_raw)
        .map_err(|_| StoreError::Schema(format!("unknown message role: {role_raw}")))?;

    Ok(Message {
        id: row.try_get("id")?,
        conversation_id: row.try_get("conversation_id")?,
        seq: row.try_get("seq")?,
        role,
        content: row.try_get("content")?,
        content_json: parse_json_column(row.try_get("content_json")?)?,
        created_at: row.try_get("created_at")?,
    })
}
