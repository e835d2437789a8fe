//! Gap-free, per-conversation message positions.
//!
//! `conversations.next_seq` is the only source of truth. Reserving a value is
//! a single `UPDATE ... RETURNING` issued as the first statement of a write
//! transaction, so the write lock is taken before the counter is read and two
//! allocators can never observe the same value. Values handed out for one
//! conversation are always `1..=N` with no duplicates and no holes, provided
//! the caller commits the transaction the value was reserved in.
//!
//! SQLite has no row locks: that write lock covers the whole database, so
//! allocations for unrelated conversations are serialized too. `busy_timeout`
//! on the pool makes waiting allocators queue instead of failing.

use crate::error::StoreError;
use chrono::Utc;
use sqlx::SqliteConnection;
use sqlx::sqlite::SqlitePool;

#[derive(Debug, Clone)]
pub struct SequenceAllocator {
    pool: SqlitePool,
}

impl SequenceAllocator {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Reserve and commit the next seq for `conversation_id`.
    pub async fn allocate(&self, conversation_id: &str) -> Result<i64, StoreError> {
        self.ensure_exists(conversation_id).await?;

        let mut tx = self.pool.begin().await?;
        let allocated = reserve_next_seq(&mut tx, conversation_id).await?;
        tx.commit().await?;

        tracing::debug!(conversation_id, seq = allocated, "allocated message seq");
        Ok(allocated)
    }

    /// Existence check done without taking the write lock.
    pub async fn ensure_exists(&self, conversation_id: &str) -> Result<(), StoreError> {
        let found: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM conversations WHERE id = $1")
            .bind(conversation_id)
            .fetch_optional(&self.pool)
            .await?;

        match found {
            Some(_) => Ok(()),
            None => Err(StoreError::not_found("conversation", conversation_id)),
        }
    }
}

/// Bump `next_seq` inside the caller's transaction and return the value it
/// held before. Must be the first write of that transaction.
pub(crate) async fn reserve_next_seq(
    conn: &mut SqliteConnection,
    conversation_id: &str,
) -> Result<i64, StoreError> {
    let row: Option<(i64,)> = sqlx::query_as(
        "UPDATE conversations
         SET next_seq = next_seq + 1, updated_at = $1
         WHERE id = $2
         RETURNING next_seq - 1",
    )
    .bind(Utc::now().to_rfc3339())
    .bind(conversation_id)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(|(allocated,)| allocated)
        .ok_or_else(|| StoreError::not_found("conversation", conversation_id))
}
