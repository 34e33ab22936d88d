//! Database operations for the `tweets` table.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;
use sqstwitt_core::EnrichedRecord;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A full row from the `tweets` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TweetRow {
    pub id: Uuid,
    pub document: Value,
    pub created_at: DateTime<Utc>,
}

/// Projection of the fields the read API exposes.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TweetSummaryRow {
    pub id: Uuid,
    pub id_str: Option<String>,
    pub text: Option<String>,
    pub geo: Option<Value>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Insert an enriched tweet and return the store-generated key.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_tweet(pool: &PgPool, record: &EnrichedRecord) -> Result<Uuid, DbError> {
    let id: Uuid =
        sqlx::query_scalar("INSERT INTO tweets (document) VALUES ($1) RETURNING id")
            .bind(Json(record))
            .fetch_one(pool)
            .await?;

    Ok(id)
}

/// Fetch one stored tweet by key.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row has this key, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_tweet(pool: &PgPool, id: Uuid) -> Result<TweetRow, DbError> {
    sqlx::query_as::<_, TweetRow>("SELECT id, document, created_at FROM tweets WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// List the most recently stored tweets, newest first.
///
/// JSON `null` for `geo` is returned as `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_recent_tweets(pool: &PgPool, limit: i64) -> Result<Vec<TweetSummaryRow>, DbError> {
    let rows = sqlx::query_as::<_, TweetSummaryRow>(
        "SELECT id, \
                document->>'id_str' AS id_str, \
                document->>'text' AS text, \
                NULLIF(document->'geo', 'null'::jsonb) AS geo, \
                created_at \
         FROM tweets \
         ORDER BY created_at DESC, id DESC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Count stored tweets.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_tweets(pool: &PgPool) -> Result<i64, DbError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tweets")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

// ---------------------------------------------------------------------------
// Repository handle
// ---------------------------------------------------------------------------

/// Document repository backed by the shared pool.
///
/// Constructed once at startup and handed to every message handler; the
/// pool bounds simultaneous connections, so no extra locking is needed.
#[derive(Debug, Clone)]
pub struct PgTweetRepository {
    pool: PgPool,
}

impl PgTweetRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Persist one record and return its generated key.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlx`] if the insert fails.
    pub async fn insert(&self, record: &EnrichedRecord) -> Result<Uuid, DbError> {
        insert_tweet(&self.pool, record).await
    }
}
