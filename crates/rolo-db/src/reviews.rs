//! PostgreSQL pending-review repository.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::types::Json;
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, instrument};
use uuid::Uuid;

use rolo_core::{PendingReview, PendingReviewRepository, Result, ReviewPayload};

const REVIEW_COLUMNS: &str = "id, owner_id, transcript, payload, created_at, expires_at";

/// PostgreSQL pending-review repository.
///
/// The payload is one JSONB column, so a review is written by a single
/// INSERT and is either fully present or absent.
#[derive(Clone)]
pub struct PgPendingReviewRepository {
    pool: Pool<Postgres>,
}

impl PgPendingReviewRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(row: &sqlx::postgres::PgRow) -> Result<PendingReview> {
        let payload: Json<ReviewPayload> = row.try_get("payload")?;
        Ok(PendingReview {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            transcript: row.try_get("transcript")?,
            payload: payload.0,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            expires_at: row.try_get::<DateTime<Utc>, _>("expires_at")?,
        })
    }
}

#[async_trait]
impl PendingReviewRepository for PgPendingReviewRepository {
    #[instrument(skip(self, transcript, payload), fields(subsystem = "database", component = "reviews", op = "create"))]
    async fn create(
        &self,
        owner_id: &str,
        transcript: &str,
        payload: ReviewPayload,
        ttl: Duration,
    ) -> Result<PendingReview> {
        let id = Uuid::now_v7();
        let created_at = Utc::now();
        let expires_at = created_at + ttl;
        let sql = format!(
            "INSERT INTO pending_review (id, owner_id, transcript, payload, created_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            REVIEW_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(owner_id)
            .bind(transcript)
            .bind(Json(&payload))
            .bind(created_at)
            .bind(expires_at)
            .fetch_one(&self.pool)
            .await?;
        debug!(review_id = %id, %expires_at, "Pending review stored");
        Self::parse_row(&row)
    }

    async fn get(&self, owner_id: &str, id: Uuid) -> Result<Option<PendingReview>> {
        let sql = format!(
            "SELECT {} FROM pending_review WHERE owner_id = $1 AND id = $2",
            REVIEW_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(owner_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::parse_row).transpose()
    }

    async fn delete(&self, owner_id: &str, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM pending_review WHERE owner_id = $1 AND id = $2")
            .bind(owner_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
