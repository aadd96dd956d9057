//! PostgreSQL contact repository.

use std::time::Instant;

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use tracing::{debug, instrument};
use uuid::Uuid;

use rolo_core::{
    ContactFields, ContactRecord, ContactRepository, GeneratedText, QueryFilter, Result, SortSpec,
};

use crate::query_filter::{ContactQueryBuilder, QueryParam, CONTACT_COLUMNS};

/// Bumps `updated_at` to at least one microsecond past its previous value so
/// successive writes inside one clock tick still order correctly.
const NEXT_UPDATED_AT: &str = "GREATEST(now(), updated_at + interval '1 microsecond')";

/// PostgreSQL contact repository.
#[derive(Clone)]
pub struct PgContactRepository {
    pool: Pool<Postgres>,
}

impl PgContactRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn insert_sql() -> String {
        format!(
            "INSERT INTO contact (id, owner_id, name, company, role, email, phone, \
             personal_details, notes, source, birthday_month, birthday_day, children) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING {}",
            CONTACT_COLUMNS
        )
    }
}

#[async_trait]
impl ContactRepository for PgContactRepository {
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<ContactRecord>> {
        let sql = format!(
            "SELECT {} FROM contact WHERE owner_id = $1 ORDER BY created_at, id",
            CONTACT_COLUMNS
        );
        let rows = sqlx::query_as::<_, ContactRecord>(&sql)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn get(&self, owner_id: &str, id: Uuid) -> Result<Option<ContactRecord>> {
        let sql = format!(
            "SELECT {} FROM contact WHERE owner_id = $1 AND id = $2",
            CONTACT_COLUMNS
        );
        let row = sqlx::query_as::<_, ContactRecord>(&sql)
            .bind(owner_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    #[instrument(skip(self, fields), fields(subsystem = "database", component = "contacts", op = "create"))]
    async fn create(&self, owner_id: &str, fields: ContactFields) -> Result<ContactRecord> {
        let record = sqlx::query_as::<_, ContactRecord>(&Self::insert_sql())
            .bind(Uuid::now_v7())
            .bind(owner_id)
            .bind(&fields.name)
            .bind(&fields.company)
            .bind(&fields.role)
            .bind(&fields.email)
            .bind(&fields.phone)
            .bind(&fields.personal_details)
            .bind(&fields.notes)
            .bind(&fields.source)
            .bind(fields.birthday_month)
            .bind(fields.birthday_day)
            .bind(&fields.children)
            .fetch_one(&self.pool)
            .await?;
        debug!(contact_id = %record.id, "Contact created");
        Ok(record)
    }

    #[instrument(skip(self, fields), fields(subsystem = "database", component = "contacts", op = "create_many", count = fields.len()))]
    async fn create_many(
        &self,
        owner_id: &str,
        fields: Vec<ContactFields>,
    ) -> Result<Vec<ContactRecord>> {
        let sql = Self::insert_sql();
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(fields.len());
        for entry in &fields {
            let record = sqlx::query_as::<_, ContactRecord>(&sql)
                .bind(Uuid::now_v7())
                .bind(owner_id)
                .bind(&entry.name)
                .bind(&entry.company)
                .bind(&entry.role)
                .bind(&entry.email)
                .bind(&entry.phone)
                .bind(&entry.personal_details)
                .bind(&entry.notes)
                .bind(&entry.source)
                .bind(entry.birthday_month)
                .bind(entry.birthday_day)
                .bind(&entry.children)
                .fetch_one(&mut *tx)
                .await?;
            created.push(record);
        }
        tx.commit().await?;
        Ok(created)
    }

    async fn update(
        &self,
        owner_id: &str,
        id: Uuid,
        fields: ContactFields,
        last_change: Option<String>,
    ) -> Result<Option<ContactRecord>> {
        let sql = format!(
            "UPDATE contact SET name = $3, company = $4, role = $5, email = $6, phone = $7, \
             personal_details = $8, notes = $9, source = $10, birthday_month = $11, \
             birthday_day = $12, children = $13, last_change = COALESCE($14, last_change), \
             updated_at = {} \
             WHERE owner_id = $1 AND id = $2 \
             RETURNING {}",
            NEXT_UPDATED_AT, CONTACT_COLUMNS
        );
        let record = sqlx::query_as::<_, ContactRecord>(&sql)
            .bind(owner_id)
            .bind(id)
            .bind(&fields.name)
            .bind(&fields.company)
            .bind(&fields.role)
            .bind(&fields.email)
            .bind(&fields.phone)
            .bind(&fields.personal_details)
            .bind(&fields.notes)
            .bind(&fields.source)
            .bind(fields.birthday_month)
            .bind(fields.birthday_day)
            .bind(&fields.children)
            .bind(last_change)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn set_generated(
        &self,
        owner_id: &str,
        id: Uuid,
        generated: GeneratedText,
    ) -> Result<bool> {
        let sql = format!(
            "UPDATE contact SET ai_summary = COALESCE($3, ai_summary), \
             last_change = COALESCE($4, last_change), updated_at = {} \
             WHERE owner_id = $1 AND id = $2",
            NEXT_UPDATED_AT
        );
        let result = sqlx::query(&sql)
            .bind(owner_id)
            .bind(id)
            .bind(generated.ai_summary)
            .bind(generated.last_change)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, owner_id: &str, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM contact WHERE owner_id = $1 AND id = $2")
            .bind(owner_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, filters), fields(subsystem = "database", component = "contacts", op = "query", filters = filters.len()))]
    async fn query(
        &self,
        owner_id: &str,
        filters: &[QueryFilter],
        sort: SortSpec,
    ) -> Result<Vec<ContactRecord>> {
        let start = Instant::now();
        let (sql, params) = ContactQueryBuilder::new(owner_id, filters, sort).build();

        let mut query = sqlx::query_as::<_, ContactRecord>(&sql);
        for param in params {
            query = match param {
                QueryParam::String(s) => query.bind(s),
                QueryParam::Int(i) => query.bind(i),
                QueryParam::Timestamp(t) => query.bind(t),
            };
        }
        let rows = query.fetch_all(&self.pool).await?;
        debug!(
            result_count = rows.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Contact query complete"
        );
        Ok(rows)
    }
}
