//! In-memory stores.
//!
//! Same contracts as the PostgreSQL repositories, backed by a mutex-guarded
//! vector. Used by tests across the workspace and for running the pipeline
//! without a database. `set_failing(true)` makes every call return
//! `StoreUnavailable`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use rolo_core::{
    ContactFields, ContactRecord, ContactRepository, Error, GeneratedText, PendingReview,
    PendingReviewRepository, QueryFilter, Result, ReviewPayload, SortSpec,
};

fn unavailable() -> Error {
    Error::StoreUnavailable("in-memory store set to fail".to_string())
}

fn lock_poisoned() -> Error {
    Error::StoreUnavailable("in-memory store lock poisoned".to_string())
}

/// Mirrors the `contact` table CHECK constraints: non-blank name and
/// birthday month/day in range. Violations surface as `StoreUnavailable`,
/// the same variant a rejected INSERT or UPDATE produces from PostgreSQL.
fn check_row(fields: &ContactFields) -> Result<()> {
    fields
        .validate()
        .map_err(|e| Error::StoreUnavailable(format!("contact row rejected: {}", e)))
}

/// Strictly after `previous`, normally the current time.
fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

/// In-memory contact store.
#[derive(Default)]
pub struct MemoryContactStore {
    rows: Mutex<Vec<ContactRecord>>,
    failing: AtomicBool,
}

impl MemoryContactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(())
    }

    /// Insert a fully-formed record, e.g. with backdated timestamps.
    pub fn insert_record(&self, record: ContactRecord) -> Result<()> {
        self.rows.lock().map_err(|_| lock_poisoned())?.push(record);
        Ok(())
    }

    fn build(owner_id: &str, fields: ContactFields) -> ContactRecord {
        let now = Utc::now();
        ContactRecord {
            id: Uuid::now_v7(),
            owner_id: owner_id.to_string(),
            name: fields.name,
            company: fields.company,
            role: fields.role,
            email: fields.email,
            phone: fields.phone,
            personal_details: fields.personal_details,
            notes: fields.notes,
            source: fields.source,
            birthday_month: fields.birthday_month,
            birthday_day: fields.birthday_day,
            children: fields.children,
            ai_summary: None,
            last_change: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[async_trait]
impl ContactRepository for MemoryContactStore {
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<ContactRecord>> {
        self.check()?;
        let rows = self.rows.lock().map_err(|_| lock_poisoned())?;
        Ok(rows
            .iter()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn get(&self, owner_id: &str, id: Uuid) -> Result<Option<ContactRecord>> {
        self.check()?;
        let rows = self.rows.lock().map_err(|_| lock_poisoned())?;
        Ok(rows
            .iter()
            .find(|r| r.owner_id == owner_id && r.id == id)
            .cloned())
    }

    async fn create(&self, owner_id: &str, fields: ContactFields) -> Result<ContactRecord> {
        self.check()?;
        check_row(&fields)?;
        let record = Self::build(owner_id, fields);
        self.rows
            .lock()
            .map_err(|_| lock_poisoned())?
            .push(record.clone());
        Ok(record)
    }

    async fn create_many(
        &self,
        owner_id: &str,
        fields: Vec<ContactFields>,
    ) -> Result<Vec<ContactRecord>> {
        self.check()?;
        // All or nothing, like the transaction in the PostgreSQL store.
        fields.iter().try_for_each(check_row)?;
        let records: Vec<ContactRecord> = fields
            .into_iter()
            .map(|f| Self::build(owner_id, f))
            .collect();
        self.rows
            .lock()
            .map_err(|_| lock_poisoned())?
            .extend(records.iter().cloned());
        Ok(records)
    }

    async fn update(
        &self,
        owner_id: &str,
        id: Uuid,
        fields: ContactFields,
        last_change: Option<String>,
    ) -> Result<Option<ContactRecord>> {
        self.check()?;
        let mut rows = self.rows.lock().map_err(|_| lock_poisoned())?;
        let Some(row) = rows
            .iter_mut()
            .find(|r| r.owner_id == owner_id && r.id == id)
        else {
            return Ok(None);
        };
        check_row(&fields)?;
        row.name = fields.name;
        row.company = fields.company;
        row.role = fields.role;
        row.email = fields.email;
        row.phone = fields.phone;
        row.personal_details = fields.personal_details;
        row.notes = fields.notes;
        row.source = fields.source;
        row.birthday_month = fields.birthday_month;
        row.birthday_day = fields.birthday_day;
        row.children = fields.children;
        if last_change.is_some() {
            row.last_change = last_change;
        }
        row.updated_at = next_timestamp(row.updated_at);
        Ok(Some(row.clone()))
    }

    async fn set_generated(
        &self,
        owner_id: &str,
        id: Uuid,
        generated: GeneratedText,
    ) -> Result<bool> {
        self.check()?;
        let mut rows = self.rows.lock().map_err(|_| lock_poisoned())?;
        let Some(row) = rows
            .iter_mut()
            .find(|r| r.owner_id == owner_id && r.id == id)
        else {
            return Ok(false);
        };
        if generated.ai_summary.is_some() {
            row.ai_summary = generated.ai_summary;
        }
        if generated.last_change.is_some() {
            row.last_change = generated.last_change;
        }
        row.updated_at = next_timestamp(row.updated_at);
        Ok(true)
    }

    async fn delete(&self, owner_id: &str, id: Uuid) -> Result<bool> {
        self.check()?;
        let mut rows = self.rows.lock().map_err(|_| lock_poisoned())?;
        let before = rows.len();
        rows.retain(|r| !(r.owner_id == owner_id && r.id == id));
        Ok(rows.len() < before)
    }

    async fn query(
        &self,
        owner_id: &str,
        filters: &[QueryFilter],
        sort: SortSpec,
    ) -> Result<Vec<ContactRecord>> {
        self.check()?;
        let rows = self.rows.lock().map_err(|_| lock_poisoned())?;
        let mut matched: Vec<ContactRecord> = rows
            .iter()
            .filter(|r| r.owner_id == owner_id)
            .filter(|r| filters.iter().all(|f| f.matches(r)))
            .cloned()
            .collect();
        matched.sort_by(|a, b| sort.compare(a, b));
        Ok(matched)
    }
}

/// In-memory pending-review store.
#[derive(Default)]
pub struct MemoryReviewStore {
    rows: Mutex<Vec<PendingReview>>,
    failing: AtomicBool,
    failing_delete: AtomicBool,
}

impl MemoryReviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Fail only `delete`, leaving reads and writes working.
    pub fn set_failing_delete(&self, failing: bool) {
        self.failing_delete.store(failing, Ordering::SeqCst);
    }

    /// Insert a fully-formed review, e.g. one that is already expired.
    pub fn insert_review(&self, review: PendingReview) -> Result<()> {
        self.rows.lock().map_err(|_| lock_poisoned())?.push(review);
        Ok(())
    }

    /// Number of stored reviews across all owners.
    pub fn len(&self) -> usize {
        self.rows.lock().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(())
    }
}

#[async_trait]
impl PendingReviewRepository for MemoryReviewStore {
    async fn create(
        &self,
        owner_id: &str,
        transcript: &str,
        payload: ReviewPayload,
        ttl: Duration,
    ) -> Result<PendingReview> {
        self.check()?;
        let created_at = Utc::now();
        let review = PendingReview {
            id: Uuid::now_v7(),
            owner_id: owner_id.to_string(),
            transcript: transcript.to_string(),
            payload,
            created_at,
            expires_at: created_at + ttl,
        };
        self.rows
            .lock()
            .map_err(|_| lock_poisoned())?
            .push(review.clone());
        Ok(review)
    }

    async fn get(&self, owner_id: &str, id: Uuid) -> Result<Option<PendingReview>> {
        self.check()?;
        let rows = self.rows.lock().map_err(|_| lock_poisoned())?;
        Ok(rows
            .iter()
            .find(|r| r.owner_id == owner_id && r.id == id)
            .cloned())
    }

    async fn delete(&self, owner_id: &str, id: Uuid) -> Result<bool> {
        self.check()?;
        if self.failing_delete.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        let mut rows = self.rows.lock().map_err(|_| lock_poisoned())?;
        let before = rows.len();
        rows.retain(|r| !(r.owner_id == owner_id && r.id == id));
        Ok(rows.len() < before)
    }
}
