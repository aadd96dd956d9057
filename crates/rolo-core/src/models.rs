//! Core data models for rolodex.
//!
//! These types are shared across all rolodex crates and represent
//! the core domain entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

// =============================================================================
// CONTACT TYPES
// =============================================================================

/// One durable record per person the user knows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ContactRecord {
    pub id: Uuid,
    pub owner_id: String,
    pub name: String,
    pub company: Option<String>,
    pub role: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub personal_details: Option<String>,
    pub notes: Option<String>,
    /// How the user met this person.
    pub source: Option<String>,
    pub birthday_month: Option<i32>,
    pub birthday_day: Option<i32>,
    pub children: Option<String>,
    /// Machine-generated one-sentence summary.
    pub ai_summary: Option<String>,
    /// Machine-generated description of the most recent change.
    pub last_change: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContactRecord {
    /// The user-editable fields of this record.
    pub fn fields(&self) -> ContactFields {
        ContactFields {
            name: self.name.clone(),
            company: self.company.clone(),
            role: self.role.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            personal_details: self.personal_details.clone(),
            notes: self.notes.clone(),
            source: self.source.clone(),
            birthday_month: self.birthday_month,
            birthday_day: self.birthday_day,
            children: self.children.clone(),
        }
    }
}

/// The user-editable field set of a contact.
///
/// Unset fields are `None` (serialized as `null`), never an empty string, so
/// merge logic can tell "unknown" apart from "explicitly empty".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactFields {
    pub name: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default, alias = "personal_details")]
    pub personal_details: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default, alias = "birthday_month")]
    pub birthday_month: Option<i32>,
    #[serde(default, alias = "birthday_day")]
    pub birthday_day: Option<i32>,
    #[serde(default)]
    pub children: Option<String>,
}

/// Fields produced by extraction. Same shape as [`ContactFields`]; the
/// generated summary and change description are never extracted.
pub type ExtractedFields = ContactFields;

/// Trim a text value, mapping blank strings to `None`.
pub fn clean_text(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

impl ContactFields {
    /// Fields with only a name set.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Trim every text field and map empty strings to `None`.
    pub fn normalized(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            company: clean_text(self.company),
            role: clean_text(self.role),
            email: clean_text(self.email),
            phone: clean_text(self.phone),
            personal_details: clean_text(self.personal_details),
            notes: clean_text(self.notes),
            source: clean_text(self.source),
            birthday_month: self.birthday_month,
            birthday_day: self.birthday_day,
            children: clean_text(self.children),
        }
    }

    /// Check the record invariants: non-empty name, birthday parts in range.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation("name is required".to_string()));
        }
        if let Some(month) = self.birthday_month {
            if !is_valid_birthday_month(month) {
                return Err(Error::Validation(format!(
                    "birthday month must be 1-12, got {}",
                    month
                )));
            }
        }
        if let Some(day) = self.birthday_day {
            if !is_valid_birthday_day(day) {
                return Err(Error::Validation(format!(
                    "birthday day must be 1-31, got {}",
                    day
                )));
            }
        }
        Ok(())
    }
}

pub fn is_valid_birthday_month(month: i32) -> bool {
    (1..=12).contains(&month)
}

pub fn is_valid_birthday_day(day: i32) -> bool {
    (1..=31).contains(&day)
}

/// Tri-state update for a single optional field: leave alone, set, or clear.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FieldUpdate<T> {
    #[default]
    Keep,
    Set(T),
    Clear,
}

impl<T> FieldUpdate<T> {
    /// Apply the update to a current value.
    pub fn apply(self, current: Option<T>) -> Option<T> {
        match self {
            FieldUpdate::Keep => current,
            FieldUpdate::Set(v) => Some(v),
            FieldUpdate::Clear => None,
        }
    }

    pub fn is_keep(&self) -> bool {
        matches!(self, FieldUpdate::Keep)
    }
}

/// Partial update of a contact from a direct edit.
#[derive(Debug, Clone, Default)]
pub struct ContactPatch {
    pub name: Option<String>,
    pub company: FieldUpdate<String>,
    pub role: FieldUpdate<String>,
    pub email: FieldUpdate<String>,
    pub phone: FieldUpdate<String>,
    pub personal_details: FieldUpdate<String>,
    pub notes: FieldUpdate<String>,
    pub source: FieldUpdate<String>,
    pub birthday_month: FieldUpdate<i32>,
    pub birthday_day: FieldUpdate<i32>,
    pub children: FieldUpdate<String>,
}

impl ContactPatch {
    /// Apply this patch on top of existing fields. The result is not yet
    /// normalized or validated.
    pub fn apply_to(self, existing: ContactFields) -> ContactFields {
        ContactFields {
            name: self.name.unwrap_or(existing.name),
            company: self.company.apply(existing.company),
            role: self.role.apply(existing.role),
            email: self.email.apply(existing.email),
            phone: self.phone.apply(existing.phone),
            personal_details: self.personal_details.apply(existing.personal_details),
            notes: self.notes.apply(existing.notes),
            source: self.source.apply(existing.source),
            birthday_month: self.birthday_month.apply(existing.birthday_month),
            birthday_day: self.birthday_day.apply(existing.birthday_day),
            children: self.children.apply(existing.children),
        }
    }
}

/// Generated text attached to a contact after it is written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedText {
    pub ai_summary: Option<String>,
    pub last_change: Option<String>,
}

// =============================================================================
// REVIEW TYPES
// =============================================================================

/// An existing contact whose name is close enough to an extracted name that
/// the user should decide whether to merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateCandidate {
    pub contact_id: Uuid,
    pub name: String,
    pub company: Option<String>,
    pub role: Option<String>,
    /// Name similarity in [0, 1].
    pub similarity: f64,
}

/// Extracted-data payload stored with a pending review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewPayload {
    pub extracted: ExtractedFields,
    pub tidied_transcript: String,
    #[serde(default)]
    pub candidates: Vec<DuplicateCandidate>,
}

/// A time-boxed ingestion result awaiting confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingReview {
    pub id: Uuid,
    pub owner_id: String,
    /// The raw transcript as received.
    pub transcript: String,
    pub payload: ReviewPayload,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PendingReview {
    /// A review is terminal once `now >= expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// How a pending review is presented to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewState {
    Active(PendingReview),
    Expired { id: Uuid, expired_at: DateTime<Utc> },
}

impl ReviewState {
    pub fn from_review(review: PendingReview, now: DateTime<Utc>) -> Self {
        if review.is_expired_at(now) {
            ReviewState::Expired {
                id: review.id,
                expired_at: review.expires_at,
            }
        } else {
            ReviewState::Active(review)
        }
    }

    pub fn is_expired(&self) -> bool {
        matches!(self, ReviewState::Expired { .. })
    }
}

/// The user's decision when resolving a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "contact_id")]
pub enum Disposition {
    /// Create a brand-new contact.
    AsNew,
    /// Merge into the existing contact with this id.
    MergeInto(Uuid),
}
