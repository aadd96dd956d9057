//! Digest content: upcoming birthdays and the weekly summary text.
//!
//! Only the content is built here; scheduling and delivery belong to
//! whatever runs the digest.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use tracing::{debug, instrument};

use rolo_core::defaults::{BIRTHDAY_WINDOW_DAYS, DIGEST_LOOKBACK_DAYS};
use rolo_core::{bounded, ContactRecord, ContactRepository, Result};

use crate::config::PipelineConfig;

pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const NOTE_PREVIEW_CHARS: usize = 100;

/// Full month name for 1-12.
pub fn month_name(month: i32) -> Option<&'static str> {
    usize::try_from(month)
        .ok()
        .and_then(|m| m.checked_sub(1))
        .and_then(|i| MONTH_NAMES.get(i))
        .copied()
}

/// Contacts whose birthday falls on one of the `days` days starting at
/// `from`, in calendar order. Crosses month and year boundaries.
pub fn upcoming_birthdays(contacts: &[ContactRecord], from: NaiveDate, days: u32) -> Vec<ContactRecord> {
    let mut upcoming = Vec::new();
    for offset in 0..days {
        let date = from + Duration::days(i64::from(offset));
        let (month, day) = (date.month() as i32, date.day() as i32);
        upcoming.extend(
            contacts
                .iter()
                .filter(|c| c.birthday_month == Some(month) && c.birthday_day == Some(day))
                .cloned(),
        );
    }
    upcoming
}

fn role_at_company(contact: &ContactRecord) -> Option<String> {
    let parts: Vec<&str> = [contact.role.as_deref(), contact.company.as_deref()]
        .into_iter()
        .flatten()
        .collect();
    (!parts.is_empty()).then(|| parts.join(" at "))
}

fn preview(text: &str) -> String {
    if text.chars().count() > NOTE_PREVIEW_CHARS {
        let cut: String = text.chars().take(NOTE_PREVIEW_CHARS).collect();
        format!("{}…", cut)
    } else {
        text.to_string()
    }
}

fn headline(contact: &ContactRecord) -> String {
    match role_at_company(contact) {
        Some(details) => format!("  • {} ({})", contact.name, details),
        None => format!("  • {}", contact.name),
    }
}

/// Weekly digest for one owner.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeeklyDigest {
    pub new_contacts: Vec<ContactRecord>,
    pub updated_contacts: Vec<ContactRecord>,
    pub upcoming_birthdays: Vec<ContactRecord>,
}

impl WeeklyDigest {
    /// True when there is nothing worth sending.
    pub fn is_empty(&self) -> bool {
        self.new_contacts.is_empty()
            && self.updated_contacts.is_empty()
            && self.upcoming_birthdays.is_empty()
    }

    /// Plain-text rendering, one section per non-empty list.
    pub fn render(&self) -> String {
        let mut lines = vec!["Weekly People Notes Summary".to_string(), String::new()];

        if !self.new_contacts.is_empty() {
            lines.push(format!("New Contacts This Week ({}):", self.new_contacts.len()));
            for c in &self.new_contacts {
                let mut line = headline(c);
                if let Some(source) = &c.source {
                    line.push_str(&format!(" - {}", source));
                }
                lines.push(line);
            }
            lines.push(String::new());
        }

        if !self.updated_contacts.is_empty() {
            lines.push(format!("Recently Updated ({}):", self.updated_contacts.len()));
            for c in &self.updated_contacts {
                let mut line = headline(c);
                if let Some(note) = c.notes.as_deref().or(c.ai_summary.as_deref()) {
                    line.push_str(&format!(" - {}", preview(note)));
                }
                lines.push(line);
            }
            lines.push(String::new());
        }

        if !self.upcoming_birthdays.is_empty() {
            lines.push(format!("Upcoming Birthdays ({}):", self.upcoming_birthdays.len()));
            for c in &self.upcoming_birthdays {
                let month = c.birthday_month.and_then(month_name).unwrap_or("?");
                let day = c.birthday_day.map(|d| d.to_string()).unwrap_or_default();
                lines.push(format!("  • {} - {} {}", c.name, month, day));
            }
            lines.push(String::new());
        }

        lines.push("Ask a question about your contacts any time.".to_string());
        lines.join("\n")
    }
}

/// Builds digests from the contact store.
pub struct DigestService {
    contacts: Arc<dyn ContactRepository>,
    config: PipelineConfig,
}

impl DigestService {
    pub fn new(contacts: Arc<dyn ContactRepository>, config: PipelineConfig) -> Self {
        Self { contacts, config }
    }

    /// Contacts added or updated in the last week plus birthdays in the
    /// coming week. A contact created this week is listed only as new.
    #[instrument(skip(self), fields(subsystem = "pipeline", component = "digest", op = "weekly_digest"))]
    pub async fn weekly_digest(&self, owner_id: &str, now: DateTime<Utc>) -> Result<WeeklyDigest> {
        let contacts = bounded(
            "list_contacts",
            self.config.store_timeout,
            self.contacts.list_by_owner(owner_id),
        )
        .await?;
        let since = now - Duration::days(DIGEST_LOOKBACK_DAYS);

        let mut new_contacts: Vec<ContactRecord> = contacts
            .iter()
            .filter(|c| c.created_at >= since)
            .cloned()
            .collect();
        new_contacts.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut updated_contacts: Vec<ContactRecord> = contacts
            .iter()
            .filter(|c| c.created_at < since && c.updated_at >= since)
            .cloned()
            .collect();
        updated_contacts.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        let digest = WeeklyDigest {
            new_contacts,
            updated_contacts,
            upcoming_birthdays: upcoming_birthdays(
                &contacts,
                now.date_naive(),
                BIRTHDAY_WINDOW_DAYS,
            ),
        };
        debug!(
            new = digest.new_contacts.len(),
            updated = digest.updated_contacts.len(),
            birthdays = digest.upcoming_birthdays.len(),
            "Digest built"
        );
        Ok(digest)
    }
}
