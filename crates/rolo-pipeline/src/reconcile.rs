//! Field-level merge of extracted data into contact records.
//!
//! Scalars fill gaps only; an existing value is never overwritten by a
//! merge. Free-text fields accumulate line by line, skipping text the
//! record already contains. The name of an existing record is never
//! changed. Everything here is pure.

use rolo_core::{clean_text, ContactField, ContactFields, ContactRecord, ExtractedFields};

/// What the extracted fields are being resolved against.
#[derive(Debug, Clone, Copy)]
pub enum MergeTarget<'a> {
    /// Create a brand-new contact.
    New,
    /// Merge into this existing contact.
    Existing(&'a ContactRecord),
}

/// Fields to persist and which of them a merge changed.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub fields: ContactFields,
    /// Empty for new contacts and for merges that added nothing.
    pub changed: Vec<ContactField>,
}

impl Resolution {
    pub fn is_unchanged(&self) -> bool {
        self.changed.is_empty()
    }
}

/// Compute the field set to persist for a disposition.
pub fn resolve(target: MergeTarget<'_>, extracted: ExtractedFields) -> Resolution {
    let extracted = extracted.normalized();
    match target {
        MergeTarget::New => Resolution {
            fields: extracted,
            changed: Vec::new(),
        },
        MergeTarget::Existing(existing) => merge(existing.fields(), extracted),
    }
}

fn merge(existing: ContactFields, extracted: ExtractedFields) -> Resolution {
    let mut changed = Vec::new();

    let fields = ContactFields {
        name: existing.name,
        company: fill_gap(ContactField::Company, existing.company, extracted.company, &mut changed),
        role: fill_gap(ContactField::Role, existing.role, extracted.role, &mut changed),
        email: fill_gap(ContactField::Email, existing.email, extracted.email, &mut changed),
        phone: fill_gap(ContactField::Phone, existing.phone, extracted.phone, &mut changed),
        personal_details: accumulate(
            ContactField::PersonalDetails,
            existing.personal_details,
            extracted.personal_details,
            &mut changed,
        ),
        notes: accumulate(ContactField::Notes, existing.notes, extracted.notes, &mut changed),
        source: fill_gap(ContactField::Source, existing.source, extracted.source, &mut changed),
        birthday_month: fill_gap(
            ContactField::BirthdayMonth,
            existing.birthday_month,
            extracted.birthday_month,
            &mut changed,
        ),
        birthday_day: fill_gap(
            ContactField::BirthdayDay,
            existing.birthday_day,
            extracted.birthday_day,
            &mut changed,
        ),
        children: accumulate(
            ContactField::Children,
            existing.children,
            extracted.children,
            &mut changed,
        ),
    };

    Resolution { fields, changed }
}

fn fill_gap<T>(
    field: ContactField,
    existing: Option<T>,
    extracted: Option<T>,
    changed: &mut Vec<ContactField>,
) -> Option<T> {
    match (existing, extracted) {
        (Some(current), _) => Some(current),
        (None, Some(new)) => {
            changed.push(field);
            Some(new)
        }
        (None, None) => None,
    }
}

fn accumulate(
    field: ContactField,
    existing: Option<String>,
    extracted: Option<String>,
    changed: &mut Vec<ContactField>,
) -> Option<String> {
    // Stored text is kept byte for byte; only the incoming text is cleaned.
    let Some(new) = clean_text(extracted) else {
        return existing;
    };
    match existing {
        Some(current) if !current.trim().is_empty() => {
            if current.contains(&new) {
                Some(current)
            } else {
                changed.push(field);
                Some(format!("{}\n{}", current, new))
            }
        }
        _ => {
            changed.push(field);
            Some(new)
        }
    }
}

/// Deterministic description of a change, e.g.
/// `"Merged from voice note: added company, notes"`.
pub fn describe_change(origin: &str, changed: &[ContactField]) -> Option<String> {
    if changed.is_empty() {
        return None;
    }
    let labels: Vec<&str> = changed.iter().map(|f| f.label()).collect();
    Some(format!("{}: added {}", origin, labels.join(", ")))
}
