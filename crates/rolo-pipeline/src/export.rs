//! CSV export of an owner's contacts.

use std::sync::Arc;

use chrono::SecondsFormat;
use csv::{QuoteStyle, Terminator, WriterBuilder};
use tracing::{info, instrument};

use rolo_core::{bounded, ContactRecord, ContactRepository, Error, Result, SortSpec};

use crate::config::PipelineConfig;
use crate::digest::month_name;

pub const CSV_HEADERS: [&str; 13] = [
    "Name",
    "Company",
    "Role",
    "Email",
    "Phone",
    "Personal Details",
    "Notes",
    "Source",
    "Birthday Month",
    "Birthday Day",
    "Children",
    "Created",
    "Updated",
];

fn csv_error(err: impl std::fmt::Display) -> Error {
    Error::Serialization(format!("CSV export failed: {}", err))
}

/// One CSV record, columns in [`CSV_HEADERS`] order.
pub fn csv_record(contact: &ContactRecord) -> [String; 13] {
    let text = |value: Option<&str>| value.unwrap_or_default().to_string();
    [
        contact.name.clone(),
        text(contact.company.as_deref()),
        text(contact.role.as_deref()),
        text(contact.email.as_deref()),
        text(contact.phone.as_deref()),
        text(contact.personal_details.as_deref()),
        text(contact.notes.as_deref()),
        text(contact.source.as_deref()),
        text(contact.birthday_month.and_then(month_name)),
        contact.birthday_day.map(|d| d.to_string()).unwrap_or_default(),
        text(contact.children.as_deref()),
        contact.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        contact.updated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
    ]
}

/// Render contacts as CSV with a header record, in the order given.
///
/// Fields are quoted only when they contain a comma, quote, or line break.
pub fn render_csv(contacts: &[ContactRecord]) -> Result<String> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(CSV_HEADERS).map_err(csv_error)?;
    for contact in contacts {
        writer.write_record(csv_record(contact)).map_err(csv_error)?;
    }

    let bytes = writer.into_inner().map_err(csv_error)?;
    String::from_utf8(bytes).map_err(csv_error)
}

/// Export every contact of an owner, most recently updated first.
#[instrument(skip(contacts, config), fields(subsystem = "pipeline", component = "export", op = "export_csv"))]
pub async fn export_csv(
    contacts: &Arc<dyn ContactRepository>,
    config: &PipelineConfig,
    owner_id: &str,
) -> Result<String> {
    let rows = bounded(
        "export_contacts",
        config.store_timeout,
        contacts.query(owner_id, &[], SortSpec::default()),
    )
    .await?;
    info!(result_count = rows.len(), "Contacts exported");
    render_csv(&rows)
}
