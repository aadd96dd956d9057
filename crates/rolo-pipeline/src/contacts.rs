//! Direct contact edits.

use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use rolo_core::{
    bounded, ContactField, ContactFields, ContactPatch, ContactRecord, ContactRepository, Error,
    Result,
};

use crate::config::PipelineConfig;

/// Fields whose values differ between two field sets, in display order.
pub fn changed_fields(before: &ContactFields, after: &ContactFields) -> Vec<ContactField> {
    let mut changed = Vec::new();
    let mut check = |field: ContactField, differs: bool| {
        if differs {
            changed.push(field);
        }
    };
    check(ContactField::Name, before.name != after.name);
    check(ContactField::Company, before.company != after.company);
    check(ContactField::Role, before.role != after.role);
    check(ContactField::Email, before.email != after.email);
    check(ContactField::Phone, before.phone != after.phone);
    check(
        ContactField::PersonalDetails,
        before.personal_details != after.personal_details,
    );
    check(ContactField::Notes, before.notes != after.notes);
    check(ContactField::Source, before.source != after.source);
    check(
        ContactField::BirthdayMonth,
        before.birthday_month != after.birthday_month,
    );
    check(ContactField::BirthdayDay, before.birthday_day != after.birthday_day);
    check(ContactField::Children, before.children != after.children);
    changed
}

/// Create, edit, and delete contacts by hand.
pub struct ContactService {
    contacts: Arc<dyn ContactRepository>,
    config: PipelineConfig,
}

impl ContactService {
    pub fn new(contacts: Arc<dyn ContactRepository>, config: PipelineConfig) -> Self {
        Self { contacts, config }
    }

    #[instrument(skip(self, fields), fields(subsystem = "pipeline", component = "contacts", op = "create"))]
    pub async fn create(&self, owner_id: &str, fields: ContactFields) -> Result<ContactRecord> {
        let fields = fields.normalized();
        fields.validate()?;
        let record = bounded(
            "create_contact",
            self.config.store_timeout,
            self.contacts.create(owner_id, fields),
        )
        .await?;
        info!(contact_id = %record.id, "Contact created");
        Ok(record)
    }

    /// Apply a patch. Absent fields are kept, cleared fields become null,
    /// and set fields are trimmed with blanks treated as a clear.
    #[instrument(skip(self, patch), fields(subsystem = "pipeline", component = "contacts", op = "update", contact_id = %id))]
    pub async fn update(
        &self,
        owner_id: &str,
        id: Uuid,
        patch: ContactPatch,
    ) -> Result<ContactRecord> {
        let existing = bounded(
            "get_contact",
            self.config.store_timeout,
            self.contacts.get(owner_id, id),
        )
        .await?
        .ok_or(Error::ContactNotFound(id))?;

        let before = existing.fields();
        let after = patch.apply_to(before.clone()).normalized();
        after.validate()?;

        let changed = changed_fields(&before, &after);
        if changed.is_empty() {
            return Ok(existing);
        }
        let labels: Vec<&str> = changed.iter().map(|f| f.label()).collect();
        let description = format!("Edited {}", labels.join(", "));

        let record = bounded(
            "update_contact",
            self.config.store_timeout,
            self.contacts.update(owner_id, id, after, Some(description)),
        )
        .await?
        .ok_or(Error::ContactNotFound(id))?;
        info!(changed = changed.len(), "Contact updated");
        Ok(record)
    }

    /// Permanently delete a contact. Returns whether it existed.
    #[instrument(skip(self), fields(subsystem = "pipeline", component = "contacts", op = "delete"))]
    pub async fn delete(&self, owner_id: &str, id: Uuid) -> Result<bool> {
        bounded(
            "delete_contact",
            self.config.store_timeout,
            self.contacts.delete(owner_id, id),
        )
        .await
    }
}
