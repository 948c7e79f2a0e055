//! Activity log entry builder.
//!
//! Provides a fluent way to assemble activity entries from pipeline code
//! before handing them to the record store.

use uuid::Uuid;

use crate::models::{ActivityStatus, CreateActivityInput};

/// Builder for activity log entries.
#[derive(Debug, Clone)]
pub struct ActivityBuilder {
    user_id: Uuid,
    entry_type: String,
    action: String,
    status: ActivityStatus,
    message: String,
    document_id: Option<Uuid>,
    batch_id: Option<Uuid>,
    certificate_id: Option<Uuid>,
    template_id: Option<Uuid>,
}

impl ActivityBuilder {
    /// Start an entry for a successful action.
    pub fn success(user_id: Uuid, entry_type: impl Into<String>, action: impl Into<String>) -> Self {
        Self::new(user_id, entry_type, action, ActivityStatus::Success)
    }

    /// Start an entry for a failed action.
    pub fn failure(user_id: Uuid, entry_type: impl Into<String>, action: impl Into<String>) -> Self {
        Self::new(user_id, entry_type, action, ActivityStatus::Failure)
    }

    fn new(
        user_id: Uuid,
        entry_type: impl Into<String>,
        action: impl Into<String>,
        status: ActivityStatus,
    ) -> Self {
        Self {
            user_id,
            entry_type: entry_type.into(),
            action: action.into(),
            status,
            message: String::new(),
            document_id: None,
            batch_id: None,
            certificate_id: None,
            template_id: None,
        }
    }

    /// Set the human-readable message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Attach the related document.
    pub fn on_document(mut self, id: Uuid) -> Self {
        self.document_id = Some(id);
        self
    }

    /// Attach the related batch.
    pub fn on_batch(mut self, id: Uuid) -> Self {
        self.batch_id = Some(id);
        self
    }

    /// Attach the related certificate.
    pub fn on_certificate(mut self, id: Uuid) -> Self {
        self.certificate_id = Some(id);
        self
    }

    /// Attach the related template.
    pub fn on_template(mut self, id: Uuid) -> Self {
        self.template_id = Some(id);
        self
    }

    /// Finish building the store input.
    pub fn build(self) -> CreateActivityInput {
        CreateActivityInput {
            user_id: self.user_id,
            entry_type: self.entry_type,
            action: self.action,
            status: self.status,
            message: self.message,
            document_id: self.document_id,
            batch_id: self.batch_id,
            certificate_id: self.certificate_id,
            template_id: self.template_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_entry() {
        let user = Uuid::new_v4();
        let doc = Uuid::new_v4();
        let input = ActivityBuilder::success(user, "generation", "document.generate")
            .with_message("Generated invoice.pdf")
            .on_document(doc)
            .build();

        assert_eq!(input.user_id, user);
        assert_eq!(input.entry_type, "generation");
        assert_eq!(input.action, "document.generate");
        assert_eq!(input.status, ActivityStatus::Success);
        assert_eq!(input.document_id, Some(doc));
        assert!(input.batch_id.is_none());
    }

    #[test]
    fn test_failure_entry_with_batch() {
        let user = Uuid::new_v4();
        let batch = Uuid::new_v4();
        let input = ActivityBuilder::failure(user, "signing", "document.sign")
            .with_message("Container unlock failed")
            .on_batch(batch)
            .build();

        assert_eq!(input.status, ActivityStatus::Failure);
        assert_eq!(input.batch_id, Some(batch));
    }
}
