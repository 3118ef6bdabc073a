//! Quarantine handling for failed pages.
//!
//! Every non-success page outcome flows through [`QuarantineManager`],
//! the single sink that exports the page artifact, records exactly one
//! diagnostic message, and stores reconcilable partial data. The
//! pipeline calls it at most once per page per pass, so the first
//! failure reason always wins.

use tracing::{error, warn};

use super::Result;
use crate::models::{MessageKind, PageFields};
use crate::repository::{MessageRepository, QuarantineRepository};
use crate::vault::Vault;

/// Terminal outcome of processing one page.
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    /// A mandatory field rule did not match; names the field group.
    FieldFailure(&'static str),
    /// The page conflicts with an already persisted record.
    Duplicate,
    /// The store did not acknowledge the write.
    PersistFailure(String),
}

impl PageOutcome {
    fn describe(&self) -> String {
        match self {
            Self::FieldFailure(field) => format!("no match for {field}"),
            Self::Duplicate => "already recorded".to_string(),
            Self::PersistFailure(detail) => format!("record not saved: {detail}"),
        }
    }
}

/// Isolates failing pages without destroying anything.
pub struct QuarantineManager<'a, V: Vault> {
    vault: &'a V,
    quarantine: &'a QuarantineRepository,
    messages: &'a MessageRepository,
}

impl<'a, V: Vault> QuarantineManager<'a, V> {
    pub fn new(
        vault: &'a V,
        quarantine: &'a QuarantineRepository,
        messages: &'a MessageRepository,
    ) -> Self {
        Self {
            vault,
            quarantine,
            messages,
        }
    }

    /// Quarantine one page: artifact, message, and (when the field set
    /// is complete) a reconcilable quarantine entry.
    ///
    /// Pages with a genuine parse gap store no entry; only the message
    /// and artifact remain.
    pub fn quarantine_page(
        &self,
        source: &str,
        page: i64,
        fields: &PageFields,
        outcome: &PageOutcome,
    ) -> Result<i64> {
        let artifact = self.vault.export_page(source, page)?;
        let text = format!(
            "discarding page {page} of {source}: {} [{artifact}]",
            outcome.describe()
        );

        match outcome {
            PageOutcome::PersistFailure(_) => error!("{text}"),
            _ => warn!("{text}"),
        }

        let message_id = self.messages.insert(MessageKind::Discard, &text)?;
        if fields.is_complete() {
            self.quarantine
                .insert(fields, source, page, &artifact, message_id)?;
        }
        Ok(message_id)
    }
}
