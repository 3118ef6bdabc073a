//! Reconciliation of quarantined pages against re-submitted artifacts.
//!
//! When a quarantine artifact comes back through the watched directory
//! its name still carries the page markers of every split it went
//! through; stripping them recovers the original document, which keys
//! the lookup into the quarantine store.

use chrono::Utc;
use tracing::{debug, info};

use super::Result;
use crate::models::{canonical_name, is_artifact_name, PageFields, PageRecord};
use crate::repository::{
    InsertOutcome, MessageRepository, QuarantineRepository, RecordRepository,
};

/// Outcome of the reconciliation check for one page.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    /// Nothing quarantined for this document; standard flow applies.
    NoMatch,
    /// Quarantined fields promoted into the primary store.
    Promoted(PageRecord),
    /// Promotion hit a duplicate; caller quarantines these fields again.
    Conflict(PageFields),
    /// Partial matched against partial; deliberately left unresolved.
    Deferred,
}

/// Matches pages against previously quarantined partial data.
pub struct Reconciler<'a> {
    records: &'a RecordRepository,
    quarantine: &'a QuarantineRepository,
    messages: &'a MessageRepository,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        records: &'a RecordRepository,
        quarantine: &'a QuarantineRepository,
        messages: &'a MessageRepository,
    ) -> Self {
        Self {
            records,
            quarantine,
            messages,
        }
    }

    /// Try to reconcile one page of an artifact re-scan.
    ///
    /// Only names carrying artifact markers are considered; a plain
    /// document never reconciles against quarantine entries created by
    /// its own earlier pages.
    pub fn try_reconcile(&self, source: &str, page: i64) -> Result<Reconciliation> {
        if !is_artifact_name(source) {
            return Ok(Reconciliation::NoMatch);
        }

        let canonical = canonical_name(source);
        let candidates = self.quarantine.find_unresolved_for(&canonical)?;
        let Some(entry) = candidates.first() else {
            return Ok(Reconciliation::NoMatch);
        };
        if candidates.len() > 1 {
            // The canonical key does not disambiguate further; take the
            // oldest entry and surface the rest.
            debug!(
                canonical,
                matched = candidates.len(),
                "multiple unresolved quarantine entries; taking the oldest"
            );
        }

        let Some(record) = entry.fields.to_record(source, page, Utc::now()) else {
            info!(
                "deferring page {page} of {source}: quarantined entry {} is itself partial",
                entry.id
            );
            return Ok(Reconciliation::Deferred);
        };

        match self.records.insert_checked(&record)? {
            InsertOutcome::Duplicate => Ok(Reconciliation::Conflict(entry.fields.clone())),
            InsertOutcome::Inserted => {
                self.quarantine.mark_resolved(entry.id)?;
                self.messages.deactivate(entry.message_id)?;
                info!(
                    "reconciled page {page} of {source} into record {}/{}",
                    record.record_number,
                    record.year()
                );
                Ok(Reconciliation::Promoted(record))
            }
        }
    }
}
