//! Batch intake orchestration.
//!
//! Documents are processed one at a time, pages in ascending order:
//! later duplicate, gap and reconciliation decisions depend on state
//! accumulated from earlier pages. A page failure aborts only that
//! page; an unreadable document is marked failed and the batch moves
//! on. Only an unreachable store at construction time is fatal.

use std::collections::BTreeSet;

use chrono::{Datelike, Duration, Utc};
use tracing::{debug, error, info, warn};

use super::gaps::GapDetector;
use super::quarantine::{PageOutcome, QuarantineManager};
use super::reconcile::{Reconciler, Reconciliation};
use super::Result;
use crate::extract::extract_page;
use crate::extract::plate::{PlateRegistry, PlateResolution};
use crate::models::{MessageKind, PageRecord};
use crate::report::OverviewNotifier;
use crate::repository::{
    InsertOutcome, LeaseRepository, MessageRepository, QuarantineRepository, RecordRepository,
    RepositoryError,
};
use crate::vault::Vault;

/// Counters for one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub documents: usize,
    pub pages: usize,
    pub recorded: usize,
    pub quarantined: usize,
    pub promoted: usize,
    pub deferred: usize,
    pub gaps_flagged: usize,
}

/// How a single page ended up.
enum PageStatus {
    Recorded(PageRecord),
    Promoted(PageRecord),
    Quarantined,
    Deferred,
}

/// Drives a full batch over the watched directory.
pub struct Scanner<'a, V: Vault> {
    vault: &'a V,
    records: &'a RecordRepository,
    quarantine: &'a QuarantineRepository,
    messages: &'a MessageRepository,
    leases: &'a LeaseRepository,
    registry: &'a PlateRegistry,
    notifier: &'a dyn OverviewNotifier,
    owner: String,
    lease_ttl: Duration,
}

impl<'a, V: Vault> Scanner<'a, V> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        vault: &'a V,
        records: &'a RecordRepository,
        quarantine: &'a QuarantineRepository,
        messages: &'a MessageRepository,
        leases: &'a LeaseRepository,
        registry: &'a PlateRegistry,
        notifier: &'a dyn OverviewNotifier,
        lease_ttl: Duration,
    ) -> Self {
        Self {
            vault,
            records,
            quarantine,
            messages,
            leases,
            registry,
            notifier,
            owner: uuid::Uuid::new_v4().to_string(),
            lease_ttl,
        }
    }

    /// Process every candidate document, then run gap detection and
    /// notify downstream reporting about periods that received records.
    pub fn run_batch(&self) -> Result<ScanReport> {
        let candidates = self.vault.candidates()?;
        info!("watched directory holds {} candidates", candidates.len());

        let mut report = ScanReport::default();
        let mut periods: BTreeSet<(i32, u32)> = BTreeSet::new();

        for name in candidates {
            if !self.leases.acquire(&name, &self.owner, self.lease_ttl)? {
                warn!("skipping {name}: lease held by another run");
                continue;
            }

            let result = self.process_document(&name, &mut report, &mut periods);
            self.leases.release(&name, &self.owner)?;

            match result {
                Ok(()) => {
                    self.vault.mark_recorded(&name)?;
                    report.documents += 1;
                }
                Err(e) => {
                    error!("failed to process {name}: {e}");
                    self.vault.mark_failed(&name)?;
                }
            }
        }

        report.gaps_flagged = GapDetector::new(self.records, self.messages).run()?;

        for (year, month) in periods {
            self.notifier.period_updated(year, month);
        }

        Ok(report)
    }

    fn process_document(
        &self,
        name: &str,
        report: &mut ScanReport,
        periods: &mut BTreeSet<(i32, u32)>,
    ) -> Result<()> {
        let texts = self.vault.page_texts(name)?;
        info!("working on {name} ({} pages)...", texts.len());

        let mut discarded = 0usize;
        for (idx, text) in texts.iter().enumerate() {
            let page = idx as i64 + 1;
            report.pages += 1;

            match self.process_page(name, page, text)? {
                PageStatus::Recorded(record) => {
                    report.recorded += 1;
                    self.settle_recorded(&record, periods)?;
                }
                PageStatus::Promoted(record) => {
                    report.promoted += 1;
                    self.settle_recorded(&record, periods)?;
                }
                PageStatus::Quarantined => {
                    report.quarantined += 1;
                    discarded += 1;
                }
                PageStatus::Deferred => {
                    report.deferred += 1;
                }
            }
        }

        info!(
            "worked {} pages on {name} [{discarded} discarded]",
            texts.len()
        );
        Ok(())
    }

    /// One page through extraction, reconciliation, deduplication and
    /// persistence. Exactly one quarantine call per page, so the first
    /// failure reason is the one recorded.
    fn process_page(&self, name: &str, page: i64, text: &str) -> Result<PageStatus> {
        debug!("scanning page {page} of {name}...");
        let manager = QuarantineManager::new(self.vault, self.quarantine, self.messages);

        let mut fields = extract_page(text);
        if let Some(token) = fields.vehicle_id.clone() {
            fields.vehicle_id = Some(self.resolve_plate(&token, name, page)?);
        }

        let reconciler = Reconciler::new(self.records, self.quarantine, self.messages);
        match reconciler.try_reconcile(name, page)? {
            Reconciliation::Promoted(record) => return Ok(PageStatus::Promoted(record)),
            Reconciliation::Conflict(quarantined_fields) => {
                manager.quarantine_page(name, page, &quarantined_fields, &PageOutcome::Duplicate)?;
                return Ok(PageStatus::Quarantined);
            }
            Reconciliation::Deferred => return Ok(PageStatus::Deferred),
            Reconciliation::NoMatch => {}
        }

        let Some(record) = fields.to_record(name, page, Utc::now()) else {
            let reason = fields.first_gap().unwrap_or("identity");
            manager.quarantine_page(name, page, &fields, &PageOutcome::FieldFailure(reason))?;
            return Ok(PageStatus::Quarantined);
        };

        match self.records.insert_checked(&record) {
            Ok(InsertOutcome::Inserted) => Ok(PageStatus::Recorded(record)),
            Ok(InsertOutcome::Duplicate) => {
                manager.quarantine_page(name, page, &fields, &PageOutcome::Duplicate)?;
                Ok(PageStatus::Quarantined)
            }
            Err(RepositoryError::NotAcknowledged(detail)) => {
                manager.quarantine_page(
                    name,
                    page,
                    &fields,
                    &PageOutcome::PersistFailure(detail),
                )?;
                Ok(PageStatus::Quarantined)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve the extracted plate token against the registry,
    /// emitting one WARNING when nothing scores above the threshold.
    fn resolve_plate(&self, token: &str, name: &str, page: i64) -> Result<String> {
        match self.registry.resolve(token) {
            PlateResolution::Exact(plate) => Ok(plate),
            PlateResolution::Corrected { plate, score } => {
                debug!("corrected plate '{token}' to '{plate}' (score {score:.2})");
                Ok(plate)
            }
            PlateResolution::Unresolved { best, score } => {
                let text = format!(
                    "unresolved plate '{token}' on page {page} of {name} (best {} scored {score:.2})",
                    best.as_deref().unwrap_or("nothing"),
                );
                warn!("{text}");
                self.messages.insert(MessageKind::Warning, &text)?;
                Ok(token.to_string())
            }
        }
    }

    /// Post-persist bookkeeping shared by recorded and promoted pages.
    fn settle_recorded(
        &self,
        record: &PageRecord,
        periods: &mut BTreeSet<(i32, u32)>,
    ) -> Result<()> {
        if self
            .messages
            .deactivate_gap(record.record_number, record.year())?
        {
            info!(
                "gap filled: record {}/{} arrived",
                record.record_number,
                record.year()
            );
        }
        periods.insert((record.secondary_date.year(), record.secondary_date.month()));
        Ok(())
    }
}
