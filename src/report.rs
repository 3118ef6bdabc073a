//! Downstream reporting contract.
//!
//! Whenever new records land in a (year, month) period the batch
//! notifies the reporting collaborator once for that period. The
//! spreadsheet generation itself lives outside this crate; only the
//! contract and a logging implementation are provided.

use tracing::info;

/// Receives period-level change notifications after a batch.
pub trait OverviewNotifier {
    fn period_updated(&self, year: i32, month: u32);
}

/// Logs the periods due for a refresh.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl OverviewNotifier for LogNotifier {
    fn period_updated(&self, year: i32, month: u32) {
        info!("new records landed in {year}/{month:02}; overview refresh due");
    }
}
