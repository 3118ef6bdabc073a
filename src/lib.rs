//! Waybill - delivery note scanning and ledger system.
//!
//! Scans paginated PDF delivery documents from a watched directory,
//! extracts structured fields with cascading pattern rules, persists
//! validated records with deduplication, quarantines pages that fail
//! extraction or conflict with existing data, reconciles quarantined
//! partial records against later scans, and tracks missing
//! record-number sequences per year.

pub mod cli;
pub mod config;
pub mod extract;
pub mod models;
pub mod report;
pub mod repository;
pub mod services;
pub mod vault;

pub use config::Config;
pub use models::{Message, MessageKind, PageFields, PageRecord, QuarantinedPage};
pub use services::scan::{ScanReport, Scanner};
