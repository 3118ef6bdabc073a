//! Repository layer for SQLite persistence.
//!
//! One repository per aggregate, each owning schema initialization for
//! its tables on a shared database file. Every value is passed as a
//! bound parameter; SQL text never interpolates data.

pub mod leases;
pub mod messages;
pub mod quarantine;
pub mod records;

pub use leases::LeaseRepository;
pub use messages::MessageRepository;
pub use quarantine::QuarantineRepository;
pub use records::{InsertOutcome, RecordRepository};

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;
use thiserror::Error;

/// Repository error taxonomy.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A write was not acknowledged by the store (affected row count
    /// differed from the expected one).
    #[error("write not acknowledged: {0}")]
    NotAcknowledged(String),
}

pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Open a connection to the shared database file.
pub(crate) fn connect(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(conn)
}

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Parse a date column stored as `YYYY-MM-DD`.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Text form of a date column.
pub fn date_to_text(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_datetime_falls_back_to_epoch() {
        assert_eq!(parse_datetime("garbage"), DateTime::UNIX_EPOCH);
        let dt = parse_datetime("2024-03-15T10:00:00Z");
        assert_eq!(dt.to_rfc3339(), "2024-03-15T10:00:00+00:00");
    }

    #[test]
    fn test_date_text_round_trip() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(parse_date(&date_to_text(d)), Some(d));
        assert_eq!(parse_date("15/03/2024"), None);
    }
}
