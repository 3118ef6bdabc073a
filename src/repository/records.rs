//! Primary record store.
//!
//! The duplicate check and the insert are one transaction: two
//! concurrent batch runs can never both pass the check and
//! double-insert the same key.

use std::path::{Path, PathBuf};

use chrono::Datelike;
use rusqlite::{params, Connection};

use super::{connect, date_to_text, parse_date, parse_datetime, RepositoryError, Result};
use crate::models::PageRecord;

const CHECK_DUPLICATE: &str = "
    SELECT COUNT(*)
    FROM records
    WHERE (
        source = ?1
        AND page = ?2
    ) OR (
        record_number = ?3
        AND record_kind = ?4
        AND CAST(strftime('%Y', record_date) AS INTEGER) = ?5
    );
";

const INSERT_RECORD: &str = "
    INSERT INTO records (
        record_number,
        record_kind,
        record_date,
        issuer,
        site,
        quantity,
        secondary_date,
        vehicle_id,
        source,
        page,
        registered_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);
";

/// Outcome of an atomic checked insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
}

/// SQLite-backed record repository.
pub struct RecordRepository {
    db_path: PathBuf,
}

impl RecordRepository {
    /// Create the repository, initializing its schema.
    ///
    /// Failure here is the batch's only fatal condition: the caller
    /// must abort before touching any document.
    pub fn new(db_path: &Path) -> Result<Self> {
        let repo = Self {
            db_path: db_path.to_path_buf(),
        };
        repo.init_schema()?;
        Ok(repo)
    }

    fn connect(&self) -> Result<Connection> {
        connect(&self.db_path)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                record_number INTEGER NOT NULL,
                record_kind TEXT NOT NULL,
                record_date TEXT NOT NULL,
                issuer TEXT NOT NULL,
                site TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                secondary_date TEXT NOT NULL,
                vehicle_id TEXT NOT NULL,
                source TEXT NOT NULL,
                page INTEGER NOT NULL,
                registered_at TEXT NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_records_source_page
                ON records(source, page);
        "#,
        )?;
        Ok(())
    }

    /// Whether a candidate conflicts with an existing record on either
    /// uniqueness key.
    pub fn is_duplicate(&self, record: &PageRecord) -> Result<bool> {
        let conn = self.connect()?;
        Self::check_duplicate(&conn, record)
    }

    fn check_duplicate(conn: &Connection, record: &PageRecord) -> Result<bool> {
        let count: i64 = conn.query_row(
            CHECK_DUPLICATE,
            params![
                record.source,
                record.page,
                record.record_number,
                record.record_kind,
                record.year(),
            ],
            |row| row.get(0),
        )?;
        Ok(count != 0)
    }

    /// Duplicate check and insert as one atomic unit of work.
    pub fn insert_checked(&self, record: &PageRecord) -> Result<InsertOutcome> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        let count: i64 = tx.query_row(
            CHECK_DUPLICATE,
            params![
                record.source,
                record.page,
                record.record_number,
                record.record_kind,
                record.year(),
            ],
            |row| row.get(0),
        )?;
        if count != 0 {
            return Ok(InsertOutcome::Duplicate);
        }

        let affected = tx.execute(
            INSERT_RECORD,
            params![
                record.record_number,
                record.record_kind,
                date_to_text(record.record_date),
                record.issuer,
                record.site,
                record.quantity,
                date_to_text(record.secondary_date),
                record.vehicle_id,
                record.source,
                record.page,
                record.registered_at.to_rfc3339(),
            ],
        )?;
        if affected != 1 {
            return Err(RepositoryError::NotAcknowledged(format!(
                "expected 1 inserted row, got {affected}"
            )));
        }

        tx.commit()?;
        Ok(InsertOutcome::Inserted)
    }

    /// All record numbers persisted for a year, ascending.
    pub fn numbers_for_year(&self, year: i32) -> Result<Vec<i64>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT record_number FROM records
             WHERE CAST(strftime('%Y', record_date) AS INTEGER) = ?1
             ORDER BY record_number",
        )?;
        let numbers = stmt
            .query_map(params![year], |row| row.get(0))?
            .collect::<std::result::Result<Vec<i64>, _>>()?;
        Ok(numbers)
    }

    /// Distinct years with at least one record.
    pub fn years(&self) -> Result<Vec<i32>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT CAST(strftime('%Y', record_date) AS INTEGER)
             FROM records ORDER BY 1",
        )?;
        let years = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<i32>, _>>()?;
        Ok(years)
    }

    /// Total persisted records.
    pub fn count(&self) -> Result<i64> {
        let conn = self.connect()?;
        let count = conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count)
    }

    /// All records, for inspection in tests and the status command.
    pub fn all(&self) -> Result<Vec<PageRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM records ORDER BY id")?;
        let records = stmt
            .query_map([], |row| {
                Ok(PageRecord {
                    record_number: row.get("record_number")?,
                    record_kind: row.get("record_kind")?,
                    record_date: parse_date(&row.get::<_, String>("record_date")?)
                        .unwrap_or_default(),
                    issuer: row.get("issuer")?,
                    site: row.get("site")?,
                    quantity: row.get("quantity")?,
                    secondary_date: parse_date(&row.get::<_, String>("secondary_date")?)
                        .unwrap_or_default(),
                    vehicle_id: row.get("vehicle_id")?,
                    source: row.get("source")?,
                    page: row.get("page")?,
                    registered_at: parse_datetime(&row.get::<_, String>("registered_at")?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Distinct (year, month) periods of the secondary date, for
    /// downstream reporting.
    pub fn periods(&self) -> Result<Vec<(i32, u32)>> {
        let records = self.all()?;
        let mut periods: Vec<(i32, u32)> = records
            .iter()
            .map(|r| (r.secondary_date.year(), r.secondary_date.month()))
            .collect();
        periods.sort_unstable();
        periods.dedup();
        Ok(periods)
    }
}
