//! Quarantined page store.
//!
//! Rows keep whatever fields the extractor could determine, the
//! exported artifact and the linked diagnostic message. They form the
//! audit trail of every failed page and are never deleted; resolution
//! happens at most once.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, Row};

use super::{connect, date_to_text, parse_date, Result};
use crate::models::{PageFields, QuarantinedPage};

/// SQLite-backed quarantine repository.
pub struct QuarantineRepository {
    db_path: PathBuf,
}

impl QuarantineRepository {
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
            CREATE TABLE IF NOT EXISTS quarantined_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                record_number INTEGER,
                record_kind TEXT,
                record_date TEXT,
                issuer TEXT,
                site TEXT,
                quantity INTEGER,
                secondary_date TEXT,
                vehicle_id TEXT,
                source TEXT NOT NULL,
                page INTEGER NOT NULL,
                artifact TEXT NOT NULL,
                message_id INTEGER NOT NULL,
                resolved INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_quarantine_source
                ON quarantined_records(source, resolved);
        "#,
        )?;
        Ok(())
    }

    /// Store a quarantined page, returning its row id.
    pub fn insert(
        &self,
        fields: &PageFields,
        source: &str,
        page: i64,
        artifact: &str,
        message_id: i64,
    ) -> Result<i64> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO quarantined_records (
                record_number, record_kind, record_date, issuer, site,
                quantity, secondary_date, vehicle_id, source, page,
                artifact, message_id, resolved
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 0)",
            params![
                fields.record_number,
                fields.record_kind,
                fields.record_date.map(date_to_text),
                fields.issuer,
                fields.site,
                fields.quantity,
                fields.secondary_date.map(date_to_text),
                fields.vehicle_id,
                source,
                page,
                artifact,
                message_id,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Unresolved entries whose source canonicalizes to the given
    /// document name, oldest first.
    ///
    /// Matches the original document itself and every artifact split
    /// off it (names prefixed by the document stem plus a page marker).
    pub fn find_unresolved_for(&self, canonical_source: &str) -> Result<Vec<QuarantinedPage>> {
        let stem = canonical_source
            .strip_suffix(".pdf")
            .unwrap_or(canonical_source);
        // Underscores are LIKE wildcards; escape them so the stem
        // matches literally.
        let artifact_prefix = format!("{}\\_P%", stem.replace('_', "\\_"));

        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM quarantined_records
             WHERE resolved = 0 AND (source = ?1 OR source LIKE ?2 ESCAPE '\\')
             ORDER BY id",
        )?;
        let pages = stmt
            .query_map(params![canonical_source, artifact_prefix], row_to_page)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(pages)
    }

    /// Flip `resolved` to true, exactly once.
    ///
    /// Returns false when the entry was already resolved, making
    /// repeated reconciliation a no-op.
    pub fn mark_resolved(&self, id: i64) -> Result<bool> {
        let conn = self.connect()?;
        let affected = conn.execute(
            "UPDATE quarantined_records SET resolved = 1 WHERE id = ?1 AND resolved = 0",
            params![id],
        )?;
        Ok(affected == 1)
    }

    pub fn count_unresolved(&self) -> Result<i64> {
        let conn = self.connect()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM quarantined_records WHERE resolved = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn count(&self) -> Result<i64> {
        let conn = self.connect()?;
        let count = conn.query_row("SELECT COUNT(*) FROM quarantined_records", [], |row| {
            row.get(0)
        })?;
        Ok(count)
    }
}

fn row_to_page(row: &Row) -> rusqlite::Result<QuarantinedPage> {
    Ok(QuarantinedPage {
        id: row.get("id")?,
        fields: PageFields {
            record_number: row.get("record_number")?,
            record_kind: row.get("record_kind")?,
            record_date: row
                .get::<_, Option<String>>("record_date")?
                .as_deref()
                .and_then(parse_date),
            issuer: row.get("issuer")?,
            site: row.get("site")?,
            quantity: row.get("quantity")?,
            secondary_date: row
                .get::<_, Option<String>>("secondary_date")?
                .as_deref()
                .and_then(parse_date),
            vehicle_id: row.get("vehicle_id")?,
        },
        source: row.get("source")?,
        page: row.get("page")?,
        artifact: row.get("artifact")?,
        message_id: row.get("message_id")?,
        resolved: row.get::<_, i64>("resolved")? != 0,
    })
}
