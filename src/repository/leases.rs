//! Document processing leases.
//!
//! A lease row (owner, expiry) gives one batch run exclusive ownership
//! of a source document. Expired leases are reclaimed inside the same
//! transaction that acquires them, so recovery after a crashed run is
//! an ordinary acquisition rather than a manual cleanup.

use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{connect, parse_datetime, Result};

/// SQLite-backed lease repository.
pub struct LeaseRepository {
    db_path: PathBuf,
}

impl LeaseRepository {
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
            CREATE TABLE IF NOT EXISTS leases (
                source TEXT PRIMARY KEY,
                owner TEXT NOT NULL,
                expires_at TEXT NOT NULL
            );
        "#,
        )?;
        Ok(())
    }

    /// Try to take the lease on a source document.
    ///
    /// Succeeds when no lease exists, when the existing lease expired,
    /// or when the caller already holds it (renewal). Returns false if
    /// another live owner holds it.
    pub fn acquire(&self, source: &str, owner: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let now = Utc::now();

        let existing: Option<(String, String)> = tx
            .query_row(
                "SELECT owner, expires_at FROM leases WHERE source = ?1",
                params![source],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        if let Some((holder, expires_at)) = existing {
            if holder != owner && parse_datetime(&expires_at) > now {
                return Ok(false);
            }
            tx.execute("DELETE FROM leases WHERE source = ?1", params![source])?;
        }

        tx.execute(
            "INSERT INTO leases (source, owner, expires_at) VALUES (?1, ?2, ?3)",
            params![source, owner, (now + ttl).to_rfc3339()],
        )?;
        tx.commit()?;
        Ok(true)
    }

    /// Sources with a live lease right now.
    pub fn active_sources(&self) -> Result<Vec<String>> {
        let conn = self.connect()?;
        let mut stmt =
            conn.prepare("SELECT source, expires_at FROM leases ORDER BY source")?;
        let now = Utc::now();
        let sources = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?
            .into_iter()
            .filter(|(_, expires_at)| parse_datetime(expires_at) > now)
            .map(|(source, _)| source)
            .collect();
        Ok(sources)
    }

    /// Release a held lease. Releasing something not held is a no-op.
    pub fn release(&self, source: &str, owner: &str) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "DELETE FROM leases WHERE source = ?1 AND owner = ?2",
            params![source, owner],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const DOC: &str = "2024_03_DDT_0001_0050.pdf";

    #[test]
    fn test_acquire_is_exclusive() {
        let dir = tempdir().unwrap();
        let repo = LeaseRepository::new(&dir.path().join("waybill.db")).unwrap();

        assert!(repo.acquire(DOC, "run-a", Duration::minutes(30)).unwrap());
        assert!(!repo.acquire(DOC, "run-b", Duration::minutes(30)).unwrap());

        // Holder may renew its own lease
        assert!(repo.acquire(DOC, "run-a", Duration::minutes(30)).unwrap());
    }

    #[test]
    fn test_release_frees_the_document() {
        let dir = tempdir().unwrap();
        let repo = LeaseRepository::new(&dir.path().join("waybill.db")).unwrap();

        repo.acquire(DOC, "run-a", Duration::minutes(30)).unwrap();
        repo.release(DOC, "run-a").unwrap();
        assert!(repo.acquire(DOC, "run-b", Duration::minutes(30)).unwrap());
    }

    #[test]
    fn test_release_by_non_holder_is_a_noop() {
        let dir = tempdir().unwrap();
        let repo = LeaseRepository::new(&dir.path().join("waybill.db")).unwrap();

        repo.acquire(DOC, "run-a", Duration::minutes(30)).unwrap();
        repo.release(DOC, "run-b").unwrap();
        assert!(!repo.acquire(DOC, "run-b", Duration::minutes(30)).unwrap());
    }

    #[test]
    fn test_active_sources_excludes_expired() {
        let dir = tempdir().unwrap();
        let repo = LeaseRepository::new(&dir.path().join("waybill.db")).unwrap();

        repo.acquire(DOC, "run-a", Duration::minutes(30)).unwrap();
        repo.acquire("2024_04_DDT_0051_0100.pdf", "crashed", Duration::minutes(-1))
            .unwrap();

        assert_eq!(repo.active_sources().unwrap(), vec![DOC.to_string()]);
    }

    #[test]
    fn test_expired_lease_is_reclaimed() {
        let dir = tempdir().unwrap();
        let repo = LeaseRepository::new(&dir.path().join("waybill.db")).unwrap();

        // A crashed run left a lease that has already expired
        assert!(repo.acquire(DOC, "crashed", Duration::minutes(-1)).unwrap());
        assert!(repo.acquire(DOC, "run-b", Duration::minutes(30)).unwrap());
    }
}
