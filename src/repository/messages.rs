//! Diagnostic message store.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, Row};

use super::{connect, Result};
use crate::models::{Message, MessageKind};

/// SQLite-backed message repository.
pub struct MessageRepository {
    db_path: PathBuf,
}

impl MessageRepository {
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
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                text TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 1
            );
        "#,
        )?;
        Ok(())
    }

    /// Insert an active message, returning its id.
    pub fn insert(&self, kind: MessageKind, text: &str) -> Result<i64> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO messages (kind, text, active) VALUES (?1, ?2, 1)",
            params![kind.as_str(), text],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Deactivate a message. Returns false when it was already inactive.
    pub fn deactivate(&self, id: i64) -> Result<bool> {
        let conn = self.connect()?;
        let affected = conn.execute(
            "UPDATE messages SET active = 0 WHERE id = ?1 AND active = 1",
            params![id],
        )?;
        Ok(affected == 1)
    }

    /// All active messages, oldest first.
    pub fn active(&self) -> Result<Vec<Message>> {
        self.select("SELECT * FROM messages WHERE active = 1 ORDER BY id")
    }

    /// Every message, active or not.
    pub fn all(&self) -> Result<Vec<Message>> {
        self.select("SELECT * FROM messages ORDER BY id")
    }

    fn select(&self, sql: &str) -> Result<Vec<Message>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(sql)?;
        let messages = stmt
            .query_map([], row_to_message)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(messages)
    }

    /// Record numbers covered by an active GAP message for a year.
    pub fn active_gap_numbers(&self, year: i32) -> Result<HashSet<i64>> {
        let numbers = self
            .active_gaps()?
            .into_iter()
            .filter(|(_, key)| key.1 == year)
            .map(|(_, key)| key.0)
            .collect();
        Ok(numbers)
    }

    /// Deactivate the active GAP message for (number, year), if any.
    ///
    /// Returns true when a gap was filled.
    pub fn deactivate_gap(&self, number: i64, year: i32) -> Result<bool> {
        for (message, key) in self.active_gaps()? {
            if key == (number, year) {
                return self.deactivate(message.id);
            }
        }
        Ok(false)
    }

    fn active_gaps(&self) -> Result<Vec<(Message, (i64, i32))>> {
        let conn = self.connect()?;
        let mut stmt =
            conn.prepare("SELECT * FROM messages WHERE active = 1 AND kind = 'GAP' ORDER BY id")?;
        let gaps = stmt
            .query_map([], row_to_message)?
            .collect::<std::result::Result<Vec<_>, _>>()?
            .into_iter()
            .filter_map(|m| Message::parse_gap_text(&m.text).map(|key| (m, key)))
            .collect();
        Ok(gaps)
    }

    pub fn count_active(&self) -> Result<i64> {
        let conn = self.connect()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE active = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn row_to_message(row: &Row) -> rusqlite::Result<Message> {
    let kind: String = row.get("kind")?;
    Ok(Message {
        id: row.get("id")?,
        kind: MessageKind::from_str(&kind).unwrap_or(MessageKind::Warning),
        text: row.get("text")?,
        active: row.get::<_, i64>("active")? != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_insert_and_deactivate() {
        let dir = tempdir().unwrap();
        let repo = MessageRepository::new(&dir.path().join("waybill.db")).unwrap();

        let id = repo
            .insert(MessageKind::Discard, "discarding page 2 of a.pdf")
            .unwrap();
        assert_eq!(repo.active().unwrap().len(), 1);

        assert!(repo.deactivate(id).unwrap());
        assert!(!repo.deactivate(id).unwrap());
        assert!(repo.active().unwrap().is_empty());
        assert_eq!(repo.all().unwrap().len(), 1);
    }

    #[test]
    fn test_active_gap_numbers_by_year() {
        let dir = tempdir().unwrap();
        let repo = MessageRepository::new(&dir.path().join("waybill.db")).unwrap();

        repo.insert(MessageKind::Gap, &Message::gap_text(3, 2024))
            .unwrap();
        repo.insert(MessageKind::Gap, &Message::gap_text(8, 2024))
            .unwrap();
        repo.insert(MessageKind::Gap, &Message::gap_text(3, 2023))
            .unwrap();
        // Non-gap messages never contribute numbers
        repo.insert(MessageKind::Warning, "unresolved plate 'AA111AA'")
            .unwrap();

        let numbers = repo.active_gap_numbers(2024).unwrap();
        assert_eq!(numbers, HashSet::from([3, 8]));
    }

    #[test]
    fn test_deactivate_gap_is_keyed() {
        let dir = tempdir().unwrap();
        let repo = MessageRepository::new(&dir.path().join("waybill.db")).unwrap();

        repo.insert(MessageKind::Gap, &Message::gap_text(3, 2024))
            .unwrap();
        repo.insert(MessageKind::Gap, &Message::gap_text(3, 2023))
            .unwrap();

        assert!(repo.deactivate_gap(3, 2024).unwrap());
        assert!(!repo.deactivate_gap(3, 2024).unwrap());
        // The other year's gap is untouched
        assert_eq!(repo.active_gap_numbers(2023).unwrap(), HashSet::from([3]));
    }
}
