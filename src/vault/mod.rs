//! Document storage collaborator.
//!
//! The engine only ever talks to documents through the [`Vault`]
//! trait: enumeration of candidates in the watched directory, page
//! text access, single-page artifact export, and terminal state
//! marking. [`PdfVault`] is the filesystem/PDF implementation;
//! [`MemoryVault`] backs the test suites.

pub mod pdf;

use std::cell::RefCell;
use std::collections::BTreeMap;

use thiserror::Error;

pub use pdf::PdfVault;

use crate::models::artifact_name;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("pdf error in {name}: {detail}")]
    Pdf { name: String, detail: String },
    #[error("unknown document: {0}")]
    UnknownDocument(String),
    #[error("no page {page} in {name}")]
    NoSuchPage { name: String, page: i64 },
}

pub type Result<T> = std::result::Result<T, VaultError>;

/// Access to source documents and quarantine artifacts.
pub trait Vault {
    /// Names of documents ready for processing, in stable order.
    fn candidates(&self) -> Result<Vec<String>>;

    /// Text of every page of a document, in page order.
    fn page_texts(&self, name: &str) -> Result<Vec<String>>;

    /// Export one page as a standalone artifact; returns the artifact
    /// name.
    fn export_page(&self, name: &str, page: i64) -> Result<String>;

    /// Move a fully processed document to its recorded state.
    fn mark_recorded(&self, name: &str) -> Result<()>;

    /// Move an unreadable document to its failed state.
    fn mark_failed(&self, name: &str) -> Result<()>;
}

/// In-memory vault for tests: documents are named lists of page texts.
///
/// Single-threaded by design, like the engine itself; interior
/// mutability keeps the trait's `&self` surface.
#[derive(Debug, Default)]
pub struct MemoryVault {
    docs: BTreeMap<String, Vec<String>>,
    exported: RefCell<Vec<String>>,
    recorded: RefCell<Vec<String>>,
    failed: RefCell<Vec<String>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document with the given page texts.
    pub fn add_document(&mut self, name: &str, pages: Vec<String>) {
        self.docs.insert(name.to_string(), pages);
    }

    /// Artifact names exported so far.
    pub fn exported(&self) -> Vec<String> {
        self.exported.borrow().clone()
    }

    pub fn recorded(&self) -> Vec<String> {
        self.recorded.borrow().clone()
    }

    pub fn failed(&self) -> Vec<String> {
        self.failed.borrow().clone()
    }
}

impl Vault for MemoryVault {
    fn candidates(&self) -> Result<Vec<String>> {
        Ok(self.docs.keys().cloned().collect())
    }

    fn page_texts(&self, name: &str) -> Result<Vec<String>> {
        self.docs
            .get(name)
            .cloned()
            .ok_or_else(|| VaultError::UnknownDocument(name.to_string()))
    }

    fn export_page(&self, name: &str, page: i64) -> Result<String> {
        let pages = self
            .docs
            .get(name)
            .ok_or_else(|| VaultError::UnknownDocument(name.to_string()))?;
        if page < 1 || page as usize > pages.len() {
            return Err(VaultError::NoSuchPage {
                name: name.to_string(),
                page,
            });
        }
        let artifact = artifact_name(name, page);
        self.exported.borrow_mut().push(artifact.clone());
        Ok(artifact)
    }

    fn mark_recorded(&self, name: &str) -> Result<()> {
        self.recorded.borrow_mut().push(name.to_string());
        Ok(())
    }

    fn mark_failed(&self, name: &str) -> Result<()> {
        self.failed.borrow_mut().push(name.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_vault_tracks_exports() {
        let mut vault = MemoryVault::new();
        vault.add_document(
            "2024_03_DDT_0001_0050.pdf",
            vec!["page one".to_string(), "page two".to_string()],
        );

        assert_eq!(vault.candidates().unwrap().len(), 1);
        assert_eq!(
            vault.page_texts("2024_03_DDT_0001_0050.pdf").unwrap().len(),
            2
        );

        let artifact = vault.export_page("2024_03_DDT_0001_0050.pdf", 2).unwrap();
        assert_eq!(artifact, "2024_03_DDT_0001_0050_P002.pdf");
        assert_eq!(vault.exported(), vec![artifact]);

        assert!(vault.export_page("2024_03_DDT_0001_0050.pdf", 3).is_err());
        assert!(vault.page_texts("missing.pdf").is_err());
    }
}
