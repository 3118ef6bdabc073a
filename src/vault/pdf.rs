//! Filesystem/PDF vault implementation.
//!
//! Documents live in a watched directory; finished documents move to a
//! recorded directory, unreadable ones to a failed directory, and
//! quarantine artifacts land in their own directory as standalone
//! one-page PDFs built by whitelist-splitting the source document.

use std::fs;
use std::path::{Path, PathBuf};

use lopdf::Document;

use super::{Result, Vault, VaultError};
use crate::models::{artifact_name, is_candidate_name, DocumentState, SourceDocument};

/// PDF documents in a watched directory tree.
pub struct PdfVault {
    watched_dir: PathBuf,
    quarantine_dir: PathBuf,
    recorded_dir: PathBuf,
    failed_dir: PathBuf,
}

impl PdfVault {
    /// Open the vault, creating its directories as needed.
    pub fn new(
        watched_dir: &Path,
        quarantine_dir: &Path,
        recorded_dir: &Path,
        failed_dir: &Path,
    ) -> Result<Self> {
        for dir in [watched_dir, quarantine_dir, recorded_dir, failed_dir] {
            fs::create_dir_all(dir)?;
        }
        Ok(Self {
            watched_dir: watched_dir.to_path_buf(),
            quarantine_dir: quarantine_dir.to_path_buf(),
            recorded_dir: recorded_dir.to_path_buf(),
            failed_dir: failed_dir.to_path_buf(),
        })
    }

    fn document_path(&self, name: &str) -> Result<PathBuf> {
        let path = self.watched_dir.join(name);
        if !path.is_file() {
            return Err(VaultError::UnknownDocument(name.to_string()));
        }
        Ok(path)
    }

    fn load_bytes(&self, name: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.document_path(name)?)?)
    }

    /// Inventory of every document across the vault's directories.
    ///
    /// Watched documents are raw unless their name appears in
    /// `in_progress`, which the caller derives from live leases.
    pub fn documents(&self, in_progress: &[String]) -> Result<Vec<SourceDocument>> {
        let mut documents = Vec::new();
        for (dir, state) in [
            (&self.watched_dir, DocumentState::Raw),
            (&self.recorded_dir, DocumentState::Recorded),
            (&self.failed_dir, DocumentState::Failed),
        ] {
            for entry in fs::read_dir(dir)? {
                let entry = entry?;
                let name = entry.file_name().to_string_lossy().into_owned();
                if !entry.file_type()?.is_file() || !is_candidate_name(&name) {
                    continue;
                }
                let state = if state == DocumentState::Raw && in_progress.contains(&name) {
                    DocumentState::InProgress
                } else {
                    state
                };
                documents.push(SourceDocument {
                    path: entry.path(),
                    pages: page_count(&entry.path()),
                    name,
                    state,
                });
            }
        }
        documents.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        Ok(documents)
    }
}

/// Page count of a PDF on disk; zero when it cannot be opened.
fn page_count(path: &Path) -> usize {
    Document::load(path).map_or(0, |doc| doc.get_pages().len())
}

impl Vault for PdfVault {
    fn candidates(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.watched_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type()?.is_file() && is_candidate_name(&name) {
                names.push(name);
            }
        }
        names.sort_unstable();
        Ok(names)
    }

    fn page_texts(&self, name: &str) -> Result<Vec<String>> {
        let bytes = self.load_bytes(name)?;
        let page_count = Document::load_mem(&bytes)
            .map_err(|e| pdf_error(name, e))?
            .get_pages()
            .len() as i64;

        // Extract page by page so one malformed page cannot take the
        // rest of the document down with it.
        let mut texts = Vec::with_capacity(page_count as usize);
        for page in 1..=page_count {
            let single = split_page(&bytes, page).map_err(|e| pdf_error(name, e))?;
            let text = pdf_extract::extract_text_from_mem(&single)
                .map_err(|e| pdf_error(name, e))?;
            texts.push(text);
        }
        Ok(texts)
    }

    fn export_page(&self, name: &str, page: i64) -> Result<String> {
        let bytes = self.load_bytes(name)?;
        let single = split_page(&bytes, page).map_err(|e| pdf_error(name, e))?;

        let artifact = artifact_name(name, page);
        fs::write(self.quarantine_dir.join(&artifact), single)?;
        Ok(artifact)
    }

    fn mark_recorded(&self, name: &str) -> Result<()> {
        fs::rename(self.document_path(name)?, self.recorded_dir.join(name))?;
        Ok(())
    }

    fn mark_failed(&self, name: &str) -> Result<()> {
        fs::rename(self.document_path(name)?, self.failed_dir.join(name))?;
        Ok(())
    }
}

fn pdf_error(name: &str, detail: impl std::fmt::Display) -> VaultError {
    VaultError::Pdf {
        name: name.to_string(),
        detail: detail.to_string(),
    }
}

/// Build a one-page PDF by deleting every other page and pruning the
/// orphaned objects.
fn split_page(bytes: &[u8], page: i64) -> std::result::Result<Vec<u8>, String> {
    let doc = Document::load_mem(bytes).map_err(|e| e.to_string())?;
    let page_count = doc.get_pages().len() as i64;
    if page < 1 || page > page_count {
        return Err(format!(
            "page {page} out of range (document has {page_count} pages)"
        ));
    }

    let mut single = doc.clone();
    // Delete in reverse so page numbers stay stable while deleting
    let mut others: Vec<u32> = (1..=page_count as u32)
        .filter(|p| *p as i64 != page)
        .collect();
    others.reverse();
    for p in others {
        single.delete_pages(&[p]);
    }
    single.prune_objects();
    single.compress();

    let mut buffer = Vec::new();
    single.save_to(&mut buffer).map_err(|e| e.to_string())?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{content::Content, content::Operation, Dictionary, Object, Stream};
    use tempfile::tempdir;

    // Minimal multi-page PDF, enough structure for lopdf round trips
    fn build_test_pdf(num_pages: u32) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();

        let mut page_ids = Vec::new();
        for i in 0..num_pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new(
                        "Tj",
                        vec![Object::String(
                            format!("Page {}", i + 1).into_bytes(),
                            lopdf::StringFormat::Literal,
                        )],
                    ),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));

            let page = Dictionary::from_iter(vec![
                ("Type", Object::Name(b"Page".to_vec())),
                ("Parent", Object::Reference(pages_id)),
                (
                    "MediaBox",
                    Object::Array(vec![
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Integer(612),
                        Object::Integer(792),
                    ]),
                ),
                ("Contents", Object::Reference(content_id)),
            ]);
            page_ids.push(doc.add_object(page));
        }

        let pages = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            (
                "Kids",
                Object::Array(page_ids.iter().map(|id| Object::Reference(*id)).collect()),
            ),
            ("Count", Object::Integer(num_pages as i64)),
        ]);
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]);
        let catalog_id = doc.add_object(catalog);
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_split_page_keeps_exactly_one_page() {
        let bytes = build_test_pdf(3);
        let single = split_page(&bytes, 2).unwrap();
        let doc = Document::load_mem(&single).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_split_page_rejects_out_of_range() {
        let bytes = build_test_pdf(2);
        assert!(split_page(&bytes, 0).is_err());
        assert!(split_page(&bytes, 3).is_err());
    }

    #[test]
    fn test_candidates_filters_and_sorts() {
        let dir = tempdir().unwrap();
        let vault = PdfVault::new(
            &dir.path().join("watched"),
            &dir.path().join("quarantine"),
            &dir.path().join("recorded"),
            &dir.path().join("failed"),
        )
        .unwrap();

        let watched = dir.path().join("watched");
        fs::write(watched.join("2024_04_DDT_0051_0100.pdf"), b"x").unwrap();
        fs::write(watched.join("2024_03_DDT_0001_0050.pdf"), b"x").unwrap();
        fs::write(watched.join("notes.txt"), b"x").unwrap();
        fs::write(watched.join("scan_of_receipt.pdf"), b"x").unwrap();

        assert_eq!(
            vault.candidates().unwrap(),
            vec![
                "2024_03_DDT_0001_0050.pdf".to_string(),
                "2024_04_DDT_0051_0100.pdf".to_string(),
            ]
        );
    }

    #[test]
    fn test_export_page_writes_artifact() {
        let dir = tempdir().unwrap();
        let vault = PdfVault::new(
            &dir.path().join("watched"),
            &dir.path().join("quarantine"),
            &dir.path().join("recorded"),
            &dir.path().join("failed"),
        )
        .unwrap();

        let name = "2024_03_DDT_0001_0050.pdf";
        fs::write(dir.path().join("watched").join(name), build_test_pdf(3)).unwrap();

        let artifact = vault.export_page(name, 3).unwrap();
        assert_eq!(artifact, "2024_03_DDT_0001_0050_P003.pdf");

        let exported = dir.path().join("quarantine").join(&artifact);
        let doc = Document::load_mem(&fs::read(exported).unwrap()).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_documents_inventory_spans_states() {
        let dir = tempdir().unwrap();
        let vault = PdfVault::new(
            &dir.path().join("watched"),
            &dir.path().join("quarantine"),
            &dir.path().join("recorded"),
            &dir.path().join("failed"),
        )
        .unwrap();

        let raw = "2024_03_DDT_0001_0050.pdf";
        let leased = "2024_04_DDT_0051_0100.pdf";
        let done = "2024_05_DDT_0101_0150.pdf";
        fs::write(dir.path().join("watched").join(raw), build_test_pdf(2)).unwrap();
        fs::write(dir.path().join("watched").join(leased), build_test_pdf(1)).unwrap();
        fs::write(dir.path().join("recorded").join(done), b"not a pdf").unwrap();

        let documents = vault.documents(&[leased.to_string()]).unwrap();
        assert_eq!(documents.len(), 3);
        assert_eq!(documents[0].name, raw);
        assert_eq!(documents[0].state, DocumentState::Raw);
        assert_eq!(documents[0].pages, 2);
        assert_eq!(documents[1].state, DocumentState::InProgress);
        assert_eq!(documents[2].state, DocumentState::Recorded);
        // Unreadable files still show up, with a zero page count
        assert_eq!(documents[2].pages, 0);
    }

    #[test]
    fn test_mark_recorded_moves_the_file() {
        let dir = tempdir().unwrap();
        let vault = PdfVault::new(
            &dir.path().join("watched"),
            &dir.path().join("quarantine"),
            &dir.path().join("recorded"),
            &dir.path().join("failed"),
        )
        .unwrap();

        let name = "2024_03_DDT_0001_0050.pdf";
        fs::write(dir.path().join("watched").join(name), b"x").unwrap();

        vault.mark_recorded(name).unwrap();
        assert!(!dir.path().join("watched").join(name).exists());
        assert!(dir.path().join("recorded").join(name).exists());
        assert!(vault.candidates().unwrap().is_empty());
    }
}
