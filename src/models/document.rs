//! Source document naming and processing state.
//!
//! Watched documents follow a fixed convention,
//! `<year>_<month>_<kind>_<range>.pdf`, e.g. `2024_03_DDT_0001_0050.pdf`.
//! Quarantine exports append a page marker (`_P003`); re-splitting an
//! artifact appends another. Canonicalization strips every marker to
//! recover the original document identity for reconciliation.

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static CANDIDATE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}_\d{2}_[A-Z0-9]+_\d{4}_\d{4}(?:_P\d{3,})*\.pdf$").unwrap()
});

static ARTIFACT_MARKERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:_P\d{3,})+\.pdf$").unwrap());

/// Processing state of a source document. Raw documents sit in the
/// watched directory; in-progress means a live lease is held on one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentState {
    Raw,
    InProgress,
    Recorded,
    Failed,
}

impl DocumentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::InProgress => "in_progress",
            Self::Recorded => "recorded",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "raw" => Some(Self::Raw),
            "in_progress" => Some(Self::InProgress),
            "recorded" => Some(Self::Recorded),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A document somewhere in the vault's directory tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub name: String,
    pub path: PathBuf,
    /// Page count; zero when the document could not be opened.
    pub pages: usize,
    pub state: DocumentState,
}

/// Whether a file name matches the watched naming convention,
/// artifact re-submissions included.
pub fn is_candidate_name(name: &str) -> bool {
    CANDIDATE_NAME.is_match(name)
}

/// Whether a name carries at least one artifact page marker.
pub fn is_artifact_name(name: &str) -> bool {
    ARTIFACT_MARKERS.is_match(name)
}

/// Strip every artifact marker, recovering the original document name.
pub fn canonical_name(name: &str) -> String {
    ARTIFACT_MARKERS.replace(name, ".pdf").into_owned()
}

/// Deterministic artifact name for one exported page.
pub fn artifact_name(source: &str, page: i64) -> String {
    let stem = source.strip_suffix(".pdf").unwrap_or(source);
    format!("{stem}_P{page:03}.pdf")
}
