//! Diagnostic messages recorded for every anomaly.
//!
//! Messages stay active until the underlying condition is resolved: a
//! GAP message is deactivated when the missing number is recorded, a
//! DISCARD message when its quarantined page is reconciled.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Kind of diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageKind {
    /// A page was quarantined.
    Discard,
    /// A record number is missing from a year's sequence.
    Gap,
    /// An anomaly that did not quarantine anything, e.g. an
    /// unresolvable vehicle plate.
    Warning,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discard => "DISCARD",
            Self::Gap => "GAP",
            Self::Warning => "WARNING",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "DISCARD" => Some(Self::Discard),
            "GAP" => Some(Self::Gap),
            "WARNING" => Some(Self::Warning),
            _ => None,
        }
    }
}

/// A stored diagnostic message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub kind: MessageKind,
    pub text: String,
    pub active: bool,
}

static GAP_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^record (\d+)/(\d{4}) missing").unwrap());

impl Message {
    /// Canonical text for a GAP message.
    ///
    /// The messages table carries no structured key, so the
    /// (number, year) pair is embedded here and recovered by
    /// [`Message::parse_gap_text`]; the two must stay in sync.
    pub fn gap_text(number: i64, year: i32) -> String {
        format!("record {number}/{year} missing from recorded sequence")
    }

    /// Recover the (number, year) key from a GAP message text.
    pub fn parse_gap_text(text: &str) -> Option<(i64, i32)> {
        let caps = GAP_TEXT.captures(text)?;
        let number = caps.get(1)?.as_str().parse().ok()?;
        let year = caps.get(2)?.as_str().parse().ok()?;
        Some((number, year))
    }
}
