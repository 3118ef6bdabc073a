//! Vehicle plate resolution against the configured registry.
//!
//! Extracted plate tokens come from a text layer and are occasionally
//! mangled by ligatures or glyph substitution. An exact registry hit is
//! returned unchanged; otherwise the token is scored against every
//! registry entry and corrected only when the best normalized ratio
//! clears the threshold. At or below the threshold nothing is ever
//! silently substituted.

use serde::{Deserialize, Serialize};

/// Minimum similarity ratio for a correction. Scores at or below this
/// keep the raw token and surface a warning instead.
pub const MATCH_THRESHOLD: f64 = 0.5;

/// Known vehicle plates, from configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlateRegistry {
    plates: Vec<String>,
}

/// Outcome of resolving one raw plate token.
#[derive(Debug, Clone, PartialEq)]
pub enum PlateResolution {
    /// Token matches a registry entry verbatim.
    Exact(String),
    /// Token corrected to the best-scoring registry entry.
    Corrected { plate: String, score: f64 },
    /// No entry scored above the threshold; token kept unchanged.
    Unresolved { best: Option<String>, score: f64 },
}

impl PlateRegistry {
    pub fn new(plates: impl IntoIterator<Item = String>) -> Self {
        Self {
            plates: plates.into_iter().map(|p| p.to_uppercase()).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.plates.is_empty()
    }

    /// Resolve a raw token against the registry.
    pub fn resolve(&self, token: &str) -> PlateResolution {
        let token = token.to_uppercase();
        if self.plates.iter().any(|p| *p == token) {
            return PlateResolution::Exact(token);
        }

        let mut best: Option<(&str, f64)> = None;
        for plate in &self.plates {
            let score = similarity_ratio(&token, plate);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((plate, score));
            }
        }

        match best {
            Some((plate, score)) if score > MATCH_THRESHOLD => PlateResolution::Corrected {
                plate: plate.to_string(),
                score,
            },
            Some((plate, score)) => PlateResolution::Unresolved {
                best: Some(plate.to_string()),
                score,
            },
            None => PlateResolution::Unresolved {
                best: None,
                score: 0.0,
            },
        }
    }
}

/// Normalized similarity ratio in 0.0..=1.0: edit distance over the
/// longer length, inverted so identical strings score 1.0.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let len = a.chars().count().max(b.chars().count());
    1.0 - edit_distance(a, b) as f64 / len as f64
}

/// Levenshtein distance over chars, single-row dynamic programming.
fn edit_distance(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b_chars.len()).collect();

    for (i, ca) in a.chars().enumerate() {
        let mut prev = row[0];
        row[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = if ca == *cb { prev } else { prev + 1 };
            prev = row[j + 1];
            row[j + 1] = cost.min(row[j] + 1).min(prev + 1);
        }
    }

    row[b_chars.len()]
}
