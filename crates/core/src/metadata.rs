//! Normalization of card fields extracted from a photo.
//!
//! The vision model is told to return unknown fields as empty string /
//! zero rather than omitting them, so downstream code can treat
//! "unknown" uniformly without optionals.

use serde::{Deserialize, Serialize};

/// Structured identifying fields extracted from a card image.
///
/// Ephemeral: produced by the extraction stage, consumed by candidate
/// retrieval, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedMetadata {
    /// Card name as printed at the top of the card; empty if unreadable.
    pub name: String,
    /// Position within the set, e.g. `"4"` from a printed `"4/102"`;
    /// empty if unreadable.
    pub local_id: String,
    /// Release year from the card's copyright notice; `0` if unknown.
    pub year: i32,
}

impl ExtractedMetadata {
    /// Build normalized metadata from raw model output.
    pub fn new(name: impl Into<String>, raw_local_id: &str, year: i32) -> Self {
        Self {
            name: name.into().trim().to_string(),
            local_id: normalize_local_id(raw_local_id),
            year: year.max(0),
        }
    }
}

/// Reduce a printed card number to its local part.
///
/// Cards print their position as `"local/total"` (e.g. `"4/102"`), and
/// the model may return the full notation. Everything from the first
/// `/` on is dropped and the remainder trimmed.
pub fn normalize_local_id(raw: &str) -> String {
    raw.split('/').next().unwrap_or("").trim().to_string()
}

/// Derive a release year from a catalog feed release date (`YYYY-MM-DD`).
///
/// Returns `None` when the date is missing or does not start with a
/// plausible year.
pub fn year_from_release_date(release_date: &str) -> Option<i32> {
    let year: i32 = release_date.get(..4)?.parse().ok()?;
    (year > 0).then_some(year)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
