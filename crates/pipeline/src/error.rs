//! The match pipeline's error taxonomy.
//!
//! Every failure mode a run can hit is a distinct variant, so the
//! retry harness can decide retryability mechanically and tests can
//! assert on precise outcomes instead of string matching.

use cardex_core::retry::Retryable;
use cardex_core::types::DbId;
use cardex_vision::VisionError;

use crate::storage::StorageError;

/// Errors that can end a match pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    /// Image bytes could not be fetched from storage.
    #[error("Image download failed: {0}")]
    Download(#[from] StorageError),

    /// A vision stage (extraction or disambiguation) failed.
    #[error("Vision stage failed: {0}")]
    Vision(#[from] VisionError),

    /// Extraction succeeded but no catalog entry plausibly matches.
    /// Terminal: rerunning the same image extracts the same fields.
    #[error(
        "No candidates found for extracted metadata: \
         name={name:?}, year={year}, local_id={local_id:?}"
    )]
    NoCandidates {
        name: String,
        year: i32,
        local_id: String,
    },

    /// Disambiguation returned an id outside the candidate set. Never
    /// coerced to a near match: a wrong auto-match corrupts the user's
    /// collection, an explicit failure can be retried.
    #[error(
        "Disambiguation returned id {returned} which is not among the \
         candidate ids: {candidate_ids:?}"
    )]
    Hallucination {
        returned: DbId,
        candidate_ids: Vec<DbId>,
    },

    /// The run was cancelled before the final commit.
    #[error("Match pipeline run cancelled")]
    Cancelled,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Retryable for MatchError {
    fn is_transient(&self) -> bool {
        match self {
            MatchError::Download(e) => e.is_transient(),
            MatchError::Vision(e) => e.is_transient(),
            MatchError::Database(e) => {
                matches!(e, sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut)
            }
            MatchError::NoCandidates { .. }
            | MatchError::Hallucination { .. }
            | MatchError::Cancelled => false,
        }
    }
}
