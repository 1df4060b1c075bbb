//! The card match pipeline.
//!
//! Orchestrates the end-to-end resolution of a scanned card against
//! the reference catalog: image download, metadata extraction,
//! candidate retrieval with rank fusion, disambiguation, and the final
//! status write. Whatever goes wrong, the owned card always leaves the
//! run in a terminal state.

pub mod candidates;
pub mod error;
pub mod match_card;
pub mod storage;

pub use candidates::find_match_candidates;
pub use error::MatchError;
pub use match_card::{MatchOutcome, MatchPipeline};
pub use storage::{ImageStore, LocalImageStore, S3ImageStore, StorageError};
