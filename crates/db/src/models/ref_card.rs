//! Reference card entity models.
//!
//! Reference cards are the canonical catalog entries the match
//! pipeline resolves scanned cards against. They are written only by
//! bulk ingestion (upsert by `tcg_id`) and are otherwise immutable.

use cardex_core::rrf::HasId;
use cardex_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `ref_cards` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RefCard {
    pub id: DbId,
    /// External catalog identifier, globally unique; the upsert
    /// conflict key.
    pub tcg_id: String,
    pub set_id: DbId,
    /// Position within the set as printed on the card, e.g. `"4"`.
    pub local_id: String,
    pub name: String,
    pub image_url: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for bulk-upserting reference cards during ingestion.
#[derive(Debug, Clone, Deserialize)]
pub struct UpsertRefCard {
    pub tcg_id: String,
    pub set_id: DbId,
    pub local_id: String,
    pub name: String,
    pub image_url: Option<String>,
}

/// A reference card joined with its set, as produced by the candidate
/// search queries and shown to the disambiguation stage.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CandidateCard {
    pub id: DbId,
    pub tcg_id: String,
    pub local_id: String,
    pub name: String,
    pub image_url: Option<String>,
    pub set_tcg_id: String,
    pub set_name: String,
    pub set_year: Option<i32>,
}

impl HasId for CandidateCard {
    fn id(&self) -> DbId {
        self.id
    }
}
