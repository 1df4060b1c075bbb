//! Set entity models.
//!
//! A set is the printed collection a reference card belongs to. Rows
//! are upserted by natural key (`tcg_id`) during catalog ingestion,
//! always before the cards that reference them.

use cardex_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `tcg_sets` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TcgSet {
    pub id: DbId,
    /// External catalog identifier, globally unique.
    pub tcg_id: String,
    pub name: String,
    /// Release year derived from the feed's release date; `None` when
    /// the feed does not carry one.
    pub year: Option<i32>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for upserting a set by natural key.
#[derive(Debug, Clone, Deserialize)]
pub struct UpsertTcgSet {
    pub tcg_id: String,
    pub name: String,
    pub year: Option<i32>,
}
