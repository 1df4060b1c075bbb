//! Owned card entity models.
//!
//! An owned card is a user's scanned upload. It is created `pending`
//! and mutated exactly once per pipeline run: to `matched` with a
//! `ref_card_id`, or to `failed` with none.

use cardex_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::status::StatusId;

/// A row from the `cards` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Card {
    pub id: DbId,
    pub user_id: String,
    /// Object-store path of the uploaded image bytes.
    pub image_path: String,
    /// Set if and only if `matching_status` is `matched`.
    pub ref_card_id: Option<DbId>,
    pub matching_status: StatusId,
    /// When a dispatcher claimed this card for a pipeline run.
    pub claimed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a new owned card after an upload completes.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCard {
    pub user_id: String,
    pub image_path: String,
}
