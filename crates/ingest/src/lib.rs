//! Catalog ingestion: pull sets and cards from the TCGdex feed and
//! upsert them into the reference catalog by natural key.

pub mod tcgdex;

use anyhow::Context;
use sqlx::PgPool;

use cardex_core::metadata::year_from_release_date;
use cardex_db::models::ref_card::UpsertRefCard;
use cardex_db::models::tcg_set::UpsertTcgSet;
use cardex_db::repositories::{RefCardRepo, TcgSetRepo};

use crate::tcgdex::TcgdexClient;

/// Ingest one set: upsert the set row, then bulk-upsert its cards.
///
/// Returns the number of card rows written. Re-running on the same
/// feed data updates rows in place.
pub async fn ingest_set(
    pool: &PgPool,
    client: &TcgdexClient,
    set_id: &str,
) -> anyhow::Result<u64> {
    let detail = client
        .get_set(set_id)
        .await
        .with_context(|| format!("fetching set '{set_id}' from the feed"))?;

    let year = detail
        .release_date
        .as_deref()
        .and_then(year_from_release_date);

    let set = TcgSetRepo::upsert(
        pool,
        &UpsertTcgSet {
            tcg_id: detail.id.clone(),
            name: detail.name.clone(),
            year,
        },
    )
    .await
    .with_context(|| format!("upserting set '{set_id}'"))?;

    let cards: Vec<UpsertRefCard> = detail
        .cards
        .iter()
        .map(|card| UpsertRefCard {
            tcg_id: card.id.clone(),
            set_id: set.id,
            local_id: card.local_id.clone(),
            name: card.name.clone(),
            image_url: card.image_url("high", "webp"),
        })
        .collect();

    let written = RefCardRepo::upsert_many(pool, &cards)
        .await
        .with_context(|| format!("upserting cards for set '{set_id}'"))?;

    tracing::debug!(set_id, cards = written, year = ?year, "Set ingested");
    Ok(written)
}
