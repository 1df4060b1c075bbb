//! Repository for the reference-card catalog.
//!
//! Provides point lookup, the bulk natural-key upsert used by
//! ingestion, and the three pairwise fuzzy searches the match pipeline
//! fuses into its candidate list. Name matching uses `pg_trgm`
//! similarity backed by a GIN index.

use sqlx::{PgPool, Postgres, QueryBuilder};

use cardex_core::types::DbId;

use crate::models::ref_card::{CandidateCard, RefCard, UpsertRefCard};

/// Column list for `ref_cards` queries.
const COLUMNS: &str = "\
    id, tcg_id, set_id, local_id, name, image_url, created_at, updated_at";

/// Column list for candidate queries joining `ref_cards` to `tcg_sets`.
const CANDIDATE_COLUMNS: &str = "\
    r.id, r.tcg_id, r.local_id, r.name, r.image_url, \
    s.tcg_id AS set_tcg_id, s.name AS set_name, s.year AS set_year";

/// Minimum trigram similarity for a name to count as a fuzzy match.
pub const NAME_SIMILARITY_THRESHOLD: f32 = 0.3;

/// Default per-query result cap for the fuzzy name searches.
pub const DEFAULT_FUZZY_LIMIT: i64 = 20;

/// Provides catalog operations for reference cards.
pub struct RefCardRepo;

impl RefCardRepo {
    /// Find a reference card by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<RefCard>, sqlx::Error> {
        let sql = format!("SELECT {COLUMNS} FROM ref_cards WHERE id = $1");
        sqlx::query_as::<_, RefCard>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a reference card by its external catalog identifier.
    pub async fn find_by_tcg_id(
        pool: &PgPool,
        tcg_id: &str,
    ) -> Result<Option<RefCard>, sqlx::Error> {
        let sql = format!("SELECT {COLUMNS} FROM ref_cards WHERE tcg_id = $1");
        sqlx::query_as::<_, RefCard>(&sql)
            .bind(tcg_id)
            .fetch_optional(pool)
            .await
    }

    /// Total number of catalog rows.
    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM ref_cards")
            .fetch_one(pool)
            .await
    }

    // -----------------------------------------------------------------------
    // Bulk ingestion
    // -----------------------------------------------------------------------

    /// Bulk-upsert reference cards by natural key.
    ///
    /// Conflicts on `tcg_id` update the row in place, so re-ingesting a
    /// feed never duplicates cards. Returns the number of rows written.
    pub async fn upsert_many(
        pool: &PgPool,
        cards: &[UpsertRefCard],
    ) -> Result<u64, sqlx::Error> {
        if cards.is_empty() {
            return Ok(0);
        }

        let mut builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO ref_cards (tcg_id, set_id, local_id, name, image_url) ",
        );
        builder.push_values(cards, |mut row, card| {
            row.push_bind(&card.tcg_id)
                .push_bind(card.set_id)
                .push_bind(&card.local_id)
                .push_bind(&card.name)
                .push_bind(&card.image_url);
        });
        builder.push(
            " ON CONFLICT (tcg_id) DO UPDATE SET \
                 set_id = EXCLUDED.set_id, \
                 local_id = EXCLUDED.local_id, \
                 name = EXCLUDED.name, \
                 image_url = EXCLUDED.image_url, \
                 updated_at = NOW()",
        );

        let result = builder.build().execute(pool).await?;
        Ok(result.rows_affected())
    }

    // -----------------------------------------------------------------------
    // Candidate search
    // -----------------------------------------------------------------------

    /// Exact match on set year and printed local id.
    ///
    /// The most precise of the three candidate signals: both fields are
    /// short and rarely misread, so a hit here is weighted double
    /// during fusion.
    pub async fn search_by_year_and_local_id(
        pool: &PgPool,
        year: i32,
        local_id: &str,
    ) -> Result<Vec<CandidateCard>, sqlx::Error> {
        let sql = format!(
            "SELECT {CANDIDATE_COLUMNS} \
             FROM ref_cards r \
             JOIN tcg_sets s ON s.id = r.set_id \
             WHERE s.year = $1 AND r.local_id = $2 \
             ORDER BY r.id"
        );
        sqlx::query_as::<_, CandidateCard>(&sql)
            .bind(year)
            .bind(local_id)
            .fetch_all(pool)
            .await
    }

    /// Exact match on set year, fuzzy trigram match on name, ordered by
    /// similarity descending.
    pub async fn search_by_year_and_name(
        pool: &PgPool,
        year: i32,
        name: &str,
        limit: i64,
    ) -> Result<Vec<CandidateCard>, sqlx::Error> {
        let sql = format!(
            "SELECT {CANDIDATE_COLUMNS} \
             FROM ref_cards r \
             JOIN tcg_sets s ON s.id = r.set_id \
             WHERE s.year = $1 AND similarity(r.name, $2) > $3 \
             ORDER BY similarity(r.name, $2) DESC \
             LIMIT $4"
        );
        sqlx::query_as::<_, CandidateCard>(&sql)
            .bind(year)
            .bind(name)
            .bind(NAME_SIMILARITY_THRESHOLD)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Exact match on printed local id, fuzzy trigram match on name,
    /// ordered by similarity descending.
    pub async fn search_by_local_id_and_name(
        pool: &PgPool,
        local_id: &str,
        name: &str,
        limit: i64,
    ) -> Result<Vec<CandidateCard>, sqlx::Error> {
        let sql = format!(
            "SELECT {CANDIDATE_COLUMNS} \
             FROM ref_cards r \
             JOIN tcg_sets s ON s.id = r.set_id \
             WHERE r.local_id = $1 AND similarity(r.name, $2) > $3 \
             ORDER BY similarity(r.name, $2) DESC \
             LIMIT $4"
        );
        sqlx::query_as::<_, CandidateCard>(&sql)
            .bind(local_id)
            .bind(name)
            .bind(NAME_SIMILARITY_THRESHOLD)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
