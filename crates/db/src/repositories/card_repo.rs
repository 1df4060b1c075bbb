//! Repository for user-owned scanned cards.
//!
//! The match pipeline's terminal writes (`mark_matched`, `mark_failed`)
//! are targeted update-by-id statements that report whether a row was
//! touched: an owner may delete a card while a run is in flight, and
//! the two writers must stay independent. No status transition ever
//! blocks on the other writer.

use sqlx::PgPool;

use cardex_core::types::DbId;

use crate::models::card::{Card, CreateCard};
use crate::models::status::MatchingStatus;

/// Column list for `cards` queries.
const COLUMNS: &str = "\
    id, user_id, image_path, ref_card_id, matching_status, claimed_at, \
    created_at, updated_at";

/// Claims older than this are considered abandoned (worker died
/// mid-run) and become claimable again.
const STALE_CLAIM_MINUTES: i32 = 15;

/// Provides CRUD and match-state operations for owned cards.
pub struct CardRepo;

impl CardRepo {
    /// Create a new owned card in the `pending` state.
    pub async fn create(pool: &PgPool, input: &CreateCard) -> Result<Card, sqlx::Error> {
        let sql = format!(
            "INSERT INTO cards (user_id, image_path, matching_status) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Card>(&sql)
            .bind(&input.user_id)
            .bind(&input.image_path)
            .bind(MatchingStatus::Pending.id())
            .fetch_one(pool)
            .await
    }

    /// Find an owned card by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Card>, sqlx::Error> {
        let sql = format!("SELECT {COLUMNS} FROM cards WHERE id = $1");
        sqlx::query_as::<_, Card>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List a user's cards, newest first.
    pub async fn list_by_user(pool: &PgPool, user_id: &str) -> Result<Vec<Card>, sqlx::Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM cards WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, Card>(&sql)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Delete an owned card. Returns `true` if a row was deleted.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM cards WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // -----------------------------------------------------------------------
    // Dispatcher queue
    // -----------------------------------------------------------------------

    /// Atomically claim the next pending card for a pipeline run.
    ///
    /// Uses `SELECT FOR UPDATE SKIP LOCKED` so concurrent dispatchers
    /// never claim the same card. Claims abandoned for longer than
    /// [`STALE_CLAIM_MINUTES`] become claimable again, which keeps
    /// at-least-once delivery intact across worker crashes.
    pub async fn claim_next_pending(pool: &PgPool) -> Result<Option<Card>, sqlx::Error> {
        let sql = format!(
            "UPDATE cards \
             SET claimed_at = NOW(), updated_at = NOW() \
             WHERE id = ( \
                 SELECT id FROM cards \
                 WHERE matching_status = $1 \
                   AND (claimed_at IS NULL \
                        OR claimed_at < NOW() - ($2 * INTERVAL '1 minute')) \
                 ORDER BY created_at ASC, id ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Card>(&sql)
            .bind(MatchingStatus::Pending.id())
            .bind(STALE_CLAIM_MINUTES)
            .fetch_optional(pool)
            .await
    }

    /// Reset a card to `pending` so the dispatcher will re-run it.
    ///
    /// Safe on terminal cards: a rerun simply overwrites the verdict.
    pub async fn requeue(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE cards \
             SET matching_status = $2, ref_card_id = NULL, claimed_at = NULL, \
                 updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(MatchingStatus::Pending.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // -----------------------------------------------------------------------
    // Terminal writes
    // -----------------------------------------------------------------------

    /// Record a successful match. Returns `false` if the card no longer
    /// exists (owner deleted it mid-run), which callers treat as a
    /// harmless no-op.
    pub async fn mark_matched(
        pool: &PgPool,
        id: DbId,
        ref_card_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE cards \
             SET ref_card_id = $2, matching_status = $3, claimed_at = NULL, \
                 updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(ref_card_id)
        .bind(MatchingStatus::Matched.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record a failed match, clearing any partial linkage. Returns
    /// `false` if the card no longer exists.
    pub async fn mark_failed(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE cards \
             SET ref_card_id = NULL, matching_status = $2, claimed_at = NULL, \
                 updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(MatchingStatus::Failed.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
