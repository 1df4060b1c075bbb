//! Repository for the `tcg_sets` table.

use sqlx::PgPool;

use crate::models::tcg_set::{TcgSet, UpsertTcgSet};

/// Column list for `tcg_sets` queries.
const COLUMNS: &str = "id, tcg_id, name, year, created_at, updated_at";

/// Provides catalog operations for sets.
pub struct TcgSetRepo;

impl TcgSetRepo {
    /// Upsert a set by natural key, returning the stored row.
    ///
    /// Ingestion calls this before upserting the set's cards so the
    /// foreign key target always exists.
    pub async fn upsert(pool: &PgPool, input: &UpsertTcgSet) -> Result<TcgSet, sqlx::Error> {
        let sql = format!(
            "INSERT INTO tcg_sets (tcg_id, name, year) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (tcg_id) DO UPDATE SET \
                 name = EXCLUDED.name, \
                 year = EXCLUDED.year, \
                 updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TcgSet>(&sql)
            .bind(&input.tcg_id)
            .bind(&input.name)
            .bind(input.year)
            .fetch_one(pool)
            .await
    }

    /// Find a set by its external catalog identifier.
    pub async fn find_by_tcg_id(
        pool: &PgPool,
        tcg_id: &str,
    ) -> Result<Option<TcgSet>, sqlx::Error> {
        let sql = format!("SELECT {COLUMNS} FROM tcg_sets WHERE tcg_id = $1");
        sqlx::query_as::<_, TcgSet>(&sql)
            .bind(tcg_id)
            .fetch_optional(pool)
            .await
    }
}
