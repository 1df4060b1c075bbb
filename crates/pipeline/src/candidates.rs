//! Candidate retrieval: extracted metadata in, ranked catalog
//! candidates out.
//!
//! Three pairwise queries are issued against the catalog, each pairing
//! two of the three extracted signals, and their results are merged
//! with weighted reciprocal rank fusion. Any single misread field then
//! only weakens one or two lists instead of sinking the whole lookup.

use sqlx::PgPool;

use cardex_core::metadata::ExtractedMetadata;
use cardex_core::rrf::fuse_weighted;
use cardex_db::models::ref_card::CandidateCard;
use cardex_db::repositories::ref_card_repo::DEFAULT_FUZZY_LIMIT;
use cardex_db::repositories::RefCardRepo;

/// Maximum number of fused candidates handed to disambiguation.
pub const CANDIDATE_LIMIT: usize = 10;

/// Fusion weights for the three queries, in query order.
///
/// `year + local_id` counts double: both fields are exact matches on
/// short strings, whereas the other two queries each lean on fuzzy
/// name similarity, the signal most likely to be misread from a photo.
const FUSION_WEIGHTS: [f64; 3] = [2.0, 1.0, 1.0];

/// Retrieve up to [`CANDIDATE_LIMIT`] plausible reference cards for
/// the extracted metadata.
///
/// Queries whose required signals are unknown (`year == 0`, empty
/// `local_id` or `name`) are skipped rather than run degenerate; with
/// every signal unknown the result is simply empty, and the caller
/// decides what that means. The remaining queries are read-only and
/// independent, so they run concurrently on the pool.
pub async fn find_match_candidates(
    pool: &PgPool,
    metadata: &ExtractedMetadata,
) -> Result<Vec<CandidateCard>, sqlx::Error> {
    let has_year = metadata.year > 0;
    let has_local_id = !metadata.local_id.is_empty();
    let has_name = !metadata.name.is_empty();

    let (by_year_and_local_id, by_year_and_name, by_local_id_and_name) = tokio::join!(
        async {
            if has_year && has_local_id {
                RefCardRepo::search_by_year_and_local_id(pool, metadata.year, &metadata.local_id)
                    .await
            } else {
                Ok(Vec::new())
            }
        },
        async {
            if has_year && has_name {
                RefCardRepo::search_by_year_and_name(
                    pool,
                    metadata.year,
                    &metadata.name,
                    DEFAULT_FUZZY_LIMIT,
                )
                .await
            } else {
                Ok(Vec::new())
            }
        },
        async {
            if has_local_id && has_name {
                RefCardRepo::search_by_local_id_and_name(
                    pool,
                    &metadata.local_id,
                    &metadata.name,
                    DEFAULT_FUZZY_LIMIT,
                )
                .await
            } else {
                Ok(Vec::new())
            }
        },
    );

    let lists = vec![by_year_and_local_id?, by_year_and_name?, by_local_id_and_name?];
    let fused = fuse_weighted(lists, CANDIDATE_LIMIT, &FUSION_WEIGHTS);

    tracing::debug!(
        candidates = fused.len(),
        name = %metadata.name,
        year = metadata.year,
        local_id = %metadata.local_id,
        "Candidate retrieval complete",
    );
    Ok(fused)
}
