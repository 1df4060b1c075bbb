//! The match pipeline orchestrator.
//!
//! One [`MatchPipeline::run`] call resolves one owned card:
//!
//! 1. download the image bytes,
//! 2. extract identifying metadata,
//! 3. retrieve fused catalog candidates,
//! 4. disambiguate with a second model pass,
//! 5. persist the verdict.
//!
//! Any error or cancellation along the way is caught at this boundary:
//! the card is unconditionally marked `failed` through a fresh pool
//! acquisition and the original error re-raised. A triggered card can
//! therefore never sit `pending` forever, even though the trigger is
//! fire-and-forget.

use std::sync::Arc;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use cardex_core::retry::{run_with_policy, RetryPolicy};
use cardex_core::types::DbId;
use cardex_db::models::ref_card::CandidateCard;
use cardex_db::repositories::CardRepo;
use cardex_vision::{extract_metadata, select_candidate, VisionModel};

use crate::candidates::find_match_candidates;
use crate::error::MatchError;
use crate::storage::ImageStore;

/// Successful pipeline verdict: the winner plus the full candidate
/// list it was chosen from.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub matched: CandidateCard,
    pub candidates: Vec<CandidateCard>,
}

/// Orchestrates match pipeline runs over injected collaborators.
///
/// Collaborators (pool, image store, vision model) arrive at
/// construction time so tests can substitute fakes at every seam.
pub struct MatchPipeline {
    pool: PgPool,
    store: Arc<dyn ImageStore>,
    model: Arc<dyn VisionModel>,
    policy: RetryPolicy,
}

impl MatchPipeline {
    pub fn new(pool: PgPool, store: Arc<dyn ImageStore>, model: Arc<dyn VisionModel>) -> Self {
        Self {
            pool,
            store,
            model,
            policy: RetryPolicy::default(),
        }
    }

    /// Override the per-stage retry policy.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run the pipeline for one owned card.
    ///
    /// On any error the card is marked `failed` before the error is
    /// returned; on success it is `matched` with the winner's id. If
    /// `cancel` fires before the final commit the run counts as
    /// failed, identically to an error.
    pub async fn run(
        &self,
        card_id: DbId,
        image_path: &str,
        cancel: &CancellationToken,
    ) -> Result<MatchOutcome, MatchError> {
        let staged = tokio::select! {
            _ = cancel.cancelled() => Err(MatchError::Cancelled),
            result = self.run_stages(image_path, cancel) => result,
        };

        let committed = match staged {
            Ok(outcome) => self.commit(card_id, outcome).await,
            Err(e) => Err(e),
        };

        match committed {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                // The failed write runs outside the failed stage's
                // session so it cannot be poisoned by it.
                match CardRepo::mark_failed(&self.pool, card_id).await {
                    Ok(true) => {}
                    Ok(false) => {
                        tracing::warn!(card_id, "Card deleted mid-run; no failed status to write")
                    }
                    Err(write_err) => {
                        tracing::error!(
                            card_id,
                            error = %write_err,
                            "Could not record failed match status",
                        );
                    }
                }
                tracing::error!(card_id, error = %e, "Match pipeline failed");
                Err(e)
            }
        }
    }

    /// Step 5: persist the verdict. A card deleted by its owner while
    /// the run was in flight makes this a no-op, not an error.
    async fn commit(
        &self,
        card_id: DbId,
        outcome: MatchOutcome,
    ) -> Result<MatchOutcome, MatchError> {
        let updated = CardRepo::mark_matched(&self.pool, card_id, outcome.matched.id).await?;
        if updated {
            tracing::info!(
                card_id,
                ref_card_id = outcome.matched.id,
                ref_card_name = %outcome.matched.name,
                "Card matched",
            );
        } else {
            tracing::warn!(card_id, "Card deleted mid-run; dropping match verdict");
        }
        Ok(outcome)
    }

    /// Steps 1-4: everything up to (but not including) the terminal
    /// status write.
    async fn run_stages(
        &self,
        image_path: &str,
        cancel: &CancellationToken,
    ) -> Result<MatchOutcome, MatchError> {
        let image = run_with_policy(&self.policy, cancel, || async {
            self.store
                .download(image_path)
                .await
                .map_err(MatchError::from)
        })
        .await?;

        let metadata = run_with_policy(&self.policy, cancel, || async {
            extract_metadata(&*self.model, &image)
                .await
                .map_err(MatchError::from)
        })
        .await?;

        let candidates = run_with_policy(&self.policy, cancel, || async {
            find_match_candidates(&self.pool, &metadata)
                .await
                .map_err(MatchError::from)
        })
        .await?;

        if candidates.is_empty() {
            return Err(MatchError::NoCandidates {
                name: metadata.name,
                year: metadata.year,
                local_id: metadata.local_id,
            });
        }

        let picked = run_with_policy(&self.policy, cancel, || async {
            select_candidate(&*self.model, &image, &candidates)
                .await
                .map_err(MatchError::from)
        })
        .await?;

        let matched = candidates
            .iter()
            .find(|candidate| candidate.id == picked)
            .cloned()
            .ok_or_else(|| MatchError::Hallucination {
                returned: picked,
                candidate_ids: candidates.iter().map(|c| c.id).collect(),
            })?;

        Ok(MatchOutcome {
            matched,
            candidates,
        })
    }
}
