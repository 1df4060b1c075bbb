//! Match dispatcher.
//!
//! Polls the `cards` table for pending work and spawns one detached
//! pipeline run per claimed card, bounded by a concurrency semaphore.
//! Claiming uses `SELECT FOR UPDATE SKIP LOCKED`, so several worker
//! processes can poll the same database without double-dispatch.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use cardex_db::repositories::CardRepo;
use cardex_pipeline::MatchPipeline;

/// Background match dispatcher.
///
/// A single long-lived Tokio task that feeds the pipeline from the
/// pending-card queue.
pub struct MatchDispatcher {
    pool: PgPool,
    pipeline: Arc<MatchPipeline>,
    poll_interval: Duration,
    limiter: Arc<Semaphore>,
}

impl MatchDispatcher {
    pub fn new(
        pool: PgPool,
        pipeline: Arc<MatchPipeline>,
        poll_interval: Duration,
        max_concurrent_runs: usize,
    ) -> Self {
        Self {
            pool,
            pipeline,
            poll_interval,
            limiter: Arc::new(Semaphore::new(max_concurrent_runs)),
        }
    }

    /// Run the dispatcher loop until the cancellation token is
    /// triggered, then wait for in-flight runs to settle.
    ///
    /// In-flight runs observe the same token through a child token, so
    /// shutdown drives every claimed card to a terminal status before
    /// this returns.
    pub async fn run(&self, cancel: CancellationToken) {
        let tracker = TaskTracker::new();
        let mut ticker = tokio::time::interval(self.poll_interval);
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            max_concurrent_runs = self.limiter.available_permits(),
            "Match dispatcher started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Match dispatcher shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.dispatch_cycle(&cancel, &tracker).await {
                        tracing::error!(error = %e, "Dispatch cycle failed");
                    }
                }
            }
        }

        tracker.close();
        tracker.wait().await;
        tracing::info!("All in-flight match runs settled");
    }

    /// One dispatch cycle: claim cards while run slots are free.
    async fn dispatch_cycle(
        &self,
        cancel: &CancellationToken,
        tracker: &TaskTracker,
    ) -> Result<(), sqlx::Error> {
        loop {
            let Ok(permit) = Arc::clone(&self.limiter).try_acquire_owned() else {
                // Every run slot is busy; try again next tick.
                return Ok(());
            };

            let Some(card) = CardRepo::claim_next_pending(&self.pool).await? else {
                return Ok(());
            };

            tracing::info!(card_id = card.id, image_path = %card.image_path, "Card claimed");

            let pipeline = Arc::clone(&self.pipeline);
            let run_cancel = cancel.child_token();
            tracker.spawn(async move {
                let _permit = permit;
                // Failures are recorded on the card and logged by the
                // pipeline itself; the dispatcher only fires runs.
                let _ = pipeline.run(card.id, &card.image_path, &run_cancel).await;
            });
        }
    }
}
