use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cardex_pipeline::{ImageStore, LocalImageStore, MatchPipeline, S3ImageStore};
use cardex_vision::GeminiModel;
use cardex_worker::{MatchDispatcher, StorageBackendConfig, WorkerConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "cardex_worker=debug,cardex_pipeline=debug,cardex_vision=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env();

    let pool = cardex_db::create_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    cardex_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    cardex_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    let store: Arc<dyn ImageStore> = match &config.storage {
        StorageBackendConfig::S3 { bucket } => {
            tracing::info!(bucket = %bucket, "Using S3 image store");
            Arc::new(S3ImageStore::from_env(bucket.clone()).await)
        }
        StorageBackendConfig::Local { root } => {
            tracing::info!(root = %root.display(), "Using local image store");
            Arc::new(LocalImageStore::new(root.clone()))
        }
    };

    let model = Arc::new(GeminiModel::new(
        config.gemini_api_key.clone(),
        config.gemini_model.clone(),
    ));
    tracing::info!(model = %model.model(), "Vision model configured");

    let pipeline = Arc::new(
        MatchPipeline::new(pool.clone(), store, model)
            .with_retry_policy(config.retry_policy.clone()),
    );

    let dispatcher = MatchDispatcher::new(
        pool,
        pipeline,
        config.poll_interval,
        config.max_concurrent_runs,
    );

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            shutdown.cancel();
        }
    });

    dispatcher.run(cancel).await;
}
