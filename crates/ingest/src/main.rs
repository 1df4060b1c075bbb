use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cardex_ingest::ingest_set;
use cardex_ingest::tcgdex::TcgdexClient;

/// Populate the reference-card catalog from the TCGdex feed.
///
/// Cards are upserted by their external catalog id, so re-running is
/// always safe and picks up feed corrections in place.
#[derive(Debug, Parser)]
#[command(name = "cardex-ingest")]
struct Args {
    /// Only ingest this set (e.g. "base1"); all sets when omitted.
    set_id: Option<String>,

    /// Number of sets fetched and upserted concurrently.
    #[arg(long, default_value_t = 5)]
    batch_size: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cardex_ingest=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = cardex_db::create_pool(&database_url).await?;
    cardex_db::health_check(&pool).await?;
    cardex_db::run_migrations(&pool).await?;

    let client = TcgdexClient::new();

    let set_ids: Vec<String> = match args.set_id {
        Some(set_id) => vec![set_id],
        None => client
            .list_sets()
            .await?
            .into_iter()
            .map(|set| set.id)
            .collect(),
    };
    tracing::info!(sets = set_ids.len(), "Starting catalog ingestion");

    let mut total: u64 = 0;
    let mut failed_sets: u32 = 0;
    for batch in set_ids.chunks(args.batch_size.max(1)) {
        let results = futures::future::join_all(
            batch.iter().map(|set_id| ingest_set(&pool, &client, set_id)),
        )
        .await;

        for (set_id, result) in batch.iter().zip(results) {
            match result {
                Ok(written) => {
                    total += written;
                    tracing::info!(set_id = %set_id, cards = written, "Set ingested");
                }
                // One broken set must not abort the whole feed run.
                Err(e) => {
                    failed_sets += 1;
                    tracing::error!(set_id = %set_id, error = %e, "Set ingestion failed");
                }
            }
        }
    }

    tracing::info!(total, failed_sets, "Catalog ingestion complete");
    Ok(())
}
