//! End-to-end match pipeline tests against a real database, with
//! scripted fakes at the storage and vision-model seams.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use cardex_core::metadata::ExtractedMetadata;
use cardex_core::retry::RetryPolicy;
use cardex_db::models::card::CreateCard;
use cardex_db::models::ref_card::UpsertRefCard;
use cardex_db::models::status::MatchingStatus;
use cardex_db::models::tcg_set::UpsertTcgSet;
use cardex_db::repositories::{CardRepo, RefCardRepo, TcgSetRepo};
use cardex_pipeline::{find_match_candidates, MatchError, MatchPipeline};
use cardex_pipeline::{ImageStore, StorageError};
use cardex_vision::{ImagePayload, VisionError, VisionModel, VisionRequest};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// In-memory image store.
struct MemoryStore {
    files: HashMap<String, ImagePayload>,
}

impl MemoryStore {
    fn with_jpeg(path: &str) -> Self {
        let mut files = HashMap::new();
        files.insert(
            path.to_string(),
            ImagePayload {
                bytes: vec![0xFF, 0xD8, 0xFF],
                mime_type: "image/jpeg".to_string(),
            },
        );
        Self { files }
    }
}

#[async_trait]
impl ImageStore for MemoryStore {
    async fn download(&self, path: &str) -> Result<ImagePayload, StorageError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }
}

/// Vision model scripted with one answer per stage. The stage is
/// recognized by its response schema.
struct ScriptedModel {
    extraction: Value,
    verdict: Value,
    /// Number of leading extraction calls that fail transiently.
    flaky_extractions: AtomicU32,
}

impl ScriptedModel {
    fn new(extraction: Value, verdict: Value) -> Self {
        Self {
            extraction,
            verdict,
            flaky_extractions: AtomicU32::new(0),
        }
    }

    fn with_flaky_extractions(self, failures: u32) -> Self {
        self.flaky_extractions.store(failures, Ordering::SeqCst);
        self
    }
}

#[async_trait]
impl VisionModel for ScriptedModel {
    async fn run(&self, request: VisionRequest<'_>) -> Result<Value, VisionError> {
        let is_disambiguation = request.response_schema["properties"]
            .get("ref_card_id")
            .is_some();
        if is_disambiguation {
            return Ok(self.verdict.clone());
        }

        let remaining = self.flaky_extractions.load(Ordering::SeqCst);
        if remaining > 0 {
            self.flaky_extractions.store(remaining - 1, Ordering::SeqCst);
            return Err(VisionError::Connection("connection reset".to_string()));
        }
        Ok(self.extraction.clone())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

const IMAGE_PATH: &str = "uploads/user-1/scan.jpg";

/// Seed a small catalog and return Charizard's ref card id.
async fn seed_catalog(pool: &PgPool) -> i64 {
    let set = TcgSetRepo::upsert(
        pool,
        &UpsertTcgSet {
            tcg_id: "base1".to_string(),
            name: "Base Set".to_string(),
            year: Some(1999),
        },
    )
    .await
    .unwrap();

    let cards = vec![
        ref_card(set.id, "base1-4", "4", "Charizard"),
        ref_card(set.id, "base1-2", "2", "Blastoise"),
        ref_card(set.id, "base1-15", "15", "Venusaur"),
    ];
    RefCardRepo::upsert_many(pool, &cards).await.unwrap();

    RefCardRepo::find_by_tcg_id(pool, "base1-4")
        .await
        .unwrap()
        .unwrap()
        .id
}

fn ref_card(set_id: i64, tcg_id: &str, local_id: &str, name: &str) -> UpsertRefCard {
    UpsertRefCard {
        tcg_id: tcg_id.to_string(),
        set_id,
        local_id: local_id.to_string(),
        name: name.to_string(),
        image_url: None,
    }
}

async fn create_pending_card(pool: &PgPool) -> i64 {
    CardRepo::create(
        pool,
        &CreateCard {
            user_id: "user-1".to_string(),
            image_path: IMAGE_PATH.to_string(),
        },
    )
    .await
    .unwrap()
    .id
}

fn extraction(name: &str, local_id: &str, year: i32) -> Value {
    json!({ "name": name, "local_id": local_id, "year": year })
}

fn fast_retries() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        delay: Duration::from_millis(1),
    }
}

// ---------------------------------------------------------------------------
// Happy path
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn pending_card_ends_matched(pool: PgPool) {
    let charizard_id = seed_catalog(&pool).await;
    let card_id = create_pending_card(&pool).await;

    let model = ScriptedModel::new(
        extraction("Charizard", "4/102", 1999),
        json!({ "ref_card_id": charizard_id }),
    );
    let pipeline = MatchPipeline::new(
        pool.clone(),
        Arc::new(MemoryStore::with_jpeg(IMAGE_PATH)),
        Arc::new(model),
    );

    let outcome = pipeline
        .run(card_id, IMAGE_PATH, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome.matched.id, charizard_id);
    assert!(!outcome.candidates.is_empty());

    let card = CardRepo::find_by_id(&pool, card_id).await.unwrap().unwrap();
    assert_eq!(card.matching_status, MatchingStatus::Matched.id());
    assert_eq!(card.ref_card_id, Some(charizard_id));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn transient_extraction_failures_are_retried(pool: PgPool) {
    let charizard_id = seed_catalog(&pool).await;
    let card_id = create_pending_card(&pool).await;

    let model = ScriptedModel::new(
        extraction("Charizard", "4/102", 1999),
        json!({ "ref_card_id": charizard_id }),
    )
    .with_flaky_extractions(2);
    let pipeline = MatchPipeline::new(
        pool.clone(),
        Arc::new(MemoryStore::with_jpeg(IMAGE_PATH)),
        Arc::new(model),
    )
        .with_retry_policy(fast_retries());

    pipeline
        .run(card_id, IMAGE_PATH, &CancellationToken::new())
        .await
        .unwrap();

    let card = CardRepo::find_by_id(&pool, card_id).await.unwrap().unwrap();
    assert_eq!(card.matching_status, MatchingStatus::Matched.id());
}

// ---------------------------------------------------------------------------
// Failure semantics
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn zero_candidates_fails_with_the_attempted_fields(pool: PgPool) {
    seed_catalog(&pool).await;
    let card_id = create_pending_card(&pool).await;

    let model = ScriptedModel::new(
        extraction("Mewtwo", "10/62", 2004),
        json!({ "ref_card_id": 0 }),
    );
    let pipeline = MatchPipeline::new(
        pool.clone(),
        Arc::new(MemoryStore::with_jpeg(IMAGE_PATH)),
        Arc::new(model),
    );

    let err = pipeline
        .run(card_id, IMAGE_PATH, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_matches!(err, MatchError::NoCandidates { .. });
    let message = err.to_string();
    assert!(message.contains("Mewtwo"));
    assert!(message.contains("2004"));
    assert!(message.contains("10"));

    let card = CardRepo::find_by_id(&pool, card_id).await.unwrap().unwrap();
    assert_eq!(card.matching_status, MatchingStatus::Failed.id());
    assert_eq!(card.ref_card_id, None);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn hallucinated_id_fails_instead_of_guessing(pool: PgPool) {
    seed_catalog(&pool).await;
    let card_id = create_pending_card(&pool).await;

    let model = ScriptedModel::new(
        extraction("Charizard", "4/102", 1999),
        json!({ "ref_card_id": 999_999 }),
    );
    let pipeline = MatchPipeline::new(
        pool.clone(),
        Arc::new(MemoryStore::with_jpeg(IMAGE_PATH)),
        Arc::new(model),
    );

    let err = pipeline
        .run(card_id, IMAGE_PATH, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_matches!(err, MatchError::Hallucination { returned: 999_999, .. });

    let card = CardRepo::find_by_id(&pool, card_id).await.unwrap().unwrap();
    assert_eq!(card.matching_status, MatchingStatus::Failed.id());
    assert_eq!(card.ref_card_id, None);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn missing_image_fails_the_card(pool: PgPool) {
    seed_catalog(&pool).await;
    let card_id = create_pending_card(&pool).await;

    let model = ScriptedModel::new(extraction("Charizard", "4", 1999), json!({}));
    let store = MemoryStore {
        files: HashMap::new(),
    };
    let pipeline = MatchPipeline::new(pool.clone(), Arc::new(store), Arc::new(model));

    let err = pipeline
        .run(card_id, IMAGE_PATH, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_matches!(err, MatchError::Download(StorageError::NotFound(_)));

    let card = CardRepo::find_by_id(&pool, card_id).await.unwrap().unwrap();
    assert_eq!(card.matching_status, MatchingStatus::Failed.id());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn cancelled_run_ends_failed_not_pending(pool: PgPool) {
    let charizard_id = seed_catalog(&pool).await;
    let card_id = create_pending_card(&pool).await;

    let model = ScriptedModel::new(
        extraction("Charizard", "4/102", 1999),
        json!({ "ref_card_id": charizard_id }),
    );
    let pipeline = MatchPipeline::new(
        pool.clone(),
        Arc::new(MemoryStore::with_jpeg(IMAGE_PATH)),
        Arc::new(model),
    );

    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = pipeline.run(card_id, IMAGE_PATH, &cancel).await.unwrap_err();
    assert_matches!(err, MatchError::Cancelled);

    let card = CardRepo::find_by_id(&pool, card_id).await.unwrap().unwrap();
    assert_eq!(card.matching_status, MatchingStatus::Failed.id());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn deleted_card_does_not_block_the_run(pool: PgPool) {
    let charizard_id = seed_catalog(&pool).await;
    let card_id = create_pending_card(&pool).await;
    CardRepo::delete(&pool, card_id).await.unwrap();

    let model = ScriptedModel::new(
        extraction("Charizard", "4/102", 1999),
        json!({ "ref_card_id": charizard_id }),
    );
    let pipeline = MatchPipeline::new(
        pool.clone(),
        Arc::new(MemoryStore::with_jpeg(IMAGE_PATH)),
        Arc::new(model),
    );

    // The run completes; the verdict simply has no row to land on.
    let outcome = pipeline
        .run(card_id, IMAGE_PATH, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome.matched.id, charizard_id);
    assert!(CardRepo::find_by_id(&pool, card_id).await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Idempotent re-delivery
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn rerunning_a_matched_card_is_safe(pool: PgPool) {
    let charizard_id = seed_catalog(&pool).await;
    let card_id = create_pending_card(&pool).await;

    let model = ScriptedModel::new(
        extraction("Charizard", "4/102", 1999),
        json!({ "ref_card_id": charizard_id }),
    );
    let pipeline = MatchPipeline::new(
        pool.clone(),
        Arc::new(MemoryStore::with_jpeg(IMAGE_PATH)),
        Arc::new(model),
    );

    let cancel = CancellationToken::new();
    pipeline.run(card_id, IMAGE_PATH, &cancel).await.unwrap();
    pipeline.run(card_id, IMAGE_PATH, &cancel).await.unwrap();

    let card = CardRepo::find_by_id(&pool, card_id).await.unwrap().unwrap();
    assert_eq!(card.matching_status, MatchingStatus::Matched.id());
    assert_eq!(card.ref_card_id, Some(charizard_id));
}

// ---------------------------------------------------------------------------
// Two-of-three signal degradation
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn retrieval_recovers_from_a_wrong_year(pool: PgPool) {
    seed_catalog(&pool).await;

    let metadata = ExtractedMetadata::new("Charizard", "4", 9999);
    let candidates = find_match_candidates(&pool, &metadata).await.unwrap();

    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].tcg_id, "base1-4");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn retrieval_recovers_from_a_wrong_local_id(pool: PgPool) {
    seed_catalog(&pool).await;

    let metadata = ExtractedMetadata::new("Charizard", "999", 1999);
    let candidates = find_match_candidates(&pool, &metadata).await.unwrap();

    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].tcg_id, "base1-4");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn retrieval_recovers_from_a_wrong_name(pool: PgPool) {
    seed_catalog(&pool).await;

    let metadata = ExtractedMetadata::new("WrongCard", "4", 1999);
    let candidates = find_match_candidates(&pool, &metadata).await.unwrap();

    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].tcg_id, "base1-4");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unknown_signals_skip_their_queries_gracefully(pool: PgPool) {
    seed_catalog(&pool).await;

    // Only the name survived extraction: both queries pairing it with
    // another signal are skipped, so nothing can be retrieved.
    let metadata = ExtractedMetadata::new("Charizard", "", 0);
    let candidates = find_match_candidates(&pool, &metadata).await.unwrap();
    assert!(candidates.is_empty());

    // Nothing survived at all.
    let metadata = ExtractedMetadata::new("", "", 0);
    let candidates = find_match_candidates(&pool, &metadata).await.unwrap();
    assert!(candidates.is_empty());
}
