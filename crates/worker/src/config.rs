//! Worker configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use cardex_core::retry::RetryPolicy;
use cardex_vision::model::DEFAULT_MODEL;

/// Which image storage backend the worker downloads uploads from.
#[derive(Debug, Clone)]
pub enum StorageBackendConfig {
    /// S3 bucket holding the uploaded images.
    S3 { bucket: String },
    /// Local directory, for development.
    Local { root: PathBuf },
}

/// Worker configuration.
///
/// All fields except the secrets have defaults suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Gemini API key for both vision stages.
    pub gemini_api_key: String,
    /// Gemini model id (default: [`DEFAULT_MODEL`]).
    pub gemini_model: String,
    /// Image storage backend.
    pub storage: StorageBackendConfig,
    /// Queue poll interval (default: 1000 ms).
    pub poll_interval: Duration,
    /// Maximum concurrent pipeline runs (default: 4).
    pub max_concurrent_runs: usize,
    /// Per-stage retry policy (default: 3 attempts, 10 s delay).
    pub retry_policy: RetryPolicy,
}

impl WorkerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env var                  | Default                     |
    /// |--------------------------|-----------------------------|
    /// | `DATABASE_URL`           | required                    |
    /// | `GEMINI_API_KEY`         | required                    |
    /// | `GEMINI_MODEL`           | `gemini-3-flash-preview`    |
    /// | `IMAGE_STORE`            | `local`                     |
    /// | `S3_BUCKET`              | required when `IMAGE_STORE=s3` |
    /// | `LOCAL_IMAGE_ROOT`       | `uploads`                   |
    /// | `POLL_INTERVAL_MS`       | `1000`                      |
    /// | `MAX_CONCURRENT_RUNS`    | `4`                         |
    /// | `MATCH_MAX_ATTEMPTS`     | `3`                         |
    /// | `MATCH_RETRY_DELAY_SECS` | `10`                        |
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let gemini_api_key = std::env::var("GEMINI_API_KEY").expect("GEMINI_API_KEY must be set");
        let gemini_model =
            std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let storage = match std::env::var("IMAGE_STORE").as_deref() {
            Ok("s3") => StorageBackendConfig::S3 {
                bucket: std::env::var("S3_BUCKET")
                    .expect("S3_BUCKET must be set when IMAGE_STORE=s3"),
            },
            _ => StorageBackendConfig::Local {
                root: std::env::var("LOCAL_IMAGE_ROOT")
                    .unwrap_or_else(|_| "uploads".into())
                    .into(),
            },
        };

        let poll_interval_ms: u64 = std::env::var("POLL_INTERVAL_MS")
            .unwrap_or_else(|_| "1000".into())
            .parse()
            .expect("POLL_INTERVAL_MS must be a valid u64");

        let max_concurrent_runs: usize = std::env::var("MAX_CONCURRENT_RUNS")
            .unwrap_or_else(|_| "4".into())
            .parse()
            .expect("MAX_CONCURRENT_RUNS must be a valid usize");

        let max_attempts: u32 = std::env::var("MATCH_MAX_ATTEMPTS")
            .unwrap_or_else(|_| "3".into())
            .parse()
            .expect("MATCH_MAX_ATTEMPTS must be a valid u32");

        let retry_delay_secs: u64 = std::env::var("MATCH_RETRY_DELAY_SECS")
            .unwrap_or_else(|_| "10".into())
            .parse()
            .expect("MATCH_RETRY_DELAY_SECS must be a valid u64");

        Self {
            database_url,
            gemini_api_key,
            gemini_model,
            storage,
            poll_interval: Duration::from_millis(poll_interval_ms),
            max_concurrent_runs,
            retry_policy: RetryPolicy {
                max_attempts,
                delay: Duration::from_secs(retry_delay_secs),
            },
        }
    }
}
