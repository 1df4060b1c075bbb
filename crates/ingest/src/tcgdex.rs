//! Minimal typed client for the TCGdex REST feed.
//!
//! Only the two endpoints ingestion needs: the set listing and a
//! single set with its cards.

use serde::Deserialize;

/// Default TCGdex API endpoint (English catalog).
pub const DEFAULT_BASE_URL: &str = "https://api.tcgdex.net/v2/en";

/// A set as returned by the listing endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SetBrief {
    pub id: String,
    pub name: String,
}

/// A set with its cards, as returned by the detail endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SetDetail {
    pub id: String,
    pub name: String,
    #[serde(rename = "releaseDate")]
    pub release_date: Option<String>,
    #[serde(default)]
    pub cards: Vec<CardBrief>,
}

/// A card within a set detail response.
#[derive(Debug, Clone, Deserialize)]
pub struct CardBrief {
    pub id: String,
    #[serde(rename = "localId")]
    pub local_id: String,
    pub name: String,
    /// Asset base URL without quality/extension suffix.
    pub image: Option<String>,
}

impl CardBrief {
    /// Build a concrete asset URL from the feed's base URL, e.g.
    /// quality `"high"` and extension `"webp"`.
    pub fn image_url(&self, quality: &str, extension: &str) -> Option<String> {
        self.image
            .as_ref()
            .map(|base| format!("{base}/{quality}.{extension}"))
    }
}

/// HTTP client for the TCGdex feed.
pub struct TcgdexClient {
    http: reqwest::Client,
    base_url: String,
}

impl Default for TcgdexClient {
    fn default() -> Self {
        Self::new()
    }
}

impl TcgdexClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the client at a different endpoint (mirrors, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// List every set in the catalog.
    pub async fn list_sets(&self) -> Result<Vec<SetBrief>, reqwest::Error> {
        self.http
            .get(format!("{}/sets", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }

    /// Fetch one set with its full card list.
    pub async fn get_set(&self, set_id: &str) -> Result<SetDetail, reqwest::Error> {
        self.http
            .get(format!("{}/sets/{}", self.base_url, set_id))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
