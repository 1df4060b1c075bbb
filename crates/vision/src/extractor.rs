//! Metadata extraction stage.
//!
//! First of the two model passes: read the identifying fields off the
//! card photo. Unreadable fields come back as empty string / 0 so the
//! retrieval layer can treat "unknown" uniformly.

use serde::Deserialize;
use serde_json::{json, Value};

use cardex_core::metadata::ExtractedMetadata;

use crate::error::VisionError;
use crate::model::{ImagePayload, VisionModel, VisionRequest};

/// Fixed instruction describing where each field sits on a card.
pub const EXTRACTION_INSTRUCTION: &str = "\
You extract structured identifying fields from a photo of a Pokemon TCG card.\n\
- local_id: the card's sequential number within its set. It is printed near one \
of the bottom corners in the form local_id/total (e.g. 4/102, where 4 is the \
local id and 102 the number of cards in the set).\n\
- name: printed at the top of the card. Usually the Pokemon shown on the card, \
but it can also be a Trainer, Item, Energy or another rarer kind. Do not include \
the nearby HP, type, or stage text.\n\
- year: the release year from the small copyright notice along the bottom edge \
of the card (e.g. \"(c)1999\" means 1999).\n\
If a field cannot be determined from the image, return an empty string for it, \
or 0 for the year.";

/// Response schema for the extraction stage.
pub fn extraction_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "name": { "type": "string" },
            "local_id": { "type": "string" },
            "year": { "type": "integer" },
        },
        "required": ["name", "local_id", "year"],
    })
}

/// Raw model output, before normalization.
#[derive(Debug, Deserialize)]
struct RawMetadata {
    name: String,
    local_id: String,
    year: i32,
}

/// Run the extraction stage over one card image.
///
/// Pure apart from the model call: no persistence, no other side
/// effects, safe to retry verbatim.
pub async fn extract_metadata(
    model: &dyn VisionModel,
    image: &ImagePayload,
) -> Result<ExtractedMetadata, VisionError> {
    let output = model
        .run(VisionRequest {
            system_instruction: EXTRACTION_INSTRUCTION,
            prompt: "Extract the identifying fields from this card photo.".to_string(),
            image,
            response_schema: extraction_schema(),
        })
        .await?;

    let raw: RawMetadata = serde_json::from_value(output)
        .map_err(|e| VisionError::SchemaInvalid(e.to_string()))?;

    let metadata = ExtractedMetadata::new(raw.name, &raw.local_id, raw.year);
    tracing::debug!(
        name = %metadata.name,
        local_id = %metadata.local_id,
        year = metadata.year,
        "Extracted card metadata",
    );
    Ok(metadata)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use async_trait::async_trait;

    use super::*;

    /// Fake model returning a canned payload.
    struct CannedModel(Value);

    #[async_trait]
    impl VisionModel for CannedModel {
        async fn run(&self, _request: VisionRequest<'_>) -> Result<Value, VisionError> {
            Ok(self.0.clone())
        }
    }

    fn sample_image() -> ImagePayload {
        ImagePayload {
            bytes: vec![0xFF, 0xD8],
            mime_type: "image/jpeg".to_string(),
        }
    }

    #[tokio::test]
    async fn normalizes_printed_notation() {
        let model = CannedModel(json!({
            "name": "Charizard",
            "local_id": "4 / 102",
            "year": 1999,
        }));
        let metadata = extract_metadata(&model, &sample_image()).await.unwrap();
        assert_eq!(metadata.name, "Charizard");
        assert_eq!(metadata.local_id, "4");
        assert_eq!(metadata.year, 1999);
    }

    #[tokio::test]
    async fn unknown_fields_stay_empty_not_null() {
        let model = CannedModel(json!({ "name": "", "local_id": "", "year": 0 }));
        let metadata = extract_metadata(&model, &sample_image()).await.unwrap();
        assert_eq!(metadata.name, "");
        assert_eq!(metadata.local_id, "");
        assert_eq!(metadata.year, 0);
    }

    #[tokio::test]
    async fn schema_mismatch_fails_the_stage() {
        let model = CannedModel(json!({ "name": "Charizard" }));
        let result = extract_metadata(&model, &sample_image()).await;
        assert_matches!(result, Err(VisionError::SchemaInvalid(_)));
    }
}
