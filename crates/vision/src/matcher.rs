//! Disambiguation stage.
//!
//! Second model pass: shown the same image plus the fused candidate
//! list (full field sets), the model names the one candidate id it
//! believes matches. Membership of the returned id in the candidate
//! set is enforced by the pipeline, which treats a violation as a
//! hallucination rather than guessing.

use serde::Deserialize;
use serde_json::{json, Value};

use cardex_core::types::DbId;
use cardex_db::models::ref_card::CandidateCard;

use crate::error::VisionError;
use crate::model::{ImagePayload, VisionModel, VisionRequest};

/// Fixed instruction for the disambiguation stage.
pub const DISAMBIGUATION_INSTRUCTION: &str = "\
You match a photo of a Pokemon TCG card to one of a list of known reference \
cards. Each candidate carries an id, name, local_id, set_tcg_id, set_name and \
set_year. Compare the photo against the candidates using:\n\
- name: printed at the top of the card.\n\
- local_id: the sequential number near a bottom corner, printed as \
local_id/total (e.g. 4/102).\n\
- the set's release year, from the copyright notice on the bottom edge.\n\
Return ONLY the id of the best matching candidate. You MUST return the id of \
one of the provided candidates - never invent a new id.";

/// Response schema for the disambiguation stage.
pub fn disambiguation_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "ref_card_id": { "type": "integer" },
        },
        "required": ["ref_card_id"],
    })
}

/// Raw model verdict.
#[derive(Debug, Deserialize)]
struct RawVerdict {
    ref_card_id: DbId,
}

/// Run the disambiguation stage, returning the id the model selected.
///
/// The returned id is *not* guaranteed to belong to `candidates`; the
/// caller owns that check so it can fail the run with its own
/// hallucination error.
pub async fn select_candidate(
    model: &dyn VisionModel,
    image: &ImagePayload,
    candidates: &[CandidateCard],
) -> Result<DbId, VisionError> {
    let serialized = serde_json::to_string(candidates)
        .expect("candidate serialization is infallible");

    let output = model
        .run(VisionRequest {
            system_instruction: DISAMBIGUATION_INSTRUCTION,
            prompt: format!(
                "Match the card in the photo to one of these candidates:\n{serialized}"
            ),
            image,
            response_schema: disambiguation_schema(),
        })
        .await?;

    let verdict: RawVerdict = serde_json::from_value(output)
        .map_err(|e| VisionError::SchemaInvalid(e.to_string()))?;

    tracing::debug!(ref_card_id = verdict.ref_card_id, "Disambiguation verdict");
    Ok(verdict.ref_card_id)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
