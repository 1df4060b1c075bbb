//! Vision-model boundary for the match pipeline.
//!
//! [`VisionModel`] is the capability seam: callers hand it an image,
//! an instruction, and a response schema, and get back schema-shaped
//! JSON or a typed error. [`GeminiModel`] is the production
//! implementation; tests substitute scripted fakes.
//!
//! The two pipeline stages live here as plain async functions over the
//! trait: [`extract_metadata`] and [`select_candidate`]. Both validate
//! the model's output eagerly and never let untyped JSON escape.

pub mod error;
pub mod extractor;
pub mod matcher;
pub mod model;

pub use error::VisionError;
pub use extractor::extract_metadata;
pub use matcher::select_candidate;
pub use model::{GeminiModel, ImagePayload, VisionModel, VisionRequest};
