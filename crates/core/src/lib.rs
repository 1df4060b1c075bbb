//! Cardex domain logic with zero internal dependencies.
//!
//! Everything in this crate is pure or near-pure: shared id/timestamp
//! types, weighted reciprocal rank fusion, extracted-metadata
//! normalization, and the fixed-delay retry harness used around the
//! match pipeline's external calls.

pub mod metadata;
pub mod retry;
pub mod rrf;
pub mod types;
