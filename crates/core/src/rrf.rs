//! Weighted reciprocal rank fusion.
//!
//! Merges several independently ranked candidate lists into one ranked
//! list. Each list may come from a different (and individually
//! unreliable) retrieval signal; an item's fused score is the sum over
//! all lists containing it of `weight / (K + rank)`. Items confirmed by
//! several signals therefore float to the top even when no single
//! signal is trustworthy on its own.

use std::collections::HashMap;

use crate::types::DbId;

/// Smoothing constant for reciprocal rank scoring.
///
/// The standard value from the RRF literature; large enough that the
/// gap between rank 1 and rank 2 within one list stays smaller than the
/// gap between "found by two lists" and "found by one".
pub const RRF_K: f64 = 60.0;

/// An item that carries a stable identity across ranked lists.
pub trait HasId {
    fn id(&self) -> DbId;
}

struct Scored<T> {
    item: T,
    score: f64,
    /// Insertion order of first appearance, used as a stable tie-break.
    order: usize,
}

/// Fuse `ranked_lists` with uniform weights, returning at most `limit` items.
pub fn fuse<T: HasId>(ranked_lists: Vec<Vec<T>>, limit: usize) -> Vec<T> {
    let weights = vec![1.0; ranked_lists.len()];
    fuse_weighted(ranked_lists, limit, &weights)
}

/// Fuse `ranked_lists` with one weight per list, returning at most
/// `limit` items ordered by descending fused score.
///
/// Lists are ordered best-first; ranks are 1-based. An identity present
/// in several lists accumulates a contribution from each, and the item
/// payload of its first appearance wins. Ties are broken by first
/// appearance order, so the output is deterministic for identical
/// inputs.
///
/// # Panics
///
/// Panics if `weights.len() != ranked_lists.len()`.
pub fn fuse_weighted<T: HasId>(ranked_lists: Vec<Vec<T>>, limit: usize, weights: &[f64]) -> Vec<T> {
    assert_eq!(
        ranked_lists.len(),
        weights.len(),
        "one weight per ranked list"
    );

    let mut scored: HashMap<DbId, Scored<T>> = HashMap::new();
    let mut next_order = 0usize;

    for (list, &weight) in ranked_lists.into_iter().zip(weights) {
        for (index, item) in list.into_iter().enumerate() {
            let rank = (index + 1) as f64;
            let contribution = weight / (RRF_K + rank);

            scored
                .entry(item.id())
                .and_modify(|entry| entry.score += contribution)
                .or_insert_with(|| {
                    let entry = Scored {
                        item,
                        score: contribution,
                        order: next_order,
                    };
                    next_order += 1;
                    entry
                });
        }
    }

    let mut fused: Vec<Scored<T>> = scored.into_values().collect();
    fused.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.order.cmp(&b.order))
    });

    fused.into_iter().take(limit).map(|s| s.item).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
