use std::collections::BTreeMap;

use super::domain::{Grade, ProposalId, ScoreWeights, VendorScore};

/// Recompute every vendor's overall score and grade from the four component
/// scores and the weight vector, normalizing by the actual weight sum.
///
/// A non-positive weight sum makes the update a no-op: scores keep their
/// previous values. The function is pure in its inputs and idempotent.
pub fn recompute_scores(scores: &mut BTreeMap<ProposalId, VendorScore>, weights: &ScoreWeights) {
    let weight_sum = weights.sum();
    if weight_sum == 0 {
        return;
    }

    for score in scores.values_mut() {
        let weighted = score.price_score as u32 * weights.price as u32
            + score.completeness_score as u32 * weights.completeness as u32
            + score.risk_score as u32 * weights.risk as u32
            + score.data_quality_score as u32 * weights.data_quality as u32;
        let overall = (weighted as f64 / weight_sum as f64).round() as u8;
        score.overall = overall;
        score.grade = Grade::from_overall(overall);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingRecompute {
    due_at_ms: u64,
    weights: ScoreWeights,
}

/// Single-slot scheduler that coalesces a burst of weight changes into one
/// recompute. Driven by a caller-supplied millisecond clock so tests control
/// time; a new request replaces the pending slot rather than stacking.
#[derive(Debug, Clone)]
pub struct RecomputeDebouncer {
    window_ms: u64,
    pending: Option<PendingRecompute>,
}

impl RecomputeDebouncer {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            pending: None,
        }
    }

    /// Schedule a recompute at `now + window`, replacing any pending one.
    pub fn request(&mut self, now_ms: u64, weights: ScoreWeights) {
        self.pending = Some(PendingRecompute {
            due_at_ms: now_ms.saturating_add(self.window_ms),
            weights,
        });
    }

    /// Return the settled weight vector once the window has elapsed.
    pub fn poll(&mut self, now_ms: u64) -> Option<ScoreWeights> {
        match self.pending {
            Some(pending) if now_ms >= pending.due_at_ms => {
                self.pending = None;
                Some(pending.weights)
            }
            _ => None,
        }
    }

    /// Settle immediately, e.g. when leaving the results phase: the display
    /// must never be staler than one full recompute at the final weights.
    pub fn flush(&mut self) -> Option<ScoreWeights> {
        self.pending.take().map(|pending| pending.weights)
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
