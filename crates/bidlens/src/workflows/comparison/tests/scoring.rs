use std::collections::BTreeMap;

use super::common::{pid, vendor_score};
use crate::workflows::comparison::domain::{Grade, ScoreWeights};
use crate::workflows::comparison::scoring::{recompute_scores, RecomputeDebouncer};

#[test]
fn recompute_weights_and_rounds_the_overall() {
    let mut scores = BTreeMap::new();
    scores.insert(pid("p1"), vendor_score(95, 90, 85, 90));
    scores.insert(pid("p2"), vendor_score(80, 95, 90, 85));

    recompute_scores(&mut scores, &ScoreWeights::default());

    // 95*40 + 90*25 + 85*25 + 90*10 = 9075 -> 90.75 -> 91
    assert_eq!(scores[&pid("p1")].overall, 91);
    assert_eq!(scores[&pid("p1")].grade, Grade::A);
    // 80*40 + 95*25 + 90*25 + 85*10 = 8675 -> 87
    assert_eq!(scores[&pid("p2")].overall, 87);
    assert_eq!(scores[&pid("p2")].grade, Grade::B);
}

#[test]
fn recompute_is_idempotent_for_positive_weight_sums() {
    let weights = ScoreWeights {
        price: 70,
        completeness: 10,
        risk: 15,
        data_quality: 30,
    };
    let mut scores = BTreeMap::new();
    scores.insert(pid("p1"), vendor_score(62, 91, 40, 77));
    scores.insert(pid("p2"), vendor_score(100, 0, 55, 13));

    recompute_scores(&mut scores, &weights);
    let first_pass = scores.clone();
    recompute_scores(&mut scores, &weights);

    assert_eq!(scores, first_pass);
}

#[test]
fn normalization_uses_the_actual_weight_sum() {
    let equal = ScoreWeights {
        price: 1,
        completeness: 1,
        risk: 1,
        data_quality: 1,
    };
    let mut scores = BTreeMap::new();
    scores.insert(pid("p1"), vendor_score(100, 50, 50, 100));

    recompute_scores(&mut scores, &equal);

    assert_eq!(scores[&pid("p1")].overall, 75);
    assert_eq!(scores[&pid("p1")].grade, Grade::C);
}

#[test]
fn zero_weight_sum_leaves_scores_untouched() {
    let zero = ScoreWeights {
        price: 0,
        completeness: 0,
        risk: 0,
        data_quality: 0,
    };
    let mut scores = BTreeMap::new();
    let mut before = vendor_score(95, 90, 85, 90);
    before.overall = 91;
    before.grade = Grade::A;
    scores.insert(pid("p1"), before.clone());

    recompute_scores(&mut scores, &zero);

    assert_eq!(scores[&pid("p1")], before);
}

#[test]
fn debouncer_coalesces_a_burst_into_the_final_weights() {
    let mut debouncer = RecomputeDebouncer::new(200);
    let first = ScoreWeights {
        price: 50,
        ..ScoreWeights::default()
    };
    let last = ScoreWeights {
        price: 60,
        ..ScoreWeights::default()
    };

    debouncer.request(0, first);
    debouncer.request(100, last);

    assert_eq!(debouncer.poll(250), None, "window restarts on replacement");
    assert_eq!(debouncer.poll(300), Some(last));
    assert_eq!(debouncer.poll(301), None, "slot drains after firing");
}

#[test]
fn debouncer_fires_separate_requests_outside_the_window() {
    let mut debouncer = RecomputeDebouncer::new(200);
    let first = ScoreWeights::default();

    debouncer.request(0, first);
    assert_eq!(debouncer.poll(200), Some(first));

    let second = ScoreWeights {
        risk: 90,
        ..ScoreWeights::default()
    };
    debouncer.request(500, second);
    assert_eq!(debouncer.poll(700), Some(second));
}

#[test]
fn debouncer_cancel_and_flush() {
    let mut debouncer = RecomputeDebouncer::new(200);
    let weights = ScoreWeights::default();

    debouncer.request(0, weights);
    debouncer.cancel();
    assert!(!debouncer.is_pending());
    assert_eq!(debouncer.poll(1_000), None);

    debouncer.request(0, weights);
    assert_eq!(debouncer.flush(), Some(weights));
    assert_eq!(debouncer.flush(), None);
}
