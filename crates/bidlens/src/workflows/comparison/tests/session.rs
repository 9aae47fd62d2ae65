use super::common::{
    comparison_outcome, extracted, failed, pending_file, pid, proposal, session_config,
    session_in_review,
};
use crate::workflows::comparison::domain::ScoreWeights;
use crate::workflows::comparison::remote::{BackendError, ComparisonOutcome};
use crate::workflows::comparison::session::{
    ComparisonSession, Phase, Recovery, SessionError,
};
use crate::workflows::comparison::store::ProposalEdit;

#[test]
fn upload_gate_requires_two_files_for_an_empty_project() {
    let mut session = ComparisonSession::new(session_config());
    assert_eq!(session.required_new_files(), 2);

    session.add_file(pending_file("only.xlsx")).expect("add file");
    match session.begin_extraction() {
        Err(SessionError::NotEnoughFiles { required, selected }) => {
            assert_eq!(required, 2);
            assert_eq!(selected, 1);
        }
        other => panic!("expected file-count gate, got {other:?}"),
    }
    assert_eq!(session.phase(), Phase::Upload);
}

#[test]
fn upload_gate_relaxes_when_the_project_already_has_proposals() {
    let existing = vec![proposal("p0", "existing.pdf", "Initech", 90_000.0)];
    let mut session = ComparisonSession::with_existing(session_config(), existing);
    assert_eq!(session.required_new_files(), 1);

    session.add_file(pending_file("new.xlsx")).expect("add file");
    let files = session.begin_extraction().expect("one new file suffices");
    assert_eq!(files.len(), 1);
    assert_eq!(session.phase(), Phase::Extracting);
}

#[test]
fn successful_extraction_auto_advances_to_review() {
    let session = session_in_review();
    assert_eq!(session.phase(), Phase::Review);
    assert_eq!(session.store().usable_count(), 2);
    assert!(session.error_card().is_none());
}

#[test]
fn partial_failures_do_not_block_when_enough_proposals_succeed() {
    let mut session = ComparisonSession::new(session_config());
    for name in ["a.xlsx", "b.xlsx", "c.xlsx"] {
        session.add_file(pending_file(name)).expect("add file");
    }
    session.begin_extraction().expect("begin");

    let phase = session
        .complete_extraction(vec![
            extracted("p1", "a.xlsx", "Acme", 100.0),
            failed("b.xlsx", "no tables found"),
            extracted("p2", "c.xlsx", "Globex", 120.0),
        ])
        .expect("complete");

    assert_eq!(phase, Phase::Review);
    assert_eq!(session.store().failures().len(), 1);
    assert_eq!(session.store().failures()[0].filename, "b.xlsx");
}

#[test]
fn insufficient_extractions_leave_a_terminal_error_card() {
    let mut session = ComparisonSession::new(session_config());
    session.add_file(pending_file("a.xlsx")).expect("add");
    session.add_file(pending_file("b.xlsx")).expect("add");
    session.begin_extraction().expect("begin");

    let phase = session
        .complete_extraction(vec![
            extracted("p1", "a.xlsx", "Acme", 100.0),
            failed("b.xlsx", "password protected"),
        ])
        .expect("complete");

    assert_eq!(phase, Phase::Extracting);
    let card = session.error_card().expect("error card shown");
    assert_eq!(card.recovery, Recovery::Restart);
    assert!(card.message.contains("only 1"));

    session.restart();
    assert_eq!(session.phase(), Phase::Upload);
    assert!(session.error_card().is_none());
    assert_eq!(session.store().usable_count(), 0);
}

#[test]
fn malformed_extracted_records_are_downgraded_to_failures() {
    let mut session = ComparisonSession::new(session_config());
    session.add_file(pending_file("a.xlsx")).expect("add");
    session.add_file(pending_file("b.xlsx")).expect("add");
    session.begin_extraction().expect("begin");

    let mut bad = proposal("p1", "a.xlsx", "Acme", 100.0);
    bad.line_items[0].confidence = 4.2;

    session
        .complete_extraction(vec![
            crate::workflows::comparison::store::FileOutcome::Extracted {
                filename: "a.xlsx".to_string(),
                record: bad,
            },
            extracted("p2", "b.xlsx", "Globex", 120.0),
        ])
        .expect("complete");

    assert_eq!(session.phase(), Phase::Extracting);
    assert_eq!(session.store().usable_count(), 1);
    assert!(session.store().failures()[0].message.contains("confidence"));
}

#[test]
fn navigation_captures_staged_edits_before_moving_on() {
    let mut session = session_in_review();

    session
        .stage_edit(ProposalEdit {
            total_raw: Some("$130,000.00".to_string()),
            ..ProposalEdit::default()
        })
        .expect("stage edit on proposal 0");
    session.select_proposal(1).expect("navigate away");
    session.select_proposal(0).expect("navigate back");

    let record = session.store().proposal(0).expect("proposal 0");
    assert_eq!(record.total, Some(130_000.0));
    assert_eq!(record.total_raw, "$130,000.00");
}

#[test]
fn begin_compare_flushes_the_open_draft() {
    let mut session = session_in_review();
    session
        .stage_edit(ProposalEdit {
            company: Some("Acme Industries".to_string()),
            ..ProposalEdit::default()
        })
        .expect("stage");

    session.begin_compare().expect("compare starts");

    assert_eq!(session.phase(), Phase::Comparing);
    let record = session.store().proposal(0).expect("proposal 0");
    assert_eq!(record.company.as_deref(), Some("Acme Industries"));
}

#[test]
fn successful_compare_lands_in_results_with_consistent_scores() {
    let mut session = session_in_review();
    session.begin_compare().expect("begin");

    let phase = session
        .complete_compare(Ok(comparison_outcome()))
        .expect("complete");

    assert_eq!(phase, Phase::Results);
    let model = session.comparison().expect("model loaded");
    assert_eq!(model.comparison_id.as_deref(), Some("cmp-001"));
    // overall/grade reflect the session's current weight vector
    assert_eq!(model.vendor_scores[&pid("p1")].overall, 91);
    assert_eq!(model.vendor_scores[&pid("p2")].overall, 87);
}

#[test]
fn failed_compare_returns_to_review_with_a_retry_card() {
    let mut session = session_in_review();
    session.begin_compare().expect("begin");

    let phase = session
        .complete_compare(Err(BackendError::Request("connection reset".to_string())))
        .expect("handled");

    assert_eq!(phase, Phase::Review);
    let card = session.error_card().expect("retry card");
    assert_eq!(card.recovery, Recovery::RetryCompare);
    assert!(session.comparison().is_none());

    // the retry path goes straight back through comparing
    session.begin_compare().expect("retry begins");
    assert_eq!(session.phase(), Phase::Comparing);
}

#[test]
fn malformed_comparison_models_are_rejected_at_the_boundary() {
    let mut session = session_in_review();
    session.begin_compare().expect("begin");

    let mut outcome = comparison_outcome();
    outcome
        .model
        .vendor_scores
        .get_mut(&pid("p1"))
        .expect("score present")
        .price_score = 180;

    let phase = session.complete_compare(Ok(outcome)).expect("handled");

    assert_eq!(phase, Phase::Review);
    assert!(session.comparison().is_none());
    let card = session.error_card().expect("card");
    assert!(card.message.contains("malformed"));
}

#[test]
fn weight_changes_coalesce_and_settle_at_the_final_vector() {
    let mut session = session_in_review();
    session.begin_compare().expect("begin");
    session
        .complete_compare(Ok(comparison_outcome()))
        .expect("results");

    let overall_before = session.comparison().expect("model").vendor_scores[&pid("p1")].overall;

    let price_heavy = ScoreWeights {
        price: 100,
        completeness: 0,
        risk: 0,
        data_quality: 0,
    };
    let final_weights = ScoreWeights {
        price: 0,
        completeness: 100,
        risk: 0,
        data_quality: 0,
    };
    session.set_weights(price_heavy, 0).expect("first change");
    session.set_weights(final_weights, 100).expect("second change");

    // inside the window nothing has recomputed yet
    session.tick(250);
    assert_eq!(
        session.comparison().expect("model").vendor_scores[&pid("p1")].overall,
        overall_before
    );

    // after the window the scores equal one full recompute at the final vector
    session.tick(300);
    let scores = &session.comparison().expect("model").vendor_scores;
    assert_eq!(scores[&pid("p1")].overall, 90);
    assert_eq!(scores[&pid("p2")].overall, 95);
}

#[test]
fn settle_scores_never_leaves_a_stale_display() {
    let mut session = session_in_review();
    session.begin_compare().expect("begin");
    session
        .complete_compare(Ok(comparison_outcome()))
        .expect("results");

    let completeness_only = ScoreWeights {
        price: 0,
        completeness: 100,
        risk: 0,
        data_quality: 0,
    };
    session.set_weights(completeness_only, 0).expect("change");
    session.settle_scores();

    assert_eq!(
        session.comparison().expect("model").vendor_scores[&pid("p1")].overall,
        90
    );
}

#[test]
fn preview_handles_are_lazy_idempotent_and_released_on_exit() {
    let mut session = session_in_review();

    let token_a = session.preview(0).expect("acquire");
    let token_again = session.preview(0).expect("same handle");
    assert_eq!(token_a, token_again);
    session.preview(1).expect("second proposal");
    assert_eq!(session.active_previews(), 2);

    session.begin_compare().expect("begin");
    assert_eq!(session.active_previews(), 0, "released on review exit");

    session
        .complete_compare(Ok(comparison_outcome()))
        .expect("results");
    let token_b = session.preview(0).expect("re-acquired lazily");
    assert_ne!(token_a, token_b, "handles are fresh, not recycled");

    session.restart();
    assert_eq!(session.active_previews(), 0);
    // restarting again releases nothing further and stays clean
    session.restart();
    assert_eq!(session.active_previews(), 0);
    assert_eq!(session.phase(), Phase::Upload);
}

#[test]
fn results_can_return_to_review_for_edit_and_recompare() {
    let mut session = session_in_review();
    session.begin_compare().expect("begin");
    session
        .complete_compare(Ok(comparison_outcome()))
        .expect("results");
    session.preview(0).expect("preview in results");

    session.back_to_review().expect("back-transition");

    assert_eq!(session.phase(), Phase::Review);
    assert_eq!(session.active_previews(), 0);
    // prior results stay loaded until a new comparison replaces them
    assert!(session.comparison().is_some());
}

#[test]
fn phase_guards_reject_out_of_order_operations() {
    let mut session = ComparisonSession::new(session_config());

    match session.begin_compare() {
        Err(SessionError::WrongPhase { phase, .. }) => assert_eq!(phase, "upload"),
        other => panic!("expected phase guard, got {other:?}"),
    }
    match session.stage_edit(ProposalEdit::default()) {
        Err(SessionError::WrongPhase { .. }) => {}
        other => panic!("expected phase guard, got {other:?}"),
    }
    match session.preview(0) {
        Err(SessionError::WrongPhase { .. }) => {}
        other => panic!("expected phase guard, got {other:?}"),
    }
}

#[test]
fn failed_auto_save_marks_the_record_pending_sync() {
    let mut session = session_in_review();

    session
        .mark_save_outcome(0, Err(BackendError::Request("timeout".to_string())))
        .expect("record exists");
    assert!(session.store().proposal(0).expect("p0").pending_sync);

    session.mark_save_outcome(0, Ok(())).expect("record exists");
    assert!(!session.store().proposal(0).expect("p0").pending_sync);
}

#[test]
fn history_rehydrates_into_the_results_shape() {
    let mut session = ComparisonSession::new(session_config());
    let ComparisonOutcome { model, .. } = comparison_outcome();
    let originals = vec![
        proposal("p1", "acme.xlsx", "Acme", 125_000.0),
        proposal("p2", "globex.xlsx", "Globex", 144_000.0),
    ];

    session
        .load_history(model, Some(originals))
        .expect("rehydrate");

    assert_eq!(session.phase(), Phase::Results);
    assert_eq!(session.store().usable_count(), 2);
    let model = session.comparison().expect("model");
    assert_eq!(model.vendor_scores[&pid("p1")].overall, 91);
}
