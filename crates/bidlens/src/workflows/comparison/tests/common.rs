use std::collections::BTreeMap;

use crate::workflows::comparison::domain::{
    AlignedItem, ComparisonModel, CostCategory, ExecutiveSummary, Grade, LineItem, ProposalId,
    ProposalRecord, ProposalSummary, SourceKind, VendorScore,
};
use crate::workflows::comparison::remote::ComparisonOutcome;
use crate::workflows::comparison::session::{ComparisonSession, SessionConfig};
use crate::workflows::comparison::store::{FileOutcome, PendingFile};

pub(super) fn pid(id: &str) -> ProposalId {
    ProposalId(id.to_string())
}

pub(super) fn amounts(pairs: &[(&str, f64)]) -> BTreeMap<ProposalId, f64> {
    pairs
        .iter()
        .map(|(id, amount)| (pid(id), *amount))
        .collect()
}

pub(super) fn aligned(
    description: &str,
    category: Option<CostCategory>,
    pairs: &[(&str, f64)],
) -> AlignedItem {
    let mut item = AlignedItem {
        description: description.to_string(),
        category,
        amounts: amounts(pairs),
        variance_pct: None,
    };
    item.recompute_variance();
    item
}

pub(super) fn vendor_score(
    price: u8,
    completeness: u8,
    risk: u8,
    data_quality: u8,
) -> VendorScore {
    VendorScore {
        price_score: price,
        completeness_score: completeness,
        risk_score: risk,
        data_quality_score: data_quality,
        overall: 0,
        grade: Grade::F,
        red_flag_count: 0,
        critical_flags: 0,
    }
}

pub(super) fn proposal(
    id: &str,
    filename: &str,
    company: &str,
    total: f64,
) -> ProposalRecord {
    let mut record = ProposalRecord::new(filename, SourceKind::Xlsx);
    record.id = Some(pid(id));
    record.company = Some(company.to_string());
    record.total = Some(total);
    let mut item = LineItem::new("Labor");
    item.category = Some(CostCategory::Labor);
    item.amount = Some(total);
    record.line_items.push(item);
    record
}

pub(super) fn extracted(id: &str, filename: &str, company: &str, total: f64) -> FileOutcome {
    FileOutcome::Extracted {
        filename: filename.to_string(),
        record: proposal(id, filename, company, total),
    }
}

pub(super) fn failed(filename: &str, message: &str) -> FileOutcome {
    FileOutcome::Failed {
        filename: filename.to_string(),
        message: message.to_string(),
    }
}

pub(super) fn pending_file(filename: &str) -> PendingFile {
    PendingFile::new(filename, SourceKind::Xlsx, b"stub".to_vec())
}

/// A minimal but internally consistent two-vendor comparison model.
pub(super) fn sample_model() -> ComparisonModel {
    let items = vec![
        aligned(
            "Senior Engineer",
            Some(CostCategory::Labor),
            &[("p1", 100_000.0), ("p2", 120_000.0)],
        ),
        aligned(
            "Workstations",
            Some(CostCategory::Material),
            &[("p1", 25_000.0), ("p2", 24_000.0)],
        ),
    ];

    let mut vendor_scores = BTreeMap::new();
    vendor_scores.insert(pid("p1"), vendor_score(95, 90, 85, 90));
    vendor_scores.insert(pid("p2"), vendor_score(80, 95, 90, 85));

    let mut totals = BTreeMap::new();
    totals.insert(pid("p1"), 125_000.0);
    totals.insert(pid("p2"), 144_000.0);

    ComparisonModel {
        comparison_id: None,
        proposals: vec![
            ProposalSummary {
                id: pid("p1"),
                company: Some("Acme".to_string()),
                filename: "acme.xlsx".to_string(),
                total: Some(125_000.0),
            },
            ProposalSummary {
                id: pid("p2"),
                company: Some("Globex".to_string()),
                filename: "globex.pdf".to_string(),
                total: Some(144_000.0),
            },
        ],
        aligned_items: items,
        totals,
        category_summaries: BTreeMap::new(),
        red_flags: BTreeMap::new(),
        heatmap: Vec::new(),
        vendor_scores,
        executive_summary: ExecutiveSummary::default(),
    }
}

pub(super) fn comparison_outcome() -> ComparisonOutcome {
    ComparisonOutcome {
        comparison_id: "cmp-001".to_string(),
        model: sample_model(),
    }
}

pub(super) fn session_config() -> SessionConfig {
    SessionConfig {
        min_proposals: 2,
        debounce_ms: 200,
        tornado_limit: 12,
    }
}

/// Drive a fresh session through upload and extraction into review.
pub(super) fn session_in_review() -> ComparisonSession {
    let mut session = ComparisonSession::new(session_config());
    session.add_file(pending_file("acme.xlsx")).expect("add file");
    session.add_file(pending_file("globex.xlsx")).expect("add file");
    let files = session.begin_extraction().expect("begin extraction");
    assert_eq!(files.len(), 2);
    session
        .complete_extraction(vec![
            extracted("p1", "acme.xlsx", "Acme", 125_000.0),
            extracted("p2", "globex.xlsx", "Globex", 144_000.0),
        ])
        .expect("complete extraction");
    session
}
