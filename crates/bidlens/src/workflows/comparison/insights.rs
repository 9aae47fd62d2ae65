use std::collections::BTreeMap;

use super::analytics::TornadoEntry;
use super::domain::{
    ExecutiveSummary, FlagSeverity, ProposalId, ProposalSummary, RankedVendor, RedFlag,
    VendorScore,
};
use super::format::{format_currency, format_pct};

fn vendor_name(proposals: &[ProposalSummary], id: &ProposalId) -> String {
    proposals
        .iter()
        .find(|proposal| &proposal.id == id)
        .map(|proposal| {
            proposal
                .company
                .clone()
                .unwrap_or_else(|| proposal.filename.clone())
        })
        .unwrap_or_else(|| id.0.clone())
}

/// Derive the executive summary from the comparison parts: price and score
/// rankings, key findings, and negotiation opportunities drawn from the
/// largest line-item spreads.
pub fn build_executive_summary(
    proposals: &[ProposalSummary],
    totals: &BTreeMap<ProposalId, f64>,
    vendor_scores: &BTreeMap<ProposalId, VendorScore>,
    red_flags: &BTreeMap<ProposalId, Vec<RedFlag>>,
    tornado: &[TornadoEntry],
) -> ExecutiveSummary {
    let mut price_ranking: Vec<RankedVendor> = totals
        .iter()
        .map(|(id, total)| RankedVendor {
            id: id.clone(),
            name: vendor_name(proposals, id),
            value: *total,
        })
        .collect();
    price_ranking.sort_by(|a, b| a.value.total_cmp(&b.value));

    let mut score_ranking: Vec<RankedVendor> = vendor_scores
        .iter()
        .map(|(id, score)| RankedVendor {
            id: id.clone(),
            name: vendor_name(proposals, id),
            value: score.overall as f64,
        })
        .collect();
    score_ranking.sort_by(|a, b| b.value.total_cmp(&a.value));

    let mut key_findings = Vec::new();

    if let (Some(cheapest), Some(priciest)) = (price_ranking.first(), price_ranking.last()) {
        if price_ranking.len() >= 2 && cheapest.value > 0.0 {
            let delta_pct = (priciest.value - cheapest.value) / cheapest.value * 100.0;
            key_findings.push(format!(
                "{} is lowest at {}; {} is {} higher",
                cheapest.name,
                format_currency(cheapest.value),
                priciest.name,
                format_pct(delta_pct)
            ));
        }
    }

    if let Some(leader) = score_ranking.first() {
        if let Some(score) = vendor_scores.get(&leader.id) {
            key_findings.push(format!(
                "{} leads the weighted scoring with {} ({})",
                leader.name,
                score.overall,
                score.grade.label()
            ));
        }
    }

    let critical_total: usize = red_flags
        .values()
        .flatten()
        .filter(|flag| flag.severity == FlagSeverity::Critical)
        .count();
    if critical_total > 0 {
        key_findings.push(format!(
            "{critical_total} critical flag(s) require review before award"
        ));
    }

    let mut negotiation_opportunities = Vec::new();
    for entry in tornado.iter().take(3) {
        negotiation_opportunities.push(format!(
            "{}: {} spread between {} and {}",
            entry.description,
            format_currency(entry.spread),
            format_currency(entry.low),
            format_currency(entry.high)
        ));
    }

    ExecutiveSummary {
        price_ranking,
        score_ranking,
        key_findings,
        negotiation_opportunities,
    }
}
