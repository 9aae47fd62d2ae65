use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{AlignedItem, CostCategory, HeatLevel, HeatmapCell, HeatmapRow, ProposalId};

/// Default cap on tornado entries; ranking past this point stops being a
/// negotiation aid.
pub const TORNADO_LIMIT: usize = 12;

/// One bar of the price-spread ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TornadoEntry {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<CostCategory>,
    pub low: f64,
    pub high: f64,
    pub spread: f64,
    /// Display-intensity percentage, computed over the same positive-amount
    /// set as the spread. Independent of `AlignedItem::variance_pct`.
    pub variance_pct: f64,
}

/// Rank aligned items by absolute price spread, largest first.
///
/// Items with fewer than two present, strictly positive amounts are skipped,
/// as are items whose spread is not positive.
pub fn tornado_ranking(items: &[AlignedItem], limit: usize) -> Vec<TornadoEntry> {
    let mut entries: Vec<TornadoEntry> = items
        .iter()
        .filter_map(|item| {
            let positive: Vec<f64> = item
                .amounts
                .values()
                .copied()
                .filter(|amount| *amount > 0.0)
                .collect();
            if positive.len() < 2 {
                return None;
            }

            let low = positive.iter().copied().fold(f64::INFINITY, f64::min);
            let high = positive.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let spread = high - low;
            if spread <= 0.0 {
                return None;
            }

            Some(TornadoEntry {
                description: item.description.clone(),
                category: item.category,
                low,
                high,
                spread,
                variance_pct: (high - low) / low * 100.0,
            })
        })
        .collect();

    entries.sort_by(|a, b| b.spread.total_cmp(&a.spread));
    entries.truncate(limit);
    entries
}

/// Bucket a deviation-from-average percentage. The neutral band is the
/// inclusive `[-5, +5]`; the outer boundaries `-15` and `+15` belong to the
/// `low`/`high` buckets.
pub fn heat_level(deviation_pct: f64) -> HeatLevel {
    if deviation_pct < -15.0 {
        HeatLevel::VeryLow
    } else if deviation_pct < -5.0 {
        HeatLevel::Low
    } else if deviation_pct <= 5.0 {
        HeatLevel::Neutral
    } else if deviation_pct <= 15.0 {
        HeatLevel::High
    } else {
        HeatLevel::VeryHigh
    }
}

/// Build heatmap rows for every comparable aligned item (two or more present
/// amounts). Each vendor in `vendors` gets a cell; vendors without an amount
/// get a `missing` cell rather than a zero.
pub fn build_heatmap(items: &[AlignedItem], vendors: &[ProposalId]) -> Vec<HeatmapRow> {
    items
        .iter()
        .filter_map(|item| {
            if item.amounts.len() < 2 {
                return None;
            }

            let count = item.amounts.len() as f64;
            let average: f64 = item.amounts.values().sum::<f64>() / count;
            if average == 0.0 {
                return None;
            }

            let cells: BTreeMap<ProposalId, HeatmapCell> = vendors
                .iter()
                .map(|vendor| {
                    let cell = match item.amounts.get(vendor) {
                        Some(amount) => {
                            let deviation_pct = (amount - average) / average * 100.0;
                            HeatmapCell {
                                level: heat_level(deviation_pct),
                                amount: Some(*amount),
                                deviation_pct: Some(deviation_pct),
                            }
                        }
                        None => HeatmapCell {
                            level: HeatLevel::Missing,
                            amount: None,
                            deviation_pct: None,
                        },
                    };
                    (vendor.clone(), cell)
                })
                .collect();

            Some(HeatmapRow {
                description: item.description.clone(),
                cells,
            })
        })
        .collect()
}
