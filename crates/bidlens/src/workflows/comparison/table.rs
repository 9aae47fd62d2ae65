use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::domain::{AlignedItem, CostCategory, ProposalId};

/// Sort key for the aligned-item table. Sorting by a vendor column compares
/// that vendor's amount per row, treating a missing amount as 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "by", content = "vendor")]
pub enum SortKey {
    Description,
    Category,
    Variance,
    Vendor(ProposalId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub const fn toggled(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// Current sort and filter controls. Filters apply before sorting; the
/// underlying item list is never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableQuery {
    pub sort: SortKey,
    pub direction: SortDirection,
    /// Minimum variance percentage; 0 disables the filter.
    pub min_variance_pct: f64,
    pub category: Option<CostCategory>,
}

impl Default for TableQuery {
    fn default() -> Self {
        Self {
            sort: SortKey::Description,
            direction: SortDirection::Asc,
            min_variance_pct: 0.0,
            category: None,
        }
    }
}

/// Sort label used when a row has no category, so uncategorized rows group
/// last under every collation.
const UNCATEGORIZED_SORT_KEY: &str = "zzz";

pub const UNCATEGORIZED_LABEL: &str = "Uncategorized";

fn category_sort_key(item: &AlignedItem) -> String {
    match item.category {
        Some(category) => category.label().to_lowercase(),
        None => UNCATEGORIZED_SORT_KEY.to_string(),
    }
}

fn vendor_amount(item: &AlignedItem, vendor: &ProposalId) -> f64 {
    item.amounts.get(vendor).copied().unwrap_or(0.0)
}

fn compare(a: &AlignedItem, b: &AlignedItem, sort: &SortKey) -> Ordering {
    match sort {
        SortKey::Description => a
            .description
            .to_lowercase()
            .cmp(&b.description.to_lowercase()),
        SortKey::Category => category_sort_key(a)
            .cmp(&category_sort_key(b))
            .then_with(|| a.description.to_lowercase().cmp(&b.description.to_lowercase())),
        SortKey::Variance => a
            .variance_pct
            .unwrap_or(0.0)
            .total_cmp(&b.variance_pct.unwrap_or(0.0)),
        SortKey::Vendor(vendor) => vendor_amount(a, vendor).total_cmp(&vendor_amount(b, vendor)),
    }
}

/// Produce the filtered, sorted view of the aligned items. Descending order
/// is the exact mirror of ascending, so flipping direction reverses row
/// order within equal-key groups as well.
pub fn view<'a>(items: &'a [AlignedItem], query: &TableQuery) -> Vec<&'a AlignedItem> {
    let mut rows: Vec<&AlignedItem> = items
        .iter()
        .filter(|item| {
            if query.min_variance_pct > 0.0 {
                match item.variance_pct {
                    Some(variance) if variance >= query.min_variance_pct => {}
                    _ => return false,
                }
            }
            match query.category {
                Some(category) => item.category == Some(category),
                None => true,
            }
        })
        .collect();

    rows.sort_by(|a, b| compare(a, b, &query.sort));
    if query.direction == SortDirection::Desc {
        rows.reverse();
    }
    rows
}
