use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Identifier wrapper for server-assigned proposals.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProposalId(pub String);

/// Document formats accepted for extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Xlsx,
    Docx,
    Pdf,
}

impl SourceKind {
    pub const fn label(self) -> &'static str {
        match self {
            SourceKind::Xlsx => "xlsx",
            SourceKind::Docx => "docx",
            SourceKind::Pdf => "pdf",
        }
    }

    pub fn from_filename(filename: &str) -> Option<Self> {
        let extension = filename.rsplit_once('.').map(|(_, ext)| ext)?;
        match extension.to_ascii_lowercase().as_str() {
            "xlsx" | "xls" => Some(SourceKind::Xlsx),
            "docx" | "doc" => Some(SourceKind::Docx),
            "pdf" => Some(SourceKind::Pdf),
            _ => None,
        }
    }
}

/// Closed set of cost categories a line item may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostCategory {
    Labor,
    Material,
    Software,
    License,
    Travel,
    Training,
    Odc,
    Subcontract,
    Overhead,
    Fee,
    Other,
}

impl CostCategory {
    pub const fn label(self) -> &'static str {
        match self {
            CostCategory::Labor => "Labor",
            CostCategory::Material => "Material",
            CostCategory::Software => "Software",
            CostCategory::License => "License",
            CostCategory::Travel => "Travel",
            CostCategory::Training => "Training",
            CostCategory::Odc => "ODC",
            CostCategory::Subcontract => "Subcontract",
            CostCategory::Overhead => "Overhead",
            CostCategory::Fee => "Fee",
            CostCategory::Other => "Other",
        }
    }

    /// Map a free-form category name from an extractor or worksheet column
    /// onto the closed set. Unknown names stay uncategorized.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "labor" | "labour" => Some(CostCategory::Labor),
            "material" | "materials" => Some(CostCategory::Material),
            "software" => Some(CostCategory::Software),
            "license" | "licenses" | "licensing" => Some(CostCategory::License),
            "travel" => Some(CostCategory::Travel),
            "training" => Some(CostCategory::Training),
            "odc" | "other direct costs" => Some(CostCategory::Odc),
            "subcontract" | "subcontractor" | "subcontracts" => Some(CostCategory::Subcontract),
            "overhead" => Some(CostCategory::Overhead),
            "fee" | "fees" => Some(CostCategory::Fee),
            "other" | "misc" | "miscellaneous" => Some(CostCategory::Other),
            _ => None,
        }
    }
}

/// The three mutually-deriving money fields of a line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoneyField {
    Amount,
    Quantity,
    UnitPrice,
}

/// Position of an extracted row inside its source document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<u32>,
}

/// One financial row inside a proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    #[serde(default)]
    pub category: Option<CostCategory>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub amount_raw: String,
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub unit_price: Option<f64>,
    #[serde(default)]
    pub source: SourceRef,
    pub confidence: f32,
    /// Which money field, if any, was filled by the auto-calculator rather
    /// than entered or extracted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived: Option<MoneyField>,
}

impl LineItem {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            category: None,
            amount: None,
            amount_raw: String::new(),
            quantity: None,
            unit_price: None,
            source: SourceRef::default(),
            confidence: 1.0,
            derived: None,
        }
    }
}

/// A raw table captured during extraction, kept for review display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedTable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// One extracted proposal document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ProposalId>,
    pub filename: String,
    pub source_kind: SourceKind,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub total: Option<f64>,
    #[serde(default)]
    pub total_raw: String,
    #[serde(default)]
    pub contract_term: Option<String>,
    #[serde(default)]
    pub proposal_date: Option<String>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub tables: Vec<ExtractedTable>,
    #[serde(default)]
    pub notes: Vec<String>,
    /// Set when a best-effort save failed, so the remote copy is stale
    /// until the next successful save.
    #[serde(default)]
    pub pending_sync: bool,
}

impl ProposalRecord {
    pub fn new(filename: impl Into<String>, source_kind: SourceKind) -> Self {
        Self {
            id: None,
            filename: filename.into(),
            source_kind,
            company: None,
            total: None,
            total_raw: String::new(),
            contract_term: None,
            proposal_date: None,
            line_items: Vec::new(),
            tables: Vec::new(),
            notes: Vec::new(),
            pending_sync: false,
        }
    }

    /// Grand total: the detected document total, falling back to the sum of
    /// line-item amounts when no total was extracted.
    pub fn effective_total(&self) -> Option<f64> {
        if self.total.is_some() {
            return self.total;
        }

        let summed: f64 = self.line_items.iter().filter_map(|item| item.amount).sum();
        if summed > 0.0 {
            Some(summed)
        } else {
            None
        }
    }

    pub fn display_name(&self) -> &str {
        self.company.as_deref().unwrap_or(&self.filename)
    }
}

/// One row of the comparison table, aligned across vendors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedItem {
    pub description: String,
    #[serde(default)]
    pub category: Option<CostCategory>,
    /// Proposal id -> amount; an absent key means no comparable item was
    /// found for that vendor.
    pub amounts: BTreeMap<ProposalId, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variance_pct: Option<f64>,
}

impl AlignedItem {
    /// Percentage spread `(max - min) / min * 100` over the present,
    /// strictly positive amounts. Undefined with fewer than two such values.
    pub fn variance_over(amounts: &BTreeMap<ProposalId, f64>) -> Option<f64> {
        let mut positive: Vec<f64> = amounts.values().copied().filter(|a| *a > 0.0).collect();
        if positive.len() < 2 {
            return None;
        }
        positive.sort_by(f64::total_cmp);
        let min = positive[0];
        let max = positive[positive.len() - 1];
        Some((max - min) / min * 100.0)
    }

    pub fn recompute_variance(&mut self) {
        self.variance_pct = Self::variance_over(&self.amounts);
    }
}

/// Severity attached to a red flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagSeverity {
    Critical,
    Warning,
    Info,
}

impl FlagSeverity {
    pub const fn label(self) -> &'static str {
        match self {
            FlagSeverity::Critical => "Critical",
            FlagSeverity::Warning => "Warning",
            FlagSeverity::Info => "Info",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedFlag {
    pub severity: FlagSeverity,
    pub kind: String,
    pub title: String,
    pub detail: String,
}

/// Discrete bucket for a vendor's deviation from the row average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeatLevel {
    VeryLow,
    Low,
    Neutral,
    High,
    VeryHigh,
    Missing,
}

impl HeatLevel {
    pub const fn label(self) -> &'static str {
        match self {
            HeatLevel::VeryLow => "very_low",
            HeatLevel::Low => "low",
            HeatLevel::Neutral => "neutral",
            HeatLevel::High => "high",
            HeatLevel::VeryHigh => "very_high",
            HeatLevel::Missing => "missing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapCell {
    pub level: HeatLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deviation_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapRow {
    pub description: String,
    pub cells: BTreeMap<ProposalId, HeatmapCell>,
}

/// Letter grade derived from an overall weighted score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub const fn from_overall(overall: u8) -> Self {
        match overall {
            90..=u8::MAX => Grade::A,
            80..=89 => Grade::B,
            70..=79 => Grade::C,
            60..=69 => Grade::D,
            _ => Grade::F,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}

/// Component and derived scores for one vendor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorScore {
    pub price_score: u8,
    pub completeness_score: u8,
    pub risk_score: u8,
    pub data_quality_score: u8,
    pub overall: u8,
    pub grade: Grade,
    pub red_flag_count: usize,
    pub critical_flags: usize,
}

/// Weight vector applied to the four component scores. Integer percentages;
/// the scoring engine normalizes by the actual sum, so the components need
/// not add up to 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub price: u8,
    pub completeness: u8,
    pub risk: u8,
    pub data_quality: u8,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            price: 40,
            completeness: 25,
            risk: 25,
            data_quality: 10,
        }
    }
}

impl ScoreWeights {
    pub fn sum(&self) -> u32 {
        self.price as u32 + self.completeness as u32 + self.risk as u32 + self.data_quality as u32
    }
}

/// Per-category subtotals across vendors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub subtotals: BTreeMap<ProposalId, f64>,
    pub item_count: usize,
}

/// Slim proposal reference carried inside a comparison result; the full
/// records stay owned by the proposal store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalSummary {
    pub id: ProposalId,
    pub company: Option<String>,
    pub filename: String,
    pub total: Option<f64>,
}

/// One entry of a price or score ranking, best first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedVendor {
    pub id: ProposalId,
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutiveSummary {
    pub price_ranking: Vec<RankedVendor>,
    pub score_ranking: Vec<RankedVendor>,
    pub key_findings: Vec<String>,
    pub negotiation_opportunities: Vec<String>,
}

/// The aligned, cross-vendor result of a comparison. Replaced wholesale on
/// every new comparison; only the scoring engine mutates scores in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonModel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison_id: Option<String>,
    pub proposals: Vec<ProposalSummary>,
    pub aligned_items: Vec<AlignedItem>,
    pub totals: BTreeMap<ProposalId, f64>,
    pub category_summaries: BTreeMap<CostCategory, CategorySummary>,
    pub red_flags: BTreeMap<ProposalId, Vec<RedFlag>>,
    pub heatmap: Vec<HeatmapRow>,
    pub vendor_scores: BTreeMap<ProposalId, VendorScore>,
    pub executive_summary: ExecutiveSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amounts(pairs: &[(&str, f64)]) -> BTreeMap<ProposalId, f64> {
        pairs
            .iter()
            .map(|(id, amount)| (ProposalId(id.to_string()), *amount))
            .collect()
    }

    #[test]
    fn variance_requires_two_positive_amounts() {
        assert_eq!(AlignedItem::variance_over(&amounts(&[("a", 100.0)])), None);
        assert_eq!(
            AlignedItem::variance_over(&amounts(&[("a", 100.0), ("b", 0.0)])),
            None
        );
        let variance = AlignedItem::variance_over(&amounts(&[("a", 100.0), ("b", 150.0)]))
            .expect("two positive amounts");
        assert!((variance - 50.0).abs() < 1e-9);
    }

    #[test]
    fn grade_boundaries_are_exact() {
        assert_eq!(Grade::from_overall(90), Grade::A);
        assert_eq!(Grade::from_overall(89), Grade::B);
        assert_eq!(Grade::from_overall(80), Grade::B);
        assert_eq!(Grade::from_overall(79), Grade::C);
        assert_eq!(Grade::from_overall(70), Grade::C);
        assert_eq!(Grade::from_overall(69), Grade::D);
        assert_eq!(Grade::from_overall(60), Grade::D);
        assert_eq!(Grade::from_overall(59), Grade::F);
    }

    #[test]
    fn source_kind_detection_uses_extension() {
        assert_eq!(SourceKind::from_filename("bid.XLSX"), Some(SourceKind::Xlsx));
        assert_eq!(SourceKind::from_filename("quote.docx"), Some(SourceKind::Docx));
        assert_eq!(SourceKind::from_filename("scan.pdf"), Some(SourceKind::Pdf));
        assert_eq!(SourceKind::from_filename("notes.txt"), None);
        assert_eq!(SourceKind::from_filename("no-extension"), None);
    }

    #[test]
    fn effective_total_prefers_extracted_total() {
        let mut record = ProposalRecord::new("bid.xlsx", SourceKind::Xlsx);
        let mut item = LineItem::new("Labor");
        item.amount = Some(100.0);
        record.line_items.push(item);
        assert_eq!(record.effective_total(), Some(100.0));

        record.total = Some(250.0);
        assert_eq!(record.effective_total(), Some(250.0));
    }

    #[test]
    fn category_names_map_onto_closed_set() {
        assert_eq!(CostCategory::from_name("  LABOR "), Some(CostCategory::Labor));
        assert_eq!(
            CostCategory::from_name("Other Direct Costs"),
            Some(CostCategory::Odc)
        );
        assert_eq!(CostCategory::from_name("consulting"), None);
    }
}
