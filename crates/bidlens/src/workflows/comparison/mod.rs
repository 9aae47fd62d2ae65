//! Interactive proposal comparison and scoring.
//!
//! The session type drives the upload -> extracting -> review -> comparing
//! -> results workflow over an in-memory proposal store; the remaining
//! modules are the pure algorithms that operate on a comparison result:
//! weighted scoring, line-item auto-completion, table sort/filter views,
//! and the tornado/heatmap derivations.

pub mod analytics;
pub mod autocalc;
pub mod domain;
pub mod format;
pub mod insights;
pub mod remote;
pub mod scoring;
pub mod session;
pub mod store;
pub mod table;

#[cfg(test)]
mod tests;

pub use analytics::{build_heatmap, heat_level, tornado_ranking, TornadoEntry, TORNADO_LIMIT};
pub use domain::{
    AlignedItem, CategorySummary, ComparisonModel, CostCategory, ExecutiveSummary, ExtractedTable,
    FlagSeverity, Grade, HeatLevel, HeatmapCell, HeatmapRow, LineItem, MoneyField, ProposalId,
    ProposalRecord, ProposalSummary, RankedVendor, RedFlag, ScoreWeights, SourceKind, SourceRef,
    VendorScore,
};
pub use insights::build_executive_summary;
pub use remote::{
    BackendError, ComparisonBackend, ComparisonOutcome, ExportBlob, ExportFormat, HistoryEntry,
    HistoryRecord, Project, ProjectId,
};
pub use scoring::{recompute_scores, RecomputeDebouncer};
pub use session::{
    ComparisonSession, ErrorCard, Phase, Recovery, SessionConfig, SessionError,
};
pub use store::{
    ExtractionFailure, FileOutcome, PendingFile, ProposalEdit, ProposalStore, StoreError,
};
pub use table::{SortDirection, SortKey, TableQuery};
