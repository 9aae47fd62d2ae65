use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::domain::{ComparisonModel, ProposalId, ProposalRecord};
use super::store::{FileOutcome, PendingFile};

/// Identifier wrapper for projects managed by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectId(pub String);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub description: String,
    pub proposal_count: usize,
}

/// A persisted comparison available for rehydration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub created_at: NaiveDateTime,
    pub title: String,
    pub proposal_count: usize,
}

/// Stored comparison payload: the model plus, when the backend kept them,
/// the original input proposals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub model: ComparisonModel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposals: Option<Vec<ProposalRecord>>,
}

/// Successful compare response: the model and its persisted identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonOutcome {
    pub comparison_id: String,
    pub model: ComparisonModel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Xlsx,
    Html,
}

impl ExportFormat {
    pub fn content_type(self) -> mime::Mime {
        match self {
            ExportFormat::Html => mime::TEXT_HTML,
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
                    .parse()
                    .unwrap_or(mime::APPLICATION_OCTET_STREAM)
            }
        }
    }

    pub const fn extension(self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Html => "html",
        }
    }
}

/// Export artifact handed back to the caller verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportBlob {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("backend request failed: {0}")]
    Request(String),
    #[error("backend returned malformed data: {0}")]
    Malformed(String),
    #[error("not found: {0}")]
    NotFound(String),
}

/// The remote collaborator the core consumes. Transport is an
/// implementation detail; these semantics are not.
pub trait ComparisonBackend: Send + Sync {
    fn list_projects(&self) -> Result<Vec<Project>, BackendError>;
    fn create_project(&self, name: &str, description: &str) -> Result<Project, BackendError>;
    fn project_proposals(&self, project: &ProjectId)
        -> Result<Vec<ProposalRecord>, BackendError>;
    fn delete_proposal(&self, id: &ProposalId) -> Result<(), BackendError>;
    fn move_proposal(&self, id: &ProposalId, target: &ProjectId) -> Result<(), BackendError>;

    /// Extract every file in the batch, reporting per-file success or
    /// failure; a failed file never fails the batch.
    fn upload_and_extract(
        &self,
        files: Vec<PendingFile>,
        project: Option<&ProjectId>,
    ) -> Result<Vec<FileOutcome>, BackendError>;

    /// Best-effort persistence of review edits; callers treat failure as a
    /// warning, not an interruption.
    fn save_proposal_edits(
        &self,
        id: &ProposalId,
        record: &ProposalRecord,
    ) -> Result<(), BackendError>;

    fn compare(
        &self,
        proposals: &[ProposalRecord],
        project: Option<&ProjectId>,
    ) -> Result<ComparisonOutcome, BackendError>;

    fn export(
        &self,
        model: &ComparisonModel,
        format: ExportFormat,
    ) -> Result<ExportBlob, BackendError>;

    fn list_history(&self) -> Result<Vec<HistoryEntry>, BackendError>;
    fn load_history(&self, id: &str) -> Result<HistoryRecord, BackendError>;
    fn delete_history(&self, id: &str) -> Result<(), BackendError>;
}

/// Validate an extracted record at the boundary before it enters the store.
pub fn validate_record(record: &ProposalRecord) -> Result<(), BackendError> {
    if record.filename.trim().is_empty() {
        return Err(BackendError::Malformed("record without a filename".into()));
    }

    if let Some(total) = record.total {
        if !total.is_finite() {
            return Err(BackendError::Malformed(format!(
                "non-finite total in '{}'",
                record.filename
            )));
        }
    }

    for (index, item) in record.line_items.iter().enumerate() {
        if !(0.0..=1.0).contains(&item.confidence) {
            return Err(BackendError::Malformed(format!(
                "line item {index} of '{}' has confidence {} outside 0..=1",
                record.filename, item.confidence
            )));
        }
        for value in [item.amount, item.quantity, item.unit_price]
            .into_iter()
            .flatten()
        {
            if !value.is_finite() {
                return Err(BackendError::Malformed(format!(
                    "line item {index} of '{}' carries a non-finite value",
                    record.filename
                )));
            }
        }
    }

    Ok(())
}

/// Validate a comparison model at the boundary. Rejecting a malformed
/// response here keeps `null`-shaped data out of the scoring chain.
pub fn validate_model(model: &ComparisonModel) -> Result<(), BackendError> {
    if model.proposals.is_empty() {
        return Err(BackendError::Malformed(
            "comparison without proposals".into(),
        ));
    }

    let known: BTreeSet<&ProposalId> = model.proposals.iter().map(|p| &p.id).collect();

    let referenced = model
        .totals
        .keys()
        .chain(model.vendor_scores.keys())
        .chain(model.red_flags.keys())
        .chain(model.aligned_items.iter().flat_map(|item| item.amounts.keys()));
    for id in referenced {
        if !known.contains(id) {
            return Err(BackendError::Malformed(format!(
                "reference to unknown proposal id '{}'",
                id.0
            )));
        }
    }

    for (id, score) in &model.vendor_scores {
        let components = [
            score.price_score,
            score.completeness_score,
            score.risk_score,
            score.data_quality_score,
            score.overall,
        ];
        if components.iter().any(|component| *component > 100) {
            return Err(BackendError::Malformed(format!(
                "vendor score for '{}' outside 0..=100",
                id.0
            )));
        }
    }

    for item in &model.aligned_items {
        if item.amounts.values().any(|amount| !amount.is_finite()) {
            return Err(BackendError::Malformed(format!(
                "non-finite amount in aligned item '{}'",
                item.description
            )));
        }
    }

    Ok(())
}
