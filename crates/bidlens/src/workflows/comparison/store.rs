use serde::{Deserialize, Serialize};

use super::autocalc;
use super::domain::{MoneyField, ProposalRecord, SourceKind};
use super::format::parse_money;

/// A file selected for upload, waiting on extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingFile {
    pub filename: String,
    pub kind: SourceKind,
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contents: Vec<u8>,
}

impl PendingFile {
    pub fn new(filename: impl Into<String>, kind: SourceKind, contents: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            kind,
            size_bytes: contents.len() as u64,
            contents,
        }
    }
}

/// Per-file extraction result returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Extracted {
        filename: String,
        record: ProposalRecord,
    },
    Failed {
        filename: String,
        message: String,
    },
}

/// A file the backend could not extract; reported individually, does not
/// block proceeding while enough proposals succeed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionFailure {
    pub filename: String,
    pub message: String,
}

/// Review-form edits to a proposal's header fields. `None` leaves a field
/// unchanged; `total_raw` is parsed the way an extractor's raw string is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProposalEdit {
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub total_raw: Option<String>,
    #[serde(default)]
    pub contract_term: Option<String>,
    #[serde(default)]
    pub proposal_date: Option<String>,
}

impl ProposalEdit {
    pub fn is_empty(&self) -> bool {
        self.company.is_none()
            && self.total_raw.is_none()
            && self.contract_term.is_none()
            && self.proposal_date.is_none()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no proposal at index {0}")]
    ProposalNotFound(usize),
    #[error("proposal {proposal} has no line item at index {item}")]
    LineItemNotFound { proposal: usize, item: usize },
}

/// Holds the pending uploads and the extracted proposal records for one
/// session. Records are owned here for the whole workflow; a comparison
/// result only refers to them by id.
#[derive(Debug, Default)]
pub struct ProposalStore {
    pending: Vec<PendingFile>,
    proposals: Vec<ProposalRecord>,
    failures: Vec<ExtractionFailure>,
}

impl ProposalStore {
    pub fn with_proposals(proposals: Vec<ProposalRecord>) -> Self {
        Self {
            pending: Vec::new(),
            proposals,
            failures: Vec::new(),
        }
    }

    pub fn add_file(&mut self, file: PendingFile) {
        self.pending.push(file);
    }

    pub fn pending_files(&self) -> &[PendingFile] {
        &self.pending
    }

    /// Hand the pending batch off for extraction, leaving the queue empty.
    pub fn take_pending(&mut self) -> Vec<PendingFile> {
        std::mem::take(&mut self.pending)
    }

    /// Ingest a batch of extraction outcomes. Successful records are
    /// appended; failures are kept for per-file reporting.
    pub fn ingest(&mut self, outcomes: Vec<FileOutcome>) {
        for outcome in outcomes {
            match outcome {
                FileOutcome::Extracted { record, .. } => self.proposals.push(record),
                FileOutcome::Failed { filename, message } => {
                    self.failures.push(ExtractionFailure { filename, message });
                }
            }
        }
    }

    pub fn proposals(&self) -> &[ProposalRecord] {
        &self.proposals
    }

    pub fn proposal(&self, index: usize) -> Result<&ProposalRecord, StoreError> {
        self.proposals
            .get(index)
            .ok_or(StoreError::ProposalNotFound(index))
    }

    pub fn proposal_mut(&mut self, index: usize) -> Result<&mut ProposalRecord, StoreError> {
        self.proposals
            .get_mut(index)
            .ok_or(StoreError::ProposalNotFound(index))
    }

    pub fn usable_count(&self) -> usize {
        self.proposals.len()
    }

    pub fn failures(&self) -> &[ExtractionFailure] {
        &self.failures
    }

    /// Apply review-form edits to a proposal's header fields.
    pub fn apply_edit(&mut self, index: usize, edit: &ProposalEdit) -> Result<(), StoreError> {
        let record = self.proposal_mut(index)?;

        if let Some(company) = &edit.company {
            record.company = if company.trim().is_empty() {
                None
            } else {
                Some(company.trim().to_string())
            };
        }
        if let Some(raw) = &edit.total_raw {
            record.total = parse_money(raw);
            record.total_raw = raw.clone();
        }
        if let Some(term) = &edit.contract_term {
            record.contract_term = if term.trim().is_empty() {
                None
            } else {
                Some(term.trim().to_string())
            };
        }
        if let Some(date) = &edit.proposal_date {
            record.proposal_date = if date.trim().is_empty() {
                None
            } else {
                Some(date.trim().to_string())
            };
        }

        Ok(())
    }

    /// Apply a direct edit to one money field of a line item, then let the
    /// auto-calculator fill the missing third field if the row qualifies.
    pub fn edit_line_item(
        &mut self,
        proposal: usize,
        item: usize,
        field: MoneyField,
        value: Option<f64>,
    ) -> Result<Option<MoneyField>, StoreError> {
        let record = self.proposal_mut(proposal)?;
        let line_item = record
            .line_items
            .get_mut(item)
            .ok_or(StoreError::LineItemNotFound { proposal, item })?;

        autocalc::set_field(line_item, field, value);
        Ok(autocalc::complete_line_item(line_item))
    }

    /// Discard everything; used when the workflow restarts.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.proposals.clear();
        self.failures.clear();
    }
}
