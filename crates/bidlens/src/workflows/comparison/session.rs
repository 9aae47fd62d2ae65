use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::analytics::{self, TornadoEntry};
use super::domain::{AlignedItem, ComparisonModel, ProposalRecord, ScoreWeights};
use super::remote::{self, BackendError, ComparisonOutcome};
use super::scoring::{recompute_scores, RecomputeDebouncer};
use super::store::{FileOutcome, PendingFile, ProposalEdit, ProposalStore, StoreError};
use super::table::{self, TableQuery};

/// Workflow phases, in forward order. `results -> review` and
/// any phase -> `upload` are the only back-transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Upload,
    Extracting,
    Review,
    Comparing,
    Results,
}

impl Phase {
    pub const fn label(self) -> &'static str {
        match self {
            Phase::Upload => "upload",
            Phase::Extracting => "extracting",
            Phase::Review => "review",
            Phase::Comparing => "comparing",
            Phase::Results => "results",
        }
    }
}

/// Recovery action offered alongside an error card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recovery {
    Restart,
    RetryCompare,
}

/// User-visible error state; the workflow is always recoverable through the
/// attached action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorCard {
    pub message: String,
    pub recovery: Recovery,
}

/// Tuning knobs for a comparison session.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Minimum usable proposals before a comparison can run.
    pub min_proposals: usize,
    /// Coalescing window for weight-slider recomputes, in milliseconds.
    pub debounce_ms: u64,
    /// Cap on tornado ranking entries.
    pub tornado_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_proposals: 2,
            debounce_ms: 200,
            tornado_limit: analytics::TORNADO_LIMIT,
        }
    }
}

/// Transient document-preview handles, one per proposal, acquired lazily and
/// owned by the session. Releasing is idempotent; tokens are never reused.
#[derive(Debug, Default)]
struct PreviewRegistry {
    next_token: u64,
    active: BTreeMap<usize, u64>,
}

impl PreviewRegistry {
    fn acquire(&mut self, proposal_index: usize) -> u64 {
        if let Some(token) = self.active.get(&proposal_index) {
            return *token;
        }
        self.next_token += 1;
        let token = self.next_token;
        self.active.insert(proposal_index, token);
        token
    }

    /// Release every outstanding handle, returning how many were released.
    /// A second call finds nothing and releases nothing.
    fn release_all(&mut self) -> usize {
        let released = self.active.len();
        self.active.clear();
        released
    }

    fn active_count(&self) -> usize {
        self.active.len()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("select at least {required} file(s) before extracting; {selected} selected")]
    NotEnoughFiles { required: usize, selected: usize },
    #[error("at least {required} usable proposals are needed; {available} available")]
    NotEnoughProposals { required: usize, available: usize },
    #[error("{action} is not available in the {phase} phase")]
    WrongPhase {
        action: &'static str,
        phase: &'static str,
    },
    #[error("no comparison results are loaded")]
    NoComparison,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// One user's comparison workflow: proposal store, phase state, comparison
/// results, and scoring state. Sessions are self-contained values; nothing
/// is shared globally, so several can run side by side.
#[derive(Debug)]
pub struct ComparisonSession {
    config: SessionConfig,
    phase: Phase,
    store: ProposalStore,
    /// Proposals the active project already supplied when the session began;
    /// they count toward the minimum but were not uploaded here.
    existing_count: usize,
    review_cursor: usize,
    open_editors: BTreeSet<usize>,
    draft: Option<(usize, ProposalEdit)>,
    previews: PreviewRegistry,
    comparison: Option<ComparisonModel>,
    weights: ScoreWeights,
    debouncer: RecomputeDebouncer,
    error_card: Option<ErrorCard>,
}

impl ComparisonSession {
    pub fn new(config: SessionConfig) -> Self {
        Self::with_existing(config, Vec::new())
    }

    /// Start a session over a project that already holds some proposals.
    pub fn with_existing(config: SessionConfig, existing: Vec<ProposalRecord>) -> Self {
        let existing_count = existing.len();
        Self {
            config,
            phase: Phase::Upload,
            store: ProposalStore::with_proposals(existing),
            existing_count,
            review_cursor: 0,
            open_editors: BTreeSet::new(),
            draft: None,
            previews: PreviewRegistry::default(),
            comparison: None,
            weights: ScoreWeights::default(),
            debouncer: RecomputeDebouncer::new(config.debounce_ms),
            error_card: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn store(&self) -> &ProposalStore {
        &self.store
    }

    pub fn comparison(&self) -> Option<&ComparisonModel> {
        self.comparison.as_ref()
    }

    pub fn weights(&self) -> ScoreWeights {
        self.weights
    }

    pub fn error_card(&self) -> Option<&ErrorCard> {
        self.error_card.as_ref()
    }

    pub fn review_cursor(&self) -> usize {
        self.review_cursor
    }

    pub fn is_editor_open(&self, index: usize) -> bool {
        self.open_editors.contains(&index)
    }

    pub fn active_previews(&self) -> usize {
        self.previews.active_count()
    }

    fn require_phase(&self, expected: Phase, action: &'static str) -> Result<(), SessionError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(SessionError::WrongPhase {
                action,
                phase: self.phase.label(),
            })
        }
    }

    /// How many new files the upload gate demands, given what the project
    /// already supplies: `max(1, min - existing)`.
    pub fn required_new_files(&self) -> usize {
        self.config
            .min_proposals
            .saturating_sub(self.existing_count)
            .max(1)
    }

    pub fn add_file(&mut self, file: PendingFile) -> Result<(), SessionError> {
        self.require_phase(Phase::Upload, "adding files")?;
        self.store.add_file(file);
        Ok(())
    }

    /// `upload -> extracting`. Validates the file-count gate and hands the
    /// pending batch back for the extraction call.
    pub fn begin_extraction(&mut self) -> Result<Vec<PendingFile>, SessionError> {
        self.require_phase(Phase::Upload, "extraction")?;

        let required = self.required_new_files();
        let selected = self.store.pending_files().len();
        if selected < required {
            return Err(SessionError::NotEnoughFiles { required, selected });
        }

        self.error_card = None;
        self.phase = Phase::Extracting;
        Ok(self.store.take_pending())
    }

    /// `extracting -> review` when enough proposals survived extraction;
    /// otherwise the machine stays in `extracting` behind a terminal error
    /// card whose only action is restart.
    pub fn complete_extraction(
        &mut self,
        outcomes: Vec<FileOutcome>,
    ) -> Result<Phase, SessionError> {
        self.require_phase(Phase::Extracting, "extraction results")?;

        // Boundary validation: a structurally invalid record is downgraded
        // to a per-file failure instead of entering the store.
        let checked = outcomes
            .into_iter()
            .map(|outcome| match outcome {
                FileOutcome::Extracted { filename, record } => {
                    match remote::validate_record(&record) {
                        Ok(()) => FileOutcome::Extracted { filename, record },
                        Err(error) => FileOutcome::Failed {
                            filename,
                            message: error.to_string(),
                        },
                    }
                }
                failed => failed,
            })
            .collect();
        self.store.ingest(checked);

        let available = self.store.usable_count();
        if available >= self.config.min_proposals {
            self.review_cursor = 0;
            self.phase = Phase::Review;
        } else {
            self.error_card = Some(ErrorCard {
                message: format!(
                    "only {available} of the required {} proposals extracted successfully",
                    self.config.min_proposals
                ),
                recovery: Recovery::Restart,
            });
        }
        Ok(self.phase)
    }

    /// Record in-progress edits for the proposal currently under review.
    pub fn stage_edit(&mut self, edit: ProposalEdit) -> Result<(), SessionError> {
        self.require_phase(Phase::Review, "editing")?;
        self.store.proposal(self.review_cursor)?;
        self.draft = Some((self.review_cursor, edit));
        Ok(())
    }

    /// Apply the staged draft, if any, to its proposal. Called on every exit
    /// from the visible form so edits are never silently dropped. Returns
    /// the edited proposal's index for follow-up persistence.
    pub fn flush_draft(&mut self) -> Result<Option<usize>, SessionError> {
        let Some((index, edit)) = self.draft.take() else {
            return Ok(None);
        };
        if edit.is_empty() {
            return Ok(None);
        }
        self.store.apply_edit(index, &edit)?;
        Ok(Some(index))
    }

    /// Move the review cursor, capturing any draft first.
    pub fn select_proposal(&mut self, index: usize) -> Result<(), SessionError> {
        self.require_phase(Phase::Review, "navigation")?;
        self.store.proposal(index)?;
        self.flush_draft()?;
        self.review_cursor = index;
        Ok(())
    }

    pub fn open_editor(&mut self, index: usize) -> Result<(), SessionError> {
        self.require_phase(Phase::Review, "opening an editor")?;
        self.store.proposal(index)?;
        self.open_editors.insert(index);
        Ok(())
    }

    pub fn close_editor(&mut self, index: usize) {
        self.open_editors.remove(&index);
    }

    /// Lazily acquire the preview handle for a proposal. Only valid while a
    /// document is on screen, i.e. in review or results.
    pub fn preview(&mut self, index: usize) -> Result<u64, SessionError> {
        if self.phase != Phase::Review && self.phase != Phase::Results {
            return Err(SessionError::WrongPhase {
                action: "previewing",
                phase: self.phase.label(),
            });
        }
        self.store.proposal(index)?;
        Ok(self.previews.acquire(index))
    }

    /// Direct edit to a line item's money field, with auto-completion of the
    /// missing third field when the row qualifies.
    pub fn edit_line_item(
        &mut self,
        proposal: usize,
        item: usize,
        field: super::domain::MoneyField,
        value: Option<f64>,
    ) -> Result<Option<super::domain::MoneyField>, SessionError> {
        self.require_phase(Phase::Review, "line-item editing")?;
        Ok(self.store.edit_line_item(proposal, item, field, value)?)
    }

    /// Record the outcome of a best-effort save. Failure marks the record
    /// pending-sync and is logged, never surfaced as blocking.
    pub fn mark_save_outcome(
        &mut self,
        index: usize,
        result: Result<(), BackendError>,
    ) -> Result<(), SessionError> {
        let record = self.store.proposal_mut(index)?;
        match result {
            Ok(()) => record.pending_sync = false,
            Err(error) => {
                record.pending_sync = true;
                warn!(filename = %record.filename, %error, "proposal auto-save failed; local copy is ahead of the backend");
            }
        }
        Ok(())
    }

    /// `review -> comparing`. Captures edits, releases preview handles, and
    /// hands back the proposals for the compare call.
    pub fn begin_compare(&mut self) -> Result<Vec<ProposalRecord>, SessionError> {
        self.require_phase(Phase::Review, "comparison")?;

        let available = self.store.usable_count();
        if available < self.config.min_proposals {
            return Err(SessionError::NotEnoughProposals {
                required: self.config.min_proposals,
                available,
            });
        }

        self.flush_draft()?;
        self.previews.release_all();
        self.open_editors.clear();
        self.error_card = None;
        self.phase = Phase::Comparing;
        Ok(self.store.proposals().to_vec())
    }

    /// `comparing -> results` on success; on failure the machine returns to
    /// `review` with a retry-capable error card. A malformed model counts as
    /// failure rather than entering the session.
    pub fn complete_compare(
        &mut self,
        result: Result<ComparisonOutcome, BackendError>,
    ) -> Result<Phase, SessionError> {
        self.require_phase(Phase::Comparing, "comparison results")?;

        let outcome = result.and_then(|outcome| {
            remote::validate_model(&outcome.model).map(|()| outcome)
        });

        match outcome {
            Ok(ComparisonOutcome {
                comparison_id,
                mut model,
            }) => {
                model.comparison_id = Some(comparison_id);
                recompute_scores(&mut model.vendor_scores, &self.weights);
                self.comparison = Some(model);
                self.debouncer.cancel();
                self.error_card = None;
                self.phase = Phase::Results;
            }
            Err(error) => {
                self.error_card = Some(ErrorCard {
                    message: error.to_string(),
                    recovery: Recovery::RetryCompare,
                });
                self.phase = Phase::Review;
            }
        }
        Ok(self.phase)
    }

    /// Weight-slider change: updates the vector and schedules a debounced
    /// recompute; a burst of changes inside the window coalesces into one.
    pub fn set_weights(&mut self, weights: ScoreWeights, now_ms: u64) -> Result<(), SessionError> {
        self.require_phase(Phase::Results, "adjusting weights")?;
        self.weights = weights;
        self.debouncer.request(now_ms, weights);
        Ok(())
    }

    /// Advance the logical clock; runs the recompute once the debounce
    /// window has elapsed.
    pub fn tick(&mut self, now_ms: u64) {
        if let Some(weights) = self.debouncer.poll(now_ms) {
            if let Some(model) = self.comparison.as_mut() {
                recompute_scores(&mut model.vendor_scores, &weights);
            }
        }
    }

    /// Settle any pending recompute immediately. The displayed scores after
    /// this call equal one full recompute at the final weight vector.
    pub fn settle_scores(&mut self) {
        if let Some(weights) = self.debouncer.flush() {
            if let Some(model) = self.comparison.as_mut() {
                recompute_scores(&mut model.vendor_scores, &weights);
            }
        }
    }

    /// `results -> review`: edit and re-compare. The comparison stays loaded
    /// until a new one replaces it.
    pub fn back_to_review(&mut self) -> Result<(), SessionError> {
        self.require_phase(Phase::Results, "returning to review")?;
        self.settle_scores();
        self.previews.release_all();
        self.review_cursor = 0;
        self.phase = Phase::Review;
        Ok(())
    }

    /// Any phase -> `upload`. Proposals, analytics, and transient handles
    /// are all discarded; preview release happens exactly once even if the
    /// exiting phase already released.
    pub fn restart(&mut self) {
        self.previews.release_all();
        self.store.clear();
        self.comparison = None;
        self.draft = None;
        self.open_editors.clear();
        self.review_cursor = 0;
        self.debouncer.cancel();
        self.error_card = None;
        self.phase = Phase::Upload;
    }

    /// Rehydrate a stored comparison into the same `results`-phase shape a
    /// live comparison produces.
    pub fn load_history(
        &mut self,
        model: ComparisonModel,
        proposals: Option<Vec<ProposalRecord>>,
    ) -> Result<(), SessionError> {
        remote::validate_model(&model)?;

        self.restart();
        if let Some(proposals) = proposals {
            self.store = ProposalStore::with_proposals(proposals);
        }
        let mut model = model;
        recompute_scores(&mut model.vendor_scores, &self.weights);
        self.comparison = Some(model);
        self.phase = Phase::Results;
        Ok(())
    }

    /// Filtered, sorted view over the aligned items.
    pub fn table_view(&self, query: &TableQuery) -> Result<Vec<&AlignedItem>, SessionError> {
        let model = self.comparison.as_ref().ok_or(SessionError::NoComparison)?;
        Ok(table::view(&model.aligned_items, query))
    }

    /// Price-spread ranking over the current comparison.
    pub fn tornado(&self) -> Result<Vec<TornadoEntry>, SessionError> {
        let model = self.comparison.as_ref().ok_or(SessionError::NoComparison)?;
        Ok(analytics::tornado_ranking(
            &model.aligned_items,
            self.config.tornado_limit,
        ))
    }
}
