use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bidlens::workflows::comparison::{
    build_executive_summary, build_heatmap, recompute_scores, tornado_ranking, AlignedItem,
    BackendError, CategorySummary, ComparisonBackend, ComparisonModel, ComparisonOutcome,
    ComparisonSession, CostCategory, ExportBlob, ExportFormat, FileOutcome, FlagSeverity, Grade,
    HeatmapRow, HistoryEntry, HistoryRecord, PendingFile, Project, ProjectId, ProposalId,
    ProposalRecord, ProposalSummary, RedFlag, ScoreWeights, SessionConfig, VendorScore,
};
use bidlens::workflows::comparison::format::normalize_label;
use bidlens::workflows::worksheet::WorksheetImporter;
use chrono::Local;
use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// In-process registry of comparison sessions, keyed by a handed-out id.
/// Each session is an independent value; the registry is the only shared
/// state and is guarded by a single mutex.
pub(crate) struct SessionRegistry {
    config: SessionConfig,
    next_id: AtomicU64,
    sessions: Mutex<HashMap<u64, ComparisonSession>>,
}

impl SessionRegistry {
    pub(crate) fn new(config: SessionConfig) -> Self {
        Self {
            config,
            next_id: AtomicU64::new(1),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn create(&self) -> u64 {
        self.insert(ComparisonSession::new(self.config))
    }

    pub(crate) fn insert(&self, session: ComparisonSession) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.sessions
            .lock()
            .expect("session mutex poisoned")
            .insert(id, session);
        id
    }

    pub(crate) fn config(&self) -> SessionConfig {
        self.config
    }

    /// Run a closure against one session, if it exists.
    pub(crate) fn with_session<T>(
        &self,
        id: u64,
        f: impl FnOnce(&mut ComparisonSession) -> T,
    ) -> Option<T> {
        let mut guard = self.sessions.lock().expect("session mutex poisoned");
        guard.get_mut(&id).map(f)
    }
}

/// Comparison backend used by the service, the CLI demo, and tests: keeps
/// projects, saved proposals, and comparison history in memory, and aligns
/// worksheet-extracted proposals by normalized description.
#[derive(Default)]
pub(crate) struct InMemoryBackend {
    next_proposal: AtomicU64,
    next_comparison: AtomicU64,
    next_project: AtomicU64,
    projects: Mutex<HashMap<String, Project>>,
    project_proposals: Mutex<HashMap<String, Vec<ProposalRecord>>>,
    saved: Mutex<HashMap<ProposalId, ProposalRecord>>,
    history: Mutex<HashMap<String, (HistoryEntry, HistoryRecord)>>,
}

impl InMemoryBackend {
    fn next_proposal_id(&self) -> ProposalId {
        let id = self.next_proposal.fetch_add(1, Ordering::Relaxed) + 1;
        ProposalId(format!("prop-{id:04}"))
    }
}

impl ComparisonBackend for InMemoryBackend {
    fn list_projects(&self) -> Result<Vec<Project>, BackendError> {
        let guard = self.projects.lock().expect("project mutex poisoned");
        let mut projects: Vec<Project> = guard.values().cloned().collect();
        projects.sort_by(|a, b| a.id.0.cmp(&b.id.0));
        Ok(projects)
    }

    fn create_project(&self, name: &str, description: &str) -> Result<Project, BackendError> {
        let id = self.next_project.fetch_add(1, Ordering::Relaxed) + 1;
        let project = Project {
            id: ProjectId(format!("proj-{id:04}")),
            name: name.to_string(),
            description: description.to_string(),
            proposal_count: 0,
        };
        self.projects
            .lock()
            .expect("project mutex poisoned")
            .insert(project.id.0.clone(), project.clone());
        Ok(project)
    }

    fn project_proposals(
        &self,
        project: &ProjectId,
    ) -> Result<Vec<ProposalRecord>, BackendError> {
        let guard = self
            .project_proposals
            .lock()
            .expect("project proposal mutex poisoned");
        guard
            .get(&project.0)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(format!("project '{}'", project.0)))
    }

    fn delete_proposal(&self, id: &ProposalId) -> Result<(), BackendError> {
        let mut guard = self
            .project_proposals
            .lock()
            .expect("project proposal mutex poisoned");
        for proposals in guard.values_mut() {
            proposals.retain(|record| record.id.as_ref() != Some(id));
        }
        self.saved
            .lock()
            .expect("saved proposal mutex poisoned")
            .remove(id);
        Ok(())
    }

    fn move_proposal(&self, id: &ProposalId, target: &ProjectId) -> Result<(), BackendError> {
        let mut guard = self
            .project_proposals
            .lock()
            .expect("project proposal mutex poisoned");

        let mut moved = None;
        for proposals in guard.values_mut() {
            if let Some(position) = proposals
                .iter()
                .position(|record| record.id.as_ref() == Some(id))
            {
                moved = Some(proposals.remove(position));
                break;
            }
        }

        let record = moved.ok_or_else(|| BackendError::NotFound(format!("proposal '{}'", id.0)))?;
        guard.entry(target.0.clone()).or_default().push(record);
        Ok(())
    }

    fn upload_and_extract(
        &self,
        files: Vec<PendingFile>,
        project: Option<&ProjectId>,
    ) -> Result<Vec<FileOutcome>, BackendError> {
        let outcomes = files
            .into_iter()
            .map(|file| {
                match WorksheetImporter::from_reader(Cursor::new(&file.contents), &file.filename) {
                    Ok(mut record) => {
                        record.id = Some(self.next_proposal_id());
                        if let Some(project) = project {
                            self.project_proposals
                                .lock()
                                .expect("project proposal mutex poisoned")
                                .entry(project.0.clone())
                                .or_default()
                                .push(record.clone());
                        }
                        FileOutcome::Extracted {
                            filename: file.filename,
                            record,
                        }
                    }
                    Err(error) => FileOutcome::Failed {
                        filename: file.filename,
                        message: error.to_string(),
                    },
                }
            })
            .collect();
        Ok(outcomes)
    }

    fn save_proposal_edits(
        &self,
        id: &ProposalId,
        record: &ProposalRecord,
    ) -> Result<(), BackendError> {
        self.saved
            .lock()
            .expect("saved proposal mutex poisoned")
            .insert(id.clone(), record.clone());
        Ok(())
    }

    fn compare(
        &self,
        proposals: &[ProposalRecord],
        _project: Option<&ProjectId>,
    ) -> Result<ComparisonOutcome, BackendError> {
        if proposals.len() < 2 {
            return Err(BackendError::Request(
                "at least two proposals are required".to_string(),
            ));
        }

        let model = align_and_score(proposals);
        let id = self.next_comparison.fetch_add(1, Ordering::Relaxed) + 1;
        let comparison_id = format!("cmp-{id:04}");

        let entry = HistoryEntry {
            id: comparison_id.clone(),
            created_at: Local::now().naive_local(),
            title: model
                .proposals
                .iter()
                .map(|summary| summary.company.clone().unwrap_or_else(|| summary.filename.clone()))
                .collect::<Vec<_>>()
                .join(" vs "),
            proposal_count: model.proposals.len(),
        };
        let record = HistoryRecord {
            model: model.clone(),
            proposals: Some(proposals.to_vec()),
        };
        self.history
            .lock()
            .expect("history mutex poisoned")
            .insert(comparison_id.clone(), (entry, record));

        Ok(ComparisonOutcome {
            comparison_id,
            model,
        })
    }

    fn export(
        &self,
        model: &ComparisonModel,
        format: ExportFormat,
    ) -> Result<ExportBlob, BackendError> {
        match format {
            ExportFormat::Html => {
                let mut html = String::from("<html><body><h1>Proposal comparison</h1><table>");
                html.push_str("<tr><th>Vendor</th><th>Total</th><th>Overall</th><th>Grade</th></tr>");
                for summary in &model.proposals {
                    let score = model.vendor_scores.get(&summary.id);
                    html.push_str(&format!(
                        "<tr><td>{}</td><td>{:.2}</td><td>{}</td><td>{}</td></tr>",
                        summary.company.as_deref().unwrap_or(&summary.filename),
                        summary.total.unwrap_or(0.0),
                        score.map(|s| s.overall).unwrap_or(0),
                        score.map(|s| s.grade.label()).unwrap_or("-"),
                    ));
                }
                html.push_str("</table></body></html>");
                Ok(ExportBlob {
                    filename: format!("comparison.{}", format.extension()),
                    content_type: format.content_type().to_string(),
                    bytes: html.into_bytes(),
                })
            }
            ExportFormat::Xlsx => Err(BackendError::Request(
                "xlsx export is not available in the in-memory backend".to_string(),
            )),
        }
    }

    fn list_history(&self) -> Result<Vec<HistoryEntry>, BackendError> {
        let guard = self.history.lock().expect("history mutex poisoned");
        let mut entries: Vec<HistoryEntry> =
            guard.values().map(|(entry, _)| entry.clone()).collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    fn load_history(&self, id: &str) -> Result<HistoryRecord, BackendError> {
        let guard = self.history.lock().expect("history mutex poisoned");
        guard
            .get(id)
            .map(|(_, record)| record.clone())
            .ok_or_else(|| BackendError::NotFound(format!("comparison '{id}'")))
    }

    fn delete_history(&self, id: &str) -> Result<(), BackendError> {
        let mut guard = self.history.lock().expect("history mutex poisoned");
        guard
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| BackendError::NotFound(format!("comparison '{id}'")))
    }
}

/// Build the full comparison model from extracted proposals: description
/// alignment, totals, category rollups, red flags, heatmap, scores, and the
/// executive summary.
pub(crate) fn align_and_score(proposals: &[ProposalRecord]) -> ComparisonModel {
    let ids: Vec<ProposalId> = proposals
        .iter()
        .filter_map(|record| record.id.clone())
        .collect();

    let mut rows: BTreeMap<String, AlignedItem> = BTreeMap::new();
    for record in proposals {
        let Some(id) = record.id.clone() else { continue };
        for item in &record.line_items {
            let key = normalize_label(&item.description);
            let entry = rows.entry(key).or_insert_with(|| AlignedItem {
                description: item.description.clone(),
                category: item.category,
                amounts: BTreeMap::new(),
                variance_pct: None,
            });
            if entry.category.is_none() {
                entry.category = item.category;
            }
            if let Some(amount) = item.amount {
                *entry.amounts.entry(id.clone()).or_insert(0.0) += amount;
            }
        }
    }
    let mut aligned_items: Vec<AlignedItem> = rows.into_values().collect();
    for item in &mut aligned_items {
        item.recompute_variance();
    }

    let mut totals: BTreeMap<ProposalId, f64> = BTreeMap::new();
    for record in proposals {
        let Some(id) = record.id.clone() else { continue };
        totals.insert(id, record.effective_total().unwrap_or(0.0));
    }

    let mut category_summaries: BTreeMap<CostCategory, CategorySummary> = BTreeMap::new();
    for record in proposals {
        let Some(id) = record.id.clone() else { continue };
        for item in &record.line_items {
            let category = item.category.unwrap_or(CostCategory::Other);
            let summary = category_summaries.entry(category).or_default();
            summary.item_count += 1;
            if let Some(amount) = item.amount {
                *summary.subtotals.entry(id.clone()).or_insert(0.0) += amount;
            }
        }
    }

    let red_flags = detect_red_flags(proposals, &aligned_items, &totals);

    let cheapest = totals
        .values()
        .copied()
        .filter(|total| *total > 0.0)
        .fold(f64::INFINITY, f64::min);
    let mut vendor_scores: BTreeMap<ProposalId, VendorScore> = BTreeMap::new();
    for record in proposals {
        let Some(id) = record.id.clone() else { continue };
        let total = totals.get(&id).copied().unwrap_or(0.0);

        let price_score = if total > 0.0 && cheapest.is_finite() {
            ((cheapest / total) * 100.0).round() as u8
        } else {
            0
        };

        let covered = aligned_items
            .iter()
            .filter(|item| item.amounts.contains_key(&id))
            .count();
        let completeness_score = if aligned_items.is_empty() {
            0
        } else {
            ((covered as f64 / aligned_items.len() as f64) * 100.0).round() as u8
        };

        let flags = red_flags.get(&id).map(Vec::as_slice).unwrap_or(&[]);
        let critical_flags = flags
            .iter()
            .filter(|flag| flag.severity == FlagSeverity::Critical)
            .count();
        let warnings = flags
            .iter()
            .filter(|flag| flag.severity == FlagSeverity::Warning)
            .count();
        let risk_penalty = critical_flags * 40 + warnings * 15;
        let risk_score = 100u8.saturating_sub(risk_penalty.min(100) as u8);

        let data_quality_score = if record.line_items.is_empty() {
            0
        } else {
            let confidence_sum: f32 =
                record.line_items.iter().map(|item| item.confidence).sum();
            ((confidence_sum / record.line_items.len() as f32) * 100.0).round() as u8
        };

        vendor_scores.insert(
            id,
            VendorScore {
                price_score: price_score.min(100),
                completeness_score,
                risk_score,
                data_quality_score: data_quality_score.min(100),
                overall: 0,
                grade: Grade::F,
                red_flag_count: flags.len(),
                critical_flags,
            },
        );
    }
    recompute_scores(&mut vendor_scores, &ScoreWeights::default());

    let summaries: Vec<ProposalSummary> = proposals
        .iter()
        .filter_map(|record| {
            record.id.clone().map(|id| ProposalSummary {
                id,
                company: record.company.clone(),
                filename: record.filename.clone(),
                total: record.effective_total(),
            })
        })
        .collect();

    let heatmap: Vec<HeatmapRow> = build_heatmap(&aligned_items, &ids);
    let tornado = tornado_ranking(&aligned_items, 12);
    let executive_summary =
        build_executive_summary(&summaries, &totals, &vendor_scores, &red_flags, &tornado);

    ComparisonModel {
        comparison_id: None,
        proposals: summaries,
        aligned_items,
        totals,
        category_summaries,
        red_flags,
        heatmap,
        vendor_scores,
        executive_summary,
    }
}

fn detect_red_flags(
    proposals: &[ProposalRecord],
    aligned_items: &[AlignedItem],
    totals: &BTreeMap<ProposalId, f64>,
) -> BTreeMap<ProposalId, Vec<RedFlag>> {
    let mut red_flags: BTreeMap<ProposalId, Vec<RedFlag>> = BTreeMap::new();

    let cheapest = totals
        .values()
        .copied()
        .filter(|total| *total > 0.0)
        .fold(f64::INFINITY, f64::min);

    for record in proposals {
        let Some(id) = record.id.clone() else { continue };
        let mut flags = Vec::new();

        if record.total.is_none() {
            flags.push(RedFlag {
                severity: FlagSeverity::Critical,
                kind: "missing_total".to_string(),
                title: "No document total".to_string(),
                detail: format!("'{}' carries no detectable grand total", record.filename),
            });
        }

        if !record.line_items.is_empty() {
            let average_confidence: f32 = record
                .line_items
                .iter()
                .map(|item| item.confidence)
                .sum::<f32>()
                / record.line_items.len() as f32;
            if average_confidence < 0.7 {
                flags.push(RedFlag {
                    severity: FlagSeverity::Warning,
                    kind: "low_confidence".to_string(),
                    title: "Low extraction confidence".to_string(),
                    detail: format!(
                        "average line-item confidence is {:.0}%",
                        average_confidence * 100.0
                    ),
                });
            }
        }

        if let Some(total) = totals.get(&id) {
            if cheapest.is_finite() && *total > cheapest * 1.25 {
                flags.push(RedFlag {
                    severity: FlagSeverity::Warning,
                    kind: "price_outlier".to_string(),
                    title: "Priced well above the field".to_string(),
                    detail: format!(
                        "total is {:.0}% above the lowest bid",
                        (total - cheapest) / cheapest * 100.0
                    ),
                });
            }
        }

        let exclusive = aligned_items
            .iter()
            .filter(|item| item.amounts.len() == 1 && item.amounts.contains_key(&id))
            .count();
        if exclusive > 0 {
            flags.push(RedFlag {
                severity: FlagSeverity::Info,
                kind: "exclusive_items".to_string(),
                title: "Items no other vendor priced".to_string(),
                detail: format!("{exclusive} line item(s) appear only in this proposal"),
            });
        }

        if !flags.is_empty() {
            red_flags.insert(id, flags);
        }
    }

    red_flags
}
