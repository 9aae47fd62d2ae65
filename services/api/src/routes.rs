use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use bidlens::workflows::comparison::format::{format_bytes, format_currency};
use bidlens::workflows::comparison::{
    AlignedItem, ComparisonBackend, ComparisonSession, CostCategory, ErrorCard, ExportFormat,
    ExtractionFailure, FileOutcome, MoneyField, PendingFile, Phase, ProjectId, ProposalEdit,
    ProposalId, ScoreWeights, SessionError, SortDirection, SortKey, SourceKind, TableQuery,
    TornadoEntry, VendorScore,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::infra::{AppState, InMemoryBackend, SessionRegistry};

#[derive(Clone)]
pub(crate) struct ApiContext {
    pub(crate) registry: Arc<SessionRegistry>,
    pub(crate) backend: Arc<InMemoryBackend>,
}

pub(crate) fn comparison_router(context: ApiContext) -> axum::Router {
    use axum::routing::{get, patch, post, put};

    axum::Router::new()
        .route("/api/v1/comparison/sessions", post(create_session_handler))
        .route(
            "/api/v1/comparison/sessions/:session_id",
            get(session_view_handler),
        )
        .route(
            "/api/v1/comparison/sessions/:session_id/files",
            post(add_file_handler),
        )
        .route(
            "/api/v1/comparison/sessions/:session_id/extract",
            post(extract_handler),
        )
        .route(
            "/api/v1/comparison/sessions/:session_id/proposals/:index",
            patch(edit_proposal_handler),
        )
        .route(
            "/api/v1/comparison/sessions/:session_id/proposals/:index/items/:item",
            patch(edit_line_item_handler),
        )
        .route(
            "/api/v1/comparison/sessions/:session_id/compare",
            post(compare_handler),
        )
        .route(
            "/api/v1/comparison/sessions/:session_id/weights",
            put(weights_handler),
        )
        .route(
            "/api/v1/comparison/sessions/:session_id/table",
            get(table_handler),
        )
        .route(
            "/api/v1/comparison/sessions/:session_id/tornado",
            get(tornado_handler),
        )
        .route(
            "/api/v1/comparison/sessions/:session_id/export",
            get(export_handler),
        )
        .route(
            "/api/v1/comparison/sessions/:session_id/restart",
            post(restart_handler),
        )
        .route(
            "/api/v1/projects",
            get(list_projects_handler).post(create_project_handler),
        )
        .route("/api/v1/comparison/history", get(history_handler))
        .route(
            "/api/v1/comparison/history/:comparison_id",
            axum::routing::delete(delete_history_handler),
        )
        .route(
            "/api/v1/comparison/sessions/:session_id/history/:comparison_id",
            post(load_history_handler),
        )
        .with_state(context)
}

pub(crate) fn with_comparison_routes(context: ApiContext) -> axum::Router {
    comparison_router(context)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

fn unknown_session(session_id: u64) -> Response {
    let payload = json!({ "error": format!("unknown session {session_id}") });
    (StatusCode::NOT_FOUND, Json(payload)).into_response()
}

fn session_error(error: SessionError) -> Response {
    let status = match &error {
        SessionError::Backend(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::BAD_REQUEST,
    };
    let payload = json!({ "error": error.to_string() });
    (status, Json(payload)).into_response()
}

#[derive(Debug, Serialize)]
pub(crate) struct PendingFileView {
    pub(crate) filename: String,
    pub(crate) kind: &'static str,
    pub(crate) size: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ProposalView {
    pub(crate) index: usize,
    pub(crate) filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) total: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) total_display: Option<String>,
    pub(crate) line_items: usize,
    pub(crate) pending_sync: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct SessionView {
    pub(crate) session_id: u64,
    pub(crate) phase: Phase,
    pub(crate) required_new_files: usize,
    pub(crate) pending_files: Vec<PendingFileView>,
    pub(crate) proposals: Vec<ProposalView>,
    pub(crate) failures: Vec<ExtractionFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<ErrorCard>,
    pub(crate) weights: ScoreWeights,
    pub(crate) has_results: bool,
}

fn session_view(session_id: u64, session: &ComparisonSession) -> SessionView {
    let pending_files = session
        .store()
        .pending_files()
        .iter()
        .map(|file| PendingFileView {
            filename: file.filename.clone(),
            kind: file.kind.label(),
            size: format_bytes(file.size_bytes),
        })
        .collect();

    let proposals = session
        .store()
        .proposals()
        .iter()
        .enumerate()
        .map(|(index, record)| ProposalView {
            index,
            filename: record.filename.clone(),
            company: record.company.clone(),
            total: record.total,
            total_display: record.total.map(format_currency),
            line_items: record.line_items.len(),
            pending_sync: record.pending_sync,
        })
        .collect();

    SessionView {
        session_id,
        phase: session.phase(),
        required_new_files: session.required_new_files(),
        pending_files,
        proposals,
        failures: session.store().failures().to_vec(),
        error: session.error_card().cloned(),
        weights: session.weights(),
        has_results: session.comparison().is_some(),
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CreateSessionRequest {
    /// Start the session over an existing project; its proposals count
    /// toward the two-proposal minimum.
    #[serde(default)]
    pub(crate) project_id: Option<String>,
}

pub(crate) async fn create_session_handler(
    State(context): State<ApiContext>,
    request: Option<Json<CreateSessionRequest>>,
) -> Response {
    let request = request.map(|Json(body)| body).unwrap_or_default();

    let session = match request.project_id {
        Some(project_id) => {
            let existing = match context.backend.project_proposals(&ProjectId(project_id)) {
                Ok(proposals) => proposals,
                Err(error) => {
                    let payload = json!({ "error": error.to_string() });
                    return (StatusCode::NOT_FOUND, Json(payload)).into_response();
                }
            };
            ComparisonSession::with_existing(context.registry.config(), existing)
        }
        None => ComparisonSession::new(context.registry.config()),
    };

    let session_id = context.registry.insert(session);
    let view = context
        .registry
        .with_session(session_id, |session| session_view(session_id, session));
    match view {
        Some(view) => (StatusCode::CREATED, Json(view)).into_response(),
        None => unknown_session(session_id),
    }
}

pub(crate) async fn session_view_handler(
    State(context): State<ApiContext>,
    Path(session_id): Path<u64>,
) -> Response {
    match context
        .registry
        .with_session(session_id, |session| session_view(session_id, session))
    {
        Some(view) => (StatusCode::OK, Json(view)).into_response(),
        None => unknown_session(session_id),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AddFileRequest {
    pub(crate) filename: String,
    /// Structured worksheet contents the extraction service will consume.
    pub(crate) contents: String,
}

pub(crate) async fn add_file_handler(
    State(context): State<ApiContext>,
    Path(session_id): Path<u64>,
    Json(request): Json<AddFileRequest>,
) -> Response {
    let Some(kind) = SourceKind::from_filename(&request.filename) else {
        let guessed = mime_guess::from_path(&request.filename).first_or_octet_stream();
        let payload = json!({
            "error": format!(
                "unsupported file type '{guessed}'; expected an xlsx, docx, or pdf document"
            ),
        });
        return (StatusCode::UNSUPPORTED_MEDIA_TYPE, Json(payload)).into_response();
    };

    let file = PendingFile::new(request.filename, kind, request.contents.into_bytes());
    let result = context.registry.with_session(session_id, |session| {
        session
            .add_file(file)
            .map(|()| session_view(session_id, session))
    });

    match result {
        Some(Ok(view)) => (StatusCode::OK, Json(view)).into_response(),
        Some(Err(error)) => session_error(error),
        None => unknown_session(session_id),
    }
}

pub(crate) async fn extract_handler(
    State(context): State<ApiContext>,
    Path(session_id): Path<u64>,
) -> Response {
    let backend = context.backend.clone();
    let result = context.registry.with_session(session_id, |session| {
        let files = session.begin_extraction()?;
        let filenames: Vec<String> = files.iter().map(|file| file.filename.clone()).collect();

        // a whole-batch transport failure becomes per-file failures so the
        // machine lands on its terminal error card instead of hanging
        let outcomes = match backend.upload_and_extract(files, None) {
            Ok(outcomes) => outcomes,
            Err(error) => filenames
                .into_iter()
                .map(|filename| FileOutcome::Failed {
                    filename,
                    message: error.to_string(),
                })
                .collect(),
        };

        session.complete_extraction(outcomes)?;
        Ok::<SessionView, SessionError>(session_view(session_id, session))
    });

    match result {
        Some(Ok(view)) => (StatusCode::OK, Json(view)).into_response(),
        Some(Err(error)) => session_error(error),
        None => unknown_session(session_id),
    }
}

pub(crate) async fn edit_proposal_handler(
    State(context): State<ApiContext>,
    Path((session_id, index)): Path<(u64, usize)>,
    Json(edit): Json<ProposalEdit>,
) -> Response {
    let backend = context.backend.clone();
    let result = context.registry.with_session(session_id, |session| {
        session.select_proposal(index)?;
        session.stage_edit(edit)?;
        session.flush_draft()?;

        // optimistic fire-and-forget persistence: the local record is
        // already updated; a failed save only marks it pending-sync
        let saved = {
            let record = session.store().proposal(index)?;
            match &record.id {
                Some(id) => backend.save_proposal_edits(id, record),
                None => Ok(()),
            }
        };
        session.mark_save_outcome(index, saved)?;

        Ok::<SessionView, SessionError>(session_view(session_id, session))
    });

    match result {
        Some(Ok(view)) => (StatusCode::OK, Json(view)).into_response(),
        Some(Err(error)) => session_error(error),
        None => unknown_session(session_id),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct LineItemEditRequest {
    pub(crate) field: MoneyField,
    pub(crate) value: Option<f64>,
}

pub(crate) async fn edit_line_item_handler(
    State(context): State<ApiContext>,
    Path((session_id, index, item)): Path<(u64, usize, usize)>,
    Json(request): Json<LineItemEditRequest>,
) -> Response {
    let result = context.registry.with_session(session_id, |session| {
        let derived = session.edit_line_item(index, item, request.field, request.value)?;
        let row = session.store().proposal(index)?.line_items[item].clone();
        Ok::<_, SessionError>(json!({ "derived": derived, "item": row }))
    });

    match result {
        Some(Ok(payload)) => (StatusCode::OK, Json(payload)).into_response(),
        Some(Err(error)) => session_error(error),
        None => unknown_session(session_id),
    }
}

pub(crate) async fn compare_handler(
    State(context): State<ApiContext>,
    Path(session_id): Path<u64>,
) -> Response {
    let backend = context.backend.clone();
    let result = context.registry.with_session(session_id, |session| {
        let proposals = session.begin_compare()?;
        let outcome = backend.compare(&proposals, None);
        session.complete_compare(outcome)?;

        match (session.comparison(), session.error_card()) {
            (Some(model), _) => Ok::<_, SessionError>(json!({
                "phase": session.phase(),
                "model": model,
            })),
            (None, card) => Ok(json!({
                "phase": session.phase(),
                "error": card,
            })),
        }
    });

    match result {
        Some(Ok(payload)) => (StatusCode::OK, Json(payload)).into_response(),
        Some(Err(error)) => session_error(error),
        None => unknown_session(session_id),
    }
}

pub(crate) async fn weights_handler(
    State(context): State<ApiContext>,
    Path(session_id): Path<u64>,
    Json(weights): Json<ScoreWeights>,
) -> Response {
    let now_ms = chrono::Local::now().timestamp_millis().max(0) as u64;
    let result = context.registry.with_session(session_id, |session| {
        session.set_weights(weights, now_ms)?;
        // no background ticker in the request path: settle immediately so
        // the response reflects one full recompute at the final vector
        session.settle_scores();
        let scores: std::collections::BTreeMap<ProposalId, VendorScore> = session
            .comparison()
            .map(|model| model.vendor_scores.clone())
            .unwrap_or_default();
        Ok::<_, SessionError>(json!({ "weights": session.weights(), "vendor_scores": scores }))
    });

    match result {
        Some(Ok(payload)) => (StatusCode::OK, Json(payload)).into_response(),
        Some(Err(error)) => session_error(error),
        None => unknown_session(session_id),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TableParams {
    #[serde(default)]
    pub(crate) sort: Option<String>,
    #[serde(default)]
    pub(crate) vendor: Option<String>,
    #[serde(default)]
    pub(crate) direction: Option<String>,
    #[serde(default)]
    pub(crate) min_variance: Option<f64>,
    #[serde(default)]
    pub(crate) category: Option<String>,
}

impl TableParams {
    fn into_query(self) -> Result<TableQuery, String> {
        let sort = match self.sort.as_deref() {
            None | Some("description") => SortKey::Description,
            Some("category") => SortKey::Category,
            Some("variance") => SortKey::Variance,
            Some("vendor") => match self.vendor {
                Some(vendor) => SortKey::Vendor(ProposalId(vendor)),
                None => return Err("sort=vendor requires a vendor id".to_string()),
            },
            Some(other) => return Err(format!("unknown sort key '{other}'")),
        };

        let direction = match self.direction.as_deref() {
            None | Some("asc") => SortDirection::Asc,
            Some("desc") => SortDirection::Desc,
            Some(other) => return Err(format!("unknown direction '{other}'")),
        };

        let category = match self.category.as_deref() {
            None => None,
            Some(raw) => match CostCategory::from_name(raw) {
                Some(category) => Some(category),
                None => return Err(format!("unknown category '{raw}'")),
            },
        };

        Ok(TableQuery {
            sort,
            direction,
            min_variance_pct: self.min_variance.unwrap_or(0.0),
            category,
        })
    }
}

pub(crate) async fn table_handler(
    State(context): State<ApiContext>,
    Path(session_id): Path<u64>,
    Query(params): Query<TableParams>,
) -> Response {
    let query = match params.into_query() {
        Ok(query) => query,
        Err(message) => {
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response();
        }
    };

    let result = context.registry.with_session(session_id, |session| {
        let rows: Vec<AlignedItem> = session
            .table_view(&query)?
            .into_iter()
            .cloned()
            .collect();
        Ok::<_, SessionError>(rows)
    });

    match result {
        Some(Ok(rows)) => (StatusCode::OK, Json(rows)).into_response(),
        Some(Err(error)) => session_error(error),
        None => unknown_session(session_id),
    }
}

pub(crate) async fn tornado_handler(
    State(context): State<ApiContext>,
    Path(session_id): Path<u64>,
) -> Response {
    let result = context
        .registry
        .with_session(session_id, |session| session.tornado());

    match result {
        Some(Ok(entries)) => {
            let entries: Vec<TornadoEntry> = entries;
            (StatusCode::OK, Json(entries)).into_response()
        }
        Some(Err(error)) => session_error(error),
        None => unknown_session(session_id),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExportParams {
    pub(crate) format: ExportFormat,
}

pub(crate) async fn export_handler(
    State(context): State<ApiContext>,
    Path(session_id): Path<u64>,
    Query(params): Query<ExportParams>,
) -> Response {
    let backend = context.backend.clone();
    let result = context.registry.with_session(session_id, |session| {
        session.settle_scores();
        let model = session
            .comparison()
            .ok_or(SessionError::NoComparison)?;
        backend
            .export(model, params.format)
            .map_err(SessionError::from)
    });

    match result {
        Some(Ok(blob)) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, blob.content_type),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", blob.filename),
                ),
            ],
            blob.bytes,
        )
            .into_response(),
        Some(Err(error)) => session_error(error),
        None => unknown_session(session_id),
    }
}

pub(crate) async fn restart_handler(
    State(context): State<ApiContext>,
    Path(session_id): Path<u64>,
) -> Response {
    match context.registry.with_session(session_id, |session| {
        session.restart();
        session_view(session_id, session)
    }) {
        Some(view) => (StatusCode::OK, Json(view)).into_response(),
        None => unknown_session(session_id),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateProjectRequest {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) description: String,
}

pub(crate) async fn list_projects_handler(State(context): State<ApiContext>) -> Response {
    match context.backend.list_projects() {
        Ok(projects) => (StatusCode::OK, Json(projects)).into_response(),
        Err(error) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::BAD_GATEWAY, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn create_project_handler(
    State(context): State<ApiContext>,
    Json(request): Json<CreateProjectRequest>,
) -> Response {
    match context
        .backend
        .create_project(&request.name, &request.description)
    {
        Ok(project) => (StatusCode::CREATED, Json(project)).into_response(),
        Err(error) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::BAD_GATEWAY, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn history_handler(State(context): State<ApiContext>) -> Response {
    match context.backend.list_history() {
        Ok(entries) => (StatusCode::OK, Json(entries)).into_response(),
        Err(error) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::BAD_GATEWAY, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn delete_history_handler(
    State(context): State<ApiContext>,
    Path(comparison_id): Path<String>,
) -> Response {
    match context.backend.delete_history(&comparison_id) {
        Ok(()) => (StatusCode::OK, Json(json!({ "deleted": comparison_id }))).into_response(),
        Err(error) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::NOT_FOUND, Json(payload)).into_response()
        }
    }
}

/// Rehydrate a stored comparison into a session, landing it in the same
/// `results` shape a live comparison produces.
pub(crate) async fn load_history_handler(
    State(context): State<ApiContext>,
    Path((session_id, comparison_id)): Path<(u64, String)>,
) -> Response {
    let record = match context.backend.load_history(&comparison_id) {
        Ok(record) => record,
        Err(error) => {
            let payload = json!({ "error": error.to_string() });
            return (StatusCode::NOT_FOUND, Json(payload)).into_response();
        }
    };

    let result = context.registry.with_session(session_id, |session| {
        session.load_history(record.model, record.proposals)?;
        Ok::<SessionView, SessionError>(session_view(session_id, session))
    });

    match result {
        Some(Ok(view)) => (StatusCode::OK, Json(view)).into_response(),
        Some(Err(error)) => session_error(error),
        None => unknown_session(session_id),
    }
}
