use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::Record,
    services::excel::read_sheet,
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/imports", post(create_session))
        .route("/imports/:id", axum::routing::delete(close_session))
        .route("/imports/:id/files", post(upload_files))
        .route("/imports/:id/preview", get(preview))
        .route("/imports/:id/submit", post(submit))
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    session_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    file_name: Option<String>,
    rows: Vec<Record>,
    preview_count: usize,
    /// Rows flagged to update every record with the same product code.
    bulk_update_count: usize,
    pending_count: usize,
}

impl PreviewResponse {
    fn new(file_name: Option<String>, rows: Vec<Record>, pending_count: usize) -> Self {
        Self {
            file_name,
            preview_count: rows.len(),
            bulk_update_count: rows.iter().filter(|r| r.is_bulk_update()).count(),
            rows,
            pending_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    success: bool,
    message: Option<String>,
    submitted: usize,
}

async fn create_session(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<SessionResponse>) {
    let (session_id, _) = state.sessions.create();
    tracing::info!("Created import session {}", session_id);
    (StatusCode::CREATED, Json(SessionResponse { session_id }))
}

async fn close_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.sessions.close(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
async fn upload_files(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<PreviewResponse>, AppError> {
    let session = state.sessions.get(&id)?;
    let layout = state.config.sheet_layout;
    let mut response = None;

    while let Some(field) = multipart.next_field().await
        .map_err(|e| AppError::InvalidInput(format!("Invalid upload: {}", e)))?
    {
        let file_name = field.file_name().map(str::to_string);
        if file_name.is_none() {
            tracing::debug!("Skipping non-file form field {:?}", field.name());
            continue;
        }

        let start = std::time::Instant::now();
        let data = field.bytes().await
            .map_err(|e| AppError::InvalidInput(format!("Failed to read upload: {}", e)))?;
        tracing::info!(
            "Session {}: received {:?}, size: {}KB",
            id,
            file_name,
            data.len() / 1024
        );

        let rows = tokio::task::spawn_blocking(move || read_sheet(data, &layout)).await??;

        let mut acc = session.lock().await;
        let preview = acc.add_file(rows)?.to_vec();
        tracing::info!(
            "Session {}: imported {} rows from {:?} in {:?}, {} pending",
            id,
            preview.len(),
            file_name,
            start.elapsed(),
            acc.pending().len()
        );

        response = Some(PreviewResponse::new(file_name, preview, acc.pending().len()));
    }

    response
        .map(Json)
        .ok_or_else(|| AppError::InvalidInput("No file provided".to_string()))
}

async fn preview(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<PreviewResponse>, AppError> {
    let session = state.sessions.get(&id)?;
    let acc = session.lock().await;
    Ok(Json(PreviewResponse::new(None, acc.preview().to_vec(), acc.pending().len())))
}

async fn submit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SubmitResponse>, AppError> {
    let session = state.sessions.get(&id)?;
    let mut acc = session.lock().await;
    let submitted = acc.pending().len();

    let result = acc.submit(&state.backend).await?;
    tracing::info!("Session {}: submitted {} records", id, submitted);

    Ok(Json(SubmitResponse {
        success: result.success,
        message: result.message,
        submitted,
    }))
}
