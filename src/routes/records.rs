use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    error::AppError,
    models::Record,
    services::{
        backend::RecordBackend,
        excel::{schema, utils::content_disposition, write_workbook},
        export::{export_filename, project, SHEET_NAME},
    },
    AppState,
};

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/records", get(list_records))
        .route("/schema", get(describe_schema))
        .route("/exports", post(export_records))
}

#[derive(Debug, Serialize)]
pub struct SchemaColumn {
    key: &'static str,
    label: &'static str,
    header: String,
    group_path: &'static [&'static str],
    value_kind: schema::ValueKind,
    role: schema::ColumnRole,
}

#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    /// Records to export; the live set is fetched from the backend when absent.
    #[serde(default)]
    records: Option<Vec<Record>>,
    #[serde(default)]
    product_codes: Vec<String>,
}

async fn list_records(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Record>>, AppError> {
    let records = state.backend.list_records().await?;
    Ok(Json(records))
}

async fn describe_schema() -> Json<Vec<SchemaColumn>> {
    Json(
        schema::columns()
            .iter()
            .map(|col| SchemaColumn {
                key: col.key,
                label: col.label,
                header: col.header_label(),
                group_path: col.group_path,
                value_kind: col.value_kind,
                role: col.role,
            })
            .collect(),
    )
}

async fn export_records(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ExportRequest>,
) -> Result<impl IntoResponse, AppError> {
    let start = std::time::Instant::now();
    let records: Vec<Record> = match request.records {
        Some(records) => records.into_iter().map(Record::conform).collect(),
        None => state.backend.list_records().await?,
    };

    let selected = request.product_codes;
    let filename = export_filename(&selected, chrono::Local::now().date_naive());
    let table = project(&records, &selected, &state.config.sheet_layout)?;
    let row_count = table.rows.len();

    let buffer = tokio::task::spawn_blocking(move || write_workbook(&table, SHEET_NAME)).await??;
    tracing::info!(
        "Exported {} records to {} ({}KB) in {:?}",
        row_count,
        filename,
        buffer.len() / 1024,
        start.elapsed()
    );

    Ok((
        [
            (header::CONTENT_TYPE, XLSX_MIME.to_string()),
            (header::CONTENT_DISPOSITION, content_disposition(&filename)),
        ],
        buffer,
    ))
}
