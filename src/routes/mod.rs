use axum::{extract::DefaultBodyLimit, http::Method, routing::get, Router};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::AppState;

pub mod imports;
pub mod records;

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
        .expose_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    let max_body = state.config.max_file_size;

    Router::new()
        .route("/health", get(health_check))
        .merge(imports::routes())
        .merge(records::routes())
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::{CellValue, Record};
    use crate::services::excel::{write_workbook, SheetLayout};
    use crate::services::export::{project, SHEET_NAME};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    const BOUNDARY: &str = "sheet-exchange-test-boundary";

    fn test_app() -> Router {
        // Nothing listens here; these tests never reach the backend.
        app_with_backend("http://127.0.0.1:9")
    }

    fn app_with_backend(backend_url: &str) -> Router {
        let config = Config {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            backend_url: backend_url.to_string(),
            backend_timeout: Some(Duration::from_secs(1)),
            max_file_size: 10 * 1024 * 1024,
            import_session_ttl: Duration::from_secs(60),
            sheet_layout: SheetLayout::default(),
        };
        router(Arc::new(AppState::new(config).unwrap()))
    }

    /// A stand-in backend: imports answer with `import`, listing returns `stored`.
    async fn spawn_backend(import: (StatusCode, Value), stored: Vec<Record>) -> String {
        let list = json!({ "success": true, "data": stored });
        let backend = Router::new()
            .route("/impedance/import", axum::routing::post(move || {
                let (status, body) = import.clone();
                async move { (status, axum::Json(body)) }
            }))
            .route("/impedance/list", get(move || {
                let list = list.clone();
                async move { axum::Json(list) }
            }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, backend).await.unwrap() });
        format!("http://{}", addr)
    }

    async fn session_with_upload(app: &Router, codes: &[&str]) -> String {
        let (_, created) = send_json(app, "POST", "/imports", None).await;
        let session = created["session_id"].as_str().unwrap().to_string();
        let (status, _) = upload(app, &session, &[("a.xlsx", workbook_with(codes))]).await;
        assert_eq!(status, StatusCode::OK);
        session
    }

    fn record(code: &str) -> Record {
        let mut record = Record::empty();
        record.fields.insert("job_no".into(), CellValue::Text(format!("J-{}", code)));
        record.fields.insert("product_code".into(), CellValue::Text(code.into()));
        record
    }

    fn multipart_body(files: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, data) in files {
            body.extend_from_slice(format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, name
            ).as_bytes());
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    async fn send_json(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();
        let (status, bytes) = send(app, request).await;
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn upload(app: &Router, session: &str, files: &[(&str, Vec<u8>)]) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(format!("/imports/{}/files", session))
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY))
            .body(Body::from(multipart_body(files)))
            .unwrap();
        let (status, bytes) = send(app, request).await;
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn workbook_with(codes: &[&str]) -> Vec<u8> {
        let records: Vec<Record> = codes.iter().map(|c| record(c)).collect();
        let table = project(&records, &[], &SheetLayout::default()).unwrap();
        write_workbook(&table, SHEET_NAME).unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let app = test_app();
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"OK");
    }

    #[tokio::test]
    async fn schema_lists_every_column() {
        let app = test_app();
        let (status, body) = send_json(&app, "GET", "/schema", None).await;
        assert_eq!(status, StatusCode::OK);
        let columns = body.as_array().unwrap();
        assert_eq!(columns.len(), 135);
        assert_eq!(columns[1]["key"], json!("product_code"));
        assert_eq!(columns[1]["role"], json!("product_code"));
    }

    #[tokio::test]
    async fn upload_accumulates_and_previews_last_file() {
        let app = test_app();
        let (status, created) = send_json(&app, "POST", "/imports", None).await;
        assert_eq!(status, StatusCode::CREATED);
        let session = created["session_id"].as_str().unwrap().to_string();

        let (status, first) = upload(&app, &session, &[("a.xlsx", workbook_with(&["A1", "A2", "A3"]))]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["preview_count"], json!(3));

        let (status, second) = upload(&app, &session, &[("b.xlsx", workbook_with(&["B1", "B2"]))]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["preview_count"], json!(2));
        assert_eq!(second["pending_count"], json!(5));
        assert_eq!(second["rows"][0]["product_code"], json!("B1"));

        let (status, bad) = upload(&app, &session, &[("c.xlsx", b"not a workbook".to_vec())]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(bad["kind"], json!("malformed_file"));

        let (_, preview) = send_json(&app, "GET", &format!("/imports/{}/preview", session), None).await;
        assert_eq!(preview["pending_count"], json!(5));
        assert_eq!(preview["preview_count"], json!(2));
    }

    #[tokio::test]
    async fn submit_without_data_is_rejected() {
        let app = test_app();
        let (_, created) = send_json(&app, "POST", "/imports", None).await;
        let session = created["session_id"].as_str().unwrap().to_string();

        let (status, body) = send_json(&app, "POST", &format!("/imports/{}/submit", session), None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["kind"], json!("empty_input"));
    }

    #[tokio::test]
    async fn closed_session_is_gone() {
        let app = test_app();
        let (_, created) = send_json(&app, "POST", "/imports", None).await;
        let session = created["session_id"].as_str().unwrap().to_string();

        let (status, _) = send_json(&app, "DELETE", &format!("/imports/{}", session), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send_json(&app, "GET", &format!("/imports/{}/preview", session), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], json!("session_not_found"));
    }

    #[tokio::test]
    async fn export_returns_named_workbook() {
        let app = test_app();
        let records = vec![record("M001"), record("M002")];
        let request = Request::builder()
            .method("POST")
            .uri("/exports")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "records": records, "product_codes": ["M002"] }).to_string()))
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
        assert!(disposition.contains("impedance_M002.xlsx"));
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.starts_with(b"PK"));
    }

    #[tokio::test]
    async fn export_with_unmatched_selection_fails() {
        let app = test_app();
        let body = json!({ "records": [record("M002")], "product_codes": ["M001"] });
        let (status, body) = send_json(&app, "POST", "/exports", Some(body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["kind"], json!("empty_selection"));
    }

    #[tokio::test]
    async fn export_of_nothing_fails() {
        let app = test_app();
        let (status, body) = send_json(&app, "POST", "/exports", Some(json!({ "records": [] }))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["kind"], json!("empty_input"));
    }

    #[tokio::test]
    async fn failed_submit_is_bad_gateway_and_keeps_batch() {
        let refusals = [
            (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "db down" })),
            (StatusCode::OK, json!({ "success": false, "msg": "duplicate job" })),
        ];
        for refusal in refusals {
            let app = app_with_backend(&spawn_backend(refusal, Vec::new()).await);
            let session = session_with_upload(&app, &["M001", "M002"]).await;

            let (status, body) = send_json(&app, "POST", &format!("/imports/{}/submit", session), None).await;
            assert_eq!(status, StatusCode::BAD_GATEWAY);
            assert_eq!(body["kind"], json!("backend_rejected"));

            let (_, preview) = send_json(&app, "GET", &format!("/imports/{}/preview", session), None).await;
            assert_eq!(preview["pending_count"], json!(2));
        }
    }

    #[tokio::test]
    async fn accepted_submit_clears_batch() {
        let accepted = (StatusCode::OK, json!({ "success": true, "message": "imported" }));
        let app = app_with_backend(&spawn_backend(accepted, Vec::new()).await);
        let session = session_with_upload(&app, &["M001", "M002", "M003"]).await;

        let (status, body) = send_json(&app, "POST", &format!("/imports/{}/submit", session), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["submitted"], json!(3));
        assert_eq!(body["message"], json!("imported"));

        let (_, preview) = send_json(&app, "GET", &format!("/imports/{}/preview", session), None).await;
        assert_eq!(preview["pending_count"], json!(0));
    }

    #[tokio::test]
    async fn export_without_records_uses_backend_data() {
        let stored = vec![record("M001"), record("M002"), record("M001")];
        let app = app_with_backend(&spawn_backend((StatusCode::OK, json!({ "success": true })), stored).await);

        let (status, listed) = send_json(&app, "GET", "/records", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().map(Vec::len), Some(3));

        let request = Request::builder()
            .method("POST")
            .uri("/exports")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "product_codes": ["M001"] }).to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
        assert!(disposition.contains("impedance_M001.xlsx"));

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let rows = crate::services::excel::read_sheet(body, &SheetLayout::default()).unwrap();
        assert_eq!(rows.len(), 2);
    }
}
