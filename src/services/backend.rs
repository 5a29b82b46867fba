use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::error::AppError;
use crate::models::{BackendResult, Record};

const IMPORT_PATH: &str = "/impedance/import";
const LIST_PATH: &str = "/impedance/list";

/// The two backend endpoints the pipeline depends on.
pub trait RecordBackend: Send + Sync {
    fn bulk_import(&self, records: &[Record]) -> impl Future<Output = Result<BackendResult, AppError>> + Send;

    fn list_records(&self) -> impl Future<Output = Result<Vec<Record>, AppError>> + Send;
}

#[derive(Debug, Deserialize)]
struct ListEnvelope {
    success: bool,
    #[serde(default, alias = "msg")]
    message: Option<String>,
    #[serde(default)]
    data: Vec<Record>,
}

#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, AppError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()
            .map_err(|e| AppError::InvalidInput(format!("Failed to build backend client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl RecordBackend for BackendClient {
    async fn bulk_import(&self, records: &[Record]) -> Result<BackendResult, AppError> {
        let start = std::time::Instant::now();
        tracing::info!("Submitting {} records to backend", records.len());

        let response = self.client
            .post(self.url(IMPORT_PATH))
            .json(records)
            .send()
            .await
            .map_err(|e| AppError::BackendRejected(format!("Failed to reach backend: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::BackendRejected(format!(
                "Bulk import failed. Status: {}{}",
                status,
                if body.is_empty() { String::new() } else { format!(", body: {}", body) }
            )));
        }

        let result: BackendResult = response.json().await
            .map_err(|e| AppError::BackendRejected(format!("Unreadable backend response: {}", e)))?;
        tracing::info!("Backend answered bulk import in {:?}: success={}", start.elapsed(), result.success);
        Ok(result)
    }

    async fn list_records(&self) -> Result<Vec<Record>, AppError> {
        let response = self.client
            .get(self.url(LIST_PATH))
            .send()
            .await
            .map_err(|e| AppError::BackendRejected(format!("Failed to reach backend: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::BackendRejected(format!(
                "Listing records failed. Status: {}",
                response.status()
            )));
        }

        let envelope: ListEnvelope = response.json().await
            .map_err(|e| AppError::BackendRejected(format!("Unreadable backend response: {}", e)))?;
        if !envelope.success {
            return Err(AppError::BackendRejected(
                envelope.message.unwrap_or_else(|| "Listing records failed".to_string()),
            ));
        }

        tracing::debug!("Fetched {} records from backend", envelope.data.len());
        Ok(envelope.data.into_iter().map(Record::conform).collect())
    }
}
