use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{BackendResult, Record};
use crate::services::backend::RecordBackend;
use crate::services::excel::{transform_rows, RawRow, SheetLayout};

/// Records uploaded in one import session and not yet submitted.
///
/// Files accumulate: each `add_file` appends to the pending batch, while the
/// preview only shows the rows of the file added last.
#[derive(Debug)]
pub struct ImportAccumulator {
    layout: SheetLayout,
    pending: Vec<Record>,
    last_file_start: usize,
}

impl ImportAccumulator {
    pub fn new(layout: SheetLayout) -> Self {
        Self {
            layout,
            pending: Vec::new(),
            last_file_start: 0,
        }
    }

    /// Transforms a parsed file and appends it. An empty file leaves the batch untouched.
    pub fn add_file(&mut self, rows: Vec<RawRow>) -> Result<&[Record], AppError> {
        let records = transform_rows(rows, &self.layout)?;
        self.last_file_start = self.pending.len();
        self.pending.extend(records);
        tracing::debug!(
            "Added {} rows, {} pending",
            self.pending.len() - self.last_file_start,
            self.pending.len()
        );
        Ok(self.preview())
    }

    pub fn preview(&self) -> &[Record] {
        &self.pending[self.last_file_start..]
    }

    pub fn pending(&self) -> &[Record] {
        &self.pending
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.last_file_start = 0;
    }

    /// Sends the whole batch in one call. The batch is cleared only when the backend accepts it.
    pub async fn submit<B: RecordBackend>(&mut self, backend: &B) -> Result<BackendResult, AppError> {
        if self.pending.is_empty() {
            return Err(AppError::EmptyInput("There is no data to submit".to_string()));
        }

        let result = backend.bulk_import(&self.pending).await?;
        if !result.success {
            tracing::warn!("Backend rejected batch of {} records: {:?}", self.pending.len(), result.message);
            return Err(AppError::BackendRejected(
                result.message.unwrap_or_else(|| "Import was rejected".to_string()),
            ));
        }

        tracing::info!("Submitted batch of {} records", self.pending.len());
        self.clear();
        Ok(result)
    }
}

pub type SharedAccumulator = Arc<Mutex<ImportAccumulator>>;

/// Open import sessions. Idle sessions expire and take their pending batch with them.
#[derive(Clone)]
pub struct ImportSessions {
    sessions: Cache<Uuid, SharedAccumulator>,
    layout: SheetLayout,
}

impl ImportSessions {
    pub fn new(ttl: Duration, layout: SheetLayout) -> Self {
        Self {
            sessions: Cache::builder()
                .max_capacity(10_000)
                .time_to_idle(ttl)
                .build(),
            layout,
        }
    }

    pub fn create(&self) -> (Uuid, SharedAccumulator) {
        let id = Uuid::new_v4();
        let session = Arc::new(Mutex::new(ImportAccumulator::new(self.layout)));
        self.sessions.insert(id, session.clone());
        tracing::debug!("Opened import session {}", id);
        (id, session)
    }

    pub fn get(&self, id: &Uuid) -> Result<SharedAccumulator, AppError> {
        self.sessions
            .get(id)
            .ok_or_else(|| AppError::SessionNotFound(id.to_string()))
    }

    pub fn close(&self, id: &Uuid) -> Result<(), AppError> {
        let session = self.sessions
            .remove(id)
            .ok_or_else(|| AppError::SessionNotFound(id.to_string()))?;
        if let Ok(mut acc) = session.try_lock() {
            acc.clear();
        }
        tracing::debug!("Closed import session {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CellValue;
    use crate::services::excel::RawCell;
    use std::sync::Mutex as StdMutex;

    /// In-memory backend that records every submitted batch.
    #[derive(Default)]
    struct FakeBackend {
        accept: bool,
        submitted: StdMutex<Vec<Vec<Record>>>,
        stored: Vec<Record>,
    }

    impl RecordBackend for FakeBackend {
        async fn bulk_import(&self, records: &[Record]) -> Result<BackendResult, AppError> {
            self.submitted.lock().unwrap().push(records.to_vec());
            Ok(BackendResult {
                success: self.accept,
                message: Some(if self.accept { "imported" } else { "duplicate job" }.to_string()),
            })
        }

        async fn list_records(&self) -> Result<Vec<Record>, AppError> {
            Ok(self.stored.clone())
        }
    }

    fn file(prefix: &str, n: usize) -> Vec<RawRow> {
        (0..n)
            .map(|i| vec![RawCell::Number(i as f64 + 1.0), RawCell::Text(format!("{}-{}", prefix, i))])
            .collect()
    }

    fn jobs(records: &[Record]) -> Vec<String> {
        records.iter().filter_map(|r| r.get("job_no").to_display()).collect()
    }

    #[test]
    fn files_accumulate_and_preview_shows_last() {
        let mut acc = ImportAccumulator::new(SheetLayout::default());
        acc.add_file(file("A", 3)).unwrap();
        let preview = acc.add_file(file("B", 2)).unwrap();
        assert_eq!(jobs(preview), ["B-0", "B-1"]);

        assert_eq!(jobs(acc.pending()), ["A-0", "A-1", "A-2", "B-0", "B-1"]);
        assert_eq!(acc.preview().len(), 2);
    }

    #[test]
    fn empty_file_keeps_previous_rows() {
        let mut acc = ImportAccumulator::new(SheetLayout::default());
        acc.add_file(file("A", 2)).unwrap();
        let err = acc.add_file(Vec::new()).unwrap_err();

        assert!(matches!(err, AppError::EmptyInput(_)));
        assert_eq!(acc.pending().len(), 2);
        assert_eq!(jobs(acc.preview()), ["A-0", "A-1"]);
    }

    #[test]
    fn submit_sends_whole_batch_and_clears() {
        let backend = FakeBackend { accept: true, ..Default::default() };
        let mut acc = ImportAccumulator::new(SheetLayout::default());
        acc.add_file(file("A", 3)).unwrap();
        acc.add_file(file("B", 2)).unwrap();

        let result = tokio_test::block_on(acc.submit(&backend)).unwrap();
        assert!(result.success);
        assert!(acc.pending().is_empty());
        assert!(acc.preview().is_empty());

        let submitted = backend.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        assert_eq!(jobs(&submitted[0]).len(), 5);
    }

    #[test]
    fn rejected_submit_preserves_batch() {
        let backend = FakeBackend::default();
        let mut acc = ImportAccumulator::new(SheetLayout::default());
        acc.add_file(file("A", 2)).unwrap();

        let err = tokio_test::block_on(acc.submit(&backend)).unwrap_err();
        assert!(matches!(err, AppError::BackendRejected(ref msg) if msg == "duplicate job"));
        assert_eq!(acc.pending().len(), 2);
    }

    #[test]
    fn empty_submit_is_an_error() {
        let backend = FakeBackend { accept: true, ..Default::default() };
        let mut acc = ImportAccumulator::new(SheetLayout::default());

        let err = tokio_test::block_on(acc.submit(&backend)).unwrap_err();
        assert!(matches!(err, AppError::EmptyInput(_)));
        assert!(backend.submitted.lock().unwrap().is_empty());
    }

    #[test]
    fn sessions_open_and_close() {
        let sessions = ImportSessions::new(Duration::from_secs(60), SheetLayout::default());
        let (id, session) = sessions.create();
        session.try_lock().unwrap().add_file(file("A", 1)).unwrap();

        let same = sessions.get(&id).unwrap();
        assert_eq!(same.try_lock().unwrap().pending().len(), 1);

        sessions.close(&id).unwrap();
        assert!(session.try_lock().unwrap().pending().is_empty());
        assert!(matches!(sessions.get(&id), Err(AppError::SessionNotFound(_))));
        assert!(sessions.close(&id).is_err());
    }

    #[test]
    fn imported_cells_are_normalized() {
        let mut acc = ImportAccumulator::new(SheetLayout::default());
        let rows = vec![vec![
            RawCell::Number(1.0),
            RawCell::Text("J-1".into()),
            RawCell::Text("M001".into()),
            RawCell::Text("A".into()),
            RawCell::Text("1,2".into()),
        ]];
        let preview = acc.add_file(rows).unwrap();
        assert_eq!(preview[0].get("layer_count"), &CellValue::Number(12.0));
    }
}
