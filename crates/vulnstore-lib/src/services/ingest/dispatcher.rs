// Ingest Dispatcher
// Runs a batch of report files through a fixed pool of workers.
// Per-file and per-scan failures are logged and counted; the batch itself
// only fails on invalid input.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tokio::task::{JoinHandle, JoinSet};

use super::cancel::CancelSignal;
use super::error::{IngestError, IngestResult};
use super::fetcher::ReportFetcher;
use super::normalizer::normalize;
use crate::models::report::parse_reports;
use crate::models::{ScanRecord, UpsertOutcome};
use crate::repositories::ScanRepository;
use crate::utils::database::Database;

/// Counts for one finished batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub files_total: usize,
    pub files_succeeded: usize,
    pub files_failed: usize,
    pub scans_persisted: usize,
    pub scans_failed: usize,
    /// Some files were skipped because the batch was cancelled
    pub cancelled: bool,
}

#[derive(Default)]
struct Counters {
    files_succeeded: AtomicUsize,
    files_failed: AtomicUsize,
    files_cancelled: AtomicUsize,
    scans_persisted: AtomicUsize,
    scans_failed: AtomicUsize,
}

impl Counters {
    fn summary(&self, files_total: usize) -> BatchSummary {
        BatchSummary {
            files_total,
            files_succeeded: self.files_succeeded.load(Ordering::SeqCst),
            files_failed: self.files_failed.load(Ordering::SeqCst),
            scans_persisted: self.scans_persisted.load(Ordering::SeqCst),
            scans_failed: self.scans_failed.load(Ordering::SeqCst),
            cancelled: self.files_cancelled.load(Ordering::SeqCst) > 0,
        }
    }
}

enum FileOutcome {
    Processed { persisted: usize, failed: usize },
    Cancelled,
}

/// Ingestion entry point shared by all requests
#[derive(Clone)]
pub struct IngestDispatcher {
    repo: ScanRepository,
    fetcher: Arc<dyn ReportFetcher>,
    worker_count: usize,
}

impl IngestDispatcher {
    pub fn new(db: Database, fetcher: Arc<dyn ReportFetcher>, worker_count: usize) -> Self {
        Self {
            repo: ScanRepository::new(db),
            fetcher,
            worker_count: worker_count.max(1),
        }
    }

    /// Ingest every file under `source`
    pub async fn process_batch(&self, source: &str, files: &[String]) -> IngestResult<BatchSummary> {
        self.process_batch_with_cancel(source, files, CancelSignal::never())
            .await
    }

    /// Run a batch on its own task
    /// Dropping the returned handle detaches the batch; only `cancel` stops it.
    pub fn spawn_batch(
        &self,
        source: String,
        files: Vec<String>,
        cancel: CancelSignal,
    ) -> JoinHandle<IngestResult<BatchSummary>> {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            dispatcher
                .process_batch_with_cancel(&source, &files, cancel)
                .await
        })
    }

    /// Ingest every file under `source`, stopping early once `cancel` fires
    pub async fn process_batch_with_cancel(
        &self,
        source: &str,
        files: &[String],
        cancel: CancelSignal,
    ) -> IngestResult<BatchSummary> {
        if source.trim().is_empty() || files.is_empty() {
            return Err(IngestError::invalid_request("repo and files are required"));
        }

        let (tx, rx) = mpsc::channel(files.len());
        for file in files {
            tx.send(file.clone())
                .await
                .map_err(|e| IngestError::Storage {
                    message: format!("Work queue closed: {}", e),
                })?;
        }
        drop(tx);

        let pool = pool_size(self.worker_count, files.len());
        log::info!(
            "[ingest] Processing {} files from {} with {} workers",
            files.len(),
            source,
            pool
        );

        let queue = Arc::new(Mutex::new(rx));
        let counters = Arc::new(Counters::default());
        let source: Arc<str> = Arc::from(source);

        let mut workers = JoinSet::new();
        for id in 1..=pool {
            let worker = Worker {
                id,
                repo: self.repo.clone(),
                fetcher: self.fetcher.clone(),
                source: source.clone(),
                queue: queue.clone(),
                counters: counters.clone(),
                cancel: cancel.clone(),
            };
            workers.spawn(worker.run());
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                log::error!("[ingest] Worker terminated abnormally: {}", e);
            }
        }

        let summary = counters.summary(files.len());
        log::info!(
            "[ingest] Batch finished: {}/{} files ok, {} scans persisted, {} scans failed{}",
            summary.files_succeeded,
            summary.files_total,
            summary.scans_persisted,
            summary.scans_failed,
            if summary.cancelled { " (cancelled)" } else { "" }
        );
        Ok(summary)
    }
}

/// Never start more workers than there are files
fn pool_size(worker_count: usize, files: usize) -> usize {
    worker_count.min(files).max(1)
}

struct Worker {
    id: usize,
    repo: ScanRepository,
    fetcher: Arc<dyn ReportFetcher>,
    source: Arc<str>,
    queue: Arc<Mutex<mpsc::Receiver<String>>>,
    counters: Arc<Counters>,
    cancel: CancelSignal,
}

impl Worker {
    async fn run(mut self) {
        loop {
            let next = self.queue.lock().await.recv().await;
            let Some(file) = next else {
                break;
            };

            if self.cancel.is_cancelled() {
                log::info!("[ingest] Worker {}: skipping {} (cancelled)", self.id, file);
                self.counters.files_cancelled.fetch_add(1, Ordering::SeqCst);
                continue;
            }

            match self.process_file(&file).await {
                Ok(FileOutcome::Processed { persisted, failed }) => {
                    self.counters.scans_persisted.fetch_add(persisted, Ordering::SeqCst);
                    self.counters.scans_failed.fetch_add(failed, Ordering::SeqCst);
                    if failed == 0 {
                        self.counters.files_succeeded.fetch_add(1, Ordering::SeqCst);
                        log::info!(
                            "[ingest] Worker {}: {} done ({} scans)",
                            self.id,
                            file,
                            persisted
                        );
                    } else {
                        self.counters.files_failed.fetch_add(1, Ordering::SeqCst);
                        log::warn!(
                            "[ingest] Worker {}: {} finished with {} of {} scans failed",
                            self.id,
                            file,
                            failed,
                            persisted + failed
                        );
                    }
                }
                Ok(FileOutcome::Cancelled) => {
                    log::info!("[ingest] Worker {}: {} cancelled during fetch", self.id, file);
                    self.counters.files_cancelled.fetch_add(1, Ordering::SeqCst);
                }
                Err(e) => {
                    log::error!(
                        "[ingest] Worker {}: {} failed [{}]: {}",
                        self.id,
                        file,
                        e.code().as_str(),
                        e
                    );
                    self.counters.files_failed.fetch_add(1, Ordering::SeqCst);
                }
            }
        }
    }

    async fn process_file(&mut self, file: &str) -> IngestResult<FileOutcome> {
        let body = tokio::select! {
            fetched = self.fetcher.fetch(&self.source, file) => fetched?,
            _ = self.cancel.cancelled() => return Ok(FileOutcome::Cancelled),
        };

        let reports = parse_reports(&body).map_err(|e| IngestError::ParseFailed {
            file_name: file.to_string(),
            message: e.to_string(),
        })?;

        let mut persisted = 0;
        let mut failed = 0;
        for report in reports {
            let record = normalize(report);
            let scan_id = record.scan_id.clone();
            match self.persist(record).await {
                Ok(outcome) => {
                    log::debug!("[ingest] Scan {} {}", scan_id, outcome.as_str());
                    persisted += 1;
                }
                Err(e) => {
                    log::error!("[ingest] {} [{}]", e, e.code().as_str());
                    failed += 1;
                }
            }
        }

        Ok(FileOutcome::Processed { persisted, failed })
    }

    async fn persist(&self, record: ScanRecord) -> IngestResult<UpsertOutcome> {
        let scan_id = record.scan_id.clone();
        let repo = self.repo.clone();

        tokio::task::spawn_blocking(move || repo.upsert_scan(&record))
            .await?
            .map_err(|message| IngestError::PersistFailed { scan_id, message })
    }
}
