//! Request-facing operations.
//!
//! [`ConversionService`] owns the registry, the file store, the worker pool
//! and the reaper, and exposes the operations a transport layer would map
//! to endpoints: upload, start, status, download, delete, list and health.
//! Every operation returns synchronously; conversions run on the pool.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::engine::EngineSet;
use crate::error::{PdfdeckError, ServiceError};
use crate::job::{ConversionMode, JobId, JobRegistry, JobStatus, JobView, StatusCounts};
use crate::orchestrator::{ConversionRunner, ProgressBudget, WorkerPool};
use crate::reaper::Reaper;
use crate::sanitize;
use crate::store::FileStore;

/// Leading bytes of every PDF document.
const PDF_MAGIC: &[u8] = b"%PDF-";

/// A finished deck ready to hand to the client.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub filename: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub service: String,
    pub version: String,
    pub workers: usize,
    pub accepting_jobs: bool,
    pub jobs: StatusCounts,
}

pub struct ConversionService {
    registry: Arc<JobRegistry>,
    store: Arc<FileStore>,
    pool: WorkerPool,
    reaper: Arc<Reaper>,
    reaper_handle: JoinHandle<()>,
    budget: ProgressBudget,
    max_upload_bytes: u64,
}

impl ConversionService {
    /// Builds the service and starts its workers and reaper.
    ///
    /// Must be called inside a tokio runtime.
    pub async fn new(config: &Config, engines: EngineSet) -> Result<Self, PdfdeckError> {
        let store = Arc::new(FileStore::new(
            &config.upload_directory,
            &config.output_directory,
        ));
        store.ensure_directories().await?;

        let registry = Arc::new(JobRegistry::new());
        let runner = Arc::new(ConversionRunner::new(
            Arc::clone(&registry),
            Arc::clone(&store),
            engines,
        ));
        let budget = runner.budget();
        let pool = WorkerPool::new(runner, config.worker_count, config.queue_capacity);

        let reaper = Arc::new(Reaper::new(
            Arc::clone(&registry),
            Arc::clone(&store),
            Duration::from_secs(config.job_ttl_secs),
            Duration::from_secs(config.reaper_interval_secs),
        ));
        let reaper_handle = reaper.start();

        info!(
            "Conversion service ready: uploads in {}, output in {}",
            store.upload_directory().display(),
            store.output_directory().display()
        );

        Ok(Self {
            registry,
            store,
            pool,
            reaper,
            reaper_handle,
            budget,
            max_upload_bytes: config.max_upload_bytes,
        })
    }

    /// Builds the service with the command engines named in `config`.
    pub async fn from_config(config: &Config) -> Result<Self, PdfdeckError> {
        Self::new(config, EngineSet::from_config(&config.engines)).await
    }

    /// Validates and stores an uploaded document, creating a job in
    /// `uploaded`.
    pub async fn upload(
        &self,
        original_filename: &str,
        content: &[u8],
        mode: &str,
    ) -> Result<JobId, ServiceError> {
        let mode = validate_upload(original_filename, content, mode, self.max_upload_bytes)?;

        let id = JobId::new();
        let input_path = match self.store.save_upload(&id, content).await {
            Ok(path) => path,
            Err(e) => {
                self.discard_files(&id).await;
                return Err(e.into());
            }
        };

        if let Err(e) = self
            .registry
            .create(id.clone(), mode, input_path, original_filename)
        {
            self.discard_files(&id).await;
            return Err(e.into());
        }

        info!(
            job_id = %id,
            filename = %sanitize::redact_path(Path::new(original_filename)),
            %mode,
            bytes = content.len(),
            "PDF uploaded"
        );
        Ok(id)
    }

    /// Hands an uploaded job to the worker pool and returns immediately.
    ///
    /// Queue capacity is reserved before the job leaves `uploaded`, so a
    /// busy pool rejects the request without changing anything.
    pub fn start_processing(
        &self,
        id: &JobId,
        mode: Option<ConversionMode>,
    ) -> Result<JobView, ServiceError> {
        let job = self.registry.get(id)?;
        if job.status != JobStatus::Uploaded {
            return Err(ServiceError::InvalidState {
                id: id.clone(),
                status: job.status,
            });
        }

        let slot = self.pool.reserve()?;
        let job = self
            .registry
            .begin(id, mode, self.budget.queued, "Queued for conversion")?;
        slot.submit(id.clone());

        info!(job_id = %id, mode = %job.mode, "Processing started");
        Ok(JobView::from(&job))
    }

    pub fn status(&self, id: &JobId) -> Result<JobView, ServiceError> {
        let job = self.registry.get(id)?;
        Ok(JobView::from(&job))
    }

    /// Reads the produced deck of a completed job.
    pub async fn download(&self, id: &JobId) -> Result<Artifact, ServiceError> {
        let job = self.registry.get(id)?;
        let (output_path, filename) = match (job.status, job.output_path, job.output_filename) {
            (JobStatus::Completed, Some(path), Some(filename)) => (path, filename),
            (status, _, _) => {
                return Err(ServiceError::NotReady {
                    id: id.clone(),
                    status,
                })
            }
        };

        let bytes = self.store.read(&output_path).await?;
        let media_type = mime_guess::from_path(&filename)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        debug!(job_id = %id, %filename, bytes = bytes.len(), "Serving artifact");
        Ok(Artifact {
            filename,
            media_type,
            bytes,
        })
    }

    /// Forgets the job and removes its files. Unknown ids succeed.
    ///
    /// A conversion still running for the job is not interrupted; its
    /// worker notices the job is gone and discards what it produces, so a
    /// purge that races with that worker is left to it.
    pub async fn delete(&self, id: &JobId) -> Result<(), ServiceError> {
        let removed = self.registry.delete(id);
        if let Err(e) = self.store.purge(id).await {
            match &removed {
                Some(job) if job.status.is_in_flight() => warn!(
                    job_id = %id,
                    "Files of running job not purged yet, its worker will retry: {}", e
                ),
                _ => return Err(e.into()),
            }
        }

        match removed {
            Some(job) => info!(job_id = %id, status = %job.status, "Job cleaned up"),
            None => debug!(job_id = %id, "Delete of unknown job"),
        }
        Ok(())
    }

    /// All jobs, newest first.
    pub fn list(&self) -> Vec<JobView> {
        self.registry.list().iter().map(JobView::from).collect()
    }

    pub fn health(&self) -> HealthReport {
        HealthReport {
            service: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            workers: self.pool.worker_count(),
            accepting_jobs: !self.pool.is_shutdown(),
            jobs: self.registry.counts(),
        }
    }

    /// Runs one reaper sweep immediately. Returns the number of jobs removed.
    pub async fn reap_now(&self) -> usize {
        self.reaper.sweep_once().await
    }

    /// Stops accepting work, lets queued conversions finish and stops the
    /// reaper.
    pub async fn shutdown(self) {
        self.reaper.stop();
        self.pool.shutdown();
        self.pool.wait().await;
        if let Err(e) = self.reaper_handle.await {
            warn!("Reaper task ended abnormally: {}", e);
        }
        info!("Conversion service stopped");
    }

    async fn discard_files(&self, id: &JobId) {
        if let Err(e) = self.store.purge(id).await {
            warn!(job_id = %id, "Failed to clean up rejected upload: {}", e);
        }
    }
}

/// Checks an upload before anything is stored and returns its mode.
pub fn validate_upload(
    original_filename: &str,
    content: &[u8],
    mode: &str,
    max_bytes: u64,
) -> Result<ConversionMode, ServiceError> {
    let is_pdf_name = Path::new(original_filename)
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);
    if !is_pdf_name {
        return Err(ServiceError::Validation("Only PDF files are allowed".to_string()));
    }

    if content.is_empty() {
        return Err(ServiceError::Validation("Uploaded file is empty".to_string()));
    }

    if content.len() as u64 > max_bytes {
        return Err(ServiceError::Validation(format!(
            "Uploaded file is {} bytes, limit is {}",
            content.len(),
            max_bytes
        )));
    }

    if !content.starts_with(PDF_MAGIC) {
        return Err(ServiceError::Validation(
            "Uploaded file is not a PDF document".to_string(),
        ));
    }

    mode.parse::<ConversionMode>().map_err(ServiceError::Validation)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PDF: &[u8] = b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n";

    #[test]
    fn test_validate_accepts_pdf() {
        let mode = validate_upload("Report.PDF", PDF, "safeguard", 1024).unwrap();
        assert_eq!(mode, ConversionMode::Safeguard);
    }

    #[test]
    fn test_validate_rejects_wrong_extension() {
        let err = validate_upload("slides.pptx", PDF, "precision", 1024).unwrap_err();
        match err {
            ServiceError::Validation(msg) => assert_eq!(msg, "Only PDF files are allowed"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_missing_extension() {
        assert!(matches!(
            validate_upload("report", PDF, "precision", 1024),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_body() {
        assert!(matches!(
            validate_upload("a.pdf", b"", "precision", 1024),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_rejects_oversize_body() {
        let err = validate_upload("a.pdf", PDF, "precision", 4).unwrap_err();
        assert!(err.to_string().contains("limit is 4"));
    }

    #[test]
    fn test_validate_rejects_non_pdf_content() {
        assert!(matches!(
            validate_upload("a.pdf", b"PK\x03\x04", "precision", 1024),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_rejects_unknown_mode() {
        let err = validate_upload("a.pdf", PDF, "fast", 1024).unwrap_err();
        assert!(err.to_string().contains("fast"));
    }
}
