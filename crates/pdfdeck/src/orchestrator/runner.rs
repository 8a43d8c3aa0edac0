use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::FutureExt;
use tracing::{debug, info, info_span, warn, Instrument};

use super::budget::ProgressBudget;
use super::progress::RegistryProgress;
use crate::engine::{ConversionRequest, EnginePhase, EngineSet};
use crate::error::{ConversionError, RegistryError, StorageError};
use crate::job::{Job, JobId, JobRegistry, JobStatus};
use crate::sanitize;
use crate::store::FileStore;

/// Extension of the produced deck.
pub const ARTIFACT_EXTENSION: &str = "pptx";

/// How a background conversion ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed { output_path: PathBuf },
    Failed { detail: String },
    /// The job was deleted while it ran; nothing was recorded.
    Abandoned,
}

/// Drives one job from `processing` to a terminal state.
pub struct ConversionRunner {
    registry: Arc<JobRegistry>,
    store: Arc<FileStore>,
    engines: EngineSet,
    budget: ProgressBudget,
}

impl ConversionRunner {
    pub fn new(registry: Arc<JobRegistry>, store: Arc<FileStore>, engines: EngineSet) -> Self {
        Self {
            registry,
            store,
            engines,
            budget: ProgressBudget::DEFAULT,
        }
    }

    pub fn budget(&self) -> ProgressBudget {
        self.budget
    }

    /// Runs the conversion for `id`.
    ///
    /// Never panics and never returns an error: every failure is written to
    /// the registry as the job's `error` state.
    pub async fn run(&self, id: &JobId) -> JobOutcome {
        let job = match self.registry.get(id) {
            Ok(job) => job,
            Err(_) => return self.abandon(id).await,
        };

        let span = info_span!("conversion",
            job_id = %job.id,
            filename = %sanitize::redact_path(Path::new(&job.original_filename)),
            mode = %job.mode,
        );
        self.execute(job).instrument(span).await
    }

    async fn execute(&self, job: Job) -> JobOutcome {
        match self.registry.update(
            &job.id,
            JobStatus::Analyzing,
            self.budget.start_of(EnginePhase::Analysis),
            "Analyzing page content...",
        ) {
            Ok(_) => {}
            Err(RegistryError::NotFound(_)) => return self.abandon(&job.id).await,
            Err(e) => {
                warn!("Job cannot enter analysis: {}", e);
                return JobOutcome::Failed {
                    detail: e.to_string(),
                };
            }
        }

        match self.convert(&job).await {
            Ok((output_path, output_filename)) => {
                self.finish(&job.id, output_path, &output_filename).await
            }
            Err(detail) => self.fail(&job.id, detail).await,
        }
    }

    async fn convert(&self, job: &Job) -> Result<(PathBuf, String), String> {
        let output_filename =
            sanitize::artifact_filename(&job.original_filename, ARTIFACT_EXTENSION);
        let output_path = self
            .store
            .reserve_output(&job.id, &output_filename)
            .await
            .map_err(|e| e.to_string())?;

        let request = ConversionRequest {
            job_id: job.id.clone(),
            mode: job.mode,
            input_path: job.input_path.clone(),
            output_path,
        };
        let engine = self.engines.for_mode(job.mode);
        let sink = RegistryProgress::new(job.id.clone(), Arc::clone(&self.registry), self.budget);

        let produced = AssertUnwindSafe(engine.convert(&request, &sink))
            .catch_unwind()
            .instrument(info_span!("engine", engine = engine.name()))
            .await;
        let produced = match produced {
            Ok(Ok(path)) => path,
            Ok(Err(e)) => return Err(e.to_string()),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                return Err(ConversionError::Panicked(message).to_string());
            }
        };

        if !self.store.is_file(&produced).await {
            return Err(StorageError::MissingArtifact(produced).to_string());
        }
        debug!("Engine {} produced {}", engine.name(), sanitize::redact_path(&produced));
        Ok((produced, output_filename))
    }

    async fn finish(&self, id: &JobId, output_path: PathBuf, output_filename: &str) -> JobOutcome {
        match self
            .registry
            .set_result(id, output_path.clone(), output_filename)
        {
            Ok(_) => {
                info!("Conversion completed");
                JobOutcome::Completed { output_path }
            }
            Err(RegistryError::NotFound(_)) => self.abandon(id).await,
            Err(e) => {
                warn!("Could not record result: {}", e);
                JobOutcome::Failed {
                    detail: e.to_string(),
                }
            }
        }
    }

    async fn fail(&self, id: &JobId, detail: String) -> JobOutcome {
        match self.registry.set_error(id, &detail) {
            Ok(_) => {
                warn!("Conversion failed: {}", detail);
                JobOutcome::Failed { detail }
            }
            Err(RegistryError::NotFound(_)) => self.abandon(id).await,
            Err(e) => {
                warn!("Could not record failure '{}': {}", detail, e);
                JobOutcome::Failed { detail }
            }
        }
    }

    /// The job is gone from the registry: drop whatever it left on disk.
    async fn abandon(&self, id: &JobId) -> JobOutcome {
        info!(job_id = %id, "Job was deleted during conversion, discarding its files");
        if let Err(e) = self.store.purge(id).await {
            warn!(job_id = %id, "Failed to purge files of deleted job: {}", e);
        }
        JobOutcome::Abandoned
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
