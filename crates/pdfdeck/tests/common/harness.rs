//! Test harness for isolated service runs.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use pdfdeck::{
    poll_until_terminal, Config, ConversionEngine, ConversionService, EngineSet, JobId, JobView,
    PollOptions,
};

/// Smallest byte sequence the upload validation accepts as a PDF.
pub const SAMPLE_PDF: &[u8] = b"%PDF-1.7\n1 0 obj\n<< /Type /Catalog >>\nendobj\n%%EOF\n";

/// Temp directories plus a config pointing into them.
pub struct TestHarness {
    temp_dir: TempDir,
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
    pub config: Config,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let upload_dir = temp_dir.path().join("uploads");
        let output_dir = temp_dir.path().join("output");

        let config = Config {
            upload_directory: upload_dir.display().to_string(),
            output_directory: output_dir.display().to_string(),
            worker_count: 2,
            queue_capacity: 8,
            ..Config::default()
        };

        Self {
            temp_dir,
            upload_dir,
            output_dir,
            config,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Starts a service that uses `engine` for both modes.
    pub async fn service(&self, engine: Arc<dyn ConversionEngine>) -> ConversionService {
        self.service_with(EngineSet::uniform(engine)).await
    }

    pub async fn service_with(&self, engines: EngineSet) -> ConversionService {
        ConversionService::new(&self.config, engines)
            .await
            .expect("Failed to start service")
    }

    /// Uploads the sample PDF and starts processing it.
    pub async fn submit(&self, service: &ConversionService, name: &str, mode: &str) -> JobId {
        let id = service
            .upload(name, SAMPLE_PDF, mode)
            .await
            .expect("upload failed");
        service.start_processing(&id, None).expect("start failed");
        id
    }

    /// Polls quickly until the job is terminal, collecting every view seen.
    pub async fn wait_terminal(
        &self,
        service: &ConversionService,
        id: &JobId,
    ) -> (JobView, Vec<JobView>) {
        let mut seen = Vec::new();
        let options = PollOptions::every(Duration::from_millis(2))
            .with_deadline(Duration::from_secs(10));
        let last = poll_until_terminal(service, id, options, |view| seen.push(view.clone()))
            .await
            .expect("job did not finish");
        (last, seen)
    }

    /// Whether anything is left on disk for the job.
    pub fn has_files(&self, id: &JobId) -> bool {
        self.upload_dir.join(id.as_str()).exists() || self.output_dir.join(id.as_str()).exists()
    }
}
