//! Job entity and its state machine.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque job identifier. Generated once at upload time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Generates a fresh random identifier.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Which conversion engine variant processes a job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ConversionMode {
    /// Standard conversion.
    Precision,
    /// Conversion with a backup image layer under the editable text.
    Safeguard,
}

impl ConversionMode {
    pub const ALL: [ConversionMode; 2] = [ConversionMode::Precision, ConversionMode::Safeguard];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConversionMode::Precision => "precision",
            ConversionMode::Safeguard => "safeguard",
        }
    }
}

impl fmt::Display for ConversionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "precision" => Ok(ConversionMode::Precision),
            "safeguard" => Ok(ConversionMode::Safeguard),
            other => Err(format!(
                "unknown conversion mode '{}', expected 'precision' or 'safeguard'",
                other
            )),
        }
    }
}

/// Lifecycle status of a job.
///
/// Statuses advance in declaration order. `Error` is reachable from any
/// non-terminal status; `Completed` and `Error` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Uploaded,
    Processing,
    Analyzing,
    Generating,
    Completed,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }

    /// Queued or held by a worker.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            JobStatus::Processing | JobStatus::Analyzing | JobStatus::Generating
        )
    }

    fn rank(&self) -> u8 {
        match self {
            JobStatus::Uploaded => 0,
            JobStatus::Processing => 1,
            JobStatus::Analyzing => 2,
            JobStatus::Generating => 3,
            JobStatus::Completed => 4,
            JobStatus::Error => 5,
        }
    }

    /// Whether a job in `self` may be moved to `next`.
    ///
    /// Staying in the same non-terminal status is allowed so that progress
    /// and message can be refreshed within a phase.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            JobStatus::Error => true,
            JobStatus::Uploaded => *self == JobStatus::Uploaded,
            _ => next.rank() >= self.rank(),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobStatus::Uploaded => "uploaded",
            JobStatus::Processing => "processing",
            JobStatus::Analyzing => "analyzing",
            JobStatus::Generating => "generating",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        };
        f.pad(label)
    }
}

/// A conversion job record as held by the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    pub mode: ConversionMode,
    /// Overall progress, 0-100.
    pub progress: u8,
    /// Description of the current phase.
    pub message: String,
    /// Stored upload owned by this job.
    pub input_path: PathBuf,
    /// Filename the client uploaded.
    pub original_filename: String,
    /// Produced artifact (set on completion only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    /// Display name of the artifact (set on completion only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_filename: Option<String>,
    /// Failure detail (set on error only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Creates a freshly uploaded job.
    pub fn new(
        id: JobId,
        mode: ConversionMode,
        input_path: PathBuf,
        original_filename: &str,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: JobStatus::Uploaded,
            mode,
            progress: 0,
            message: "PDF uploaded successfully".to_string(),
            input_path,
            original_filename: original_filename.to_string(),
            output_path: None,
            output_filename: None,
            error_detail: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Client-facing view of a job. Never exposes on-disk paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    pub job_id: JobId,
    pub status: JobStatus,
    pub mode: ConversionMode,
    pub progress: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Job> for JobView {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            status: job.status,
            mode: job.mode,
            progress: job.progress,
            message: job.message.clone(),
            output_filename: job.output_filename.clone(),
            error_detail: job.error_detail.clone(),
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}
