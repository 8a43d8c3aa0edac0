use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::job::{ConversionMode, JobId, JobStatus};

#[derive(Error, Debug)]
pub enum PdfdeckError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Failed to install tracing subscriber: {0}")]
    Telemetry(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove '{path}': {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Converter reported success but produced no artifact at '{0}'")]
    MissingArtifact(PathBuf),

    #[error("File already exists: {0}")]
    FileExists(PathBuf),
}

/// Terminal failure reported by a conversion engine.
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("{0}")]
    Failed(String),

    #[error("Failed to launch converter '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Converter I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Converter timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Converter panicked: {0}")]
    Panicked(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Job already exists: {0}")]
    Duplicate(JobId),

    #[error("Job {id} is already {status} and cannot be modified")]
    Terminal { id: JobId, status: JobStatus },

    #[error("Job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Job {id} is {status}, expected uploaded")]
    NotStartable { id: JobId, status: JobStatus },

    #[error("Job {id} was uploaded for {actual} mode, not {requested}")]
    ModeMismatch {
        id: JobId,
        requested: ConversionMode,
        actual: ConversionMode,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
    #[error("Worker queue is full")]
    QueueFull,

    #[error("Worker pool is shut down")]
    ShutDown,
}

/// Errors surfaced synchronously to the caller of a request-path operation.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Job {id} is {status}; processing can only start from uploaded")]
    InvalidState { id: JobId, status: JobStatus },

    #[error("Job {id} is {status}; result not ready")]
    NotReady { id: JobId, status: JobStatus },

    #[error("Server busy: {0}")]
    Busy(#[from] WorkerError),

    #[error("Storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Registry rejected the request: {0}")]
    Registry(RegistryError),
}

impl From<RegistryError> for ServiceError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(id) => ServiceError::NotFound(id),
            RegistryError::NotStartable { id, status } => ServiceError::InvalidState { id, status },
            RegistryError::ModeMismatch { .. } => ServiceError::Validation(err.to_string()),
            other => ServiceError::Registry(other),
        }
    }
}

#[derive(Error, Debug)]
pub enum PollError {
    #[error("Status query failed: {0}")]
    Status(#[from] ServiceError),

    #[error("Job {id} did not finish within {}s (last status: {last_status})", .waited.as_secs())]
    TimedOut {
        id: JobId,
        waited: Duration,
        last_status: JobStatus,
    },
}

pub type Result<T> = std::result::Result<T, PdfdeckError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_not_found_maps_to_service_not_found() {
        let id = JobId::from("abc");
        let err: ServiceError = RegistryError::NotFound(id.clone()).into();
        assert!(matches!(err, ServiceError::NotFound(ref got) if *got == id));
    }

    #[test]
    fn test_not_startable_maps_to_invalid_state() {
        let err: ServiceError = RegistryError::NotStartable {
            id: JobId::from("abc"),
            status: JobStatus::Analyzing,
        }
        .into();
        assert!(matches!(
            err,
            ServiceError::InvalidState {
                status: JobStatus::Analyzing,
                ..
            }
        ));
    }

    #[test]
    fn test_mode_mismatch_is_a_validation_error() {
        let err: ServiceError = RegistryError::ModeMismatch {
            id: JobId::from("abc"),
            requested: ConversionMode::Safeguard,
            actual: ConversionMode::Precision,
        }
        .into();
        match err {
            ServiceError::Validation(msg) => assert!(msg.contains("precision")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_timeout_message_mentions_seconds() {
        let err = ConversionError::Timeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "Converter timed out after 30s");
    }
}
