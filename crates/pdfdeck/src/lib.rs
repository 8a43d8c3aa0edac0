pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod job;
pub mod orchestrator;
pub mod reaper;
pub mod sanitize;
pub mod service;
pub mod store;
pub mod telemetry;

pub use client::{poll_until_terminal, PollOptions, StatusSource};
pub use config::{load_config, Config};
pub use engine::{
    CommandEngine, ConversionEngine, ConversionRequest, EnginePhase, EngineProgress, EngineSet,
    NoopSink, ProgressSink,
};
pub use error::{
    ConfigError, ConversionError, PdfdeckError, PollError, RegistryError, Result, ServiceError,
    StorageError, WorkerError,
};
pub use job::{ConversionMode, Job, JobId, JobRegistry, JobStatus, JobView, StatusCounts};
pub use reaper::Reaper;
pub use service::{Artifact, ConversionService, HealthReport};
pub use store::FileStore;
pub use telemetry::init_tracing;
