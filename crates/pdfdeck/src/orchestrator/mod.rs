//! Background execution of started jobs.

pub mod budget;
pub mod pool;
pub mod progress;
pub mod runner;

pub use budget::ProgressBudget;
pub use pool::{QueueSlot, WorkerPool};
pub use progress::RegistryProgress;
pub use runner::{ConversionRunner, JobOutcome, ARTIFACT_EXTENSION};
