//! In-memory job registry.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::model::{ConversionMode, Job, JobId, JobStatus};
use crate::error::RegistryError;

/// Number of jobs per status.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub uploaded: usize,
    pub processing: usize,
    pub analyzing: usize,
    pub generating: usize,
    pub completed: usize,
    pub error: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.uploaded
            + self.processing
            + self.analyzing
            + self.generating
            + self.completed
            + self.error
    }

    /// Jobs handed to the worker pool that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.processing + self.analyzing + self.generating
    }
}

/// Single source of truth for job state.
///
/// Every mutation clones the current record, applies the change and writes
/// the replacement back while holding the write lock, so readers only ever
/// see whole records. Reads hand out owned snapshots.
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<JobId, Job>> {
        match self.jobs.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<JobId, Job>> {
        match self.jobs.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Replaces the record for `id` with the one produced by `change`.
    fn replace<F>(&self, id: &JobId, change: F) -> Result<Job, RegistryError>
    where
        F: FnOnce(&Job) -> Result<Job, RegistryError>,
    {
        let mut jobs = self.write();
        let current = jobs
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.clone()))?;
        let mut next = change(current)?;
        next.updated_at = Utc::now();
        jobs.insert(id.clone(), next.clone());
        Ok(next)
    }

    fn ensure_mutable(job: &Job) -> Result<(), RegistryError> {
        if job.status.is_terminal() {
            return Err(RegistryError::Terminal {
                id: job.id.clone(),
                status: job.status,
            });
        }
        Ok(())
    }

    /// Registers a freshly uploaded job.
    pub fn create(
        &self,
        id: JobId,
        mode: ConversionMode,
        input_path: PathBuf,
        original_filename: &str,
    ) -> Result<JobId, RegistryError> {
        let mut jobs = self.write();
        if jobs.contains_key(&id) {
            return Err(RegistryError::Duplicate(id));
        }
        let job = Job::new(id.clone(), mode, input_path, original_filename);
        jobs.insert(id.clone(), job);
        Ok(id)
    }

    /// Returns a snapshot of the job.
    pub fn get(&self, id: &JobId) -> Result<Job, RegistryError> {
        self.read()
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.clone()))
    }

    pub fn contains(&self, id: &JobId) -> bool {
        self.read().contains_key(id)
    }

    /// Moves an uploaded job into the processing queue.
    ///
    /// This is the compare-and-set used by "start processing": it fails
    /// without touching the record unless the job is still `uploaded` and,
    /// when a mode is given, that mode matches the one chosen at upload.
    pub fn begin(
        &self,
        id: &JobId,
        confirm_mode: Option<ConversionMode>,
        progress: u8,
        message: &str,
    ) -> Result<Job, RegistryError> {
        self.replace(id, |current| {
            if current.status != JobStatus::Uploaded {
                return Err(RegistryError::NotStartable {
                    id: id.clone(),
                    status: current.status,
                });
            }
            if let Some(requested) = confirm_mode {
                if requested != current.mode {
                    return Err(RegistryError::ModeMismatch {
                        id: id.clone(),
                        requested,
                        actual: current.mode,
                    });
                }
            }
            let mut next = current.clone();
            next.status = JobStatus::Processing;
            next.progress = progress.clamp(current.progress, 100);
            next.message = message.to_string();
            Ok(next)
        })
    }

    /// Records progress within a non-terminal phase.
    ///
    /// Progress never moves backwards; a lower value keeps the current one.
    /// Terminal statuses must go through [`set_result`](Self::set_result)
    /// or [`set_error`](Self::set_error).
    pub fn update(
        &self,
        id: &JobId,
        status: JobStatus,
        progress: u8,
        message: &str,
    ) -> Result<Job, RegistryError> {
        self.replace(id, |current| {
            Self::ensure_mutable(current)?;
            if status.is_terminal() || !current.status.can_transition_to(status) {
                return Err(RegistryError::InvalidTransition {
                    id: id.clone(),
                    from: current.status,
                    to: status,
                });
            }
            let mut next = current.clone();
            next.status = status;
            next.progress = progress.min(100).max(current.progress);
            next.message = message.to_string();
            Ok(next)
        })
    }

    /// Marks the job completed with its produced artifact.
    pub fn set_result(
        &self,
        id: &JobId,
        output_path: PathBuf,
        output_filename: &str,
    ) -> Result<Job, RegistryError> {
        self.replace(id, |current| {
            Self::ensure_mutable(current)?;
            let mut next = current.clone();
            next.status = JobStatus::Completed;
            next.progress = 100;
            next.message = "Conversion completed".to_string();
            next.output_path = Some(output_path);
            next.output_filename = Some(output_filename.to_string());
            Ok(next)
        })
    }

    /// Marks the job failed. Progress is left at its last value.
    pub fn set_error(&self, id: &JobId, detail: &str) -> Result<Job, RegistryError> {
        self.replace(id, |current| {
            Self::ensure_mutable(current)?;
            let mut next = current.clone();
            next.status = JobStatus::Error;
            next.message = "Conversion failed".to_string();
            next.error_detail = Some(detail.to_string());
            next.output_path = None;
            next.output_filename = None;
            Ok(next)
        })
    }

    /// Removes the job. Removing an unknown id is a no-op.
    pub fn delete(&self, id: &JobId) -> Option<Job> {
        self.write().remove(id)
    }

    /// Returns all jobs, newest first.
    pub fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.read().values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    pub fn counts(&self) -> StatusCounts {
        let jobs = self.read();
        let mut counts = StatusCounts::default();
        for job in jobs.values() {
            match job.status {
                JobStatus::Uploaded => counts.uploaded += 1,
                JobStatus::Processing => counts.processing += 1,
                JobStatus::Analyzing => counts.analyzing += 1,
                JobStatus::Generating => counts.generating += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Error => counts.error += 1,
            }
        }
        counts
    }

    /// Removes and returns jobs idle for longer than `ttl` that no worker is
    /// touching: finished jobs and uploads that were never started.
    ///
    /// Selection and removal happen under one write lock, so a job started
    /// concurrently is never swept.
    pub fn take_stale(&self, ttl: Duration, now: DateTime<Utc>) -> Vec<Job> {
        let mut jobs = self.write();
        let ids: Vec<JobId> = jobs
            .values()
            .filter(|job| is_stale(job, ttl, now))
            .map(|job| job.id.clone())
            .collect();
        ids.iter().filter_map(|id| jobs.remove(id)).collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

fn is_stale(job: &Job, ttl: Duration, now: DateTime<Utc>) -> bool {
    let idle = job.status.is_terminal() || job.status == JobStatus::Uploaded;
    idle && now - job.updated_at > ttl
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}
