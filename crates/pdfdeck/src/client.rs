//! Polling client.
//!
//! Conversions finish in the background, so callers learn about completion
//! by reading status at a fixed cadence. [`poll_until_terminal`] does that
//! against any [`StatusSource`] and hands every observed view to a callback.

use std::time::Duration;

use tokio::time::Instant;

use crate::error::{PollError, ServiceError};
use crate::job::{JobId, JobView};
use crate::service::ConversionService;

/// Anything that can report the current view of a job.
pub trait StatusSource {
    fn job_status(&self, id: &JobId) -> Result<JobView, ServiceError>;
}

impl StatusSource for ConversionService {
    fn job_status(&self, id: &JobId) -> Result<JobView, ServiceError> {
        self.status(id)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PollOptions {
    /// Time between two status reads.
    pub interval: Duration,
    /// Give up after this long. Waits forever when unset.
    pub deadline: Option<Duration>,
}

impl PollOptions {
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

impl Default for PollOptions {
    fn default() -> Self {
        Self::every(Duration::from_secs(1))
    }
}

/// Reads status until the job is `completed` or `error` and returns that
/// final view. `on_update` sees every view read, including the last one.
pub async fn poll_until_terminal<S, F>(
    source: &S,
    id: &JobId,
    options: PollOptions,
    mut on_update: F,
) -> Result<JobView, PollError>
where
    S: StatusSource + ?Sized,
    F: FnMut(&JobView),
{
    let started = Instant::now();

    loop {
        let view = source.job_status(id)?;
        on_update(&view);
        if view.status.is_terminal() {
            return Ok(view);
        }

        if let Some(deadline) = options.deadline {
            let waited = started.elapsed();
            if waited >= deadline {
                return Err(PollError::TimedOut {
                    id: id.clone(),
                    waited,
                    last_status: view.status,
                });
            }
        }

        tokio::time::sleep(options.interval).await;
    }
}
