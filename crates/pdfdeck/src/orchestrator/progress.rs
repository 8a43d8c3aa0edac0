use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use super::budget::ProgressBudget;
use crate::engine::{EnginePhase, EngineProgress, ProgressSink};
use crate::error::RegistryError;
use crate::job::{JobId, JobRegistry};

struct SinkState {
    /// Furthest phase reported so far.
    phase: EnginePhase,
    /// Set once the registry stops accepting writes for this job.
    detached: bool,
}

/// Bridges engine progress into registry updates for one job.
///
/// Reports are serialised behind a mutex, so an engine that reports from
/// several tasks still produces one ordered stream of registry writes.
/// Once the phase reaches generation it stays there: a late analysis
/// report is counted at the start of the generation band instead of
/// moving the job backwards.
pub struct RegistryProgress {
    job_id: JobId,
    registry: Arc<JobRegistry>,
    budget: ProgressBudget,
    state: Mutex<SinkState>,
}

impl RegistryProgress {
    pub fn new(job_id: JobId, registry: Arc<JobRegistry>, budget: ProgressBudget) -> Self {
        Self {
            job_id,
            registry,
            budget,
            state: Mutex::new(SinkState {
                phase: EnginePhase::Analysis,
                detached: false,
            }),
        }
    }

    /// Whether the job vanished or finished while the engine was running.
    pub fn is_detached(&self) -> bool {
        match self.state.lock() {
            Ok(state) => state.detached,
            Err(poisoned) => poisoned.into_inner().detached,
        }
    }
}

impl ProgressSink for RegistryProgress {
    fn report(&self, progress: EngineProgress) {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Progress sink lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        if state.detached {
            return;
        }

        let (phase, overall) = match (state.phase, progress.phase) {
            (EnginePhase::Generation, EnginePhase::Analysis) => (
                EnginePhase::Generation,
                self.budget.start_of(EnginePhase::Generation),
            ),
            (_, reported) => (reported, self.budget.scale(reported, progress.percent)),
        };
        state.phase = phase;

        let status = ProgressBudget::status_for(phase);
        match self
            .registry
            .update(&self.job_id, status, overall, &progress.message)
        {
            Ok(_) => {}
            Err(RegistryError::NotFound(_)) => {
                debug!(job_id = %self.job_id, "Job deleted mid-run, dropping progress");
                state.detached = true;
            }
            Err(RegistryError::Terminal { status, .. }) => {
                debug!(job_id = %self.job_id, %status, "Job already finished, dropping progress");
                state.detached = true;
            }
            Err(e) => warn!(job_id = %self.job_id, "Progress update rejected: {}", e),
        }
    }
}
