use crate::engine::EnginePhase;
use crate::job::JobStatus;

/// How the 0-100 job progress is split across the pipeline.
///
/// Bands are contiguous and increasing, so scaling engine-relative
/// percentages into them keeps overall progress monotonic. 100 is reserved
/// for completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressBudget {
    /// Progress once the job is handed to the worker pool.
    pub queued: u8,
    pub analysis: (u8, u8),
    pub generation: (u8, u8),
}

impl ProgressBudget {
    pub const DEFAULT: ProgressBudget = ProgressBudget {
        queued: 10,
        analysis: (10, 50),
        generation: (50, 99),
    };

    fn band(&self, phase: EnginePhase) -> (u8, u8) {
        match phase {
            EnginePhase::Analysis => self.analysis,
            EnginePhase::Generation => self.generation,
        }
    }

    /// Maps an engine percentage within `phase` onto overall progress.
    pub fn scale(&self, phase: EnginePhase, percent: u8) -> u8 {
        let (start, end) = self.band(phase);
        let span = u16::from(end.saturating_sub(start));
        let offset = span * u16::from(percent.min(100)) / 100;
        start.saturating_add(offset as u8)
    }

    /// Overall progress at the start of `phase`.
    pub fn start_of(&self, phase: EnginePhase) -> u8 {
        self.band(phase).0
    }

    pub fn status_for(phase: EnginePhase) -> JobStatus {
        match phase {
            EnginePhase::Analysis => JobStatus::Analyzing,
            EnginePhase::Generation => JobStatus::Generating,
        }
    }
}

impl Default for ProgressBudget {
    fn default() -> Self {
        Self::DEFAULT
    }
}
