//! Fake conversion engines.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use pdfdeck::{
    ConversionEngine, ConversionError, ConversionRequest, EnginePhase, EngineProgress,
    ProgressSink,
};

/// Reports a fixed sequence of progress events, pausing between them, and
/// writes a deck whose bytes are the job id.
pub struct ScriptedEngine {
    steps: Vec<EngineProgress>,
    pause: Duration,
}

impl ScriptedEngine {
    pub fn new(steps: Vec<EngineProgress>, pause: Duration) -> Arc<Self> {
        Arc::new(Self { steps, pause })
    }

    /// Walks both phases in steps of `step` percent.
    pub fn stepping(step: u8, pause: Duration) -> Arc<Self> {
        let mut steps = Vec::new();
        for phase in [EnginePhase::Analysis, EnginePhase::Generation] {
            for pct in (0..=100u8).step_by(usize::from(step.max(1))) {
                steps.push(EngineProgress::new(phase, pct, format!("{phase} {pct}%")));
            }
        }
        Self::new(steps, pause)
    }

    pub fn instant() -> Arc<Self> {
        Self::new(
            vec![
                EngineProgress::new(EnginePhase::Analysis, 100, "Analyzed"),
                EngineProgress::new(EnginePhase::Generation, 100, "Generated"),
            ],
            Duration::ZERO,
        )
    }
}

#[async_trait]
impl ConversionEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn convert(
        &self,
        request: &ConversionRequest,
        progress: &dyn ProgressSink,
    ) -> Result<PathBuf, ConversionError> {
        for step in &self.steps {
            progress.report(step.clone());
            if !self.pause.is_zero() {
                tokio::time::sleep(self.pause).await;
            }
        }
        tokio::fs::write(&request.output_path, request.job_id.as_str()).await?;
        Ok(request.output_path.clone())
    }
}

/// Gets partway through analysis, then fails.
pub struct FailingEngine {
    detail: String,
}

impl FailingEngine {
    pub fn new(detail: &str) -> Arc<Self> {
        Arc::new(Self {
            detail: detail.to_string(),
        })
    }
}

#[async_trait]
impl ConversionEngine for FailingEngine {
    fn name(&self) -> &str {
        "failing"
    }

    async fn convert(
        &self,
        _request: &ConversionRequest,
        progress: &dyn ProgressSink,
    ) -> Result<PathBuf, ConversionError> {
        progress.report(EngineProgress::new(EnginePhase::Analysis, 40, "Analyzing page 2/5"));
        tokio::time::sleep(Duration::from_millis(5)).await;
        Err(ConversionError::Failed(self.detail.clone()))
    }
}

/// Signals when a conversion starts and holds it until released.
///
/// Signals are single permits, so drive one conversion at a time through it.
pub struct GatedEngine {
    started: Notify,
    release: Notify,
}

impl GatedEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            started: Notify::new(),
            release: Notify::new(),
        })
    }

    pub async fn wait_started(&self) {
        tokio::time::timeout(Duration::from_secs(10), self.started.notified())
            .await
            .expect("conversion never started");
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl ConversionEngine for GatedEngine {
    fn name(&self) -> &str {
        "gated"
    }

    async fn convert(
        &self,
        request: &ConversionRequest,
        progress: &dyn ProgressSink,
    ) -> Result<PathBuf, ConversionError> {
        progress.report(EngineProgress::new(EnginePhase::Analysis, 50, "Analyzing page 1/2"));
        self.started.notify_one();
        self.release.notified().await;
        progress.report(EngineProgress::new(EnginePhase::Generation, 50, "Generating slide 1/2"));
        tokio::fs::write(&request.output_path, request.job_id.as_str()).await?;
        Ok(request.output_path.clone())
    }
}
