//! Conversion engine adapters.
//!
//! The two conversion procedures are external programs with the same
//! contract: take the stored PDF, write a deck, report progress along the
//! way. [`ConversionEngine`] is that contract; [`EngineSet`] picks the
//! implementation for a [`ConversionMode`].

pub mod command;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::EnginesConfig;
use crate::error::ConversionError;
use crate::job::{ConversionMode, JobId};

pub use command::CommandEngine;

/// Coarse phase an engine is in when it reports progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    /// Reading and understanding the source pages.
    Analysis,
    /// Building the output deck.
    Generation,
}

impl fmt::Display for EnginePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnginePhase::Analysis => write!(f, "analysis"),
            EnginePhase::Generation => write!(f, "generation"),
        }
    }
}

impl FromStr for EnginePhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "analysis" | "analyzing" => Ok(EnginePhase::Analysis),
            "generation" | "generating" => Ok(EnginePhase::Generation),
            other => Err(format!("unknown engine phase '{}'", other)),
        }
    }
}

/// One progress signal from an engine. `percent` is relative to `phase`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineProgress {
    pub phase: EnginePhase,
    pub percent: u8,
    pub message: String,
}

impl EngineProgress {
    pub fn new(phase: EnginePhase, percent: u8, message: impl Into<String>) -> Self {
        Self {
            phase,
            percent: percent.min(100),
            message: message.into(),
        }
    }
}

/// Receives progress from an engine while a conversion runs.
///
/// Engines only ever see a borrowed sink for the duration of
/// [`ConversionEngine::convert`], so they cannot report after returning.
pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: EngineProgress);
}

/// Sink that drops every report.
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn report(&self, _progress: EngineProgress) {}
}

/// Everything an engine needs to convert one job.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub job_id: JobId,
    pub mode: ConversionMode,
    pub input_path: PathBuf,
    /// Where the orchestrator expects the artifact to be written.
    pub output_path: PathBuf,
}

/// A conversion procedure.
///
/// Implementations return the path of the produced artifact or a single
/// terminal error. They must not retry internally.
#[async_trait]
pub trait ConversionEngine: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &str;

    async fn convert(
        &self,
        request: &ConversionRequest,
        progress: &dyn ProgressSink,
    ) -> Result<PathBuf, ConversionError>;
}

/// One engine per [`ConversionMode`].
#[derive(Clone)]
pub struct EngineSet {
    precision: Arc<dyn ConversionEngine>,
    safeguard: Arc<dyn ConversionEngine>,
}

impl EngineSet {
    pub fn new(
        precision: Arc<dyn ConversionEngine>,
        safeguard: Arc<dyn ConversionEngine>,
    ) -> Self {
        Self {
            precision,
            safeguard,
        }
    }

    /// Uses the same engine for both modes.
    pub fn uniform(engine: Arc<dyn ConversionEngine>) -> Self {
        Self::new(Arc::clone(&engine), engine)
    }

    /// Builds command engines from configuration.
    pub fn from_config(config: &EnginesConfig) -> Self {
        Self::new(
            Arc::new(CommandEngine::from_config(
                ConversionMode::Precision,
                &config.precision,
            )),
            Arc::new(CommandEngine::from_config(
                ConversionMode::Safeguard,
                &config.safeguard,
            )),
        )
    }

    pub fn for_mode(&self, mode: ConversionMode) -> Arc<dyn ConversionEngine> {
        match mode {
            ConversionMode::Precision => Arc::clone(&self.precision),
            ConversionMode::Safeguard => Arc::clone(&self.safeguard),
        }
    }
}
