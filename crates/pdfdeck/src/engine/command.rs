//! Engine adapter that runs an external converter program.
//!
//! The converter is invoked as
//! `<program> <args..> --pdf <input> --output <output> --mode <mode>` and
//! reports progress on stdout, one event per line:
//!
//! ```text
//! PROGRESS analysis 40 Analyzing page 2/5
//! PROGRESS generation 10 Building slide 1
//! ```
//!
//! Any other stdout line is logged and ignored. A non-zero exit status is a
//! conversion failure carrying the (truncated) stderr output.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use super::{ConversionEngine, ConversionRequest, EnginePhase, EngineProgress, ProgressSink};
use crate::config::EngineCommandConfig;
use crate::error::ConversionError;
use crate::job::ConversionMode;

/// Longest stderr excerpt carried into a failure detail.
const STDERR_EXCERPT_CHARS: usize = 500;

pub struct CommandEngine {
    name: String,
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl CommandEngine {
    pub fn new(name: &str, program: &str, args: Vec<String>, timeout: Option<Duration>) -> Self {
        Self {
            name: name.to_string(),
            program: program.to_string(),
            args,
            timeout,
        }
    }

    pub fn from_config(mode: ConversionMode, config: &EngineCommandConfig) -> Self {
        Self::new(
            mode.as_str(),
            &config.program,
            config.args.clone(),
            config.timeout_secs.map(Duration::from_secs),
        )
    }

    fn command(&self, request: &ConversionRequest) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg("--pdf")
            .arg(&request.input_path)
            .arg("--output")
            .arg(&request.output_path)
            .arg("--mode")
            .arg(request.mode.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl ConversionEngine for CommandEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn convert(
        &self,
        request: &ConversionRequest,
        progress: &dyn ProgressSink,
    ) -> Result<PathBuf, ConversionError> {
        debug!(engine = %self.name, program = %self.program, "Launching converter");

        let mut child = self
            .command(request)
            .spawn()
            .map_err(|source| ConversionError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Drain stderr alongside stdout so a chatty converter can't block on a full pipe.
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut stderr) = stderr {
                if let Err(e) = stderr.read_to_end(&mut buf).await {
                    debug!("Failed to read converter stderr: {}", e);
                }
            }
            String::from_utf8_lossy(&buf).into_owned()
        });

        let run = async {
            if let Some(stdout) = stdout {
                let mut segments = BufReader::new(stdout).split(b'\n');
                while let Some(segment) = segments.next_segment().await? {
                    let line = String::from_utf8_lossy(&segment);
                    let line = line.trim_end_matches('\r');
                    match parse_progress_line(line) {
                        Some(event) => progress.report(event),
                        None => debug!(engine = %self.name, "converter: {}", line),
                    }
                }
            }
            child.wait().await
        };

        let status = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(result) => result?,
                Err(_) => {
                    warn!(engine = %self.name, "Converter exceeded {}s, killing it", limit.as_secs());
                    return Err(ConversionError::Timeout(limit));
                }
            },
            None => run.await?,
        };

        if !status.success() {
            let stderr = stderr_task.await.unwrap_or_default();
            let code = status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            return Err(ConversionError::Failed(format!(
                "converter exited with code {}: {}",
                code,
                excerpt(stderr.trim(), STDERR_EXCERPT_CHARS)
            )));
        }

        Ok(request.output_path.clone())
    }
}

/// Parses `PROGRESS <phase> <percent> [message]`.
pub fn parse_progress_line(line: &str) -> Option<EngineProgress> {
    let mut parts = line.trim().splitn(4, char::is_whitespace);
    if parts.next()? != "PROGRESS" {
        return None;
    }
    let phase: EnginePhase = parts.next()?.parse().ok()?;
    let percent: u16 = parts.next()?.parse().ok()?;
    let message = parts.next().map(str::trim).unwrap_or_default();
    let message = if message.is_empty() {
        match phase {
            EnginePhase::Analysis => "Analyzing page content...",
            EnginePhase::Generation => "Generating PowerPoint...",
        }
    } else {
        message
    };
    Some(EngineProgress::new(
        phase,
        percent.min(100) as u8,
        message,
    ))
}

fn excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::NoopSink;
    use crate::job::JobId;
    use std::sync::Mutex;

    #[test]
    fn test_parse_progress_line() {
        let event = parse_progress_line("PROGRESS analysis 40 Analyzing page 2/5").unwrap();
        assert_eq!(event.phase, EnginePhase::Analysis);
        assert_eq!(event.percent, 40);
        assert_eq!(event.message, "Analyzing page 2/5");
    }

    #[test]
    fn test_parse_progress_line_defaults_message() {
        let event = parse_progress_line("PROGRESS generation 5").unwrap();
        assert_eq!(event.phase, EnginePhase::Generation);
        assert_eq!(event.message, "Generating PowerPoint...");
    }

    #[test]
    fn test_parse_progress_line_clamps_percent() {
        let event = parse_progress_line("PROGRESS generation 250 almost").unwrap();
        assert_eq!(event.percent, 100);
    }

    #[test]
    fn test_parse_ignores_other_output() {
        assert!(parse_progress_line("Loaded 12 fonts").is_none());
        assert!(parse_progress_line("PROGRESS").is_none());
        assert!(parse_progress_line("PROGRESS render 10 x").is_none());
        assert!(parse_progress_line("PROGRESS analysis many").is_none());
        assert!(parse_progress_line("progress analysis 10").is_none());
    }

    #[test]
    fn test_excerpt() {
        assert_eq!(excerpt("short", 10), "short");
        assert_eq!(excerpt("abcdef", 3), "abc...");
        assert_eq!(excerpt("日本語テキスト", 3), "日本語...");
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<EngineProgress>>);

    impl ProgressSink for Recorder {
        fn report(&self, progress: EngineProgress) {
            self.0.lock().unwrap().push(progress);
        }
    }

    #[cfg(unix)]
    fn shell_engine(script: &str, timeout: Option<Duration>) -> CommandEngine {
        // Positional args after the script: $1=--pdf $2=input $3=--output $4=output
        CommandEngine::new(
            "test",
            "sh",
            vec!["-c".to_string(), script.to_string(), "sh".to_string()],
            timeout,
        )
    }

    #[cfg(unix)]
    fn request(dir: &tempfile::TempDir) -> ConversionRequest {
        let input_path = dir.path().join("input.pdf");
        std::fs::write(&input_path, b"%PDF-1.4").unwrap();
        ConversionRequest {
            job_id: JobId::new(),
            mode: ConversionMode::Precision,
            input_path,
            output_path: dir.path().join("deck.pptx"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_engine_success_reports_progress() {
        let dir = tempfile::TempDir::new().unwrap();
        let engine = shell_engine(
            "echo 'PROGRESS analysis 50 Reading'; echo 'noise'; \
             echo 'PROGRESS generation 100 Writing'; printf deck > \"$4\"",
            None,
        );
        let req = request(&dir);
        let sink = Recorder::default();

        let out = engine.convert(&req, &sink).await.unwrap();

        assert_eq!(out, req.output_path);
        assert_eq!(std::fs::read(&out).unwrap(), b"deck");
        let events = sink.0.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].phase, EnginePhase::Analysis);
        assert_eq!(events[1].phase, EnginePhase::Generation);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_engine_tolerates_binary_output() {
        let dir = tempfile::TempDir::new().unwrap();
        let engine = shell_engine(
            "printf 'font \\377\\376 loaded\\n'; \
             printf 'PROGRESS analysis 50 Page \\377\\n'; printf deck > \"$4\"; exit 0",
            None,
        );
        let req = request(&dir);
        let sink = Recorder::default();

        let out = engine.convert(&req, &sink).await.unwrap();

        assert_eq!(std::fs::read(&out).unwrap(), b"deck");
        let events = sink.0.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].percent, 50);
        assert_eq!(events[0].message, "Page \u{FFFD}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_engine_failure_keeps_binary_stderr() {
        let dir = tempfile::TempDir::new().unwrap();
        let engine = shell_engine("printf 'bad \\377 glyph' >&2; exit 4", None);

        let err = engine
            .convert(&request(&dir), &NoopSink)
            .await
            .unwrap_err();

        match err {
            ConversionError::Failed(detail) => {
                assert!(detail.starts_with("converter exited with code 4: bad "), "{detail}");
                assert!(detail.ends_with("glyph"), "{detail}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_engine_failure_carries_stderr() {
        let dir = tempfile::TempDir::new().unwrap();
        let engine = shell_engine("echo 'bad page 3' >&2; exit 3", None);

        let err = engine
            .convert(&request(&dir), &NoopSink)
            .await
            .unwrap_err();

        match err {
            ConversionError::Failed(detail) => {
                assert!(detail.contains("code 3"), "{detail}");
                assert!(detail.contains("bad page 3"), "{detail}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_engine_timeout() {
        let dir = tempfile::TempDir::new().unwrap();
        let engine = shell_engine("sleep 5", Some(Duration::from_millis(100)));

        let err = engine
            .convert(&request(&dir), &NoopSink)
            .await
            .unwrap_err();

        assert!(matches!(err, ConversionError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_command_engine_missing_program() {
        let dir = tempfile::TempDir::new().unwrap();
        let engine = CommandEngine::new("test", "pdfdeck-no-such-converter", vec![], None);
        let req = ConversionRequest {
            job_id: JobId::new(),
            mode: ConversionMode::Safeguard,
            input_path: dir.path().join("input.pdf"),
            output_path: dir.path().join("out.pptx"),
        };

        let err = engine.convert(&req, &NoopSink).await.unwrap_err();
        assert!(matches!(err, ConversionError::Spawn { .. }));
    }
}
