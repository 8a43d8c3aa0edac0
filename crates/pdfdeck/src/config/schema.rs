use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default = "default_upload_directory")]
    pub upload_directory: String,
    #[serde(default = "default_output_directory")]
    pub output_directory: String,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    #[serde(default = "default_job_ttl_secs")]
    pub job_ttl_secs: u64,
    #[serde(default = "default_reaper_interval_secs")]
    pub reaper_interval_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub engines: EnginesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_upload_directory() -> String {
    "uploads".to_string()
}

fn default_output_directory() -> String {
    "output".to_string()
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

fn default_queue_capacity() -> usize {
    64
}

fn default_max_upload_bytes() -> u64 {
    50 * 1024 * 1024
}

fn default_job_ttl_secs() -> u64 {
    3600
}

fn default_reaper_interval_secs() -> u64 {
    300
}

fn default_poll_interval_ms() -> u64 {
    1000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            upload_directory: default_upload_directory(),
            output_directory: default_output_directory(),
            worker_count: default_worker_count(),
            queue_capacity: default_queue_capacity(),
            max_upload_bytes: default_max_upload_bytes(),
            job_ttl_secs: default_job_ttl_secs(),
            reaper_interval_secs: default_reaper_interval_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            engines: EnginesConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// External converter per conversion mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnginesConfig {
    #[serde(default = "default_precision_engine")]
    pub precision: EngineCommandConfig,
    #[serde(default = "default_safeguard_engine")]
    pub safeguard: EngineCommandConfig,
}

fn default_precision_engine() -> EngineCommandConfig {
    EngineCommandConfig::program("pdfdeck-convert-precision")
}

fn default_safeguard_engine() -> EngineCommandConfig {
    EngineCommandConfig::program("pdfdeck-convert-safeguard")
}

impl Default for EnginesConfig {
    fn default() -> Self {
        Self {
            precision: default_precision_engine(),
            safeguard: default_safeguard_engine(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineCommandConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Kill the converter after this many seconds. No limit when unset.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl EngineCommandConfig {
    pub fn program(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: vec![],
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
