use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "worker_count must be at least 1".to_string(),
        });
    }

    if config.queue_capacity == 0 {
        return Err(ConfigError::Validation {
            message: "queue_capacity must be at least 1".to_string(),
        });
    }

    if config.upload_directory == config.output_directory {
        return Err(ConfigError::Validation {
            message: "upload_directory and output_directory must differ".to_string(),
        });
    }

    for (mode, engine) in [
        ("precision", &config.engines.precision),
        ("safeguard", &config.engines.safeguard),
    ] {
        if engine.program.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: format!("engines.{}.program must not be empty", mode),
            });
        }
        if engine.timeout_secs == Some(0) {
            return Err(ConfigError::Validation {
                message: format!("engines.{}.timeout_secs must be positive", mode),
            });
        }
    }

    if config.job_ttl_secs == 0 || config.reaper_interval_secs == 0 {
        return Err(ConfigError::Validation {
            message: "job_ttl_secs and reaper_interval_secs must be positive".to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = load_config_from_str(r#"{"version": "1.0"}"#).unwrap();
        assert_eq!(config.upload_directory, "uploads");
        assert_eq!(config.output_directory, "output");
        assert!(config.worker_count >= 1);
        assert_eq!(config.queue_capacity, 64);
        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!(config.engines.precision.program, "pdfdeck-convert-precision");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_full_config() {
        let config = load_config_from_str(
            r#"{
                "version": "1.0",
                "upload_directory": "/var/lib/pdfdeck/uploads",
                "output_directory": "/var/lib/pdfdeck/output",
                "worker_count": 2,
                "queue_capacity": 8,
                "max_upload_bytes": 1048576,
                "job_ttl_secs": 600,
                "reaper_interval_secs": 60,
                "poll_interval_ms": 500,
                "engines": {
                    "precision": { "program": "python3", "args": ["convert_v43.py"] },
                    "safeguard": { "program": "python3", "args": ["convert_v4_v43.py"], "timeout_secs": 900 }
                },
                "logging": { "level": "pdfdeck=debug", "json": true }
            }"#,
        )
        .unwrap();

        assert_eq!(config.worker_count, 2);
        assert_eq!(config.engines.safeguard.timeout_secs, Some(900));
        assert_eq!(config.engines.precision.args, vec!["convert_v43.py"]);
        assert!(config.logging.json);
    }

    #[test]
    fn test_unknown_field_rejected_by_schema() {
        let err = load_config_from_str(r#"{"version": "1.0", "workers": 4}"#).unwrap_err();
        assert!(matches!(err, ConfigError::SchemaValidation { .. }));
    }

    #[test]
    fn test_zero_workers_rejected_by_schema() {
        let err = load_config_from_str(r#"{"version": "1.0", "worker_count": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::SchemaValidation { .. }));
    }

    #[test]
    fn test_engine_without_program_rejected() {
        let err = load_config_from_str(
            r#"{"version": "1.0", "engines": {"precision": {"args": []}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::SchemaValidation { .. }));
    }

    #[test]
    fn test_unsupported_version() {
        let err = load_config_from_str(r#"{"version": "2.0"}"#).unwrap_err();
        match err {
            ConfigError::Validation { message } => assert!(message.contains("2.0")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_same_directories_rejected() {
        let err = load_config_from_str(
            r#"{"version": "1.0", "upload_directory": "data", "output_directory": "data"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn test_invalid_json() {
        let err = load_config_from_str("{ version: 1.0 ").unwrap_err();
        assert!(matches!(err, ConfigError::ParseJson(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_config("/definitely/not/here/pdfdeck.json").unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_default_config_is_valid() {
        validate_config(&Config::default()).unwrap();
    }
}
