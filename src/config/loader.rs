// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::EngineConfig;
use crate::errors::{EngineError, Result};

/// Load engine configuration from a TOML file.
///
/// Missing keys fall back to their `Default` values, so an empty file is a
/// valid configuration.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<EngineConfig> {
    let contents = fs::read_to_string(path.as_ref())?;
    let config: EngineConfig = toml::from_str(&contents)?;
    validate(&config)?;
    Ok(config)
}

/// Sanity checks that cannot be expressed through deserialization alone.
pub fn validate(config: &EngineConfig) -> Result<()> {
    if config.pool_capacity == 0 {
        return Err(EngineError::Config(
            "pool_capacity must be >= 1 (got 0)".to_string(),
        ));
    }
    if config.task_timeout_secs == 0 {
        return Err(EngineError::Config(
            "task_timeout_secs must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

/// Default config path, resolved against the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Pipedag.toml")
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::config::FailurePolicy;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn default_path_is_relative() {
        assert_eq!(default_config_path(), PathBuf::from("Pipedag.toml"));
    }

    #[test]
    fn empty_file_gives_defaults() {
        let file = write_config("");
        let config = load_from_path(file.path()).unwrap();

        assert_eq!(config.pool_capacity, 4);
        assert_eq!(config.retry_limit, 0);
        assert_eq!(config.failure_policy, FailurePolicy::BestEffort);
        assert_eq!(config.task_timeout_secs, 3600);
    }

    #[test]
    fn explicit_values_are_honoured() {
        let file = write_config(
            r#"
pool_capacity = 2
retry_limit = 3
failure_policy = "fail-fast"
task_timeout_secs = 30
"#,
        );
        let config = load_from_path(file.path()).unwrap();

        assert_eq!(config.pool_capacity, 2);
        assert_eq!(config.retry_limit, 3);
        assert_eq!(config.failure_policy, FailurePolicy::FailFast);
        assert_eq!(config.task_timeout_secs, 30);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let file = write_config("pool_capacity = 0");
        let err = load_from_path(file.path()).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn unknown_policy_is_a_toml_error() {
        let file = write_config(r#"failure_policy = "retry-forever""#);
        let err = load_from_path(file.path()).unwrap_err();
        assert!(matches!(err, EngineError::Toml(_)));
    }
}
