//! Configuration file loading and parsing.

use crate::env::{vars, Environment};
use crate::types::DatabaseConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file name, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "strata.yaml";

/// Config loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("failed to read config: {source}")]
    ReadError {
        #[from]
        source: std::io::Error,
    },

    #[error("invalid YAML at line {}: {message}", line.map(|l| l.to_string()).unwrap_or_else(|| "unknown".to_string()))]
    ParseError { line: Option<usize>, message: String },

    #[error("validation error: {message}")]
    ValidationError { message: String },

    #[error("environment variable not found: {var}")]
    EnvVarNotFound { var: String },
}

/// Configuration loader.
pub struct ConfigLoader {
    path: PathBuf,
}

impl ConfigLoader {
    /// Create a loader for the given config file.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Resolve the config path from `STRATA_CONFIG_PATH`, falling back to `strata.yaml`.
    pub fn from_env() -> Self {
        Self::new(Environment::get_or(vars::STRATA_CONFIG_PATH, DEFAULT_CONFIG_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load, expand, apply environment overrides and validate.
    pub fn load(&self) -> Result<DatabaseConfig, ConfigError> {
        if !self.path.exists() {
            return Err(ConfigError::NotFound {
                path: self.path.clone(),
            });
        }

        let contents = std::fs::read_to_string(&self.path)?;
        let mut config = Self::parse(&contents)?;
        crate::env::apply_env_overrides(&mut config)
            .map_err(|e| ConfigError::ValidationError {
                message: e.to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Parse YAML text after `${VAR}` expansion, without validating.
    pub fn parse(contents: &str) -> Result<DatabaseConfig, ConfigError> {
        let expanded = expand_env_vars(contents)?;

        serde_yaml::from_str(&expanded).map_err(|e| ConfigError::ParseError {
            line: e.location().map(|l| l.line()),
            message: e.to_string(),
        })
    }

    /// Save configuration to the loader's path.
    pub fn save(&self, config: &DatabaseConfig) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let yaml = serde_yaml::to_string(config).map_err(|e| ConfigError::ParseError {
            line: None,
            message: e.to_string(),
        })?;

        std::fs::write(&self.path, yaml)?;
        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Expand environment variables in the form `${VAR}` or `${VAR:-default}`.
fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
    let re = regex::Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}").map_err(|e| {
        ConfigError::ParseError {
            line: None,
            message: e.to_string(),
        }
    })?;

    let mut result = content.to_string();
    for cap in re.captures_iter(content) {
        let full_match = &cap[0];
        let var_name = &cap[1];
        let default = cap.get(2).map(|m| m.as_str());

        let value = match std::env::var(var_name) {
            Ok(v) => v,
            Err(_) => match default {
                Some(d) => d.to_string(),
                None => {
                    return Err(ConfigError::EnvVarNotFound {
                        var: var_name.to_string(),
                    })
                }
            },
        };

        result = result.replace(full_match, &value);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let loader = ConfigLoader::new(dir.path().join("strata.yaml"));
        match loader.load() {
            Err(ConfigError::NotFound { path }) => assert!(path.ends_with("strata.yaml")),
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_load_config_from_yaml_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("strata.yaml");

        let config_content = r#"
primary: "sqlite://primary.db"
type: sqlite
replicas:
  - dsn: "sqlite://replica.db"
    weight: 2
    pool:
      max_open_conns: 4
pool:
  max_open_conns: 20
  max_idle_conns: 10
  conn_max_lifetime_ms: 3600000
monitor:
  enabled: true
  health_check_interval_ms: 30000
  connection_timeout_ms: 5000
"#;
        fs::write(&path, config_content).unwrap();

        let config = ConfigLoader::new(&path).load().unwrap();
        assert_eq!(config.primary, "sqlite://primary.db");
        assert_eq!(config.engine, "sqlite");
        assert_eq!(config.replicas.len(), 1);
        assert_eq!(config.replicas[0].weight, 2);
        assert_eq!(config.replicas[0].pool.max_open_conns, 4);
        assert_eq!(config.pool.max_idle_conns, 10);
        assert_eq!(config.pool.conn_max_lifetime, Duration::from_secs(3600));
        assert!(config.monitor.enabled);

        // Unspecified sections use defaults.
        assert!(!config.slow_query.enabled);
        assert_eq!(config.slow_query.threshold, Duration::from_millis(200));
        assert_eq!(config.monitor.max_retries, 3);
    }

    #[test]
    fn test_legacy_section_names() {
        let config = ConfigLoader::parse(
            r#"
master: ":memory:"
type: sqlite
slaves:
  - dsn: ":memory:"
pool_config:
  max_open_conns: 3
"#,
        )
        .unwrap();

        assert_eq!(config.primary, ":memory:");
        assert_eq!(config.replicas.len(), 1);
        assert_eq!(config.replicas[0].weight, 1);
        assert_eq!(config.pool.max_open_conns, 3);
    }

    #[test]
    fn test_negative_count_is_parse_error() {
        let result = ConfigLoader::parse(
            r#"
primary: ":memory:"
type: sqlite
pool:
  max_open_conns: -1
"#,
        );
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_invalid_file_fails_validation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("strata.yaml");
        fs::write(&path, "primary: \"\"\ntype: sqlite\n").unwrap();

        match ConfigLoader::new(&path).load() {
            Err(ConfigError::ValidationError { message }) => {
                assert!(message.contains("master database DSN"));
            }
            other => panic!("Expected ValidationError, got {:?}", other),
        }
    }

    #[test]
    fn test_env_var_expansion() {
        std::env::set_var("STRATA_TEST_LOADER_VAR", "test_value");
        let result = expand_env_vars("key: ${STRATA_TEST_LOADER_VAR}").unwrap();
        assert_eq!(result, "key: test_value");
        std::env::remove_var("STRATA_TEST_LOADER_VAR");
    }

    #[test]
    fn test_env_var_default() {
        let result = expand_env_vars("key: ${STRATA_NONEXISTENT:-default}").unwrap();
        assert_eq!(result, "key: default");
    }

    #[test]
    fn test_env_var_missing_error() {
        let result = expand_env_vars("key: ${STRATA_MISSING_VAR}");
        match result.unwrap_err() {
            ConfigError::EnvVarNotFound { var } => assert_eq!(var, "STRATA_MISSING_VAR"),
            _ => panic!("Expected EnvVarNotFound error"),
        }
    }

    #[test]
    fn test_parse_error_with_line_number() {
        let result = ConfigLoader::parse("primary: x\ntype: [unclosed\n");
        match result.unwrap_err() {
            ConfigError::ParseError { line, .. } => assert!(line.is_some()),
            _ => panic!("Expected ParseError"),
        }
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/strata.yaml");
        let loader = ConfigLoader::new(&path);

        let config = DatabaseConfig::new("sqlite::memory:", "sqlite");
        loader.save(&config).unwrap();

        let reloaded = loader.load().unwrap();
        assert_eq!(reloaded.primary, "sqlite::memory:");
        assert_eq!(reloaded.engine, "sqlite");
    }
}
