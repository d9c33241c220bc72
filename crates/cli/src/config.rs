//! `caseflow.toml`: console settings plus the engine's own table.
//!
//! ```toml
//! store = "caseflow.json"
//! log_level = "info"
//!
//! [engine]
//! step_isolation = "copy_on_add"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use caseflow_engine::config::read_config;
use caseflow_engine::{ConfigError, EngineConfig};

pub(crate) const DEFAULT_CONFIG_FILE: &str = "caseflow.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct CliConfig {
    /// JSON file holding the store.
    pub store: PathBuf,
    /// Default tracing filter when `CASEFLOW_LOG` is unset.
    pub log_level: Option<String>,
    pub engine: EngineConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        CliConfig {
            store: PathBuf::from("caseflow.json"),
            log_level: None,
            engine: EngineConfig::default(),
        }
    }
}

/// Load the config named on the command line, or `caseflow.toml` in the
/// working directory when there is one. An explicit path must exist.
pub(crate) fn load(explicit: Option<&Path>) -> Result<CliConfig, ConfigError> {
    match explicit {
        Some(path) => read_config(path),
        None => {
            let path = Path::new(DEFAULT_CONFIG_FILE);
            if path.exists() {
                read_config(path)
            } else {
                Ok(CliConfig::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caseflow_engine::StepIsolation;

    #[test]
    fn full_config_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("caseflow.toml");
        std::fs::write(
            &path,
            "store = \"qa.json\"\nlog_level = \"debug\"\n\n[engine]\nstep_isolation = \"shared\"\n",
        )
        .unwrap();

        let config = load(Some(&path)).unwrap();
        assert_eq!(config.store, PathBuf::from("qa.json"));
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.engine.step_isolation, StepIsolation::Shared);
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("caseflow.toml");
        std::fs::write(&path, "log_level = \"warn\"\n").unwrap();

        let config = load(Some(&path)).unwrap();
        assert_eq!(config.store, PathBuf::from("caseflow.json"));
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[test]
    fn typo_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("caseflow.toml");
        std::fs::write(&path, "stor = \"x.json\"\n").unwrap();
        assert!(matches!(load(Some(&path)), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        assert!(matches!(load(Some(&path)), Err(ConfigError::Io { .. })));
    }
}
