//! Shell configuration
//!
//! A single JSON document. Every field is optional; missing fields take
//! their defaults.

use core_types::Duration;
use serde::{Deserialize, Serialize};
use services_keybinding::{KeyBinding, DEFAULT_DEDUPE_WINDOW};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(u32),
}

/// Startup settings for the shell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Format version
    pub version: u32,
    /// Repeat-suppression window for key dispatch
    pub dedupe_window_ms: u64,
    /// `tracing_subscriber::EnvFilter` directive
    pub log_filter: String,
    /// Extensions to activate at startup, in order
    pub extensions: Vec<String>,
    /// User bindings, applied after extensions so they override defaults
    pub keymap: Vec<KeyBinding>,
    /// Panel shown once startup finishes (`""` = none)
    pub initial_panel: String,
}

impl ShellConfig {
    /// Current version of the config format
    pub const CURRENT_VERSION: u32 = 1;

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: ShellConfig = serde_json::from_str(text)?;
        if config.version != Self::CURRENT_VERSION {
            return Err(ConfigError::UnsupportedVersion(config.version));
        }
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn dedupe_window(&self) -> Duration {
        Duration::from_millis(self.dedupe_window_ms)
    }
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            dedupe_window_ms: DEFAULT_DEDUPE_WINDOW.as_millis(),
            log_filter: "info".to_string(),
            extensions: vec!["editor-status".to_string()],
            keymap: Vec::new(),
            initial_panel: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use input_types::Chord;
    use std::io::Write;

    #[test]
    fn test_empty_object_takes_defaults() {
        let config = ShellConfig::from_json("{}").unwrap();
        assert_eq!(config, ShellConfig::default());
        assert_eq!(config.dedupe_window(), Duration::from_millis(150));
    }

    #[test]
    fn test_round_trip() {
        let config = ShellConfig {
            dedupe_window_ms: 90,
            extensions: vec!["editor-status".into(), "hello-world".into()],
            keymap: vec![KeyBinding::new(Chord::parse("Ctrl+H").unwrap(), "hello_world.say_hello")],
            initial_panel: "panel::hello-world".into(),
            ..ShellConfig::default()
        };
        let parsed = ShellConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed, config);
        assert_eq!(parsed.keymap[0].keys.as_str(), "ctrl+h");
    }

    #[test]
    fn test_rejects_unknown_version() {
        let err = ShellConfig::from_json(r#"{"version": 2}"#).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedVersion(2)));
        assert_eq!(err.to_string(), "unsupported config version: 2");
    }

    #[test]
    fn test_rejects_bad_chord_in_keymap() {
        let err = ShellConfig::from_json(r#"{"keymap": [{"keys": "hyper+x", "command": "c"}]}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"initial_panel": "panel::hello-world"}}"#).unwrap();

        let config = ShellConfig::load(file.path()).unwrap();
        assert_eq!(config.initial_panel, "panel::hello-world");

        let missing = file.path().with_extension("missing");
        assert!(matches!(ShellConfig::load(&missing), Err(ConfigError::Io { .. })));
    }
}
