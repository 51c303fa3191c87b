//! Keymap documents
//!
//! A keymap is either a bare JSON array of bindings or a versioned object:
//!
//! ```json
//! { "version": 1, "bindings": [ { "keys": "ctrl+f", "command": "show_search" } ] }
//! ```
//!
//! Entries that fail to parse are skipped with a warning so one typo in a
//! user keymap does not discard the rest of it.

use input_types::Chord;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

/// One chord→command entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyBinding {
    pub keys: Chord,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
}

impl KeyBinding {
    pub fn new(keys: Chord, command: impl Into<String>) -> Self {
        Self {
            keys,
            command: command.into(),
            args: None,
        }
    }

    pub fn with_args(mut self, args: Value) -> Self {
        self.args = Some(args);
        self
    }
}

/// Errors that reject a whole keymap document
#[derive(Debug, Error)]
pub enum KeymapError {
    #[error("keymap is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unsupported keymap version: {0}")]
    UnsupportedVersion(u64),

    #[error("keymap must be an array of bindings or an object with a 'bindings' array")]
    UnexpectedShape,
}

/// Versioned on-disk form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeymapDocument {
    pub version: u64,
    pub bindings: Vec<KeyBinding>,
}

impl KeymapDocument {
    /// Current version of the keymap format
    pub const CURRENT_VERSION: u64 = 1;

    pub fn new(bindings: Vec<KeyBinding>) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            bindings,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Result of parsing a keymap
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedKeymap {
    pub bindings: Vec<KeyBinding>,
    /// Entries dropped because they were malformed
    pub skipped: usize,
}

/// Parses a keymap document, keeping every well-formed entry
pub fn parse_keymap(text: &str) -> Result<ParsedKeymap, KeymapError> {
    let root: Value = serde_json::from_str(text)?;
    let entries = match root {
        Value::Array(entries) => entries,
        Value::Object(mut obj) => {
            let version = obj
                .get("version")
                .and_then(Value::as_u64)
                .unwrap_or(KeymapDocument::CURRENT_VERSION);
            if version != KeymapDocument::CURRENT_VERSION {
                return Err(KeymapError::UnsupportedVersion(version));
            }
            match obj.remove("bindings") {
                Some(Value::Array(entries)) => entries,
                _ => return Err(KeymapError::UnexpectedShape),
            }
        }
        _ => return Err(KeymapError::UnexpectedShape),
    };

    let mut parsed = ParsedKeymap {
        bindings: Vec::with_capacity(entries.len()),
        skipped: 0,
    };
    for (index, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<KeyBinding>(entry) {
            Ok(binding) => parsed.bindings.push(binding),
            Err(err) => {
                warn!(index, error = %err, "skipping malformed keymap entry");
                parsed.skipped += 1;
            }
        }
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bare_array() {
        let parsed = parse_keymap(
            r#"[
                {"keys": "Ctrl+F", "command": "show_search"},
                {"keys": "ctrl+p", "command": "show_panel", "args": "panel::files"}
            ]"#,
        )
        .unwrap();

        assert_eq!(parsed.skipped, 0);
        assert_eq!(parsed.bindings.len(), 2);
        assert_eq!(parsed.bindings[0].keys.as_str(), "ctrl+f");
        assert_eq!(parsed.bindings[1].args, Some(json!("panel::files")));
    }

    #[test]
    fn test_versioned_document_round_trip() {
        let doc = KeymapDocument::new(vec![
            KeyBinding::new(Chord::parse("ctrl+m").unwrap(), "fuzzy.show_command_finder"),
        ]);
        let parsed = parse_keymap(&doc.to_json().unwrap()).unwrap();
        assert_eq!(parsed.bindings, doc.bindings);
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let parsed = parse_keymap(
            r#"{"version": 1, "bindings": [
                {"keys": "hyper+x", "command": "a"},
                {"command": "no_keys"},
                {"keys": "ctrl+s", "command": "save"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(parsed.skipped, 2);
        assert_eq!(parsed.bindings.len(), 1);
        assert_eq!(parsed.bindings[0].command, "save");
    }

    #[test]
    fn test_document_errors() {
        assert!(matches!(parse_keymap("{"), Err(KeymapError::Parse(_))));
        assert!(matches!(
            parse_keymap(r#"{"version": 9, "bindings": []}"#),
            Err(KeymapError::UnsupportedVersion(9))
        ));
        assert!(matches!(parse_keymap("42"), Err(KeymapError::UnexpectedShape)));
        assert!(matches!(
            parse_keymap(r#"{"version": 1}"#),
            Err(KeymapError::UnexpectedShape)
        ));
    }
}
