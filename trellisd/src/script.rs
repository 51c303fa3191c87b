//! # Key Scripts
//!
//! A line-based script that drives the shell the way a host would, for
//! deterministic runs and demos.
//!
//! ## Format
//!
//! - Chords: `ctrl+f`, `Ctrl+Alt+H`, `esc`
//! - Delays: `wait 100ms`, `wait 2s` (moves the shell clock)
//! - Panels: `show panel::hello-world`, `show` alone hides every panel
//! - Commands: `run show_panel "panel::search"` (the rest of the line is a JSON argument)
//! - Comments: `# ...`, on their own line or after a step
//!
//! ## Example
//!
//! ```text
//! # greet twice, the second press is a duplicate
//! ctrl+alt+h
//! ctrl+alt+h
//! wait 200ms
//! show panel::hello-world
//! esc                      # hides it again
//! ```

use core_types::Duration;
use input_types::{Chord, ChordError};
use serde_json::Value;
use std::collections::VecDeque;
use thiserror::Error;

/// Script parse errors
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("line {line}: {source}")]
    InvalidChord {
        line: usize,
        #[source]
        source: ChordError,
    },

    #[error("line {line}: invalid delay '{value}'")]
    InvalidDelay { line: usize, value: String },

    #[error("line {line}: invalid command argument: {message}")]
    InvalidArgs { line: usize, message: String },

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("script has no steps")]
    Empty,
}

/// One scripted action
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    /// A chord delivered as if the host reported a key press
    Key(Chord),
    /// Advance time
    Wait(Duration),
    /// Show a panel (`""` hides)
    Show(String),
    /// Execute a command directly
    Run { command: String, args: Value },
}

/// A parsed script
#[derive(Debug, Clone, Default)]
pub struct KeyScript {
    steps: VecDeque<ScriptStep>,
}

impl KeyScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a whole script
    pub fn from_text(text: &str) -> Result<Self, ScriptError> {
        let mut steps = VecDeque::new();
        for (index, raw) in text.lines().enumerate() {
            let line = strip_comment(raw).trim();
            if line.is_empty() {
                continue;
            }
            steps.push_back(parse_line(line, index + 1)?);
        }
        if steps.is_empty() {
            return Err(ScriptError::Empty);
        }
        Ok(Self { steps })
    }

    pub fn push(&mut self, step: ScriptStep) {
        self.steps.push_back(step);
    }

    pub fn next_step(&mut self) -> Option<ScriptStep> {
        self.steps.pop_front()
    }

    pub fn steps(&self) -> impl Iterator<Item = &ScriptStep> {
        self.steps.iter()
    }

    pub fn remaining(&self) -> usize {
        self.steps.len()
    }

    pub fn has_more(&self) -> bool {
        !self.steps.is_empty()
    }
}

/// Drops a trailing `# comment`; a `#` directly after `+` is a key
fn strip_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'#' && (i == 0 || bytes[i - 1].is_ascii_whitespace()) {
            return &line[..i];
        }
    }
    line
}

fn parse_line(line: &str, line_no: usize) -> Result<ScriptStep, ScriptError> {
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    match word {
        "wait" => parse_delay(rest)
            .map(ScriptStep::Wait)
            .ok_or_else(|| ScriptError::InvalidDelay {
                line: line_no,
                value: rest.to_string(),
            }),
        "show" => Ok(ScriptStep::Show(rest.to_string())),
        "run" => parse_run(rest, line_no),
        _ if !rest.is_empty() => Err(ScriptError::Parse {
            line: line_no,
            message: format!("unexpected text after chord: '{}'", rest),
        }),
        _ => Chord::parse(word)
            .map(ScriptStep::Key)
            .map_err(|source| ScriptError::InvalidChord { line: line_no, source }),
    }
}

fn parse_run(rest: &str, line_no: usize) -> Result<ScriptStep, ScriptError> {
    let (command, args) = match rest.split_once(char::is_whitespace) {
        Some((command, args)) => (command, args.trim()),
        None => (rest, ""),
    };
    if command.is_empty() {
        return Err(ScriptError::Parse {
            line: line_no,
            message: "run needs a command name".to_string(),
        });
    }
    let args = if args.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(args).map_err(|err| ScriptError::InvalidArgs {
            line: line_no,
            message: err.to_string(),
        })?
    };
    Ok(ScriptStep::Run {
        command: command.to_string(),
        args,
    })
}

/// `100ms`, `2s`
fn parse_delay(value: &str) -> Option<Duration> {
    let value = value.trim().to_ascii_lowercase();
    if let Some(ms) = value.strip_suffix("ms") {
        ms.trim().parse().ok().map(Duration::from_millis)
    } else if let Some(secs) = value.strip_suffix('s') {
        secs.trim().parse().ok().map(Duration::from_secs)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chord(s: &str) -> ScriptStep {
        ScriptStep::Key(Chord::parse(s).unwrap())
    }

    #[test]
    fn test_parse_steps() {
        let mut script = KeyScript::from_text(
            r#"
            # greet
            Ctrl+Alt+H
            wait 200ms
            wait 2s
            show panel::hello-world
            show
            run show_panel "panel::search"
            run hello_world.say_hello
            esc   # hide
        "#,
        )
        .unwrap();

        assert_eq!(script.remaining(), 8);
        assert_eq!(script.next_step(), Some(chord("ctrl+alt+h")));
        assert_eq!(script.next_step(), Some(ScriptStep::Wait(Duration::from_millis(200))));
        assert_eq!(script.next_step(), Some(ScriptStep::Wait(Duration::from_millis(2000))));
        assert_eq!(script.next_step(), Some(ScriptStep::Show("panel::hello-world".into())));
        assert_eq!(script.next_step(), Some(ScriptStep::Show(String::new())));
        assert_eq!(
            script.next_step(),
            Some(ScriptStep::Run {
                command: "show_panel".into(),
                args: json!("panel::search")
            })
        );
        assert_eq!(
            script.next_step(),
            Some(ScriptStep::Run {
                command: "hello_world.say_hello".into(),
                args: Value::Null
            })
        );
        assert_eq!(script.next_step(), Some(chord("esc")));
        assert!(!script.has_more());
    }

    #[test]
    fn test_hash_key_is_not_a_comment() {
        let script = KeyScript::from_text("ctrl+#").unwrap();
        assert_eq!(script.steps().next(), Some(&chord("ctrl+#")));
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        let err = KeyScript::from_text("esc\nhyper+x").unwrap_err();
        assert!(matches!(err, ScriptError::InvalidChord { line: 2, .. }));

        let err = KeyScript::from_text("wait soon").unwrap_err();
        assert_eq!(err.to_string(), "line 1: invalid delay 'soon'");

        let err = KeyScript::from_text("run c {not json").unwrap_err();
        assert!(matches!(err, ScriptError::InvalidArgs { line: 1, .. }));

        let err = KeyScript::from_text("ctrl+f extra").unwrap_err();
        assert!(matches!(err, ScriptError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_empty_script() {
        assert!(matches!(KeyScript::from_text(""), Err(ScriptError::Empty)));
        assert!(matches!(
            KeyScript::from_text("# only\n# comments"),
            Err(ScriptError::Empty)
        ));
    }
}
