//! # Command Registry
//!
//! Name→action map shared by the shell, the keybinding dispatcher and every
//! extension.
//!
//! ## Philosophy
//!
//! - **Last registration wins**: Registering an existing name replaces it in place, silently
//! - **Unknown is not an error**: Executing a name nobody registered yet is a no-op, because
//!   extensions load in stages and bindings may point at commands that arrive later
//! - **Discoverable**: Every command carries a [`CommandDescriptor`] that finders can query
//!
//! ## Example
//!
//! ```
//! use services_command_registry::{CommandOutcome, CommandRegistry};
//! use serde_json::Value;
//!
//! let registry = CommandRegistry::new();
//! registry.register_command("editor.save", |_args| Ok(()), None).unwrap();
//!
//! assert_eq!(registry.execute_command("editor.save", &Value::Null), Ok(CommandOutcome::Executed));
//! assert_eq!(registry.execute_command("editor.nope", &Value::Null), Ok(CommandOutcome::Unknown));
//! ```

mod descriptor;

pub use descriptor::CommandDescriptor;

use core_types::{HandlerError, HandlerResult};
use input_types::{Chord, ChordError};
use lifecycle::run_guarded;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};
use thiserror::Error;
use tracing::{debug, info};

/// Command action; receives the command arguments (`Value::Null` when none)
pub type CommandAction = Rc<dyn Fn(&Value) -> HandlerResult>;

/// Receives default chords announced by command registrations
///
/// Implemented by the keybinding dispatcher. The registry holds it weakly.
pub trait ChordSink {
    fn bind_chord(&self, chord: &Chord, command: &str);
}

/// What [`CommandRegistry::execute_command`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The action ran and returned `Ok`
    Executed,
    /// No command with that name; nothing happened
    Unknown,
    /// The command exists but is disabled; nothing happened
    Disabled,
}

/// Command registry errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("command '{command}' failed: {source}")]
    HandlerFailed {
        command: String,
        #[source]
        source: HandlerError,
    },

    #[error("command '{command}' panicked: {message}")]
    HandlerPanicked { command: String, message: String },

    #[error("command '{command}' has an invalid default chord: {source}")]
    InvalidChord {
        command: String,
        #[source]
        source: ChordError,
    },
}

struct Registered {
    descriptor: CommandDescriptor,
    action: CommandAction,
}

/// The command registry
///
/// All methods take `&self`; actions run with no registry borrow held, so
/// an action may register, unregister or execute other commands.
#[derive(Default)]
pub struct CommandRegistry {
    commands: RefCell<BTreeMap<String, Registered>>,
    chord_sink: RefCell<Option<Weak<dyn ChordSink>>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes default chords of future registrations to `sink`
    pub fn set_chord_sink(&self, sink: Weak<dyn ChordSink>) {
        *self.chord_sink.borrow_mut() = Some(sink);
    }

    /// Registers (or replaces) `name`, optionally binding a default chord
    ///
    /// The chord is parsed before anything is stored; an invalid chord
    /// rejects the whole registration.
    pub fn register_command(
        &self,
        name: impl Into<String>,
        action: impl Fn(&Value) -> HandlerResult + 'static,
        keys: Option<&str>,
    ) -> Result<(), CommandError> {
        let name = name.into();
        let mut descriptor = CommandDescriptor::new(name.clone());
        if let Some(keys) = keys {
            let chord = Chord::parse(keys).map_err(|source| CommandError::InvalidChord {
                command: name,
                source,
            })?;
            descriptor = descriptor.with_keys(chord);
        }
        self.register_descriptor(descriptor, action);
        Ok(())
    }

    /// Registers (or replaces) a command with full metadata
    pub fn register_descriptor(
        &self,
        descriptor: CommandDescriptor,
        action: impl Fn(&Value) -> HandlerResult + 'static,
    ) {
        self.register_action(descriptor, Rc::new(action));
    }

    /// Like [`register_descriptor`](Self::register_descriptor), keeping the
    /// caller's `action` so it can later be passed to
    /// [`unregister_action`](Self::unregister_action)
    pub fn register_action(&self, descriptor: CommandDescriptor, action: CommandAction) {
        let name = descriptor.name.clone();
        let keys = descriptor.keys.clone();
        let previous = self.commands.borrow_mut().insert(
            name.clone(),
            Registered { descriptor, action },
        );

        if previous.is_some() {
            debug!(command = %name, "command replaced");
        } else {
            info!(command = %name, "command registered");
        }

        if let Some(chord) = keys {
            let sink = self.chord_sink.borrow().as_ref().and_then(Weak::upgrade);
            match sink {
                Some(sink) => sink.bind_chord(&chord, &name),
                None => debug!(command = %name, chord = %chord, "no chord sink; default chord ignored"),
            }
        }
    }

    /// Removes `name`; returns whether it existed
    ///
    /// Chords pointing at the name stay bound and become no-ops.
    pub fn unregister_command(&self, name: &str) -> bool {
        let removed = self.commands.borrow_mut().remove(name);
        removed.is_some()
    }

    /// Removes `name` only while `action` is still the registered action
    ///
    /// Returns `false` when the name is unknown or was re-registered since.
    pub fn unregister_action(&self, name: &str, action: &CommandAction) -> bool {
        let mut commands = self.commands.borrow_mut();
        let current = matches!(commands.get(name), Some(cmd) if Rc::ptr_eq(&cmd.action, action));
        let removed = if current { commands.remove(name) } else { None };
        drop(commands);
        removed.is_some()
    }

    /// Runs the action registered under `name`
    ///
    /// Unknown and disabled commands are silent no-ops. Action failures and
    /// panics come back as errors for the caller to log.
    pub fn execute_command(&self, name: &str, args: &Value) -> Result<CommandOutcome, CommandError> {
        let action = {
            let commands = self.commands.borrow();
            match commands.get(name) {
                None => {
                    debug!(command = %name, "execute of unknown command ignored");
                    return Ok(CommandOutcome::Unknown);
                }
                Some(cmd) if !cmd.descriptor.enabled => {
                    debug!(command = %name, "execute of disabled command ignored");
                    return Ok(CommandOutcome::Disabled);
                }
                Some(cmd) => Rc::clone(&cmd.action),
            }
        };

        match run_guarded(|| action(args)) {
            Ok(Ok(())) => Ok(CommandOutcome::Executed),
            Ok(Err(source)) => Err(CommandError::HandlerFailed {
                command: name.to_string(),
                source,
            }),
            Err(panic) => Err(CommandError::HandlerPanicked {
                command: name.to_string(),
                message: panic.message,
            }),
        }
    }

    /// Enables or disables a command; returns whether it exists
    pub fn set_enabled(&self, name: &str, enabled: bool) -> bool {
        match self.commands.borrow_mut().get_mut(name) {
            Some(cmd) => {
                cmd.descriptor.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.borrow().contains_key(name)
    }

    pub fn get_command(&self, name: &str) -> Option<CommandDescriptor> {
        self.commands
            .borrow()
            .get(name)
            .map(|cmd| cmd.descriptor.clone())
    }

    /// Snapshot of every descriptor, sorted by name
    pub fn commands(&self) -> Vec<CommandDescriptor> {
        self.commands
            .borrow()
            .values()
            .map(|cmd| cmd.descriptor.clone())
            .collect()
    }

    /// Enabled commands matching `query`, most relevant first
    pub fn filter_commands(&self, query: &str) -> Vec<CommandDescriptor> {
        let mut matches: Vec<(u32, CommandDescriptor)> = self
            .commands
            .borrow()
            .values()
            .filter(|cmd| cmd.descriptor.matches(query))
            .map(|cmd| (cmd.descriptor.relevance_score(query), cmd.descriptor.clone()))
            .collect();

        matches.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.name.cmp(&b.1.name)));
        matches.into_iter().map(|(_, desc)| desc).collect()
    }

    pub fn len(&self) -> usize {
        self.commands.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;

    fn counter(hits: &Rc<Cell<u32>>) -> impl Fn(&Value) -> HandlerResult {
        let hits = hits.clone();
        move |_| {
            hits.set(hits.get() + 1);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        bound: RefCell<Vec<(String, String)>>,
    }

    impl ChordSink for RecordingSink {
        fn bind_chord(&self, chord: &Chord, command: &str) {
            self.bound
                .borrow_mut()
                .push((chord.to_string(), command.to_string()));
        }
    }

    #[test]
    fn test_execute_before_register_is_noop() {
        let registry = CommandRegistry::new();
        assert_eq!(
            registry.execute_command("later.command", &Value::Null),
            Ok(CommandOutcome::Unknown)
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reregister_overwrites() {
        let registry = CommandRegistry::new();
        let first = Rc::new(Cell::new(0));
        let second = Rc::new(Cell::new(0));

        registry.register_command("c", counter(&first), None).unwrap();
        registry.register_command("c", counter(&second), None).unwrap();
        registry.execute_command("c", &Value::Null).unwrap();

        assert_eq!(first.get(), 0);
        assert_eq!(second.get(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_args_reach_action() {
        let registry = CommandRegistry::new();
        let seen = Rc::new(RefCell::new(Value::Null));
        let s = seen.clone();
        registry
            .register_command(
                "show_panel",
                move |args| {
                    *s.borrow_mut() = args.clone();
                    Ok(())
                },
                None,
            )
            .unwrap();

        registry.execute_command("show_panel", &json!("search")).unwrap();
        assert_eq!(*seen.borrow(), json!("search"));
    }

    #[test]
    fn test_default_chord_forwarded_to_sink() {
        let registry = CommandRegistry::new();
        let sink = Rc::new(RecordingSink::default());
        let dyn_sink: Rc<dyn ChordSink> = sink.clone();
        registry.set_chord_sink(Rc::downgrade(&dyn_sink));

        registry
            .register_command("fuzzy.show_command_finder", |_| Ok(()), Some("Ctrl+M"))
            .unwrap();
        registry.register_command("no.chord", |_| Ok(()), None).unwrap();

        assert_eq!(
            *sink.bound.borrow(),
            vec![("ctrl+m".to_string(), "fuzzy.show_command_finder".to_string())]
        );
        assert_eq!(
            registry
                .get_command("fuzzy.show_command_finder")
                .and_then(|d| d.keys)
                .map(|c| c.to_string()),
            Some("ctrl+m".to_string())
        );
    }

    #[test]
    fn test_invalid_chord_rejects_registration() {
        let registry = CommandRegistry::new();
        let err = registry
            .register_command("bad", |_| Ok(()), Some("hyper+q"))
            .unwrap_err();
        assert!(matches!(err, CommandError::InvalidChord { .. }));
        assert!(!registry.contains("bad"));
    }

    #[test]
    fn test_handler_failure_and_panic_are_reported() {
        let registry = CommandRegistry::new();
        registry
            .register_command("fails", |_| Err(HandlerError::new("no editor")), None)
            .unwrap();
        registry
            .register_command("panics", |_| panic!("boom"), None)
            .unwrap();

        let err = registry.execute_command("fails", &Value::Null).unwrap_err();
        assert_eq!(err.to_string(), "command 'fails' failed: no editor");

        let err = registry.execute_command("panics", &Value::Null).unwrap_err();
        assert_eq!(
            err,
            CommandError::HandlerPanicked {
                command: "panics".into(),
                message: "boom".into()
            }
        );
    }

    #[test]
    fn test_action_can_reenter_registry() {
        let registry = Rc::new(CommandRegistry::new());
        let hits = Rc::new(Cell::new(0));
        registry.register_command("inner", counter(&hits), None).unwrap();

        let weak = Rc::downgrade(&registry);
        registry
            .register_command(
                "outer",
                move |_| {
                    let registry = weak.upgrade().ok_or("registry gone")?;
                    registry.execute_command("inner", &Value::Null).map_err(|e| e.to_string())?;
                    registry.unregister_command("outer");
                    Ok(())
                },
                None,
            )
            .unwrap();

        assert_eq!(registry.execute_command("outer", &Value::Null), Ok(CommandOutcome::Executed));
        assert_eq!(hits.get(), 1);
        assert!(!registry.contains("outer"));
    }

    #[test]
    fn test_disabled_command_is_skipped() {
        let registry = CommandRegistry::new();
        let hits = Rc::new(Cell::new(0));
        registry.register_command("c", counter(&hits), None).unwrap();

        assert!(registry.set_enabled("c", false));
        assert_eq!(registry.execute_command("c", &Value::Null), Ok(CommandOutcome::Disabled));
        assert!(registry.filter_commands("c").is_empty());
        assert!(!registry.set_enabled("missing", false));
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn test_commands_snapshot_and_filter() {
        let registry = CommandRegistry::new();
        registry.register_descriptor(
            CommandDescriptor::new("search.show").with_title("Show Search"),
            |_| Ok(()),
        );
        registry.register_descriptor(
            CommandDescriptor::new("fuzzy.files").with_title("Find Files").with_tags(["search"]),
            |_| Ok(()),
        );
        registry.register_descriptor(CommandDescriptor::new("zen.toggle"), |_| Ok(()));

        let names: Vec<_> = registry.commands().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["fuzzy.files", "search.show", "zen.toggle"]);

        let found: Vec<_> = registry
            .filter_commands("search")
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(found, vec!["search.show", "fuzzy.files"]);

        assert!(registry.unregister_command("zen.toggle"));
        assert!(!registry.unregister_command("zen.toggle"));
        assert_eq!(registry.filter_commands("").len(), 2);
    }

    #[test]
    fn test_unregister_action_only_removes_its_own_registration() {
        let registry = CommandRegistry::new();
        let first = Rc::new(Cell::new(0));
        let second = Rc::new(Cell::new(0));
        let owned: CommandAction = Rc::new(counter(&first));

        registry.register_action(CommandDescriptor::new("greet"), Rc::clone(&owned));
        registry.register_command("greet", counter(&second), None).unwrap();
        assert!(!registry.unregister_action("greet", &owned));
        assert_eq!(registry.execute_command("greet", &Value::Null), Ok(CommandOutcome::Executed));
        assert_eq!((first.get(), second.get()), (0, 1));

        registry.register_action(CommandDescriptor::new("greet"), Rc::clone(&owned));
        assert!(registry.unregister_action("greet", &owned));
        assert!(!registry.contains("greet"));
        assert!(!registry.unregister_action("greet", &owned));
    }
}
