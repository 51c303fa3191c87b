//! # Keybinding Dispatcher
//!
//! Maps normalized chords to command names and runs them through the
//! [`CommandRegistry`].
//!
//! ## Philosophy
//!
//! - **One binding per chord**: Many chords may name one command; the last bind of a chord wins
//! - **Unbound keys pass through**: [`KeybindingDispatcher::process_keys`] returns `false` so the
//!   host can handle the key itself
//! - **Nothing escapes**: Failures of the bound command are logged here and never reach the host
//!
//! ## Duplicate suppression
//!
//! Hosts sometimes deliver the same chord twice for one physical press.
//! When the chord that was last dispatched arrives again within the
//! dedupe window (150ms by default) it is reported as handled but the
//! command does not run again. The window is measured from the last
//! dispatch that actually ran; suppressed repeats do not extend it.

mod keymap;

pub use keymap::{parse_keymap, KeyBinding, KeymapDocument, KeymapError, ParsedKeymap};

use core_types::{Clock, Duration, Instant};
use input_types::{Chord, ChordError};
use serde_json::Value;
use services_command_registry::{ChordSink, CommandOutcome, CommandRegistry};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default duplicate-dispatch window
pub const DEFAULT_DEDUPE_WINDOW: Duration = Duration::from_millis(150);

/// Keybinding errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeybindingError {
    #[error("invalid chord: {0}")]
    InvalidChord(#[from] ChordError),
}

/// The keybinding dispatcher
pub struct KeybindingDispatcher {
    commands: Rc<CommandRegistry>,
    clock: Rc<dyn Clock>,
    dedupe_window: Cell<Duration>,
    bindings: RefCell<BTreeMap<Chord, KeyBinding>>,
    last_dispatch: RefCell<Option<(Chord, Instant)>>,
}

impl KeybindingDispatcher {
    /// Creates a dispatcher running commands from `commands`
    pub fn new(commands: Rc<CommandRegistry>, clock: Rc<dyn Clock>) -> Self {
        Self {
            commands,
            clock,
            dedupe_window: Cell::new(DEFAULT_DEDUPE_WINDOW),
            bindings: RefCell::new(BTreeMap::new()),
            last_dispatch: RefCell::new(None),
        }
    }

    /// Creates a dispatcher and registers it as the registry's chord sink
    pub fn attach(commands: Rc<CommandRegistry>, clock: Rc<dyn Clock>) -> Rc<Self> {
        let dispatcher = Rc::new(Self::new(Rc::clone(&commands), clock));
        let sink: Rc<dyn ChordSink> = dispatcher.clone();
        commands.set_chord_sink(Rc::downgrade(&sink));
        dispatcher
    }

    pub fn dedupe_window(&self) -> Duration {
        self.dedupe_window.get()
    }

    pub fn set_dedupe_window(&self, window: Duration) {
        self.dedupe_window.set(window);
    }

    /// Inserts or replaces the binding for `binding.keys`
    pub fn bind_keys(&self, binding: KeyBinding) {
        debug!(chord = %binding.keys, command = %binding.command, "chord bound");
        self.bindings
            .borrow_mut()
            .insert(binding.keys.clone(), binding);
    }

    /// Parses `keys` and binds it to `command`
    pub fn bind(
        &self,
        keys: &str,
        command: impl Into<String>,
        args: Option<Value>,
    ) -> Result<(), KeybindingError> {
        let chord = Chord::parse(keys)?;
        self.bind_keys(KeyBinding {
            keys: chord,
            command: command.into(),
            args,
        });
        Ok(())
    }

    /// Removes the binding for `keys`; returns it if there was one
    pub fn unbind(&self, keys: &str) -> Option<KeyBinding> {
        let chord = Chord::parse(keys).ok()?;
        self.bindings.borrow_mut().remove(&chord)
    }

    /// Binding for `keys`, if bound
    pub fn binding(&self, keys: &str) -> Option<KeyBinding> {
        let chord = Chord::parse(keys).ok()?;
        self.bindings.borrow().get(&chord).cloned()
    }

    /// Snapshot of every binding, ordered by chord
    pub fn bindings(&self) -> Vec<KeyBinding> {
        self.bindings.borrow().values().cloned().collect()
    }

    /// Dispatches a chord delivered by the host
    ///
    /// Returns `false` when the chord is unbound (or unparseable) and
    /// `true` otherwise, including when the repeat was suppressed or the
    /// bound command failed.
    pub fn process_keys(&self, keys: &str) -> bool {
        let chord = match Chord::parse(keys) {
            Ok(chord) => chord,
            Err(err) => {
                debug!(keys, error = %err, "unparseable chord passed through");
                return false;
            }
        };

        let binding = self.bindings.borrow().get(&chord).cloned();
        let Some(binding) = binding else {
            return false;
        };

        let now = self.clock.now();
        if self.is_repeat(&chord, now) {
            debug!(chord = %chord, "duplicate dispatch suppressed");
            return true;
        }
        // Recorded before the command runs, so a command that re-triggers
        // its own chord is caught by the window.
        *self.last_dispatch.borrow_mut() = Some((chord.clone(), now));

        let args = binding.args.unwrap_or(Value::Null);
        match self.commands.execute_command(&binding.command, &args) {
            Ok(CommandOutcome::Executed) => {}
            Ok(outcome) => {
                debug!(chord = %chord, command = %binding.command, ?outcome, "bound command did not run")
            }
            Err(err) => warn!(chord = %chord, error = %err, "bound command failed"),
        }
        true
    }

    fn is_repeat(&self, chord: &Chord, now: Instant) -> bool {
        match self.last_dispatch.borrow().as_ref() {
            Some((last, at)) => last == chord && now.saturating_since(*at) < self.dedupe_window.get(),
            None => false,
        }
    }

    /// Bulk-loads bindings, overwriting chords that are already bound
    pub fn load_map(&self, bindings: impl IntoIterator<Item = KeyBinding>) -> usize {
        let mut count = 0;
        for binding in bindings {
            self.bind_keys(binding);
            count += 1;
        }
        info!(count, "keymap loaded");
        count
    }

    /// Parses a keymap document and loads its well-formed entries
    pub fn load_map_json(&self, text: &str) -> Result<usize, KeymapError> {
        let parsed = parse_keymap(text)?;
        if parsed.skipped > 0 {
            warn!(skipped = parsed.skipped, "keymap had malformed entries");
        }
        Ok(self.load_map(parsed.bindings))
    }
}

impl ChordSink for KeybindingDispatcher {
    fn bind_chord(&self, chord: &Chord, command: &str) {
        self.bind_keys(KeyBinding::new(chord.clone(), command));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{HandlerError, ManualClock};
    use serde_json::json;

    struct Fixture {
        clock: ManualClock,
        commands: Rc<CommandRegistry>,
        keys: Rc<KeybindingDispatcher>,
        hits: Rc<RefCell<Vec<Value>>>,
    }

    fn fixture() -> Fixture {
        let clock = ManualClock::new();
        let commands = Rc::new(CommandRegistry::new());
        let keys = KeybindingDispatcher::attach(commands.clone(), Rc::new(clock.clone()));
        let hits = Rc::new(RefCell::new(Vec::new()));
        let h = hits.clone();
        commands
            .register_command(
                "c",
                move |args| {
                    h.borrow_mut().push(args.clone());
                    Ok(())
                },
                None,
            )
            .unwrap();
        Fixture {
            clock,
            commands,
            keys,
            hits,
        }
    }

    #[test]
    fn test_unbound_chord_returns_false() {
        let f = fixture();
        assert!(!f.keys.process_keys("ctrl+q"));
        assert!(!f.keys.process_keys("not a+chord"));
        assert!(f.hits.borrow().is_empty());
    }

    #[test]
    fn test_dedupe_window() {
        let f = fixture();
        f.keys.bind("ctrl+f", "c", None).unwrap();

        assert!(f.keys.process_keys("ctrl+f"));
        f.clock.advance(Duration::from_millis(100));
        assert!(f.keys.process_keys("ctrl+f"));
        assert_eq!(f.hits.borrow().len(), 1);

        f.clock.advance(Duration::from_millis(51));
        assert!(f.keys.process_keys("ctrl+f"));
        assert_eq!(f.hits.borrow().len(), 2);
    }

    #[test]
    fn test_suppressed_repeat_does_not_extend_window() {
        let f = fixture();
        f.keys.bind("ctrl+f", "c", None).unwrap();

        f.keys.process_keys("ctrl+f");
        f.clock.advance(Duration::from_millis(140));
        f.keys.process_keys("ctrl+f");
        f.clock.advance(Duration::from_millis(20));
        f.keys.process_keys("ctrl+f");

        assert_eq!(f.hits.borrow().len(), 2);
    }

    #[test]
    fn test_different_chord_is_not_suppressed() {
        let f = fixture();
        f.keys.bind("ctrl+f", "c", None).unwrap();
        f.keys.bind("ctrl+g", "c", None).unwrap();

        f.keys.process_keys("ctrl+f");
        f.keys.process_keys("ctrl+g");
        f.keys.process_keys("ctrl+f");
        assert_eq!(f.hits.borrow().len(), 3);
    }

    #[test]
    fn test_chords_are_normalized() {
        let f = fixture();
        f.keys.bind("Shift+Ctrl+P", "c", Some(json!({"mode": "files"}))).unwrap();

        assert!(f.keys.process_keys("ctrl+shift+p"));
        assert_eq!(*f.hits.borrow(), vec![json!({"mode": "files"})]);
        assert!(f.keys.binding("CTRL+SHIFT+P").is_some());
    }

    #[test]
    fn test_rebinding_chord_replaces_command() {
        let f = fixture();
        f.keys.bind("ctrl+k", "missing", None).unwrap();
        f.keys.bind("ctrl+k", "c", None).unwrap();

        assert!(f.keys.process_keys("ctrl+k"));
        assert_eq!(f.hits.borrow().len(), 1);
        assert_eq!(f.keys.bindings().len(), 1);
    }

    #[test]
    fn test_bound_to_unknown_command_still_consumes() {
        let f = fixture();
        f.keys.bind("ctrl+u", "not.loaded.yet", None).unwrap();
        assert!(f.keys.process_keys("ctrl+u"));
    }

    #[test]
    fn test_failing_and_panicking_commands_do_not_escape() {
        let f = fixture();
        f.commands
            .register_command("fails", |_| Err(HandlerError::new("nope")), Some("ctrl+1"))
            .unwrap();
        f.commands
            .register_command("panics", |_| panic!("bad handler"), Some("ctrl+2"))
            .unwrap();

        assert!(f.keys.process_keys("ctrl+1"));
        assert!(f.keys.process_keys("ctrl+2"));
    }

    #[test]
    fn test_command_default_chord_binds_through_sink() {
        let f = fixture();
        f.commands
            .register_command("search.show", |_| Ok(()), Some("ctrl+f"))
            .unwrap();

        let binding = f.keys.binding("ctrl+f").unwrap();
        assert_eq!(binding.command, "search.show");
    }

    #[test]
    fn test_handler_retriggering_own_chord_is_dropped() {
        let clock = ManualClock::new();
        let commands = Rc::new(CommandRegistry::new());
        let keys = KeybindingDispatcher::attach(commands.clone(), Rc::new(clock));
        let runs = Rc::new(Cell::new(0));

        let weak = Rc::downgrade(&keys);
        let r = runs.clone();
        commands
            .register_command(
                "loop",
                move |_| {
                    r.set(r.get() + 1);
                    if let Some(keys) = weak.upgrade() {
                        assert!(keys.process_keys("ctrl+l"));
                    }
                    Ok(())
                },
                Some("ctrl+l"),
            )
            .unwrap();

        assert!(keys.process_keys("ctrl+l"));
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn test_load_map_and_unbind() {
        let f = fixture();
        let loaded = f
            .keys
            .load_map_json(
                r#"{"version": 1, "bindings": [
                    {"keys": "ctrl+1", "command": "c", "args": 1},
                    {"keys": "ctrl+2", "command": "c", "args": 2},
                    {"keys": "bogus+3", "command": "c"}
                ]}"#,
            )
            .unwrap();
        assert_eq!(loaded, 2);

        f.keys.process_keys("ctrl+2");
        assert_eq!(*f.hits.borrow(), vec![json!(2)]);

        assert!(f.keys.unbind("ctrl+2").is_some());
        assert!(f.keys.unbind("ctrl+2").is_none());
        assert!(!f.keys.process_keys("ctrl+2"));
    }

    #[test]
    fn test_configurable_window() {
        let f = fixture();
        f.keys.set_dedupe_window(Duration::ZERO);
        f.keys.bind("ctrl+f", "c", None).unwrap();
        f.keys.process_keys("ctrl+f");
        f.keys.process_keys("ctrl+f");
        assert_eq!(f.hits.borrow().len(), 2);
        assert_eq!(f.keys.dedupe_window(), Duration::ZERO);
    }

    #[test]
    fn test_bind_rejects_invalid_chord() {
        let f = fixture();
        assert!(matches!(
            f.keys.bind("", "c", None),
            Err(KeybindingError::InvalidChord(ChordError::Empty))
        ));
    }
}
