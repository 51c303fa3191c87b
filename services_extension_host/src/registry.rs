use crate::context::ExtensionContext;
use crate::{CommandContribution, Extension, ExtensionError};
use input_types::Chord;
use lifecycle::run_guarded;
use services_command_registry::{CommandAction, CommandDescriptor, CommandError};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Where an extension is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionState {
    /// Stored, not activated
    Registered,
    /// Inside its own `activate`
    Activating,
    Active,
}

struct Entry {
    extension: Rc<dyn Extension>,
    state: ExtensionState,
    generation: u64,
    /// Commands the registry registered on the extension's behalf
    contributed: Vec<Contributed>,
}

/// A registered contribution and the default chord it actually bound
struct Contributed {
    name: String,
    action: CommandAction,
    chord: Option<Chord>,
}

#[derive(Default)]
struct Entries {
    next_generation: u64,
    by_name: BTreeMap<String, Entry>,
}

/// Named extensions and their activation state
pub struct ExtensionRegistry {
    ctx: ExtensionContext,
    entries: RefCell<Entries>,
}

impl ExtensionRegistry {
    pub fn new(ctx: ExtensionContext) -> Self {
        Self {
            ctx,
            entries: RefCell::new(Entries::default()),
        }
    }

    pub fn context(&self) -> &ExtensionContext {
        &self.ctx
    }

    /// Stores `extension` under `name`, not yet activated
    ///
    /// An existing entry under `name` is deactivated first, whatever its
    /// state.
    pub fn register_extension(&self, name: &str, extension: Rc<dyn Extension>) {
        let previous = self.entries.borrow_mut().by_name.remove(name);
        if let Some(previous) = previous {
            self.retire(name, previous);
        }

        let mut entries = self.entries.borrow_mut();
        entries.next_generation += 1;
        let generation = entries.next_generation;
        entries.by_name.insert(
            name.to_string(),
            Entry {
                extension,
                state: ExtensionState::Registered,
                generation,
                contributed: Vec::new(),
            },
        );
        info!(extension = name, "extension registered");
    }

    /// Activates `name` once
    ///
    /// Returns `Ok(false)` when the extension is already active or is in
    /// the middle of activating. A failed activation leaves the entry
    /// registered so it can be retried.
    pub fn activate(&self, name: &str) -> Result<bool, ExtensionError> {
        let (extension, generation) = {
            let mut entries = self.entries.borrow_mut();
            let entry = entries
                .by_name
                .get_mut(name)
                .ok_or_else(|| ExtensionError::Unknown(name.to_string()))?;
            if entry.state != ExtensionState::Registered {
                debug!(extension = name, state = ?entry.state, "activate ignored");
                return Ok(false);
            }
            entry.state = ExtensionState::Activating;
            (Rc::clone(&entry.extension), entry.generation)
        };

        let mut contributed = Vec::new();
        let result = run_guarded(|| self.bring_up(extension.as_ref(), &mut contributed))
            .unwrap_or_else(|panic| {
                Err(ExtensionError::Panicked {
                    phase: "activate",
                    message: panic.message,
                })
            });

        let settled = {
            let mut entries = self.entries.borrow_mut();
            match entries.by_name.get_mut(name) {
                Some(entry) if entry.generation == generation => {
                    if result.is_ok() {
                        entry.state = ExtensionState::Active;
                        entry.contributed = std::mem::take(&mut contributed);
                    } else {
                        entry.state = ExtensionState::Registered;
                    }
                    true
                }
                _ => false,
            }
        };

        match result {
            Ok(()) if settled => {
                info!(extension = name, "extension activated");
                Ok(true)
            }
            Ok(()) => {
                warn!(extension = name, "extension replaced while activating");
                self.withdraw(&contributed);
                Ok(false)
            }
            Err(err) => {
                warn!(extension = name, error = %err, "extension failed to activate");
                self.withdraw(&contributed);
                Err(err)
            }
        }
    }

    /// Registers contributions, then runs `activate`
    ///
    /// A default chord is bound only when nothing else holds it, so user
    /// keymap entries survive a reload.
    fn bring_up(&self, extension: &dyn Extension, contributed: &mut Vec<Contributed>) -> Result<(), ExtensionError> {
        for CommandContribution { name, action, keys } in extension.commands() {
            let mut descriptor = CommandDescriptor::new(name.clone());
            let mut chord = None;
            if let Some(keys) = keys {
                let parsed = Chord::parse(&keys).map_err(|source| CommandError::InvalidChord {
                    command: name.clone(),
                    source,
                })?;
                match self.ctx.keys().binding(parsed.as_str()) {
                    Some(taken) => {
                        debug!(command = %name, chord = %parsed, bound_to = %taken.command, "default chord already bound")
                    }
                    None => {
                        descriptor = descriptor.with_keys(parsed.clone());
                        chord = Some(parsed);
                    }
                }
            }
            self.ctx.commands().register_action(descriptor, Rc::clone(&action));
            contributed.push(Contributed { name, action, chord });
        }
        extension.activate(&self.ctx)
    }

    /// Deactivates an active extension; it may be activated again later
    pub fn deactivate(&self, name: &str) -> Result<bool, ExtensionError> {
        let (extension, contributed) = {
            let mut entries = self.entries.borrow_mut();
            let entry = entries
                .by_name
                .get_mut(name)
                .ok_or_else(|| ExtensionError::Unknown(name.to_string()))?;
            if entry.state != ExtensionState::Active {
                debug!(extension = name, state = ?entry.state, "deactivate ignored");
                return Ok(false);
            }
            entry.state = ExtensionState::Registered;
            (Rc::clone(&entry.extension), std::mem::take(&mut entry.contributed))
        };

        let result = self.call_deactivate(extension.as_ref());
        self.withdraw(&contributed);
        match result {
            Ok(()) => {
                info!(extension = name, "extension deactivated");
                Ok(true)
            }
            Err(err) => {
                warn!(extension = name, error = %err, "extension failed to deactivate");
                Err(err)
            }
        }
    }

    /// Activates `names` in order, logging failures; returns how many
    /// became active
    pub fn activate_all<I, S>(&self, names: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .filter(|name| match self.activate(name.as_ref()) {
                Ok(activated) => activated,
                Err(err) => {
                    warn!(extension = name.as_ref(), error = %err, "skipping extension");
                    false
                }
            })
            .count()
    }

    /// Deactivates and drops `name`
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.entries.borrow_mut().by_name.remove(name);
        match removed {
            Some(entry) => {
                self.retire(name, entry);
                info!(extension = name, "extension unregistered");
                true
            }
            None => false,
        }
    }

    /// Deactivates every active extension, in reverse name order
    pub fn deactivate_all(&self) {
        for name in self.names().into_iter().rev() {
            if self.is_activated(&name) {
                if let Err(err) = self.deactivate(&name) {
                    debug!(extension = %name, error = %err, "deactivate during shutdown failed");
                }
            }
        }
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        self.entries.borrow().by_name.keys().cloned().collect()
    }

    pub fn state(&self, name: &str) -> Option<ExtensionState> {
        self.entries.borrow().by_name.get(name).map(|e| e.state)
    }

    pub fn is_activated(&self, name: &str) -> bool {
        self.state(name) == Some(ExtensionState::Active)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.borrow().by_name.contains_key(name)
    }

    fn retire(&self, name: &str, entry: Entry) {
        if let Err(err) = self.call_deactivate(entry.extension.as_ref()) {
            warn!(extension = name, error = %err, "outgoing extension failed to deactivate");
        }
        self.withdraw(&entry.contributed);
    }

    fn call_deactivate(&self, extension: &dyn Extension) -> Result<(), ExtensionError> {
        run_guarded(|| extension.deactivate(&self.ctx)).unwrap_or_else(|panic| {
            Err(ExtensionError::Panicked {
                phase: "deactivate",
                message: panic.message,
            })
        })
    }

    /// Undoes what `bring_up` registered, where it is still in place
    ///
    /// Chords bound by anyone else and commands re-registered since are
    /// left alone.
    fn withdraw(&self, contributed: &[Contributed]) {
        for item in contributed {
            if let Some(chord) = &item.chord {
                let still_default = self
                    .ctx
                    .keys()
                    .binding(chord.as_str())
                    .is_some_and(|b| b.command == item.name && b.args.is_none());
                if still_default {
                    self.ctx.unbind_keys(chord.as_str());
                }
            }
            if !self.ctx.commands().unregister_action(&item.name, &item.action) {
                debug!(command = %item.name, "contributed command replaced; left registered");
            }
        }
    }
}
