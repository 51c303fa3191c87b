//! # Shell
//!
//! Owns every registry and wires them together. The host talks to the
//! shell through [`Shell::handle_key`], [`Shell::ui_event`] and
//! [`Shell::tick`]; extensions talk to it through their context.

use crate::builtins::{self, KEY_PRESSED_EVENT};
use crate::config::ShellConfig;
use crate::script::{KeyScript, ScriptStep};
use core_types::{Clock, ManualClock, NodeId};
use input_types::Chord;
use lifecycle::TaskScheduler;
use serde_json::Value;
use services_command_registry::{CommandError, CommandOutcome, CommandRegistry};
use services_event_bus::{EmitReport, EventBus, SubscriptionId};
use services_extension_host::{Extension, ExtensionContext, ExtensionRegistry};
use services_keybinding::KeybindingDispatcher;
use services_panel_host::{PanelHost, SHOW_PANEL_EVENT};
use services_ui_bridge::{HandleSlots, HostTransport, RenderReport, UiBridge};
use std::cell::Cell;
use std::rc::{Rc, Weak};
use tracing::{debug, info, warn};
use view_types::{HandlerKind, WidgetCommand, WidgetHandle};

/// Result of one [`Shell::tick`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Deferred tasks that ran
    pub tasks_run: usize,
    /// Present when the UI version moved and the tree was re-rendered
    pub render: Option<RenderReport>,
}

/// Result of [`Shell::play`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayReport {
    pub steps: usize,
    /// Chords consumed by a binding
    pub keys_consumed: usize,
    pub commands_run: usize,
    pub command_failures: usize,
    pub renders: usize,
}

/// The editor shell runtime
pub struct Shell {
    scheduler: TaskScheduler,
    events: Rc<EventBus>,
    commands: Rc<CommandRegistry>,
    keys: Rc<KeybindingDispatcher>,
    panels: Rc<PanelHost>,
    bridge: Rc<UiBridge>,
    extensions: ExtensionRegistry,
    rendered_version: Cell<Option<u64>>,
    focus_listener: SubscriptionId,
}

impl Shell {
    /// Builds the shell, activates extensions and applies the keymap
    ///
    /// The `panels` built-in is always activated; `config.extensions` come
    /// after it, in order. Nothing is rendered until the first [`tick`].
    ///
    /// [`tick`]: Shell::tick
    pub fn new(
        config: &ShellConfig,
        host: Box<dyn HostTransport>,
        slots: HandleSlots,
        clock: Rc<dyn Clock>,
    ) -> Self {
        let scheduler = TaskScheduler::new(Rc::clone(&clock));
        let events = Rc::new(EventBus::new());
        let commands = Rc::new(CommandRegistry::new());
        let keys = KeybindingDispatcher::attach(Rc::clone(&commands), clock);
        keys.set_dedupe_window(config.dedupe_window());
        let panels = PanelHost::attach(Rc::clone(&events));
        let bridge = Rc::new(UiBridge::new(host, slots, scheduler.clone()));

        let focus_listener = events.on(SHOW_PANEL_EVENT, {
            let bridge = Rc::downgrade(&bridge);
            move |payload: &Value| {
                if let Some(panel) = payload.as_str().filter(|p| !p.is_empty()) {
                    focus_panel_input(&bridge, panel);
                }
                Ok(())
            }
        });

        let ctx = ExtensionContext::new(
            Rc::clone(&commands),
            Rc::clone(&keys),
            Rc::clone(&events),
            Rc::clone(&panels),
            scheduler.clone(),
        );
        let extensions = ExtensionRegistry::new(ctx);
        builtins::register_builtins(&extensions);

        let shell = Self {
            scheduler,
            events,
            commands,
            keys,
            panels,
            bridge,
            extensions,
            rendered_version: Cell::new(None),
            focus_listener,
        };
        shell.start(config);
        shell
    }

    fn start(&self, config: &ShellConfig) {
        if let Err(err) = self.extensions.activate(builtins::PANELS) {
            warn!(error = %err, "panel wiring failed to activate");
        }
        let activated = self.extensions.activate_all(&config.extensions);
        let bound = self.keys.load_map(config.keymap.iter().cloned());
        if !config.initial_panel.is_empty() {
            self.show_panel(&config.initial_panel);
        }
        info!(
            extensions = activated,
            bindings = bound,
            commands = self.commands.len(),
            "shell started"
        );
    }

    pub fn events(&self) -> &Rc<EventBus> {
        &self.events
    }

    pub fn commands(&self) -> &Rc<CommandRegistry> {
        &self.commands
    }

    pub fn keys(&self) -> &Rc<KeybindingDispatcher> {
        &self.keys
    }

    pub fn panels(&self) -> &Rc<PanelHost> {
        &self.panels
    }

    pub fn bridge(&self) -> &Rc<UiBridge> {
        &self.bridge
    }

    pub fn extensions(&self) -> &ExtensionRegistry {
        &self.extensions
    }

    pub fn scheduler(&self) -> &TaskScheduler {
        &self.scheduler
    }

    /// Registers and activates an extension in one go
    pub fn load_extension(&self, name: &str, extension: Rc<dyn Extension>) -> bool {
        self.extensions.register_extension(name, extension);
        match self.extensions.activate(name) {
            Ok(activated) => activated,
            Err(err) => {
                warn!(extension = name, error = %err, "extension failed to load");
                false
            }
        }
    }

    /// A key press reported by the host
    ///
    /// Chords with at least one modifier go through the keybinding
    /// dispatcher. Every parseable chord is then broadcast as
    /// `keyPressed`. Returns whether a binding consumed the chord.
    pub fn handle_key(&self, raw: &str) -> bool {
        let chord = match Chord::parse(raw) {
            Ok(chord) => chord,
            Err(err) => {
                debug!(chord = raw, error = %err, "unparseable key ignored");
                return false;
            }
        };
        let consumed = chord.has_modifiers() && self.keys.process_keys(chord.as_str());
        self.events
            .emit(KEY_PRESSED_EVENT, &Value::String(chord.to_string()));
        consumed
    }

    /// An interaction callback reported by the host
    pub fn ui_event(&self, node: &NodeId, kind: HandlerKind, value: Value) -> bool {
        self.bridge.dispatch_event(node, kind, value)
    }

    pub fn show_panel(&self, panel: &str) -> EmitReport {
        self.panels.show_panel(panel)
    }

    pub fn current_panel(&self) -> String {
        self.panels.current_panel()
    }

    pub fn execute_command(&self, name: &str, args: &Value) -> Result<CommandOutcome, CommandError> {
        self.commands.execute_command(name, args)
    }

    /// Runs due deferred work, then re-renders if the UI version moved
    pub fn tick(&self) -> TickReport {
        let tasks_run = self.scheduler.run_due();
        let version = self.panels.version();
        if self.rendered_version.get() == Some(version) {
            return TickReport {
                tasks_run,
                render: None,
            };
        }

        let tree = self.panels.compose();
        let report = self.bridge.render(&tree);
        self.rendered_version.set(Some(version));
        debug!(
            version,
            mounted = report.mounted.len(),
            unmounted = report.unmounted.len(),
            "rendered"
        );
        TickReport {
            tasks_run,
            render: Some(report),
        }
    }

    /// Plays `script`, ticking after every step
    ///
    /// `wait` steps advance `clock`, which must be the clock the shell
    /// was built with.
    pub fn play(&self, script: &KeyScript, clock: &ManualClock) -> PlayReport {
        let mut report = PlayReport::default();
        for step in script.steps() {
            match step {
                ScriptStep::Key(chord) => {
                    if self.handle_key(chord.as_str()) {
                        report.keys_consumed += 1;
                    }
                }
                ScriptStep::Wait(delay) => clock.advance(*delay),
                ScriptStep::Show(panel) => {
                    self.show_panel(panel);
                }
                ScriptStep::Run { command, args } => match self.execute_command(command, args) {
                    Ok(CommandOutcome::Executed) => report.commands_run += 1,
                    Ok(outcome) => debug!(command = %command, ?outcome, "scripted command did not run"),
                    Err(err) => {
                        report.command_failures += 1;
                        warn!(command = %command, error = %err, "scripted command failed");
                    }
                },
            }
            report.steps += 1;
            if self.tick().render.is_some() {
                report.renders += 1;
            }
        }
        report
    }
}

impl Drop for Shell {
    fn drop(&mut self) {
        self.extensions.deactivate_all();
        self.events.off(SHOW_PANEL_EVENT, self.focus_listener);
    }
}

/// Focuses and selects `<panel>::input` once its handle is known
fn focus_panel_input(bridge: &Weak<UiBridge>, panel: &str) {
    let Some(live) = bridge.upgrade() else {
        return;
    };
    let input = NodeId::new(format!("{}::input", panel));
    let target = input.clone();
    let bridge = bridge.clone();
    live.resolve_handle(&input, move |handle: Option<WidgetHandle>| {
        let (Some(handle), Some(bridge)) = (handle, bridge.upgrade()) else {
            return;
        };
        debug!(node = %target, %handle, "focusing panel input");
        bridge.invoke(&target, WidgetCommand::Focus);
        bridge.invoke(&target, WidgetCommand::SelectAll);
    });
}
