use core_types::{Duration, HandlerResult};
use lifecycle::{Debouncer, TaskScheduler};
use serde_json::Value;
use services_command_registry::{CommandError, CommandOutcome, CommandRegistry};
use services_event_bus::{EmitReport, EventBus, SubscriptionId};
use services_keybinding::{KeybindingDispatcher, KeybindingError};
use services_panel_host::{PanelHost, RenderContext};
use std::rc::Rc;
use view_types::DeclarativeNode;

/// Everything an extension may touch
///
/// Cheap to clone; every clone talks to the same registries.
#[derive(Clone)]
pub struct ExtensionContext {
    commands: Rc<CommandRegistry>,
    keys: Rc<KeybindingDispatcher>,
    events: Rc<EventBus>,
    panels: Rc<PanelHost>,
    scheduler: TaskScheduler,
}

impl ExtensionContext {
    pub fn new(
        commands: Rc<CommandRegistry>,
        keys: Rc<KeybindingDispatcher>,
        events: Rc<EventBus>,
        panels: Rc<PanelHost>,
        scheduler: TaskScheduler,
    ) -> Self {
        Self {
            commands,
            keys,
            events,
            panels,
            scheduler,
        }
    }

    pub fn commands(&self) -> &Rc<CommandRegistry> {
        &self.commands
    }

    pub fn keys(&self) -> &Rc<KeybindingDispatcher> {
        &self.keys
    }

    pub fn events(&self) -> &Rc<EventBus> {
        &self.events
    }

    pub fn panels(&self) -> &Rc<PanelHost> {
        &self.panels
    }

    pub fn scheduler(&self) -> &TaskScheduler {
        &self.scheduler
    }

    /// A debouncer on the shell's scheduler, for input handlers
    pub fn debouncer(&self, delay: Duration, label: &'static str) -> Debouncer {
        Debouncer::new(self.scheduler.clone(), delay, label)
    }

    // Commands

    pub fn register_command(
        &self,
        name: impl Into<String>,
        action: impl Fn(&Value) -> HandlerResult + 'static,
        keys: Option<&str>,
    ) -> Result<(), CommandError> {
        self.commands.register_command(name, action, keys)
    }

    pub fn unregister_command(&self, name: &str) -> bool {
        self.commands.unregister_command(name)
    }

    pub fn execute_command(&self, name: &str, args: &Value) -> Result<CommandOutcome, CommandError> {
        self.commands.execute_command(name, args)
    }

    // Keys

    pub fn bind_keys(&self, keys: &str, command: impl Into<String>, args: Option<Value>) -> Result<(), KeybindingError> {
        self.keys.bind(keys, command, args)
    }

    pub fn unbind_keys(&self, keys: &str) -> bool {
        self.keys.unbind(keys).is_some()
    }

    // Events

    pub fn on(&self, event: impl Into<String>, handler: impl Fn(&Value) -> HandlerResult + 'static) -> SubscriptionId {
        self.events.on(event, handler)
    }

    pub fn off(&self, event: &str, id: SubscriptionId) -> bool {
        self.events.off(event, id)
    }

    pub fn emit(&self, event: &str, payload: &Value) -> EmitReport {
        self.events.emit(event, payload)
    }

    // UI

    pub fn register_panel(&self, id: &str, component: impl Fn(&RenderContext) -> DeclarativeNode + 'static) {
        self.panels.register_panel(id, component)
    }

    pub fn unregister_panel(&self, id: &str) -> bool {
        self.panels.unregister_panel(id)
    }

    pub fn register_status(&self, id: &str, component: impl Fn(&RenderContext) -> DeclarativeNode + 'static) {
        self.panels.register_status(id, component)
    }

    pub fn unregister_status(&self, id: &str) -> bool {
        self.panels.unregister_status(id)
    }

    pub fn show_panel(&self, id: &str) -> EmitReport {
        self.panels.show_panel(id)
    }
}
