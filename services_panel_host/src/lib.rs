//! # Panel Host
//!
//! Panel and status-bar registries plus the shell's composed tree.
//!
//! ## Philosophy
//!
//! - **Overwrite by id**: Registering an id again replaces its component
//! - **Touch on change**: Every registry mutation bumps the UI version so the
//!   shell re-renders
//! - **Hidden, not gone**: Every registered panel is rendered on every pass;
//!   only the current one is shown, so panel widgets keep their state across
//!   show/hide cycles

mod registry;
mod state;

pub use registry::{Component, ComponentRegistry};
pub use state::{RenderContext, UiSnapshot, UiState};

use core_types::HandlerError;
use lifecycle::run_guarded;
use serde_json::Value;
use services_event_bus::{EmitReport, EventBus, SubscriptionId};
use std::rc::{Rc, Weak};
use tracing::{debug, info, warn};
use view_types::{DeclarativeNode, WidgetKind};

/// Event carrying the panel id to show (`""` hides every panel)
pub const SHOW_PANEL_EVENT: &str = "showPanel";

/// Id of the composed root view
pub const ROOT_ID: &str = "shell::root";
/// Id of the stacked view holding every panel
pub const PANELS_ID: &str = "panels";
/// Id of the status bar
pub const STATUS_BAR_ID: &str = "statusBar";

/// Owns the panel and status registries and the UI state they feed
pub struct PanelHost {
    state: UiState,
    panels: ComponentRegistry,
    status: ComponentRegistry,
    events: Rc<EventBus>,
    subscription: SubscriptionId,
}

impl PanelHost {
    /// Creates the host and subscribes it to [`SHOW_PANEL_EVENT`] on `events`
    pub fn attach(events: Rc<EventBus>) -> Rc<Self> {
        Rc::new_cyclic(|weak: &Weak<PanelHost>| {
            let host = weak.clone();
            let subscription = events.on(SHOW_PANEL_EVENT, move |payload| {
                let Some(host) = host.upgrade() else {
                    return Ok(());
                };
                let panel = payload
                    .as_str()
                    .ok_or_else(|| HandlerError::new("showPanel payload must be a panel id string"))?;
                host.apply_show(panel);
                Ok(())
            });
            Self {
                state: UiState::new(),
                panels: ComponentRegistry::new(),
                status: ComponentRegistry::new(),
                events,
                subscription,
            }
        })
    }

    pub fn state(&self) -> &UiState {
        &self.state
    }

    pub fn current_panel(&self) -> String {
        self.state.current_panel()
    }

    pub fn version(&self) -> u64 {
        self.state.version()
    }

    /// Registers or replaces panel `id`
    pub fn register_panel(
        &self,
        id: &str,
        component: impl Fn(&RenderContext) -> DeclarativeNode + 'static,
    ) {
        let fresh = self.panels.insert(id, Rc::new(component));
        info!(panel = id, replaced = !fresh, "panel registered");
        self.state.touch();
    }

    pub fn unregister_panel(&self, id: &str) -> bool {
        let removed = self.panels.remove(id);
        if removed {
            info!(panel = id, "panel unregistered");
            self.state.touch();
        }
        removed
    }

    /// Registers or replaces status component `id`
    pub fn register_status(
        &self,
        id: &str,
        component: impl Fn(&RenderContext) -> DeclarativeNode + 'static,
    ) {
        let fresh = self.status.insert(id, Rc::new(component));
        info!(status = id, replaced = !fresh, "status component registered");
        self.state.touch();
    }

    pub fn unregister_status(&self, id: &str) -> bool {
        let removed = self.status.remove(id);
        if removed {
            info!(status = id, "status component unregistered");
            self.state.touch();
        }
        removed
    }

    pub fn panel_ids(&self) -> Vec<String> {
        self.panels.ids()
    }

    pub fn status_ids(&self) -> Vec<String> {
        self.status.ids()
    }

    /// Asks every [`SHOW_PANEL_EVENT`] subscriber to show `id`
    pub fn show_panel(&self, id: &str) -> EmitReport {
        self.events
            .emit(SHOW_PANEL_EVENT, &Value::String(id.to_string()))
    }

    fn apply_show(&self, panel: &str) {
        if !panel.is_empty() && !self.panels.contains(panel) {
            debug!(panel, "showing a panel that is not registered");
        }
        if self.state.set_current_panel(panel) {
            debug!(panel, version = self.state.version(), "current panel changed");
        }
    }

    /// Context handed to components for the next render
    pub fn render_context(&self) -> RenderContext {
        RenderContext {
            current_panel: self.state.current_panel(),
            version: self.state.version(),
        }
    }

    /// Builds the shell tree: a root view with the panel stack and the
    /// status bar
    pub fn compose(&self) -> DeclarativeNode {
        let ctx = self.render_context();

        let panels = render_all(&self.panels, &ctx);
        let status = render_all(&self.status, &ctx);

        let stack = DeclarativeNode::new(WidgetKind::StackedView)
            .with_id(PANELS_ID)
            .with_prop("current", ctx.current_panel.clone())
            .with_style("visible", !ctx.current_panel.is_empty())
            .with_children(panels);
        let status_bar = DeclarativeNode::new(WidgetKind::StatusBar)
            .with_id(STATUS_BAR_ID)
            .with_children(status);

        DeclarativeNode::new(WidgetKind::View)
            .with_id(ROOT_ID)
            .with_child(stack)
            .with_child(status_bar)
    }
}

impl Drop for PanelHost {
    fn drop(&mut self) {
        self.events.off(SHOW_PANEL_EVENT, self.subscription);
    }
}

/// Renders every entry; the registry id always becomes the node id
fn render_all(registry: &ComponentRegistry, ctx: &RenderContext) -> Vec<DeclarativeNode> {
    registry
        .snapshot()
        .into_iter()
        .map(|(id, component)| match run_guarded(|| component(ctx)) {
            Ok(node) => node.with_id(id.as_str()),
            Err(panic) => {
                warn!(component = %id, error = %panic, "component failed to render");
                DeclarativeNode::new(WidgetKind::View).with_id(id.as_str())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{ManualClock, NodeId};
    use lifecycle::TaskScheduler;
    use serde_json::json;
    use services_ui_bridge::{HandleSlots, RecordingHost, UiBridge};

    fn panel(text: &'static str) -> impl Fn(&RenderContext) -> DeclarativeNode + 'static {
        move |_| DeclarativeNode::new(WidgetKind::View).with_child(DeclarativeNode::text(text))
    }

    #[test]
    fn test_registration_touches_version() {
        let host = PanelHost::attach(Rc::new(EventBus::new()));
        let v0 = host.version();

        host.register_panel("panel::search", panel("search"));
        assert_eq!(host.version(), v0 + 1);

        host.register_panel("panel::search", panel("search again"));
        assert_eq!(host.version(), v0 + 2);
        assert_eq!(host.panel_ids(), vec!["panel::search"]);

        host.register_status("status::editor", |_| DeclarativeNode::text("Line: 1"));
        assert!(host.unregister_status("status::editor"));
        assert!(!host.unregister_status("status::editor"));
        assert_eq!(host.version(), v0 + 4);
    }

    #[test]
    fn test_show_panel_reaches_every_subscriber() {
        let events = Rc::new(EventBus::new());
        let host = PanelHost::attach(events.clone());
        let seen = Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = seen.clone();
        events.on(SHOW_PANEL_EVENT, move |payload| {
            sink.borrow_mut().push(payload.clone());
            Ok(())
        });

        let report = host.show_panel("panel::files");
        assert_eq!(report.delivered, 2);
        assert_eq!(host.current_panel(), "panel::files");
        assert_eq!(*seen.borrow(), vec![json!("panel::files")]);

        let report = events.emit(SHOW_PANEL_EVENT, &json!(42));
        assert_eq!(report.failed, 1);
        assert_eq!(host.current_panel(), "panel::files");
    }

    #[test]
    fn test_compose_layout() {
        let host = PanelHost::attach(Rc::new(EventBus::new()));
        host.register_panel("panel::a", panel("a"));
        host.register_panel("panel::b", panel("b"));
        host.register_status("status::editor", |_| DeclarativeNode::text("Line: 1 Column: 1"));

        let tree = host.compose();
        assert_eq!(tree.id, Some(NodeId::new(ROOT_ID)));

        let stack = tree.find(PANELS_ID).unwrap();
        assert_eq!(stack.kind, WidgetKind::StackedView);
        assert_eq!(stack.prop_str("current"), Some(""));
        assert_eq!(stack.style.get("visible"), Some(&json!(false)));
        let ids: Vec<_> = stack.children.iter().filter_map(|c| c.id.clone()).collect();
        assert_eq!(ids, vec![NodeId::new("panel::a"), NodeId::new("panel::b")]);

        host.show_panel("panel::b");
        let tree = host.compose();
        let stack = tree.find(PANELS_ID).unwrap();
        assert_eq!(stack.prop_str("current"), Some("panel::b"));
        assert_eq!(stack.style.get("visible"), Some(&json!(true)));

        let status = tree.find(STATUS_BAR_ID).unwrap();
        assert_eq!(status.children.len(), 1);
    }

    #[test]
    fn test_panicking_component_renders_placeholder() {
        let host = PanelHost::attach(Rc::new(EventBus::new()));
        host.register_panel("panel::broken", |_| panic!("render bug"));
        host.register_panel("panel::ok", panel("ok"));

        let tree = host.compose();
        let stack = tree.find(PANELS_ID).unwrap();
        assert_eq!(stack.children.len(), 2);
        assert!(stack.children[0].children.is_empty());
    }

    #[test]
    fn test_hidden_panel_stays_mounted_across_show_hide() {
        let host = PanelHost::attach(Rc::new(EventBus::new()));
        host.register_panel("panel::search", panel("search"));

        let scheduler = TaskScheduler::new(Rc::new(ManualClock::new()));
        let slots = HandleSlots::new();
        let recording = RecordingHost::new().with_handle_publisher(slots.clone());
        let bridge = UiBridge::new(Box::new(recording), slots, scheduler);

        let search = NodeId::new("panel::search");
        bridge.render(&host.compose());
        assert!(bridge.is_mounted(&search));

        host.show_panel("panel::search");
        let report = bridge.render(&host.compose());
        assert!(report.unmounted.is_empty());

        host.show_panel("");
        let report = bridge.render(&host.compose());
        assert!(report.unmounted.is_empty());
        assert!(report.mounted.is_empty());
        assert!(bridge.is_mounted(&search));
    }
}
