use serde_json::Value;
use services_event_bus::SubscriptionId;
use services_extension_host::{Extension, ExtensionContext, ExtensionError};
use std::cell::Cell;
use std::rc::Rc;
use tracing::debug;

/// Event the shell emits for every key the host reports
pub const KEY_PRESSED_EVENT: &str = "keyPressed";

const SHOW_PANEL_COMMAND: &str = "show_panel";

/// The shell's own panel wiring
#[derive(Debug, Default)]
pub struct Panels {
    key_listener: Cell<Option<SubscriptionId>>,
}

impl Panels {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Extension for Panels {
    fn activate(&self, ctx: &ExtensionContext) -> Result<(), ExtensionError> {
        let panels = Rc::downgrade(ctx.panels());
        let listener = ctx.on(KEY_PRESSED_EVENT, move |key| {
            if key.as_str() == Some("esc") {
                if let Some(panels) = panels.upgrade() {
                    panels.show_panel("");
                }
            }
            Ok(())
        });
        self.key_listener.set(Some(listener));

        let panels = Rc::downgrade(ctx.panels());
        ctx.register_command(
            SHOW_PANEL_COMMAND,
            move |args| {
                let panel = match args {
                    Value::String(panel) => panel.as_str(),
                    Value::Null => "",
                    _ => return Err("show_panel expects a panel id".into()),
                };
                if let Some(panels) = panels.upgrade() {
                    panels.show_panel(panel);
                }
                Ok(())
            },
            None,
        )?;
        debug!("panel wiring active");
        Ok(())
    }

    fn deactivate(&self, ctx: &ExtensionContext) -> Result<(), ExtensionError> {
        if let Some(listener) = self.key_listener.take() {
            ctx.off(KEY_PRESSED_EVENT, listener);
        }
        ctx.unregister_command(SHOW_PANEL_COMMAND);
        Ok(())
    }
}
