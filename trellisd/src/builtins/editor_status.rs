use serde_json::Value;
use services_event_bus::SubscriptionId;
use services_extension_host::{Extension, ExtensionContext, ExtensionError};
use services_panel_host::RenderContext;
use std::cell::RefCell;
use std::rc::Rc;
use view_types::{DeclarativeNode, WidgetKind};

/// Payload: `[line, column]`, both zero-based
pub const CURSOR_EVENT: &str = "cursorPositionChanged";
/// Payload: `{ "language": "..." }`
pub const TAB_SELECTED_EVENT: &str = "tabSelected";
/// Payload: `{ "language": "..." }` of the tab that is current afterwards
pub const TAB_CLOSED_EVENT: &str = "tabClosed";

const STATUS_ID: &str = "status::editor";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Readout {
    line: u64,
    column: u64,
    language: String,
}

/// Cursor position and language of the active editor
#[derive(Debug, Default)]
pub struct EditorStatus {
    readout: Rc<RefCell<Readout>>,
    subscriptions: RefCell<Vec<(&'static str, SubscriptionId)>>,
}

impl EditorStatus {
    pub fn new() -> Self {
        Self::default()
    }

    fn listen(
        &self,
        ctx: &ExtensionContext,
        event: &'static str,
        apply: impl Fn(&mut Readout, &Value) -> Result<(), core_types::HandlerError> + 'static,
    ) {
        let readout = Rc::clone(&self.readout);
        let panels = Rc::downgrade(ctx.panels());
        let id = ctx.on(event, move |payload| {
            apply(&mut readout.borrow_mut(), payload)?;
            if let Some(panels) = panels.upgrade() {
                panels.state().touch();
            }
            Ok(())
        });
        self.subscriptions.borrow_mut().push((event, id));
    }
}

fn render(readout: &Readout, _ctx: &RenderContext) -> DeclarativeNode {
    DeclarativeNode::new(WidgetKind::View)
        .with_id(STATUS_ID)
        .with_style("flexDirection", "row")
        .with_child(
            DeclarativeNode::text(format!(
                "Line: {} Column: {}",
                readout.line + 1,
                readout.column + 1
            ))
            .with_id("status::cursor")
            .with_style("minWidth", 120),
        )
        .with_child(
            DeclarativeNode::text(readout.language.clone())
                .with_id("status::language")
                .with_style("minWidth", 80),
        )
}

fn apply_language(readout: &mut Readout, payload: &Value) -> Result<(), core_types::HandlerError> {
    readout.language = payload
        .get("language")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Ok(())
}

impl Extension for EditorStatus {
    fn activate(&self, ctx: &ExtensionContext) -> Result<(), ExtensionError> {
        let readout = Rc::clone(&self.readout);
        ctx.register_status(STATUS_ID, move |rc| render(&readout.borrow(), rc));

        self.listen(ctx, CURSOR_EVENT, |readout, payload| {
            let (line, column): (u64, u64) = serde_json::from_value(payload.clone())?;
            readout.line = line;
            readout.column = column;
            Ok(())
        });
        self.listen(ctx, TAB_SELECTED_EVENT, apply_language);
        self.listen(ctx, TAB_CLOSED_EVENT, apply_language);
        Ok(())
    }

    fn deactivate(&self, ctx: &ExtensionContext) -> Result<(), ExtensionError> {
        for (event, id) in self.subscriptions.borrow_mut().drain(..) {
            ctx.off(event, id);
        }
        ctx.unregister_status(STATUS_ID);
        Ok(())
    }
}
