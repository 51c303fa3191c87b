use core_types::Duration;
use lifecycle::Debouncer;
use serde_json::Value;
use services_extension_host::{CommandContribution, Extension, ExtensionContext, ExtensionError};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tracing::{debug, info, warn};
use view_types::{DeclarativeNode, HandlerKind, UiEvent, WidgetKind};

const SAY_HELLO: &str = "hello_world.say_hello";
const PANEL_ID: &str = "panel::hello-world";

/// Quiet period before typed text replaces the greeting
pub const NAME_DEBOUNCE: Duration = Duration::from_millis(300);

/// Demo: one command, one chord, one panel
#[derive(Default)]
pub struct HelloWorld {
    greetings: Rc<Cell<u32>>,
    name: Rc<RefCell<String>>,
    debouncer: RefCell<Option<Rc<Debouncer>>>,
}

impl HelloWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Times `hello_world.say_hello` has run
    pub fn greetings(&self) -> u32 {
        self.greetings.get()
    }
}

fn greeting(name: &str) -> String {
    if name.is_empty() {
        "Hello World".to_string()
    } else {
        format!("Hello, {}", name)
    }
}

impl Extension for HelloWorld {
    fn commands(&self) -> Vec<CommandContribution> {
        let greetings = Rc::clone(&self.greetings);
        let name = Rc::clone(&self.name);
        vec![CommandContribution::new(SAY_HELLO, move |_| {
            greetings.set(greetings.get() + 1);
            info!(count = greetings.get(), "{}!", greeting(&name.borrow()));
            Ok(())
        })
        .with_keys("ctrl+alt+h")]
    }

    fn activate(&self, ctx: &ExtensionContext) -> Result<(), ExtensionError> {
        let debouncer = Rc::new(ctx.debouncer(NAME_DEBOUNCE, "hello-world-name"));
        let pending: Weak<Debouncer> = Rc::downgrade(&debouncer);
        *self.debouncer.borrow_mut() = Some(debouncer);

        let commands = Rc::downgrade(ctx.commands());
        let panels = Rc::downgrade(ctx.panels());
        let name = Rc::clone(&self.name);
        ctx.register_panel(PANEL_ID, move |_| {
            let commands = commands.clone();
            let on_change = {
                let pending = pending.clone();
                let panels = panels.clone();
                let name = Rc::clone(&name);
                move |event: &UiEvent| {
                    let Some(debouncer) = pending.upgrade() else {
                        return;
                    };
                    let typed = event.value.as_str().unwrap_or_default().trim().to_string();
                    let panels = panels.clone();
                    let name = Rc::clone(&name);
                    debouncer.call(move || {
                        debug!(name = %typed, "greeting name settled");
                        *name.borrow_mut() = typed;
                        if let Some(panels) = panels.upgrade() {
                            panels.state().touch();
                        }
                    });
                }
            };
            DeclarativeNode::new(WidgetKind::View)
                .with_id(PANEL_ID)
                .with_child(DeclarativeNode::text(greeting(&name.borrow())).with_id("panel::hello-world::text"))
                .with_child(
                    DeclarativeNode::new(WidgetKind::TextInput)
                        .with_id("panel::hello-world::input")
                        .with_prop("placeholder", "Your name")
                        .on(HandlerKind::ChangeText, on_change),
                )
                .with_child(
                    DeclarativeNode::new(WidgetKind::Button)
                        .with_id("panel::hello-world::button")
                        .with_prop("text", "Click Me")
                        .on(HandlerKind::Click, move |_| {
                            let Some(commands) = commands.upgrade() else {
                                return;
                            };
                            if let Err(err) = commands.execute_command(SAY_HELLO, &Value::Null) {
                                warn!(error = %err, "hello button failed");
                            }
                        }),
                )
        });
        Ok(())
    }

    fn deactivate(&self, ctx: &ExtensionContext) -> Result<(), ExtensionError> {
        // Dropping the debouncer cancels a pending name change.
        self.debouncer.borrow_mut().take();
        ctx.unregister_panel(PANEL_ID);
        Ok(())
    }
}
