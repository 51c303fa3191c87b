//! Extensions that ship with the shell

mod editor_status;
mod hello_world;
mod panels;

pub use editor_status::{EditorStatus, CURSOR_EVENT, TAB_CLOSED_EVENT, TAB_SELECTED_EVENT};
pub use hello_world::HelloWorld;
pub use panels::{Panels, KEY_PRESSED_EVENT};

use services_extension_host::ExtensionRegistry;
use std::rc::Rc;

/// Shell wiring: esc hides panels, `show_panel` command
pub const PANELS: &str = "panels";
/// Cursor and language readout in the status bar
pub const EDITOR_STATUS: &str = "editor-status";
/// Demo extension
pub const HELLO_WORLD: &str = "hello-world";

/// Registers every built-in extension; none is activated
pub fn register_builtins(registry: &ExtensionRegistry) {
    registry.register_extension(PANELS, Rc::new(Panels::new()));
    registry.register_extension(EDITOR_STATUS, Rc::new(EditorStatus::new()));
    registry.register_extension(HELLO_WORLD, Rc::new(HelloWorld::new()));
}
