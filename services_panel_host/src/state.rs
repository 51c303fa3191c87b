use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};

/// Shell UI state that drives re-rendering
///
/// `version` moves whenever something the composed tree depends on
/// changes, including registry mutations that are not part of the state
/// itself ("touch").
#[derive(Debug, Default)]
pub struct UiState {
    version: Cell<u64>,
    current_panel: RefCell<String>,
}

impl UiState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self) -> u64 {
        self.version.get()
    }

    /// Forces a version bump
    pub fn touch(&self) {
        self.version.set(self.version.get().wrapping_add(1));
    }

    /// Current panel id, `""` when every panel is hidden
    pub fn current_panel(&self) -> String {
        self.current_panel.borrow().clone()
    }

    /// Returns whether the current panel changed
    pub fn set_current_panel(&self, id: &str) -> bool {
        if *self.current_panel.borrow() == id {
            return false;
        }
        *self.current_panel.borrow_mut() = id.to_string();
        self.touch();
        true
    }

    pub fn snapshot(&self) -> UiSnapshot {
        UiSnapshot {
            version: self.version(),
            current_panel: self.current_panel(),
        }
    }
}

/// Serializable copy of [`UiState`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiSnapshot {
    pub version: u64,
    pub current_panel: String,
}

/// What a component sees while rendering
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderContext {
    pub current_panel: String,
    pub version: u64,
}

impl RenderContext {
    /// Whether `panel` is the one on screen
    pub fn is_current(&self, panel: &str) -> bool {
        !self.current_panel.is_empty() && self.current_panel == panel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_current_panel_touches_only_on_change() {
        let state = UiState::new();
        assert_eq!(state.current_panel(), "");

        assert!(state.set_current_panel("panel::search"));
        assert_eq!(state.version(), 1);
        assert!(!state.set_current_panel("panel::search"));
        assert_eq!(state.version(), 1);

        state.touch();
        assert_eq!(
            state.snapshot(),
            UiSnapshot {
                version: 2,
                current_panel: "panel::search".to_string()
            }
        );
    }

    #[test]
    fn test_render_context_hidden_matches_nothing() {
        let ctx = RenderContext::default();
        assert!(!ctx.is_current(""));
        assert!(!ctx.is_current("panel::search"));
    }
}
