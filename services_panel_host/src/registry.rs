use crate::state::RenderContext;
use std::cell::RefCell;
use std::rc::Rc;
use view_types::DeclarativeNode;

/// A UI contribution: renders a node for the current context
pub type Component = Rc<dyn Fn(&RenderContext) -> DeclarativeNode>;

/// Id-keyed components kept in first-registration order
///
/// Re-registering an id replaces the component in place.
#[derive(Default)]
pub struct ComponentRegistry {
    entries: RefCell<Vec<(String, Component)>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces; returns whether `id` was new
    pub fn insert(&self, id: &str, component: Component) -> bool {
        let previous = {
            let mut entries = self.entries.borrow_mut();
            match entries.iter_mut().find(|(existing, _)| existing == id) {
                Some(slot) => Some(std::mem::replace(&mut slot.1, component)),
                None => {
                    entries.push((id.to_string(), component));
                    None
                }
            }
        };
        previous.is_none()
    }

    pub fn remove(&self, id: &str) -> bool {
        let removed = {
            let mut entries = self.entries.borrow_mut();
            entries
                .iter()
                .position(|(existing, _)| existing == id)
                .map(|index| entries.remove(index))
        };
        removed.is_some()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.borrow().iter().any(|(existing, _)| existing == id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries.borrow().iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Copy of the entries, safe to render while components re-register
    pub fn snapshot(&self) -> Vec<(String, Component)> {
        self.entries.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(text: &'static str) -> Component {
        Rc::new(move |_| DeclarativeNode::text(text))
    }

    #[test]
    fn test_overwrite_keeps_position() {
        let registry = ComponentRegistry::new();
        assert!(registry.insert("a", label("a1")));
        assert!(registry.insert("b", label("b")));
        assert!(!registry.insert("a", label("a2")));

        assert_eq!(registry.ids(), vec!["a", "b"]);
        let (_, first) = &registry.snapshot()[0];
        let rendered = first(&RenderContext::default());
        assert_eq!(rendered.prop_str("text"), Some("a2"));
    }

    #[test]
    fn test_remove() {
        let registry = ComponentRegistry::new();
        registry.insert("a", label("a"));
        assert!(registry.remove("a"));
        assert!(!registry.remove("a"));
        assert!(registry.is_empty());
    }
}
