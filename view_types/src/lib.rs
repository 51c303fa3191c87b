//! # View Types
//!
//! Declarative node descriptions and their flat, host-facing serialization.
//!
//! ## Philosophy
//!
//! - **Identity by id**: A node is the same widget across passes iff its [`NodeId`] is the same
//! - **Closures stay local**: Interaction handlers never cross the host boundary
//! - **Flat on the wire**: The host sees one [`HostNode`] per call, never a subtree
//!
//! ## Non-Goals
//!
//! This is NOT:
//! - A virtual-DOM diff engine
//! - A style system (styles are opaque key/value pairs)
//! - A layout engine

use core_types::NodeId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Host widget kinds the bridge knows how to request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WidgetKind {
    View,
    Text,
    Image,
    TextInput,
    Button,
    Switch,
    ScrollView,
    SplitterView,
    StackedView,
    FlatList,
    SectionList,
    Window,
    StatusBar,
}

impl WidgetKind {
    /// Name used in positional ids and on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            WidgetKind::View => "View",
            WidgetKind::Text => "Text",
            WidgetKind::Image => "Image",
            WidgetKind::TextInput => "TextInput",
            WidgetKind::Button => "Button",
            WidgetKind::Switch => "Switch",
            WidgetKind::ScrollView => "ScrollView",
            WidgetKind::SplitterView => "SplitterView",
            WidgetKind::StackedView => "StackedView",
            WidgetKind::FlatList => "FlatList",
            WidgetKind::SectionList => "SectionList",
            WidgetKind::Window => "Window",
            WidgetKind::StatusBar => "StatusBar",
        }
    }
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Interaction callbacks a node may bind
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HandlerKind {
    ChangeText,
    Click,
    Press,
    Release,
    SubmitEditing,
}

impl HandlerKind {
    /// Every kind, in the order the bridge installs them
    pub const ALL: [HandlerKind; 5] = [
        HandlerKind::ChangeText,
        HandlerKind::Click,
        HandlerKind::Press,
        HandlerKind::Release,
        HandlerKind::SubmitEditing,
    ];

    /// Host-side callback name
    pub fn callback_name(&self) -> &'static str {
        match self {
            HandlerKind::ChangeText => "onChangeText",
            HandlerKind::Click => "onClick",
            HandlerKind::Press => "onPress",
            HandlerKind::Release => "onRelease",
            HandlerKind::SubmitEditing => "onSubmitEditing",
        }
    }
}

/// An interaction reported by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiEvent {
    /// Node the interaction happened on
    pub node: NodeId,
    /// Which callback fired
    pub kind: HandlerKind,
    /// Callback argument (new text for `ChangeText`, otherwise usually null)
    pub value: Value,
}

/// Closure bound to an interaction callback
pub type EventHandler = Rc<dyn Fn(&UiEvent)>;

/// One node of a declarative render
///
/// Produced fresh by components on every pass. Only `id` carries identity;
/// everything else is re-sent to the host on each update.
#[derive(Clone)]
pub struct DeclarativeNode {
    pub id: Option<NodeId>,
    pub kind: WidgetKind,
    pub style: BTreeMap<String, Value>,
    pub props: BTreeMap<String, Value>,
    pub handlers: BTreeMap<HandlerKind, EventHandler>,
    pub children: Vec<DeclarativeNode>,
    /// Component-local payload (list rows, etc.); never sent to the host
    pub data: Option<Value>,
}

impl DeclarativeNode {
    pub fn new(kind: WidgetKind) -> Self {
        Self {
            id: None,
            kind,
            style: BTreeMap::new(),
            props: BTreeMap::new(),
            handlers: BTreeMap::new(),
            children: Vec::new(),
            data: None,
        }
    }

    /// A `Text` node showing `text`
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(WidgetKind::Text).with_prop("text", Value::String(text.into()))
    }

    pub fn with_id(mut self, id: impl Into<NodeId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_style(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.style.insert(key.into(), value.into());
        self
    }

    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    /// Binds an interaction handler
    pub fn on(mut self, kind: HandlerKind, handler: impl Fn(&UiEvent) + 'static) -> Self {
        self.handlers.insert(kind, Rc::new(handler));
        self
    }

    pub fn with_child(mut self, child: DeclarativeNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = DeclarativeNode>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// The id this node has when rendered as child `index` of `parent`
    ///
    /// Explicit ids win; otherwise the id is positional.
    pub fn effective_id(&self, parent: Option<&NodeId>, index: usize) -> NodeId {
        match (&self.id, parent) {
            (Some(id), _) => id.clone(),
            (None, Some(parent)) => NodeId::child(parent, index, self.kind.as_str()),
            (None, None) => NodeId::new(format!("{}:{}", self.kind.as_str(), index)),
        }
    }

    /// Looks up a direct or nested child by explicit id
    pub fn find(&self, id: &str) -> Option<&DeclarativeNode> {
        if self.id.as_ref().map(NodeId::as_str) == Some(id) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }

    /// String value of a prop, if present and a string
    pub fn prop_str(&self, key: &str) -> Option<&str> {
        self.props.get(key).and_then(Value::as_str)
    }
}

impl fmt::Debug for DeclarativeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeclarativeNode")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("style", &self.style)
            .field("props", &self.props)
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .field("children", &self.children)
            .field("data", &self.data)
            .finish()
    }
}

/// Where a node sits in the host tree
///
/// Computed by the walker and passed with the mount call, so the host never
/// has to discover the parent by scanning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub parent: Option<NodeId>,
    pub order: usize,
}

impl Placement {
    /// Placement of a top-level node
    pub fn root() -> Self {
        Self::default()
    }

    pub fn child_of(parent: NodeId, order: usize) -> Self {
        Self {
            parent: Some(parent),
            order,
        }
    }
}

/// Props that never reach the host
const STRIPPED_PROPS: [&str; 7] = ["children", "data", "id", "type", "parent", "order", "style"];

/// The flat attribute map sent with every host call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostNode {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: WidgetKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<usize>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub style: BTreeMap<String, Value>,
    #[serde(flatten)]
    pub props: BTreeMap<String, Value>,
}

impl HostNode {
    /// Serializable form of `node` under `id`
    ///
    /// Drops children, data, handler closures and any prop that would
    /// shadow a protocol field.
    pub fn from_node(node: &DeclarativeNode, id: NodeId, placement: Option<&Placement>) -> Self {
        let props = node
            .props
            .iter()
            .filter(|(k, _)| !STRIPPED_PROPS.contains(&k.as_str()))
            .filter(|(k, _)| !HandlerKind::ALL.iter().any(|h| h.callback_name() == k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Self {
            id,
            kind: node.kind,
            parent: placement.and_then(|p| p.parent.clone()),
            order: placement.map(|p| p.order),
            style: node.style.clone(),
            props,
        }
    }
}

/// Opaque reference to a live host widget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WidgetHandle(pub u64);

impl fmt::Display for WidgetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "widget#{}", self.0)
    }
}

/// Imperative operations on a resolved widget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", content = "arg", rename_all = "camelCase")]
pub enum WidgetCommand {
    Focus,
    Blur,
    SelectAll,
    SetText(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;

    #[test]
    fn test_builder_and_find() {
        let tree = DeclarativeNode::new(WidgetKind::View)
            .with_id("panel::search")
            .with_child(DeclarativeNode::new(WidgetKind::TextInput).with_id("panel::search::input"))
            .with_child(DeclarativeNode::text("hint"));

        assert_eq!(tree.children.len(), 2);
        assert!(tree.find("panel::search::input").is_some());
        assert!(tree.find("missing").is_none());
        assert_eq!(tree.children[1].prop_str("text"), Some("hint"));
    }

    #[test]
    fn test_effective_id() {
        let parent = NodeId::new("root");
        let explicit = DeclarativeNode::new(WidgetKind::Button).with_id("ok");
        let anonymous = DeclarativeNode::new(WidgetKind::Button);

        assert_eq!(explicit.effective_id(Some(&parent), 3).as_str(), "ok");
        assert_eq!(anonymous.effective_id(Some(&parent), 3).as_str(), "root/3:Button");
        assert_eq!(anonymous.effective_id(None, 0).as_str(), "Button:0");
    }

    #[test]
    fn test_host_node_strips_non_transportable_fields() {
        let node = DeclarativeNode::new(WidgetKind::TextInput)
            .with_id("in")
            .with_style("flex", 1)
            .with_prop("placeholder", "Search")
            .with_prop("data", json!([1, 2]))
            .with_prop("children", json!([]))
            .with_prop("type", "Bogus")
            .with_data(json!({"rows": 3}))
            .with_child(DeclarativeNode::text("x"))
            .on(HandlerKind::ChangeText, |_| {});

        let host = HostNode::from_node(&node, NodeId::new("in"), Some(&Placement::child_of("p".into(), 2)));
        let value = serde_json::to_value(&host).unwrap();

        assert_eq!(
            value,
            json!({
                "id": "in",
                "type": "TextInput",
                "parent": "p",
                "order": 2,
                "style": {"flex": 1},
                "placeholder": "Search",
            })
        );
    }

    #[test]
    fn test_host_node_without_placement() {
        let node = DeclarativeNode::text("hello");
        let host = HostNode::from_node(&node, NodeId::new("t"), None);
        let value = serde_json::to_value(&host).unwrap();
        assert_eq!(value, json!({"id": "t", "type": "Text", "text": "hello"}));

        let back: HostNode = serde_json::from_value(value).unwrap();
        assert_eq!(back, host);
    }

    #[test]
    fn test_handlers_are_shared_on_clone() {
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let node = DeclarativeNode::new(WidgetKind::Button).on(HandlerKind::Click, move |_| h.set(h.get() + 1));
        let copy = node.clone();

        let event = UiEvent {
            node: NodeId::new("b"),
            kind: HandlerKind::Click,
            value: Value::Null,
        };
        (node.handlers[&HandlerKind::Click])(&event);
        (copy.handlers[&HandlerKind::Click])(&event);
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn test_widget_command_wire_format() {
        assert_eq!(serde_json::to_value(WidgetCommand::Focus).unwrap(), json!({"command": "focus"}));
        assert_eq!(
            serde_json::to_value(WidgetCommand::SetText("x".into())).unwrap(),
            json!({"command": "setText", "arg": "x"})
        );
    }

    #[test]
    fn test_debug_omits_closures() {
        let node = DeclarativeNode::new(WidgetKind::Button).on(HandlerKind::Press, |_| {});
        let debug = format!("{:?}", node);
        assert!(debug.contains("Press"));
        assert!(debug.contains("Button"));
    }
}
