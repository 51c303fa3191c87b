//! Stable identifiers for declarative nodes

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use uuid::Uuid;

/// Identity of a declarative node
///
/// The id is the only key the bridge uses to correlate successive render
/// passes with host-side widgets. Ids are either explicit (chosen by the
/// component author, e.g. `"panel::search::input"`), positional (derived
/// from the parent id and child index), or generated.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Creates an id from an explicit string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates a random id for nodes built outside a rendered tree
    pub fn generate() -> Self {
        Self(format!("node:{}", Uuid::new_v4()))
    }

    /// Derives the positional id of the `index`-th child of `parent`
    ///
    /// Stable across passes as long as the tree shape is stable.
    pub fn child(parent: &NodeId, index: usize, kind: &str) -> Self {
        Self(format!("{}/{}:{}", parent.0, index, kind))
    }

    /// Returns the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
