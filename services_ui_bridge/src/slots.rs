//! Handle side channel
//!
//! The host answers a handle request by publishing the handle under a
//! name derived from the node id. The bridge picks it up once; picking it
//! up clears the slot.

use core_types::NodeId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::debug;
use view_types::WidgetHandle;

/// Slot name for `id`: `"$widgets_"` followed by the id with `:` replaced by `_`
///
/// Not injective: `a:b` and `a_b` share a slot.
pub fn handle_slot_name(id: &NodeId) -> String {
    format!("$widgets_{}", id.as_str().replace(':', "_"))
}

/// Shared slot namespace written by the host and drained by the bridge
#[derive(Debug, Clone, Default)]
pub struct HandleSlots {
    slots: Rc<RefCell<HashMap<String, WidgetHandle>>>,
}

impl HandleSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host side: exposes `handle` for `id`, replacing any unclaimed one
    pub fn publish(&self, id: &NodeId, handle: WidgetHandle) {
        let name = handle_slot_name(id);
        let unclaimed = self.slots.borrow_mut().insert(name.clone(), handle);
        if let Some(previous) = unclaimed {
            debug!(slot = %name, node = %id, %previous, %handle, "unclaimed handle overwritten");
        }
    }

    /// Bridge side: claims and clears the handle for `id`
    pub fn take(&self, id: &NodeId) -> Option<WidgetHandle> {
        self.slots.borrow_mut().remove(&handle_slot_name(id))
    }

    /// Looks at a slot without claiming it
    pub fn peek(&self, id: &NodeId) -> Option<WidgetHandle> {
        self.slots.borrow().get(&handle_slot_name(id)).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.borrow().is_empty()
    }
}
