use crate::slots::HandleSlots;
use crate::transport::{HostError, HostTransport};
use core_types::NodeId;
use lifecycle::{run_guarded, CancellationReason, TaskHandle, TaskScheduler};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::{Rc, Weak};
use tracing::{debug, warn};
use view_types::{
    DeclarativeNode, EventHandler, HandlerKind, HostNode, Placement, UiEvent, WidgetCommand,
    WidgetHandle, WidgetKind,
};

/// Counters for host traffic and contained failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub mounts: u64,
    pub updates: u64,
    pub unmounts: u64,
    pub handle_requests: u64,
    pub invokes: u64,
    pub handles_resolved: u64,
    pub host_failures: u64,
    pub handler_failures: u64,
}

/// What one [`UiBridge::render`] pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderReport {
    /// Ids mounted this pass, parents before children
    pub mounted: Vec<NodeId>,
    /// Nodes updated this pass
    pub updated: usize,
    /// Ids unmounted this pass, children before parents
    pub unmounted: Vec<NodeId>,
    /// Nodes skipped because their id was already used earlier in the pass
    pub duplicates: usize,
}

#[derive(Debug, Clone)]
struct MountRecord {
    kind: WidgetKind,
    placement: Placement,
    depth: usize,
}

#[derive(Default)]
struct BridgeState {
    mounted: HashMap<NodeId, MountRecord>,
    handles: HashMap<NodeId, WidgetHandle>,
    handlers: HashMap<NodeId, BTreeMap<HandlerKind, EventHandler>>,
    pending: HashMap<NodeId, TaskHandle>,
    /// Mounted ids whose update path already asked the host for a handle
    requested: HashSet<NodeId>,
    stats: BridgeStats,
}

impl BridgeState {
    fn depth_under(&self, placement: &Placement) -> usize {
        placement
            .parent
            .as_ref()
            .and_then(|p| self.mounted.get(p))
            .map(|r| r.depth + 1)
            .unwrap_or(0)
    }
}

/// Keeps declarative nodes and host widgets in step.
///
/// The bridge is a transport plus an identity tracker: it never compares
/// attributes, it only knows which ids are mounted, which have a resolved
/// handle, and which closures to call when the host reports interaction.
/// Every host failure is logged and absorbed here.
pub struct UiBridge {
    host: RefCell<Box<dyn HostTransport>>,
    slots: HandleSlots,
    scheduler: TaskScheduler,
    state: Rc<RefCell<BridgeState>>,
}

impl UiBridge {
    pub fn new(host: Box<dyn HostTransport>, slots: HandleSlots, scheduler: TaskScheduler) -> Self {
        Self {
            host: RefCell::new(host),
            slots,
            scheduler,
            state: Rc::new(RefCell::new(BridgeState::default())),
        }
    }

    /// The side channel the host publishes handles into
    pub fn slots(&self) -> &HandleSlots {
        &self.slots
    }

    pub fn stats(&self) -> BridgeStats {
        self.state.borrow().stats
    }

    pub fn is_mounted(&self, id: &NodeId) -> bool {
        self.state.borrow().mounted.contains_key(id)
    }

    /// Mounted ids, sorted
    pub fn mounted_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.state.borrow().mounted.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Cached handle for `id`, if one has been resolved
    pub fn handle(&self, id: &NodeId) -> Option<WidgetHandle> {
        self.state.borrow().handles.get(id).copied()
    }

    /// Handle requests still waiting for their resolution pass
    pub fn pending_requests(&self) -> usize {
        self.state.borrow().pending.len()
    }

    /// First instantiation of `node` under `id`
    ///
    /// Returns whether the host accepted the mount. Mounting an id that is
    /// already mounted is ignored.
    pub fn mount(&self, id: &NodeId, node: &DeclarativeNode, placement: Placement) -> bool {
        if self.is_mounted(id) {
            warn!(node = %id, "mount of an already mounted id ignored");
            return false;
        }
        // A handle left over from an earlier widget with this id is stale.
        self.slots.take(id);

        let host_node = HostNode::from_node(node, id.clone(), Some(&placement));
        if !self.call_host("mount", id, |host| host.mount(&host_node)) {
            return false;
        }

        let mut state = self.state.borrow_mut();
        let depth = state.depth_under(&placement);
        state.mounted.insert(
            id.clone(),
            MountRecord {
                kind: node.kind,
                placement,
                depth,
            },
        );
        state.handlers.insert(id.clone(), node.handlers.clone());
        true
    }

    /// Re-sends `node`; called on every render pass
    ///
    /// Handlers are reinstalled only when the host accepted the update. A
    /// mounted node without a cached handle gets one handle request per
    /// mount; later updates do not ask again even if the host never answers.
    pub fn update(&self, id: &NodeId, node: &DeclarativeNode) -> bool {
        self.update_placed(id, node, None)
    }

    fn update_placed(&self, id: &NodeId, node: &DeclarativeNode, placement: Option<Placement>) -> bool {
        let recorded = {
            let mut state = self.state.borrow_mut();
            match placement {
                Some(placement) if state.mounted.contains_key(id) => {
                    let depth = state.depth_under(&placement);
                    state.mounted.get_mut(id).map(|record| {
                        record.placement = placement;
                        record.depth = depth;
                        record.placement.clone()
                    })
                }
                _ => state.mounted.get(id).map(|r| r.placement.clone()),
            }
        };
        let mounted = recorded.is_some();

        let host_node = HostNode::from_node(node, id.clone(), recorded.as_ref());
        let accepted = self.call_host("update", id, |host| host.update(&host_node));

        if accepted && mounted {
            let previous = self
                .state
                .borrow_mut()
                .handlers
                .insert(id.clone(), node.handlers.clone());
            drop(previous);
        }

        let wants_handle = {
            let state = self.state.borrow();
            mounted
                && !state.handles.contains_key(id)
                && !state.pending.contains_key(id)
                && !state.requested.contains(id)
        };
        if wants_handle && self.request_handle(id) {
            self.state.borrow_mut().requested.insert(id.clone());
        }
        accepted
    }

    /// Destroys the host widget for `id` and forgets everything about it
    ///
    /// Local state is evicted even when the host call fails.
    pub fn unmount(&self, id: &NodeId) -> bool {
        let (record, pending, handlers) = {
            let mut state = self.state.borrow_mut();
            state.handles.remove(id);
            state.requested.remove(id);
            (
                state.mounted.remove(id),
                state.pending.remove(id),
                state.handlers.remove(id),
            )
        };
        if let Some(pending) = pending {
            pending.cancel_with(CancellationReason::TargetUnmounted);
        }
        drop(handlers);
        self.slots.take(id);

        let Some(record) = record else {
            debug!(node = %id, "unmount of unknown id ignored");
            return false;
        };

        let host_node = HostNode {
            id: id.clone(),
            kind: record.kind,
            parent: record.placement.parent,
            order: Some(record.placement.order),
            style: BTreeMap::new(),
            props: BTreeMap::new(),
        };
        self.call_host("unmount", id, |host| host.unmount(&host_node))
    }

    /// Unmounts `id` and every mounted descendant, deepest first
    pub fn unmount_subtree(&self, id: &NodeId) -> Vec<NodeId> {
        let mut doomed: Vec<(usize, NodeId)> = {
            let state = self.state.borrow();
            state
                .mounted
                .iter()
                .filter(|(candidate, _)| *candidate == id || descends_from(&state.mounted, candidate, id))
                .map(|(candidate, record)| (record.depth, candidate.clone()))
                .collect()
        };
        doomed.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

        let mut removed = Vec::with_capacity(doomed.len());
        for (_, node) in doomed {
            self.unmount(&node);
            removed.push(node);
        }
        removed
    }

    /// Asks the host for a handle; false when the host call failed
    fn request_handle(&self, id: &NodeId) -> bool {
        if !self.call_host("requestHandle", id, |host| host.request_handle(id)) {
            return false;
        }
        let state = Rc::downgrade(&self.state);
        let slots = self.slots.clone();
        let target = id.clone();
        let task = self.scheduler.next_tick("resolve-widget-handle", move || {
            resolve_pending(&state, &slots, &target)
        });
        let previous = self.state.borrow_mut().pending.insert(id.clone(), task);
        if let Some(previous) = previous {
            previous.cancel_with(CancellationReason::Superseded);
        }
        true
    }

    /// Delivers the handle for `id` to `callback` on the next pass
    ///
    /// The callback gets `None` when the node is not mounted at that point
    /// or the host has not published a handle yet.
    pub fn resolve_handle(&self, id: &NodeId, callback: impl FnOnce(Option<WidgetHandle>) + 'static) {
        let wants_request = {
            let state = self.state.borrow();
            state.mounted.contains_key(id)
                && !state.handles.contains_key(id)
                && !state.pending.contains_key(id)
        };
        if wants_request {
            self.request_handle(id);
        }

        let state = Rc::downgrade(&self.state);
        let target = id.clone();
        self.scheduler.next_tick("deliver-widget-handle", move || {
            let handle = state.upgrade().and_then(|state| {
                let state = state.borrow();
                if state.mounted.contains_key(&target) {
                    state.handles.get(&target).copied()
                } else {
                    None
                }
            });
            callback(handle);
        });
    }

    /// Runs an imperative command on the resolved widget for `id`
    pub fn invoke(&self, id: &NodeId, command: WidgetCommand) -> bool {
        let Some(handle) = self.handle(id) else {
            debug!(node = %id, ?command, "no handle; widget command dropped");
            return false;
        };
        self.call_host("invoke", id, |host| host.invoke(handle, &command))
    }

    /// Inbound interaction from the host
    ///
    /// Calls the closure installed by the latest accepted update. A node
    /// that bound nothing for `kind` swallows the event. Returns `false`
    /// only when `id` is not mounted.
    pub fn dispatch_event(&self, id: &NodeId, kind: HandlerKind, value: Value) -> bool {
        let handler = {
            let state = self.state.borrow();
            if !state.mounted.contains_key(id) {
                debug!(node = %id, ?kind, "event for unmounted node dropped");
                return false;
            }
            state.handlers.get(id).and_then(|h| h.get(&kind)).cloned()
        };
        let Some(handler) = handler else {
            return true;
        };

        let event = UiEvent {
            node: id.clone(),
            kind,
            value,
        };
        if let Err(panic) = run_guarded(|| handler(&event)) {
            self.state.borrow_mut().stats.handler_failures += 1;
            warn!(node = %id, handler = kind.callback_name(), error = %panic, "interaction handler failed");
        }
        true
    }

    /// Brings the host in line with the tree rooted at `root`
    ///
    /// New ids are mounted with their parent passed explicitly, every node
    /// is updated, and ids missing from this pass are unmounted.
    pub fn render(&self, root: &DeclarativeNode) -> RenderReport {
        let mut report = RenderReport::default();
        let mut seen = HashSet::new();
        self.walk(root, None, 0, &mut seen, &mut report);

        let mut vanished: Vec<(usize, NodeId)> = self
            .state
            .borrow()
            .mounted
            .iter()
            .filter(|(id, _)| !seen.contains(*id))
            .map(|(id, record)| (record.depth, id.clone()))
            .collect();
        vanished.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

        for (_, id) in vanished {
            self.unmount(&id);
            report.unmounted.push(id);
        }
        report
    }

    fn walk(
        &self,
        node: &DeclarativeNode,
        parent: Option<&NodeId>,
        index: usize,
        seen: &mut HashSet<NodeId>,
        report: &mut RenderReport,
    ) {
        let id = node.effective_id(parent, index);
        if !seen.insert(id.clone()) {
            warn!(node = %id, "duplicate id in render pass; subtree skipped");
            report.duplicates += 1;
            return;
        }

        let placement = match parent {
            Some(parent) => Placement::child_of(parent.clone(), index),
            None => Placement::root(),
        };
        if !self.is_mounted(&id) {
            if !self.mount(&id, node, placement.clone()) {
                return;
            }
            report.mounted.push(id.clone());
        }

        self.update_placed(&id, node, Some(placement));
        report.updated += 1;

        for (i, child) in node.children.iter().enumerate() {
            self.walk(child, Some(&id), i, seen, report);
        }
    }

    fn call_host(
        &self,
        op: &'static str,
        id: &NodeId,
        call: impl FnOnce(&mut dyn HostTransport) -> Result<(), HostError>,
    ) -> bool {
        {
            let mut state = self.state.borrow_mut();
            let counter = match op {
                "mount" => &mut state.stats.mounts,
                "update" => &mut state.stats.updates,
                "unmount" => &mut state.stats.unmounts,
                "requestHandle" => &mut state.stats.handle_requests,
                _ => &mut state.stats.invokes,
            };
            *counter += 1;
        }

        let outcome = match self.host.try_borrow_mut() {
            Ok(mut host) => run_guarded(|| call(&mut **host)).unwrap_or_else(|panic| {
                Err(HostError::Rejected {
                    op,
                    id: id.to_string(),
                    reason: panic.to_string(),
                })
            }),
            Err(_) => Err(HostError::Rejected {
                op,
                id: id.to_string(),
                reason: "host re-entered the bridge".to_string(),
            }),
        };

        match outcome {
            Ok(()) => true,
            Err(err) => {
                self.state.borrow_mut().stats.host_failures += 1;
                warn!(op, node = %id, error = %err, "host call failed");
                false
            }
        }
    }
}

fn descends_from(mounted: &HashMap<NodeId, MountRecord>, node: &NodeId, ancestor: &NodeId) -> bool {
    let mut current = mounted.get(node).and_then(|r| r.placement.parent.as_ref());
    let mut hops = 0;
    while let Some(parent) = current {
        if parent == ancestor {
            return true;
        }
        hops += 1;
        if hops > mounted.len() {
            return false;
        }
        current = mounted.get(parent).and_then(|r| r.placement.parent.as_ref());
    }
    false
}

fn resolve_pending(state: &Weak<RefCell<BridgeState>>, slots: &HandleSlots, id: &NodeId) {
    let published = slots.take(id);
    let Some(state) = state.upgrade() else {
        return;
    };
    let mut state = state.borrow_mut();
    state.pending.remove(id);

    if !state.mounted.contains_key(id) {
        debug!(node = %id, "handle resolved after unmount; discarded");
        return;
    }
    match published {
        Some(handle) => {
            debug!(node = %id, %handle, "widget handle resolved");
            state.handles.insert(id.clone(), handle);
            state.stats.handles_resolved += 1;
        }
        None => debug!(node = %id, "host has not published a handle yet"),
    }
}
