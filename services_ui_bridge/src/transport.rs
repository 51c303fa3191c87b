//! Host transport abstraction.

use crate::slots::HandleSlots;
use core_types::NodeId;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::io::Write;
use std::rc::Rc;
use thiserror::Error;
use view_types::{HostNode, WidgetCommand, WidgetHandle};

/// Errors reported by a host transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("host rejected {op} for {id}: {reason}")]
    Rejected { op: &'static str, id: String, reason: String },

    #[error("encode error: {0}")]
    Encode(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Outbound protocol to the native widget host.
///
/// Implementations must not call back into the bridge synchronously;
/// handles come back through [`HandleSlots`].
pub trait HostTransport {
    fn mount(&mut self, node: &HostNode) -> Result<(), HostError>;
    fn update(&mut self, node: &HostNode) -> Result<(), HostError>;
    fn unmount(&mut self, node: &HostNode) -> Result<(), HostError>;
    /// Asks the host to publish a handle for `id` when it is ready.
    fn request_handle(&mut self, id: &NodeId) -> Result<(), HostError>;
    fn invoke(&mut self, handle: WidgetHandle, command: &WidgetCommand) -> Result<(), HostError>;
}

/// One outbound host call, as written on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum HostMessage {
    Mount { node: HostNode },
    Update { node: HostNode },
    Unmount { node: HostNode },
    RequestHandle { id: NodeId },
    Invoke { handle: WidgetHandle, command: WidgetCommand },
}

impl HostMessage {
    /// Wire name of the operation
    pub fn op(&self) -> &'static str {
        match self {
            HostMessage::Mount { .. } => "mount",
            HostMessage::Update { .. } => "update",
            HostMessage::Unmount { .. } => "unmount",
            HostMessage::RequestHandle { .. } => "requestHandle",
            HostMessage::Invoke { .. } => "invoke",
        }
    }

    /// Node id the message targets, if any
    pub fn target(&self) -> Option<&NodeId> {
        match self {
            HostMessage::Mount { node }
            | HostMessage::Update { node }
            | HostMessage::Unmount { node } => Some(&node.id),
            HostMessage::RequestHandle { id } => Some(id),
            HostMessage::Invoke { .. } => None,
        }
    }
}

/// JSON-line transport for out-of-process hosts.
pub struct JsonLineTransport<W: Write> {
    writer: W,
}

impl<W: Write> JsonLineTransport<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn send(&mut self, message: HostMessage) -> Result<(), HostError> {
        serde_json::to_writer(&mut self.writer, &message)
            .map_err(|err| HostError::Encode(err.to_string()))?;
        self.writer
            .write_all(b"\n")
            .and_then(|_| self.writer.flush())
            .map_err(|err| HostError::Io(err.to_string()))
    }
}

impl<W: Write> HostTransport for JsonLineTransport<W> {
    fn mount(&mut self, node: &HostNode) -> Result<(), HostError> {
        self.send(HostMessage::Mount { node: node.clone() })
    }

    fn update(&mut self, node: &HostNode) -> Result<(), HostError> {
        self.send(HostMessage::Update { node: node.clone() })
    }

    fn unmount(&mut self, node: &HostNode) -> Result<(), HostError> {
        self.send(HostMessage::Unmount { node: node.clone() })
    }

    fn request_handle(&mut self, id: &NodeId) -> Result<(), HostError> {
        self.send(HostMessage::RequestHandle { id: id.clone() })
    }

    fn invoke(&mut self, handle: WidgetHandle, command: &WidgetCommand) -> Result<(), HostError> {
        self.send(HostMessage::Invoke {
            handle,
            command: command.clone(),
        })
    }
}

#[derive(Default)]
struct Recording {
    calls: Vec<HostMessage>,
    live: BTreeSet<NodeId>,
    failing: BTreeSet<&'static str>,
    publisher: Option<HandleSlots>,
    next_handle: u64,
}

/// In-memory host for tests and demos.
///
/// Records every call, tracks which widgets are alive host-side and can
/// be told to fail chosen operations. Clones share one recording. With a
/// publisher attached it answers `request_handle` by publishing a fresh
/// handle straight into the slots.
#[derive(Clone, Default)]
pub struct RecordingHost {
    inner: Rc<RefCell<Recording>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes handles into `slots` when asked for one
    pub fn with_handle_publisher(self, slots: HandleSlots) -> Self {
        self.inner.borrow_mut().publisher = Some(slots);
        self
    }

    /// Makes every call of `op` (e.g. `"update"`) fail until cleared
    pub fn fail(&self, op: &'static str) {
        self.inner.borrow_mut().failing.insert(op);
    }

    pub fn recover(&self, op: &'static str) {
        self.inner.borrow_mut().failing.remove(op);
    }

    pub fn calls(&self) -> Vec<HostMessage> {
        self.inner.borrow().calls.clone()
    }

    /// `(op, target)` pairs, handy for asserting call order
    pub fn trace(&self) -> Vec<(String, String)> {
        self.inner
            .borrow()
            .calls
            .iter()
            .map(|m| {
                let target = m.target().map(ToString::to_string).unwrap_or_default();
                (m.op().to_string(), target)
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.inner.borrow_mut().calls.clear();
    }

    /// Widgets the host currently considers alive
    pub fn live(&self) -> BTreeSet<NodeId> {
        self.inner.borrow().live.clone()
    }

    fn record(&self, message: HostMessage) -> Result<(), HostError> {
        let mut inner = self.inner.borrow_mut();
        let op = message.op();
        let target = message.target().cloned();
        inner.calls.push(message);

        if inner.failing.contains(op) {
            return Err(HostError::Rejected {
                op,
                id: target.map(|t| t.to_string()).unwrap_or_default(),
                reason: "injected failure".to_string(),
            });
        }

        match (op, target) {
            ("mount", Some(id)) => {
                inner.live.insert(id);
            }
            ("unmount", Some(id)) => {
                inner.live.remove(&id);
            }
            ("requestHandle", Some(id)) if inner.live.contains(&id) => {
                inner.next_handle += 1;
                let handle = WidgetHandle(inner.next_handle);
                if let Some(slots) = &inner.publisher {
                    slots.publish(&id, handle);
                }
            }
            _ => {}
        }
        Ok(())
    }
}

impl HostTransport for RecordingHost {
    fn mount(&mut self, node: &HostNode) -> Result<(), HostError> {
        self.record(HostMessage::Mount { node: node.clone() })
    }

    fn update(&mut self, node: &HostNode) -> Result<(), HostError> {
        self.record(HostMessage::Update { node: node.clone() })
    }

    fn unmount(&mut self, node: &HostNode) -> Result<(), HostError> {
        self.record(HostMessage::Unmount { node: node.clone() })
    }

    fn request_handle(&mut self, id: &NodeId) -> Result<(), HostError> {
        self.record(HostMessage::RequestHandle { id: id.clone() })
    }

    fn invoke(&mut self, handle: WidgetHandle, command: &WidgetCommand) -> Result<(), HostError> {
        self.record(HostMessage::Invoke {
            handle,
            command: command.clone(),
        })
    }
}
