//! # UI Bridge
//!
//! Turns declarative node trees into host widget traffic.
//!
//! ## Philosophy
//!
//! - **Identity, not diffing**: every node is re-sent on every pass; the
//!   bridge only tracks which ids are mounted
//! - **Explicit structure**: a mount carries its parent and position
//! - **Late handles**: a widget handle arrives through a side channel one
//!   pass after it was requested, and is dropped if the node went away
//! - **Contained failures**: host errors and handler panics are logged,
//!   never propagated to the caller

mod bridge;
mod slots;
mod transport;

pub use bridge::{BridgeStats, RenderReport, UiBridge};
pub use slots::{handle_slot_name, HandleSlots};
pub use transport::{HostError, HostMessage, HostTransport, JsonLineTransport, RecordingHost};
