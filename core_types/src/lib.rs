//! # Core Types
//!
//! This crate defines the fundamental types shared by every Trellis service.
//!
//! ## Philosophy
//!
//! - **Identity is explicit**: Widgets are tracked by a stable [`NodeId`], never by position in a host tree.
//! - **Time is injected**: Services read time through a [`Clock`], so tests control it exactly.
//! - **No ambient state**: Nothing here is global; callers own and pass every value.
//!
//! ## Key Types
//!
//! - [`NodeId`]: Stable identity of a declarative node across render passes
//! - [`Instant`] / [`Duration`]: Monotonic time values
//! - [`Clock`]: Source of the current instant ([`SystemClock`], [`ManualClock`])
//! - [`HandlerError`]: Failure reported by extension-supplied callbacks

pub mod error;
pub mod ids;
pub mod time;

pub use error::{HandlerError, HandlerResult};
pub use ids::NodeId;
pub use time::{Clock, Duration, Instant, ManualClock, SystemClock};
