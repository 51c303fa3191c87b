//! # Lifecycle
//!
//! Cancellation and deferred-work primitives for the Trellis runtime.
//!
//! ## Philosophy
//!
//! - **Explicit over implicit**: Deferred work is a value you can cancel, not a fire-and-forget callback
//! - **Testability first**: Time comes from a [`core_types::Clock`], so tests step it by hand
//! - **No async runtime required**: Everything runs cooperatively on the caller's thread
//!
//! ## Core Concepts
//!
//! - [`CancellationSource`] / [`CancellationToken`]: Shared cancel flag with a reason
//! - [`Deadline`]: Absolute instant after which work is stale
//! - [`TaskScheduler`]: Queue of deferred closures run by explicit `run_due` passes
//! - [`Debouncer`]: Keeps only the latest of a burst of deferred closures
//! - [`run_guarded`]: Runs a user closure and turns a panic into a value

mod cancel;
mod debounce;
mod guard;
mod scheduler;

pub use cancel::{CancellationReason, CancellationSource, CancellationToken, Deadline, LifecycleError};
pub use debounce::Debouncer;
pub use guard::{run_guarded, Panicked};
pub use scheduler::{TaskHandle, TaskScheduler};
