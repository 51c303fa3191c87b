//! # Extension Host
//!
//! Loads extensions and runs their activate/deactivate lifecycle.
//!
//! ## Philosophy
//!
//! - **One surface**: Extensions only see an [`ExtensionContext`]
//! - **Replace cleanly**: Registering a name again deactivates the old module first
//! - **Activate once**: Repeated or re-entrant activation is a no-op
//!
//! An extension's `deactivate` is expected to undo whatever its `activate`
//! registered. That is a convention; nothing here checks it. Commands an
//! extension contributes through [`Extension::commands`] are registered and
//! withdrawn by the registry itself.

mod context;
mod registry;

pub use context::ExtensionContext;
pub use registry::{ExtensionRegistry, ExtensionState};

use core_types::{HandlerError, HandlerResult};
use serde_json::Value;
use services_command_registry::{CommandAction, CommandError};
use services_keybinding::KeybindingError;
use std::rc::Rc;
use thiserror::Error;

/// Extension lifecycle failures
#[derive(Debug, Error)]
pub enum ExtensionError {
    #[error("unknown extension: {0}")]
    Unknown(String),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Keybinding(#[from] KeybindingError),

    #[error(transparent)]
    Handler(#[from] HandlerError),

    #[error("extension panicked during {phase}: {message}")]
    Panicked { phase: &'static str, message: String },
}

/// A command an extension exports for the registry to register on activation
#[derive(Clone)]
pub struct CommandContribution {
    pub name: String,
    pub action: CommandAction,
    pub keys: Option<String>,
}

impl CommandContribution {
    pub fn new(name: impl Into<String>, action: impl Fn(&Value) -> HandlerResult + 'static) -> Self {
        Self {
            name: name.into(),
            action: Rc::new(action),
            keys: None,
        }
    }

    /// Default chord for the command
    pub fn with_keys(mut self, keys: impl Into<String>) -> Self {
        self.keys = Some(keys.into());
        self
    }
}

impl std::fmt::Debug for CommandContribution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandContribution")
            .field("name", &self.name)
            .field("keys", &self.keys)
            .finish()
    }
}

/// A self-contained module contributing commands and UI
pub trait Extension {
    fn activate(&self, ctx: &ExtensionContext) -> Result<(), ExtensionError>;

    fn deactivate(&self, ctx: &ExtensionContext) -> Result<(), ExtensionError>;

    /// Commands registered before `activate` runs
    fn commands(&self) -> Vec<CommandContribution> {
        Vec::new()
    }
}
