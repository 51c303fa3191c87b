//! # Trellis Shell Runtime
//!
//! The composition root for the Trellis editor shell.
//!
//! ## Philosophy
//!
//! - **Host owns pixels**: The shell only describes widgets; the host draws them
//! - **Explicit wiring**: Every registry is built here and handed out by `Rc`
//! - **Deterministic mode is first-class**: A manual clock plus a key script
//!   replays a session exactly
//! - **Nothing fatal at runtime**: After startup, failures are logged and the
//!   interaction does nothing
//!
//! ## Responsibilities
//!
//! The shell:
//! - Loads configuration and installs logging
//! - Registers and activates extensions, then applies the user keymap
//! - Turns host key presses into keybinding dispatch and `keyPressed` events
//! - Re-renders the composed tree through the UI bridge when UI state moves

pub mod builtins;
pub mod config;
pub mod logging;
pub mod script;
pub mod shell;

pub use config::{ConfigError, ShellConfig};
pub use logging::{init_logging, LoggingError};
pub use script::{KeyScript, ScriptError, ScriptStep};
pub use shell::{PlayReport, Shell, TickReport};

use thiserror::Error;

/// Startup failures of the daemon
#[derive(Debug, Error)]
pub enum ShellError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error(transparent)]
    Logging(#[from] LoggingError),

    #[error("cannot read {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}
