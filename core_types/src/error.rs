//! Failure type returned by extension-supplied handlers

use thiserror::Error;

/// A command action, bus subscriber or similar callback failed
///
/// Runtime dispatch paths log these and carry on; they never reach the host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(format!("invalid payload: {}", err))
    }
}

/// Result type of extension-supplied handlers
pub type HandlerResult = Result<(), HandlerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_error_display() {
        let err = HandlerError::new("no file open");
        assert_eq!(err.to_string(), "no file open");
        assert_eq!(HandlerError::from("x").message(), "x");
    }

    #[test]
    fn test_from_json_error() {
        let err: HandlerError = serde_json::from_str::<u32>("\"nope\"").unwrap_err().into();
        assert!(err.message().starts_with("invalid payload:"));
    }
}
