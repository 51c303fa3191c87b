use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use thiserror::Error;

/// A user closure panicked
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("panicked: {message}")]
pub struct Panicked {
    /// Panic payload rendered as text
    pub message: String,
}

impl Panicked {
    fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self { message }
    }
}

/// Runs `f`, converting a panic into [`Panicked`]
///
/// Every dispatch boundary that calls extension code goes through here so
/// one misbehaving handler cannot take the shell down.
pub fn run_guarded<T>(f: impl FnOnce() -> T) -> Result<T, Panicked> {
    catch_unwind(AssertUnwindSafe(f)).map_err(Panicked::from_payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_passes_through() {
        assert_eq!(run_guarded(|| 7), Ok(7));
    }

    #[test]
    fn test_str_and_string_payloads() {
        let err = run_guarded(|| panic!("static message")).unwrap_err();
        assert_eq!(err.message, "static message");

        let code = 42;
        let err = run_guarded(|| panic!("code {}", code)).unwrap_err();
        assert_eq!(err.message, "code 42");
        assert_eq!(err.to_string(), "panicked: code 42");
    }
}
