//! Stream failure payload.

use std::rc::Rc;

use thiserror::Error;

/// An error travelling down a stream's error channel.
///
/// Errors terminate the stream they occur on (no silent resume) and may be
/// delivered to any number of subscribers, so the payload is cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StreamError {
    message: Rc<str>,
}

impl StreamError {
    /// Create a new stream error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into().into(),
        }
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_message() {
        let err = StreamError::new("boom");
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn clones_compare_equal() {
        let err = StreamError::new("x");
        assert_eq!(err.clone(), err);
    }
}
