//! Error types for the fanout library

use thiserror::Error;

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// Result type alias for fanout operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while running pools and workers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum Error {
    /// Invalid pool or worker configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The OS refused to start a worker thread
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(String),

    /// A transformation failed on one item
    #[error("Transform failed: {0}")]
    Transform(String),

    /// A page could not be fetched
    #[error("Fetch of {url} failed: {message}")]
    Fetch {
        /// URL that was requested
        url: String,
        /// Collaborator-supplied reason
        message: String,
    },

    /// A worker panicked
    #[error("Worker panicked: {0}")]
    WorkerPanicked(String),

    /// Other error
    #[error("Error: {0}")]
    Other(String),
}

impl Error {
    /// Wrap any displayable error as a transformation failure
    pub fn transform(err: impl std::fmt::Display) -> Self {
        Error::Transform(err.to_string())
    }

    /// Build a fetch failure for `url`
    pub fn fetch(url: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Error::Fetch {
            url: url.into(),
            message: err.to_string(),
        }
    }

    /// Turn a panic payload into a `WorkerPanicked` error
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Error::WorkerPanicked(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_payload_conversion() {
        let err = Error::from_panic(Box::new("boom"));
        assert_eq!(err, Error::WorkerPanicked("boom".to_string()));

        let err = Error::from_panic(Box::new(String::from("owned boom")));
        assert_eq!(err, Error::WorkerPanicked("owned boom".to_string()));

        let err = Error::from_panic(Box::new(7_u32));
        assert!(matches!(err, Error::WorkerPanicked(_)));
    }

    #[test]
    fn test_display() {
        let err = Error::fetch("https://example.org/a", "connection reset");
        assert_eq!(
            err.to_string(),
            "Fetch of https://example.org/a failed: connection reset"
        );
        assert_eq!(Error::transform("bad").to_string(), "Transform failed: bad");
    }
}
