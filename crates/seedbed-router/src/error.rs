//! Error types for the stimulus router.
//!
//! Delivery failures never surface to the caller of an ingestion method.
//! They are caught per subscriber, logged, and counted.

/// An error reported by a subscriber's handler.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The handler could not process the event.
    #[error("handler failed: {0}")]
    Failed(String),

    /// A channel-backed subscriber could not accept the event.
    #[error("subscriber channel unavailable: {0}")]
    Channel(String),
}

impl HandlerError {
    /// Convenience constructor for [`HandlerError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Why a single delivery did not complete.
#[derive(Debug)]
pub(crate) enum DeliveryFailure {
    /// The handler returned an error.
    Error(HandlerError),
    /// The handler panicked; the payload is rendered as text.
    Panicked(String),
}

impl core::fmt::Display for DeliveryFailure {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Error(e) => write!(f, "{e}"),
            Self::Panicked(message) => write!(f, "handler panicked: {message}"),
        }
    }
}
