use thiserror::Error;

/// Errors surfaced by the checkout engine's services.
///
/// Field-level validation problems (a bad card number, an invalid email) are
/// accumulated into user-facing message lists by the security layer rather
/// than raised one at a time; this enum covers the operational failures that
/// abort a call outright.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Input failed validation and the operation was not attempted.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The attempt counter tripped the lockout window.
    #[error("Too many attempts. Please wait {remaining_minutes} minutes.")]
    RateLimited { remaining_minutes: u64 },

    /// The checkout session outlived its allowed lifetime.
    #[error("Session expired. Please restart checkout.")]
    SessionExpired,

    /// A referenced record does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The operation is not valid for the current state.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// The requested order-status transition is not allowed.
    #[error("Cannot transition from status '{from}' to '{to}'")]
    InvalidStatus { from: String, to: String },

    /// An operation was invoked without its required prior step.
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// The payment pipeline failed mid-flight.
    #[error("Payment processing failed: {0}")]
    ProcessingError(String),

    /// The durable store could not be read or written.
    #[error("Store error: {0}")]
    StoreError(#[from] std::io::Error),

    /// A record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// An obscured payload could not be decoded back.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
}

impl ServiceError {
    /// Whether the caller can reasonably retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ServiceError::RateLimited { .. }
                | ServiceError::ProcessingError(_)
                | ServiceError::StoreError(_)
        )
    }

    /// Message safe to show to an end user.
    pub fn user_message(&self) -> String {
        match self {
            ServiceError::StoreError(_) | ServiceError::SerializationError(_) => {
                "Something went wrong. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}
