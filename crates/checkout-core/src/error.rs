//! Error Types

use thiserror::Error;

/// Result type alias for checkout operations
pub type Result<T> = std::result::Result<T, CheckoutError>;

/// Checkout flow errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckoutError {
    /// Bad phone number or amount, rejected before any network call
    #[error("Validation error: {0}")]
    Validation(String),

    /// Gateway explicitly refused the STK push
    #[error("Initiation failed: {0}")]
    Initiation(String),

    /// No checkout reference after every initiation attempt
    #[error("No checkout reference after {attempts} attempts")]
    InitiationTimeout { attempts: u32 },

    /// Network or decoding failure talking to the gateway
    #[error("Transport error: {0}")]
    Transport(String),

    /// Status query returned a non-success result code
    #[error("Payment failed with result code {code}: {description}")]
    PollResultFailure { code: String, description: String },

    /// Status could not be confirmed within the poll budget
    #[error("Transaction status unverified after {attempts} polls")]
    PollTimeout { attempts: u32 },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CheckoutError {
    /// Check if error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Whether the error ends the current checkout session
    pub const fn is_fatal(&self) -> bool {
        !self.is_retryable()
    }

    /// Convert to the message shown to the user
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::Initiation(msg) => format!("Error: {msg}"),
            Self::InitiationTimeout { .. } => {
                "Failed to initiate STK Push after several attempts.".into()
            }
            Self::Transport(_) => "An unexpected error occurred. Please try again later.".into(),
            Self::PollResultFailure { description, .. } => format!("Payment failed: {description}"),
            Self::PollTimeout { .. } => {
                "Transaction status could not be verified. Please try again later.".into()
            }
            Self::Config(_) => "Service configuration error.".into(),
        }
    }
}
