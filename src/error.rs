//! Error taxonomy for the client layer.
//!
//! Every failed operation ends up as one of these variants. Call sites convert
//! transport failures (`rest::ApiError`) into a `ClientError` that names the
//! attempted action, so notices read like "Failed to fetch accounts".

use thiserror::Error;

/// Local, pre-submission validation failures. None of these ever reach the network.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Please enter a valid email address")]
    InvalidEmail,

    #[error("Password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("Please confirm your password")]
    PasswordConfirmationMissing,

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Date of birth must be in the past")]
    BirthDateNotInPast,

    #[error("Please enter a valid date of birth")]
    BirthDateImplausible,

    #[error("{field} must be a number (got '{value}')")]
    InvalidNumber { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    NonPositive { field: &'static str },
}

#[derive(Error, Debug, Clone)]
pub enum ClientError {
    /// Login explicitly rejected by the backend.
    #[error("{0}")]
    InvalidCredentials(String),

    /// A 401/403 on an authenticated call.
    #[error("Session expired. Please log in again.")]
    SessionExpired,

    /// An authenticated call was attempted with no stored session.
    #[error("Not signed in")]
    NotSignedIn,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to {action}: {message}")]
    NetworkOrServer { action: String, message: String },

    /// A mutation is already in flight on the same collection.
    #[error("Cannot {action} while another change is in progress")]
    Busy { action: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    pub fn network(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NetworkOrServer {
            action: action.into(),
            message: message.into(),
        }
    }

    pub fn storage(message: impl ToString) -> Self {
        Self::Storage(message.to_string())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// True for both an expired session and a missing one; callers react the same way.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired | Self::NotSignedIn)
    }

    /// Short text for a user-facing notice.
    pub fn user_message(&self) -> String {
        match self {
            Self::NetworkOrServer { action, .. } => format!("Failed to {action}"),
            Self::SessionExpired => "Unauthorized. Please log in again.".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<sled::Error> for ClientError {
    fn from(err: sled::Error) -> Self {
        Self::storage(err)
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::storage(format!("corrupt persisted value: {err}"))
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
