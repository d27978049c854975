//! Error types for console operations

use std::fmt;
use thiserror::Error;

/// Result alias for anything that talks to the console API.
pub type ApiResult<T> = Result<T, ApiError>;

/// Failure of a query or mutation against the console API.
///
/// Cloneable so that a single outcome can be handed to every caller that
/// was coalesced onto the same request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// The request never produced an HTTP response.
    #[error("Network error: {message}")]
    Transport { message: String },

    /// The server answered with a non-success status.
    #[error("Server rejected request ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Unexpected response: {message}")]
    Decode { message: String },

    /// Rejected client-side before any request was sent.
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
}

impl ApiError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Server { status: 404, .. })
    }

    /// Message suitable for a toast or an inline banner.
    pub fn user_message(&self) -> &str {
        match self {
            Self::Transport { message } | Self::Server { message, .. } | Self::Decode { message } => {
                message.as_str()
            }
            Self::Validation(errors) => errors
                .first()
                .map(|e| e.reason.as_str())
                .unwrap_or("invalid input"),
        }
    }
}

/// A single failing form field.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid value for {field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Every failing field of one form, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &'static str, reason: impl Into<String>) {
        self.0.push(ValidationError::new(field, reason));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn first(&self) -> Option<&ValidationError> {
        self.0.first()
    }

    pub fn field(&self, field: &str) -> Option<&ValidationError> {
        self.0.iter().find(|e| e.field == field)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    /// `Ok(())` when nothing was pushed.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        write!(f, "Validation failed: {}", fields.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}
