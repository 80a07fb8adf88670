//! Result and error types for the core library

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core library error type
///
/// Each variant carries at most one identifier or site message, which is
/// all a presentation layer needs to render a localized message.
#[derive(Error, Debug)]
pub enum Error {
    /// A required input field is missing
    #[error("Required value missing: {0}")]
    RequiredValue(String),

    /// The bank rejected the primary credentials
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The long-lived session marker is stale; a fresh handshake is needed
    #[error("Authentication for {0} has expired, please authenticate again")]
    ExpiredAuthentication(String),

    /// Token failed integrity checks or its plaintext is malformed
    #[error("Invalid token")]
    InvalidToken,

    #[error("Unknown bank id: {0}")]
    UnknownBankId(String),

    #[error("Unknown account id: {0}")]
    UnknownAccountId(String),

    /// Outbound request failed (timeout, connection). Safe for the caller to retry once.
    #[error("Bank unreachable: {0}")]
    Transient(String),

    /// The bank's pages no longer have the structure we scrape
    #[error("Unexpected bank response: {0}")]
    Scrape(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a required value error
    pub fn required(field: impl Into<String>) -> Self {
        Self::RequiredValue(field.into())
    }

    /// Create a scrape error
    pub fn scrape(msg: impl Into<String>) -> Self {
        Self::Scrape(msg.into())
    }

    /// Stable machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Error::RequiredValue(_) => "required_value",
            Error::Authentication(_) => "authentication",
            Error::ExpiredAuthentication(_) => "expired_authentication",
            Error::InvalidToken => "invalid_token",
            Error::UnknownBankId(_) => "unknown_bank_id",
            Error::UnknownAccountId(_) => "unknown_account_id",
            Error::Transient(_) => "transient",
            Error::Scrape(_) => "scrape",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
        }
    }

    /// The one identifier or message relevant to this error, if any
    pub fn detail(&self) -> Option<&str> {
        match self {
            Error::RequiredValue(v)
            | Error::Authentication(v)
            | Error::ExpiredAuthentication(v)
            | Error::UnknownBankId(v)
            | Error::UnknownAccountId(v)
            | Error::Transient(v)
            | Error::Scrape(v)
            | Error::Config(v) => Some(v.as_str()),
            Error::InvalidToken | Error::Io(_) | Error::Json(_) => None,
        }
    }

    /// Whether the caller may retry the same call once
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transient(_))
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

/// Operation result with optional context (for front-end serialization)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub context: Option<HashMap<String, serde_json::Value>>,
}

impl<T> OperationResult<T> {
    /// Create a successful result
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            context: None,
        }
    }

    /// Create a failed result
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            context: None,
        }
    }

    /// Create a failed result with context
    pub fn fail_with_context(
        error: impl Into<String>,
        context: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            context: Some(context),
        }
    }

    /// Create a failed result describing a core error
    pub fn from_error(error: &Error) -> Self {
        let mut context = HashMap::new();
        context.insert("kind".to_string(), serde_json::json!(error.kind()));
        if let Some(detail) = error.detail() {
            context.insert("detail".to_string(), serde_json::json!(detail));
        }
        Self::fail_with_context(error.to_string(), context)
    }
}

impl<T> From<Result<T>> for OperationResult<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::from_error(&e),
        }
    }
}
