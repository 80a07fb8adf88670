//! Continuation token models
//!
//! The server keeps no session state. Everything an adapter needs to resume
//! or replay authentication travels in a field bag that is sealed into an
//! opaque token and handed to the caller.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::result::{Error, Result};

/// Named-field bag carried inside a continuation token.
///
/// Kept as a self-describing JSON object rather than a struct so new
/// handshake states can add fields without breaking tokens already issued.
pub type Fields = serde_json::Map<String, JsonValue>;

/// Get a required string field, or `RequiredValue(name)`
///
/// Null and empty strings count as missing.
pub fn require_str<'a>(fields: &'a Fields, name: &str) -> Result<&'a str> {
    optional_str(fields, name).ok_or_else(|| Error::required(name))
}

/// Get an optional string field
pub fn optional_str<'a>(fields: &'a Fields, name: &str) -> Option<&'a str> {
    fields
        .get(name)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
}

/// What one adapter authentication call produced, before sealing
#[derive(Debug, Clone, PartialEq)]
pub enum AuthOutcome {
    /// Primary credentials accepted, an out-of-band approval is needed.
    /// The state must be sent back to resume.
    Challenge { state: Fields, message: String },
    /// Authentication is complete; the state replays it for data calls
    Complete { state: Fields },
    /// Nothing to seal yet (approval pending, request cancelled, ...)
    Waiting { message: String },
}

/// Result of an authentication call as returned to the caller
///
/// Either `token` and `complete` are set, or only `message` is, except when
/// a challenge is issued: then the token comes with instructions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complete: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AuthResult {
    /// Token that still needs a second factor
    pub fn incomplete(token: String, message: String) -> Self {
        Self {
            token: Some(token),
            complete: Some(false),
            message: Some(message),
        }
    }

    /// Token that can be replayed for data calls
    pub fn completed(token: String) -> Self {
        Self {
            token: Some(token),
            complete: Some(true),
            message: None,
        }
    }

    /// No token, only an instruction for the caller
    pub fn message(message: String) -> Self {
        Self {
            token: None,
            complete: None,
            message: Some(message),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.complete == Some(true)
    }
}
