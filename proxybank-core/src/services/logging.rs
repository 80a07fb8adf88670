//! Logging service - structured operation events
//!
//! Privacy-safe: events name the bank, the handshake step and the error
//! kind. Credentials, cookies, tokens, account ids and transaction data are
//! never logged.
//!
//! Events go through `tracing`; the front end decides where they end up.

use serde::{Deserialize, Serialize};

use crate::domain::result::Error;

/// Target used for all operation events
pub const EVENT_TARGET: &str = "proxybank::events";

/// A log event to be recorded
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl LogEvent {
    /// Create a new log event with just an event name
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            ..Self::default()
        }
    }

    /// Set the bank context
    pub fn with_bank(mut self, bank: impl Into<String>) -> Self {
        self.bank = Some(bank.into());
        self
    }

    /// Set the handshake step (login, challenge, poll, complete, ...)
    pub fn with_step(mut self, step: impl Into<String>) -> Self {
        self.step = Some(step.into());
        self
    }

    /// Set error information
    ///
    /// Account ids are dropped from the message.
    pub fn with_error(mut self, error: &Error) -> Self {
        self.error_kind = Some(error.kind().to_string());
        self.error_message = match error {
            Error::UnknownAccountId(_) => None,
            other => Some(other.to_string()),
        };
        self
    }

    pub fn is_error(&self) -> bool {
        self.error_kind.is_some()
    }

    /// Record the event
    pub fn emit(&self) {
        let bank = self.bank.as_deref().unwrap_or("-");
        let step = self.step.as_deref().unwrap_or("-");

        match (&self.error_kind, &self.error_message) {
            (Some(kind), message) => tracing::warn!(
                target: EVENT_TARGET,
                event = %self.event,
                bank,
                step,
                error_kind = %kind,
                error_message = message.as_deref().unwrap_or("-"),
                "operation failed"
            ),
            (None, _) => tracing::info!(
                target: EVENT_TARGET,
                event = %self.event,
                bank,
                step,
                "operation succeeded"
            ),
        }
    }
}
