//! Account domain model

use serde::{Deserialize, Serialize};

/// A bank account as listed by an adapter
///
/// The id is derived from identifying data scraped from the bank (account
/// number fragments), so the same account keeps the same id across calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
}

impl Account {
    /// Create a new account
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Validate account data
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.id.trim().is_empty() {
            return Err("account id cannot be empty");
        }
        if self.name.trim().is_empty() {
            return Err("account name cannot be empty");
        }
        Ok(())
    }
}
