//! Bank descriptor models

use serde::{Deserialize, Serialize};

/// How an authentication input should be collected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Text,
    /// Must be masked when entered and never echoed back
    Secret,
}

/// One input a bank needs for the first authentication step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthInput {
    /// Field name, used both as the key in the field bag and as the label
    pub name: String,
    pub kind: InputKind,
}

impl AuthInput {
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: InputKind::Text,
        }
    }

    pub fn secret(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: InputKind::Secret,
        }
    }
}

/// Static description of a bank adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankDescriptor {
    /// Unique, never-changing bank id
    pub id: String,
    pub display_name: String,
    /// Inputs required to start authentication, in display order
    pub required_fields: Vec<AuthInput>,
}
