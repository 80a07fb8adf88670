//! Core domain entities
//!
//! All domain types are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod account;
mod bank;
pub mod result;
pub mod token;
mod transaction;

pub use account::Account;
pub use bank::{AuthInput, BankDescriptor, InputKind};
pub use token::{AuthOutcome, AuthResult, Fields};
pub use transaction::Transaction;
