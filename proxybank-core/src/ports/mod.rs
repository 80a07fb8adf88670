//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The core domain
//! depends only on these traits, not on concrete implementations.

mod bank_adapter;
mod secret_store;

pub use bank_adapter::BankAdapter;
pub use secret_store::SecretStore;
