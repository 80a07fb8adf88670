//! ProxyBank Core - stateless bank access behind sealed tokens
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core entities (Account, Transaction, AuthResult, etc.)
//! - **ports**: Trait definitions for external dependencies (BankAdapter, SecretStore)
//! - **services**: Token sealing and bank dispatch
//! - **adapters**: Concrete implementations (Crédit Mutuel, secret file, etc.)
//!
//! The server never keeps session state: everything needed to resume or
//! replay an authentication travels in a caller-held continuation token.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use adapters::secret_file::{FileSecretStore, StaticSecretStore};
use config::Config;
use ports::SecretStore;
use services::*;

// Re-export commonly used types at crate root
pub use domain::result::{Error, OperationResult};
pub use domain::{
    Account, AuthInput, AuthOutcome, AuthResult, BankDescriptor, Fields, InputKind, Transaction,
};

/// Main context for ProxyBank operations
///
/// This is the primary entry point for all business logic. It holds
/// the configuration and all services.
pub struct ProxyBankContext {
    pub config: Config,
    pub secret_store: Arc<dyn SecretStore>,
    pub crypto_service: CryptoService,
    pub bank_service: BankService,
}

impl ProxyBankContext {
    /// Create a new ProxyBank context
    pub fn new(proxybank_dir: &Path) -> Result<Self> {
        let config = Config::load(proxybank_dir)?;
        Self::with_config(config)
    }

    /// Create a context from an already loaded configuration
    pub fn with_config(config: Config) -> Result<Self> {
        let secret_store: Arc<dyn SecretStore> = match &config.inline_secret {
            Some(secret) => Arc::new(StaticSecretStore::new(secret.clone())),
            None => Arc::new(FileSecretStore::new(config.secret_file.clone())),
        };

        let crypto_service = CryptoService::new(Arc::clone(&secret_store));
        let bank_service = BankService::with_builtin_adapters(&config, crypto_service.clone())?;

        Ok(Self {
            config,
            secret_store,
            crypto_service,
            bank_service,
        })
    }

    /// Whether the secret comes from the environment instead of a file
    pub fn uses_inline_secret(&self) -> bool {
        self.config.inline_secret.is_some()
    }
}
