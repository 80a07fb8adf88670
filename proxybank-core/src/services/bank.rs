//! Bank service - resolves bank ids to adapters and seals their state
//!
//! Adapters only ever see clear field bags. This service opens inbound
//! tokens before forwarding and seals whatever state an adapter emits.

use std::collections::HashMap;
use std::sync::Arc;

use crate::adapters::credit_mutuel;
use crate::config::Config;
use crate::domain::result::{Error, Result};
use crate::domain::{Account, AuthOutcome, AuthResult, BankDescriptor, Fields, Transaction};
use crate::ports::BankAdapter;
use crate::services::logging::LogEvent;
use crate::services::CryptoService;

/// Builds an adapter from configuration
pub type AdapterFactory = fn(&Config) -> Result<Arc<dyn BankAdapter>>;

/// Adapters registered at startup
const BUILTIN_ADAPTERS: &[AdapterFactory] = &[credit_mutuel::factory];

/// Dispatcher from bank id to adapter
///
/// The registry is filled once and only read afterwards; no per-session
/// state is kept.
pub struct BankService {
    adapters: HashMap<String, Arc<dyn BankAdapter>>,
    crypto: CryptoService,
}

impl BankService {
    /// Create a service with no adapters
    pub fn new(crypto: CryptoService) -> Self {
        Self {
            adapters: HashMap::new(),
            crypto,
        }
    }

    /// Create a service with every built-in adapter
    pub fn with_builtin_adapters(config: &Config, crypto: CryptoService) -> Result<Self> {
        let mut service = Self::new(crypto);
        for factory in BUILTIN_ADAPTERS {
            service.register(factory(config)?);
        }
        Ok(service)
    }

    /// Register an adapter under its descriptor id, replacing any previous one
    pub fn register(&mut self, adapter: Arc<dyn BankAdapter>) {
        let id = adapter.descriptor().id;
        self.adapters.insert(id, adapter);
    }

    fn adapter(&self, bank_id: &str) -> Result<&Arc<dyn BankAdapter>> {
        self.adapters
            .get(bank_id)
            .ok_or_else(|| Error::UnknownBankId(bank_id.to_string()))
    }

    /// All supported banks, sorted by display name
    pub fn list_banks(&self) -> Vec<BankDescriptor> {
        let mut banks: Vec<BankDescriptor> =
            self.adapters.values().map(|a| a.descriptor()).collect();
        banks.sort_by(|a, b| {
            a.display_name
                .to_lowercase()
                .cmp(&b.display_name.to_lowercase())
                .then_with(|| a.id.cmp(&b.id))
        });
        banks
    }

    /// Descriptor of one bank
    pub fn descriptor(&self, bank_id: &str) -> Result<BankDescriptor> {
        Ok(self.adapter(bank_id)?.descriptor())
    }

    /// Start authentication from raw fields
    pub fn authenticate_with_fields(&self, bank_id: &str, fields: &Fields) -> Result<AuthResult> {
        let result = self.authenticate_inner(bank_id, fields);
        log_outcome("authenticate", bank_id, &result, auth_step);
        result
    }

    /// Resume authentication from a sealed token
    ///
    /// `extra` fields are added where the token lacks them; the token's own
    /// fields always win.
    pub fn authenticate_with_token(
        &self,
        bank_id: &str,
        token: &str,
        extra: &Fields,
    ) -> Result<AuthResult> {
        let result = self.adapter(bank_id).and_then(|_| {
            let mut fields = self.crypto.open(token)?;
            for (name, value) in extra {
                fields.entry(name.clone()).or_insert_with(|| value.clone());
            }
            self.authenticate_inner(bank_id, &fields)
        });
        log_outcome("authenticate", bank_id, &result, auth_step);
        result
    }

    fn authenticate_inner(&self, bank_id: &str, fields: &Fields) -> Result<AuthResult> {
        let adapter = self.adapter(bank_id)?;

        match adapter.authenticate(fields)? {
            AuthOutcome::Challenge { state, message } => {
                Ok(AuthResult::incomplete(self.crypto.seal(&state)?, message))
            }
            AuthOutcome::Complete { state } => Ok(AuthResult::completed(self.crypto.seal(&state)?)),
            AuthOutcome::Waiting { message } => Ok(AuthResult::message(message)),
        }
    }

    /// List accounts with a complete token
    pub fn list_accounts(&self, bank_id: &str, token: &str) -> Result<Vec<Account>> {
        let result = self.adapter(bank_id).and_then(|adapter| {
            let fields = self.crypto.open(token)?;
            adapter.list_accounts(&fields)
        });
        log_outcome("list_accounts", bank_id, &result, |_| "accounts");
        result
    }

    /// Fetch the latest transactions of an account with a complete token
    pub fn fetch_transactions(
        &self,
        bank_id: &str,
        account_id: &str,
        token: &str,
    ) -> Result<Vec<Transaction>> {
        let result = self.adapter(bank_id).and_then(|adapter| {
            if account_id.trim().is_empty() {
                return Err(Error::required("accountId"));
            }
            let fields = self.crypto.open(token)?;
            adapter.fetch_transactions(account_id, &fields)
        });
        log_outcome("fetch_transactions", bank_id, &result, |_| "transactions");
        result
    }

    /// Seal a field bag into a token without contacting any bank
    pub fn seal_fields(&self, fields: &Fields) -> Result<String> {
        self.crypto.seal(fields)
    }
}

fn auth_step(result: &AuthResult) -> &'static str {
    match (result.is_complete(), result.token.is_some()) {
        (true, _) => "complete",
        (false, true) => "challenge",
        (false, false) => "waiting",
    }
}

fn log_outcome<T>(event: &str, bank_id: &str, result: &Result<T>, step: impl Fn(&T) -> &'static str) {
    let log = LogEvent::new(event).with_bank(bank_id);
    match result {
        Ok(value) => log.with_step(step(value)).emit(),
        Err(e) => log.with_error(e).emit(),
    }
}
