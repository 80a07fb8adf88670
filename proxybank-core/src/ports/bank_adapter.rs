//! Bank adapter port
//!
//! Defines the capability contract every bank-specific adapter implements.
//! Adapters receive clear (already decrypted) field bags and never see
//! sealed tokens; sealing is done by the `BankService` dispatcher.

use crate::domain::result::Result;
use crate::domain::{Account, AuthOutcome, BankDescriptor, Fields, Transaction};

/// Bank adapter trait
///
/// Implementations must hold no mutable state between calls: the same
/// instance is shared by all concurrent requests.
pub trait BankAdapter: Send + Sync {
    /// Static description of the bank and its authentication inputs
    fn descriptor(&self) -> BankDescriptor;

    /// Begin or resume authentication
    ///
    /// Safe to call repeatedly with whatever state the previous call
    /// emitted. Which step runs is decided only by the fields present.
    fn authenticate(&self, inputs: &Fields) -> Result<AuthOutcome>;

    /// List accounts
    ///
    /// # Arguments
    /// * `inputs` - A complete, replayable credential set
    fn list_accounts(&self, inputs: &Fields) -> Result<Vec<Account>>;

    /// Fetch the latest transactions of one account
    ///
    /// # Arguments
    /// * `account_id` - An id as returned by `list_accounts`
    /// * `inputs` - A complete, replayable credential set
    fn fetch_transactions(&self, account_id: &str, inputs: &Fields) -> Result<Vec<Transaction>>;
}
