//! Transaction domain model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A booked transaction from an account statement
///
/// Amounts are kept as the bank formats them (signed, dot decimal
/// separator). The statement carries no currency; callers are expected
/// to know the account's currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Booking date, serialized as YYYY-MM-DD
    pub date: NaiveDate,
    pub description: String,
    /// Signed decimal amount, e.g. "-8.46"
    pub amount: String,
    /// Running account balance after this transaction
    pub balance: String,
}

impl Transaction {
    pub fn new(
        date: NaiveDate,
        description: impl Into<String>,
        amount: impl Into<String>,
        balance: impl Into<String>,
    ) -> Self {
        Self {
            date,
            description: description.into(),
            amount: amount.into(),
            balance: balance.into(),
        }
    }
}
