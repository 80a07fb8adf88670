//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

mod bank;
pub mod crypto;
pub mod logging;

pub use bank::{AdapterFactory, BankService};
pub use crypto::CryptoService;
pub use logging::LogEvent;
