//! Secret store port
//!
//! The token envelope key is derived from a long random passphrase that
//! lives outside the envelope. The envelope only ever reads it.

use crate::domain::result::Result;

/// Provides the server secret used to seal and open tokens
pub trait SecretStore: Send + Sync {
    fn secret(&self) -> Result<String>;
}
