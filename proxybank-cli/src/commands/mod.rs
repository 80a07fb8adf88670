//! CLI command implementations

pub mod accounts;
pub mod auth;
pub mod banks;
pub mod seal;
pub mod secret;
pub mod transactions;

use std::path::PathBuf;

use anyhow::{Context, Result};
use proxybank_core::ProxyBankContext;

/// Field names shared by every bank's first step
pub const LOGIN_FIELD: &str = "login";
pub const PASSWORD_FIELD: &str = "password";

/// Get the ProxyBank directory from environment or default
pub fn get_proxybank_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("PROXYBANK_DIR") {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir().context("Could not find home directory")?;
    Ok(home.join(".proxybank"))
}

/// Get or create the ProxyBank context
pub fn get_context() -> Result<ProxyBankContext> {
    let proxybank_dir = get_proxybank_dir()?;

    std::fs::create_dir_all(&proxybank_dir)
        .with_context(|| format!("Failed to create proxybank directory: {:?}", proxybank_dir))?;

    ProxyBankContext::new(&proxybank_dir).context("Failed to initialize proxybank context")
}
