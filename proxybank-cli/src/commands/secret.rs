//! Secret command - show where the token secret lives

use anyhow::{Context, Result};
use proxybank_core::ports::SecretStore;
use proxybank_core::OperationResult;
use serde::Serialize;

use super::get_context;
use crate::output;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SecretLocation {
    /// "environment" or "file"
    source: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    created: bool,
}

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;

    let location = if ctx.uses_inline_secret() {
        SecretLocation {
            source: "environment",
            path: None,
            created: false,
        }
    } else {
        let path = &ctx.config.secret_file;
        let existed = path.exists();
        ctx.secret_store
            .secret()
            .with_context(|| format!("Failed to read or create {:?}", path))?;
        SecretLocation {
            source: "file",
            path: Some(path.display().to_string()),
            created: !existed,
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&OperationResult::ok(location))?);
        return Ok(());
    }

    match &location.path {
        None => output::info(&format!(
            "Secret comes from the {} environment variable.",
            proxybank_core::config::SECRET_ENV
        )),
        Some(path) if location.created => output::success(&format!("Created secret file: {}", path)),
        Some(path) => output::info(&format!("Secret file: {}", path)),
    }
    output::warning("Replacing the secret invalidates every token issued so far.");
    Ok(())
}
