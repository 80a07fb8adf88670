//! Output formatting utilities

use anyhow::{anyhow, Result};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL_CONDENSED, ContentArrangement, Table};
use proxybank_core::OperationResult;
use serde::Serialize;

/// Print a success message
pub fn success(msg: &str) {
    println!("{}", msg.green());
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{}", msg.red());
}

/// Print a warning message
pub fn warning(msg: &str) {
    println!("{}", msg.yellow());
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{}", msg.cyan());
}

/// Create a styled table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Print a core result as an `OperationResult` document
///
/// The document always goes to stdout. A failure is still returned so the
/// process exits non-zero.
pub fn print_json<T: Serialize>(result: proxybank_core::domain::result::Result<T>) -> Result<()> {
    let failure = result.as_ref().err().map(retry_hint);
    let operation: OperationResult<T> = result.into();
    println!("{}", serde_json::to_string_pretty(&operation)?);

    match failure {
        Some(msg) => Err(anyhow!(msg)),
        None => Ok(()),
    }
}

/// Error message, with a hint when one retry is allowed
pub fn retry_hint(error: &proxybank_core::Error) -> String {
    if error.is_retryable() {
        format!("{} (you may retry once)", error)
    } else {
        error.to_string()
    }
}
