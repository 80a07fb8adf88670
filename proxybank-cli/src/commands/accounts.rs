//! Accounts command - list accounts reachable with a completed token

use anyhow::{anyhow, Result};
use colored::Colorize;

use super::get_context;
use crate::output;

pub fn run(bank: &str, token: &str, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let result = ctx.bank_service.list_accounts(bank, token);

    if json {
        return output::print_json(result);
    }

    let accounts = result.map_err(|e| anyhow!(output::retry_hint(&e)))?;
    if accounts.is_empty() {
        output::warning("No accounts found.");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["Id", "Name"]);
    for account in &accounts {
        table.add_row(vec![account.id.as_str(), account.name.as_str()]);
    }

    println!("{}", "Accounts".bold());
    println!("{}", table);
    Ok(())
}
