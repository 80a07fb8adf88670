//! Transactions command - fetch the latest transactions of one account

use anyhow::{anyhow, Result};
use colored::Colorize;
use comfy_table::{Cell, CellAlignment};

use super::get_context;
use crate::output;

pub fn run(bank: &str, account_id: &str, token: &str, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let result = ctx.bank_service.fetch_transactions(bank, account_id, token);

    if json {
        return output::print_json(result);
    }

    let transactions = result.map_err(|e| anyhow!(output::retry_hint(&e)))?;
    if transactions.is_empty() {
        output::warning("No transactions found.");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["Date", "Description", "Amount", "Balance"]);
    for tx in &transactions {
        let amount = if tx.amount.trim_start().starts_with('-') {
            tx.amount.red().to_string()
        } else {
            tx.amount.green().to_string()
        };
        table.add_row(vec![
            Cell::new(tx.date.format("%Y-%m-%d")),
            Cell::new(&tx.description),
            Cell::new(amount).set_alignment(CellAlignment::Right),
            Cell::new(&tx.balance).set_alignment(CellAlignment::Right),
        ]);
    }

    println!("{} ({})", "Transactions".bold(), transactions.len());
    println!("{}", table);
    Ok(())
}
