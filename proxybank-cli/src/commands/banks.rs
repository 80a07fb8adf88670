//! Banks command - list supported banks

use anyhow::Result;
use colored::Colorize;
use proxybank_core::{InputKind, OperationResult};

use super::get_context;
use crate::output;

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let banks = ctx.bank_service.list_banks();

    if json {
        println!("{}", serde_json::to_string_pretty(&OperationResult::ok(banks))?);
        return Ok(());
    }

    if banks.is_empty() {
        output::warning("No banks registered.");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["Id", "Name", "Inputs"]);

    for bank in &banks {
        let inputs: Vec<String> = bank
            .required_fields
            .iter()
            .map(|input| match input.kind {
                InputKind::Text => input.name.clone(),
                InputKind::Secret => format!("{} (secret)", input.name),
            })
            .collect();
        table.add_row(vec![bank.id.clone(), bank.display_name.clone(), inputs.join(", ")]);
    }

    println!("{}", "Supported Banks".bold());
    println!("{}", table);
    Ok(())
}
