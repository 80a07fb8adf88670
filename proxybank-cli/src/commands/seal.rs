//! Seal command - turn credentials into a token without contacting a bank

use anyhow::{anyhow, Result};
use dialoguer::{Input, Password};
use proxybank_core::Fields;

use super::{get_context, LOGIN_FIELD, PASSWORD_FIELD};
use crate::output;

pub fn run(login: Option<String>, password: Option<String>, json: bool) -> Result<()> {
    let ctx = get_context()?;

    // JSON mode never prompts; missing values are reported instead
    let login = match login {
        Some(l) => Some(l),
        None if !json => Some(Input::new().with_prompt("Login").interact_text()?),
        None => None,
    };
    let password = match password {
        Some(p) => Some(p),
        None if !json => Some(Password::new().with_prompt("Password").interact()?),
        None => None,
    };

    let result = credential_fields(login, password).and_then(|fields| ctx.bank_service.seal_fields(&fields));

    if json {
        return output::print_json(result);
    }

    let token = result.map_err(|e| anyhow!(output::retry_hint(&e)))?;
    output::success("Credentials sealed.");
    println!("Token: {}", token);
    Ok(())
}

fn credential_fields(
    login: Option<String>,
    password: Option<String>,
) -> proxybank_core::domain::result::Result<Fields> {
    let mut fields = Fields::new();
    for (name, value) in [(PASSWORD_FIELD, password), (LOGIN_FIELD, login)] {
        match value.filter(|v| !v.is_empty()) {
            Some(v) => {
                fields.insert(name.to_string(), v.into());
            }
            None => return Err(proxybank_core::Error::required(name)),
        }
    }
    Ok(fields)
}
