//! Auth command - run one authentication step, optionally waiting for approval

use std::time::{Duration, Instant};

use anyhow::Result;
use dialoguer::{Input, Password};
use indicatif::{ProgressBar, ProgressStyle};
use proxybank_core::domain::result::Result as CoreResult;
use proxybank_core::{AuthResult, BankDescriptor, Fields, InputKind, ProxyBankContext};

use super::{get_context, LOGIN_FIELD, PASSWORD_FIELD};
use crate::output;

/// Delay between two approval polls
const POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Give up waiting after this long
const WAIT_LIMIT: Duration = Duration::from_secs(300);

pub struct AuthArgs {
    pub bank: String,
    pub login: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
    pub wait: bool,
}

pub fn run(args: AuthArgs, json: bool) -> Result<()> {
    let ctx = get_context()?;

    let mut fields = Fields::new();
    if let Some(login) = &args.login {
        fields.insert(LOGIN_FIELD.to_string(), login.clone().into());
    }
    if let Some(password) = &args.password {
        fields.insert(PASSWORD_FIELD.to_string(), password.clone().into());
    }

    // A missing bank is reported by the authentication call itself
    if args.token.is_none() && !json {
        if let Ok(descriptor) = ctx.bank_service.descriptor(&args.bank) {
            prompt_missing_inputs(&descriptor, &mut fields)?;
        }
    }

    let progress = if json {
        ProgressBar::hidden()
    } else {
        spinner()
    };
    let result = authenticate(&ctx, &args, &fields, &progress);
    progress.finish_and_clear();

    if json {
        return output::print_json(result);
    }

    let result = result.map_err(|e| anyhow::anyhow!(output::retry_hint(&e)))?;
    print_result(&args.bank, &result);
    Ok(())
}

fn authenticate(
    ctx: &ProxyBankContext,
    args: &AuthArgs,
    fields: &Fields,
    progress: &ProgressBar,
) -> CoreResult<AuthResult> {
    let bank = &ctx.bank_service;
    let result = match &args.token {
        Some(token) => bank.authenticate_with_token(&args.bank, token, fields)?,
        None => bank.authenticate_with_fields(&args.bank, fields)?,
    };

    if !args.wait || result.is_complete() {
        return Ok(result);
    }

    match (&result.token, &args.token) {
        (Some(token), _) | (None, Some(token)) => {
            wait_for_approval(ctx, &args.bank, token, fields, result.clone(), progress)
        }
        (None, None) => Ok(result),
    }
}

/// Poll with the challenge token until the bank answers something new
///
/// Repeated polls of a pending approval return the same message. Any other
/// answer (a token, a cancellation) ends the wait.
fn wait_for_approval(
    ctx: &ProxyBankContext,
    bank_id: &str,
    token: &str,
    extra: &Fields,
    initial: AuthResult,
    progress: &ProgressBar,
) -> CoreResult<AuthResult> {
    let started = Instant::now();
    let mut pending_message = match initial.token {
        Some(_) => None,
        None => initial.message.clone(),
    };
    let mut last = initial;

    if let Some(message) = &last.message {
        progress.set_message(message.clone());
    }

    while started.elapsed() < WAIT_LIMIT {
        std::thread::sleep(POLL_INTERVAL);

        let result = ctx.bank_service.authenticate_with_token(bank_id, token, extra)?;
        if result.token.is_some() {
            return Ok(result);
        }

        match (&pending_message, &result.message) {
            (None, Some(message)) => {
                progress.set_message(message.clone());
                pending_message = Some(message.clone());
            }
            (Some(pending), Some(message)) if pending != message => return Ok(result),
            _ => {}
        }
        last = result;
    }

    Ok(last)
}

fn prompt_missing_inputs(descriptor: &BankDescriptor, fields: &mut Fields) -> Result<()> {
    for input in &descriptor.required_fields {
        if fields.contains_key(&input.name) {
            continue;
        }
        let value: String = match input.kind {
            InputKind::Text => Input::new().with_prompt(&input.name).interact_text()?,
            InputKind::Secret => Password::new().with_prompt(&input.name).interact()?,
        };
        fields.insert(input.name.clone(), value.into());
    }
    Ok(())
}

fn spinner() -> ProgressBar {
    let progress = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        progress.set_style(style);
    }
    progress.enable_steady_tick(Duration::from_millis(120));
    progress
}

fn print_result(bank_id: &str, result: &AuthResult) {
    match (&result.token, result.is_complete()) {
        (Some(token), true) => {
            output::success("Authenticated.");
            println!("Token: {}", token);
            println!();
            println!("List accounts with: pbank accounts {} --token <token>", bank_id);
        }
        (Some(token), false) => {
            if let Some(message) = &result.message {
                output::info(message);
            }
            println!("Token: {}", token);
            println!();
            println!("Resume with: pbank auth {} --token <token> --wait", bank_id);
        }
        (None, _) => {
            if let Some(message) = &result.message {
                output::warning(message);
            }
        }
    }
}
