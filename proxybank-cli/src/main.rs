//! ProxyBank CLI - bank access behind sealed tokens, from your terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod output;

use commands::{accounts, auth, banks, seal, secret, transactions};

/// Environment variable holding the log filter
const LOG_ENV: &str = "PROXYBANK_LOG";

/// ProxyBank - stateless bank access behind sealed tokens
#[derive(Parser)]
#[command(name = "pbank", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List supported banks and the inputs they need
    Banks {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Authenticate with a bank, or resume a pending authentication
    Auth {
        /// Bank id (see `pbank banks`)
        bank: String,
        /// Login, prompted for if missing
        #[arg(long)]
        login: Option<String>,
        /// Password, prompted for if missing
        #[arg(long)]
        password: Option<String>,
        /// Token from a previous step
        #[arg(long)]
        token: Option<String>,
        /// Keep polling until the approval is granted
        #[arg(long)]
        wait: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List accounts with a completed token
    Accounts {
        /// Bank id
        bank: String,
        /// Completed token
        #[arg(long)]
        token: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fetch the latest transactions of an account
    Transactions {
        /// Bank id
        bank: String,
        /// Account id (see `pbank accounts`)
        account_id: String,
        /// Completed token
        #[arg(long)]
        token: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Seal credentials into a token without contacting any bank
    Seal {
        #[arg(long)]
        login: Option<String>,
        #[arg(long)]
        password: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show where the token secret lives, creating it if needed
    Secret {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("Error: {}", e));
            ExitCode::FAILURE
        }
    }
}

/// Install the stderr subscriber
///
/// `PROXYBANK_LOG` wins over `RUST_LOG`; with neither set only warnings show.
fn init_tracing() {
    let filter = std::env::var(LOG_ENV)
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Banks { json } => banks::run(json),
        Commands::Auth { bank, login, password, token, wait, json } => auth::run(
            auth::AuthArgs { bank, login, password, token, wait },
            json,
        ),
        Commands::Accounts { bank, token, json } => accounts::run(&bank, &token, json),
        Commands::Transactions { bank, account_id, token, json } => {
            transactions::run(&bank, &account_id, &token, json)
        }
        Commands::Seal { login, password, json } => seal::run(login, password, json),
        Commands::Secret { json } => secret::run(json),
    }
}
