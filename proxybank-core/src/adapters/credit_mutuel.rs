//! Crédit Mutuel adapter
//!
//! Crédit Mutuel has no public API, so this adapter drives the customer
//! website: it posts the login form, follows the strong customer
//! authentication flow (approval in the mobile app) and downloads CSV
//! statements. Connections made here show up in the customer's login history.
//!
//! Handshake, driven only by the fields present in the inputs:
//! 1. `{login, password[, sessionMarker]}`: log in. A redirect home completes
//!    authentication; a redirect to the validation page issues a challenge
//!    sealed as `{login, password, transactionId, validationUrl, otpHidden, cookies}`.
//! 2. `{.., transactionId, ..}`: poll the approval state. Once validated the
//!    long-lived `auth_client_state` cookie becomes the session marker and the
//!    final state is `{login, password, sessionMarker}`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{COOKIE, LOCATION, SET_COOKIE};
use reqwest::redirect::Policy;
use reqwest::StatusCode;
use serde_json::Value as JsonValue;
use url::Url;

use super::cookie_jar::{CookieJar, StoredCookie};
use super::credit_mutuel_pages::{
    login_error_message, parse_approval_status, parse_challenge_page, parse_download_page,
    parse_statement_csv, ApprovalStatus, DownloadPage,
};
use crate::config::Config;
use crate::domain::result::{Error, Result};
use crate::domain::token::{optional_str, require_str};
use crate::domain::{
    Account, AuthInput, AuthOutcome, BankDescriptor, Fields, Transaction,
};
use crate::ports::BankAdapter;

pub const BANK_ID: &str = "credit-mutuel";
pub const BANK_NAME: &str = "Crédit Mutuel";

/// Default production site
const CREDIT_MUTUEL_PRODUCTION_URL: &str = "https://www.creditmutuel.fr";

/// Environment variable to override the site root (staging, local mock)
pub const CREDIT_MUTUEL_BASE_URL_ENV: &str = "CREDIT_MUTUEL_BASE_URL";

const AUTH_PATH: &str = "/fr/authentification.html";
const VALIDATION_PATH: &str = "/fr/banque/validation.aspx";
const APPROVAL_STATE_PATH: &str = "/fr/banque/async/otp/SOSD_OTP_GetTransactionState.htm";
const DOWNLOAD_PATH: &str = "/fr/banque/compte/telechargement.cgi";

/// Cookie set once the out-of-band approval succeeded (valid ~90 days)
const SESSION_MARKER_COOKIE: &str = "auth_client_state";

// Statement export options
const CSV_FORMAT_EXCEL_XP: &str = "2";
const CSV_DATE_DAY_MONTH_YEAR: &str = "0";
const CSV_FIELD_SEPARATOR_SEMICOLON: &str = "0";
const CSV_ONE_COLUMN_PER_AMOUNT: &str = "0";
const CSV_DECIMAL_SEPARATOR_DOT: &str = "1";

/// Field names of the continuation state
pub mod fields {
    pub const LOGIN: &str = "login";
    pub const PASSWORD: &str = "password";
    pub const TRANSACTION_ID: &str = "transactionId";
    pub const VALIDATION_URL: &str = "validationUrl";
    pub const OTP_HIDDEN: &str = "otpHidden";
    pub const COOKIES: &str = "cookies";
    pub const SESSION_MARKER: &str = "sessionMarker";
}

pub const AWAITING_APPROVAL_MESSAGE: &str =
    "Waiting for you to approve the connection in the Crédit Mutuel app...";
pub const REQUEST_CANCELLED_MESSAGE: &str = "The approval request was cancelled";
/// Used when the site rejects the login without an inline message
pub const LOGIN_REJECTED_MESSAGE: &str = "Crédit Mutuel rejected the credentials";

/// Get the site root, checking the environment variable first
pub fn get_base_url() -> String {
    std::env::var(CREDIT_MUTUEL_BASE_URL_ENV)
        .ok()
        .filter(|url| !url.trim().is_empty())
        .unwrap_or_else(|| CREDIT_MUTUEL_PRODUCTION_URL.to_string())
}

/// Build the adapter from configuration
///
/// The environment variable wins over `banks.credit-mutuel.baseUrl`.
pub fn factory(config: &Config) -> Result<Arc<dyn BankAdapter>> {
    let base_url = match std::env::var(CREDIT_MUTUEL_BASE_URL_ENV) {
        Ok(url) if !url.trim().is_empty() => url,
        _ => config
            .bank_base_url(BANK_ID)
            .map(str::to_string)
            .unwrap_or_else(get_base_url),
    };

    let adapter = CreditMutuelAdapter::new_with_base_url(&base_url, config.http_timeout)
        .map_err(|e| Error::Config(format!("{:#}", e)))?;
    Ok(Arc::new(adapter))
}

/// Where the login form sent us
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoginOutcome {
    /// Customer area home: authenticated
    Home,
    /// Validation page: an out-of-band approval is required
    Challenge,
}

/// One HTTP exchange, reduced to what the handshake looks at
struct Reply {
    status: StatusCode,
    location: Option<Url>,
    body: String,
}

/// Crédit Mutuel website adapter
///
/// Holds only the HTTP client and site root; every call builds its own
/// cookie jar.
#[derive(Debug)]
pub struct CreditMutuelAdapter {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

impl CreditMutuelAdapter {
    /// Create an adapter against the production site.
    ///
    /// Uses the `CREDIT_MUTUEL_BASE_URL` environment variable if set.
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        Self::new_with_base_url(&get_base_url(), timeout)
    }

    /// Create an adapter against a custom site root.
    pub fn new_with_base_url(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .with_context(|| format!("Invalid Crédit Mutuel base URL: {}", base_url))?;

        if base_url.host_str().is_none() {
            anyhow::bail!("Crédit Mutuel base URL has no host: {}", base_url);
        }

        // Redirects carry the handshake outcome, so they are never followed
        let client = Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn host(&self) -> &str {
        self.base_url.host_str().unwrap_or_default()
    }

    fn resolve(&self, target: &str) -> Result<Url> {
        self.base_url
            .join(target)
            .map_err(|_| Error::scrape("unusable link in bank page"))
    }

    // -------------------------------------------------------------------------
    // HTTP plumbing
    // -------------------------------------------------------------------------

    fn get(&self, jar: &mut CookieJar, target: &str) -> Result<Reply> {
        let url = self.resolve(target)?;
        tracing::debug!(bank = BANK_ID, method = "GET", path = url.path(), "bank request");
        let request = self.client.get(url);
        self.send(jar, request)
    }

    fn post_form(&self, jar: &mut CookieJar, target: &str, form: &[(&str, &str)]) -> Result<Reply> {
        let url = self.resolve(target)?;
        tracing::debug!(bank = BANK_ID, method = "POST", path = url.path(), "bank request");
        let request = self.client.post(url).form(form);
        self.send(jar, request)
    }

    fn send(&self, jar: &mut CookieJar, request: RequestBuilder) -> Result<Reply> {
        let request = match jar.header_value() {
            Some(cookies) => request.header(COOKIE, cookies),
            None => request,
        };

        let response = request.send().map_err(|e| self.map_request_error(e))?;

        let status = response.status();
        jar.store_set_cookie_headers(
            response
                .headers()
                .get_all(SET_COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok()),
            self.host(),
        );

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|l| self.base_url.join(l).ok());

        let body = response.text().map_err(|e| self.map_request_error(e))?;

        tracing::debug!(bank = BANK_ID, status = status.as_u16(), "bank response");

        Ok(Reply {
            status,
            location,
            body,
        })
    }

    /// Map request errors to transient failures with a readable cause
    fn map_request_error(&self, error: reqwest::Error) -> Error {
        // URLs may carry anti-forgery tokens
        let error = error.without_url();
        if error.is_timeout() {
            Error::Transient(format!(
                "Connection timed out after {} seconds",
                self.timeout.as_secs()
            ))
        } else if error.is_connect() {
            Error::Transient("Unable to connect to Crédit Mutuel servers".to_string())
        } else {
            Error::Transient(format!("Crédit Mutuel request failed: {}", error))
        }
    }

    /// Check a reply that should be a plain page
    fn check_response_status(&self, reply: &Reply, step: &str) -> Result<()> {
        let status = reply.status;
        if status.is_success() {
            Ok(())
        } else if status.is_server_error() {
            Err(unavailable(status))
        } else {
            Err(Error::scrape(format!(
                "unexpected HTTP {} during {}",
                status.as_u16(),
                step
            )))
        }
    }

    // -------------------------------------------------------------------------
    // Handshake steps
    // -------------------------------------------------------------------------

    /// Post the login form, attaching the session marker if one is known
    fn login(&self, jar: &mut CookieJar, inputs: &Fields) -> Result<LoginOutcome> {
        let password = require_str(inputs, fields::PASSWORD)?;
        let login = require_str(inputs, fields::LOGIN)?;
        let marker = optional_str(inputs, fields::SESSION_MARKER);

        if let Some(marker) = marker {
            jar.set(StoredCookie::new(SESSION_MARKER_COOKIE, marker, self.host()));
        }

        let reply = self.post_form(
            jar,
            AUTH_PATH,
            &[("_cm_user", login), ("_cm_pwd", password), ("flag", "password")],
        )?;

        if reply.status.is_server_error() {
            return Err(unavailable(reply.status));
        }

        if !reply.status.is_redirection() {
            let message = login_error_message(&reply.body)?
                .unwrap_or_else(|| LOGIN_REJECTED_MESSAGE.to_string());
            return Err(Error::Authentication(message));
        }

        let location = reply
            .location
            .ok_or_else(|| Error::scrape("login redirect without destination"))?;

        match location.path() {
            // Sent back to the login form: the credentials were not accepted
            AUTH_PATH => return Err(Error::Authentication(LOGIN_REJECTED_MESSAGE.to_string())),
            VALIDATION_PATH => {}
            _ => {
                tracing::debug!(bank = BANK_ID, step = "login", "primary authentication accepted");
                return Ok(LoginOutcome::Home);
            }
        }

        if marker.is_some() {
            // The marker no longer spares us the approval: it is stale
            return Err(Error::ExpiredAuthentication(BANK_NAME.to_string()));
        }

        tracing::debug!(bank = BANK_ID, step = "login", "approval required");
        Ok(LoginOutcome::Challenge)
    }

    /// Scrape the validation page into a challenge to resume later
    fn issue_challenge(&self, mut jar: CookieJar, login: &str, password: &str) -> Result<AuthOutcome> {
        let reply = self.get(&mut jar, VALIDATION_PATH)?;
        self.check_response_status(&reply, "challenge")?;

        let page = parse_challenge_page(&reply.body)?;

        let mut state = Fields::new();
        state.insert(fields::LOGIN.into(), JsonValue::from(login));
        state.insert(fields::PASSWORD.into(), JsonValue::from(password));
        state.insert(fields::TRANSACTION_ID.into(), JsonValue::from(page.transaction_id));
        state.insert(fields::VALIDATION_URL.into(), JsonValue::from(page.validation_url));
        state.insert(fields::OTP_HIDDEN.into(), JsonValue::from(page.otp_hidden));
        state.insert(fields::COOKIES.into(), jar.to_value());

        Ok(AuthOutcome::Challenge {
            state,
            message: page.message,
        })
    }

    /// Ask the bank whether the pending approval went through
    fn poll_approval(&self, inputs: &Fields, login: &str, password: &str) -> Result<AuthOutcome> {
        let transaction_id = require_str(inputs, fields::TRANSACTION_ID)?;
        let cookies = inputs
            .get(fields::COOKIES)
            .ok_or_else(|| Error::required(fields::COOKIES))?;
        let mut jar = CookieJar::restore(cookies, fields::COOKIES)?;

        let reply = self.post_form(
            &mut jar,
            APPROVAL_STATE_PATH,
            &[("transactionId", transaction_id)],
        )?;
        self.check_response_status(&reply, "approval polling")?;

        let status = parse_approval_status(&reply.body)?;
        tracing::debug!(bank = BANK_ID, step = "poll", status = status.as_str(), "approval state");

        match status {
            ApprovalStatus::Pending => Ok(AuthOutcome::Waiting {
                message: AWAITING_APPROVAL_MESSAGE.to_string(),
            }),
            ApprovalStatus::Cancelled => Ok(AuthOutcome::Waiting {
                message: REQUEST_CANCELLED_MESSAGE.to_string(),
            }),
            ApprovalStatus::Validated => {
                let validation_url = require_str(inputs, fields::VALIDATION_URL)?;
                let otp_hidden = require_str(inputs, fields::OTP_HIDDEN)?;

                // Submitting the validation form sets the long-lived cookie
                let reply = self.post_form(
                    &mut jar,
                    validation_url,
                    &[
                        ("otp_hidden", otp_hidden),
                        ("_FID_DoValidate.x", "0"),
                        ("_FID_DoValidate.y", "0"),
                    ],
                )?;
                if reply.status.is_server_error() {
                    return Err(unavailable(reply.status));
                }

                let marker = jar
                    .get(SESSION_MARKER_COOKIE)
                    .ok_or_else(|| Error::scrape("session marker not set after validation"))?;

                Ok(AuthOutcome::Complete {
                    state: credential_state(login, password, Some(marker)),
                })
            }
        }
    }

    /// Log in and open the statement download page
    ///
    /// Data calls need a complete credential set: a challenge here means the
    /// marker is missing or stale.
    fn open_download_page(&self, inputs: &Fields) -> Result<(CookieJar, DownloadPage)> {
        let mut jar = CookieJar::new();
        if self.login(&mut jar, inputs)? == LoginOutcome::Challenge {
            return Err(Error::ExpiredAuthentication(BANK_NAME.to_string()));
        }

        let reply = self.get(&mut jar, DOWNLOAD_PATH)?;
        self.check_response_status(&reply, "account listing")?;

        Ok((jar, parse_download_page(&reply.body)?))
    }
}

fn unavailable(status: StatusCode) -> Error {
    Error::Transient(format!(
        "Crédit Mutuel is unavailable (HTTP {})",
        status.as_u16()
    ))
}

/// Replayable credential set
fn credential_state(login: &str, password: &str, marker: Option<&str>) -> Fields {
    let mut state = Fields::new();
    state.insert(fields::LOGIN.into(), JsonValue::from(login));
    state.insert(fields::PASSWORD.into(), JsonValue::from(password));
    if let Some(marker) = marker {
        state.insert(fields::SESSION_MARKER.into(), JsonValue::from(marker));
    }
    state
}

impl BankAdapter for CreditMutuelAdapter {
    fn descriptor(&self) -> BankDescriptor {
        BankDescriptor {
            id: BANK_ID.to_string(),
            display_name: BANK_NAME.to_string(),
            required_fields: vec![
                AuthInput::text(fields::LOGIN),
                AuthInput::secret(fields::PASSWORD),
            ],
        }
    }

    fn authenticate(&self, inputs: &Fields) -> Result<AuthOutcome> {
        let password = require_str(inputs, fields::PASSWORD)?;
        let login = require_str(inputs, fields::LOGIN)?;

        if optional_str(inputs, fields::TRANSACTION_ID).is_some() {
            return self.poll_approval(inputs, login, password);
        }

        let mut jar = CookieJar::new();
        match self.login(&mut jar, inputs)? {
            LoginOutcome::Home => Ok(AuthOutcome::Complete {
                state: credential_state(
                    login,
                    password,
                    optional_str(inputs, fields::SESSION_MARKER),
                ),
            }),
            LoginOutcome::Challenge => self.issue_challenge(jar, login, password),
        }
    }

    fn list_accounts(&self, inputs: &Fields) -> Result<Vec<Account>> {
        let (_, page) = self.open_download_page(inputs)?;
        Ok(page.accounts())
    }

    fn fetch_transactions(&self, account_id: &str, inputs: &Fields) -> Result<Vec<Transaction>> {
        let (mut jar, page) = self.open_download_page(inputs)?;

        let checkbox = page
            .checkbox_for(account_id)
            .ok_or_else(|| Error::UnknownAccountId(account_id.to_string()))?;

        let reply = self.post_form(
            &mut jar,
            &page.export_url,
            &[
                ("data_formats_selected", "csv"),
                ("data_formats_options_csv_fileformat", CSV_FORMAT_EXCEL_XP),
                ("data_formats_options_csv_dateformat", CSV_DATE_DAY_MONTH_YEAR),
                ("data_formats_options_csv_fieldseparator", CSV_FIELD_SEPARATOR_SEMICOLON),
                ("data_formats_options_csv_amountcolnumber", CSV_ONE_COLUMN_PER_AMOUNT),
                ("data_formats_options_csv_decimalseparator", CSV_DECIMAL_SEPARATOR_DOT),
                (checkbox, "on"),
                ("_FID_DoDownload.x", "0"),
                ("_FID_DoValidate.y", "0"),
            ],
        )?;
        self.check_response_status(&reply, "statement export")?;

        let transactions = parse_statement_csv(&reply.body)?;
        tracing::debug!(bank = BANK_ID, count = transactions.len(), "statement parsed");
        Ok(transactions)
    }
}
