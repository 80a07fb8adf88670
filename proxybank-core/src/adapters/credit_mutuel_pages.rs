//! Crédit Mutuel page parsing
//!
//! Pure functions turning the bank's HTML, XML and CSV responses into
//! values the adapter acts on. Nothing here performs I/O.

use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::domain::result::{Error, Result};
use crate::domain::{Account, Transaction};

/// Date format of the exported statement (day/month/year)
const CSV_DATE_FORMAT: &str = "%d/%m/%Y";

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::scrape(format!("invalid selector {}: {}", css, e)))
}

fn regex(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::scrape(format!("invalid pattern: {}", e)))
}

/// Collapse runs of whitespace into single spaces and trim
pub(crate) fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_text(element: &ElementRef<'_>) -> String {
    normalize_whitespace(&element.text().collect::<String>())
}

/// Inline error shown on a rejected login
pub fn login_error_message(html: &str) -> Result<Option<String>> {
    let document = Html::parse_document(html);
    let err = selector(r#"[id="ident"] div.err"#)?;

    Ok(document
        .select(&err)
        .next()
        .map(|e| element_text(&e))
        .filter(|m| !m.is_empty()))
}

/// What the out-of-band approval page gives us to resume later
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengePage {
    pub transaction_id: String,
    /// Action of the validation form, as found in the page (usually relative)
    pub validation_url: String,
    pub otp_hidden: String,
    /// Instruction text for the user
    pub message: String,
}

/// Parse the validation page shown after a login that needs approval
pub fn parse_challenge_page(html: &str) -> Result<ChallengePage> {
    let transaction_id = regex(r"transactionId: '(.+?)'")?
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| Error::scrape("approval transaction id not found"))?;

    let document = Html::parse_document(html);

    let validation_url = document
        .select(&selector(r#"form[id="C:P:F"]"#)?)
        .next()
        .and_then(|form| form.value().attr("action"))
        .map(str::to_string)
        .ok_or_else(|| Error::scrape("validation form not found"))?;

    let otp_hidden = document
        .select(&selector(r#"input[name="otp_hidden"]"#)?)
        .next()
        .and_then(|input| input.value().attr("value"))
        .map(str::to_string)
        .ok_or_else(|| Error::scrape("hidden confirmation token not found"))?;

    let message = document
        .select(&selector(r#"[id="inMobileAppMessage"]"#)?)
        .next()
        .map(|e| element_text(&e))
        .ok_or_else(|| Error::scrape("approval instructions not found"))?;

    Ok(ChallengePage {
        transaction_id,
        validation_url,
        otp_hidden,
        message,
    })
}

/// State of an out-of-band approval request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalStatus {
    Pending,
    Cancelled,
    Validated,
}

impl ApprovalStatus {
    /// Unknown or missing states count as pending
    pub fn from_state(state: Option<&str>) -> Self {
        match state {
            Some("VALIDATED") => ApprovalStatus::Validated,
            Some("CANCELLED") => ApprovalStatus::Cancelled,
            _ => ApprovalStatus::Pending,
        }
    }

    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Cancelled => "cancelled",
            ApprovalStatus::Validated => "validated",
        }
    }
}

/// Parse the XML body of the approval state endpoint
pub fn parse_approval_status(body: &str) -> Result<ApprovalStatus> {
    let state = regex(r"<transactionState>\s*([^<]*?)\s*</transactionState>")?
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str());

    Ok(ApprovalStatus::from_state(state))
}

/// An account and the export form control that selects it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportAccount {
    pub account: Account,
    pub checkbox: String,
}

/// The statement download page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadPage {
    /// Action of the export form, as found in the page
    pub export_url: String,
    pub accounts: Vec<ExportAccount>,
}

impl DownloadPage {
    pub fn accounts(&self) -> Vec<Account> {
        self.accounts.iter().map(|a| a.account.clone()).collect()
    }

    /// Name of the checkbox selecting the given account
    pub fn checkbox_for(&self, account_id: &str) -> Option<&str> {
        self.accounts
            .iter()
            .find(|a| a.account.id == account_id)
            .map(|a| a.checkbox.as_str())
    }
}

/// Split an account label into (id, name)
///
/// Labels read `<bank> <account number> <suffix> <display name>`; the first
/// three tokens joined give an id that is stable across sessions.
fn split_account_label(label: &str) -> Option<(String, String)> {
    let parts: Vec<&str> = label.splitn(4, ' ').collect();
    if parts.len() < 3 {
        return None;
    }
    let id = parts[..3].concat();
    let name = parts.get(3).copied().unwrap_or_default().to_string();
    Some((id, name))
}

/// Parse the download page into its export form and account rows
pub fn parse_download_page(html: &str) -> Result<DownloadPage> {
    let document = Html::parse_document(html);
    let table_sel = selector(r#"[id="account-table"]"#)?;
    let label_sel = selector("label[for]")?;
    let input_sel = selector("input[id]")?;

    // The export form is whichever form wraps the account table
    let form = document
        .select(&selector("form")?)
        .find(|form| form.select(&table_sel).next().is_some())
        .ok_or_else(|| Error::scrape("statement export form not found"))?;

    let export_url = form
        .value()
        .attr("action")
        .map(str::to_string)
        .ok_or_else(|| Error::scrape("statement export form has no action"))?;

    let table = form
        .select(&table_sel)
        .next()
        .ok_or_else(|| Error::scrape("account table not found"))?;

    let mut accounts = Vec::new();
    for label in table.select(&label_sel) {
        let text = element_text(&label);
        let Some((id, name)) = split_account_label(&text) else {
            tracing::debug!("skipping account row without account number");
            continue;
        };

        let control_id = label.value().attr("for").unwrap_or_default();
        let checkbox = table
            .select(&input_sel)
            .find(|input| input.value().id() == Some(control_id))
            .and_then(|input| input.value().attr("name"))
            .map(str::to_string)
            .ok_or_else(|| Error::scrape("account checkbox not found"))?;

        let account = Account::new(id, name);
        if let Err(reason) = account.validate() {
            tracing::debug!(reason, "skipping account row");
            continue;
        }

        accounts.push(ExportAccount { account, checkbox });
    }

    Ok(DownloadPage {
        export_url,
        accounts,
    })
}

/// Parse an exported statement
///
/// Columns: date; value date; amount; description; balance. The header line
/// and blank lines are skipped. The export never quotes fields, so a `"` in a
/// description is plain text.
pub fn parse_statement_csv(body: &str) -> Result<Vec<Transaction>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .quoting(false)
        .has_headers(true)
        .flexible(true)
        .from_reader(body.as_bytes());

    let mut transactions = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| Error::scrape(format!("statement line {}: {}", line + 2, e)))?;

        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        if record.len() < 5 {
            return Err(Error::scrape(format!(
                "statement line {} has {} columns, expected 5",
                line + 2,
                record.len()
            )));
        }

        let date = NaiveDate::parse_from_str(record[0].trim(), CSV_DATE_FORMAT)
            .map_err(|_| Error::scrape(format!("statement line {} has an invalid date", line + 2)))?;

        transactions.push(Transaction::new(
            date,
            &record[3],
            record[2].trim(),
            record[4].trim(),
        ));
    }

    Ok(transactions)
}
