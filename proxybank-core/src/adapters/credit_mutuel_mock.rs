//! Mock bank website for testing
//!
//! Serves a scripted sequence of responses, one per incoming request, and
//! records every request (method, path, headers, form body) so tests can
//! assert on the exact exchange. A request arriving after the script is
//! exhausted gets a 500.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// One scripted response
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl MockResponse {
    pub fn ok(body: &str) -> Self {
        Self::status(200, body)
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    pub fn redirect(location: &str) -> Self {
        Self::status(302, "").with_header("Location", location)
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// A request as received by the mock server
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    /// Path including the query string
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    /// Header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Decoded `application/x-www-form-urlencoded` body
    pub fn form(&self) -> Vec<(String, String)> {
        url::form_urlencoded::parse(self.body.as_bytes())
            .into_owned()
            .collect()
    }

    pub fn form_value(&self, name: &str) -> Option<String> {
        self.form().into_iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn path_without_query(&self) -> &str {
        self.path.split('?').next().unwrap_or(&self.path)
    }
}

/// Mock bank website
pub struct MockBankServer {
    port: u16,
    running: Arc<AtomicBool>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    script: Arc<Mutex<VecDeque<MockResponse>>>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl MockBankServer {
    /// Start a server on a random available port with the given script
    pub fn start(script: Vec<MockResponse>) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();
        let running = Arc::new(AtomicBool::new(true));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let script = Arc::new(Mutex::new(VecDeque::from(script)));

        // Set listener to non-blocking for graceful shutdown
        listener.set_nonblocking(true)?;

        let running_clone = running.clone();
        let requests_clone = requests.clone();
        let script_clone = script.clone();

        let thread_handle = thread::spawn(move || {
            while running_clone.load(Ordering::SeqCst) {
                match listener.accept() {
                    Ok((stream, _)) => {
                        // The bank session is strictly sequential, so are we
                        handle_connection(stream, &requests_clone, &script_clone);
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(Duration::from_millis(5));
                    }
                    Err(_) => break,
                }
            }
        });

        Ok(Self {
            port,
            running,
            requests,
            script,
            thread_handle: Some(thread_handle),
        })
    }

    /// Get the base URL for this mock server
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Requests received so far, in order
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Scripted responses not served yet
    pub fn remaining(&self) -> usize {
        self.script.lock().map(|s| s.len()).unwrap_or_default()
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MockBankServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn handle_connection(
    stream: TcpStream,
    requests: &Mutex<Vec<RecordedRequest>>,
    script: &Mutex<VecDeque<MockResponse>>,
) {
    let _ = stream.set_nonblocking(false);
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));

    let Some(request) = read_request(&stream) else {
        return;
    };

    if let Ok(mut log) = requests.lock() {
        log.push(request);
    }

    let response = script
        .lock()
        .ok()
        .and_then(|mut s| s.pop_front())
        .unwrap_or_else(|| MockResponse::status(500, "unexpected request"));

    let mut stream = stream;
    send_response(&mut stream, &response);
}

fn read_request(stream: &TcpStream) -> Option<RecordedRequest> {
    let mut reader = BufReader::new(stream);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).ok()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).ok()?;
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    let content_length = headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = vec![0; content_length];
    reader.read_exact(&mut body).ok()?;

    Some(RecordedRequest {
        method,
        path,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

fn send_response(stream: &mut TcpStream, response: &MockResponse) {
    let mut head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n",
        response.status,
        status_text(response.status),
        response.body.len()
    );
    for (name, value) in &response.headers {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    head.push_str("\r\n");

    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(response.body.as_bytes());
    let _ = stream.flush();
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        302 => "Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::credit_mutuel::{
        fields, CreditMutuelAdapter, AWAITING_APPROVAL_MESSAGE, LOGIN_REJECTED_MESSAGE,
        REQUEST_CANCELLED_MESSAGE,
    };
    use crate::adapters::credit_mutuel_pages::fixtures::*;
    use crate::adapters::secret_file::StaticSecretStore;
    use crate::domain::result::Error;
    use crate::domain::{Account, AuthOutcome, Fields};
    use crate::ports::BankAdapter;
    use crate::services::{BankService, CryptoService};
    use serde_json::{json, Value as JsonValue};

    const LOGIN_PATH: &str = "/fr/authentification.html";
    const VALIDATION_PATH: &str = "/fr/banque/validation.aspx";
    const STATE_PATH: &str = "/fr/banque/async/otp/SOSD_OTP_GetTransactionState.htm";
    const DOWNLOAD_PATH: &str = "/fr/banque/compte/telechargement.cgi";
    const HOME_PATH: &str = "/fr/banque/pageaccueil.html";

    fn adapter(server: &MockBankServer) -> CreditMutuelAdapter {
        CreditMutuelAdapter::new_with_base_url(&server.base_url(), Duration::from_secs(5)).unwrap()
    }

    fn bag(value: JsonValue) -> Fields {
        value.as_object().cloned().unwrap()
    }

    fn credentials() -> Fields {
        bag(json!({"login": "123456789", "password": "s3cret"}))
    }

    fn login_to_challenge() -> MockResponse {
        MockResponse::redirect(VALIDATION_PATH).with_header("Set-Cookie", "IdSes=token; Path=/; Secure")
    }

    fn login_to_home() -> MockResponse {
        MockResponse::redirect(HOME_PATH).with_header("Set-Cookie", "IdSes=token; Path=/; Secure")
    }

    /// State as issued by a challenge, with the jar holding IdSes
    fn challenge_state() -> Fields {
        let server = MockBankServer::start(vec![login_to_challenge(), MockResponse::ok(CHALLENGE_PAGE)]).unwrap();
        match adapter(&server).authenticate(&credentials()).unwrap() {
            AuthOutcome::Challenge { state, .. } => state,
            other => panic!("expected challenge, got {:?}", other),
        }
    }

    fn sorted_keys(fields: &Fields) -> Vec<&str> {
        let mut keys: Vec<&str> = fields.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    #[test]
    fn test_missing_password_fails_before_any_request() {
        let server = MockBankServer::start(vec![]).unwrap();
        let err = adapter(&server).authenticate(&Fields::new()).unwrap_err();
        assert!(matches!(err, Error::RequiredValue(ref f) if f == "password"));
        assert!(server.requests().is_empty());
    }

    #[test]
    fn test_missing_login() {
        let server = MockBankServer::start(vec![]).unwrap();
        let err = adapter(&server)
            .authenticate(&bag(json!({"password": "s3cret"})))
            .unwrap_err();
        assert!(matches!(err, Error::RequiredValue(ref f) if f == "login"));
        assert!(server.requests().is_empty());
    }

    #[test]
    fn test_rejected_credentials() {
        let server = MockBankServer::start(vec![MockResponse::ok(LOGIN_FAILED_PAGE)]).unwrap();
        let err = adapter(&server).authenticate(&credentials()).unwrap_err();
        match err {
            Error::Authentication(message) => assert_eq!(message, LOGIN_FAILED_MESSAGE),
            other => panic!("expected Authentication, got {:?}", other),
        }
    }

    #[test]
    fn test_login_posts_credentials() {
        let server = MockBankServer::start(vec![login_to_home()]).unwrap();
        adapter(&server).authenticate(&credentials()).unwrap();

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].path, LOGIN_PATH);
        assert_eq!(requests[0].form_value("_cm_user").as_deref(), Some("123456789"));
        assert_eq!(requests[0].form_value("_cm_pwd").as_deref(), Some("s3cret"));
        assert_eq!(requests[0].form_value("flag").as_deref(), Some("password"));
        assert!(requests[0].header("cookie").is_none());
    }

    #[test]
    fn test_challenge_issued() {
        let server =
            MockBankServer::start(vec![login_to_challenge(), MockResponse::ok(CHALLENGE_PAGE)]).unwrap();

        let outcome = adapter(&server).authenticate(&credentials()).unwrap();
        let AuthOutcome::Challenge { state, message } = outcome else {
            panic!("expected challenge");
        };

        assert_eq!(message, CHALLENGE_MESSAGE);
        assert_eq!(
            sorted_keys(&state),
            vec!["cookies", "login", "otpHidden", "password", "transactionId", "validationUrl"]
        );
        assert_eq!(state[fields::TRANSACTION_ID], "aTransactionId");
        assert_eq!(state[fields::OTP_HIDDEN], "anOtpHiddenToken");
        assert_eq!(state[fields::VALIDATION_URL], CHALLENGE_VALIDATION_URL);
        assert_eq!(state[fields::COOKIES][0]["name"], "IdSes");

        let requests = server.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].method, "GET");
        assert_eq!(requests[1].path, VALIDATION_PATH);
        assert_eq!(requests[1].header("cookie"), Some("IdSes=token"));
    }

    #[test]
    fn test_absolute_challenge_redirect() {
        let server = MockBankServer::start(vec![
            MockResponse::redirect("https://www.creditmutuel.fr/fr/banque/validation.aspx"),
            MockResponse::ok(CHALLENGE_PAGE),
        ])
        .unwrap();
        let outcome = adapter(&server).authenticate(&credentials()).unwrap();
        assert!(matches!(outcome, AuthOutcome::Challenge { .. }));
    }

    #[test]
    fn test_stale_marker_is_expired() {
        let server = MockBankServer::start(vec![login_to_challenge()]).unwrap();
        let mut inputs = credentials();
        inputs.insert(fields::SESSION_MARKER.into(), json!("oldMarker"));

        let err = adapter(&server).authenticate(&inputs).unwrap_err();
        assert!(matches!(err, Error::ExpiredAuthentication(ref bank) if bank == "Crédit Mutuel"));

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].header("cookie"), Some("auth_client_state=oldMarker"));
    }

    #[test]
    fn test_valid_marker_completes_directly() {
        let server = MockBankServer::start(vec![login_to_home()]).unwrap();
        let mut inputs = credentials();
        inputs.insert(fields::SESSION_MARKER.into(), json!("goodMarker"));

        let outcome = adapter(&server).authenticate(&inputs).unwrap();
        assert_eq!(
            outcome,
            AuthOutcome::Complete {
                state: bag(json!({"login": "123456789", "password": "s3cret", "sessionMarker": "goodMarker"}))
            }
        );
    }

    #[test]
    fn test_pending_approval_is_idempotent() {
        let state = challenge_state();
        let server = MockBankServer::start(vec![
            MockResponse::ok(STATE_PENDING),
            MockResponse::ok(STATE_PENDING),
        ])
        .unwrap();
        let adapter = adapter(&server);

        let first = adapter.authenticate(&state).unwrap();
        let second = adapter.authenticate(&state).unwrap();
        assert_eq!(
            first,
            AuthOutcome::Waiting {
                message: AWAITING_APPROVAL_MESSAGE.to_string()
            }
        );
        assert_eq!(first, second);

        for request in server.requests() {
            assert_eq!(request.method, "POST");
            assert_eq!(request.path, STATE_PATH);
            assert_eq!(request.form_value("transactionId").as_deref(), Some("aTransactionId"));
            assert_eq!(request.header("cookie"), Some("IdSes=token"));
        }
    }

    #[test]
    fn test_cancelled_approval() {
        let state = challenge_state();
        let server = MockBankServer::start(vec![MockResponse::ok(STATE_CANCELLED)]).unwrap();

        let outcome = adapter(&server).authenticate(&state).unwrap();
        assert_eq!(
            outcome,
            AuthOutcome::Waiting {
                message: REQUEST_CANCELLED_MESSAGE.to_string()
            }
        );
        assert_ne!(REQUEST_CANCELLED_MESSAGE, AWAITING_APPROVAL_MESSAGE);
    }

    #[test]
    fn test_unknown_approval_state_is_pending() {
        let state = challenge_state();
        let server = MockBankServer::start(vec![MockResponse::ok(
            "<root><transactionState>EXPIRING</transactionState></root>",
        )])
        .unwrap();

        let outcome = adapter(&server).authenticate(&state).unwrap();
        assert!(matches!(outcome, AuthOutcome::Waiting { ref message } if message == AWAITING_APPROVAL_MESSAGE));
    }

    #[test]
    fn test_validated_approval_yields_session_marker() {
        let state = challenge_state();
        let server = MockBankServer::start(vec![
            MockResponse::ok(STATE_VALIDATED),
            MockResponse::status(302, "").with_header("Set-Cookie", "auth_client_state=anAuthClientStateToken"),
        ])
        .unwrap();

        let outcome = adapter(&server).authenticate(&state).unwrap();
        assert_eq!(
            outcome,
            AuthOutcome::Complete {
                state: bag(json!({
                    "login": "123456789",
                    "password": "s3cret",
                    "sessionMarker": "anAuthClientStateToken"
                }))
            }
        );

        let requests = server.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].method, "POST");
        assert_eq!(requests[1].path_without_query(), VALIDATION_PATH);
        assert!(requests[1].path.contains("k___ValidateAntiForgeryToken=aCsrfToken"));
        assert_eq!(requests[1].form_value("otp_hidden").as_deref(), Some("anOtpHiddenToken"));
        assert_eq!(requests[1].form_value("_FID_DoValidate.x").as_deref(), Some("0"));
        assert_eq!(requests[1].form_value("_FID_DoValidate.y").as_deref(), Some("0"));
    }

    #[test]
    fn test_validated_without_marker_cookie_is_scrape_error() {
        let state = challenge_state();
        let server = MockBankServer::start(vec![
            MockResponse::ok(STATE_VALIDATED),
            MockResponse::status(302, ""),
        ])
        .unwrap();

        let err = adapter(&server).authenticate(&state).unwrap_err();
        assert_eq!(err.kind(), "scrape");
    }

    #[test]
    fn test_list_accounts() {
        let server =
            MockBankServer::start(vec![login_to_home(), MockResponse::ok(DOWNLOAD_PAGE)]).unwrap();
        let mut inputs = credentials();
        inputs.insert(fields::SESSION_MARKER.into(), json!("goodMarker"));

        let accounts = adapter(&server).list_accounts(&inputs).unwrap();
        assert_eq!(accounts.len(), 3);
        assert_eq!(
            accounts[0],
            Account::new("3602500012345601", "COMPTE CHEQUE EUROCOMPTE M T TEST")
        );

        let requests = server.requests();
        assert_eq!(requests[1].method, "GET");
        assert_eq!(requests[1].path, DOWNLOAD_PATH);
        assert_eq!(
            requests[1].header("cookie"),
            Some("auth_client_state=goodMarker; IdSes=token")
        );
    }

    #[test]
    fn test_data_call_with_challenge_is_expired() {
        let server = MockBankServer::start(vec![login_to_challenge()]).unwrap();
        let err = adapter(&server).list_accounts(&credentials()).unwrap_err();
        assert!(matches!(err, Error::ExpiredAuthentication(_)));
        assert_eq!(server.requests().len(), 1);
    }

    #[test]
    fn test_fetch_transactions() {
        let server = MockBankServer::start(vec![
            login_to_home(),
            MockResponse::ok(DOWNLOAD_PAGE),
            MockResponse::ok(STATEMENT_CSV),
        ])
        .unwrap();

        let transactions = adapter(&server)
            .fetch_transactions("3602500012345602", &credentials())
            .unwrap();
        assert_eq!(transactions.len(), 3);
        assert_eq!(transactions[0].description, "VIR DE M T TEST");
        assert_eq!(transactions[2].amount, "-176.47");

        let requests = server.requests();
        assert_eq!(requests.len(), 3);
        let export = &requests[2];
        assert_eq!(export.method, "POST");
        assert_eq!(export.path, "/fr/banque/compte/telechargement.cgi?withParameters=true");
        assert_eq!(
            export.form_value("CB:data_accounts_account_2__ischecked").as_deref(),
            Some("on")
        );
        assert_eq!(export.form_value("CB:data_accounts_account_ischecked"), None);
        assert_eq!(export.form_value("data_formats_selected").as_deref(), Some("csv"));
        assert_eq!(
            export.form_value("data_formats_options_csv_fileformat").as_deref(),
            Some("2")
        );
        assert_eq!(
            export.form_value("data_formats_options_csv_decimalseparator").as_deref(),
            Some("1")
        );
        assert_eq!(export.form_value("_FID_DoDownload.x").as_deref(), Some("0"));
    }

    #[test]
    fn test_unknown_account_makes_no_export_request() {
        let server = MockBankServer::start(vec![
            login_to_home(),
            MockResponse::ok(DOWNLOAD_PAGE),
            MockResponse::ok(STATEMENT_CSV),
        ])
        .unwrap();

        let err = adapter(&server)
            .fetch_transactions("0000000000", &credentials())
            .unwrap_err();
        assert!(matches!(err, Error::UnknownAccountId(ref id) if id == "0000000000"));
        assert_eq!(server.requests().len(), 2);
        assert_eq!(server.remaining(), 1);
    }

    #[test]
    fn test_server_error_is_transient() {
        let state = challenge_state();
        let server = MockBankServer::start(vec![MockResponse::status(503, "down")]).unwrap();
        let err = adapter(&server).authenticate(&state).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_unreachable_bank_is_transient() {
        let server = MockBankServer::start(vec![]).unwrap();
        let base_url = server.base_url();
        drop(server);

        let adapter = CreditMutuelAdapter::new_with_base_url(&base_url, Duration::from_secs(2)).unwrap();
        let err = adapter.authenticate(&credentials()).unwrap_err();
        assert!(matches!(err, Error::Transient(_)));
    }

    #[test]
    fn test_silent_bank_times_out_as_transient() {
        // Connections complete in the backlog but nothing ever answers
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let adapter = CreditMutuelAdapter::new_with_base_url(&base_url, Duration::from_secs(1)).unwrap();
        let err = adapter.authenticate(&credentials()).unwrap_err();
        match err {
            Error::Transient(cause) => assert_eq!(cause, "Connection timed out after 1 seconds"),
            other => panic!("expected Transient, got {:?}", other),
        }
        drop(listener);
    }

    #[test]
    fn test_redirect_back_to_login_is_rejected() {
        let server = MockBankServer::start(vec![MockResponse::redirect(
            "/fr/authentification.html?_cm_err=1",
        )])
        .unwrap();

        let err = adapter(&server).authenticate(&credentials()).unwrap_err();
        assert!(matches!(err, Error::Authentication(ref m) if m == LOGIN_REJECTED_MESSAGE));
        assert_eq!(server.requests().len(), 1);
    }

    #[test]
    fn test_data_call_redirected_to_login_is_rejected() {
        let server = MockBankServer::start(vec![
            MockResponse::redirect(LOGIN_PATH),
            MockResponse::ok(DOWNLOAD_PAGE),
        ])
        .unwrap();

        let err = adapter(&server).list_accounts(&credentials()).unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
        assert_eq!(server.remaining(), 1);
    }

    // Full handshake through the dispatcher, checking what the sealed tokens contain

    fn bank_service(server: &MockBankServer) -> (BankService, CryptoService) {
        let crypto = CryptoService::new(Arc::new(StaticSecretStore::new("mock-bank-secret")));
        let mut service = BankService::new(crypto.clone());
        service.register(Arc::new(adapter(server)));
        (service, crypto)
    }

    #[test]
    fn test_handshake_tokens() {
        let server = MockBankServer::start(vec![
            login_to_challenge(),
            MockResponse::ok(CHALLENGE_PAGE),
            MockResponse::ok(STATE_PENDING),
            MockResponse::ok(STATE_VALIDATED),
            MockResponse::status(302, "").with_header("Set-Cookie", "auth_client_state=anAuthClientStateToken"),
            login_to_home(),
            MockResponse::ok(DOWNLOAD_PAGE),
        ])
        .unwrap();
        let (service, crypto) = bank_service(&server);

        // Challenge
        let challenge = service
            .authenticate_with_fields("credit-mutuel", &credentials())
            .unwrap();
        assert_eq!(challenge.complete, Some(false));
        assert!(!challenge.message.as_deref().unwrap_or_default().is_empty());
        let challenge_token = challenge.token.unwrap();
        let opened = crypto.open(&challenge_token).unwrap();
        assert_eq!(
            sorted_keys(&opened),
            vec!["cookies", "login", "otpHidden", "password", "transactionId", "validationUrl"]
        );

        // Pending
        let pending = service
            .authenticate_with_token("credit-mutuel", &challenge_token, &Fields::new())
            .unwrap();
        assert_eq!(pending.token, None);
        assert_eq!(pending.message.as_deref(), Some(AWAITING_APPROVAL_MESSAGE));

        // Validated
        let done = service
            .authenticate_with_token("credit-mutuel", &challenge_token, &Fields::new())
            .unwrap();
        assert!(done.is_complete());
        assert_eq!(done.message, None);
        let complete_token = done.token.unwrap();
        assert_eq!(
            crypto.open(&complete_token).unwrap(),
            bag(json!({
                "login": "123456789",
                "password": "s3cret",
                "sessionMarker": "anAuthClientStateToken"
            }))
        );

        // Replay for data
        let accounts = service.list_accounts("credit-mutuel", &complete_token).unwrap();
        assert_eq!(accounts.len(), 3);
        assert_eq!(server.remaining(), 0);
    }

    #[test]
    fn test_tampered_token_never_reaches_the_bank() {
        let server = MockBankServer::start(vec![]).unwrap();
        let (service, _) = bank_service(&server);

        let err = service
            .authenticate_with_token("credit-mutuel", "not-a-token", &Fields::new())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidToken));
        assert!(server.requests().is_empty());
    }
}
