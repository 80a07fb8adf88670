//! Per-call cookie jar
//!
//! A bank session lives in cookies. Since no jar may outlive one call, the
//! jar is a plain list that serializes into a token field and is rebuilt
//! into a fresh jar on the next call.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::domain::result::{Error, Result};

/// One cookie as carried inside a continuation token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
}

fn default_path() -> String {
    "/".to_string()
}

impl StoredCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: default_path(),
            secure: false,
            http_only: false,
        }
    }

    fn same_slot(&self, other: &StoredCookie) -> bool {
        self.name == other.name && self.domain == other.domain && self.path == other.path
    }
}

/// Ordered cookie list for a single site
///
/// All cookies are sent on every request; the jar is only ever used against
/// one bank host within one call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    cookies: Vec<StoredCookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a jar from the `cookies` field of a token
    pub fn restore(value: &JsonValue, field: &str) -> Result<Self> {
        let cookies: Vec<StoredCookie> =
            serde_json::from_value(value.clone()).map_err(|_| Error::required(field))?;
        Ok(Self { cookies })
    }

    /// Serialize the jar for sealing into a token
    pub fn to_value(&self) -> JsonValue {
        serde_json::to_value(&self.cookies).unwrap_or_else(|_| JsonValue::Array(Vec::new()))
    }

    /// Insert or replace a cookie
    pub fn set(&mut self, cookie: StoredCookie) {
        match self.cookies.iter_mut().find(|c| c.same_slot(&cookie)) {
            Some(existing) => *existing = cookie,
            None => self.cookies.push(cookie),
        }
    }

    /// Value of the first cookie with the given name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.value.as_str())
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Apply `Set-Cookie` header values from a response
    ///
    /// Cookies without a `Domain` attribute are bound to `request_host`.
    /// Unparsable headers are skipped; expired cookies are removed.
    pub fn store_set_cookie_headers<'a>(
        &mut self,
        headers: impl IntoIterator<Item = &'a str>,
        request_host: &str,
    ) {
        for header in headers {
            let parsed = match cookie::Cookie::parse(header) {
                Ok(c) => c,
                Err(_) => {
                    tracing::debug!("ignoring unparsable Set-Cookie header");
                    continue;
                }
            };

            let stored = StoredCookie {
                name: parsed.name().to_string(),
                value: parsed.value().to_string(),
                domain: parsed
                    .domain()
                    .map(|d| d.trim_start_matches('.').to_string())
                    .unwrap_or_else(|| request_host.to_string()),
                path: parsed.path().map(str::to_string).unwrap_or_else(default_path),
                secure: parsed.secure().unwrap_or(false),
                http_only: parsed.http_only().unwrap_or(false),
            };

            let expired = parsed
                .max_age()
                .map(|age| age.is_zero() || age.is_negative())
                .unwrap_or(false);

            if expired {
                self.cookies.retain(|c| !c.same_slot(&stored));
            } else {
                self.set(stored);
            }
        }
    }

    /// Value for a `Cookie` request header, if the jar holds anything
    pub fn header_value(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|c| format!("{}={}", c.name, c.value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}
