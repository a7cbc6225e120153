//! Authenticated HTTP transport.
//!
//! The rest of the library only needs the [`Transport`] trait: one `send` call
//! returning the raw response. [`SecureTransport`] is the production
//! implementation: every call builds a fresh blocking client, signs each attempt
//! with OAuth1 and applies the configured [`RetryPolicy`].
use std::thread;
use std::time::Duration;

use etrade_common::{MarketError, Result};
use log::{debug, warn};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::de::DeserializeOwned;
use strum_macros::{AsRefStr, Display, EnumString};

use crate::oauth::{Credentials, OAuth1Signer};
use crate::retry::{RetryPolicy, retry_after};

/// HTTP verbs supported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    /// Methods that may be replayed after the request reached the server.
    pub fn is_idempotent(self) -> bool {
        !matches!(self, Method::Post)
    }

    /// GET/DELETE carry their params in the query string, POST/PUT in a JSON body.
    pub fn sends_query(self) -> bool {
        matches!(self, Method::Get | Method::Delete)
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Raw server response: status, headers and body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First header with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }

    fn read(response: Response) -> reqwest::Result<Self> {
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let body = response.text()?;
        Ok(Self { status, headers, body })
    }
}

/// The capability the market-data core consumes: issue one request and hand
/// back the raw response, or fail with `Transport` once retries are exhausted.
///
/// Implementations must be callable from several threads at once.
pub trait Transport: Send + Sync {
    fn send(&self, method: Method, url: &str, params: &[(String, String)], timeout: Duration) -> Result<HttpResponse>;

    fn get(&self, url: &str, params: &[(String, String)], timeout: Duration) -> Result<HttpResponse> {
        self.send(Method::Get, url, params, timeout)
    }

    fn post(&self, url: &str, body: &[(String, String)], timeout: Duration) -> Result<HttpResponse> {
        self.send(Method::Post, url, body, timeout)
    }

    fn put(&self, url: &str, body: &[(String, String)], timeout: Duration) -> Result<HttpResponse> {
        self.send(Method::Put, url, body, timeout)
    }

    fn delete(&self, url: &str, params: &[(String, String)], timeout: Duration) -> Result<HttpResponse> {
        self.send(Method::Delete, url, params, timeout)
    }
}

/// Why an attempt did not produce a usable response.
#[derive(Debug)]
enum Failure {
    /// The connection was never established.
    Connect(String),
    /// The request may have reached the server (timeout, broken body, ...).
    Read(String),
    /// The server answered with a status from the forcelist.
    Status(HttpResponse),
}

impl Failure {
    fn into_error(self, retries: u32) -> MarketError {
        match self {
            Failure::Connect(e) => MarketError::Transport(format!("connect failed after {} retries: {}", retries, e)),
            Failure::Read(e) => MarketError::Transport(format!("read failed after {} retries: {}", retries, e)),
            Failure::Status(response) => MarketError::Transport(format!(
                "giving up after {} retries: HTTP {}: {}",
                retries, response.status, response.body
            )),
        }
    }
}

/// OAuth1-signed blocking HTTP transport with retry/backoff.
#[derive(Debug, Clone)]
pub struct SecureTransport {
    signer: OAuth1Signer,
    retry: RetryPolicy,
}

impl SecureTransport {
    /// Fails with `Configuration` if the client key or secret is missing.
    pub fn new(credentials: Credentials, retry: RetryPolicy) -> Result<Self> {
        Ok(Self {
            signer: OAuth1Signer::new(credentials)?,
            retry,
        })
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    fn build_request(
        &self,
        client: &Client,
        method: Method,
        url: &str,
        params: &[(String, String)],
    ) -> Result<RequestBuilder> {
        let request = client
            .request(method.into(), url)
            .header(ACCEPT, "application/json");

        let request = if method.sends_query() {
            let authorization = self.signer.authorization_header(method, url, params)?;
            let request = if params.is_empty() { request } else { request.query(params) };
            request.header(AUTHORIZATION, authorization)
        } else {
            let authorization = self.signer.authorization_header(method, url, &[])?;
            let body: serde_json::Map<String, serde_json::Value> = params
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect();
            request.json(&body).header(AUTHORIZATION, authorization)
        };
        Ok(request)
    }

    /// One attempt. `Ok(Err(_))` is a failure the retry loop may replay.
    fn attempt(
        &self,
        client: &Client,
        method: Method,
        url: &str,
        params: &[(String, String)],
    ) -> Result<std::result::Result<HttpResponse, Failure>> {
        let response = match self.build_request(client, method, url, params)?.send() {
            Ok(response) => response,
            Err(e) if e.is_connect() => return Ok(Err(Failure::Connect(e.to_string()))),
            Err(e) if e.is_timeout() || e.is_request() || e.is_body() => {
                return Ok(Err(Failure::Read(e.to_string())));
            }
            Err(e) => return Err(e.into()),
        };

        match HttpResponse::read(response) {
            Ok(response) if self.retry.is_retryable_status(response.status) => Ok(Err(Failure::Status(response))),
            Ok(response) => Ok(Ok(response)),
            Err(e) => Ok(Err(Failure::Read(e.to_string()))),
        }
    }

    fn may_retry(method: Method, failure: &Failure) -> bool {
        match failure {
            Failure::Connect(_) => true,
            Failure::Read(_) | Failure::Status(_) => method.is_idempotent(),
        }
    }
}

impl Transport for SecureTransport {
    fn send(&self, method: Method, url: &str, params: &[(String, String)], timeout: Duration) -> Result<HttpResponse> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MarketError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        let mut retries_used = 0;
        loop {
            debug!("{} {} (attempt {})", method, url, retries_used + 1);
            let failure = match self.attempt(&client, method, url, params)? {
                Ok(response) => return Ok(response),
                Err(failure) => failure,
            };

            if !Self::may_retry(method, &failure) {
                return match failure {
                    // A non-idempotent request answered with a forcelisted status is
                    // handed back as is.
                    Failure::Status(response) => Ok(response),
                    other => Err(other.into_error(retries_used)),
                };
            }
            if retries_used >= self.retry.retries() {
                return Err(failure.into_error(retries_used));
            }

            retries_used += 1;
            let backoff = match &failure {
                Failure::Status(response) => retry_after(response.status, response.header("Retry-After")),
                _ => None,
            }
            .unwrap_or_else(|| self.retry.backoff(retries_used));
            warn!(
                "{} {} failed ({:?}); retry {}/{} in {:?}",
                method,
                url,
                failure,
                retries_used,
                self.retry.retries(),
                backoff
            );
            thread::sleep(backoff);
        }
    }
}
