//! OAuth 1.0a request signing (HMAC-SHA1, signature in the `Authorization` header).
//!
//! The signer owns an immutable `Credentials` set and produces one header value per
//! request. Nonce and timestamp are fresh on every call, so the same signer can be
//! shared across threads and reused for retries of the same request.

use std::fmt;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::Utc;
use etrade_common::{MarketError, Result};
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use rand::Rng;
use rand::distr::Alphanumeric;
use reqwest::Url;
use sha1::Sha1;

use crate::transport::Method;

type HmacSha1 = Hmac<Sha1>;

/// RFC 3986 unreserved characters stay as they are; everything else is encoded.
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

const NONCE_LEN: usize = 32;

/// Environment variables read by [`Credentials::from_env`].
pub const ENV_CLIENT_KEY: &str = "ETRADE_CLIENT_KEY";
/// See [`ENV_CLIENT_KEY`].
pub const ENV_CLIENT_SECRET: &str = "ETRADE_CLIENT_SECRET";
/// See [`ENV_CLIENT_KEY`].
pub const ENV_RESOURCE_OWNER_KEY: &str = "ETRADE_RESOURCE_OWNER_KEY";
/// See [`ENV_CLIENT_KEY`].
pub const ENV_RESOURCE_OWNER_SECRET: &str = "ETRADE_RESOURCE_OWNER_SECRET";
/// See [`ENV_CLIENT_KEY`].
pub const ENV_CALLBACK_URI: &str = "ETRADE_CALLBACK_URI";

/// OAuth1 identity material used to sign requests.
///
/// Build it with [`Credentials::new`] and the `with_*` methods; it cannot be
/// changed once handed to a signer.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    client_key: String,
    client_secret: String,
    resource_owner_key: Option<String>,
    resource_owner_secret: Option<String>,
    callback_uri: Option<String>,
    realm: Option<String>,
}

impl Credentials {
    /// Consumer (client) key and secret.
    pub fn new(client_key: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_key: client_key.into(),
            client_secret: client_secret.into(),
            ..Self::default()
        }
    }

    /// Access token and token secret obtained by the OAuth dance.
    pub fn with_resource_owner(mut self, key: impl Into<String>, secret: impl Into<String>) -> Self {
        self.resource_owner_key = Some(key.into());
        self.resource_owner_secret = Some(secret.into());
        self
    }

    /// Callback URI sent as `oauth_callback`.
    pub fn with_callback_uri(mut self, uri: impl Into<String>) -> Self {
        self.callback_uri = Some(uri.into());
        self
    }

    /// Optional `realm` emitted in the header (never signed).
    pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = Some(realm.into());
        self
    }

    /// Read credentials from the `ETRADE_*` environment variables.
    ///
    /// Client key and secret are required; the rest is optional, but an access
    /// token needs its secret.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let optional = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &str| {
            optional(name)
                .ok_or_else(|| MarketError::Configuration(format!("environment variable {} is not set", name)))
        };

        let mut credentials = Credentials::new(required(ENV_CLIENT_KEY)?, required(ENV_CLIENT_SECRET)?);
        credentials.resource_owner_key = optional(ENV_RESOURCE_OWNER_KEY);
        credentials.resource_owner_secret = optional(ENV_RESOURCE_OWNER_SECRET);
        credentials.callback_uri = optional(ENV_CALLBACK_URI);
        credentials.validate()?;
        Ok(credentials)
    }

    /// Client key and client secret must both be present.
    pub fn validate(&self) -> Result<()> {
        if self.client_key.trim().is_empty() {
            return Err(MarketError::Configuration("client key is missing".to_string()));
        }
        if self.client_secret.trim().is_empty() {
            return Err(MarketError::Configuration("client secret is missing".to_string()));
        }
        if self.resource_owner_key.is_some() != self.resource_owner_secret.is_some() {
            return Err(MarketError::Configuration(
                "resource owner key and secret must be provided together".to_string(),
            ));
        }
        Ok(())
    }

    /// The consumer key.
    pub fn client_key(&self) -> &str {
        &self.client_key
    }
}

// Secrets stay out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_key", &self.client_key)
            .field("client_secret", &"***")
            .field("resource_owner_key", &self.resource_owner_key)
            .field("resource_owner_secret", &self.resource_owner_secret.as_ref().map(|_| "***"))
            .field("callback_uri", &self.callback_uri)
            .field("realm", &self.realm)
            .finish()
    }
}

/// HMAC-SHA1 OAuth1 signer.
#[derive(Debug, Clone)]
pub struct OAuth1Signer {
    credentials: Credentials,
}

impl OAuth1Signer {
    /// Fails with `Configuration` if the client key or secret is missing.
    pub fn new(credentials: Credentials) -> Result<Self> {
        credentials.validate()?;
        Ok(Self { credentials })
    }

    /// `Authorization` header value for a request to `url` carrying the given
    /// query `params`. Query pairs already present in `url` are signed too.
    pub fn authorization_header(&self, method: Method, url: &str, params: &[(String, String)]) -> Result<String> {
        let nonce: String = rand::rng()
            .sample_iter(Alphanumeric)
            .take(NONCE_LEN)
            .map(char::from)
            .collect();
        self.authorization_header_with(method, url, params, &nonce, Utc::now().timestamp())
    }

    pub(crate) fn authorization_header_with(
        &self,
        method: Method,
        url: &str,
        params: &[(String, String)],
        nonce: &str,
        timestamp: i64,
    ) -> Result<String> {
        let parsed = Url::parse(url).map_err(|e| MarketError::Validation(format!("invalid URL {}: {}", url, e)))?;

        let mut oauth_params = self.oauth_params(nonce, timestamp);
        let mut signed: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
        signed.extend(params.iter().cloned());
        signed.extend(oauth_params.iter().cloned());

        let base = signature_base_string(method, &base_url(&parsed), &signed);
        oauth_params.push(("oauth_signature".to_string(), self.sign(&base)?));
        oauth_params.sort();

        let mut parts = Vec::with_capacity(oauth_params.len() + 1);
        if let Some(realm) = &self.credentials.realm {
            parts.push(format!("realm=\"{}\"", encode(realm)));
        }
        parts.extend(
            oauth_params
                .iter()
                .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v))),
        );
        Ok(format!("OAuth {}", parts.join(", ")))
    }

    fn oauth_params(&self, nonce: &str, timestamp: i64) -> Vec<(String, String)> {
        let mut params = vec![
            ("oauth_consumer_key".to_string(), self.credentials.client_key.clone()),
            ("oauth_nonce".to_string(), nonce.to_string()),
            ("oauth_signature_method".to_string(), "HMAC-SHA1".to_string()),
            ("oauth_timestamp".to_string(), timestamp.to_string()),
            ("oauth_version".to_string(), "1.0".to_string()),
        ];
        if let Some(token) = &self.credentials.resource_owner_key {
            params.push(("oauth_token".to_string(), token.clone()));
        }
        if let Some(callback) = &self.credentials.callback_uri {
            params.push(("oauth_callback".to_string(), callback.clone()));
        }
        params
    }

    fn sign(&self, base: &str) -> Result<String> {
        let key = format!(
            "{}&{}",
            encode(&self.credentials.client_secret),
            encode(self.credentials.resource_owner_secret.as_deref().unwrap_or_default())
        );
        let mut mac = HmacSha1::new_from_slice(key.as_bytes())
            .map_err(|e| MarketError::Configuration(format!("invalid signing key: {}", e)))?;
        mac.update(base.as_bytes());
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }
}

/// RFC 3986 percent-encoding as OAuth1 requires it.
pub fn encode(value: &str) -> String {
    utf8_percent_encode(value, OAUTH_ENCODE_SET).to_string()
}

/// Scheme, host, non-default port and path; no query or fragment.
fn base_url(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    match url.port() {
        Some(port) => format!("{}://{}:{}{}", url.scheme(), host, port, url.path()),
        None => format!("{}://{}{}", url.scheme(), host, url.path()),
    }
}

/// `METHOD&enc(base_url)&enc(normalized params)`.
pub(crate) fn signature_base_string(method: Method, base_url: &str, params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params.iter().map(|(k, v)| (encode(k), encode(v))).collect();
    encoded.sort();
    let normalized = encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}&{}&{}", method, encode(base_url), encode(&normalized))
}
