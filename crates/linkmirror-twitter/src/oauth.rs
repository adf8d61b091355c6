//! OAuth 1.0a request signing (HMAC-SHA1)
//!
//! Every REST and streaming request carries an `Authorization` header built
//! from the application's consumer pair and the operator's access token pair.
//! The signature covers the method, the base URL and every query and form
//! parameter, so callers pass exactly the parameters they send.

use base64::Engine;
use hmac::{Hmac, Mac};
use linkmirror_core::{Error, Result};
use rand::Rng;
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Length of generated nonces
const NONCE_LEN: usize = 32;

/// OAuth 1.0a credentials
///
/// # Security
///
/// The Debug implementation does NOT expose any of the secrets.
#[derive(Clone)]
pub struct Credentials {
    pub consumer_key: String,
    /// ⚠️ NEVER log this value
    pub consumer_secret: String,
    pub access_token: String,
    /// ⚠️ NEVER log this value
    pub access_token_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"<REDACTED>")
            .field("access_token", &"<REDACTED>")
            .field("access_token_secret", &"<REDACTED>")
            .finish()
    }
}

impl Credentials {
    pub fn new(
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
        access_token: impl Into<String>,
        access_token_secret: impl Into<String>,
    ) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            access_token: access_token.into(),
            access_token_secret: access_token_secret.into(),
        }
    }

    /// Fail fast if any part is missing
    pub fn validate(&self) -> Result<()> {
        let parts = [
            ("consumer key", &self.consumer_key),
            ("consumer secret", &self.consumer_secret),
            ("access token", &self.access_token),
            ("access token secret", &self.access_token_secret),
        ];
        for (name, value) in parts {
            if value.trim().is_empty() {
                return Err(Error::config(format!("Twitter {} cannot be empty", name)));
            }
        }
        Ok(())
    }
}

/// Percent-encode per RFC 3986 (unreserved characters pass through)
pub fn percent_encode(input: &str) -> String {
    urlencoding::encode(input).into_owned()
}

/// Encode parameters as `k=v&k=v` in the given order
pub fn encode_pairs(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Random alphanumeric nonce
pub fn generate_nonce() -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(NONCE_LEN)
        .map(char::from)
        .collect()
}

/// Signs requests with one set of credentials
#[derive(Debug, Clone)]
pub struct Signer {
    credentials: Credentials,
}

impl Signer {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// `Authorization` header for a request made now
    pub fn authorization(&self, method: &str, url: &str, params: &[(&str, &str)]) -> Result<String> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        self.authorization_with(method, url, params, &generate_nonce(), &timestamp)
    }

    /// `Authorization` header with a fixed nonce and timestamp
    pub fn authorization_with(
        &self,
        method: &str,
        url: &str,
        params: &[(&str, &str)],
        nonce: &str,
        timestamp: &str,
    ) -> Result<String> {
        let mut oauth_params = vec![
            ("oauth_consumer_key", self.credentials.consumer_key.as_str()),
            ("oauth_nonce", nonce),
            ("oauth_signature_method", "HMAC-SHA1"),
            ("oauth_timestamp", timestamp),
            ("oauth_token", self.credentials.access_token.as_str()),
            ("oauth_version", "1.0"),
        ];

        let signature = self.signature(method, url, params, &oauth_params)?;
        oauth_params.push(("oauth_signature", &signature));
        oauth_params.sort();

        let fields = oauth_params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join(", ");

        Ok(format!("OAuth {}", fields))
    }

    fn signature(
        &self,
        method: &str,
        url: &str,
        params: &[(&str, &str)],
        oauth_params: &[(&str, &str)],
    ) -> Result<String> {
        let base = signature_base(method, url, params, oauth_params);
        let key = format!(
            "{}&{}",
            percent_encode(&self.credentials.consumer_secret),
            percent_encode(&self.credentials.access_token_secret)
        );

        let mut mac = HmacSha1::new_from_slice(key.as_bytes())
            .map_err(|e| Error::auth(format!("Invalid signing key: {}", e)))?;
        mac.update(base.as_bytes());

        Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
    }
}

/// `METHOD&url&params`, parameters sorted by encoded key then value
fn signature_base(
    method: &str,
    url: &str,
    params: &[(&str, &str)],
    oauth_params: &[(&str, &str)],
) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .chain(oauth_params)
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();

    let param_string = encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_uppercase(),
        percent_encode(url),
        percent_encode(&param_string)
    )
}
