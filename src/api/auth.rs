//! Bybit v5 request signing.
//!
//! Private endpoints carry four headers: API key, millisecond timestamp,
//! receive window and an HMAC-SHA256 signature over
//! `timestamp + api_key + recv_window + payload`, where the payload is the
//! query string for GET requests and the raw JSON body for POST requests.

use anyhow::{Context, Result};
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Default receive window in milliseconds.
pub const DEFAULT_RECV_WINDOW: u64 = 5000;

/// API key pair.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"***")
            .finish()
    }
}

/// Compute an HMAC-SHA256 signature and return it as lowercase hex.
pub fn hmac_sha256_sign(secret: &str, message: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .context("Invalid HMAC key")?;
    mac.update(message.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Build the signed header set for one request.
pub fn signed_headers(
    creds: &Credentials,
    timestamp_ms: i64,
    recv_window: u64,
    payload: &str,
) -> Result<HeaderMap> {
    let timestamp = timestamp_ms.to_string();
    let recv_window = recv_window.to_string();
    let message = format!("{}{}{}{}", timestamp, creds.api_key, recv_window, payload);
    let signature = hmac_sha256_sign(&creds.api_secret, &message)?;

    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static("x-bapi-api-key"),
        HeaderValue::from_str(&creds.api_key)?,
    );
    headers.insert(
        HeaderName::from_static("x-bapi-timestamp"),
        HeaderValue::from_str(&timestamp)?,
    );
    headers.insert(
        HeaderName::from_static("x-bapi-recv-window"),
        HeaderValue::from_str(&recv_window)?,
    );
    headers.insert(
        HeaderName::from_static("x-bapi-sign"),
        HeaderValue::from_str(&signature)?,
    );

    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> Credentials {
        Credentials {
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
        }
    }

    #[test]
    fn test_signature_is_hex_sha256() {
        let sig = hmac_sha256_sign("secret", "1700000000000key5000category=linear").unwrap();
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_signature_depends_on_payload() {
        let a = hmac_sha256_sign("secret", "a").unwrap();
        let b = hmac_sha256_sign("secret", "b").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_signed_headers() {
        let headers = signed_headers(&creds(), 1_700_000_000_000, 5000, "symbol=BTCUSDT").unwrap();
        assert_eq!(headers["x-bapi-api-key"], "key");
        assert_eq!(headers["x-bapi-timestamp"], "1700000000000");
        assert_eq!(headers["x-bapi-recv-window"], "5000");

        let expected = hmac_sha256_sign("secret", "1700000000000key5000symbol=BTCUSDT").unwrap();
        assert_eq!(headers["x-bapi-sign"], expected.as_str());
    }

    #[test]
    fn test_debug_hides_secret() {
        let creds = Credentials {
            api_key: "key".to_string(),
            api_secret: "hunter2".to_string(),
        };
        let rendered = format!("{:?}", creds);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("***"));
    }
}
