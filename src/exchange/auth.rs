//! Request signing for the Coinbase Advanced Trade REST API.
//!
//! Two key types are accepted:
//! - CDP keys (`organizations/{org}/apiKeys/{id}` plus an EC private key in
//!   PEM) sign a fresh ES256 JWT per request, sent as `Authorization: Bearer`.
//! - Legacy keys send `CB-ACCESS-KEY`, `CB-ACCESS-TIMESTAMP` and
//!   `CB-ACCESS-SIGN`, the hex HMAC-SHA256 of `timestamp + METHOD + path + body`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use p256::pkcs8::DecodePrivateKey;
use p256::SecretKey;
use reqwest::header::AUTHORIZATION;
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use super::traits::ExchangeResult;
use crate::error::ExchangeError;

type HmacSha256 = Hmac<Sha256>;

/// Lifetime of a CDP token in seconds.
pub const JWT_TTL_SECS: i64 = 120;
const JWT_ISSUER: &str = "cdp";

#[derive(Clone)]
enum Credentials {
    Cdp { key_name: String, key: SigningKey },
    Legacy { api_key: String, api_secret: String },
}

#[derive(Clone)]
pub struct RequestSigner {
    credentials: Credentials,
}

/// Headers for one legacy-signed request.
#[derive(Clone, Debug, PartialEq)]
pub struct SignedHeaders {
    pub key: String,
    pub timestamp: String,
    pub signature: String,
}

impl RequestSigner {
    /// A PEM secret selects CDP signing; anything else is a legacy secret.
    pub fn new(api_key: String, api_secret: String) -> ExchangeResult<Self> {
        let credentials = if api_secret.contains("-----BEGIN") {
            Credentials::Cdp {
                key_name: api_key,
                key: parse_ec_key(&api_secret)?,
            }
        } else {
            Credentials::Legacy { api_key, api_secret }
        };
        Ok(Self { credentials })
    }

    pub fn is_cdp(&self) -> bool {
        matches!(self.credentials, Credentials::Cdp { .. })
    }

    pub fn apply(
        &self,
        req: reqwest::RequestBuilder,
        method: &str,
        host: &str,
        path: &str,
        body: &str,
    ) -> ExchangeResult<reqwest::RequestBuilder> {
        let now = chrono::Utc::now().timestamp();
        match &self.credentials {
            Credentials::Cdp { key_name, key } => {
                let nonce = Uuid::new_v4().simple().to_string();
                let token = cdp_jwt(key_name, key, &request_uri(method, host, path), now, &nonce)?;
                Ok(req.header(AUTHORIZATION, format!("Bearer {}", token)))
            }
            Credentials::Legacy { api_key, api_secret } => {
                let headers = sign_legacy(api_key, api_secret, now, method, path, body);
                Ok(req
                    .header("CB-ACCESS-KEY", headers.key)
                    .header("CB-ACCESS-TIMESTAMP", headers.timestamp)
                    .header("CB-ACCESS-SIGN", headers.signature))
            }
        }
    }
}

/// `"GET api.coinbase.com/api/v3/brokerage/orders"`, the `uri` claim.
pub fn request_uri(method: &str, host: &str, path: &str) -> String {
    format!("{} {}{}", method.to_ascii_uppercase(), host, path)
}

/// Compact ES256 JWS with `kid` and `nonce` in the header.
pub fn cdp_jwt(key_name: &str, key: &SigningKey, uri: &str, now: i64, nonce: &str) -> ExchangeResult<String> {
    let header = json!({
        "alg": "ES256",
        "kid": key_name,
        "nonce": nonce,
        "typ": "JWT",
    });
    let claims = json!({
        "sub": key_name,
        "iss": JWT_ISSUER,
        "nbf": now,
        "exp": now + JWT_TTL_SECS,
        "uri": uri,
    });

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?),
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?)
    );
    let signature: Signature = key.sign(signing_input.as_bytes());
    Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature.to_bytes())))
}

pub fn sign_legacy(
    api_key: &str,
    api_secret: &str,
    timestamp: i64,
    method: &str,
    path: &str,
    body: &str,
) -> SignedHeaders {
    let timestamp = timestamp.to_string();
    let prehash = format!("{}{}{}{}", timestamp, method.to_ascii_uppercase(), path, body);

    let mut mac = HmacSha256::new_from_slice(api_secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC-SHA256 takes any key length"));
    mac.update(prehash.as_bytes());

    SignedHeaders {
        key: api_key.to_string(),
        timestamp,
        signature: hex::encode(mac.finalize().into_bytes()),
    }
}

/// SEC1 (`EC PRIVATE KEY`) or PKCS#8 (`PRIVATE KEY`) P-256 key. Escaped
/// `\n` sequences, as in Coinbase's downloaded key JSON, are accepted.
fn parse_ec_key(pem: &str) -> ExchangeResult<SigningKey> {
    let pem = pem.replace("\\n", "\n");
    let pem = pem.trim();

    let secret = if pem.contains("BEGIN EC PRIVATE KEY") {
        SecretKey::from_sec1_pem(pem).map_err(|e| invalid_key(&e.to_string()))?
    } else {
        SecretKey::from_pkcs8_pem(pem).map_err(|e| invalid_key(&e.to_string()))?
    };
    Ok(SigningKey::from(secret))
}

fn invalid_key(reason: &str) -> ExchangeError {
    ExchangeError::Configuration(format!("SECRET_KEY is not a P-256 private key: {}", reason))
}
