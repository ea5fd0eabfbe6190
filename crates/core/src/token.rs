//! Unverified inspection of JWT-shaped bearer tokens.
//!
//! The gateway never trusts these claims for authorization. They are read
//! for two things only: the expiry of a legacy session token (which the
//! gateway cannot verify anyway) and the issuer of an inbound bearer token,
//! to decide whether it belongs to this system's own auth layer before the
//! real signature check runs.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Length of the token prefix kept by [`mask_token`].
const MASK_PREFIX_LEN: usize = 12;

/// Why a token's claims could not be read.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    /// The token does not have three dot-separated segments.
    #[error("token is not a JWT")]
    NotJwt,

    /// The payload segment is not valid base64url.
    #[error("invalid payload encoding: {0}")]
    Encoding(String),

    /// The payload is not a JSON object.
    #[error("invalid payload: {0}")]
    Payload(String),
}

/// The subset of registered claims the gateway looks at.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UnverifiedClaims {
    /// Issuer.
    #[serde(default)]
    pub iss: Option<String>,
    /// Expiry as seconds since the epoch (integer or float on the wire).
    #[serde(default)]
    exp: Option<Value>,
}

impl UnverifiedClaims {
    /// The `exp` claim as an absolute timestamp, if present and sane.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let secs = match self.exp.as_ref()? {
            Value::Number(n) => n.as_i64().or_else(|| {
                #[allow(clippy::cast_possible_truncation)]
                n.as_f64().map(|f| f as i64)
            })?,
            Value::String(s) => s.trim().parse::<i64>().ok()?,
            _ => return None,
        };
        DateTime::from_timestamp(secs, 0)
    }
}

/// Decode the claims segment of a JWT without verifying its signature.
pub fn peek_claims(token: &str) -> Result<UnverifiedClaims, TokenError> {
    let mut segments = token.trim().split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(TokenError::NotJwt);
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| TokenError::Encoding(e.to_string()))?;

    serde_json::from_slice(&bytes).map_err(|e| TokenError::Payload(e.to_string()))
}

/// Shorten a token for log output.
pub fn mask_token(token: &str) -> String {
    match token.get(..MASK_PREFIX_LEN) {
        Some(prefix) if token.len() > MASK_PREFIX_LEN => format!("{prefix}..."),
        _ => "***".to_owned(),
    }
}
