//! Client-side inspection of JSON Web Tokens.
//!
//! Only the payload is decoded so the client can read the expiry and
//! subject claims. Signatures are never verified here, that is the job of
//! the server.

use std::collections::HashMap;

use base64::{
    Engine,
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use serde::Deserialize;
use serde_json::Value;

use crate::Error;

/// Base64url without caring whether the segment is padded or not.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// The decoded payload of a token.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Claims {
    /// The expiry time as seconds since the Unix epoch.
    pub exp: Option<i64>,
    /// The time the token was issued.
    pub iat: Option<i64>,
    /// The subject, i.e. the username.
    pub sub: Option<String>,
    /// Any other claims.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// Decode the payload of `token`.
///
/// # Errors
/// Returns [Error::TokenMalformed] if the token does not have three
/// dot-delimited parts or if the middle part is not base64 encoded JSON.
pub fn decode(token: &str) -> Result<Claims, Error> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(Error::TokenMalformed(
            "expected three dot-delimited parts".to_owned(),
        ));
    };

    let json = PAYLOAD_ENGINE
        .decode(payload)
        .map_err(|error| Error::TokenMalformed(error.to_string()))?;

    serde_json::from_slice(&json).map_err(|error| Error::TokenMalformed(error.to_string()))
}

/// Whether `token` should be treated as expired at `now` (Unix seconds).
///
/// Tokens that cannot be decoded or carry no `exp` claim are expired.
pub fn is_expired(token: &str, now: i64) -> bool {
    match decode(token) {
        Ok(Claims { exp: Some(exp), .. }) => now > exp,
        Ok(_) => true,
        Err(error) => {
            tracing::warn!("{error}");
            true
        }
    }
}

/// The number of seconds before `token` expires, or 0 if it already has or
/// is invalid.
pub fn remaining_lifetime(token: &str, now: i64) -> u64 {
    match decode(token) {
        Ok(Claims { exp: Some(exp), .. }) => exp.saturating_sub(now).max(0) as u64,
        _ => 0,
    }
}

/// Read a single claim from `token`.
pub fn claim(token: &str, key: &str) -> Option<Value> {
    let claims = decode(token).ok()?;

    match key {
        "exp" => claims.exp.map(Value::from),
        "iat" => claims.iat.map(Value::from),
        "sub" => claims.sub.map(Value::from),
        _ => claims.extra.get(key).cloned(),
    }
}

/// The username carried in the `sub` claim.
pub fn username(token: &str) -> Option<String> {
    decode(token).ok()?.sub
}

/// Whether `token` looks like a JWT: three non-empty base64url segments.
pub fn is_valid_format(token: &str) -> bool {
    let parts: Vec<&str> = token.split('.').collect();

    parts.len() == 3
        && parts.iter().all(|part| {
            !part.is_empty()
                && part
                    .bytes()
                    .all(|byte| byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_')
        })
}
