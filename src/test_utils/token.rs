use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::{Value, json};

use crate::session::unix_now;

/// Build an unsigned token with `claims` as its payload.
pub(crate) fn make_token(claims: Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(json!({"alg": "HS256", "typ": "JWT"}).to_string());
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());

    format!("{header}.{payload}.c2lnbmF0dXJl")
}

/// A token for `username` that expires in an hour.
pub(crate) fn valid_token(username: &str) -> String {
    make_token(json!({"sub": username, "exp": unix_now() + 3600, "iat": unix_now()}))
}

/// A token for `username` that expired a second ago.
pub(crate) fn expired_token(username: &str) -> String {
    make_token(json!({"sub": username, "exp": unix_now() - 1, "iat": unix_now() - 3600}))
}
