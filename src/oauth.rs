// ABOUTME: OAuth1 HMAC-SHA1 request signing and Authorization header building
// ABOUTME: Pure functions; nonce and timestamp sources are injected by the caller

use crate::{Error, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rand::{distributions::Alphanumeric, Rng};
use sha1::Sha1;
use std::collections::BTreeMap;

type HmacSha1 = Hmac<Sha1>;

pub const SIGNATURE_METHOD: &str = "HMAC-SHA1";
pub const OAUTH_VERSION: &str = "1.0";

/// Everything but the RFC 3986 unreserved set.
const ESCAPED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Query-style percent encoding: unreserved bytes pass through, space
/// becomes `+`, everything else is `%XX`. Also used for the request body.
pub fn percent_encode(s: &str) -> String {
    // A literal '%' is escaped to %25, so every %20 left here was a space
    utf8_percent_encode(s, ESCAPED)
        .to_string()
        .replace("%20", "+")
}

/// Computes the base64 HMAC-SHA1 signature of a request.
///
/// Request parameters are merged first so that `oauth_*` parameters win on
/// collision. Pairs are sorted by encoded key, byte-wise.
pub fn sign(
    method: &str,
    url: &str,
    oauth_params: &BTreeMap<String, String>,
    request_params: &BTreeMap<String, String>,
    consumer_secret: &str,
    token_secret: &str,
) -> Result<String> {
    let base = signature_base_string(method, url, oauth_params, request_params);
    let key = format!("{}&{}", percent_encode(consumer_secret), token_secret);

    let mut mac = HmacSha1::new_from_slice(key.as_bytes())
        .map_err(|e| Error::Auth(format!("invalid signing key: {}", e)))?;
    mac.update(base.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

pub fn signature_base_string(
    method: &str,
    url: &str,
    oauth_params: &BTreeMap<String, String>,
    request_params: &BTreeMap<String, String>,
) -> String {
    let mut merged: BTreeMap<&str, &str> = BTreeMap::new();
    for (k, v) in request_params {
        merged.insert(k.as_str(), v.as_str());
    }
    for (k, v) in oauth_params {
        merged.insert(k.as_str(), v.as_str());
    }

    let mut pairs: Vec<(String, String)> = merged
        .into_iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    pairs.sort();

    let param_string = pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        percent_encode(url),
        percent_encode(&param_string)
    )
}

/// Builds `OAuth k1="v1", k2="v2"` from every parameter, sorted by key.
pub fn authorization_header(oauth_params: &BTreeMap<String, String>) -> String {
    let pairs: Vec<String> = oauth_params
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, percent_encode(v)))
        .collect();
    format!("OAuth {}", pairs.join(", "))
}

/// 32 random alphanumerics, base64-encoded.
pub fn default_nonce() -> String {
    let raw: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();
    STANDARD.encode(raw)
}

pub fn default_timestamp() -> String {
    chrono::Utc::now().timestamp().to_string()
}
