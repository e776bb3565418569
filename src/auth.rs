// ABOUTME: Credential discovery with precedence chain
// ABOUTME: CLI flag → environment (plain or INPUT_ prefixed) → default

use crate::util::env_var;
use crate::{Credentials, Error, Result};

pub const CONSUMER_KEY_VAR: &str = "INSTAPAPER_CONSUMER_KEY";
pub const CONSUMER_SECRET_VAR: &str = "INSTAPAPER_CONSUMER_SECRET";
pub const TOKEN_VAR: &str = "INSTAPAPER_TOKEN";
pub const TOKEN_SECRET_VAR: &str = "INSTAPAPER_TOKEN_SECRET";

/// How the client will get an OAuth token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSource {
    /// Token pair was configured.
    Configured,
    /// Exchange these for a token before the first API call.
    Login { username: String, password: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAuth {
    pub credentials: Credentials,
    pub token_source: TokenSource,
}

/// Explicit values, typically from CLI flags. `None` falls through to the environment.
#[derive(Debug, Clone, Default)]
pub struct AuthInputs {
    pub consumer_key: Option<String>,
    pub consumer_secret: Option<String>,
    pub token: Option<String>,
    pub token_secret: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

fn pick(explicit: Option<String>, var: &str) -> Option<String> {
    explicit.filter(|v| !v.is_empty()).or_else(|| env_var(var))
}

/// Resolves credentials without touching the network.
pub fn resolve_credentials(inputs: AuthInputs) -> Result<ResolvedAuth> {
    let consumer_key = pick(inputs.consumer_key, CONSUMER_KEY_VAR)
        .ok_or_else(|| Error::Config(format!("{} is not set", CONSUMER_KEY_VAR)))?;
    let consumer_secret = pick(inputs.consumer_secret, CONSUMER_SECRET_VAR)
        .ok_or_else(|| Error::Config(format!("{} is not set", CONSUMER_SECRET_VAR)))?;

    let token = pick(inputs.token, TOKEN_VAR).unwrap_or_default();
    let token_secret = pick(inputs.token_secret, TOKEN_SECRET_VAR).unwrap_or_default();

    let credentials = Credentials::new(consumer_key, consumer_secret);

    if !token.is_empty() && !token_secret.is_empty() {
        return Ok(ResolvedAuth {
            credentials: credentials.with_token(token, token_secret),
            token_source: TokenSource::Configured,
        });
    }

    match inputs.username.filter(|u| !u.is_empty()) {
        Some(username) => Ok(ResolvedAuth {
            credentials,
            token_source: TokenSource::Login {
                username,
                password: inputs.password.unwrap_or_default(),
            },
        }),
        None => Err(Error::Config(format!(
            "username is required if {} and {} are not set",
            TOKEN_VAR, TOKEN_SECRET_VAR
        ))),
    }
}
