// ABOUTME: Blocking OAuth1 HTTP client for the Instapaper full API
// ABOUTME: Signs form POSTs and routes them through the retrying transport

use crate::oauth::{self, OAUTH_VERSION, SIGNATURE_METHOD};
use crate::retry::{RetryPolicy, RetryingTransport};
use crate::util::truncate_str;
use crate::{Credentials, Error, RemoteItem, Result};
use reqwest::blocking::{Client, Response};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::StatusCode;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::form_urlencoded;

pub const DEFAULT_BASE_ENDPOINT: &str = "https://www.instapaper.com/api/1/";
pub const DEFAULT_USER_AGENT: &str = "RapidAPI/4.1.5 (Macintosh; OS X/15.3.1) GCDHTTPRequest";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const TOKEN_ENDPOINT: &str = "oauth/access_token";
pub const LIST_ENDPOINT: &str = "bookmarks/list";
pub const TEXT_ENDPOINT: &str = "bookmarks/get_text";

/// Parameter carrying the ids the caller already has.
pub const HAVE_PARAM: &str = "have";

pub type Generator = Arc<dyn Fn() -> String + Send + Sync>;

/// Remote operations the sync engine depends on.
pub trait BookmarkSource {
    fn list_items(&self, exclude_ids: &[u64]) -> Result<Vec<RemoteItem>>;
    fn fetch_item_text(&self, id: u64) -> Result<String>;
}

/// Builder-style options for [`ApiClient`].
pub struct ClientOptions {
    pub base_endpoint: String,
    pub timeout: Duration,
    pub user_agent: String,
    pub retry: RetryPolicy,
    pub nonce: Generator,
    pub timestamp: Generator,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            base_endpoint: DEFAULT_BASE_ENDPOINT.into(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.into(),
            retry: RetryPolicy::default(),
            nonce: Arc::new(oauth::default_nonce),
            timestamp: Arc::new(oauth::default_timestamp),
        }
    }
}

impl ClientOptions {
    pub fn with_base_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.base_endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_nonce_generator<F>(mut self, f: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.nonce = Arc::new(f);
        self
    }

    pub fn with_timestamp_generator<F>(mut self, f: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.timestamp = Arc::new(f);
        self
    }
}

pub struct ApiClient {
    transport: RetryingTransport,
    credentials: Credentials,
    base_endpoint: String,
    user_agent: String,
    nonce: Generator,
    timestamp: Generator,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_endpoint", &self.base_endpoint)
            .field("consumer_key", &self.credentials.consumer_key)
            .field("has_token", &self.credentials.has_token())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(credentials: Credentials, options: ClientOptions) -> Result<Self> {
        if credentials.consumer_key.is_empty() || credentials.consumer_secret.is_empty() {
            return Err(Error::Config(
                "consumer key and secret are required".into(),
            ));
        }

        let client = Client::builder().timeout(options.timeout).build()?;

        let mut base_endpoint = options.base_endpoint;
        if !base_endpoint.ends_with('/') {
            base_endpoint.push('/');
        }

        Ok(ApiClient {
            transport: RetryingTransport::new(client, options.retry),
            credentials,
            base_endpoint,
            user_agent: options.user_agent,
            nonce: options.nonce,
            timestamp: options.timestamp,
        })
    }

    /// Replaces the retry sleep, mainly so tests do not wait.
    pub fn with_sleeper<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.transport = self.transport.with_sleeper(f);
        self
    }

    pub fn set_token(&mut self, token: impl Into<String>, secret: impl Into<String>) {
        self.credentials.token = token.into();
        self.credentials.token_secret = secret.into();
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn base_endpoint(&self) -> &str {
        &self.base_endpoint
    }

    /// Exchanges username and password for an OAuth token pair (xAuth).
    pub fn acquire_token(&self, username: &str, password: &str) -> Result<(String, String)> {
        let params = BTreeMap::from([
            ("x_auth_username".to_string(), username.to_string()),
            ("x_auth_password".to_string(), password.to_string()),
            ("x_auth_mode".to_string(), "client_auth".to_string()),
        ]);

        let response = self.call_api(TOKEN_ENDPOINT, &params)?;
        let status = response.status();
        let body = response.text()?;

        if status != StatusCode::OK {
            return Err(Error::Auth(format!(
                "token exchange returned {}: {}",
                status.as_u16(),
                truncate_str(&body, 200)
            )));
        }

        parse_token_body(&body)
    }

    pub fn list_items(&self, exclude_ids: &[u64]) -> Result<Vec<RemoteItem>> {
        let mut params = BTreeMap::new();
        if !exclude_ids.is_empty() {
            params.insert(HAVE_PARAM.to_string(), join_ids(exclude_ids));
        }

        let response = self.call_api(LIST_ENDPOINT, &params)?;
        let status = response.status();
        if status != StatusCode::OK {
            let message = response.text().unwrap_or_default();
            return Err(Error::Api {
                endpoint: LIST_ENDPOINT.into(),
                status: status.as_u16(),
                message: truncate_str(&message, 100),
            });
        }

        let body = response.text()?;
        serde_json::from_str(&body).map_err(|e| Error::Decode {
            source: e,
            preview: truncate_str(&body, 100),
        })
    }

    pub fn fetch_item_text(&self, id: u64) -> Result<String> {
        let params = BTreeMap::from([("bookmark_id".to_string(), id.to_string())]);

        let response = self.call_api(TEXT_ENDPOINT, &params)?;
        let status = response.status();
        if status != StatusCode::OK {
            // The service answers failures with a readable HTML page
            let message = response.text().unwrap_or_default();
            return Err(Error::Api {
                endpoint: TEXT_ENDPOINT.into(),
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.text()?)
    }

    /// Signs and sends a form-encoded POST to `endpoint`.
    /// Signs once and sends through the retrying transport. Retries resend the
    /// same `oauth_nonce` and `oauth_timestamp`, so a server enforcing nonce
    /// uniqueness will reject them as replays.
    fn call_api(&self, endpoint: &str, params: &BTreeMap<String, String>) -> Result<Response> {
        let url = format!("{}{}", self.base_endpoint, endpoint);
        let authorization = self.authorization_for(&url, params)?;
        let body = encode_form(params);

        debug!(endpoint, params = params.len(), "calling API");

        let response = self.transport.execute(|client| {
            client
                .post(&url)
                .header(AUTHORIZATION, &authorization)
                .header(USER_AGENT, &self.user_agent)
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(body.clone())
        })?;

        Ok(response)
    }

    /// Authorization header value for a POST to `url` with `params`.
    pub fn authorization_for(
        &self,
        url: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<String> {
        let mut oauth_params = BTreeMap::from([
            (
                "oauth_consumer_key".to_string(),
                self.credentials.consumer_key.clone(),
            ),
            ("oauth_nonce".to_string(), (self.nonce)()),
            (
                "oauth_signature_method".to_string(),
                SIGNATURE_METHOD.to_string(),
            ),
            ("oauth_timestamp".to_string(), (self.timestamp)()),
            ("oauth_version".to_string(), OAUTH_VERSION.to_string()),
        ]);
        if !self.credentials.token.is_empty() {
            oauth_params.insert("oauth_token".into(), self.credentials.token.clone());
        }

        let signature = oauth::sign(
            "POST",
            url,
            &oauth_params,
            params,
            &self.credentials.consumer_secret,
            &self.credentials.token_secret,
        )?;
        oauth_params.insert("oauth_signature".into(), signature);

        Ok(oauth::authorization_header(&oauth_params))
    }
}

impl BookmarkSource for ApiClient {
    fn list_items(&self, exclude_ids: &[u64]) -> Result<Vec<RemoteItem>> {
        ApiClient::list_items(self, exclude_ids)
    }

    fn fetch_item_text(&self, id: u64) -> Result<String> {
        ApiClient::fetch_item_text(self, id)
    }
}

fn encode_form(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", oauth::percent_encode(k), oauth::percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn join_ids(ids: &[u64]) -> String {
    ids.iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn parse_token_body(body: &str) -> Result<(String, String)> {
    let mut token = String::new();
    let mut secret = String::new();
    for (key, value) in form_urlencoded::parse(body.trim().as_bytes()) {
        match key.as_ref() {
            "oauth_token" => token = value.into_owned(),
            "oauth_token_secret" => secret = value.into_owned(),
            _ => {}
        }
    }

    if token.is_empty() || secret.is_empty() {
        return Err(Error::Auth(format!(
            "response did not contain a token pair: {}",
            truncate_str(body, 100)
        )));
    }

    Ok((token, secret))
}
