// ABOUTME: Serde data models for Instapaper API responses and the local cache
// ABOUTME: Tagged list items, persisted bookmarks, and OAuth credentials

use serde::{Deserialize, Serialize};

/// OAuth1 credentials. The token pair stays empty until acquired.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub token: String,
    pub token_secret: String,
}

impl Credentials {
    pub fn new(consumer_key: impl Into<String>, consumer_secret: impl Into<String>) -> Self {
        Credentials {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            token: String::new(),
            token_secret: String::new(),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>, secret: impl Into<String>) -> Self {
        self.token = token.into();
        self.token_secret = secret.into();
        self
    }

    pub fn has_token(&self) -> bool {
        !self.token.is_empty() && !self.token_secret.is_empty()
    }
}

/// One entry of a `bookmarks/list` response, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RemoteItem {
    User {
        #[serde(default)]
        user_id: u64,
        #[serde(default)]
        username: String,
    },
    Bookmark(RemoteBookmark),
    Error {
        #[serde(default)]
        error_code: i64,
        #[serde(default)]
        message: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteBookmark {
    pub bookmark_id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub time: i64,
    #[serde(default)]
    pub description: String,
}

/// A bookmark as held in the local cache and rendered into the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: u64,
    pub title: String,
    pub url: String,
    pub time: i64,
    pub hash: String,
    #[serde(default)]
    pub text: String,
}

impl From<RemoteBookmark> for Bookmark {
    fn from(item: RemoteBookmark) -> Self {
        Bookmark {
            id: item.bookmark_id,
            title: item.title,
            url: item.url,
            time: item.time,
            hash: item.hash,
            text: String::new(),
        }
    }
}
