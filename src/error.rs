// ABOUTME: Error types with structured exit codes for CLI
// ABOUTME: Maps domain errors to specific exit codes for shell scripting

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API error {status} on {endpoint}: {message}")]
    Api {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("Decode error: {source} (body starts with: {preview})")]
    Decode {
        #[source]
        source: serde_json::Error,
        preview: String,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Feed error: {0}")]
    Feed(String),

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wraps the error with operation context, keeping its kind.
    pub fn context(self, context: impl Into<String>) -> Self {
        Error::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Innermost error beneath any context layers.
    pub fn root(&self) -> &Error {
        match self {
            Error::Context { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self.root() {
            Error::Config(_) => 2,
            Error::Auth(_) => 3,
            Error::Transport(_) => 4,
            Error::Api { .. } => 5,
            Error::Decode { .. } => 6,
            Error::Storage(_) => 7,
            Error::Feed(_) => 8,
            Error::Context { .. } => 1,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Adds operation context to fallible calls.
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(context))
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| e.context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_exit_codes() {
        assert_eq!(Error::Config("test".into()).exit_code(), 2);
        assert_eq!(Error::Auth("test".into()).exit_code(), 3);
        assert_eq!(
            Error::Api {
                endpoint: "test".into(),
                status: 404,
                message: "not found".into()
            }
            .exit_code(),
            5
        );
        assert_eq!(Error::Storage("test".into()).exit_code(), 7);
    }

    #[test]
    fn test_context_keeps_kind() {
        let err = Error::Api {
            endpoint: "bookmarks/get_text".into(),
            status: 400,
            message: "bad".into(),
        }
        .context("fetching text of bookmark 7")
        .context("sync");

        assert_eq!(err.exit_code(), 5);
        assert!(matches!(err.root(), Error::Api { status: 400, .. }));
        assert_eq!(
            err.to_string(),
            "sync: fetching text of bookmark 7: API error 400 on bookmarks/get_text: bad"
        );
    }

    #[test]
    fn test_result_ext_with_context() {
        let result: Result<()> = Err(Error::Storage("disk full".into()));
        let err = result.with_context(|| format!("writing bookmark {}", 3)).unwrap_err();
        assert_eq!(err.to_string(), "writing bookmark 3: Storage error: disk full");
    }
}
