// ABOUTME: Public library API for Instapaper feed sync
// ABOUTME: Re-exports core modules for external use

pub mod api;
pub mod auth;
pub mod cli;
pub mod error;
pub mod feed;
pub mod github;
pub mod model;
pub mod oauth;
pub mod retry;
pub mod storage;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use model::{Bookmark, Credentials, RemoteBookmark, RemoteItem};
