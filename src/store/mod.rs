//! Session stores and the key-value backends behind them.
//!
//! [`KvStore`] implements the session lifecycle on top of any [`Backend`]:
//!
//! - [`memory::MemoryBackend`], an in-process map for tests and development.
//! - [`redis::RedisBackend`], a Redis backend (requires the `redis-store` feature).

mod config;
mod kv;
pub mod memory;
#[cfg(feature = "redis-store")]
pub mod redis;

use cookie::Cookie;
use std::future::Future;
use std::time::Duration;

use crate::session::{Result, Session};

pub use config::StoreConfig;
pub use kv::KvStore;
pub use memory::MemoryBackend;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The key does not exist, or has expired.
    #[error("key not found")]
    NotFound,

    #[error("{0}")]
    Backend(String),
}

#[cfg(feature = "redis-store")]
impl From<fred::error::Error> for Error {
    fn from(err: fred::error::Error) -> Self {
        Error::Backend(err.to_string())
    }
}

/// The key-value operations a [`KvStore`] needs from its storage engine.
///
/// `get` must report a missing key as [`Error::NotFound`] and nothing else, so the
/// store can tell "no such session" apart from an unavailable backend. `delete`
/// must succeed for a missing key.
pub trait Backend: Send + Sync + 'static {
    /// Stores `value` at `key`, replacing any previous value, and expires it after `ttl`.
    fn set(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> impl Future<Output = std::result::Result<(), Error>> + Send;

    fn get(&self, key: &str) -> impl Future<Output = std::result::Result<Vec<u8>, Error>> + Send;

    fn delete(&self, key: &str) -> impl Future<Output = std::result::Result<(), Error>> + Send;

    /// Checks that the backend is reachable.
    fn ping(&self) -> impl Future<Output = std::result::Result<(), Error>> + Send {
        async { Ok(()) }
    }

    /// Releases the underlying client.
    fn close(&self) -> impl Future<Output = std::result::Result<(), Error>> + Send {
        async { Ok(()) }
    }
}

/// The session provider contract handlers program against.
///
/// Every store creates sessions from an incoming cookie value, persists them and
/// deletes them, returning the cookie to attach to the response. Code written
/// against this trait works with any backend.
pub trait SessionStore: Send + Sync + 'static {
    /// Returns the session referenced by `cookie_value`, or a new one.
    ///
    /// A missing, invalid or expired cookie, or one pointing at a session the
    /// backend no longer holds, yields a new session rather than an error.
    fn new_session(
        &self,
        cookie_value: Option<&str>,
        name: &str,
    ) -> impl Future<Output = Result<Session>> + Send;

    /// Persists `session` and returns the cookie for the response.
    ///
    /// A session whose `max_age` is zero or negative is deleted instead, and the
    /// returned cookie clears it in the browser.
    fn save(&self, session: &mut Session) -> impl Future<Output = Result<Cookie<'static>>> + Send;

    /// Deletes `session` from the backend and returns a cookie clearing it.
    fn delete(&self, session: &Session) -> impl Future<Output = Result<Cookie<'static>>> + Send;
}
