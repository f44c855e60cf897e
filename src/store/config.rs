use std::fmt;
use std::sync::Arc;

use crate::serializer::{self, Serializer};
use crate::session::{self, CookieOptions, KeyGen};

/// Twenty minutes, in seconds.
pub const DEFAULT_MAX_AGE: i64 = 60 * 20;

pub const DEFAULT_KEY_PREFIX: &str = "session:";

/// Configuration for a [`KvStore`](crate::store::KvStore).
///
/// # Example
///
/// ```rust
/// use kv_session::CookieOptions;
/// use kv_session::serializer::JsonSerializer;
/// use kv_session::store::StoreConfig;
///
/// let config = StoreConfig::build()
///     .key_prefix("app:session:")
///     .max_length(4096)
///     .default_max_age(30 * 60)
///     .serializer(JsonSerializer)
///     .options(CookieOptions::build().path("/app").max_age(3600));
/// ```
#[derive(Clone)]
pub struct StoreConfig {
    /// Cookie attributes copied into every new session.
    pub options: CookieOptions,
    /// Prepended to every session id to form the backend key.
    pub key_prefix: String,
    /// Largest serialized session accepted, in bytes. `0` means unlimited.
    pub max_length: usize,
    /// Backend TTL, in seconds, for sessions whose `max_age` is `0`.
    pub default_max_age: i64,
    pub key_gen: KeyGen,
    pub serializer: Arc<dyn Serializer>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            options: CookieOptions::default(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            max_length: 0,
            default_max_age: DEFAULT_MAX_AGE,
            key_gen: session::default_key_gen(),
            serializer: serializer::default_serializer(),
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("options", &self.options)
            .field("key_prefix", &self.key_prefix)
            .field("max_length", &self.max_length)
            .field("default_max_age", &self.default_max_age)
            .field("serializer", &self.serializer)
            .finish_non_exhaustive()
    }
}

impl StoreConfig {
    /// Creates a new `StoreConfig` with default values.
    pub fn build() -> Self {
        Self::default()
    }

    pub fn options(mut self, options: CookieOptions) -> Self {
        self.options = options;
        self
    }

    pub fn key_prefix(mut self, key_prefix: impl Into<String>) -> Self {
        self.key_prefix = key_prefix.into();
        self
    }

    pub fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn default_max_age(mut self, seconds: i64) -> Self {
        self.default_max_age = seconds;
        self
    }

    /// Replaces the session id generator. Returning an empty string fails the save.
    pub fn key_gen<F>(mut self, key_gen: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.key_gen = Arc::new(key_gen);
        self
    }

    pub fn serializer<S: Serializer>(mut self, serializer: S) -> Self {
        self.serializer = Arc::new(serializer);
        self
    }
}
