use cookie::Cookie;
use std::sync::Arc;
use std::time::Duration;

use crate::codec::{Codec, KeyPair};
use crate::serializer::Serializer;
use crate::session::{CookieOptions, Error, Result, Session, Values};
use crate::store::{self, Backend, MemoryBackend, SessionStore, StoreConfig};

/// A session store keeping session values in a key-value [`Backend`] and the
/// session id in a signed (optionally encrypted) cookie.
///
/// Each session lives at `key_prefix + id` with the backend's native TTL. The
/// cookie only carries the id, sealed by the store's [`Codec`].
///
/// Concurrent saves of the same session are not coordinated: the last write wins.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use kv_session::codec::KeyPair;
/// use kv_session::store::{KvStore, MemoryBackend, SessionStore, StoreConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), kv_session::Error> {
/// let store = KvStore::connect(
///     Arc::new(MemoryBackend::new()),
///     vec![KeyPair::new("a-long-random-hash-key")],
///     StoreConfig::default(),
/// )
/// .await?;
///
/// let mut session = store.new_session(None, "session").await?;
/// session.insert("user_id", 42);
/// let cookie = store.save(&mut session).await?;
///
/// let loaded = store.new_session(Some(cookie.value()), "session").await?;
/// assert_eq!(loaded.get("user_id").and_then(|v| v.as_i64()), Some(42));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct KvStore<B: Backend = MemoryBackend> {
    backend: Arc<B>,
    codec: Codec,
    config: StoreConfig,
}

impl<B> KvStore<B>
where
    B: Backend,
{
    /// Creates a store over `backend`, signing cookies with `key_pairs` (newest
    /// first).
    ///
    /// Fails with [`Error::Configuration`] if a key pair is invalid or the backend
    /// does not answer a ping.
    #[tracing::instrument(name = "connecting session store", skip_all)]
    pub async fn connect(
        backend: Arc<B>,
        key_pairs: Vec<KeyPair>,
        config: StoreConfig,
    ) -> Result<Self> {
        let codec = Codec::new(key_pairs).map_err(|err| {
            tracing::error!(err = %err, "invalid cookie keys");
            Error::Configuration(err.to_string())
        })?;
        if config.options.max_age > 0 {
            codec.set_max_age(config.options.max_age);
        }

        backend.ping().await.map_err(|err| {
            tracing::error!(err = %err, "session backend is unreachable");
            Error::Configuration(err.to_string())
        })?;

        Ok(Self {
            backend,
            codec,
            config,
        })
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// The cookie codec, e.g. to [`rotate`](Codec::rotate) keys at runtime.
    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Sets the cookie options copied into new sessions.
    ///
    /// A positive `max_age` also becomes the codec's age limit, as in
    /// [`connect`](Self::connect).
    pub fn set_options(&mut self, options: CookieOptions) {
        if options.max_age > 0 {
            self.codec.set_max_age(options.max_age);
        }
        self.config.options = options;
    }

    pub fn set_key_prefix(&mut self, key_prefix: impl Into<String>) {
        self.config.key_prefix = key_prefix.into();
    }

    /// Caps the serialized session size in bytes. `0` removes the cap.
    pub fn set_max_length(&mut self, max_length: usize) {
        self.config.max_length = max_length;
    }

    pub fn set_key_gen<F>(&mut self, key_gen: F)
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.config.key_gen = Arc::new(key_gen);
    }

    /// Replaces the serializer. Sessions written with the previous one can no
    /// longer be loaded.
    pub fn set_serializer<S: Serializer>(&mut self, serializer: S) {
        self.config.serializer = Arc::new(serializer);
    }

    pub fn set_default_max_age(&mut self, seconds: i64) {
        self.config.default_max_age = seconds;
    }

    /// Sets the lifetime of new sessions, in seconds.
    ///
    /// This changes both the default cookie `max_age` and the age limit the codec
    /// enforces on incoming cookies, for every key pair.
    pub fn set_max_age(&mut self, seconds: i64) {
        self.config.options.max_age = seconds;
        self.codec.set_max_age(seconds);
    }

    /// Releases the backend.
    pub async fn close(&self) -> Result<()> {
        self.backend.close().await.map_err(|err| {
            tracing::error!(err = %err, "failed to close the session backend");
            err.into()
        })
    }

    fn key(&self, id: &str) -> String {
        format!("{}{}", self.config.key_prefix, id)
    }

    async fn load(&self, id: &str) -> std::result::Result<Vec<u8>, store::Error> {
        self.backend.get(&self.key(id)).await
    }

    fn ttl(&self, options: &CookieOptions) -> Duration {
        let age = if options.max_age != 0 {
            options.max_age
        } else {
            self.config.default_max_age
        };

        Duration::from_secs(age.max(0) as u64)
    }
}

impl<B> SessionStore for KvStore<B>
where
    B: Backend,
{
    #[tracing::instrument(name = "loading session", skip(self, cookie_value))]
    async fn new_session(&self, cookie_value: Option<&str>, name: &str) -> Result<Session> {
        let mut session = Session::new(name, self.config.options.clone());
        let Some(cookie_value) = cookie_value else {
            return Ok(session);
        };

        let id = match self.codec.decode::<String>(name, cookie_value) {
            Ok(id) if !id.is_empty() => id,
            Ok(_) => {
                tracing::warn!("possibly suspicious activity: empty session id");
                session.set_cookie_error(crate::codec::Error::Malformed(
                    "empty session id".to_string(),
                ));
                return Ok(session);
            }
            Err(err) => {
                tracing::warn!(err = %err, "possibly suspicious activity: rejected session cookie");
                session.set_cookie_error(err);
                return Ok(session);
            }
        };

        let bytes = match self.load(&id).await {
            Ok(bytes) => bytes,
            Err(store::Error::NotFound) => {
                tracing::debug!("session not found in the backend");
                return Ok(session);
            }
            Err(err) => {
                tracing::error!(err = %err, "failed to load session from the backend");
                return Err(err.into());
            }
        };

        let values: Values = self.config.serializer.deserialize(&bytes).map_err(|err| {
            tracing::error!(err = %err, "failed to deserialize session");
            err
        })?;

        Ok(Session::loaded(
            name,
            id,
            values,
            self.config.options.clone(),
        ))
    }

    #[tracing::instrument(name = "saving session", skip_all, fields(name = session.name()))]
    async fn save(&self, session: &mut Session) -> Result<Cookie<'static>> {
        if session.options.max_age <= 0 {
            if let Some(id) = session.id() {
                self.backend.delete(&self.key(id)).await.map_err(|err| {
                    tracing::error!(err = %err, "failed to delete expired session");
                    err
                })?;
            }

            return Ok(session.options.to_removal_cookie(session.name()));
        }

        let id = session.id_or_gen(&self.config.key_gen).ok_or_else(|| {
            tracing::error!("failed to generate a session id");
            Error::KeyGeneration
        })?;

        let bytes = self.config.serializer.serialize(&session.values).map_err(|err| {
            tracing::error!(err = %err, "failed to serialize session");
            err
        })?;

        let max = self.config.max_length;
        if max != 0 && bytes.len() > max {
            tracing::warn!(size = bytes.len(), max, "session payload is too large");
            return Err(Error::PayloadTooLarge {
                size: bytes.len(),
                max,
            });
        }

        self.backend
            .set(&self.key(&id), &bytes, self.ttl(&session.options))
            .await
            .map_err(|err| {
                tracing::error!(err = %err, "failed to save session to the backend");
                err
            })?;

        let token = self.codec.encode(session.name(), &id).map_err(|err| {
            tracing::error!(err = %err, "failed to encode the session cookie");
            Error::Encoding(err)
        })?;

        Ok(session.options.to_cookie(session.name(), token))
    }

    #[tracing::instrument(name = "deleting session", skip_all, fields(name = session.name()))]
    async fn delete(&self, session: &Session) -> Result<Cookie<'static>> {
        if let Some(id) = session.id() {
            self.backend.delete(&self.key(id)).await.map_err(|err| {
                tracing::error!(err = %err, "failed to delete session from the backend");
                err
            })?;
        }

        Ok(session.options.to_removal_cookie(session.name()))
    }
}
