use crate::store::{Backend, Error};
use fred::clients::Client;
use fred::interfaces::{ClientLike, KeysInterface};
use fred::types::Expiration;
use fred::types::config::Config;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

/// A Redis key-value backend.
///
/// Every session is a plain string key written with `SET key value EX ttl`, so
/// Redis expires it natively. A nil `GET` reply is reported as
/// [`Error::NotFound`]; every client or server error is [`Error::Backend`].
///
/// The client is shared and its connection is managed by the caller; the
/// backend only issues commands and `QUIT` on [`close`](Backend::close).
/// [`from_url`](RedisBackend::from_url) and [`from_config`](RedisBackend::from_config)
/// build and connect a client in one step.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use fred::clients::Client;
/// use fred::interfaces::ClientLike;
/// use kv_session::store::redis::RedisBackend;
///
/// # async fn run() -> Result<(), fred::error::Error> {
/// let client = Client::default();
/// client.init().await?;
/// let backend = RedisBackend::new(Arc::new(client));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct RedisBackend<C: KeysInterface + ClientLike + Clone + Send + Sync = Client> {
    client: Arc<C>,
}

impl<C> RedisBackend<C>
where
    C: KeysInterface + ClientLike + Clone + Send + Sync,
{
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }
}

impl RedisBackend<Client> {
    /// Creates a client from `config`, connects it and waits for the connection.
    pub async fn from_config(config: Config) -> Result<Self, Error> {
        let client = Client::new(config, None, None, None);
        client.init().await.map_err(|err| {
            tracing::error!(err = %err, "failed to connect to redis");
            Error::from(err)
        })?;

        Ok(Self::new(Arc::new(client)))
    }

    /// Connects to the server at `url`, e.g. `redis://127.0.0.1:6379/0`.
    pub async fn from_url(url: &str) -> Result<Self, Error> {
        Self::from_config(Config::from_url(url)?).await
    }
}

impl<C> Backend for RedisBackend<C>
where
    C: KeysInterface + ClientLike + Clone + Send + Sync + 'static,
{
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), Error> {
        // EX 0 is rejected by Redis.
        let seconds = ttl.as_secs().max(1) as i64;
        let _: () = self
            .client
            .set(key, value.to_vec(), Some(Expiration::EX(seconds)), None, false)
            .await?;

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, Error> {
        self.client
            .get::<Option<Vec<u8>>, _>(key)
            .await?
            .ok_or(Error::NotFound)
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        let _: i64 = self.client.del(key).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), Error> {
        let _: () = self.client.ping(None).await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), Error> {
        self.client.quit().await?;
        Ok(())
    }
}
