//! Session middleware for tower applications.
//!
//! This module provides [`SessionLayer`], which makes a [`SessionStore`] available
//! to every request, and [`Sessions`], which binds that store to the request's
//! cookies.

use http::{Request, Response};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tower_cookies::Cookies;

use crate::session::{Result, Session};
use crate::store::SessionStore;

/// A Tower Middleware placing the session store in the request extensions.
#[derive(Debug)]
pub struct SessionService<S, T: SessionStore> {
    inner: S,
    store: Arc<T>,
}

impl<S: Clone, T: SessionStore> Clone for SessionService<S, T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            store: Arc::clone(&self.store),
        }
    }
}

impl<ReqBody, ResBody, S, T> Service<Request<ReqBody>> for SessionService<S, T>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    T: SessionStore,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    #[inline]
    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        req.extensions_mut().insert(Arc::clone(&self.store));
        self.inner.call(req)
    }
}

/// Layer to apply [`SessionService`] middleware.
///
/// The layer must be wrapped by tower-cookies' `CookieManagerLayer`, which parses
/// the request cookies and writes the `Set-Cookie` headers.
///
/// # Example
///
/// ```rust
/// use kv_session::SessionLayer;
/// use kv_session::codec::KeyPair;
/// use kv_session::store::{KvStore, MemoryBackend, StoreConfig};
/// use std::sync::Arc;
/// use tower_cookies::CookieManagerLayer;
///
/// # async fn run() -> Result<(), kv_session::Error> {
/// let store = KvStore::connect(
///     Arc::new(MemoryBackend::new()),
///     vec![KeyPair::new("hash-key")],
///     StoreConfig::default(),
/// )
/// .await?;
///
/// let session_layer = SessionLayer::new(Arc::new(store));
/// let layers = tower::ServiceBuilder::new()
///     .layer(CookieManagerLayer::new())
///     .layer(session_layer);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SessionLayer<T: SessionStore> {
    store: Arc<T>,
}

impl<T: SessionStore> Clone for SessionLayer<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<T> SessionLayer<T>
where
    T: SessionStore,
{
    /// Create a new session layer.
    pub fn new(store: Arc<T>) -> Self {
        Self { store }
    }
}

impl<S, T> Layer<S> for SessionLayer<T>
where
    T: SessionStore,
{
    type Service = SessionService<S, T>;

    fn layer(&self, inner: S) -> Self::Service {
        SessionService {
            inner,
            store: Arc::clone(&self.store),
        }
    }
}

/// A session store bound to the cookies of one request.
///
/// Reads the session cookie from the request and queues `Set-Cookie` headers for
/// the response. With the `axum` feature it is also an extractor.
pub struct Sessions<T: SessionStore> {
    store: Arc<T>,
    cookies: Cookies,
}

impl<T: SessionStore> Clone for Sessions<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cookies: self.cookies.clone(),
        }
    }
}

impl<T> Sessions<T>
where
    T: SessionStore,
{
    pub fn new(store: Arc<T>, cookies: Cookies) -> Self {
        Self { store, cookies }
    }

    pub fn store(&self) -> &Arc<T> {
        &self.store
    }

    /// Loads the session carried by the cookie `name`, or starts a new one.
    #[tracing::instrument(name = "getting session for request", skip(self))]
    pub async fn get(&self, name: &str) -> Result<Session> {
        let cookie_value = self
            .cookies
            .get(name)
            .map(|cookie| cookie.value().to_string());

        self.store.new_session(cookie_value.as_deref(), name).await
    }

    /// Saves `session` and sets its cookie on the response.
    pub async fn save(&self, session: &mut Session) -> Result<()> {
        let cookie = self.store.save(session).await?;
        self.cookies.add(cookie);
        Ok(())
    }

    /// Deletes `session` and clears its cookie on the response.
    pub async fn delete(&self, session: &Session) -> Result<()> {
        let cookie = self.store.delete(session).await?;
        self.cookies.add(cookie);
        Ok(())
    }
}
