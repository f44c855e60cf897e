//! # kv-session: server-side sessions behind sealed cookies
//!
//! `kv-session` keeps session state in a key-value backend and hands the client
//! nothing but a small, signed (and optionally encrypted) cookie carrying the
//! session id.
//!
//! # Quick Start
//!
//! Here's a basic example with [Axum](https://docs.rs/axum/latest/axum/) and the
//! in-memory backend. This requires the `axum` feature (enabled by default).
//!
//! ```rust,no_run
//! use axum::{Router, routing::get};
//! use kv_session::codec::KeyPair;
//! use kv_session::store::{KvStore, MemoryBackend, StoreConfig};
//! use kv_session::{CookieOptions, SessionLayer, Sessions};
//! use std::sync::Arc;
//! use tower_cookies::CookieManagerLayer;
//!
//! #[tokio::main]
//! async fn main() {
//!     // Configure session-cookie options
//!     let cookie_options = CookieOptions::build()
//!         .http_only(true)
//!         .same_site(cookie::SameSite::Lax)
//!         .secure(true)
//!         .max_age(3600) // 1 hour
//!         .path("/");
//!
//!     // Create the session store
//!     let store = KvStore::connect(
//!         Arc::new(MemoryBackend::new()),
//!         vec![KeyPair::new("a-long-random-hash-key")],
//!         StoreConfig::build().options(cookie_options),
//!     )
//!     .await
//!     .unwrap();
//!
//!     // Set up router with session management
//!     let app = Router::new()
//!         .route("/", get(handler))
//!         .layer(SessionLayer::new(Arc::new(store)))
//!         .layer(CookieManagerLayer::new()); // CookieManagerLayer must be after
//!
//!     // Run the server
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//!
//! async fn handler(sessions: Sessions<KvStore>) -> String {
//!     let mut session = sessions.get("session").await.unwrap();
//!     let count = session.get("count").and_then(|v| v.as_i64()).unwrap_or(0) + 1;
//!     session.insert("count", count);
//!     sessions.save(&mut session).await.unwrap();
//!     format!("You've visited this page {} times", count)
//! }
//! ```
//!
//! # Session lifecycle
//!
//! - [`SessionStore::new_session`] decodes the cookie, loads the values stored at
//!   `key_prefix + id` and returns the session. A missing, tampered or expired
//!   cookie, or a session the backend no longer holds, gives a fresh session
//!   instead of an error.
//! - [`SessionStore::save`] assigns an id on first save, serializes the values,
//!   enforces `max_length`, writes them with a TTL and returns the cookie. A
//!   session whose `max_age` is zero or negative is deleted instead.
//! - [`SessionStore::delete`] removes the session and returns a cookie clearing it.
//!
//! # Backends
//!
//! - [`MemoryBackend`](store::MemoryBackend): in-process, for tests and development.
//! - [`RedisBackend`](store::redis::RedisBackend): requires the `redis-store`
//!   feature.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fred::clients::Client;
//! use kv_session::store::redis::RedisBackend;
//!
//! let client = Client::default();
//! let backend = RedisBackend::new(Arc::new(client));
//! ```
//!
//! # Cookie keys and rotation
//!
//! Cookies are authenticated with HMAC-SHA256 and, when a block key is given,
//! encrypted with AES-GCM. The store takes a list of [`KeyPair`](codec::KeyPair)s,
//! newest first; see [`codec`] for how to rotate keys without logging users out.
//!
//! ## Serialization
//!
//! Session values are stored with one of:
//!
//! - [`bincode`](https://crates.io/crates/bincode) (default).
//! - [`rmp-serde`](https://crates.io/crates/rmp-serde) (MessagePack), with the
//!   `messagepack` feature.
//! - JSON, always available, which reads every number back as a float.
//!
//! # Important Notes
//!
//! ## Middleware Ordering
//! The `SessionLayer` must be applied **before** the `CookieManagerLayer`, so that
//! the cookie manager wraps it.
//!
//! ## Concurrency
//! Two requests saving the same session race; the last write wins. Read-modify-write
//! cycles across concurrent requests are not coordinated.

pub use cookie;

pub mod codec;

#[cfg(feature = "axum")]
mod extract;

#[cfg(feature = "redis-store")]
pub use fred;

pub mod serializer;

mod service;
pub use service::*;

mod session;
pub use session::*;

pub mod store;
pub use store::SessionStore;

pub use tower_cookies;
