//! Authenticated, optionally encrypted, cookie tokens.
//!
//! A token is `base64url(tag ‖ timestamp ‖ payload)` without padding, where
//!
//! - `payload` is the JSON-encoded value, AES-GCM encrypted (`nonce ‖ ciphertext`)
//!   when the key pair carries a block key,
//! - `timestamp` is the encoding time as 8 big-endian bytes of unix seconds,
//! - `tag` is the HMAC-SHA256 of `name ‖ "|" ‖ timestamp ‖ payload`.
//!
//! Binding the cookie name into the tag stops a token issued for one cookie from
//! being replayed under another.
//!
//! # Key rotation
//!
//! A [`Codec`] holds an ordered list of [`KeyPair`]s, newest first. Tokens are
//! always produced with the first pair; decoding tries every pair in order. To
//! rotate, prepend the new pair and keep the old one around until the cookies it
//! signed have expired:
//!
//! ```rust
//! use kv_session::codec::{Codec, KeyPair};
//!
//! let codec = Codec::new(vec![KeyPair::new("old-key")]).unwrap();
//! let token = codec.encode("session", &"an-id").unwrap();
//!
//! codec
//!     .rotate(vec![KeyPair::new("new-key"), KeyPair::new("old-key")])
//!     .unwrap();
//! let id: String = codec.decode("session", &token).unwrap();
//! assert_eq!(id, "an-id");
//! ```

mod key;

use base64::Engine;
use base64::prelude::BASE64_URL_SAFE_NO_PAD;
use parking_lot::RwLock;
use serde::{Serialize, de::DeserializeOwned};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

pub use key::KeyPair;
use key::{SecureCookie, TAG_LEN};

use crate::session::DEFAULT_COOKIE_MAX_AGE;

const TIMESTAMP_LEN: usize = 8;

/// Longest token accepted or produced by default, the practical size limit of a
/// single browser cookie.
pub const DEFAULT_MAX_LENGTH: usize = 4096;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid cookie key: {0}")]
    InvalidKey(String),

    #[error("failed to encode the cookie value: {0}")]
    Encoding(String),

    #[error("the cookie has expired")]
    Expired,

    #[error("the cookie signature is invalid")]
    InvalidSignature,

    #[error("the cookie value is malformed: {0}")]
    Malformed(String),
}

/// Signs, encrypts and verifies cookie tokens under a rotating list of keys.
pub struct Codec {
    cookies: RwLock<Arc<[SecureCookie]>>,
    max_age: AtomicI64,
    max_length: AtomicUsize,
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec")
            .field("keys", &self.cookies.read().len())
            .field("max_age", &self.max_age())
            .field("max_length", &self.max_length.load(Ordering::Relaxed))
            .finish()
    }
}

impl Codec {
    /// Creates a codec from key pairs ordered newest first.
    ///
    /// Fails if the list is empty, a hash key is empty, or a block key is neither
    /// 16 nor 32 bytes long.
    pub fn new(key_pairs: Vec<KeyPair>) -> Result<Self, Error> {
        Ok(Self {
            cookies: RwLock::new(build_cookies(&key_pairs)?),
            max_age: AtomicI64::new(DEFAULT_COOKIE_MAX_AGE),
            max_length: AtomicUsize::new(DEFAULT_MAX_LENGTH),
        })
    }

    /// Replaces the key list in one step.
    ///
    /// Encodes and decodes running concurrently keep using the list they started
    /// with. On error the current list stays in place.
    pub fn rotate(&self, key_pairs: Vec<KeyPair>) -> Result<(), Error> {
        let cookies = build_cookies(&key_pairs)?;
        *self.cookies.write() = cookies;
        tracing::debug!(keys = key_pairs.len(), "rotated cookie keys");
        Ok(())
    }

    /// Sets the maximum token age, in seconds, for every key pair.
    ///
    /// Zero or a negative value disables the age check.
    pub fn set_max_age(&self, seconds: i64) {
        self.max_age.store(seconds, Ordering::Relaxed);
    }

    pub fn max_age(&self) -> i64 {
        self.max_age.load(Ordering::Relaxed)
    }

    /// Sets the maximum token length. Zero disables the limit.
    pub fn set_max_length(&self, length: usize) {
        self.max_length.store(length, Ordering::Relaxed);
    }

    /// Encodes `value` into a token for the cookie `name` using the newest key pair.
    pub fn encode<T>(&self, name: &str, value: &T) -> Result<String, Error>
    where
        T: Serialize + ?Sized,
    {
        self.encode_at(name, value, now())
    }

    fn encode_at<T>(&self, name: &str, value: &T, timestamp: i64) -> Result<String, Error>
    where
        T: Serialize + ?Sized,
    {
        let cookies = self.keys();
        let cookie = cookies
            .first()
            .ok_or_else(|| Error::InvalidKey("no key pairs configured".to_string()))?;

        let serialized = serde_json::to_vec(value).map_err(|e| Error::Encoding(e.to_string()))?;
        let payload = cookie.seal(serialized)?;
        let timestamp = timestamp.to_be_bytes();
        let tag = cookie.sign(name, &timestamp, &payload)?;

        let mut raw = Vec::with_capacity(TAG_LEN + TIMESTAMP_LEN + payload.len());
        raw.extend_from_slice(&tag);
        raw.extend_from_slice(&timestamp);
        raw.extend_from_slice(&payload);

        let token = BASE64_URL_SAFE_NO_PAD.encode(raw);
        let max_length = self.max_length.load(Ordering::Relaxed);
        if max_length != 0 && token.len() > max_length {
            return Err(Error::Encoding(format!(
                "the token is {} bytes long, the limit is {max_length}",
                token.len()
            )));
        }

        Ok(token)
    }

    /// Decodes a token produced by [`encode`](Self::encode) for the cookie `name`.
    ///
    /// Key pairs are tried newest to oldest; the first whose tag matches decides the
    /// outcome.
    pub fn decode<T>(&self, name: &str, token: &str) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        self.decode_at(name, token, now())
    }

    fn decode_at<T>(&self, name: &str, token: &str, now: i64) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        let max_length = self.max_length.load(Ordering::Relaxed);
        if max_length != 0 && token.len() > max_length {
            return Err(Error::Malformed("the token is too long".to_string()));
        }

        let raw = BASE64_URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|e| Error::Malformed(e.to_string()))?;
        if raw.len() < TAG_LEN + TIMESTAMP_LEN {
            return Err(Error::Malformed("the token is too short".to_string()));
        }

        let (tag, rest) = raw.split_at(TAG_LEN);
        let (timestamp, payload) = rest.split_at(TIMESTAMP_LEN);

        let max_age = self.max_age();
        for cookie in self.keys().iter() {
            if !cookie.verify(name, timestamp, payload, tag) {
                continue;
            }

            let mut issued_at = [0u8; TIMESTAMP_LEN];
            issued_at.copy_from_slice(timestamp);
            if max_age > 0 && i64::from_be_bytes(issued_at) < now - max_age {
                return Err(Error::Expired);
            }

            let Some(plaintext) = cookie.open(payload) else {
                continue;
            };

            return serde_json::from_slice(&plaintext).map_err(|e| Error::Malformed(e.to_string()));
        }

        Err(Error::InvalidSignature)
    }

    fn keys(&self) -> Arc<[SecureCookie]> {
        Arc::clone(&self.cookies.read())
    }
}

fn build_cookies(key_pairs: &[KeyPair]) -> Result<Arc<[SecureCookie]>, Error> {
    if key_pairs.is_empty() {
        return Err(Error::InvalidKey(
            "at least one key pair is required".to_string(),
        ));
    }

    key_pairs.iter().map(SecureCookie::new).collect()
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or_default()
}
