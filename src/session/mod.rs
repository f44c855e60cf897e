//! Sessions and the errors surfaced while loading and saving them.

use std::result;

use thiserror::Error;

mod cookie_options;
mod id;
mod value;

use crate::{codec, serializer, store};
pub use cookie_options::{CookieOptions, DEFAULT_COOKIE_MAX_AGE};
pub use id::{KEY_LENGTH, KeyGen, generate_key};
pub(crate) use id::default_key_gen;
pub use value::{Value, Values};

/// The key flash messages are stored under unless another one is given.
pub const FLASH_KEY: &str = "_flash";

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to configure the session store: {0}")]
    Configuration(String),

    #[error("failed to generate a session id")]
    KeyGeneration,

    #[error("failed to encode the session cookie: {0}")]
    Encoding(codec::Error),

    #[error(transparent)]
    Backend(#[from] store::Error),

    #[error(transparent)]
    Serialization(#[from] serializer::Error),

    #[error("the session payload is {size} bytes, the limit is {max}")]
    PayloadTooLarge { size: usize, max: usize },
}

pub type Result<T> = result::Result<T, Error>;

/// Server-side state for one client.
///
/// A session starts out new, with no id and empty values. The store assigns an id
/// the first time the session is saved, and the id never changes afterwards.
/// Handlers read and modify [`values`](Self::values) and [`options`](Self::options)
/// directly, then hand the session back to the store to persist it.
#[derive(Clone, Debug)]
pub struct Session {
    name: String,
    id: Option<String>,
    is_new: bool,
    cookie_error: Option<codec::Error>,
    pub values: Values,
    pub options: CookieOptions,
}

impl Session {
    /// Creates a new, empty session for the cookie `name`.
    pub fn new(name: impl Into<String>, options: CookieOptions) -> Self {
        Self {
            name: name.into(),
            id: None,
            is_new: true,
            cookie_error: None,
            values: Values::new(),
            options,
        }
    }

    pub(crate) fn loaded(
        name: impl Into<String>,
        id: String,
        values: Values,
        options: CookieOptions,
    ) -> Self {
        Self {
            id: Some(id),
            is_new: false,
            values,
            ..Self::new(name, options)
        }
    }

    /// The name of the cookie carrying this session.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the session ID, if it has been persisted.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Returns `true` if the session was not loaded from the backend.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Why the request's cookie was ignored, if it was.
    ///
    /// A tampered, expired or unreadable cookie never fails the request; the
    /// caller gets a fresh session and can inspect this to log or count it.
    pub fn cookie_error(&self) -> Option<&codec::Error> {
        self.cookie_error.as_ref()
    }

    pub(crate) fn set_cookie_error(&mut self, err: codec::Error) {
        self.cookie_error = Some(err);
    }

    /// Returns the session id, generating one with `key_gen` on first use.
    ///
    /// `None` means `key_gen` failed; the session is left without an id.
    pub(crate) fn id_or_gen(&mut self, key_gen: &KeyGen) -> Option<String> {
        if self.id.is_none() {
            let id = key_gen();
            if id.is_empty() {
                return None;
            }
            self.id = Some(id);
        }

        self.id.clone()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Inserts a value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Adds a flash message under `key`, or [`FLASH_KEY`] when `None`.
    ///
    /// Flash messages live in the session values until read with
    /// [`flashes`](Self::flashes), so they survive exactly one redirect when the
    /// session is saved in between.
    pub fn add_flash(&mut self, value: impl Into<Value>, key: Option<&str>) {
        let key = key.unwrap_or(FLASH_KEY);
        match self.values.get_mut(key) {
            Some(Value::List(items)) => items.push(value.into()),
            _ => {
                self.values
                    .insert(key.to_string(), Value::List(vec![value.into()]));
            }
        }
    }

    /// Removes and returns the flash messages stored under `key`, or
    /// [`FLASH_KEY`] when `None`.
    pub fn flashes(&mut self, key: Option<&str>) -> Vec<Value> {
        match self.values.remove(key.unwrap_or(FLASH_KEY)) {
            Some(Value::List(items)) => items,
            Some(other) => vec![other],
            None => Vec::new(),
        }
    }
}
