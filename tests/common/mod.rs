#![allow(dead_code)]

use kv_session::codec::KeyPair;
use kv_session::store::{self, Backend, KvStore, MemoryBackend, StoreConfig};
use kv_session::{CookieOptions, Value, Values};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

pub const COOKIE_NAME: &str = "test_sess";

pub fn hash_key() -> KeyPair {
    KeyPair::new("test-hash-key-0123456789")
}

pub fn rotated_hash_key() -> KeyPair {
    KeyPair::new("rotated-hash-key-9876543210")
}

pub fn encrypted_key() -> KeyPair {
    KeyPair::new("test-hash-key-0123456789").with_block_key(*b"0123456789abcdef0123456789abcdef")
}

pub fn build_cookie_options() -> CookieOptions {
    CookieOptions::build()
        .http_only(true)
        .same_site(cookie::SameSite::Lax)
        .secure(true)
        .max_age(3600)
        .path("/")
}

pub fn build_config() -> StoreConfig {
    StoreConfig::build().options(build_cookie_options())
}

pub async fn memory_store(config: StoreConfig) -> (Arc<MemoryBackend>, KvStore<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    let store = KvStore::connect(Arc::clone(&backend), vec![hash_key()], config)
        .await
        .unwrap();
    (backend, store)
}

pub fn create_test_values() -> Values {
    let mut preferences = BTreeMap::new();
    preferences.insert("theme".to_string(), Value::from("dark"));
    preferences.insert("language".to_string(), Value::from("en"));

    let mut values = Values::new();
    values.insert("user_id".to_string(), Value::Int(1));
    values.insert("name".to_string(), Value::from("Test User"));
    values.insert("score".to_string(), Value::Float(9.5));
    values.insert("admin".to_string(), Value::Bool(false));
    values.insert("nickname".to_string(), Value::Null);
    values.insert("roles".to_string(), Value::from(vec!["reader", "writer"]));
    values.insert("preferences".to_string(), Value::Map(preferences));
    values
}

/// A backend whose every operation fails, as if the server were down.
#[derive(Debug, Default)]
pub struct UnavailableBackend {
    pub reachable: bool,
}

fn unavailable() -> store::Error {
    store::Error::Backend("connection refused".to_string())
}

impl Backend for UnavailableBackend {
    async fn set(&self, _key: &str, _value: &[u8], _ttl: Duration) -> Result<(), store::Error> {
        Err(unavailable())
    }

    async fn get(&self, _key: &str) -> Result<Vec<u8>, store::Error> {
        Err(unavailable())
    }

    async fn delete(&self, _key: &str) -> Result<(), store::Error> {
        Err(unavailable())
    }

    async fn ping(&self) -> Result<(), store::Error> {
        if self.reachable {
            Ok(())
        } else {
            Err(unavailable())
        }
    }
}
