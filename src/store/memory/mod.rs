use crate::store::{Backend, Error};
use dashmap::DashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct StoredValue {
    data: Vec<u8>,
    expires_at: Instant,
}

impl StoredValue {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// An in-memory key-value backend.
///
/// Entries expire after their TTL like they would in Redis; expired entries are
/// swept lazily on every write.
///
/// ### Note
///
/// Sessions are lost on restart and not shared between processes. Do not use
/// this in a production environment.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: DashMap<String, StoredValue>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    /// Returns the remaining time to live of `key`, if it holds a live entry.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.data
            .get(key)
            .filter(|value| value.is_live(now))
            .map(|value| value.expires_at - now)
    }

    /// Returns `true` if `key` holds a live entry.
    pub fn contains_key(&self, key: &str) -> bool {
        self.ttl(key).is_some()
    }

    /// The number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.data.iter().filter(|entry| entry.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn cleanup_expired(&self) {
        let now = Instant::now();
        self.data.retain(|_, value| value.is_live(now));
    }
}

impl Backend for MemoryBackend {
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), Error> {
        self.cleanup_expired();

        self.data.insert(
            key.to_string(),
            StoredValue {
                data: value.to_vec(),
                expires_at: Instant::now() + ttl,
            },
        );

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, Error> {
        match self.data.get(key) {
            Some(value) if value.is_live(Instant::now()) => Ok(value.data.clone()),
            _ => Err(Error::NotFound),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        self.data.remove(key);
        Ok(())
    }
}
