use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

use crate::codec::Error;

type HmacSha256 = Hmac<Sha256>;

pub(crate) const TAG_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// One generation of cookie keys.
///
/// The hash key authenticates every token. The optional block key additionally
/// encrypts the payload with AES-GCM and must be 16 bytes (AES-128) or 32 bytes
/// (AES-256) long.
#[derive(Clone)]
pub struct KeyPair {
    pub hash_key: Vec<u8>,
    pub block_key: Option<Vec<u8>>,
}

impl KeyPair {
    /// Creates a signing-only key pair.
    pub fn new(hash_key: impl Into<Vec<u8>>) -> Self {
        Self {
            hash_key: hash_key.into(),
            block_key: None,
        }
    }

    /// Adds a block key so payloads are encrypted as well as signed.
    pub fn with_block_key(mut self, block_key: impl Into<Vec<u8>>) -> Self {
        self.block_key = Some(block_key.into());
        self
    }

    /// Builds key pairs from an alternating `hash, block, hash, block, ...` list.
    ///
    /// A trailing hash key without a block key yields a signing-only pair, as does
    /// an empty block key.
    ///
    /// ```rust
    /// use kv_session::codec::KeyPair;
    ///
    /// let pairs = KeyPair::from_pairs(&[
    ///     b"new-hash-key".as_slice(),
    ///     b"0123456789abcdef0123456789abcdef".as_slice(),
    ///     b"old-hash-key".as_slice(),
    /// ]);
    /// assert_eq!(pairs.len(), 2);
    /// assert!(pairs[0].block_key.is_some());
    /// assert!(pairs[1].block_key.is_none());
    /// ```
    pub fn from_pairs(keys: &[&[u8]]) -> Vec<KeyPair> {
        keys.chunks(2)
            .map(|chunk| {
                let pair = KeyPair::new(chunk[0]);
                match chunk.get(1) {
                    Some(block_key) if !block_key.is_empty() => pair.with_block_key(*block_key),
                    _ => pair,
                }
            })
            .collect()
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("hash_key", &"[redacted]")
            .field("block_key", &self.block_key.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

#[derive(Clone)]
enum BlockCipher {
    Aes128(Aes128Gcm),
    Aes256(Aes256Gcm),
}

impl BlockCipher {
    fn new(block_key: &[u8]) -> Result<Self, Error> {
        match block_key.len() {
            16 => Aes128Gcm::new_from_slice(block_key).map(BlockCipher::Aes128),
            32 => Aes256Gcm::new_from_slice(block_key).map(BlockCipher::Aes256),
            len => {
                return Err(Error::InvalidKey(format!(
                    "block key must be 16 or 32 bytes, got {len}"
                )));
            }
        }
        .map_err(|e| Error::InvalidKey(e.to_string()))
    }

    /// Returns `nonce ‖ ciphertext`.
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, Error> {
        let (nonce, ciphertext) = match self {
            BlockCipher::Aes128(cipher) => {
                let nonce = Aes128Gcm::generate_nonce(&mut OsRng);
                (nonce, cipher.encrypt(&nonce, plaintext))
            }
            BlockCipher::Aes256(cipher) => {
                let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
                (nonce, cipher.encrypt(&nonce, plaintext))
            }
        };
        let ciphertext = ciphertext.map_err(|e| Error::Encoding(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    fn decrypt(&self, sealed: &[u8]) -> Option<Vec<u8>> {
        if sealed.len() < NONCE_LEN {
            return None;
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce);

        match self {
            BlockCipher::Aes128(cipher) => cipher.decrypt(nonce, ciphertext).ok(),
            BlockCipher::Aes256(cipher) => cipher.decrypt(nonce, ciphertext).ok(),
        }
    }
}

/// A validated [`KeyPair`], ready to seal and open payloads.
#[derive(Clone)]
pub(crate) struct SecureCookie {
    hash_key: Vec<u8>,
    cipher: Option<BlockCipher>,
}

impl SecureCookie {
    pub(crate) fn new(pair: &KeyPair) -> Result<Self, Error> {
        if pair.hash_key.is_empty() {
            return Err(Error::InvalidKey("hash key must not be empty".to_string()));
        }

        let cipher = pair.block_key.as_deref().map(BlockCipher::new).transpose()?;

        Ok(Self {
            hash_key: pair.hash_key.clone(),
            cipher,
        })
    }

    fn mac(&self, name: &str, timestamp: &[u8], payload: &[u8]) -> Result<HmacSha256, Error> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.hash_key)
            .map_err(|e| Error::InvalidKey(e.to_string()))?;
        mac.update(name.as_bytes());
        mac.update(b"|");
        mac.update(timestamp);
        mac.update(payload);
        Ok(mac)
    }

    /// Encrypts `plaintext` when a block key is configured.
    pub(crate) fn seal(&self, plaintext: Vec<u8>) -> Result<Vec<u8>, Error> {
        match &self.cipher {
            Some(cipher) => cipher.encrypt(&plaintext),
            None => Ok(plaintext),
        }
    }

    pub(crate) fn sign(
        &self,
        name: &str,
        timestamp: &[u8],
        payload: &[u8],
    ) -> Result<Vec<u8>, Error> {
        Ok(self.mac(name, timestamp, payload)?.finalize().into_bytes().to_vec())
    }

    /// Checks `tag` in constant time.
    pub(crate) fn verify(&self, name: &str, timestamp: &[u8], payload: &[u8], tag: &[u8]) -> bool {
        self.mac(name, timestamp, payload)
            .map(|mac| mac.verify_slice(tag).is_ok())
            .unwrap_or(false)
    }

    /// Reverses [`seal`](Self::seal). `None` means this key cannot open the payload.
    pub(crate) fn open(&self, payload: &[u8]) -> Option<Vec<u8>> {
        match &self.cipher {
            Some(cipher) => cipher.decrypt(payload),
            None => Some(payload.to_vec()),
        }
    }
}
