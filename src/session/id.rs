use base64::Engine;
use base64::prelude::BASE64_URL_SAFE_NO_PAD;
use rand::TryRngCore;
use rand::rngs::OsRng;
use std::sync::Arc;

/// Number of random bytes drawn for every session id.
pub const KEY_LENGTH: usize = 64;

/// A session id generator.
///
/// An empty string signals that no id could be produced; the store refuses to
/// persist a session under it.
pub type KeyGen = Arc<dyn Fn() -> String + Send + Sync>;

/// Generates a new session id from the operating system's CSPRNG.
///
/// The 64 random bytes are encoded with the URL-safe base64 alphabet without
/// padding, which makes the id usable both as a storage key and inside a cookie.
/// Returns an empty string if the entropy source fails.
pub fn generate_key() -> String {
    let mut bytes = [0u8; KEY_LENGTH];
    if let Err(err) = OsRng.try_fill_bytes(&mut bytes) {
        tracing::error!(err = %err, "failed to read from the OS entropy source");
        return String::new();
    }

    BASE64_URL_SAFE_NO_PAD.encode(bytes)
}

pub(crate) fn default_key_gen() -> KeyGen {
    Arc::new(generate_key)
}
