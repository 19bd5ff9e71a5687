use std::sync::Mutex;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use hk3_launcher_core::api::{SecretError, SecretProtector};

const SERVICE: &str = "hk3-launcher";
const KEY_ACCOUNT: &str = "credential-encryption-key";
const NONCE_LEN: usize = 12;

/// Supplies the 256-bit key used to seal stored credentials.
pub trait KeySource: Send + Sync {
    fn key(&self) -> Result<[u8; 32], SecretError>;
}

/// One slot in a credential store.
pub trait CredentialEntry: Send + Sync {
    fn read(&self) -> Result<String, keyring::Error>;
    fn write(&self, value: &str) -> Result<(), keyring::Error>;
}

/// The OS credential store entry for `service`/`account`.
pub struct KeyringEntry {
    service: String,
    account: String,
}

impl KeyringEntry {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, keyring::Error> {
        keyring::Entry::new(&self.service, &self.account)
    }
}

impl CredentialEntry for KeyringEntry {
    fn read(&self) -> Result<String, keyring::Error> {
        self.entry()?.get_password()
    }

    fn write(&self, value: &str) -> Result<(), keyring::Error> {
        self.entry()?.set_password(value)
    }
}

/// Keeps the key in a credential store, creating it on first use.
///
/// A new key is only generated when the store reports no entry. Any other
/// store failure is returned as is, so an existing key is never replaced
/// because the store was briefly unavailable.
pub struct KeyringKeySource {
    entry: Box<dyn CredentialEntry>,
    lock: Mutex<()>,
}

impl KeyringKeySource {
    pub fn new(entry: Box<dyn CredentialEntry>) -> Self {
        Self {
            entry,
            lock: Mutex::new(()),
        }
    }
}

impl Default for KeyringKeySource {
    fn default() -> Self {
        Self::new(Box::new(KeyringEntry::new(SERVICE, KEY_ACCOUNT)))
    }
}

impl KeySource for KeyringKeySource {
    fn key(&self) -> Result<[u8; 32], SecretError> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());

        match self.entry.read() {
            Ok(value) => {
                if let Some(key) = decode_key(&value) {
                    return Ok(key);
                }
                // Nothing sealed with an unreadable key can be opened anyway.
                tracing::warn!(target: "hk3.settings", "stored encryption key is invalid, replacing it");
            }
            Err(keyring::Error::NoEntry) => {}
            Err(e) => return Err(SecretError::KeyStore(e.to_string())),
        }

        let key: [u8; 32] = rand::random();
        let encoded = base64::engine::general_purpose::STANDARD.encode(key);
        self.entry
            .write(&encoded)
            .map_err(|e| SecretError::KeyStore(e.to_string()))?;
        tracing::info!(target: "hk3.settings", "created credential encryption key");
        Ok(key)
    }
}

fn decode_key(value: &str) -> Option<[u8; 32]> {
    let decoded = base64::engine::general_purpose::STANDARD.decode(value).ok()?;
    decoded.try_into().ok()
}

/// A fixed key. Useful where no credential store is available.
pub struct StaticKey(pub [u8; 32]);

impl KeySource for StaticKey {
    fn key(&self) -> Result<[u8; 32], SecretError> {
        Ok(self.0)
    }
}

/// AES-256-GCM sealing; blobs are `base64(nonce || ciphertext)`.
pub struct KeyringProtector {
    keys: Box<dyn KeySource>,
}

impl KeyringProtector {
    pub fn new(keys: Box<dyn KeySource>) -> Self {
        Self { keys }
    }

    fn cipher(&self) -> Result<Aes256Gcm, SecretError> {
        let key = self.keys.key()?;
        Aes256Gcm::new_from_slice(&key).map_err(|e| SecretError::Encrypt(e.to_string()))
    }
}

impl Default for KeyringProtector {
    fn default() -> Self {
        Self::new(Box::new(KeyringKeySource::default()))
    }
}

impl SecretProtector for KeyringProtector {
    fn protect(&self, plaintext: &str) -> Result<String, SecretError> {
        let cipher = self.cipher()?;
        let nonce_bytes: [u8; NONCE_LEN] = rand::random();
        let sealed = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|e| SecretError::Encrypt(e.to_string()))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + sealed.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&sealed);
        Ok(base64::engine::general_purpose::STANDARD.encode(blob))
    }

    fn unprotect(&self, blob: &str) -> Option<String> {
        let raw = base64::engine::general_purpose::STANDARD
            .decode(blob.trim())
            .ok()?;
        if raw.len() <= NONCE_LEN {
            return None;
        }
        let (nonce, sealed) = raw.split_at(NONCE_LEN);
        let cipher = match self.cipher() {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(target: "hk3.settings", error = %e, "credential key unavailable");
                return None;
            }
        };
        let plain = cipher.decrypt(Nonce::from_slice(nonce), sealed).ok()?;
        String::from_utf8(plain).ok()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    fn protector(seed: u8) -> KeyringProtector {
        KeyringProtector::new(Box::new(StaticKey([seed; 32])))
    }

    #[test]
    fn test_protect_then_unprotect() {
        let p = protector(7);
        let blob = p.protect("AIza-example-key").unwrap();
        assert_ne!(blob, "AIza-example-key");
        assert_eq!(p.unprotect(&blob).as_deref(), Some("AIza-example-key"));
    }

    #[test]
    fn test_each_blob_uses_fresh_nonce() {
        let p = protector(7);
        assert_ne!(p.protect("same").unwrap(), p.protect("same").unwrap());
    }

    #[test]
    fn test_garbage_and_wrong_key_yield_none() {
        let p = protector(7);
        assert_eq!(p.unprotect("not base64 at all!"), None);
        assert_eq!(p.unprotect(""), None);
        assert_eq!(p.unprotect("AAAA"), None);

        let blob = p.protect("secret").unwrap();
        assert_eq!(protector(8).unprotect(&blob), None);
    }

    struct Broken;

    impl KeySource for Broken {
        fn key(&self) -> Result<[u8; 32], SecretError> {
            Err(SecretError::KeyStore("locked".into()))
        }
    }

    /// In-memory credential entry that can be told to fail reads.
    struct MemoryEntry {
        value: Arc<Mutex<Option<String>>>,
        fail_reads: bool,
        writes: Arc<AtomicUsize>,
    }

    impl CredentialEntry for MemoryEntry {
        fn read(&self) -> Result<String, keyring::Error> {
            if self.fail_reads {
                return Err(keyring::Error::PlatformFailure("keychain is locked".into()));
            }
            self.value
                .lock()
                .unwrap()
                .clone()
                .ok_or(keyring::Error::NoEntry)
        }

        fn write(&self, value: &str) -> Result<(), keyring::Error> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            *self.value.lock().unwrap() = Some(value.to_string());
            Ok(())
        }
    }

    fn memory_source(
        value: &Arc<Mutex<Option<String>>>,
        writes: &Arc<AtomicUsize>,
        fail_reads: bool,
    ) -> KeyringKeySource {
        KeyringKeySource::new(Box::new(MemoryEntry {
            value: value.clone(),
            fail_reads,
            writes: writes.clone(),
        }))
    }

    #[test]
    fn test_key_created_once_and_reused() {
        let value = Arc::new(Mutex::new(None));
        let writes = Arc::new(AtomicUsize::new(0));
        let source = memory_source(&value, &writes, false);

        let first = source.key().unwrap();
        let second = source.key().unwrap();
        assert_eq!(first, second);
        assert_eq!(writes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_read_failure_keeps_existing_key() {
        let value = Arc::new(Mutex::new(None));
        let writes = Arc::new(AtomicUsize::new(0));
        let healthy = KeyringProtector::new(Box::new(memory_source(&value, &writes, false)));
        let blob = healthy.protect("AIza-stored").unwrap();
        let stored = value.lock().unwrap().clone();

        let locked = KeyringProtector::new(Box::new(memory_source(&value, &writes, true)));
        assert!(matches!(locked.protect("x"), Err(SecretError::KeyStore(_))));
        assert_eq!(locked.unprotect(&blob), None);

        assert_eq!(writes.load(Ordering::SeqCst), 1);
        assert_eq!(*value.lock().unwrap(), stored);
        assert_eq!(healthy.unprotect(&blob).as_deref(), Some("AIza-stored"));
    }

    #[test]
    fn test_invalid_stored_key_is_replaced() {
        let value = Arc::new(Mutex::new(Some("short".to_string())));
        let writes = Arc::new(AtomicUsize::new(0));
        let source = memory_source(&value, &writes, false);

        source.key().unwrap();
        assert_eq!(writes.load(Ordering::SeqCst), 1);
        assert_ne!(value.lock().unwrap().as_deref(), Some("short"));
    }

    #[test]
    fn test_key_store_failure() {
        let p = KeyringProtector::new(Box::new(Broken));
        assert!(matches!(p.protect("x"), Err(SecretError::KeyStore(_))));
        let blob = protector(1).protect("x").unwrap();
        assert_eq!(p.unprotect(&blob), None);
    }
}
