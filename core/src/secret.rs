//! Protection of the stored model credential.

use crate::error::SecretError;

/// Turns a plaintext credential into an opaque blob that is safe to persist,
/// and back.
pub trait SecretProtector: Send + Sync {
    fn protect(&self, plaintext: &str) -> Result<String, SecretError>;

    /// `None` when the blob cannot be recovered (wrong key, corrupted text,
    /// store unavailable). Callers treat that as "no credential".
    fn unprotect(&self, blob: &str) -> Option<String>;
}

/// Decrypts an optional stored blob, mapping blank blobs to `None`.
pub fn reveal(protector: &dyn SecretProtector, blob: Option<&str>) -> Option<String> {
    let blob = blob.map(str::trim).filter(|b| !b.is_empty())?;
    let plain = protector.unprotect(blob);
    if plain.is_none() {
        tracing::warn!(target: "hk3.settings", "stored credential could not be decrypted");
    }
    plain
}
