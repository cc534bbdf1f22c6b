//! Signing key material.

use std::fmt;

use zeroize::Zeroizing;

use crate::domain::error::{DomainError, Result};

/// Minimum length of an HMAC-SHA-512 signing key, in bytes.
pub const MIN_KEY_LENGTH: usize = 64;

/// Symmetric key used to sign and verify access tokens.
///
/// Bytes are wiped on drop and never printed.
#[derive(Clone)]
pub struct SigningKey(Zeroizing<Vec<u8>>);

impl SigningKey {
    /// Create a [`SigningKey`] from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::WeakKey`] if fewer than [`MIN_KEY_LENGTH`]
    /// bytes are supplied.
    pub fn new(bytes: impl AsRef<[u8]>) -> Result<Self> {
        let bytes = bytes.as_ref();
        if bytes.len() < MIN_KEY_LENGTH {
            return Err(DomainError::WeakKey {
                length: bytes.len(),
                minimum: MIN_KEY_LENGTH,
            });
        }

        Ok(Self(Zeroizing::new(bytes.to_vec())))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SigningKey").field(&"[redacted]").finish()
    }
}
