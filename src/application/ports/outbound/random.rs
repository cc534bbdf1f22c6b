//! Interface for secure random generation.

use crate::application::error::Result;

/// Port for secure random generation.
pub trait SecureRandom: Send + Sync {
    /// Generate `length` bytes from a cryptographically secure source.
    fn random_bytes(&self, length: usize) -> Result<Vec<u8>>;
}
