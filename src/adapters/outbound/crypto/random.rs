//! Secure random generation using OS RNG.

use rand::RngCore;
use rand::rngs::OsRng;

use crate::application::error::{Result, ToInternal};
use crate::application::ports::outbound::SecureRandom;

/// OS-based secure random generator.
pub struct OsRngRandom;

impl OsRngRandom {
    pub fn new() -> Self {
        Self
    }
}

impl Default for OsRngRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl SecureRandom for OsRngRandom {
    fn random_bytes(&self, length: usize) -> Result<Vec<u8>> {
        let mut bytes = vec![0u8; length];
        OsRng.try_fill_bytes(&mut bytes).catch()?;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_bytes() {
        let rng = OsRngRandom::new();
        let bytes1 = rng.random_bytes(64).unwrap();
        let bytes2 = rng.random_bytes(64).unwrap();

        assert_eq!(bytes1.len(), 64);
        assert_eq!(bytes2.len(), 64);
        assert_ne!(bytes1, bytes2);
    }
}
