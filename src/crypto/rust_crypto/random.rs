//! Secure random number generation using the operating system RNG.

use rand::rngs::OsRng;
use rand::RngCore;

use crate::crypto::provider::SecureRandom;

/// Secure random number generator implementation.
#[derive(Debug)]
pub(super) struct RustCryptoSecureRandom;

impl SecureRandom for RustCryptoSecureRandom {
    fn fill(&self, buf: &mut [u8]) -> Result<(), String> {
        OsRng
            .try_fill_bytes(buf)
            .map_err(|e| format!("OS RNG failure: {}", e))
    }
}

/// Static instance of the secure random generator.
pub(super) static SECURE_RANDOM: RustCryptoSecureRandom = RustCryptoSecureRandom;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_randomizes_buffer() {
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        SECURE_RANDOM.fill(&mut a).unwrap();
        SECURE_RANDOM.fill(&mut b).unwrap();

        assert_ne!(a, b);
    }
}
