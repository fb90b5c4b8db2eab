//! Cryptographic primitives behind the negotiation engine.
//!
//! Everything the engine needs from cryptography goes through the pluggable
//! [`CryptoProvider`] seam defined in [`provider`]. The [`rust_crypto`] module
//! supplies the default backend built on RustCrypto crates.
//!
//! The key derivation logic itself lives here rather than in the backend:
//! [`schedule`] implements the extract/expand schedule used from TLS 1.3 on,
//! and [`prf`] the PRF-based schedule of the older versions. Both call into
//! the provider for the underlying HKDF/HMAC operations.

use std::ops::Deref;

pub(crate) mod prf;
pub mod provider;
pub mod rust_crypto;
pub(crate) mod schedule;
pub(crate) mod transcript;

pub use provider::{
    ActiveKeyExchange, Cipher, CryptoProvider, CryptoSafe, HashContext, HashProvider,
};
pub use provider::{HkdfProvider, HmacProvider, KeyProvider, PrfProvider};
pub use provider::{SecureRandom, SignatureVerifier, SigningKey};
pub use provider::{SupportedCipherSuite, SupportedKxGroup};

// Re-export shared types for provider trait implementations.
pub use crate::types::{CipherSuite, HashAlgorithm, NamedGroup, SignatureScheme};

/// Additional authenticated data for one AEAD operation.
///
/// The engine does not format records, so the surrounding record layer
/// supplies whatever AAD bytes its wire format calls for.
#[derive(Debug, Clone, Copy)]
pub struct Aad<'a>(pub &'a [u8]);

impl Deref for Aad<'_> {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        self.0
    }
}

/// Full AEAD nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nonce(pub [u8; 12]);

impl Nonce {
    /// Per-record nonce from a write IV and a record sequence number.
    ///
    /// RFC 8446 Section 5.3: nonce = iv XOR pad_left(seq, iv_len).
    pub fn xor(iv: &[u8; 12], seq: u64) -> Self {
        let mut nonce = *iv;
        let seq_bytes = seq.to_be_bytes();
        for i in 0..8 {
            nonce[4 + i] ^= seq_bytes[i];
        }
        Self(nonce)
    }
}

impl Deref for Nonce {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonce_xor_folds_sequence_into_tail() {
        let iv = [0x11u8; 12];
        let nonce = Nonce::xor(&iv, 1);

        assert_eq!(&nonce[..4], &[0x11; 4]);
        assert_eq!(nonce[11], 0x10);

        // Sequence zero leaves the IV untouched.
        assert_eq!(Nonce::xor(&iv, 0), Nonce(iv));
    }
}
