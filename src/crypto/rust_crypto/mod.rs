//! Default cryptographic backend built on the RustCrypto crates.
//!
//! Pure-Rust implementations of everything [`CryptoProvider`] needs: AES-GCM
//! cipher suites, X25519/NIST ECDHE and FFDHE key exchange, SHA-2 hashing and
//! HMAC, HKDF and the legacy PRFs, ECDSA/RSA signing and verification.
//!
//! Obtain the provider with [`default_provider()`]. Configurations that do
//! not name a provider fall back to it automatically.

mod cipher_suite;
mod hash;
mod hkdf;
mod hmac;
mod kx_group;
mod prf;
mod random;
mod sign;

use crate::crypto::provider::CryptoProvider;

use self::cipher_suite::ALL_CIPHER_SUITES;
use self::hash::HASH_PROVIDER;
use self::hkdf::HKDF_PROVIDER;
use self::hmac::HMAC_PROVIDER;
use self::kx_group::ALL_KX_GROUPS;
use self::prf::PRF_PROVIDER;
use self::random::SECURE_RANDOM;
use self::sign::{KEY_PROVIDER, SIGNATURE_VERIFIER};

/// Create a [`CryptoProvider`] backed by the RustCrypto crates.
pub fn default_provider() -> CryptoProvider {
    CryptoProvider {
        cipher_suites: ALL_CIPHER_SUITES,
        kx_groups: ALL_KX_GROUPS,
        signature_verification: &SIGNATURE_VERIFIER,
        key_provider: &KEY_PROVIDER,
        secure_random: &SECURE_RANDOM,
        hash_provider: &HASH_PROVIDER,
        hmac_provider: &HMAC_PROVIDER,
        prf_provider: &PRF_PROVIDER,
        hkdf_provider: &HKDF_PROVIDER,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CipherSuite, NamedGroup};

    #[test]
    fn provider_covers_all_supported_suites_and_groups() {
        let provider = default_provider();

        for suite in CipherSuite::supported() {
            assert!(provider.supported_suite(*suite).is_some(), "{:?}", suite);
        }
        for group in NamedGroup::supported() {
            assert!(provider.supported_group(*group).is_some(), "{:?}", group);
        }
    }
}
