//! Pluggable cryptographic provider.
//!
//! The negotiation engine performs no cryptography of its own. Every hash,
//! HMAC, key exchange, signature and key derivation goes through the trait
//! objects collected in [`CryptoProvider`], so a backend can be swapped
//! without touching the engine.
//!
//! # Structure
//!
//! The traits come in two levels:
//!
//! - **Factory traits** ([`SupportedCipherSuite`], [`SupportedKxGroup`],
//!   [`KeyProvider`], [`HashProvider`], ...) are stateless singletons held by
//!   the provider. They describe what the backend supports and create
//!   instances.
//! - **Instance traits** ([`Cipher`], [`HashContext`], [`SigningKey`],
//!   [`ActiveKeyExchange`]) carry per-handshake state created by a factory.
//!
//! Backend errors are reported as `Result<_, String>`; the engine maps them
//! to its own error type at the call site.
//!
//! # Thread Safety
//!
//! All provider traits require `Send + Sync + UnwindSafe + RefUnwindSafe` to
//! ensure safe usage across threads and panic boundaries.

use std::fmt::Debug;
use std::panic::{RefUnwindSafe, UnwindSafe};
use std::sync::{Arc, OnceLock};

use crate::buffer::Buf;
use crate::crypto::{Aad, Nonce};
use crate::types::{CipherSuite, HashAlgorithm, NamedGroup, SignatureScheme};

// ============================================================================
// Marker Trait
// ============================================================================

/// Marker trait for types that are safe to use in crypto provider components.
///
/// This trait combines the common bounds required for crypto provider trait
/// objects:
/// - [`Send`] + [`Sync`]: Thread-safe
/// - [`Debug`]: Support debugging
/// - [`UnwindSafe`] + [`RefUnwindSafe`]: Panic-safe
pub trait CryptoSafe: Send + Sync + Debug + UnwindSafe + RefUnwindSafe {}

/// Blanket implementation: any type satisfying the bounds implements [`CryptoSafe`].
impl<T: Send + Sync + Debug + UnwindSafe + RefUnwindSafe> CryptoSafe for T {}

// ============================================================================
// Instance Traits
// ============================================================================

/// AEAD cipher for in-place encryption/decryption.
pub trait Cipher: CryptoSafe {
    /// Encrypt plaintext in-place, appending the authentication tag.
    fn encrypt(&mut self, plaintext: &mut Buf, aad: Aad, nonce: Nonce) -> Result<(), String>;

    /// Decrypt ciphertext in-place, verifying and removing the authentication tag.
    fn decrypt(&mut self, ciphertext: &mut Buf, aad: Aad, nonce: Nonce) -> Result<(), String>;
}

/// Stateful hash context for incremental hashing.
pub trait HashContext: CryptoSafe {
    /// Update the hash with new data.
    fn update(&mut self, data: &[u8]);

    /// Clone the context and finalize it, writing the hash to `out`.
    /// The original context can continue to be updated.
    fn clone_and_finalize(&self, out: &mut Buf);
}

/// Signing key for generating digital signatures.
pub trait SigningKey: CryptoSafe {
    /// Signature schemes this key can produce, most preferred first.
    fn schemes(&self) -> &'static [SignatureScheme];

    /// Sign `data` under `scheme`, writing the signature to `out`.
    ///
    /// Fails if `scheme` is not one the key offers via [`Self::schemes()`].
    fn sign(&self, scheme: SignatureScheme, data: &[u8], out: &mut Buf) -> Result<(), String>;
}

/// Active key exchange instance (an ephemeral keypair).
///
/// Completion borrows rather than consumes the keypair so one instance can
/// serve several handshakes when the engine reuses cached ephemerals.
pub trait ActiveKeyExchange: CryptoSafe {
    /// Get the encoded public key for this exchange.
    fn pub_key(&self) -> &[u8];

    /// Complete the exchange with the peer's public key, writing the shared
    /// secret to `out`.
    fn complete(&self, peer_public: &[u8], out: &mut Buf) -> Result<(), String>;

    /// Get the named group of this exchange.
    fn group(&self) -> NamedGroup;
}

// ============================================================================
// Factory Traits
// ============================================================================

/// Cipher suite support (factory for [`Cipher`] instances).
///
/// One trait covers both suite generations: the TLS 1.3 suites that name only
/// AEAD and hash, and the older ECDHE suites that additionally pin the key
/// exchange and signature family. [`CipherSuite`] carries that distinction.
pub trait SupportedCipherSuite: CryptoSafe {
    /// The cipher suite this supports.
    fn suite(&self) -> CipherSuite;

    /// Hash algorithm used by this suite.
    fn hash_algorithm(&self) -> HashAlgorithm;

    /// AEAD key length in bytes.
    fn key_len(&self) -> usize;

    /// AEAD nonce/IV length in bytes.
    fn iv_len(&self) -> usize;

    /// AEAD tag length in bytes.
    fn tag_len(&self) -> usize;

    /// Create a cipher instance with the given key.
    fn create_cipher(&self, key: &[u8]) -> Result<Box<dyn Cipher>, String>;
}

/// Key exchange group support (factory for [`ActiveKeyExchange`]).
pub trait SupportedKxGroup: CryptoSafe {
    /// Named group for this key exchange group.
    fn name(&self) -> NamedGroup;

    /// Start a new key exchange, generating an ephemeral keypair.
    fn start_exchange(&self) -> Result<Arc<dyn ActiveKeyExchange>, String>;
}

/// Signature verification against certificates.
pub trait SignatureVerifier: CryptoSafe {
    /// Verify a signature on data using a DER-encoded X.509 certificate.
    ///
    /// `scheme` pins both the signature algorithm and the digest, so the
    /// verifier must reject a certificate key that does not match it.
    fn verify_signature(
        &self,
        cert_der: &[u8],
        data: &[u8],
        signature: &[u8],
        scheme: SignatureScheme,
    ) -> Result<(), String>;
}

/// Private key parser (factory for [`SigningKey`]).
pub trait KeyProvider: CryptoSafe {
    /// Parse and load a private key from DER/PEM bytes.
    fn load_private_key(&self, key_der: &[u8]) -> Result<Box<dyn SigningKey>, String>;
}

/// Secure random number generator.
pub trait SecureRandom: CryptoSafe {
    /// Fill buffer with cryptographically secure random bytes.
    fn fill(&self, buf: &mut [u8]) -> Result<(), String>;
}

/// Hash provider (factory for [`HashContext`]).
pub trait HashProvider: CryptoSafe {
    /// Create a new hash context for the specified algorithm.
    fn create_hash(&self, algorithm: HashAlgorithm) -> Box<dyn HashContext>;
}

/// HMAC provider.
pub trait HmacProvider: CryptoSafe {
    /// Compute HMAC over `data`, writing the tag to `out`.
    fn hmac(
        &self,
        hash: HashAlgorithm,
        key: &[u8],
        data: &[u8],
        out: &mut Buf,
    ) -> Result<(), String>;

    /// Verify an HMAC tag in constant time.
    ///
    /// Returns `Ok(false)` on mismatch; `Err` only for unusable inputs.
    fn hmac_verify(
        &self,
        hash: HashAlgorithm,
        key: &[u8],
        data: &[u8],
        tag: &[u8],
    ) -> Result<bool, String>;
}

/// PRF (Pseudo-Random Function) for the pre-1.3 key schedules.
pub trait PrfProvider: CryptoSafe {
    /// TLS 1.2 PRF (RFC 5246 Section 5): `P_<hash>(secret, label + seed)`.
    fn prf_tls12(
        &self,
        hash: HashAlgorithm,
        secret: &[u8],
        label: &str,
        seed: &[u8],
        out: &mut Buf,
        output_len: usize,
    ) -> Result<(), String>;

    /// TLS 1.0/1.1 PRF (RFC 2246 Section 5).
    ///
    /// The secret is split into two overlapping halves, run through P_MD5 and
    /// P_SHA1 respectively, and the streams XORed together.
    fn prf_legacy(
        &self,
        secret: &[u8],
        label: &str,
        seed: &[u8],
        out: &mut Buf,
        output_len: usize,
    ) -> Result<(), String>;
}

/// HKDF provider for the extract/expand key schedule (RFC 5869).
pub trait HkdfProvider: CryptoSafe {
    /// HKDF-Extract: `PRK = HKDF-Extract(salt, IKM)`.
    fn hkdf_extract(
        &self,
        hash: HashAlgorithm,
        salt: &[u8],
        ikm: &[u8],
        out: &mut Buf,
    ) -> Result<(), String>;

    /// HKDF-Expand: `OKM = HKDF-Expand(PRK, info, L)`.
    fn hkdf_expand(
        &self,
        hash: HashAlgorithm,
        prk: &[u8],
        info: &[u8],
        out: &mut Buf,
        output_len: usize,
    ) -> Result<(), String>;

    /// HKDF-Expand-Label (RFC 8446 Section 7.1).
    ///
    /// ```text
    /// HkdfLabel = struct {
    ///     uint16 length;
    ///     opaque label<7..255> = "tls13 " + Label;
    ///     opaque context<0..255> = Context;
    /// }
    /// OKM = HKDF-Expand(Secret, HkdfLabel, Length)
    /// ```
    ///
    /// Provided in terms of [`Self::hkdf_expand()`] so backends only supply
    /// the raw extract/expand primitives.
    fn hkdf_expand_label(
        &self,
        hash: HashAlgorithm,
        secret: &[u8],
        label: &[u8],
        context: &[u8],
        out: &mut Buf,
        output_len: usize,
    ) -> Result<(), String> {
        let full_label_len = 6 + label.len(); // "tls13 " + label

        if full_label_len > 255 {
            return Err("Label too long for HKDF-Expand-Label".to_string());
        }
        if context.len() > 255 {
            return Err("Context too long for HKDF-Expand-Label".to_string());
        }
        if output_len > 65535 {
            return Err("Output length too large for HKDF-Expand-Label".to_string());
        }

        let mut info = Vec::with_capacity(2 + 1 + full_label_len + 1 + context.len());
        info.extend_from_slice(&(output_len as u16).to_be_bytes());
        info.push(full_label_len as u8);
        info.extend_from_slice(b"tls13 ");
        info.extend_from_slice(label);
        info.push(context.len() as u8);
        info.extend_from_slice(context);

        self.hkdf_expand(hash, secret, &info, out, output_len)
    }
}

// ============================================================================
// Core Provider Struct
// ============================================================================

/// Cryptographic provider for the negotiation engine.
///
/// This struct holds references to all cryptographic components the engine
/// needs. Users can provide custom implementations of each component to
/// replace the default RustCrypto-based provider.
///
/// The provider uses static trait object references (`&'static dyn Trait`),
/// a design borrowed from rustls's `CryptoProvider`.
///
/// # Version-Specific Components
///
/// The `prf_provider` only serves handshakes that negotiate TLS 1.2 or older;
/// the `hkdf_provider` only serves TLS 1.3 and newer. Everything else is
/// shared between the schedules.
#[derive(Debug, Clone)]
pub struct CryptoProvider {
    /// Supported cipher suites, in preference order.
    ///
    /// Consulted during negotiation: a suite is only offered or selected if
    /// the provider carries an implementation for it.
    pub cipher_suites: &'static [&'static dyn SupportedCipherSuite],

    /// Supported key exchange groups, in preference order.
    pub kx_groups: &'static [&'static dyn SupportedKxGroup],

    /// Signature verification for certificates.
    pub signature_verification: &'static dyn SignatureVerifier,

    /// Key provider for parsing private keys.
    pub key_provider: &'static dyn KeyProvider,

    /// Secure random number generator.
    pub secure_random: &'static dyn SecureRandom,

    /// Hash provider for transcript hashing.
    pub hash_provider: &'static dyn HashProvider,

    /// HMAC provider for cookies and Finished computation.
    pub hmac_provider: &'static dyn HmacProvider,

    /// PRF for the pre-1.3 key schedules.
    pub prf_provider: &'static dyn PrfProvider,

    /// HKDF provider for the extract/expand key schedule.
    pub hkdf_provider: &'static dyn HkdfProvider,
}

/// Static storage for the default crypto provider.
///
/// This is set by `install_default()` and retrieved by `get_default()`.
static DEFAULT: OnceLock<CryptoProvider> = OnceLock::new();

impl CryptoProvider {
    /// Look up the implementation of a cipher suite, if the provider has one.
    pub fn supported_suite(&self, suite: CipherSuite) -> Option<&'static dyn SupportedCipherSuite> {
        self.cipher_suites
            .iter()
            .copied()
            .find(|cs| cs.suite() == suite)
    }

    /// Look up the implementation of a key exchange group, if the provider has one.
    pub fn supported_group(&self, group: NamedGroup) -> Option<&'static dyn SupportedKxGroup> {
        self.kx_groups.iter().copied().find(|kx| kx.name() == group)
    }

    /// Install a default crypto provider for the process.
    ///
    /// This sets a global default provider that will be used by
    /// [`Config::builder()`](crate::Config::builder) when no explicit
    /// provider is specified.
    ///
    /// # Panics
    ///
    /// Panics if called more than once. The default provider can only be set
    /// once per process.
    pub fn install_default(provider: CryptoProvider) {
        DEFAULT
            .set(provider)
            .expect("CryptoProvider::install_default() called more than once");
    }

    /// Get the default crypto provider, if one has been installed.
    ///
    /// Returns `Some(&provider)` if a default provider has been installed via
    /// [`Self::install_default()`], or `None` if no default provider is
    /// available. [`Config::builder()`](crate::Config::builder) falls back to
    /// the RustCrypto provider when neither an explicit nor an installed
    /// default exists.
    pub fn get_default() -> Option<&'static CryptoProvider> {
        DEFAULT.get()
    }
}
