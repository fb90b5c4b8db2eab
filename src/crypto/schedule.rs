//! TLS 1.3 key schedule (RFC 8446 Section 7.1).
//!
//! Derives every secret of the 1.3-family handshake from two inputs, the
//! key exchange shared secret and the transcript hash:
//!
//! ```text
//!              0
//!              |
//!              v
//!    PSK ->  HKDF-Extract = Early Secret
//!              |
//!              v
//!        Derive-Secret(., "derived", "")
//!              |
//!              v
//!    (EC)DHE -> HKDF-Extract = Handshake Secret
//!              |
//!              +-----> Derive-Secret(., "c hs traffic", CH..SH)
//!              +-----> Derive-Secret(., "s hs traffic", CH..SH)
//!              v
//!        Derive-Secret(., "derived", "")
//!              |
//!              v
//!    0 -> HKDF-Extract = Master Secret
//!              |
//!              +-----> Derive-Secret(., "c ap traffic", CH..server Fin)
//!              +-----> Derive-Secret(., "s ap traffic", CH..server Fin)
//!              +-----> Derive-Secret(., "exp master",   CH..server Fin)
//!              +-----> Derive-Secret(., "res master",   CH..client Fin)
//! ```
//!
//! There is no PSK input: resumption and 0-RTT are not offered, so the
//! early secret is always `HKDF-Extract(0, 0)`.

use zeroize::Zeroize;

use crate::buffer::Buf;
use crate::crypto::provider::{CryptoProvider, HashProvider, HkdfProvider, HmacProvider};
use crate::types::HashAlgorithm;

/// SHA-256 of the empty string, the context for "derived" secrets.
const SHA256_EMPTY: [u8; 32] = [
    0xe3, 0xb0, 0xc4, 0x42, 0x98, 0xfc, 0x1c, 0x14, 0x9a, 0xfb, 0xf4, 0xc8, 0x99, 0x6f, 0xb9,
    0x24, 0x27, 0xae, 0x41, 0xe4, 0x64, 0x9b, 0x93, 0x4c, 0xa4, 0x95, 0x99, 0x1b, 0x78, 0x52,
    0xb8, 0x55,
];

/// SHA-384 of the empty string.
const SHA384_EMPTY: [u8; 48] = [
    0x38, 0xb0, 0x60, 0xa7, 0x51, 0xac, 0x96, 0x38, 0x4c, 0xd9, 0x32, 0x7e, 0xb1, 0xb1, 0xe3,
    0x6a, 0x21, 0xfd, 0xb7, 0x11, 0x14, 0xbe, 0x07, 0x43, 0x4c, 0x0c, 0xc7, 0xbf, 0x63, 0xf6,
    0xe1, 0xda, 0x27, 0x4e, 0xde, 0xbf, 0xe7, 0x6f, 0x65, 0xfb, 0xd5, 0x1a, 0xd2, 0xf1, 0x48,
    0x98, 0xb9, 0x5b,
];

/// TLS 1.3 key schedule.
///
/// Tracks the current schedule secret (early, handshake, master) and hands
/// derived secrets back to the caller. The current secret is wiped on drop.
#[derive(Debug)]
pub struct KeySchedule {
    hkdf: &'static dyn HkdfProvider,
    hmac: &'static dyn HmacProvider,
    hash_provider: &'static dyn HashProvider,
    hash: HashAlgorithm,
    current_secret: Buf,
}

impl KeySchedule {
    /// Create a key schedule for the given hash, advanced past the early
    /// secret and ready for the key exchange input.
    pub fn new(provider: &CryptoProvider, hash: HashAlgorithm) -> Result<Self, String> {
        let hash_len = hash.output_len();
        let zeros = vec![0u8; hash_len];

        // Early Secret = HKDF-Extract(0, 0), no PSK.
        let mut early_secret = Buf::new();
        provider
            .hkdf_provider
            .hkdf_extract(hash, &[], &zeros, &mut early_secret)?;

        let mut derived = Buf::new();
        provider.hkdf_provider.hkdf_expand_label(
            hash,
            &early_secret,
            b"derived",
            empty_hash(hash)?,
            &mut derived,
            hash_len,
        )?;
        early_secret.as_mut().zeroize();

        Ok(KeySchedule {
            hkdf: provider.hkdf_provider,
            hmac: provider.hmac_provider,
            hash_provider: provider.hash_provider,
            hash,
            current_secret: derived,
        })
    }

    /// The hash algorithm this schedule derives with.
    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.hash
    }

    /// Inject the key exchange shared secret and derive handshake traffic
    /// secrets. The transcript hash covers ClientHello..ServerHello.
    ///
    /// Returns (client_handshake_traffic_secret, server_handshake_traffic_secret).
    pub fn derive_handshake_secrets(
        &mut self,
        shared_secret: &[u8],
        transcript_hash: &[u8],
    ) -> Result<(Buf, Buf), String> {
        let hash_len = self.hash.output_len();

        // Handshake Secret = HKDF-Extract(derived, shared)
        let mut handshake_secret = Buf::new();
        self.hkdf.hkdf_extract(
            self.hash,
            &self.current_secret,
            shared_secret,
            &mut handshake_secret,
        )?;

        let mut client_secret = Buf::new();
        self.hkdf.hkdf_expand_label(
            self.hash,
            &handshake_secret,
            b"c hs traffic",
            transcript_hash,
            &mut client_secret,
            hash_len,
        )?;

        let mut server_secret = Buf::new();
        self.hkdf.hkdf_expand_label(
            self.hash,
            &handshake_secret,
            b"s hs traffic",
            transcript_hash,
            &mut server_secret,
            hash_len,
        )?;

        // Derive-Secret(Handshake Secret, "derived", "") for the master secret.
        let mut derived = Buf::new();
        self.hkdf.hkdf_expand_label(
            self.hash,
            &handshake_secret,
            b"derived",
            empty_hash(self.hash)?,
            &mut derived,
            hash_len,
        )?;
        handshake_secret.as_mut().zeroize();

        self.replace_current(derived);

        Ok((client_secret, server_secret))
    }

    /// Derive application traffic secrets. The transcript hash covers
    /// ClientHello..server Finished.
    ///
    /// Returns (client_application_traffic_secret_0, server_application_traffic_secret_0).
    pub fn derive_application_secrets(
        &mut self,
        transcript_hash: &[u8],
    ) -> Result<(Buf, Buf), String> {
        let hash_len = self.hash.output_len();
        let zeros = vec![0u8; hash_len];

        // Master Secret = HKDF-Extract(derived, 0)
        let mut master_secret = Buf::new();
        self.hkdf
            .hkdf_extract(self.hash, &self.current_secret, &zeros, &mut master_secret)?;

        let mut client_secret = Buf::new();
        self.hkdf.hkdf_expand_label(
            self.hash,
            &master_secret,
            b"c ap traffic",
            transcript_hash,
            &mut client_secret,
            hash_len,
        )?;

        let mut server_secret = Buf::new();
        self.hkdf.hkdf_expand_label(
            self.hash,
            &master_secret,
            b"s ap traffic",
            transcript_hash,
            &mut server_secret,
            hash_len,
        )?;

        self.replace_current(master_secret);

        Ok((client_secret, server_secret))
    }

    /// Derive the exporter master secret. The transcript hash covers
    /// ClientHello..server Finished. Requires the master secret stage.
    pub fn derive_exporter_secret(&self, transcript_hash: &[u8]) -> Result<Buf, String> {
        let mut exporter_secret = Buf::new();
        self.hkdf.hkdf_expand_label(
            self.hash,
            &self.current_secret,
            b"exp master",
            transcript_hash,
            &mut exporter_secret,
            self.hash.output_len(),
        )?;
        Ok(exporter_secret)
    }

    /// Derive the resumption master secret. The transcript hash covers
    /// ClientHello..client Finished. Requires the master secret stage.
    pub fn derive_resumption_secret(&self, transcript_hash: &[u8]) -> Result<Buf, String> {
        let mut resumption_secret = Buf::new();
        self.hkdf.hkdf_expand_label(
            self.hash,
            &self.current_secret,
            b"res master",
            transcript_hash,
            &mut resumption_secret,
            self.hash.output_len(),
        )?;
        Ok(resumption_secret)
    }

    /// TLS 1.3 exporter (RFC 8446 Section 7.5).
    ///
    /// ```text
    /// TLS-Exporter(label, context_value, key_length) =
    ///     HKDF-Expand-Label(Derive-Secret(Secret, label, ""),
    ///                       "exporter", Hash(context_value), key_length)
    /// ```
    pub fn export_keying_material(
        &self,
        exporter_secret: &[u8],
        label: &[u8],
        context: &[u8],
        length: usize,
    ) -> Result<Buf, String> {
        let mut derived_secret = Buf::new();
        self.hkdf.hkdf_expand_label(
            self.hash,
            exporter_secret,
            label,
            empty_hash(self.hash)?,
            &mut derived_secret,
            self.hash.output_len(),
        )?;

        let mut hash_ctx = self.hash_provider.create_hash(self.hash);
        hash_ctx.update(context);
        let mut context_hash = Buf::new();
        hash_ctx.clone_and_finalize(&mut context_hash);

        let mut out = Buf::new();
        self.hkdf.hkdf_expand_label(
            self.hash,
            &derived_secret,
            b"exporter",
            &context_hash,
            &mut out,
            length,
        )?;

        Ok(out)
    }

    /// Derive traffic key and IV from a traffic secret.
    ///
    /// Returns (key, iv).
    pub fn derive_traffic_keys(
        &self,
        traffic_secret: &[u8],
        key_len: usize,
        iv_len: usize,
    ) -> Result<(Buf, Buf), String> {
        let mut key = Buf::new();
        self.hkdf.hkdf_expand_label(
            self.hash,
            traffic_secret,
            b"key",
            &[],
            &mut key,
            key_len,
        )?;

        let mut iv = Buf::new();
        self.hkdf
            .hkdf_expand_label(self.hash, traffic_secret, b"iv", &[], &mut iv, iv_len)?;

        Ok((key, iv))
    }

    /// Derive the next application traffic secret for KeyUpdate
    /// (RFC 8446 Section 7.2).
    pub fn derive_next_traffic_secret(&self, current_secret: &[u8]) -> Result<Buf, String> {
        let mut next_secret = Buf::new();
        self.hkdf.hkdf_expand_label(
            self.hash,
            current_secret,
            b"traffic upd",
            &[],
            &mut next_secret,
            self.hash.output_len(),
        )?;
        Ok(next_secret)
    }

    /// Compute Finished verify_data for a handshake traffic secret.
    ///
    /// ```text
    /// finished_key = HKDF-Expand-Label(BaseKey, "finished", "", Hash.length)
    /// verify_data = HMAC(finished_key, transcript_hash)
    /// ```
    pub fn derive_finished(
        &self,
        base_key: &[u8],
        transcript_hash: &[u8],
    ) -> Result<Buf, String> {
        let mut finished_key = Buf::new();
        self.hkdf.hkdf_expand_label(
            self.hash,
            base_key,
            b"finished",
            &[],
            &mut finished_key,
            self.hash.output_len(),
        )?;

        let mut verify_data = Buf::new();
        self.hmac
            .hmac(self.hash, &finished_key, transcript_hash, &mut verify_data)?;
        finished_key.as_mut().zeroize();

        Ok(verify_data)
    }

    fn replace_current(&mut self, next: Buf) {
        self.current_secret.as_mut().zeroize();
        self.current_secret = next;
    }
}

impl Drop for KeySchedule {
    fn drop(&mut self) {
        self.current_secret.as_mut().zeroize();
    }
}

fn empty_hash(hash: HashAlgorithm) -> Result<&'static [u8], String> {
    match hash {
        HashAlgorithm::SHA256 => Ok(&SHA256_EMPTY),
        HashAlgorithm::SHA384 => Ok(&SHA384_EMPTY),
        _ => Err(format!("Unsupported hash for key schedule: {:?}", hash)),
    }
}
