//! Legacy (pre-1.3) secret schedule (RFC 5246 Sections 6.3, 7.4.9 and 8.1).
//!
//! Everything hangs off the 48-byte master secret:
//!
//! ```text
//! master_secret = PRF(pre_master_secret, "master secret",
//!                     client_random + server_random)[0..48]
//! key_block     = PRF(master_secret, "key expansion",
//!                     server_random + client_random)
//! verify_data   = PRF(master_secret, "client finished" | "server finished",
//!                     transcript_hash)[0..12]
//! ```
//!
//! With the extended_master_secret extension (RFC 7627) the randoms in the
//! first derivation are replaced by the session hash, binding the master
//! secret to the full handshake.

use zeroize::Zeroize;

use crate::buffer::Buf;
use crate::crypto::provider::{CryptoProvider, PrfProvider};
use crate::message::Finished;
use crate::types::{HashAlgorithm, ProtocolVersion, Role};

/// Master secret length (RFC 5246 Section 8.1).
pub const MASTER_SECRET_LEN: usize = 48;

/// PRF-based secret schedule for TLS 1.2 and older versions.
///
/// Which PRF runs is decided purely by the negotiated version: 1.2 uses
/// P_SHA256 or P_SHA384 per the suite hash, 1.0/1.1 use the split
/// MD5/SHA-1 construction. The suite hash is ignored below 1.2.
///
/// The master secret is wiped on drop.
#[derive(Debug)]
pub struct LegacySchedule {
    prf: &'static dyn PrfProvider,
    version: ProtocolVersion,
    hash: HashAlgorithm,
    master_secret: Buf,
}

impl LegacySchedule {
    pub fn new(provider: &CryptoProvider, version: ProtocolVersion, hash: HashAlgorithm) -> Self {
        debug_assert!(version.uses_legacy_schedule());
        LegacySchedule {
            prf: provider.prf_provider,
            version,
            hash,
            master_secret: Buf::new(),
        }
    }

    /// Whether a master secret has been derived yet.
    pub fn has_master_secret(&self) -> bool {
        !self.master_secret.is_empty()
    }

    /// The derived master secret. Empty until one of the derive calls ran.
    pub fn master_secret(&self) -> &[u8] {
        &self.master_secret
    }

    /// Derive the master secret (RFC 5246 Section 8.1).
    pub fn derive_master_secret(
        &mut self,
        pre_master_secret: &[u8],
        client_random: &[u8],
        server_random: &[u8],
    ) -> Result<(), String> {
        let mut seed = Buf::new();
        seed.extend_from_slice(client_random);
        seed.extend_from_slice(server_random);

        let mut master = Buf::new();
        self.derive(
            pre_master_secret,
            "master secret",
            &seed,
            &mut master,
            MASTER_SECRET_LEN,
        )?;
        self.replace_master(master);
        Ok(())
    }

    /// Derive the extended master secret (RFC 7627).
    ///
    /// Used instead of [`Self::derive_master_secret`] when both sides sent
    /// the extended_master_secret extension. `session_hash` is the
    /// transcript hash through ClientKeyExchange.
    pub fn derive_extended_master_secret(
        &mut self,
        pre_master_secret: &[u8],
        session_hash: &[u8],
    ) -> Result<(), String> {
        let mut master = Buf::new();
        self.derive(
            pre_master_secret,
            "extended master secret",
            session_hash,
            &mut master,
            MASTER_SECRET_LEN,
        )?;
        self.replace_master(master);
        Ok(())
    }

    /// Expand the key block (RFC 5246 Section 6.3).
    ///
    /// The seed is server_random + client_random, the reverse of the
    /// master secret order.
    pub fn derive_key_block(
        &self,
        client_random: &[u8],
        server_random: &[u8],
        length: usize,
    ) -> Result<Buf, String> {
        let mut seed = Buf::new();
        seed.extend_from_slice(server_random);
        seed.extend_from_slice(client_random);

        let mut key_block = Buf::new();
        self.derive(
            &self.master_secret,
            "key expansion",
            &seed,
            &mut key_block,
            length,
        )?;
        Ok(key_block)
    }

    /// Compute Finished verify_data for one side (RFC 5246 Section 7.4.9).
    pub fn derive_finished(&self, role: Role, transcript_hash: &[u8]) -> Result<Buf, String> {
        let label = match role {
            Role::Client => "client finished",
            Role::Server => "server finished",
        };

        let mut verify_data = Buf::new();
        self.derive(
            &self.master_secret,
            label,
            transcript_hash,
            &mut verify_data,
            Finished::LEGACY_VERIFY_DATA_LEN,
        )?;
        Ok(verify_data)
    }

    fn derive(
        &self,
        secret: &[u8],
        label: &str,
        seed: &[u8],
        out: &mut Buf,
        output_len: usize,
    ) -> Result<(), String> {
        if self.version.ordinal() >= 12 {
            self.prf
                .prf_tls12(self.hash, secret, label, seed, out, output_len)
        } else {
            self.prf.prf_legacy(secret, label, seed, out, output_len)
        }
    }

    fn replace_master(&mut self, next: Buf) {
        self.master_secret.as_mut().zeroize();
        self.master_secret = next;
    }
}

impl Drop for LegacySchedule {
    fn drop(&mut self) {
        self.master_secret.as_mut().zeroize();
    }
}
