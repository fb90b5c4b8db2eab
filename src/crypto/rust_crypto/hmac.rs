//! HMAC utilities using RustCrypto.

use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha384};

use crate::buffer::Buf;
use crate::crypto::provider::HmacProvider;
use crate::types::HashAlgorithm;

/// TLS PRF P_hash expansion (RFC 5246 Section 5).
///
/// Appends `output_len` bytes of `P_<hash>(secret, full_seed)` to `out`.
pub(super) fn p_hash<M: Mac + KeyInit + Clone>(
    secret: &[u8],
    full_seed: &[u8],
    out: &mut Buf,
    output_len: usize,
) -> Result<(), String> {
    let keyed = <M as Mac>::new_from_slice(secret)
        .map_err(|_| "Invalid HMAC key length".to_string())?;

    // A(1) = HMAC_hash(secret, A(0)) where A(0) = seed
    let mut ctx = keyed.clone();
    ctx.update(full_seed);
    let mut a = ctx.finalize().into_bytes();

    let target = out.len() + output_len;
    while out.len() < target {
        // HMAC_hash(secret, A(i) + seed)
        let mut ctx = keyed.clone();
        ctx.update(&a);
        ctx.update(full_seed);
        let output = ctx.finalize().into_bytes();

        let remaining = target - out.len();
        let to_copy = std::cmp::min(remaining, output.len());
        out.extend_from_slice(&output[..to_copy]);

        if out.len() < target {
            // A(i+1) = HMAC_hash(secret, A(i))
            let mut ctx = keyed.clone();
            ctx.update(&a);
            a = ctx.finalize().into_bytes();
        }
    }

    Ok(())
}

/// HMAC provider implementation.
#[derive(Debug)]
pub(super) struct RustCryptoHmacProvider;

impl HmacProvider for RustCryptoHmacProvider {
    fn hmac(
        &self,
        hash: HashAlgorithm,
        key: &[u8],
        data: &[u8],
        out: &mut Buf,
    ) -> Result<(), String> {
        out.clear();

        match hash {
            HashAlgorithm::SHA256 => {
                let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key)
                    .map_err(|_| "Invalid HMAC key".to_string())?;
                mac.update(data);
                out.extend_from_slice(&mac.finalize().into_bytes());
            }
            HashAlgorithm::SHA384 => {
                let mut mac = <Hmac<Sha384> as Mac>::new_from_slice(key)
                    .map_err(|_| "Invalid HMAC key".to_string())?;
                mac.update(data);
                out.extend_from_slice(&mac.finalize().into_bytes());
            }
            _ => return Err(format!("Unsupported HMAC hash algorithm: {:?}", hash)),
        }

        Ok(())
    }

    fn hmac_verify(
        &self,
        hash: HashAlgorithm,
        key: &[u8],
        data: &[u8],
        tag: &[u8],
    ) -> Result<bool, String> {
        match hash {
            HashAlgorithm::SHA256 => {
                let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key)
                    .map_err(|_| "Invalid HMAC key".to_string())?;
                mac.update(data);
                Ok(mac.verify_slice(tag).is_ok())
            }
            HashAlgorithm::SHA384 => {
                let mut mac = <Hmac<Sha384> as Mac>::new_from_slice(key)
                    .map_err(|_| "Invalid HMAC key".to_string())?;
                mac.update(data);
                Ok(mac.verify_slice(tag).is_ok())
            }
            _ => Err(format!("Unsupported HMAC hash algorithm: {:?}", hash)),
        }
    }
}

/// Static instance of the HMAC provider.
pub(super) static HMAC_PROVIDER: RustCryptoHmacProvider = RustCryptoHmacProvider;

#[cfg(test)]
mod tests {
    use super::*;

    // HMAC-SHA256("key", "The quick brown fox jumps over the lazy dog")
    const FOX_TAG: &[u8] = &[
        0xf7, 0xbc, 0x83, 0xf4, 0x30, 0x53, 0x84, 0x24, 0xb1, 0x32, 0x98, 0xe6, 0xaa, 0x6f, //
        0xb1, 0x43, 0xef, 0x4d, 0x59, 0xa1, 0x49, 0x46, 0x17, 0x59, 0x97, 0x47, 0x9d, 0xbc, //
        0x2d, 0x1a, 0x3c, 0xd8,
    ];

    #[test]
    fn hmac_sha256_known_answer() {
        let mut out = Buf::new();
        HMAC_PROVIDER
            .hmac(
                HashAlgorithm::SHA256,
                b"key",
                b"The quick brown fox jumps over the lazy dog",
                &mut out,
            )
            .unwrap();

        assert_eq!(out.as_ref(), FOX_TAG);
    }

    #[test]
    fn hmac_verify_accepts_and_rejects() {
        let data = b"The quick brown fox jumps over the lazy dog";

        let ok = HMAC_PROVIDER
            .hmac_verify(HashAlgorithm::SHA256, b"key", data, FOX_TAG)
            .unwrap();
        assert!(ok);

        let mut bad = FOX_TAG.to_vec();
        bad[0] ^= 0x01;
        let ok = HMAC_PROVIDER
            .hmac_verify(HashAlgorithm::SHA256, b"key", data, &bad)
            .unwrap();
        assert!(!ok);

        // Truncated tags are a mismatch, not an error.
        let ok = HMAC_PROVIDER
            .hmac_verify(HashAlgorithm::SHA256, b"key", data, &FOX_TAG[..16])
            .unwrap();
        assert!(!ok);
    }

    #[test]
    fn p_hash_produces_requested_length() {
        let mut out = Buf::new();
        p_hash::<Hmac<Sha256>>(b"secret", b"seed", &mut out, 100).unwrap();
        assert_eq!(out.len(), 100);

        // Expansion is a prefix-consistent stream.
        let mut short = Buf::new();
        p_hash::<Hmac<Sha256>>(b"secret", b"seed", &mut short, 32).unwrap();
        assert_eq!(&out[..32], short.as_ref());
    }
}
