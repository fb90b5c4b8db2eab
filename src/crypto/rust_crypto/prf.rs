//! TLS PRF implementations using RustCrypto.

use hmac::Hmac;
use md5::Md5;
use sha1::Sha1;
use sha2::{Sha256, Sha384};

use crate::buffer::Buf;
use crate::crypto::provider::PrfProvider;
use crate::types::HashAlgorithm;

use super::hmac::p_hash;

/// PRF provider implementation.
#[derive(Debug)]
pub(super) struct RustCryptoPrfProvider;

impl PrfProvider for RustCryptoPrfProvider {
    fn prf_tls12(
        &self,
        hash: HashAlgorithm,
        secret: &[u8],
        label: &str,
        seed: &[u8],
        out: &mut Buf,
        output_len: usize,
    ) -> Result<(), String> {
        assert!(label.is_ascii(), "Label must be ASCII");

        let mut full_seed = Buf::new();
        full_seed.extend_from_slice(label.as_bytes());
        full_seed.extend_from_slice(seed);

        out.clear();
        match hash {
            HashAlgorithm::SHA256 => p_hash::<Hmac<Sha256>>(secret, &full_seed, out, output_len),
            HashAlgorithm::SHA384 => p_hash::<Hmac<Sha384>>(secret, &full_seed, out, output_len),
            _ => Err(format!("Unsupported PRF hash: {:?}", hash)),
        }
    }

    fn prf_legacy(
        &self,
        secret: &[u8],
        label: &str,
        seed: &[u8],
        out: &mut Buf,
        output_len: usize,
    ) -> Result<(), String> {
        assert!(label.is_ascii(), "Label must be ASCII");

        let mut full_seed = Buf::new();
        full_seed.extend_from_slice(label.as_bytes());
        full_seed.extend_from_slice(seed);

        // RFC 2246 Section 5: S1 is the first half of the secret and S2 the
        // second half, sharing the middle byte when the length is odd.
        let half = (secret.len() + 1) / 2;
        let s1 = &secret[..half];
        let s2 = &secret[secret.len() - half..];

        let mut md5_stream = Buf::new();
        p_hash::<Hmac<Md5>>(s1, &full_seed, &mut md5_stream, output_len)?;

        out.clear();
        p_hash::<Hmac<Sha1>>(s2, &full_seed, out, output_len)?;

        for (o, m) in out.iter_mut().zip(md5_stream.iter()) {
            *o ^= *m;
        }

        Ok(())
    }
}

/// Static instance of the PRF provider.
pub(super) static PRF_PROVIDER: RustCryptoPrfProvider = RustCryptoPrfProvider;
