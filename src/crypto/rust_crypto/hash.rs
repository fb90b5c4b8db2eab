//! Hash implementations using RustCrypto.

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384};

use crate::buffer::Buf;
use crate::crypto::provider::{HashContext, HashProvider};
use crate::types::HashAlgorithm;

/// Hash context implementation using RustCrypto.
///
/// MD5 and SHA-1 exist only for the pre-1.2 transcript, which hashes the
/// handshake with both and concatenates the digests.
enum RustCryptoHashContext {
    Md5(Md5),
    Sha1(Sha1),
    Sha256(Sha256),
    Sha384(Sha384),
}

impl std::fmt::Debug for RustCryptoHashContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RustCryptoHashContext::Md5(_) => f.debug_tuple("RustCryptoHashContext::Md5"),
            RustCryptoHashContext::Sha1(_) => f.debug_tuple("RustCryptoHashContext::Sha1"),
            RustCryptoHashContext::Sha256(_) => f.debug_tuple("RustCryptoHashContext::Sha256"),
            RustCryptoHashContext::Sha384(_) => f.debug_tuple("RustCryptoHashContext::Sha384"),
        }
        .finish()
    }
}

impl HashContext for RustCryptoHashContext {
    fn update(&mut self, data: &[u8]) {
        match self {
            RustCryptoHashContext::Md5(ctx) => ctx.update(data),
            RustCryptoHashContext::Sha1(ctx) => ctx.update(data),
            RustCryptoHashContext::Sha256(ctx) => ctx.update(data),
            RustCryptoHashContext::Sha384(ctx) => ctx.update(data),
        }
    }

    fn clone_and_finalize(&self, out: &mut Buf) {
        out.clear();
        match self {
            RustCryptoHashContext::Md5(ctx) => {
                let digest = ctx.clone().finalize();
                out.extend_from_slice(&digest);
            }
            RustCryptoHashContext::Sha1(ctx) => {
                let digest = ctx.clone().finalize();
                out.extend_from_slice(&digest);
            }
            RustCryptoHashContext::Sha256(ctx) => {
                let digest = ctx.clone().finalize();
                out.extend_from_slice(&digest);
            }
            RustCryptoHashContext::Sha384(ctx) => {
                let digest = ctx.clone().finalize();
                out.extend_from_slice(&digest);
            }
        }
    }
}

/// Hash provider implementation.
#[derive(Debug)]
pub(super) struct RustCryptoHashProvider;

impl HashProvider for RustCryptoHashProvider {
    fn create_hash(&self, algorithm: HashAlgorithm) -> Box<dyn HashContext> {
        match algorithm {
            HashAlgorithm::MD5 => Box::new(RustCryptoHashContext::Md5(Md5::new())),
            HashAlgorithm::SHA1 => Box::new(RustCryptoHashContext::Sha1(Sha1::new())),
            HashAlgorithm::SHA256 => Box::new(RustCryptoHashContext::Sha256(Sha256::new())),
            HashAlgorithm::SHA384 => Box::new(RustCryptoHashContext::Sha384(Sha384::new())),
            _ => panic!("Unsupported hash algorithm: {:?}", algorithm),
        }
    }
}

/// Static instance of the hash provider.
pub(super) static HASH_PROVIDER: RustCryptoHashProvider = RustCryptoHashProvider;
