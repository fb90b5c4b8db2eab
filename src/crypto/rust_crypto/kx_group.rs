//! Key exchange group implementations using RustCrypto.

use std::sync::Arc;

use num_bigint::{BigUint, RandBigInt};
use once_cell::sync::Lazy;
use p256::{ecdh::EphemeralSecret as P256EphemeralSecret, PublicKey as P256PublicKey};
use p384::{ecdh::EphemeralSecret as P384EphemeralSecret, PublicKey as P384PublicKey};
use rand::rngs::OsRng;
use x25519_dalek::{PublicKey as X25519PublicKey, ReusableSecret};

use crate::buffer::Buf;
use crate::crypto::provider::{ActiveKeyExchange, SupportedKxGroup};
use crate::types::NamedGroup;

/// ECDHE key exchange implementation.
///
/// The curve secrets all support completion by reference, which is what lets
/// one keypair serve several handshakes when the engine caches ephemerals.
enum EcdheKeyExchange {
    X25519 {
        secret: ReusableSecret,
        public_key: Buf,
    },
    P256 {
        secret: P256EphemeralSecret,
        public_key: Buf,
    },
    P384 {
        secret: P384EphemeralSecret,
        public_key: Buf,
    },
}

impl std::fmt::Debug for EcdheKeyExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (name, public_key) = match self {
            EcdheKeyExchange::X25519 { public_key, .. } => ("X25519", public_key),
            EcdheKeyExchange::P256 { public_key, .. } => ("P256", public_key),
            EcdheKeyExchange::P384 { public_key, .. } => ("P384", public_key),
        };
        f.debug_struct(&format!("EcdheKeyExchange::{}", name))
            .field("public_key_len", &public_key.len())
            .finish_non_exhaustive()
    }
}

impl EcdheKeyExchange {
    fn new(group: NamedGroup) -> Result<Self, String> {
        let mut public_key = Buf::new();
        match group {
            NamedGroup::X25519 => {
                let secret = ReusableSecret::random_from_rng(OsRng);
                let public = X25519PublicKey::from(&secret);
                public_key.extend_from_slice(public.as_bytes());
                Ok(EcdheKeyExchange::X25519 { secret, public_key })
            }
            NamedGroup::Secp256r1 => {
                let secret = P256EphemeralSecret::random(&mut OsRng);
                let public = P256PublicKey::from(&secret);
                public_key.extend_from_slice(&public.to_sec1_bytes());
                Ok(EcdheKeyExchange::P256 { secret, public_key })
            }
            NamedGroup::Secp384r1 => {
                let secret = P384EphemeralSecret::random(&mut OsRng);
                let public = P384PublicKey::from(&secret);
                public_key.extend_from_slice(&public.to_sec1_bytes());
                Ok(EcdheKeyExchange::P384 { secret, public_key })
            }
            _ => Err(format!("Unsupported ECDHE group: {:?}", group)),
        }
    }
}

impl ActiveKeyExchange for EcdheKeyExchange {
    fn pub_key(&self) -> &[u8] {
        match self {
            EcdheKeyExchange::X25519 { public_key, .. } => public_key,
            EcdheKeyExchange::P256 { public_key, .. } => public_key,
            EcdheKeyExchange::P384 { public_key, .. } => public_key,
        }
    }

    fn complete(&self, peer_public: &[u8], out: &mut Buf) -> Result<(), String> {
        out.clear();
        match self {
            EcdheKeyExchange::X25519 { secret, .. } => {
                let peer: [u8; 32] = peer_public
                    .try_into()
                    .map_err(|_| "Invalid X25519 public key length".to_string())?;
                let shared = secret.diffie_hellman(&X25519PublicKey::from(peer));
                if !shared.was_contributory() {
                    return Err("X25519 shared secret is zero".to_string());
                }
                out.extend_from_slice(shared.as_bytes());
                Ok(())
            }
            EcdheKeyExchange::P256 { secret, .. } => {
                let peer = P256PublicKey::from_sec1_bytes(peer_public)
                    .map_err(|_| "Invalid P-256 public key".to_string())?;
                let shared = secret.diffie_hellman(&peer);
                out.extend_from_slice(shared.raw_secret_bytes().as_slice());
                Ok(())
            }
            EcdheKeyExchange::P384 { secret, .. } => {
                let peer = P384PublicKey::from_sec1_bytes(peer_public)
                    .map_err(|_| "Invalid P-384 public key".to_string())?;
                let shared = secret.diffie_hellman(&peer);
                out.extend_from_slice(shared.raw_secret_bytes().as_slice());
                Ok(())
            }
        }
    }

    fn group(&self) -> NamedGroup {
        match self {
            EcdheKeyExchange::X25519 { .. } => NamedGroup::X25519,
            EcdheKeyExchange::P256 { .. } => NamedGroup::Secp256r1,
            EcdheKeyExchange::P384 { .. } => NamedGroup::Secp384r1,
        }
    }
}

/// Encoded size of ffdhe2048 public keys and shared secrets.
const FFDHE2048_LEN: usize = 256;

// RFC 7919 Appendix A.1 ffdhe2048 prime, generator g = 2.
const FFDHE2048_P_HEX: &str = "\
ffffffffffffffffadf85458a2bb4a9aafdc5620273d3cf1\
d8b9c583ce2d3695a9e13641146433fbcc939dce249b3ef9\
7d2fe363630c75d8f681b202aec4617ad3df1ed5d5fd6561\
2433f51f5f066ed0856365553ded1af3b557135e7f57c935\
984f0c70e0e68b77e2a689daf3efe8721df158a136ade735\
30acca4f483a797abc0ab182b324fb61d108a94bb2c8e3fb\
b96adab760d7f4681d4f42a3de394df4ae56ede76372bb19\
0b07a7c8ee0a6d709e02fce1cdf7e2ecc03404cd28342f61\
9172fe9ce98583ff8e4f1232eef28183c3fe3b1b4c6fad73\
3bb5fcbc2ec22005c58ef1837d1683b2c6f34a26c1b2effa\
886b423861285c97ffffffffffffffff";

static FFDHE2048_P: Lazy<BigUint> = Lazy::new(|| {
    // The constant above is valid hex of the documented length.
    BigUint::parse_bytes(FFDHE2048_P_HEX.as_bytes(), 16).unwrap()
});

/// Finite-field key exchange over the RFC 7919 ffdhe2048 group.
struct FfdheKeyExchange {
    x: BigUint,
    public_key: Buf,
}

impl std::fmt::Debug for FfdheKeyExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfdheKeyExchange")
            .field("public_key_len", &self.public_key.len())
            .finish_non_exhaustive()
    }
}

impl FfdheKeyExchange {
    fn new() -> Self {
        let p = &*FFDHE2048_P;
        let x = OsRng.gen_biguint_range(&BigUint::from(2u32), &(p - 2u32));
        let public = BigUint::from(2u32).modpow(&x, p);

        let mut public_key = Buf::new();
        encode_padded(&public, &mut public_key);
        Self { x, public_key }
    }
}

/// Left-pad a field element to the fixed ffdhe2048 encoding.
fn encode_padded(n: &BigUint, out: &mut Buf) {
    let bytes = n.to_bytes_be();
    out.clear();
    out.resize(FFDHE2048_LEN - bytes.len(), 0);
    out.extend_from_slice(&bytes);
}

impl ActiveKeyExchange for FfdheKeyExchange {
    fn pub_key(&self) -> &[u8] {
        &self.public_key
    }

    fn complete(&self, peer_public: &[u8], out: &mut Buf) -> Result<(), String> {
        if peer_public.len() != FFDHE2048_LEN {
            return Err(format!(
                "Invalid ffdhe2048 public key length: {}",
                peer_public.len()
            ));
        }

        let p = &*FFDHE2048_P;
        let y = BigUint::from_bytes_be(peer_public);

        // Reject the degenerate subgroup {0, 1, p-1} and out-of-field values.
        if y <= BigUint::from(1u32) || y >= p - 1u32 {
            return Err("ffdhe2048 peer key out of range".to_string());
        }

        let shared = y.modpow(&self.x, p);
        encode_padded(&shared, out);
        Ok(())
    }

    fn group(&self) -> NamedGroup {
        NamedGroup::Ffdhe2048
    }
}

/// X25519 key exchange group.
#[derive(Debug)]
struct X25519;

impl SupportedKxGroup for X25519 {
    fn name(&self) -> NamedGroup {
        NamedGroup::X25519
    }

    fn start_exchange(&self) -> Result<Arc<dyn ActiveKeyExchange>, String> {
        Ok(Arc::new(EcdheKeyExchange::new(NamedGroup::X25519)?))
    }
}

/// P-256 (secp256r1) key exchange group.
#[derive(Debug)]
struct P256;

impl SupportedKxGroup for P256 {
    fn name(&self) -> NamedGroup {
        NamedGroup::Secp256r1
    }

    fn start_exchange(&self) -> Result<Arc<dyn ActiveKeyExchange>, String> {
        Ok(Arc::new(EcdheKeyExchange::new(NamedGroup::Secp256r1)?))
    }
}

/// P-384 (secp384r1) key exchange group.
#[derive(Debug)]
struct P384;

impl SupportedKxGroup for P384 {
    fn name(&self) -> NamedGroup {
        NamedGroup::Secp384r1
    }

    fn start_exchange(&self) -> Result<Arc<dyn ActiveKeyExchange>, String> {
        Ok(Arc::new(EcdheKeyExchange::new(NamedGroup::Secp384r1)?))
    }
}

/// ffdhe2048 key exchange group (RFC 7919).
#[derive(Debug)]
struct Ffdhe2048;

impl SupportedKxGroup for Ffdhe2048 {
    fn name(&self) -> NamedGroup {
        NamedGroup::Ffdhe2048
    }

    fn start_exchange(&self) -> Result<Arc<dyn ActiveKeyExchange>, String> {
        Ok(Arc::new(FfdheKeyExchange::new()))
    }
}

/// Static instances of supported key exchange groups.
static KX_GROUP_X25519: X25519 = X25519;
static KX_GROUP_P256: P256 = P256;
static KX_GROUP_P384: P384 = P384;
static KX_GROUP_FFDHE2048: Ffdhe2048 = Ffdhe2048;

/// All supported key exchange groups, in preference order.
pub(super) static ALL_KX_GROUPS: &[&dyn SupportedKxGroup] = &[
    &KX_GROUP_X25519,
    &KX_GROUP_P256,
    &KX_GROUP_P384,
    &KX_GROUP_FFDHE2048,
];

#[cfg(test)]
mod tests {
    use super::*;

    fn agree(group: &dyn SupportedKxGroup, expected_len: usize) {
        let a = group.start_exchange().unwrap();
        let b = group.start_exchange().unwrap();

        let mut shared_a = Buf::new();
        let mut shared_b = Buf::new();
        a.complete(b.pub_key(), &mut shared_a).unwrap();
        b.complete(a.pub_key(), &mut shared_b).unwrap();

        assert_eq!(shared_a.as_ref(), shared_b.as_ref());
        assert_eq!(shared_a.len(), expected_len);
        assert_eq!(a.group(), group.name());
    }

    #[test]
    fn x25519_agrees() {
        agree(&KX_GROUP_X25519, 32);
    }

    #[test]
    fn p256_agrees() {
        agree(&KX_GROUP_P256, 32);
    }

    #[test]
    fn p384_agrees() {
        agree(&KX_GROUP_P384, 48);
    }

    #[test]
    fn ffdhe2048_agrees() {
        agree(&KX_GROUP_FFDHE2048, 256);
    }

    #[test]
    fn p256_public_key_is_uncompressed_sec1() {
        let kx = KX_GROUP_P256.start_exchange().unwrap();
        assert_eq!(kx.pub_key().len(), 65);
        assert_eq!(kx.pub_key()[0], 0x04);
    }

    #[test]
    fn completion_is_repeatable() {
        // A keypair completes more than once without losing its secret,
        // which the ephemeral cache relies on.
        let a = KX_GROUP_X25519.start_exchange().unwrap();
        let b = KX_GROUP_X25519.start_exchange().unwrap();

        let mut first = Buf::new();
        let mut second = Buf::new();
        a.complete(b.pub_key(), &mut first).unwrap();
        a.complete(b.pub_key(), &mut second).unwrap();

        assert_eq!(first.as_ref(), second.as_ref());
    }

    #[test]
    fn ffdhe2048_rejects_degenerate_keys() {
        let kx = KX_GROUP_FFDHE2048.start_exchange().unwrap();
        let mut out = Buf::new();

        let mut one = [0u8; FFDHE2048_LEN];
        one[FFDHE2048_LEN - 1] = 1;
        assert!(kx.complete(&one, &mut out).is_err());

        let mut p_minus_1 = Buf::new();
        encode_padded(&(&*FFDHE2048_P - 1u32), &mut p_minus_1);
        assert!(kx.complete(&p_minus_1, &mut out).is_err());

        assert!(kx.complete(&[0u8; 17], &mut out).is_err());
    }

    #[test]
    fn ecdhe_rejects_malformed_peer_key() {
        let kx = KX_GROUP_P256.start_exchange().unwrap();
        let mut out = Buf::new();
        assert!(kx.complete(&[0x04; 65], &mut out).is_err());
        assert!(kx.complete(&[], &mut out).is_err());
    }
}
