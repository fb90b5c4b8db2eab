//! Cipher suite implementations using RustCrypto.

use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Key};

use crate::buffer::Buf;
use crate::crypto::provider::{Cipher, SupportedCipherSuite};
use crate::crypto::{Aad, Nonce};
use crate::types::{CipherSuite, HashAlgorithm};

/// AES-GCM cipher implementation using RustCrypto.
enum AesGcm {
    Aes128(Box<Aes128Gcm>),
    Aes256(Box<Aes256Gcm>),
}

impl std::fmt::Debug for AesGcm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AesGcm::Aes128(_) => f.debug_tuple("AesGcm::Aes128").finish(),
            AesGcm::Aes256(_) => f.debug_tuple("AesGcm::Aes256").finish(),
        }
    }
}

impl AesGcm {
    fn new(key: &[u8]) -> Result<Self, String> {
        match key.len() {
            16 => {
                let key = Key::<Aes128Gcm>::from_slice(key);
                Ok(AesGcm::Aes128(Box::new(Aes128Gcm::new(key))))
            }
            32 => {
                let key = Key::<Aes256Gcm>::from_slice(key);
                Ok(AesGcm::Aes256(Box::new(Aes256Gcm::new(key))))
            }
            _ => Err(format!("Invalid key size for AES-GCM: {}", key.len())),
        }
    }
}

impl Cipher for AesGcm {
    fn encrypt(&mut self, plaintext: &mut Buf, aad: Aad, nonce: Nonce) -> Result<(), String> {
        match self {
            AesGcm::Aes128(cipher) => cipher
                .encrypt_in_place(aes_gcm::Nonce::from_slice(&nonce.0), &aad, plaintext)
                .map_err(|_| "AES-GCM encryption failed".to_string()),
            AesGcm::Aes256(cipher) => cipher
                .encrypt_in_place(aes_gcm::Nonce::from_slice(&nonce.0), &aad, plaintext)
                .map_err(|_| "AES-GCM encryption failed".to_string()),
        }
    }

    fn decrypt(&mut self, ciphertext: &mut Buf, aad: Aad, nonce: Nonce) -> Result<(), String> {
        if ciphertext.len() < 16 {
            return Err(format!("Ciphertext too short: {}", ciphertext.len()));
        }

        // decrypt_in_place verifies the tag and shortens the buffer.
        match self {
            AesGcm::Aes128(cipher) => cipher
                .decrypt_in_place(aes_gcm::Nonce::from_slice(&nonce.0), &aad, ciphertext)
                .map_err(|_| "AES-GCM decryption failed".to_string()),
            AesGcm::Aes256(cipher) => cipher
                .decrypt_in_place(aes_gcm::Nonce::from_slice(&nonce.0), &aad, ciphertext)
                .map_err(|_| "AES-GCM decryption failed".to_string()),
        }
    }
}

/// AES-GCM based cipher suite description.
///
/// `iv_len` is the amount of IV material the key schedule derives for the
/// suite: the full 12-byte nonce for the newer suites, the 4-byte implicit
/// salt for the older ECDHE suites whose records carry an explicit nonce.
#[derive(Debug)]
struct GcmSuite {
    suite: CipherSuite,
    hash: HashAlgorithm,
    key_len: usize,
    iv_len: usize,
}

impl SupportedCipherSuite for GcmSuite {
    fn suite(&self) -> CipherSuite {
        self.suite
    }

    fn hash_algorithm(&self) -> HashAlgorithm {
        self.hash
    }

    fn key_len(&self) -> usize {
        self.key_len
    }

    fn iv_len(&self) -> usize {
        self.iv_len
    }

    fn tag_len(&self) -> usize {
        16
    }

    fn create_cipher(&self, key: &[u8]) -> Result<Box<dyn Cipher>, String> {
        if key.len() != self.key_len {
            return Err(format!(
                "Invalid key length for {:?}: expected {}, got {}",
                self.suite,
                self.key_len,
                key.len()
            ));
        }
        Ok(Box::new(AesGcm::new(key)?))
    }
}

static AES_128_GCM_SHA256: GcmSuite = GcmSuite {
    suite: CipherSuite::AES_128_GCM_SHA256,
    hash: HashAlgorithm::SHA256,
    key_len: 16,
    iv_len: 12,
};

static AES_256_GCM_SHA384: GcmSuite = GcmSuite {
    suite: CipherSuite::AES_256_GCM_SHA384,
    hash: HashAlgorithm::SHA384,
    key_len: 32,
    iv_len: 12,
};

static ECDHE_ECDSA_AES128_GCM_SHA256: GcmSuite = GcmSuite {
    suite: CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256,
    hash: HashAlgorithm::SHA256,
    key_len: 16,
    iv_len: 4,
};

static ECDHE_ECDSA_AES256_GCM_SHA384: GcmSuite = GcmSuite {
    suite: CipherSuite::ECDHE_ECDSA_AES256_GCM_SHA384,
    hash: HashAlgorithm::SHA384,
    key_len: 32,
    iv_len: 4,
};

static ECDHE_RSA_AES128_GCM_SHA256: GcmSuite = GcmSuite {
    suite: CipherSuite::ECDHE_RSA_AES128_GCM_SHA256,
    hash: HashAlgorithm::SHA256,
    key_len: 16,
    iv_len: 4,
};

static ECDHE_RSA_AES256_GCM_SHA384: GcmSuite = GcmSuite {
    suite: CipherSuite::ECDHE_RSA_AES256_GCM_SHA384,
    hash: HashAlgorithm::SHA384,
    key_len: 32,
    iv_len: 4,
};

/// All supported cipher suites, in preference order.
pub(super) static ALL_CIPHER_SUITES: &[&dyn SupportedCipherSuite] = &[
    &AES_128_GCM_SHA256,
    &AES_256_GCM_SHA384,
    &ECDHE_ECDSA_AES128_GCM_SHA256,
    &ECDHE_RSA_AES128_GCM_SHA256,
    &ECDHE_ECDSA_AES256_GCM_SHA384,
    &ECDHE_RSA_AES256_GCM_SHA384,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aes_gcm_roundtrip() {
        let key = [0x42u8; 16];
        let mut cipher = AES_128_GCM_SHA256.create_cipher(&key).unwrap();

        let mut data = Buf::from_slice(b"hello handshake");
        let nonce = Nonce([0x24; 12]);
        cipher.encrypt(&mut data, Aad(b"aad"), nonce).unwrap();
        assert_eq!(data.len(), 15 + 16);

        cipher.decrypt(&mut data, Aad(b"aad"), nonce).unwrap();
        assert_eq!(data.as_ref(), b"hello handshake");
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let key = [0x42u8; 32];
        let mut cipher = AES_256_GCM_SHA384.create_cipher(&key).unwrap();

        let mut data = Buf::from_slice(b"hello handshake");
        let nonce = Nonce([0x24; 12]);
        cipher.encrypt(&mut data, Aad(b""), nonce).unwrap();

        data.as_mut()[0] ^= 0x01;
        assert!(cipher.decrypt(&mut data, Aad(b""), nonce).is_err());
    }

    #[test]
    fn wrong_aad_fails() {
        let key = [0x42u8; 16];
        let mut cipher = AES_128_GCM_SHA256.create_cipher(&key).unwrap();

        let mut data = Buf::from_slice(b"hello handshake");
        let nonce = Nonce([0x24; 12]);
        cipher.encrypt(&mut data, Aad(b"one"), nonce).unwrap();
        assert!(cipher.decrypt(&mut data, Aad(b"two"), nonce).is_err());
    }

    #[test]
    fn create_cipher_checks_key_length() {
        assert!(AES_128_GCM_SHA256.create_cipher(&[0u8; 32]).is_err());
        assert!(AES_256_GCM_SHA384.create_cipher(&[0u8; 16]).is_err());
    }

    #[test]
    fn legacy_suites_use_partial_iv() {
        assert_eq!(AES_128_GCM_SHA256.iv_len(), 12);
        assert_eq!(ECDHE_ECDSA_AES128_GCM_SHA256.iv_len(), 4);
        assert_eq!(ECDHE_RSA_AES256_GCM_SHA384.key_len(), 32);
    }
}
