//! Stateless retry cookies.
//!
//! A responder that wants address validation before allocating handshake
//! state answers the first ClientHello with a retry request carrying a
//! cookie, keeps nothing, and waits for the cookie to come back. The
//! cookie is
//!
//! ```text
//! transcript_hash || HMAC-SHA256(secret, transcript_hash)
//! ```
//!
//! where the hash covers the initiator's first ClientHello. Carrying the
//! hash inside the cookie is what makes the retry stateless: when the echo
//! arrives the server recovers the first-flight hash for its transcript
//! reseed instead of having remembered it.

use crate::buffer::Buf;
use crate::crypto::provider::{CryptoProvider, HmacProvider};
use crate::types::HashAlgorithm;

/// Integrity code length (HMAC-SHA256 output).
const COOKIE_MAC_LEN: usize = 32;

/// Issues and validates retry cookies without per-connection state.
pub struct HelloCookieManager {
    hmac: &'static dyn HmacProvider,
    secret: [u8; 32],
}

impl std::fmt::Debug for HelloCookieManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HelloCookieManager").finish_non_exhaustive()
    }
}

impl HelloCookieManager {
    /// Create a manager with a fresh random secret.
    ///
    /// Cookies only validate against the manager that issued them, so a
    /// restarted server rejects old cookies and simply retries again.
    pub fn new(provider: &CryptoProvider) -> Result<Self, String> {
        let mut secret = [0u8; 32];
        provider.secure_random.fill(&mut secret)?;
        Ok(HelloCookieManager {
            hmac: provider.hmac_provider,
            secret,
        })
    }

    /// Issue a cookie binding the first-ClientHello transcript hash.
    pub fn create_cookie(&self, transcript_hash: &[u8]) -> Result<Buf, String> {
        let mut mac = Buf::new();
        self.hmac
            .hmac(HashAlgorithm::SHA256, &self.secret, transcript_hash, &mut mac)?;

        let mut cookie = Buf::new();
        cookie.extend_from_slice(transcript_hash);
        cookie.extend_from_slice(&mac);
        Ok(cookie)
    }

    /// Validate an echoed cookie.
    ///
    /// Returns the embedded first-flight transcript hash when the integrity
    /// code checks out. Any mismatch, truncation or tampering yields `None`,
    /// meaning "no valid cookie": spoofed and garbled cookies are expected
    /// adversarial input, so the caller answers with a fresh retry request
    /// rather than failing the handshake.
    pub fn verify_cookie<'a>(&self, cookie: &'a [u8]) -> Result<Option<&'a [u8]>, String> {
        if cookie.len() <= COOKIE_MAC_LEN {
            return Ok(None);
        }

        let (transcript_hash, mac) = cookie.split_at(cookie.len() - COOKIE_MAC_LEN);
        let valid =
            self.hmac
                .hmac_verify(HashAlgorithm::SHA256, &self.secret, transcript_hash, mac)?;
        Ok(valid.then_some(transcript_hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::rust_crypto;

    fn manager() -> HelloCookieManager {
        let provider = rust_crypto::default_provider();
        HelloCookieManager::new(&provider).unwrap()
    }

    #[test]
    fn cookie_roundtrip_returns_embedded_hash() {
        let manager = manager();
        let transcript_hash = [0xabu8; 32];

        let cookie = manager.create_cookie(&transcript_hash).unwrap();
        assert_eq!(cookie.len(), 32 + COOKIE_MAC_LEN);

        let embedded = manager.verify_cookie(&cookie).unwrap();
        assert_eq!(embedded, Some(&transcript_hash[..]));
    }

    #[test]
    fn sha384_sized_hash_is_carried_whole() {
        let manager = manager();
        let transcript_hash = [0x17u8; 48];

        let cookie = manager.create_cookie(&transcript_hash).unwrap();
        assert_eq!(cookie.len(), 48 + COOKIE_MAC_LEN);
        assert_eq!(
            manager.verify_cookie(&cookie).unwrap(),
            Some(&transcript_hash[..])
        );
    }

    #[test]
    fn any_byte_flip_invalidates() {
        let manager = manager();
        let cookie = manager.create_cookie(&[0xabu8; 32]).unwrap();

        for i in 0..cookie.len() {
            let mut tampered = Buf::from_slice(&cookie);
            tampered[i] ^= 0x01;
            assert_eq!(manager.verify_cookie(&tampered).unwrap(), None, "byte {}", i);
        }
    }

    #[test]
    fn short_or_empty_cookies_are_missing_not_errors() {
        let manager = manager();
        assert_eq!(manager.verify_cookie(&[]).unwrap(), None);
        assert_eq!(manager.verify_cookie(&[0u8; 32]).unwrap(), None);
    }

    #[test]
    fn foreign_manager_cookie_is_rejected() {
        let cookie = manager().create_cookie(&[0xabu8; 32]).unwrap();
        assert_eq!(manager().verify_cookie(&cookie).unwrap(), None);
    }
}
