//! HKDF implementation using RustCrypto crates.

use hkdf::Hkdf;
use sha2::{Sha256, Sha384};

use crate::buffer::Buf;
use crate::crypto::provider::HkdfProvider;
use crate::types::HashAlgorithm;

/// HKDF provider implementation using RustCrypto.
///
/// Only the raw extract/expand primitives live here. The label formatting
/// for the handshake key schedule is provided by the [`HkdfProvider`] trait.
#[derive(Debug)]
pub(super) struct RustCryptoHkdfProvider;

impl HkdfProvider for RustCryptoHkdfProvider {
    fn hkdf_extract(
        &self,
        hash: HashAlgorithm,
        salt: &[u8],
        ikm: &[u8],
        out: &mut Buf,
    ) -> Result<(), String> {
        out.clear();

        let salt = if salt.is_empty() { None } else { Some(salt) };
        match hash {
            HashAlgorithm::SHA256 => {
                let (prk, _) = Hkdf::<Sha256>::extract(salt, ikm);
                out.extend_from_slice(prk.as_slice());
            }
            HashAlgorithm::SHA384 => {
                let (prk, _) = Hkdf::<Sha384>::extract(salt, ikm);
                out.extend_from_slice(prk.as_slice());
            }
            _ => return Err(format!("Unsupported hash for HKDF: {:?}", hash)),
        }

        Ok(())
    }

    fn hkdf_expand(
        &self,
        hash: HashAlgorithm,
        prk: &[u8],
        info: &[u8],
        out: &mut Buf,
        output_len: usize,
    ) -> Result<(), String> {
        out.clear();
        out.resize(output_len, 0);

        match hash {
            HashAlgorithm::SHA256 => {
                let hk =
                    Hkdf::<Sha256>::from_prk(prk).map_err(|e| format!("Invalid PRK: {:?}", e))?;
                hk.expand(info, out.as_mut())
                    .map_err(|e| format!("HKDF expand failed: {:?}", e))?;
            }
            HashAlgorithm::SHA384 => {
                let hk =
                    Hkdf::<Sha384>::from_prk(prk).map_err(|e| format!("Invalid PRK: {:?}", e))?;
                hk.expand(info, out.as_mut())
                    .map_err(|e| format!("HKDF expand failed: {:?}", e))?;
            }
            _ => return Err(format!("Unsupported hash for HKDF: {:?}", hash)),
        }

        Ok(())
    }
}

/// Static instance of the HKDF provider.
pub(super) static HKDF_PROVIDER: RustCryptoHkdfProvider = RustCryptoHkdfProvider;

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 5869 Appendix A test case 1 (SHA-256).
    const IKM: [u8; 22] = [0x0b; 22];
    const SALT: &[u8] = &[
        0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c,
    ];
    const INFO: &[u8] = &[0xf0, 0xf1, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6, 0xf7, 0xf8, 0xf9];
    const PRK: &[u8] = &[
        0x07, 0x77, 0x09, 0x36, 0x2c, 0x2e, 0x32, 0xdf, 0x0d, 0xdc, 0x3f, 0x0d, 0xc4, 0x7b, //
        0xba, 0x63, 0x90, 0xb6, 0xc7, 0x3b, 0xb5, 0x0f, 0x9c, 0x31, 0x22, 0xec, 0x84, 0x4a, //
        0xd7, 0xc2, 0xb3, 0xe5,
    ];
    const OKM: &[u8] = &[
        0x3c, 0xb2, 0x5f, 0x25, 0xfa, 0xac, 0xd5, 0x7a, 0x90, 0x43, 0x4f, 0x64, 0xd0, 0x36, //
        0x2f, 0x2a, 0x2d, 0x2d, 0x0a, 0x90, 0xcf, 0x1a, 0x5a, 0x4c, 0x5d, 0xb0, 0x2d, 0x56, //
        0xec, 0xc4, 0xc5, 0xbf, 0x34, 0x00, 0x72, 0x08, 0xd5, 0xb8, 0x87, 0x18, 0x58, 0x65,
    ];

    #[test]
    fn extract_rfc5869_case_1() {
        let mut prk = Buf::new();
        HKDF_PROVIDER
            .hkdf_extract(HashAlgorithm::SHA256, SALT, &IKM, &mut prk)
            .unwrap();
        assert_eq!(prk.as_ref(), PRK);
    }

    #[test]
    fn expand_rfc5869_case_1() {
        let mut okm = Buf::new();
        HKDF_PROVIDER
            .hkdf_expand(HashAlgorithm::SHA256, PRK, INFO, &mut okm, 42)
            .unwrap();
        assert_eq!(okm.as_ref(), OKM);
    }

    #[test]
    fn expand_label_formats_hkdf_label() {
        // The provided trait method must build
        //   uint16 length || opaque "tls13 " + label || opaque context
        // and feed it through plain HKDF-Expand.
        let mut via_label = Buf::new();
        HKDF_PROVIDER
            .hkdf_expand_label(
                HashAlgorithm::SHA256,
                PRK,
                b"derived",
                b"ctx",
                &mut via_label,
                32,
            )
            .unwrap();

        let mut info = Vec::new();
        info.extend_from_slice(&32u16.to_be_bytes());
        info.push(13); // "tls13 derived"
        info.extend_from_slice(b"tls13 derived");
        info.push(3);
        info.extend_from_slice(b"ctx");

        let mut via_expand = Buf::new();
        HKDF_PROVIDER
            .hkdf_expand(HashAlgorithm::SHA256, PRK, &info, &mut via_expand, 32)
            .unwrap();

        assert_eq!(via_label.as_ref(), via_expand.as_ref());
    }

    #[test]
    fn expand_label_rejects_oversize_inputs() {
        let mut out = Buf::new();
        let long_label = [0x61u8; 256];
        assert!(HKDF_PROVIDER
            .hkdf_expand_label(HashAlgorithm::SHA256, PRK, &long_label, b"", &mut out, 32)
            .is_err());

        let long_context = [0x62u8; 256];
        assert!(HKDF_PROVIDER
            .hkdf_expand_label(HashAlgorithm::SHA256, PRK, b"key", &long_context, &mut out, 32)
            .is_err());
    }
}
