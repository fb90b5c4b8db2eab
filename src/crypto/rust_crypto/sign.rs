//! Signing keys and certificate signature verification using RustCrypto.

use der::asn1::ObjectIdentifier;
use der::Decode;
use pkcs8::{DecodePrivateKey, Document};
use rand::rngs::OsRng;
use rsa::pkcs1::DecodeRsaPrivateKey;
use sha2::{Sha256, Sha384};
use signature::{RandomizedSigner, SignatureEncoding, Signer, Verifier};
use spki::SubjectPublicKeyInfoOwned;
use x509_cert::Certificate;

use crate::buffer::Buf;
use crate::crypto::provider::{KeyProvider, SignatureVerifier, SigningKey};
use crate::types::SignatureScheme;

/// OID for EC public keys (id-ecPublicKey).
const OID_EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
/// OID for the P-256 curve (secp256r1).
const OID_SECP256R1: &str = "1.2.840.10045.3.1.7";
/// OID for the P-384 curve (secp384r1).
const OID_SECP384R1: &str = "1.3.132.0.34";
/// OID for RSA public keys (rsaEncryption).
const OID_RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";

/// ECDSA signing key over one of the supported curves.
///
/// Signatures are DER-encoded, as both the old and new handshake
/// layouts carry them.
pub(super) enum EcdsaSigningKey {
    P256(p256::ecdsa::SigningKey),
    P384(p384::ecdsa::SigningKey),
}

impl std::fmt::Debug for EcdsaSigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EcdsaSigningKey::P256(_) => f.debug_tuple("EcdsaSigningKey::P256").finish(),
            EcdsaSigningKey::P384(_) => f.debug_tuple("EcdsaSigningKey::P384").finish(),
        }
    }
}

impl SigningKey for EcdsaSigningKey {
    fn schemes(&self) -> &'static [SignatureScheme] {
        match self {
            EcdsaSigningKey::P256(_) => &[SignatureScheme::ECDSA_SECP256R1_SHA256],
            EcdsaSigningKey::P384(_) => &[SignatureScheme::ECDSA_SECP384R1_SHA384],
        }
    }

    fn sign(&self, scheme: SignatureScheme, data: &[u8], out: &mut Buf) -> Result<(), String> {
        match (self, scheme) {
            (EcdsaSigningKey::P256(key), SignatureScheme::ECDSA_SECP256R1_SHA256) => {
                let signature: p256::ecdsa::Signature = key
                    .try_sign(data)
                    .map_err(|e| format!("ECDSA signing failed: {}", e))?;
                out.extend_from_slice(signature.to_der().as_bytes());
                Ok(())
            }
            (EcdsaSigningKey::P384(key), SignatureScheme::ECDSA_SECP384R1_SHA384) => {
                let signature: p384::ecdsa::Signature = key
                    .try_sign(data)
                    .map_err(|e| format!("ECDSA signing failed: {}", e))?;
                out.extend_from_slice(signature.to_der().as_bytes());
                Ok(())
            }
            _ => Err(format!("Key cannot sign {:?}", scheme)),
        }
    }
}

/// RSA signing key, usable for both RSASSA-PSS and PKCS#1 v1.5.
pub(super) struct RsaSigningKey(rsa::RsaPrivateKey);

impl std::fmt::Debug for RsaSigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaSigningKey").finish_non_exhaustive()
    }
}

impl SigningKey for RsaSigningKey {
    fn schemes(&self) -> &'static [SignatureScheme] {
        &[
            SignatureScheme::RSA_PSS_RSAE_SHA256,
            SignatureScheme::RSA_PSS_RSAE_SHA384,
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
        ]
    }

    fn sign(&self, scheme: SignatureScheme, data: &[u8], out: &mut Buf) -> Result<(), String> {
        let signature = match scheme {
            SignatureScheme::RSA_PSS_RSAE_SHA256 => {
                let key = rsa::pss::SigningKey::<Sha256>::new(self.0.clone());
                key.try_sign_with_rng(&mut OsRng, data)
                    .map_err(|e| format!("RSA-PSS signing failed: {}", e))?
                    .to_vec()
            }
            SignatureScheme::RSA_PSS_RSAE_SHA384 => {
                let key = rsa::pss::SigningKey::<Sha384>::new(self.0.clone());
                key.try_sign_with_rng(&mut OsRng, data)
                    .map_err(|e| format!("RSA-PSS signing failed: {}", e))?
                    .to_vec()
            }
            SignatureScheme::RSA_PKCS1_SHA256 => {
                let key = rsa::pkcs1v15::SigningKey::<Sha256>::new(self.0.clone());
                key.try_sign(data)
                    .map_err(|e| format!("RSA signing failed: {}", e))?
                    .to_vec()
            }
            SignatureScheme::RSA_PKCS1_SHA384 => {
                let key = rsa::pkcs1v15::SigningKey::<Sha384>::new(self.0.clone());
                key.try_sign(data)
                    .map_err(|e| format!("RSA signing failed: {}", e))?
                    .to_vec()
            }
            _ => return Err(format!("Key cannot sign {:?}", scheme)),
        };
        out.extend_from_slice(&signature);
        Ok(())
    }
}

/// Private key parser for the formats certificates commonly ship with.
#[derive(Debug)]
pub(super) struct RustCryptoKeyProvider;

impl KeyProvider for RustCryptoKeyProvider {
    fn load_private_key(&self, key_der: &[u8]) -> Result<Box<dyn SigningKey>, String> {
        if key_der.starts_with(b"-----BEGIN") {
            let pem = std::str::from_utf8(key_der).map_err(|_| "Invalid PEM".to_string())?;
            let (_, doc) = Document::from_pem(pem).map_err(|e| format!("Invalid PEM: {}", e))?;
            return load_der(doc.as_bytes());
        }
        load_der(key_der)
    }
}

/// Try the supported DER encodings in order: PKCS#8 (EC then RSA),
/// raw SEC1, raw PKCS#1.
fn load_der(der_bytes: &[u8]) -> Result<Box<dyn SigningKey>, String> {
    if let Ok(key) = p256::ecdsa::SigningKey::from_pkcs8_der(der_bytes) {
        return Ok(Box::new(EcdsaSigningKey::P256(key)));
    }
    if let Ok(key) = p384::ecdsa::SigningKey::from_pkcs8_der(der_bytes) {
        return Ok(Box::new(EcdsaSigningKey::P384(key)));
    }
    if let Ok(key) = rsa::RsaPrivateKey::from_pkcs8_der(der_bytes) {
        return Ok(Box::new(RsaSigningKey(key)));
    }
    if let Ok(key) = p256::SecretKey::from_sec1_der(der_bytes) {
        return Ok(Box::new(EcdsaSigningKey::P256(key.into())));
    }
    if let Ok(key) = p384::SecretKey::from_sec1_der(der_bytes) {
        return Ok(Box::new(EcdsaSigningKey::P384(key.into())));
    }
    if let Ok(key) = rsa::RsaPrivateKey::from_pkcs1_der(der_bytes) {
        return Ok(Box::new(RsaSigningKey(key)));
    }
    Err("Private key is not PKCS#8, SEC1 or PKCS#1".to_string())
}

/// Signature verification against the end-entity certificate.
#[derive(Debug)]
pub(super) struct RustCryptoSignatureVerifier;

impl SignatureVerifier for RustCryptoSignatureVerifier {
    fn verify_signature(
        &self,
        cert_der: &[u8],
        data: &[u8],
        signature: &[u8],
        scheme: SignatureScheme,
    ) -> Result<(), String> {
        let cert = Certificate::from_der(cert_der)
            .map_err(|e| format!("Invalid certificate: {}", e))?;
        let spki = &cert.tbs_certificate.subject_public_key_info;
        let public_key = spki
            .subject_public_key
            .as_bytes()
            .ok_or_else(|| "Invalid public key encoding".to_string())?;

        match scheme {
            SignatureScheme::ECDSA_SECP256R1_SHA256 => {
                expect_key_algorithm(spki, OID_EC_PUBLIC_KEY, Some(OID_SECP256R1))?;
                let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(public_key)
                    .map_err(|e| format!("Invalid P-256 public key: {}", e))?;
                let sig = p256::ecdsa::Signature::from_der(signature)
                    .map_err(|e| format!("Invalid ECDSA signature: {}", e))?;
                key.verify(data, &sig)
                    .map_err(|_| "Signature verification failed".to_string())
            }
            SignatureScheme::ECDSA_SECP384R1_SHA384 => {
                expect_key_algorithm(spki, OID_EC_PUBLIC_KEY, Some(OID_SECP384R1))?;
                let key = p384::ecdsa::VerifyingKey::from_sec1_bytes(public_key)
                    .map_err(|e| format!("Invalid P-384 public key: {}", e))?;
                let sig = p384::ecdsa::Signature::from_der(signature)
                    .map_err(|e| format!("Invalid ECDSA signature: {}", e))?;
                key.verify(data, &sig)
                    .map_err(|_| "Signature verification failed".to_string())
            }
            SignatureScheme::RSA_PSS_RSAE_SHA256 => {
                let key = rsa_public_key(spki, public_key)?;
                let sig = rsa::pss::Signature::try_from(signature)
                    .map_err(|e| format!("Invalid RSA signature: {}", e))?;
                rsa::pss::VerifyingKey::<Sha256>::new(key)
                    .verify(data, &sig)
                    .map_err(|_| "Signature verification failed".to_string())
            }
            SignatureScheme::RSA_PSS_RSAE_SHA384 => {
                let key = rsa_public_key(spki, public_key)?;
                let sig = rsa::pss::Signature::try_from(signature)
                    .map_err(|e| format!("Invalid RSA signature: {}", e))?;
                rsa::pss::VerifyingKey::<Sha384>::new(key)
                    .verify(data, &sig)
                    .map_err(|_| "Signature verification failed".to_string())
            }
            SignatureScheme::RSA_PKCS1_SHA256 => {
                let key = rsa_public_key(spki, public_key)?;
                let sig = rsa::pkcs1v15::Signature::try_from(signature)
                    .map_err(|e| format!("Invalid RSA signature: {}", e))?;
                rsa::pkcs1v15::VerifyingKey::<Sha256>::new(key)
                    .verify(data, &sig)
                    .map_err(|_| "Signature verification failed".to_string())
            }
            SignatureScheme::RSA_PKCS1_SHA384 => {
                let key = rsa_public_key(spki, public_key)?;
                let sig = rsa::pkcs1v15::Signature::try_from(signature)
                    .map_err(|e| format!("Invalid RSA signature: {}", e))?;
                rsa::pkcs1v15::VerifyingKey::<Sha384>::new(key)
                    .verify(data, &sig)
                    .map_err(|_| "Signature verification failed".to_string())
            }
            _ => Err(format!("Unsupported signature scheme: {:?}", scheme)),
        }
    }
}

/// Check that the certificate key matches the algorithm (and for EC
/// keys, the curve) the signature scheme requires.
fn expect_key_algorithm(
    spki: &SubjectPublicKeyInfoOwned,
    algorithm_oid: &str,
    curve_oid: Option<&str>,
) -> Result<(), String> {
    if spki.algorithm.oid.to_string() != algorithm_oid {
        return Err(format!(
            "Certificate key algorithm {} does not match signature scheme",
            spki.algorithm.oid
        ));
    }
    if let Some(expected) = curve_oid {
        let params = spki
            .algorithm
            .parameters
            .as_ref()
            .ok_or_else(|| "Certificate key is missing curve parameters".to_string())?;
        let oid = params
            .decode_as::<ObjectIdentifier>()
            .map_err(|e| format!("Invalid curve parameters: {}", e))?;
        if oid.to_string() != expected {
            return Err(format!(
                "Certificate curve {} does not match signature scheme",
                oid
            ));
        }
    }
    Ok(())
}

fn rsa_public_key(
    spki: &SubjectPublicKeyInfoOwned,
    public_key: &[u8],
) -> Result<rsa::RsaPublicKey, String> {
    use rsa::pkcs1::DecodeRsaPublicKey;

    expect_key_algorithm(spki, OID_RSA_ENCRYPTION, None)?;
    rsa::RsaPublicKey::from_pkcs1_der(public_key)
        .map_err(|e| format!("Invalid RSA public key: {}", e))
}

pub(super) static KEY_PROVIDER: RustCryptoKeyProvider = RustCryptoKeyProvider;
pub(super) static SIGNATURE_VERIFIER: RustCryptoSignatureVerifier = RustCryptoSignatureVerifier;

#[cfg(test)]
mod tests {
    use super::*;
    use pkcs8::EncodePrivateKey;

    fn self_signed(alg: &'static rcgen::SignatureAlgorithm) -> rcgen::Certificate {
        let key_pair = rcgen::KeyPair::generate(alg).unwrap();
        let mut params = rcgen::CertificateParams::new(vec!["localhost".to_string()]);
        params.alg = alg;
        params.key_pair = Some(key_pair);
        rcgen::Certificate::from_params(params).unwrap()
    }

    #[test]
    fn p256_sign_and_verify_roundtrip() {
        let cert = self_signed(&rcgen::PKCS_ECDSA_P256_SHA256);
        let cert_der = cert.serialize_der().unwrap();

        let key = KEY_PROVIDER
            .load_private_key(&cert.serialize_private_key_der())
            .unwrap();
        assert_eq!(key.schemes(), &[SignatureScheme::ECDSA_SECP256R1_SHA256]);

        let mut sig = Buf::new();
        key.sign(SignatureScheme::ECDSA_SECP256R1_SHA256, b"signed content", &mut sig)
            .unwrap();

        SIGNATURE_VERIFIER
            .verify_signature(
                &cert_der,
                b"signed content",
                &sig,
                SignatureScheme::ECDSA_SECP256R1_SHA256,
            )
            .unwrap();
    }

    #[test]
    fn p384_sign_and_verify_roundtrip() {
        let cert = self_signed(&rcgen::PKCS_ECDSA_P384_SHA384);
        let cert_der = cert.serialize_der().unwrap();

        let key = KEY_PROVIDER
            .load_private_key(&cert.serialize_private_key_der())
            .unwrap();

        let mut sig = Buf::new();
        key.sign(SignatureScheme::ECDSA_SECP384R1_SHA384, b"signed content", &mut sig)
            .unwrap();

        SIGNATURE_VERIFIER
            .verify_signature(
                &cert_der,
                b"signed content",
                &sig,
                SignatureScheme::ECDSA_SECP384R1_SHA384,
            )
            .unwrap();
    }

    #[test]
    fn tampered_data_fails_verification() {
        let cert = self_signed(&rcgen::PKCS_ECDSA_P256_SHA256);
        let cert_der = cert.serialize_der().unwrap();
        let key = KEY_PROVIDER
            .load_private_key(&cert.serialize_private_key_der())
            .unwrap();

        let mut sig = Buf::new();
        key.sign(SignatureScheme::ECDSA_SECP256R1_SHA256, b"signed content", &mut sig)
            .unwrap();

        let result = SIGNATURE_VERIFIER.verify_signature(
            &cert_der,
            b"other content",
            &sig,
            SignatureScheme::ECDSA_SECP256R1_SHA256,
        );
        assert!(result.is_err());
    }

    #[test]
    fn scheme_must_match_certificate_key() {
        let cert = self_signed(&rcgen::PKCS_ECDSA_P256_SHA256);
        let cert_der = cert.serialize_der().unwrap();
        let key = KEY_PROVIDER
            .load_private_key(&cert.serialize_private_key_der())
            .unwrap();

        let mut sig = Buf::new();
        key.sign(SignatureScheme::ECDSA_SECP256R1_SHA256, b"signed content", &mut sig)
            .unwrap();

        // P-256 certificate cannot satisfy a P-384 or RSA scheme.
        for scheme in [
            SignatureScheme::ECDSA_SECP384R1_SHA384,
            SignatureScheme::RSA_PSS_RSAE_SHA256,
        ] {
            let result =
                SIGNATURE_VERIFIER.verify_signature(&cert_der, b"signed content", &sig, scheme);
            assert!(result.is_err(), "{:?} should be rejected", scheme);
        }
    }

    #[test]
    fn signing_rejects_foreign_scheme() {
        let cert = self_signed(&rcgen::PKCS_ECDSA_P256_SHA256);
        let key = KEY_PROVIDER
            .load_private_key(&cert.serialize_private_key_der())
            .unwrap();

        let mut sig = Buf::new();
        let result = key.sign(SignatureScheme::ECDSA_SECP384R1_SHA384, b"data", &mut sig);
        assert!(result.is_err());
    }

    #[test]
    fn pem_private_key_loads() {
        let cert = self_signed(&rcgen::PKCS_ECDSA_P256_SHA256);
        let pem = cert.serialize_private_key_pem();

        let key = KEY_PROVIDER.load_private_key(pem.as_bytes()).unwrap();
        assert_eq!(key.schemes(), &[SignatureScheme::ECDSA_SECP256R1_SHA256]);
    }

    #[test]
    fn rsa_pss_sign_and_verify() {
        let private = rsa::RsaPrivateKey::new(&mut OsRng, 1024).unwrap();
        let key_der = private.to_pkcs8_der().unwrap();

        let key = KEY_PROVIDER.load_private_key(key_der.as_bytes()).unwrap();
        assert!(key
            .schemes()
            .contains(&SignatureScheme::RSA_PSS_RSAE_SHA256));

        let mut sig = Buf::new();
        key.sign(SignatureScheme::RSA_PSS_RSAE_SHA256, b"signed content", &mut sig)
            .unwrap();

        let verifying = rsa::pss::VerifyingKey::<Sha256>::new(rsa::RsaPublicKey::from(&private));
        let signature = rsa::pss::Signature::try_from(&sig[..]).unwrap();
        verifying.verify(b"signed content", &signature).unwrap();
    }

    #[test]
    fn rsa_pkcs1_sign_and_verify() {
        let private = rsa::RsaPrivateKey::new(&mut OsRng, 1024).unwrap();
        let key_der = private.to_pkcs8_der().unwrap();
        let key = KEY_PROVIDER.load_private_key(key_der.as_bytes()).unwrap();

        let mut sig = Buf::new();
        key.sign(SignatureScheme::RSA_PKCS1_SHA256, b"signed content", &mut sig)
            .unwrap();

        let verifying =
            rsa::pkcs1v15::VerifyingKey::<Sha256>::new(rsa::RsaPublicKey::from(&private));
        let signature = rsa::pkcs1v15::Signature::try_from(&sig[..]).unwrap();
        verifying.verify(b"signed content", &signature).unwrap();
    }
}
