//! Local identities and the certificate validation seam.
//!
//! The engine never walks certificate paths itself. A peer chain (and any
//! stapled revocation evidence) goes to a [`CertificateValidator`], which
//! accepts or rejects; the engine only decides *when* to ask. This module
//! also carries helpers to generate self-signed identities and compute
//! fingerprints for pinning.

use rcgen::{
    Certificate as RcgenCertificate, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair,
    PKCS_ECDSA_P256_SHA256,
};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::Error;

/// Decides whether a peer certificate chain is acceptable.
///
/// `chain` is leaf first, each element DER encoded. `stapled` carries the
/// OCSP response when one arrived (or was promised and then withheld, in
/// which case it is `None` and the validator decides how strict to be).
///
/// Errors come back as strings the same way crypto providers report
/// failures; the engine wraps them into a bad_certificate alert.
pub trait CertificateValidator: fmt::Debug + Send + Sync {
    fn verify_chain(&self, chain: &[&[u8]], stapled: Option<&[u8]>) -> Result<(), String>;
}

/// A local certificate chain and its private key, both DER.
///
/// The chain is leaf first. For self-signed identities it has exactly one
/// element.
#[derive(Clone)]
pub struct Identity {
    /// Certificate chain in DER format, leaf first.
    pub certificates: Vec<Vec<u8>>,
    /// Private key in DER format.
    pub private_key: Vec<u8>,
}

impl Identity {
    /// Generate a self-signed ECDSA P-256 identity.
    ///
    /// Good enough wherever the peer verifies by fingerprint pinning rather
    /// than a trust path.
    pub fn self_signed(common_name: &str) -> Result<Identity, Error> {
        let key_pair = KeyPair::generate(&PKCS_ECDSA_P256_SHA256)
            .map_err(|e| Error::Crypto(format!("key generation: {e}")))?;

        let mut params = CertificateParams::new(vec![common_name.to_string()]);

        let mut distinguished_name = DistinguishedName::new();
        distinguished_name.push(DnType::CommonName, common_name.to_string());
        params.distinguished_name = distinguished_name;

        params.is_ca = IsCa::NoCa;
        params.key_pair = Some(key_pair);

        let not_before = time::OffsetDateTime::now_utc();
        params.not_before = not_before;
        params.not_after = not_before + time::Duration::days(365);

        let cert = RcgenCertificate::from_params(params)
            .map_err(|e| Error::Crypto(format!("certificate generation: {e}")))?;

        let cert_der = cert
            .serialize_der()
            .map_err(|e| Error::Crypto(format!("certificate serialization: {e}")))?;
        let key_der = cert.serialize_private_key_der();

        Ok(Identity {
            certificates: vec![cert_der],
            private_key: key_der,
        })
    }

    /// SHA-256 fingerprint of the leaf certificate.
    pub fn fingerprint(&self) -> [u8; 32] {
        calculate_fingerprint(&self.certificates[0])
    }

    /// The fingerprint as uppercase hex byte pairs separated by colons,
    /// for example "AF:12:F6:...".
    pub fn fingerprint_str(&self) -> String {
        format_fingerprint(&self.fingerprint())
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("certificates", &self.certificates.len())
            .field("private_key", &self.private_key.len())
            .finish()
    }
}

/// SHA-256 fingerprint of a DER-encoded certificate.
pub fn calculate_fingerprint(cert_der: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(cert_der);
    hasher.finalize().into()
}

/// Format a fingerprint as a colon-separated hex string.
pub fn format_fingerprint(fingerprint: &[u8]) -> String {
    fingerprint
        .iter()
        .map(|byte| format!("{:02X}", byte))
        .collect::<Vec<String>>()
        .join(":")
}

/// Validator that accepts a chain when the leaf's SHA-256 fingerprint is
/// on an allow list.
///
/// This is the fingerprint-exchange model: both sides learn the expected
/// fingerprint out of band and no trust path is walked. Stapled evidence
/// is ignored, pinning supersedes revocation.
#[derive(Debug, Default)]
pub struct PinnedCertificateValidator {
    fingerprints: Vec<[u8; 32]>,
}

impl PinnedCertificateValidator {
    pub fn new(fingerprints: Vec<[u8; 32]>) -> Self {
        PinnedCertificateValidator { fingerprints }
    }

    /// Pin the leaf of the given identity.
    pub fn allow(&mut self, identity: &Identity) {
        self.fingerprints.push(identity.fingerprint());
    }
}

impl CertificateValidator for PinnedCertificateValidator {
    fn verify_chain(&self, chain: &[&[u8]], _stapled: Option<&[u8]>) -> Result<(), String> {
        let leaf = chain.first().ok_or("empty certificate chain")?;
        let fingerprint = calculate_fingerprint(leaf);

        if self.fingerprints.contains(&fingerprint) {
            Ok(())
        } else {
            Err(format!(
                "fingerprint {} is not pinned",
                format_fingerprint(&fingerprint)
            ))
        }
    }
}
