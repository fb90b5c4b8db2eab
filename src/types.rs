//! Shared protocol types used across the handshake engine.
//!
//! These represent negotiated identifiers (versions, cipher suites, named
//! groups, signature schemes) plus the small enums that parameterize a
//! handshake context.

use core::fmt;

use nom::number::complete::{be_u16, be_u8};
use nom::IResult;
use tinyvec::ArrayVec;

pub type VersionVec = ArrayVec<[ProtocolVersion; 8]>;
pub type CipherSuiteVec = ArrayVec<[CipherSuite; 32]>;
pub type NamedGroupVec = ArrayVec<[NamedGroup; 16]>;
pub type SignatureSchemeVec = ArrayVec<[SignatureScheme; 16]>;

// ============================================================================
// Connection Role
// ============================================================================

/// Which side of the handshake this context plays.
///
/// Fixed at construction for the lifetime of the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The initiator: sends the first hello, checks downgrade sentinels.
    Client,
    /// The responder: selects version/suite, may demand a cookie round trip.
    Server,
}

impl Role {
    /// The opposite role.
    pub fn peer(&self) -> Role {
        match self {
            Role::Client => Role::Server,
            Role::Server => Role::Client,
        }
    }

    pub fn is_client(&self) -> bool {
        matches!(self, Role::Client)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Client => write!(f, "client"),
            Role::Server => write!(f, "server"),
        }
    }
}

// ============================================================================
// Protocol Version
// ============================================================================

/// TLS and DTLS protocol versions.
///
/// DTLS wire ids are one's-complemented, so the raw u16 does not order
/// across families. Downgrade checks and "maximum supported vs negotiated"
/// comparisons go through [`ProtocolVersion::ordinal`], which is monotone
/// in protocol capability for both families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    Tls1_0,
    Tls1_1,
    Tls1_2,
    Tls1_3,
    Dtls1_0,
    Dtls1_2,
    Dtls1_3,
    /// Unknown or unsupported version.
    Unknown(u16),
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl ProtocolVersion {
    /// Convert a wire format u16 value to a `ProtocolVersion`.
    pub fn from_u16(value: u16) -> Self {
        match value {
            0x0301 => ProtocolVersion::Tls1_0,
            0x0302 => ProtocolVersion::Tls1_1,
            0x0303 => ProtocolVersion::Tls1_2,
            0x0304 => ProtocolVersion::Tls1_3,
            0xfeff => ProtocolVersion::Dtls1_0,
            0xfefd => ProtocolVersion::Dtls1_2,
            0xfefc => ProtocolVersion::Dtls1_3,
            _ => ProtocolVersion::Unknown(value),
        }
    }

    /// Convert this `ProtocolVersion` to its wire format u16 value.
    pub fn as_u16(&self) -> u16 {
        match self {
            ProtocolVersion::Tls1_0 => 0x0301,
            ProtocolVersion::Tls1_1 => 0x0302,
            ProtocolVersion::Tls1_2 => 0x0303,
            ProtocolVersion::Tls1_3 => 0x0304,
            ProtocolVersion::Dtls1_0 => 0xfeff,
            ProtocolVersion::Dtls1_2 => 0xfefd,
            ProtocolVersion::Dtls1_3 => 0xfefc,
            ProtocolVersion::Unknown(value) => *value,
        }
    }

    /// Parse a `ProtocolVersion` from wire format.
    pub fn parse(input: &[u8]) -> IResult<&[u8], ProtocolVersion> {
        let (input, value) = be_u16(input)?;
        Ok((input, ProtocolVersion::from_u16(value)))
    }

    /// Capability rank, comparable across the TLS and DTLS families.
    ///
    /// DTLS 1.0 ranks with TLS 1.1 (they share the record spec), DTLS 1.2
    /// with TLS 1.2, DTLS 1.3 with TLS 1.3. `Unknown` ranks below all.
    pub fn ordinal(&self) -> u8 {
        match self {
            ProtocolVersion::Tls1_0 => 10,
            ProtocolVersion::Tls1_1 | ProtocolVersion::Dtls1_0 => 11,
            ProtocolVersion::Tls1_2 | ProtocolVersion::Dtls1_2 => 12,
            ProtocolVersion::Tls1_3 | ProtocolVersion::Dtls1_3 => 13,
            ProtocolVersion::Unknown(_) => 0,
        }
    }

    pub fn is_dtls(&self) -> bool {
        matches!(
            self,
            ProtocolVersion::Dtls1_0 | ProtocolVersion::Dtls1_2 | ProtocolVersion::Dtls1_3
        )
    }

    /// Whether this version uses the HKDF-based 1.3 secret schedule.
    pub fn uses_tls13_schedule(&self) -> bool {
        self.ordinal() >= 13
    }

    /// Whether this version uses the PRF-based legacy secret schedule.
    pub fn uses_legacy_schedule(&self) -> bool {
        !self.uses_tls13_schedule() && !matches!(self, ProtocolVersion::Unknown(_))
    }

    /// True when `self` is a strictly higher capability than `other`.
    pub fn beats(&self, other: ProtocolVersion) -> bool {
        self.ordinal() > other.ordinal()
    }

    /// All versions this implementation can negotiate, in preference order.
    pub const fn supported() -> &'static [ProtocolVersion; 5] {
        &[
            ProtocolVersion::Tls1_3,
            ProtocolVersion::Dtls1_3,
            ProtocolVersion::Tls1_2,
            ProtocolVersion::Dtls1_2,
            ProtocolVersion::Tls1_1,
        ]
    }

    pub fn is_supported(&self) -> bool {
        Self::supported().contains(self)
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolVersion::Tls1_0 => write!(f, "TLS 1.0"),
            ProtocolVersion::Tls1_1 => write!(f, "TLS 1.1"),
            ProtocolVersion::Tls1_2 => write!(f, "TLS 1.2"),
            ProtocolVersion::Tls1_3 => write!(f, "TLS 1.3"),
            ProtocolVersion::Dtls1_0 => write!(f, "DTLS 1.0"),
            ProtocolVersion::Dtls1_2 => write!(f, "DTLS 1.2"),
            ProtocolVersion::Dtls1_3 => write!(f, "DTLS 1.3"),
            ProtocolVersion::Unknown(v) => write!(f, "Unknown(0x{:04x})", v),
        }
    }
}

// ============================================================================
// Key Exchange Families
// ============================================================================

/// Key-exchange algorithm family.
///
/// Possessions and credentials are tagged with one of these so a handshake
/// step can ask "do I hold material of family X" with an exhaustive match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KxFamily {
    /// Ephemeral elliptic-curve Diffie-Hellman (incl. X25519).
    Ecdhe,
    /// Ephemeral finite-field Diffie-Hellman.
    Ffdhe,
    /// RSA key transport / RSA certificate keys.
    Rsa,
}

impl fmt::Display for KxFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KxFamily::Ecdhe => write!(f, "ECDHE"),
            KxFamily::Ffdhe => write!(f, "FFDHE"),
            KxFamily::Rsa => write!(f, "RSA"),
        }
    }
}

// ============================================================================
// Named Groups (Key Exchange)
// ============================================================================

/// Key exchange groups (RFC 8422, RFC 7919, RFC 8446).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedGroup {
    /// secp256r1 / P-256.
    Secp256r1,
    /// secp384r1 / P-384.
    Secp384r1,
    /// secp521r1 / P-521.
    Secp521r1,
    /// X25519 (Curve25519).
    X25519,
    /// X448 (Curve448).
    X448,
    /// ffdhe2048 (RFC 7919).
    Ffdhe2048,
    /// ffdhe3072 (RFC 7919).
    Ffdhe3072,
    /// ffdhe4096 (RFC 7919).
    Ffdhe4096,
    /// Unknown or unsupported group.
    Unknown(u16),
}

impl Default for NamedGroup {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl NamedGroup {
    /// Convert a wire format u16 value to a `NamedGroup`.
    pub fn from_u16(value: u16) -> Self {
        match value {
            23 => NamedGroup::Secp256r1,
            24 => NamedGroup::Secp384r1,
            25 => NamedGroup::Secp521r1,
            29 => NamedGroup::X25519,
            30 => NamedGroup::X448,
            256 => NamedGroup::Ffdhe2048,
            257 => NamedGroup::Ffdhe3072,
            258 => NamedGroup::Ffdhe4096,
            _ => NamedGroup::Unknown(value),
        }
    }

    /// Convert this `NamedGroup` to its wire format u16 value.
    pub fn as_u16(&self) -> u16 {
        match self {
            NamedGroup::Secp256r1 => 23,
            NamedGroup::Secp384r1 => 24,
            NamedGroup::Secp521r1 => 25,
            NamedGroup::X25519 => 29,
            NamedGroup::X448 => 30,
            NamedGroup::Ffdhe2048 => 256,
            NamedGroup::Ffdhe3072 => 257,
            NamedGroup::Ffdhe4096 => 258,
            NamedGroup::Unknown(value) => *value,
        }
    }

    /// Parse a `NamedGroup` from wire format.
    pub fn parse(input: &[u8]) -> IResult<&[u8], NamedGroup> {
        let (input, value) = be_u16(input)?;
        Ok((input, NamedGroup::from_u16(value)))
    }

    /// The key-exchange family this group belongs to. `None` for unknown.
    pub fn family(&self) -> Option<KxFamily> {
        match self {
            NamedGroup::Secp256r1
            | NamedGroup::Secp384r1
            | NamedGroup::Secp521r1
            | NamedGroup::X25519
            | NamedGroup::X448 => Some(KxFamily::Ecdhe),
            NamedGroup::Ffdhe2048 | NamedGroup::Ffdhe3072 | NamedGroup::Ffdhe4096 => {
                Some(KxFamily::Ffdhe)
            }
            NamedGroup::Unknown(_) => None,
        }
    }

    /// Returns true if this named group is supported by this implementation.
    pub fn is_supported(&self) -> bool {
        Self::supported().contains(self)
    }

    /// Supported named groups in preference order.
    pub const fn supported() -> &'static [NamedGroup; 4] {
        &[
            NamedGroup::X25519,
            NamedGroup::Secp256r1,
            NamedGroup::Secp384r1,
            NamedGroup::Ffdhe2048,
        ]
    }
}

// ============================================================================
// Hash Algorithms
// ============================================================================

/// Hash algorithms used for transcripts, PRF/HKDF and signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum HashAlgorithm {
    /// No hash.
    None,
    /// MD5 (legacy PRF only).
    MD5,
    /// SHA-1 (legacy PRF only).
    SHA1,
    /// SHA-256.
    SHA256,
    /// SHA-384.
    SHA384,
    /// SHA-512.
    SHA512,
    /// Unknown or unsupported hash algorithm.
    Unknown(u8),
}

impl Default for HashAlgorithm {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl HashAlgorithm {
    /// Convert a wire format u8 value to a `HashAlgorithm`.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => HashAlgorithm::None,
            1 => HashAlgorithm::MD5,
            2 => HashAlgorithm::SHA1,
            4 => HashAlgorithm::SHA256,
            5 => HashAlgorithm::SHA384,
            6 => HashAlgorithm::SHA512,
            _ => HashAlgorithm::Unknown(value),
        }
    }

    /// Convert this `HashAlgorithm` to its wire format u8 value.
    pub fn as_u8(&self) -> u8 {
        match self {
            HashAlgorithm::None => 0,
            HashAlgorithm::MD5 => 1,
            HashAlgorithm::SHA1 => 2,
            HashAlgorithm::SHA256 => 4,
            HashAlgorithm::SHA384 => 5,
            HashAlgorithm::SHA512 => 6,
            HashAlgorithm::Unknown(value) => *value,
        }
    }

    /// The digest output length in bytes.
    pub fn output_len(&self) -> usize {
        match self {
            HashAlgorithm::None => 0,
            HashAlgorithm::MD5 => 16,
            HashAlgorithm::SHA1 => 20,
            HashAlgorithm::SHA256 => 32,
            HashAlgorithm::SHA384 => 48,
            HashAlgorithm::SHA512 => 64,
            HashAlgorithm::Unknown(_) => 0,
        }
    }
}

// ============================================================================
// Cipher Suites
// ============================================================================

/// Cipher suites across the 1.3 and legacy families.
///
/// 1.3-style suites (0x13xx) name only the AEAD and the schedule hash; the
/// key exchange comes from the key_share extension. Legacy suites bind the
/// key exchange and the certificate signature family as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum CipherSuite {
    /// TLS_AES_128_GCM_SHA256 (1.3).
    AES_128_GCM_SHA256,
    /// TLS_AES_256_GCM_SHA384 (1.3).
    AES_256_GCM_SHA384,
    /// TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256 (legacy).
    ECDHE_ECDSA_AES128_GCM_SHA256,
    /// TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384 (legacy).
    ECDHE_ECDSA_AES256_GCM_SHA384,
    /// TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256 (legacy).
    ECDHE_RSA_AES128_GCM_SHA256,
    /// TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384 (legacy).
    ECDHE_RSA_AES256_GCM_SHA384,
    /// Unknown or unsupported cipher suite.
    Unknown(u16),
}

impl Default for CipherSuite {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl CipherSuite {
    /// Convert a wire format u16 value to a `CipherSuite`.
    pub fn from_u16(value: u16) -> Self {
        match value {
            0x1301 => CipherSuite::AES_128_GCM_SHA256,
            0x1302 => CipherSuite::AES_256_GCM_SHA384,
            0xc02b => CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256,
            0xc02c => CipherSuite::ECDHE_ECDSA_AES256_GCM_SHA384,
            0xc02f => CipherSuite::ECDHE_RSA_AES128_GCM_SHA256,
            0xc030 => CipherSuite::ECDHE_RSA_AES256_GCM_SHA384,
            _ => CipherSuite::Unknown(value),
        }
    }

    /// Convert this `CipherSuite` to its wire format u16 value.
    pub fn as_u16(&self) -> u16 {
        match self {
            CipherSuite::AES_128_GCM_SHA256 => 0x1301,
            CipherSuite::AES_256_GCM_SHA384 => 0x1302,
            CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256 => 0xc02b,
            CipherSuite::ECDHE_ECDSA_AES256_GCM_SHA384 => 0xc02c,
            CipherSuite::ECDHE_RSA_AES128_GCM_SHA256 => 0xc02f,
            CipherSuite::ECDHE_RSA_AES256_GCM_SHA384 => 0xc030,
            CipherSuite::Unknown(value) => *value,
        }
    }

    /// Parse a `CipherSuite` from wire format.
    pub fn parse(input: &[u8]) -> IResult<&[u8], CipherSuite> {
        let (input, value) = be_u16(input)?;
        Ok((input, CipherSuite::from_u16(value)))
    }

    pub fn is_tls13(&self) -> bool {
        matches!(
            self,
            CipherSuite::AES_128_GCM_SHA256 | CipherSuite::AES_256_GCM_SHA384
        )
    }

    /// Whether this suite can be used with the given negotiated version.
    pub fn usable_with(&self, version: ProtocolVersion) -> bool {
        if version.uses_tls13_schedule() {
            self.is_tls13()
        } else {
            !self.is_tls13() && !matches!(self, CipherSuite::Unknown(_))
        }
    }

    /// The hash algorithm driving the secret schedule and transcript.
    pub fn hash_algorithm(&self) -> HashAlgorithm {
        match self {
            CipherSuite::AES_128_GCM_SHA256
            | CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256
            | CipherSuite::ECDHE_RSA_AES128_GCM_SHA256 => HashAlgorithm::SHA256,
            CipherSuite::AES_256_GCM_SHA384
            | CipherSuite::ECDHE_ECDSA_AES256_GCM_SHA384
            | CipherSuite::ECDHE_RSA_AES256_GCM_SHA384 => HashAlgorithm::SHA384,
            CipherSuite::Unknown(_) => HashAlgorithm::Unknown(0),
        }
    }

    /// AEAD key length in bytes.
    pub fn key_len(&self) -> usize {
        match self {
            CipherSuite::AES_128_GCM_SHA256
            | CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256
            | CipherSuite::ECDHE_RSA_AES128_GCM_SHA256 => 16,
            CipherSuite::AES_256_GCM_SHA384
            | CipherSuite::ECDHE_ECDSA_AES256_GCM_SHA384
            | CipherSuite::ECDHE_RSA_AES256_GCM_SHA384 => 32,
            CipherSuite::Unknown(_) => 0,
        }
    }

    /// The key-exchange family the suite commits to.
    ///
    /// 1.3 suites leave the family to the key_share negotiation; every
    /// family this implementation offers there is (EC)DHE.
    pub fn kx_family(&self) -> KxFamily {
        KxFamily::Ecdhe
    }

    /// Certificate signature family a legacy suite requires, if any.
    pub fn signature_family(&self) -> Option<KxFamily> {
        match self {
            CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256
            | CipherSuite::ECDHE_ECDSA_AES256_GCM_SHA384 => Some(KxFamily::Ecdhe),
            CipherSuite::ECDHE_RSA_AES128_GCM_SHA256 | CipherSuite::ECDHE_RSA_AES256_GCM_SHA384 => {
                Some(KxFamily::Rsa)
            }
            _ => None,
        }
    }

    /// Returns true if this cipher suite is supported by this implementation.
    pub fn is_supported(&self) -> bool {
        Self::supported().contains(self)
    }

    /// Supported cipher suites in preference order.
    pub const fn supported() -> &'static [CipherSuite; 6] {
        &[
            CipherSuite::AES_128_GCM_SHA256,
            CipherSuite::AES_256_GCM_SHA384,
            CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256,
            CipherSuite::ECDHE_RSA_AES128_GCM_SHA256,
            CipherSuite::ECDHE_ECDSA_AES256_GCM_SHA384,
            CipherSuite::ECDHE_RSA_AES256_GCM_SHA384,
        ]
    }
}

// ============================================================================
// Signature Schemes
// ============================================================================

/// Signature schemes (RFC 8446). Combines algorithm and hash in one id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum SignatureScheme {
    /// ECDSA with P-256 and SHA-256.
    ECDSA_SECP256R1_SHA256,
    /// ECDSA with P-384 and SHA-384.
    ECDSA_SECP384R1_SHA384,
    /// Ed25519.
    ED25519,
    /// RSA-PSS with SHA-256 (rsaEncryption OID).
    RSA_PSS_RSAE_SHA256,
    /// RSA-PSS with SHA-384 (rsaEncryption OID).
    RSA_PSS_RSAE_SHA384,
    /// RSA PKCS#1 v1.5 with SHA-256 (legacy).
    RSA_PKCS1_SHA256,
    /// RSA PKCS#1 v1.5 with SHA-384 (legacy).
    RSA_PKCS1_SHA384,
    /// Unknown or unsupported signature scheme.
    Unknown(u16),
}

impl Default for SignatureScheme {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl SignatureScheme {
    /// Convert a wire format u16 value to a `SignatureScheme`.
    pub fn from_u16(value: u16) -> Self {
        match value {
            0x0403 => SignatureScheme::ECDSA_SECP256R1_SHA256,
            0x0503 => SignatureScheme::ECDSA_SECP384R1_SHA384,
            0x0807 => SignatureScheme::ED25519,
            0x0804 => SignatureScheme::RSA_PSS_RSAE_SHA256,
            0x0805 => SignatureScheme::RSA_PSS_RSAE_SHA384,
            0x0401 => SignatureScheme::RSA_PKCS1_SHA256,
            0x0501 => SignatureScheme::RSA_PKCS1_SHA384,
            _ => SignatureScheme::Unknown(value),
        }
    }

    /// Convert this `SignatureScheme` to its wire format u16 value.
    pub fn as_u16(&self) -> u16 {
        match self {
            SignatureScheme::ECDSA_SECP256R1_SHA256 => 0x0403,
            SignatureScheme::ECDSA_SECP384R1_SHA384 => 0x0503,
            SignatureScheme::ED25519 => 0x0807,
            SignatureScheme::RSA_PSS_RSAE_SHA256 => 0x0804,
            SignatureScheme::RSA_PSS_RSAE_SHA384 => 0x0805,
            SignatureScheme::RSA_PKCS1_SHA256 => 0x0401,
            SignatureScheme::RSA_PKCS1_SHA384 => 0x0501,
            SignatureScheme::Unknown(value) => *value,
        }
    }

    /// Parse a `SignatureScheme` from wire format.
    pub fn parse(input: &[u8]) -> IResult<&[u8], SignatureScheme> {
        let (input, value) = be_u16(input)?;
        Ok((input, SignatureScheme::from_u16(value)))
    }

    /// The hash algorithm associated with this signature scheme.
    pub fn hash_algorithm(&self) -> HashAlgorithm {
        match self {
            SignatureScheme::ECDSA_SECP256R1_SHA256
            | SignatureScheme::RSA_PSS_RSAE_SHA256
            | SignatureScheme::RSA_PKCS1_SHA256 => HashAlgorithm::SHA256,
            SignatureScheme::ECDSA_SECP384R1_SHA384
            | SignatureScheme::RSA_PSS_RSAE_SHA384
            | SignatureScheme::RSA_PKCS1_SHA384 => HashAlgorithm::SHA384,
            // Ed25519 hashes internally.
            SignatureScheme::ED25519 => HashAlgorithm::None,
            SignatureScheme::Unknown(_) => HashAlgorithm::Unknown(0),
        }
    }

    /// Whether this scheme is acceptable under the negotiated version.
    ///
    /// PKCS#1 v1.5 signatures are not allowed in 1.3 CertificateVerify.
    pub fn usable_with(&self, version: ProtocolVersion) -> bool {
        if version.uses_tls13_schedule() {
            !matches!(
                self,
                SignatureScheme::RSA_PKCS1_SHA256 | SignatureScheme::RSA_PKCS1_SHA384
            )
        } else {
            true
        }
    }

    /// Supported signature schemes in preference order.
    pub const fn supported() -> &'static [SignatureScheme; 5] {
        &[
            SignatureScheme::ECDSA_SECP256R1_SHA256,
            SignatureScheme::ECDSA_SECP384R1_SHA384,
            SignatureScheme::RSA_PSS_RSAE_SHA256,
            SignatureScheme::RSA_PSS_RSAE_SHA384,
            SignatureScheme::RSA_PKCS1_SHA256,
        ]
    }
}

// ============================================================================
// Client Authentication
// ============================================================================

/// How the server treats client certificates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientAuth {
    /// Never ask for a client certificate.
    #[default]
    None,
    /// Ask, but complete the handshake without one.
    Requested,
    /// Ask, and fail the handshake without one.
    Required,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_ordinals_cross_family() {
        assert!(ProtocolVersion::Tls1_3.beats(ProtocolVersion::Tls1_2));
        assert!(ProtocolVersion::Dtls1_3.beats(ProtocolVersion::Dtls1_2));
        // DTLS 1.2 and TLS 1.2 rank the same despite inverted wire ids.
        assert_eq!(
            ProtocolVersion::Dtls1_2.ordinal(),
            ProtocolVersion::Tls1_2.ordinal()
        );
        assert!(ProtocolVersion::Dtls1_2.as_u16() > ProtocolVersion::Dtls1_3.as_u16());
        assert!(ProtocolVersion::Dtls1_3.beats(ProtocolVersion::Dtls1_2));
    }

    #[test]
    fn version_roundtrip() {
        for v in ProtocolVersion::supported() {
            assert_eq!(ProtocolVersion::from_u16(v.as_u16()), *v);
        }
    }

    #[test]
    fn suite_version_fit() {
        assert!(CipherSuite::AES_128_GCM_SHA256.usable_with(ProtocolVersion::Tls1_3));
        assert!(!CipherSuite::AES_128_GCM_SHA256.usable_with(ProtocolVersion::Tls1_2));
        assert!(CipherSuite::ECDHE_RSA_AES128_GCM_SHA256.usable_with(ProtocolVersion::Tls1_2));
        assert!(!CipherSuite::ECDHE_RSA_AES128_GCM_SHA256.usable_with(ProtocolVersion::Tls1_3));
    }

    #[test]
    fn group_families() {
        assert_eq!(NamedGroup::X25519.family(), Some(KxFamily::Ecdhe));
        assert_eq!(NamedGroup::Secp384r1.family(), Some(KxFamily::Ecdhe));
        assert_eq!(NamedGroup::Ffdhe2048.family(), Some(KxFamily::Ffdhe));
        assert_eq!(NamedGroup::Unknown(0x11ec).family(), None);
    }
}
