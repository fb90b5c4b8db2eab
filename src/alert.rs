//! Alert codes and the directional close state they drive.

use core::fmt;

use nom::number::complete::be_u8;
use nom::IResult;

// ==== Alert level ====

/// Severity byte of an alert record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Warning,
    Fatal,
    Unknown(u8),
}

impl AlertLevel {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => AlertLevel::Warning,
            2 => AlertLevel::Fatal,
            _ => AlertLevel::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            AlertLevel::Warning => 1,
            AlertLevel::Fatal => 2,
            AlertLevel::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, value) = be_u8(input)?;
        Ok((input, AlertLevel::from_u8(value)))
    }
}

// ==== Alert description ====

/// Alert description codes (RFC 8446 Section 6 plus legacy codes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alert {
    CloseNotify,
    UnexpectedMessage,
    BadRecordMac,
    DecryptionFailed,
    RecordOverflow,
    DecompressionFailure,
    HandshakeFailure,
    NoCertificate,
    BadCertificate,
    UnsupportedCertificate,
    CertificateRevoked,
    CertificateExpired,
    CertificateUnknown,
    IllegalParameter,
    UnknownCa,
    AccessDenied,
    DecodeError,
    DecryptError,
    ExportRestriction,
    ProtocolVersion,
    InsufficientSecurity,
    InternalError,
    InappropriateFallback,
    UserCanceled,
    NoRenegotiation,
    MissingExtension,
    UnsupportedExtension,
    CertificateUnobtainable,
    UnrecognizedName,
    BadCertificateStatusResponse,
    BadCertificateHashValue,
    UnknownPskIdentity,
    CertificateRequired,
    NoApplicationProtocol,
    Unknown(u8),
}

impl Alert {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Alert::CloseNotify,
            10 => Alert::UnexpectedMessage,
            20 => Alert::BadRecordMac,
            21 => Alert::DecryptionFailed,
            22 => Alert::RecordOverflow,
            30 => Alert::DecompressionFailure,
            40 => Alert::HandshakeFailure,
            41 => Alert::NoCertificate,
            42 => Alert::BadCertificate,
            43 => Alert::UnsupportedCertificate,
            44 => Alert::CertificateRevoked,
            45 => Alert::CertificateExpired,
            46 => Alert::CertificateUnknown,
            47 => Alert::IllegalParameter,
            48 => Alert::UnknownCa,
            49 => Alert::AccessDenied,
            50 => Alert::DecodeError,
            51 => Alert::DecryptError,
            60 => Alert::ExportRestriction,
            70 => Alert::ProtocolVersion,
            71 => Alert::InsufficientSecurity,
            80 => Alert::InternalError,
            86 => Alert::InappropriateFallback,
            90 => Alert::UserCanceled,
            100 => Alert::NoRenegotiation,
            109 => Alert::MissingExtension,
            110 => Alert::UnsupportedExtension,
            111 => Alert::CertificateUnobtainable,
            112 => Alert::UnrecognizedName,
            113 => Alert::BadCertificateStatusResponse,
            114 => Alert::BadCertificateHashValue,
            115 => Alert::UnknownPskIdentity,
            116 => Alert::CertificateRequired,
            120 => Alert::NoApplicationProtocol,
            _ => Alert::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            Alert::CloseNotify => 0,
            Alert::UnexpectedMessage => 10,
            Alert::BadRecordMac => 20,
            Alert::DecryptionFailed => 21,
            Alert::RecordOverflow => 22,
            Alert::DecompressionFailure => 30,
            Alert::HandshakeFailure => 40,
            Alert::NoCertificate => 41,
            Alert::BadCertificate => 42,
            Alert::UnsupportedCertificate => 43,
            Alert::CertificateRevoked => 44,
            Alert::CertificateExpired => 45,
            Alert::CertificateUnknown => 46,
            Alert::IllegalParameter => 47,
            Alert::UnknownCa => 48,
            Alert::AccessDenied => 49,
            Alert::DecodeError => 50,
            Alert::DecryptError => 51,
            Alert::ExportRestriction => 60,
            Alert::ProtocolVersion => 70,
            Alert::InsufficientSecurity => 71,
            Alert::InternalError => 80,
            Alert::InappropriateFallback => 86,
            Alert::UserCanceled => 90,
            Alert::NoRenegotiation => 100,
            Alert::MissingExtension => 109,
            Alert::UnsupportedExtension => 110,
            Alert::CertificateUnobtainable => 111,
            Alert::UnrecognizedName => 112,
            Alert::BadCertificateStatusResponse => 113,
            Alert::BadCertificateHashValue => 114,
            Alert::UnknownPskIdentity => 115,
            Alert::CertificateRequired => 116,
            Alert::NoApplicationProtocol => 120,
            Alert::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, value) = be_u8(input)?;
        Ok((input, Alert::from_u8(value)))
    }

    /// Whether this description only makes sense while handshaking.
    ///
    /// Receiving one of these after the handshake completed is itself a
    /// protocol violation.
    pub fn handshake_only(&self) -> bool {
        matches!(
            self,
            Alert::DecompressionFailure
                | Alert::HandshakeFailure
                | Alert::NoCertificate
                | Alert::BadCertificate
                | Alert::UnsupportedCertificate
                | Alert::CertificateRevoked
                | Alert::CertificateExpired
                | Alert::CertificateUnknown
                | Alert::IllegalParameter
                | Alert::UnknownCa
                | Alert::AccessDenied
                | Alert::DecodeError
                | Alert::DecryptError
                | Alert::ExportRestriction
                | Alert::ProtocolVersion
                | Alert::InsufficientSecurity
                | Alert::NoRenegotiation
                | Alert::MissingExtension
                | Alert::UnsupportedExtension
                | Alert::CertificateUnobtainable
                | Alert::UnrecognizedName
                | Alert::BadCertificateStatusResponse
                | Alert::BadCertificateHashValue
                | Alert::UnknownPskIdentity
                | Alert::CertificateRequired
                | Alert::NoApplicationProtocol
        )
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Alert::CloseNotify => "close_notify",
            Alert::UnexpectedMessage => "unexpected_message",
            Alert::BadRecordMac => "bad_record_mac",
            Alert::DecryptionFailed => "decryption_failed",
            Alert::RecordOverflow => "record_overflow",
            Alert::DecompressionFailure => "decompression_failure",
            Alert::HandshakeFailure => "handshake_failure",
            Alert::NoCertificate => "no_certificate",
            Alert::BadCertificate => "bad_certificate",
            Alert::UnsupportedCertificate => "unsupported_certificate",
            Alert::CertificateRevoked => "certificate_revoked",
            Alert::CertificateExpired => "certificate_expired",
            Alert::CertificateUnknown => "certificate_unknown",
            Alert::IllegalParameter => "illegal_parameter",
            Alert::UnknownCa => "unknown_ca",
            Alert::AccessDenied => "access_denied",
            Alert::DecodeError => "decode_error",
            Alert::DecryptError => "decrypt_error",
            Alert::ExportRestriction => "export_restriction",
            Alert::ProtocolVersion => "protocol_version",
            Alert::InsufficientSecurity => "insufficient_security",
            Alert::InternalError => "internal_error",
            Alert::InappropriateFallback => "inappropriate_fallback",
            Alert::UserCanceled => "user_canceled",
            Alert::NoRenegotiation => "no_renegotiation",
            Alert::MissingExtension => "missing_extension",
            Alert::UnsupportedExtension => "unsupported_extension",
            Alert::CertificateUnobtainable => "certificate_unobtainable",
            Alert::UnrecognizedName => "unrecognized_name",
            Alert::BadCertificateStatusResponse => "bad_certificate_status_response",
            Alert::BadCertificateHashValue => "bad_certificate_hash_value",
            Alert::UnknownPskIdentity => "unknown_psk_identity",
            Alert::CertificateRequired => "certificate_required",
            Alert::NoApplicationProtocol => "no_application_protocol",
            Alert::Unknown(value) => return write!(f, "unknown_alert({})", value),
        };
        write!(f, "{}", name)
    }
}

// ==== Alert record ====

/// The two byte alert record: level plus description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertMessage {
    pub level: AlertLevel,
    pub description: Alert,
}

impl AlertMessage {
    pub const WIRE_SIZE: usize = 2;

    pub fn fatal(description: Alert) -> Self {
        AlertMessage {
            level: AlertLevel::Fatal,
            description,
        }
    }

    pub fn warning(description: Alert) -> Self {
        AlertMessage {
            level: AlertLevel::Warning,
            description,
        }
    }

    pub fn close_notify() -> Self {
        Self::warning(Alert::CloseNotify)
    }

    /// close_notify is a closure signal at either level. Everything else is
    /// fatal when flagged fatal, and unknown levels are treated as fatal.
    pub fn is_fatal(&self) -> bool {
        self.description != Alert::CloseNotify && self.level != AlertLevel::Warning
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], AlertMessage> {
        let (input, level) = AlertLevel::parse(input)?;
        let (input, description) = Alert::parse(input)?;
        Ok((input, AlertMessage { level, description }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(self.level.as_u8());
        output.push(self.description.as_u8());
    }
}

// ==== Close state ====

/// Directional shutdown tracking.
///
/// Input closes when the peer's close_notify arrives, output when ours is
/// queued. A fatal alert in either direction closes both at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CloseState {
    #[default]
    Open,
    InputClosed,
    OutputClosed,
    Closed,
}

impl CloseState {
    pub fn close_input(self) -> CloseState {
        match self {
            CloseState::Open | CloseState::InputClosed => CloseState::InputClosed,
            CloseState::OutputClosed | CloseState::Closed => CloseState::Closed,
        }
    }

    pub fn close_output(self) -> CloseState {
        match self {
            CloseState::Open | CloseState::OutputClosed => CloseState::OutputClosed,
            CloseState::InputClosed | CloseState::Closed => CloseState::Closed,
        }
    }

    pub fn is_input_closed(&self) -> bool {
        matches!(self, CloseState::InputClosed | CloseState::Closed)
    }

    pub fn is_output_closed(&self) -> bool {
        matches!(self, CloseState::OutputClosed | CloseState::Closed)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, CloseState::Closed)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn code_roundtrip() {
        for value in 0..=255u8 {
            let alert = Alert::from_u8(value);
            assert_eq!(alert.as_u8(), value);
        }
    }

    #[test]
    fn record_roundtrip() {
        const MESSAGE: &[u8] = &[
            0x02, // fatal
            0x28, // handshake_failure
        ];

        let (rest, alert) = AlertMessage::parse(MESSAGE).unwrap();
        assert!(rest.is_empty());
        assert_eq!(alert, AlertMessage::fatal(Alert::HandshakeFailure));
        assert!(alert.is_fatal());

        let mut serialized = Vec::new();
        alert.serialize(&mut serialized);
        assert_eq!(serialized, MESSAGE);
    }

    #[test]
    fn close_notify_is_never_fatal() {
        let mut serialized = Vec::new();
        AlertMessage::fatal(Alert::CloseNotify).serialize(&mut serialized);

        let (_, parsed) = AlertMessage::parse(&serialized).unwrap();
        assert!(!parsed.is_fatal());
    }

    #[test]
    fn unknown_level_is_fatal() {
        let (_, alert) = AlertMessage::parse(&[0x03, 0x28]).unwrap();
        assert!(alert.is_fatal());
    }

    #[test]
    fn handshake_only_flags() {
        assert!(Alert::NoCertificate.handshake_only());
        assert!(Alert::HandshakeFailure.handshake_only());
        assert!(!Alert::CloseNotify.handshake_only());
        assert!(!Alert::BadRecordMac.handshake_only());
        assert!(!Alert::InternalError.handshake_only());
    }

    #[test]
    fn close_state_transitions() {
        let state = CloseState::Open;
        let state = state.close_input();
        assert_eq!(state, CloseState::InputClosed);
        assert!(state.is_input_closed());
        assert!(!state.is_output_closed());

        let state = state.close_output();
        assert_eq!(state, CloseState::Closed);
        assert!(state.is_closed());

        // the other order lands in the same place
        let state = CloseState::Open.close_output().close_input();
        assert_eq!(state, CloseState::Closed);
    }
}
