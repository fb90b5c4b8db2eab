use thiserror::Error;

use crate::alert::Alert;

/// Errors surfaced by the handshake engine.
///
/// Every fatal variant maps to an alert description via [`Error::alert`],
/// which the context queues for the peer before moving to `Aborted`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Malformed length or field, or a duplicate extension id.
    #[error("decode error: {0}")]
    Decode(&'static str),

    /// Input ended before its length prefixes were satisfied.
    #[error("incomplete message")]
    Incomplete,

    /// A message arrived outside its allowed state.
    #[error("unexpected message: {0}")]
    UnexpectedMessage(&'static str),

    /// No mutually acceptable version, cipher suite or credential.
    #[error("handshake failure: {0}")]
    HandshakeFailure(&'static str),

    /// The peer selected or offered only protocol versions we cannot accept.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(&'static str),

    /// A field value violates a protocol constraint.
    #[error("illegal parameter: {0}")]
    IllegalParameter(&'static str),

    /// The peer answered with an extension the local side never offered.
    #[error("unsupported extension: {0}")]
    UnsupportedExtension(&'static str),

    /// An extension required in this message is missing.
    #[error("missing extension: {0}")]
    MissingExtension(&'static str),

    /// The peer certificate chain was rejected by the validator.
    #[error("bad certificate: {0}")]
    BadCertificate(String),

    /// Client authentication was required but no certificate arrived.
    #[error("certificate required: {0}")]
    CertificateRequired(&'static str),

    /// A signature or transcript binding failed to verify.
    #[error("decrypt error: {0}")]
    DecryptError(&'static str),

    /// The peer sent a fatal alert.
    #[error("peer alert: {0}")]
    PeerAlert(Alert),

    /// A crypto provider operation failed.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// The configuration cannot produce a working context.
    #[error("config error: {0}")]
    Config(&'static str),

    /// Engine misuse or a broken internal invariant.
    #[error("internal error: {0}")]
    Internal(&'static str),

    /// The context already aborted; it cannot be used again.
    #[error("context is aborted")]
    Aborted,
}

impl Error {
    /// The alert description to send for this failure.
    ///
    /// `None` when no alert should go out (the peer initiated the
    /// failure, or the context is already dead).
    pub(crate) fn alert(&self) -> Option<Alert> {
        let alert = match self {
            Error::Decode(_) => Alert::DecodeError,
            Error::Incomplete => Alert::DecodeError,
            Error::UnexpectedMessage(_) => Alert::UnexpectedMessage,
            Error::HandshakeFailure(_) => Alert::HandshakeFailure,
            Error::UnsupportedVersion(_) => Alert::ProtocolVersion,
            Error::IllegalParameter(_) => Alert::IllegalParameter,
            Error::UnsupportedExtension(_) => Alert::UnsupportedExtension,
            Error::MissingExtension(_) => Alert::MissingExtension,
            Error::BadCertificate(_) => Alert::BadCertificate,
            Error::CertificateRequired(_) => Alert::CertificateRequired,
            Error::DecryptError(_) => Alert::DecryptError,
            Error::Crypto(_) => Alert::InternalError,
            Error::Internal(_) => Alert::InternalError,
            Error::Config(_) | Error::PeerAlert(_) | Error::Aborted => return None,
        };
        Some(alert)
    }
}

impl<I> From<nom::Err<nom::error::Error<I>>> for Error {
    fn from(e: nom::Err<nom::error::Error<I>>) -> Self {
        match e {
            nom::Err::Incomplete(_) => Error::Incomplete,
            _ => Error::Decode("malformed field"),
        }
    }
}
