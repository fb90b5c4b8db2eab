use nom::number::complete::{be_u24, be_u8};
use nom::IResult;
use std::ops::Deref;

mod certificate;
mod certificate_request;
mod certificate_status;
mod certificate_verify;
mod client_hello;
mod digitally_signed;
mod encrypted_extensions;
mod extension;
mod finished;
mod id;
mod key_exchange;
mod key_update;
mod new_session_ticket;
mod random;
mod server_hello;

pub use certificate::{Certificate, CertificateEntry, LegacyCertificate};
pub use certificate_request::{
    CertificateRequest, ClientCertificateType, LegacyCertificateRequest,
};
pub use certificate_status::{CertificateStatus, CertificateStatusType};
pub use certificate_verify::{tls13_signed_content, CertificateVerify};
pub use client_hello::ClientHello;
pub use digitally_signed::DigitallySigned;
pub use encrypted_extensions::EncryptedExtensions;
pub use extension::{
    find_extension, parse_extensions, serialize_extensions, Extension, ExtensionType,
    ExtensionVec,
};
pub use finished::Finished;
pub use id::{InvalidLength, SessionId, TicketNonce};
pub use key_exchange::{ClientKeyExchange, CurveType, EcdheParams, ServerKeyExchange};
pub use key_update::{KeyUpdate, KeyUpdateRequest};
pub use new_session_ticket::NewSessionTicket;
pub use random::Random;
pub use server_hello::ServerHello;

// ==== Message type ====

/// Handshake message discriminant, the first byte of every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    ClientHello,
    ServerHello,
    NewSessionTicket,
    EncryptedExtensions,
    Certificate,
    ServerKeyExchange,
    CertificateRequest,
    ServerHelloDone,
    CertificateVerify,
    ClientKeyExchange,
    Finished,
    CertificateStatus,
    KeyUpdate,
    MessageHash,
    Unknown(u8),
}

impl MessageType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => MessageType::ClientHello,
            2 => MessageType::ServerHello,
            4 => MessageType::NewSessionTicket,
            8 => MessageType::EncryptedExtensions,
            11 => MessageType::Certificate,
            12 => MessageType::ServerKeyExchange,
            13 => MessageType::CertificateRequest,
            14 => MessageType::ServerHelloDone,
            15 => MessageType::CertificateVerify,
            16 => MessageType::ClientKeyExchange,
            20 => MessageType::Finished,
            22 => MessageType::CertificateStatus,
            24 => MessageType::KeyUpdate,
            254 => MessageType::MessageHash,
            _ => MessageType::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            MessageType::ClientHello => 1,
            MessageType::ServerHello => 2,
            MessageType::NewSessionTicket => 4,
            MessageType::EncryptedExtensions => 8,
            MessageType::Certificate => 11,
            MessageType::ServerKeyExchange => 12,
            MessageType::CertificateRequest => 13,
            MessageType::ServerHelloDone => 14,
            MessageType::CertificateVerify => 15,
            MessageType::ClientKeyExchange => 16,
            MessageType::Finished => 20,
            MessageType::CertificateStatus => 22,
            MessageType::KeyUpdate => 24,
            MessageType::MessageHash => 254,
            MessageType::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, value) = be_u8(input)?;
        Ok((input, MessageType::from_u8(value)))
    }
}

impl Default for MessageType {
    fn default() -> Self {
        MessageType::Unknown(0)
    }
}

// ==== Header ====

/// The 4 byte message header: one type byte and a 24 bit body length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub msg_type: MessageType,
    pub length: usize,
}

impl Header {
    pub const WIRE_SIZE: usize = 4;

    pub fn new(msg_type: MessageType, length: usize) -> Self {
        Header { msg_type, length }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Header> {
        let (input, msg_type) = MessageType::parse(input)?;
        let (input, length) = be_u24(input)?;
        Ok((
            input,
            Header {
                msg_type,
                length: length as usize,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(self.msg_type.as_u8());
        output.extend_from_slice(&(self.length as u32).to_be_bytes()[1..]);
    }
}

// ==== Framing helpers ====

/// Write a message header with a zero length, returning the body start
/// position for a later [`close_message`].
pub(crate) fn open_message(msg_type: MessageType, output: &mut Vec<u8>) -> usize {
    output.push(msg_type.as_u8());
    output.extend_from_slice(&[0, 0, 0]);
    output.len()
}

/// Patch the 24 bit length of a message opened with [`open_message`].
pub(crate) fn close_message(output: &mut Vec<u8>, body_start: usize) {
    let length = (output.len() - body_start) as u32;
    output[body_start - 3..body_start].copy_from_slice(&length.to_be_bytes()[1..]);
}

/// Reserve a 2 byte length prefix, returning the position after it.
pub(crate) fn open_u16_block(output: &mut Vec<u8>) -> usize {
    output.extend_from_slice(&[0, 0]);
    output.len()
}

pub(crate) fn close_u16_block(output: &mut Vec<u8>, start: usize) {
    let length = (output.len() - start) as u16;
    output[start - 2..start].copy_from_slice(&length.to_be_bytes());
}

/// Reserve a 3 byte length prefix, returning the position after it.
pub(crate) fn open_u24_block(output: &mut Vec<u8>) -> usize {
    output.extend_from_slice(&[0, 0, 0]);
    output.len()
}

pub(crate) fn close_u24_block(output: &mut Vec<u8>, start: usize) {
    let length = (output.len() - start) as u32;
    output[start - 3..start].copy_from_slice(&length.to_be_bytes()[1..]);
}

// ==== Small shared types ====

/// Null is the only compression we ever offer or accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Null,
    Unknown(u8),
}

impl CompressionMethod {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => CompressionMethod::Null,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            CompressionMethod::Null => 0,
            CompressionMethod::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, value) = be_u8(input)?;
        Ok((input, CompressionMethod::from_u8(value)))
    }
}

impl Default for CompressionMethod {
    fn default() -> Self {
        CompressionMethod::Unknown(0)
    }
}

/// A DER encoded certificate, borrowed from the incoming message.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Asn1Cert<'a>(pub &'a [u8]);

impl Deref for Asn1Cert<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.0
    }
}

/// A DER encoded X.501 name, borrowed from the incoming message.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DistinguishedName<'a>(pub &'a [u8]);

impl Deref for DistinguishedName<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.0
    }
}
