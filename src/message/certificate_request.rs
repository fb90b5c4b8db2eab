use nom::error::{Error, ErrorKind};
use nom::number::complete::{be_u16, be_u8};
use nom::Err;
use nom::{bytes::complete::take, IResult};
use tinyvec::ArrayVec;

use crate::types::{SignatureScheme, SignatureSchemeVec};
use crate::util::{many0, many1};

use super::extension::{parse_extensions, serialize_extensions, ExtensionVec};
use super::DistinguishedName;

/// TLS 1.3 CertificateRequest: request context plus extensions.
///
/// The sig algs the server accepts ride in a signature_algorithms extension;
/// an empty context marks an in-handshake request.
#[derive(Debug, PartialEq, Eq)]
pub struct CertificateRequest<'a> {
    pub request_context: &'a [u8],
    pub extensions: ExtensionVec<'a>,
}

impl<'a> CertificateRequest<'a> {
    pub fn new(request_context: &'a [u8]) -> Self {
        CertificateRequest {
            request_context,
            extensions: ExtensionVec::new(),
        }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], CertificateRequest<'a>> {
        let (input, context_len) = be_u8(input)?;
        let (input, request_context) = take(context_len)(input)?;
        let (input, extensions) = parse_extensions(input)?;

        Ok((
            input,
            CertificateRequest {
                request_context,
                extensions,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(self.request_context.len() as u8);
        output.extend_from_slice(self.request_context);
        serialize_extensions(&self.extensions, output);
    }
}

// ==== Legacy form ====

/// Certificate type ids of the legacy CertificateRequest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum ClientCertificateType {
    RSA_SIGN,
    ECDSA_SIGN,
    Unknown(u8),
}

impl ClientCertificateType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => ClientCertificateType::RSA_SIGN,
            64 => ClientCertificateType::ECDSA_SIGN,
            _ => ClientCertificateType::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            ClientCertificateType::RSA_SIGN => 1,
            ClientCertificateType::ECDSA_SIGN => 64,
            ClientCertificateType::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, value) = be_u8(input)?;
        Ok((input, ClientCertificateType::from_u8(value)))
    }
}

impl Default for ClientCertificateType {
    fn default() -> Self {
        ClientCertificateType::Unknown(0)
    }
}

/// Legacy CertificateRequest: certificate types, signature algorithms and
/// acceptable CA names.
#[derive(Debug, PartialEq, Eq)]
pub struct LegacyCertificateRequest<'a> {
    pub certificate_types: ArrayVec<[ClientCertificateType; 8]>,
    pub signature_algorithms: SignatureSchemeVec,
    pub certificate_authorities: ArrayVec<[DistinguishedName<'a>; 8]>,
}

impl<'a> LegacyCertificateRequest<'a> {
    pub fn new(
        certificate_types: ArrayVec<[ClientCertificateType; 8]>,
        signature_algorithms: SignatureSchemeVec,
    ) -> Self {
        LegacyCertificateRequest {
            certificate_types,
            signature_algorithms,
            certificate_authorities: ArrayVec::new(),
        }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], LegacyCertificateRequest<'a>> {
        let (input, cert_types_len) = be_u8(input)?;
        let (input, input_types) = take(cert_types_len)(input)?;
        let (rest, certificate_types) = many1(ClientCertificateType::parse)(input_types)?;
        if !rest.is_empty() {
            return Err(Err::Failure(Error::new(rest, ErrorKind::LengthValue)));
        }

        let (input, sig_algs_len) = be_u16(input)?;
        let (input, input_sigs) = take(sig_algs_len)(input)?;
        let (rest, signature_algorithms) = many0(SignatureScheme::parse)(input_sigs)?;
        if !rest.is_empty() {
            return Err(Err::Failure(Error::new(rest, ErrorKind::LengthValue)));
        }

        let (input, ca_len) = be_u16(input)?;
        let (input, mut ca_block) = take(ca_len)(input)?;
        let mut certificate_authorities = ArrayVec::new();
        while !ca_block.is_empty() {
            let (rest, name_len) = be_u16(ca_block)?;
            let (rest, name) = take(name_len)(rest)?;

            if certificate_authorities.len() == certificate_authorities.capacity() {
                return Err(Err::Failure(Error::new(ca_block, ErrorKind::TooLarge)));
            }
            certificate_authorities.push(DistinguishedName(name));
            ca_block = rest;
        }

        Ok((
            input,
            LegacyCertificateRequest {
                certificate_types,
                signature_algorithms,
                certificate_authorities,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(self.certificate_types.len() as u8);
        for cert_type in &self.certificate_types {
            output.push(cert_type.as_u8());
        }

        output.extend_from_slice(&(self.signature_algorithms.len() as u16 * 2).to_be_bytes());
        for scheme in &self.signature_algorithms {
            output.extend_from_slice(&scheme.as_u16().to_be_bytes());
        }

        let ca_len: usize = self
            .certificate_authorities
            .iter()
            .map(|name| 2 + name.len())
            .sum();
        output.extend_from_slice(&(ca_len as u16).to_be_bytes());
        for name in &self.certificate_authorities {
            output.extend_from_slice(&(name.len() as u16).to_be_bytes());
            output.extend_from_slice(name);
        }
    }
}
