use nom::number::complete::{be_u24, be_u8};
use nom::{bytes::complete::take, IResult};
use tinyvec::ArrayVec;

use super::extension::{parse_extensions, serialize_extensions, ExtensionVec};
use super::{close_u24_block, open_u24_block, Asn1Cert};

/// One certificate of a 1.3 chain, with its per entry extensions
/// (an OCSP staple rides here as a status_request extension).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CertificateEntry<'a> {
    pub cert_data: Asn1Cert<'a>,
    pub extensions: ExtensionVec<'a>,
}

impl<'a> CertificateEntry<'a> {
    pub fn new(cert_data: Asn1Cert<'a>) -> Self {
        CertificateEntry {
            cert_data,
            extensions: ExtensionVec::new(),
        }
    }
}

/// TLS 1.3 Certificate: request context plus a chain of entries.
///
/// An empty chain is how a client declines a certificate request.
#[derive(Debug, PartialEq, Eq)]
pub struct Certificate<'a> {
    pub request_context: &'a [u8],
    pub entries: ArrayVec<[CertificateEntry<'a>; 8]>,
}

impl<'a> Certificate<'a> {
    pub fn new(request_context: &'a [u8]) -> Self {
        Certificate {
            request_context,
            entries: ArrayVec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], Certificate<'a>> {
        let (input, context_len) = be_u8(input)?;
        let (input, request_context) = take(context_len)(input)?;

        let (input, total_len) = be_u24(input)?;
        let (input, mut block) = take(total_len)(input)?;

        let mut entries = ArrayVec::new();
        while !block.is_empty() {
            let (rest, cert_len) = be_u24(block)?;
            let (rest, cert_data) = take(cert_len)(rest)?;
            let (rest, extensions) = parse_extensions(rest)?;

            if entries.len() == entries.capacity() {
                return Err(nom::Err::Failure(nom::error::Error::new(
                    block,
                    nom::error::ErrorKind::TooLarge,
                )));
            }
            entries.push(CertificateEntry {
                cert_data: Asn1Cert(cert_data),
                extensions,
            });
            block = rest;
        }

        Ok((
            input,
            Certificate {
                request_context,
                entries,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(self.request_context.len() as u8);
        output.extend_from_slice(self.request_context);

        let total = open_u24_block(output);
        for entry in &self.entries {
            output.extend_from_slice(&(entry.cert_data.len() as u32).to_be_bytes()[1..]);
            output.extend_from_slice(&entry.cert_data);
            serialize_extensions(&entry.extensions, output);
        }
        close_u24_block(output, total);
    }
}

/// Legacy Certificate: a bare chain of DER certificates.
#[derive(Debug, PartialEq, Eq)]
pub struct LegacyCertificate<'a> {
    pub certificate_list: ArrayVec<[Asn1Cert<'a>; 8]>,
}

impl<'a> LegacyCertificate<'a> {
    pub fn new() -> Self {
        LegacyCertificate {
            certificate_list: ArrayVec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.certificate_list.is_empty()
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], LegacyCertificate<'a>> {
        let (input, total_len) = be_u24(input)?;
        let (input, mut block) = take(total_len)(input)?;

        let mut certificate_list = ArrayVec::new();
        while !block.is_empty() {
            let (rest, cert_len) = be_u24(block)?;
            let (rest, cert_data) = take(cert_len)(rest)?;

            if certificate_list.len() == certificate_list.capacity() {
                return Err(nom::Err::Failure(nom::error::Error::new(
                    block,
                    nom::error::ErrorKind::TooLarge,
                )));
            }
            certificate_list.push(Asn1Cert(cert_data));
            block = rest;
        }

        Ok((input, LegacyCertificate { certificate_list }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        let total = open_u24_block(output);
        for cert in &self.certificate_list {
            output.extend_from_slice(&(cert.len() as u32).to_be_bytes()[1..]);
            output.extend_from_slice(cert);
        }
        close_u24_block(output, total);
    }
}

impl Default for LegacyCertificate<'_> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::super::{Extension, ExtensionType};
    use super::*;

    const MESSAGE: &[u8] = &[
        0x00, // request context length
        0x00, 0x00, 0x10, // chain total length
        0x00, 0x00, 0x04, // entry 1 certificate length
        0x01, 0x02, 0x03, 0x04, // certificate data
        0x00, 0x00, // entry 1 extensions (empty)
        0x00, 0x00, 0x02, // entry 2 certificate length
        0x05, 0x06, // certificate data
        0x00, 0x00, // entry 2 extensions (empty)
    ];

    #[test]
    fn roundtrip() {
        let mut certificate = Certificate::new(&[]);
        certificate.entries.push(CertificateEntry::new(Asn1Cert(&MESSAGE[7..11])));
        certificate.entries.push(CertificateEntry::new(Asn1Cert(&MESSAGE[16..18])));

        let mut serialized = Vec::new();
        certificate.serialize(&mut serialized);
        assert_eq!(serialized, MESSAGE);

        let (rest, parsed) = Certificate::parse(&serialized).unwrap();
        assert_eq!(parsed, certificate);
        assert!(rest.is_empty());
    }

    #[test]
    fn empty_chain_is_a_declined_request() {
        const DECLINED: &[u8] = &[
            0x00, // request context length
            0x00, 0x00, 0x00, // chain total length
        ];

        let (rest, parsed) = Certificate::parse(DECLINED).unwrap();
        assert!(rest.is_empty());
        assert!(parsed.is_empty());

        let mut serialized = Vec::new();
        parsed.serialize(&mut serialized);
        assert_eq!(serialized, DECLINED);
    }

    #[test]
    fn entry_extension_carries_staple() {
        let staple = [0xDE, 0xAD, 0xBE, 0xEF];
        let mut certificate = Certificate::new(&[]);
        let mut entry = CertificateEntry::new(Asn1Cert(&[0x01, 0x02]));
        entry
            .extensions
            .push(Extension::new(ExtensionType::StatusRequest, &staple));
        certificate.entries.push(entry);

        let mut serialized = Vec::new();
        certificate.serialize(&mut serialized);

        let (_, parsed) = Certificate::parse(&serialized).unwrap();
        let ext = parsed.entries[0].extensions[0];
        assert_eq!(ext.extension_type, ExtensionType::StatusRequest);
        assert_eq!(ext.extension_data, staple);
    }

    #[test]
    fn legacy_roundtrip() {
        const LEGACY: &[u8] = &[
            0x00, 0x00, 0x0C, // total length
            0x00, 0x00, 0x04, // certificate 1 length
            0x01, 0x02, 0x03, 0x04, // certificate 1 data
            0x00, 0x00, 0x02, // certificate 2 length
            0x05, 0x06, // certificate 2 data
        ];

        let mut certificate = LegacyCertificate::new();
        certificate.certificate_list.push(Asn1Cert(&LEGACY[6..10]));
        certificate.certificate_list.push(Asn1Cert(&LEGACY[13..15]));

        let mut serialized = Vec::new();
        certificate.serialize(&mut serialized);
        assert_eq!(serialized, LEGACY);

        let (rest, parsed) = LegacyCertificate::parse(&serialized).unwrap();
        assert_eq!(parsed, certificate);
        assert!(rest.is_empty());
    }
}
