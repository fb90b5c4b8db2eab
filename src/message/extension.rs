use nom::bytes::complete::take;
use nom::error::{Error, ErrorKind};
use nom::number::complete::be_u16;
use nom::{Err, IResult};
use tinyvec::ArrayVec;

/// Identifier of a hello extension (RFC 8446 Section 4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionType {
    ServerName,
    MaxFragmentLength,
    StatusRequest,
    SupportedGroups,
    EcPointFormats,
    SignatureAlgorithms,
    Alpn,
    ExtendedMasterSecret,
    SessionTicket,
    PreSharedKey,
    EarlyData,
    SupportedVersions,
    Cookie,
    PskKeyExchangeModes,
    CertificateAuthorities,
    SignatureAlgorithmsCert,
    KeyShare,
    RenegotiationInfo,
    Unknown(u16),
}

impl ExtensionType {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => ExtensionType::ServerName,
            1 => ExtensionType::MaxFragmentLength,
            5 => ExtensionType::StatusRequest,
            10 => ExtensionType::SupportedGroups,
            11 => ExtensionType::EcPointFormats,
            13 => ExtensionType::SignatureAlgorithms,
            16 => ExtensionType::Alpn,
            23 => ExtensionType::ExtendedMasterSecret,
            35 => ExtensionType::SessionTicket,
            41 => ExtensionType::PreSharedKey,
            42 => ExtensionType::EarlyData,
            43 => ExtensionType::SupportedVersions,
            44 => ExtensionType::Cookie,
            45 => ExtensionType::PskKeyExchangeModes,
            47 => ExtensionType::CertificateAuthorities,
            50 => ExtensionType::SignatureAlgorithmsCert,
            51 => ExtensionType::KeyShare,
            0xff01 => ExtensionType::RenegotiationInfo,
            _ => ExtensionType::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            ExtensionType::ServerName => 0,
            ExtensionType::MaxFragmentLength => 1,
            ExtensionType::StatusRequest => 5,
            ExtensionType::SupportedGroups => 10,
            ExtensionType::EcPointFormats => 11,
            ExtensionType::SignatureAlgorithms => 13,
            ExtensionType::Alpn => 16,
            ExtensionType::ExtendedMasterSecret => 23,
            ExtensionType::SessionTicket => 35,
            ExtensionType::PreSharedKey => 41,
            ExtensionType::EarlyData => 42,
            ExtensionType::SupportedVersions => 43,
            ExtensionType::Cookie => 44,
            ExtensionType::PskKeyExchangeModes => 45,
            ExtensionType::CertificateAuthorities => 47,
            ExtensionType::SignatureAlgorithmsCert => 50,
            ExtensionType::KeyShare => 51,
            ExtensionType::RenegotiationInfo => 0xff01,
            ExtensionType::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, value) = be_u16(input)?;
        Ok((input, ExtensionType::from_u16(value)))
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, ExtensionType::Unknown(_))
    }
}

impl Default for ExtensionType {
    fn default() -> Self {
        ExtensionType::Unknown(0)
    }
}

/// One extension record: identifier plus opaque payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extension<'a> {
    pub extension_type: ExtensionType,
    pub extension_data: &'a [u8],
}

impl<'a> Extension<'a> {
    pub fn new(extension_type: ExtensionType, extension_data: &'a [u8]) -> Self {
        Extension {
            extension_type,
            extension_data,
        }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], Extension<'a>> {
        let (input, extension_type) = ExtensionType::parse(input)?;
        let (input, data_len) = be_u16(input)?;
        let (input, extension_data) = take(data_len)(input)?;
        Ok((
            input,
            Extension {
                extension_type,
                extension_data,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.extension_type.as_u16().to_be_bytes());
        output.extend_from_slice(&(self.extension_data.len() as u16).to_be_bytes());
        output.extend_from_slice(self.extension_data);
    }
}

impl Default for Extension<'_> {
    fn default() -> Self {
        Extension {
            extension_type: ExtensionType::default(),
            extension_data: &[],
        }
    }
}

pub type ExtensionVec<'a> = ArrayVec<[Extension<'a>; 16]>;

/// Parse a 2 byte length prefixed extensions block.
///
/// Empty input is a valid empty block (legacy hellos may omit it entirely).
/// Two records carrying the same identifier, known or not, make the whole
/// block unparseable.
pub fn parse_extensions(input: &[u8]) -> IResult<&[u8], ExtensionVec<'_>> {
    let mut extensions = ExtensionVec::new();

    if input.is_empty() {
        return Ok((input, extensions));
    }

    let (input, block_len) = be_u16(input)?;
    let (input, mut block) = take(block_len)(input)?;

    while !block.is_empty() {
        let (rest, extension) = Extension::parse(block)?;

        let duplicate = extensions
            .iter()
            .any(|e| e.extension_type == extension.extension_type);
        if duplicate {
            return Err(Err::Failure(Error::new(block, ErrorKind::Verify)));
        }

        if extensions.len() == 16 {
            return Err(Err::Failure(Error::new(block, ErrorKind::TooLarge)));
        }

        extensions.push(extension);
        block = rest;
    }

    Ok((input, extensions))
}

/// Write a complete extensions block for already materialized records.
pub fn serialize_extensions(extensions: &[Extension<'_>], output: &mut Vec<u8>) {
    let total: usize = extensions
        .iter()
        .map(|e| 4 + e.extension_data.len())
        .sum();
    output.extend_from_slice(&(total as u16).to_be_bytes());
    for extension in extensions {
        extension.serialize(output);
    }
}

/// Find a record by identifier.
pub fn find_extension<'a, 'b>(
    extensions: &'b [Extension<'a>],
    extension_type: ExtensionType,
) -> Option<&'b Extension<'a>> {
    extensions.iter().find(|e| e.extension_type == extension_type)
}

#[cfg(test)]
mod test {
    use super::*;

    const BLOCK: &[u8] = &[
        0x00, 0x0F, // block length
        0x00, 0x2B, // supported_versions
        0x00, 0x03, // length
        0x02, 0x03, 0x04, // payload
        0x00, 0x0A, // supported_groups
        0x00, 0x04, // length
        0x00, 0x02, 0x00, 0x1D, // payload
    ];

    #[test]
    fn roundtrip() {
        let (rest, extensions) = parse_extensions(BLOCK).unwrap();
        assert!(rest.is_empty());
        assert_eq!(extensions.len(), 2);
        assert_eq!(extensions[0].extension_type, ExtensionType::SupportedVersions);
        assert_eq!(extensions[0].extension_data, &BLOCK[6..9]);
        assert_eq!(extensions[1].extension_type, ExtensionType::SupportedGroups);

        let mut serialized = Vec::new();
        serialize_extensions(&extensions, &mut serialized);
        assert_eq!(serialized, BLOCK);
    }

    #[test]
    fn empty_input_is_empty_block() {
        let (rest, extensions) = parse_extensions(&[]).unwrap();
        assert!(rest.is_empty());
        assert!(extensions.is_empty());
    }

    #[test]
    fn duplicate_id_rejected() {
        let block: &[u8] = &[
            0x00, 0x0E, //
            0x00, 0x2B, 0x00, 0x03, 0x02, 0x03, 0x04, //
            0x00, 0x2B, 0x00, 0x03, 0x02, 0x03, 0x03, // same id again
        ];
        assert!(parse_extensions(block).is_err());
    }

    #[test]
    fn duplicate_unknown_id_rejected() {
        let block: &[u8] = &[
            0x00, 0x08, //
            0xAB, 0xCD, 0x00, 0x00, //
            0xAB, 0xCD, 0x00, 0x00, //
        ];
        assert!(parse_extensions(block).is_err());
    }

    #[test]
    fn distinct_unknown_ids_accepted() {
        let block: &[u8] = &[
            0x00, 0x08, //
            0xAB, 0xCD, 0x00, 0x00, //
            0xAB, 0xCE, 0x00, 0x00, //
        ];
        let (_, extensions) = parse_extensions(block).unwrap();
        assert_eq!(extensions.len(), 2);
        assert!(!extensions[0].extension_type.is_known());
    }

    #[test]
    fn truncated_record_rejected() {
        let block: &[u8] = &[
            0x00, 0x06, //
            0x00, 0x2B, 0x00, 0x09, 0x02, 0x03, // claims 9 payload bytes
        ];
        assert!(parse_extensions(block).is_err());
    }
}
