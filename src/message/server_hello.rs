use nom::IResult;

use crate::types::{CipherSuite, ProtocolVersion};

use super::extension::{parse_extensions, serialize_extensions, ExtensionVec};
use super::{CompressionMethod, Random, SessionId};

/// ServerHello, which doubles as HelloRetryRequest when the random carries
/// the retry magic.
#[derive(Debug, PartialEq, Eq)]
pub struct ServerHello<'a> {
    pub legacy_version: ProtocolVersion,
    pub random: Random,
    pub session_id_echo: SessionId,
    pub cipher_suite: CipherSuite,
    pub compression_method: CompressionMethod,
    pub extensions: ExtensionVec<'a>,
}

impl<'a> ServerHello<'a> {
    pub fn new(
        legacy_version: ProtocolVersion,
        random: Random,
        session_id_echo: SessionId,
        cipher_suite: CipherSuite,
    ) -> Self {
        ServerHello {
            legacy_version,
            random,
            session_id_echo,
            cipher_suite,
            compression_method: CompressionMethod::Null,
            extensions: ExtensionVec::new(),
        }
    }

    pub fn is_hello_retry(&self) -> bool {
        self.random.is_hello_retry()
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], ServerHello<'a>> {
        let (input, legacy_version) = ProtocolVersion::parse(input)?;
        let (input, random) = Random::parse(input)?;
        let (input, session_id_echo) = SessionId::parse(input)?;
        let (input, cipher_suite) = CipherSuite::parse(input)?;
        let (input, compression_method) = CompressionMethod::parse(input)?;
        let (input, extensions) = parse_extensions(input)?;

        Ok((
            input,
            ServerHello {
                legacy_version,
                random,
                session_id_echo,
                cipher_suite,
                compression_method,
                extensions,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.legacy_version.as_u16().to_be_bytes());
        self.random.serialize(output);
        self.session_id_echo.serialize(output);
        output.extend_from_slice(&self.cipher_suite.as_u16().to_be_bytes());
        output.push(self.compression_method.as_u8());

        if !self.extensions.is_empty() {
            serialize_extensions(&self.extensions, output);
        }
    }
}

#[cfg(test)]
mod test {
    use super::super::{Extension, ExtensionType};
    use super::*;

    const MESSAGE: &[u8] = &[
        0x03, 0x03, // legacy_version TLS 1.2
        // Random
        0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F,
        0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0x19, 0x1A, 0x1B, 0x1C, 0x1D, 0x1E,
        0x1F, 0x20, //
        0x01, // SessionId length
        0xAA, // SessionId
        0x13, 0x01, // AES_128_GCM_SHA256
        0x00, // CompressionMethod::Null
        0x00, 0x06, // extensions block length
        0x00, 0x2B, // supported_versions
        0x00, 0x02, //
        0x03, 0x04, //
    ];

    #[test]
    fn roundtrip() {
        let random = Random::parse(&MESSAGE[2..34]).unwrap().1;
        let session_id_echo = SessionId::try_new(&[0xAA]).unwrap();

        let mut server_hello = ServerHello::new(
            ProtocolVersion::Tls1_2,
            random,
            session_id_echo,
            CipherSuite::AES_128_GCM_SHA256,
        );
        server_hello
            .extensions
            .push(Extension::new(ExtensionType::SupportedVersions, &MESSAGE[45..47]));

        let mut serialized = Vec::new();
        server_hello.serialize(&mut serialized);
        assert_eq!(serialized, MESSAGE);

        let (rest, parsed) = ServerHello::parse(&serialized).unwrap();
        assert_eq!(parsed, server_hello);
        assert!(rest.is_empty());
    }

    #[test]
    fn hello_retry_is_detected() {
        let server_hello = ServerHello::new(
            ProtocolVersion::Tls1_2,
            Random::HELLO_RETRY_REQUEST,
            SessionId::empty(),
            CipherSuite::AES_128_GCM_SHA256,
        );
        assert!(server_hello.is_hello_retry());

        let random = Random::parse(&MESSAGE[2..34]).unwrap().1;
        let server_hello = ServerHello::new(
            ProtocolVersion::Tls1_2,
            random,
            SessionId::empty(),
            CipherSuite::AES_128_GCM_SHA256,
        );
        assert!(!server_hello.is_hello_retry());
    }
}
