use nom::number::complete::be_u16;
use nom::{bytes::complete::take, IResult};

use crate::types::SignatureScheme;

/// A signature scheme id plus the u16 length prefixed signature bytes.
///
/// Shared by CertificateVerify and the legacy ServerKeyExchange.
#[derive(Debug, PartialEq, Eq)]
pub struct DigitallySigned<'a> {
    pub scheme: SignatureScheme,
    pub signature: &'a [u8],
}

impl<'a> DigitallySigned<'a> {
    pub fn new(scheme: SignatureScheme, signature: &'a [u8]) -> Self {
        DigitallySigned { scheme, signature }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], DigitallySigned<'a>> {
        let (input, scheme) = SignatureScheme::parse(input)?;
        let (input, signature_len) = be_u16(input)?;
        let (input, signature) = take(signature_len)(input)?;
        Ok((input, DigitallySigned { scheme, signature }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.scheme.as_u16().to_be_bytes());
        output.extend_from_slice(&(self.signature.len() as u16).to_be_bytes());
        output.extend_from_slice(self.signature);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const MESSAGE: &[u8] = &[
        0x04, 0x03, // ecdsa_secp256r1_sha256
        0x00, 0x04, // signature length
        0x01, 0x02, 0x03, 0x04, // signature data
    ];

    #[test]
    fn roundtrip() {
        let digitally_signed =
            DigitallySigned::new(SignatureScheme::ECDSA_SECP256R1_SHA256, &MESSAGE[4..8]);

        let mut serialized = Vec::new();
        digitally_signed.serialize(&mut serialized);
        assert_eq!(serialized, MESSAGE);

        let (rest, parsed) = DigitallySigned::parse(&serialized).unwrap();
        assert_eq!(parsed, digitally_signed);
        assert!(rest.is_empty());
    }
}
