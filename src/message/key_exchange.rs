use nom::error::{Error, ErrorKind};
use nom::number::complete::be_u8;
use nom::Err;
use nom::{bytes::complete::take, IResult};

use crate::types::NamedGroup;

use super::{DigitallySigned, Random};

/// Curve encoding of the legacy ServerKeyExchange. Only named curves exist
/// in practice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveType {
    NamedCurve,
    Unknown(u8),
}

impl CurveType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            3 => CurveType::NamedCurve,
            _ => CurveType::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            CurveType::NamedCurve => 3,
            CurveType::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, value) = be_u8(input)?;
        Ok((input, CurveType::from_u8(value)))
    }
}

/// The ephemeral ECDHE parameters of a legacy ServerKeyExchange.
#[derive(Debug, PartialEq, Eq)]
pub struct EcdheParams<'a> {
    pub curve_type: CurveType,
    pub group: NamedGroup,
    pub public_key: &'a [u8],
}

impl<'a> EcdheParams<'a> {
    pub fn new(group: NamedGroup, public_key: &'a [u8]) -> Self {
        EcdheParams {
            curve_type: CurveType::NamedCurve,
            group,
            public_key,
        }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], EcdheParams<'a>> {
        let (input, curve_type) = CurveType::parse(input)?;
        if curve_type != CurveType::NamedCurve {
            return Err(Err::Failure(Error::new(input, ErrorKind::Tag)));
        }
        let (input, group) = NamedGroup::parse(input)?;
        let (input, public_key_len) = be_u8(input)?;
        let (input, public_key) = take(public_key_len)(input)?;

        Ok((
            input,
            EcdheParams {
                curve_type,
                group,
                public_key,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(self.curve_type.as_u8());
        output.extend_from_slice(&self.group.as_u16().to_be_bytes());
        output.push(self.public_key.len() as u8);
        output.extend_from_slice(self.public_key);
    }
}

/// Legacy ServerKeyExchange: signed ephemeral ECDHE parameters.
///
/// The signature covers client_random, server_random and the serialized
/// parameters, binding the ephemeral key to this handshake.
#[derive(Debug, PartialEq, Eq)]
pub struct ServerKeyExchange<'a> {
    pub params: EcdheParams<'a>,
    pub signed: DigitallySigned<'a>,
}

impl<'a> ServerKeyExchange<'a> {
    pub fn new(params: EcdheParams<'a>, signed: DigitallySigned<'a>) -> Self {
        ServerKeyExchange { params, signed }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], ServerKeyExchange<'a>> {
        let (input, params) = EcdheParams::parse(input)?;
        let (input, signed) = DigitallySigned::parse(input)?;
        Ok((input, ServerKeyExchange { params, signed }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        self.params.serialize(output);
        self.signed.serialize(output);
    }

    /// The bytes the signature covers.
    pub fn signed_content(
        client_random: &Random,
        server_random: &Random,
        params: &EcdheParams<'_>,
    ) -> Vec<u8> {
        let mut content = Vec::with_capacity(64 + 4 + params.public_key.len());
        client_random.serialize(&mut content);
        server_random.serialize(&mut content);
        params.serialize(&mut content);
        content
    }
}

/// Legacy ClientKeyExchange: the client's ephemeral public key.
#[derive(Debug, PartialEq, Eq)]
pub struct ClientKeyExchange<'a> {
    pub public_key: &'a [u8],
}

impl<'a> ClientKeyExchange<'a> {
    pub fn new(public_key: &'a [u8]) -> Self {
        ClientKeyExchange { public_key }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], ClientKeyExchange<'a>> {
        let (input, public_key_len) = be_u8(input)?;
        let (input, public_key) = take(public_key_len)(input)?;
        Ok((input, ClientKeyExchange { public_key }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(self.public_key.len() as u8);
        output.extend_from_slice(self.public_key);
    }
}

#[cfg(test)]
mod test {
    use crate::types::SignatureScheme;

    use super::*;

    const MESSAGE: &[u8] = &[
        0x03, // named_curve
        0x00, 0x1D, // x25519
        0x04, // public key length
        0x01, 0x02, 0x03, 0x04, // public key
        0x04, 0x03, // ecdsa_secp256r1_sha256
        0x00, 0x02, // signature length
        0xAB, 0xCD, // signature data
    ];

    #[test]
    fn roundtrip() {
        let params = EcdheParams::new(NamedGroup::X25519, &MESSAGE[4..8]);
        let signed = DigitallySigned::new(SignatureScheme::ECDSA_SECP256R1_SHA256, &MESSAGE[12..14]);
        let server_key_exchange = ServerKeyExchange::new(params, signed);

        let mut serialized = Vec::new();
        server_key_exchange.serialize(&mut serialized);
        assert_eq!(serialized, MESSAGE);

        let (rest, parsed) = ServerKeyExchange::parse(&serialized).unwrap();
        assert_eq!(parsed, server_key_exchange);
        assert!(rest.is_empty());
    }

    #[test]
    fn explicit_curves_rejected() {
        let mut message = MESSAGE.to_vec();
        message[0] = 0x01; // explicit_prime

        assert!(ServerKeyExchange::parse(&message).is_err());
    }

    #[test]
    fn signed_content_covers_randoms_and_params() {
        let client_random = Random([0x01; 32]);
        let server_random = Random([0x02; 32]);
        let params = EcdheParams::new(NamedGroup::X25519, &[0xAA, 0xBB]);

        let content = ServerKeyExchange::signed_content(&client_random, &server_random, &params);
        assert_eq!(&content[..32], &[0x01; 32]);
        assert_eq!(&content[32..64], &[0x02; 32]);
        assert_eq!(&content[64..], &[0x03, 0x00, 0x1D, 0x02, 0xAA, 0xBB]);
    }

    #[test]
    fn client_key_exchange_roundtrip() {
        const CKE: &[u8] = &[
            0x02, // public key length
            0xEE, 0xFF, // public key
        ];

        let client_key_exchange = ClientKeyExchange::new(&CKE[1..3]);

        let mut serialized = Vec::new();
        client_key_exchange.serialize(&mut serialized);
        assert_eq!(serialized, CKE);

        let (rest, parsed) = ClientKeyExchange::parse(&serialized).unwrap();
        assert_eq!(parsed, client_key_exchange);
        assert!(rest.is_empty());
    }
}
