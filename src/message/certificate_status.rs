use nom::number::complete::{be_u24, be_u8};
use nom::{bytes::complete::take, IResult};

/// Status type of a CertificateStatus message. Only OCSP is defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateStatusType {
    Ocsp,
    Unknown(u8),
}

impl CertificateStatusType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => CertificateStatusType::Ocsp,
            _ => CertificateStatusType::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            CertificateStatusType::Ocsp => 1,
            CertificateStatusType::Unknown(value) => *value,
        }
    }
}

/// The legacy server's stapled OCSP response, sent between Certificate and
/// ServerKeyExchange when the client asked for stapling.
#[derive(Debug, PartialEq, Eq)]
pub struct CertificateStatus<'a> {
    pub status_type: CertificateStatusType,
    pub response: &'a [u8],
}

impl<'a> CertificateStatus<'a> {
    pub fn new(response: &'a [u8]) -> Self {
        CertificateStatus {
            status_type: CertificateStatusType::Ocsp,
            response,
        }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], CertificateStatus<'a>> {
        let (input, status_type) = be_u8(input)?;
        let (input, response_len) = be_u24(input)?;
        let (input, response) = take(response_len)(input)?;

        Ok((
            input,
            CertificateStatus {
                status_type: CertificateStatusType::from_u8(status_type),
                response,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(self.status_type.as_u8());
        output.extend_from_slice(&(self.response.len() as u32).to_be_bytes()[1..]);
        output.extend_from_slice(self.response);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const MESSAGE: &[u8] = &[
        0x01, // ocsp
        0x00, 0x00, 0x04, // response length
        0xDE, 0xAD, 0xBE, 0xEF, // response data
    ];

    #[test]
    fn roundtrip() {
        let certificate_status = CertificateStatus::new(&MESSAGE[4..8]);

        let mut serialized = Vec::new();
        certificate_status.serialize(&mut serialized);
        assert_eq!(serialized, MESSAGE);

        let (rest, parsed) = CertificateStatus::parse(&serialized).unwrap();
        assert_eq!(parsed, certificate_status);
        assert!(rest.is_empty());
    }

    #[test]
    fn unknown_status_type_is_kept() {
        let mut message = MESSAGE.to_vec();
        message[0] = 0x07;

        let (_, parsed) = CertificateStatus::parse(&message).unwrap();
        assert_eq!(parsed.status_type, CertificateStatusType::Unknown(7));
    }
}
