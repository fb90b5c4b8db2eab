use nom::number::complete::be_u8;
use nom::IResult;

/// Whether a KeyUpdate asks the peer to update as well (RFC 8446 4.6.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyUpdateRequest {
    UpdateNotRequested,
    UpdateRequested,
}

impl KeyUpdateRequest {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(KeyUpdateRequest::UpdateNotRequested),
            1 => Some(KeyUpdateRequest::UpdateRequested),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            KeyUpdateRequest::UpdateNotRequested => 0,
            KeyUpdateRequest::UpdateRequested => 1,
        }
    }
}

/// Post-handshake sending key rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyUpdate {
    pub request_update: KeyUpdateRequest,
}

impl KeyUpdate {
    pub fn request_update() -> Self {
        Self {
            request_update: KeyUpdateRequest::UpdateRequested,
        }
    }

    pub fn update_not_requested() -> Self {
        Self {
            request_update: KeyUpdateRequest::UpdateNotRequested,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, value) = be_u8(input)?;
        let request_update = KeyUpdateRequest::from_u8(value).ok_or_else(|| {
            nom::Err::Failure(nom::error::Error::new(input, nom::error::ErrorKind::Verify))
        })?;
        Ok((input, Self { request_update }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(self.request_update.as_u8());
    }

    pub fn is_update_requested(&self) -> bool {
        self.request_update == KeyUpdateRequest::UpdateRequested
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn roundtrip() {
        let key_update = KeyUpdate::request_update();
        let mut serialized = Vec::new();
        key_update.serialize(&mut serialized);
        assert_eq!(serialized, &[0x01]);

        let (rest, parsed) = KeyUpdate::parse(&serialized).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, key_update);
        assert!(parsed.is_update_requested());
    }

    #[test]
    fn not_requested() {
        let key_update = KeyUpdate::update_not_requested();
        let mut serialized = Vec::new();
        key_update.serialize(&mut serialized);
        assert_eq!(serialized, &[0x00]);

        let (_, parsed) = KeyUpdate::parse(&serialized).unwrap();
        assert!(!parsed.is_update_requested());
    }

    #[test]
    fn out_of_range_value_rejected() {
        assert!(KeyUpdate::parse(&[0x02]).is_err());
    }
}
