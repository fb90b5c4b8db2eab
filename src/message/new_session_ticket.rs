use nom::number::complete::{be_u16, be_u32, be_u8};
use nom::{bytes::complete::take, IResult};

use super::extension::{parse_extensions, serialize_extensions, ExtensionVec};

/// A 1.3 resumption ticket, issued by the server after its Finished.
#[derive(Debug, PartialEq, Eq)]
pub struct NewSessionTicket<'a> {
    pub ticket_lifetime: u32,
    pub ticket_age_add: u32,
    pub ticket_nonce: &'a [u8],
    pub ticket: &'a [u8],
    pub extensions: ExtensionVec<'a>,
}

impl<'a> NewSessionTicket<'a> {
    pub fn new(
        ticket_lifetime: u32,
        ticket_age_add: u32,
        ticket_nonce: &'a [u8],
        ticket: &'a [u8],
    ) -> Self {
        NewSessionTicket {
            ticket_lifetime,
            ticket_age_add,
            ticket_nonce,
            ticket,
            extensions: ExtensionVec::new(),
        }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], NewSessionTicket<'a>> {
        let (input, ticket_lifetime) = be_u32(input)?;
        let (input, ticket_age_add) = be_u32(input)?;
        let (input, nonce_len) = be_u8(input)?;
        let (input, ticket_nonce) = take(nonce_len)(input)?;
        let (input, ticket_len) = be_u16(input)?;
        let (input, ticket) = take(ticket_len)(input)?;
        let (input, extensions) = parse_extensions(input)?;

        Ok((
            input,
            NewSessionTicket {
                ticket_lifetime,
                ticket_age_add,
                ticket_nonce,
                ticket,
                extensions,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.ticket_lifetime.to_be_bytes());
        output.extend_from_slice(&self.ticket_age_add.to_be_bytes());
        output.push(self.ticket_nonce.len() as u8);
        output.extend_from_slice(self.ticket_nonce);
        output.extend_from_slice(&(self.ticket.len() as u16).to_be_bytes());
        output.extend_from_slice(self.ticket);
        serialize_extensions(&self.extensions, output);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const MESSAGE: &[u8] = &[
        0x00, 0x01, 0x51, 0x80, // lifetime 86400
        0x12, 0x34, 0x56, 0x78, // age_add
        0x02, // nonce length
        0x00, 0x01, // nonce
        0x00, 0x04, // ticket length
        0xAA, 0xBB, 0xCC, 0xDD, // ticket
        0x00, 0x00, // extensions (empty)
    ];

    #[test]
    fn roundtrip() {
        let new_session_ticket =
            NewSessionTicket::new(86400, 0x12345678, &MESSAGE[9..11], &MESSAGE[13..17]);

        let mut serialized = Vec::new();
        new_session_ticket.serialize(&mut serialized);
        assert_eq!(serialized, MESSAGE);

        let (rest, parsed) = NewSessionTicket::parse(&serialized).unwrap();
        assert_eq!(parsed, new_session_ticket);
        assert!(rest.is_empty());
    }

    #[test]
    fn truncated_ticket_rejected() {
        assert!(NewSessionTicket::parse(&MESSAGE[..15]).is_err());
    }
}
