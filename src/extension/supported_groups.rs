//! supported_groups extension (RFC 8446 Section 4.2.7, RFC 7919).
//!
//! A plain preference list of named groups. In a ClientHello it scopes the
//! key shares the client may offer; in EncryptedExtensions the server sends
//! its own list back, informational only for this connection.

use nom::multi::length_data;
use nom::number::complete::be_u16;
use nom::IResult;

use crate::error::Error;
use crate::types::{NamedGroup, NamedGroupVec};

use super::state::{set_once, NegotiationState};
use super::Carrier;

fn parse_list(input: &[u8]) -> IResult<&[u8], NamedGroupVec> {
    let (input, mut list) = length_data(be_u16)(input)?;

    let mut groups = NamedGroupVec::new();
    while !list.is_empty() {
        let (rest, group) = NamedGroup::parse(list)?;
        list = rest;
        if !matches!(group, NamedGroup::Unknown(_)) && groups.len() < groups.capacity() {
            groups.push(group);
        }
    }

    Ok((input, groups))
}

pub(super) fn produce_list(
    state: &NegotiationState,
    _: Carrier,
) -> Result<Option<Vec<u8>>, Error> {
    if state.groups.is_empty() {
        return Ok(None);
    }

    let mut payload = Vec::with_capacity(2 + state.groups.len() * 2);
    payload.extend_from_slice(&((state.groups.len() * 2) as u16).to_be_bytes());
    for group in &state.groups {
        payload.extend_from_slice(&group.as_u16().to_be_bytes());
    }
    Ok(Some(payload))
}

pub(super) fn load_list(
    state: &mut NegotiationState,
    _: Carrier,
    payload: &[u8],
) -> Result<(), Error> {
    let (rest, groups) = parse_list(payload)?;
    if !rest.is_empty() {
        return Err(Error::Decode("trailing bytes in supported_groups"));
    }
    set_once(&mut state.peer_groups, groups, "supported_groups loaded twice")
}

#[cfg(test)]
mod tests {
    use super::super::tests::test_state;
    use super::*;
    use crate::types::Role;

    #[test]
    fn list_roundtrip() {
        let client = test_state(Role::Client);
        let payload = produce_list(&client, Carrier::ClientHello).unwrap().unwrap();
        assert_eq!(
            payload,
            &[0x00, 0x08, 0x00, 0x1D, 0x00, 0x17, 0x00, 0x18, 0x01, 0x00]
        );

        let mut server = test_state(Role::Server);
        load_list(&mut server, Carrier::ClientHello, &payload).unwrap();
        assert_eq!(
            server.peer_groups.as_ref().unwrap().as_slice(),
            NamedGroup::supported()
        );
    }

    #[test]
    fn unknown_groups_are_dropped() {
        let mut server = test_state(Role::Server);
        load_list(
            &mut server,
            Carrier::ClientHello,
            &[0x00, 0x06, 0xAB, 0xCD, 0x00, 0x1D, 0x4F, 0x11],
        )
        .unwrap();

        let groups = server.peer_groups.as_ref().unwrap();
        assert_eq!(groups.as_slice(), &[NamedGroup::X25519]);
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut server = test_state(Role::Server);
        let err = load_list(
            &mut server,
            Carrier::ClientHello,
            &[0x00, 0x02, 0x00, 0x1D, 0xFF],
        )
        .unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }
}
