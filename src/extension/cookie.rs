//! cookie extension (RFC 8446 Section 4.2.2).
//!
//! The server hands an opaque cookie out in a retry request; the retried
//! hello echoes it back byte for byte. Whether the echoed value is any good
//! is judged by [`crate::cookie::HelloCookieManager`], not here. The
//! handlers only move bytes between the wire and the negotiation state.

use nom::multi::length_data;
use nom::number::complete::be_u16;

use crate::buffer::{Buf, ToBuf};
use crate::error::Error;

use super::state::{set_once, NegotiationState};
use super::Carrier;

fn serialize(cookie: &Buf) -> Vec<u8> {
    let mut payload = Vec::with_capacity(2 + cookie.len());
    payload.extend_from_slice(&(cookie.len() as u16).to_be_bytes());
    payload.extend_from_slice(cookie);
    payload
}

fn parse(payload: &[u8]) -> Result<Buf, Error> {
    let (rest, cookie) = length_data(be_u16)(payload)?;
    if !rest.is_empty() {
        return Err(Error::Decode("trailing bytes in cookie"));
    }
    if cookie.is_empty() {
        return Err(Error::Decode("empty cookie"));
    }
    Ok(cookie.to_buf())
}

/// ClientHello producer: echo the cookie a retry request handed us.
pub(super) fn produce_echo(
    state: &NegotiationState,
    _: Carrier,
) -> Result<Option<Vec<u8>>, Error> {
    Ok(state.cookie_out.as_ref().map(serialize))
}

/// Server side load of an echoed cookie.
pub(super) fn load_echo(
    state: &mut NegotiationState,
    _: Carrier,
    payload: &[u8],
) -> Result<(), Error> {
    let cookie = parse(payload)?;
    set_once(&mut state.cookie_in, cookie, "cookie loaded twice")
}

/// HelloRetryRequest producer: the freshly issued cookie, staged by the
/// context before the retry request is built.
pub(super) fn produce_issue(
    state: &NegotiationState,
    carrier: Carrier,
) -> Result<Option<Vec<u8>>, Error> {
    produce_echo(state, carrier)
}

/// Client side load of an issued cookie, kept to echo in the next hello.
pub(super) fn load_issue(
    state: &mut NegotiationState,
    _: Carrier,
    payload: &[u8],
) -> Result<(), Error> {
    let cookie = parse(payload)?;
    set_once(&mut state.cookie_out, cookie, "cookie loaded twice")
}

#[cfg(test)]
mod tests {
    use super::super::tests::test_state;
    use super::*;
    use crate::types::Role;

    #[test]
    fn issued_cookie_echoes_back() {
        let mut server = test_state(Role::Server);
        server.stage_cookie(Buf::from_slice(&[0xC0, 0x0C, 0x1E, 0x5A]));
        let issued = produce_issue(&server, Carrier::HelloRetryRequest)
            .unwrap()
            .unwrap();
        assert_eq!(issued, &[0x00, 0x04, 0xC0, 0x0C, 0x1E, 0x5A]);

        let mut client = test_state(Role::Client);
        load_issue(&mut client, Carrier::HelloRetryRequest, &issued).unwrap();
        let echoed = produce_echo(&client, Carrier::ClientHello).unwrap().unwrap();
        assert_eq!(echoed, issued);

        let mut server = test_state(Role::Server);
        load_echo(&mut server, Carrier::ClientHello, &echoed).unwrap();
        assert_eq!(
            server.cookie_in.as_deref(),
            Some(&[0xC0, 0x0C, 0x1E, 0x5A][..])
        );
    }

    #[test]
    fn first_hello_has_no_cookie() {
        let client = test_state(Role::Client);
        assert_eq!(produce_echo(&client, Carrier::ClientHello).unwrap(), None);
    }

    #[test]
    fn empty_cookie_is_malformed() {
        let mut server = test_state(Role::Server);
        let err = load_echo(&mut server, Carrier::ClientHello, &[0x00, 0x00]).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }
}
