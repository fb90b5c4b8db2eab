//! signature_algorithms extension (RFC 8446 Section 4.2.3).
//!
//! The schemes a side accepts in handshake signatures, as a preference
//! list. Sent in the ClientHello to scope the server's CertificateVerify
//! and in a CertificateRequest to scope the client's.

use nom::multi::length_data;
use nom::number::complete::be_u16;
use nom::IResult;

use crate::error::Error;
use crate::types::{SignatureScheme, SignatureSchemeVec};

use super::state::{set_once, NegotiationState};
use super::Carrier;

fn parse_list(input: &[u8]) -> IResult<&[u8], SignatureSchemeVec> {
    let (input, mut list) = length_data(be_u16)(input)?;

    let mut schemes = SignatureSchemeVec::new();
    while !list.is_empty() {
        let (rest, scheme) = SignatureScheme::parse(list)?;
        list = rest;
        if !matches!(scheme, SignatureScheme::Unknown(_)) && schemes.len() < schemes.capacity() {
            schemes.push(scheme);
        }
    }

    Ok((input, schemes))
}

pub(super) fn produce_list(
    state: &NegotiationState,
    _: Carrier,
) -> Result<Option<Vec<u8>>, Error> {
    if state.schemes.is_empty() {
        return Ok(None);
    }

    let mut payload = Vec::with_capacity(2 + state.schemes.len() * 2);
    payload.extend_from_slice(&((state.schemes.len() * 2) as u16).to_be_bytes());
    for scheme in &state.schemes {
        payload.extend_from_slice(&scheme.as_u16().to_be_bytes());
    }
    Ok(Some(payload))
}

pub(super) fn load_list(
    state: &mut NegotiationState,
    _: Carrier,
    payload: &[u8],
) -> Result<(), Error> {
    let (rest, schemes) = parse_list(payload)?;
    if !rest.is_empty() {
        return Err(Error::Decode("trailing bytes in signature_algorithms"));
    }
    set_once(&mut state.peer_schemes, schemes, "signature_algorithms loaded twice")
}

/// ClientHello absence: under 1.3 the extension is mandatory for any
/// certificate-authenticated handshake. Legacy hellos fall back to the
/// protocol's default algorithms.
pub(super) fn absent_list(state: &mut NegotiationState, _: Carrier) -> Result<(), Error> {
    let negotiated = state
        .negotiated_version
        .ok_or(Error::Internal("signature_algorithms traded before version negotiation"))?;

    if negotiated.uses_tls13_schedule() {
        return Err(Error::MissingExtension(
            "signature_algorithms missing from client hello",
        ));
    }
    Ok(())
}

/// A 1.3 CertificateRequest without signature_algorithms leaves the client
/// nothing to sign with.
pub(super) fn absent_required(_: &mut NegotiationState, _: Carrier) -> Result<(), Error> {
    Err(Error::MissingExtension(
        "signature_algorithms missing from certificate request",
    ))
}

#[cfg(test)]
mod tests {
    use super::super::tests::test_state;
    use super::*;
    use crate::types::{ProtocolVersion, Role};

    #[test]
    fn list_roundtrip() {
        let client = test_state(Role::Client);
        let payload = produce_list(&client, Carrier::ClientHello).unwrap().unwrap();
        assert_eq!(
            payload,
            &[0x00, 0x0A, 0x04, 0x03, 0x05, 0x03, 0x08, 0x04, 0x08, 0x05, 0x04, 0x01]
        );

        let mut server = test_state(Role::Server);
        load_list(&mut server, Carrier::ClientHello, &payload).unwrap();
        assert_eq!(
            server.peer_schemes.as_ref().unwrap().as_slice(),
            SignatureScheme::supported()
        );
    }

    #[test]
    fn unknown_schemes_are_dropped() {
        let mut server = test_state(Role::Server);
        load_list(
            &mut server,
            Carrier::ClientHello,
            &[0x00, 0x04, 0xFE, 0x00, 0x08, 0x04],
        )
        .unwrap();

        let schemes = server.peer_schemes.as_ref().unwrap();
        assert_eq!(schemes.as_slice(), &[SignatureScheme::RSA_PSS_RSAE_SHA256]);
    }

    #[test]
    fn absence_is_fatal_only_under_tls13() {
        let mut server = test_state(Role::Server);
        server.negotiated_version = Some(ProtocolVersion::Tls1_3);
        let err = absent_list(&mut server, Carrier::ClientHello).unwrap_err();
        assert!(matches!(err, Error::MissingExtension(_)));

        let mut server = test_state(Role::Server);
        server.negotiated_version = Some(ProtocolVersion::Tls1_2);
        absent_list(&mut server, Carrier::ClientHello).unwrap();
    }
}
