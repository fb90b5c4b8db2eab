//! status_request extension (RFC 6066 Section 8).
//!
//! OCSP stapling. The client asks for a stapled revocation response, the
//! server acks with an empty extension and later delivers the response in
//! a CertificateStatus message. Only the legacy versions staple this way,
//! so under 1.3 the request goes unanswered.

use log::debug;
use nom::multi::length_data;
use nom::number::complete::{be_u16, be_u8};

use crate::error::Error;

use super::state::NegotiationState;
use super::Carrier;

const STATUS_TYPE_OCSP: u8 = 1;

pub(super) fn produce_request(
    state: &NegotiationState,
    _: Carrier,
) -> Result<Option<Vec<u8>>, Error> {
    if !state.request_stapling {
        return Ok(None);
    }
    // ocsp status type, empty responder id list, empty request extensions.
    Ok(Some(vec![STATUS_TYPE_OCSP, 0x00, 0x00, 0x00, 0x00]))
}

pub(super) fn load_request(
    state: &mut NegotiationState,
    _: Carrier,
    payload: &[u8],
) -> Result<(), Error> {
    let (rest, status_type) = be_u8(payload)?;
    if status_type != STATUS_TYPE_OCSP {
        debug!("Ignoring status_request of type {}", status_type);
        return Ok(());
    }

    let (rest, _responder_ids) = length_data(be_u16)(rest)?;
    let (rest, _request_extensions) = length_data(be_u16)(rest)?;
    if !rest.is_empty() {
        return Err(Error::Decode("trailing bytes in status_request"));
    }

    state.stapling_offered = true;
    Ok(())
}

pub(super) fn trade_flag(state: &mut NegotiationState, carrier: Carrier) -> Result<(), Error> {
    let negotiated = state
        .negotiated_version
        .ok_or(Error::Internal("status_request traded before version negotiation"))?;

    if !negotiated.uses_legacy_schedule() {
        debug!("Ignoring status_request under {}", negotiated);
        return Ok(());
    }

    match carrier {
        Carrier::ClientHello => {
            state.stapling = state.stapling_offered && state.can_staple;
        }
        Carrier::ServerHello => {
            state.stapling = state.stapling_acked;
        }
        _ => return Err(Error::Internal("status_request outside a hello")),
    }
    Ok(())
}

/// ServerHello ack, carried only when a CertificateStatus will follow.
pub(super) fn produce_ack(
    state: &NegotiationState,
    _: Carrier,
) -> Result<Option<Vec<u8>>, Error> {
    if state.stapling {
        Ok(Some(Vec::new()))
    } else {
        Ok(None)
    }
}

pub(super) fn load_ack(
    state: &mut NegotiationState,
    _: Carrier,
    payload: &[u8],
) -> Result<(), Error> {
    if !payload.is_empty() {
        return Err(Error::Decode("status_request ack carries no payload"));
    }
    state.stapling_acked = true;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::tests::test_state;
    use super::*;
    use crate::types::{ProtocolVersion, Role};

    fn stapling_server() -> NegotiationState {
        let mut state = test_state(Role::Server);
        state.can_staple = true;
        state.negotiated_version = Some(ProtocolVersion::Tls1_2);
        state
    }

    #[test]
    fn request_is_acked_when_the_server_can_staple() {
        let mut server = stapling_server();
        load_request(&mut server, Carrier::ClientHello, &[0x01, 0x00, 0x00, 0x00, 0x00]).unwrap();
        trade_flag(&mut server, Carrier::ClientHello).unwrap();

        assert!(server.stapling);
        let ack = produce_ack(&server, Carrier::ServerHello).unwrap();
        assert_eq!(ack, Some(Vec::new()));
    }

    #[test]
    fn server_without_a_response_stays_silent() {
        let mut server = stapling_server();
        server.can_staple = false;
        load_request(&mut server, Carrier::ClientHello, &[0x01, 0x00, 0x00, 0x00, 0x00]).unwrap();
        trade_flag(&mut server, Carrier::ClientHello).unwrap();

        assert!(!server.stapling);
        assert_eq!(produce_ack(&server, Carrier::ServerHello).unwrap(), None);
    }

    #[test]
    fn unknown_status_type_is_ignored() {
        let mut server = stapling_server();
        load_request(&mut server, Carrier::ClientHello, &[0x07, 0x00]).unwrap();
        trade_flag(&mut server, Carrier::ClientHello).unwrap();
        assert!(!server.stapling);
    }

    #[test]
    fn no_stapling_under_tls13() {
        let mut server = stapling_server();
        server.negotiated_version = Some(ProtocolVersion::Tls1_3);
        load_request(&mut server, Carrier::ClientHello, &[0x01, 0x00, 0x00, 0x00, 0x00]).unwrap();
        trade_flag(&mut server, Carrier::ClientHello).unwrap();
        assert!(!server.stapling);
    }

    #[test]
    fn client_request_and_ack() {
        let mut client = test_state(Role::Client);
        client.request_stapling = true;
        let request = produce_request(&client, Carrier::ClientHello).unwrap().unwrap();
        assert_eq!(request, &[0x01, 0x00, 0x00, 0x00, 0x00]);

        client.negotiated_version = Some(ProtocolVersion::Tls1_2);
        load_ack(&mut client, Carrier::ServerHello, &[]).unwrap();
        trade_flag(&mut client, Carrier::ServerHello).unwrap();
        assert!(client.stapling);
    }
}
