//! key_share extension (RFC 8446 Section 4.2.8).
//!
//! Three wire shapes share the extension id: the client offers a list of
//! (group, public key) entries, the server answers with exactly one, and a
//! retry request names just the group it wants a share for. Which shape a
//! payload has follows from the carrier alone.

use log::debug;
use nom::multi::length_data;
use nom::number::complete::be_u16;
use nom::IResult;

use crate::error::Error;
use crate::types::NamedGroup;

use super::state::{set_once, KeyShareEntry, NegotiationState};
use super::Carrier;

fn parse_entry(input: &[u8]) -> IResult<&[u8], (NamedGroup, &[u8])> {
    let (input, group) = NamedGroup::parse(input)?;
    let (input, key_exchange) = length_data(be_u16)(input)?;
    Ok((input, (group, key_exchange)))
}

/// Parse the client's share list, dropping entries for groups we do not
/// recognize.
fn parse_offer(input: &[u8]) -> IResult<&[u8], Vec<KeyShareEntry>> {
    let (input, mut list) = length_data(be_u16)(input)?;

    let mut entries: Vec<KeyShareEntry> = Vec::new();
    while !list.is_empty() {
        let (rest, (group, key_exchange)) = parse_entry(list)?;
        list = rest;

        if !matches!(group, NamedGroup::Unknown(_)) {
            entries.push(KeyShareEntry::new(group, key_exchange.to_vec()));
        }
    }

    Ok((input, entries))
}

fn serialize_entry(out: &mut Vec<u8>, group: NamedGroup, key_exchange: &[u8]) {
    out.extend_from_slice(&group.as_u16().to_be_bytes());
    out.extend_from_slice(&(key_exchange.len() as u16).to_be_bytes());
    out.extend_from_slice(key_exchange);
}

/// ClientHello producer: one entry per locally started key exchange.
///
/// An empty list is legal and asks the server to pick a group via a retry
/// request. The extension is omitted entirely for a pure legacy offer.
pub(super) fn produce_offer(
    state: &NegotiationState,
    _: Carrier,
) -> Result<Option<Vec<u8>>, Error> {
    if !state.offers_tls13() {
        return Ok(None);
    }

    let mut entries = Vec::new();
    for share in state.local_shares() {
        serialize_entry(&mut entries, share.group(), share.pub_key());
    }

    let mut payload = Vec::with_capacity(2 + entries.len());
    payload.extend_from_slice(&(entries.len() as u16).to_be_bytes());
    payload.extend_from_slice(&entries);
    Ok(Some(payload))
}

pub(super) fn load_offer(
    state: &mut NegotiationState,
    _: Carrier,
    payload: &[u8],
) -> Result<(), Error> {
    let (rest, entries) = parse_offer(payload)?;
    if !rest.is_empty() {
        return Err(Error::Decode("trailing bytes in key_share"));
    }
    for (i, entry) in entries.iter().enumerate() {
        if entries[..i].iter().any(|e| e.group == entry.group) {
            return Err(Error::IllegalParameter("duplicate key_share group"));
        }
    }
    set_once(&mut state.peer_shares, entries, "key_share loaded twice")
}

/// Server trade: walk our group preference list against the peer's groups.
/// The first mutual group with a share wins outright; failing that, the
/// first mutual group becomes the retry request. No mutual group at all
/// means the handshake cannot proceed.
pub(super) fn trade_offer(state: &mut NegotiationState, _: Carrier) -> Result<(), Error> {
    let negotiated = state
        .negotiated_version
        .ok_or(Error::Internal("key_share traded before version negotiation"))?;
    if !negotiated.uses_tls13_schedule() {
        debug!("Ignoring key_share under {}", negotiated);
        return Ok(());
    }

    let shares = state
        .peer_shares
        .as_ref()
        .ok_or(Error::Internal("key_share traded before load"))?;
    let peer_groups = state
        .peer_groups
        .as_ref()
        .ok_or(Error::MissingExtension("supported_groups must accompany key_share"))?;

    let mut retry = None;
    for group in &state.groups {
        if !peer_groups.contains(group) {
            continue;
        }
        if let Some(share) = shares.iter().find(|s| s.group == *group) {
            debug!("Negotiated group {:?} from offered shares", group);
            return set_once(&mut state.chosen_share, share.clone(), "group negotiated twice");
        }
        if retry.is_none() {
            retry = Some(*group);
        }
    }

    match retry {
        Some(group) => {
            debug!("No usable share offered, requesting a retry with {:?}", group);
            set_once(&mut state.hrr_group, group, "retry group chosen twice")
        }
        None => Err(Error::HandshakeFailure("no mutually supported key exchange group")),
    }
}

/// Server absence handler: a 1.3 hello that lists groups but shares no
/// key_share extension at all is malformed. Legacy hellos never carry one.
pub(super) fn absent_offer(state: &mut NegotiationState, _: Carrier) -> Result<(), Error> {
    let negotiated = state
        .negotiated_version
        .ok_or(Error::Internal("key_share traded before version negotiation"))?;

    if negotiated.uses_tls13_schedule() && state.peer_groups.is_some() {
        return Err(Error::MissingExtension(
            "key_share must accompany supported_groups",
        ));
    }
    Ok(())
}

/// ServerHello producer: the single share answering the negotiated group.
pub(super) fn produce_answer(
    state: &NegotiationState,
    _: Carrier,
) -> Result<Option<Vec<u8>>, Error> {
    let negotiated = state
        .negotiated_version
        .ok_or(Error::Internal("producing a hello before version negotiation"))?;
    if !negotiated.uses_tls13_schedule() {
        return Ok(None);
    }

    let chosen = state
        .chosen_share
        .as_ref()
        .ok_or(Error::Internal("producing a server hello without a negotiated group"))?;
    let local = state
        .local_share_for(chosen.group)
        .ok_or(Error::Internal("no local key exchange for the negotiated group"))?;

    let mut payload = Vec::new();
    serialize_entry(&mut payload, local.group(), local.pub_key());
    Ok(Some(payload))
}

pub(super) fn load_answer(
    state: &mut NegotiationState,
    _: Carrier,
    payload: &[u8],
) -> Result<(), Error> {
    let (rest, (group, key_exchange)) = parse_entry(payload)?;
    if !rest.is_empty() {
        return Err(Error::Decode("trailing bytes in key_share"));
    }
    set_once(
        &mut state.peer_share,
        KeyShareEntry::new(group, key_exchange.to_vec()),
        "key_share loaded twice",
    )
}

/// Client trade: the server must answer with a group we offered a share
/// for, anything else is a protocol violation.
pub(super) fn trade_answer(state: &mut NegotiationState, _: Carrier) -> Result<(), Error> {
    let negotiated = state
        .negotiated_version
        .ok_or(Error::Internal("key_share traded before version negotiation"))?;
    if !negotiated.uses_tls13_schedule() {
        debug!("Ignoring key_share under {}", negotiated);
        return Ok(());
    }

    let share = state
        .peer_share
        .as_ref()
        .ok_or(Error::Internal("key_share traded before load"))?;
    if !state.groups.contains(&share.group) {
        return Err(Error::IllegalParameter("server answered a group we did not offer"));
    }
    if state.local_share_for(share.group).is_none() {
        return Err(Error::IllegalParameter("server answered a group we sent no share for"));
    }

    debug!("Server selected group {:?}", share.group);
    set_once(&mut state.chosen_share, share.clone(), "group negotiated twice")
}

/// A 1.3 server hello without a share has nothing to key the handshake.
pub(super) fn absent_answer(state: &mut NegotiationState, _: Carrier) -> Result<(), Error> {
    let negotiated = state
        .negotiated_version
        .ok_or(Error::Internal("key_share traded before version negotiation"))?;

    if negotiated.uses_tls13_schedule() {
        return Err(Error::MissingExtension("key_share missing from server hello"));
    }
    Ok(())
}

/// HelloRetryRequest producer: just the group the retried hello must share.
/// A cookie-only retry carries no key_share at all.
pub(super) fn produce_retry(
    state: &NegotiationState,
    _: Carrier,
) -> Result<Option<Vec<u8>>, Error> {
    Ok(state
        .hrr_group
        .map(|group| group.as_u16().to_be_bytes().to_vec()))
}

pub(super) fn load_retry(
    state: &mut NegotiationState,
    _: Carrier,
    payload: &[u8],
) -> Result<(), Error> {
    let (rest, group) = NamedGroup::parse(payload)?;
    if !rest.is_empty() {
        return Err(Error::Decode("trailing bytes in key_share"));
    }
    set_once(&mut state.retry_group, group, "key_share loaded twice")
}

/// Client trade for a retry request. Requesting a group we already sent a
/// share for proves the server saw our offer and is stalling, abort.
pub(super) fn trade_retry(state: &mut NegotiationState, _: Carrier) -> Result<(), Error> {
    let group = state
        .retry_group
        .ok_or(Error::Internal("key_share traded before load"))?;

    if !state.groups.contains(&group) {
        return Err(Error::IllegalParameter("retry requested a group we did not offer"));
    }
    if state.local_share_for(group).is_some() {
        return Err(Error::IllegalParameter("retry requested a group already shared"));
    }

    debug!("Server requested a retry with group {:?}", group);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::tests::test_state;
    use super::*;
    use crate::buffer::Buf;
    use crate::crypto::provider::ActiveKeyExchange;
    use crate::types::{ProtocolVersion, Role};
    use std::sync::Arc;

    #[derive(Debug)]
    struct FixedShare(NamedGroup, Vec<u8>);

    impl ActiveKeyExchange for FixedShare {
        fn pub_key(&self) -> &[u8] {
            &self.1
        }

        fn complete(&self, _: &[u8], _: &mut Buf) -> Result<(), String> {
            Err("not a real key exchange".into())
        }

        fn group(&self) -> NamedGroup {
            self.0
        }
    }

    fn share(group: NamedGroup, byte: u8) -> Arc<dyn ActiveKeyExchange> {
        Arc::new(FixedShare(group, vec![byte; 32]))
    }

    fn tls13_server() -> NegotiationState {
        let mut state = test_state(Role::Server);
        state.negotiated_version = Some(ProtocolVersion::Tls1_3);
        state
    }

    #[test]
    fn offer_lists_local_shares() {
        let mut state = test_state(Role::Client);
        state.stage_local_share(share(NamedGroup::X25519, 0xAA));

        let payload = produce_offer(&state, Carrier::ClientHello).unwrap().unwrap();
        assert_eq!(&payload[..2], &[0x00, 0x24]); // 36 bytes of entries
        assert_eq!(&payload[2..4], &[0x00, 0x1D]); // x25519
        assert_eq!(&payload[4..6], &[0x00, 0x20]); // 32 byte key
        assert_eq!(&payload[6..], &[0xAA; 32]);
    }

    #[test]
    fn empty_offer_is_a_retry_request() {
        let state = test_state(Role::Client);
        let payload = produce_offer(&state, Carrier::ClientHello).unwrap().unwrap();
        assert_eq!(payload, &[0x00, 0x00]);
    }

    #[test]
    fn unknown_groups_are_dropped_on_load() {
        let mut state = tls13_server();
        // One bogus group, one x25519 share.
        let mut payload = vec![0x00, 0x2A];
        payload.extend_from_slice(&[0xAB, 0xCD, 0x00, 0x02, 0x01, 0x02]);
        payload.extend_from_slice(&[0x00, 0x1D, 0x00, 0x20]);
        payload.extend_from_slice(&[0xAA; 32]);

        load_offer(&mut state, Carrier::ClientHello, &payload).unwrap();
        let shares = state.peer_shares.as_ref().unwrap();
        assert_eq!(shares.len(), 1);
        assert_eq!(shares[0].group, NamedGroup::X25519);
    }

    #[test]
    fn duplicate_group_in_offer_is_rejected() {
        let mut state = tls13_server();
        let mut payload = vec![0x00, 0x10];
        payload.extend_from_slice(&[0x00, 0x1D, 0x00, 0x04, 1, 2, 3, 4]);
        payload.extend_from_slice(&[0x00, 0x1D, 0x00, 0x04, 5, 6, 7, 8]);

        let err = load_offer(&mut state, Carrier::ClientHello, &payload).unwrap_err();
        assert!(matches!(err, Error::IllegalParameter(_)));
    }

    #[test]
    fn server_takes_the_first_preferred_group_with_a_share() {
        let mut state = tls13_server();
        state.peer_groups = Some(
            [NamedGroup::Secp256r1, NamedGroup::X25519]
                .into_iter()
                .collect(),
        );
        state.peer_shares = Some(vec![
            KeyShareEntry::new(NamedGroup::Secp256r1, vec![0xBB; 65]),
            KeyShareEntry::new(NamedGroup::X25519, vec![0xAA; 32]),
        ]);

        trade_offer(&mut state, Carrier::ClientHello).unwrap();
        // Our preference list leads with x25519.
        assert_eq!(state.chosen_share.as_ref().unwrap().group, NamedGroup::X25519);
        assert!(state.hrr_group.is_none());
    }

    #[test]
    fn mutual_group_without_a_share_requests_a_retry() {
        let mut state = tls13_server();
        state.peer_groups = Some([NamedGroup::Secp384r1].into_iter().collect());
        state.peer_shares = Some(Vec::new());

        trade_offer(&mut state, Carrier::ClientHello).unwrap();
        assert!(state.chosen_share.is_none());
        assert_eq!(state.hrr_group, Some(NamedGroup::Secp384r1));
    }

    #[test]
    fn disjoint_groups_fail_the_handshake() {
        let mut state = tls13_server();
        state.peer_groups = Some([NamedGroup::Ffdhe3072].into_iter().collect());
        state.peer_shares = Some(Vec::new());

        let err = trade_offer(&mut state, Carrier::ClientHello).unwrap_err();
        assert!(matches!(err, Error::HandshakeFailure(_)));
    }

    #[test]
    fn share_outside_supported_groups_is_not_chosen() {
        let mut state = tls13_server();
        state.peer_groups = Some([NamedGroup::Secp256r1].into_iter().collect());
        // A share for a group missing from the peer's own group list.
        state.peer_shares = Some(vec![KeyShareEntry::new(NamedGroup::X25519, vec![0xAA; 32])]);

        trade_offer(&mut state, Carrier::ClientHello).unwrap();
        assert!(state.chosen_share.is_none());
        assert_eq!(state.hrr_group, Some(NamedGroup::Secp256r1));
    }

    #[test]
    fn missing_offer_with_groups_is_fatal_under_tls13() {
        let mut state = tls13_server();
        state.peer_groups = Some([NamedGroup::X25519].into_iter().collect());

        let err = absent_offer(&mut state, Carrier::ClientHello).unwrap_err();
        assert!(matches!(err, Error::MissingExtension(_)));

        let mut state = tls13_server();
        state.negotiated_version = Some(ProtocolVersion::Tls1_2);
        state.peer_groups = Some([NamedGroup::X25519].into_iter().collect());
        absent_offer(&mut state, Carrier::ClientHello).unwrap();
    }

    #[test]
    fn answer_roundtrip_carries_the_local_share() {
        let mut server = tls13_server();
        server.stage_local_share(share(NamedGroup::X25519, 0xCC));
        server.chosen_share = Some(KeyShareEntry::new(NamedGroup::X25519, vec![0xAA; 32]));

        let payload = produce_answer(&server, Carrier::ServerHello).unwrap().unwrap();

        let mut client = test_state(Role::Client);
        client.negotiated_version = Some(ProtocolVersion::Tls1_3);
        client.stage_local_share(share(NamedGroup::X25519, 0xDD));
        load_answer(&mut client, Carrier::ServerHello, &payload).unwrap();
        trade_answer(&mut client, Carrier::ServerHello).unwrap();

        let chosen = client.chosen_share.as_ref().unwrap();
        assert_eq!(chosen.group, NamedGroup::X25519);
        assert_eq!(chosen.key_exchange, vec![0xCC; 32]);
    }

    #[test]
    fn answer_for_an_unshared_group_is_rejected() {
        let mut client = test_state(Role::Client);
        client.negotiated_version = Some(ProtocolVersion::Tls1_3);
        client.stage_local_share(share(NamedGroup::X25519, 0xDD));
        client.peer_share = Some(KeyShareEntry::new(NamedGroup::Secp256r1, vec![0xBB; 65]));

        let err = trade_answer(&mut client, Carrier::ServerHello).unwrap_err();
        assert!(matches!(err, Error::IllegalParameter(_)));
    }

    #[test]
    fn legacy_hello_omits_the_answer() {
        let mut server = tls13_server();
        server.negotiated_version = Some(ProtocolVersion::Tls1_2);
        assert_eq!(produce_answer(&server, Carrier::ServerHello).unwrap(), None);
    }

    #[test]
    fn retry_for_an_already_shared_group_is_rejected() {
        let mut client = test_state(Role::Client);
        client.stage_local_share(share(NamedGroup::X25519, 0xDD));

        load_retry(&mut client, Carrier::HelloRetryRequest, &[0x00, 0x1D]).unwrap();
        let err = trade_retry(&mut client, Carrier::HelloRetryRequest).unwrap_err();
        assert!(matches!(err, Error::IllegalParameter(_)));
    }

    #[test]
    fn retry_for_an_unoffered_group_is_rejected() {
        let mut client = test_state(Role::Client);
        load_retry(&mut client, Carrier::HelloRetryRequest, &[0xAB, 0xCD]).unwrap();

        let err = trade_retry(&mut client, Carrier::HelloRetryRequest).unwrap_err();
        assert!(matches!(err, Error::IllegalParameter(_)));
    }

    #[test]
    fn retry_for_a_fresh_offered_group_is_accepted() {
        let mut client = test_state(Role::Client);
        client.stage_local_share(share(NamedGroup::X25519, 0xDD));

        load_retry(&mut client, Carrier::HelloRetryRequest, &[0x00, 0x17]).unwrap();
        trade_retry(&mut client, Carrier::HelloRetryRequest).unwrap();
        assert_eq!(client.retry_group(), Some(NamedGroup::Secp256r1));
    }
}
