//! supported_versions extension (RFC 8446 Section 4.2.1).
//!
//! From 1.3 on, version negotiation happens here rather than in the hello's
//! legacy version field: the initiator offers a list, the responder answers
//! with one selection. When the extension is absent both sides fall back to
//! negotiating from the legacy field, which can only ever reach 1.2.

use log::debug;
use nom::number::complete::{be_u16, be_u8};
use nom::IResult;

use crate::error::Error;
use crate::types::{ProtocolVersion, VersionVec};

use super::state::{set_once, NegotiationState};
use super::Carrier;

fn parse_offer(input: &[u8]) -> IResult<&[u8], VersionVec> {
    let (mut input, list_len) = be_u8(input)?;
    let mut versions = VersionVec::new();
    let mut remaining = list_len as usize;

    while remaining >= 2 {
        let (rest, version) = ProtocolVersion::parse(input)?;
        input = rest;
        remaining -= 2;
        if !matches!(version, ProtocolVersion::Unknown(_)) && versions.len() < versions.capacity() {
            versions.push(version);
        }
    }

    Ok((input, versions))
}

/// ClientHello producer: the full offer list, preference order.
///
/// Omitted entirely when no 1.3 version is on offer, leaving the legacy
/// field to do the talking.
pub(super) fn produce_offer(
    state: &NegotiationState,
    _: Carrier,
) -> Result<Option<Vec<u8>>, Error> {
    if !state.offers_tls13() {
        return Ok(None);
    }

    let mut payload = Vec::with_capacity(1 + state.versions.len() * 2);
    payload.push((state.versions.len() * 2) as u8);
    for version in &state.versions {
        payload.extend_from_slice(&version.as_u16().to_be_bytes());
    }
    Ok(Some(payload))
}

pub(super) fn load_offer(
    state: &mut NegotiationState,
    _: Carrier,
    payload: &[u8],
) -> Result<(), Error> {
    let (rest, versions) = parse_offer(payload)?;
    if !rest.is_empty() {
        return Err(Error::Decode("trailing bytes in supported_versions"));
    }
    set_once(&mut state.offered_versions, versions, "supported_versions loaded twice")
}

/// Server trade: pick by our preference order from the peer's offer.
pub(super) fn trade_offer(state: &mut NegotiationState, _: Carrier) -> Result<(), Error> {
    let offered = state
        .offered_versions
        .as_ref()
        .ok_or(Error::Internal("supported_versions traded before load"))?;

    let selected = state
        .versions
        .iter()
        .find(|v| offered.contains(v))
        .copied()
        .ok_or(Error::UnsupportedVersion("no mutually supported version"))?;

    debug!("Negotiated {} from supported_versions", selected);
    set_once(&mut state.negotiated_version, selected, "version negotiated twice")
}

/// Server absence handler: negotiate from the hello's legacy version field.
///
/// The legacy field caps capability rather than naming an exact version,
/// so the pick is our best version at or below it, within the same
/// TLS/DTLS family. Nothing above 1.2 is reachable this way.
pub(super) fn absent_offer(state: &mut NegotiationState, _: Carrier) -> Result<(), Error> {
    let candidate = state
        .peer_legacy_version
        .ok_or(Error::Internal("legacy version not staged"))?;

    let selected = state
        .versions
        .iter()
        .find(|v| {
            v.uses_legacy_schedule()
                && v.is_dtls() == candidate.is_dtls()
                && !v.beats(candidate)
        })
        .copied()
        .ok_or(Error::UnsupportedVersion("no acceptable legacy version"))?;

    debug!("Negotiated {} from the legacy version field", selected);
    set_once(&mut state.negotiated_version, selected, "version negotiated twice")
}

/// ServerHello / HelloRetryRequest producer: the single selection.
///
/// A legacy ServerHello omits the extension; its legacy version field is
/// the selection. A retry request is a 1.3 construct and always carries it.
pub(super) fn produce_selected(
    state: &NegotiationState,
    carrier: Carrier,
) -> Result<Option<Vec<u8>>, Error> {
    let negotiated = state
        .negotiated_version
        .ok_or(Error::Internal("producing a hello before version negotiation"))?;

    if carrier == Carrier::ServerHello && !negotiated.uses_tls13_schedule() {
        return Ok(None);
    }

    Ok(Some(negotiated.as_u16().to_be_bytes().to_vec()))
}

pub(super) fn load_selected(
    state: &mut NegotiationState,
    _: Carrier,
    payload: &[u8],
) -> Result<(), Error> {
    let (rest, selected) = ProtocolVersion::parse(payload)?;
    if !rest.is_empty() {
        return Err(Error::Decode("trailing bytes in supported_versions"));
    }
    set_once(&mut state.selected_version, selected, "supported_versions loaded twice")
}

/// Client trade: the selection must come from our offer and must be a
/// version that negotiates via this extension at all.
pub(super) fn trade_selected(state: &mut NegotiationState, _: Carrier) -> Result<(), Error> {
    let selected = state
        .selected_version
        .ok_or(Error::Internal("supported_versions traded before load"))?;

    if !state.versions.contains(&selected) {
        return Err(Error::UnsupportedVersion("server selected a version we did not offer"));
    }
    if !selected.uses_tls13_schedule() {
        return Err(Error::IllegalParameter(
            "legacy version selected through supported_versions",
        ));
    }

    debug!("Server selected {}", selected);
    set_once(&mut state.negotiated_version, selected, "version negotiated twice")
}

/// Client absence handler for a legacy ServerHello.
///
/// The selection is the hello's legacy version field, staged by the
/// context. It must name exactly one of our legacy offers.
pub(super) fn absent_selected(state: &mut NegotiationState, _: Carrier) -> Result<(), Error> {
    let selected = state
        .peer_legacy_version
        .ok_or(Error::Internal("legacy version not staged"))?;

    if selected.uses_tls13_schedule() {
        return Err(Error::IllegalParameter(
            "1.3 selected through the legacy version field",
        ));
    }
    if !state.versions.contains(&selected) {
        return Err(Error::UnsupportedVersion("server selected a version we did not offer"));
    }

    debug!("Server selected {} via the legacy version field", selected);
    set_once(&mut state.negotiated_version, selected, "version negotiated twice")
}

/// A retry request without supported_versions is not a 1.3 retry at all.
pub(super) fn absent_required(_: &mut NegotiationState, _: Carrier) -> Result<(), Error> {
    Err(Error::MissingExtension(
        "supported_versions missing from retry request",
    ))
}
