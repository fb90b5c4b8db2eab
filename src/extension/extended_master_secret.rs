//! extended_master_secret extension (RFC 7627).
//!
//! An empty marker extension. When both sides carry it under a legacy
//! version, the master secret derivation switches from the nonce pair to
//! the session transcript hash, binding the secret to the full handshake.
//! 1.3 binds the transcript in its own schedule, so the marker only ever
//! matters below it.

use log::debug;

use crate::error::Error;

use super::state::NegotiationState;
use super::Carrier;

pub(super) fn produce_offer(
    state: &NegotiationState,
    _: Carrier,
) -> Result<Option<Vec<u8>>, Error> {
    let applies = state.versions.iter().any(|v| v.uses_legacy_schedule());
    if state.offer_ems && applies {
        Ok(Some(Vec::new()))
    } else {
        Ok(None)
    }
}

pub(super) fn load_flag(
    state: &mut NegotiationState,
    carrier: Carrier,
    payload: &[u8],
) -> Result<(), Error> {
    if !payload.is_empty() {
        return Err(Error::Decode("extended_master_secret carries no payload"));
    }
    match carrier {
        Carrier::ClientHello => state.ems_offered = true,
        Carrier::ServerHello => state.ems_acked = true,
        _ => return Err(Error::Internal("extended_master_secret outside a hello")),
    }
    Ok(())
}

pub(super) fn trade_flag(state: &mut NegotiationState, carrier: Carrier) -> Result<(), Error> {
    let negotiated = state
        .negotiated_version
        .ok_or(Error::Internal("extended_master_secret traded before version negotiation"))?;

    if !negotiated.uses_legacy_schedule() {
        debug!("Ignoring extended_master_secret under {}", negotiated);
        return Ok(());
    }

    match carrier {
        Carrier::ClientHello => {
            // The ack decision: only offered and locally enabled together
            // switch the schedule.
            state.ems = state.ems_offered && state.offer_ems;
        }
        Carrier::ServerHello => {
            state.ems = state.ems_acked;
        }
        _ => return Err(Error::Internal("extended_master_secret outside a hello")),
    }
    Ok(())
}

/// ServerHello producer, emitted only when the trade above accepted.
pub(super) fn produce_ack(
    state: &NegotiationState,
    _: Carrier,
) -> Result<Option<Vec<u8>>, Error> {
    if state.ems {
        Ok(Some(Vec::new()))
    } else {
        Ok(None)
    }
}
