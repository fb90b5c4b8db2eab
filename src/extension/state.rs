//! Per-context extension negotiation state.
//!
//! One typed slot per extension. On-load consumers fill slots, on-trade
//! consumers read them and record outcomes, and the handshake context reads
//! the outcomes to drive key exchange and flight planning. The slot count is
//! fixed because the set of extensions exchanged per message is known.

use std::sync::Arc;

use tinyvec::ArrayVec;

use crate::buffer::Buf;
use crate::crypto::provider::ActiveKeyExchange;
use crate::error::Error;
use crate::types::{
    NamedGroup, NamedGroupVec, ProtocolVersion, Role, SignatureSchemeVec, VersionVec,
};

use super::ExtensionTypeVec;

/// An owned key share entry: group plus the peer's public value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyShareEntry {
    pub group: NamedGroup,
    pub key_exchange: Vec<u8>,
}

impl KeyShareEntry {
    pub fn new(group: NamedGroup, key_exchange: Vec<u8>) -> Self {
        KeyShareEntry {
            group,
            key_exchange,
        }
    }
}

/// Fill a slot, failing if it was already filled.
///
/// Duplicate ids within one carrier die at extension-block parse and a
/// repeated carrier dies at message dispatch, so a filled slot here means
/// the engine itself replayed a consumer.
pub(crate) fn set_once<T>(
    slot: &mut Option<T>,
    value: T,
    what: &'static str,
) -> Result<(), Error> {
    if slot.is_some() {
        return Err(Error::Internal(what));
    }
    *slot = Some(value);
    Ok(())
}

/// Negotiation state shared between the extension registry and the context.
///
/// Split three ways: local capabilities fixed at construction, material the
/// context stages before producers run (key shares, an issued cookie, the
/// hello's legacy version field), and the slots/outcomes the consumers fill.
#[derive(Debug)]
pub struct NegotiationState {
    pub(crate) role: Role,

    // Local capabilities, in preference order.
    pub(crate) versions: VersionVec,
    pub(crate) groups: NamedGroupVec,
    pub(crate) schemes: SignatureSchemeVec,
    pub(crate) offer_ems: bool,
    pub(crate) request_stapling: bool,
    pub(crate) can_staple: bool,

    // Staged by the context before producers run.
    pub(crate) local_shares: Vec<Arc<dyn ActiveKeyExchange>>,
    pub(crate) cookie_out: Option<Buf>,
    pub(crate) peer_legacy_version: Option<ProtocolVersion>,

    // Extension ids offered in our ClientHello, for the unsolicited check.
    pub(crate) offered: ExtensionTypeVec,

    // Slots filled by on-load consumers.
    pub(crate) offered_versions: Option<VersionVec>,
    pub(crate) selected_version: Option<ProtocolVersion>,
    pub(crate) peer_groups: Option<NamedGroupVec>,
    pub(crate) peer_schemes: Option<SignatureSchemeVec>,
    pub(crate) peer_shares: Option<Vec<KeyShareEntry>>,
    pub(crate) peer_share: Option<KeyShareEntry>,
    pub(crate) retry_group: Option<NamedGroup>,
    pub(crate) cookie_in: Option<Buf>,
    pub(crate) ems_offered: bool,
    pub(crate) ems_acked: bool,
    pub(crate) stapling_offered: bool,
    pub(crate) stapling_acked: bool,

    // Outcomes recorded by on-trade consumers.
    pub(crate) negotiated_version: Option<ProtocolVersion>,
    pub(crate) chosen_share: Option<KeyShareEntry>,
    pub(crate) hrr_group: Option<NamedGroup>,
    pub(crate) ems: bool,
    pub(crate) stapling: bool,
}

impl NegotiationState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        role: Role,
        versions: VersionVec,
        groups: NamedGroupVec,
        schemes: SignatureSchemeVec,
        offer_ems: bool,
        request_stapling: bool,
        can_staple: bool,
    ) -> Self {
        NegotiationState {
            role,
            versions,
            groups,
            schemes,
            offer_ems,
            request_stapling,
            can_staple,
            local_shares: Vec::new(),
            cookie_out: None,
            peer_legacy_version: None,
            offered: ArrayVec::new(),
            offered_versions: None,
            selected_version: None,
            peer_groups: None,
            peer_schemes: None,
            peer_shares: None,
            peer_share: None,
            retry_group: None,
            cookie_in: None,
            ems_offered: false,
            ems_acked: false,
            stapling_offered: false,
            stapling_acked: false,
            negotiated_version: None,
            chosen_share: None,
            hrr_group: None,
            ems: false,
            stapling: false,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// The best protocol version this side supports.
    pub fn best_version(&self) -> ProtocolVersion {
        let mut best = ProtocolVersion::Unknown(0);
        for v in &self.versions {
            if v.beats(best) {
                best = *v;
            }
        }
        best
    }

    /// Whether any offered version runs the 1.3 schedule.
    pub fn offers_tls13(&self) -> bool {
        self.versions.iter().any(|v| v.uses_tls13_schedule())
    }

    pub fn negotiated_version(&self) -> Option<ProtocolVersion> {
        self.negotiated_version
    }

    pub fn peer_schemes(&self) -> Option<&SignatureSchemeVec> {
        self.peer_schemes.as_ref()
    }

    pub fn peer_groups(&self) -> Option<&NamedGroupVec> {
        self.peer_groups.as_ref()
    }

    /// The peer key share the server settled on, if one was usable.
    pub fn chosen_share(&self) -> Option<&KeyShareEntry> {
        self.chosen_share.as_ref()
    }

    /// The server's answering key share (client side).
    pub fn peer_share(&self) -> Option<&KeyShareEntry> {
        self.peer_share.as_ref()
    }

    /// The group a retry request asks the peer to switch to.
    pub fn hrr_group(&self) -> Option<NamedGroup> {
        self.hrr_group
    }

    /// The group a received retry request asked us to switch to.
    pub fn retry_group(&self) -> Option<NamedGroup> {
        self.retry_group
    }

    /// The cookie the peer echoed in its hello, if any.
    pub fn cookie_in(&self) -> Option<&Buf> {
        self.cookie_in.as_ref()
    }

    /// The cookie we are carrying outward, either issued (server) or echoed (client).
    pub fn cookie_out(&self) -> Option<&Buf> {
        self.cookie_out.as_ref()
    }

    /// Whether the extended master secret construction is in effect.
    pub fn ems(&self) -> bool {
        self.ems
    }

    /// Whether a stapled certificate status message is expected/promised.
    pub fn stapling(&self) -> bool {
        self.stapling
    }

    pub fn local_shares(&self) -> &[Arc<dyn ActiveKeyExchange>] {
        &self.local_shares
    }

    pub fn local_share_for(&self, group: NamedGroup) -> Option<&Arc<dyn ActiveKeyExchange>> {
        self.local_shares.iter().find(|kx| kx.group() == group)
    }

    /// Stage an ephemeral share for the next produced key_share.
    pub fn stage_local_share(&mut self, share: Arc<dyn ActiveKeyExchange>) {
        self.local_shares.push(share);
    }

    pub fn clear_local_shares(&mut self) {
        self.local_shares.clear();
    }

    /// Stage a cookie for the next produced hello (issue or echo).
    pub fn stage_cookie(&mut self, cookie: Buf) {
        self.cookie_out = Some(cookie);
    }

    /// Stage the legacy version field of the hello about to be consumed.
    ///
    /// The supported_versions absence handler negotiates from this field.
    pub fn stage_peer_legacy_version(&mut self, version: ProtocolVersion) {
        self.peer_legacy_version = Some(version);
    }

    /// Whether our ClientHello carried the given extension.
    pub fn offered(&self, extension_type: crate::message::ExtensionType) -> bool {
        self.offered.contains(&extension_type)
    }

    /// Drop everything a retried ClientHello re-negotiates.
    ///
    /// The retry group and the outbound cookie survive: they are exactly
    /// what the retry is about. Everything else, the negotiated version
    /// included, is re-established by the second exchange.
    pub fn reset_for_retry(&mut self) {
        self.offered.clear();
        self.offered_versions = None;
        self.selected_version = None;
        self.peer_groups = None;
        self.peer_schemes = None;
        self.peer_shares = None;
        self.peer_share = None;
        self.cookie_in = None;
        self.ems_offered = false;
        self.ems_acked = false;
        self.stapling_offered = false;
        self.stapling_acked = false;
        self.negotiated_version = None;
        self.chosen_share = None;
        self.hrr_group = None;
        self.ems = false;
        self.stapling = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SignatureScheme;

    fn state(role: Role) -> NegotiationState {
        let versions = ProtocolVersion::supported().iter().copied().collect();
        let groups = NamedGroup::supported().iter().copied().collect();
        let schemes = SignatureScheme::supported().iter().copied().collect();
        NegotiationState::new(role, versions, groups, schemes, true, false, false)
    }

    #[test]
    fn set_once_rejects_refill() {
        let mut slot = None;
        set_once(&mut slot, 1u8, "slot").unwrap();
        assert_eq!(
            set_once(&mut slot, 2u8, "slot"),
            Err(Error::Internal("slot"))
        );
        assert_eq!(slot, Some(1));
    }

    #[test]
    fn best_version_uses_ordinals() {
        let state = state(Role::Client);
        assert_eq!(state.best_version(), ProtocolVersion::Tls1_3);
        assert!(state.offers_tls13());

        let mut legacy: VersionVec = ArrayVec::new();
        legacy.push(ProtocolVersion::Tls1_2);
        legacy.push(ProtocolVersion::Tls1_1);
        let state = NegotiationState::new(
            Role::Client,
            legacy,
            ArrayVec::new(),
            ArrayVec::new(),
            true,
            false,
            false,
        );
        assert_eq!(state.best_version(), ProtocolVersion::Tls1_2);
        assert!(!state.offers_tls13());
    }

    #[test]
    fn retry_reset_keeps_the_retry_itself() {
        let mut state = state(Role::Client);
        state.retry_group = Some(NamedGroup::Secp256r1);
        state.selected_version = Some(ProtocolVersion::Tls1_3);
        state.cookie_out = Some(Buf::from_slice(b"cookie"));
        state.negotiated_version = Some(ProtocolVersion::Tls1_3);
        state.ems = true;
        state.peer_shares = Some(Vec::new());

        state.reset_for_retry();

        assert_eq!(state.retry_group, Some(NamedGroup::Secp256r1));
        assert!(state.cookie_out.is_some());
        assert_eq!(state.selected_version, None);
        assert_eq!(state.negotiated_version, None);
        assert!(!state.ems);
        assert!(state.peer_shares.is_none());
    }
}
