//! Extension registry.
//!
//! Per (carrier message, extension id) the registry holds four behaviors:
//! a producer serializing the outgoing payload, an on-load consumer parsing
//! the payload into a typed [`NegotiationState`] slot, an on-trade consumer
//! validating and reacting once every extension of the carrier is loaded,
//! and an absence handler for extensions the carrier could have carried but
//! did not.
//!
//! On-load runs in wire order and must only store. On-trade runs in table
//! order, so a dependent decision (picking a key share) can rely on an
//! earlier one (fixing the version). The tables are process-wide constants;
//! everything mutable lives in the per-context [`NegotiationState`].

use log::debug;
use tinyvec::ArrayVec;

use crate::error::Error;
use crate::message::{Extension, ExtensionType, ExtensionVec};

mod cookie;
mod extended_master_secret;
mod key_share;
mod signature_algorithms;
mod state;
mod status_request;
mod supported_groups;
mod supported_versions;

pub use state::{KeyShareEntry, NegotiationState};

pub type ExtensionTypeVec = ArrayVec<[ExtensionType; 16]>;

/// Handshake messages that carry an extension block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Carrier {
    ClientHello,
    ServerHello,
    HelloRetryRequest,
    EncryptedExtensions,
    CertificateRequest,
    NewSessionTicket,
}

impl Carrier {
    /// Carriers whose extensions answer a ClientHello offer.
    ///
    /// In these, an extension the client never offered is a protocol
    /// violation. CertificateRequest and NewSessionTicket carry server
    /// demands, not answers, so they are exempt.
    fn is_response(&self) -> bool {
        matches!(
            self,
            Carrier::ServerHello | Carrier::HelloRetryRequest | Carrier::EncryptedExtensions
        )
    }
}

pub type ProduceFn = fn(&NegotiationState, Carrier) -> Result<Option<Vec<u8>>, Error>;
pub type OnLoadFn = fn(&mut NegotiationState, Carrier, &[u8]) -> Result<(), Error>;
pub type OnTradeFn = fn(&mut NegotiationState, Carrier) -> Result<(), Error>;
pub type AbsentFn = fn(&mut NegotiationState, Carrier) -> Result<(), Error>;

/// The pluggable behaviors for one extension on one carrier.
pub struct ExtensionHandler {
    pub extension_type: ExtensionType,
    pub produce: ProduceFn,
    pub on_load: OnLoadFn,
    pub on_trade: OnTradeFn,
    pub absent: AbsentFn,
}

fn produce_none(_: &NegotiationState, _: Carrier) -> Result<Option<Vec<u8>>, Error> {
    Ok(None)
}

fn trade_nothing(_: &mut NegotiationState, _: Carrier) -> Result<(), Error> {
    Ok(())
}

fn absent_ok(_: &mut NegotiationState, _: Carrier) -> Result<(), Error> {
    Ok(())
}

// Table order is on-trade order. supported_versions leads every hello
// because later decisions depend on the negotiated version; key_share
// follows supported_groups so its retry fallback can consult them.

static CLIENT_HELLO: &[ExtensionHandler] = &[
    ExtensionHandler {
        extension_type: ExtensionType::SupportedVersions,
        produce: supported_versions::produce_offer,
        on_load: supported_versions::load_offer,
        on_trade: supported_versions::trade_offer,
        absent: supported_versions::absent_offer,
    },
    ExtensionHandler {
        extension_type: ExtensionType::SupportedGroups,
        produce: supported_groups::produce_list,
        on_load: supported_groups::load_list,
        on_trade: trade_nothing,
        absent: absent_ok,
    },
    ExtensionHandler {
        extension_type: ExtensionType::SignatureAlgorithms,
        produce: signature_algorithms::produce_list,
        on_load: signature_algorithms::load_list,
        on_trade: trade_nothing,
        absent: signature_algorithms::absent_list,
    },
    ExtensionHandler {
        extension_type: ExtensionType::ExtendedMasterSecret,
        produce: extended_master_secret::produce_offer,
        on_load: extended_master_secret::load_flag,
        on_trade: extended_master_secret::trade_flag,
        absent: absent_ok,
    },
    ExtensionHandler {
        extension_type: ExtensionType::StatusRequest,
        produce: status_request::produce_request,
        on_load: status_request::load_request,
        on_trade: status_request::trade_flag,
        absent: absent_ok,
    },
    ExtensionHandler {
        extension_type: ExtensionType::KeyShare,
        produce: key_share::produce_offer,
        on_load: key_share::load_offer,
        on_trade: key_share::trade_offer,
        absent: key_share::absent_offer,
    },
    ExtensionHandler {
        extension_type: ExtensionType::Cookie,
        produce: cookie::produce_echo,
        on_load: cookie::load_echo,
        on_trade: trade_nothing,
        absent: absent_ok,
    },
];

static SERVER_HELLO: &[ExtensionHandler] = &[
    ExtensionHandler {
        extension_type: ExtensionType::SupportedVersions,
        produce: supported_versions::produce_selected,
        on_load: supported_versions::load_selected,
        on_trade: supported_versions::trade_selected,
        absent: supported_versions::absent_selected,
    },
    ExtensionHandler {
        extension_type: ExtensionType::KeyShare,
        produce: key_share::produce_answer,
        on_load: key_share::load_answer,
        on_trade: key_share::trade_answer,
        absent: key_share::absent_answer,
    },
    ExtensionHandler {
        extension_type: ExtensionType::ExtendedMasterSecret,
        produce: extended_master_secret::produce_ack,
        on_load: extended_master_secret::load_flag,
        on_trade: extended_master_secret::trade_flag,
        absent: absent_ok,
    },
    ExtensionHandler {
        extension_type: ExtensionType::StatusRequest,
        produce: status_request::produce_ack,
        on_load: status_request::load_ack,
        on_trade: status_request::trade_flag,
        absent: absent_ok,
    },
];

static HELLO_RETRY_REQUEST: &[ExtensionHandler] = &[
    ExtensionHandler {
        extension_type: ExtensionType::SupportedVersions,
        produce: supported_versions::produce_selected,
        on_load: supported_versions::load_selected,
        on_trade: supported_versions::trade_selected,
        absent: supported_versions::absent_required,
    },
    ExtensionHandler {
        extension_type: ExtensionType::KeyShare,
        produce: key_share::produce_retry,
        on_load: key_share::load_retry,
        on_trade: key_share::trade_retry,
        absent: absent_ok,
    },
    ExtensionHandler {
        extension_type: ExtensionType::Cookie,
        produce: cookie::produce_issue,
        on_load: cookie::load_issue,
        on_trade: trade_nothing,
        absent: absent_ok,
    },
];

static ENCRYPTED_EXTENSIONS: &[ExtensionHandler] = &[ExtensionHandler {
    extension_type: ExtensionType::SupportedGroups,
    produce: supported_groups::produce_list,
    on_load: supported_groups::load_list,
    on_trade: trade_nothing,
    absent: absent_ok,
}];

static CERTIFICATE_REQUEST: &[ExtensionHandler] = &[ExtensionHandler {
    extension_type: ExtensionType::SignatureAlgorithms,
    produce: signature_algorithms::produce_list,
    on_load: signature_algorithms::load_list,
    on_trade: trade_nothing,
    absent: signature_algorithms::absent_required,
}];

static NEW_SESSION_TICKET: &[ExtensionHandler] = &[];

pub fn handlers_for(carrier: Carrier) -> &'static [ExtensionHandler] {
    match carrier {
        Carrier::ClientHello => CLIENT_HELLO,
        Carrier::ServerHello => SERVER_HELLO,
        Carrier::HelloRetryRequest => HELLO_RETRY_REQUEST,
        Carrier::EncryptedExtensions => ENCRYPTED_EXTENSIONS,
        Carrier::CertificateRequest => CERTIFICATE_REQUEST,
        Carrier::NewSessionTicket => NEW_SESSION_TICKET,
    }
}

/// Extensions produced for one outgoing carrier message.
///
/// Owns the payload bytes; [`ProducedExtensions::as_extensions`] borrows
/// them as wire records for the message serializer.
#[derive(Debug, Default)]
pub struct ProducedExtensions {
    items: Vec<(ExtensionType, Vec<u8>)>,
}

impl ProducedExtensions {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn as_extensions(&self) -> ExtensionVec<'_> {
        let mut extensions = ExtensionVec::new();
        for (extension_type, payload) in &self.items {
            extensions.push(Extension::new(*extension_type, payload));
        }
        extensions
    }
}

/// Run the producers of a carrier, in table order.
///
/// A producer returning `None` omits its extension. For a ClientHello the
/// produced ids are recorded so answers can later be checked against the
/// offer.
pub fn produce_extensions(
    state: &mut NegotiationState,
    carrier: Carrier,
) -> Result<ProducedExtensions, Error> {
    if carrier == Carrier::ClientHello {
        state.offered.clear();
    }

    let mut items = Vec::new();
    for handler in handlers_for(carrier) {
        if let Some(payload) = (handler.produce)(state, carrier)? {
            if carrier == Carrier::ClientHello {
                state.offered.push(handler.extension_type);
            }
            items.push((handler.extension_type, payload));
        }
    }

    Ok(ProducedExtensions { items })
}

/// Run the two consumer phases of a carrier over received extensions.
///
/// Phase one on-loads every extension in wire order. Phase two walks the
/// table and trades the present ones, firing the absence handler for the
/// rest. A client receiving an answer it never asked for fails here before
/// any consumer runs for it.
pub fn consume_extensions(
    state: &mut NegotiationState,
    carrier: Carrier,
    extensions: &[Extension<'_>],
) -> Result<(), Error> {
    let table = handlers_for(carrier);
    let mut present = ExtensionTypeVec::new();

    for extension in extensions {
        let extension_type = extension.extension_type;

        // A retry request may introduce a cookie unprompted; everything
        // else a responder sends must answer the offer.
        let introduces_cookie =
            carrier == Carrier::HelloRetryRequest && extension_type == ExtensionType::Cookie;

        if carrier.is_response()
            && state.role.is_client()
            && !state.offered(extension_type)
            && !introduces_cookie
        {
            return Err(Error::UnsupportedExtension(
                "peer answered an extension that was never offered",
            ));
        }

        match table.iter().find(|h| h.extension_type == extension_type) {
            Some(handler) => {
                (handler.on_load)(state, carrier, extension.extension_data)?;
                present.push(extension_type);
            }
            None => {
                debug!("Ignoring {:?} extension in {:?}", extension_type, carrier);
            }
        }
    }

    for handler in table {
        if present.contains(&handler.extension_type) {
            (handler.on_trade)(state, carrier)?;
        } else {
            (handler.absent)(state, carrier)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        NamedGroup, ProtocolVersion, Role, SignatureScheme,
    };

    pub(crate) fn test_state(role: Role) -> NegotiationState {
        let versions = ProtocolVersion::supported().iter().copied().collect();
        let groups = NamedGroup::supported().iter().copied().collect();
        let schemes = SignatureScheme::supported().iter().copied().collect();
        NegotiationState::new(role, versions, groups, schemes, true, false, false)
    }

    #[test]
    fn server_ignores_unknown_client_extension() {
        let mut state = test_state(Role::Server);
        state.stage_peer_legacy_version(ProtocolVersion::Tls1_2);

        let extensions = [Extension::new(ExtensionType::Unknown(0xabcd), &[1, 2, 3])];
        consume_extensions(&mut state, Carrier::ClientHello, &extensions).unwrap();

        // No supported_versions extension, so the legacy field negotiated.
        assert_eq!(state.negotiated_version(), Some(ProtocolVersion::Tls1_2));
    }

    #[test]
    fn client_rejects_unsolicited_answer() {
        let mut state = test_state(Role::Client);
        // Nothing recorded as offered.
        let extensions = [Extension::new(ExtensionType::ExtendedMasterSecret, &[])];

        let err = consume_extensions(&mut state, Carrier::ServerHello, &extensions).unwrap_err();
        assert!(matches!(err, Error::UnsupportedExtension(_)));
    }

    #[test]
    fn retry_cookie_needs_no_offer() {
        let mut state = test_state(Role::Client);
        // As if the first hello had offered the 1.3 extensions.
        state.offered.push(ExtensionType::SupportedVersions);
        state.offered.push(ExtensionType::KeyShare);

        let cookie: &[u8] = &[0x00, 0x03, 0xC0, 0x0C, 0x1E];
        let extensions = [
            Extension::new(ExtensionType::SupportedVersions, &[0x03, 0x04]),
            Extension::new(ExtensionType::Cookie, cookie),
        ];
        consume_extensions(&mut state, Carrier::HelloRetryRequest, &extensions).unwrap();

        assert_eq!(state.cookie_out.as_deref(), Some(&[0xC0, 0x0C, 0x1E][..]));
    }

    #[test]
    fn trade_order_is_table_order_not_wire_order() {
        let mut state = test_state(Role::Server);
        state.stage_peer_legacy_version(ProtocolVersion::Tls1_2);

        // key_share first on the wire, supported_versions last. Picking the
        // share still sees the negotiated version because trade follows the
        // table, not the wire.
        let key_share: &[u8] = &[
            0x00, 0x24, // client share list length
            0x00, 0x1D, // x25519
            0x00, 0x20, // key length 32
            0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA,
            0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA,
            0xAA, 0xAA, 0xAA, 0xAA,
        ];
        let versions: &[u8] = &[0x02, 0x03, 0x04]; // TLS 1.3
        let groups: &[u8] = &[0x00, 0x02, 0x00, 0x1D];
        let schemes: &[u8] = &[0x00, 0x02, 0x04, 0x03]; // ecdsa_secp256r1_sha256

        let extensions = [
            Extension::new(ExtensionType::KeyShare, key_share),
            Extension::new(ExtensionType::SupportedGroups, groups),
            Extension::new(ExtensionType::SignatureAlgorithms, schemes),
            Extension::new(ExtensionType::SupportedVersions, versions),
        ];
        consume_extensions(&mut state, Carrier::ClientHello, &extensions).unwrap();

        assert_eq!(state.negotiated_version(), Some(ProtocolVersion::Tls1_3));
        let share = state.chosen_share().unwrap();
        assert_eq!(share.group, NamedGroup::X25519);
        assert_eq!(share.key_exchange, vec![0xAA; 32]);
    }

    #[test]
    fn produced_client_hello_records_the_offer() {
        let mut state = test_state(Role::Client);
        let produced = produce_extensions(&mut state, Carrier::ClientHello).unwrap();

        assert!(!produced.is_empty());
        assert!(state.offered(ExtensionType::SupportedVersions));
        assert!(state.offered(ExtensionType::SupportedGroups));
        assert!(state.offered(ExtensionType::SignatureAlgorithms));
        // No stapling requested, no cookie staged.
        assert!(!state.offered(ExtensionType::StatusRequest));
        assert!(!state.offered(ExtensionType::Cookie));

        let wire = produced.as_extensions();
        assert_eq!(wire.len(), produced.len());
    }
}
