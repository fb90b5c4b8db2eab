#![forbid(unsafe_code)]
#![warn(clippy::all)]
// #![deny(missing_docs)]

//! Sans-IO TLS/DTLS handshake negotiation engine.
//!
//! This crate drives the handshake layer of TLS 1.0 through 1.3 and their
//! DTLS counterparts without touching a socket or a record layer. The
//! embedder owns transport, record framing, encryption and retransmission;
//! this engine owns negotiation: which message comes next, whether a
//! received one is acceptable, and what key material falls out.
//!
//! The driving loop is the same for every version and role:
//!
//! - build a [`Config`] and a [`HandshakeContext`] for one connection,
//! - feed decrypted handshake messages to
//!   [`HandshakeContext::handle_message`] and peer alerts to
//!   [`HandshakeContext::handle_alert`],
//! - drain [`HandshakeContext::poll_output`]: messages and alerts to send,
//!   secrets to install in the record layer, and finally
//!   [`Output::Connected`],
//! - collect the [`Session`] and, for 1.3-family connections, keep going
//!   with a [`PostHandshakeContext`] for key updates and session tickets.
//!
//! Datagram embedders additionally call
//! [`HandshakeContext::flight_done`] at flight boundaries so optional
//! messages the peer skipped get their absence handling.
//!
//! Any protocol violation aborts the handshake: secrets are wiped, a fatal
//! alert is queued for the peer when the error maps to one, and the
//! context refuses further input.

pub mod crypto;
pub mod types;

mod alert;
mod buffer;
mod certificate;
mod config;
mod context;
mod cookie;
mod ephemeral;
mod error;
mod extension;
mod handshake;
pub(crate) mod message;
mod post;
mod session;
mod util;

pub use alert::{Alert, AlertLevel, AlertMessage, CloseState};
pub use buffer::Buf;
pub use certificate::{CertificateValidator, Identity, PinnedCertificateValidator};
pub use config::{Config, ConfigBuilder};
pub use context::{HandshakeContext, HandshakePhase};
pub use ephemeral::EphemeralKeyCache;
pub use error::Error;
pub use post::PostHandshakeContext;
pub use session::{KeyBlock, SecretPair, Session, SessionTicket};

use types::Role;

/// One unit of engine output, drained with `poll_output`.
///
/// `Message` and `Alert` carry handshake-layer bytes for the record layer
/// to frame, encrypt under the current epoch and send. Key material is
/// surfaced the moment it is derived, since 1.3-family flights switch
/// protection mid-handshake.
#[derive(Debug)]
pub enum Output {
    /// A serialized handshake message to deliver to the peer.
    Message(Buf),
    /// An alert to deliver to the peer.
    Alert(AlertMessage),
    /// Handshake traffic secrets of a 1.3-family connection. Everything
    /// after the hellos is protected under these.
    HandshakeKeys(SecretPair),
    /// Application traffic secrets of a 1.3-family connection.
    ApplicationKeys(SecretPair),
    /// The expanded key block of a pre-1.3 connection.
    KeyBlock(KeyBlock),
    /// One side's application traffic secret was ratcheted forward by a
    /// key update.
    KeyUpdated {
        /// The side whose sending key changed.
        sender: Role,
        /// The fresh traffic secret.
        secret: Buf,
    },
    /// A session ticket, issued towards the peer (server) or received
    /// from it (client).
    Ticket(SessionTicket),
    /// The handshake is complete. The [`Session`] is ready to collect.
    Connected,
}
