//! Shared helpers for handshake integration tests.
//!
//! This file has no `#[test]` functions; Cargo compiles it as a no-op test
//! binary. Import it from other test files via `mod common;`.

#![allow(unused)]

use std::sync::Arc;

use hshake::types::{ProtocolVersion, Role};
use hshake::{
    AlertMessage, CertificateValidator, Config, HandshakeContext, Identity, KeyBlock, Output,
    PinnedCertificateValidator, PostHandshakeContext, SecretPair, SessionTicket,
};

/// Handshake message types (RFC 5246 / RFC 8446).
pub const CLIENT_HELLO: u8 = 1;
pub const SERVER_HELLO: u8 = 2;
pub const NEW_SESSION_TICKET: u8 = 4;
pub const ENCRYPTED_EXTENSIONS: u8 = 8;
pub const CERTIFICATE: u8 = 11;
pub const SERVER_KEY_EXCHANGE: u8 = 12;
pub const CERTIFICATE_REQUEST: u8 = 13;
pub const SERVER_HELLO_DONE: u8 = 14;
pub const CERTIFICATE_VERIFY: u8 = 15;
pub const CLIENT_KEY_EXCHANGE: u8 = 16;
pub const FINISHED: u8 = 20;
pub const KEY_UPDATE: u8 = 24;

/// Everything drained from one context in one pass.
#[derive(Default)]
pub struct Drained {
    pub messages: Vec<Vec<u8>>,
    pub alerts: Vec<AlertMessage>,
    pub handshake_keys: Option<SecretPair>,
    pub application_keys: Option<SecretPair>,
    pub key_block: Option<KeyBlock>,
    pub key_updates: Vec<(Role, Vec<u8>)>,
    pub tickets: Vec<SessionTicket>,
    pub connected: bool,
    /// Output kinds in emission order, for ordering assertions.
    pub sequence: Vec<&'static str>,
}

pub fn drain_handshake(ctx: &mut HandshakeContext) -> Drained {
    collect(|| ctx.poll_output())
}

pub fn drain_post(ctx: &mut PostHandshakeContext) -> Drained {
    collect(|| ctx.poll_output())
}

fn collect(mut next: impl FnMut() -> Option<Output>) -> Drained {
    let mut out = Drained::default();
    while let Some(output) = next() {
        match output {
            Output::Message(buf) => {
                out.sequence.push("message");
                out.messages.push(buf.to_vec());
            }
            Output::Alert(alert) => {
                out.sequence.push("alert");
                out.alerts.push(alert);
            }
            Output::HandshakeKeys(pair) => {
                out.sequence.push("handshake_keys");
                out.handshake_keys = Some(pair);
            }
            Output::ApplicationKeys(pair) => {
                out.sequence.push("application_keys");
                out.application_keys = Some(pair);
            }
            Output::KeyBlock(block) => {
                out.sequence.push("key_block");
                out.key_block = Some(block);
            }
            Output::KeyUpdated { sender, secret } => {
                out.sequence.push("key_updated");
                out.key_updates.push((sender, secret.to_vec()));
            }
            Output::Ticket(ticket) => {
                out.sequence.push("ticket");
                out.tickets.push(ticket);
            }
            Output::Connected => {
                out.sequence.push("connected");
                out.connected = true;
            }
        }
    }
    out
}

/// Feed every message and alert from one side's drain into the other side.
pub fn deliver(drained: &Drained, receiver: &mut HandshakeContext) {
    for message in &drained.messages {
        receiver.handle_message(message).expect("handle_message");
    }
    for alert in &drained.alerts {
        receiver.handle_alert(*alert).expect("handle_alert");
    }
}

pub fn deliver_post(drained: &Drained, receiver: &mut PostHandshakeContext) {
    for message in &drained.messages {
        receiver.handle_message(message).expect("post handle_message");
    }
    for alert in &drained.alerts {
        receiver.handle_alert(*alert).expect("post handle_alert");
    }
}

/// Validator pinned to exactly one peer leaf.
pub fn pin(peer: &Identity) -> Arc<dyn CertificateValidator> {
    let mut validator = PinnedCertificateValidator::default();
    validator.allow(peer);
    Arc::new(validator)
}

/// Config offering `versions`, with a local identity and the peer pinned.
pub fn config_with(
    versions: &[ProtocolVersion],
    identity: &Identity,
    peer: &Identity,
) -> Arc<Config> {
    Arc::new(
        Config::builder()
            .versions(versions.iter().copied())
            .identity(identity.clone())
            .validator(pin(peer))
            .build()
            .expect("build config"),
    )
}

/// Config without a local identity, for clients that cannot authenticate.
pub fn anonymous_config(versions: &[ProtocolVersion], peer: &Identity) -> Arc<Config> {
    Arc::new(
        Config::builder()
            .versions(versions.iter().copied())
            .validator(pin(peer))
            .build()
            .expect("build config"),
    )
}
