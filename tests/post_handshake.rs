//! Post-handshake tests: key updates, session tickets, teardown.

mod common;

use std::sync::Arc;

use common::*;
use hshake::types::{ProtocolVersion, Role};
use hshake::{
    Alert, AlertMessage, Config, Error, HandshakeContext, Identity, PostHandshakeContext,
};

/// Run a 1.3 handshake to completion and hand both sides over to their
/// post-handshake contexts.
fn connected_pair(ticket_count: u8) -> (PostHandshakeContext, PostHandshakeContext) {
    let server_identity = Identity::self_signed("post server").expect("server identity");

    let client_config = anonymous_config(&[ProtocolVersion::Tls1_3], &server_identity);
    let server_config = Arc::new(
        Config::builder()
            .versions([ProtocolVersion::Tls1_3])
            .identity(server_identity.clone())
            .session_tickets(ticket_count)
            .build()
            .expect("build config"),
    );

    let mut client = HandshakeContext::client(client_config).expect("client context");
    let mut server = HandshakeContext::server(server_config).expect("server context");

    for _ in 0..10 {
        let client_out = drain_handshake(&mut client);
        let server_out = drain_handshake(&mut server);
        deliver(&client_out, &mut server);
        deliver(&server_out, &mut client);
        if client.is_connected() && server.is_connected() {
            break;
        }
    }
    assert!(client.is_connected() && server.is_connected());

    let client_post = client.into_post_handshake().expect("client post context");
    let server_post = server.into_post_handshake().expect("server post context");
    (client_post, server_post)
}

#[test]
fn server_issues_tickets_on_entry() {
    let _ = env_logger::try_init();

    let (mut client_post, mut server_post) = connected_pair(2);

    let server_out = drain_post(&mut server_post);
    assert_eq!(server_out.messages.len(), 2);
    assert!(server_out
        .messages
        .iter()
        .all(|m| m[0] == NEW_SESSION_TICKET));
    assert_eq!(server_out.tickets.len(), 2);

    deliver_post(&server_out, &mut client_post);
    let client_out = drain_post(&mut client_post);
    assert_eq!(client_out.tickets.len(), 2);

    for (sent, received) in server_out.tickets.iter().zip(&client_out.tickets) {
        assert_eq!(sent, received, "tickets should survive the trip intact");
    }
    assert_ne!(
        client_out.tickets[0].nonce, client_out.tickets[1].nonce,
        "each ticket carries its own nonce"
    );
    assert!(client_out.tickets[0].lifetime > 0);
}

#[test]
fn key_update_round_trip() {
    let _ = env_logger::try_init();

    let (mut client_post, mut server_post) = connected_pair(0);

    client_post.request_key_update().expect("request key update");
    let client_out = drain_post(&mut client_post);
    assert_eq!(client_out.messages.len(), 1);
    assert_eq!(client_out.messages[0][0], KEY_UPDATE);
    assert_eq!(client_out.key_updates.len(), 1);
    assert_eq!(client_out.key_updates[0].0, Role::Client);

    // The update message itself still travels under the old key, so it
    // is queued ahead of the ratchet notification.
    assert_eq!(client_out.sequence, vec!["message", "key_updated"]);

    deliver_post(&client_out, &mut server_post);
    let server_out = drain_post(&mut server_post);

    // The server ratchets the client direction and, because the update
    // was requested, answers with its own.
    assert_eq!(server_out.key_updates.len(), 2);
    assert_eq!(server_out.key_updates[0].0, Role::Client);
    assert_eq!(server_out.key_updates[0].1, client_out.key_updates[0].1);
    assert_eq!(server_out.key_updates[1].0, Role::Server);
    assert_eq!(server_out.messages.len(), 1);
    assert_eq!(server_out.messages[0][0], KEY_UPDATE);

    deliver_post(&server_out, &mut client_post);
    let client_out = drain_post(&mut client_post);
    assert!(client_out.messages.is_empty(), "an answer is not answered");
    assert_eq!(client_out.key_updates.len(), 1);
    assert_eq!(client_out.key_updates[0].0, Role::Server);
    assert_eq!(client_out.key_updates[0].1, server_out.key_updates[1].1);

    let client_secrets = client_post
        .session()
        .application_secrets()
        .expect("client secrets")
        .clone();
    let server_secrets = server_post
        .session()
        .application_secrets()
        .expect("server secrets")
        .clone();
    assert_eq!(
        client_secrets, server_secrets,
        "both sides should land on the same ratcheted secrets"
    );
}

#[test]
fn close_notify_ends_the_post_context() {
    let _ = env_logger::try_init();

    let (mut client_post, _server_post) = connected_pair(0);

    let err = client_post
        .handle_alert(AlertMessage::close_notify())
        .unwrap_err();
    assert!(matches!(err, Error::Aborted));

    let out = drain_post(&mut client_post);
    assert_eq!(out.alerts.len(), 1);
    assert_eq!(out.alerts[0].description, Alert::CloseNotify);
    assert!(client_post.close_state().is_closed());

    // The session itself stays readable for the embedder.
    assert!(client_post.session().application_secrets().is_some());

    let err = client_post.handle_message(&[24, 0, 0, 1, 0]).unwrap_err();
    assert!(matches!(err, Error::Aborted));
}

#[test]
fn post_handshake_warning_alerts_are_ignored() {
    let _ = env_logger::try_init();

    let (mut client_post, _server_post) = connected_pair(0);

    let result = client_post.handle_alert(AlertMessage::warning(Alert::UnrecognizedName));
    assert!(result.is_ok(), "post-handshake warnings are ignored");

    client_post.request_key_update().expect("still alive");
}
