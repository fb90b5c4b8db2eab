//! TLS 1.2 handshake integration tests.

mod common;

use std::sync::Arc;

use common::*;
use hshake::types::{CipherSuite, ClientAuth, ProtocolVersion};
use hshake::{Config, Error, HandshakeContext, Identity, KeyBlock};

const V12: &[ProtocolVersion] = &[ProtocolVersion::Tls1_2];

#[test]
fn tls12_full_handshake() {
    let _ = env_logger::try_init();

    let server_identity = Identity::self_signed("legacy server").expect("server identity");

    let client_config = anonymous_config(V12, &server_identity);
    let server_config = Arc::new(
        Config::builder()
            .versions(V12.iter().copied())
            .identity(server_identity.clone())
            .build()
            .expect("build config"),
    );

    let mut client = HandshakeContext::client(client_config).expect("client context");
    let mut server = HandshakeContext::server(server_config).expect("server context");

    let mut client_block: Option<KeyBlock> = None;
    let mut server_block: Option<KeyBlock> = None;
    let mut client_messages: Vec<Vec<u8>> = Vec::new();
    let mut server_messages: Vec<Vec<u8>> = Vec::new();

    for _ in 0..10 {
        let client_out = drain_handshake(&mut client);
        let server_out = drain_handshake(&mut server);

        deliver(&client_out, &mut server);
        deliver(&server_out, &mut client);

        if let Some(block) = client_out.key_block {
            client_block = Some(block);
        }
        if let Some(block) = server_out.key_block {
            server_block = Some(block);
        }
        client_messages.extend(client_out.messages);
        server_messages.extend(server_out.messages);

        if client.is_connected() && server.is_connected() {
            break;
        }
    }

    assert!(client.is_connected(), "Client should be connected");
    assert!(server.is_connected(), "Server should be connected");

    let client_block = client_block.expect("client key block");
    let server_block = server_block.expect("server key block");
    assert_eq!(client_block, server_block, "key blocks should match");

    // The legacy shape: an ephemeral key exchange signed by the server,
    // closed out by a hello done, answered by the client key exchange.
    assert!(server_messages.iter().any(|m| m[0] == SERVER_KEY_EXCHANGE));
    assert!(server_messages.iter().any(|m| m[0] == SERVER_HELLO_DONE));
    assert!(client_messages.iter().any(|m| m[0] == CLIENT_KEY_EXCHANGE));
    assert!(
        !client_messages.iter().any(|m| m[0] == CERTIFICATE),
        "an unsolicited client certificate is never sent"
    );

    let client_session = client.take_session().expect("client session");
    let server_session = server.take_session().expect("server session");

    assert_eq!(client_session.version(), ProtocolVersion::Tls1_2);
    assert_eq!(server_session.version(), ProtocolVersion::Tls1_2);
    assert_eq!(
        client_session.cipher_suite(),
        CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256
    );
    assert!(client_session.application_secrets().is_none());

    let client_ekm = client_session
        .export_keying_material("EXPORTER-test", Some(b"ctx"), 48)
        .expect("client export");
    let server_ekm = server_session
        .export_keying_material("EXPORTER-test", Some(b"ctx"), 48)
        .expect("server export");
    assert_eq!(
        &client_ekm[..],
        &server_ekm[..],
        "exported keying material should match"
    );
}

#[test]
fn tls12_client_against_tls13_capable_server() {
    let _ = env_logger::try_init();

    let server_identity = Identity::self_signed("mixed server").expect("server identity");

    // The server prefers 1.3 and marks the downgrade in its random; a
    // client that only ever asked for 1.2 must not trip over the mark.
    let client_config = anonymous_config(V12, &server_identity);
    let server_config = Arc::new(
        Config::builder()
            .versions([ProtocolVersion::Tls1_3, ProtocolVersion::Tls1_2])
            .identity(server_identity.clone())
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
    assert!(client.is_connected(), "Client should be connected");
    assert!(server.is_connected(), "Server should be connected");

    let session = client.take_session().expect("client session");
    assert_eq!(session.version(), ProtocolVersion::Tls1_2);
}

#[test]
fn tls12_mutual_authentication() {
    let _ = env_logger::try_init();

    let client_identity = Identity::self_signed("legacy mutual client").expect("client identity");
    let server_identity = Identity::self_signed("legacy mutual server").expect("server identity");

    let client_config = config_with(V12, &client_identity, &server_identity);
    let server_config = Arc::new(
        Config::builder()
            .versions(V12.iter().copied())
            .identity(server_identity.clone())
            .validator(pin(&client_identity))
            .client_auth(ClientAuth::Requested)
            .build()
            .expect("build config"),
    );

    let mut client = HandshakeContext::client(client_config).expect("client context");
    let mut server = HandshakeContext::server(server_config).expect("server context");

    let mut client_messages: Vec<Vec<u8>> = Vec::new();

    for _ in 0..10 {
        let client_out = drain_handshake(&mut client);
        let server_out = drain_handshake(&mut server);
        deliver(&client_out, &mut server);
        deliver(&server_out, &mut client);
        client_messages.extend(client_out.messages);
        if client.is_connected() && server.is_connected() {
            break;
        }
    }
    assert!(client.is_connected(), "Client should be connected");
    assert!(server.is_connected(), "Server should be connected");

    assert!(client_messages.iter().any(|m| m[0] == CERTIFICATE));
    assert!(client_messages.iter().any(|m| m[0] == CERTIFICATE_VERIFY));

    let server_session = server.take_session().expect("server session");
    assert_eq!(
        &server_session.peer_certificates()[0][..],
        &client_identity.certificates[0][..],
        "Server should hold the client's certificate"
    );
}

#[test]
fn tls12_session_has_no_post_handshake_messages() {
    let _ = env_logger::try_init();

    let server_identity = Identity::self_signed("plain server").expect("server identity");

    let client_config = anonymous_config(V12, &server_identity);
    let server_config = Arc::new(
        Config::builder()
            .versions(V12.iter().copied())
            .identity(server_identity.clone())
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

    let err = client.into_post_handshake().unwrap_err();
    assert!(matches!(err, Error::UnexpectedMessage(_)));
}
