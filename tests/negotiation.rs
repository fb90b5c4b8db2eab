//! Negotiation failure and shutdown behavior.

mod common;

use common::*;
use hshake::types::ProtocolVersion;
use hshake::{Alert, AlertMessage, Error, HandshakeContext, HandshakePhase, Identity};

const V13: &[ProtocolVersion] = &[ProtocolVersion::Tls1_3];
const V12: &[ProtocolVersion] = &[ProtocolVersion::Tls1_2];

#[test]
fn no_common_version_aborts_both_sides() {
    let _ = env_logger::try_init();

    let client_identity = Identity::self_signed("lonely client").expect("client identity");
    let server_identity = Identity::self_signed("lonely server").expect("server identity");

    let client_config = config_with(V12, &client_identity, &server_identity);
    let server_config = config_with(V13, &server_identity, &client_identity);

    let mut client = HandshakeContext::client(client_config).expect("client context");
    let mut server = HandshakeContext::server(server_config).expect("server context");

    let client_out = drain_handshake(&mut client);
    assert_eq!(client_out.messages.len(), 1);

    let err = server.handle_message(&client_out.messages[0]).unwrap_err();
    assert!(matches!(err, Error::UnsupportedVersion(_)));
    assert_eq!(server.phase(), HandshakePhase::Aborted);

    let server_out = drain_handshake(&mut server);
    assert_eq!(server_out.alerts.len(), 1);
    assert!(server_out.alerts[0].is_fatal());
    assert_eq!(server_out.alerts[0].description, Alert::ProtocolVersion);

    let err = client.handle_alert(server_out.alerts[0]).unwrap_err();
    assert!(matches!(err, Error::PeerAlert(Alert::ProtocolVersion)));
    assert_eq!(client.phase(), HandshakePhase::Aborted);
    assert!(!client.is_connected());
}

#[test]
fn local_abort_queues_cancel_and_close() {
    let _ = env_logger::try_init();

    let server_identity = Identity::self_signed("abort server").expect("server identity");
    let client_config = anonymous_config(V13, &server_identity);

    let mut client = HandshakeContext::client(client_config).expect("client context");
    client.abort();

    let out = drain_handshake(&mut client);
    assert_eq!(out.alerts.len(), 2);
    assert_eq!(out.alerts[0].description, Alert::UserCanceled);
    assert!(!out.alerts[0].is_fatal());
    assert_eq!(out.alerts[1].description, Alert::CloseNotify);
    assert_eq!(client.phase(), HandshakePhase::Aborted);

    let err = client.handle_message(&[20, 0, 0, 0]).unwrap_err();
    assert!(matches!(err, Error::Aborted));
}

#[test]
fn close_notify_is_answered_and_ends_the_handshake() {
    let _ = env_logger::try_init();

    let server_identity = Identity::self_signed("close server").expect("server identity");
    let client_config = anonymous_config(V13, &server_identity);

    let mut client = HandshakeContext::client(client_config).expect("client context");

    let err = client.handle_alert(AlertMessage::close_notify()).unwrap_err();
    assert!(matches!(err, Error::Aborted));

    let out = drain_handshake(&mut client);
    assert_eq!(out.alerts.len(), 1);
    assert_eq!(out.alerts[0].description, Alert::CloseNotify);
    assert!(client.close_state().is_closed());
    assert_eq!(client.phase(), HandshakePhase::Aborted);
}

#[test]
fn stray_warning_alert_is_fatal_mid_handshake() {
    let _ = env_logger::try_init();

    let server_identity = Identity::self_signed("warned server").expect("server identity");
    let client_config = anonymous_config(V13, &server_identity);

    let mut client = HandshakeContext::client(client_config).expect("client context");

    // A warning the handshake cannot absorb leaves the peers out of
    // sync, so it is treated like a fatal alert. No alert goes back;
    // the peer started this.
    let err = client
        .handle_alert(AlertMessage::warning(Alert::UnrecognizedName))
        .unwrap_err();
    assert!(matches!(err, Error::PeerAlert(Alert::UnrecognizedName)));

    let out = drain_handshake(&mut client);
    assert!(out.alerts.is_empty());
    assert_eq!(client.phase(), HandshakePhase::Aborted);
}

#[test]
fn server_tolerates_a_no_certificate_warning() {
    let _ = env_logger::try_init();

    let server_identity = Identity::self_signed("tolerant server").expect("server identity");

    let client_config = anonymous_config(V13, &server_identity);
    let server_config = std::sync::Arc::new(
        hshake::Config::builder()
            .versions(V13.iter().copied())
            .identity(server_identity.clone())
            .client_auth(hshake::types::ClientAuth::Requested)
            .tolerate_no_certificate(true)
            .build()
            .expect("build config"),
    );

    let mut client = HandshakeContext::client(client_config).expect("client context");
    let mut server = HandshakeContext::server(server_config).expect("server context");

    let out = drain_handshake(&mut client);
    deliver(&out, &mut server);
    let out = drain_handshake(&mut server);
    deliver(&out, &mut client);

    // An old-style client may decline the certificate request with a
    // warning alert instead of an empty certificate message.
    let result = server.handle_alert(AlertMessage::warning(Alert::NoCertificate));
    assert!(result.is_ok(), "declining by warning alert is tolerated");
    assert_ne!(server.phase(), HandshakePhase::Aborted);
}

#[test]
fn early_flight_end_aborts_the_handshake() {
    let _ = env_logger::try_init();

    let server_identity = Identity::self_signed("flight server").expect("server identity");

    let client_config = anonymous_config(V13, &server_identity);
    let server_config = std::sync::Arc::new(
        hshake::Config::builder()
            .versions(V13.iter().copied())
            .identity(server_identity.clone())
            .build()
            .expect("build config"),
    );

    let mut client = HandshakeContext::client(client_config).expect("client context");
    let mut server = HandshakeContext::server(server_config).expect("server context");

    let out = drain_handshake(&mut client);
    deliver(&out, &mut server);
    let server_out = drain_handshake(&mut server);

    // Withhold the server Finished and declare the flight over, the way
    // a datagram transport would at a flight boundary.
    let held_back = server_out.messages.len() - 1;
    for message in &server_out.messages[..held_back] {
        client.handle_message(message).expect("handle_message");
    }

    let err = client.flight_done().unwrap_err();
    assert!(matches!(err, Error::UnexpectedMessage(_)));
    assert_eq!(client.phase(), HandshakePhase::Aborted);
}
