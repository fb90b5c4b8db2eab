//! Hello exchange: version and suite negotiation, retry requests, cookies.
//!
//! This is where the handshake's shape is decided. The server's answer to
//! a ClientHello is either a full ServerHello flight or a retry request
//! asking the client to come back with a different key share, a cookie,
//! or both. Everything downstream (key exchange family, schedules,
//! transcript algorithm) hangs off decisions made here.

use log::debug;

use crate::buffer::Buf;
use crate::crypto::prf::LegacySchedule;
use crate::crypto::transcript::TranscriptHash;
use crate::error::Error;
use crate::extension::{consume_extensions, produce_extensions, Carrier};
use crate::handshake::{self, Incoming, Presence};
use crate::message::{
    close_message, open_message, ClientHello, CompressionMethod, MessageType, Random, ServerHello,
};
use crate::types::{CipherSuite, CipherSuiteVec, ClientAuth, ProtocolVersion};

use super::{finish, key_exchange, HandshakeContext, HandshakePhase};

/// What goes in the hello's legacy version field. 1.3 freezes it at 1.2
/// and moves real version negotiation into supported_versions.
fn legacy_hello_field(version: ProtocolVersion) -> ProtocolVersion {
    match version {
        ProtocolVersion::Tls1_3 => ProtocolVersion::Tls1_2,
        ProtocolVersion::Dtls1_3 => ProtocolVersion::Dtls1_2,
        other => other,
    }
}

pub(super) fn produce_client_hello(
    ctx: &mut HandshakeContext,
    out: &mut Buf,
) -> Result<(), Error> {
    // A retried hello must repeat the original random and session id.
    let random = match ctx.client_random {
        Some(random) => random,
        None => {
            let random = Random::generate();
            ctx.client_random = Some(random);
            random
        }
    };

    let best = ctx.nego.best_version();
    let legacy_version = legacy_hello_field(best);

    let mut cipher_suites = CipherSuiteVec::new();
    for suite in ctx.config.cipher_suites().iter() {
        if ctx.config.versions().iter().any(|v| suite.usable_with(*v)) {
            cipher_suites.push(*suite);
        }
    }
    if cipher_suites.is_empty() {
        return Err(Error::Internal("no usable cipher suite to offer"));
    }

    let mut hello = ClientHello::new(legacy_version, random, ctx.session_id, cipher_suites);
    let produced = produce_extensions(&mut ctx.nego, Carrier::ClientHello)?;
    hello.extensions = produced.as_extensions();

    let mut body = Vec::new();
    let start = open_message(MessageType::ClientHello, &mut body);
    hello.serialize(&mut body);
    close_message(&mut body, start);

    ctx.hash_in(&body);
    out.extend_from_slice(&body);
    Ok(())
}

pub(super) fn consume_client_hello(
    ctx: &mut HandshakeContext,
    incoming: &Incoming<'_>,
) -> Result<(), Error> {
    let (rest, hello) = ClientHello::parse(incoming.body)?;
    if !rest.is_empty() {
        return Err(Error::Decode("trailing bytes after client hello"));
    }
    if !hello.compression_methods.contains(&CompressionMethod::Null) {
        return Err(Error::IllegalParameter("client offers no null compression"));
    }

    if ctx.retry_sent {
        return consume_retried_hello(ctx, incoming, &hello);
    }

    debug!(
        "ClientHello: {} suites, {} extensions",
        hello.cipher_suites.len(),
        hello.extensions.len()
    );
    ctx.client_random = Some(hello.random);
    ctx.session_id = hello.session_id;
    ctx.hash_in(incoming.raw);
    ctx.set_phase(HandshakePhase::Negotiating)?;

    ctx.nego.stage_peer_legacy_version(hello.legacy_version);
    consume_extensions(&mut ctx.nego, Carrier::ClientHello, &hello.extensions)?;

    negotiate_and_respond(ctx, &hello)
}

/// A hello arriving after we sent a retry request.
///
/// The cookie decides which world we are in. A matching cookie resumes
/// the retried exchange, which then must repeat random and session id.
/// A missing or stale cookie means the kept state cannot be trusted to
/// belong to this peer, so the exchange starts over from scratch; the
/// renegotiation below will then answer with a fresh retry request.
fn consume_retried_hello(
    ctx: &mut HandshakeContext,
    incoming: &Incoming<'_>,
    hello: &ClientHello<'_>,
) -> Result<(), Error> {
    ctx.nego.stage_peer_legacy_version(hello.legacy_version);
    consume_extensions(&mut ctx.nego, Carrier::ClientHello, &hello.extensions)?;

    if !retry_cookie_matches(ctx)? {
        debug!("Retried hello fails the cookie check, starting the exchange over");
        let provider = ctx.provider();
        ctx.transcript = TranscriptHash::new(&provider);
        ctx.retry_sent = false;
        ctx.retry_hash = None;
        ctx.retry_version = None;
        ctx.retry_suite = None;
        ctx.suite = None;
        ctx.client_random = Some(hello.random);
        ctx.session_id = hello.session_id;

        let any_legacy = ctx.config.versions().iter().any(|v| v.uses_legacy_schedule());
        ctx.raw_transcript = any_legacy.then(Buf::new);

        ctx.hash_in(incoming.raw);
        return negotiate_and_respond(ctx, hello);
    }

    let original = ctx
        .client_random
        .ok_or(Error::Internal("no client random on record"))?;
    if hello.random != original {
        return Err(Error::IllegalParameter("retried hello changed the random"));
    }
    if hello.session_id != ctx.session_id {
        return Err(Error::IllegalParameter("retried hello changed the session id"));
    }

    ctx.hash_in(incoming.raw);
    negotiate_and_respond(ctx, hello)
}

/// Whether the hello on the table carries the cookie our outstanding
/// retry request issued. Servers that never demand cookies always pass.
fn retry_cookie_matches(ctx: &HandshakeContext) -> Result<bool, Error> {
    let Some(cookies) = &ctx.cookies else {
        return Ok(true);
    };
    let Some(cookie) = ctx.nego.cookie_in() else {
        return Ok(false);
    };
    let Some(embedded) = cookies.verify_cookie(cookie).map_err(Error::Crypto)? else {
        debug!("Cookie fails its integrity check");
        return Ok(false);
    };
    let Some(expected) = &ctx.retry_hash else {
        debug!("Cookie verifies but no retry of ours is outstanding");
        return Ok(false);
    };
    Ok(embedded == &expected[..])
}

/// Pin version and suite for a received hello, then answer with either a
/// full server flight or a retry request.
fn negotiate_and_respond(
    ctx: &mut HandshakeContext,
    hello: &ClientHello<'_>,
) -> Result<(), Error> {
    let negotiated = ctx.negotiated()?;
    debug!("Negotiated version {}", negotiated);
    if let Some(fixed) = ctx.retry_version {
        if negotiated != fixed {
            return Err(Error::IllegalParameter("retried hello changed the negotiated version"));
        }
    }

    if negotiated.uses_tls13_schedule()
        && (hello.compression_methods.len() != 1
            || hello.compression_methods[0] != CompressionMethod::Null)
    {
        return Err(Error::IllegalParameter("compression is gone from this version"));
    }

    let suite = select_suite(ctx, hello, negotiated)?;
    debug!("Selected {:?}", suite);
    if let Some(fixed) = ctx.retry_suite {
        if suite != fixed {
            return Err(Error::IllegalParameter("retried hello changed the cipher suite"));
        }
    }
    ctx.suite = Some(suite);
    if !ctx.transcript.is_selected() {
        ctx.transcript.select_algorithm(negotiated, suite.hash_algorithm());
    }

    if negotiated.uses_tls13_schedule() {
        ctx.raw_transcript = None;

        let share_missing = ctx.nego.hrr_group().is_some();
        if share_missing || !retry_cookie_matches(ctx)? {
            if ctx.retry_sent {
                // The cookie matched (we would have reset otherwise), so
                // the client resent without fixing its share offer.
                return Err(Error::IllegalParameter("retried hello still has no usable key share"));
            }
            return produce_retry_request(ctx);
        }

        ctx.set_phase(HandshakePhase::KeyExchangePending)?;
        produce_tls13_server_flight(ctx)
    } else {
        produce_legacy_server_flight(ctx, negotiated, suite)
    }
}

/// Ours-preference suite selection among what the client offered.
fn select_suite(
    ctx: &HandshakeContext,
    hello: &ClientHello<'_>,
    negotiated: ProtocolVersion,
) -> Result<CipherSuite, Error> {
    ctx.config
        .cipher_suites()
        .iter()
        .copied()
        .filter(|suite| suite.usable_with(negotiated))
        .filter(|suite| signer_matches(ctx, *suite))
        .find(|suite| hello.cipher_suites.contains(suite))
        .ok_or(Error::HandshakeFailure("no mutually acceptable cipher suite"))
}

/// Whether our signing key can authenticate a suite. 1.3 suites do not
/// pin a certificate family, legacy ECDHE suites do.
fn signer_matches(ctx: &HandshakeContext, suite: CipherSuite) -> bool {
    let Some(family) = suite.signature_family() else {
        return true;
    };
    let Some(signer) = &ctx.signer else {
        return false;
    };
    signer
        .schemes()
        .iter()
        .any(|scheme| super::scheme_family(*scheme) == family)
}

/// Queue a HelloRetryRequest and roll negotiation state back so the
/// retried hello is judged fresh.
fn produce_retry_request(ctx: &mut HandshakeContext) -> Result<(), Error> {
    debug!("Answering with a retry request");

    if let Some(cookies) = &ctx.cookies {
        let hash = ctx.current_hash();
        let cookie = cookies.create_cookie(&hash).map_err(Error::Crypto)?;
        ctx.retry_hash = Some(hash);
        ctx.nego.stage_cookie(cookie);
    }

    ctx.retry_version = Some(ctx.negotiated()?);
    ctx.retry_suite = ctx.suite;

    ctx.transcript.reseed_for_retry();

    ctx.send_retry = true;
    let result = ctx.produce_message(MessageType::ServerHello);
    ctx.send_retry = false;
    result?;

    ctx.retry_sent = true;
    ctx.nego.reset_for_retry();
    handshake::expect(ctx, MessageType::ClientHello, Presence::Required)?;
    Ok(())
}

fn produce_tls13_server_flight(ctx: &mut HandshakeContext) -> Result<(), Error> {
    let group = ctx
        .nego
        .chosen_share()
        .ok_or(Error::Internal("no chosen key share"))?
        .group;

    if ctx.nego.local_share_for(group).is_none() {
        let provider = ctx.provider();
        let supported = provider
            .supported_group(group)
            .ok_or(Error::Internal("configured group missing from the provider"))?;
        let share = supported.start_exchange().map_err(Error::Crypto)?;
        ctx.nego.stage_local_share(share);
    }

    ctx.produce_message(MessageType::ServerHello)?;
    key_exchange::establish_tls13_secrets(ctx)?;

    ctx.produce_message(MessageType::EncryptedExtensions)?;
    if ctx.config.client_auth() != ClientAuth::None {
        ctx.produce_message(MessageType::CertificateRequest)?;
        ctx.client_cert_requested = true;
    }
    ctx.produce_message(MessageType::Certificate)?;
    ctx.produce_message(MessageType::CertificateVerify)?;
    ctx.produce_message(MessageType::Finished)?;
    finish::derive_tls13_application_secrets(ctx)?;

    if ctx.client_cert_requested {
        handshake::expect(ctx, MessageType::Certificate, Presence::Required)?;
        handshake::expect(ctx, MessageType::CertificateVerify, Presence::Optional)?;
    }
    handshake::expect(ctx, MessageType::Finished, Presence::Required)?;
    Ok(())
}

fn produce_legacy_server_flight(
    ctx: &mut HandshakeContext,
    negotiated: ProtocolVersion,
    suite: CipherSuite,
) -> Result<(), Error> {
    ctx.set_phase(HandshakePhase::KeyExchangePending)?;

    let provider = ctx.config.crypto_provider();
    ctx.legacy = Some(LegacySchedule::new(provider, negotiated, suite.hash_algorithm()));

    ctx.produce_message(MessageType::ServerHello)?;
    ctx.produce_message(MessageType::Certificate)?;
    if ctx.nego.stapling() {
        ctx.produce_message(MessageType::CertificateStatus)?;
    }
    ctx.produce_message(MessageType::ServerKeyExchange)?;
    if ctx.config.client_auth() != ClientAuth::None {
        ctx.produce_message(MessageType::CertificateRequest)?;
        ctx.client_cert_requested = true;
    }
    ctx.produce_message(MessageType::ServerHelloDone)?;

    if ctx.client_cert_requested {
        handshake::expect(ctx, MessageType::Certificate, Presence::Required)?;
    }
    handshake::expect(ctx, MessageType::ClientKeyExchange, Presence::Required)?;
    handshake::expect(ctx, MessageType::CertificateVerify, Presence::Optional)?;
    handshake::expect(ctx, MessageType::Finished, Presence::Required)?;
    Ok(())
}

pub(super) fn produce_server_hello(
    ctx: &mut HandshakeContext,
    out: &mut Buf,
) -> Result<(), Error> {
    let negotiated = ctx.negotiated()?;
    let suite = ctx.suite()?;

    let (random, carrier) = if ctx.send_retry {
        (Random::HELLO_RETRY_REQUEST, Carrier::HelloRetryRequest)
    } else {
        let best = ctx.best_version_in_family(negotiated);
        let random = Random::generate_for_server(best, negotiated);
        ctx.server_random = Some(random);
        (random, Carrier::ServerHello)
    };

    let legacy_version = legacy_hello_field(negotiated);
    let mut hello = ServerHello::new(legacy_version, random, ctx.session_id, suite);
    let produced = produce_extensions(&mut ctx.nego, carrier)?;
    hello.extensions = produced.as_extensions();

    let mut body = Vec::new();
    let start = open_message(MessageType::ServerHello, &mut body);
    hello.serialize(&mut body);
    close_message(&mut body, start);

    ctx.hash_in(&body);
    out.extend_from_slice(&body);
    Ok(())
}

pub(super) fn consume_server_hello(
    ctx: &mut HandshakeContext,
    incoming: &Incoming<'_>,
) -> Result<(), Error> {
    let (rest, hello) = ServerHello::parse(incoming.body)?;
    if !rest.is_empty() {
        return Err(Error::Decode("trailing bytes after server hello"));
    }
    if hello.compression_method != CompressionMethod::Null {
        return Err(Error::IllegalParameter("server selected compression"));
    }
    if hello.session_id_echo != ctx.session_id {
        return Err(Error::IllegalParameter("session id echo mismatch"));
    }

    if hello.is_hello_retry() {
        return consume_retry_request(ctx, incoming, &hello);
    }

    ctx.nego.stage_peer_legacy_version(hello.legacy_version);
    consume_extensions(&mut ctx.nego, Carrier::ServerHello, &hello.extensions)?;
    let negotiated = ctx.negotiated()?;
    debug!("Negotiated version {}", negotiated);

    if negotiated.uses_tls13_schedule() && hello.legacy_version != legacy_hello_field(negotiated) {
        return Err(Error::IllegalParameter("legacy version field must freeze at 1.2"));
    }

    let suite = hello.cipher_suite;
    if !ctx.config.cipher_suites().contains(&suite) || !suite.usable_with(negotiated) {
        return Err(Error::IllegalParameter("server selected a suite we did not offer"));
    }

    if ctx.retry_received {
        if Some(negotiated) != ctx.retry_version {
            return Err(Error::IllegalParameter("server changed the version after its retry"));
        }
        if Some(suite) != ctx.retry_suite {
            return Err(Error::IllegalParameter("server changed the suite after its retry"));
        }
    }

    let best = ctx.best_version_in_family(negotiated);
    hello.random.check_downgrade(best, negotiated)?;

    ctx.suite = Some(suite);
    ctx.server_random = Some(hello.random);
    if !ctx.transcript.is_selected() {
        ctx.transcript.select_algorithm(negotiated, suite.hash_algorithm());
    }
    ctx.hash_in(incoming.raw);
    ctx.set_phase(HandshakePhase::KeyExchangePending)?;

    if negotiated.uses_tls13_schedule() {
        ctx.raw_transcript = None;
        key_exchange::establish_tls13_secrets(ctx)?;

        handshake::expect(ctx, MessageType::EncryptedExtensions, Presence::Required)?;
        handshake::expect(ctx, MessageType::CertificateRequest, Presence::Optional)?;
        handshake::expect(ctx, MessageType::Certificate, Presence::Required)?;
        handshake::expect(ctx, MessageType::CertificateVerify, Presence::Required)?;
        handshake::expect(ctx, MessageType::Finished, Presence::Required)?;
    } else {
        let provider = ctx.config.crypto_provider();
        ctx.legacy = Some(LegacySchedule::new(provider, negotiated, suite.hash_algorithm()));
        ctx.validate_after_status = ctx.nego.stapling();

        handshake::expect(ctx, MessageType::Certificate, Presence::Required)?;
        if ctx.nego.stapling() {
            handshake::expect(ctx, MessageType::CertificateStatus, Presence::Optional)?;
        }
        handshake::expect(ctx, MessageType::ServerKeyExchange, Presence::Required)?;
        handshake::expect(ctx, MessageType::CertificateRequest, Presence::Optional)?;
        handshake::expect(ctx, MessageType::ServerHelloDone, Presence::Required)?;
    }
    Ok(())
}

/// Client side of a HelloRetryRequest.
fn consume_retry_request(
    ctx: &mut HandshakeContext,
    incoming: &Incoming<'_>,
    hello: &ServerHello<'_>,
) -> Result<(), Error> {
    if ctx.retry_received {
        return Err(Error::UnexpectedMessage("second retry request"));
    }
    debug!("Server answered with a retry request");

    ctx.nego.stage_peer_legacy_version(hello.legacy_version);
    consume_extensions(&mut ctx.nego, Carrier::HelloRetryRequest, &hello.extensions)?;
    let negotiated = ctx.negotiated()?;

    if hello.legacy_version != legacy_hello_field(negotiated) {
        return Err(Error::IllegalParameter("legacy version field must freeze at 1.2"));
    }

    let suite = hello.cipher_suite;
    if !ctx.config.cipher_suites().contains(&suite) || !suite.usable_with(negotiated) {
        return Err(Error::IllegalParameter("retry request names a suite we did not offer"));
    }

    let retry_group = ctx.nego.retry_group();
    if retry_group.is_none() && ctx.nego.cookie_out().is_none() {
        return Err(Error::IllegalParameter("retry request changes nothing"));
    }

    ctx.retry_version = Some(negotiated);
    ctx.retry_suite = Some(suite);
    ctx.suite = Some(suite);
    ctx.raw_transcript = None;

    if !ctx.transcript.is_selected() {
        ctx.transcript.select_algorithm(negotiated, suite.hash_algorithm());
    }
    ctx.transcript.reseed_for_retry();
    ctx.hash_in(incoming.raw);

    if let Some(group) = retry_group {
        let provider = ctx.provider();
        let supported = provider
            .supported_group(group)
            .ok_or(Error::Internal("configured group missing from the provider"))?;
        let share = supported.start_exchange().map_err(Error::Crypto)?;
        ctx.nego.clear_local_shares();
        ctx.nego.stage_local_share(share);
        debug!("Retrying with {:?}", group);
    }

    ctx.nego.reset_for_retry();
    ctx.retry_received = true;

    ctx.produce_message(MessageType::ClientHello)?;
    handshake::expect(ctx, MessageType::ServerHello, Presence::Required)?;
    Ok(())
}
