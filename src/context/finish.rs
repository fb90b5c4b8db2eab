//! The tail of both handshake shapes: encrypted extensions, hello done,
//! the Finished exchange and the hand-off into a finished session.

use std::mem;

use log::debug;
use subtle::ConstantTimeEq;

use crate::buffer::Buf;
use crate::error::Error;
use crate::extension::{consume_extensions, produce_extensions, Carrier};
use crate::handshake::{self, Incoming, Presence};
use crate::message::{close_message, open_message, EncryptedExtensions, Finished, MessageType};
use crate::session::{SecretPair, Session};
use crate::types::Role;
use crate::Output;

use super::{HandshakeContext, HandshakePhase};

pub(super) fn produce_encrypted_extensions(
    ctx: &mut HandshakeContext,
    out: &mut Buf,
) -> Result<(), Error> {
    let mut message = EncryptedExtensions::new();
    let produced = produce_extensions(&mut ctx.nego, Carrier::EncryptedExtensions)?;
    message.extensions = produced.as_extensions();

    let mut body = Vec::new();
    let start = open_message(MessageType::EncryptedExtensions, &mut body);
    message.serialize(&mut body);
    close_message(&mut body, start);

    ctx.hash_in(&body);
    out.extend_from_slice(&body);
    Ok(())
}

pub(super) fn consume_encrypted_extensions(
    ctx: &mut HandshakeContext,
    incoming: &Incoming<'_>,
) -> Result<(), Error> {
    ctx.hash_in(incoming.raw);

    let (rest, message) = EncryptedExtensions::parse(incoming.body)?;
    if !rest.is_empty() {
        return Err(Error::Decode("trailing bytes after encrypted extensions"));
    }
    consume_extensions(&mut ctx.nego, Carrier::EncryptedExtensions, &message.extensions)
}

pub(super) fn produce_server_hello_done(
    ctx: &mut HandshakeContext,
    out: &mut Buf,
) -> Result<(), Error> {
    let mut body = Vec::new();
    let start = open_message(MessageType::ServerHelloDone, &mut body);
    close_message(&mut body, start);

    ctx.hash_in(&body);
    out.extend_from_slice(&body);
    Ok(())
}

/// The server's legacy flight is over. Answer with the client flight and
/// wait for the Finished that closes the handshake.
pub(super) fn consume_server_hello_done(
    ctx: &mut HandshakeContext,
    incoming: &Incoming<'_>,
) -> Result<(), Error> {
    if !incoming.body.is_empty() {
        return Err(Error::Decode("server hello done carries a body"));
    }
    ctx.hash_in(incoming.raw);

    if ctx.client_cert_requested {
        ctx.produce_message(MessageType::Certificate)?;
    }
    ctx.produce_message(MessageType::ClientKeyExchange)?;
    if ctx.client_cert_sent && ctx.client_cv_scheme.is_some() {
        ctx.produce_message(MessageType::CertificateVerify)?;
    }
    ctx.produce_message(MessageType::Finished)?;

    handshake::expect(ctx, MessageType::Finished, Presence::Required)?;
    Ok(())
}

pub(super) fn produce_finished(ctx: &mut HandshakeContext, out: &mut Buf) -> Result<(), Error> {
    let verify_data = local_verify_data(ctx, ctx.role)?;

    let mut body = Vec::new();
    let start = open_message(MessageType::Finished, &mut body);
    Finished::new(&verify_data).serialize(&mut body);
    close_message(&mut body, start);

    ctx.hash_in(&body);
    out.extend_from_slice(&body);
    Ok(())
}

pub(super) fn consume_finished(
    ctx: &mut HandshakeContext,
    incoming: &Incoming<'_>,
) -> Result<(), Error> {
    // The peer's verify_data covers the transcript up to but not including
    // its Finished, so the expectation is computed before hashing it in.
    let expected = local_verify_data(ctx, ctx.role.peer())?;

    let (rest, finished) = Finished::parse(incoming.body, expected.len())?;
    if !rest.is_empty() {
        return Err(Error::Decode("trailing bytes after finished"));
    }

    let is_eq: bool = finished.verify_data.ct_eq(&*expected).into();
    if !is_eq {
        return Err(Error::DecryptError("finished verification failed"));
    }
    debug!("Peer Finished verified");

    ctx.hash_in(incoming.raw);

    let tls13 = ctx.negotiated()?.uses_tls13_schedule();
    match (ctx.role, tls13) {
        (Role::Client, true) => {
            // The application secrets hang off the transcript through the
            // server Finished, so they are derived before our own flight is
            // hashed. They are announced after it: the flight still
            // travels under the handshake keys.
            stage_application_secrets(ctx)?;
            if ctx.client_cert_requested {
                ctx.produce_message(MessageType::Certificate)?;
                if ctx.client_cv_scheme.is_some() {
                    ctx.produce_message(MessageType::CertificateVerify)?;
                }
            }
            ctx.produce_message(MessageType::Finished)?;
            announce_application_secrets(ctx)?;
            finalize_tls13(ctx)
        }
        (Role::Server, true) => finalize_tls13(ctx),
        (Role::Client, false) => finalize_legacy(ctx),
        (Role::Server, false) => {
            ctx.produce_message(MessageType::Finished)?;
            finalize_legacy(ctx)
        }
    }
}

/// Finished verify_data for `sender` over the transcript hashed so far.
fn local_verify_data(ctx: &HandshakeContext, sender: Role) -> Result<Buf, Error> {
    let th = ctx.current_hash();

    if ctx.negotiated()?.uses_tls13_schedule() {
        let schedule = ctx
            .schedule
            .as_ref()
            .ok_or(Error::Internal("no key schedule"))?;
        let secrets = ctx
            .handshake_secrets
            .as_ref()
            .ok_or(Error::Internal("no handshake secrets"))?;
        schedule
            .derive_finished(secrets.for_sender(sender), &th)
            .map_err(Error::Crypto)
    } else {
        let legacy = ctx
            .legacy
            .as_ref()
            .ok_or(Error::Internal("no legacy schedule"))?;
        legacy.derive_finished(sender, &th).map_err(Error::Crypto)
    }
}

/// Derive the application traffic secrets and the exporter master secret.
/// The transcript hash must cover through the server Finished.
pub(super) fn derive_tls13_application_secrets(ctx: &mut HandshakeContext) -> Result<(), Error> {
    stage_application_secrets(ctx)?;
    announce_application_secrets(ctx)
}

fn stage_application_secrets(ctx: &mut HandshakeContext) -> Result<(), Error> {
    let th = ctx.current_hash();
    let schedule = ctx
        .schedule
        .as_mut()
        .ok_or(Error::Internal("no key schedule"))?;

    let (client, server) = schedule
        .derive_application_secrets(&th)
        .map_err(Error::Crypto)?;
    let pair = SecretPair::new(client, server);
    let exporter = schedule.derive_exporter_secret(&th).map_err(Error::Crypto)?;

    ctx.application_secrets = Some(pair);
    ctx.exporter_secret = Some(exporter);
    debug!("Application secrets derived");
    Ok(())
}

fn announce_application_secrets(ctx: &mut HandshakeContext) -> Result<(), Error> {
    let pair = ctx
        .application_secrets
        .clone()
        .ok_or(Error::Internal("no application secrets"))?;
    ctx.outputs.push_back(Output::ApplicationKeys(pair));
    Ok(())
}

/// Both Finished messages are in the transcript. Derive the resumption
/// secret, move everything the connection needs into a [`Session`] and
/// announce completion.
fn finalize_tls13(ctx: &mut HandshakeContext) -> Result<(), Error> {
    let th = ctx.current_hash();

    let schedule = ctx
        .schedule
        .take()
        .ok_or(Error::Internal("no key schedule"))?;
    let application = ctx
        .application_secrets
        .take()
        .ok_or(Error::Internal("no application secrets"))?;
    let exporter = ctx
        .exporter_secret
        .take()
        .ok_or(Error::Internal("no exporter secret"))?;
    let resumption = schedule
        .derive_resumption_secret(&th)
        .map_err(Error::Crypto)?;

    ctx.handshake_secrets = None;

    let version = ctx.negotiated()?;
    let suite = ctx.suite()?;
    let peer_certificates = mem::take(&mut ctx.peer_certificates);

    ctx.set_phase(HandshakePhase::Finished)?;
    ctx.session = Some(Session::tls13(
        version,
        suite,
        peer_certificates,
        schedule,
        application,
        exporter,
        resumption,
    ));
    ctx.outputs.push_back(Output::Connected);
    debug!("Handshake complete ({:?}, {:?})", version, suite);
    Ok(())
}

fn finalize_legacy(ctx: &mut HandshakeContext) -> Result<(), Error> {
    let legacy = ctx
        .legacy
        .take()
        .ok_or(Error::Internal("no legacy schedule"))?;
    let master = Buf::from_slice(legacy.master_secret());
    let prf = ctx.provider().prf_provider;

    let version = ctx.negotiated()?;
    let suite = ctx.suite()?;
    let peer_certificates = mem::take(&mut ctx.peer_certificates);
    let client_random = ctx
        .client_random
        .ok_or(Error::Internal("client random not recorded"))?;
    let server_random = ctx
        .server_random
        .ok_or(Error::Internal("server random not recorded"))?;

    ctx.raw_transcript = None;
    ctx.set_phase(HandshakePhase::Finished)?;
    ctx.session = Some(Session::legacy(
        version,
        suite,
        peer_certificates,
        prf,
        master,
        client_random.0,
        server_random.0,
    ));
    ctx.outputs.push_back(Output::Connected);
    debug!("Handshake complete ({:?}, {:?})", version, suite);
    Ok(())
}
