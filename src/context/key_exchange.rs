//! Key exchange and traffic secret derivation.
//!
//! Two worlds meet here. Under the 1.3 schedule the hello extensions
//! already carried the shares, so right after ServerHello both sides can
//! complete the exchange and start the HKDF schedule. Under the legacy
//! schedule the shares travel in dedicated ServerKeyExchange and
//! ClientKeyExchange messages and feed the PRF-based master secret.

use log::debug;
use zeroize::Zeroize;

use crate::buffer::Buf;
use crate::crypto::schedule::KeySchedule;
use crate::error::Error;
use crate::handshake::Incoming;
use crate::message::{
    close_message, open_message, ClientKeyExchange, DigitallySigned, EcdheParams, MessageType,
    ServerKeyExchange,
};
use crate::session::{KeyBlock, SecretPair};
use crate::types::{KxFamily, NamedGroup, Role};
use crate::Output;

use super::{certs, Credential, HandshakeContext, HandshakePhase, Possession};

/// Fixed nonce part per AEAD key in the legacy key block (RFC 5288).
const GCM_FIXED_IV_LEN: usize = 4;

/// Complete the hello-borne key exchange and start the 1.3 schedule.
///
/// The transcript covers ClientHello..ServerHello at this point, on both
/// sides: the server calls this right after producing its ServerHello, the
/// client right after consuming it.
pub(super) fn establish_tls13_secrets(ctx: &mut HandshakeContext) -> Result<(), Error> {
    let share = match ctx.role {
        Role::Client => ctx.nego.peer_share(),
        Role::Server => ctx.nego.chosen_share(),
    };
    let share = share.ok_or(Error::Internal("no key share on record"))?;
    let group = share.group;
    let peer_public = Buf::from_slice(&share.key_exchange);

    let local = ctx
        .nego
        .local_share_for(group)
        .ok_or(Error::Internal("no local share for the negotiated group"))?
        .clone();

    let mut shared = Buf::new();
    if let Err(reason) = local.complete(&peer_public, &mut shared) {
        debug!("Key exchange with {:?} failed: {}", group, reason);
        return Err(Error::IllegalParameter("peer key share rejected"));
    }

    let provider = ctx.provider();
    let suite = ctx.suite()?;
    let mut schedule =
        KeySchedule::new(&provider, suite.hash_algorithm()).map_err(Error::Crypto)?;

    let th = ctx.current_hash();
    let (client, server) = schedule
        .derive_handshake_secrets(&shared, &th)
        .map_err(Error::Crypto)?;
    shared.as_mut().zeroize();

    let pair = SecretPair::new(client, server);
    ctx.outputs.push_back(Output::HandshakeKeys(pair.clone()));
    ctx.schedule = Some(schedule);
    ctx.handshake_secrets = Some(pair);

    ctx.possession = Some(Possession::new(local));
    ctx.credential = Some(Credential::new(group, &peer_public));
    ctx.set_phase(HandshakePhase::SecretsDerived)
}

/// Ours-preference curve selection for the legacy server.
///
/// A client that sent no supported_groups gets our first curve.
fn select_curve(ctx: &HandshakeContext) -> Result<NamedGroup, Error> {
    ctx.config
        .groups()
        .iter()
        .copied()
        .filter(|group| group.family() == Some(KxFamily::Ecdhe))
        .find(|group| match ctx.nego.peer_groups() {
            Some(peer) => peer.contains(group),
            None => true,
        })
        .ok_or(Error::HandshakeFailure("no mutually supported curve"))
}

pub(super) fn produce_server_key_exchange(
    ctx: &mut HandshakeContext,
    out: &mut Buf,
) -> Result<(), Error> {
    let group = select_curve(ctx)?;
    let provider = ctx.provider();
    let supported = provider
        .supported_group(group)
        .ok_or(Error::Internal("configured group missing from the provider"))?;

    let exchange = match ctx.config.ephemeral_cache() {
        Some(cache) => cache.get_or_start(supported).map_err(Error::Crypto)?,
        None => supported.start_exchange().map_err(Error::Crypto)?,
    };

    let scheme = certs::select_signing_scheme(ctx)?;
    debug!("ServerKeyExchange with {:?}, signed via {:?}", group, scheme);

    let params = EcdheParams::new(group, exchange.pub_key());
    let content = ServerKeyExchange::signed_content(
        ctx.client_random
            .as_ref()
            .ok_or(Error::Internal("no client random on record"))?,
        ctx.server_random
            .as_ref()
            .ok_or(Error::Internal("no server random on record"))?,
        &params,
    );

    let mut signature = Buf::new();
    {
        let signer = ctx
            .signer
            .as_ref()
            .ok_or(Error::Internal("no signing key loaded"))?;
        signer
            .sign(scheme, &content, &mut signature)
            .map_err(Error::Crypto)?;
    }

    let mut body = Vec::new();
    let start = open_message(MessageType::ServerKeyExchange, &mut body);
    ServerKeyExchange::new(params, DigitallySigned::new(scheme, &signature)).serialize(&mut body);
    close_message(&mut body, start);

    ctx.hash_in(&body);
    out.extend_from_slice(&body);

    ctx.possession = Some(Possession::new(exchange));
    Ok(())
}

pub(super) fn consume_server_key_exchange(
    ctx: &mut HandshakeContext,
    incoming: &Incoming<'_>,
) -> Result<(), Error> {
    ctx.hash_in(incoming.raw);

    let (rest, ske) = ServerKeyExchange::parse(incoming.body)?;
    if !rest.is_empty() {
        return Err(Error::Decode("trailing bytes after server key exchange"));
    }

    let group = ske.params.group;
    if !ctx.config.groups().contains(&group) || group.family() != Some(KxFamily::Ecdhe) {
        return Err(Error::IllegalParameter("server chose a curve we did not offer"));
    }

    let scheme = ske.signed.scheme;
    let negotiated = ctx.negotiated()?;
    if !ctx.config.signature_schemes().contains(&scheme) || !scheme.usable_with(negotiated) {
        return Err(Error::IllegalParameter("server signed with a scheme we do not accept"));
    }

    let leaf = ctx
        .peer_certificates
        .first()
        .ok_or(Error::Internal("no peer certificate on record"))?;
    let content = ServerKeyExchange::signed_content(
        ctx.client_random
            .as_ref()
            .ok_or(Error::Internal("no client random on record"))?,
        ctx.server_random
            .as_ref()
            .ok_or(Error::Internal("no server random on record"))?,
        &ske.params,
    );

    let verifier = ctx.provider().signature_verification;
    if let Err(reason) = verifier.verify_signature(leaf, &content, ske.signed.signature, scheme) {
        debug!("ServerKeyExchange signature rejected: {}", reason);
        return Err(Error::DecryptError("server key exchange signature check failed"));
    }

    debug!("ServerKeyExchange with {:?} verified", group);
    ctx.credential = Some(Credential::new(group, ske.params.public_key));
    Ok(())
}

pub(super) fn produce_client_key_exchange(
    ctx: &mut HandshakeContext,
    out: &mut Buf,
) -> Result<(), Error> {
    let (group, peer_public) = {
        let credential = ctx
            .credential
            .as_ref()
            .ok_or(Error::Internal("no server key exchange on record"))?;
        (credential.group(), Buf::from_slice(credential.public_key()))
    };

    let provider = ctx.provider();
    let supported = provider
        .supported_group(group)
        .ok_or(Error::Internal("configured group missing from the provider"))?;
    let exchange = supported.start_exchange().map_err(Error::Crypto)?;

    let mut body = Vec::new();
    let start = open_message(MessageType::ClientKeyExchange, &mut body);
    ClientKeyExchange::new(exchange.pub_key()).serialize(&mut body);
    close_message(&mut body, start);

    ctx.hash_in(&body);
    out.extend_from_slice(&body);

    let mut shared = Buf::new();
    if let Err(reason) = exchange.complete(&peer_public, &mut shared) {
        debug!("Key exchange with {:?} failed: {}", group, reason);
        return Err(Error::IllegalParameter("server key share rejected"));
    }
    ctx.possession = Some(Possession::new(exchange));

    derive_legacy_secrets(ctx, &mut shared)
}

pub(super) fn consume_client_key_exchange(
    ctx: &mut HandshakeContext,
    incoming: &Incoming<'_>,
) -> Result<(), Error> {
    // The session hash for the extended master secret covers this message,
    // so it goes into the transcript before any secret is derived.
    ctx.hash_in(incoming.raw);

    let (rest, cke) = ClientKeyExchange::parse(incoming.body)?;
    if !rest.is_empty() {
        return Err(Error::Decode("trailing bytes after client key exchange"));
    }

    let exchange = ctx
        .possession
        .as_ref()
        .ok_or(Error::Internal("no ephemeral key on record"))?
        .exchange()
        .clone();
    let group = exchange.group();

    let mut shared = Buf::new();
    if let Err(reason) = exchange.complete(cke.public_key, &mut shared) {
        debug!("Key exchange with {:?} failed: {}", group, reason);
        return Err(Error::IllegalParameter("client key share rejected"));
    }

    ctx.credential = Some(Credential::new(group, cke.public_key));
    derive_legacy_secrets(ctx, &mut shared)
}

/// Turn the freshly completed exchange into the legacy master secret and
/// record key block.
fn derive_legacy_secrets(ctx: &mut HandshakeContext, shared: &mut Buf) -> Result<(), Error> {
    let suite = ctx.suite()?;
    let client_random = ctx
        .client_random
        .ok_or(Error::Internal("no client random on record"))?;
    let server_random = ctx
        .server_random
        .ok_or(Error::Internal("no server random on record"))?;

    let session_hash = ctx.nego.ems().then(|| ctx.current_hash());

    let legacy = ctx
        .legacy
        .as_mut()
        .ok_or(Error::Internal("no legacy schedule"))?;
    match &session_hash {
        Some(hash) => legacy
            .derive_extended_master_secret(shared, hash)
            .map_err(Error::Crypto)?,
        None => legacy
            .derive_master_secret(shared, &client_random.0, &server_random.0)
            .map_err(Error::Crypto)?,
    }
    shared.as_mut().zeroize();

    let key_len = suite.key_len();
    let block_len = 2 * key_len + 2 * GCM_FIXED_IV_LEN;
    let mut block = legacy
        .derive_key_block(&client_random.0, &server_random.0, block_len)
        .map_err(Error::Crypto)?;

    let (client_write_key, rest) = block.split_at(key_len);
    let (server_write_key, rest) = rest.split_at(key_len);
    let (client_write_iv, server_write_iv) = rest.split_at(GCM_FIXED_IV_LEN);
    let keys = KeyBlock {
        client_write_key: Buf::from_slice(client_write_key),
        server_write_key: Buf::from_slice(server_write_key),
        client_write_iv: Buf::from_slice(client_write_iv),
        server_write_iv: Buf::from_slice(server_write_iv),
    };
    block.as_mut().zeroize();

    debug!(
        "Legacy secrets derived ({} byte key block, ems: {})",
        block_len,
        session_hash.is_some()
    );
    ctx.outputs.push_back(Output::KeyBlock(keys));
    ctx.set_phase(HandshakePhase::SecretsDerived)
}
