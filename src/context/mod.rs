//! Handshake driver.
//!
//! [`HandshakeContext`] owns one negotiation from first hello to the
//! [`Session`] handover. The caller feeds it raw handshake messages and
//! peer alerts, and drains [`Output`] values: messages to send, alerts,
//! derived key material and finally `Output::Connected`.
//!
//! The context is transport agnostic. Record framing, encryption and
//! retransmission live with the caller; this layer decides what the next
//! message is, checks every received one against the running expectation
//! list, and keeps the transcript and key schedules in step.
//!
//! Message semantics are spread over the submodules: hello exchange and
//! version/suite selection in [`hello`], certificate path in [`certs`],
//! key exchange and secret derivation in [`key_exchange`], the finished
//! exchange and session handover in [`finish`].

use std::collections::VecDeque;
use std::sync::Arc;

use log::{debug, trace};
use zeroize::Zeroize;

use crate::alert::{Alert, AlertMessage, CloseState};
use crate::buffer::Buf;
use crate::config::Config;
use crate::cookie::HelloCookieManager;
use crate::crypto::prf::LegacySchedule;
use crate::crypto::schedule::KeySchedule;
use crate::crypto::transcript::TranscriptHash;
use crate::crypto::{ActiveKeyExchange, CryptoProvider, SigningKey};
use crate::error::Error;
use crate::extension::NegotiationState;
use crate::handshake::{
    self, Dispatch, ExpectedMessages, Incoming, MessageHandler, Presence,
};
use crate::message::{MessageType, Random, SessionId};
use crate::post::PostHandshakeContext;
use crate::session::{SecretPair, Session};
use crate::types::{
    CipherSuite, ClientAuth, KxFamily, NamedGroup, ProtocolVersion, Role, SignatureScheme,
};
use crate::Output;

mod certs;
mod finish;
mod hello;
mod key_exchange;

/// Where the handshake currently stands.
///
/// Phases only ever move forward. `Aborted` is terminal; a context that
/// reached it refuses further input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePhase {
    /// Nothing sent or received yet.
    Started,
    /// Hellos are in flight, parameters not yet pinned.
    Negotiating,
    /// Version and suite are fixed, key exchange material outstanding.
    KeyExchangePending,
    /// Traffic secrets exist, finished exchange outstanding.
    SecretsDerived,
    /// Both finished messages verified, session available.
    Finished,
    /// Handshake failed, secrets wiped.
    Aborted,
}

/// Proof that we hold the private half of a key exchange.
///
/// Created when our share completes against the peer's. The variant
/// records which exchange family produced it so phase preconditions can
/// check the family matches what was negotiated.
#[derive(Debug)]
pub(crate) enum Possession {
    Ecdhe(Arc<dyn ActiveKeyExchange>),
    Ffdhe(Arc<dyn ActiveKeyExchange>),
}

impl Possession {
    pub(crate) fn new(exchange: Arc<dyn ActiveKeyExchange>) -> Possession {
        match exchange.group().family() {
            Some(KxFamily::Ffdhe) => Possession::Ffdhe(exchange),
            _ => Possession::Ecdhe(exchange),
        }
    }

    pub(crate) fn family(&self) -> KxFamily {
        match self {
            Possession::Ecdhe(_) => KxFamily::Ecdhe,
            Possession::Ffdhe(_) => KxFamily::Ffdhe,
        }
    }

    pub(crate) fn exchange(&self) -> &Arc<dyn ActiveKeyExchange> {
        match self {
            Possession::Ecdhe(exchange) | Possession::Ffdhe(exchange) => exchange,
        }
    }
}

/// The peer's public key exchange material, held until we answer it.
#[derive(Debug)]
pub(crate) enum Credential {
    Ecdhe { group: NamedGroup, public_key: Buf },
    Ffdhe { group: NamedGroup, public_key: Buf },
}

impl Credential {
    pub(crate) fn new(group: NamedGroup, public_key: &[u8]) -> Credential {
        let public_key = Buf::from_slice(public_key);
        match group.family() {
            Some(KxFamily::Ffdhe) => Credential::Ffdhe { group, public_key },
            _ => Credential::Ecdhe { group, public_key },
        }
    }

    pub(crate) fn family(&self) -> KxFamily {
        match self {
            Credential::Ecdhe { .. } => KxFamily::Ecdhe,
            Credential::Ffdhe { .. } => KxFamily::Ffdhe,
        }
    }

    pub(crate) fn group(&self) -> NamedGroup {
        match self {
            Credential::Ecdhe { group, .. } | Credential::Ffdhe { group, .. } => *group,
        }
    }

    pub(crate) fn public_key(&self) -> &[u8] {
        match self {
            Credential::Ecdhe { public_key, .. } | Credential::Ffdhe { public_key, .. } => {
                public_key
            }
        }
    }
}

/// The key exchange family a signature scheme's certificate keys belong to.
pub(crate) fn scheme_family(scheme: SignatureScheme) -> KxFamily {
    match scheme {
        SignatureScheme::ECDSA_SECP256R1_SHA256
        | SignatureScheme::ECDSA_SECP384R1_SHA384
        | SignatureScheme::ED25519 => KxFamily::Ecdhe,
        _ => KxFamily::Rsa,
    }
}

/// One handshake, client or server side.
#[derive(Debug)]
pub struct HandshakeContext {
    config: Arc<Config>,
    role: Role,
    phase: HandshakePhase,
    close: CloseState,

    nego: NegotiationState,
    suite: Option<CipherSuite>,
    client_random: Option<Random>,
    server_random: Option<Random>,
    session_id: SessionId,

    transcript: TranscriptHash,
    /// Verbatim message bytes, kept only while a legacy version is still
    /// possible. Legacy CertificateVerify signs these rather than a hash.
    raw_transcript: Option<Buf>,

    schedule: Option<KeySchedule>,
    legacy: Option<LegacySchedule>,
    handshake_secrets: Option<SecretPair>,
    application_secrets: Option<SecretPair>,
    exporter_secret: Option<Buf>,

    possession: Option<Possession>,
    credential: Option<Credential>,
    signer: Option<Box<dyn SigningKey>>,

    peer_certificates: Vec<Buf>,
    validate_after_status: bool,
    client_cert_requested: bool,
    client_cert_sent: bool,
    client_cv_scheme: Option<SignatureScheme>,

    expected: ExpectedMessages,

    /// Toggled while the ServerHello producer should emit a retry instead.
    send_retry: bool,
    retry_sent: bool,
    retry_received: bool,
    retry_version: Option<ProtocolVersion>,
    retry_suite: Option<CipherSuite>,
    /// Transcript hash the cookie in our retry bound, for the echo check.
    retry_hash: Option<Buf>,
    cookies: Option<HelloCookieManager>,

    outputs: VecDeque<Output>,
    session: Option<Session>,
}

impl HandshakeContext {
    fn new(role: Role, config: Arc<Config>) -> Result<HandshakeContext, Error> {
        if role == Role::Server && config.identity().is_none() {
            return Err(Error::Config("server requires an identity"));
        }
        if role == Role::Server
            && config.client_auth() != ClientAuth::None
            && config.validator().is_none()
        {
            return Err(Error::Config("client authentication requires a validator"));
        }
        if role == Role::Client && config.validator().is_none() {
            return Err(Error::Config("client requires a certificate validator"));
        }

        let provider = config.crypto_provider();

        let signer = match config.identity() {
            Some(identity) => Some(
                provider
                    .key_provider
                    .load_private_key(&identity.private_key)
                    .map_err(Error::Crypto)?,
            ),
            None => None,
        };

        let cookies = if role == Role::Server && config.require_cookie() {
            Some(HelloCookieManager::new(provider).map_err(Error::Crypto)?)
        } else {
            None
        };

        let nego = NegotiationState::new(
            role,
            config.versions().clone(),
            config.groups().clone(),
            config.signature_schemes().clone(),
            config.with_extended_master_secret(),
            role == Role::Client && config.request_stapling(),
            role == Role::Server && config.stapled_response().is_some(),
        );

        let any_legacy = config
            .versions()
            .iter()
            .any(|v| v.uses_legacy_schedule());
        let raw_transcript = any_legacy.then(Buf::new);

        let best = nego.best_version();
        let session_id = if role == Role::Client && !best.is_dtls() {
            SessionId::random(32)
        } else {
            SessionId::empty()
        };

        let transcript = TranscriptHash::new(provider);

        Ok(HandshakeContext {
            config,
            role,
            phase: HandshakePhase::Started,
            close: CloseState::Open,
            nego,
            suite: None,
            client_random: None,
            server_random: None,
            session_id,
            transcript,
            raw_transcript,
            schedule: None,
            legacy: None,
            handshake_secrets: None,
            application_secrets: None,
            exporter_secret: None,
            possession: None,
            credential: None,
            signer,
            peer_certificates: Vec::new(),
            validate_after_status: false,
            client_cert_requested: false,
            client_cert_sent: false,
            client_cv_scheme: None,
            expected: ExpectedMessages::default(),
            send_retry: false,
            retry_sent: false,
            retry_received: false,
            retry_version: None,
            retry_suite: None,
            retry_hash: None,
            cookies,
            outputs: VecDeque::new(),
            session: None,
        })
    }

    /// Start a client handshake. The first ClientHello is queued
    /// immediately and can be drained with [`poll_output`][Self::poll_output].
    pub fn client(config: Arc<Config>) -> Result<HandshakeContext, Error> {
        let mut ctx = Self::new(Role::Client, config)?;

        if ctx.nego.offers_tls13() {
            let group = ctx.config.groups()[0];
            let provider = ctx.provider();
            let supported = provider
                .supported_group(group)
                .ok_or(Error::Internal("configured group missing from the provider"))?;
            let share = supported.start_exchange().map_err(Error::Crypto)?;
            ctx.nego.stage_local_share(share);
        }

        ctx.produce_message(MessageType::ClientHello)?;
        handshake::expect(&mut ctx, MessageType::ServerHello, Presence::Required)?;
        ctx.set_phase(HandshakePhase::Negotiating)?;
        Ok(ctx)
    }

    /// Start a server handshake, waiting for the first ClientHello.
    pub fn server(config: Arc<Config>) -> Result<HandshakeContext, Error> {
        let mut ctx = Self::new(Role::Server, config)?;
        handshake::expect(&mut ctx, MessageType::ClientHello, Presence::Required)?;
        Ok(ctx)
    }

    /// Feed one complete handshake message, header included.
    ///
    /// Any error aborts the handshake: secrets are wiped, a fatal alert is
    /// queued when the error maps to one, and the phase moves to
    /// [`HandshakePhase::Aborted`].
    pub fn handle_message(&mut self, data: &[u8]) -> Result<(), Error> {
        if self.phase == HandshakePhase::Aborted {
            return Err(Error::Aborted);
        }
        let result = self.handle_message_inner(data);
        if let Err(error) = &result {
            self.abort_with(error);
        }
        result
    }

    fn handle_message_inner(&mut self, data: &[u8]) -> Result<(), Error> {
        if self.close.is_input_closed() {
            return Err(Error::UnexpectedMessage("input side is closed"));
        }
        let incoming = Incoming::parse(data)?;
        trace!("Received {:?} ({} bytes)", incoming.msg_type, data.len());
        handshake::dispatch(self, &incoming)
    }

    /// Feed an alert received from the peer.
    ///
    /// `close_notify` closes the input side and queues our own
    /// `close_notify` in response. Every other alert received while the
    /// handshake is active kills it, warning level included.
    pub fn handle_alert(&mut self, alert: AlertMessage) -> Result<(), Error> {
        if self.phase == HandshakePhase::Aborted {
            return Err(Error::Aborted);
        }
        let result = self.handle_alert_inner(alert);
        if let Err(error) = &result {
            self.abort_with(error);
        }
        result
    }

    fn handle_alert_inner(&mut self, alert: AlertMessage) -> Result<(), Error> {
        if self.close.is_input_closed() {
            return Err(Error::UnexpectedMessage("input side is closed"));
        }
        debug!("Peer alert: {:?}/{:?}", alert.level, alert.description);

        if alert.description == Alert::CloseNotify {
            self.close = self.close.close_input();
            if !self.close.is_output_closed() {
                self.outputs.push_back(Output::Alert(AlertMessage::close_notify()));
                self.close = self.close.close_output();
            }
            return Err(Error::Aborted);
        }

        if !alert.is_fatal() && self.tolerates(alert.description) {
            return Ok(());
        }

        // A warning we cannot act on leaves the handshake in an undefined
        // state, so it is treated exactly like a fatal alert.
        Err(Error::PeerAlert(alert.description))
    }

    /// Warning alerts the current state can absorb.
    fn tolerates(&mut self, description: Alert) -> bool {
        let declinable = self.role == Role::Server
            && self.config.tolerate_no_certificate()
            && self.config.client_auth() == ClientAuth::Requested
            && self.client_cert_requested
            && !self.client_cert_sent;

        if description == Alert::NoCertificate && declinable {
            debug!("Client declined the certificate request");
            self.expected.remove(MessageType::Certificate);
            self.expected.remove(MessageType::CertificateVerify);
            return true;
        }
        false
    }

    /// Signal that the current incoming flight is complete.
    ///
    /// Datagram transports call this when a flight boundary is reached so
    /// that optional messages the peer chose not to send get their absence
    /// handling. Stream transports never need it; absences resolve when a
    /// later message arrives.
    pub fn flight_done(&mut self) -> Result<(), Error> {
        if self.phase == HandshakePhase::Aborted {
            return Err(Error::Aborted);
        }
        let result = handshake::flight_done(self);
        if let Err(error) = &result {
            self.abort_with(error);
        }
        result
    }

    /// Drain the next queued output, if any.
    pub fn poll_output(&mut self) -> Option<Output> {
        self.outputs.pop_front()
    }

    pub fn phase(&self) -> HandshakePhase {
        self.phase
    }

    pub fn close_state(&self) -> CloseState {
        self.close
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_connected(&self) -> bool {
        self.phase == HandshakePhase::Finished
    }

    /// The finished session, once [`Output::Connected`] has been emitted.
    pub fn take_session(&mut self) -> Option<Session> {
        self.session.take()
    }

    /// Hand the finished session to a post-handshake context.
    ///
    /// Servers immediately queue the configured number of session tickets.
    pub fn into_post_handshake(mut self) -> Result<PostHandshakeContext, Error> {
        let session = self
            .session
            .take()
            .ok_or(Error::Internal("handshake has not finished"))?;
        let mut post = PostHandshakeContext::new(session, self.role)?;
        if self.role == Role::Server {
            post.issue_tickets(self.config.session_tickets())?;
        }
        Ok(post)
    }

    /// Abort locally. Queues `user_canceled` followed by `close_notify`
    /// and wipes all secret state.
    pub fn abort(&mut self) {
        if self.phase == HandshakePhase::Aborted {
            return;
        }
        debug!("Handshake canceled locally");
        if !self.close.is_output_closed() {
            self.outputs
                .push_back(Output::Alert(AlertMessage::warning(Alert::UserCanceled)));
            self.outputs.push_back(Output::Alert(AlertMessage::close_notify()));
            self.close = self.close.close_output();
        }
        self.wipe();
        self.phase = HandshakePhase::Aborted;
    }

    fn abort_with(&mut self, error: &Error) {
        debug!("Handshake aborted: {}", error);
        if let Some(alert) = error.alert() {
            if !self.close.is_output_closed() {
                self.outputs.push_back(Output::Alert(AlertMessage::fatal(alert)));
            }
        }
        self.close = CloseState::Closed;
        self.wipe();
        self.phase = HandshakePhase::Aborted;
    }

    /// Drop every piece of secret material this context still holds.
    fn wipe(&mut self) {
        self.schedule = None;
        self.legacy = None;
        self.handshake_secrets = None;
        self.application_secrets = None;
        if let Some(exporter) = &mut self.exporter_secret {
            exporter.zeroize();
        }
        self.exporter_secret = None;
        self.possession = None;
        self.session = None;
        self.nego.clear_local_shares();
        self.expected.clear();
    }

    // Internals shared by the submodules.

    /// The provider is a handful of static references, cloning it sidesteps
    /// borrow entanglement with `&mut self` call chains.
    pub(crate) fn provider(&self) -> CryptoProvider {
        self.config.crypto_provider().clone()
    }

    /// Mix raw message bytes into the running transcript.
    pub(crate) fn hash_in(&mut self, raw: &[u8]) {
        self.transcript.update(raw);
        if let Some(buffer) = &mut self.raw_transcript {
            buffer.extend_from_slice(raw);
        }
    }

    pub(crate) fn current_hash(&self) -> Buf {
        let mut hash = Buf::new();
        self.transcript.current_hash(&mut hash);
        hash
    }

    pub(crate) fn negotiated(&self) -> Result<ProtocolVersion, Error> {
        self.nego
            .negotiated_version()
            .ok_or(Error::Internal("no negotiated version"))
    }

    pub(crate) fn suite(&self) -> Result<CipherSuite, Error> {
        self.suite.ok_or(Error::Internal("no selected cipher suite"))
    }

    /// The best configured version sharing a transport family with
    /// `negotiated`, for downgrade sentinel handling.
    pub(crate) fn best_version_in_family(&self, negotiated: ProtocolVersion) -> ProtocolVersion {
        let mut best = negotiated;
        for v in self.config.versions().iter() {
            if v.is_dtls() == negotiated.is_dtls() && v.ordinal() > best.ordinal() {
                best = *v;
            }
        }
        best
    }

    /// Run the registered producer for `msg_type` and queue the result.
    pub(crate) fn produce_message(&mut self, msg_type: MessageType) -> Result<(), Error> {
        let mut out = Buf::new();
        handshake::produce(self, msg_type, &mut out)?;
        debug!("Sending {:?} ({} bytes)", msg_type, out.len());
        self.outputs.push_back(Output::Message(out));
        Ok(())
    }

    /// Advance the phase, checking the entry conditions for the target.
    ///
    /// A violated condition is a bug in the driver, not peer misbehavior,
    /// and surfaces as [`Error::Internal`].
    pub(crate) fn set_phase(&mut self, phase: HandshakePhase) -> Result<(), Error> {
        match phase {
            HandshakePhase::KeyExchangePending => {
                if self.nego.negotiated_version().is_none() || self.suite.is_none() {
                    return Err(Error::Internal("key exchange before parameters are pinned"));
                }
            }
            HandshakePhase::SecretsDerived => {
                let family = self.required_kx_family()?;
                let held = self
                    .possession
                    .as_ref()
                    .map(Possession::family)
                    .or_else(|| self.credential.as_ref().map(Credential::family));
                if held != Some(family) {
                    return Err(Error::Internal("no key exchange material for the negotiated family"));
                }
            }
            HandshakePhase::Finished => {
                if self.phase != HandshakePhase::SecretsDerived {
                    return Err(Error::Internal("finishing before secrets are derived"));
                }
            }
            _ => {}
        }
        trace!("Phase {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
        Ok(())
    }

    /// The key exchange family the negotiated parameters call for.
    fn required_kx_family(&self) -> Result<KxFamily, Error> {
        let negotiated = self.negotiated()?;
        if negotiated.uses_tls13_schedule() {
            let share = match self.role {
                Role::Client => self.nego.peer_share(),
                Role::Server => self.nego.chosen_share(),
            };
            let share = share.ok_or(Error::Internal("no key share on record"))?;
            Ok(share.group.family().unwrap_or(KxFamily::Ecdhe))
        } else {
            Ok(self.suite()?.kx_family())
        }
    }
}

impl Dispatch for HandshakeContext {
    fn handlers() -> &'static [MessageHandler<Self>] {
        TABLE
    }

    fn expected_mut(&mut self) -> &mut ExpectedMessages {
        &mut self.expected
    }
}

static TABLE: &[MessageHandler<HandshakeContext>] = &[
    MessageHandler {
        msg_type: MessageType::ClientHello,
        recurring: false,
        produce: hello::produce_client_hello,
        consume: hello::consume_client_hello,
        absent: handshake::absent_ok,
    },
    MessageHandler {
        msg_type: MessageType::ServerHello,
        recurring: false,
        produce: hello::produce_server_hello,
        consume: hello::consume_server_hello,
        absent: handshake::absent_ok,
    },
    MessageHandler {
        msg_type: MessageType::EncryptedExtensions,
        recurring: false,
        produce: finish::produce_encrypted_extensions,
        consume: finish::consume_encrypted_extensions,
        absent: handshake::absent_ok,
    },
    MessageHandler {
        msg_type: MessageType::Certificate,
        recurring: false,
        produce: certs::produce_certificate,
        consume: certs::consume_certificate,
        absent: handshake::absent_ok,
    },
    MessageHandler {
        msg_type: MessageType::ServerKeyExchange,
        recurring: false,
        produce: key_exchange::produce_server_key_exchange,
        consume: key_exchange::consume_server_key_exchange,
        absent: handshake::absent_ok,
    },
    MessageHandler {
        msg_type: MessageType::CertificateRequest,
        recurring: false,
        produce: certs::produce_certificate_request,
        consume: certs::consume_certificate_request,
        absent: certs::absent_certificate_request,
    },
    MessageHandler {
        msg_type: MessageType::ServerHelloDone,
        recurring: false,
        produce: finish::produce_server_hello_done,
        consume: finish::consume_server_hello_done,
        absent: handshake::absent_ok,
    },
    MessageHandler {
        msg_type: MessageType::CertificateVerify,
        recurring: false,
        produce: certs::produce_certificate_verify,
        consume: certs::consume_certificate_verify,
        absent: certs::absent_certificate_verify,
    },
    MessageHandler {
        msg_type: MessageType::ClientKeyExchange,
        recurring: false,
        produce: key_exchange::produce_client_key_exchange,
        consume: key_exchange::consume_client_key_exchange,
        absent: handshake::absent_ok,
    },
    MessageHandler {
        msg_type: MessageType::CertificateStatus,
        recurring: false,
        produce: certs::produce_certificate_status,
        consume: certs::consume_certificate_status,
        absent: certs::absent_certificate_status,
    },
    MessageHandler {
        msg_type: MessageType::Finished,
        recurring: false,
        produce: finish::produce_finished,
        consume: finish::consume_finished,
        absent: handshake::absent_ok,
    },
];
