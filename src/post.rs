//! Post-handshake driver: key updates and session tickets on top of a
//! finished 1.3-family session.

use std::collections::VecDeque;

use log::{debug, trace};
use rand::{Rng, RngCore};

use crate::alert::{Alert, AlertMessage, CloseState};
use crate::buffer::Buf;
use crate::error::Error;
use crate::handshake::{
    self, produce_never, Dispatch, ExpectedMessages, Incoming, MessageHandler, Presence,
};
use crate::message::{close_message, open_message, KeyUpdate, MessageType, NewSessionTicket};
use crate::session::{Session, SessionTicket};
use crate::types::Role;
use crate::Output;

/// Drives the messages a connection may still exchange once the handshake
/// is over: [`KeyUpdate`] in both directions and, towards a client,
/// [`NewSessionTicket`].
///
/// Only the 1.3-family schedule defines post-handshake messages. The
/// wrapped [`Session`] stays accessible through [`Self::session`] whatever
/// happens here; a failed key update kills the message flow, not the keys
/// already handed out.
#[derive(Debug)]
pub struct PostHandshakeContext {
    session: Session,
    role: Role,
    expected: ExpectedMessages,
    outputs: VecDeque<Output>,
    close: CloseState,
    ticket_counter: u64,
    aborted: bool,
}

impl PostHandshakeContext {
    pub(crate) fn new(session: Session, role: Role) -> Result<Self, Error> {
        if !session.version().uses_tls13_schedule() {
            return Err(Error::UnexpectedMessage(
                "post-handshake messages need the 1.3 schedule",
            ));
        }

        let mut post = PostHandshakeContext {
            session,
            role,
            expected: ExpectedMessages::default(),
            outputs: VecDeque::new(),
            close: CloseState::Open,
            ticket_counter: 0,
            aborted: false,
        };

        handshake::expect(&mut post, MessageType::KeyUpdate, Presence::Optional)?;
        if post.role == Role::Client {
            handshake::expect(&mut post, MessageType::NewSessionTicket, Presence::Optional)?;
        }
        Ok(post)
    }

    /// Feed one complete post-handshake message, header included.
    pub fn handle_message(&mut self, data: &[u8]) -> Result<(), Error> {
        if self.aborted {
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
    /// With the handshake over, warnings no longer endanger negotiation
    /// state and are ignored. `close_notify` is answered and closes both
    /// directions; fatal alerts surface as [`Error::PeerAlert`].
    pub fn handle_alert(&mut self, alert: AlertMessage) -> Result<(), Error> {
        if self.aborted {
            return Err(Error::Aborted);
        }
        debug!("Peer alert: {:?}/{:?}", alert.level, alert.description);

        if alert.description == Alert::CloseNotify {
            self.close = self.close.close_input();
            if !self.close.is_output_closed() {
                self.outputs
                    .push_back(Output::Alert(AlertMessage::close_notify()));
                self.close = self.close.close_output();
            }
            self.aborted = true;
            return Err(Error::Aborted);
        }

        if !alert.is_fatal() {
            return Ok(());
        }

        self.aborted = true;
        self.close = CloseState::Closed;
        Err(Error::PeerAlert(alert.description))
    }

    /// Rotate our sending key, asking the peer to do the same.
    pub fn request_key_update(&mut self) -> Result<(), Error> {
        if self.aborted {
            return Err(Error::Aborted);
        }
        self.queue_key_update(KeyUpdate::request_update())
    }

    /// Queue `count` session tickets towards the client.
    pub(crate) fn issue_tickets(&mut self, count: u8) -> Result<(), Error> {
        for _ in 0..count {
            let mut rng = rand::thread_rng();
            let age_add: u32 = rng.gen();
            let nonce = self.ticket_counter.to_be_bytes();
            self.ticket_counter += 1;

            let mut value = [0u8; 32];
            rng.fill_bytes(&mut value);

            let mut body = Vec::new();
            let start = open_message(MessageType::NewSessionTicket, &mut body);
            NewSessionTicket::new(TICKET_LIFETIME_SECS, age_add, &nonce, &value)
                .serialize(&mut body);
            close_message(&mut body, start);

            debug!("Issuing session ticket #{}", self.ticket_counter);
            self.outputs.push_back(Output::Message(Buf::from_slice(&body)));
            self.outputs.push_back(Output::Ticket(SessionTicket {
                lifetime: TICKET_LIFETIME_SECS,
                age_add,
                nonce: nonce.to_vec(),
                ticket: value.to_vec(),
            }));
        }
        Ok(())
    }

    /// Serialize and queue a KeyUpdate, then ratchet our sending secret.
    ///
    /// The message itself still travels under the old key, so it is queued
    /// before the ratchet output.
    fn queue_key_update(&mut self, key_update: KeyUpdate) -> Result<(), Error> {
        let mut body = Vec::new();
        let start = open_message(MessageType::KeyUpdate, &mut body);
        key_update.serialize(&mut body);
        close_message(&mut body, start);
        self.outputs.push_back(Output::Message(Buf::from_slice(&body)));

        let secret = self.session.ratchet_application_secret(self.role)?;
        debug!("Local sending key updated");
        self.outputs.push_back(Output::KeyUpdated {
            sender: self.role,
            secret,
        });
        Ok(())
    }

    /// Drain the next queued output, if any.
    pub fn poll_output(&mut self) -> Option<Output> {
        self.outputs.pop_front()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn into_session(self) -> Session {
        self.session
    }

    pub fn close_state(&self) -> CloseState {
        self.close
    }

    pub fn role(&self) -> Role {
        self.role
    }

    fn abort_with(&mut self, error: &Error) {
        debug!("Post-handshake exchange failed: {}", error);
        if let Some(alert) = error.alert() {
            if !self.close.is_output_closed() {
                self.outputs.push_back(Output::Alert(AlertMessage::fatal(alert)));
            }
        }
        self.close = CloseState::Closed;
        self.aborted = true;
    }
}

/// RFC 8446 caps ticket lifetimes at seven days; two hours is plenty.
const TICKET_LIFETIME_SECS: u32 = 7200;

fn consume_key_update(ctx: &mut PostHandshakeContext, incoming: &Incoming<'_>) -> Result<(), Error> {
    let (rest, key_update) = KeyUpdate::parse(incoming.body)?;
    if !rest.is_empty() {
        return Err(Error::Decode("trailing bytes after key update"));
    }

    let peer = ctx.role.peer();
    let secret = ctx.session.ratchet_application_secret(peer)?;
    debug!(
        "Peer receiving key updated (update requested: {})",
        key_update.is_update_requested()
    );
    ctx.outputs.push_back(Output::KeyUpdated {
        sender: peer,
        secret,
    });

    if key_update.is_update_requested() {
        ctx.queue_key_update(KeyUpdate::update_not_requested())?;
    }
    Ok(())
}

fn consume_new_session_ticket(
    ctx: &mut PostHandshakeContext,
    incoming: &Incoming<'_>,
) -> Result<(), Error> {
    let (rest, ticket) = NewSessionTicket::parse(incoming.body)?;
    if !rest.is_empty() {
        return Err(Error::Decode("trailing bytes after new session ticket"));
    }

    debug!(
        "Received session ticket ({} bytes, lifetime {}s)",
        ticket.ticket.len(),
        ticket.ticket_lifetime
    );
    ctx.outputs.push_back(Output::Ticket(SessionTicket {
        lifetime: ticket.ticket_lifetime,
        age_add: ticket.ticket_age_add,
        nonce: ticket.ticket_nonce.to_vec(),
        ticket: ticket.ticket.to_vec(),
    }));
    Ok(())
}

impl Dispatch for PostHandshakeContext {
    fn handlers() -> &'static [MessageHandler<Self>] {
        TABLE
    }

    fn expected_mut(&mut self) -> &mut ExpectedMessages {
        &mut self.expected
    }
}

static TABLE: &[MessageHandler<PostHandshakeContext>] = &[
    MessageHandler {
        msg_type: MessageType::KeyUpdate,
        recurring: true,
        produce: produce_never,
        consume: consume_key_update,
        absent: handshake::absent_ok,
    },
    MessageHandler {
        msg_type: MessageType::NewSessionTicket,
        recurring: true,
        produce: produce_never,
        consume: consume_new_session_ticket,
        absent: handshake::absent_ok,
    },
];
