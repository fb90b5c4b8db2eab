//! Handshake message dispatch.
//!
//! A process-wide table maps each handshake message type to its producer,
//! consumer and absence handler. What varies per connection is only which
//! consumers are currently legal: every context carries an ordered
//! [`ExpectedMessages`] set naming the messages the peer may still send.
//!
//! [`dispatch`] looks the arrived type up in both. A type with no pending
//! expectation fails with [`Error::UnexpectedMessage`]. An arrival further
//! down the expected order proves the peer skipped everything in between:
//! each skipped optional message gets its absence handler fired (deferred
//! work such as certificate validation lands there), while a skipped
//! required message fails the handshake. Consumed single-shot entries
//! leave the set; recurring ones (post-handshake key updates) stay.

use tinyvec::ArrayVec;

use crate::buffer::Buf;
use crate::error::Error;
use crate::message::{Header, MessageType};

/// One decrypted handshake message as delivered by the record layer.
///
/// `raw` spans the whole message including the 4 byte header, since the
/// transcript hash covers headers too. `body` is the payload behind it.
#[derive(Debug, Clone, Copy)]
pub struct Incoming<'a> {
    pub msg_type: MessageType,
    pub raw: &'a [u8],
    pub body: &'a [u8],
}

impl<'a> Incoming<'a> {
    pub fn parse(raw: &'a [u8]) -> Result<Incoming<'a>, Error> {
        let (body, header) =
            Header::parse(raw).map_err(|_| Error::Decode("handshake message header"))?;

        if body.len() != header.length {
            return Err(Error::Decode("handshake message length mismatch"));
        }

        Ok(Incoming {
            msg_type: header.msg_type,
            raw,
            body,
        })
    }
}

pub type ProduceFn<C> = fn(&mut C, &mut Buf) -> Result<(), Error>;
pub type ConsumeFn<C> = fn(&mut C, &Incoming<'_>) -> Result<(), Error>;
pub type AbsentFn<C> = fn(&mut C) -> Result<(), Error>;

/// The pluggable behaviors for one handshake message type.
///
/// `recurring` marks types the peer may legally send more than once;
/// their expectation survives consumption.
pub struct MessageHandler<C> {
    pub msg_type: MessageType,
    pub recurring: bool,
    pub produce: ProduceFn<C>,
    pub consume: ConsumeFn<C>,
    pub absent: AbsentFn<C>,
}

/// Producer for message types a context only ever receives.
pub fn produce_never<C>(_: &mut C, _: &mut Buf) -> Result<(), Error> {
    Err(Error::Internal("message type has no producer"))
}

/// Absence handler for messages with nothing to defer.
pub fn absent_ok<C>(_: &mut C) -> Result<(), Error> {
    Ok(())
}

/// A context type with a handler table and an expected set.
///
/// Implemented by the handshake context and again by the post-handshake
/// context, each with its own table.
pub trait Dispatch: Sized {
    fn handlers() -> &'static [MessageHandler<Self>];

    fn expected_mut(&mut self) -> &mut ExpectedMessages;
}

pub fn handler_for<C: Dispatch>(msg_type: MessageType) -> Option<&'static MessageHandler<C>> {
    C::handlers().iter().find(|h| h.msg_type == msg_type)
}

/// Whether a message the peer might send is mandatory or may be skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Required,
    Optional,
}

#[derive(Debug, Clone, Copy, Default)]
struct Expected {
    msg_type: MessageType,
    required: bool,
    recurring: bool,
}

type SkippedMessages = ArrayVec<[MessageType; 8]>;

/// The ordered set of consumers a context still expects from its peer.
///
/// Pure data. The fn pointers stay in the process-wide handler table;
/// this only records which types are pending and how strictly.
#[derive(Debug, Clone, Default)]
pub struct ExpectedMessages {
    entries: ArrayVec<[Expected; 8]>,
}

impl ExpectedMessages {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, msg_type: MessageType) -> bool {
        self.entries.iter().any(|e| e.msg_type == msg_type)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drop an expectation without firing its absence handler.
    ///
    /// Used when a tolerated warning alert makes pending consumers
    /// irrelevant, so the flight does not deadlock waiting for them.
    pub fn remove(&mut self, msg_type: MessageType) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.msg_type != msg_type);
        before != self.entries.len()
    }

    fn push(&mut self, msg_type: MessageType, presence: Presence, recurring: bool) {
        debug_assert!(!self.contains(msg_type));
        self.entries.push(Expected {
            msg_type,
            required: presence == Presence::Required,
            recurring,
        });
    }

    /// Accept an arrived message type, deciding what it implicitly skipped.
    ///
    /// Returns the optional types the peer jumped over, oldest first. The
    /// caller fires their absence handlers before consuming the arrival.
    fn accept(&mut self, msg_type: MessageType) -> Result<SkippedMessages, Error> {
        let position = self
            .entries
            .iter()
            .position(|e| e.msg_type == msg_type)
            .ok_or(Error::UnexpectedMessage("message not expected now"))?;

        let mut skipped = SkippedMessages::new();
        for entry in &self.entries[..position] {
            if entry.recurring {
                continue;
            }
            if entry.required {
                return Err(Error::UnexpectedMessage(
                    "message arrived before a required predecessor",
                ));
            }
            skipped.push(entry.msg_type);
        }

        self.entries.retain(|e| {
            if skipped.contains(&e.msg_type) {
                return false;
            }
            e.msg_type != msg_type || e.recurring
        });

        Ok(skipped)
    }

    /// Take the next single-shot expectation left over at a flight end.
    ///
    /// Recurring entries stay put. A required single-shot entry still
    /// pending means the peer never sent a mandatory message.
    fn take_flight_leftover(&mut self) -> Result<Option<MessageType>, Error> {
        let position = match self.entries.iter().position(|e| !e.recurring) {
            Some(p) => p,
            None => return Ok(None),
        };

        if self.entries[position].required {
            return Err(Error::UnexpectedMessage(
                "flight ended with a required message outstanding",
            ));
        }

        Ok(Some(self.entries.remove(position).msg_type))
    }
}

/// Register a consumer for a message the peer is allowed to send next.
///
/// Order matters: expectations must be pushed in the order the messages
/// appear on the wire within the flight.
pub fn expect<C: Dispatch + 'static>(
    ctx: &mut C,
    msg_type: MessageType,
    presence: Presence,
) -> Result<(), Error> {
    let handler = handler_for::<C>(msg_type).ok_or(Error::Internal("expected an unhandled type"))?;
    ctx.expected_mut().push(msg_type, presence, handler.recurring);
    Ok(())
}

/// Route one inbound message to its consumer.
pub fn dispatch<C: Dispatch + 'static>(ctx: &mut C, incoming: &Incoming<'_>) -> Result<(), Error> {
    let handler = handler_for::<C>(incoming.msg_type)
        .ok_or(Error::UnexpectedMessage("message type has no consumer"))?;

    let skipped = ctx.expected_mut().accept(incoming.msg_type)?;
    for msg_type in skipped {
        let skipped_handler =
            handler_for::<C>(msg_type).ok_or(Error::Internal("expected an unhandled type"))?;
        (skipped_handler.absent)(ctx)?;
    }

    (handler.consume)(ctx, incoming)
}

/// Fire absence handlers for everything still pending when a flight ends.
///
/// Each optional leftover is taken before its handler runs, so deferred
/// validation happens exactly once even if a handler re-enters.
pub fn flight_done<C: Dispatch + 'static>(ctx: &mut C) -> Result<(), Error> {
    loop {
        let msg_type = match ctx.expected_mut().take_flight_leftover()? {
            Some(t) => t,
            None => return Ok(()),
        };

        let handler =
            handler_for::<C>(msg_type).ok_or(Error::Internal("expected an unhandled type"))?;
        (handler.absent)(ctx)?;
    }
}

/// Run the producer of a message type, appending the serialized message.
pub fn produce<C: Dispatch + 'static>(
    ctx: &mut C,
    msg_type: MessageType,
    out: &mut Buf,
) -> Result<(), Error> {
    let handler =
        handler_for::<C>(msg_type).ok_or(Error::Internal("message type has no producer"))?;
    (handler.produce)(ctx, out)
}
