//! Running transcript hash over the handshake messages.
//!
//! The hash algorithm is not known until the cipher suite is negotiated, so
//! messages exchanged before that point are buffered as raw bytes and
//! replayed into the digest once [`TranscriptHash::select_algorithm`] runs.
//!
//! Versions up to 1.1 do not hash with the suite hash at all: their
//! transcript is MD5 and SHA-1 over the same bytes, concatenated.

use crate::buffer::Buf;
use crate::crypto::provider::{CryptoProvider, HashContext, HashProvider};
use crate::message::MessageType;
use crate::types::{HashAlgorithm, ProtocolVersion};

/// Incremental transcript hash with pre-negotiation buffering.
#[derive(Debug)]
pub struct TranscriptHash {
    hash_provider: &'static dyn HashProvider,
    state: State,
}

#[derive(Debug)]
enum State {
    /// Suite not negotiated yet, keep the raw bytes.
    Buffering(Vec<u8>),
    /// Single digest with the suite hash (TLS 1.2 and newer).
    Single {
        algorithm: HashAlgorithm,
        ctx: Box<dyn HashContext>,
    },
    /// MD5 + SHA-1 pair (TLS 1.1 and older).
    Split {
        md5: Box<dyn HashContext>,
        sha1: Box<dyn HashContext>,
    },
}

impl TranscriptHash {
    pub fn new(provider: &CryptoProvider) -> Self {
        TranscriptHash {
            hash_provider: provider.hash_provider,
            state: State::Buffering(Vec::new()),
        }
    }

    /// Add serialized handshake message bytes to the transcript.
    pub fn update(&mut self, data: &[u8]) {
        match &mut self.state {
            State::Buffering(backlog) => backlog.extend_from_slice(data),
            State::Single { ctx, .. } => ctx.update(data),
            State::Split { md5, sha1 } => {
                md5.update(data);
                sha1.update(data);
            }
        }
    }

    /// Switch from buffering to hashing once the suite hash is known,
    /// replaying everything buffered so far.
    ///
    /// The digest construction follows the version: a single suite-hash
    /// digest from 1.2 on, the MD5/SHA-1 pair below.
    pub fn select_algorithm(&mut self, version: ProtocolVersion, suite_hash: HashAlgorithm) {
        let backlog = match &mut self.state {
            State::Buffering(backlog) => std::mem::take(backlog),
            // Already selected. Negotiation never changes the suite after
            // the fact, so this is a caller bug.
            _ => panic!("Transcript hash algorithm selected twice"),
        };

        self.state = if version.ordinal() >= 12 {
            State::Single {
                algorithm: suite_hash,
                ctx: self.hash_provider.create_hash(suite_hash),
            }
        } else {
            State::Split {
                md5: self.hash_provider.create_hash(HashAlgorithm::MD5),
                sha1: self.hash_provider.create_hash(HashAlgorithm::SHA1),
            }
        };
        self.update(&backlog);
    }

    /// Whether [`Self::select_algorithm`] has run.
    pub fn is_selected(&self) -> bool {
        !matches!(self.state, State::Buffering(_))
    }

    /// The current transcript hash.
    ///
    /// For the split construction this is MD5 || SHA-1 (36 bytes).
    ///
    /// # Panics
    ///
    /// Panics when called before [`Self::select_algorithm`].
    pub fn current_hash(&self, out: &mut Buf) {
        match &self.state {
            State::Buffering(_) => panic!("Transcript hash queried before suite selection"),
            State::Single { ctx, .. } => ctx.clone_and_finalize(out),
            State::Split { md5, sha1 } => {
                md5.clone_and_finalize(out);
                let mut sha1_out = Buf::new();
                sha1.clone_and_finalize(&mut sha1_out);
                out.extend_from_slice(&sha1_out);
            }
        }
    }

    /// Replace the transcript with the retry form (RFC 8446 Section 4.4.1).
    ///
    /// When the server answers the first ClientHello with a retry request,
    /// the transcript restarts as a synthetic message_hash handshake message
    /// containing the hash of that first ClientHello:
    ///
    /// ```text
    /// Transcript-Hash(CH1, HRR, ...) =
    ///     Hash(message_hash || 00 00 Hash.length || Hash(CH1) || HRR || ...)
    /// ```
    ///
    /// The retry request itself is added by the caller afterwards, like any
    /// other message.
    pub fn reseed_for_retry(&mut self) {
        let (algorithm, ctx) = match &mut self.state {
            State::Single { algorithm, ctx } => (*algorithm, ctx),
            // Retry requests only exist in the 1.3 flight plan, where the
            // suite hash is known from the retry itself.
            _ => panic!("Transcript retry reseed requires a selected suite hash"),
        };

        let mut first_hello_hash = Buf::new();
        ctx.clone_and_finalize(&mut first_hello_hash);

        let mut fresh = self.hash_provider.create_hash(algorithm);
        let header = [
            MessageType::MessageHash.as_u8(),
            0,
            0,
            algorithm.output_len() as u8,
        ];
        fresh.update(&header);
        fresh.update(&first_hello_hash);
        *ctx = fresh;
    }
}
