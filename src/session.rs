//! The long-lived result of a completed handshake.
//!
//! A [`Session`] holds only what outlives the negotiation: the agreed
//! version and cipher suite, the peer's certificate chain and the derived
//! secrets. All transient handshake state (transcript, expectations,
//! possessions) dies with the context that produced it.

use std::fmt;

use zeroize::Zeroize;

use crate::buffer::Buf;
use crate::crypto::provider::PrfProvider;
use crate::crypto::schedule::KeySchedule;
use crate::error::Error;
use crate::types::{CipherSuite, ProtocolVersion, Role};

/// Client and server traffic secrets for one protection epoch.
///
/// The record layer expands these into keys and IVs; the handshake engine
/// never touches record protection itself.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretPair {
    pub client: Buf,
    pub server: Buf,
}

impl SecretPair {
    pub(crate) fn new(client: Buf, server: Buf) -> Self {
        SecretPair { client, server }
    }

    /// The secret protecting data sent by `sender`.
    pub fn for_sender(&self, sender: Role) -> &[u8] {
        match sender {
            Role::Client => &self.client,
            Role::Server => &self.server,
        }
    }
}

impl fmt::Debug for SecretPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretPair")
            .field("client", &self.client.len())
            .field("server", &self.server.len())
            .finish()
    }
}

impl Drop for SecretPair {
    fn drop(&mut self) {
        self.client.as_mut().zeroize();
        self.server.as_mut().zeroize();
    }
}

/// Expanded key block for the pre-1.3 record layer (RFC 5246 Section 6.3).
///
/// The IV halves are the fixed nonce parts for AEAD suites.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyBlock {
    pub client_write_key: Buf,
    pub server_write_key: Buf,
    pub client_write_iv: Buf,
    pub server_write_iv: Buf,
}

impl fmt::Debug for KeyBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyBlock")
            .field("key_len", &self.client_write_key.len())
            .field("iv_len", &self.client_write_iv.len())
            .finish()
    }
}

impl Drop for KeyBlock {
    fn drop(&mut self) {
        self.client_write_key.as_mut().zeroize();
        self.server_write_key.as_mut().zeroize();
        self.client_write_iv.as_mut().zeroize();
        self.server_write_iv.as_mut().zeroize();
    }
}

/// A session ticket received from a 1.3 server (RFC 8446 Section 4.6.1).
///
/// The engine surfaces tickets without redeeming them; an embedder doing
/// resumption combines `nonce` with [`Session::resumption_secret`] to
/// compute the ticket's PSK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTicket {
    /// Ticket validity in seconds.
    pub lifetime: u32,
    /// Obfuscation offset for the ticket age.
    pub age_add: u32,
    /// Per-ticket nonce, the PSK derivation input.
    pub nonce: Vec<u8>,
    /// The opaque ticket value to present on resumption.
    pub ticket: Vec<u8>,
}

/// Everything negotiated by a completed handshake.
pub struct Session {
    version: ProtocolVersion,
    suite: CipherSuite,
    peer_certificates: Vec<Buf>,
    secrets: Secrets,
}

enum Secrets {
    Schedule13 {
        /// Master-stage schedule kept for exports and key-update ratchets.
        schedule: KeySchedule,
        application: SecretPair,
        exporter: Buf,
        resumption: Buf,
    },
    Legacy {
        prf: &'static dyn PrfProvider,
        master: Buf,
        client_random: [u8; 32],
        server_random: [u8; 32],
    },
}

impl Session {
    pub(crate) fn tls13(
        version: ProtocolVersion,
        suite: CipherSuite,
        peer_certificates: Vec<Buf>,
        schedule: KeySchedule,
        application: SecretPair,
        exporter: Buf,
        resumption: Buf,
    ) -> Self {
        Session {
            version,
            suite,
            peer_certificates,
            secrets: Secrets::Schedule13 {
                schedule,
                application,
                exporter,
                resumption,
            },
        }
    }

    pub(crate) fn legacy(
        version: ProtocolVersion,
        suite: CipherSuite,
        peer_certificates: Vec<Buf>,
        prf: &'static dyn PrfProvider,
        master: Buf,
        client_random: [u8; 32],
        server_random: [u8; 32],
    ) -> Self {
        Session {
            version,
            suite,
            peer_certificates,
            secrets: Secrets::Legacy {
                prf,
                master,
                client_random,
                server_random,
            },
        }
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn cipher_suite(&self) -> CipherSuite {
        self.suite
    }

    /// The peer's certificate chain, leaf first, DER encoded.
    ///
    /// Empty when the peer did not authenticate.
    pub fn peer_certificates(&self) -> &[Buf] {
        &self.peer_certificates
    }

    /// The current application traffic secrets (1.3-family only).
    pub fn application_secrets(&self) -> Option<&SecretPair> {
        match &self.secrets {
            Secrets::Schedule13 { application, .. } => Some(application),
            Secrets::Legacy { .. } => None,
        }
    }

    /// The resumption master secret (1.3-family only).
    pub fn resumption_secret(&self) -> Option<&[u8]> {
        match &self.secrets {
            Secrets::Schedule13 { resumption, .. } => Some(resumption),
            Secrets::Legacy { .. } => None,
        }
    }

    /// Export keying material bound to this session (RFC 8446 Section 7.5,
    /// RFC 5705 for legacy versions).
    ///
    /// `None` and `Some(&[])` for `context` are the same thing from 1.3 on;
    /// on legacy versions they produce different output, as the RFC demands.
    pub fn export_keying_material(
        &self,
        label: &str,
        context: Option<&[u8]>,
        length: usize,
    ) -> Result<Buf, Error> {
        match &self.secrets {
            Secrets::Schedule13 {
                schedule, exporter, ..
            } => schedule
                .export_keying_material(exporter, label.as_bytes(), context.unwrap_or(&[]), length)
                .map_err(Error::Crypto),
            Secrets::Legacy {
                prf,
                master,
                client_random,
                server_random,
            } => {
                let mut seed = Buf::new();
                seed.extend_from_slice(client_random);
                seed.extend_from_slice(server_random);
                if let Some(context) = context {
                    seed.extend_from_slice(&(context.len() as u16).to_be_bytes());
                    seed.extend_from_slice(context);
                }

                let mut out = Buf::new();
                if self.version.ordinal() >= 12 {
                    prf.prf_tls12(
                        self.suite.hash_algorithm(),
                        master,
                        label,
                        &seed,
                        &mut out,
                        length,
                    )
                } else {
                    prf.prf_legacy(master, label, &seed, &mut out, length)
                }
                .map_err(Error::Crypto)?;
                Ok(out)
            }
        }
    }

    /// Replace the application traffic secret for one direction with its
    /// "traffic upd" successor, returning the new secret.
    ///
    /// `sender` names whose sending keys ratchet. Only meaningful on the
    /// 1.3-family schedule.
    pub(crate) fn ratchet_application_secret(&mut self, sender: Role) -> Result<Buf, Error> {
        let Secrets::Schedule13 {
            schedule,
            application,
            ..
        } = &mut self.secrets
        else {
            return Err(Error::Internal("key update outside the 1.3 schedule"));
        };

        let current = match sender {
            Role::Client => &mut application.client,
            Role::Server => &mut application.server,
        };
        let next = schedule
            .derive_next_traffic_secret(current)
            .map_err(Error::Crypto)?;

        current.as_mut().zeroize();
        *current = next.clone();
        Ok(next)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("version", &self.version)
            .field("suite", &self.suite)
            .field("peer_certificates", &self.peer_certificates.len())
            .finish()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        match &mut self.secrets {
            Secrets::Schedule13 {
                exporter,
                resumption,
                ..
            } => {
                exporter.as_mut().zeroize();
                resumption.as_mut().zeroize();
            }
            Secrets::Legacy { master, .. } => master.as_mut().zeroize(),
        }
    }
}
