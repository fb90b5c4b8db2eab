//! Shared ephemeral key cache.
//!
//! Generating an ephemeral keypair is the expensive part of a server
//! key-exchange flight, so a server may reuse one keypair across
//! connections. Reuse is bounded twice over: a cached keypair serves at
//! most [`MAX_USE`] handshakes and is discarded after [`USE_INTERVAL`]
//! regardless of use count.
//!
//! The cache is an explicit value, shared by `Arc` with whichever
//! connections opt in. Connections that want a fresh keypair per handshake
//! simply do not use it.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::crypto::provider::{ActiveKeyExchange, SupportedKxGroup};
use crate::types::NamedGroup;

/// Maximum number of handshakes served by one cached keypair.
const MAX_USE: u32 = 200;

/// Maximum age of a cached keypair.
const USE_INTERVAL: Duration = Duration::from_secs(3600);

/// Cross-connection cache of ephemeral key-exchange keypairs.
///
/// One slot per supported group, each behind its own lock so contention on
/// one group does not serialize the others.
#[derive(Debug)]
pub struct EphemeralKeyCache {
    slots: Vec<Slot>,
}

#[derive(Debug)]
struct Slot {
    group: NamedGroup,
    entry: Mutex<Option<Entry>>,
}

#[derive(Debug)]
struct Entry {
    key_pair: Arc<dyn ActiveKeyExchange>,
    uses: u32,
    expires: Instant,
}

impl Entry {
    fn new(key_pair: Arc<dyn ActiveKeyExchange>) -> Self {
        Entry {
            key_pair,
            // The generating handshake is the first use.
            uses: 1,
            expires: Instant::now() + USE_INTERVAL,
        }
    }

    /// Claim one use if the entry is still within both bounds.
    fn take_use(&mut self) -> bool {
        if self.uses >= MAX_USE || Instant::now() >= self.expires {
            return false;
        }
        self.uses += 1;
        true
    }
}

impl EphemeralKeyCache {
    pub fn new() -> Self {
        let slots = NamedGroup::supported()
            .iter()
            .map(|&group| Slot {
                group,
                entry: Mutex::new(None),
            })
            .collect();
        EphemeralKeyCache { slots }
    }

    /// Get the cached keypair for a group, generating one on miss.
    ///
    /// Check, generation and install all happen under the slot lock, so of
    /// several connections racing an empty slot exactly one generates and
    /// the rest find its key when they acquire the lock.
    pub fn get_or_start(
        &self,
        kx: &'static dyn SupportedKxGroup,
    ) -> Result<Arc<dyn ActiveKeyExchange>, String> {
        let Some(slot) = self.slots.iter().find(|s| s.group == kx.name()) else {
            // Unslotted groups are not cached.
            return kx.start_exchange();
        };

        let mut entry = slot
            .entry
            .lock()
            .map_err(|_| "Ephemeral key cache is poisoned".to_string())?;

        if let Some(cached) = entry.as_mut() {
            if cached.take_use() {
                return Ok(cached.key_pair.clone());
            }
        }

        let fresh = kx.start_exchange()?;
        *entry = Some(Entry::new(fresh.clone()));
        Ok(fresh)
    }
}

impl Default for EphemeralKeyCache {
    fn default() -> Self {
        EphemeralKeyCache::new()
    }
}
