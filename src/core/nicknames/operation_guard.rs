// One bulk operation per guild.
//
// A slot older than the TTL counts as abandoned and can be taken over, so a
// crashed run never locks a guild out for good.

use super::nickname_models::NicknameError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Slot {
    token: u64,
    started: Instant,
    cancel: Arc<AtomicBool>,
}

pub struct OperationGuard {
    slots: Arc<DashMap<u64, Slot>>,
    next_token: AtomicU64,
    ttl: Duration,
}

/// Held for the lifetime of a run. Dropping it frees the guild's slot.
pub struct OperationTicket {
    slots: Arc<DashMap<u64, Slot>>,
    guild_id: u64,
    token: u64,
    cancel: Arc<AtomicBool>,
}

impl OperationTicket {
    pub fn guild_id(&self) -> u64 {
        self.guild_id
    }

    pub fn cancel_flag(&self) -> &AtomicBool {
        &self.cancel
    }
}

impl Drop for OperationTicket {
    fn drop(&mut self) {
        // A run that outlived its TTL may have been replaced; leave the new one alone
        self.slots
            .remove_if(&self.guild_id, |_, slot| slot.token == self.token);
    }
}

impl OperationGuard {
    pub fn new(ttl: Duration) -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
            next_token: AtomicU64::new(1),
            ttl,
        }
    }

    pub fn try_begin(&self, guild_id: u64) -> Result<OperationTicket, NicknameError> {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let cancel = Arc::new(AtomicBool::new(false));
        let slot = Slot {
            token,
            started: Instant::now(),
            cancel: cancel.clone(),
        };

        match self.slots.entry(guild_id) {
            Entry::Occupied(mut held) => {
                let age = held.get().started.elapsed();
                if age < self.ttl {
                    return Err(NicknameError::OperationInProgress(age.as_secs()));
                }
                tracing::warn!(guild_id, age_secs = age.as_secs(), "Taking over stale nickname operation");
                held.get().cancel.store(true, Ordering::SeqCst);
                held.insert(slot);
            }
            Entry::Vacant(free) => {
                free.insert(slot);
            }
        }

        Ok(OperationTicket {
            slots: self.slots.clone(),
            guild_id,
            token,
            cancel,
        })
    }

    /// Ask the guild's running operation to stop. Returns false if none is running.
    pub fn cancel(&self, guild_id: u64) -> bool {
        match self.slots.get(&guild_id) {
            Some(slot) if slot.started.elapsed() < self.ttl => {
                slot.cancel.store(true, Ordering::SeqCst);
                true
            }
            _ => false,
        }
    }
}
