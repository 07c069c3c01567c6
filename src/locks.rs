//! Per-account exclusive locks.
//!
//! Every operation that reads and then rewrites an account balance holds the
//! account's lock across the read and the commit. Multi-account operations
//! acquire locks in ascending id order, so two transfers running in opposite
//! directions between the same pair cannot deadlock.
//!
//! A slot lives only while some task holds or waits on it. The last guard to
//! release a slot removes it from the table, so lookups of unknown or deleted
//! accounts leave nothing behind.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::time::{timeout_at, Instant};

use crate::dto::AccountId;
use crate::error::StoreError;

type Slots = HashMap<AccountId, Arc<AsyncMutex<()>>>;

#[derive(Debug, Default)]
pub struct AccountLocks {
    slots: Mutex<Slots>,
}

/// Held locks; released, and their slots pruned, on drop.
#[derive(Debug)]
pub struct AccountGuards<'a> {
    locks: &'a AccountLocks,
    ids: Vec<AccountId>,
    guards: Vec<OwnedMutexGuard<()>>,
}

impl Drop for AccountGuards<'_> {
    fn drop(&mut self) {
        // Guards hold a reference to their slot, release them before pruning
        self.guards.clear();
        self.locks.prune(&self.ids);
    }
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of accounts that currently have a lock slot.
    pub fn tracked_accounts(&self) -> usize {
        self.table().len()
    }

    // Critical sections on the table cannot panic, so a poisoned table is
    // still consistent.
    fn table(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn slot(&self, id: AccountId) -> Arc<AsyncMutex<()>> {
        self.table().entry(id).or_default().clone()
    }

    /// Drops the slots nobody but the table refers to. Every clone of a slot
    /// is taken under the table lock, so a count of one cannot race with a
    /// new waiter.
    fn prune(&self, ids: &[AccountId]) {
        let mut slots = self.table();
        for id in ids {
            if slots.get(id).is_some_and(|slot| Arc::strong_count(slot) == 1) {
                slots.remove(id);
            }
        }
    }

    /// Locks every account in `ids` (duplicates are locked once), waiting at
    /// most `timeout` in total.
    pub async fn acquire(
        &self,
        ids: &[AccountId],
        timeout: Duration,
    ) -> Result<AccountGuards<'_>, StoreError> {
        let deadline = Instant::now() + timeout;

        let mut ordered = ids.to_vec();
        ordered.sort_unstable();
        ordered.dedup();

        let mut held = AccountGuards {
            locks: self,
            ids: Vec::with_capacity(ordered.len()),
            guards: Vec::with_capacity(ordered.len()),
        };
        for id in ordered {
            match timeout_at(deadline, self.slot(id).lock_owned()).await {
                Ok(guard) => {
                    held.ids.push(id);
                    held.guards.push(guard);
                }
                Err(_) => {
                    // The waiting future and its slot reference are gone,
                    // the locks already taken are released with `held`
                    self.prune(&[id]);
                    return Err(StoreError::Timeout);
                }
            }
        }
        Ok(held)
    }
}
