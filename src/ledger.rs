use std::sync::Arc;

use crate::config::Config;
use crate::engine::TransferProcessor;
use crate::locks::AccountLocks;
use crate::manager::AccountManager;
use crate::stores::{InMemoryStore, LedgerStore};

/// One store and one lock table shared by the transfer processor and the
/// account manager. Both must see the same locks, otherwise updates could race
/// with transfers.
#[derive(Clone)]
pub struct Ledger {
    transfers: Arc<TransferProcessor>,
    accounts: Arc<AccountManager>,
}

impl Ledger {
    pub fn new(store: Arc<dyn LedgerStore>, config: &Config) -> Self {
        let locks = Arc::new(AccountLocks::new());
        Self {
            transfers: Arc::new(TransferProcessor::new(
                store.clone(),
                locks.clone(),
                config.lock_timeout,
            )),
            accounts: Arc::new(AccountManager::new(store, locks, config.lock_timeout)),
        }
    }

    pub fn in_memory(config: &Config) -> Self {
        Self::new(Arc::new(InMemoryStore::new()), config)
    }

    pub fn transfers(&self) -> &TransferProcessor {
        &self.transfers
    }

    pub fn accounts(&self) -> &AccountManager {
        &self.accounts
    }
}
