//! Storage layer for the ledger. Provides:
//! - Account persistence ([`AccountStore`])
//! - The append-only transaction log ([`TransactionStore`])
//! - Grouped writes that commit together or not at all ([`AtomicUnit`])
//!
//! The core only sees these through [`LedgerStore`]; [`InMemoryStore`] is the
//! implementation shipped with the service.

mod accounts;
mod memory;
mod transactions;

pub use accounts::{AccountStore, AccountsTable};
pub use memory::InMemoryStore;
pub use transactions::{TransactionStore, TransactionsTable};

use crate::dto::{Account, Transaction};
use crate::error::StoreError;

/// Writes that must become visible together.
#[derive(Debug, Default)]
pub struct WriteBatch {
    pub accounts: Vec<Account>,
    pub transactions: Vec<Transaction>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, account: Account) -> Self {
        self.accounts.push(account);
        self
    }

    pub fn with_transaction(mut self, transaction: Transaction) -> Self {
        self.transactions.push(transaction);
        self
    }
}

pub trait AtomicUnit: Send + Sync {
    /// Applies every write in the batch, or none of them.
    fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;
}

pub trait LedgerStore: AccountStore + TransactionStore + AtomicUnit {}

impl<T> LedgerStore for T where T: AccountStore + TransactionStore + AtomicUnit {}
