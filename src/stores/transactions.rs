//! Append-only transaction log.
//!
//! Records are written once by a committed transfer and never updated or
//! removed. Participant account ids are kept as plain values, so a record
//! outlives the accounts it mentions.

use std::collections::BTreeMap;

use crate::dto::{AccountId, Transaction, TransactionId};
use crate::error::StoreError;

pub trait TransactionStore: Send + Sync {
    fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError>;

    /// Appends a record. Fails with [`StoreError::DuplicateTransaction`] if the
    /// id is already taken.
    fn save_transaction(&self, transaction: Transaction) -> Result<Transaction, StoreError>;

    /// All records in ascending id order.
    fn list_transactions(&self) -> Result<Vec<Transaction>, StoreError>;

    fn next_transaction_id(&self) -> Result<TransactionId, StoreError>;

    /// Records where the account is either source or target.
    fn transactions_for(&self, account_id: AccountId) -> Result<Vec<Transaction>, StoreError> {
        Ok(self
            .list_transactions()?
            .into_iter()
            .filter(|transaction| transaction.involves(account_id))
            .collect())
    }
}

#[derive(Debug)]
pub struct TransactionsTable {
    transactions: BTreeMap<TransactionId, Transaction>,
    next_id: TransactionId,
}

impl Default for TransactionsTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionsTable {
    pub fn new() -> Self {
        Self {
            transactions: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn contains(&self, id: TransactionId) -> bool {
        self.transactions.contains_key(&id)
    }

    pub fn get(&self, id: TransactionId) -> Option<&Transaction> {
        self.transactions.get(&id)
    }

    /// Appends a new record.
    /// Returns an error if a record with the same id already exists.
    pub fn append(&mut self, transaction: Transaction) -> Result<(), StoreError> {
        if self.contains(transaction.id) {
            return Err(StoreError::DuplicateTransaction(transaction.id));
        }
        self.next_id = self.next_id.max(transaction.id.saturating_add(1));
        self.transactions.insert(transaction.id, transaction);
        Ok(())
    }

    pub fn reserve_id(&mut self) -> TransactionId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.values()
    }
}
