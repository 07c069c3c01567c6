use std::collections::HashSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::dto::{Account, AccountId, Transaction, TransactionId};
use crate::error::StoreError;

use super::{AccountStore, AccountsTable, AtomicUnit, TransactionStore, TransactionsTable, WriteBatch};

#[derive(Debug, Default)]
struct Tables {
    accounts: AccountsTable,
    transactions: TransactionsTable,
}

/// Both tables behind a single lock, so a committed [`WriteBatch`] becomes
/// visible to readers all at once.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables.write().map_err(|_| StoreError::Poisoned)
    }
}

impl AccountStore for InMemoryStore {
    fn get_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        Ok(self.read()?.accounts.get(id).cloned())
    }

    fn save_account(&self, account: Account) -> Result<Account, StoreError> {
        self.write()?.accounts.upsert(account.clone());
        Ok(account)
    }

    fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        Ok(self.read()?.accounts.iter().cloned().collect())
    }

    fn delete_account(&self, id: AccountId) -> Result<bool, StoreError> {
        Ok(self.write()?.accounts.remove(id))
    }

    fn next_account_id(&self) -> Result<AccountId, StoreError> {
        Ok(self.write()?.accounts.reserve_id())
    }
}

impl TransactionStore for InMemoryStore {
    fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError> {
        Ok(self.read()?.transactions.get(id).cloned())
    }

    fn save_transaction(&self, transaction: Transaction) -> Result<Transaction, StoreError> {
        self.write()?.transactions.append(transaction.clone())?;
        Ok(transaction)
    }

    fn list_transactions(&self) -> Result<Vec<Transaction>, StoreError> {
        Ok(self.read()?.transactions.iter().cloned().collect())
    }

    fn next_transaction_id(&self) -> Result<TransactionId, StoreError> {
        Ok(self.write()?.transactions.reserve_id())
    }
}

impl AtomicUnit for InMemoryStore {
    fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut tables = self.write()?;

        // Reject the whole batch before touching anything
        let mut seen = HashSet::new();
        for transaction in &batch.transactions {
            if tables.transactions.contains(transaction.id) || !seen.insert(transaction.id) {
                return Err(StoreError::DuplicateTransaction(transaction.id));
            }
        }

        for account in batch.accounts {
            tables.accounts.upsert(account);
        }
        for transaction in batch.transactions {
            tables.transactions.append(transaction)?;
        }
        Ok(())
    }
}
