use std::collections::BTreeMap;

use crate::dto::{Account, AccountId};
use crate::error::StoreError;

/// Key-value persistence for accounts.
pub trait AccountStore: Send + Sync {
    fn get_account(&self, id: AccountId) -> Result<Option<Account>, StoreError>;

    /// Inserts the account, or replaces the stored account with the same id.
    fn save_account(&self, account: Account) -> Result<Account, StoreError>;

    /// All accounts in ascending id order.
    fn list_accounts(&self) -> Result<Vec<Account>, StoreError>;

    /// Returns `false` if there was no account with this id.
    fn delete_account(&self, id: AccountId) -> Result<bool, StoreError>;

    /// Reserves a fresh id. Ids are never handed out twice.
    fn next_account_id(&self) -> Result<AccountId, StoreError>;
}

#[derive(Debug)]
pub struct AccountsTable {
    accounts: BTreeMap<AccountId, Account>,
    next_id: AccountId,
}

impl Default for AccountsTable {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountsTable {
    pub fn new() -> Self {
        Self {
            accounts: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn get(&self, id: AccountId) -> Option<&Account> {
        self.accounts.get(&id)
    }

    /// Stores the account. Accounts saved with an explicit id (e.g. seeded
    /// from a file) push the sequence past that id.
    pub fn upsert(&mut self, account: Account) {
        self.next_id = self.next_id.max(account.id.saturating_add(1));
        self.accounts.insert(account.id, account);
    }

    pub fn remove(&mut self, id: AccountId) -> bool {
        self.accounts.remove(&id).is_some()
    }

    pub fn reserve_id(&mut self) -> AccountId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn iter(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }
}
