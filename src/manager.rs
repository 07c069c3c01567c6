//! Account lifecycle: create, read, update, delete, plus per-account views of
//! the transaction log.
//!
//! Update and delete take the account's lock so they serialise with transfers
//! touching the same account.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use crate::dto::{Account, AccountId, AccountUpdate, NewAccount, Transaction, TransferDirection};
use crate::error::Error;
use crate::locks::AccountLocks;
use crate::stores::LedgerStore;

pub struct AccountManager {
    store: Arc<dyn LedgerStore>,
    locks: Arc<AccountLocks>,
    lock_timeout: Duration,
}

impl AccountManager {
    pub fn new(store: Arc<dyn LedgerStore>, locks: Arc<AccountLocks>, lock_timeout: Duration) -> Self {
        Self {
            store,
            locks,
            lock_timeout,
        }
    }

    /// Opens an account. The balance defaults to zero.
    pub fn create(&self, new: NewAccount) -> Result<Account, Error> {
        debug!(?new, "creating account");
        let Some(currency) = new.currency else {
            warn!("account rejected: currency is missing");
            return Err(Error::MissingParameter);
        };
        let balance = new.balance.unwrap_or(Decimal::ZERO);
        if balance < Decimal::ZERO {
            warn!(%balance, "account rejected: negative balance");
            return Err(Error::InvalidAmount);
        }

        let account = self.store.save_account(Account {
            id: self.store.next_account_id()?,
            balance,
            currency,
            created_at: Utc::now(),
        })?;
        info!(id = account.id, balance = %account.balance, currency = ?account.currency, "account created");
        Ok(account)
    }

    pub fn get_by_id(&self, id: AccountId) -> Result<Account, Error> {
        debug!(id, "retrieving account");
        self.store.get_account(id)?.ok_or_else(|| {
            warn!(id, "account not found");
            Error::AccountNotFound(id)
        })
    }

    /// Replaces currency and balance of an existing account. Id and creation
    /// time are kept.
    pub async fn update(&self, update: AccountUpdate) -> Result<Account, Error> {
        debug!(?update, "updating account");
        let AccountUpdate {
            id: Some(id),
            currency: Some(currency),
            balance: Some(balance),
        } = update
        else {
            warn!("account update rejected: invalid parameters");
            return Err(Error::InvalidParameters);
        };

        let _guard = self.locks.acquire(&[id], self.lock_timeout).await?;
        let mut account = self.get_by_id(id)?;
        if balance < Decimal::ZERO {
            warn!(id, %balance, "account update rejected: negative balance");
            return Err(Error::InvalidAmount);
        }

        account.currency = currency;
        account.balance = balance;
        let account = self.store.save_account(account)?;
        info!(id, balance = %account.balance, currency = ?account.currency, "account updated");
        Ok(account)
    }

    /// Removes the account. Its transactions stay in the log.
    ///
    /// # Errors
    /// [`Error::AccountNotFound`] when there is no such account, and
    /// [`Error::Unavailable`] when the store fails, so callers can tell the two
    /// apart.
    pub async fn delete(&self, id: AccountId) -> Result<(), Error> {
        debug!(id, "deleting account");
        let _guard = self.locks.acquire(&[id], self.lock_timeout).await?;
        self.get_by_id(id)?;

        match self.store.delete_account(id) {
            Ok(true) => {
                info!(id, "account deleted");
                Ok(())
            }
            Ok(false) => Err(Error::AccountNotFound(id)),
            Err(err) => {
                error!(id, %err, "error occurred while deleting account");
                Err(err.into())
            }
        }
    }

    pub fn list_all(&self) -> Result<Vec<Account>, Error> {
        let accounts = self.store.list_accounts()?;
        info!(count = accounts.len(), "retrieved all accounts");
        Ok(accounts)
    }

    /// Transactions where the account is source or target. The account itself
    /// does not need to exist any more.
    pub fn all_transactions_for(&self, account_id: AccountId) -> Result<Vec<Transaction>, Error> {
        self.transactions_for(account_id, TransferDirection::All)
    }

    pub fn incoming_transactions_for(&self, account_id: AccountId) -> Result<Vec<Transaction>, Error> {
        self.transactions_for(account_id, TransferDirection::Incoming)
    }

    pub fn outgoing_transactions_for(&self, account_id: AccountId) -> Result<Vec<Transaction>, Error> {
        self.transactions_for(account_id, TransferDirection::Outgoing)
    }

    pub fn transactions_for(
        &self,
        account_id: AccountId,
        direction: TransferDirection,
    ) -> Result<Vec<Transaction>, Error> {
        debug!(account_id, ?direction, "retrieving transactions for account");
        let transactions = self.store.transactions_for(account_id)?;
        Ok(transactions
            .into_iter()
            .filter(|transaction| match direction {
                TransferDirection::All => true,
                TransferDirection::Incoming => transaction.target_account_id == account_id,
                TransferDirection::Outgoing => transaction.source_account_id == account_id,
            })
            .collect())
    }
}
