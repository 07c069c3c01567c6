use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use crate::dto::{Account, AccountId, Currency, Transaction, TransactionId, TransferRequest};
use crate::error::Error;
use crate::locks::AccountLocks;
use crate::stores::{LedgerStore, WriteBatch};

/// A transfer request with every field present.
#[derive(Debug, Clone, Copy)]
struct Transfer {
    source: AccountId,
    target: AccountId,
    amount: Decimal,
    currency: Currency,
}

impl TryFrom<TransferRequest> for Transfer {
    type Error = Error;

    fn try_from(request: TransferRequest) -> Result<Self, Error> {
        match request {
            TransferRequest {
                source_account_id: Some(source),
                target_account_id: Some(target),
                amount: Some(amount),
                currency: Some(currency),
            } => Ok(Transfer {
                source,
                target,
                amount,
                currency,
            }),
            _ => Err(Error::MissingParameter),
        }
    }
}

/// Validates and executes transfers, and serves reads of the transaction log.
pub struct TransferProcessor {
    store: Arc<dyn LedgerStore>,
    locks: Arc<AccountLocks>,
    lock_timeout: Duration,
}

impl TransferProcessor {
    pub fn new(store: Arc<dyn LedgerStore>, locks: Arc<AccountLocks>, lock_timeout: Duration) -> Self {
        Self {
            store,
            locks,
            lock_timeout,
        }
    }

    /// Moves `amount` from the source account to the target account and records
    /// the transfer.
    ///
    /// Checks run in a fixed order and the first failing one decides the error:
    /// missing parameters, unknown source, unknown target, same account,
    /// non-positive amount, currency mismatch, insufficient balance. A credit
    /// that would overflow the target balance is rejected last.
    ///
    /// Both accounts stay locked from the balance read until the commit, and
    /// the two balance updates plus the new record are committed as one batch.
    /// Nothing is written unless every check passes.
    ///
    /// # Errors
    /// Any validation failure is returned as its own [`Error`] kind. Lock
    /// timeouts and store failures surface as [`Error::Unavailable`]; those
    /// never leave a partial write behind.
    pub async fn execute(&self, request: TransferRequest) -> Result<Transaction, Error> {
        debug!(?request, "executing transfer");
        let transfer = Transfer::try_from(request).inspect_err(|_| warn!("transfer rejected: missing parameter"))?;

        let _guards = self
            .locks
            .acquire(&[transfer.source, transfer.target], self.lock_timeout)
            .await
            .inspect_err(|err| error!(%err, "could not lock transfer accounts"))?;

        let mut source = self.load_account(transfer.source)?;
        let mut target = self.load_account(transfer.target)?;
        validate(&transfer, &source, &target).inspect_err(|err| {
            warn!(
                source = transfer.source,
                target = transfer.target,
                amount = %transfer.amount,
                %err,
                "transfer rejected"
            )
        })?;

        let credited = target.balance.checked_add(transfer.amount).ok_or_else(|| {
            warn!(target = transfer.target, amount = %transfer.amount, "transfer rejected: balance overflow");
            Error::BalanceOverflow
        })?;
        source.balance -= transfer.amount;
        target.balance = credited;

        let transaction = Transaction {
            id: self.store.next_transaction_id()?,
            source_account_id: transfer.source,
            target_account_id: transfer.target,
            amount: transfer.amount,
            currency: transfer.currency,
        };
        let batch = WriteBatch::new()
            .with_account(source)
            .with_account(target)
            .with_transaction(transaction.clone());
        // The updated accounts are local copies, so dropping them on failure is
        // the rollback.
        self.store
            .commit(batch)
            .inspect_err(|err| error!(%err, "transfer commit failed"))?;

        info!(
            id = transaction.id,
            source = transaction.source_account_id,
            target = transaction.target_account_id,
            amount = %transaction.amount,
            "transfer recorded"
        );
        Ok(transaction)
    }

    pub fn transaction(&self, id: TransactionId) -> Result<Transaction, Error> {
        debug!(id, "retrieving transaction");
        self.store
            .get_transaction(id)?
            .ok_or(Error::TransactionNotFound(id))
    }

    pub fn transactions(&self) -> Result<Vec<Transaction>, Error> {
        let transactions = self.store.list_transactions()?;
        info!(count = transactions.len(), "retrieved all transactions");
        Ok(transactions)
    }

    fn load_account(&self, id: AccountId) -> Result<Account, Error> {
        self.store.get_account(id)?.ok_or_else(|| {
            warn!(id, "transfer rejected: account not found");
            Error::AccountNotFound(id)
        })
    }
}

fn validate(transfer: &Transfer, source: &Account, target: &Account) -> Result<(), Error> {
    if transfer.source == transfer.target {
        return Err(Error::SameAccount);
    }
    if transfer.amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount);
    }
    if source.currency != transfer.currency || target.currency != transfer.currency {
        return Err(Error::InvalidCurrency);
    }
    if source.balance < transfer.amount {
        return Err(Error::InsufficientBalance);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::stores::{AccountStore, AtomicUnit, InMemoryStore, TransactionStore};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicBool, Ordering};

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn account(id: AccountId, balance: Decimal, currency: Currency) -> Account {
        Account {
            id,
            balance,
            currency,
            created_at: Utc::now(),
        }
    }

    fn request(source: AccountId, target: AccountId, amount: Decimal, currency: Currency) -> TransferRequest {
        TransferRequest {
            source_account_id: Some(source),
            target_account_id: Some(target),
            amount: Some(amount),
            currency: Some(currency),
        }
    }

    /// A(1, 250 EUR), B(2, 100 EUR), C(3, 0 USD)
    fn seeded_store() -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        store.save_account(account(1, dec!(250), Currency::Eur)).unwrap();
        store.save_account(account(2, dec!(100), Currency::Eur)).unwrap();
        store.save_account(account(3, dec!(0), Currency::Usd)).unwrap();
        store
    }

    fn processor(store: Arc<dyn LedgerStore>) -> TransferProcessor {
        TransferProcessor::new(store, Arc::new(AccountLocks::new()), TIMEOUT)
    }

    fn balance(store: &InMemoryStore, id: AccountId) -> Decimal {
        store.get_account(id).unwrap().unwrap().balance
    }

    #[tokio::test]
    async fn test_successful_transfer() {
        let store = seeded_store();
        let processor = processor(store.clone());

        let transaction = processor
            .execute(request(1, 2, dec!(100), Currency::Eur))
            .await
            .unwrap();

        assert_eq!(transaction.source_account_id, 1);
        assert_eq!(transaction.target_account_id, 2);
        assert_eq!(transaction.amount, dec!(100));
        assert_eq!(transaction.currency, Currency::Eur);
        assert_eq!(balance(&store, 1), dec!(150));
        assert_eq!(balance(&store, 2), dec!(200));
        assert_eq!(processor.transaction(transaction.id).unwrap(), transaction);
    }

    #[tokio::test]
    async fn test_transfer_conserves_total_balance() {
        let store = seeded_store();
        let processor = processor(store.clone());

        for amount in [dec!(0.0001), dec!(1.5), dec!(99), dec!(149.4999)] {
            let before = balance(&store, 1) + balance(&store, 2);
            processor.execute(request(1, 2, amount, Currency::Eur)).await.unwrap();
            assert_eq!(balance(&store, 1) + balance(&store, 2), before);
            assert!(balance(&store, 1) >= Decimal::ZERO);
        }
    }

    #[tokio::test]
    async fn test_transfer_of_entire_balance() {
        let store = seeded_store();
        let processor = processor(store.clone());

        processor.execute(request(1, 2, dec!(250), Currency::Eur)).await.unwrap();
        assert_eq!(balance(&store, 1), Decimal::ZERO);
        assert_eq!(balance(&store, 2), dec!(350));
    }

    #[tokio::test]
    async fn test_missing_parameters() {
        let processor = processor(seeded_store());
        let complete = request(1, 2, dec!(1), Currency::Eur);

        let incomplete = [
            TransferRequest { source_account_id: None, ..complete.clone() },
            TransferRequest { target_account_id: None, ..complete.clone() },
            TransferRequest { amount: None, ..complete.clone() },
            TransferRequest { currency: None, ..complete.clone() },
        ];
        for request in incomplete {
            assert!(matches!(
                processor.execute(request).await,
                Err(Error::MissingParameter)
            ));
        }
    }

    #[tokio::test]
    async fn test_missing_parameter_wins_over_unknown_account() {
        let processor = processor(seeded_store());
        let request = TransferRequest {
            source_account_id: Some(99),
            target_account_id: Some(98),
            amount: Some(dec!(-1)),
            currency: None,
        };
        assert!(matches!(
            processor.execute(request).await,
            Err(Error::MissingParameter)
        ));
    }

    #[tokio::test]
    async fn test_unknown_source_then_target() {
        let processor = processor(seeded_store());

        assert!(matches!(
            processor.execute(request(99, 98, dec!(1), Currency::Eur)).await,
            Err(Error::AccountNotFound(99))
        ));
        assert!(matches!(
            processor.execute(request(1, 98, dec!(1), Currency::Eur)).await,
            Err(Error::AccountNotFound(98))
        ));
    }

    #[tokio::test]
    async fn test_unknown_account_wins_over_same_account() {
        let processor = processor(seeded_store());
        assert!(matches!(
            processor.execute(request(99, 99, dec!(1), Currency::Eur)).await,
            Err(Error::AccountNotFound(99))
        ));
    }

    #[tokio::test]
    async fn test_same_account_regardless_of_other_fields() {
        let processor = processor(seeded_store());

        for request in [
            request(1, 1, dec!(10), Currency::Eur),
            request(1, 1, dec!(-10), Currency::Usd),
            request(1, 1, dec!(100000), Currency::Gbp),
        ] {
            assert!(matches!(
                processor.execute(request).await,
                Err(Error::SameAccount)
            ));
        }
    }

    #[tokio::test]
    async fn test_non_positive_amount() {
        let processor = processor(seeded_store());

        for amount in [Decimal::ZERO, dec!(-0.0001), dec!(-100)] {
            // Wrong currency too, but the amount is checked first
            assert!(matches!(
                processor.execute(request(1, 2, amount, Currency::Usd)).await,
                Err(Error::InvalidAmount)
            ));
        }
    }

    #[tokio::test]
    async fn test_currency_must_match_both_accounts() {
        let store = seeded_store();
        let processor = processor(store.clone());

        // Target is USD
        assert!(matches!(
            processor.execute(request(1, 3, dec!(10), Currency::Eur)).await,
            Err(Error::InvalidCurrency)
        ));
        // Both are EUR, request is not
        assert!(matches!(
            processor.execute(request(1, 2, dec!(10), Currency::Gbp)).await,
            Err(Error::InvalidCurrency)
        ));
        // Currency is checked before the balance
        assert!(matches!(
            processor.execute(request(3, 1, dec!(10), Currency::Usd)).await,
            Err(Error::InvalidCurrency)
        ));
        assert_eq!(balance(&store, 1), dec!(250));
        assert_eq!(balance(&store, 3), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_insufficient_balance_leaves_accounts_unchanged() {
        let store = seeded_store();
        let processor = processor(store.clone());

        assert!(matches!(
            processor.execute(request(1, 2, dec!(1000), Currency::Eur)).await,
            Err(Error::InsufficientBalance)
        ));
        assert!(matches!(
            processor.execute(request(1, 2, dec!(250.0001), Currency::Eur)).await,
            Err(Error::InsufficientBalance)
        ));
        assert_eq!(balance(&store, 1), dec!(250));
        assert_eq!(balance(&store, 2), dec!(100));
        assert!(processor.transactions().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transaction_not_found() {
        let processor = processor(seeded_store());
        assert!(matches!(
            processor.transaction(1),
            Err(Error::TransactionNotFound(1))
        ));
    }

    #[tokio::test]
    async fn test_transactions_are_listed_in_order() {
        let processor = processor(seeded_store());
        processor.execute(request(1, 2, dec!(10), Currency::Eur)).await.unwrap();
        processor.execute(request(2, 1, dec!(5), Currency::Eur)).await.unwrap();

        let ids: Vec<_> = processor.transactions().unwrap().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_record_survives_account_deletion() {
        let store = seeded_store();
        let processor = processor(store.clone());
        let transaction = processor
            .execute(request(1, 2, dec!(10), Currency::Eur))
            .await
            .unwrap();

        store.delete_account(2).unwrap();
        assert_eq!(processor.transaction(transaction.id).unwrap().target_account_id, 2);
    }

    /// Delegates to an [`InMemoryStore`] but can be told to fail commits.
    #[derive(Default)]
    struct FlakyStore {
        inner: InMemoryStore,
        fail_commits: AtomicBool,
    }

    impl AccountStore for FlakyStore {
        fn get_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
            self.inner.get_account(id)
        }
        fn save_account(&self, account: Account) -> Result<Account, StoreError> {
            self.inner.save_account(account)
        }
        fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
            self.inner.list_accounts()
        }
        fn delete_account(&self, id: AccountId) -> Result<bool, StoreError> {
            self.inner.delete_account(id)
        }
        fn next_account_id(&self) -> Result<AccountId, StoreError> {
            self.inner.next_account_id()
        }
    }

    impl TransactionStore for FlakyStore {
        fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError> {
            self.inner.get_transaction(id)
        }
        fn save_transaction(&self, transaction: Transaction) -> Result<Transaction, StoreError> {
            self.inner.save_transaction(transaction)
        }
        fn list_transactions(&self) -> Result<Vec<Transaction>, StoreError> {
            self.inner.list_transactions()
        }
        fn next_transaction_id(&self) -> Result<TransactionId, StoreError> {
            self.inner.next_transaction_id()
        }
    }

    impl AtomicUnit for FlakyStore {
        fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
            if self.fail_commits.load(Ordering::SeqCst) {
                return Err(StoreError::Backend("disk full".to_string()));
            }
            self.inner.commit(batch)
        }
    }

    #[tokio::test]
    async fn test_failed_commit_is_unavailable_and_changes_nothing() {
        let store = Arc::new(FlakyStore::default());
        store.save_account(account(1, dec!(250), Currency::Eur)).unwrap();
        store.save_account(account(2, dec!(100), Currency::Eur)).unwrap();
        store.fail_commits.store(true, Ordering::SeqCst);
        let processor = processor(store.clone());

        let err = processor
            .execute(request(1, 2, dec!(100), Currency::Eur))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unavailable(StoreError::Backend(_))));
        assert!(err.is_retryable());
        assert_eq!(store.get_account(1).unwrap().unwrap().balance, dec!(250));
        assert_eq!(store.get_account(2).unwrap().unwrap().balance, dec!(100));
        assert!(store.list_transactions().unwrap().is_empty());

        // Nothing was committed, so retrying is safe
        store.fail_commits.store(false, Ordering::SeqCst);
        processor.execute(request(1, 2, dec!(100), Currency::Eur)).await.unwrap();
        assert_eq!(store.get_account(1).unwrap().unwrap().balance, dec!(150));
    }

    #[tokio::test]
    async fn test_lock_timeout_is_unavailable() {
        let store = seeded_store();
        let locks = Arc::new(AccountLocks::new());
        let processor = TransferProcessor::new(store.clone(), locks.clone(), Duration::from_millis(20));

        let _held = locks.acquire(&[2], TIMEOUT).await.unwrap();
        let err = processor
            .execute(request(1, 2, dec!(10), Currency::Eur))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unavailable(StoreError::Timeout)));
        assert_eq!(balance(&store, 1), dec!(250));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_overdraft_only_one_succeeds() {
        let store = seeded_store();
        let processor = Arc::new(processor(store.clone()));

        // 200 + 200 fits individually but not jointly in 250
        let first = tokio::spawn({
            let processor = processor.clone();
            async move { processor.execute(request(1, 2, dec!(200), Currency::Eur)).await }
        });
        let second = tokio::spawn({
            let processor = processor.clone();
            async move { processor.execute(request(1, 2, dec!(200), Currency::Eur)).await }
        });
        let results = [first.await.unwrap(), second.await.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(r, Err(Error::InsufficientBalance)))
                .count(),
            1
        );
        assert_eq!(balance(&store, 1), dec!(50));
        assert_eq!(balance(&store, 2), dec!(300));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_transfers_conserve_total() {
        let store = Arc::new(InMemoryStore::new());
        for id in 1..=4 {
            store.save_account(account(id, dec!(100), Currency::Eur)).unwrap();
        }
        let processor = Arc::new(processor(store.clone()));

        let mut handles = Vec::new();
        for i in 0..200u64 {
            let processor = processor.clone();
            let source = i % 4 + 1;
            let target = (i * 3 + 1) % 4 + 1;
            handles.push(tokio::spawn(async move {
                processor.execute(request(source, target, dec!(7), Currency::Eur)).await
            }));
        }

        let mut applied = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => applied += 1,
                Err(Error::SameAccount | Error::InsufficientBalance) => {}
                Err(err) => panic!("unexpected error: {err}"),
            }
        }

        let accounts = store.list_accounts().unwrap();
        let total: Decimal = accounts.iter().map(|a| a.balance).sum();
        assert_eq!(total, dec!(400));
        assert!(accounts.iter().all(|a| a.balance >= Decimal::ZERO));
        assert_eq!(processor.transactions().unwrap().len(), applied);
    }

    #[tokio::test]
    async fn test_credit_overflow_is_rejected() {
        let store = Arc::new(InMemoryStore::new());
        store.save_account(account(1, Decimal::MAX, Currency::Eur)).unwrap();
        store.save_account(account(2, Decimal::MAX, Currency::Eur)).unwrap();
        let processor = processor(store.clone());

        let err = processor
            .execute(request(1, 2, dec!(1), Currency::Eur))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BalanceOverflow));
        assert!(!err.is_retryable());
        assert_eq!(balance(&store, 1), Decimal::MAX);
        assert_eq!(balance(&store, 2), Decimal::MAX);
        assert!(processor.transactions().unwrap().is_empty());

        // The ledger keeps working after the rejection
        store.save_account(account(3, dec!(0), Currency::Eur)).unwrap();
        processor.execute(request(1, 3, dec!(1), Currency::Eur)).await.unwrap();
        assert_eq!(balance(&store, 3), dec!(1));
    }

    #[tokio::test]
    async fn test_unknown_accounts_leave_no_locks_behind() {
        let store = seeded_store();
        let locks = Arc::new(AccountLocks::new());
        let processor = TransferProcessor::new(store, locks.clone(), TIMEOUT);

        for id in 100..600 {
            let err = processor
                .execute(request(id, id + 1, dec!(1), Currency::Eur))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::AccountNotFound(_)));
        }
        processor.execute(request(1, 2, dec!(1), Currency::Eur)).await.unwrap();
        assert_eq!(locks.tracked_accounts(), 0);
    }
}
