//! Domain-specific errors for the ledger.
//!
//! [`Error`] carries the caller-facing failure kinds:
//! - Request validation errors (missing or invalid parameters, amounts, currencies)
//! - Transfer rule violations (same account, insufficient balance, balance overflow)
//! - Lookup failures (account or transaction not found)
//! - Infrastructure failures, wrapped from [`StoreError`]
//!
//! Every kind maps to exactly one [`ErrorCategory`], which is what outer layers
//! use to pick a status code and decide whether a retry is safe.

use thiserror::Error;

use crate::dto::{AccountId, TransactionId};

#[derive(Debug, Error)]
pub enum Error {
    #[error("one or more parameters are missing")]
    MissingParameter,
    #[error("invalid parameters")]
    InvalidParameters,
    #[error("invalid amount")]
    InvalidAmount,
    #[error("invalid currency")]
    InvalidCurrency,
    #[error("source and target accounts cannot be the same")]
    SameAccount,
    #[error("insufficient balance")]
    InsufficientBalance,
    #[error("balance would exceed the largest representable amount")]
    BalanceOverflow,
    #[error("account not found with id {0}")]
    AccountNotFound(AccountId),
    #[error("transaction not found with id {0}")]
    TransactionNotFound(TransactionId),
    #[error("ledger unavailable: {0}")]
    Unavailable(#[from] StoreError),
}

/// Failures raised by the persistence layer. None of these are attributable
/// to the caller's input.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("timed out waiting for account lock")]
    Timeout,
    #[error("store lock poisoned")]
    Poisoned,
    #[error("transaction {0} already recorded")]
    DuplicateTransaction(TransactionId),
    #[error("{0}")]
    Backend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    BadRequest,
    NotFound,
    Unavailable,
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::AccountNotFound(_) | Error::TransactionNotFound(_) => ErrorCategory::NotFound,
            Error::Unavailable(_) => ErrorCategory::Unavailable,
            Error::MissingParameter
            | Error::InvalidParameters
            | Error::InvalidAmount
            | Error::InvalidCurrency
            | Error::SameAccount
            | Error::InsufficientBalance
            | Error::BalanceOverflow => ErrorCategory::BadRequest,
        }
    }

    /// Only infrastructure failures are worth retrying, and only because every
    /// such failure is raised before the atomic write is applied.
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Unavailable
    }

    /// Stable snake_case identifier used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Error::MissingParameter => "missing_parameter",
            Error::InvalidParameters => "invalid_parameters",
            Error::InvalidAmount => "invalid_amount",
            Error::InvalidCurrency => "invalid_currency",
            Error::SameAccount => "same_account",
            Error::InsufficientBalance => "insufficient_balance",
            Error::BalanceOverflow => "balance_overflow",
            Error::AccountNotFound(_) => "account_not_found",
            Error::TransactionNotFound(_) => "transaction_not_found",
            Error::Unavailable(_) => "unavailable",
        }
    }
}
