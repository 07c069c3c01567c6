pub mod api;
pub mod config;
mod csv_utils;
pub mod dto;
mod engine;
mod error;
mod ledger;
mod locks;
mod manager;
mod runner;
pub mod stores;
pub mod telemetry;

pub use config::Config;
pub use dto::{
    Account, AccountId, AccountUpdate, Currency, NewAccount, Transaction, TransactionId, TransferDirection,
    TransferRequest,
};
pub use engine::TransferProcessor;
pub use error::{Error, ErrorCategory, StoreError};
pub use ledger::Ledger;
pub use locks::AccountLocks;
pub use manager::AccountManager;
pub use runner::{replay, ReplaySummary};
