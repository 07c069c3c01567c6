use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::RoundingStrategy;
use serde::de::Deserializer;
use serde::{Deserialize, Serialize};

pub type AccountId = u64;
pub type TransactionId = u64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Eur,
    Usd,
    Gbp,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: AccountId,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
    pub currency: Currency,
    pub created_at: DateTime<Utc>,
}

/// A recorded transfer. Account ids are plain references: the accounts may be
/// deleted later while the record stays.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    pub source_account_id: AccountId,
    pub target_account_id: AccountId,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub currency: Currency,
}

impl Transaction {
    pub fn involves(&self, account_id: AccountId) -> bool {
        self.source_account_id == account_id || self.target_account_id == account_id
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    pub currency: Option<Currency>,
    #[serde(default, deserialize_with = "deserialize_decimal_4dp")]
    pub balance: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccountUpdate {
    pub id: Option<AccountId>,
    pub currency: Option<Currency>,
    #[serde(default, deserialize_with = "deserialize_decimal_4dp")]
    pub balance: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub source_account_id: Option<AccountId>,
    pub target_account_id: Option<AccountId>,
    #[serde(default, deserialize_with = "deserialize_decimal_4dp")]
    pub amount: Option<Decimal>,
    pub currency: Option<Currency>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransferDirection {
    #[default]
    All,
    Incoming,
    Outgoing,
}

/// Account line of the replay CSV format, used for both the seed file and the
/// final balances report.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct AccountRow {
    pub id: AccountId,
    pub currency: Currency,
    #[serde(deserialize_with = "deserialize_required_decimal_4dp")]
    pub balance: Decimal,
}

impl From<&Account> for AccountRow {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            currency: account.currency,
            balance: account.balance.normalize(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct TransferRow {
    pub source: Option<AccountId>,
    pub target: Option<AccountId>,
    #[serde(deserialize_with = "deserialize_decimal_4dp")]
    pub amount: Option<Decimal>,
    pub currency: Option<Currency>,
}

impl From<TransferRow> for TransferRequest {
    fn from(row: TransferRow) -> Self {
        Self {
            source_account_id: row.source,
            target_account_id: row.target,
            amount: row.amount,
            currency: row.currency,
        }
    }
}

fn truncate_4dp(dec: Decimal) -> Decimal {
    dec.round_dp_with_strategy(4, RoundingStrategy::ToZero)
}

fn deserialize_decimal_4dp<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Decimal>::deserialize(deserializer).map(|opt_dec| opt_dec.map(truncate_4dp))
}

fn deserialize_required_decimal_4dp<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    <Decimal as Deserialize>::deserialize(deserializer).map(truncate_4dp)
}
