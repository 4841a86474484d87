use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxType {
    Buy,
    Sell,
}

impl TxType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxType::Buy => "BUY",
            TxType::Sell => "SELL",
        }
    }
}

impl TryFrom<&str> for TxType {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, anyhow::Error> {
        match value {
            "BUY" => Ok(TxType::Buy),
            "SELL" => Ok(TxType::Sell),
            other => Err(anyhow::anyhow!("unknown transaction type {other}")),
        }
    }
}

impl std::fmt::Display for TxType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Pending,
    Success,
    Failed,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Pending => "PENDING",
            TxStatus::Success => "SUCCESS",
            TxStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TxStatus::Pending)
    }
}

impl TryFrom<&str> for TxStatus {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, anyhow::Error> {
        match value {
            "PENDING" => Ok(TxStatus::Pending),
            "SUCCESS" => Ok(TxStatus::Success),
            "FAILED" => Ok(TxStatus::Failed),
            other => Err(anyhow::anyhow!("unknown transaction status {other}")),
        }
    }
}

impl std::fmt::Display for TxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The durable record of one intent-to-trade. Created PENDING before the
/// vendor call and moved exactly once to SUCCESS or FAILED.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Transaction {
    pub transaction_id: i64,
    pub user_id: String,
    pub stock_id: i32,
    pub portfolio_id: Option<i32>,
    pub tx_type: TxType,
    pub quantity: i32,
    pub price: Decimal,
    pub total_amount: Decimal,
    pub status: TxStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: String,
    pub stock_id: i32,
    pub portfolio_id: Option<i32>,
    pub tx_type: TxType,
    pub quantity: i32,
    pub price: Decimal,
}

impl NewTransaction {
    pub fn buy(user_id: &str, stock_id: i32, portfolio_id: i32, quantity: i32, price: Decimal) -> Self {
        Self {
            user_id: user_id.to_string(),
            stock_id,
            portfolio_id: Some(portfolio_id),
            tx_type: TxType::Buy,
            quantity,
            price,
        }
    }

    pub fn total_amount(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}
