use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A listed instrument with its last known vendor price. Rows are written
/// only by the price-cache refresh.
#[derive(Serialize, Deserialize, sqlx::FromRow, Debug, Clone)]
pub struct Stock {
    pub stock_id: i32,
    pub symbol: String,
    pub name: String,
    pub price: Decimal,
    pub last_updated: DateTime<Utc>,
}
