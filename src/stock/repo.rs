use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Postgres;

use super::model::Stock;
use crate::error::StoreError;
use crate::vendor::model::VendorQuote;

#[async_trait]
pub trait StockStore: Send + Sync {
    async fn get_by_symbol(&self, symbol: &str) -> Result<Option<Stock>, StoreError>;

    /// Inserts or refreshes one row per quote. Symbols are expected to be
    /// normalized by the caller.
    async fn upsert_quotes(&self, quotes: &[VendorQuote], as_of: DateTime<Utc>) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct StockRepo {
    pub pool: sqlx::Pool<Postgres>,
}

impl StockRepo {
    pub fn new(pool: sqlx::Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StockStore for StockRepo {
    async fn get_by_symbol(&self, symbol: &str) -> Result<Option<Stock>, StoreError> {
        let row = sqlx::query_as::<_, Stock>(
            r#"SELECT stock_id, symbol, name, price, last_updated FROM stocks WHERE symbol = $1"#,
        )
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn upsert_quotes(&self, quotes: &[VendorQuote], as_of: DateTime<Utc>) -> Result<(), StoreError> {
        for quote in quotes {
            sqlx::query(
                r#"INSERT INTO stocks (symbol, name, price, last_updated)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (symbol) DO UPDATE
                SET name = EXCLUDED.name,
                    price = EXCLUDED.price,
                    last_updated = EXCLUDED.last_updated"#,
            )
            .bind(&quote.symbol)
            .bind(&quote.name)
            .bind(&quote.price)
            .bind(as_of)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }
}
