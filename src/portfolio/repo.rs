use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::Postgres;

use super::model::{Portfolio, Position, PositionRecord};
use crate::error::StoreError;

pub const DEFAULT_PORTFOLIO_NAME: &str = "Default";

#[async_trait]
pub trait PortfolioStore: Send + Sync {
    /// Idempotently ensures the user row and the user's default portfolio.
    async fn get_or_create_default(&self, user_id: &str) -> Result<Portfolio, StoreError>;

    /// Merges a confirmed fill into the position. The merge recomputes the
    /// quantity-weighted average price and must not lose concurrent updates.
    async fn apply_fill(
        &self,
        portfolio_id: i32,
        stock_id: i32,
        quantity: i32,
        fill_price: Decimal,
    ) -> Result<Position, StoreError>;

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Portfolio>, StoreError>;

    async fn positions_by_user(&self, user_id: &str) -> Result<Vec<PositionRecord>, StoreError>;
}

#[derive(Clone)]
pub struct PortfolioRepo {
    pub pool: sqlx::Pool<Postgres>,
}

impl PortfolioRepo {
    pub fn new(pool: sqlx::Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PortfolioStore for PortfolioRepo {
    async fn get_or_create_default(&self, user_id: &str) -> Result<Portfolio, StoreError> {
        sqlx::query(r#"INSERT INTO users (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING"#)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        // The no-op DO UPDATE makes RETURNING yield the row on conflict too.
        let portfolio = sqlx::query_as::<_, Portfolio>(
            r#"INSERT INTO portfolios (user_id, name)
                VALUES ($1, $2)
                ON CONFLICT (user_id, name) DO UPDATE SET name = portfolios.name
                RETURNING portfolio_id, user_id, name, created_at, updated_at"#,
        )
        .bind(user_id)
        .bind(DEFAULT_PORTFOLIO_NAME)
        .fetch_one(&self.pool)
        .await?;
        Ok(portfolio)
    }

    async fn apply_fill(
        &self,
        portfolio_id: i32,
        stock_id: i32,
        quantity: i32,
        fill_price: Decimal,
    ) -> Result<Position, StoreError> {
        // Single-statement merge: both SET expressions read the pre-update
        // row, so concurrent fills serialize on the row lock instead of
        // racing a read-modify-write in application code.
        let position = sqlx::query_as::<_, Position>(
            r#"INSERT INTO portfolio_stocks (portfolio_id, stock_id, quantity, average_price)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (portfolio_id, stock_id) DO UPDATE
                SET quantity = portfolio_stocks.quantity + EXCLUDED.quantity,
                    average_price = (portfolio_stocks.quantity * portfolio_stocks.average_price
                        + EXCLUDED.quantity * EXCLUDED.average_price)
                        / (portfolio_stocks.quantity + EXCLUDED.quantity)
                RETURNING portfolio_id, stock_id, quantity, average_price"#,
        )
        .bind(portfolio_id)
        .bind(stock_id)
        .bind(quantity)
        .bind(&fill_price)
        .fetch_one(&self.pool)
        .await?;

        sqlx::query(r#"UPDATE portfolios SET updated_at = now() WHERE portfolio_id = $1"#)
            .bind(portfolio_id)
            .execute(&self.pool)
            .await?;

        Ok(position)
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Portfolio>, StoreError> {
        let portfolios = sqlx::query_as::<_, Portfolio>(
            r#"SELECT portfolio_id, user_id, name, created_at, updated_at
                FROM portfolios WHERE user_id = $1 ORDER BY portfolio_id"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(portfolios)
    }

    async fn positions_by_user(&self, user_id: &str) -> Result<Vec<PositionRecord>, StoreError> {
        let records = sqlx::query_as::<_, PositionRecord>(
            r#"SELECT ps.portfolio_id, ps.stock_id, s.symbol, s.name AS stock_name,
                    ps.quantity, ps.average_price
                FROM portfolio_stocks ps
                JOIN portfolios p ON p.portfolio_id = ps.portfolio_id
                JOIN stocks s ON s.stock_id = ps.stock_id
                WHERE p.user_id = $1
                ORDER BY ps.portfolio_id, s.symbol"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }
}
