use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::Postgres;

use super::model::{NewTransaction, Transaction, TxStatus, TxType};
use crate::error::StoreError;

#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn create(&self, draft: NewTransaction) -> Result<Transaction, StoreError>;

    /// Moves a PENDING transaction to a terminal status and stamps
    /// `processed_at`. Terminal rows are immutable: a second transition fails
    /// with [`StoreError::TerminalTransition`].
    async fn transition(
        &self,
        id: i64,
        status: TxStatus,
        error_message: Option<&str>,
    ) -> Result<Transaction, StoreError>;

    async fn get_by_id(&self, id: i64) -> Result<Transaction, StoreError>;

    async fn list_by_user(&self, user_id: &str, limit: i64, offset: i64) -> Result<Vec<Transaction>, StoreError>;

    async fn list_by_status(&self, status: TxStatus) -> Result<Vec<Transaction>, StoreError>;

    /// Rows with `created_at` in the half-open range `[start, end)`.
    async fn list_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, StoreError>;
}

const TRANSACTION_COLUMNS: &str = r#"transaction_id, user_id, stock_id, portfolio_id, tx_type,
    quantity, price, total_amount, status, error_message, created_at, processed_at"#;

#[derive(Clone)]
pub struct TransactionRepo {
    pub pool: sqlx::Pool<Postgres>,
}

impl TransactionRepo {
    pub fn new(pool: sqlx::Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionStore for TransactionRepo {
    async fn create(&self, draft: NewTransaction) -> Result<Transaction, StoreError> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"INSERT INTO transactions (user_id, stock_id, portfolio_id, tx_type,
                quantity, price, total_amount, status, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, 'PENDING', now())
                RETURNING {TRANSACTION_COLUMNS}"#,
        ))
        .bind(&draft.user_id)
        .bind(draft.stock_id)
        .bind(draft.portfolio_id)
        .bind(draft.tx_type.as_str())
        .bind(draft.quantity)
        .bind(&draft.price)
        .bind(draft.total_amount())
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn transition(
        &self,
        id: i64,
        status: TxStatus,
        error_message: Option<&str>,
    ) -> Result<Transaction, StoreError> {
        if !status.is_terminal() {
            return Err(StoreError::NonTerminalTarget);
        }
        // The status guard makes the update atomic: a row that already left
        // PENDING matches zero rows instead of being overwritten.
        let updated = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"UPDATE transactions
                SET status = $2, error_message = $3, processed_at = now()
                WHERE transaction_id = $1 AND status = 'PENDING'
                RETURNING {TRANSACTION_COLUMNS}"#,
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(error_message)
        .fetch_optional(&self.pool)
        .await?;
        match updated {
            Some(row) => row.try_into(),
            None => {
                let current = self.get_by_id(id).await?;
                Err(StoreError::TerminalTransition {
                    id,
                    status: current.status,
                })
            }
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Transaction, StoreError> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE transaction_id = $1"#,
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn list_by_user(&self, user_id: &str, limit: i64, offset: i64) -> Result<Vec<Transaction>, StoreError> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"SELECT {TRANSACTION_COLUMNS} FROM transactions
                WHERE user_id = $1
                ORDER BY created_at DESC, transaction_id DESC
                LIMIT $2 OFFSET $3"#,
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_by_status(&self, status: TxStatus) -> Result<Vec<Transaction>, StoreError> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"SELECT {TRANSACTION_COLUMNS} FROM transactions
                WHERE status = $1
                ORDER BY created_at DESC, transaction_id DESC"#,
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, StoreError> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"SELECT {TRANSACTION_COLUMNS} FROM transactions
                WHERE created_at >= $1 AND created_at < $2
                ORDER BY created_at, transaction_id"#,
        ))
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct TransactionRow {
    transaction_id: i64,
    user_id: String,
    stock_id: i32,
    portfolio_id: Option<i32>,
    tx_type: String,
    quantity: i32,
    price: Decimal,
    total_amount: Decimal,
    status: String,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = StoreError;

    fn try_from(row: TransactionRow) -> Result<Self, StoreError> {
        Ok(Transaction {
            transaction_id: row.transaction_id,
            user_id: row.user_id,
            stock_id: row.stock_id,
            portfolio_id: row.portfolio_id,
            tx_type: TxType::try_from(row.tx_type.as_str()).map_err(StoreError::Backend)?,
            quantity: row.quantity,
            price: row.price,
            total_amount: row.total_amount,
            status: TxStatus::try_from(row.status.as_str()).map_err(StoreError::Backend)?,
            error_message: row.error_message,
            created_at: row.created_at,
            processed_at: row.processed_at,
        })
    }
}
