use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::StoreError;
use crate::transaction::model::{Transaction, TxStatus};
use crate::transaction::repo::TransactionStore;

/// Read-only aggregation over the ledger, consumed by the report scheduler.
pub struct ReportingReader {
    transactions: Arc<dyn TransactionStore>,
}

#[derive(Serialize, Debug, Clone, Default)]
pub struct GroupedTransactions {
    pub successful: Vec<Transaction>,
    pub failed: Vec<Transaction>,
    pub pending: Vec<Transaction>,
}

impl GroupedTransactions {
    fn from_rows(rows: Vec<Transaction>) -> Self {
        let mut grouped = Self::default();
        for tx in rows {
            match tx.status {
                TxStatus::Success => grouped.successful.push(tx),
                TxStatus::Failed => grouped.failed.push(tx),
                TxStatus::Pending => grouped.pending.push(tx),
            }
        }
        grouped
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub total_transactions: usize,
    pub successful_transactions: usize,
    pub failed_transactions: usize,
    pub pending_transactions: usize,
    /// Shares filled, successful transactions only.
    pub total_volume: i64,
    /// Money moved, successful transactions only.
    pub total_value: Decimal,
}

impl DailyStats {
    fn compute(date: NaiveDate, rows: &[Transaction]) -> Self {
        let count = |status: TxStatus| rows.iter().filter(|tx| tx.status == status).count();
        let successful = rows.iter().filter(|tx| tx.status == TxStatus::Success);
        Self {
            date,
            total_transactions: rows.len(),
            successful_transactions: count(TxStatus::Success),
            failed_transactions: count(TxStatus::Failed),
            pending_transactions: count(TxStatus::Pending),
            total_volume: successful.clone().map(|tx| i64::from(tx.quantity)).sum(),
            total_value: successful.map(|tx| tx.total_amount).sum(),
        }
    }
}

impl ReportingReader {
    pub fn new(transactions: Arc<dyn TransactionStore>) -> Self {
        Self { transactions }
    }

    /// Ledger entries with `created_at` in `[start, end)`, grouped by
    /// lifecycle state.
    pub async fn transactions_for_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<GroupedTransactions, StoreError> {
        let rows = self.transactions.list_by_date_range(start, end).await?;
        Ok(GroupedTransactions::from_rows(rows))
    }

    /// Summary statistics for one UTC day. Pure read; recomputing a closed
    /// day always yields the same numbers.
    pub async fn daily_stats(&self, date: NaiveDate) -> Result<DailyStats, StoreError> {
        let start = date.and_time(NaiveTime::MIN).and_utc();
        let end = start + chrono::Duration::days(1);
        let rows = self.transactions.list_by_date_range(start, end).await?;
        Ok(DailyStats::compute(date, &rows))
    }
}
