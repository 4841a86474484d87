use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::{Decimal, dec};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Postgres};
use tracing::{error, info, warn};

use crate::cfg::AppConfig;
use crate::error::ServiceError;
use crate::portfolio::model::{PortfolioSummary, PortfolioView, PositionView, summarize};
use crate::portfolio::repo::{PortfolioRepo, PortfolioStore};
use crate::stock::cache::PriceCache;
use crate::stock::repo::{StockRepo, StockStore};
use crate::transaction::model::{NewTransaction, Transaction, TxStatus};
use crate::transaction::repo::{TransactionRepo, TransactionStore};
use crate::vendor::client::{VendorApi, VendorClient};

/// Maximum deviation between the requested price and the current cached
/// price for a buy to be admitted.
pub const PRICE_TOLERANCE: Decimal = dec!(0.02);

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BuyRequest {
    pub user_id: String,
    pub symbol: String,
    pub price: Decimal,
    pub quantity: i32,
}

/// The caller-facing outcome of an admitted buy. The transaction id stays
/// valid for lookup even if this response never reaches the client.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BuyReceipt {
    pub transaction_id: i64,
    pub success: bool,
    pub message: String,
}

pub struct Service {
    prices: PriceCache,
    vendor: Arc<dyn VendorApi>,
    transactions: Arc<dyn TransactionStore>,
    portfolios: Arc<dyn PortfolioStore>,
}

impl Service {
    pub fn new(
        prices: PriceCache,
        vendor: Arc<dyn VendorApi>,
        transactions: Arc<dyn TransactionStore>,
        portfolios: Arc<dyn PortfolioStore>,
    ) -> Self {
        Self {
            prices,
            vendor,
            transactions,
            portfolios,
        }
    }

    /// Wires the sqlx repositories and the live vendor client.
    pub fn from_pool(pool: Pool<Postgres>, cfg: &AppConfig) -> anyhow::Result<Self> {
        let stocks: Arc<dyn StockStore> = Arc::new(StockRepo::new(pool.clone()));
        let vendor: Arc<dyn VendorApi> = Arc::new(VendorClient::from_config(&cfg.vendor)?);
        let prices = PriceCache::new(
            stocks,
            vendor.clone(),
            chrono::Duration::seconds(cfg.price.freshness_secs),
        );
        Ok(Self::new(
            prices,
            vendor,
            Arc::new(TransactionRepo::new(pool.clone())),
            Arc::new(PortfolioRepo::new(pool)),
        ))
    }

    /// Runs one buy through the pipeline: price resolution, tolerance gate,
    /// PENDING ledger entry, vendor submission, terminal transition, position
    /// merge. The ledger reaches its terminal state before the position is
    /// touched, so a crash in between leaves a detectable SUCCESS row rather
    /// than an unexplained position.
    pub async fn buy(&self, req: BuyRequest) -> Result<BuyReceipt, ServiceError> {
        validate(&req)?;
        let stock = self.prices.get_price(&req.symbol).await?;
        if !within_tolerance(stock.price, req.price) {
            return Err(ServiceError::PriceTolerance {
                requested: req.price,
                current: stock.price,
            });
        }

        let portfolio = self.portfolios.get_or_create_default(&req.user_id).await?;
        let draft = NewTransaction::buy(
            &req.user_id,
            stock.stock_id,
            portfolio.portfolio_id,
            req.quantity,
            req.price,
        );
        let tx = self.transactions.create(draft).await?;
        info!(transaction_id = tx.transaction_id, symbol = %stock.symbol, quantity = req.quantity, "buy admitted");

        match self.vendor.submit_buy(&stock.symbol, req.price, req.quantity).await {
            Ok(confirmation) => {
                let tx = self
                    .transactions
                    .transition(tx.transaction_id, TxStatus::Success, None)
                    .await?;
                if let Err(e) = self
                    .portfolios
                    .apply_fill(portfolio.portfolio_id, stock.stock_id, req.quantity, req.price)
                    .await
                {
                    error!(
                        transaction_id = tx.transaction_id,
                        error = %e,
                        "position update failed after confirmed fill; reconciliation required"
                    );
                    return Err(ServiceError::PositionReconciliation {
                        transaction_id: tx.transaction_id,
                        source: e,
                    });
                }
                info!(
                    transaction_id = tx.transaction_id,
                    order_ref = confirmation.order_ref.as_deref().unwrap_or("-"),
                    "buy filled"
                );
                Ok(BuyReceipt {
                    transaction_id: tx.transaction_id,
                    success: true,
                    message: format!("bought {} {} at {}", req.quantity, stock.symbol, req.price),
                })
            }
            Err(e) => {
                warn!(transaction_id = tx.transaction_id, error = %e, "vendor declined buy");
                self.transactions
                    .transition(tx.transaction_id, TxStatus::Failed, Some(&e.message))
                    .await?;
                Ok(BuyReceipt {
                    transaction_id: tx.transaction_id,
                    success: false,
                    message: e.message,
                })
            }
        }
    }

    pub async fn transaction(&self, id: i64) -> Result<Transaction, ServiceError> {
        Ok(self.transactions.get_by_id(id).await?)
    }

    pub async fn transactions_for_user(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transaction>, ServiceError> {
        Ok(self.transactions.list_by_user(user_id, limit, offset).await?)
    }

    /// Positions valued at the current cached price; a stale cache refreshes
    /// once for all symbols on the first lookup.
    pub async fn portfolio_positions(&self, user_id: &str) -> Result<Vec<PositionView>, ServiceError> {
        let records = self.portfolios.positions_by_user(user_id).await?;
        let mut prices: HashMap<String, Decimal> = HashMap::new();
        let mut views = Vec::with_capacity(records.len());
        for record in records {
            let current_price = match prices.get(&record.symbol) {
                Some(price) => *price,
                None => {
                    let stock = self.prices.get_price(&record.symbol).await?;
                    prices.insert(record.symbol.clone(), stock.price);
                    stock.price
                }
            };
            views.push(PositionView { record, current_price });
        }
        Ok(views)
    }

    pub async fn portfolios_for_user(&self, user_id: &str) -> Result<Vec<PortfolioView>, ServiceError> {
        let portfolios = self.portfolios.list_by_user(user_id).await?;
        let mut grouped: HashMap<i32, Vec<PositionView>> = HashMap::new();
        for view in self.portfolio_positions(user_id).await? {
            grouped.entry(view.record.portfolio_id).or_default().push(view);
        }
        Ok(portfolios
            .into_iter()
            .map(|portfolio| {
                let positions = grouped.remove(&portfolio.portfolio_id).unwrap_or_default();
                PortfolioView { portfolio, positions }
            })
            .collect())
    }

    pub async fn portfolio_summary(&self, user_id: &str) -> Result<PortfolioSummary, ServiceError> {
        let portfolios = self.portfolios.list_by_user(user_id).await?;
        let positions = self.portfolio_positions(user_id).await?;
        Ok(summarize(portfolios.len(), &positions))
    }
}

fn validate(req: &BuyRequest) -> Result<(), ServiceError> {
    if req.user_id.trim().is_empty() {
        return Err(ServiceError::Validation("user id must not be empty".into()));
    }
    if req.symbol.trim().is_empty() {
        return Err(ServiceError::Validation("symbol must not be empty".into()));
    }
    if req.quantity <= 0 {
        return Err(ServiceError::Validation("quantity must be positive".into()));
    }
    if req.price <= Decimal::ZERO {
        return Err(ServiceError::Validation("price must be positive".into()));
    }
    Ok(())
}

pub fn within_tolerance(current: Decimal, requested: Decimal) -> bool {
    (current - requested).abs() <= current * PRICE_TOLERANCE
}
