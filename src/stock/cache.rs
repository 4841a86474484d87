use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::model::Stock;
use super::repo::StockStore;
use crate::error::StoreError;
use crate::vendor::client::VendorApi;
use crate::vendor::model::{VendorError, VendorQuote};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PriceError {
    #[error("symbol {0} is not listed")]
    NotFound(String),

    #[error(transparent)]
    Vendor(#[from] VendorError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Symbol-to-price lookup backed by the `stocks` table. A stale or missing
/// row triggers a full listing refresh through the vendor; the vendor API is
/// bulk-only, so one stale lookup renews every symbol at once.
///
/// A failed refresh is surfaced even when a stale row exists: prices feed the
/// purchase tolerance gate, and a stale price must not admit a trade.
pub struct PriceCache {
    stocks: Arc<dyn StockStore>,
    vendor: Arc<dyn VendorApi>,
    freshness: Duration,
    clock: Arc<dyn Clock>,
    refresh_gate: Mutex<()>,
}

impl PriceCache {
    pub fn new(stocks: Arc<dyn StockStore>, vendor: Arc<dyn VendorApi>, freshness: Duration) -> Self {
        Self::with_clock(stocks, vendor, freshness, Arc::new(SystemClock))
    }

    pub fn with_clock(
        stocks: Arc<dyn StockStore>,
        vendor: Arc<dyn VendorApi>,
        freshness: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            stocks,
            vendor,
            freshness,
            clock,
            refresh_gate: Mutex::new(()),
        }
    }

    pub async fn get_price(&self, symbol: &str) -> Result<Stock, PriceError> {
        let symbol = normalize_symbol(symbol);
        if let Some(stock) = self.fresh_row(&symbol).await? {
            return Ok(stock);
        }

        // Concurrent stale lookups coalesce into one refresh; whoever waited
        // on the gate re-checks before refreshing again.
        let _gate = self.refresh_gate.lock().await;
        if let Some(stock) = self.fresh_row(&symbol).await? {
            return Ok(stock);
        }
        self.refresh_all().await?;

        match self.stocks.get_by_symbol(&symbol).await? {
            Some(stock) => Ok(stock),
            None => Err(PriceError::NotFound(symbol)),
        }
    }

    async fn fresh_row(&self, symbol: &str) -> Result<Option<Stock>, StoreError> {
        let row = self.stocks.get_by_symbol(symbol).await?;
        let now = self.clock.now();
        Ok(row.filter(|stock| now - stock.last_updated <= self.freshness))
    }

    async fn refresh_all(&self) -> Result<(), PriceError> {
        let as_of = self.clock.now();
        let mut token: Option<String> = None;
        let mut total = 0usize;
        loop {
            let page = self.vendor.fetch_listing(token.as_deref()).await?;
            let quotes = sanitize(page.items);
            total += quotes.len();
            self.stocks.upsert_quotes(&quotes, as_of).await?;
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        info!(symbols = total, "price cache refreshed");
        Ok(())
    }
}

pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_ascii_uppercase()
}

fn sanitize(items: Vec<VendorQuote>) -> Vec<VendorQuote> {
    items
        .into_iter()
        .filter(|quote| {
            if quote.price <= Decimal::ZERO {
                warn!(symbol = %quote.symbol, price = %quote.price, "dropping non-positive vendor price");
                return false;
            }
            true
        })
        .map(|quote| VendorQuote {
            symbol: normalize_symbol(&quote.symbol),
            ..quote
        })
        .collect()
}
