#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use stocktrade_svc::error::StoreError;
use stocktrade_svc::portfolio::model::{Portfolio, Position, PositionRecord};
use stocktrade_svc::portfolio::repo::{DEFAULT_PORTFOLIO_NAME, PortfolioStore};
use stocktrade_svc::stock::cache::{Clock, PriceCache};
use stocktrade_svc::stock::model::Stock;
use stocktrade_svc::stock::repo::StockStore;
use stocktrade_svc::svc::Service;
use stocktrade_svc::transaction::model::{NewTransaction, Transaction, TxStatus};
use stocktrade_svc::transaction::repo::TransactionStore;
use stocktrade_svc::vendor::client::VendorApi;
use stocktrade_svc::vendor::model::{
    VendorConfirmation, VendorError, VendorErrorKind, VendorListing, VendorQuote,
};

pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self(Mutex::new(start))
    }

    pub fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

#[derive(Default)]
pub struct MemoryStockStore {
    rows: Mutex<HashMap<String, Stock>>,
    next_id: AtomicI32,
}

impl MemoryStockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, symbol: &str, name: &str, price: Decimal, last_updated: DateTime<Utc>) -> i32 {
        let stock_id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.rows.lock().unwrap().insert(
            symbol.to_string(),
            Stock {
                stock_id,
                symbol: symbol.to_string(),
                name: name.to_string(),
                price,
                last_updated,
            },
        );
        stock_id
    }

    pub fn by_id(&self, stock_id: i32) -> Option<Stock> {
        self.rows
            .lock()
            .unwrap()
            .values()
            .find(|s| s.stock_id == stock_id)
            .cloned()
    }

    /// Updates the price in place, keeping the stock id stable.
    pub fn set_price(&self, symbol: &str, price: Decimal, last_updated: DateTime<Utc>) {
        let mut rows = self.rows.lock().unwrap();
        let stock = rows.get_mut(symbol).expect("symbol seeded");
        stock.price = price;
        stock.last_updated = last_updated;
    }
}

#[async_trait]
impl StockStore for MemoryStockStore {
    async fn get_by_symbol(&self, symbol: &str) -> Result<Option<Stock>, StoreError> {
        Ok(self.rows.lock().unwrap().get(symbol).cloned())
    }

    async fn upsert_quotes(&self, quotes: &[VendorQuote], as_of: DateTime<Utc>) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().unwrap();
        for quote in quotes {
            match rows.get_mut(&quote.symbol) {
                Some(existing) => {
                    existing.name = quote.name.clone();
                    existing.price = quote.price;
                    existing.last_updated = as_of;
                }
                None => {
                    let stock_id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                    rows.insert(
                        quote.symbol.clone(),
                        Stock {
                            stock_id,
                            symbol: quote.symbol.clone(),
                            name: quote.name.clone(),
                            price: quote.price,
                            last_updated: as_of,
                        },
                    );
                }
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MockVendor {
    pub quotes: Mutex<Vec<VendorQuote>>,
    pub pages: Mutex<VecDeque<VendorListing>>,
    pub listing_error: Mutex<Option<VendorError>>,
    pub buy_error: Mutex<Option<VendorError>>,
    pub listing_calls: AtomicUsize,
    pub buy_calls: AtomicUsize,
}

impl MockVendor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(&self, quotes: Vec<VendorQuote>) {
        *self.quotes.lock().unwrap() = quotes;
    }

    /// Queues an explicit listing page; once queued pages run out the vendor
    /// falls back to the single-page `quotes` listing.
    pub fn push_page(&self, items: Vec<VendorQuote>, next_token: Option<&str>) {
        self.pages.lock().unwrap().push_back(VendorListing {
            items,
            next_token: next_token.map(str::to_string),
        });
    }

    pub fn fail_listings(&self, message: &str) {
        *self.listing_error.lock().unwrap() =
            Some(VendorError::new(VendorErrorKind::Unavailable, message));
    }

    pub fn reject_buys(&self, message: &str) {
        *self.buy_error.lock().unwrap() = Some(VendorError::new(VendorErrorKind::Rejected, message));
    }
}

#[async_trait]
impl VendorApi for MockVendor {
    async fn fetch_listing(&self, _page_token: Option<&str>) -> Result<VendorListing, VendorError> {
        self.listing_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.listing_error.lock().unwrap().clone() {
            return Err(e);
        }
        if let Some(page) = self.pages.lock().unwrap().pop_front() {
            return Ok(page);
        }
        Ok(VendorListing {
            items: self.quotes.lock().unwrap().clone(),
            next_token: None,
        })
    }

    async fn submit_buy(
        &self,
        symbol: &str,
        price: Decimal,
        quantity: i32,
    ) -> Result<VendorConfirmation, VendorError> {
        let call = self.buy_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(e) = self.buy_error.lock().unwrap().clone() {
            return Err(e);
        }
        Ok(VendorConfirmation {
            order_ref: Some(format!("ord-{call}")),
            symbol: symbol.to_string(),
            price,
            quantity,
        })
    }
}

#[derive(Default)]
pub struct MemoryTransactionStore {
    rows: Mutex<Vec<Transaction>>,
    next_id: AtomicI64,
}

impl MemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl TransactionStore for MemoryTransactionStore {
    async fn create(&self, draft: NewTransaction) -> Result<Transaction, StoreError> {
        let tx = Transaction {
            transaction_id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            user_id: draft.user_id.clone(),
            stock_id: draft.stock_id,
            portfolio_id: draft.portfolio_id,
            tx_type: draft.tx_type,
            quantity: draft.quantity,
            price: draft.price,
            total_amount: draft.total_amount(),
            status: TxStatus::Pending,
            error_message: None,
            created_at: Utc::now(),
            processed_at: None,
        };
        self.rows.lock().unwrap().push(tx.clone());
        Ok(tx)
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
        let mut rows = self.rows.lock().unwrap();
        let tx = rows
            .iter_mut()
            .find(|tx| tx.transaction_id == id)
            .ok_or(StoreError::NotFound)?;
        if tx.status.is_terminal() {
            return Err(StoreError::TerminalTransition {
                id,
                status: tx.status,
            });
        }
        tx.status = status;
        tx.error_message = error_message.map(str::to_string);
        tx.processed_at = Some(Utc::now());
        Ok(tx.clone())
    }

    async fn get_by_id(&self, id: i64) -> Result<Transaction, StoreError> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|tx| tx.transaction_id == id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list_by_user(&self, user_id: &str, limit: i64, offset: i64) -> Result<Vec<Transaction>, StoreError> {
        let mut rows: Vec<_> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|tx| tx.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| (b.created_at, b.transaction_id).cmp(&(a.created_at, a.transaction_id)));
        Ok(rows
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn list_by_status(&self, status: TxStatus) -> Result<Vec<Transaction>, StoreError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|tx| tx.status == status)
            .cloned()
            .collect())
    }

    async fn list_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, StoreError> {
        let mut rows: Vec<_> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|tx| tx.created_at >= start && tx.created_at < end)
            .cloned()
            .collect();
        rows.sort_by_key(|tx| (tx.created_at, tx.transaction_id));
        Ok(rows)
    }
}

pub struct MemoryPortfolioStore {
    stocks: Arc<MemoryStockStore>,
    portfolios: Mutex<Vec<Portfolio>>,
    positions: Mutex<HashMap<(i32, i32), Position>>,
    next_id: AtomicI32,
    pub fail_apply_fill: AtomicBool,
}

impl MemoryPortfolioStore {
    pub fn new(stocks: Arc<MemoryStockStore>) -> Self {
        Self {
            stocks,
            portfolios: Mutex::new(Vec::new()),
            positions: Mutex::new(HashMap::new()),
            next_id: AtomicI32::new(0),
            fail_apply_fill: AtomicBool::new(false),
        }
    }

    pub fn position(&self, portfolio_id: i32, stock_id: i32) -> Option<Position> {
        self.positions
            .lock()
            .unwrap()
            .get(&(portfolio_id, stock_id))
            .cloned()
    }
}

#[async_trait]
impl PortfolioStore for MemoryPortfolioStore {
    async fn get_or_create_default(&self, user_id: &str) -> Result<Portfolio, StoreError> {
        let mut portfolios = self.portfolios.lock().unwrap();
        if let Some(existing) = portfolios
            .iter()
            .find(|p| p.user_id == user_id && p.name == DEFAULT_PORTFOLIO_NAME)
        {
            return Ok(existing.clone());
        }
        let now = Utc::now();
        let portfolio = Portfolio {
            portfolio_id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            user_id: user_id.to_string(),
            name: DEFAULT_PORTFOLIO_NAME.to_string(),
            created_at: now,
            updated_at: now,
        };
        portfolios.push(portfolio.clone());
        Ok(portfolio)
    }

    async fn apply_fill(
        &self,
        portfolio_id: i32,
        stock_id: i32,
        quantity: i32,
        fill_price: Decimal,
    ) -> Result<Position, StoreError> {
        if self.fail_apply_fill.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(anyhow::anyhow!("injected storage failure")));
        }
        // Merge under the lock, mirroring the single-statement upsert of the
        // Postgres store.
        let mut positions = self.positions.lock().unwrap();
        let position = positions
            .entry((portfolio_id, stock_id))
            .and_modify(|p| {
                let old_qty = Decimal::from(p.quantity);
                let add_qty = Decimal::from(quantity);
                p.average_price =
                    (old_qty * p.average_price + add_qty * fill_price) / (old_qty + add_qty);
                p.quantity += quantity;
            })
            .or_insert(Position {
                portfolio_id,
                stock_id,
                quantity,
                average_price: fill_price,
            });
        Ok(position.clone())
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Portfolio>, StoreError> {
        Ok(self
            .portfolios
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn positions_by_user(&self, user_id: &str) -> Result<Vec<PositionRecord>, StoreError> {
        let portfolio_ids: Vec<i32> = self
            .portfolios
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.user_id == user_id)
            .map(|p| p.portfolio_id)
            .collect();
        let mut records: Vec<PositionRecord> = self
            .positions
            .lock()
            .unwrap()
            .values()
            .filter(|pos| portfolio_ids.contains(&pos.portfolio_id))
            .map(|pos| {
                let stock = self.stocks.by_id(pos.stock_id).expect("position references seeded stock");
                PositionRecord {
                    portfolio_id: pos.portfolio_id,
                    stock_id: pos.stock_id,
                    symbol: stock.symbol,
                    stock_name: stock.name,
                    quantity: pos.quantity,
                    average_price: pos.average_price,
                }
            })
            .collect();
        records.sort_by(|a, b| (a.portfolio_id, &a.symbol).cmp(&(b.portfolio_id, &b.symbol)));
        Ok(records)
    }
}

/// A full pipeline wired over the in-memory fakes.
pub struct TestWorld {
    pub stocks: Arc<MemoryStockStore>,
    pub vendor: Arc<MockVendor>,
    pub transactions: Arc<MemoryTransactionStore>,
    pub portfolios: Arc<MemoryPortfolioStore>,
    pub clock: Arc<ManualClock>,
    pub svc: Arc<Service>,
}

pub fn world() -> TestWorld {
    world_with_freshness(Duration::seconds(300))
}

pub fn world_with_freshness(freshness: Duration) -> TestWorld {
    let stocks = Arc::new(MemoryStockStore::new());
    let vendor = Arc::new(MockVendor::new());
    let transactions = Arc::new(MemoryTransactionStore::new());
    let portfolios = Arc::new(MemoryPortfolioStore::new(stocks.clone()));
    let clock = Arc::new(ManualClock::new(Utc::now()));

    let prices = PriceCache::with_clock(
        stocks.clone(),
        vendor.clone(),
        freshness,
        clock.clone(),
    );
    let svc = Arc::new(Service::new(
        prices,
        vendor.clone(),
        transactions.clone(),
        portfolios.clone(),
    ));
    TestWorld {
        stocks,
        vendor,
        transactions,
        portfolios,
        clock,
        svc,
    }
}

pub fn quote(symbol: &str, name: &str, price: Decimal) -> VendorQuote {
    VendorQuote {
        symbol: symbol.to_string(),
        name: name.to_string(),
        price,
    }
}
