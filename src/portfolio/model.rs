use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, dec};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, sqlx::FromRow, Debug, Clone)]
pub struct Portfolio {
    pub portfolio_id: i32,
    pub user_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One holding. `average_price` is the quantity-weighted mean of every fill
/// that went into the position.
#[derive(Serialize, Deserialize, sqlx::FromRow, Debug, Clone, PartialEq)]
pub struct Position {
    pub portfolio_id: i32,
    pub stock_id: i32,
    pub quantity: i32,
    pub average_price: Decimal,
}

/// A position joined to its stock row, without valuation.
#[derive(Serialize, Deserialize, sqlx::FromRow, Debug, Clone)]
pub struct PositionRecord {
    pub portfolio_id: i32,
    pub stock_id: i32,
    pub symbol: String,
    pub stock_name: String,
    pub quantity: i32,
    pub average_price: Decimal,
}

/// A position valued at the current cached price.
#[derive(Serialize, Debug, Clone)]
pub struct PositionView {
    #[serde(flatten)]
    pub record: PositionRecord,
    pub current_price: Decimal,
}

impl PositionView {
    pub fn cost_basis(&self) -> Decimal {
        self.record.average_price * Decimal::from(self.record.quantity)
    }

    pub fn market_value(&self) -> Decimal {
        self.current_price * Decimal::from(self.record.quantity)
    }

    pub fn gain(&self) -> Decimal {
        self.market_value() - self.cost_basis()
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct PortfolioView {
    pub portfolio: Portfolio,
    pub positions: Vec<PositionView>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PortfolioSummary {
    pub total_portfolios: usize,
    pub total_value: Decimal,
    pub total_gain: Decimal,
    pub total_gain_percentage: Decimal,
    pub total_stocks: usize,
}

pub fn summarize(total_portfolios: usize, positions: &[PositionView]) -> PortfolioSummary {
    let total_value: Decimal = positions.iter().map(PositionView::market_value).sum();
    let total_cost: Decimal = positions.iter().map(PositionView::cost_basis).sum();
    let total_gain = total_value - total_cost;
    let total_gain_percentage = if total_cost.is_zero() {
        Decimal::ZERO
    } else {
        (total_gain / total_cost * dec!(100)).round_dp(2)
    };
    PortfolioSummary {
        total_portfolios,
        total_value,
        total_gain,
        total_gain_percentage,
        total_stocks: positions.len(),
    }
}
