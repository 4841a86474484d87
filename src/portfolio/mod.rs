pub mod model;
pub mod repo;

pub use model::{Portfolio, PortfolioSummary, PortfolioView, Position, PositionRecord, PositionView, summarize};
pub use repo::{PortfolioRepo, PortfolioStore};
