//! Trading backend core: price cache, vendor integration, transaction ledger
//! and portfolio reconciliation. The HTTP layer and report delivery live in
//! separate services and consume this crate through [`svc::Service`] and
//! [`reporting::ReportingReader`].

pub mod cfg;
pub mod db;
pub mod error;
pub mod logging;
pub mod portfolio;
pub mod reporting;
pub mod retry;
pub mod stock;
pub mod svc;
pub mod transaction;
pub mod vendor;

pub use error::{ServiceError, StoreError};
pub use svc::{BuyReceipt, BuyRequest, Service};
