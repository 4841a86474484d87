use std::{error::Error, fmt::Debug};

use rust_decimal::Decimal;

use crate::stock::cache::PriceError;
use crate::transaction::model::TxStatus;
use crate::vendor::model::{VendorError, VendorErrorKind};

/// Storage-layer failures shared by every repository.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("row not found")]
    NotFound,

    #[error("transaction {id} is already {status} and cannot be transitioned")]
    TerminalTransition { id: i64, status: TxStatus },

    #[error("PENDING is not a valid transition target")]
    NonTerminalTarget,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            e => StoreError::Backend(e.into()),
        }
    }
}

#[derive(thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("requested price {requested} is outside the allowed band around the current price {current}")]
    PriceTolerance { requested: Decimal, current: Decimal },

    #[error("stock {0} not found")]
    StockNotFound(String),

    #[error("vendor unavailable: {0}")]
    VendorUnavailable(String),

    #[error("vendor rejected order: {0}")]
    VendorRejected(String),

    #[error("storage failure")]
    Storage(#[source] StoreError),

    #[error("position update failed after confirmed fill (transaction {transaction_id}); reconciliation required")]
    PositionReconciliation {
        transaction_id: i64,
        #[source]
        source: StoreError,
    },
}

impl Debug for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)?;
        if let Some(source) = self.source() {
            write!(f, " (Caused by: {})", source)?;
        }
        Ok(())
    }
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        ServiceError::Storage(e)
    }
}

impl From<VendorError> for ServiceError {
    fn from(e: VendorError) -> Self {
        match e.kind {
            VendorErrorKind::Rejected => ServiceError::VendorRejected(e.message),
            // A malformed vendor payload is as unusable as no response at all.
            VendorErrorKind::Unavailable | VendorErrorKind::BadResponse => {
                ServiceError::VendorUnavailable(e.to_string())
            }
        }
    }
}

impl From<PriceError> for ServiceError {
    fn from(e: PriceError) -> Self {
        match e {
            PriceError::NotFound(symbol) => ServiceError::StockNotFound(symbol),
            PriceError::Vendor(e) => e.into(),
            PriceError::Store(e) => ServiceError::Storage(e),
        }
    }
}
