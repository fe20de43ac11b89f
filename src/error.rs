//! Error taxonomy for the request core.
//!
//! Every failure is recoverable by the caller: nothing here is fatal to the
//! process and nothing is retried automatically.

use crate::lifecycle::RequestStatus;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please choose a project")]
    MissingProject,
    #[error("Please choose an engineer")]
    MissingEngineer,
    #[error("Add at least one item to the request")]
    NoLines,
    #[error("Quantity for {0} must be greater than zero")]
    ZeroQuantity(String),
    #[error("Unit for {0} is not set")]
    MissingUnit(String),
    #[error("Item {0} already added. Please edit its quantity.")]
    DuplicateItem(String),
    #[error("Item {0} is missing an owner department")]
    MissingOwnerDept(String),
    #[error("Item {0} is not in the catalog")]
    UnknownItem(String),
    #[error("Line {0} does not exist on this request")]
    UnknownLine(String),
    #[error("Line {0} is locked until an owner restores or accepts it")]
    LockedLine(String),
    #[error("Line {0} is already in that state")]
    Unchanged(String),
}

#[derive(thiserror::Error, Debug)]
pub enum RequestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(
        "Cannot submit or approve because {item_name} ({item_id}) requests {requested} but only {available} available."
    )]
    InventoryViolation {
        item_id: String,
        item_name: String,
        requested: u64,
        available: u64,
    },

    #[error("revision/conflict: request was updated by another user (expected {expected}, found {live}). Reload before saving again.")]
    RevisionConflict { expected: u64, live: u64 },

    #[error("Not enough stock for {item_id}. Need {needed}, have {available}.")]
    StockShortage {
        item_id: String,
        needed: u64,
        available: u64,
    },

    #[error("Item {0} is missing stock info.")]
    MissingStock(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: RequestStatus,
        to: RequestStatus,
    },

    #[error("{collection}/{key} not found")]
    NotFound {
        collection: &'static str,
        key: String,
    },

    #[error("failed to encode document: {0}")]
    Encode(String),

    #[error(transparent)]
    Decode(#[from] minicbor::decode::Error),

    #[error(transparent)]
    Storage(#[from] sled::Error),
}

impl RequestError {
    pub fn is_revision_conflict(&self) -> bool {
        matches!(self, RequestError::RevisionConflict { .. })
    }

    pub fn is_stock_error(&self) -> bool {
        matches!(
            self,
            RequestError::StockShortage { .. } | RequestError::MissingStock(_)
        )
    }

    /// Shortfall for a stock shortage, `None` for every other error.
    pub fn shortfall(&self) -> Option<u64> {
        match self {
            RequestError::StockShortage {
                needed, available, ..
            } => Some(needed.saturating_sub(*available)),
            _ => None,
        }
    }

    pub(crate) fn denied(message: impl Into<String>) -> Self {
        RequestError::PermissionDenied(message.into())
    }
}

pub type Result<T, E = RequestError> = std::result::Result<T, E>;
