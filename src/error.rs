use rust_decimal::Decimal;
use thiserror::Error;

/// Failures reported by the wallet-info collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("wallet service not configured")]
    NotConfigured,

    #[error("address {0} unknown to the explorer")]
    UnknownAddress(String),

    #[error("explorer request failed: {0}")]
    Request(String),
}

/// Coarse classification used by callers to map errors onto responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    BusinessRule,
    InvalidInput,
    UpstreamUnavailable,
    Storage,
    DataIntegrity,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LendingError {
    #[error("market {0} not found")]
    MarketNotFound(String),

    #[error("borrow would exceed borrow limit: {requested_total_usd} USD > {borrow_limit_usd} USD")]
    BorrowLimitExceeded {
        requested_total_usd: Decimal,
        borrow_limit_usd: Decimal,
    },

    #[error("market for asset {0} already exists")]
    MarketAlreadyExists(String),

    #[error("invalid amount {amount:?}: {reason}")]
    InvalidAmount { amount: String, reason: String },

    #[error("invalid market: {0}")]
    InvalidMarket(String),

    #[error("upstream unavailable: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("data integrity error in {record}: {reason}")]
    DataIntegrity { record: String, reason: String },
}

pub type LendingResult<T> = Result<T, LendingError>;

impl LendingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LendingError::MarketNotFound(_) => ErrorKind::NotFound,
            LendingError::BorrowLimitExceeded { .. } | LendingError::MarketAlreadyExists(_) => {
                ErrorKind::BusinessRule
            }
            LendingError::InvalidAmount { .. } | LendingError::InvalidMarket(_) => {
                ErrorKind::InvalidInput
            }
            LendingError::Upstream(_) => ErrorKind::UpstreamUnavailable,
            LendingError::Storage(_) => ErrorKind::Storage,
            LendingError::DataIntegrity { .. } => ErrorKind::DataIntegrity,
        }
    }

    /// True for infrastructure or corrupt-data failures; false for rejections
    /// that should be rendered back to the user.
    pub fn is_fault(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::UpstreamUnavailable | ErrorKind::Storage | ErrorKind::DataIntegrity
        )
    }

    pub fn invalid_amount(amount: impl Into<String>, reason: impl Into<String>) -> Self {
        LendingError::InvalidAmount {
            amount: amount.into(),
            reason: reason.into(),
        }
    }

    pub fn integrity(record: impl Into<String>, reason: impl Into<String>) -> Self {
        LendingError::DataIntegrity {
            record: record.into(),
            reason: reason.into(),
        }
    }
}
