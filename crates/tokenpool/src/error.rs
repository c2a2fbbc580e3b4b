use thiserror::Error;

use crate::pool::TokenId;

/// Caller-facing lease outcomes that are not a token.
///
/// Timer-driven paths never produce these: a token that is already gone is
/// treated as success there.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LeaseError {
    #[error("token not found: {0}")]
    NotFound(TokenId),

    #[error("no tokens available")]
    PoolExhausted,
}

pub type Result<T> = std::result::Result<T, LeaseError>;
