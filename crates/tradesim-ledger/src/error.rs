use tradesim_crypto::{ChainError, EntropyError};

use crate::block::Block;

/// Errors produced by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("random source failed: {0}")]
    RandomnessFailure(String),

    #[error("no free placement key after {attempts} attempts")]
    KeyCollisionExhausted { attempts: u32 },

    #[error("structural invariant violated: {0}")]
    StructuralInvariantViolation(String),

    #[error("block already carries a previous link")]
    AlreadyLinked,

    #[error("chain integrity violation at block {index}: {reason}")]
    ChainIntegrity { index: usize, reason: String },

    #[error("ledger lock poisoned")]
    LockPoisoned,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<EntropyError> for LedgerError {
    fn from(err: EntropyError) -> Self {
        Self::RandomnessFailure(err.to_string())
    }
}

impl From<ChainError> for LedgerError {
    fn from(err: ChainError) -> Self {
        let index = match err {
            ChainError::GenesisLinkNotZero => 0,
            ChainError::MissingLink { index }
            | ChainError::MissingNonce { index }
            | ChainError::BrokenLink { index } => index,
        };
        Self::ChainIntegrity {
            index,
            reason: err.to_string(),
        }
    }
}

/// A rejected append, carrying the block back to the caller untouched.
#[derive(Debug, thiserror::Error)]
#[error("append rejected: {error}")]
pub struct AppendError {
    pub error: LedgerError,
    pub block: Box<Block>,
}

impl AppendError {
    pub fn new(error: LedgerError, block: Block) -> Self {
        Self {
            error,
            block: Box::new(block),
        }
    }

    /// Take the block back, still unlinked, for a later retry.
    pub fn into_block(self) -> Block {
        *self.block
    }
}

impl From<AppendError> for LedgerError {
    fn from(err: AppendError) -> Self {
        err.error
    }
}
