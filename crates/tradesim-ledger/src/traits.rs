use std::sync::Arc;

use crate::block::Block;
use crate::error::{AppendError, LedgerError};

/// Write boundary of the block ledger.
pub trait LedgerWriter: Send + Sync {
    /// Link `block` after the current tail and make it the new tail.
    ///
    /// The block must not carry a link yet. On error the ledger is left
    /// exactly as it was and the block is handed back unlinked inside the
    /// [`AppendError`].
    fn append(&self, block: Block) -> Result<(), AppendError>;
}

/// Read boundary of the block ledger.
pub trait LedgerReader: Send + Sync {
    /// Number of blocks, genesis included.
    fn length(&self) -> Result<usize, LedgerError>;

    /// The genesis block.
    fn head(&self) -> Result<Arc<Block>, LedgerError>;

    /// The most recently appended block.
    fn tail(&self) -> Result<Arc<Block>, LedgerError>;

    /// Every block, newest first.
    fn blocks(&self) -> Result<Vec<Arc<Block>>, LedgerError>;
}
