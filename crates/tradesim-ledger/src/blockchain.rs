use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, warn};

use tradesim_crypto::entropy::{self, draw_array};
use tradesim_crypto::{ChainVerifier, LinkHasher, Nonce, RandomSource};

use crate::block::Block;
use crate::config::LedgerConfig;
use crate::error::{AppendError, LedgerError};
use crate::traits::{LedgerReader, LedgerWriter};
use crate::tree::HashTree;

/// In-memory chain of blocks, rooted at an empty genesis block.
///
/// Appends and reads go through one lock, so readers never see a block
/// whose link is half set. The ledger's random source supplies both the
/// chain nonces and the seeds of the trees built by [`Blockchain::new_block`],
/// so a seeded ledger is reproducible end to end.
pub struct Blockchain {
    config: LedgerConfig,
    inner: RwLock<ChainState>,
}

struct ChainState {
    head: Arc<Block>,
    tail: Arc<Block>,
    entropy: Box<dyn RandomSource>,
}

impl Blockchain {
    pub fn new() -> Self {
        Self::with_config(LedgerConfig::default(), entropy::os_source())
    }

    /// Build a ledger whose nonces come from `entropy`.
    pub fn with_config(config: LedgerConfig, entropy: Box<dyn RandomSource>) -> Self {
        let genesis = Arc::new(Block::genesis());
        debug!(created = %genesis.created_at(), "ledger initialized with genesis block");
        Self {
            config,
            inner: RwLock::new(ChainState {
                head: Arc::clone(&genesis),
                tail: genesis,
                entropy,
            }),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// An empty block whose tree follows this ledger's configuration and
    /// draws its keys from a generator seeded by the ledger's source.
    pub fn new_block(&self) -> Result<Block, LedgerError> {
        let seed: [u8; 32] = {
            let mut state = self.write()?;
            draw_array(state.entropy.as_mut()).map_err(|e| {
                warn!(error = %e, "random source failed while seeding a block tree");
                LedgerError::from(e)
            })?
        };
        Ok(Block::from_tree(HashTree::with_config(
            self.config.tree.clone(),
            Box::new(StdRng::from_seed(seed)),
        )))
    }

    /// Re-derive every link from genesis forward and check every block's
    /// tree.
    pub fn validate_chain(&self) -> Result<(), LedgerError> {
        let mut blocks = self.blocks()?;
        blocks.reverse();

        for (index, block) in blocks.iter().enumerate() {
            block
                .tree()
                .verify()
                .map_err(|e| LedgerError::ChainIntegrity {
                    index,
                    reason: e.to_string(),
                })?;
        }

        ChainVerifier::verify_chain(&blocks)?;
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, ChainState>, LedgerError> {
        self.inner.read().map_err(|_| LedgerError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, ChainState>, LedgerError> {
        self.inner.write().map_err(|_| LedgerError::LockPoisoned)
    }
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerWriter for Blockchain {
    fn append(&self, mut block: Block) -> Result<(), AppendError> {
        if block.prev_link().is_some() {
            return Err(AppendError::new(LedgerError::AlreadyLinked, block));
        }

        let mut state = match self.write() {
            Ok(state) => state,
            Err(e) => return Err(AppendError::new(e, block)),
        };

        let nonce: Nonce = match draw_array(state.entropy.as_mut()) {
            Ok(nonce) => nonce,
            Err(e) => {
                warn!(error = %e, "random source failed while drawing a chain nonce");
                return Err(AppendError::new(e.into(), block));
            }
        };

        let prev = Arc::clone(&state.tail);
        let link = LinkHasher::link(&prev.created_at(), prev.root_digest().as_ref(), &nonce);
        block.link(prev, link, nonce);

        debug!(
            link = %link.short_hex(),
            txns = block.len(),
            "appended block"
        );
        state.tail = Arc::new(block);
        Ok(())
    }
}

impl LedgerReader for Blockchain {
    fn length(&self) -> Result<usize, LedgerError> {
        let state = self.read()?;
        let mut count = 0;
        let mut current = Some(&state.tail);
        while let Some(block) = current {
            count += 1;
            current = block.prev();
        }
        Ok(count)
    }

    fn head(&self) -> Result<Arc<Block>, LedgerError> {
        Ok(Arc::clone(&self.read()?.head))
    }

    fn tail(&self) -> Result<Arc<Block>, LedgerError> {
        Ok(Arc::clone(&self.read()?.tail))
    }

    fn blocks(&self) -> Result<Vec<Arc<Block>>, LedgerError> {
        let state = self.read()?;
        let mut out = Vec::new();
        let mut current = Some(&state.tail);
        while let Some(block) = current {
            out.push(Arc::clone(block));
            current = block.prev();
        }
        Ok(out)
    }
}

impl fmt::Debug for Blockchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blockchain")
            .field("config", &self.config)
            .field("length", &self.length().ok())
            .finish()
    }
}

/// Renders the chain newest first, one block per segment.
impl fmt::Display for Blockchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let blocks = self.blocks().map_err(|_| fmt::Error)?;
        for (i, block) in blocks.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{block}")?;
        }
        Ok(())
    }
}
