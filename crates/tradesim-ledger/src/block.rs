use std::fmt;
use std::sync::Arc;

use tradesim_crypto::{ChainedRecord, LinkHasher, Nonce, RandomSource};
use tradesim_types::{Digest, Timestamp, Transaction};

use crate::config::TreeConfig;
use crate::error::LedgerError;
use crate::tree::HashTree;

/// A block: one hash tree of transactions plus its link to the predecessor.
///
/// A block is built and filled by a single producer, then handed to
/// [`LedgerWriter::append`](crate::traits::LedgerWriter::append), which sets
/// the link fields. Once appended it sits behind an `Arc` and can no longer
/// be mutated.
pub struct Block {
    created_at: Timestamp,
    tree: HashTree,
    prev_link: Option<Digest>,
    nonce: Option<Nonce>,
    prev: Option<Arc<Block>>,
}

impl Block {
    /// A block holding no transactions yet.
    pub fn empty() -> Self {
        Self::from_tree(HashTree::new())
    }

    /// An empty block whose tree draws its keys from `entropy`.
    pub fn with_config(config: TreeConfig, entropy: Box<dyn RandomSource>) -> Self {
        Self::from_tree(HashTree::with_config(config, entropy))
    }

    /// A block holding a single transaction.
    pub fn new<T: Transaction + 'static>(txn: T) -> Result<Self, LedgerError> {
        let mut block = Self::empty();
        block.insert(txn)?;
        Ok(block)
    }

    /// A block holding every transaction of `txns`.
    pub fn from_transactions<I, T>(txns: I) -> Result<Self, LedgerError>
    where
        I: IntoIterator<Item = T>,
        T: Transaction + 'static,
    {
        let mut block = Self::empty();
        for txn in txns {
            block.insert(txn)?;
        }
        Ok(block)
    }

    /// Wrap an existing tree, stamping the creation time now.
    pub fn from_tree(tree: HashTree) -> Self {
        Self {
            created_at: Timestamp::now(),
            tree,
            prev_link: None,
            nonce: None,
            prev: None,
        }
    }

    pub(crate) fn genesis() -> Self {
        let mut block = Self::empty();
        block.prev_link = Some(Digest::zero());
        block
    }

    pub fn insert<T: Transaction + 'static>(&mut self, txn: T) -> Result<(), LedgerError> {
        self.tree.insert(txn)
    }

    pub fn insert_shared(&mut self, txn: Arc<dyn Transaction>) -> Result<(), LedgerError> {
        self.tree.insert_shared(txn)
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn tree(&self) -> &HashTree {
        &self.tree
    }

    /// Number of transactions in the block.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn root_digest(&self) -> Option<Digest> {
        self.tree.root_digest()
    }

    /// Hash pointer to the predecessor; zero for genesis, `None` until
    /// appended.
    pub fn prev_link(&self) -> Option<Digest> {
        self.prev_link
    }

    /// Nonce mixed into `prev_link`; `None` for genesis and unappended
    /// blocks.
    pub fn nonce(&self) -> Option<Nonce> {
        self.nonce
    }

    /// The predecessor block, absent for genesis.
    pub fn prev(&self) -> Option<&Arc<Block>> {
        self.prev.as_ref()
    }

    pub fn is_genesis(&self) -> bool {
        self.prev.is_none() && self.prev_link == Some(Digest::zero())
    }

    /// Re-derive this block's link from its predecessor and recorded nonce.
    pub fn derive_link(&self) -> Option<Digest> {
        let prev = self.prev.as_ref()?;
        let nonce = self.nonce.as_ref()?;
        Some(LinkHasher::link(
            &prev.created_at,
            prev.root_digest().as_ref(),
            nonce,
        ))
    }

    pub(crate) fn link(&mut self, prev: Arc<Block>, prev_link: Digest, nonce: Nonce) {
        self.prev = Some(prev);
        self.prev_link = Some(prev_link);
        self.nonce = Some(nonce);
    }
}

impl ChainedRecord for Block {
    fn created_at(&self) -> Timestamp {
        self.created_at
    }
    fn root_digest(&self) -> Option<Digest> {
        self.tree.root_digest()
    }
    fn prev_link(&self) -> Option<Digest> {
        self.prev_link
    }
    fn nonce(&self) -> Option<Nonce> {
        self.nonce
    }
}

// Unlink predecessors one at a time so a long chain is not dropped
// recursively.
impl Drop for Block {
    fn drop(&mut self) {
        let mut prev = self.prev.take();
        while let Some(block) = prev {
            match Arc::try_unwrap(block) {
                Ok(mut inner) => prev = inner.prev.take(),
                Err(_) => break,
            }
        }
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("created_at", &self.created_at)
            .field("tree", &self.tree)
            .field("prev_link", &self.prev_link)
            .finish()
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = if self.is_genesis() { "genesis" } else { "block" };
        let root = self
            .root_digest()
            .map(|d| d.short_hex())
            .unwrap_or_else(|| "-".into());
        let prev = self
            .prev_link
            .map(|d| d.short_hex())
            .unwrap_or_else(|| "unlinked".into());
        write!(
            f,
            "[{label} created={} txns={} root={root} prev={prev}]",
            self.created_at,
            self.len()
        )
    }
}
