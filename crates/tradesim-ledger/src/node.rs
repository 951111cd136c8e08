//! Hash-tree nodes and the arena handles that link them.

use std::fmt;
use std::sync::Arc;

use tradesim_types::{Digest, Transaction};

/// Handle of a node inside its tree's arena.
///
/// Handles are only meaningful for the tree that issued them. A parent link
/// is a plain handle, never a second owner: the arena owns every node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

/// Random placement key.
///
/// Transactions have no natural order, so each node draws a 128-bit key and
/// the tree is a binary search tree over those keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(pub u128);

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Color of the link from a node to its parent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Color {
    Red,
    Black,
}

/// A node of a [`HashTree`](crate::tree::HashTree).
///
/// Either a leaf holding one transaction (no children, always black) or an
/// internal digest node whose digest aggregates its children.
#[derive(Clone)]
pub struct HashNode {
    pub(crate) key: NodeKey,
    pub(crate) digest: Option<Digest>,
    pub(crate) color: Color,
    pub(crate) parent: Option<NodeId>,
    pub(crate) left: Option<NodeId>,
    pub(crate) right: Option<NodeId>,
    pub(crate) txn: Option<Arc<dyn Transaction>>,
}

impl HashNode {
    /// The childless, digest-less root of an empty tree.
    pub(crate) fn placeholder(key: NodeKey) -> Self {
        Self {
            key,
            digest: None,
            color: Color::Black,
            parent: None,
            left: None,
            right: None,
            txn: None,
        }
    }

    pub(crate) fn leaf(key: NodeKey, txn: Arc<dyn Transaction>) -> Self {
        Self {
            key,
            digest: Some(txn.digest()),
            color: Color::Black,
            parent: None,
            left: None,
            right: None,
            txn: Some(txn),
        }
    }

    /// Split node installed where a leaf used to be. Starts red: it is the
    /// new link the red-black fixup has to absorb.
    pub(crate) fn internal(key: NodeKey) -> Self {
        Self {
            key,
            digest: None,
            color: Color::Red,
            parent: None,
            left: None,
            right: None,
            txn: None,
        }
    }

    pub fn key(&self) -> NodeKey {
        self.key
    }

    /// Node digest. `None` only for the placeholder root of an empty tree.
    pub fn digest(&self) -> Option<Digest> {
        self.digest
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn is_red(&self) -> bool {
        self.color == Color::Red
    }

    /// Returns `true` if this node holds a transaction.
    pub fn is_leaf(&self) -> bool {
        self.txn.is_some()
    }

    pub fn transaction(&self) -> Option<&Arc<dyn Transaction>> {
        self.txn.as_ref()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn left(&self) -> Option<NodeId> {
        self.left
    }

    pub fn right(&self) -> Option<NodeId> {
        self.right
    }

    pub(crate) fn child_count(&self) -> usize {
        usize::from(self.left.is_some()) + usize::from(self.right.is_some())
    }
}

impl fmt::Debug for HashNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashNode")
            .field("key", &self.key)
            .field("digest", &self.digest)
            .field("color", &self.color)
            .field("leaf", &self.is_leaf())
            .finish()
    }
}
