//! Self-balancing hash tree of transactions.
//!
//! [`HashTree`] is a binary search tree over random [`NodeKey`]s whose leaves
//! hold transactions and whose internal nodes hold the digest of their
//! children. Balance follows the left-leaning red-black rules, with leaves
//! playing the part of the black null links.
//!
//! # Invariants
//!
//! - A leaf has no children; every internal node has exactly two children
//!   once the tree holds a transaction.
//! - Left subtree keys < node key < right subtree keys.
//! - No red right link, no two red links in a row, and the same number of
//!   black links on every root-to-leaf path.
//! - Every internal digest is `Hash(left ++ right)` of its current children.
//!
//! Nodes live in an arena owned by the tree; links are [`NodeId`] handles.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use tradesim_crypto::entropy::{self, draw_between, draw_u128};
use tradesim_crypto::merkle::node_digest;
use tradesim_crypto::{InclusionProof, RandomSource, Side};
use tradesim_types::{Digest, Transaction};

use crate::config::TreeConfig;
use crate::error::LedgerError;
use crate::node::{Color, HashNode, NodeId, NodeKey};

/// Where a new leaf goes, decided before the tree is touched.
enum Target {
    /// The tree is empty: the leaf becomes the root.
    EmptyRoot,
    /// Split `leaf` under a new internal node keyed `split_key`.
    Split { leaf: NodeId, split_key: NodeKey },
}

struct Placement {
    leaf_key: NodeKey,
    target: Target,
    attempts: u32,
}

/// Balanced hash tree of the transactions in one block.
pub struct HashTree {
    nodes: Vec<HashNode>,
    root: NodeId,
    size: usize,
    config: TreeConfig,
    entropy: Box<dyn RandomSource>,
}

impl HashTree {
    /// Create an empty tree using the OS random source.
    pub fn new() -> Self {
        Self::with_config(TreeConfig::default(), entropy::os_source())
    }

    /// Create an empty tree with explicit configuration and random source.
    pub fn with_config(config: TreeConfig, entropy: Box<dyn RandomSource>) -> Self {
        Self {
            nodes: vec![HashNode::placeholder(NodeKey(0))],
            root: NodeId(0),
            size: 0,
            config,
            entropy,
        }
    }

    /// Number of transactions in the tree.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Digest of the root, `None` while the tree is empty.
    pub fn root_digest(&self) -> Option<Digest> {
        self.nodes[self.root.0].digest
    }

    pub fn root_id(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&HashNode> {
        self.nodes.get(id.0)
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Insert a transaction as a new leaf.
    pub fn insert<T: Transaction + 'static>(&mut self, txn: T) -> Result<(), LedgerError> {
        self.insert_shared(Arc::new(txn))
    }

    /// Insert an already shared transaction as a new leaf.
    ///
    /// All randomness is drawn before the tree is modified, so a failed
    /// insert leaves the tree exactly as it was.
    pub fn insert_shared(&mut self, txn: Arc<dyn Transaction>) -> Result<(), LedgerError> {
        let placement = self.place()?;

        match placement.target {
            Target::EmptyRoot => {
                self.nodes[self.root.0] = HashNode::leaf(placement.leaf_key, txn);
            }
            Target::Split { leaf, split_key } => {
                let split = self.split_leaf(leaf, split_key, placement.leaf_key, txn)?;
                self.rebalance_from(split)?;
            }
        }

        self.size += 1;
        debug!(
            size = self.size,
            attempts = placement.attempts,
            root = %self.root_digest().map(|d| d.short_hex()).unwrap_or_default(),
            "inserted transaction"
        );
        Ok(())
    }

    // ---------------------------------------------------------------
    // Placement
    // ---------------------------------------------------------------

    fn place(&mut self) -> Result<Placement, LedgerError> {
        let budget = self.config.attempts();

        for attempt in 1..=budget {
            let leaf_key = NodeKey(draw_u128(self.entropy.as_mut()).map_err(randomness)?);

            if self.is_empty() {
                return Ok(Placement {
                    leaf_key,
                    target: Target::EmptyRoot,
                    attempts: attempt,
                });
            }

            let Some(leaf) = self.descend(leaf_key)? else {
                continue;
            };

            let existing = self.nodes[leaf.0].key;
            let split = draw_between(self.entropy.as_mut(), existing.0, leaf_key.0)
                .map_err(randomness)?;
            if let Some(split) = split {
                return Ok(Placement {
                    leaf_key,
                    target: Target::Split {
                        leaf,
                        split_key: NodeKey(split),
                    },
                    attempts: attempt,
                });
            }
        }

        warn!(attempts = budget, "placement key budget exhausted");
        Err(LedgerError::KeyCollisionExhausted { attempts: budget })
    }

    /// Walk from the root to the leaf whose slot `key` falls into.
    ///
    /// Returns `None` when `key` equals a key on the path.
    fn descend(&self, key: NodeKey) -> Result<Option<NodeId>, LedgerError> {
        let mut current = self.root;
        loop {
            let node = &self.nodes[current.0];
            if node.key == key {
                return Ok(None);
            }
            if node.is_leaf() {
                return Ok(Some(current));
            }
            let next = if key < node.key { node.left } else { node.right };
            current = next.ok_or_else(|| {
                structural(format!("internal node {} is missing a child", node.key))
            })?;
        }
    }

    /// Replace `leaf` with a new red internal node holding `leaf` and a new
    /// leaf for `txn` as its children.
    fn split_leaf(
        &mut self,
        leaf: NodeId,
        split_key: NodeKey,
        leaf_key: NodeKey,
        txn: Arc<dyn Transaction>,
    ) -> Result<NodeId, LedgerError> {
        let parent = self.nodes[leaf.0].parent;
        let split = self.alloc(HashNode::internal(split_key));
        if let Err(err) = self.replace_child(parent, leaf, split) {
            self.nodes.pop();
            return Err(err);
        }

        let fresh = self.alloc(HashNode::leaf(leaf_key, txn));
        let (left, right) = if self.nodes[leaf.0].key < leaf_key {
            (leaf, fresh)
        } else {
            (fresh, leaf)
        };
        self.nodes[split.0].left = Some(left);
        self.nodes[split.0].right = Some(right);
        self.nodes[left.0].parent = Some(split);
        self.nodes[right.0].parent = Some(split);
        Ok(split)
    }

    fn alloc(&mut self, node: HashNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    /// Put `new` where `old` hangs under `parent` (or at the root).
    fn replace_child(
        &mut self,
        parent: Option<NodeId>,
        old: NodeId,
        new: NodeId,
    ) -> Result<(), LedgerError> {
        match parent {
            None => {
                if self.root != old {
                    return Err(structural("parentless node is not the root".into()));
                }
                self.root = new;
            }
            Some(p) => {
                let node = &mut self.nodes[p.0];
                if node.left == Some(old) {
                    node.left = Some(new);
                } else if node.right == Some(old) {
                    node.right = Some(new);
                } else {
                    return Err(structural(format!(
                        "node {} does not list its child",
                        node.key
                    )));
                }
            }
        }
        self.nodes[new.0].parent = parent;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Balancing and rehashing
    // ---------------------------------------------------------------

    /// Walk from `start` to the root, rehashing each node and applying the
    /// left-leaning red-black fixups.
    fn rebalance_from(&mut self, start: NodeId) -> Result<(), LedgerError> {
        let mut current = start;
        loop {
            self.refresh(current);

            let mut top = current;
            if self.is_red(self.nodes[top.0].right) && !self.is_red(self.nodes[top.0].left) {
                top = self.rotate_left(top)?;
            }
            let left = self.nodes[top.0].left;
            if self.is_red(left) && self.is_red(left.and_then(|l| self.nodes[l.0].left)) {
                top = self.rotate_right(top)?;
            }
            if self.is_red(self.nodes[top.0].left) && self.is_red(self.nodes[top.0].right) {
                self.flip_colors(top);
            }

            match self.nodes[top.0].parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        self.nodes[self.root.0].color = Color::Black;
        Ok(())
    }

    fn is_red(&self, id: Option<NodeId>) -> bool {
        id.is_some_and(|id| self.nodes[id.0].is_red())
    }

    /// Recompute an internal node's digest from its current children.
    fn refresh(&mut self, id: NodeId) {
        let node = &self.nodes[id.0];
        if node.is_leaf() {
            return;
        }
        let left = node.left.and_then(|l| self.nodes[l.0].digest);
        let right = node.right.and_then(|r| self.nodes[r.0].digest);
        self.nodes[id.0].digest = node_digest(left.as_ref(), right.as_ref());
    }

    fn rotate_left(&mut self, h: NodeId) -> Result<NodeId, LedgerError> {
        let x = self.nodes[h.0]
            .right
            .ok_or_else(|| structural("rotate left without a right child".into()))?;
        if self.nodes[x.0].is_leaf() {
            return Err(structural("rotate left onto a leaf".into()));
        }
        let parent = self.nodes[h.0].parent;
        self.replace_child(parent, h, x)?;

        let inner = self.nodes[x.0].left;
        self.nodes[h.0].right = inner;
        if let Some(c) = inner {
            self.nodes[c.0].parent = Some(h);
        }
        self.nodes[x.0].left = Some(h);
        self.nodes[h.0].parent = Some(x);

        self.nodes[x.0].color = self.nodes[h.0].color;
        self.nodes[h.0].color = Color::Red;

        self.refresh(h);
        self.refresh(x);
        Ok(x)
    }

    fn rotate_right(&mut self, h: NodeId) -> Result<NodeId, LedgerError> {
        let x = self.nodes[h.0]
            .left
            .ok_or_else(|| structural("rotate right without a left child".into()))?;
        if self.nodes[x.0].is_leaf() {
            return Err(structural("rotate right onto a leaf".into()));
        }
        let parent = self.nodes[h.0].parent;
        self.replace_child(parent, h, x)?;

        let inner = self.nodes[x.0].right;
        self.nodes[h.0].left = inner;
        if let Some(c) = inner {
            self.nodes[c.0].parent = Some(h);
        }
        self.nodes[x.0].right = Some(h);
        self.nodes[h.0].parent = Some(x);

        self.nodes[x.0].color = self.nodes[h.0].color;
        self.nodes[h.0].color = Color::Red;

        self.refresh(h);
        self.refresh(x);
        Ok(x)
    }

    fn flip_colors(&mut self, h: NodeId) {
        self.nodes[h.0].color = Color::Red;
        for child in [self.nodes[h.0].left, self.nodes[h.0].right].into_iter().flatten() {
            self.nodes[child.0].color = Color::Black;
        }
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    /// Number of links on the longest root-to-leaf path.
    pub fn height(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self.root, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            let node = &self.nodes[id.0];
            for child in [node.left, node.right].into_iter().flatten() {
                stack.push((child, depth + 1));
            }
        }
        deepest
    }

    /// Transactions in key order.
    pub fn leaves(&self) -> Vec<Arc<dyn Transaction>> {
        let mut out = Vec::with_capacity(self.size);
        let mut stack = Vec::new();
        let mut current = Some(self.root);
        while current.is_some() || !stack.is_empty() {
            while let Some(id) = current {
                stack.push(id);
                current = self.nodes[id.0].left;
            }
            if let Some(id) = stack.pop() {
                if let Some(txn) = &self.nodes[id.0].txn {
                    out.push(Arc::clone(txn));
                }
                current = self.nodes[id.0].right;
            }
        }
        out
    }

    /// Inclusion proof for a leaf carrying `digest`.
    pub fn proof(&self, digest: &Digest) -> Option<InclusionProof> {
        let root = self.root_digest()?;
        let leaf = self
            .nodes
            .iter()
            .position(|n| n.is_leaf() && n.digest.as_ref() == Some(digest))
            .map(NodeId)?;

        let mut path = Vec::new();
        let mut current = leaf;
        while let Some(parent) = self.nodes[current.0].parent {
            let p = &self.nodes[parent.0];
            let (sibling, side) = if p.left == Some(current) {
                (p.right?, Side::Right)
            } else {
                (p.left?, Side::Left)
            };
            path.push((self.nodes[sibling.0].digest?, side));
            current = parent;
        }

        Some(InclusionProof {
            leaf: *digest,
            path,
            root,
        })
    }

    /// Audit every structural, ordering, color, and digest invariant.
    pub fn verify(&self) -> Result<(), LedgerError> {
        let root = &self.nodes[self.root.0];
        if root.parent.is_some() {
            return Err(structural("root has a parent".into()));
        }

        if self.size == 0 {
            if root.child_count() != 0 || root.digest.is_some() || root.is_leaf() {
                return Err(structural("empty tree root is not a bare placeholder".into()));
            }
            return Ok(());
        }

        if root.is_red() {
            return Err(structural("root is red".into()));
        }

        let mut leaves = 0usize;
        let mut reached = 0usize;
        let mut black_depth: Option<usize> = None;
        // (node, exclusive lower bound, exclusive upper bound, black links so far)
        let mut stack = vec![(self.root, None::<NodeKey>, None::<NodeKey>, 0usize)];

        while let Some((id, low, high, blacks)) = stack.pop() {
            reached += 1;
            let node = &self.nodes[id.0];

            if low.is_some_and(|l| node.key <= l) || high.is_some_and(|h| node.key >= h) {
                return Err(structural(format!("key {} breaks search order", node.key)));
            }

            let blacks = if node.is_red() || id == self.root {
                blacks
            } else {
                blacks + 1
            };

            if let Some(txn) = &node.txn {
                if node.child_count() != 0 {
                    return Err(structural(format!("leaf {} has children", node.key)));
                }
                if node.is_red() {
                    return Err(structural(format!("leaf {} is red", node.key)));
                }
                if node.digest != Some(txn.digest()) {
                    return Err(structural(format!("leaf {} digest is stale", node.key)));
                }
                match black_depth {
                    None => black_depth = Some(blacks),
                    Some(depth) if depth != blacks => {
                        return Err(structural("unequal black depth across leaves".into()));
                    }
                    Some(_) => {}
                }
                leaves += 1;
                continue;
            }

            let (Some(left), Some(right)) = (node.left, node.right) else {
                return Err(structural(format!(
                    "internal node {} has {} child(ren)",
                    node.key,
                    node.child_count()
                )));
            };
            let (l, r) = (&self.nodes[left.0], &self.nodes[right.0]);

            if l.parent != Some(id) || r.parent != Some(id) {
                return Err(structural(format!("stale parent link under {}", node.key)));
            }
            if r.is_red() {
                return Err(structural(format!("red right link under {}", node.key)));
            }
            if node.is_red() && l.is_red() {
                return Err(structural(format!("two red links in a row at {}", node.key)));
            }
            if node.digest != node_digest(l.digest.as_ref(), r.digest.as_ref()) {
                return Err(structural(format!("digest of {} is stale", node.key)));
            }

            stack.push((left, low, Some(node.key), blacks));
            stack.push((right, Some(node.key), high, blacks));
        }

        if leaves != self.size {
            return Err(structural(format!(
                "size {} does not match {} leaves",
                self.size, leaves
            )));
        }
        if reached != self.nodes.len() {
            return Err(structural(format!(
                "{} of {} arena nodes are unreachable",
                self.nodes.len() - reached,
                self.nodes.len()
            )));
        }
        Ok(())
    }
}

impl Default for HashTree {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HashTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashTree")
            .field("size", &self.size)
            .field("height", &self.height())
            .field("root", &self.root_digest())
            .finish()
    }
}

fn structural(reason: String) -> LedgerError {
    LedgerError::StructuralInvariantViolation(reason)
}

fn randomness(err: entropy::EntropyError) -> LedgerError {
    warn!(error = %err, "random source failed during placement");
    LedgerError::from(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::{RngCore, SeedableRng};
    use tradesim_crypto::ContentHasher;
    use tradesim_types::TxnKind;

    #[derive(Debug)]
    struct TestTxn(Digest);

    impl TestTxn {
        fn new(seed: u64) -> Self {
            Self(ContentHasher::TXN.hash(&seed.to_be_bytes()))
        }
    }

    impl Transaction for TestTxn {
        fn digest(&self) -> Digest {
            self.0
        }
        fn kind(&self) -> TxnKind {
            TxnKind::TradeRequested
        }
    }

    /// Source that always yields the same bytes.
    struct Constant;

    impl RngCore for Constant {
        fn next_u32(&mut self) -> u32 {
            0
        }
        fn next_u64(&mut self) -> u64 {
            0
        }
        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(0);
        }
        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
            dest.fill(0);
            Ok(())
        }
    }

    /// Seeded source that fails once `remaining` fills are used up.
    struct Flaky {
        inner: StdRng,
        remaining: usize,
    }

    impl RngCore for Flaky {
        fn next_u32(&mut self) -> u32 {
            self.inner.next_u32()
        }
        fn next_u64(&mut self) -> u64 {
            self.inner.next_u64()
        }
        fn fill_bytes(&mut self, dest: &mut [u8]) {
            self.inner.fill_bytes(dest)
        }
        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
            if self.remaining == 0 {
                return Err(rand::Error::new("entropy pool drained"));
            }
            self.remaining -= 1;
            self.inner.try_fill_bytes(dest)
        }
    }

    fn seeded(seed: u64) -> HashTree {
        HashTree::with_config(TreeConfig::default(), Box::new(StdRng::seed_from_u64(seed)))
    }

    fn filled(seed: u64, count: u64) -> HashTree {
        let mut tree = seeded(seed);
        for i in 0..count {
            tree.insert(TestTxn::new(i)).unwrap();
        }
        tree
    }

    /// Independent recomputation of every digest, bottom-up.
    fn recompute(tree: &HashTree, id: NodeId) -> Option<Digest> {
        let node = tree.node(id).unwrap();
        if let Some(txn) = node.transaction() {
            return Some(txn.digest());
        }
        let left = node.left().and_then(|l| recompute(tree, l));
        let right = node.right().and_then(|r| recompute(tree, r));
        let mut parts: Vec<u8> = Vec::new();
        if let Some(l) = left {
            parts.extend_from_slice(l.as_bytes());
        }
        if let Some(r) = right {
            parts.extend_from_slice(r.as_bytes());
        }
        if parts.is_empty() {
            return None;
        }
        let expected = ContentHasher::NODE.hash(&parts);
        assert_eq!(node.digest(), Some(expected), "stale digest at {}", node.key());
        Some(expected)
    }

    /// Black-link counts of every root-to-leaf path.
    fn black_paths(tree: &HashTree) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack = vec![(tree.root_id(), 0usize)];
        while let Some((id, blacks)) = stack.pop() {
            let node = tree.node(id).unwrap();
            let blacks = if id != tree.root_id() && !node.is_red() {
                blacks + 1
            } else {
                blacks
            };
            if node.left().is_none() && node.right().is_none() {
                out.push(blacks);
            }
            for child in [node.left(), node.right()].into_iter().flatten() {
                stack.push((child, blacks));
            }
        }
        out
    }

    fn assert_shape(tree: &HashTree) {
        for id in (0..).map(NodeId).take_while(|id| tree.node(*id).is_some()) {
            let node = tree.node(id).unwrap();
            assert_ne!(node.child_count(), 1, "node {} has exactly one child", node.key());
            if let Some(right) = node.right() {
                assert!(!tree.node(right).unwrap().is_red(), "right-leaning red link");
            }
            if node.is_red() {
                if let Some(left) = node.left() {
                    assert!(!tree.node(left).unwrap().is_red(), "two consecutive red links");
                }
            }
        }
        let paths = black_paths(tree);
        assert!(paths.windows(2).all(|w| w[0] == w[1]), "unequal black paths: {paths:?}");
    }

    #[test]
    fn empty_tree_has_bare_root() {
        let tree = seeded(1);
        assert!(tree.is_empty());
        assert_eq!(tree.root_digest(), None);
        assert_eq!(tree.height(), 0);
        let root = tree.node(tree.root_id()).unwrap();
        assert!(!root.is_leaf());
        assert_eq!(root.child_count(), 0);
        tree.verify().unwrap();
    }

    #[test]
    fn first_transaction_becomes_the_root() {
        let mut tree = seeded(1);
        let txn = TestTxn::new(7);
        let digest = txn.digest();
        tree.insert(txn).unwrap();

        assert_eq!(tree.len(), 1);
        assert_eq!(tree.root_digest(), Some(digest));
        assert!(tree.node(tree.root_id()).unwrap().is_leaf());
        tree.verify().unwrap();
    }

    #[test]
    fn second_transaction_splits_the_root_leaf() {
        let mut tree = seeded(2);
        let (a, b) = (TestTxn::new(1), TestTxn::new(2));
        let (da, db) = (a.digest(), b.digest());
        tree.insert(a).unwrap();
        tree.insert(b).unwrap();

        let root = tree.node(tree.root_id()).unwrap();
        assert!(!root.is_leaf());
        assert_eq!(root.child_count(), 2);
        let left = tree.node(root.left().unwrap()).unwrap().digest().unwrap();
        let right = tree.node(root.right().unwrap()).unwrap().digest().unwrap();
        assert!((left, right) == (da, db) || (left, right) == (db, da));
        assert_eq!(root.digest(), node_digest(Some(&left), Some(&right)));
    }

    #[test]
    fn size_tracks_every_insert() {
        let mut tree = seeded(3);
        for i in 0..1000 {
            tree.insert(TestTxn::new(i)).unwrap();
            assert_eq!(tree.len(), i as usize + 1);
        }
    }

    #[test]
    fn invariants_hold_after_every_insert() {
        let mut tree = seeded(4);
        for i in 0..300 {
            tree.insert(TestTxn::new(i)).unwrap();
            tree.verify().unwrap();
            recompute(&tree, tree.root_id());
            assert_shape(&tree);
        }
    }

    #[test]
    fn five_inserts_stay_shallow_across_trials() {
        for seed in 0..200 {
            let tree = filled(seed, 5);
            assert_eq!(tree.len(), 5);
            // ceil(log2(5)) = 3
            assert!(tree.height() <= 3 + 3, "seed {seed}: height {}", tree.height());
        }
    }

    #[test]
    fn height_is_logarithmic() {
        let tree = filled(5, 1024);
        // Red-black bound: at most 2 * log2(leaves) links.
        assert!(tree.height() <= 2 * 10, "height {}", tree.height());
    }

    #[test]
    fn leaves_return_every_transaction() {
        let tree = filled(6, 50);
        let mut got: Vec<Digest> = tree.leaves().iter().map(|t| t.digest()).collect();
        let mut want: Vec<Digest> = (0..50).map(|i| TestTxn::new(i).digest()).collect();
        got.sort();
        want.sort();
        assert_eq!(got, want);
    }

    #[test]
    fn duplicate_transactions_are_separate_leaves() {
        let mut tree = seeded(7);
        tree.insert(TestTxn::new(1)).unwrap();
        tree.insert(TestTxn::new(1)).unwrap();
        assert_eq!(tree.len(), 2);
        tree.verify().unwrap();
        assert!(tree.proof(&TestTxn::new(1).digest()).unwrap().verify());
    }

    #[test]
    fn proofs_verify_for_every_leaf() {
        let tree = filled(8, 64);
        let root = tree.root_digest().unwrap();
        for i in 0..64 {
            let digest = TestTxn::new(i).digest();
            let proof = tree.proof(&digest).expect("leaf should be present");
            assert_eq!(proof.root, root);
            assert!(proof.verify(), "proof for leaf {i} should verify");
            assert!(proof.depth() <= tree.height());
        }
    }

    #[test]
    fn proof_for_missing_digest_is_none() {
        let tree = filled(9, 8);
        assert!(tree.proof(&TestTxn::new(1_000).digest()).is_none());
        assert!(seeded(9).proof(&TestTxn::new(1).digest()).is_none());
    }

    #[test]
    fn tampered_proof_fails() {
        let tree = filled(10, 16);
        let mut proof = tree.proof(&TestTxn::new(3).digest()).unwrap();
        proof.leaf = TestTxn::new(4).digest();
        assert!(!proof.verify());
    }

    #[test]
    fn randomness_failure_leaves_tree_unchanged() {
        // 1 draw for the first insert, 2 per later insert.
        let source = Flaky {
            inner: StdRng::seed_from_u64(11),
            remaining: 1 + 2 * 4 + 1,
        };
        let mut tree = HashTree::with_config(TreeConfig::default(), Box::new(source));
        for i in 0..5 {
            tree.insert(TestTxn::new(i)).unwrap();
        }
        let before = (tree.len(), tree.root_digest(), tree.height());

        let err = tree.insert(TestTxn::new(99)).unwrap_err();
        assert!(matches!(err, LedgerError::RandomnessFailure(msg) if msg.contains("drained")));
        assert_eq!((tree.len(), tree.root_digest(), tree.height()), before);
        tree.verify().unwrap();
    }

    #[test]
    fn key_collisions_exhaust_the_budget() {
        let config = TreeConfig { max_key_retries: 4 };
        let mut tree = HashTree::with_config(config, Box::new(Constant));
        tree.insert(TestTxn::new(1)).unwrap();
        let root = tree.root_digest();

        let err = tree.insert(TestTxn::new(2)).unwrap_err();
        assert_eq!(err, LedgerError::KeyCollisionExhausted { attempts: 4 });
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.root_digest(), root);
        tree.verify().unwrap();
    }

    #[test]
    fn verify_detects_stale_digest() {
        let mut tree = filled(12, 10);
        let root = tree.root_id();
        tree.nodes[root.0].digest = Some(Digest::zero());
        assert!(matches!(
            tree.verify(),
            Err(LedgerError::StructuralInvariantViolation(reason)) if reason.contains("stale")
        ));
    }

    #[test]
    fn verify_detects_red_right_link() {
        let mut tree = filled(13, 10);
        let root = tree.root_id();
        let right = tree.nodes[root.0].right.unwrap();
        tree.nodes[right.0].color = Color::Red;
        assert!(tree.verify().is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn any_insert_sequence_keeps_invariants(seed in any::<u64>(), count in 0u64..120) {
            let tree = filled(seed, count);
            prop_assert_eq!(tree.len() as u64, count);
            prop_assert!(tree.verify().is_ok());
            recompute(&tree, tree.root_id());
            assert_shape(&tree);
        }
    }
}
