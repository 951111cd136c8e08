use serde::{Deserialize, Serialize};
use tradesim_types::Digest;

use crate::hasher::ContentHasher;

/// Side of a sibling in an inclusion proof path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

/// Digest of an internal hash-tree node.
///
/// `Hash(left ++ right)` over the children that are present; a missing child
/// contributes nothing. A node with no children has no digest.
pub fn node_digest(left: Option<&Digest>, right: Option<&Digest>) -> Option<Digest> {
    match (left, right) {
        (None, None) => None,
        (l, r) => {
            let l = l.map(|d| d.as_bytes().as_slice()).unwrap_or(&[]);
            let r = r.map(|d| d.as_bytes().as_slice()).unwrap_or(&[]);
            Some(ContentHasher::NODE.hash_parts(&[l, r]))
        }
    }
}

/// Hash-tree inclusion proof.
///
/// Proves that a transaction digest is a leaf of a tree with the given root
/// without access to the tree itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionProof {
    /// The leaf being proven.
    pub leaf: Digest,
    /// Path of (sibling_digest, sibling_side) pairs from leaf to root.
    pub path: Vec<(Digest, Side)>,
    /// Expected root digest.
    pub root: Digest,
}

impl InclusionProof {
    /// Recompute the root from the leaf and path.
    pub fn computed_root(&self) -> Digest {
        self.path.iter().fold(self.leaf, |current, (sibling, side)| {
            let parent = match side {
                Side::Left => node_digest(Some(sibling), Some(&current)),
                Side::Right => node_digest(Some(&current), Some(sibling)),
            };
            // Both children present: node_digest always yields a value.
            parent.unwrap_or(current)
        })
    }

    /// Verify the proof against its recorded root.
    pub fn verify(&self) -> bool {
        self.computed_root() == self.root
    }

    /// Number of levels between the leaf and the root.
    pub fn depth(&self) -> usize {
        self.path.len()
    }
}
