use std::sync::Arc;

use tradesim_types::{Digest, Timestamp};

use crate::hasher::ContentHasher;

/// Width in bytes of a chain nonce.
pub const NONCE_LEN: usize = 32;

/// Random value mixed into each chain link.
pub type Nonce = [u8; NONCE_LEN];

/// Derivation of the hash pointer from a block to its predecessor.
pub struct LinkHasher;

impl LinkHasher {
    /// `Hash(created_at ++ root_digest ++ nonce)` of the predecessor.
    ///
    /// An empty predecessor tree has no root digest and contributes nothing.
    pub fn link(created_at: &Timestamp, root_digest: Option<&Digest>, nonce: &Nonce) -> Digest {
        let created = created_at.to_bytes();
        let root = root_digest.map(|d| d.as_bytes().as_slice()).unwrap_or(&[]);
        ContentHasher::LINK.hash_parts(&[&created, root, nonce])
    }
}

/// Trait for records that participate in a linked chain.
pub trait ChainedRecord {
    /// Creation stamp of the record.
    fn created_at(&self) -> Timestamp;
    /// Root digest of the record's contents (None when empty).
    fn root_digest(&self) -> Option<Digest>;
    /// Hash pointer to the predecessor (the zero sentinel for genesis).
    fn prev_link(&self) -> Option<Digest>;
    /// Nonce used to derive `prev_link` (None for genesis).
    fn nonce(&self) -> Option<Nonce>;
}

impl<T: ChainedRecord + ?Sized> ChainedRecord for Arc<T> {
    fn created_at(&self) -> Timestamp {
        (**self).created_at()
    }
    fn root_digest(&self) -> Option<Digest> {
        (**self).root_digest()
    }
    fn prev_link(&self) -> Option<Digest> {
        (**self).prev_link()
    }
    fn nonce(&self) -> Option<Nonce> {
        (**self).nonce()
    }
}

/// Chain integrity verifier.
///
/// Verifies that a sequence of records, ordered genesis first, forms a valid
/// chain: the genesis link is the zero sentinel, and every later link equals
/// the re-derivation from its predecessor and the recorded nonce.
pub struct ChainVerifier;

impl ChainVerifier {
    /// Verify a chain of records ordered genesis first.
    pub fn verify_chain(records: &[impl ChainedRecord]) -> Result<(), ChainError> {
        let Some(genesis) = records.first() else {
            return Ok(());
        };

        if genesis.prev_link() != Some(Digest::zero()) {
            return Err(ChainError::GenesisLinkNotZero);
        }

        for (index, pair) in records.windows(2).enumerate() {
            let (prev, record) = (&pair[0], &pair[1]);
            let index = index + 1;
            let link = record.prev_link().ok_or(ChainError::MissingLink { index })?;
            let nonce = record.nonce().ok_or(ChainError::MissingNonce { index })?;

            let expected = LinkHasher::link(&prev.created_at(), prev.root_digest().as_ref(), &nonce);
            if expected != link {
                return Err(ChainError::BrokenLink { index });
            }
        }

        Ok(())
    }
}

/// Errors from chain verification.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("genesis record does not carry the zero link sentinel")]
    GenesisLinkNotZero,

    #[error("missing link at index {index} (should reference previous record)")]
    MissingLink { index: usize },

    #[error("missing nonce at index {index}")]
    MissingNonce { index: usize },

    #[error("broken link at index {index}: re-derived link does not match")]
    BrokenLink { index: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test record for chain verification.
    struct TestRecord {
        created_at: Timestamp,
        root: Option<Digest>,
        prev_link: Option<Digest>,
        nonce: Option<Nonce>,
    }

    impl ChainedRecord for TestRecord {
        fn created_at(&self) -> Timestamp {
            self.created_at
        }
        fn root_digest(&self) -> Option<Digest> {
            self.root
        }
        fn prev_link(&self) -> Option<Digest> {
            self.prev_link
        }
        fn nonce(&self) -> Option<Nonce> {
            self.nonce
        }
    }

    fn build_chain(count: usize) -> Vec<TestRecord> {
        let mut chain: Vec<TestRecord> = Vec::new();

        for i in 0..count {
            let created_at = Timestamp::new(1_000 + i as u64, 0);
            let root = (i > 0).then(|| ContentHasher::TXN.hash(&[i as u8]));
            let (prev_link, nonce) = match chain.last() {
                None => (Some(Digest::zero()), None),
                Some(prev) => {
                    let nonce = [i as u8; NONCE_LEN];
                    let link = LinkHasher::link(&prev.created_at, prev.root.as_ref(), &nonce);
                    (Some(link), Some(nonce))
                }
            };
            chain.push(TestRecord {
                created_at,
                root,
                prev_link,
                nonce,
            });
        }

        chain
    }

    #[test]
    fn empty_chain_is_valid() {
        let chain: Vec<TestRecord> = vec![];
        assert!(ChainVerifier::verify_chain(&chain).is_ok());
    }

    #[test]
    fn genesis_only_chain() {
        assert!(ChainVerifier::verify_chain(&build_chain(1)).is_ok());
    }

    #[test]
    fn multi_record_chain() {
        assert!(ChainVerifier::verify_chain(&build_chain(10)).is_ok());
    }

    #[test]
    fn link_is_deterministic_for_same_inputs() {
        let ts = Timestamp::new(7, 7);
        let root = ContentHasher::TXN.hash(b"root");
        let nonce = [5; NONCE_LEN];
        assert_eq!(
            LinkHasher::link(&ts, Some(&root), &nonce),
            LinkHasher::link(&ts, Some(&root), &nonce)
        );
    }

    #[test]
    fn nonce_changes_link() {
        let ts = Timestamp::new(7, 7);
        let root = ContentHasher::TXN.hash(b"root");
        assert_ne!(
            LinkHasher::link(&ts, Some(&root), &[1; NONCE_LEN]),
            LinkHasher::link(&ts, Some(&root), &[2; NONCE_LEN])
        );
    }

    #[test]
    fn missing_root_contributes_nothing() {
        let ts = Timestamp::new(7, 7);
        let nonce = [5; NONCE_LEN];
        let expected = ContentHasher::LINK.hash_parts(&[&ts.to_bytes(), &nonce]);
        assert_eq!(LinkHasher::link(&ts, None, &nonce), expected);
    }

    #[test]
    fn genesis_without_sentinel_fails() {
        let mut chain = build_chain(2);
        chain[0].prev_link = Some(Digest::from_hash([1; 32]));
        let err = ChainVerifier::verify_chain(&chain).unwrap_err();
        assert_eq!(err, ChainError::GenesisLinkNotZero);
    }

    #[test]
    fn broken_link_detected() {
        let mut chain = build_chain(3);
        chain[2].prev_link = Some(Digest::from_hash([99; 32]));
        let err = ChainVerifier::verify_chain(&chain).unwrap_err();
        assert_eq!(err, ChainError::BrokenLink { index: 2 });
    }

    #[test]
    fn missing_link_and_nonce_detected() {
        let mut chain = build_chain(3);
        chain[1].prev_link = None;
        assert_eq!(
            ChainVerifier::verify_chain(&chain).unwrap_err(),
            ChainError::MissingLink { index: 1 }
        );

        let mut chain = build_chain(3);
        chain[2].nonce = None;
        assert_eq!(
            ChainVerifier::verify_chain(&chain).unwrap_err(),
            ChainError::MissingNonce { index: 2 }
        );
    }

    #[test]
    fn tampered_predecessor_detected() {
        let mut chain = build_chain(3);
        chain[1].root = Some(ContentHasher::TXN.hash(b"rewritten"));
        let err = ChainVerifier::verify_chain(&chain).unwrap_err();
        assert_eq!(err, ChainError::BrokenLink { index: 2 });
    }
}
