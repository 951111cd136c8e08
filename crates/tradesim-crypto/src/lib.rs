//! Cryptographic primitives for the tradesim ledger.
//!
//! Provides domain-separated BLAKE3 hashing, the injectable randomness
//! provider used for tree keys and chain nonces, hash-tree inclusion proofs,
//! and chain-link derivation and verification.
//!
//! All crypto operations wrap established libraries; there is no custom
//! cryptography.

pub mod chain;
pub mod entropy;
pub mod hasher;
pub mod merkle;

pub use chain::{ChainError, ChainVerifier, ChainedRecord, LinkHasher, Nonce, NONCE_LEN};
pub use entropy::{EntropyError, RandomSource};
pub use hasher::{ContentHasher, HasherError};
pub use merkle::{InclusionProof, Side};
