//! Foundation types for the tradesim ledger.
//!
//! Every other tradesim crate depends on `tradesim-types`.
//!
//! # Key Types
//!
//! - [`Digest`]: Fixed-width content digest (BLAKE3 output)
//! - [`Timestamp`]: Nanosecond wall-clock stamp with a canonical byte form
//! - [`Transaction`]: Capability set (`digest`, `kind`) of a ledger entry
//! - [`TxnKind`]: Transaction category

pub mod digest;
pub mod error;
pub mod timestamp;
pub mod txn;

pub use digest::{Digest, DIGEST_LEN};
pub use error::TypeError;
pub use timestamp::Timestamp;
pub use txn::{Transaction, TxnKind};
