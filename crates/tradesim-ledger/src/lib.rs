//! Block ledger for the tradesim market.
//!
//! This crate provides:
//! - [`HashTree`], a red-black balanced hash tree over random placement keys
//!   holding the transactions of one block
//! - [`Block`] and [`Blockchain`], an append-only chain of blocks linked by
//!   nonce-salted hash pointers
//! - `LedgerWriter` / `LedgerReader` trait boundaries
//! - [`TradeRequest`] and [`Trade`], the payloads the market records

pub mod block;
pub mod blockchain;
pub mod config;
pub mod error;
pub mod node;
pub mod trade;
pub mod traits;
pub mod tree;

pub use block::Block;
pub use blockchain::Blockchain;
pub use config::{LedgerConfig, TreeConfig};
pub use error::{AppendError, LedgerError};
pub use node::{Color, HashNode, NodeId, NodeKey};
pub use trade::{Asset, Ccy, Trade, TradeRequest, TraderId};
pub use traits::{LedgerReader, LedgerWriter};
pub use tree::HashTree;
