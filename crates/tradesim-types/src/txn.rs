use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::digest::Digest;

/// Category of a recorded transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxnKind {
    /// A trader asked a counterparty for a trade.
    TradeRequested,
    /// Both sides accepted and the trade was executed.
    TradeExecuted,
}

impl fmt::Display for TxnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TradeRequested => write!(f, "TradeRequested"),
            Self::TradeExecuted => write!(f, "TradeExecuted"),
        }
    }
}

/// Capability set every ledger entry must provide.
///
/// The ledger never looks past these two methods: a transaction is opaque
/// apart from its digest and its kind. Implementations must be immutable,
/// so `digest` returns the same value for the lifetime of the value.
pub trait Transaction: fmt::Debug + Send + Sync {
    /// Content digest of the transaction.
    fn digest(&self) -> Digest;

    /// The transaction's category.
    fn kind(&self) -> TxnKind;
}

impl<T: Transaction + ?Sized> Transaction for Arc<T> {
    fn digest(&self) -> Digest {
        (**self).digest()
    }

    fn kind(&self) -> TxnKind {
        (**self).kind()
    }
}

impl<T: Transaction + ?Sized> Transaction for Box<T> {
    fn digest(&self) -> Digest {
        (**self).digest()
    }

    fn kind(&self) -> TxnKind {
        (**self).kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Fixed(u8);

    impl Transaction for Fixed {
        fn digest(&self) -> Digest {
            Digest::from_hash([self.0; 32])
        }

        fn kind(&self) -> TxnKind {
            TxnKind::TradeRequested
        }
    }

    #[test]
    fn shared_handles_forward_capabilities() {
        let shared: Arc<dyn Transaction> = Arc::new(Fixed(4));
        assert_eq!(shared.digest(), Digest::from_hash([4; 32]));
        assert_eq!(shared.kind(), TxnKind::TradeRequested);

        let boxed: Box<dyn Transaction> = Box::new(Fixed(5));
        assert_eq!(boxed.digest(), Digest::from_hash([5; 32]));
    }

    #[test]
    fn kind_display() {
        assert_eq!(TxnKind::TradeRequested.to_string(), "TradeRequested");
        assert_eq!(TxnKind::TradeExecuted.to_string(), "TradeExecuted");
    }

    #[test]
    fn kind_serde_roundtrip() {
        let json = serde_json::to_string(&TxnKind::TradeExecuted).unwrap();
        let parsed: TxnKind = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, TxnKind::TradeExecuted);
    }
}
