//! Trade payloads recorded by the market simulation.
//!
//! These are the concrete [`Transaction`] types producers hand to the ledger.
//! The digest is computed once at construction over the canonical JSON
//! encoding and never changes afterwards.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use tradesim_crypto::ContentHasher;
use tradesim_types::{Digest, Timestamp, Transaction, TxnKind};

use crate::error::LedgerError;

/// Currency code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Ccy {
    /// United States Dollar
    Usd,
    /// Renminbi (Chinese Yuan)
    Cny,
    /// Euro
    Eur,
    /// Pound Sterling
    Gbp,
    /// Japanese Yen
    Jpy,
}

impl fmt::Display for Ccy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Self::Usd => "USD",
            Self::Cny => "CNY",
            Self::Eur => "EUR",
            Self::Gbp => "GBP",
            Self::Jpy => "JPY",
        };
        f.write_str(code)
    }
}

/// Identifier of a market participant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TraderId(pub u64);

impl fmt::Display for TraderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trader#{}", self.0)
    }
}

/// Something that changes hands in a trade.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Asset {
    Cash { qty: f64, ccy: Ccy },
    Good { name: String, cost: BTreeMap<Ccy, f64> },
}

impl Asset {
    /// Value of the asset in `ccy`, if it has one.
    ///
    /// Cash only has a value in its own currency; a good has a value in
    /// every currency its cost table lists.
    pub fn value(&self, ccy: Ccy) -> Option<f64> {
        match self {
            Self::Cash { qty, ccy: own } => (*own == ccy).then_some(*qty),
            Self::Good { cost, .. } => cost.get(&ccy).copied(),
        }
    }
}

/// A trader asking a counterparty for an asset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TradeRequest {
    pub from: TraderId,
    pub to: TraderId,
    pub asset: Asset,
    pub requested_at: Timestamp,
    digest: Digest,
}

impl TradeRequest {
    pub fn new(from: TraderId, to: TraderId, asset: Asset) -> Result<Self, LedgerError> {
        Self::at(from, to, asset, Timestamp::now())
    }

    /// Build a request with an explicit timestamp.
    pub fn at(
        from: TraderId,
        to: TraderId,
        asset: Asset,
        requested_at: Timestamp,
    ) -> Result<Self, LedgerError> {
        let digest = hash_body(&(TxnKind::TradeRequested, from, to, &asset, requested_at))?;
        Ok(Self {
            from,
            to,
            asset,
            requested_at,
            digest,
        })
    }
}

impl Transaction for TradeRequest {
    fn digest(&self) -> Digest {
        self.digest
    }

    fn kind(&self) -> TxnKind {
        TxnKind::TradeRequested
    }
}

/// An executed trade: both parties accepted and swapped the listed assets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub party_a: TraderId,
    pub party_b: TraderId,
    /// What `party_a` hands to `party_b`.
    pub a_gives: Vec<Asset>,
    /// What `party_b` hands to `party_a`.
    pub b_gives: Vec<Asset>,
    pub executed_at: Timestamp,
    digest: Digest,
}

impl Trade {
    pub fn new(
        party_a: TraderId,
        party_b: TraderId,
        a_gives: Vec<Asset>,
        b_gives: Vec<Asset>,
    ) -> Result<Self, LedgerError> {
        Self::at(party_a, party_b, a_gives, b_gives, Timestamp::now())
    }

    /// Build a trade with an explicit execution timestamp.
    pub fn at(
        party_a: TraderId,
        party_b: TraderId,
        a_gives: Vec<Asset>,
        b_gives: Vec<Asset>,
        executed_at: Timestamp,
    ) -> Result<Self, LedgerError> {
        let digest = hash_body(&(
            TxnKind::TradeExecuted,
            party_a,
            party_b,
            &a_gives,
            &b_gives,
            executed_at,
        ))?;
        Ok(Self {
            party_a,
            party_b,
            a_gives,
            b_gives,
            executed_at,
            digest,
        })
    }

    /// Total value `party_a` hands over, in `ccy`, ignoring assets without
    /// a value in that currency.
    pub fn a_value(&self, ccy: Ccy) -> f64 {
        self.a_gives.iter().filter_map(|a| a.value(ccy)).sum()
    }

    /// Total value `party_b` hands over, in `ccy`.
    pub fn b_value(&self, ccy: Ccy) -> f64 {
        self.b_gives.iter().filter_map(|a| a.value(ccy)).sum()
    }
}

impl Transaction for Trade {
    fn digest(&self) -> Digest {
        self.digest
    }

    fn kind(&self) -> TxnKind {
        TxnKind::TradeExecuted
    }
}

fn hash_body<T: Serialize>(body: &T) -> Result<Digest, LedgerError> {
    ContentHasher::TXN
        .hash_json(body)
        .map_err(|e| LedgerError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd(qty: f64) -> Asset {
        Asset::Cash { qty, ccy: Ccy::Usd }
    }

    fn widget() -> Asset {
        let mut cost = BTreeMap::new();
        cost.insert(Ccy::Usd, 12.5);
        cost.insert(Ccy::Eur, 11.0);
        Asset::Good {
            name: "widget".into(),
            cost,
        }
    }

    #[test]
    fn request_digest_is_deterministic() {
        let ts = Timestamp::new(10, 0);
        let a = TradeRequest::at(TraderId(1), TraderId(2), usd(5.0), ts).unwrap();
        let b = TradeRequest::at(TraderId(1), TraderId(2), usd(5.0), ts).unwrap();
        assert_eq!(a.digest(), b.digest());
        assert_eq!(a.kind(), TxnKind::TradeRequested);
    }

    #[test]
    fn request_digest_depends_on_direction() {
        let ts = Timestamp::new(10, 0);
        let a = TradeRequest::at(TraderId(1), TraderId(2), usd(5.0), ts).unwrap();
        let b = TradeRequest::at(TraderId(2), TraderId(1), usd(5.0), ts).unwrap();
        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn trade_and_request_never_share_a_digest() {
        let ts = Timestamp::new(10, 0);
        let request = TradeRequest::at(TraderId(1), TraderId(2), usd(5.0), ts).unwrap();
        let trade = Trade::at(TraderId(1), TraderId(2), vec![usd(5.0)], vec![], ts).unwrap();
        assert_ne!(request.digest(), trade.digest());
        assert_eq!(trade.kind(), TxnKind::TradeExecuted);
    }

    #[test]
    fn asset_values() {
        assert_eq!(usd(3.0).value(Ccy::Usd), Some(3.0));
        assert_eq!(usd(3.0).value(Ccy::Jpy), None);
        assert_eq!(widget().value(Ccy::Eur), Some(11.0));
        assert_eq!(widget().value(Ccy::Gbp), None);
    }

    #[test]
    fn trade_totals_skip_unpriced_assets() {
        let trade = Trade::new(
            TraderId(1),
            TraderId(2),
            vec![usd(10.0), widget(), Asset::Cash { qty: 9.0, ccy: Ccy::Gbp }],
            vec![usd(22.5)],
        )
        .unwrap();
        assert_eq!(trade.a_value(Ccy::Usd), 22.5);
        assert_eq!(trade.b_value(Ccy::Usd), 22.5);
    }

    #[test]
    fn ccy_serializes_as_iso_code() {
        assert_eq!(serde_json::to_string(&Ccy::Gbp).unwrap(), "\"GBP\"");
        assert_eq!(Ccy::Jpy.to_string(), "JPY");
    }
}
