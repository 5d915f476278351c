//! Settlement types

use crate::types::PartyId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which of the two seller positions a party occupies
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SellerSlot {
    A,
    B,
}

impl fmt::Display for SellerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SellerSlot::A => write!(f, "seller A"),
            SellerSlot::B => write!(f, "seller B"),
        }
    }
}

/// Outcome of a settlement
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementResult {
    /// The cheapest eligible seller sells at its own minimum price
    Trade {
        seller: SellerSlot,
        party: PartyId,
        amount: u64,
    },
    /// No seller met the buyer's maximum price
    NoTrade,
}

impl SettlementResult {
    pub fn is_trade(&self) -> bool {
        matches!(self, SettlementResult::Trade { .. })
    }

    pub fn winner(&self) -> Option<SellerSlot> {
        match self {
            SettlementResult::Trade { seller, .. } => Some(*seller),
            SettlementResult::NoTrade => None,
        }
    }

    pub fn amount(&self) -> Option<u64> {
        match self {
            SettlementResult::Trade { amount, .. } => Some(*amount),
            SettlementResult::NoTrade => None,
        }
    }
}
