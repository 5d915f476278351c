//! Marketplace session state machine

use crate::error::SettlementError;
use crate::types::{PartyId, SessionId};
use serde::{Deserialize, Serialize};

use super::types::{SellerSlot, SettlementResult};

/// One buyer / two seller sealed-price session
///
/// Commitments are write-once. Once settled the session is terminal and
/// every mutating call fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketplaceSession {
    id: SessionId,
    buyer: PartyId,
    seller_a: PartyId,
    seller_b: PartyId,
    max_price: Option<u64>,
    seller_a_price: Option<u64>,
    seller_b_price: Option<u64>,
    is_active: bool,
    is_completed: bool,
    winning_party: Option<SellerSlot>,
    settlement_amount: Option<u64>,
}

impl MarketplaceSession {
    /// Create a new active session
    pub fn new(
        buyer: PartyId,
        seller_a: PartyId,
        seller_b: PartyId,
    ) -> Result<Self, SettlementError> {
        validate_parties(&buyer, &seller_a, &seller_b)?;

        Ok(Self {
            id: SessionId::derive(&buyer, &seller_a, &seller_b),
            buyer,
            seller_a,
            seller_b,
            max_price: None,
            seller_a_price: None,
            seller_b_price: None,
            is_active: true,
            is_completed: false,
            winning_party: None,
            settlement_amount: None,
        })
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn buyer(&self) -> &PartyId {
        &self.buyer
    }

    pub fn seller(&self, slot: SellerSlot) -> &PartyId {
        match slot {
            SellerSlot::A => &self.seller_a,
            SellerSlot::B => &self.seller_b,
        }
    }

    pub fn max_price(&self) -> Option<u64> {
        self.max_price
    }

    pub fn seller_price(&self, slot: SellerSlot) -> Option<u64> {
        match slot {
            SellerSlot::A => self.seller_a_price,
            SellerSlot::B => self.seller_b_price,
        }
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    pub fn winning_party(&self) -> Option<SellerSlot> {
        self.winning_party
    }

    pub fn settlement_amount(&self) -> Option<u64> {
        self.settlement_amount
    }

    /// Buyer commits the maximum price it will pay
    pub fn set_buyer_max_price(&mut self, amount: i64) -> Result<u64, SettlementError> {
        let active = self.is_active;
        commit(&mut self.max_price, active, amount, "buyer")
    }

    /// A seller commits the minimum price it will accept
    pub fn set_seller_price(
        &mut self,
        slot: SellerSlot,
        amount: i64,
    ) -> Result<u64, SettlementError> {
        let active = self.is_active;
        let (field, label) = match slot {
            SellerSlot::A => (&mut self.seller_a_price, "seller A"),
            SellerSlot::B => (&mut self.seller_b_price, "seller B"),
        };
        commit(field, active, amount, label)
    }

    /// Pick the winning seller, or none, and close the session
    pub fn settle(&mut self) -> Result<SettlementResult, SettlementError> {
        if self.is_completed {
            return Err(SettlementError::AlreadyCompleted);
        }

        let max_price = self
            .max_price
            .ok_or_else(|| SettlementError::NotReady("buyer max price".to_string()))?;
        let price_a = self
            .seller_a_price
            .ok_or_else(|| SettlementError::NotReady("seller A price".to_string()))?;
        let price_b = self
            .seller_b_price
            .ok_or_else(|| SettlementError::NotReady("seller B price".to_string()))?;

        let winner = select_winner(max_price, price_a, price_b);

        self.is_active = false;
        self.is_completed = true;
        self.winning_party = winner.map(|(slot, _)| slot);
        self.settlement_amount = winner.map(|(_, amount)| amount);

        Ok(self.result())
    }

    /// Settlement outcome recorded on a completed session
    pub fn result(&self) -> SettlementResult {
        match (self.winning_party, self.settlement_amount) {
            (Some(slot), Some(amount)) => SettlementResult::Trade {
                seller: slot,
                party: self.seller(slot).clone(),
                amount,
            },
            _ => SettlementResult::NoTrade,
        }
    }
}

/// Cheapest eligible seller; seller A wins ties
pub fn select_winner(max_price: u64, price_a: u64, price_b: u64) -> Option<(SellerSlot, u64)> {
    let eligible = [(SellerSlot::A, price_a), (SellerSlot::B, price_b)]
        .into_iter()
        .filter(|(_, price)| *price <= max_price);

    // min_by_key keeps the first of equal elements, so A precedes B
    eligible.min_by_key(|(_, price)| *price)
}

fn validate_parties(
    buyer: &PartyId,
    seller_a: &PartyId,
    seller_b: &PartyId,
) -> Result<(), SettlementError> {
    if buyer.is_empty() || seller_a.is_empty() || seller_b.is_empty() {
        return Err(SettlementError::InvalidParty(
            "party id must not be empty".to_string(),
        ));
    }
    if buyer == seller_a || buyer == seller_b {
        return Err(SettlementError::InvalidParty(format!(
            "buyer {} is also a seller",
            buyer
        )));
    }
    if seller_a == seller_b {
        return Err(SettlementError::InvalidParty(format!(
            "seller {} occupies both slots",
            seller_a
        )));
    }
    Ok(())
}

fn commit(
    field: &mut Option<u64>,
    active: bool,
    amount: i64,
    label: &str,
) -> Result<u64, SettlementError> {
    if !active {
        return Err(SettlementError::SessionNotActive);
    }
    if field.is_some() {
        return Err(SettlementError::AlreadySet(label.to_string()));
    }
    if amount < 0 {
        return Err(SettlementError::InvalidAmount(amount));
    }

    let amount = amount as u64;
    *field = Some(amount);
    Ok(amount)
}
