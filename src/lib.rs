//! Buyer Agent Library
//!
//! A buyer agent that prices a product from scraped marketplace listings,
//! voices scripted negotiation dialogs, hands off to a hosted negotiation
//! assistant, and settles a sealed-price purchase between one buyer and
//! two sellers.
//!
//! The settlement core runs against pluggable back ends:
//! - an in-memory engine for tests and local runs
//! - a ledger back end that drives the marketplace program through a
//!   [`settlement::LedgerClient`]

pub mod agent;
pub mod cli;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod settlement;
pub mod types;

// Re-export commonly used types and functions
pub use agent::{simulate_purchase, BuyRequest, BuyerAgent, BuyerReport, DialogScript, PurchasePlan};
pub use error::{AgentError, Result, SettlementError};
pub use settlement::{
    select_winner, InMemoryBackend, LedgerBackend, MarketplaceSession, SellerSlot,
    SettlementBackend, SettlementResult, SimulatedLedger,
};
pub use types::{lamports_to_sol, sol_to_lamports, PartyId, SessionHandle, SessionId};
