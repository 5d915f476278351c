//! Marketplace settlement: one buyer, two sellers, sealed prices

pub mod engine;
pub mod ledger;
pub mod session;
pub mod types;

pub use engine::{InMemoryBackend, SettlementBackend};
pub use ledger::{
    ConfirmationStatus, LedgerBackend, LedgerClient, LedgerConfig, LedgerRejection,
    MarketplaceInstruction, SimulatedLedger, SimulatedLedgerOptions,
};
pub use session::{select_winner, MarketplaceSession};
pub use types::{SellerSlot, SettlementResult};
