//! Buyer agent orchestration

pub mod orchestrator;
pub mod request;
pub mod scripts;

pub use orchestrator::{simulate_purchase, BuyerAgent, BuyerReport, PurchaseOutcome, PurchasePlan};
pub use request::BuyRequest;
pub use scripts::{DialogScript, NEGOTIATION_CONTEXT};
