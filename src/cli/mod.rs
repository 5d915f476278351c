//! CLI module for the buyer agent

pub mod app;
pub mod commands;

pub use app::BuyerApp;
pub use commands::{Cli, Commands};
