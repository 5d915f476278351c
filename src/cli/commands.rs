//! CLI command definitions

use crate::agent::DialogScript;
use crate::config::BackendKind;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "buyer-agent")]
#[command(about = "Buyer agent - marketplace price lookup and sealed-price settlement", long_about = None)]
pub struct Cli {
    /// Configuration file (TOML); built-in defaults when omitted
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Look up prices, optionally voice a dialog and call the assistant, then settle a purchase
    Buy {
        /// Product to buy
        #[arg(short, long)]
        product: String,

        /// Dialog script to voice (escalation, agreement)
        #[arg(short, long)]
        dialog: Option<DialogScript>,

        /// Start the negotiation assistant
        #[arg(short, long)]
        negotiate: bool,

        /// Where to write the dialog audio
        #[arg(short, long)]
        audio_out: Option<PathBuf>,

        /// Settlement back end (memory, ledger); overrides the configuration
        #[arg(short, long)]
        backend: Option<BackendKind>,
    },

    /// Show the price range of the top marketplace listings
    Prices {
        /// Product to look up
        #[arg(short, long)]
        product: String,
    },

    /// Run one settlement between a buyer and two sellers
    Settle {
        /// Buyer maximum price in SOL
        #[arg(short, long)]
        max_price: Option<f64>,

        /// Seller A minimum price in SOL
        #[arg(short = 'a', long)]
        seller_a: Option<f64>,

        /// Seller B minimum price in SOL
        #[arg(short = 'b', long)]
        seller_b: Option<f64>,

        /// Settlement back end (memory, ledger); overrides the configuration
        #[arg(long)]
        backend: Option<BackendKind>,
    },

    /// Show the model label resolved from the feature-flag service
    Model,

    /// Write an example configuration file
    InitConfig {
        /// Output path
        path: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_buy() {
        let cli = Cli::try_parse_from([
            "buyer-agent",
            "buy",
            "--product",
            "rubber gloves",
            "--dialog",
            "agreement",
            "--negotiate",
            "--backend",
            "memory",
        ])
        .unwrap();

        match cli.command {
            Commands::Buy {
                product,
                dialog,
                negotiate,
                audio_out,
                backend,
            } => {
                assert_eq!(product, "rubber gloves");
                assert_eq!(dialog, Some(DialogScript::Agreement));
                assert!(negotiate);
                assert!(audio_out.is_none());
                assert_eq!(backend, Some(BackendKind::Memory));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_settle_with_global_config() {
        let cli = Cli::try_parse_from([
            "buyer-agent",
            "settle",
            "-m",
            "40",
            "-a",
            "45",
            "-b",
            "30",
            "--config",
            "agent.toml",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("agent.toml")));
        assert!(matches!(
            cli.command,
            Commands::Settle {
                max_price: Some(m),
                seller_a: Some(a),
                seller_b: Some(b),
                backend: None,
            } if m == 40.0 && a == 45.0 && b == 30.0
        ));
    }

    #[test]
    fn test_unknown_dialog_rejected() {
        assert!(Cli::try_parse_from(["buyer-agent", "buy", "-p", "gloves", "-d", "opera"]).is_err());
    }
}
