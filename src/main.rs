//! Buyer agent CLI binary

use anyhow::Context;
use buyer_agent::cli::{BuyerApp, Cli, Commands};
use buyer_agent::config::create_example_config;
use buyer_agent::{lamports_to_sol, BuyRequest, SellerSlot, SettlementResult};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    if let Commands::InitConfig { path } = &cli.command {
        create_example_config(path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Wrote example configuration to {}", path.display());
        return Ok(());
    }

    let app = BuyerApp::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Commands::Buy {
            product,
            dialog,
            negotiate,
            audio_out,
            backend,
        } => {
            let request = BuyRequest {
                product,
                dialog,
                negotiate,
            };
            let report = app.buy(&request, backend).await?;

            println!("Product:     {}", report.product);
            println!("Model:       {}", report.model);
            println!(
                "Price range: {} - {}",
                report.bounds.min_price, report.bounds.max_price
            );

            if let Some(audio) = &report.dialog_audio {
                match &audio_out {
                    Some(path) => {
                        tokio::fs::write(path, audio)
                            .await
                            .with_context(|| format!("failed to write {}", path.display()))?;
                        println!("Dialog:      {} bytes written to {}", audio.len(), path.display());
                    }
                    None => println!("Dialog:      {} bytes (use --audio-out to save)", audio.len()),
                }
            }
            if report.negotiation_started {
                println!("Negotiation: assistant conversation requested");
            }
            print_settlement(&report.purchase.session.to_string(), &report.purchase.result);

            // Give the fire-and-forget assistant call a moment to log its outcome
            if report.negotiation_started {
                tokio::time::sleep(std::time::Duration::from_secs(2)).await;
            }
        }

        Commands::Prices { product } => {
            let bounds = app.prices(&product).await?;
            println!(
                "{}: {} - {}",
                product, bounds.min_price, bounds.max_price
            );
        }

        Commands::Settle {
            max_price,
            seller_a,
            seller_b,
            backend,
        } => {
            let outcome = app.settle(max_price, seller_a, seller_b, backend).await?;

            println!("Buyer:    {}", outcome.buyer);
            println!("Seller A: {}", outcome.seller_a);
            println!("Seller B: {}", outcome.seller_b);
            print_settlement(&outcome.session.to_string(), &outcome.result);
        }

        Commands::Model => {
            println!("{}", app.resolve_model().await);
        }

        Commands::InitConfig { .. } => {}
    }

    Ok(())
}

fn print_settlement(session: &str, result: &SettlementResult) {
    println!("Session:  {}", session);
    match result {
        SettlementResult::Trade {
            seller,
            party,
            amount,
        } => {
            let label = match seller {
                SellerSlot::A => "A",
                SellerSlot::B => "B",
            };
            println!(
                "Result:   trade with seller {} ({}) at {} SOL",
                label,
                party,
                lamports_to_sol(*amount)
            );
        }
        SettlementResult::NoTrade => println!("Result:   no trade"),
    }
}
