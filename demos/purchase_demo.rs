//! Purchase demo: sealed-price settlement on both back ends
//!
//! This demo runs the settlement workflow without any hosted service:
//! 1. Seller B undercuts seller A within the buyer's budget
//! 2. Both sellers ask more than the buyer will pay
//! 3. The two sellers tie and seller A wins
//! 4. The same purchase on the simulated ledger, with balances moving
//! 5. A commitment arriving after settlement is rejected
//!
//! Run with: cargo run --example purchase_demo

use buyer_agent::collaborators::RetryPolicy;
use buyer_agent::settlement::{LedgerClient, LedgerConfig, SimulatedLedgerOptions};
use buyer_agent::types::LAMPORTS_PER_SOL;
use buyer_agent::{
    lamports_to_sol, simulate_purchase, InMemoryBackend, LedgerBackend, PurchasePlan, SellerSlot,
    SettlementBackend, SettlementResult, SimulatedLedger,
};

fn plan(max_price: i64, seller_a_price: i64, seller_b_price: i64) -> PurchasePlan {
    PurchasePlan {
        max_price,
        seller_a_price,
        seller_b_price,
        buyer_funding: 2 * LAMPORTS_PER_SOL,
        seller_funding: LAMPORTS_PER_SOL,
    }
}

fn describe(result: &SettlementResult) -> String {
    match result {
        SettlementResult::Trade { seller, amount, .. } => {
            format!("{} sells for {} lamports", seller, amount)
        }
        SettlementResult::NoTrade => "no trade".to_string(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("info,buyer_agent=debug")
        .init();

    println!("\n╔══════════════════════════════════════════════╗");
    println!("║   Buyer Agent Purchase Demo                 ║");
    println!("║   One Buyer, Two Sealed Seller Prices       ║");
    println!("╚══════════════════════════════════════════════╝\n");

    let memory = InMemoryBackend::new();

    // =========================================================================
    // Scenario 1: Cheapest eligible seller wins
    // =========================================================================
    println!("┌─────────────────────────────────────────────┐");
    println!("│ Scenario 1: Cheapest Eligible Seller       │");
    println!("└─────────────────────────────────────────────┘");
    println!("💰 Buyer max 40, seller A 45, seller B 30");

    let first = simulate_purchase(&memory, &plan(40, 45, 30)).await?;
    println!("   ✅ Session {}", first.session);
    println!("   ✅ {}\n", describe(&first.result));

    // =========================================================================
    // Scenario 2: Nobody meets the budget
    // =========================================================================
    println!("┌─────────────────────────────────────────────┐");
    println!("│ Scenario 2: No Trade                       │");
    println!("└─────────────────────────────────────────────┘");
    println!("💰 Buyer max 15, seller A 27, seller B 25");

    let outcome = simulate_purchase(&memory, &plan(15, 27, 25)).await?;
    println!("   ✅ {}", describe(&outcome.result));
    println!("   📋 Session completed: {}\n", outcome.state.is_completed());

    // =========================================================================
    // Scenario 3: Tie
    // =========================================================================
    println!("┌─────────────────────────────────────────────┐");
    println!("│ Scenario 3: Tie Between Sellers            │");
    println!("└─────────────────────────────────────────────┘");
    println!("💰 Buyer max 50, seller A 20, seller B 20");

    let outcome = simulate_purchase(&memory, &plan(50, 20, 20)).await?;
    println!("   ✅ {}\n", describe(&outcome.result));

    // =========================================================================
    // Scenario 4: Simulated ledger
    // =========================================================================
    println!("┌─────────────────────────────────────────────┐");
    println!("│ Scenario 4: Simulated Ledger               │");
    println!("└─────────────────────────────────────────────┘");
    println!("💰 Buyer max 1.5 SOL, seller A 1.8 SOL, seller B 1.2 SOL");

    let ledger = LedgerBackend::new(
        SimulatedLedger::new(SimulatedLedgerOptions {
            confirmation_polls: 2,
            rate_limited_airdrops: 1,
            retry_after_ms: 200,
        }),
        LedgerConfig {
            poll_interval_ms: 50,
            confirm_timeout_ms: 5_000,
        },
        RetryPolicy::default(),
    );

    let outcome = simulate_purchase(
        &ledger,
        &plan(1_500_000_000, 1_800_000_000, 1_200_000_000),
    )
    .await?;
    println!("   ✅ {}", describe(&outcome.result));

    let buyer_balance = ledger.client().balance(&outcome.buyer).await?;
    let seller_balance = ledger.client().balance(&outcome.seller_b).await?;
    println!("   📋 Buyer balance:    {} SOL", lamports_to_sol(buyer_balance));
    println!("   📋 Seller B balance: {} SOL\n", lamports_to_sol(seller_balance));

    // =========================================================================
    // Scenario 5: Late commitment
    // =========================================================================
    println!("┌─────────────────────────────────────────────┐");
    println!("│ Scenario 5: Commitment After Settlement    │");
    println!("└─────────────────────────────────────────────┘");

    match memory
        .set_seller_price(&first.session, SellerSlot::A, 10)
        .await
    {
        Ok(()) => println!("   ⚠️  Late commitment was accepted"),
        Err(e) => println!("   ✅ Rejected: {}\n", e),
    }

    // =========================================================================
    // Summary
    // =========================================================================
    println!("\n╔══════════════════════════════════════════════╗");
    println!("║   Demo Complete - Summary                   ║");
    println!("╚══════════════════════════════════════════════╝\n");

    println!("✅ Cheapest eligible seller selected");
    println!("✅ No-trade outcome completes the session");
    println!("✅ Ties go to seller A");
    println!("✅ Ledger settlement moves lamports buyer → seller\n");

    Ok(())
}
