//! Buyer agent: prices, dialog, negotiation assistant, simulated purchase

use crate::collaborators::{
    make_dialog, with_retry, AudioJoiner, ConversationRequest, ModelLabel, NegotiationAssistant,
    PriceBounds, PriceSource, RetryPolicy, SpeechSynthesizer,
};
use crate::config::PurchaseConfig;
use crate::error::{AgentError, Result, SettlementError};
use crate::settlement::{MarketplaceSession, SellerSlot, SettlementBackend, SettlementResult};
use crate::types::{lamports_to_sol, sol_to_lamports, PartyId, SessionHandle};
use std::sync::Arc;

use super::request::BuyRequest;
use super::scripts::{DialogScript, NEGOTIATION_CONTEXT};

/// Prices and funding for one simulated purchase, in lamports
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PurchasePlan {
    pub max_price: i64,
    pub seller_a_price: i64,
    pub seller_b_price: i64,
    pub buyer_funding: u64,
    pub seller_funding: u64,
}

impl PurchasePlan {
    /// The buyer is always funded with at least its maximum price
    pub fn from_config(config: &PurchaseConfig) -> Result<Self> {
        let max_price = commit_amount(config.buyer_max_price_sol)?;
        let buyer_funding = sol_to_lamports(config.buyer_airdrop_sol)?.max(max_price.unsigned_abs());

        Ok(Self {
            max_price,
            seller_a_price: commit_amount(config.seller_a_price_sol)?,
            seller_b_price: commit_amount(config.seller_b_price_sol)?,
            buyer_funding,
            seller_funding: sol_to_lamports(config.seller_airdrop_sol)?,
        })
    }
}

fn commit_amount(sol: f64) -> Result<i64> {
    let lamports = sol_to_lamports(sol)?;
    Ok(i64::try_from(lamports).map_err(|_| SettlementError::InvalidAmount(i64::MAX))?)
}

/// Final state of a simulated purchase
#[derive(Clone, Debug)]
pub struct PurchaseOutcome {
    pub session: SessionHandle,
    pub buyer: PartyId,
    pub seller_a: PartyId,
    pub seller_b: PartyId,
    pub result: SettlementResult,
    pub state: MarketplaceSession,
}

/// Everything one buyer run produced
#[derive(Clone, Debug)]
pub struct BuyerReport {
    pub product: String,
    pub bounds: PriceBounds,
    pub model: ModelLabel,
    pub dialog_audio: Option<Vec<u8>>,
    pub negotiation_started: bool,
    pub purchase: PurchaseOutcome,
}

struct Speech {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    joiner: Arc<dyn AudioJoiner>,
}

/// Orchestrates the buyer flow across the collaborators
pub struct BuyerAgent {
    prices: Arc<dyn PriceSource>,
    backend: Arc<dyn SettlementBackend>,
    model: ModelLabel,
    plan: PurchasePlan,
    retry: RetryPolicy,
    speech: Option<Speech>,
    assistant: Option<(Arc<dyn NegotiationAssistant>, String)>,
}

impl BuyerAgent {
    pub fn new(
        prices: Arc<dyn PriceSource>,
        backend: Arc<dyn SettlementBackend>,
        model: ModelLabel,
        plan: PurchasePlan,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            prices,
            backend,
            model,
            plan,
            retry,
            speech: None,
            assistant: None,
        }
    }

    pub fn with_speech(
        mut self,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        joiner: Arc<dyn AudioJoiner>,
    ) -> Self {
        self.speech = Some(Speech {
            synthesizer,
            joiner,
        });
        self
    }

    pub fn with_assistant(mut self, assistant: Arc<dyn NegotiationAssistant>, replica_id: &str) -> Self {
        self.assistant = Some((assistant, replica_id.to_string()));
        self
    }

    pub fn model(&self) -> &ModelLabel {
        &self.model
    }

    pub fn backend(&self) -> Arc<dyn SettlementBackend> {
        self.backend.clone()
    }

    /// Run the whole buyer flow for one request
    pub async fn run(&self, request: &BuyRequest) -> Result<BuyerReport> {
        tracing::info!("Buyer agent run for {:?}", request.product);

        let bounds = self.price_bounds(&request.product).await?;

        let dialog_audio = match request.dialog {
            Some(script) => Some(self.voice_dialog(script).await?),
            None => None,
        };

        let negotiation_started = if request.negotiate {
            self.start_negotiation()?;
            true
        } else {
            false
        };

        let purchase = self.simulate_purchase(&self.plan).await?;

        Ok(BuyerReport {
            product: request.product.clone(),
            bounds,
            model: self.model.clone(),
            dialog_audio,
            negotiation_started,
            purchase,
        })
    }

    /// Aggregate min and max price across the top listings
    pub async fn price_bounds(&self, product: &str) -> Result<PriceBounds> {
        let bounds = with_retry(&self.retry, "price lookup", || self.prices.price_bounds(product)).await?;

        tracing::info!(
            "Price range for {:?}: {} - {} (model {})",
            product,
            bounds.min_price,
            bounds.max_price,
            self.model
        );
        Ok(bounds)
    }

    /// Voice a scripted dialog into one audio track
    pub async fn voice_dialog(&self, script: DialogScript) -> Result<Vec<u8>> {
        let speech = self
            .speech
            .as_ref()
            .ok_or_else(|| AgentError::MissingConfig("speech synthesizer".to_string()))?;

        tracing::info!("Voicing {} dialog", script);
        make_dialog(
            speech.synthesizer.as_ref(),
            speech.joiner.as_ref(),
            &script.lines(),
        )
        .await
    }

    /// Start the assistant conversation without waiting for it
    pub fn start_negotiation(&self) -> Result<()> {
        let (assistant, replica_id) = self
            .assistant
            .as_ref()
            .ok_or_else(|| AgentError::MissingConfig("negotiation assistant".to_string()))?;

        let assistant = assistant.clone();
        let request = ConversationRequest {
            replica_id: replica_id.clone(),
            conversational_context: NEGOTIATION_CONTEXT.to_string(),
        };

        tokio::spawn(async move {
            match assistant.start(&request).await {
                Ok(session) => tracing::info!("Negotiation assistant started: {}", session),
                Err(e) => tracing::error!("Negotiation assistant failed: {}", e),
            }
        });
        Ok(())
    }

    /// Fund three fresh parties, commit their prices and settle
    pub async fn simulate_purchase(&self, plan: &PurchasePlan) -> Result<PurchaseOutcome> {
        simulate_purchase(self.backend.as_ref(), plan).await
    }
}

/// Fund three fresh parties on `backend`, commit their prices and settle
pub async fn simulate_purchase(
    backend: &dyn SettlementBackend,
    plan: &PurchasePlan,
) -> Result<PurchaseOutcome> {
    let buyer = PartyId::random();
    let seller_a = PartyId::random();
    let seller_b = PartyId::random();

    tracing::info!("Buyer: {}", buyer);
    tracing::info!("Seller A: {}", seller_a);
    tracing::info!("Seller B: {}", seller_b);

    futures::try_join!(
        backend.fund_party(&buyer, plan.buyer_funding),
        backend.fund_party(&seller_a, plan.seller_funding),
        backend.fund_party(&seller_b, plan.seller_funding),
    )?;

    let session = backend.create_session(&buyer, &seller_a, &seller_b).await?;

    futures::try_join!(
        backend.set_buyer_max_price(&session, plan.max_price),
        backend.set_seller_price(&session, SellerSlot::A, plan.seller_a_price),
        backend.set_seller_price(&session, SellerSlot::B, plan.seller_b_price),
    )?;

    let result = backend.settle(&session).await?;
    let state = backend.get_state(&session).await?;

    match &result {
        SettlementResult::Trade { seller, amount, .. } => tracing::info!(
            "Purchase completed on {} back end: {} sells for {} SOL",
            backend.name(),
            seller,
            lamports_to_sol(*amount)
        ),
        SettlementResult::NoTrade => tracing::info!(
            "Purchase not completed: no seller met the buyer's price of {} lamports",
            plan.max_price
        ),
    }

    Ok(PurchaseOutcome {
        session,
        buyer,
        seller_a,
        seller_b,
        result,
        state,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{ConcatJoiner, DialogLine, Listing};
    use crate::config::BackendKind;
    use crate::error::CollaboratorFailure;
    use crate::settlement::{
        InMemoryBackend, LedgerBackend, LedgerConfig, SimulatedLedger, SimulatedLedgerOptions,
    };
    use crate::types::LAMPORTS_PER_SOL;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    struct StubPrices {
        listings: Vec<Listing>,
        failures: AtomicU32,
    }

    impl StubPrices {
        fn new(prices: &[(f64, f64)]) -> Self {
            let listings = prices
                .iter()
                .enumerate()
                .map(|(i, (min_price, max_price))| Listing {
                    title: format!("listing {}", i),
                    url: format!("https://shop.example.com/{}", i),
                    min_price: *min_price,
                    max_price: *max_price,
                    image_url: format!("https://shop.example.com/{}.png", i),
                })
                .collect();
            Self {
                listings,
                failures: AtomicU32::new(0),
            }
        }

        fn failing_first(self, failures: u32) -> Self {
            self.failures.store(failures, Ordering::SeqCst);
            self
        }
    }

    #[async_trait]
    impl PriceSource for StubPrices {
        async fn listings(&self, _product: &str) -> Result<Vec<Listing>> {
            if self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(AgentError::collaborator("apify", CollaboratorFailure::Status(502)));
            }
            Ok(self.listings.clone())
        }
    }

    struct SpeakerEcho;

    #[async_trait]
    impl SpeechSynthesizer for SpeakerEcho {
        async fn synthesize(&self, line: &DialogLine) -> Result<Vec<u8>> {
            Ok(line.speaker.to_string().into_bytes())
        }
    }

    #[derive(Default)]
    struct RecordingAssistant {
        started: Notify,
        contexts: std::sync::Mutex<Vec<ConversationRequest>>,
    }

    #[async_trait]
    impl NegotiationAssistant for RecordingAssistant {
        async fn start(&self, request: &ConversationRequest) -> Result<serde_json::Value> {
            self.contexts.lock().unwrap().push(request.clone());
            self.started.notify_one();
            Ok(serde_json::json!({ "conversation_id": "c1" }))
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 2,
        }
    }

    fn plan(max_price: i64, seller_a_price: i64, seller_b_price: i64) -> PurchasePlan {
        PurchasePlan {
            max_price,
            seller_a_price,
            seller_b_price,
            buyer_funding: 2 * LAMPORTS_PER_SOL,
            seller_funding: LAMPORTS_PER_SOL,
        }
    }

    fn agent(prices: StubPrices, backend: Arc<dyn SettlementBackend>, plan: PurchasePlan) -> BuyerAgent {
        BuyerAgent::new(
            Arc::new(prices),
            backend,
            ModelLabel("test-model".to_string()),
            plan,
            fast_retry(),
        )
    }

    #[test]
    fn test_plan_from_default_config() {
        let plan = PurchasePlan::from_config(&PurchaseConfig::default()).unwrap();
        assert_eq!(plan.max_price, 1_500_000_000);
        assert_eq!(plan.seller_a_price, 1_800_000_000);
        assert_eq!(plan.seller_b_price, 1_200_000_000);
        assert_eq!(plan.buyer_funding, 2 * LAMPORTS_PER_SOL);
        assert_eq!(plan.seller_funding, LAMPORTS_PER_SOL);
    }

    #[test]
    fn test_plan_funds_buyer_up_to_max_price() {
        let config = PurchaseConfig {
            buyer_max_price_sol: 40.0,
            buyer_airdrop_sol: 2.0,
            ..PurchaseConfig::default()
        };
        let plan = PurchasePlan::from_config(&config).unwrap();
        assert_eq!(plan.buyer_funding, 40 * LAMPORTS_PER_SOL);

        let config = PurchaseConfig {
            buyer_max_price_sol: 1.0,
            buyer_airdrop_sol: 3.0,
            ..PurchaseConfig::default()
        };
        let plan = PurchasePlan::from_config(&config).unwrap();
        assert_eq!(plan.buyer_funding, 3 * LAMPORTS_PER_SOL);
    }

    #[test]
    fn test_plan_rejects_negative_price() {
        let config = PurchaseConfig {
            backend: BackendKind::Memory,
            buyer_max_price_sol: -1.0,
            ..PurchaseConfig::default()
        };
        assert!(matches!(
            PurchasePlan::from_config(&config),
            Err(AgentError::Settlement(SettlementError::InvalidAmount(_)))
        ));
    }

    #[tokio::test]
    async fn test_run_on_ledger_picks_seller_b() {
        let ledger = LedgerBackend::new(
            SimulatedLedger::new(SimulatedLedgerOptions {
                confirmation_polls: 1,
                rate_limited_airdrops: 1,
                retry_after_ms: 1,
            }),
            LedgerConfig {
                poll_interval_ms: 1,
                confirm_timeout_ms: 2_000,
            },
            fast_retry(),
        );
        let plan = PurchasePlan::from_config(&PurchaseConfig::default()).unwrap();
        let agent = agent(
            StubPrices::new(&[(0.02, 0.04), (0.015, 0.03)]),
            Arc::new(ledger),
            plan,
        );

        let report = agent.run(&BuyRequest::new("rubber gloves")).await.unwrap();

        assert_eq!(report.bounds.min_price, 0.015);
        assert_eq!(report.bounds.max_price, 0.04);
        assert_eq!(report.model.to_string(), "test-model");
        assert!(report.dialog_audio.is_none());
        assert!(!report.negotiation_started);

        let purchase = report.purchase;
        assert_eq!(purchase.result.winner(), Some(SellerSlot::B));
        assert_eq!(purchase.result.amount(), Some(1_200_000_000));
        assert!(purchase.state.is_completed());
        assert_eq!(purchase.state.seller(SellerSlot::B), &purchase.seller_b);
    }

    #[tokio::test]
    async fn test_no_trade_is_not_an_error() {
        let agent = agent(
            StubPrices::new(&[]),
            Arc::new(InMemoryBackend::new()),
            plan(15, 27, 25),
        );

        let report = agent.run(&BuyRequest::new("gloves")).await.unwrap();

        assert_eq!(report.bounds, PriceBounds::default());
        assert_eq!(report.purchase.result, SettlementResult::NoTrade);
        assert!(report.purchase.state.is_completed());
        assert_eq!(report.purchase.state.winning_party(), None);
    }

    #[tokio::test]
    async fn test_price_lookup_retries_transient_failures() {
        let agent = agent(
            StubPrices::new(&[(1.0, 2.0)]).failing_first(2),
            Arc::new(InMemoryBackend::new()),
            plan(40, 45, 30),
        );

        let bounds = agent.price_bounds("gloves").await.unwrap();
        assert_eq!(bounds.max_price, 2.0);
    }

    #[tokio::test]
    async fn test_price_lookup_gives_up() {
        let agent = agent(
            StubPrices::new(&[(1.0, 2.0)]).failing_first(10),
            Arc::new(InMemoryBackend::new()),
            plan(40, 45, 30),
        );

        let err = agent.run(&BuyRequest::new("gloves")).await.unwrap_err();
        assert!(matches!(err, AgentError::Collaborator { .. }));
    }

    #[tokio::test]
    async fn test_dialog_and_negotiation() {
        let assistant = Arc::new(RecordingAssistant::default());
        let agent = agent(
            StubPrices::new(&[(1.0, 2.0)]),
            Arc::new(InMemoryBackend::new()),
            plan(40, 45, 30),
        )
        .with_speech(Arc::new(SpeakerEcho), Arc::new(ConcatJoiner))
        .with_assistant(assistant.clone(), "replica-1");

        let request = BuyRequest {
            product: "gloves".to_string(),
            dialog: Some(DialogScript::Escalation),
            negotiate: true,
        };
        let report = agent.run(&request).await.unwrap();

        let audio = String::from_utf8(report.dialog_audio.unwrap()).unwrap();
        assert!(audio.starts_with("covejuancove"));
        assert!(report.negotiation_started);

        tokio::time::timeout(Duration::from_secs(1), assistant.started.notified())
            .await
            .unwrap();
        let contexts = assistant.contexts.lock().unwrap();
        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts[0].replica_id, "replica-1");
        assert_eq!(contexts[0].conversational_context, NEGOTIATION_CONTEXT);
    }

    #[tokio::test]
    async fn test_dialog_without_speech_configured() {
        let agent = agent(
            StubPrices::new(&[]),
            Arc::new(InMemoryBackend::new()),
            plan(40, 45, 30),
        );

        let err = agent.voice_dialog(DialogScript::Agreement).await.unwrap_err();
        assert!(matches!(err, AgentError::MissingConfig(_)));
        assert!(matches!(
            agent.start_negotiation(),
            Err(AgentError::MissingConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_plan_surfaces_settlement_error() {
        let agent = agent(
            StubPrices::new(&[]),
            Arc::new(InMemoryBackend::new()),
            plan(-1, 45, 30),
        );

        let err = agent.simulate_purchase(&plan(-1, 45, 30)).await.unwrap_err();
        assert!(matches!(
            err,
            AgentError::Settlement(SettlementError::InvalidAmount(-1))
        ));
    }
}
