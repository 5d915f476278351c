//! Buyer agent application wiring configuration, secrets and collaborators

use crate::agent::{simulate_purchase, BuyRequest, BuyerAgent, BuyerReport, PurchaseOutcome, PurchasePlan};
use crate::collaborators::{
    with_retry, ApifyPriceSource, AudioJoiner, ConcatJoiner, FfmpegJoiner, ModelLabel,
    ModelSource, PriceBounds, PriceSource, RelayFlagSource, RimeSynthesizer, StaticModel,
    TavusAssistant,
};
use crate::config::{AgentConfig, BackendKind, PurchaseConfig, Secrets};
use crate::error::Result;
use crate::settlement::{
    InMemoryBackend, LedgerBackend, SettlementBackend, SimulatedLedger, SimulatedLedgerOptions,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Polls a simulated transaction stays pending before confirming
const SIMULATED_CONFIRMATION_POLLS: u32 = 2;

/// Main buyer agent application
#[derive(Clone, Debug)]
pub struct BuyerApp {
    config: AgentConfig,
    secrets: Secrets,
}

impl BuyerApp {
    pub fn new(config: AgentConfig, secrets: Secrets) -> Self {
        Self { config, secrets }
    }

    /// Load configuration from `path` (or defaults) and secrets from the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => AgentConfig::load(path)?,
            None => {
                tracing::info!("No configuration file given, using defaults");
                AgentConfig::default()
            }
        };
        Ok(Self::new(config, Secrets::from_env()))
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Build a fresh settlement back end
    pub fn backend(&self, kind: BackendKind) -> Arc<dyn SettlementBackend> {
        match kind {
            BackendKind::Memory => Arc::new(InMemoryBackend::new()),
            BackendKind::Ledger => {
                let ledger = SimulatedLedger::new(SimulatedLedgerOptions {
                    confirmation_polls: SIMULATED_CONFIRMATION_POLLS,
                    ..SimulatedLedgerOptions::default()
                });
                Arc::new(LedgerBackend::new(
                    ledger,
                    self.config.ledger.clone(),
                    self.config.retry.clone(),
                ))
            }
        }
    }

    /// Resolve the model label once; without an SDK key the configured default is used
    pub async fn resolve_model(&self) -> ModelLabel {
        let flags = &self.config.flags;
        let source: Box<dyn ModelSource> = match &self.secrets.launch_darkly {
            Some(sdk_key) => Box::new(RelayFlagSource::new(flags.clone(), sdk_key.clone())),
            None => {
                tracing::warn!("LAUNCH_DARKLY not set, model label is {}", flags.default_model);
                Box::new(StaticModel(flags.default_model.clone()))
            }
        };

        ModelLabel::resolve(
            source.as_ref(),
            Duration::from_millis(flags.timeout_ms),
            &flags.default_model,
        )
        .await
    }

    fn price_source(&self) -> Result<Arc<dyn PriceSource>> {
        let token = Secrets::require(&self.secrets.apify_token, "APIFY_TOKEN")?;
        Ok(Arc::new(ApifyPriceSource::new(
            self.config.prices.clone(),
            token.to_string(),
        )))
    }

    fn joiner(&self) -> Arc<dyn AudioJoiner> {
        let speech = &self.config.speech;
        match speech.joiner.as_str() {
            "concat" => Arc::new(ConcatJoiner),
            _ => Arc::new(FfmpegJoiner::new(&speech.ffmpeg_path, speech.sampling_rate)),
        }
    }

    /// Assemble the agent with only the collaborators `request` needs
    pub async fn build_agent(
        &self,
        request: &BuyRequest,
        backend: Option<BackendKind>,
    ) -> Result<BuyerAgent> {
        let plan = PurchasePlan::from_config(&self.config.purchase)?;
        let backend = self.backend(backend.unwrap_or(self.config.purchase.backend));

        let mut agent = BuyerAgent::new(
            self.price_source()?,
            backend,
            self.resolve_model().await,
            plan,
            self.config.retry.clone(),
        );

        if request.dialog.is_some() {
            let token = Secrets::require(&self.secrets.rime_token, "RIME_TOKEN")?;
            let synthesizer = RimeSynthesizer::new(self.config.speech.clone(), token.to_string());
            agent = agent.with_speech(Arc::new(synthesizer), self.joiner());
        }

        if request.negotiate {
            let key = Secrets::require(&self.secrets.tavus_key, "TAVUS_KEY")?;
            let assistant = TavusAssistant::new(&self.config.assistant.base_url, key.to_string());
            agent = agent.with_assistant(Arc::new(assistant), &self.config.assistant.replica_id);
        }

        Ok(agent)
    }

    /// Full buyer flow for one request
    pub async fn buy(&self, request: &BuyRequest, backend: Option<BackendKind>) -> Result<BuyerReport> {
        let agent = self.build_agent(request, backend).await?;
        agent.run(request).await
    }

    /// Price range for a product
    pub async fn prices(&self, product: &str) -> Result<PriceBounds> {
        let source = self.price_source()?;
        with_retry(&self.config.retry, "price lookup", || source.price_bounds(product)).await
    }

    /// One settlement with the given prices; unset prices come from the configuration
    pub async fn settle(
        &self,
        max_price: Option<f64>,
        seller_a: Option<f64>,
        seller_b: Option<f64>,
        backend: Option<BackendKind>,
    ) -> Result<PurchaseOutcome> {
        let defaults = &self.config.purchase;
        let purchase = PurchaseConfig {
            backend: backend.unwrap_or(defaults.backend),
            buyer_max_price_sol: max_price.unwrap_or(defaults.buyer_max_price_sol),
            seller_a_price_sol: seller_a.unwrap_or(defaults.seller_a_price_sol),
            seller_b_price_sol: seller_b.unwrap_or(defaults.seller_b_price_sol),
            ..defaults.clone()
        };

        let plan = PurchasePlan::from_config(&purchase)?;

        let backend = self.backend(purchase.backend);
        simulate_purchase(backend.as_ref(), &plan).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::DialogScript;
    use crate::error::AgentError;
    use crate::settlement::{SellerSlot, SettlementResult};

    fn app() -> BuyerApp {
        let mut config = AgentConfig::default();
        config.ledger.poll_interval_ms = 1;
        BuyerApp::new(config, Secrets::default())
    }

    #[tokio::test]
    async fn test_settle_on_both_backends() {
        let app = app();
        for kind in [BackendKind::Memory, BackendKind::Ledger] {
            let outcome = app
                .settle(Some(40.0), Some(45.0), Some(30.0), Some(kind))
                .await
                .unwrap();
            assert_eq!(outcome.result.winner(), Some(SellerSlot::B));
            assert_eq!(outcome.result.amount(), Some(30_000_000_000));
            assert!(outcome.state.is_completed());
        }
    }

    #[tokio::test]
    async fn test_settle_no_trade() {
        let outcome = app()
            .settle(Some(15.0), Some(27.0), Some(25.0), Some(BackendKind::Memory))
            .await
            .unwrap();
        assert_eq!(outcome.result, SettlementResult::NoTrade);
    }

    #[tokio::test]
    async fn test_settle_uses_configured_prices() {
        let outcome = app()
            .settle(None, None, None, Some(BackendKind::Memory))
            .await
            .unwrap();
        assert_eq!(outcome.result.winner(), Some(SellerSlot::B));
        assert_eq!(outcome.result.amount(), Some(1_200_000_000));
    }

    #[tokio::test]
    async fn test_buy_on_ledger_funds_buyer_for_max_price() {
        let mut config = AgentConfig::default();
        config.ledger.poll_interval_ms = 1;
        config.purchase.buyer_max_price_sol = 40.0;
        config.purchase.seller_a_price_sol = 45.0;
        config.purchase.seller_b_price_sol = 30.0;
        let app = BuyerApp::new(config, Secrets::default());

        let plan = PurchasePlan::from_config(&app.config().purchase).unwrap();
        let backend = app.backend(BackendKind::Ledger);
        let outcome = simulate_purchase(backend.as_ref(), &plan).await.unwrap();

        assert_eq!(outcome.result.winner(), Some(SellerSlot::B));
        assert_eq!(outcome.result.amount(), Some(30_000_000_000));
    }

    #[tokio::test]
    async fn test_model_defaults_without_sdk_key() {
        assert_eq!(app().resolve_model().await.to_string(), "default");
    }

    #[tokio::test]
    async fn test_missing_secrets() {
        let app = app();

        let err = app.prices("gloves").await.unwrap_err();
        assert!(matches!(err, AgentError::MissingConfig(ref name) if name == "APIFY_TOKEN"));

        let app = BuyerApp::new(
            AgentConfig::default(),
            Secrets {
                apify_token: Some("token".to_string()),
                ..Secrets::default()
            },
        );
        let request = BuyRequest {
            product: "gloves".to_string(),
            dialog: Some(DialogScript::Agreement),
            negotiate: false,
        };
        let err = app.build_agent(&request, None).await.err().unwrap();
        assert!(matches!(err, AgentError::MissingConfig(ref name) if name == "RIME_TOKEN"));
    }
}
