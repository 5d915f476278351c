//! Agent configuration loaded from TOML, secrets from the environment

use crate::collaborators::{ApifyConfig, AssistantConfig, FlagsConfig, RetryPolicy, SpeechConfig};
use crate::error::{AgentError, Result};
use crate::settlement::LedgerConfig;
use crate::types::sol_to_lamports;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Which settlement back end runs the purchase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Memory,
    Ledger,
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(BackendKind::Memory),
            "ledger" => Ok(BackendKind::Ledger),
            other => Err(format!("unknown back end: {} (expected memory or ledger)", other)),
        }
    }
}

/// Prices and funding for the simulated purchase, in SOL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseConfig {
    pub backend: BackendKind,
    pub buyer_max_price_sol: f64,
    pub seller_a_price_sol: f64,
    pub seller_b_price_sol: f64,
    pub buyer_airdrop_sol: f64,
    pub seller_airdrop_sol: f64,
}

impl Default for PurchaseConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Ledger,
            buyer_max_price_sol: 1.5,
            seller_a_price_sol: 1.8,
            seller_b_price_sol: 1.2,
            buyer_airdrop_sol: 2.0,
            seller_airdrop_sol: 1.0,
        }
    }
}

impl PurchaseConfig {
    fn validate(&self) -> Result<()> {
        let amounts = [
            ("buyer_max_price_sol", self.buyer_max_price_sol),
            ("seller_a_price_sol", self.seller_a_price_sol),
            ("seller_b_price_sol", self.seller_b_price_sol),
            ("buyer_airdrop_sol", self.buyer_airdrop_sol),
            ("seller_airdrop_sol", self.seller_airdrop_sol),
        ];
        for (field, value) in amounts {
            sol_to_lamports(value).map_err(|_| {
                AgentError::Configuration(format!(
                    "purchase.{} must be a non-negative amount, got {}",
                    field, value
                ))
            })?;
        }
        Ok(())
    }
}

/// Buyer agent configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub prices: ApifyConfig,
    pub flags: FlagsConfig,
    pub speech: SpeechConfig,
    pub assistant: AssistantConfig,
    pub purchase: PurchaseConfig,
    pub ledger: LedgerConfig,
    pub retry: RetryPolicy,
}

impl AgentConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            AgentError::Configuration(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml(&content)?;

        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AgentConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.prices.dataset_id.trim().is_empty() {
            return Err(AgentError::Configuration(
                "prices.dataset_id must not be empty".to_string(),
            ));
        }
        if self.assistant.replica_id.trim().is_empty() {
            return Err(AgentError::Configuration(
                "assistant.replica_id must not be empty".to_string(),
            ));
        }
        if self.speech.sampling_rate == 0 {
            return Err(AgentError::Configuration(
                "speech.sampling_rate must be greater than 0".to_string(),
            ));
        }
        if !matches!(self.speech.joiner.as_str(), "ffmpeg" | "concat") {
            return Err(AgentError::Configuration(format!(
                "speech.joiner must be \"ffmpeg\" or \"concat\", got {:?}",
                self.speech.joiner
            )));
        }

        self.purchase.validate()?;
        self.ledger.validate()?;
        self.retry.validate()?;
        Ok(())
    }
}

/// API credentials for the hosted services
#[derive(Clone, Default)]
pub struct Secrets {
    pub apify_token: Option<String>,
    pub rime_token: Option<String>,
    pub tavus_key: Option<String>,
    pub launch_darkly: Option<String>,
}

impl Secrets {
    /// Read credentials from the environment, after loading `.env` if present
    pub fn from_env() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }

        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            apify_token: var("APIFY_TOKEN"),
            rime_token: var("RIME_TOKEN"),
            tavus_key: var("TAVUS_KEY"),
            launch_darkly: var("LAUNCH_DARKLY"),
        }
    }

    /// Credential that must be present for a feature to run
    pub fn require<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str> {
        value
            .as_deref()
            .ok_or_else(|| AgentError::MissingConfig(name.to_string()))
    }
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |v: &Option<String>| if v.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Secrets")
            .field("apify_token", &mask(&self.apify_token))
            .field("rime_token", &mask(&self.rime_token))
            .field("tavus_key", &mask(&self.tavus_key))
            .field("launch_darkly", &mask(&self.launch_darkly))
            .finish()
    }
}

/// Write an example configuration file
pub fn create_example_config(path: impl AsRef<Path>) -> Result<()> {
    AgentConfig::default().save(path)
}
