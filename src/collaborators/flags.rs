//! Feature-flag lookup of the model label used in logs

use crate::error::{AgentError, CollaboratorFailure, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::check_status;

const SERVICE: &str = "launchdarkly";

/// Evaluation context sent with a flag request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagContext {
    pub kind: String,
    pub key: String,
    pub name: String,
}

impl Default for FlagContext {
    fn default() -> Self {
        Self {
            kind: "user".to_string(),
            key: "user-key-123abc".to_string(),
            name: "Sandy".to_string(),
        }
    }
}

/// Flag service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagsConfig {
    /// Relay proxy or SDK endpoint
    pub base_url: String,
    pub flag_key: String,
    pub context: FlagContext,
    /// Startup budget for the lookup in milliseconds
    pub timeout_ms: u64,
    /// Label used when the lookup fails or times out
    pub default_model: String,
}

impl Default for FlagsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://sdk.launchdarkly.com".to_string(),
            flag_key: "model".to_string(),
            context: FlagContext::default(),
            timeout_ms: 2_000,
            default_model: "default".to_string(),
        }
    }
}

/// Source of the model identifier
#[async_trait]
pub trait ModelSource: Send + Sync {
    async fn model(&self) -> Result<String>;
}

/// Model label resolved once at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelLabel(pub String);

impl ModelLabel {
    /// Ask `source` for the model, falling back to `default` on error or timeout
    pub async fn resolve(source: &dyn ModelSource, timeout: Duration, default: &str) -> Self {
        match tokio::time::timeout(timeout, source.model()).await {
            Ok(Ok(model)) => {
                tracing::info!("Model flag resolved: {}", model);
                Self(model)
            }
            Ok(Err(e)) => {
                tracing::warn!("Model flag lookup failed, using {}: {}", default, e);
                Self(default.to_string())
            }
            Err(_) => {
                tracing::warn!("Model flag lookup timed out after {:?}, using {}", timeout, default);
                Self(default.to_string())
            }
        }
    }
}

impl fmt::Display for ModelLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fixed model label, for runs without a flag service
pub struct StaticModel(pub String);

#[async_trait]
impl ModelSource for StaticModel {
    async fn model(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Evaluates flags through a LaunchDarkly relay `REPORT` endpoint
pub struct RelayFlagSource {
    config: FlagsConfig,
    sdk_key: String,
    client: reqwest::Client,
}

impl RelayFlagSource {
    pub fn new(config: FlagsConfig, sdk_key: String) -> Self {
        Self {
            config,
            sdk_key,
            client: reqwest::Client::new(),
        }
    }
}

/// Pull a string flag value out of an evaluation response
pub fn flag_value(body: &serde_json::Value, flag_key: &str) -> Result<String> {
    let value = body
        .get(flag_key)
        .and_then(|flag| flag.get("value"))
        .ok_or_else(|| {
            AgentError::collaborator(
                SERVICE,
                CollaboratorFailure::Schema(format!("flag {} missing", flag_key)),
            )
        })?;

    value.as_str().map(str::to_string).ok_or_else(|| {
        AgentError::collaborator(
            SERVICE,
            CollaboratorFailure::Schema(format!("flag {} is not a string: {}", flag_key, value)),
        )
    })
}

#[async_trait]
impl ModelSource for RelayFlagSource {
    async fn model(&self) -> Result<String> {
        let method = reqwest::Method::from_bytes(b"REPORT").map_err(|e| {
            AgentError::collaborator(SERVICE, CollaboratorFailure::Transport(e.to_string()))
        })?;
        let url = format!(
            "{}/sdk/evalx/contexts",
            self.config.base_url.trim_end_matches('/')
        );

        let response = self
            .client
            .request(method, url)
            .header(reqwest::header::AUTHORIZATION, self.sdk_key.as_str())
            .json(&self.config.context)
            .send()
            .await
            .map_err(|e| AgentError::transport(SERVICE, e))?;
        let body: serde_json::Value = check_status(SERVICE, response)?
            .json()
            .await
            .map_err(|e| {
                AgentError::collaborator(SERVICE, CollaboratorFailure::Schema(e.to_string()))
            })?;

        flag_value(&body, &self.config.flag_key)
    }
}
