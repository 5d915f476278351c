//! Hosted negotiation-assistant conversations

use crate::error::{AgentError, CollaboratorFailure, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::check_status;

const SERVICE: &str = "tavus";

/// Request to open a conversation with a replica
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationRequest {
    pub replica_id: String,
    pub conversational_context: String,
}

/// Starts a hosted conversational session
#[async_trait]
pub trait NegotiationAssistant: Send + Sync {
    /// Returns the service's opaque session descriptor
    async fn start(&self, request: &ConversationRequest) -> Result<serde_json::Value>;
}

/// Assistant service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantConfig {
    pub base_url: String,
    pub replica_id: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            base_url: "https://tavusapi.com".to_string(),
            replica_id: "rb17cf590e15".to_string(),
        }
    }
}

/// Tavus conversations client
pub struct TavusAssistant {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl TavusAssistant {
    pub fn new(base_url: &str, api_key: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl NegotiationAssistant for TavusAssistant {
    async fn start(&self, request: &ConversationRequest) -> Result<serde_json::Value> {
        let response = self
            .client
            .post(format!("{}/v2/conversations", self.base_url))
            .header("x-api-key", self.api_key.as_str())
            .json(request)
            .send()
            .await
            .map_err(|e| AgentError::transport(SERVICE, e))?;

        check_status(SERVICE, response)?
            .json()
            .await
            .map_err(|e| AgentError::collaborator(SERVICE, CollaboratorFailure::Schema(e.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_field_names() {
        let request = ConversationRequest {
            replica_id: "r1".to_string(),
            conversational_context: "summarize".to_string(),
        };

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "replica_id": "r1",
                "conversational_context": "summarize",
            })
        );
    }

    #[test]
    fn test_base_url_trimmed() {
        let assistant = TavusAssistant::new("https://tavusapi.com/", "key".to_string());
        assert_eq!(assistant.base_url, "https://tavusapi.com");
    }
}
