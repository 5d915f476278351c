//! Clients for the hosted services the buyer agent depends on

pub mod assistant;
pub mod flags;
pub mod prices;
pub mod retry;
pub mod speech;

pub use assistant::{AssistantConfig, ConversationRequest, NegotiationAssistant, TavusAssistant};
pub use flags::{FlagContext, FlagsConfig, ModelLabel, ModelSource, RelayFlagSource, StaticModel};
pub use prices::{ApifyConfig, ApifyPriceSource, Listing, PriceBounds, PriceSource};
pub use retry::{with_retry, RetryPolicy};
pub use speech::{
    make_dialog, AudioJoiner, ConcatJoiner, DialogLine, FfmpegJoiner, RimeSynthesizer, Speaker,
    SpeechConfig, SpeechSynthesizer,
};

use crate::error::{AgentError, CollaboratorFailure, Result};

/// Turn a non-success response into a collaborator error
pub(crate) fn check_status(service: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after_ms = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(|seconds| seconds.saturating_mul(1000))
            .unwrap_or(0);
        return Err(AgentError::collaborator(
            service,
            CollaboratorFailure::RateLimited { retry_after_ms },
        ));
    }

    Err(AgentError::collaborator(
        service,
        CollaboratorFailure::Status(status.as_u16()),
    ))
}
