//! Settlement back ends: the shared contract and the in-memory engine

use crate::error::{AgentError, Result};
use crate::types::{PartyId, SessionHandle, SessionId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use super::session::MarketplaceSession;
use super::types::{SellerSlot, SettlementResult};

/// Contract every settlement back end implements
#[async_trait]
pub trait SettlementBackend: Send + Sync {
    /// Back end name for logging
    fn name(&self) -> &'static str;

    /// Make sure a party can pay for its transactions
    async fn fund_party(&self, _party: &PartyId, _lamports: u64) -> Result<()> {
        Ok(())
    }

    /// Allocate a new active session
    async fn create_session(
        &self,
        buyer: &PartyId,
        seller_a: &PartyId,
        seller_b: &PartyId,
    ) -> Result<SessionHandle>;

    /// Commit the buyer's maximum price
    async fn set_buyer_max_price(&self, session: &SessionHandle, amount: i64) -> Result<()>;

    /// Commit a seller's minimum price
    async fn set_seller_price(
        &self,
        session: &SessionHandle,
        slot: SellerSlot,
        amount: i64,
    ) -> Result<()>;

    /// Run the settlement step
    async fn settle(&self, session: &SessionHandle) -> Result<SettlementResult>;

    /// Read-only snapshot of a session
    async fn get_state(&self, session: &SessionHandle) -> Result<MarketplaceSession>;
}

/// In-memory settlement engine
///
/// Every session sits behind its own lock, so operations on one session are
/// serialized while different sessions proceed independently.
#[derive(Default)]
pub struct InMemoryBackend {
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<MarketplaceSession>>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions ever created
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn session(&self, handle: &SessionHandle) -> Result<Arc<Mutex<MarketplaceSession>>> {
        self.sessions
            .read()
            .await
            .get(&handle.id)
            .cloned()
            .ok_or_else(|| AgentError::SessionNotFound(handle.id.0.clone()))
    }
}

#[async_trait]
impl SettlementBackend for InMemoryBackend {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    async fn create_session(
        &self,
        buyer: &PartyId,
        seller_a: &PartyId,
        seller_b: &PartyId,
    ) -> Result<SessionHandle> {
        let session = MarketplaceSession::new(buyer.clone(), seller_a.clone(), seller_b.clone())?;
        let id = session.id().clone();

        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&id) {
            return Err(AgentError::SessionAlreadyExists(id.0));
        }
        sessions.insert(id.clone(), Arc::new(Mutex::new(session)));

        tracing::info!("Created marketplace session {}", id);
        Ok(SessionHandle { id })
    }

    async fn set_buyer_max_price(&self, session: &SessionHandle, amount: i64) -> Result<()> {
        let entry = self.session(session).await?;
        let amount = entry.lock().await.set_buyer_max_price(amount)?;

        tracing::info!("Session {}: buyer max price set to {}", session, amount);
        Ok(())
    }

    async fn set_seller_price(
        &self,
        session: &SessionHandle,
        slot: SellerSlot,
        amount: i64,
    ) -> Result<()> {
        let entry = self.session(session).await?;
        let amount = entry.lock().await.set_seller_price(slot, amount)?;

        tracing::info!("Session {}: {} price set to {}", session, slot, amount);
        Ok(())
    }

    async fn settle(&self, session: &SessionHandle) -> Result<SettlementResult> {
        let entry = self.session(session).await?;
        let result = entry.lock().await.settle()?;

        match &result {
            SettlementResult::Trade { seller, amount, .. } => {
                tracing::info!("Session {} settled: {} wins at {}", session, seller, amount)
            }
            SettlementResult::NoTrade => {
                tracing::info!("Session {} settled with no trade", session)
            }
        }
        Ok(result)
    }

    async fn get_state(&self, session: &SessionHandle) -> Result<MarketplaceSession> {
        let entry = self.session(session).await?;
        let snapshot = entry.lock().await.clone();
        Ok(snapshot)
    }
}
