//! Ledger-backed settlement: submit instructions, poll for confirmation

use crate::collaborators::retry::{with_retry, RetryPolicy};
use crate::error::{AgentError, CollaboratorFailure, Result, SettlementError};
use crate::types::{PartyId, SessionHandle, SessionId, TxSignature};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;

use super::engine::SettlementBackend;
use super::session::MarketplaceSession;
use super::types::{SellerSlot, SettlementResult};

const LEDGER: &str = "ledger";

/// Instructions understood by the deployed marketplace program
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketplaceInstruction {
    Initialize {
        buyer: PartyId,
        seller_a: PartyId,
        seller_b: PartyId,
    },
    SetMaxPrice {
        session: SessionId,
        amount: i64,
    },
    SetSellerPrice {
        session: SessionId,
        slot: SellerSlot,
        amount: i64,
    },
    ExecuteTransaction {
        session: SessionId,
    },
}

/// Why the program rejected a transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerRejection {
    Program(SettlementError),
    AccountNotFound(SessionId),
    AccountInUse(SessionId),
    InsufficientFunds { required: u64, available: u64 },
}

impl From<LedgerRejection> for AgentError {
    fn from(rejection: LedgerRejection) -> Self {
        match rejection {
            LedgerRejection::Program(err) => AgentError::Settlement(err),
            LedgerRejection::AccountNotFound(id) => AgentError::SessionNotFound(id.0),
            LedgerRejection::AccountInUse(id) => AgentError::SessionAlreadyExists(id.0),
            LedgerRejection::InsufficientFunds {
                required,
                available,
            } => AgentError::InsufficientFunds {
                required,
                available,
            },
        }
    }
}

/// Confirmation state of a submitted transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfirmationStatus {
    Pending,
    Confirmed,
    Rejected(LedgerRejection),
}

/// Client for a ledger hosting the marketplace program
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Request test lamports for a party
    async fn request_airdrop(&self, party: &PartyId, lamports: u64) -> Result<TxSignature>;

    /// Submit one instruction as a transaction
    async fn submit(&self, instruction: MarketplaceInstruction) -> Result<TxSignature>;

    /// Current confirmation state of a transaction
    async fn confirmation(&self, signature: &TxSignature) -> Result<ConfirmationStatus>;

    /// Fetch a session account
    async fn fetch_session(&self, session: &SessionId) -> Result<Option<MarketplaceSession>>;

    /// Lamport balance of a party
    async fn balance(&self, party: &PartyId) -> Result<u64>;
}

/// Ledger confirmation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Interval between confirmation polls in milliseconds
    pub poll_interval_ms: u64,

    /// Give up waiting for confirmation after this many milliseconds
    pub confirm_timeout_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 400,
            confirm_timeout_ms: 30_000,
        }
    }
}

impl LedgerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(AgentError::Configuration(
                "ledger.poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.confirm_timeout_ms < self.poll_interval_ms {
            return Err(AgentError::Configuration(
                "ledger.confirm_timeout_ms must be at least ledger.poll_interval_ms".to_string(),
            ));
        }
        Ok(())
    }
}

/// Settlement back end that drives a ledger program
pub struct LedgerBackend<C: LedgerClient> {
    client: C,
    config: LedgerConfig,
    retry: RetryPolicy,
}

impl<C: LedgerClient> LedgerBackend<C> {
    pub fn new(client: C, config: LedgerConfig, retry: RetryPolicy) -> Self {
        Self {
            client,
            config,
            retry,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Poll until the transaction leaves the pending state
    pub async fn confirm(&self, signature: &TxSignature) -> Result<()> {
        let poll = Duration::from_millis(self.config.poll_interval_ms);
        let wait = async {
            loop {
                match self.client.confirmation(signature).await {
                    Ok(ConfirmationStatus::Confirmed) => return Ok(()),
                    Ok(ConfirmationStatus::Rejected(rejection)) => {
                        return Err(AgentError::from(rejection))
                    }
                    Ok(ConfirmationStatus::Pending) => {
                        tracing::debug!("Transaction {} pending", signature);
                        tokio::time::sleep(poll).await;
                    }
                    Err(err) => return Err(err),
                }
            }
        };

        let timeout = Duration::from_millis(self.config.confirm_timeout_ms);
        match tokio::time::timeout(timeout, wait).await {
            Ok(outcome) => outcome,
            Err(_) => Err(AgentError::ConfirmationTimeout(signature.0.clone())),
        }
    }

    async fn send(&self, instruction: MarketplaceInstruction) -> Result<TxSignature> {
        let signature = self.client.submit(instruction).await?;
        self.confirm(&signature).await?;
        Ok(signature)
    }

    async fn account(&self, id: &SessionId) -> Result<MarketplaceSession> {
        self.client
            .fetch_session(id)
            .await?
            .ok_or_else(|| AgentError::SessionNotFound(id.0.clone()))
    }
}

#[async_trait]
impl<C: LedgerClient> SettlementBackend for LedgerBackend<C> {
    fn name(&self) -> &'static str {
        "ledger"
    }

    async fn fund_party(&self, party: &PartyId, lamports: u64) -> Result<()> {
        let signature = with_retry(&self.retry, "airdrop", || {
            self.client.request_airdrop(party, lamports)
        })
        .await?;
        self.confirm(&signature).await?;

        tracing::info!("Airdropped {} lamports to {}: {}", lamports, party, signature);
        Ok(())
    }

    async fn create_session(
        &self,
        buyer: &PartyId,
        seller_a: &PartyId,
        seller_b: &PartyId,
    ) -> Result<SessionHandle> {
        // Validate locally before paying for a transaction
        let id = MarketplaceSession::new(buyer.clone(), seller_a.clone(), seller_b.clone())?
            .id()
            .clone();

        let signature = self
            .send(MarketplaceInstruction::Initialize {
                buyer: buyer.clone(),
                seller_a: seller_a.clone(),
                seller_b: seller_b.clone(),
            })
            .await?;

        tracing::info!("Marketplace {} initialized: {}", id, signature);
        Ok(SessionHandle { id })
    }

    async fn set_buyer_max_price(&self, session: &SessionHandle, amount: i64) -> Result<()> {
        let signature = self
            .send(MarketplaceInstruction::SetMaxPrice {
                session: session.id.clone(),
                amount,
            })
            .await?;

        tracing::info!("Maximum price set to {} lamports: {}", amount, signature);
        Ok(())
    }

    async fn set_seller_price(
        &self,
        session: &SessionHandle,
        slot: SellerSlot,
        amount: i64,
    ) -> Result<()> {
        let signature = self
            .send(MarketplaceInstruction::SetSellerPrice {
                session: session.id.clone(),
                slot,
                amount,
            })
            .await?;

        tracing::info!("{} price set to {} lamports: {}", slot, amount, signature);
        Ok(())
    }

    async fn settle(&self, session: &SessionHandle) -> Result<SettlementResult> {
        let signature = self
            .send(MarketplaceInstruction::ExecuteTransaction {
                session: session.id.clone(),
            })
            .await?;
        tracing::info!("Transaction executed: {}", signature);

        let account = self.account(&session.id).await?;
        Ok(account.result())
    }

    async fn get_state(&self, session: &SessionHandle) -> Result<MarketplaceSession> {
        self.account(&session.id).await
    }
}

/// Settings for the in-process ledger
#[derive(Debug, Clone, Default)]
pub struct SimulatedLedgerOptions {
    /// Polls a transaction reports `Pending` before its final status
    pub confirmation_polls: u32,

    /// Airdrop requests answered with a rate-limit error before succeeding
    pub rate_limited_airdrops: u32,

    /// Wait requested by a rate-limited airdrop
    pub retry_after_ms: u64,
}

struct TxRecord {
    polls_remaining: u32,
    outcome: ConfirmationStatus,
}

#[derive(Default)]
struct LedgerState {
    accounts: HashMap<SessionId, MarketplaceSession>,
    balances: HashMap<PartyId, u64>,
    transactions: HashMap<TxSignature, TxRecord>,
    sequence: u64,
    rate_limited_airdrops: u32,
}

impl LedgerState {
    fn record(&mut self, payload: &[u8], polls: u32, outcome: ConfirmationStatus) -> TxSignature {
        self.sequence += 1;

        let mut hasher = Sha256::new();
        hasher.update(self.sequence.to_be_bytes());
        hasher.update(payload);
        let signature = TxSignature(hex::encode(hasher.finalize()));

        self.transactions.insert(
            signature.clone(),
            TxRecord {
                polls_remaining: polls,
                outcome,
            },
        );
        signature
    }

    fn account_mut(
        &mut self,
        id: &SessionId,
    ) -> std::result::Result<&mut MarketplaceSession, LedgerRejection> {
        self.accounts
            .get_mut(id)
            .ok_or_else(|| LedgerRejection::AccountNotFound(id.clone()))
    }

    /// Apply one instruction; a rejected instruction leaves no trace
    fn execute(
        &mut self,
        instruction: &MarketplaceInstruction,
    ) -> std::result::Result<(), LedgerRejection> {
        match instruction {
            MarketplaceInstruction::Initialize {
                buyer,
                seller_a,
                seller_b,
            } => {
                let session =
                    MarketplaceSession::new(buyer.clone(), seller_a.clone(), seller_b.clone())
                        .map_err(LedgerRejection::Program)?;
                if self.accounts.contains_key(session.id()) {
                    return Err(LedgerRejection::AccountInUse(session.id().clone()));
                }
                self.accounts.insert(session.id().clone(), session);
            }
            MarketplaceInstruction::SetMaxPrice { session, amount } => {
                self.account_mut(session)?
                    .set_buyer_max_price(*amount)
                    .map_err(LedgerRejection::Program)?;
            }
            MarketplaceInstruction::SetSellerPrice {
                session,
                slot,
                amount,
            } => {
                self.account_mut(session)?
                    .set_seller_price(*slot, *amount)
                    .map_err(LedgerRejection::Program)?;
            }
            MarketplaceInstruction::ExecuteTransaction { session } => {
                let mut account = self.account_mut(session)?.clone();
                let result = account.settle().map_err(LedgerRejection::Program)?;

                if let SettlementResult::Trade { party, amount, .. } = &result {
                    let buyer = account.buyer().clone();
                    let available = self.balances.get(&buyer).copied().unwrap_or(0);
                    if available < *amount {
                        return Err(LedgerRejection::InsufficientFunds {
                            required: *amount,
                            available,
                        });
                    }
                    self.balances.insert(buyer, available - amount);
                    *self.balances.entry(party.clone()).or_insert(0) += amount;
                }
                self.accounts.insert(session.clone(), account);
            }
        }
        Ok(())
    }
}

/// In-process ledger running the marketplace program
///
/// Instructions execute in submission order. Their status is reported as
/// pending for a configurable number of polls, like a cluster that has not
/// yet reached the requested commitment level.
pub struct SimulatedLedger {
    options: SimulatedLedgerOptions,
    state: Mutex<LedgerState>,
}

impl SimulatedLedger {
    pub fn new(options: SimulatedLedgerOptions) -> Self {
        let state = LedgerState {
            rate_limited_airdrops: options.rate_limited_airdrops,
            ..LedgerState::default()
        };
        Self {
            options,
            state: Mutex::new(state),
        }
    }
}

impl Default for SimulatedLedger {
    fn default() -> Self {
        Self::new(SimulatedLedgerOptions::default())
    }
}

#[async_trait]
impl LedgerClient for SimulatedLedger {
    async fn request_airdrop(&self, party: &PartyId, lamports: u64) -> Result<TxSignature> {
        let mut state = self.state.lock().await;
        if state.rate_limited_airdrops > 0 {
            state.rate_limited_airdrops -= 1;
            return Err(AgentError::collaborator(
                LEDGER,
                CollaboratorFailure::RateLimited {
                    retry_after_ms: self.options.retry_after_ms,
                },
            ));
        }

        *state.balances.entry(party.clone()).or_insert(0) += lamports;
        let payload = serde_json::to_vec(&(party, lamports))?;
        Ok(state.record(
            &payload,
            self.options.confirmation_polls,
            ConfirmationStatus::Confirmed,
        ))
    }

    async fn submit(&self, instruction: MarketplaceInstruction) -> Result<TxSignature> {
        let payload = serde_json::to_vec(&instruction)?;
        let mut state = self.state.lock().await;

        let outcome = match state.execute(&instruction) {
            Ok(()) => ConfirmationStatus::Confirmed,
            Err(rejection) => ConfirmationStatus::Rejected(rejection),
        };
        Ok(state.record(&payload, self.options.confirmation_polls, outcome))
    }

    async fn confirmation(&self, signature: &TxSignature) -> Result<ConfirmationStatus> {
        let mut state = self.state.lock().await;
        let record = state.transactions.get_mut(signature).ok_or_else(|| {
            AgentError::TransactionRejected(format!("unknown signature {}", signature))
        })?;

        if record.polls_remaining > 0 {
            record.polls_remaining -= 1;
            return Ok(ConfirmationStatus::Pending);
        }
        Ok(record.outcome.clone())
    }

    async fn fetch_session(&self, session: &SessionId) -> Result<Option<MarketplaceSession>> {
        Ok(self.state.lock().await.accounts.get(session).cloned())
    }

    async fn balance(&self, party: &PartyId) -> Result<u64> {
        Ok(self
            .state
            .lock()
            .await
            .balances
            .get(party)
            .copied()
            .unwrap_or(0))
    }
}
