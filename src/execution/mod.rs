//! Collaborators the engine hands finished work to: a submitter that executes a protected
//! quote, and a persister that records quotes and trades.
//!
//! Persistence is best-effort; callers log `Persister` errors and carry on.

pub mod redis_persister;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::dex::quote::{amount_str, Quote, Token};
use crate::error::{Result, RouterError};
use crate::routing::mev_protection::{ExecutionStrategy, RiskLevel};

pub use redis_persister::RedisPersister;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Submitted,
    Confirmed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResult {
    pub transaction_ref: String,
    pub status: SubmissionStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRecord {
    pub quote_id: Uuid,
    pub input_token: Token,
    pub output_token: Token,
    #[serde(with = "amount_str")]
    pub input_amount: u128,
    #[serde(with = "amount_str")]
    pub output_amount: u128,
    pub transaction_ref: String,
    pub status: SubmissionStatus,
    pub risk_level: RiskLevel,
    pub executed_at: DateTime<Utc>,
}

impl TradeRecord {
    pub fn new(
        quote: &Quote,
        result: &SubmissionResult,
        risk_level: RiskLevel,
        executed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            quote_id: quote.quote_id,
            input_token: quote.input_token.clone(),
            output_token: quote.output_token.clone(),
            input_amount: quote.input_amount,
            output_amount: quote.output_amount,
            transaction_ref: result.transaction_ref.clone(),
            status: result.status,
            risk_level,
            executed_at,
        }
    }
}

/// Executes a quote under the given protection strategy.
#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(&self, quote: &Quote, strategy: &ExecutionStrategy) -> Result<SubmissionResult>;
}

/// Durable record of quotes and trades.
#[async_trait]
pub trait Persister: Send + Sync {
    async fn record_quote(&self, quote: &Quote) -> Result<()>;
    async fn record_trade(&self, trade: &TradeRecord) -> Result<()>;
}

/// Accepts every submission without touching a chain. Keeps what it was given for inspection.
#[derive(Debug, Clone, Default)]
pub struct SimulatedSubmitter {
    submissions: Arc<Mutex<Vec<(Uuid, ExecutionStrategy)>>>,
    reject_with: Option<String>,
}

impl SimulatedSubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A submitter whose every call fails with `reason`.
    pub fn rejecting(reason: impl Into<String>) -> Self {
        Self {
            reject_with: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn submissions(&self) -> Vec<(Uuid, ExecutionStrategy)> {
        self.submissions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl Submitter for SimulatedSubmitter {
    async fn submit(&self, quote: &Quote, strategy: &ExecutionStrategy) -> Result<SubmissionResult> {
        if let Some(reason) = &self.reject_with {
            return Err(RouterError::SubmissionError(reason.clone()));
        }
        self.submissions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((quote.quote_id, strategy.clone()));

        let transaction_ref = format!("sim-{}", Uuid::new_v4());
        info!(
            "📝 [SIMULATED] {} via {} ({} risk, private: {}, priority fee: {})",
            quote.quote_id,
            strategy
                .legs
                .iter()
                .map(|l| l.venue.as_str())
                .collect::<Vec<_>>()
                .join(" → "),
            strategy.level,
            strategy.private_submission,
            strategy.priority_fee
        );
        Ok(SubmissionResult {
            transaction_ref,
            status: SubmissionStatus::Submitted,
        })
    }
}

/// Writes quotes and trades to the log only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogPersister;

#[async_trait]
impl Persister for LogPersister {
    async fn record_quote(&self, quote: &Quote) -> Result<()> {
        info!(
            "🗂️  Quote {}: {} {} -> {} {} via {}",
            quote.quote_id,
            quote.input_amount,
            quote.input_token,
            quote.output_amount,
            quote.output_token,
            quote.route_display()
        );
        Ok(())
    }

    async fn record_trade(&self, trade: &TradeRecord) -> Result<()> {
        info!(
            "🗂️  Trade {} for quote {}: {:?} ({} risk)",
            trade.transaction_ref, trade.quote_id, trade.status, trade.risk_level
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPersister;

#[async_trait]
impl Persister for NoopPersister {
    async fn record_quote(&self, _quote: &Quote) -> Result<()> {
        Ok(())
    }

    async fn record_trade(&self, _trade: &TradeRecord) -> Result<()> {
        Ok(())
    }
}
