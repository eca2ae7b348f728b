//! Shared fixtures for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use liquidity_flow::{
    dex::{Quote, RouteLeg, SourceAdapter},
    error::SourceError,
    utils::{Clock, SystemClock},
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

pub const SOL: &str = "So11111111111111111111111111111111111111112";
pub const USDC: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
pub const USDT: &str = "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Debug, Clone)]
pub enum Behavior {
    Quote { output: u128, impact_bps: u16 },
    Absent,
    Fail(SourceError),
    /// Sleeps far past any timeout the tests configure
    Hang,
    Panic,
}

/// Scripted venue that counts how often it is asked.
#[derive(Debug)]
pub struct MockAdapter {
    name: String,
    behavior: Behavior,
    calls: AtomicUsize,
    clock: Arc<dyn Clock>,
}

impl MockAdapter {
    pub fn new(name: &str, behavior: Behavior) -> Self {
        Self::with_clock(name, behavior, Arc::new(SystemClock))
    }

    pub fn with_clock(name: &str, behavior: Behavior, clock: Arc<dyn Clock>) -> Self {
        Self {
            name: name.to_string(),
            behavior,
            calls: AtomicUsize::new(0),
            clock,
        }
    }

    pub fn quoting(name: &str, output: u128, impact_bps: u16) -> Self {
        Self::new(name, Behavior::Quote { output, impact_bps })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for MockAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn quote(
        &self,
        input_token: &str,
        output_token: &str,
        amount: u128,
        _max_slippage_bps: u16,
    ) -> Result<Option<Quote>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Quote { output, impact_bps } => {
                let leg = RouteLeg {
                    venue: self.name.clone(),
                    input_token: input_token.to_string(),
                    output_token: output_token.to_string(),
                    input_amount: amount,
                    output_amount: *output,
                    pool_ref: format!("{}-pool", self.name.to_lowercase()),
                    price_impact_bps: *impact_bps,
                };
                Ok(Quote::from_legs(
                    vec![leg],
                    *impact_bps,
                    2500,
                    self.clock.now(),
                    ChronoDuration::seconds(60),
                ))
            }
            Behavior::Absent => Ok(None),
            Behavior::Fail(e) => Err(e.clone()),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(None)
            }
            Behavior::Panic => panic!("{} exploded", self.name),
        }
    }

    async fn has_liquidity(&self, _input_token: &str, _output_token: &str) -> Result<bool, SourceError> {
        match &self.behavior {
            Behavior::Quote { .. } => Ok(true),
            Behavior::Fail(e) => Err(e.clone()),
            _ => Ok(false),
        }
    }
}

pub fn adapters(mocks: &[Arc<MockAdapter>]) -> Vec<Arc<dyn SourceAdapter>> {
    mocks
        .iter()
        .map(|m| m.clone() as Arc<dyn SourceAdapter>)
        .collect()
}
