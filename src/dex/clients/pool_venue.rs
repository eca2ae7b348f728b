//! Constant-product venue over a locally maintained pool table.
//!
//! Backs the Orca and Raydium adapters: pool reserves are fed in as liquidity snapshots and
//! quotes are priced with x·y=k (fee on the input side).

use async_trait::async_trait;
use chrono::Duration;
use log::{debug, info};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::dex::api::SourceAdapter;
use crate::dex::quote::{price_impact_bps, Quote, RouteLeg};
use crate::error::{Result, SourceError};
use crate::routing::cost::ConstantProduct;
use crate::routing::graph::LiquiditySnapshot;
use crate::utils::{Clock, SystemClock};

pub const ORCA_COMPUTE_COST: u64 = 3000;
pub const RAYDIUM_COMPUTE_COST: u64 = 2500;

#[derive(Debug, Clone)]
pub struct PoolVenue {
    name: String,
    pools: Arc<RwLock<Vec<LiquiditySnapshot>>>,
    compute_cost: u64,
    quote_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl PoolVenue {
    pub fn new(name: impl Into<String>, compute_cost: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            name: name.into(),
            pools: Arc::new(RwLock::new(Vec::new())),
            compute_cost,
            quote_ttl: Duration::seconds(60),
            clock,
        }
    }

    pub fn orca(clock: Arc<dyn Clock>) -> Self {
        Self::new("Orca", ORCA_COMPUTE_COST, clock)
    }

    pub fn raydium(clock: Arc<dyn Clock>) -> Self {
        Self::new("Raydium", RAYDIUM_COMPUTE_COST, clock)
    }

    pub fn with_quote_ttl(mut self, ttl: Duration) -> Self {
        self.quote_ttl = ttl;
        self
    }

    /// Replaces the pool with the same `pool_ref`, or adds it. Rejects fees above 10000 bps.
    pub async fn upsert_pool(&self, mut snapshot: LiquiditySnapshot) -> Result<()> {
        snapshot.venue = self.name.clone();
        snapshot.edges()?;
        let mut pools = self.pools.write().await;
        match pools.iter_mut().find(|p| p.pool_ref == snapshot.pool_ref) {
            Some(existing) => *existing = snapshot,
            None => {
                info!(
                    "🏊 {} pool {} registered ({} / {})",
                    self.name, snapshot.pool_ref, snapshot.token_a, snapshot.token_b
                );
                pools.push(snapshot);
            }
        }
        Ok(())
    }

    pub async fn snapshots(&self) -> Vec<LiquiditySnapshot> {
        self.pools.read().await.clone()
    }
}

impl Default for PoolVenue {
    fn default() -> Self {
        Self::orca(Arc::new(SystemClock))
    }
}

#[async_trait]
impl SourceAdapter for PoolVenue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn quote(
        &self,
        input_token: &str,
        output_token: &str,
        amount: u128,
        _max_slippage_bps: u16, // enforced at submission by the slippage guard
    ) -> std::result::Result<Option<Quote>, SourceError> {
        let pools = self.pools.read().await;

        let best = pools
            .iter()
            .filter_map(|pool| {
                let (reserve_in, reserve_out) = pool.oriented(input_token, output_token)?;
                let (out, _fee) = ConstantProduct::amount_out(amount, reserve_in, reserve_out, pool.fee_bps);
                (out > 0).then_some((pool, reserve_in, reserve_out, out))
            })
            .max_by_key(|(_, _, _, out)| *out);

        let Some((pool, reserve_in, reserve_out, amount_out)) = best else {
            debug!("{}: no pool for {} -> {}", self.name, input_token, output_token);
            return Ok(None);
        };

        let spot = ConstantProduct::spot_out(amount, reserve_in, reserve_out);
        let impact = price_impact_bps(spot, amount_out);
        let leg = RouteLeg {
            venue: self.name.clone(),
            input_token: input_token.to_string(),
            output_token: output_token.to_string(),
            input_amount: amount,
            output_amount: amount_out,
            pool_ref: pool.pool_ref.clone(),
            price_impact_bps: impact,
        };

        let quote = Quote::from_legs(vec![leg], impact, self.compute_cost, self.clock.now(), self.quote_ttl)
            .ok_or_else(|| SourceError::Protocol(format!("{} produced an invalid quote", self.name)))?;
        debug!(
            "{} quote {} -> {}: {} -> {} ({} bps)",
            self.name, input_token, output_token, amount, amount_out, impact
        );
        Ok(Some(quote))
    }

    async fn has_liquidity(
        &self,
        input_token: &str,
        output_token: &str,
    ) -> std::result::Result<bool, SourceError> {
        let pools = self.pools.read().await;
        Ok(pools.iter().any(|pool| {
            matches!(pool.oriented(input_token, output_token), Some((a, b)) if a > 0 && b > 0)
        }))
    }
}
