// src/engine/quote_engine.rs
//! The quote engine ties the core together.
//!
//! `quote` runs: validate → rate limit → route cache → deadline-bound fan-out plus a graph
//! search → risk assessment → cache and persist. `execute_swap` turns a cached quote into a
//! protected submission.

use chrono::Duration as ChronoDuration;
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::validation::{validate_request, QuoteRequest};
use crate::aggregator::QuoteAggregator;
use crate::cache::{CacheConfig, QuoteCache, RouteKey};
use crate::config::Config;
use crate::dex::clients::ORCA_COMPUTE_COST;
use crate::dex::quote::Quote;
use crate::error::{Result, RouterError};
use crate::execution::{LogPersister, Persister, SimulatedSubmitter, Submitter, TradeRecord};
use crate::routing::cost::{ConstantProduct, CostModels};
use crate::routing::graph::{LiquidityGraph, LiquiditySnapshot};
use crate::routing::mev_protection::{
    ExecutionStrategy, FrontRunningSignal, RiskAssessment, RiskAssessor, RiskAssessorConfig,
};
use crate::routing::pathfinder::{Pathfinder, PathfinderConfig};
use crate::utils::Clock;

pub const EXECUTION_MS_PER_LEG: u64 = 250;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    pub quote: Quote,
    pub risk: RiskAssessment,
    pub route_display: String,
    pub estimated_execution_ms: u64,
}

/// What happened when a cached quote was executed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapExecution {
    pub trade: TradeRecord,
    pub risk: RiskAssessment,
    pub strategy: ExecutionStrategy,
    pub front_running: Option<FrontRunningSignal>,
}

pub struct QuoteEngine {
    config: Arc<Config>,
    clock: Arc<dyn Clock>,
    aggregator: Arc<QuoteAggregator>,
    cache: Arc<QuoteCache>,
    graph: Arc<RwLock<LiquidityGraph>>,
    pathfinder: Pathfinder,
    risk: RiskAssessor,
    submitter: Arc<dyn Submitter>,
    persister: Arc<dyn Persister>,
}

impl QuoteEngine {
    /// Engine with an empty graph, a simulated submitter and a log-only persister.
    pub fn new(config: Arc<Config>, aggregator: Arc<QuoteAggregator>, clock: Arc<dyn Clock>) -> Self {
        let cache = Arc::new(QuoteCache::new(CacheConfig::from(config.as_ref()), clock.clone()));
        let pathfinder = Pathfinder::new(
            PathfinderConfig {
                max_hops: config.max_hops,
                ..PathfinderConfig::default()
            },
            CostModels::default()
                .with_venue("Orca", Arc::new(ConstantProduct))
                .with_venue("Raydium", Arc::new(ConstantProduct)),
        );
        let risk = RiskAssessor::new(RiskAssessorConfig::from(config.as_ref()));

        Self {
            config,
            clock,
            aggregator,
            cache,
            graph: Arc::new(RwLock::new(LiquidityGraph::new())),
            pathfinder,
            risk,
            submitter: Arc::new(SimulatedSubmitter::new()),
            persister: Arc::new(LogPersister),
        }
    }

    pub fn with_submitter(mut self, submitter: Arc<dyn Submitter>) -> Self {
        self.submitter = submitter;
        self
    }

    pub fn with_persister(mut self, persister: Arc<dyn Persister>) -> Self {
        self.persister = persister;
        self
    }

    pub fn with_pathfinder(mut self, pathfinder: Pathfinder) -> Self {
        self.pathfinder = pathfinder;
        self
    }

    pub fn with_graph(mut self, graph: Arc<RwLock<LiquidityGraph>>) -> Self {
        self.graph = graph;
        self
    }

    pub fn cache(&self) -> &Arc<QuoteCache> {
        &self.cache
    }

    pub fn graph(&self) -> &Arc<RwLock<LiquidityGraph>> {
        &self.graph
    }

    pub fn aggregator(&self) -> &Arc<QuoteAggregator> {
        &self.aggregator
    }

    pub fn risk_assessor(&self) -> &RiskAssessor {
        &self.risk
    }

    pub fn pathfinder(&self) -> &Pathfinder {
        &self.pathfinder
    }

    pub fn validate_request(&self, request: &QuoteRequest) -> Result<()> {
        validate_request(request, &self.config)
    }

    fn quote_deadline(&self) -> Duration {
        Duration::from_millis(self.config.quote_deadline_ms)
    }

    pub async fn quote(&self, request: &QuoteRequest) -> Result<QuoteResponse> {
        self.validate_request(request)?;

        if let (Some(user), Some(limit)) = (&request.user, self.config.rate_limit_per_minute) {
            if !self.cache.check_rate_limit(user, limit) {
                return Err(RouterError::RateLimited(format!(
                    "{} exceeded {} quotes per minute",
                    user, limit
                )));
            }
        }

        if let Some(cached) = self
            .cache
            .get_route(&request.input_token, &request.output_token, request.amount)
        {
            // only serve quotes that execute_swap would still accept
            if self.cache.get(&cached.quote_id).is_some() {
                debug!("Serving quote {} from route cache", cached.quote_id);
                return Ok(self.respond(cached, request.amount));
            }
            debug!(
                "Route entry outlived quote {}, quoting afresh",
                cached.quote_id
            );
            self.cache.delete_route(&RouteKey::for_quote(&cached));
        }

        let deadline = self.quote_deadline();
        let report = tokio::time::timeout(
            deadline,
            self.aggregator.collect_outcomes(
                &request.input_token,
                &request.output_token,
                request.amount,
                request.slippage_bps,
            ),
        )
        .await
        .map_err(|_| {
            warn!(
                "⏱️  Quote deadline of {:?} exceeded for {} -> {}",
                deadline, request.input_token, request.output_token
            );
            RouterError::DeadlineExceeded(deadline)
        })?;

        let aggregated = report.best();
        let planned = self.plan_route(request).await;

        let Some(quote) = pick_best(aggregated, planned) else {
            info!(
                "No route for {} -> {} ({}): {} venues absent, {} failed",
                request.input_token,
                request.output_token,
                request.amount,
                report.absent_count(),
                report.failed_count()
            );
            return Err(RouterError::NoRoute(format!(
                "{} -> {}",
                request.input_token, request.output_token
            )));
        };

        self.cache.put(quote.clone());
        self.cache.put_route(quote.clone());
        if let Err(e) = self.persister.record_quote(&quote).await {
            warn!("Failed to persist quote {}: {}", quote.quote_id, e);
        }

        let response = self.respond(quote, request.amount);
        info!(
            "💱 Quote {}: {} -> {} via {} ({} risk, score {})",
            response.quote.quote_id,
            response.quote.input_amount,
            response.quote.output_amount,
            response.route_display,
            response.risk.level,
            response.risk.score
        );
        Ok(response)
    }

    /// Graph search for the request, turned into a quote on success.
    async fn plan_route(&self, request: &QuoteRequest) -> Option<Quote> {
        let plan = {
            let graph = self.graph.read().await;
            self.pathfinder.find_route(
                &graph,
                &request.input_token,
                &request.output_token,
                request.amount,
            )?
        };
        plan.into_quote(
            self.clock.now(),
            ChronoDuration::seconds(self.config.quote_ttl_secs as i64),
            ORCA_COMPUTE_COST,
        )
    }

    fn respond(&self, quote: Quote, input_amount: u128) -> QuoteResponse {
        let risk = self.risk.assess(&quote, input_amount, None);
        QuoteResponse {
            route_display: quote.route_display(),
            estimated_execution_ms: estimate_execution_ms(&quote),
            risk,
            quote,
        }
    }

    /// Every venue's quote for the request, largest output first.
    pub async fn all_quotes(&self, request: &QuoteRequest) -> Result<Vec<Quote>> {
        self.validate_request(request)?;
        let deadline = self.quote_deadline();
        tokio::time::timeout(
            deadline,
            self.aggregator.all_quotes(
                &request.input_token,
                &request.output_token,
                request.amount,
                request.slippage_bps,
            ),
        )
        .await
        .map_err(|_| RouterError::DeadlineExceeded(deadline))
    }

    pub fn validate_for_execution(&self, quote: &Quote) -> Result<()> {
        if quote.is_expired_at(self.clock.now()) {
            return Err(RouterError::QuoteExpired(quote.quote_id.to_string()));
        }
        let ceiling = self.config.max_price_impact_bps;
        if quote.price_impact_bps > ceiling {
            return Err(RouterError::ExcessiveImpact {
                impact_bps: quote.price_impact_bps,
                ceiling_bps: ceiling,
            });
        }
        if !quote.has_route() {
            return Err(RouterError::NoRoute(format!(
                "quote {} has no legs",
                quote.quote_id
            )));
        }
        Ok(())
    }

    /// Executes a cached quote.
    ///
    /// The quote is claimed out of the cache before anything else happens, so concurrent calls
    /// on one id submit at most once; the loser gets `QuoteNotFound`. A quote that fails
    /// validation is dropped. A failed submission puts it back for a retry.
    pub async fn execute_swap(
        &self,
        quote_id: &Uuid,
        recent_market_rate: Option<f64>,
    ) -> Result<SwapExecution> {
        let claim = self
            .cache
            .take(quote_id)
            .ok_or_else(|| RouterError::QuoteNotFound(quote_id.to_string()))?;
        if claim.is_expired_at(self.clock.now()) {
            return Err(RouterError::QuoteExpired(quote_id.to_string()));
        }
        self.validate_for_execution(&claim.quote)?;

        let quote = &claim.quote;
        let risk = self.risk.assess(quote, quote.input_amount, None);
        let front_running =
            recent_market_rate.map(|rate| self.risk.detect_front_running(quote, rate));

        let strategy = {
            let mut rng = rand::thread_rng();
            self.risk
                .protect(quote, &risk, self.config.default_slippage_bps, &mut rng)
        };
        strategy.wait_before_submission().await;

        let result = match self.submitter.submit(quote, &strategy).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Submission of quote {} failed: {}", quote_id, e);
                self.cache.release(claim);
                return Err(e);
            }
        };

        let trade = TradeRecord::new(quote, &result, risk.level, self.clock.now());
        if let Err(e) = self.persister.record_trade(&trade).await {
            warn!("Failed to persist trade {}: {}", trade.transaction_ref, e);
        }
        info!(
            "🚀 Executed quote {} as {} ({} risk)",
            quote.quote_id, trade.transaction_ref, risk.level
        );

        Ok(SwapExecution {
            trade,
            risk,
            strategy,
            front_running,
        })
    }

    /// Caches the snapshot and upserts both of its edges into the graph.
    pub async fn ingest_liquidity(&self, snapshot: LiquiditySnapshot) -> Result<()> {
        self.graph.write().await.add_pool(&snapshot)?;
        self.cache.put_liquidity(snapshot);
        Ok(())
    }
}

/// The graph plan wins only with a strictly larger output.
fn pick_best(aggregated: Option<Quote>, planned: Option<Quote>) -> Option<Quote> {
    match (aggregated, planned) {
        (Some(a), Some(p)) if p.output_amount > a.output_amount => {
            debug!(
                "Graph route beats venues: {} > {}",
                p.output_amount, a.output_amount
            );
            Some(p)
        }
        (Some(a), _) => Some(a),
        (None, planned) => planned,
    }
}

pub fn estimate_execution_ms(quote: &Quote) -> u64 {
    EXECUTION_MS_PER_LEG * quote.legs.len() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dex::quote::RouteLeg;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn quote(venues: &[&str], out: u128) -> Quote {
        let legs = venues
            .iter()
            .enumerate()
            .map(|(i, venue)| RouteLeg {
                venue: venue.to_string(),
                input_token: format!("T{}", i),
                output_token: format!("T{}", i + 1),
                input_amount: 1_000,
                output_amount: out,
                pool_ref: format!("pool-{}", i),
                price_impact_bps: 10,
            })
            .collect();
        Quote::from_legs(legs, 10, 0, Utc::now(), ChronoDuration::seconds(30)).unwrap()
    }

    #[test]
    fn test_aggregator_wins_ties() {
        let venue = quote(&["Orca"], 500);
        let planned = quote(&["Orca", "Raydium"], 500);
        assert_eq!(pick_best(Some(venue.clone()), Some(planned.clone())), Some(venue.clone()));

        let better = quote(&["Orca", "Raydium"], 501);
        assert_eq!(pick_best(Some(venue), Some(better.clone())), Some(better.clone()));
        assert_eq!(pick_best(None, Some(better.clone())), Some(better));
        assert_eq!(pick_best(None, None), None);
    }

    #[test]
    fn test_execution_estimate_per_leg() {
        assert_eq!(estimate_execution_ms(&quote(&["Orca"], 1)), 250);
        assert_eq!(estimate_execution_ms(&quote(&["Orca", "Raydium", "Orca"], 1)), 750);
        assert_eq!(quote(&["Orca", "Raydium"], 1).route_display(), "Orca → Raydium");
    }
}
