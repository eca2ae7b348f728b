//! Typed analysis requests served from live router state.
//!
//! Each request variant maps to one handler, and each handler uses the real routing
//! components: the pathfinder, the risk assessor and the liquidity graph.

use log::debug;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::dex::quote::{Quote, Token};
use crate::engine::QuoteEngine;
use crate::error::{Result, RouterError};
use crate::routing::graph::LiquidityGraph;
use crate::routing::mev_protection::{FrontRunningSignal, RiskAssessment, RiskAssessor};
use crate::routing::pathfinder::{compare_plans, Pathfinder, PathfinderConfig, RoutePlan};

/// Amount used to test whether a pair is routable at all.
pub const REACHABILITY_PROBE_AMOUNT: u128 = 1_000_000;

#[derive(Debug, Clone)]
pub enum AnalysisRequest {
    RouteOptimization {
        input_token: Token,
        output_token: Token,
        amount: u128,
    },
    MevDetection {
        quote: Quote,
        recent_market_rate: Option<f64>,
    },
    LiquidityAnalysis {
        pairs: Vec<(Token, Token)>,
    },
}

impl AnalysisRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisRequest::RouteOptimization { .. } => "route_optimization",
            AnalysisRequest::MevDetection { .. } => "mev_detection",
            AnalysisRequest::LiquidityAnalysis { .. } => "liquidity_analysis",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisResponse {
    RouteOptimization {
        /// Best candidate first
        candidates: Vec<RoutePlan>,
    },
    MevDetection {
        assessment: RiskAssessment,
        front_running: Option<FrontRunningSignal>,
    },
    LiquidityAnalysis {
        pairs: Vec<PairLiquidity>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairLiquidity {
    pub input_token: Token,
    pub output_token: Token,
    /// Output-side reserves summed over direct pools
    pub direct_liquidity: u128,
    pub direct_pools: usize,
    /// Whether any route within the hop limit exists
    pub routable: bool,
}

pub struct Analyst {
    graph: Arc<RwLock<LiquidityGraph>>,
    pathfinder: Pathfinder,
    risk: RiskAssessor,
}

impl Analyst {
    pub fn new(graph: Arc<RwLock<LiquidityGraph>>, pathfinder: Pathfinder, risk: RiskAssessor) -> Self {
        Self {
            graph,
            pathfinder,
            risk,
        }
    }

    /// Shares the engine's graph, curves and risk settings.
    pub fn from_engine(engine: &QuoteEngine) -> Self {
        Self::new(
            engine.graph().clone(),
            engine.pathfinder().clone(),
            engine.risk_assessor().clone(),
        )
    }

    pub async fn handle(&self, request: AnalysisRequest) -> Result<AnalysisResponse> {
        debug!("Handling {} analysis", request.kind());
        match request {
            AnalysisRequest::RouteOptimization {
                input_token,
                output_token,
                amount,
            } => self.optimize_route(&input_token, &output_token, amount).await,
            AnalysisRequest::MevDetection {
                quote,
                recent_market_rate,
            } => Ok(self.detect_mev(&quote, recent_market_rate)),
            AnalysisRequest::LiquidityAnalysis { pairs } => Ok(self.analyze_liquidity(&pairs).await),
        }
    }

    /// Compares the best direct pool against an unrestricted multi-hop search.
    async fn optimize_route(
        &self,
        input_token: &str,
        output_token: &str,
        amount: u128,
    ) -> Result<AnalysisResponse> {
        if amount == 0 || input_token == output_token {
            return Err(RouterError::InvalidInput(
                "route optimization needs distinct tokens and a positive amount".to_string(),
            ));
        }
        let full_search = self.pathfinder.with_config(PathfinderConfig {
            short_circuit_direct: false,
            ..self.pathfinder.config().clone()
        });

        let graph = self.graph.read().await;
        let mut candidates: Vec<RoutePlan> = Vec::new();
        for finder in [&self.pathfinder, &full_search] {
            if let Some(plan) = finder.find_route(&graph, input_token, output_token, amount) {
                if !candidates.contains(&plan) {
                    candidates.push(plan);
                }
            }
        }
        if candidates.is_empty() {
            return Err(RouterError::NoRoute(format!("{} -> {}", input_token, output_token)));
        }
        candidates.sort_by(compare_plans);
        Ok(AnalysisResponse::RouteOptimization { candidates })
    }

    fn detect_mev(&self, quote: &Quote, recent_market_rate: Option<f64>) -> AnalysisResponse {
        AnalysisResponse::MevDetection {
            assessment: self.risk.assess(quote, quote.input_amount, None),
            front_running: recent_market_rate.map(|rate| self.risk.detect_front_running(quote, rate)),
        }
    }

    async fn analyze_liquidity(&self, pairs: &[(Token, Token)]) -> AnalysisResponse {
        let graph = self.graph.read().await;
        let pairs = pairs
            .iter()
            .map(|(input, output)| PairLiquidity {
                input_token: input.clone(),
                output_token: output.clone(),
                direct_liquidity: graph.pair_liquidity(input, output),
                direct_pools: graph.direct_edges(input, output).count(),
                routable: self
                    .pathfinder
                    .find_route(&graph, input, output, REACHABILITY_PROBE_AMOUNT)
                    .is_some(),
            })
            .collect();
        AnalysisResponse::LiquidityAnalysis { pairs }
    }
}
