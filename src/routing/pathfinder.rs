// src/routing/pathfinder.rs
//! Multi-hop route discovery over the liquidity graph.
//!
//! The search is Dijkstra-style, but edge costs depend on the amount in flight. Each
//! traversal asks the venue's [`CostModel`] for the fee and output at the current amount, so
//! a path's cost is only known once the amounts before it are.
//!
//! - direct edges short-circuit the search
//! - the frontier is ordered by cumulative fee, then hop count, then discovery order
//! - paths are rebuilt from predecessor links and must end at the input token

use chrono::{DateTime, Duration, Utc};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use super::cost::{CostModels, EdgeSwap};
use super::graph::{LiquidityGraph, PoolEdge};
use crate::dex::quote::{Quote, RouteLeg};
use crate::error::{Result, RouterError};

/// Configuration for the pathfinder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathfinderConfig {
    pub max_hops: usize,
    /// Return the best direct edge without searching when one exists
    pub short_circuit_direct: bool,
}

impl Default for PathfinderConfig {
    fn default() -> Self {
        Self {
            max_hops: 4,
            short_circuit_direct: true,
        }
    }
}

/// A complete execution plan through one or more pools.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutePlan {
    pub legs: Vec<RouteLeg>,
    pub amount_in: u128,
    pub amount_out: u128,
    /// Sum of per-edge fees (each in that edge's input units)
    pub total_fee: u128,
    /// Compounded impact across legs
    pub price_impact_bps: u16,
    pub efficiency: u8,
}

impl RoutePlan {
    pub fn hops(&self) -> usize {
        self.legs.len()
    }

    /// Sum of leg impacts; a ranking signal, coarser than the compounded figure.
    pub fn total_slippage_bps(&self) -> u32 {
        self.legs.iter().map(|l| l.price_impact_bps as u32).sum()
    }

    pub fn into_quote(
        self,
        created_at: DateTime<Utc>,
        ttl: Duration,
        compute_cost_per_leg: u64,
    ) -> Option<Quote> {
        let cost = compute_cost_per_leg.saturating_mul(self.legs.len() as u64);
        Quote::from_legs(self.legs, self.price_impact_bps, cost, created_at, ttl)
    }
}

/// `clamp(0, 100, (amount_out + fee) * 100 / amount_in)`.
///
/// Display and ranking only; the search itself orders by fee.
pub fn efficiency(amount_in: u128, amount_out: u128, fee: u128) -> u8 {
    if amount_in == 0 {
        return 0;
    }
    let pct = amount_out.saturating_add(fee).saturating_mul(100) / amount_in;
    pct.min(100) as u8
}

/// Combines per-leg impacts as `1 - Π(1 - impact_i)`.
pub fn compound_impact_bps(impacts: impl IntoIterator<Item = u16>) -> u16 {
    let remaining = impacts.into_iter().fold(10_000u64, |remaining, bps| {
        remaining * (10_000 - bps.min(10_000) as u64) / 10_000
    });
    (10_000 - remaining) as u16
}

/// Orders plans best-first: higher efficiency, then lower total slippage, then fewer hops.
pub fn compare_plans(a: &RoutePlan, b: &RoutePlan) -> Ordering {
    b.efficiency
        .cmp(&a.efficiency)
        .then_with(|| a.total_slippage_bps().cmp(&b.total_slippage_bps()))
        .then_with(|| a.hops().cmp(&b.hops()))
}

/// One reached (token, amount) state plus the link to the state it came from.
#[derive(Debug)]
struct Label<'g> {
    token: &'g str,
    parent: Option<usize>,
    via: Option<(&'g PoolEdge, EdgeSwap)>,
    amount: u128,
    cumulative_fee: u128,
    hops: usize,
}

#[derive(Debug, PartialEq, Eq)]
struct FrontierEntry {
    cumulative_fee: u128,
    hops: usize,
    seq: u64,
    label: usize,
}

impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse for min-heap
        other
            .cumulative_fee
            .cmp(&self.cumulative_fee)
            .then_with(|| other.hops.cmp(&self.hops))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Pathfinder {
    config: PathfinderConfig,
    cost_models: CostModels,
}

impl Pathfinder {
    pub fn new(config: PathfinderConfig, cost_models: CostModels) -> Self {
        Self {
            config,
            cost_models,
        }
    }

    pub fn config(&self) -> &PathfinderConfig {
        &self.config
    }

    pub fn cost_models(&self) -> &CostModels {
        &self.cost_models
    }

    /// Same curves, different search settings.
    pub fn with_config(&self, config: PathfinderConfig) -> Self {
        Self::new(config, self.cost_models.clone())
    }

    /// Best plan from `input` to `output`, or `None` when no path exists within `max_hops`.
    ///
    /// Tokens missing from the graph are simply unreachable.
    pub fn find_route(
        &self,
        graph: &LiquidityGraph,
        input: &str,
        output: &str,
        amount: u128,
    ) -> Option<RoutePlan> {
        if input == output || amount == 0 {
            return None;
        }

        if self.config.short_circuit_direct {
            if let Some(plan) = self.best_direct(graph, input, output, amount) {
                debug!(
                    "Direct route {} -> {} via {}",
                    input, output, plan.legs[0].venue
                );
                return Some(plan);
            }
        }

        match self.search(graph, input, output, amount) {
            Ok(Some(plan)) => {
                info!(
                    "🧭 Route found {} -> {}: {} hops, efficiency {}%, output {}",
                    input,
                    output,
                    plan.hops(),
                    plan.efficiency,
                    plan.amount_out
                );
                Some(plan)
            }
            Ok(None) => {
                debug!("No path between {} and {} within {} hops", input, output, self.config.max_hops);
                None
            }
            Err(e) => {
                error!("🚨 {} ({} -> {})", e, input, output);
                debug_assert!(false, "{}", e);
                None
            }
        }
    }

    fn best_direct(
        &self,
        graph: &LiquidityGraph,
        input: &str,
        output: &str,
        amount: u128,
    ) -> Option<RoutePlan> {
        let mut best: Option<(&PoolEdge, EdgeSwap)> = None;
        for edge in graph.direct_edges(input, output) {
            let swap = self.cost_models.swap(edge, amount);
            if swap.amount_out == 0 {
                continue;
            }
            let better = match &best {
                None => true,
                Some((_, current)) => {
                    swap.amount_out > current.amount_out
                        || (swap.amount_out == current.amount_out && swap.fee < current.fee)
                }
            };
            if better {
                best = Some((edge, swap));
            }
        }

        let (edge, swap) = best?;
        Some(RoutePlan {
            legs: vec![leg(edge, amount, &swap)],
            amount_in: amount,
            amount_out: swap.amount_out,
            total_fee: swap.fee,
            price_impact_bps: swap.price_impact_bps,
            efficiency: efficiency(amount, swap.amount_out, swap.fee),
        })
    }

    fn search<'g>(
        &self,
        graph: &'g LiquidityGraph,
        input: &'g str,
        output: &str,
        amount: u128,
    ) -> Result<Option<RoutePlan>> {
        let mut labels = vec![Label {
            token: input,
            parent: None,
            via: None,
            amount,
            cumulative_fee: 0,
            hops: 0,
        }];
        let mut frontier = BinaryHeap::new();
        // non-dominated (cumulative_fee, hops) pairs seen per token
        let mut pareto: HashMap<&str, Vec<(u128, usize)>> = HashMap::new();
        let mut settled: HashSet<(&str, usize)> = HashSet::new();
        let mut seq = 0u64;

        frontier.push(FrontierEntry {
            cumulative_fee: 0,
            hops: 0,
            seq,
            label: 0,
        });
        pareto.insert(input, vec![(0, 0)]);

        while let Some(entry) = frontier.pop() {
            let (token, amount_here, fee_here, hops_here) = {
                let label = &labels[entry.label];
                (label.token, label.amount, label.cumulative_fee, label.hops)
            };
            if !settled.insert((token, hops_here)) {
                continue;
            }
            if token == output {
                return reconstruct(&labels, entry.label, input, amount).map(Some);
            }
            if hops_here >= self.config.max_hops {
                continue;
            }

            for edge in graph.neighbors(token) {
                let swap = self.cost_models.swap(edge, amount_here);
                if swap.amount_out == 0 {
                    continue;
                }
                let cumulative_fee = fee_here.saturating_add(swap.fee);
                let hops = hops_here + 1;
                // a cheaper label with more hops must not hide a shorter one
                let front = pareto.entry(edge.to.as_str()).or_default();
                if front
                    .iter()
                    .any(|&(fee, h)| fee <= cumulative_fee && h <= hops)
                {
                    continue;
                }
                front.retain(|&(fee, h)| !(cumulative_fee <= fee && hops <= h));
                front.push((cumulative_fee, hops));

                labels.push(Label {
                    token: edge.to.as_str(),
                    parent: Some(entry.label),
                    via: Some((edge, swap)),
                    amount: swap.amount_out,
                    cumulative_fee,
                    hops,
                });
                seq += 1;
                frontier.push(FrontierEntry {
                    cumulative_fee,
                    hops,
                    seq,
                    label: labels.len() - 1,
                });
            }
        }

        Ok(None)
    }
}

fn leg(edge: &PoolEdge, amount_in: u128, swap: &EdgeSwap) -> RouteLeg {
    RouteLeg {
        venue: edge.venue.clone(),
        input_token: edge.from.clone(),
        output_token: edge.to.clone(),
        input_amount: amount_in,
        output_amount: swap.amount_out,
        pool_ref: edge.pool_ref.clone(),
        price_impact_bps: swap.price_impact_bps,
    }
}

/// Walks predecessor links back from `end`; the walk must stop at `input`.
fn reconstruct(labels: &[Label<'_>], end: usize, input: &str, amount: u128) -> Result<RoutePlan> {
    let mut legs = Vec::new();
    let mut total_fee = 0u128;
    let mut cursor = end;

    for _ in 0..=labels.len() {
        let label = labels.get(cursor).ok_or_else(|| {
            RouterError::GraphInconsistency(format!("dangling predecessor index {}", cursor))
        })?;
        match (label.parent, &label.via) {
            (Some(parent), Some((edge, swap))) => {
                let parent_amount = labels.get(parent).map(|p| p.amount).ok_or_else(|| {
                    RouterError::GraphInconsistency(format!("dangling predecessor index {}", parent))
                })?;
                legs.push(leg(edge, parent_amount, swap));
                total_fee = total_fee.saturating_add(swap.fee);
                cursor = parent;
            }
            (None, _) => {
                if label.token != input {
                    return Err(RouterError::GraphInconsistency(format!(
                        "path terminates at {} instead of {}",
                        label.token, input
                    )));
                }
                legs.reverse();
                let amount_out = labels[end].amount;
                let price_impact_bps = compound_impact_bps(legs.iter().map(|l| l.price_impact_bps));
                return Ok(RoutePlan {
                    legs,
                    amount_in: amount,
                    amount_out,
                    total_fee,
                    price_impact_bps,
                    efficiency: efficiency(amount, amount_out, total_fee),
                });
            }
            (Some(_), None) => {
                return Err(RouterError::GraphInconsistency(format!(
                    "label for {} has a parent but no edge",
                    label.token
                )));
            }
        }
    }

    Err(RouterError::GraphInconsistency(
        "predecessor chain does not terminate".to_string(),
    ))
}
