// src/routing/graph.rs
//! Liquidity graph for multi-hop routing.
//!
//! Tokens map to their outbound pool edges. The graph is a multigraph: the same pair may be
//! connected through several venues and pools. It carries no internal locking; the owner
//! serializes writes (the quote engine keeps it behind a `tokio::sync::RwLock`).

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::dex::quote::Token;
use crate::error::{Result, RouterError};

/// Directed edge: swapping `from` into `to` through one pool of one venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolEdge {
    pub from: Token,
    pub to: Token,
    pub venue: String,
    pub pool_ref: String,
    pub fee_bps: u16,
    /// Output-side reserve available to this direction
    pub reserve: u128,
    /// Spot price, units of `to` per unit of `from`
    pub price_ratio: f64,
}

impl PoolEdge {
    pub fn new(
        from: impl Into<Token>,
        to: impl Into<Token>,
        venue: impl Into<String>,
        pool_ref: impl Into<String>,
        fee_bps: u16,
        reserve: u128,
        price_ratio: f64,
    ) -> Result<Self> {
        if fee_bps > 10_000 {
            return Err(RouterError::InvalidInput(format!(
                "fee_bps {} outside [0, 10000]",
                fee_bps
            )));
        }
        if !price_ratio.is_finite() || price_ratio < 0.0 {
            return Err(RouterError::InvalidInput(format!(
                "price_ratio {} must be finite and non-negative",
                price_ratio
            )));
        }
        Ok(Self {
            from: from.into(),
            to: to.into(),
            venue: venue.into(),
            pool_ref: pool_ref.into(),
            fee_bps,
            reserve,
            price_ratio,
        })
    }

    fn same_slot(&self, other: &PoolEdge) -> bool {
        self.venue == other.venue && self.pool_ref == other.pool_ref
    }
}

/// Raw two-sided pool state reported by a venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquiditySnapshot {
    pub venue: String,
    pub pool_ref: String,
    pub token_a: Token,
    pub token_b: Token,
    pub reserve_a: u128,
    pub reserve_b: u128,
    pub fee_bps: u16,
    pub observed_at: DateTime<Utc>,
}

impl LiquiditySnapshot {
    /// The two directed edges (`a→b`, `b→a`) this pool contributes.
    pub fn edges(&self) -> Result<[PoolEdge; 2]> {
        let ratio = |num: u128, den: u128| {
            if den == 0 {
                0.0
            } else {
                num as f64 / den as f64
            }
        };
        Ok([
            PoolEdge::new(
                self.token_a.clone(),
                self.token_b.clone(),
                self.venue.clone(),
                self.pool_ref.clone(),
                self.fee_bps,
                self.reserve_b,
                ratio(self.reserve_b, self.reserve_a),
            )?,
            PoolEdge::new(
                self.token_b.clone(),
                self.token_a.clone(),
                self.venue.clone(),
                self.pool_ref.clone(),
                self.fee_bps,
                self.reserve_a,
                ratio(self.reserve_a, self.reserve_b),
            )?,
        ])
    }

    /// Reserves oriented for a swap from `input`; `None` if the pool does not hold it.
    pub fn oriented(&self, input: &str, output: &str) -> Option<(u128, u128)> {
        if self.token_a == input && self.token_b == output {
            Some((self.reserve_a, self.reserve_b))
        } else if self.token_b == input && self.token_a == output {
            Some((self.reserve_b, self.reserve_a))
        } else {
            None
        }
    }
}

/// Graph statistics for monitoring
#[derive(Debug, Clone, Default, Serialize)]
pub struct GraphStats {
    pub token_count: usize,
    pub edge_count: usize,
    pub venue_count: usize,
    pub last_update: Option<DateTime<Utc>>,
}

#[derive(Clone, Default)]
pub struct LiquidityGraph {
    /// token -> outbound edges, in insertion order
    adjacency: HashMap<Token, Vec<PoolEdge>>,
    last_update: Option<DateTime<Utc>>,
}

impl LiquidityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty adjacency for a token universe, before edges are populated.
    pub fn build_graph<I, T>(tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Token>,
    {
        let mut graph = Self::new();
        for token in tokens {
            graph.adjacency.entry(token.into()).or_default();
        }
        info!("🕸️  Liquidity graph built with {} tokens", graph.adjacency.len());
        graph
    }

    pub fn add_token(&mut self, token: impl Into<Token>) {
        self.adjacency.entry(token.into()).or_default();
    }

    /// Upsert keyed by `(from, venue, pool_ref)`; a replaced edge keeps its position.
    pub fn add_edge(&mut self, edge: PoolEdge) {
        self.adjacency.entry(edge.to.clone()).or_default();
        let edges = self.adjacency.entry(edge.from.clone()).or_default();
        match edges.iter_mut().find(|existing| existing.same_slot(&edge)) {
            Some(existing) => {
                debug!(
                    "Refreshed edge {} -> {} via {} ({})",
                    edge.from, edge.to, edge.venue, edge.pool_ref
                );
                *existing = edge;
            }
            None => {
                debug!(
                    "Added edge {} -> {} via {} ({})",
                    edge.from, edge.to, edge.venue, edge.pool_ref
                );
                edges.push(edge);
            }
        }
        self.last_update = Some(Utc::now());
    }

    /// Inserts both directions of a pool.
    pub fn add_pool(&mut self, snapshot: &LiquiditySnapshot) -> Result<()> {
        let [forward, backward] = snapshot.edges()?;
        self.add_edge(forward);
        self.add_edge(backward);
        Ok(())
    }

    /// Removes every edge of a pool; returns how many were dropped.
    pub fn remove_pool(&mut self, venue: &str, pool_ref: &str) -> usize {
        let mut removed = 0;
        for edges in self.adjacency.values_mut() {
            let before = edges.len();
            edges.retain(|e| !(e.venue == venue && e.pool_ref == pool_ref));
            removed += before - edges.len();
        }
        if removed > 0 {
            info!("Removed {} edges of pool {} ({})", removed, pool_ref, venue);
            self.last_update = Some(Utc::now());
        }
        removed
    }

    /// Outbound edges; empty for tokens the graph has never seen.
    pub fn neighbors(&self, token: &str) -> &[PoolEdge] {
        self.adjacency
            .get(token)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn direct_edges<'a>(&'a self, from: &str, to: &'a str) -> impl Iterator<Item = &'a PoolEdge> {
        self.neighbors(from).iter().filter(move |e| e.to == to)
    }

    pub fn contains_token(&self, token: &str) -> bool {
        self.adjacency.contains_key(token)
    }

    pub fn token_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(Vec::len).sum()
    }

    /// Sum of output-side reserves over every direct edge `from -> to`.
    pub fn pair_liquidity(&self, from: &str, to: &str) -> u128 {
        self.direct_edges(from, to)
            .fold(0u128, |acc, e| acc.saturating_add(e.reserve))
    }

    pub fn stats(&self) -> GraphStats {
        let mut venues: Vec<&str> = self
            .adjacency
            .values()
            .flatten()
            .map(|e| e.venue.as_str())
            .collect();
        venues.sort_unstable();
        venues.dedup();
        GraphStats {
            token_count: self.token_count(),
            edge_count: self.edge_count(),
            venue_count: venues.len(),
            last_update: self.last_update,
        }
    }
}

impl fmt::Debug for LiquidityGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiquidityGraph")
            .field("token_count", &self.token_count())
            .field("edge_count", &self.edge_count())
            .field("last_update", &self.last_update)
            .finish()
    }
}
