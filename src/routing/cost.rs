// src/routing/cost.rs
//! Per-venue swap curves used by the pathfinder.
//!
//! Every edge traversal asks a [`CostModel`] what the amount currently in flight turns into.
//! Costs depend on the amount (slippage), so they are recomputed on each traversal rather
//! than stored as static weights.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use super::graph::PoolEdge;
use crate::dex::quote::price_impact_bps;
use crate::utils::bps_of;

/// Result of pushing an amount through one edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeSwap {
    pub amount_out: u128,
    /// Fee extracted at this edge, in input-token units
    pub fee: u128,
    pub price_impact_bps: u16,
}

pub trait CostModel: Send + Sync + Debug {
    fn swap(&self, edge: &PoolEdge, amount_in: u128) -> EdgeSwap;
}

/// `a * b / c` without overflowing when `a * b` does not fit in 128 bits.
pub fn mul_div(a: u128, b: u128, c: u128) -> u128 {
    if c == 0 {
        return 0;
    }
    let (mut a, mut b, mut c) = (a, b, c);
    loop {
        if let Some(product) = a.checked_mul(b) {
            return product / c;
        }
        // drop one bit of precision from the larger factor and the divisor together
        if a >= b {
            a >>= 1;
        } else {
            b >>= 1;
        }
        c >>= 1;
        if c == 0 {
            return u128::MAX;
        }
    }
}

/// Fallback curve: `amount_in * reserve / (amount_in + reserve) / 2` on the gross amount.
///
/// Venues without a registered model are priced with this approximation. It is not a real
/// constant-product formula. The fee is reported as the edge cost but not deducted from the
/// curve input; the reported impact is `50 bps + fee_bps`.
#[derive(Debug, Default, Clone, Copy)]
pub struct HalvedReserveCurve;

impl CostModel for HalvedReserveCurve {
    fn swap(&self, edge: &PoolEdge, amount_in: u128) -> EdgeSwap {
        let fee = bps_of(amount_in, edge.fee_bps);
        let amount_out =
            mul_div(amount_in, edge.reserve, amount_in.saturating_add(edge.reserve)) / 2;
        EdgeSwap {
            amount_out,
            fee,
            price_impact_bps: 50u16.saturating_add(edge.fee_bps).min(10_000),
        }
    }
}

/// x·y=k with the fee taken from the input side.
///
/// The input-side reserve is recovered from the edge's output reserve and spot ratio.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConstantProduct;

impl ConstantProduct {
    pub fn amount_out(amount_in: u128, reserve_in: u128, reserve_out: u128, fee_bps: u16) -> (u128, u128) {
        let fee = bps_of(amount_in, fee_bps);
        let net = amount_in.saturating_sub(fee);
        let out = mul_div(net, reserve_out, reserve_in.saturating_add(net));
        (out, fee)
    }

    /// Output at spot price with no fee and no slippage.
    pub fn spot_out(amount_in: u128, reserve_in: u128, reserve_out: u128) -> u128 {
        mul_div(amount_in, reserve_out, reserve_in)
    }
}

impl CostModel for ConstantProduct {
    fn swap(&self, edge: &PoolEdge, amount_in: u128) -> EdgeSwap {
        if edge.price_ratio <= 0.0 || edge.reserve == 0 {
            return EdgeSwap {
                amount_out: 0,
                fee: bps_of(amount_in, edge.fee_bps),
                price_impact_bps: 10_000,
            };
        }
        let reserve_in = (edge.reserve as f64 / edge.price_ratio) as u128;
        let (amount_out, fee) = Self::amount_out(amount_in, reserve_in, edge.reserve, edge.fee_bps);
        let spot = Self::spot_out(amount_in, reserve_in, edge.reserve);
        EdgeSwap {
            amount_out,
            fee,
            price_impact_bps: price_impact_bps(spot, amount_out),
        }
    }
}

/// Cost model registry: per-venue overrides over a default curve.
#[derive(Debug, Clone)]
pub struct CostModels {
    default: Arc<dyn CostModel>,
    per_venue: HashMap<String, Arc<dyn CostModel>>,
}

impl Default for CostModels {
    fn default() -> Self {
        Self::new(Arc::new(HalvedReserveCurve))
    }
}

impl CostModels {
    pub fn new(default: Arc<dyn CostModel>) -> Self {
        Self {
            default,
            per_venue: HashMap::new(),
        }
    }

    pub fn with_venue(mut self, venue: impl Into<String>, model: Arc<dyn CostModel>) -> Self {
        self.per_venue.insert(venue.into(), model);
        self
    }

    pub fn for_venue(&self, venue: &str) -> &dyn CostModel {
        self.per_venue
            .get(venue)
            .unwrap_or(&self.default)
            .as_ref()
    }

    pub fn swap(&self, edge: &PoolEdge, amount_in: u128) -> EdgeSwap {
        self.for_venue(&edge.venue).swap(edge, amount_in)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(venue: &str, fee_bps: u16, reserve: u128, ratio: f64) -> PoolEdge {
        PoolEdge::new("SOL", "USDC", venue, "pool", fee_bps, reserve, ratio).unwrap()
    }

    #[test]
    fn test_halved_reserve_curve() {
        // 1000 * 1_000_000 / 1_001_000 = 999, halved = 499; fee is not deducted first
        let swap = HalvedReserveCurve.swap(&edge("Orca", 30, 1_000_000, 1.0), 1_000);
        assert_eq!(swap.fee, 3);
        assert_eq!(swap.amount_out, 499);
        assert_eq!(swap.price_impact_bps, 80);
    }

    #[test]
    fn test_constant_product_small_trade_has_small_impact() {
        // in-reserve 1e9, out-reserve 1e11; trade is 0.1% of the pool
        let swap = ConstantProduct.swap(&edge("Orca", 30, 100_000_000_000, 100.0), 1_000_000);
        assert_eq!(swap.fee, 3_000);
        assert!(swap.amount_out < 100_000_000);
        assert!(swap.amount_out > 99_000_000);
        assert!(swap.price_impact_bps >= 30 && swap.price_impact_bps < 40);
    }

    #[test]
    fn test_constant_product_impact_grows_with_size() {
        let pool = edge("Orca", 30, 100_000_000_000, 100.0);
        let small = ConstantProduct.swap(&pool, 1_000_000);
        let large = ConstantProduct.swap(&pool, 100_000_000);
        assert!(large.price_impact_bps > small.price_impact_bps);
    }

    #[test]
    fn test_mul_div_survives_overflow() {
        let big = 1u128 << 126;
        assert_eq!(mul_div(big, 8, 4), 1u128 << 127);
        assert_eq!(mul_div(u128::MAX, u128::MAX, 1), u128::MAX);
        assert_eq!(mul_div(10, 10, 0), 0);
    }

    #[test]
    fn test_registry_dispatches_per_venue() {
        let models = CostModels::default().with_venue("Orca", Arc::new(ConstantProduct));
        let pool = edge("Orca", 30, 1_000_000, 1.0);
        let other = edge("Raydium", 30, 1_000_000, 1.0);
        assert_ne!(models.swap(&pool, 1_000), models.swap(&other, 1_000));
        assert_eq!(models.swap(&other, 1_000), HalvedReserveCurve.swap(&other, 1_000));
    }
}
