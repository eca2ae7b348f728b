// src/routing/mod.rs
//! Multi-hop routing and MEV screening.
//!
//! - Liquidity graph of pool edges across venues
//! - Amount-aware pathfinding with pluggable per-venue curves
//! - MEV risk scoring and execution protection

pub mod cost;
pub mod graph;
pub mod mev_protection;
pub mod pathfinder;

pub use cost::{ConstantProduct, CostModel, CostModels, EdgeSwap, HalvedReserveCurve};

pub use graph::{GraphStats, LiquidityGraph, LiquiditySnapshot, PoolEdge};

pub use pathfinder::{compare_plans, efficiency, Pathfinder, PathfinderConfig, RoutePlan};

pub use mev_protection::{
    ExecutionStrategy, FrontRunningSignal, RiskAssessment, RiskAssessor, RiskAssessorConfig,
    RiskLevel,
};
