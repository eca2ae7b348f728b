pub mod aggregator;
pub mod analysis;
pub mod cache;
pub mod config;
pub mod dex;
pub mod engine;
pub mod error;
pub mod execution;
pub mod routing;
pub mod utils;

// Re-export the request-level surface for easy access
pub use aggregator::{AdapterOutcome, FanOutReport, QuoteAggregator};
pub use analysis::{AnalysisRequest, AnalysisResponse, Analyst};
pub use cache::QuoteCache;
pub use config::{load_config, Config, VenueConfig, VenueRegistry};
pub use dex::{Quote, RouteLeg, SourceAdapter, Token};
pub use engine::{QuoteEngine, QuoteRequest, QuoteResponse, SwapExecution};
pub use error::{Result, RouterError, SourceError};
pub use execution::{Persister, Submitter, TradeRecord};
pub use routing::{LiquidityGraph, LiquiditySnapshot, Pathfinder, RiskAssessment, RiskAssessor, RiskLevel};
