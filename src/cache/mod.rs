//! In-process caching for quotes, route lookups and raw pool state.

pub mod quote_cache;

pub use quote_cache::{CacheConfig, CacheMetrics, CacheStats, ClaimedQuote, QuoteCache, RouteKey};
