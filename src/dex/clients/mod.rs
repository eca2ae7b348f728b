// src/dex/clients/mod.rs
//! Source adapter implementations.
//! Each client implements the SourceAdapter trait.

pub mod jupiter;
pub mod pool_venue;

pub use jupiter::{JupiterAdapter, JupiterQuoteResponse, JUPITER_API_BASE};
pub use pool_venue::{PoolVenue, ORCA_COMPUTE_COST, RAYDIUM_COMPUTE_COST};
