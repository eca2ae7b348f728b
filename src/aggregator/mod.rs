//! Parallel multi-venue quote fan-out and best-quote selection.

pub mod price_aggregator;

pub use price_aggregator::{
    compare_candidates, AdapterOutcome, FanOutReport, QuoteAggregator, VenueOutcome,
};
