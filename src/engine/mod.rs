//! Request-level orchestration: validation, caching, fan-out, routing, risk and execution.

pub mod quote_engine;
pub mod validation;

pub use quote_engine::{QuoteEngine, QuoteResponse, SwapExecution, EXECUTION_MS_PER_LEG};
pub use validation::{validate_request, QuoteRequest};
