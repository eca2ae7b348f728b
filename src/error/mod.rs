use std::time::Duration;
use thiserror::Error;

/// Typed failure of a single source adapter call.
///
/// Kept distinct from "no route" (`Ok(None)` on the adapter) so the aggregator can tell an
/// unavailable venue apart from a venue that simply has no path for the pair.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    /// Transport-level failure (connection refused, DNS, 5xx)
    #[error("network failure: {0}")]
    Network(String),

    /// The venue did not answer within the per-call budget
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The venue answered with something we could not interpret
    #[error("protocol violation: {0}")]
    Protocol(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RouterError {
    /// No adapter or pathfinder produced a viable path
    #[error("No route available: {0}")]
    NoRoute(String),

    /// One adapter timed out or errored
    #[error("Source Unavailable: {venue}: {reason}")]
    SourceUnavailable { venue: String, reason: SourceError },

    /// A previously issued quote is past its expiry
    #[error("Quote Expired: {0}")]
    QuoteExpired(String),

    #[error("Quote Not Found: {0}")]
    QuoteNotFound(String),

    /// Price impact above the configured ceiling; never auto-adjusted
    #[error("Excessive Price Impact: {impact_bps} bps exceeds ceiling of {ceiling_bps} bps")]
    ExcessiveImpact { impact_bps: u16, ceiling_bps: u16 },

    /// Predecessor reconstruction did not terminate at the input token
    #[error("Graph Inconsistency: {0}")]
    GraphInconsistency(String),

    /// Invalid input parameters
    #[error("Invalid Input: {0}")]
    InvalidInput(String),

    /// Caller deadline elapsed before the fan-out completed
    #[error("Deadline Exceeded after {0:?}")]
    DeadlineExceeded(Duration),

    #[error("Rate Limited: {0}")]
    RateLimited(String),

    /// Configuration errors
    #[error("Config Error: {0}")]
    ConfigError(String),

    /// Network/connectivity issues
    #[error("Network Error: {0}")]
    NetworkError(String),

    /// Submission to the external executor failed
    #[error("Submission Error: {0}")]
    SubmissionError(String),

    /// Persistence sink failures (never fatal to quoting)
    #[error("Persistence Error: {0}")]
    PersistenceError(String),

    /// Parsing errors for venue payloads
    #[error("Parse Error: {0}")]
    ParseError(String),
}

impl From<serde_json::Error> for RouterError {
    fn from(err: serde_json::Error) -> Self {
        RouterError::ParseError(format!("JSON serialization/deserialization error: {}", err))
    }
}

impl From<redis::RedisError> for RouterError {
    fn from(err: redis::RedisError) -> Self {
        RouterError::PersistenceError(format!("Redis error: {}", err))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Normal business outcomes (no route, expired quote)
    Business,
    /// Rejected caller input or an execution-time guard
    Validation,
    /// Venue or collaborator trouble that may clear on its own
    Transient,
    /// Programming errors; should never reach a caller in a healthy build
    Internal,
    Configuration,
}

impl RouterError {
    /// Determines if retrying the same request could succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            RouterError::NoRoute(_) => true, // liquidity may appear
            RouterError::SourceUnavailable { reason, .. } => {
                !matches!(reason, SourceError::Protocol(_))
            }
            RouterError::QuoteExpired(_) => true, // re-quote
            RouterError::QuoteNotFound(_) => true,
            RouterError::ExcessiveImpact { .. } => false,
            RouterError::GraphInconsistency(_) => false,
            RouterError::InvalidInput(_) => false,
            RouterError::DeadlineExceeded(_) => true,
            RouterError::RateLimited(_) => true,
            RouterError::ConfigError(_) => false,
            RouterError::NetworkError(_) => true,
            RouterError::SubmissionError(_) => true,
            RouterError::PersistenceError(_) => true,
            RouterError::ParseError(_) => false,
        }
    }

    pub fn categorize(&self) -> ErrorCategory {
        match self {
            RouterError::NoRoute(_) | RouterError::QuoteExpired(_) | RouterError::QuoteNotFound(_) => {
                ErrorCategory::Business
            }
            RouterError::ExcessiveImpact { .. }
            | RouterError::InvalidInput(_)
            | RouterError::RateLimited(_) => ErrorCategory::Validation,
            RouterError::SourceUnavailable { .. }
            | RouterError::DeadlineExceeded(_)
            | RouterError::NetworkError(_)
            | RouterError::SubmissionError(_)
            | RouterError::PersistenceError(_)
            | RouterError::ParseError(_) => ErrorCategory::Transient,
            RouterError::GraphInconsistency(_) => ErrorCategory::Internal,
            RouterError::ConfigError(_) => ErrorCategory::Configuration,
        }
    }

    pub fn source_unavailable(venue: impl Into<String>, reason: SourceError) -> Self {
        RouterError::SourceUnavailable {
            venue: venue.into(),
            reason,
        }
    }
}

pub type Result<T> = std::result::Result<T, RouterError>;
