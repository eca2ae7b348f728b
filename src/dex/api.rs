// src/dex/api.rs
//! Source adapter interface shared by every liquidity venue.

use async_trait::async_trait;

use super::quote::Quote;
use crate::error::SourceError;

/// Uniform capability wrapping one liquidity venue.
///
/// `Ok(None)` means the venue has no path for the pair. That is a normal answer and must not
/// be reported as a failure; `Err` is reserved for the venue being unreachable or broken.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Returns the venue name (e.g., "Orca", "Raydium").
    fn name(&self) -> &str;

    async fn quote(
        &self,
        input_token: &str,
        output_token: &str,
        amount: u128,
        max_slippage_bps: u16,
    ) -> Result<Option<Quote>, SourceError>;

    /// Cheap existence probe, independent of amount.
    async fn has_liquidity(&self, input_token: &str, output_token: &str)
        -> Result<bool, SourceError>;
}
