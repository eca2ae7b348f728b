//! Quote aggregation across venues.
//!
//! Every enabled venue gets its own spawned task under a per-call timeout. A venue that errors,
//! hangs or panics is reported as `Failed` and never disturbs its siblings; a venue with no
//! route for the pair is `Absent`.

use futures::future::join_all;
use log::{debug, info, warn};
use std::{
    cmp::Ordering,
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use crate::config::{Config, VenueConfig, VenueRegistry};
use crate::dex::api::SourceAdapter;
use crate::dex::quote::Quote;
use crate::error::SourceError;

#[derive(Debug, Clone, PartialEq)]
pub enum AdapterOutcome {
    Quoted(Quote),
    Absent,
    Failed(SourceError),
}

#[derive(Debug, Clone)]
pub struct VenueOutcome {
    pub venue: String,
    pub priority: u32,
    pub outcome: AdapterOutcome,
    pub elapsed: Duration,
}

/// Everything one fan-out produced, in venue priority order.
#[derive(Debug, Clone, Default)]
pub struct FanOutReport {
    pub outcomes: Vec<VenueOutcome>,
}

impl FanOutReport {
    pub fn quotes(&self) -> impl Iterator<Item = (&Quote, u32)> {
        self.outcomes.iter().filter_map(|o| match &o.outcome {
            AdapterOutcome::Quoted(q) => Some((q, o.priority)),
            _ => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &SourceError)> {
        self.outcomes.iter().filter_map(|o| match &o.outcome {
            AdapterOutcome::Failed(e) => Some((o.venue.as_str(), e)),
            _ => None,
        })
    }

    pub fn quoted_count(&self) -> usize {
        self.quotes().count()
    }

    pub fn absent_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.outcome == AdapterOutcome::Absent)
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }

    pub fn best(&self) -> Option<Quote> {
        self.quotes()
            .min_by(|a, b| compare_candidates(*a, *b))
            .map(|(q, _)| q.clone())
    }

    /// All quotes, best first.
    pub fn ranked(&self) -> Vec<Quote> {
        let mut quotes: Vec<_> = self.quotes().collect();
        quotes.sort_by(|a, b| compare_candidates(*a, *b));
        quotes.into_iter().map(|(q, _)| q.clone()).collect()
    }
}

/// `Less` means `a` is the better candidate: larger output, then lower impact, then the
/// venue with the smaller priority number.
pub fn compare_candidates(a: (&Quote, u32), b: (&Quote, u32)) -> Ordering {
    b.0.output_amount
        .cmp(&a.0.output_amount)
        .then(a.0.price_impact_bps.cmp(&b.0.price_impact_bps))
        .then(a.1.cmp(&b.1))
}

pub struct QuoteAggregator {
    adapters: HashMap<String, Arc<dyn SourceAdapter>>,
    registry: VenueRegistry,
    adapter_timeout: Duration,
}

impl QuoteAggregator {
    pub fn new(registry: VenueRegistry, adapter_timeout: Duration) -> Self {
        Self {
            adapters: HashMap::new(),
            registry,
            adapter_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            VenueRegistry::new(config.venues.clone()),
            Duration::from_millis(config.adapter_timeout_ms),
        )
    }

    pub fn with_adapters(mut self, adapters: impl IntoIterator<Item = Arc<dyn SourceAdapter>>) -> Self {
        for adapter in adapters {
            self.register(adapter);
        }
        self
    }

    /// Registers (or replaces) the adapter under its own name.
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        let name = adapter.name().to_string();
        if self.adapters.insert(name.clone(), adapter).is_some() {
            debug!("Replaced adapter {}", name);
        }
    }

    pub fn registry(&self) -> &VenueRegistry {
        &self.registry
    }

    pub fn adapter_timeout(&self) -> Duration {
        self.adapter_timeout
    }

    /// Enabled venues with a registered adapter, in priority order.
    async fn active_venues(&self) -> Vec<(VenueConfig, Arc<dyn SourceAdapter>)> {
        let venues = self.registry.enabled().await;
        venues
            .into_iter()
            .filter_map(|venue| match self.adapters.get(&venue.name) {
                Some(adapter) => Some((venue, Arc::clone(adapter))),
                None => {
                    debug!("Venue {} enabled but no adapter registered", venue.name);
                    None
                }
            })
            .collect()
    }

    /// Asks every active venue for a quote concurrently and waits for all of them.
    pub async fn collect_outcomes(
        &self,
        input_token: &str,
        output_token: &str,
        amount: u128,
        max_slippage_bps: u16,
    ) -> FanOutReport {
        let start_time = Instant::now();
        let venues = self.active_venues().await;
        let timeout = self.adapter_timeout;

        let tasks: Vec<_> = venues
            .into_iter()
            .map(|(venue, adapter)| {
                let input = input_token.to_string();
                let output = output_token.to_string();
                let handle = tokio::spawn(async move {
                    let started = Instant::now();
                    let outcome = match tokio::time::timeout(
                        timeout,
                        adapter.quote(&input, &output, amount, max_slippage_bps),
                    )
                    .await
                    {
                        Ok(Ok(Some(quote))) => AdapterOutcome::Quoted(quote),
                        Ok(Ok(None)) => AdapterOutcome::Absent,
                        Ok(Err(e)) => AdapterOutcome::Failed(e),
                        Err(_) => AdapterOutcome::Failed(SourceError::Timeout(timeout)),
                    };
                    (outcome, started.elapsed())
                });
                async move {
                    let (outcome, elapsed) = match handle.await {
                        Ok(done) => done,
                        Err(join_error) => (
                            AdapterOutcome::Failed(SourceError::Protocol(format!(
                                "adapter task aborted: {}",
                                join_error
                            ))),
                            Duration::ZERO,
                        ),
                    };
                    VenueOutcome {
                        venue: venue.name,
                        priority: venue.priority,
                        outcome,
                        elapsed,
                    }
                }
            })
            .collect();

        let outcomes = join_all(tasks).await;

        for outcome in &outcomes {
            match &outcome.outcome {
                AdapterOutcome::Quoted(quote) => debug!(
                    "✅ {} quoted {} -> {} in {:?}",
                    outcome.venue, amount, quote.output_amount, outcome.elapsed
                ),
                AdapterOutcome::Absent => debug!("{} has no route", outcome.venue),
                AdapterOutcome::Failed(e) => {
                    warn!("❌ Failed to get quote from {}: {}", outcome.venue, e)
                }
            }
        }

        let report = FanOutReport { outcomes };
        info!(
            "Fan-out {} -> {} ({}): {} quoted, {} absent, {} failed in {:?}",
            input_token,
            output_token,
            amount,
            report.quoted_count(),
            report.absent_count(),
            report.failed_count(),
            start_time.elapsed()
        );
        report
    }

    pub async fn best_quote(
        &self,
        input_token: &str,
        output_token: &str,
        amount: u128,
        max_slippage_bps: u16,
    ) -> Option<Quote> {
        self.collect_outcomes(input_token, output_token, amount, max_slippage_bps)
            .await
            .best()
    }

    /// Every venue's quote, largest output first.
    pub async fn all_quotes(
        &self,
        input_token: &str,
        output_token: &str,
        amount: u128,
        max_slippage_bps: u16,
    ) -> Vec<Quote> {
        self.collect_outcomes(input_token, output_token, amount, max_slippage_bps)
            .await
            .ranked()
    }

    /// True if any venue reports liquidity; failing venues count as "no".
    pub async fn has_liquidity(&self, input_token: &str, output_token: &str) -> bool {
        let venues = self.active_venues().await;
        let timeout = self.adapter_timeout;

        let tasks: Vec<_> = venues
            .into_iter()
            .map(|(venue, adapter)| {
                let input = input_token.to_string();
                let output = output_token.to_string();
                let handle = tokio::spawn(async move {
                    tokio::time::timeout(timeout, adapter.has_liquidity(&input, &output)).await
                });
                async move {
                    match handle.await {
                        Ok(Ok(Ok(found))) => found,
                        Ok(Ok(Err(e))) => {
                            warn!("Liquidity probe on {} failed: {}", venue.name, e);
                            false
                        }
                        Ok(Err(_)) => {
                            warn!("Liquidity probe on {} timed out after {:?}", venue.name, timeout);
                            false
                        }
                        Err(e) => {
                            warn!("Liquidity probe task for {} aborted: {}", venue.name, e);
                            false
                        }
                    }
                }
            })
            .collect();

        join_all(tasks).await.into_iter().any(|found| found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dex::quote::RouteLeg;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};
    use pretty_assertions::assert_eq;

    fn quote(venue: &str, out: u128, impact: u16) -> Quote {
        let leg = RouteLeg {
            venue: venue.to_string(),
            input_token: "SOL".to_string(),
            output_token: "USDC".to_string(),
            input_amount: 1_000,
            output_amount: out,
            pool_ref: format!("{}-pool", venue),
            price_impact_bps: impact,
        };
        Quote::from_legs(vec![leg], impact, 0, Utc::now(), ChronoDuration::seconds(30)).unwrap()
    }

    #[derive(Debug)]
    struct Fixed {
        name: &'static str,
        result: Result<Option<Quote>, SourceError>,
    }

    #[async_trait]
    impl SourceAdapter for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        async fn quote(&self, _: &str, _: &str, _: u128, _: u16) -> Result<Option<Quote>, SourceError> {
            self.result.clone()
        }

        async fn has_liquidity(&self, _: &str, _: &str) -> Result<bool, SourceError> {
            self.result.clone().map(|q| q.is_some())
        }
    }

    fn aggregator(adapters: Vec<Fixed>) -> QuoteAggregator {
        let venues = adapters
            .iter()
            .enumerate()
            .map(|(i, a)| VenueConfig::new(a.name, i as u32 + 1))
            .collect();
        QuoteAggregator::new(VenueRegistry::new(venues), Duration::from_millis(500)).with_adapters(
            adapters
                .into_iter()
                .map(|a| Arc::new(a) as Arc<dyn SourceAdapter>),
        )
    }

    #[test]
    fn test_compare_prefers_output_then_impact_then_priority() {
        let big = quote("A", 120, 50);
        let small = quote("B", 119, 1);
        assert_eq!(compare_candidates((&big, 2), (&small, 1)), Ordering::Less);

        let calm = quote("A", 120, 10);
        assert_eq!(compare_candidates((&calm, 2), (&big, 1)), Ordering::Less);

        let twin = quote("B", 120, 50);
        assert_eq!(compare_candidates((&twin, 1), (&big, 2)), Ordering::Less);
    }

    #[tokio::test]
    async fn test_failure_does_not_abort_siblings() {
        let agg = aggregator(vec![
            Fixed { name: "Broken", result: Err(SourceError::Network("connection reset".into())) },
            Fixed { name: "Orca", result: Ok(Some(quote("Orca", 500, 20))) },
            Fixed { name: "Empty", result: Ok(None) },
        ]);

        let report = agg.collect_outcomes("SOL", "USDC", 1_000, 50).await;
        assert_eq!(report.quoted_count(), 1);
        assert_eq!(report.absent_count(), 1);
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.best().map(|q| q.output_amount), Some(500));
        assert!(agg.has_liquidity("SOL", "USDC").await);
    }

    #[tokio::test]
    async fn test_disabled_venue_is_skipped() {
        let agg = aggregator(vec![
            Fixed { name: "Orca", result: Ok(Some(quote("Orca", 500, 20))) },
            Fixed { name: "Raydium", result: Ok(Some(quote("Raydium", 900, 20))) },
        ]);
        agg.registry()
            .replace(vec![VenueConfig::new("Orca", 1), VenueConfig::new("Raydium", 2).disabled()])
            .await;

        let all = agg.all_quotes("SOL", "USDC", 1_000, 50).await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].legs[0].venue, "Orca");
    }

    #[tokio::test]
    async fn test_no_quotes_yields_none() {
        let agg = aggregator(vec![Fixed { name: "Empty", result: Ok(None) }]);
        assert_eq!(agg.best_quote("SOL", "USDC", 1_000, 50).await, None);
        assert!(!agg.has_liquidity("SOL", "USDC").await);
    }
}
