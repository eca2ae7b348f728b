//! End-to-end control flow of the quote engine against scripted venues.

mod common;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use common::{adapters, init_logging, Behavior, MockAdapter, SOL, USDC, USDT};
use liquidity_flow::{
    aggregator::QuoteAggregator,
    config::{Config, VenueConfig, VenueRegistry},
    dex::{Quote, RouteLeg, SourceAdapter},
    engine::{QuoteEngine, QuoteRequest},
    error::{Result, RouterError},
    execution::{
        Persister, SimulatedSubmitter, SubmissionResult, SubmissionStatus, Submitter, TradeRecord,
    },
    routing::{ExecutionStrategy, LiquiditySnapshot},
    utils::{Clock, ManualClock},
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct BrokenPersister;

#[async_trait]
impl Persister for BrokenPersister {
    async fn record_quote(&self, _quote: &Quote) -> Result<()> {
        Err(RouterError::PersistenceError("disk full".to_string()))
    }

    async fn record_trade(&self, _trade: &TradeRecord) -> Result<()> {
        Err(RouterError::PersistenceError("disk full".to_string()))
    }
}

/// Yields for a while before handing off, like a submitter waiting on the network.
#[derive(Debug, Clone, Default)]
struct SlowSubmitter {
    inner: SimulatedSubmitter,
}

#[async_trait]
impl Submitter for SlowSubmitter {
    async fn submit(&self, quote: &Quote, strategy: &ExecutionStrategy) -> Result<SubmissionResult> {
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.inner.submit(quote, strategy).await
    }
}

struct Harness {
    engine: QuoteEngine,
    clock: ManualClock,
    mocks: Vec<Arc<MockAdapter>>,
    submitter: SimulatedSubmitter,
}

fn harness(behaviors: Vec<(&str, Behavior)>, config: Config) -> Harness {
    init_logging();
    let clock = ManualClock::default();
    let shared_clock: Arc<dyn Clock> = Arc::new(clock.clone());
    let mocks: Vec<Arc<MockAdapter>> = behaviors
        .into_iter()
        .map(|(name, behavior)| Arc::new(MockAdapter::with_clock(name, behavior, shared_clock.clone())))
        .collect();
    let venues = mocks
        .iter()
        .enumerate()
        .map(|(i, m)| VenueConfig::new(m.name(), i as u32 + 1))
        .collect();
    let aggregator = QuoteAggregator::new(
        VenueRegistry::new(venues),
        Duration::from_millis(config.adapter_timeout_ms),
    )
    .with_adapters(adapters(&mocks));

    let submitter = SimulatedSubmitter::new();
    let engine = QuoteEngine::new(Arc::new(config), Arc::new(aggregator), shared_clock)
        .with_submitter(Arc::new(submitter.clone()));
    Harness {
        engine,
        clock,
        mocks,
        submitter,
    }
}

fn quoting(output: u128) -> Behavior {
    Behavior::Quote {
        output,
        impact_bps: 15,
    }
}

#[tokio::test]
async fn test_quote_then_route_cache_hit() {
    let h = harness(vec![("Orca", quoting(150_000_000)), ("Raydium", quoting(149_000_000))], Config::default());
    let request = QuoteRequest::new(SOL, USDC, 1_000_000_000);

    let first = h.engine.quote(&request).await.unwrap();
    assert_eq!(first.quote.output_amount, 150_000_000);
    assert_eq!(first.route_display, "Orca");
    assert_eq!(first.estimated_execution_ms, 250);

    let second = h.engine.quote(&request).await.unwrap();
    assert_eq!(second.quote.quote_id, first.quote.quote_id);
    assert!(h.mocks.iter().all(|m| m.calls() == 1));

    h.clock.advance(ChronoDuration::seconds(61));
    let third = h.engine.quote(&request).await.unwrap();
    assert_ne!(third.quote.quote_id, first.quote.quote_id);
    assert!(h.mocks.iter().all(|m| m.calls() == 2));
}

#[tokio::test]
async fn test_quote_is_retrievable_by_id() {
    let h = harness(vec![("Orca", quoting(10_000))], Config::default());
    let response = h.engine.quote(&QuoteRequest::new(SOL, USDC, 100)).await.unwrap();

    let cached = h.engine.cache().get(&response.quote.quote_id);
    assert_eq!(cached, Some(response.quote.clone()));

    h.clock.advance(ChronoDuration::seconds(31));
    assert_eq!(h.engine.cache().get(&response.quote.quote_id), None);
}

#[tokio::test]
async fn test_no_candidate_is_no_route() {
    let h = harness(
        vec![
            ("Orca", Behavior::Absent),
            ("Raydium", Behavior::Fail(liquidity_flow::error::SourceError::Network("down".into()))),
        ],
        Config::default(),
    );
    let err = h.engine.quote(&QuoteRequest::new(SOL, USDC, 100)).await.unwrap_err();
    assert!(matches!(err, RouterError::NoRoute(_)));
}

#[tokio::test]
async fn test_deadline_exceeded() {
    let config = Config {
        quote_deadline_ms: 50,
        adapter_timeout_ms: 5_000,
        ..Config::default()
    };
    let h = harness(vec![("Orca", Behavior::Hang)], config);

    let err = h.engine.quote(&QuoteRequest::new(SOL, USDC, 100)).await.unwrap_err();
    assert_eq!(err, RouterError::DeadlineExceeded(Duration::from_millis(50)));
    assert_eq!(h.engine.cache().get_route(SOL, USDC, 100), None);
}

#[tokio::test]
async fn test_invalid_request_rejected_before_fan_out() {
    let h = harness(vec![("Orca", quoting(1))], Config::default());

    for request in [
        QuoteRequest::new("SOL", USDC, 100),
        QuoteRequest::new(SOL, SOL, 100),
        QuoteRequest::new(SOL, USDC, 0),
        QuoteRequest::new(SOL, USDC, 100).with_slippage(5_000),
    ] {
        let err = h.engine.quote(&request).await.unwrap_err();
        assert!(matches!(err, RouterError::InvalidInput(_)), "{:?}", request);
    }
    assert_eq!(h.mocks[0].calls(), 0);
}

#[tokio::test]
async fn test_rate_limit_per_user() {
    let config = Config {
        rate_limit_per_minute: Some(2),
        ..Config::default()
    };
    let h = harness(vec![("Orca", quoting(1_000))], config);
    let request = QuoteRequest::new(SOL, USDC, 100).for_user("alice");

    assert!(h.engine.quote(&request).await.is_ok());
    assert!(h.engine.quote(&request).await.is_ok());
    assert!(matches!(h.engine.quote(&request).await, Err(RouterError::RateLimited(_))));

    // anonymous requests are not limited
    assert!(h.engine.quote(&QuoteRequest::new(SOL, USDC, 100)).await.is_ok());

    h.clock.advance(ChronoDuration::seconds(60));
    assert!(h.engine.quote(&request).await.is_ok());
}

#[tokio::test]
async fn test_graph_route_used_when_venues_have_none() {
    let h = harness(vec![("Orca", Behavior::Absent)], Config::default());
    let now = h.clock.now();
    for (venue, pool_ref, a, b) in [
        ("Orca", "sol-usdc", SOL, USDC),
        ("Raydium", "usdc-usdt", USDC, USDT),
    ] {
        h.engine
            .ingest_liquidity(LiquiditySnapshot {
                venue: venue.to_string(),
                pool_ref: pool_ref.to_string(),
                token_a: a.to_string(),
                token_b: b.to_string(),
                reserve_a: 1_000_000_000_000,
                reserve_b: 1_000_000_000_000,
                fee_bps: 30,
                observed_at: now,
            })
            .await
            .unwrap();
    }
    assert!(h.engine.cache().get_liquidity("Raydium", "usdc-usdt").is_some());

    let response = h.engine.quote(&QuoteRequest::new(SOL, USDT, 1_000_000)).await.unwrap();
    assert_eq!(response.route_display, "Orca → Raydium");
    assert_eq!(response.estimated_execution_ms, 500);
    assert_eq!(response.quote.legs.len(), 2);
    assert!(response.quote.output_amount > 990_000);
}

#[tokio::test]
async fn test_execute_swap_submits_and_consumes_quote() {
    let h = harness(vec![("Orca", quoting(150_000_000))], Config::default());
    let response = h.engine.quote(&QuoteRequest::new(SOL, USDC, 1_000_000_000)).await.unwrap();

    let execution = h
        .engine
        .execute_swap(&response.quote.quote_id, Some(0.15))
        .await
        .unwrap();
    assert_eq!(execution.trade.status, SubmissionStatus::Submitted);
    assert_eq!(execution.trade.quote_id, response.quote.quote_id);
    assert_eq!(execution.strategy.legs.len(), 1);
    assert_eq!(execution.strategy.slippage_guard_bps, Some(50));
    let signal = execution.front_running.expect("signal");
    assert!(!signal.detected);
    assert_eq!(h.submitter.submissions().len(), 1);

    let err = h
        .engine
        .execute_swap(&response.quote.quote_id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, RouterError::QuoteNotFound(_)));
}

#[tokio::test]
async fn test_execute_swap_flags_front_running() {
    let h = harness(vec![("Orca", quoting(150_000_000))], Config::default());
    let response = h.engine.quote(&QuoteRequest::new(SOL, USDC, 1_000_000_000)).await.unwrap();

    // quote rate 0.15 vs market 0.14: ~7% above
    let execution = h
        .engine
        .execute_swap(&response.quote.quote_id, Some(0.14))
        .await
        .unwrap();
    let signal = execution.front_running.expect("signal");
    assert!(signal.detected);
    assert_eq!(signal.confidence, 0.8);
}

#[tokio::test]
async fn test_execute_unknown_or_expired_quote() {
    let h = harness(vec![("Orca", quoting(1_000))], Config::default());
    let missing = h.engine.execute_swap(&uuid::Uuid::new_v4(), None).await.unwrap_err();
    assert!(matches!(missing, RouterError::QuoteNotFound(_)));

    let response = h.engine.quote(&QuoteRequest::new(SOL, USDC, 100)).await.unwrap();
    h.clock.advance(ChronoDuration::seconds(45));
    let expired = h.engine.execute_swap(&response.quote.quote_id, None).await.unwrap_err();
    assert!(matches!(expired, RouterError::QuoteExpired(_)));

    // the expired entry is gone after the failed attempt
    let again = h.engine.execute_swap(&response.quote.quote_id, None).await.unwrap_err();
    assert!(matches!(again, RouterError::QuoteNotFound(_)));
}

#[tokio::test]
async fn test_validate_for_execution() {
    let h = harness(vec![("Orca", quoting(1_000))], Config::default());
    let leg = |impact: u16| RouteLeg {
        venue: "Orca".to_string(),
        input_token: SOL.to_string(),
        output_token: USDC.to_string(),
        input_amount: 100,
        output_amount: 1_000,
        pool_ref: "orca-pool".to_string(),
        price_impact_bps: impact,
    };
    let now = h.clock.now();

    let fine = Quote::from_legs(vec![leg(15)], 15, 0, now, ChronoDuration::seconds(30)).unwrap();
    assert_eq!(h.engine.validate_for_execution(&fine), Ok(()));

    let steep = Quote::from_legs(vec![leg(1_500)], 1_500, 0, now, ChronoDuration::seconds(30)).unwrap();
    assert_eq!(
        h.engine.validate_for_execution(&steep),
        Err(RouterError::ExcessiveImpact {
            impact_bps: 1_500,
            ceiling_bps: 1_000
        })
    );

    h.clock.advance(ChronoDuration::seconds(31));
    assert!(matches!(
        h.engine.validate_for_execution(&fine),
        Err(RouterError::QuoteExpired(_))
    ));

    let mut legless = Quote::from_legs(vec![leg(0)], 0, 0, h.clock.now(), ChronoDuration::seconds(30)).unwrap();
    legless.legs.clear();
    assert!(matches!(
        h.engine.validate_for_execution(&legless),
        Err(RouterError::NoRoute(_))
    ));
}

#[tokio::test]
async fn test_persister_failure_is_not_fatal() {
    let h = harness(vec![("Orca", quoting(150_000_000))], Config::default());
    let engine = h.engine.with_persister(Arc::new(BrokenPersister));

    let response = engine.quote(&QuoteRequest::new(SOL, USDC, 1_000_000_000)).await.unwrap();
    let execution = engine.execute_swap(&response.quote.quote_id, None).await.unwrap();
    assert_eq!(execution.trade.status, SubmissionStatus::Submitted);
}

#[tokio::test]
async fn test_all_quotes_sorted_by_output() {
    let h = harness(
        vec![("Orca", quoting(100)), ("Raydium", quoting(300)), ("Jupiter", quoting(200))],
        Config::default(),
    );
    let quotes = h.engine.all_quotes(&QuoteRequest::new(SOL, USDC, 10)).await.unwrap();
    let outputs: Vec<u128> = quotes.iter().map(|q| q.output_amount).collect();
    assert_eq!(outputs, vec![300, 200, 100]);
}

#[tokio::test]
async fn test_quote_timestamps_follow_injected_clock() {
    let h = harness(vec![("Orca", quoting(1_000))], Config::default());
    let before = Utc::now() - ChronoDuration::days(1);
    h.clock.set(before);

    let response = h.engine.quote(&QuoteRequest::new(SOL, USDC, 100)).await.unwrap();
    assert_eq!(response.quote.created_at, before);
}

#[tokio::test]
async fn test_concurrent_execution_submits_once() {
    let h = harness(vec![("Orca", quoting(150_000_000))], Config::default());
    let submitter = SlowSubmitter::default();
    let engine = h.engine.with_submitter(Arc::new(submitter.clone()));
    let id = engine
        .quote(&QuoteRequest::new(SOL, USDC, 1_000_000_000))
        .await
        .unwrap()
        .quote
        .quote_id;

    let (a, b) = tokio::join!(engine.execute_swap(&id, None), engine.execute_swap(&id, None));
    assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
    let err = a.err().or(b.err()).unwrap();
    assert!(matches!(err, RouterError::QuoteNotFound(_)));
    assert_eq!(submitter.inner.submissions().len(), 1);
}

#[tokio::test]
async fn test_route_cache_only_serves_executable_quotes() {
    let h = harness(vec![("Orca", quoting(150_000_000))], Config::default());
    let request = QuoteRequest::new(SOL, USDC, 1_000_000_000);
    let first = h.engine.quote(&request).await.unwrap();

    // past the 30s id lifetime, inside the 60s route lifetime
    h.clock.advance(ChronoDuration::seconds(31));
    let second = h.engine.quote(&request).await.unwrap();
    assert_ne!(second.quote.quote_id, first.quote.quote_id);
    assert_eq!(h.mocks[0].calls(), 2);

    let execution = h.engine.execute_swap(&second.quote.quote_id, None).await.unwrap();
    assert_eq!(execution.trade.quote_id, second.quote.quote_id);
}

#[tokio::test]
async fn test_requote_after_execution_is_fresh() {
    let h = harness(vec![("Orca", quoting(150_000_000))], Config::default());
    let request = QuoteRequest::new(SOL, USDC, 1_000_000_000);
    let first = h.engine.quote(&request).await.unwrap();
    h.engine.execute_swap(&first.quote.quote_id, None).await.unwrap();

    let second = h.engine.quote(&request).await.unwrap();
    assert_ne!(second.quote.quote_id, first.quote.quote_id);
    assert!(h.engine.execute_swap(&second.quote.quote_id, None).await.is_ok());
    assert_eq!(h.submitter.submissions().len(), 2);
}

#[tokio::test]
async fn test_failed_submission_keeps_quote() {
    let h = harness(vec![("Orca", quoting(150_000_000))], Config::default());
    let engine = h
        .engine
        .with_submitter(Arc::new(SimulatedSubmitter::rejecting("executor offline")));
    let response = engine.quote(&QuoteRequest::new(SOL, USDC, 1_000_000_000)).await.unwrap();

    let err = engine.execute_swap(&response.quote.quote_id, None).await.unwrap_err();
    assert_eq!(err, RouterError::SubmissionError("executor offline".to_string()));
    assert_eq!(engine.cache().get(&response.quote.quote_id), Some(response.quote));
}
