//! Quote cache with lazy expiry.
//!
//! Three keyspaces share one clock:
//! - quotes by id, alive until `min(quote.expires_at, inserted_at + quote_ttl)`
//! - route lookups by `(input, output, amount)`, alive for `route_ttl`
//! - liquidity snapshots by `(venue, pool_ref)`, alive for `liquidity_ttl`
//!
//! Expired entries are evicted by the read that finds them, or in bulk by `purge_expired`.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use log::{debug, info, warn};
use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use uuid::Uuid;

use crate::config::Config;
use crate::dex::quote::{Quote, Token};
use crate::routing::graph::LiquiditySnapshot;
use crate::utils::Clock;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub quote_ttl: Duration,
    pub route_ttl: Duration,
    pub liquidity_ttl: Duration,
    /// Fixed window for the per-user rate limiter.
    pub rate_window: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            quote_ttl: Duration::seconds(30),
            route_ttl: Duration::seconds(60),
            liquidity_ttl: Duration::seconds(10),
            rate_window: Duration::seconds(60),
        }
    }
}

impl From<&Config> for CacheConfig {
    fn from(config: &Config) -> Self {
        Self {
            quote_ttl: Duration::seconds(config.quote_ttl_secs as i64),
            route_ttl: Duration::seconds(config.route_ttl_secs as i64),
            liquidity_ttl: Duration::seconds(config.liquidity_ttl_secs as i64),
            ..Self::default()
        }
    }
}

/// Route-level cache key: the quote fingerprint.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct RouteKey {
    pub input_token: Token,
    pub output_token: Token,
    pub amount: u128,
}

impl RouteKey {
    pub fn new(input_token: &str, output_token: &str, amount: u128) -> Self {
        Self {
            input_token: input_token.to_string(),
            output_token: output_token.to_string(),
            amount,
        }
    }

    pub fn for_quote(quote: &Quote) -> Self {
        Self::new(&quote.input_token, &quote.output_token, quote.input_amount)
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}→{}:{}",
            self.input_token.chars().take(6).collect::<String>(),
            self.output_token.chars().take(6).collect::<String>(),
            self.amount
        )
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: T,
    inserted_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    fn new(value: T, inserted_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value,
            inserted_at,
            expires_at,
        }
    }

    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[derive(Debug, Clone, Copy)]
struct RateWindow {
    started_at: DateTime<Utc>,
    count: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheMetrics {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheStats {
    pub hit_rate: f64,
    pub total_requests: u64,
    pub evictions: u64,
    pub quotes: usize,
    pub routes: usize,
    pub liquidity: usize,
}

impl CacheStats {
    pub fn summary(&self) -> String {
        format!(
            "Quote cache: {:.1}% hit rate over {} lookups, {} quotes / {} routes / {} pools cached, {} evictions",
            self.hit_rate * 100.0,
            self.total_requests,
            self.quotes,
            self.routes,
            self.liquidity,
            self.evictions
        )
    }
}

/// A quote removed from the cache for execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimedQuote {
    pub quote: Quote,
    /// Expiry of the cache entry, which may be earlier than `quote.expires_at`
    pub expires_at: DateTime<Utc>,
}

impl ClaimedQuote {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl Counters {
    fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn evicted(&self, n: usize) {
        self.evictions.fetch_add(n as u64, Ordering::Relaxed);
    }
}

#[derive(Debug)]
pub struct QuoteCache {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    quotes: DashMap<Uuid, CacheEntry<Quote>>,
    routes: DashMap<RouteKey, CacheEntry<Quote>>,
    liquidity: DashMap<(String, String), CacheEntry<LiquiditySnapshot>>,
    rate_windows: DashMap<String, RateWindow>,
    counters: Counters,
}

impl QuoteCache {
    pub fn new(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        info!(
            "🗄️  Initializing quote cache (quote TTL: {}s, route TTL: {}s, liquidity TTL: {}s)",
            config.quote_ttl.num_seconds(),
            config.route_ttl.num_seconds(),
            config.liquidity_ttl.num_seconds()
        );
        Self {
            config,
            clock,
            quotes: DashMap::new(),
            routes: DashMap::new(),
            liquidity: DashMap::new(),
            rate_windows: DashMap::new(),
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Stores `quote` by id, replacing any previous entry with the same id.
    pub fn put(&self, quote: Quote) {
        let now = self.clock.now();
        let expires_at = quote.expires_at.min(now + self.config.quote_ttl);
        debug!("💾 Cached quote {} until {}", quote.quote_id, expires_at);
        self.quotes
            .insert(quote.quote_id, CacheEntry::new(quote, now, expires_at));
    }

    pub fn get(&self, quote_id: &Uuid) -> Option<Quote> {
        let now = self.clock.now();
        let found = self
            .quotes
            .get(quote_id)
            .map(|entry| (!entry.is_expired_at(now)).then(|| entry.value.clone()));

        match found {
            Some(Some(quote)) => {
                self.counters.hit();
                Some(quote)
            }
            Some(None) => {
                // shard guard from `get` is released above; safe to remove
                if self
                    .quotes
                    .remove_if(quote_id, |_, entry| entry.is_expired_at(now))
                    .is_some()
                {
                    self.counters.evicted(1);
                }
                debug!("⏰ Quote {} expired", quote_id);
                self.counters.miss();
                None
            }
            None => {
                self.counters.miss();
                None
            }
        }
    }

    pub fn delete(&self, quote_id: &Uuid) -> bool {
        self.quotes.remove(quote_id).is_some()
    }

    /// Removes the quote in one step, expired or not, along with the route entry that points at
    /// it. At most one caller can claim a given id.
    pub fn take(&self, quote_id: &Uuid) -> Option<ClaimedQuote> {
        let Some((_, entry)) = self.quotes.remove(quote_id) else {
            self.counters.miss();
            return None;
        };
        self.counters.hit();
        let key = RouteKey::for_quote(&entry.value);
        self.routes
            .remove_if(&key, |_, route| route.value.quote_id == *quote_id);
        Some(ClaimedQuote {
            quote: entry.value,
            expires_at: entry.expires_at,
        })
    }

    /// Puts a claimed quote back under its original expiry.
    pub fn release(&self, claim: ClaimedQuote) {
        let now = self.clock.now();
        debug!("↩️  Released quote {}", claim.quote.quote_id);
        self.quotes.insert(
            claim.quote.quote_id,
            CacheEntry::new(claim.quote, now, claim.expires_at),
        );
    }

    /// Stores `quote` as the answer for its `(input, output, amount)` fingerprint.
    pub fn put_route(&self, quote: Quote) {
        let now = self.clock.now();
        let key = RouteKey::for_quote(&quote);
        debug!("💾 Cached route for {}", key);
        self.routes
            .insert(key, CacheEntry::new(quote, now, now + self.config.route_ttl));
    }

    /// A route hit whose quote has itself expired counts as a miss.
    pub fn get_route(&self, input_token: &str, output_token: &str, amount: u128) -> Option<Quote> {
        let now = self.clock.now();
        let key = RouteKey::new(input_token, output_token, amount);
        let is_stale =
            |entry: &CacheEntry<Quote>| entry.is_expired_at(now) || entry.value.is_expired_at(now);

        let found = self
            .routes
            .get(&key)
            .map(|entry| (!is_stale(entry.value())).then(|| entry.value.clone()));

        match found {
            Some(Some(quote)) => {
                debug!("🎯 Route cache HIT for {}", key);
                self.counters.hit();
                Some(quote)
            }
            Some(None) => {
                if self.routes.remove_if(&key, |_, entry| is_stale(entry)).is_some() {
                    self.counters.evicted(1);
                }
                debug!("⏰ Route entry expired for {}", key);
                self.counters.miss();
                None
            }
            None => {
                debug!("📡 Route cache MISS for {}", key);
                self.counters.miss();
                None
            }
        }
    }

    pub fn delete_route(&self, key: &RouteKey) -> bool {
        self.routes.remove(key).is_some()
    }

    pub fn put_liquidity(&self, snapshot: LiquiditySnapshot) {
        let now = self.clock.now();
        let key = (snapshot.venue.clone(), snapshot.pool_ref.clone());
        self.liquidity.insert(
            key,
            CacheEntry::new(snapshot, now, now + self.config.liquidity_ttl),
        );
    }

    pub fn get_liquidity(&self, venue: &str, pool_ref: &str) -> Option<LiquiditySnapshot> {
        let now = self.clock.now();
        let key = (venue.to_string(), pool_ref.to_string());
        let found = self
            .liquidity
            .get(&key)
            .map(|entry| (!entry.is_expired_at(now)).then(|| entry.value.clone()));

        match found {
            Some(Some(snapshot)) => Some(snapshot),
            Some(None) => {
                if self
                    .liquidity
                    .remove_if(&key, |_, entry| entry.is_expired_at(now))
                    .is_some()
                {
                    self.counters.evicted(1);
                }
                None
            }
            None => None,
        }
    }

    /// Live snapshots for every cached pool, any venue.
    pub fn liquidity_snapshots(&self) -> Vec<LiquiditySnapshot> {
        let now = self.clock.now();
        self.liquidity
            .iter()
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| entry.value.clone())
            .collect()
    }

    /// Sweeps every keyspace; returns how many entries were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.quotes.len() + self.routes.len() + self.liquidity.len();

        self.quotes.retain(|_, entry| !entry.is_expired_at(now));
        self.routes
            .retain(|_, entry| !entry.is_expired_at(now) && !entry.value.is_expired_at(now));
        self.liquidity.retain(|_, entry| !entry.is_expired_at(now));
        let window = self.config.rate_window;
        self.rate_windows
            .retain(|_, w| now - w.started_at < window);

        let after = self.quotes.len() + self.routes.len() + self.liquidity.len();
        let purged = before.saturating_sub(after);
        if purged > 0 {
            self.counters.evicted(purged);
            debug!("🧹 Purged {} expired cache entries", purged);
        }
        purged
    }

    /// Fixed-window limiter: `true` while `user` is within `limit` calls this window.
    pub fn check_rate_limit(&self, user: &str, limit: u32) -> bool {
        let now = self.clock.now();
        let window = self.config.rate_window;
        let mut slot = self.rate_windows.entry(user.to_string()).or_insert(RateWindow {
            started_at: now,
            count: 0,
        });

        if now - slot.started_at >= window {
            *slot = RateWindow {
                started_at: now,
                count: 0,
            };
        }
        if slot.count >= limit {
            warn!("🚦 Rate limit hit for {} ({} per window)", user, limit);
            return false;
        }
        slot.count += 1;
        true
    }

    pub fn metrics(&self) -> CacheMetrics {
        CacheMetrics {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
        }
    }

    pub fn stats(&self) -> CacheStats {
        let metrics = self.metrics();
        CacheStats {
            hit_rate: metrics.hit_rate(),
            total_requests: metrics.hits + metrics.misses,
            evictions: metrics.evictions,
            quotes: self.quotes.len(),
            routes: self.routes.len(),
            liquidity: self.liquidity.len(),
        }
    }

    /// Age of the cached entry for `quote_id`, expired or not.
    pub fn age_of(&self, quote_id: &Uuid) -> Option<Duration> {
        let now = self.clock.now();
        self.quotes.get(quote_id).map(|entry| now - entry.inserted_at)
    }
}
