// src/dex/quote.rs

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque token identifier (mint address).
pub type Token = String;

/// Serializes `u128` amounts as decimal strings so they survive JSON consumers that
/// parse numbers as doubles.
pub mod amount_str {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// One hop of a route, executed against a single pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteLeg {
    pub venue: String,
    pub input_token: Token,
    pub output_token: Token,
    #[serde(with = "amount_str")]
    pub input_amount: u128,
    #[serde(with = "amount_str")]
    pub output_amount: u128,
    pub pool_ref: String,
    pub price_impact_bps: u16,
}

/// A normalized, read-only price commitment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub quote_id: Uuid,
    pub input_token: Token,
    pub output_token: Token,
    #[serde(with = "amount_str")]
    pub input_amount: u128,
    #[serde(with = "amount_str")]
    pub output_amount: u128,
    pub price_impact_bps: u16,
    pub legs: Vec<RouteLeg>,
    pub estimated_compute_cost: u64,
    pub mev_protected: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Quote {
    /// Builds a quote whose amounts and tokens come from its legs.
    ///
    /// `legs` must be non-empty and contiguous; `ttl` must be positive.
    pub fn from_legs(
        legs: Vec<RouteLeg>,
        price_impact_bps: u16,
        estimated_compute_cost: u64,
        created_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Option<Self> {
        let first = legs.first()?;
        let last = legs.last()?;
        if ttl <= Duration::zero() || !legs_are_contiguous(&legs) {
            return None;
        }
        Some(Self {
            quote_id: Uuid::new_v4(),
            input_token: first.input_token.clone(),
            output_token: last.output_token.clone(),
            input_amount: first.input_amount,
            output_amount: last.output_amount,
            price_impact_bps,
            legs,
            estimated_compute_cost,
            mev_protected: false,
            created_at,
            expires_at: created_at + ttl,
        })
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn has_route(&self) -> bool {
        !self.legs.is_empty()
    }

    /// Output per unit of input, in raw base units. Display/heuristics only.
    pub fn effective_rate(&self) -> f64 {
        if self.input_amount == 0 {
            return 0.0;
        }
        self.output_amount as f64 / self.input_amount as f64
    }

    /// Venues in leg order, e.g. `Orca → Raydium`.
    pub fn route_display(&self) -> String {
        if self.legs.is_empty() {
            return "Unknown route".to_string();
        }
        self.legs
            .iter()
            .map(|leg| leg.venue.as_str())
            .collect::<Vec<_>>()
            .join(" → ")
    }
}

/// True when each leg starts where the previous one ended.
pub fn legs_are_contiguous(legs: &[RouteLeg]) -> bool {
    legs.windows(2)
        .all(|pair| pair[0].output_token == pair[1].input_token)
}

/// `max(0, min(10000, (1 - output_value / input_value) * 10000))`, where both values are
/// expressed in output-token units against the venue's own spot estimate.
pub fn price_impact_bps(spot_output: u128, actual_output: u128) -> u16 {
    if spot_output == 0 || actual_output >= spot_output {
        return 0;
    }
    let shortfall = spot_output - actual_output;
    // u128 ratio keeps precision for amounts above 2^53
    let bps = shortfall.saturating_mul(10_000) / spot_output;
    bps.min(10_000) as u16
}
