// src/routing/mev_protection.rs
//! MEV risk scoring and protection strategies.
//!
//! Scoring is additive over independent factors and capped at 100:
//! - price impact above 5% (+30) or above 2% (+15)
//! - swap value above $100k (+25) or above $10k (+10)
//! - routes longer than 3 legs (+15)
//! - liquidity below 100k units (+20)
//! - quotes not already MEV-protected (+10)
//!
//! Everything here is synchronous and pure apart from the injected random source.

use log::{debug, warn};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::config::Config;
use crate::dex::quote::{Quote, RouteLeg};
use crate::utils::to_units;

pub const ROUTE_RANDOMIZATION: &str = "route_randomization";
pub const PRIVATE_SUBMISSION: &str = "private_submission";
pub const EXECUTION_DELAY: &str = "execution_delay";
pub const SLIPPAGE_GUARD: &str = "slippage_guard";

/// MEV risk levels for quote assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Standard slippage guard only
    Low,
    /// Route randomization plus slippage guard
    Medium,
    /// Randomization, private submission and a delayed start
    High,
}

impl RiskLevel {
    pub fn from_score(score: u8) -> Self {
        match score {
            s if s >= 60 => RiskLevel::High,
            s if s >= 30 => RiskLevel::Medium,
            _ => RiskLevel::Low,
        }
    }

    pub fn protections(&self) -> Vec<String> {
        let names: &[&str] = match self {
            RiskLevel::High => &[ROUTE_RANDOMIZATION, PRIVATE_SUBMISSION, EXECUTION_DELAY],
            RiskLevel::Medium => &[ROUTE_RANDOMIZATION, SLIPPAGE_GUARD],
            RiskLevel::Low => &[SLIPPAGE_GUARD],
        };
        names.iter().map(|n| n.to_string()).collect()
    }

    /// Priority-fee multiplier for private submission.
    pub fn fee_multiplier(&self) -> u64 {
        match self {
            RiskLevel::Low => 1,
            RiskLevel::Medium => 2,
            RiskLevel::High => 5,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub score: u8,
    pub factors: Vec<String>,
    pub protections: Vec<String>,
}

impl RiskAssessment {
    pub fn requires(&self, protection: &str) -> bool {
        self.protections.iter().any(|p| p == protection)
    }
}

/// Heuristic signal for logging and alerting; never a hard gate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrontRunningSignal {
    pub detected: bool,
    pub confidence: f64,
    /// Relative deviation of the quote's rate from the market rate
    pub deviation: f64,
}

/// What the submitter needs to execute a quote safely.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionStrategy {
    pub level: RiskLevel,
    /// Submission order; amounts are never touched by randomization
    pub legs: Vec<RouteLeg>,
    pub delay: Duration,
    pub private_submission: bool,
    pub slippage_guard_bps: Option<u16>,
    pub priority_fee: u64,
    pub protections: Vec<String>,
}

impl ExecutionStrategy {
    /// Suspends the caller for the strategy's delay before submission.
    pub async fn wait_before_submission(&self) {
        if !self.delay.is_zero() {
            debug!("⏳ Delaying submission by {:?} ({} risk)", self.delay, self.level);
            tokio::time::sleep(self.delay).await;
        }
    }
}

/// Risk assessor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessorConfig {
    pub base_delay_ms: u64,
    /// Upper bound of the uniform jitter added on top of the base delay
    pub max_jitter_ms: u64,
    pub unit_decimals: u32,
    pub usd_per_unit: f64,
    pub low_liquidity_units: f64,
    pub base_priority_fee: u64,
    pub max_slippage_bps: u16,
}

impl Default for RiskAssessorConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 500,
            max_jitter_ms: 1500,
            unit_decimals: 9,
            usd_per_unit: 100.0,
            low_liquidity_units: 100_000.0,
            base_priority_fee: 5000,
            max_slippage_bps: 1000,
        }
    }
}

impl From<&Config> for RiskAssessorConfig {
    fn from(config: &Config) -> Self {
        Self {
            base_delay_ms: config.base_delay_ms,
            unit_decimals: config.unit_decimals,
            usd_per_unit: config.usd_per_unit,
            base_priority_fee: config.base_priority_fee,
            max_slippage_bps: config.max_slippage_bps,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RiskAssessor {
    config: RiskAssessorConfig,
}

impl RiskAssessor {
    pub fn new(config: RiskAssessorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskAssessorConfig {
        &self.config
    }

    /// Scores a quote for MEV exposure.
    ///
    /// `estimated_usd_value` falls back to a unit-price estimate of `input_amount`.
    pub fn assess(
        &self,
        quote: &Quote,
        input_amount: u128,
        estimated_usd_value: Option<f64>,
    ) -> RiskAssessment {
        let mut score: u32 = 0;
        let mut factors = Vec::new();

        let impact_pct = quote.price_impact_bps as f64 / 100.0;
        if quote.price_impact_bps > 500 {
            score += 30;
            factors.push(format!("High price impact ({:.2}%)", impact_pct));
        } else if quote.price_impact_bps > 200 {
            score += 15;
            factors.push(format!("Moderate price impact ({:.2}%)", impact_pct));
        }

        let usd_value = estimated_usd_value.unwrap_or_else(|| self.estimate_usd_value(input_amount));
        if usd_value > 100_000.0 {
            score += 25;
            factors.push(format!("Large swap size (${:.0})", usd_value));
        } else if usd_value > 10_000.0 {
            score += 10;
            factors.push(format!("Medium swap size (${:.0})", usd_value));
        }

        if quote.legs.len() > 3 {
            score += 15;
            factors.push(format!("Complex route ({} legs)", quote.legs.len()));
        }

        let liquidity = self.estimate_liquidity_units(quote);
        if liquidity < self.config.low_liquidity_units {
            score += 20;
            factors.push(format!("Low liquidity ({:.0} units)", liquidity));
        }

        if !quote.mev_protected {
            score += 10;
            factors.push("No MEV protection".to_string());
        }

        let score = score.min(100) as u8;
        let level = RiskLevel::from_score(score);
        debug!(
            "MEV assessment for {}: score {} ({}), factors: {:?}",
            quote.quote_id, score, level, factors
        );

        RiskAssessment {
            level,
            score,
            factors,
            protections: level.protections(),
        }
    }

    pub fn estimate_usd_value(&self, input_amount: u128) -> f64 {
        to_units(input_amount, self.config.unit_decimals) * self.config.usd_per_unit
    }

    pub fn estimate_liquidity_units(&self, quote: &Quote) -> f64 {
        to_units(quote.output_amount, self.config.unit_decimals)
    }

    /// Flags a quote whose rate beats the recent market rate by more than 2% (or 5%).
    pub fn detect_front_running(&self, quote: &Quote, recent_market_rate: f64) -> FrontRunningSignal {
        if recent_market_rate <= 0.0 || !recent_market_rate.is_finite() {
            return FrontRunningSignal {
                detected: false,
                confidence: 0.1,
                deviation: 0.0,
            };
        }
        let deviation = (quote.effective_rate() - recent_market_rate) / recent_market_rate;
        let signal = if deviation > 0.05 {
            FrontRunningSignal {
                detected: true,
                confidence: 0.8,
                deviation,
            }
        } else if deviation > 0.02 {
            FrontRunningSignal {
                detected: true,
                confidence: 0.5,
                deviation,
            }
        } else {
            FrontRunningSignal {
                detected: false,
                confidence: 0.1,
                deviation,
            }
        };
        if signal.detected {
            warn!(
                "⚠️  Possible front-running on {}: rate deviates {:.2}% from market (confidence {})",
                quote.quote_id,
                deviation * 100.0,
                signal.confidence
            );
        }
        signal
    }

    /// Uniform Fisher–Yates shuffle of the submission order.
    pub fn randomize_route<R: Rng + ?Sized>(&self, legs: &[RouteLeg], rng: &mut R) -> Vec<RouteLeg> {
        let mut shuffled = legs.to_vec();
        shuffled.shuffle(rng);
        shuffled
    }

    /// `base_delay_ms + uniform(0, max_jitter_ms)` for high risk, zero otherwise.
    pub fn execution_delay<R: Rng + ?Sized>(&self, level: RiskLevel, rng: &mut R) -> Duration {
        if level != RiskLevel::High {
            return Duration::ZERO;
        }
        let jitter = rng.gen_range(0..=self.config.max_jitter_ms);
        Duration::from_millis(self.config.base_delay_ms + jitter)
    }

    pub fn priority_fee(&self, level: RiskLevel) -> u64 {
        self.config.base_priority_fee.saturating_mul(level.fee_multiplier())
    }

    pub fn protect<R: Rng + ?Sized>(
        &self,
        quote: &Quote,
        assessment: &RiskAssessment,
        slippage_bps: u16,
        rng: &mut R,
    ) -> ExecutionStrategy {
        let legs = if assessment.requires(ROUTE_RANDOMIZATION) {
            self.randomize_route(&quote.legs, rng)
        } else {
            quote.legs.clone()
        };
        let delay = if assessment.requires(EXECUTION_DELAY) {
            self.execution_delay(assessment.level, rng)
        } else {
            Duration::ZERO
        };
        let private_submission = assessment.requires(PRIVATE_SUBMISSION);

        ExecutionStrategy {
            level: assessment.level,
            legs,
            delay,
            private_submission,
            slippage_guard_bps: Some(slippage_bps.min(self.config.max_slippage_bps)),
            priority_fee: if private_submission {
                self.priority_fee(assessment.level)
            } else {
                self.config.base_priority_fee
            },
            protections: assessment.protections.clone(),
        }
    }
}
