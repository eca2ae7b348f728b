use std::env;

use super::venues::{parse_venue_list, VenueConfig};

pub const DEFAULT_JUPITER_API_URL: &str = "https://quote-api.jup.ag/v6";
pub const DEFAULT_VENUES: &str = "Jupiter:1,Orca:2,Raydium:3";

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub adapter_timeout_ms: u64,
    pub quote_deadline_ms: u64,
    pub quote_ttl_secs: u64,
    pub route_ttl_secs: u64,
    pub liquidity_ttl_secs: u64,
    pub max_price_impact_bps: u16,
    pub default_slippage_bps: u16,
    pub max_slippage_bps: u16,
    pub max_hops: usize,
    pub max_amount: Option<u128>,
    pub base_delay_ms: u64,
    pub unit_decimals: u32,
    pub usd_per_unit: f64,
    pub base_priority_fee: u64,
    pub rate_limit_per_minute: Option<u32>,
    pub jupiter_api_url: String,
    pub jupiter_enabled: bool,
    pub redis_url: Option<String>,
    pub venues: Vec<VenueConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            adapter_timeout_ms: 5000,
            quote_deadline_ms: 8000,
            quote_ttl_secs: 30,
            route_ttl_secs: 60,
            liquidity_ttl_secs: 10,
            max_price_impact_bps: 1000,
            default_slippage_bps: 50,
            max_slippage_bps: 1000,
            max_hops: 4,
            max_amount: None,
            base_delay_ms: 500,
            unit_decimals: 9,
            usd_per_unit: 100.0,
            base_priority_fee: 5000,
            rate_limit_per_minute: Some(60),
            jupiter_api_url: DEFAULT_JUPITER_API_URL.to_string(),
            jupiter_enabled: false,
            redis_url: None,
            venues: parse_venue_list(DEFAULT_VENUES),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Config::default();
        Config {
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            adapter_timeout_ms: env::var("ADAPTER_TIMEOUT_MS")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .unwrap_or(defaults.adapter_timeout_ms),
            quote_deadline_ms: env::var("QUOTE_DEADLINE_MS")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .unwrap_or(defaults.quote_deadline_ms),
            quote_ttl_secs: env::var("QUOTE_TTL_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(defaults.quote_ttl_secs),
            route_ttl_secs: env::var("ROUTE_TTL_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(defaults.route_ttl_secs),
            liquidity_ttl_secs: env::var("LIQUIDITY_TTL_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(defaults.liquidity_ttl_secs),
            max_price_impact_bps: env::var("MAX_PRICE_IMPACT_BPS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_price_impact_bps),
            default_slippage_bps: env::var("DEFAULT_SLIPPAGE_BPS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_slippage_bps),
            max_slippage_bps: env::var("MAX_SLIPPAGE_BPS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_slippage_bps),
            max_hops: env::var("MAX_HOPS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_hops),
            max_amount: env::var("MAX_AMOUNT").ok().and_then(|v| v.parse().ok()),
            base_delay_ms: env::var("BASE_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.base_delay_ms),
            unit_decimals: env::var("UNIT_DECIMALS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.unit_decimals),
            usd_per_unit: env::var("USD_PER_UNIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.usd_per_unit),
            base_priority_fee: env::var("BASE_PRIORITY_FEE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.base_priority_fee),
            rate_limit_per_minute: match env::var("RATE_LIMIT_PER_MINUTE") {
                Ok(v) if v == "0" || v.eq_ignore_ascii_case("off") => None,
                Ok(v) => v.parse().ok().or(defaults.rate_limit_per_minute),
                Err(_) => defaults.rate_limit_per_minute,
            },
            jupiter_api_url: env::var("JUPITER_API_URL")
                .unwrap_or_else(|_| DEFAULT_JUPITER_API_URL.to_string()),
            jupiter_enabled: env::var("JUPITER_ENABLED")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.jupiter_enabled),
            redis_url: env::var("REDIS_URL").ok().filter(|v| !v.is_empty()),
            venues: env::var("VENUES")
                .map(|v| parse_venue_list(&v))
                .unwrap_or(defaults.venues),
        }
    }

    /// Logs the loaded configuration and reports every problem found.
    pub fn validate_and_log(&self) -> Vec<String> {
        log::info!("Router Configuration Loaded: {:?}", self);

        let mut problems = Vec::new();
        if self.adapter_timeout_ms == 0 {
            problems.push("ADAPTER_TIMEOUT_MS must be positive".to_string());
        }
        if self.quote_deadline_ms < self.adapter_timeout_ms {
            log::warn!(
                "QUOTE_DEADLINE_MS ({}) is shorter than ADAPTER_TIMEOUT_MS ({}); slow venues will be cut off by the deadline",
                self.quote_deadline_ms,
                self.adapter_timeout_ms
            );
        }
        if self.max_slippage_bps > 10_000 {
            problems.push("MAX_SLIPPAGE_BPS cannot exceed 10000".to_string());
        }
        if self.default_slippage_bps > self.max_slippage_bps {
            problems.push("DEFAULT_SLIPPAGE_BPS cannot exceed MAX_SLIPPAGE_BPS".to_string());
        }
        if self.max_price_impact_bps > 10_000 {
            problems.push("MAX_PRICE_IMPACT_BPS cannot exceed 10000".to_string());
        }
        if self.max_hops == 0 {
            problems.push("MAX_HOPS must be at least 1".to_string());
        }
        if self.venues.is_empty() {
            problems.push("VENUES must name at least one venue".to_string());
        }
        for problem in &problems {
            log::error!("{}", problem);
        }
        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate_and_log().is_empty());
        assert_eq!(config.quote_ttl_secs, 30);
        assert_eq!(config.route_ttl_secs, 60);
        assert_eq!(config.liquidity_ttl_secs, 10);
        assert_eq!(config.venues.len(), 3);
        assert_eq!(config.venues[0].name, "Jupiter");
    }

    #[test]
    fn test_invalid_slippage_is_reported() {
        let config = Config {
            default_slippage_bps: 2000,
            max_slippage_bps: 1000,
            ..Config::default()
        };
        let problems = config.validate_and_log();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("DEFAULT_SLIPPAGE_BPS"));
    }
}
