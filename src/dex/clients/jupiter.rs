use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use url::Url;

use crate::dex::api::SourceAdapter;
use crate::dex::quote::{legs_are_contiguous, Quote, RouteLeg};
use crate::error::{RouterError, SourceError};
use crate::utils::Clock;

/// Jupiter API v6 endpoints
pub const JUPITER_API_BASE: &str = "https://quote-api.jup.ag/v6";
const JUPITER_QUOTE_ENDPOINT: &str = "quote";

const JUPITER_REQUEST_TIMEOUT_MS: u64 = 5000;
const JUPITER_COMPUTE_COST: u64 = 5000;
/// Amount used by the liquidity probe
const PROBE_AMOUNT: u128 = 1_000_000;

/// Error codes Jupiter uses for "no route" answers
const NO_ROUTE_CODES: [&str; 2] = ["COULD_NOT_FIND_ANY_ROUTE", "NO_ROUTES_FOUND"];

/// Jupiter quote response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JupiterQuoteResponse {
    #[serde(rename = "inputMint")]
    pub input_mint: String,
    #[serde(rename = "inAmount")]
    pub in_amount: String,
    #[serde(rename = "outputMint")]
    pub output_mint: String,
    #[serde(rename = "outAmount")]
    pub out_amount: Option<String>,
    #[serde(rename = "slippageBps", default)]
    pub slippage_bps: u16,
    #[serde(rename = "priceImpactPct", default)]
    pub price_impact_pct: Option<String>,
    #[serde(rename = "routePlan", default)]
    pub route_plan: Vec<JupiterRoutePlan>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JupiterRoutePlan {
    #[serde(rename = "swapInfo")]
    pub swap_info: JupiterSwapInfo,
    #[serde(default = "full_percent")]
    pub percent: u8,
}

fn full_percent() -> u8 {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JupiterSwapInfo {
    #[serde(rename = "ammKey")]
    pub amm_key: String,
    pub label: Option<String>,
    #[serde(rename = "inputMint")]
    pub input_mint: String,
    #[serde(rename = "outputMint")]
    pub output_mint: String,
    #[serde(rename = "inAmount")]
    pub in_amount: String,
    #[serde(rename = "outAmount")]
    pub out_amount: String,
}

fn parse_amount(field: &str, raw: &str) -> Result<u128, SourceError> {
    raw.parse()
        .map_err(|_| SourceError::Protocol(format!("{} is not an integer amount: {:?}", field, raw)))
}

/// Converts `priceImpactPct` (a fraction, "0.0123" = 1.23%) into clamped basis points.
fn impact_bps(raw: Option<&str>) -> Result<u16, SourceError> {
    let Some(raw) = raw else { return Ok(0) };
    let fraction: f64 = raw
        .parse()
        .map_err(|_| SourceError::Protocol(format!("priceImpactPct is not a number: {:?}", raw)))?;
    if !fraction.is_finite() {
        return Err(SourceError::Protocol(format!("priceImpactPct is not finite: {:?}", raw)));
    }
    Ok((fraction * 10_000.0).round().clamp(0.0, 10_000.0) as u16)
}

impl JupiterQuoteResponse {
    /// Normalizes the response. An empty route plan or a missing `outAmount` means no route.
    pub fn into_quote(self, created_at: DateTime<Utc>, ttl: Duration) -> Result<Option<Quote>, SourceError> {
        let Some(out_amount) = self.out_amount.as_deref() else {
            return Ok(None);
        };
        if self.route_plan.is_empty() {
            return Ok(None);
        }
        let in_amount = parse_amount("inAmount", &self.in_amount)?;
        let out_amount = parse_amount("outAmount", out_amount)?;
        let impact = impact_bps(self.price_impact_pct.as_deref())?;
        let per_leg_impact = impact / (self.route_plan.len().min(u16::MAX as usize) as u16).max(1);

        let mut legs = self
            .route_plan
            .iter()
            .map(|step| {
                Ok(RouteLeg {
                    venue: step
                        .swap_info
                        .label
                        .clone()
                        .unwrap_or_else(|| "Jupiter".to_string()),
                    input_token: step.swap_info.input_mint.clone(),
                    output_token: step.swap_info.output_mint.clone(),
                    input_amount: parse_amount("swapInfo.inAmount", &step.swap_info.in_amount)?,
                    output_amount: parse_amount("swapInfo.outAmount", &step.swap_info.out_amount)?,
                    pool_ref: step.swap_info.amm_key.clone(),
                    price_impact_bps: per_leg_impact,
                })
            })
            .collect::<Result<Vec<_>, SourceError>>()?;

        let linear = legs.first().map(|l| l.input_token == self.input_mint).unwrap_or(false)
            && legs.last().map(|l| l.output_token == self.output_mint).unwrap_or(false)
            && legs_are_contiguous(&legs)
            && self.route_plan.iter().all(|step| step.percent == 100);
        if !linear {
            // split routes collapse to one aggregate leg
            legs = vec![RouteLeg {
                venue: "Jupiter".to_string(),
                input_token: self.input_mint.clone(),
                output_token: self.output_mint.clone(),
                input_amount: in_amount,
                output_amount: out_amount,
                pool_ref: self
                    .route_plan
                    .iter()
                    .map(|s| s.swap_info.amm_key.as_str())
                    .collect::<Vec<_>>()
                    .join("+"),
                price_impact_bps: impact,
            }];
        } else if let Some(last) = legs.last_mut() {
            last.output_amount = out_amount;
        }
        if let Some(first) = legs.first_mut() {
            first.input_amount = in_amount;
        }

        let quote = Quote::from_legs(legs, impact, JUPITER_COMPUTE_COST, created_at, ttl)
            .ok_or_else(|| SourceError::Protocol("route plan does not connect input to output".to_string()))?;
        Ok(Some(quote))
    }
}

/// HTTP adapter over the Jupiter v6 quote API.
#[derive(Debug, Clone)]
pub struct JupiterAdapter {
    client: Client,
    base_url: Url,
    quote_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl JupiterAdapter {
    pub fn new(base_url: &str, clock: Arc<dyn Clock>) -> Result<Self, RouterError> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| RouterError::ConfigError(format!("Invalid Jupiter API URL {}: {}", base_url, e)))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = Client::builder()
            .timeout(StdDuration::from_millis(JUPITER_REQUEST_TIMEOUT_MS))
            .user_agent("liquidity-flow/0.1")
            .build()
            .map_err(|e| RouterError::NetworkError(format!("Failed to build HTTP client: {}", e)))?;
        info!("🪐 Jupiter adapter initialized against {}", base_url);
        Ok(Self {
            client,
            base_url,
            quote_ttl: Duration::seconds(60),
            clock,
        })
    }

    pub fn quote_url(&self, input_token: &str, output_token: &str, amount: u128, slippage_bps: u16) -> Result<Url, SourceError> {
        let mut url = self
            .base_url
            .join(JUPITER_QUOTE_ENDPOINT)
            .map_err(|e| SourceError::Protocol(format!("bad quote URL: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("inputMint", input_token)
            .append_pair("outputMint", output_token)
            .append_pair("amount", &amount.to_string())
            .append_pair("slippageBps", &slippage_bps.to_string());
        Ok(url)
    }

    async fn fetch(&self, url: Url) -> Result<Option<JupiterQuoteResponse>, SourceError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Timeout(StdDuration::from_millis(JUPITER_REQUEST_TIMEOUT_MS))
            } else {
                SourceError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Network(format!("failed to read body: {}", e)))?;

        if status == StatusCode::BAD_REQUEST && NO_ROUTE_CODES.iter().any(|code| body.contains(code)) {
            return Ok(None);
        }
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SourceError::Network(format!("HTTP {}: {}", status, body)));
        }
        if !status.is_success() {
            return Err(SourceError::Protocol(format!("HTTP {}: {}", status, body)));
        }

        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| SourceError::Protocol(format!("malformed quote body: {}", e)))
    }
}

#[async_trait]
impl SourceAdapter for JupiterAdapter {
    fn name(&self) -> &str {
        "Jupiter"
    }

    async fn quote(
        &self,
        input_token: &str,
        output_token: &str,
        amount: u128,
        max_slippage_bps: u16,
    ) -> Result<Option<Quote>, SourceError> {
        let url = self.quote_url(input_token, output_token, amount, max_slippage_bps)?;
        debug!("Jupiter quote request: {}", url);

        match self.fetch(url).await? {
            Some(response) => {
                let quote = response.into_quote(self.clock.now(), self.quote_ttl)?;
                if quote.is_none() {
                    debug!("No Jupiter route for {} -> {}", input_token, output_token);
                }
                Ok(quote)
            }
            None => {
                debug!("No Jupiter liquidity for {} -> {}", input_token, output_token);
                Ok(None)
            }
        }
    }

    async fn has_liquidity(&self, input_token: &str, output_token: &str) -> Result<bool, SourceError> {
        let url = self.quote_url(input_token, output_token, PROBE_AMOUNT, 50)?;
        match self.fetch(url).await {
            Ok(response) => Ok(response.map(|r| r.out_amount.is_some()).unwrap_or(false)),
            Err(e) => {
                warn!("Jupiter liquidity probe failed: {}", e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ManualClock;
    use pretty_assertions::assert_eq;

    const SOL: &str = "So11111111111111111111111111111111111111112";
    const USDC: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
    const USDT: &str = "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB";

    fn two_hop_body() -> serde_json::Value {
        serde_json::json!({
            "inputMint": SOL,
            "inAmount": "1000000000",
            "outputMint": USDC,
            "outAmount": "150250000",
            "otherAmountThreshold": "149498750",
            "swapMode": "ExactIn",
            "slippageBps": 50,
            "priceImpactPct": "0.0012",
            "routePlan": [
                {
                    "swapInfo": {
                        "ammKey": "amm-1",
                        "label": "Whirlpool",
                        "inputMint": SOL,
                        "outputMint": USDT,
                        "inAmount": "1000000000",
                        "outAmount": "150300000",
                        "feeAmount": "3000",
                        "feeMint": SOL
                    },
                    "percent": 100
                },
                {
                    "swapInfo": {
                        "ammKey": "amm-2",
                        "label": "Raydium CLMM",
                        "inputMint": USDT,
                        "outputMint": USDC,
                        "inAmount": "150300000",
                        "outAmount": "150250000",
                        "feeAmount": "100",
                        "feeMint": USDT
                    },
                    "percent": 100
                }
            ],
            "contextSlot": 245000000,
            "timeTaken": 0.01
        })
    }

    #[test]
    fn test_response_maps_to_quote() {
        let response: JupiterQuoteResponse = serde_json::from_value(two_hop_body()).unwrap();
        let now = Utc::now();
        let quote = response.into_quote(now, Duration::seconds(60)).unwrap().unwrap();

        assert_eq!(quote.input_token, SOL);
        assert_eq!(quote.output_token, USDC);
        assert_eq!(quote.input_amount, 1_000_000_000);
        assert_eq!(quote.output_amount, 150_250_000);
        assert_eq!(quote.price_impact_bps, 12);
        assert_eq!(quote.legs.len(), 2);
        assert_eq!(quote.legs[0].venue, "Whirlpool");
        assert_eq!(quote.legs[1].pool_ref, "amm-2");
        assert_eq!(quote.expires_at, now + Duration::seconds(60));
        assert!(!quote.mev_protected);
    }

    #[test]
    fn test_split_route_collapses() {
        let mut body = two_hop_body();
        body["routePlan"][0]["percent"] = serde_json::json!(60);
        body["routePlan"][1]["swapInfo"]["inputMint"] = serde_json::json!(SOL);
        let response: JupiterQuoteResponse = serde_json::from_value(body).unwrap();
        let quote = response.into_quote(Utc::now(), Duration::seconds(60)).unwrap().unwrap();

        assert_eq!(quote.legs.len(), 1);
        assert_eq!(quote.legs[0].venue, "Jupiter");
        assert_eq!(quote.legs[0].pool_ref, "amm-1+amm-2");
        assert_eq!(quote.legs[0].output_amount, 150_250_000);
    }

    #[test]
    fn test_empty_plan_is_absent() {
        let mut body = two_hop_body();
        body["routePlan"] = serde_json::json!([]);
        let response: JupiterQuoteResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.into_quote(Utc::now(), Duration::seconds(60)), Ok(None));
    }

    #[test]
    fn test_garbage_amount_is_protocol_error() {
        let mut body = two_hop_body();
        body["outAmount"] = serde_json::json!("lots");
        let response: JupiterQuoteResponse = serde_json::from_value(body).unwrap();
        assert!(matches!(
            response.into_quote(Utc::now(), Duration::seconds(60)),
            Err(SourceError::Protocol(_))
        ));
    }

    #[test]
    fn test_quote_url() {
        let adapter = JupiterAdapter::new(JUPITER_API_BASE, Arc::new(ManualClock::default())).unwrap();
        let url = adapter.quote_url(SOL, USDC, 100_000_000_000_000_000_000, 50).unwrap();
        assert_eq!(url.path(), "/v6/quote");
        let query = url.query().unwrap();
        assert!(query.contains("amount=100000000000000000000"));
        assert!(query.contains("slippageBps=50"));
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        assert!(JupiterAdapter::new("not a url", Arc::new(ManualClock::default())).is_err());
    }
}
