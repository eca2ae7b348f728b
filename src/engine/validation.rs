use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::dex::quote::{amount_str, Token};
use crate::error::{Result, RouterError};

/// Base58 mint addresses are 32 to 44 characters long.
pub const MIN_TOKEN_LEN: usize = 32;
pub const MAX_TOKEN_LEN: usize = 44;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub input_token: Token,
    pub output_token: Token,
    #[serde(with = "amount_str")]
    pub amount: u128,
    pub slippage_bps: u16,
    #[serde(default)]
    pub user: Option<String>,
}

impl QuoteRequest {
    pub fn new(input_token: impl Into<Token>, output_token: impl Into<Token>, amount: u128) -> Self {
        Self {
            input_token: input_token.into(),
            output_token: output_token.into(),
            amount,
            slippage_bps: 50,
            user: None,
        }
    }

    pub fn with_slippage(mut self, slippage_bps: u16) -> Self {
        self.slippage_bps = slippage_bps;
        self
    }

    pub fn for_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }
}

fn validate_token(field: &str, token: &str) -> Result<()> {
    if token.is_empty() {
        return Err(RouterError::InvalidInput(format!("{} is required", field)));
    }
    if !(MIN_TOKEN_LEN..=MAX_TOKEN_LEN).contains(&token.len()) {
        return Err(RouterError::InvalidInput(format!(
            "{} must be {}-{} characters, got {}",
            field,
            MIN_TOKEN_LEN,
            MAX_TOKEN_LEN,
            token.len()
        )));
    }
    Ok(())
}

pub fn validate_request(request: &QuoteRequest, config: &Config) -> Result<()> {
    validate_token("inputToken", &request.input_token)?;
    validate_token("outputToken", &request.output_token)?;
    if request.input_token == request.output_token {
        return Err(RouterError::InvalidInput(
            "inputToken and outputToken must differ".to_string(),
        ));
    }
    if request.amount == 0 {
        return Err(RouterError::InvalidInput("amount must be positive".to_string()));
    }
    if let Some(max) = config.max_amount {
        if request.amount > max {
            return Err(RouterError::InvalidInput(format!(
                "amount {} exceeds maximum {}",
                request.amount, max
            )));
        }
    }
    if request.slippage_bps > config.max_slippage_bps {
        return Err(RouterError::InvalidInput(format!(
            "slippage {} bps exceeds maximum {} bps",
            request.slippage_bps, config.max_slippage_bps
        )));
    }
    Ok(())
}
