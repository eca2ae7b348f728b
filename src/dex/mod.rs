// src/dex/mod.rs

pub mod api;
pub mod clients;
pub mod quote;

pub use api::SourceAdapter;
pub use clients::{JupiterAdapter, PoolVenue};
pub use quote::{legs_are_contiguous, price_impact_bps, Quote, RouteLeg, Token};

use crate::config::settings::Config;
use crate::error::RouterError;
use crate::utils::Clock;
use log::info;
use std::sync::Arc;

/// The adapters a router process starts with.
///
/// Pool-backed venues are kept as concrete handles so liquidity feeds can update them.
#[derive(Debug, Clone)]
pub struct VenueSet {
    pub orca: Arc<PoolVenue>,
    pub raydium: Arc<PoolVenue>,
    pub jupiter: Option<Arc<JupiterAdapter>>,
}

impl VenueSet {
    pub fn adapters(&self) -> Vec<Arc<dyn SourceAdapter>> {
        let mut adapters: Vec<Arc<dyn SourceAdapter>> = vec![
            self.orca.clone() as Arc<dyn SourceAdapter>,
            self.raydium.clone() as Arc<dyn SourceAdapter>,
        ];
        if let Some(jupiter) = &self.jupiter {
            adapters.push(jupiter.clone() as Arc<dyn SourceAdapter>);
        }
        adapters
    }

    pub fn pool_venues(&self) -> [&Arc<PoolVenue>; 2] {
        [&self.orca, &self.raydium]
    }
}

/// Initializes every supported source adapter.
pub fn build_venues(app_config: &Config, clock: Arc<dyn Clock>) -> Result<VenueSet, RouterError> {
    info!("Initializing source adapters...");

    let orca = Arc::new(PoolVenue::orca(clock.clone()));
    info!("- Orca adapter initialized.");

    let raydium = Arc::new(PoolVenue::raydium(clock.clone()));
    info!("- Raydium adapter initialized.");

    let jupiter = if app_config.jupiter_enabled {
        let adapter = JupiterAdapter::new(&app_config.jupiter_api_url, clock)?;
        info!("- Jupiter adapter initialized.");
        Some(Arc::new(adapter))
    } else {
        info!("- Jupiter adapter disabled (JUPITER_ENABLED not set).");
        None
    };

    Ok(VenueSet {
        orca,
        raydium,
        jupiter,
    })
}
