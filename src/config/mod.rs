pub mod settings;
pub mod venues;

pub use settings::Config;
pub use venues::{parse_venue_list, VenueConfig, VenueRegistry};

use crate::error::RouterError;
use std::sync::Arc;

/// Loads the router configuration from the environment (and `.env` if present).
pub fn load_config() -> Result<Arc<settings::Config>, RouterError> {
    dotenv::dotenv().ok();

    let config = settings::Config::from_env();

    let problems = config.validate_and_log();
    if !problems.is_empty() {
        return Err(RouterError::ConfigError(problems.join("; ")));
    }
    if url::Url::parse(&config.jupiter_api_url).is_err() {
        return Err(RouterError::ConfigError(format!(
            "JUPITER_API_URL is not a valid URL: {}",
            config.jupiter_api_url
        )));
    }

    Ok(Arc::new(config))
}
