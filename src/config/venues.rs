use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueConfig {
    pub name: String,
    pub enabled: bool,
    /// Lower value = higher priority; only breaks ties between equal quotes
    pub priority: u32,
}

impl VenueConfig {
    pub fn new(name: impl Into<String>, priority: u32) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            priority,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Parses `"Jupiter:1,Orca:2,Raydium:3:off"` into venue configs.
/// Entries without a priority get their position in the list.
pub fn parse_venue_list(raw: &str) -> Vec<VenueConfig> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .enumerate()
        .filter_map(|(idx, part)| {
            let mut fields = part.split(':').map(str::trim);
            let name = fields.next().filter(|n| !n.is_empty())?.to_string();
            let priority = fields
                .next()
                .and_then(|p| p.parse().ok())
                .unwrap_or(idx as u32 + 1);
            let enabled = !matches!(fields.next(), Some(flag) if flag.eq_ignore_ascii_case("off"));
            Some(VenueConfig {
                name,
                enabled,
                priority,
            })
        })
        .collect()
}

/// Ordered venue list shared by the aggregator.
///
/// Readers take an `Arc` snapshot and keep it for the whole fan-out, so `replace` never
/// changes the venue set of a request that is already in flight.
#[derive(Debug, Clone, Default)]
pub struct VenueRegistry {
    venues: Arc<RwLock<Arc<Vec<VenueConfig>>>>,
}

impl VenueRegistry {
    pub fn new(venues: Vec<VenueConfig>) -> Self {
        Self {
            venues: Arc::new(RwLock::new(Arc::new(Self::ordered(venues)))),
        }
    }

    pub async fn snapshot(&self) -> Arc<Vec<VenueConfig>> {
        self.venues.read().await.clone()
    }

    /// Enabled venues in priority order.
    pub async fn enabled(&self) -> Vec<VenueConfig> {
        self.snapshot()
            .await
            .iter()
            .filter(|v| v.enabled)
            .cloned()
            .collect()
    }

    pub async fn replace(&self, venues: Vec<VenueConfig>) {
        let ordered = Arc::new(Self::ordered(venues));
        info!(
            "🔁 Venue list reloaded: {}",
            ordered
                .iter()
                .map(|v| format!("{}:{}{}", v.name, v.priority, if v.enabled { "" } else { ":off" }))
                .collect::<Vec<_>>()
                .join(",")
        );
        *self.venues.write().await = ordered;
    }

    fn ordered(mut venues: Vec<VenueConfig>) -> Vec<VenueConfig> {
        // stable: equal priorities keep their configured order
        venues.sort_by_key(|v| v.priority);
        venues
    }
}
