//! Redis-backed persister: quotes and trades stored as JSON under expiring keys.

use async_trait::async_trait;
use log::{debug, error, info, warn};
use redis::{aio::ConnectionManager, AsyncCommands};
use serde::Serialize;
use std::fmt;

use super::{Persister, TradeRecord};
use crate::dex::quote::Quote;
use crate::error::{Result, RouterError};

const QUOTE_PREFIX: &str = "liquidity_flow:quote";
const TRADE_PREFIX: &str = "liquidity_flow:trade";

/// Uses a `ConnectionManager` so dropped connections are re-established transparently.
#[derive(Clone)]
pub struct RedisPersister {
    conn_manager: ConnectionManager,
    ttl_secs: u64,
    redis_url: String,
}

impl fmt::Debug for RedisPersister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisPersister")
            .field("redis_url", &self.redis_url)
            .field("ttl_secs", &self.ttl_secs)
            .field("conn_manager", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisPersister {
    pub async fn connect(redis_url: &str, ttl_secs: u64) -> Result<Self> {
        info!("Initializing Redis persister for URL: {}", redis_url);
        let client = redis::Client::open(redis_url)?;
        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            error!("Failed to create Redis ConnectionManager: {}", e);
            RouterError::PersistenceError(format!("Redis connection failed: {}", e))
        })?;
        Ok(Self {
            conn_manager,
            ttl_secs,
            redis_url: redis_url.to_string(),
        })
    }

    pub(crate) fn generate_key(prefix: &str, params: &[&str]) -> String {
        let mut key = prefix.to_string();
        for param in params {
            key.push(':');
            key.push_str(param);
        }
        key
    }

    async fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let value_str = serde_json::to_string(value)?;
        let mut conn = self.conn_manager.clone();
        match conn.set_ex::<_, _, ()>(key, value_str, self.ttl_secs).await {
            Ok(()) => {
                debug!("Redis SETEX success for key: {} with TTL: {}s", key, self.ttl_secs);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to SETEX key '{}' in Redis: {}", key, e);
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl Persister for RedisPersister {
    async fn record_quote(&self, quote: &Quote) -> Result<()> {
        let key = Self::generate_key(QUOTE_PREFIX, &[&quote.quote_id.to_string()]);
        self.set_json(&key, quote).await
    }

    async fn record_trade(&self, trade: &TradeRecord) -> Result<()> {
        let key = Self::generate_key(
            TRADE_PREFIX,
            &[&trade.quote_id.to_string(), &trade.transaction_ref],
        );
        self.set_json(&key, trade).await
    }
}
