//! USD price resolution with an owned TTL cache and two-source fallback.
//!
//! The cache is an injected object so tests can back-date entries instead
//! of sleeping. NFTs are never priced; the native asset is priced through
//! a fixed reference address from config and takes no other special path.

use async_trait::async_trait;
use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

use crate::assets::AssetInfo;
use crate::config::PriceConfig;

#[derive(Debug, Error)]
pub enum PriceError {
    /// No source produced a positive quote
    #[error("no price available for {0}")]
    Unavailable(String),

    #[error("price source error: {0}")]
    Source(String),

    #[error("invalid quote: {0}")]
    InvalidQuote(String),
}

struct CachedPrice {
    price: Decimal,
    at: Instant,
}

/// TTL cache keyed by lower-cased lookup address.
pub struct PriceCache {
    ttl: Duration,
    entries: Mutex<FxHashMap<String, CachedPrice>>,
}

impl PriceCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(FxHashMap::default()),
        }
    }

    /// Fresh entry or nothing; expired entries are treated as absent.
    pub fn get(&self, key: &str) -> Option<Decimal> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(&key.to_lowercase())
            .filter(|e| e.at.elapsed() < self.ttl)
            .map(|e| e.price)
    }

    pub fn put(&self, key: &str, price: Decimal) {
        self.put_at(key, price, Instant::now());
    }

    /// Insert with an explicit timestamp so tests can back-date entries.
    pub fn put_at(&self, key: &str, price: Decimal, at: Instant) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_lowercase(), CachedPrice { price, at });
    }
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// USD quote for a contract/pair lookup address.
    async fn quote_usd(&self, lookup: &str) -> Result<Decimal, PriceError>;
}

/// DexScreener-shaped token endpoint: first pair's priceUsd.
pub struct DexScreenerSource {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct DexScreenerResponse {
    pairs: Option<Vec<DexScreenerPair>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DexScreenerPair {
    price_usd: Option<String>,
}

impl DexScreenerSource {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl PriceSource for DexScreenerSource {
    fn name(&self) -> &'static str {
        "dexscreener"
    }

    async fn quote_usd(&self, lookup: &str) -> Result<Decimal, PriceError> {
        let url = format!("{}/latest/dex/tokens/{}", self.base_url, lookup);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| PriceError::Source(format!("request failed: {}", e)))?;
        let body: DexScreenerResponse = response
            .json()
            .await
            .map_err(|e| PriceError::Source(format!("bad response body: {}", e)))?;

        let price_str = body
            .pairs
            .and_then(|pairs| pairs.into_iter().next())
            .and_then(|pair| pair.price_usd)
            .ok_or_else(|| PriceError::Unavailable(lookup.to_string()))?;
        price_str
            .parse::<Decimal>()
            .map_err(|e| PriceError::InvalidQuote(format!("{}: {}", price_str, e)))
    }
}

/// CoinGecko-shaped simple token-price endpoint.
pub struct CoinGeckoSource {
    client: reqwest::Client,
    base_url: String,
    platform: String,
}

impl CoinGeckoSource {
    pub fn new(client: reqwest::Client, base_url: String, platform: String) -> Self {
        Self {
            client,
            base_url,
            platform,
        }
    }
}

#[async_trait]
impl PriceSource for CoinGeckoSource {
    fn name(&self) -> &'static str {
        "coingecko"
    }

    async fn quote_usd(&self, lookup: &str) -> Result<Decimal, PriceError> {
        let url = format!(
            "{}/simple/token_price/{}?contract_addresses={}&vs_currencies=usd",
            self.base_url, self.platform, lookup
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| PriceError::Source(format!("request failed: {}", e)))?;
        let body: FxHashMap<String, FxHashMap<String, Decimal>> = response
            .json()
            .await
            .map_err(|e| PriceError::Source(format!("bad response body: {}", e)))?;

        body.get(&lookup.to_lowercase())
            .and_then(|quotes| quotes.get("usd"))
            .copied()
            .ok_or_else(|| PriceError::Unavailable(lookup.to_string()))
    }
}

/// Fixed quote table for tests and the mock chain.
#[cfg(feature = "mock-chain")]
pub struct StaticSource {
    quotes: FxHashMap<String, Decimal>,
}

#[cfg(feature = "mock-chain")]
impl StaticSource {
    pub fn new(quotes: impl IntoIterator<Item = (String, Decimal)>) -> Self {
        Self {
            quotes: quotes
                .into_iter()
                .map(|(k, v)| (k.to_lowercase(), v))
                .collect(),
        }
    }
}

#[cfg(feature = "mock-chain")]
#[async_trait]
impl PriceSource for StaticSource {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn quote_usd(&self, lookup: &str) -> Result<Decimal, PriceError> {
        self.quotes
            .get(&lookup.to_lowercase())
            .copied()
            .ok_or_else(|| PriceError::Unavailable(lookup.to_string()))
    }
}

pub struct PriceResolver {
    cache: PriceCache,
    primary: Box<dyn PriceSource>,
    secondary: Box<dyn PriceSource>,
    native_price_ref: String,
}

impl PriceResolver {
    pub fn new(
        cache: PriceCache,
        primary: Box<dyn PriceSource>,
        secondary: Box<dyn PriceSource>,
        native_price_ref: String,
    ) -> Self {
        Self {
            cache,
            primary,
            secondary,
            native_price_ref,
        }
    }

    /// Build the HTTP source chain from config.
    pub fn from_config(config: &PriceConfig, platform: String) -> Result<Self, PriceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| PriceError::Source(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self::new(
            PriceCache::new(Duration::from_secs(config.cache_ttl_secs)),
            Box::new(DexScreenerSource::new(
                client.clone(),
                config.primary_url.clone(),
            )),
            Box::new(CoinGeckoSource::new(
                client,
                config.secondary_url.clone(),
                platform,
            )),
            config.native_price_ref.clone(),
        ))
    }

    /// USD price of an asset. The native asset resolves through the
    /// configured reference address.
    pub async fn price_usd(&self, asset: &AssetInfo) -> Result<Decimal, PriceError> {
        let lookup = if asset.is_native() {
            self.native_price_ref.to_lowercase()
        } else {
            asset.price_ref.to_lowercase()
        };
        self.lookup_usd(&lookup).await
    }

    async fn lookup_usd(&self, lookup: &str) -> Result<Decimal, PriceError> {
        if let Some(price) = self.cache.get(lookup) {
            debug!(lookup, %price, "price cache hit");
            return Ok(price);
        }

        match self.primary.quote_usd(lookup).await {
            Ok(price) if price > Decimal::ZERO => {
                self.cache.put(lookup, price);
                return Ok(price);
            }
            Ok(price) => {
                warn!(source = self.primary.name(), lookup, %price, "non-positive quote, trying fallback");
            }
            Err(e) => {
                warn!(source = self.primary.name(), lookup, error = %e, "primary price source failed");
            }
        }

        match self.secondary.quote_usd(lookup).await {
            Ok(price) if price > Decimal::ZERO => {
                self.cache.put(lookup, price);
                Ok(price)
            }
            Ok(_) => Err(PriceError::Unavailable(lookup.to_string())),
            Err(e) => {
                warn!(source = self.secondary.name(), lookup, error = %e, "secondary price source failed");
                Err(PriceError::Unavailable(lookup.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetKind;

    fn asset(price_ref: &str) -> AssetInfo {
        AssetInfo {
            ticker: "TOK".to_string(),
            kind: AssetKind::Token {
                contract: price_ref.to_string(),
            },
            decimals: 18,
            price_ref: price_ref.to_string(),
        }
    }

    fn resolver(
        primary: Box<dyn PriceSource>,
        secondary: Box<dyn PriceSource>,
        ttl: Duration,
    ) -> PriceResolver {
        PriceResolver::new(PriceCache::new(ttl), primary, secondary, "0xwavax".to_string())
    }

    struct FailingSource;

    #[async_trait]
    impl PriceSource for FailingSource {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn quote_usd(&self, _lookup: &str) -> Result<Decimal, PriceError> {
            Err(PriceError::Source("down".to_string()))
        }
    }

    #[tokio::test]
    async fn test_primary_hit_is_cached() {
        let r = resolver(
            Box::new(StaticSource::new([("0xtok".to_string(), Decimal::ONE)])),
            Box::new(FailingSource),
            Duration::from_secs(300),
        );
        assert_eq!(r.price_usd(&asset("0xtok")).await.unwrap(), Decimal::ONE);
        assert_eq!(r.cache.get("0xtok"), Some(Decimal::ONE));
    }

    #[tokio::test]
    async fn test_fallback_to_secondary() {
        let r = resolver(
            Box::new(FailingSource),
            Box::new(StaticSource::new([(
                "0xtok".to_string(),
                Decimal::from(2),
            )])),
            Duration::from_secs(300),
        );
        assert_eq!(
            r.price_usd(&asset("0xtok")).await.unwrap(),
            Decimal::from(2)
        );
    }

    #[tokio::test]
    async fn test_both_fail_is_unavailable() {
        let r = resolver(
            Box::new(FailingSource),
            Box::new(FailingSource),
            Duration::from_secs(300),
        );
        assert!(matches!(
            r.price_usd(&asset("0xtok")).await,
            Err(PriceError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_expired_entry_refetches() {
        let r = resolver(
            Box::new(StaticSource::new([(
                "0xtok".to_string(),
                Decimal::from(3),
            )])),
            Box::new(FailingSource),
            Duration::from_secs(300),
        );
        // Stale cached value must be ignored in favor of the source
        let stale = Instant::now() - Duration::from_secs(301);
        r.cache.put_at("0xtok", Decimal::from(99), stale);
        assert_eq!(
            r.price_usd(&asset("0xtok")).await.unwrap(),
            Decimal::from(3)
        );
    }

    #[tokio::test]
    async fn test_native_uses_reference_address() {
        let r = resolver(
            Box::new(StaticSource::new([(
                "0xwavax".to_string(),
                Decimal::from(10),
            )])),
            Box::new(FailingSource),
            Duration::from_secs(300),
        );
        let native = AssetInfo {
            ticker: "AVAX".to_string(),
            kind: AssetKind::Native,
            decimals: 18,
            price_ref: "0xwavax".to_string(),
        };
        assert_eq!(r.price_usd(&native).await.unwrap(), Decimal::from(10));
    }
}
