use serde::{Deserialize, Serialize};
use std::fs;

use crate::assets::RegistryConfig;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub chain: ChainConfig,
    /// PostgreSQL connection URL for escrow/withdraw/wallet records
    #[serde(default)]
    pub postgres_url: Option<String>,
    pub registry: RegistryConfig,
    #[serde(default)]
    pub fees: FeeConfig,
    #[serde(default)]
    pub price: PriceConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    /// Delay between consecutive fan-out transfers, throughput knob only
    #[serde(default = "default_fanout_delay_ms")]
    pub fanout_delay_ms: u64,
}

fn default_fanout_delay_ms() -> u64 {
    1000
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// How long to poll for one confirmation before giving up
    #[serde(default = "default_confirm_timeout")]
    pub confirm_timeout_secs: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_request_timeout() -> u64 {
    30
}

fn default_confirm_timeout() -> u64 {
    120
}

fn default_poll_interval() -> u64 {
    2000
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FeeConfig {
    /// Percentage withdrawal fee in basis points (200 = 2%)
    pub withdraw_rate_bps: u32,
    /// Flat NFT withdrawal fee in native units, human decimal string
    pub nft_flat_fee: String,
    /// Address the fee leg is paid to
    pub fee_recipient: String,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            withdraw_rate_bps: 200,
            nft_flat_fee: "0.02".to_string(),
            fee_recipient: String::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PriceConfig {
    pub primary_url: String,
    pub secondary_url: String,
    /// Reference pair/contract address used to price the native asset
    pub native_price_ref: String,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
}

fn default_cache_ttl() -> u64 {
    300
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            primary_url: "https://api.dexscreener.com".to_string(),
            secondary_url: "https://api.coingecko.com/api/v3".to_string(),
            native_price_ref: String::new(),
            cache_ttl_secs: default_cache_ttl(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuditConfig {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 600,
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> Self {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .unwrap_or_else(|_| panic!("Failed to read config file: {}", config_path));
        serde_yaml::from_str(&content).expect("Failed to parse config yaml")
    }
}
