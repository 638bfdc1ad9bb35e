//! Asset registry: the closed set of transferable assets for one network.
//!
//! Built once at startup from config and injected everywhere an asset is
//! resolved. Decimals are declared here, never fetched on-chain per call.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("unknown asset: {0}")]
    UnknownAsset(String),

    #[error("unknown NFT collection: {0}")]
    UnknownCollection(String),

    #[error("registry has no native asset entry")]
    MissingNative,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetKind {
    /// The chain's value currency, transferred by plain value transfer
    Native,
    /// ERC-20 style contract
    Token { contract: String },
}

#[derive(Debug, Clone)]
pub struct AssetInfo {
    /// Canonical upper-cased ticker
    pub ticker: String,
    pub kind: AssetKind,
    pub decimals: u32,
    /// Contract/pair address used when asking price sources for a USD quote
    pub price_ref: String,
}

impl AssetInfo {
    pub fn is_native(&self) -> bool {
        matches!(self.kind, AssetKind::Native)
    }

    pub fn contract(&self) -> Option<&str> {
        match &self.kind {
            AssetKind::Native => None,
            AssetKind::Token { contract } => Some(contract),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NftCollection {
    pub ticker: String,
    pub contract: String,
    pub name: String,
}

/// Per-network asset tables loaded from YAML.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RegistryConfig {
    /// "testnet" or "mainnet"
    pub network: String,
    pub testnet: NetworkAssets,
    pub mainnet: NetworkAssets,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct NetworkAssets {
    #[serde(default)]
    pub assets: Vec<AssetEntry>,
    #[serde(default)]
    pub nfts: Vec<NftEntry>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AssetEntry {
    pub ticker: String,
    /// "native" for the value currency, otherwise a 0x contract address
    pub address: String,
    #[serde(default = "default_decimals")]
    pub decimals: u32,
    /// Lookup address for price sources; defaults to the contract address
    #[serde(default)]
    pub price_ref: Option<String>,
}

fn default_decimals() -> u32 {
    18
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NftEntry {
    pub ticker: String,
    pub address: String,
    #[serde(default)]
    pub name: String,
}

/// Immutable lookup table, one per process.
pub struct AssetRegistry {
    assets: FxHashMap<String, AssetInfo>,
    /// Registry order, native first; drives AllFungible iteration and
    /// balance sheets
    order: Vec<String>,
    nfts: FxHashMap<String, NftCollection>,
}

impl AssetRegistry {
    pub fn from_config(config: &RegistryConfig) -> Result<Self, AssetError> {
        let table = match config.network.as_str() {
            "mainnet" => &config.mainnet,
            _ => &config.testnet,
        };

        let mut assets = FxHashMap::default();
        let mut order = Vec::new();
        for entry in &table.assets {
            let ticker = entry.ticker.to_uppercase();
            let kind = if entry.address.eq_ignore_ascii_case("native") {
                AssetKind::Native
            } else {
                AssetKind::Token {
                    contract: entry.address.to_lowercase(),
                }
            };
            let price_ref = entry
                .price_ref
                .clone()
                .unwrap_or_else(|| entry.address.to_lowercase());
            let info = AssetInfo {
                ticker: ticker.clone(),
                kind,
                decimals: entry.decimals,
                price_ref,
            };
            if assets.insert(ticker.clone(), info).is_none() {
                order.push(ticker);
            }
        }

        if !assets.values().any(|a| a.is_native()) {
            return Err(AssetError::MissingNative);
        }
        // Native first so balance sheets and batch payouts lead with it
        order.sort_by_key(|t| !assets[t].is_native());

        let mut nfts = FxHashMap::default();
        for entry in &table.nfts {
            let ticker = entry.ticker.to_uppercase();
            nfts.insert(
                ticker.clone(),
                NftCollection {
                    ticker,
                    contract: entry.address.to_lowercase(),
                    name: entry.name.clone(),
                },
            );
        }

        Ok(Self {
            assets,
            order,
            nfts,
        })
    }

    pub fn resolve(&self, ticker: &str) -> Result<&AssetInfo, AssetError> {
        self.assets
            .get(&ticker.to_uppercase())
            .ok_or_else(|| AssetError::UnknownAsset(ticker.to_string()))
    }

    pub fn native(&self) -> &AssetInfo {
        // from_config guarantees a native entry
        self.order
            .iter()
            .map(|t| &self.assets[t])
            .find(|a| a.is_native())
            .unwrap()
    }

    /// Registry order, native first.
    pub fn all(&self) -> impl Iterator<Item = &AssetInfo> {
        self.order.iter().map(|t| &self.assets[t])
    }

    /// Every token except the native asset, registry order.
    pub fn fungibles(&self) -> impl Iterator<Item = &AssetInfo> {
        self.all().filter(|a| !a.is_native())
    }

    pub fn nft(&self, ticker: &str) -> Result<&NftCollection, AssetError> {
        self.nfts
            .get(&ticker.to_uppercase())
            .ok_or_else(|| AssetError::UnknownCollection(ticker.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> RegistryConfig {
        RegistryConfig {
            network: "testnet".to_string(),
            testnet: NetworkAssets {
                assets: vec![
                    AssetEntry {
                        ticker: "tok".to_string(),
                        address: "0xAAaa00000000000000000000000000000000aaaa".to_string(),
                        decimals: 18,
                        price_ref: None,
                    },
                    AssetEntry {
                        ticker: "AVAX".to_string(),
                        address: "native".to_string(),
                        decimals: 18,
                        price_ref: Some("0xwavax".to_string()),
                    },
                ],
                nfts: vec![NftEntry {
                    ticker: "ROCK".to_string(),
                    address: "0xBBbb00000000000000000000000000000000bbbb".to_string(),
                    name: "Rocks".to_string(),
                }],
            },
            mainnet: NetworkAssets::default(),
        }
    }

    #[test]
    fn test_resolve_case_insensitive() {
        let reg = AssetRegistry::from_config(&test_config()).unwrap();
        assert_eq!(reg.resolve("Tok").unwrap().ticker, "TOK");
        assert_eq!(
            reg.resolve("tok").unwrap().contract().unwrap(),
            "0xaaaa00000000000000000000000000000000aaaa"
        );
        assert!(matches!(
            reg.resolve("NOPE"),
            Err(AssetError::UnknownAsset(_))
        ));
    }

    #[test]
    fn test_native_first_in_order() {
        let reg = AssetRegistry::from_config(&test_config()).unwrap();
        let tickers: Vec<_> = reg.all().map(|a| a.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["AVAX", "TOK"]);
        let fungibles: Vec<_> = reg.fungibles().map(|a| a.ticker.as_str()).collect();
        assert_eq!(fungibles, vec!["TOK"]);
    }

    #[test]
    fn test_missing_native_rejected() {
        let mut config = test_config();
        config.testnet.assets.retain(|a| a.address != "native");
        assert!(matches!(
            AssetRegistry::from_config(&config),
            Err(AssetError::MissingNative)
        ));
    }

    #[test]
    fn test_nft_lookup() {
        let reg = AssetRegistry::from_config(&test_config()).unwrap();
        assert_eq!(reg.nft("rock").unwrap().name, "Rocks");
        assert!(matches!(
            reg.nft("NOPE"),
            Err(AssetError::UnknownCollection(_))
        ));
    }
}
