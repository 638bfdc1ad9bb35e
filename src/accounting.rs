//! Balance accounting: on-chain holdings minus outstanding reservations.
//!
//! The conservation rule is recomputed at read time. Unclaimed escrow
//! amounts are subtracted from the pool's on-chain balance unless the
//! caller is resolving an escrow claim, which spends the reserved funds
//! themselves.

use std::sync::Arc;
use tracing::warn;

use crate::assets::{AssetInfo, AssetRegistry};
use crate::chain::ChainClient;
use crate::error::WalletError;
use crate::money;
use crate::store::escrow::EscrowStore;

pub struct Accounting {
    chain: Arc<dyn ChainClient>,
    escrow: Arc<dyn EscrowStore>,
    registry: Arc<AssetRegistry>,
}

#[derive(Debug, Clone)]
pub struct AssetBalance {
    pub ticker: String,
    /// On-chain balance, base units
    pub on_chain: u128,
    /// Unclaimed reservations, base units
    pub reserved: u128,
}

impl Accounting {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        escrow: Arc<dyn EscrowStore>,
        registry: Arc<AssetRegistry>,
    ) -> Self {
        Self {
            chain,
            escrow,
            registry,
        }
    }

    pub async fn on_chain_balance(
        &self,
        address: &str,
        asset: &AssetInfo,
    ) -> Result<u128, WalletError> {
        match asset.contract() {
            None => Ok(self.chain.native_balance(address).await?),
            Some(contract) => Ok(self.chain.token_balance(contract, address).await?),
        }
    }

    /// Sum of unclaimed reservations for one scope and asset, base units.
    /// Malformed stored amounts are skipped with a warning so one bad row
    /// cannot freeze the whole pool.
    pub async fn reserved(
        &self,
        community_id: &str,
        tenant_id: Option<&str>,
        asset: &AssetInfo,
    ) -> Result<u128, WalletError> {
        let records = self
            .escrow
            .unclaimed_for_asset(community_id, tenant_id, &asset.ticker)
            .await?;

        let mut total: u128 = 0;
        for record in &records {
            if record.is_nft {
                continue;
            }
            match money::parse_units(&record.amount, asset.decimals) {
                Ok(units) => total = total.saturating_add(units),
                Err(e) => {
                    warn!(
                        escrow_id = record.id,
                        amount = %record.amount,
                        asset = %asset.ticker,
                        error = %e,
                        "skipping malformed escrow amount"
                    );
                }
            }
        }
        Ok(total)
    }

    /// Spendable pool balance for an asset.
    ///
    /// `skip_reserved` is set by escrow claims: the claim is paying out
    /// the reserved funds, so subtracting them would block it.
    pub async fn available_balance(
        &self,
        community_id: &str,
        tenant_id: Option<&str>,
        pool_address: &str,
        asset: &AssetInfo,
        skip_reserved: bool,
    ) -> Result<u128, WalletError> {
        let on_chain = self.on_chain_balance(pool_address, asset).await?;
        if skip_reserved {
            return Ok(on_chain);
        }
        let reserved = self.reserved(community_id, tenant_id, asset).await?;
        Ok(on_chain.saturating_sub(reserved))
    }

    /// Per-asset balances across the whole registry, native first.
    /// Assets whose chain read fails are skipped with a warning.
    pub async fn balance_sheet(
        &self,
        community_id: &str,
        tenant_id: Option<&str>,
        pool_address: &str,
    ) -> Result<Vec<AssetBalance>, WalletError> {
        let mut sheet = Vec::new();
        for asset in self.registry.all() {
            let on_chain = match self.on_chain_balance(pool_address, asset).await {
                Ok(balance) => balance,
                Err(e) => {
                    warn!(asset = %asset.ticker, error = %e, "skipping asset in balance sheet");
                    continue;
                }
            };
            let reserved = self.reserved(community_id, tenant_id, asset).await?;
            sheet.push(AssetBalance {
                ticker: asset.ticker.clone(),
                on_chain,
                reserved,
            });
        }
        Ok(sheet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{AssetEntry, NetworkAssets, RegistryConfig};
    use crate::chain::MockChain;
    use crate::store::escrow::NewEscrow;
    use crate::store::mem::MemEscrowStore;

    fn registry() -> Arc<AssetRegistry> {
        let config = RegistryConfig {
            network: "testnet".to_string(),
            testnet: NetworkAssets {
                assets: vec![
                    AssetEntry {
                        ticker: "AVAX".to_string(),
                        address: "native".to_string(),
                        decimals: 18,
                        price_ref: Some("0xwavax".to_string()),
                    },
                    AssetEntry {
                        ticker: "TOK".to_string(),
                        address: "0xaaaa00000000000000000000000000000000aaaa".to_string(),
                        decimals: 18,
                        price_ref: None,
                    },
                ],
                nfts: vec![],
            },
            mainnet: NetworkAssets::default(),
        };
        Arc::new(AssetRegistry::from_config(&config).unwrap())
    }

    fn escrow_row(asset: &str, amount: &str) -> NewEscrow {
        NewEscrow {
            community_id: "guild-1".to_string(),
            tenant_id: None,
            recipient_id: "alice".to_string(),
            asset: asset.to_string(),
            amount: amount.to_string(),
            is_nft: false,
            contract_address: None,
            token_id: None,
            metadata: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn test_reservations_reduce_available() {
        let chain = Arc::new(MockChain::new());
        let escrow = Arc::new(MemEscrowStore::new());
        let registry = registry();
        let pool = "0x1111111111111111111111111111111111111111";
        let contract = "0xaaaa00000000000000000000000000000000aaaa";

        chain.set_token(contract, pool, money::parse_units("100", 18).unwrap());
        escrow.create(escrow_row("TOK", "30")).await.unwrap();
        escrow.create(escrow_row("TOK", "20")).await.unwrap();

        let accounting = Accounting::new(chain, escrow, registry.clone());
        let asset = registry.resolve("TOK").unwrap();

        let available = accounting
            .available_balance("guild-1", None, pool, asset, false)
            .await
            .unwrap();
        assert_eq!(available, money::parse_units("50", 18).unwrap());

        // Escrow claims spend the reserved funds themselves
        let claimable = accounting
            .available_balance("guild-1", None, pool, asset, true)
            .await
            .unwrap();
        assert_eq!(claimable, money::parse_units("100", 18).unwrap());
    }

    #[tokio::test]
    async fn test_malformed_reservation_is_skipped() {
        let chain = Arc::new(MockChain::new());
        let escrow = Arc::new(MemEscrowStore::new());
        let registry = registry();
        let pool = "0x1111111111111111111111111111111111111111";
        let contract = "0xaaaa00000000000000000000000000000000aaaa";

        chain.set_token(contract, pool, money::parse_units("100", 18).unwrap());
        escrow.create(escrow_row("TOK", "not-a-number")).await.unwrap();
        escrow.create(escrow_row("TOK", "25")).await.unwrap();

        let accounting = Accounting::new(chain, escrow, registry.clone());
        let asset = registry.resolve("TOK").unwrap();

        let available = accounting
            .available_balance("guild-1", None, pool, asset, false)
            .await
            .unwrap();
        assert_eq!(available, money::parse_units("75", 18).unwrap());
    }

    #[tokio::test]
    async fn test_reservations_exceeding_balance_floor_at_zero() {
        let chain = Arc::new(MockChain::new());
        let escrow = Arc::new(MemEscrowStore::new());
        let registry = registry();
        let pool = "0x1111111111111111111111111111111111111111";
        let contract = "0xaaaa00000000000000000000000000000000aaaa";

        chain.set_token(contract, pool, money::parse_units("10", 18).unwrap());
        escrow.create(escrow_row("TOK", "30")).await.unwrap();

        let accounting = Accounting::new(chain, escrow, registry.clone());
        let asset = registry.resolve("TOK").unwrap();

        let available = accounting
            .available_balance("guild-1", None, pool, asset, false)
            .await
            .unwrap();
        assert_eq!(available, 0);
    }

    #[tokio::test]
    async fn test_balance_sheet_native_first() {
        let chain = Arc::new(MockChain::new());
        let escrow = Arc::new(MemEscrowStore::new());
        let registry = registry();
        let pool = "0x1111111111111111111111111111111111111111";

        chain.set_native(pool, 7);
        let accounting = Accounting::new(chain, escrow, registry);
        let sheet = accounting
            .balance_sheet("guild-1", None, pool)
            .await
            .unwrap();
        assert_eq!(sheet[0].ticker, "AVAX");
        assert_eq!(sheet[0].on_chain, 7);
        assert_eq!(sheet[1].ticker, "TOK");
    }
}
