//! Conservation audit worker.
//!
//! Periodically checks that every pool still holds at least as much of
//! each asset as its outstanding reservations promise. A shortfall means
//! reserved funds were spent out from under a claimant and needs operator
//! attention; the audit reports, it never moves funds.

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::accounting::Accounting;
use crate::assets::AssetRegistry;
use crate::error::WalletError;
use crate::store::escrow::EscrowStore;
use crate::store::wallets::WalletStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditFinding {
    pub community_id: String,
    pub tenant_id: Option<String>,
    pub asset: String,
    /// Outstanding reservations, base units
    pub reserved: u128,
    /// Pool balance on chain, base units
    pub on_chain: u128,
}

pub struct ConservationAudit {
    accounting: Arc<Accounting>,
    escrow: Arc<dyn EscrowStore>,
    wallets: Arc<dyn WalletStore>,
    registry: Arc<AssetRegistry>,
    interval: Duration,
}

impl ConservationAudit {
    pub fn new(
        accounting: Arc<Accounting>,
        escrow: Arc<dyn EscrowStore>,
        wallets: Arc<dyn WalletStore>,
        registry: Arc<AssetRegistry>,
        interval: Duration,
    ) -> Self {
        Self {
            accounting,
            escrow,
            wallets,
            registry,
            interval,
        }
    }

    /// One audit pass over every scope with outstanding reservations.
    pub async fn tick(&self) -> Result<Vec<AuditFinding>, WalletError> {
        let groups = self.escrow.reserved_groups().await?;
        let mut findings = Vec::new();

        for (community_id, tenant_id, ticker) in groups {
            let tenant = tenant_id.as_deref();
            let asset = match self.registry.resolve(&ticker) {
                Ok(asset) => asset,
                Err(e) => {
                    // Reservation for an asset no longer in the registry
                    warn!(community = %community_id, asset = %ticker, error = %e, "audit skipping unknown asset");
                    continue;
                }
            };

            let Some(pool) = self.wallets.get_pool(&community_id, tenant).await? else {
                warn!(community = %community_id, asset = %ticker, "reservations exist but pool wallet is missing");
                continue;
            };

            let reserved = self.accounting.reserved(&community_id, tenant, asset).await?;
            let on_chain = self.accounting.on_chain_balance(&pool.address, asset).await?;
            if reserved > on_chain {
                warn!(
                    community = %community_id,
                    tenant = ?tenant,
                    asset = %ticker,
                    reserved,
                    on_chain,
                    "conservation violated: reservations exceed pool balance"
                );
                findings.push(AuditFinding {
                    community_id: community_id.clone(),
                    tenant_id: tenant_id.clone(),
                    asset: asset.ticker.clone(),
                    reserved,
                    on_chain,
                });
            }
        }

        Ok(findings)
    }

    /// Run forever on the configured interval.
    pub async fn run(self) {
        info!(interval_secs = self.interval.as_secs(), "conservation audit started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match self.tick().await {
                Ok(findings) if findings.is_empty() => {
                    info!("conservation audit pass clean");
                }
                Ok(findings) => {
                    error!(count = findings.len(), "conservation audit found shortfalls");
                }
                Err(e) => {
                    error!(error = %e, "conservation audit pass failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{AssetEntry, NetworkAssets, RegistryConfig};
    use crate::chain::MockChain;
    use crate::keys::PassthroughCipher;
    use crate::money;
    use crate::store::escrow::NewEscrow;
    use crate::store::mem::{MemEscrowStore, MemWalletStore};
    use crate::store::wallets::get_or_create_pool;

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

    #[tokio::test]
    async fn test_shortfall_is_reported() {
        let chain = Arc::new(MockChain::new());
        let escrow = Arc::new(MemEscrowStore::new());
        let wallets = Arc::new(MemWalletStore::new());
        let registry = registry();
        let cipher = PassthroughCipher;

        let pool = get_or_create_pool(&*wallets, &cipher, "guild-1", None)
            .await
            .unwrap();
        let contract = "0xaaaa00000000000000000000000000000000aaaa";
        chain.set_token(contract, &pool.address, money::parse_units("10", 18).unwrap());
        escrow
            .create(NewEscrow {
                community_id: "guild-1".to_string(),
                tenant_id: None,
                recipient_id: "alice".to_string(),
                asset: "TOK".to_string(),
                amount: "25".to_string(),
                is_nft: false,
                contract_address: Some(contract.to_string()),
                token_id: None,
                metadata: serde_json::Value::Null,
            })
            .await
            .unwrap();

        let accounting = Arc::new(Accounting::new(
            chain.clone(),
            escrow.clone(),
            registry.clone(),
        ));
        let audit = ConservationAudit::new(
            accounting,
            escrow,
            wallets,
            registry,
            Duration::from_secs(600),
        );

        let findings = audit.tick().await.unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].asset, "TOK");
        assert_eq!(findings[0].reserved, money::parse_units("25", 18).unwrap());
        assert_eq!(findings[0].on_chain, money::parse_units("10", 18).unwrap());
    }

    #[tokio::test]
    async fn test_fully_funded_pool_is_clean() {
        let chain = Arc::new(MockChain::new());
        let escrow = Arc::new(MemEscrowStore::new());
        let wallets = Arc::new(MemWalletStore::new());
        let registry = registry();
        let cipher = PassthroughCipher;

        let pool = get_or_create_pool(&*wallets, &cipher, "guild-1", None)
            .await
            .unwrap();
        let contract = "0xaaaa00000000000000000000000000000000aaaa";
        chain.set_token(contract, &pool.address, money::parse_units("50", 18).unwrap());
        escrow
            .create(NewEscrow {
                community_id: "guild-1".to_string(),
                tenant_id: None,
                recipient_id: "alice".to_string(),
                asset: "TOK".to_string(),
                amount: "25".to_string(),
                is_nft: false,
                contract_address: Some(contract.to_string()),
                token_id: None,
                metadata: serde_json::Value::Null,
            })
            .await
            .unwrap();

        let accounting = Arc::new(Accounting::new(
            chain.clone(),
            escrow.clone(),
            registry.clone(),
        ));
        let audit = ConservationAudit::new(
            accounting,
            escrow,
            wallets,
            registry,
            Duration::from_secs(600),
        );

        assert!(audit.tick().await.unwrap().is_empty());
    }
}
