//! Payout engine.
//!
//! Pays pool funds out to a destination address, one on-chain transfer per
//! asset leg. Failed legs never abort the batch: each failure becomes an
//! escrow reservation (unless the call is itself replaying an escrow) and
//! the caller always gets the full breakdown.

use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::types::{
    AssetSelector, LegFailure, LegSuccess, PayoutAmount, PayoutOutcome, PayoutSummary,
};
use crate::accounting::Accounting;
use crate::assets::{AssetInfo, AssetRegistry};
use crate::chain::{ChainClient, TransferCall};
use crate::error::{ErrorCode, WalletError};
use crate::keys::{KeyCipher, signing_key_from_hex};
use crate::locks::KeyedLock;
use crate::money;
use crate::nonce::NonceAllocator;
use crate::store::escrow::{EscrowStore, NewEscrow};
use crate::store::txlog::{TxKind, TxLog, TxLogEntry};
use crate::store::wallets::{PoolWallet, WalletStore, get_or_create_pool};

pub struct PayoutEngine {
    wallets: Arc<dyn WalletStore>,
    escrow: Arc<dyn EscrowStore>,
    chain: Arc<dyn ChainClient>,
    registry: Arc<AssetRegistry>,
    accounting: Arc<Accounting>,
    cipher: Arc<dyn KeyCipher>,
    nonces: Arc<NonceAllocator>,
    txlog: Arc<dyn TxLog>,
    locks: KeyedLock,
    /// Pause between fan-out drops, throughput knob only
    fanout_delay: Duration,
}

/// One planned fungible leg.
struct PlannedLeg {
    asset: AssetInfo,
    units: u128,
}

impl PayoutEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        wallets: Arc<dyn WalletStore>,
        escrow: Arc<dyn EscrowStore>,
        chain: Arc<dyn ChainClient>,
        registry: Arc<AssetRegistry>,
        accounting: Arc<Accounting>,
        cipher: Arc<dyn KeyCipher>,
        nonces: Arc<NonceAllocator>,
        txlog: Arc<dyn TxLog>,
        fanout_delay: Duration,
    ) -> Self {
        Self {
            wallets,
            escrow,
            chain,
            registry,
            accounting,
            cipher,
            nonces,
            txlog,
            locks: KeyedLock::new(),
            fanout_delay,
        }
    }

    fn pool_key(community_id: &str, tenant_id: Option<&str>) -> String {
        format!("pool:{}:{}", community_id, tenant_id.unwrap_or(""))
    }

    /// Pay out from the pool.
    ///
    /// `is_escrow_claim` disables both the reservation subtraction (the
    /// claim spends the reserved funds) and the escrow-on-failure fallback
    /// (the failed record simply stays unclaimed).
    #[allow(clippy::too_many_arguments)]
    pub async fn payout(
        &self,
        community_id: &str,
        tenant_id: Option<&str>,
        recipient_id: &str,
        destination: &str,
        selector: &AssetSelector,
        amount: PayoutAmount,
        is_escrow_claim: bool,
    ) -> Result<PayoutOutcome, WalletError> {
        let _guard = self
            .locks
            .acquire(&Self::pool_key(community_id, tenant_id))
            .await;

        let pool = self
            .wallets
            .get_pool(community_id, tenant_id)
            .await?
            .ok_or(WalletError::NoWallet)?;

        match selector {
            AssetSelector::Nft {
                collection,
                token_id,
            } => {
                self.payout_nft(
                    community_id,
                    tenant_id,
                    recipient_id,
                    destination,
                    &pool,
                    collection,
                    *token_id,
                    is_escrow_claim,
                )
                .await
            }
            AssetSelector::One(ticker) => {
                let asset = self.registry.resolve(ticker)?.clone();
                let leg = self
                    .plan_single(community_id, tenant_id, &pool, &asset, amount, is_escrow_claim)
                    .await?;
                self.execute_fungible_legs(
                    community_id,
                    tenant_id,
                    recipient_id,
                    destination,
                    &pool,
                    vec![leg],
                    is_escrow_claim,
                )
                .await
            }
            AssetSelector::AllFungible => {
                let legs = self
                    .plan_all_fungible(community_id, tenant_id, &pool, amount, is_escrow_claim)
                    .await?;
                self.execute_fungible_legs(
                    community_id,
                    tenant_id,
                    recipient_id,
                    destination,
                    &pool,
                    legs,
                    is_escrow_claim,
                )
                .await
            }
        }
    }

    async fn plan_single(
        &self,
        community_id: &str,
        tenant_id: Option<&str>,
        pool: &PoolWallet,
        asset: &AssetInfo,
        amount: PayoutAmount,
        is_escrow_claim: bool,
    ) -> Result<PlannedLeg, WalletError> {
        let usable = self
            .accounting
            .available_balance(community_id, tenant_id, &pool.address, asset, is_escrow_claim)
            .await?;
        if usable == 0 {
            return Err(WalletError::InsufficientFunds);
        }

        let units = match amount {
            PayoutAmount::Exact(value) => {
                let units = money::decimal_to_units(value, asset.decimals)?;
                if units == 0 || units > usable {
                    return Err(WalletError::InsufficientFunds);
                }
                units
            }
            PayoutAmount::All => {
                if asset.is_native() {
                    // The sweeping transfer pays its own gas
                    let gas_cost = self.transfer_gas_cost(&pool.address, asset).await?;
                    usable
                        .checked_sub(gas_cost)
                        .filter(|v| *v > 0)
                        .ok_or(WalletError::InsufficientFunds)?
                } else {
                    usable
                }
            }
        };

        Ok(PlannedLeg {
            asset: asset.clone(),
            units,
        })
    }

    async fn plan_all_fungible(
        &self,
        community_id: &str,
        tenant_id: Option<&str>,
        pool: &PoolWallet,
        amount: PayoutAmount,
        is_escrow_claim: bool,
    ) -> Result<Vec<PlannedLeg>, WalletError> {
        let mut legs = Vec::new();
        for asset in self.registry.fungibles() {
            let usable = self
                .accounting
                .available_balance(community_id, tenant_id, &pool.address, asset, is_escrow_claim)
                .await?;
            let units = match amount {
                PayoutAmount::All => {
                    if usable == 0 {
                        continue;
                    }
                    usable
                }
                PayoutAmount::Exact(value) => {
                    let units = money::decimal_to_units(value, asset.decimals)?;
                    // A fixed amount any asset cannot cover fails the
                    // whole batch before anything is sent
                    if units == 0 || units > usable {
                        return Err(WalletError::InsufficientFunds);
                    }
                    units
                }
            };
            legs.push(PlannedLeg {
                asset: asset.clone(),
                units,
            });
        }

        if legs.is_empty() {
            return Err(WalletError::InsufficientFunds);
        }
        Ok(legs)
    }

    async fn execute_fungible_legs(
        &self,
        community_id: &str,
        tenant_id: Option<&str>,
        recipient_id: &str,
        destination: &str,
        pool: &PoolWallet,
        legs: Vec<PlannedLeg>,
        is_escrow_claim: bool,
    ) -> Result<PayoutOutcome, WalletError> {
        // Gas preflight: the whole batch must be fundable before any leg
        let gas_price = self.chain.gas_price().await?;
        let mut gas_total: u128 = 0;
        for leg in &legs {
            let call = self.build_call(&leg.asset, destination, leg.units);
            let gas_limit = self.chain.estimate_gas(&pool.address, &call).await?;
            gas_total = gas_total.saturating_add(gas_price.saturating_mul(gas_limit));
        }
        let native_balance = self.chain.native_balance(&pool.address).await?;
        let native_in_batch: u128 = legs
            .iter()
            .filter(|l| l.asset.is_native())
            .map(|l| l.units)
            .sum();
        if native_balance < gas_total.saturating_add(native_in_batch) {
            return Err(WalletError::InsufficientGas);
        }

        let kind = if is_escrow_claim {
            TxKind::EscrowClaim
        } else {
            TxKind::Payout
        };

        let mut txs = Vec::new();
        let mut failures = Vec::new();
        for leg in legs {
            let amount_str = money::format_units(leg.units, leg.asset.decimals);
            let call = self.build_call(&leg.asset, destination, leg.units);
            match self.submit_pool(pool, &call).await {
                Ok(tx_hash) => {
                    self.log_transfer(&pool.address, destination, &leg.asset.ticker, &amount_str, &tx_hash, kind)
                        .await;
                    info!(asset = %leg.asset.ticker, amount = %amount_str, tx_hash = %tx_hash, "payout leg confirmed");
                    txs.push(LegSuccess {
                        asset: leg.asset.ticker.clone(),
                        amount: amount_str,
                        tx_hash,
                    });
                }
                Err(e) => {
                    self.nonces.invalidate(&pool.address);
                    warn!(asset = %leg.asset.ticker, amount = %amount_str, error = %e, "payout leg failed");
                    let escrow_id = if is_escrow_claim {
                        None
                    } else {
                        self.reserve_failed_leg(
                            community_id,
                            tenant_id,
                            recipient_id,
                            &leg.asset.ticker,
                            &amount_str,
                            false,
                            leg.asset.contract().map(|c| c.to_string()),
                            None,
                        )
                        .await
                    };
                    failures.push(LegFailure {
                        asset: leg.asset.ticker.clone(),
                        amount: amount_str,
                        error: e.to_string(),
                        escrow_id,
                    });
                }
            }
        }

        Ok(self.summarize(txs, failures))
    }

    #[allow(clippy::too_many_arguments)]
    async fn payout_nft(
        &self,
        community_id: &str,
        tenant_id: Option<&str>,
        recipient_id: &str,
        destination: &str,
        pool: &PoolWallet,
        collection_ticker: &str,
        token_id: u128,
        is_escrow_claim: bool,
    ) -> Result<PayoutOutcome, WalletError> {
        let collection = self.registry.nft(collection_ticker)?.clone();

        let owner = self.chain.nft_owner(&collection.contract, token_id).await?;
        if owner != pool.address.to_lowercase() {
            return Err(WalletError::NotOwner);
        }

        let call = TransferCall::Nft {
            contract: collection.contract.clone(),
            from: pool.address.clone(),
            to: destination.to_string(),
            token_id,
        };
        let gas_price = self.chain.gas_price().await?;
        let gas_limit = self.chain.estimate_gas(&pool.address, &call).await?;
        let native_balance = self.chain.native_balance(&pool.address).await?;
        if native_balance < gas_price.saturating_mul(gas_limit) {
            return Err(WalletError::InsufficientGas);
        }

        let kind = if is_escrow_claim {
            TxKind::EscrowClaim
        } else {
            TxKind::Payout
        };
        let token_id_str = token_id.to_string();

        match self.submit_pool(pool, &call).await {
            Ok(tx_hash) => {
                self.log_transfer(
                    &pool.address,
                    destination,
                    &collection.ticker,
                    &token_id_str,
                    &tx_hash,
                    kind,
                )
                .await;
                Ok(PayoutOutcome::all_ok(vec![LegSuccess {
                    asset: collection.ticker.clone(),
                    amount: token_id_str,
                    tx_hash,
                }]))
            }
            Err(e) => {
                self.nonces.invalidate(&pool.address);
                let escrow_id = if is_escrow_claim {
                    None
                } else {
                    self.reserve_failed_leg(
                        community_id,
                        tenant_id,
                        recipient_id,
                        &collection.ticker,
                        "1",
                        true,
                        Some(collection.contract.clone()),
                        Some(token_id_str.clone()),
                    )
                    .await
                };
                let failure = LegFailure {
                    asset: collection.ticker.clone(),
                    amount: token_id_str,
                    error: e.to_string(),
                    escrow_id,
                };
                Ok(self.summarize(Vec::new(), vec![failure]))
            }
        }
    }

    /// Member-to-pool donation of a fungible asset. Creates the pool
    /// wallet lazily on first donation.
    pub async fn donate(
        &self,
        community_id: &str,
        tenant_id: Option<&str>,
        donor_id: &str,
        ticker: &str,
        amount: Decimal,
    ) -> Result<LegSuccess, WalletError> {
        let donor = self
            .wallets
            .get_member(donor_id)
            .await?
            .ok_or(WalletError::NoWallet)?;
        let pool =
            get_or_create_pool(&*self.wallets, &*self.cipher, community_id, tenant_id).await?;
        let asset = self.registry.resolve(ticker)?.clone();

        let units = money::decimal_to_units(amount, asset.decimals)?;
        if units == 0 {
            return Err(WalletError::InvalidAmount("amount rounds to zero".to_string()));
        }
        let balance = match asset.contract() {
            None => self.chain.native_balance(&donor.address).await?,
            Some(contract) => self.chain.token_balance(contract, &donor.address).await?,
        };
        if balance < units {
            return Err(WalletError::InsufficientFunds);
        }

        let call = self.build_call(&asset, &pool.address, units);
        let gas_price = self.chain.gas_price().await?;
        let gas_limit = self.chain.estimate_gas(&donor.address, &call).await?;
        let native_balance = self.chain.native_balance(&donor.address).await?;
        let native_needed = if asset.is_native() { units } else { 0 };
        if native_balance < native_needed.saturating_add(gas_price.saturating_mul(gas_limit)) {
            return Err(WalletError::InsufficientGas);
        }

        let secret = self.cipher.open(&donor.sealed_key)?;
        let key = signing_key_from_hex(&secret)?;
        let nonce = self.nonces.reserve(&donor.address).await?;
        let tx_hash = match self.chain.send(&key, &call, nonce, gas_price, gas_limit).await {
            Ok(hash) => hash,
            Err(e) => {
                self.nonces.invalidate(&donor.address);
                return Err(e.into());
            }
        };

        let amount_str = money::format_units(units, asset.decimals);
        self.log_transfer(&donor.address, &pool.address, &asset.ticker, &amount_str, &tx_hash, TxKind::Donation)
            .await;
        Ok(LegSuccess {
            asset: asset.ticker.clone(),
            amount: amount_str,
            tx_hash,
        })
    }

    /// Member-to-pool NFT donation.
    pub async fn donate_nft(
        &self,
        community_id: &str,
        tenant_id: Option<&str>,
        donor_id: &str,
        collection_ticker: &str,
        token_id: u128,
    ) -> Result<LegSuccess, WalletError> {
        let donor = self
            .wallets
            .get_member(donor_id)
            .await?
            .ok_or(WalletError::NoWallet)?;
        let pool =
            get_or_create_pool(&*self.wallets, &*self.cipher, community_id, tenant_id).await?;
        let collection = self.registry.nft(collection_ticker)?.clone();

        let owner = self.chain.nft_owner(&collection.contract, token_id).await?;
        if owner != donor.address.to_lowercase() {
            return Err(WalletError::NotOwner);
        }

        let call = TransferCall::Nft {
            contract: collection.contract.clone(),
            from: donor.address.clone(),
            to: pool.address.clone(),
            token_id,
        };
        let gas_price = self.chain.gas_price().await?;
        let gas_limit = self.chain.estimate_gas(&donor.address, &call).await?;
        let native_balance = self.chain.native_balance(&donor.address).await?;
        if native_balance < gas_price.saturating_mul(gas_limit) {
            return Err(WalletError::InsufficientGas);
        }

        let secret = self.cipher.open(&donor.sealed_key)?;
        let key = signing_key_from_hex(&secret)?;
        let nonce = self.nonces.reserve(&donor.address).await?;
        let tx_hash = match self.chain.send(&key, &call, nonce, gas_price, gas_limit).await {
            Ok(hash) => hash,
            Err(e) => {
                self.nonces.invalidate(&donor.address);
                return Err(e.into());
            }
        };

        let token_id_str = token_id.to_string();
        self.log_transfer(&donor.address, &pool.address, &collection.ticker, &token_id_str, &tx_hash, TxKind::Donation)
            .await;
        Ok(LegSuccess {
            asset: collection.ticker.clone(),
            amount: token_id_str,
            tx_hash,
        })
    }

    /// Fixed-amount drop of one asset to many recipients. Nonces for the
    /// whole batch are reserved up front so the transfers are numbered
    /// consecutively before anything is submitted.
    pub async fn fan_out(
        &self,
        community_id: &str,
        tenant_id: Option<&str>,
        drops: &[(String, String)],
        ticker: &str,
        amount_each: Decimal,
    ) -> Result<PayoutOutcome, WalletError> {
        if drops.is_empty() {
            return Err(WalletError::InvalidAmount("no recipients".to_string()));
        }
        let _guard = self
            .locks
            .acquire(&Self::pool_key(community_id, tenant_id))
            .await;

        let pool = self
            .wallets
            .get_pool(community_id, tenant_id)
            .await?
            .ok_or(WalletError::NoWallet)?;
        let asset = self.registry.resolve(ticker)?.clone();

        let units_each = money::decimal_to_units(amount_each, asset.decimals)?;
        if units_each == 0 {
            return Err(WalletError::InvalidAmount("amount rounds to zero".to_string()));
        }
        let total = units_each
            .checked_mul(drops.len() as u128)
            .ok_or_else(|| WalletError::InvalidAmount("total overflow".to_string()))?;

        let usable = self
            .accounting
            .available_balance(community_id, tenant_id, &pool.address, &asset, false)
            .await?;
        if total > usable {
            return Err(WalletError::InsufficientFunds);
        }

        let sample_call = self.build_call(&asset, &drops[0].1, units_each);
        let gas_price = self.chain.gas_price().await?;
        let gas_limit = self.chain.estimate_gas(&pool.address, &sample_call).await?;
        let gas_total = gas_price
            .saturating_mul(gas_limit)
            .saturating_mul(drops.len() as u128);
        let native_balance = self.chain.native_balance(&pool.address).await?;
        let native_needed = if asset.is_native() { total } else { 0 };
        if native_balance < native_needed.saturating_add(gas_total) {
            return Err(WalletError::InsufficientGas);
        }

        let secret = self.cipher.open(&pool.sealed_key)?;
        let key = signing_key_from_hex(&secret)?;
        let start_nonce = self
            .nonces
            .reserve_batch(&pool.address, drops.len() as u64)
            .await?;
        let amount_str = money::format_units(units_each, asset.decimals);

        let mut txs = Vec::new();
        let mut failures = Vec::new();
        for (i, (recipient_id, address)) in drops.iter().enumerate() {
            if i > 0 && !self.fanout_delay.is_zero() {
                tokio::time::sleep(self.fanout_delay).await;
            }
            let call = self.build_call(&asset, address, units_each);
            let nonce = start_nonce + i as u64;
            match self.chain.send(&key, &call, nonce, gas_price, gas_limit).await {
                Ok(tx_hash) => {
                    self.log_transfer(&pool.address, address, &asset.ticker, &amount_str, &tx_hash, TxKind::FanOut)
                        .await;
                    txs.push(LegSuccess {
                        asset: asset.ticker.clone(),
                        amount: amount_str.clone(),
                        tx_hash,
                    });
                }
                Err(e) => {
                    self.nonces.invalidate(&pool.address);
                    warn!(recipient = %recipient_id, error = %e, "fan-out drop failed");
                    let escrow_id = self
                        .reserve_failed_leg(
                            community_id,
                            tenant_id,
                            recipient_id,
                            &asset.ticker,
                            &amount_str,
                            false,
                            asset.contract().map(|c| c.to_string()),
                            None,
                        )
                        .await;
                    failures.push(LegFailure {
                        asset: asset.ticker.clone(),
                        amount: amount_str.clone(),
                        error: e.to_string(),
                        escrow_id,
                    });
                }
            }
        }

        Ok(self.summarize(txs, failures))
    }

    /// Administrative backfill: create unclaimed reservations for a
    /// recipient without touching the chain.
    pub async fn create_reservations(
        &self,
        community_id: &str,
        tenant_id: Option<&str>,
        recipient_id: &str,
        selector: &AssetSelector,
        amount: PayoutAmount,
    ) -> Result<Vec<i64>, WalletError> {
        let pool = self
            .wallets
            .get_pool(community_id, tenant_id)
            .await?
            .ok_or(WalletError::NoWallet)?;

        let candidates: Vec<AssetInfo> = match selector {
            AssetSelector::One(ticker) => {
                let asset = self.registry.resolve(ticker)?.clone();
                if asset.is_native() {
                    return Err(WalletError::NoEligibleAssets);
                }
                vec![asset]
            }
            AssetSelector::AllFungible => self.registry.fungibles().cloned().collect(),
            AssetSelector::Nft { .. } => {
                return Err(WalletError::InvalidAmount(
                    "NFT reservations are created by payout failures only".to_string(),
                ));
            }
        };

        let mut ids = Vec::new();
        for asset in candidates {
            let available = self
                .accounting
                .available_balance(community_id, tenant_id, &pool.address, &asset, false)
                .await?;
            let units = match amount {
                PayoutAmount::All => available,
                PayoutAmount::Exact(value) => {
                    let units = money::decimal_to_units(value, asset.decimals)?;
                    if units > available {
                        continue;
                    }
                    units
                }
            };
            if units == 0 {
                continue;
            }
            let id = self
                .escrow
                .create(NewEscrow {
                    community_id: community_id.to_string(),
                    tenant_id: tenant_id.map(|t| t.to_string()),
                    recipient_id: recipient_id.to_string(),
                    asset: asset.ticker.clone(),
                    amount: money::format_units(units, asset.decimals),
                    is_nft: false,
                    contract_address: asset.contract().map(|c| c.to_string()),
                    token_id: None,
                    metadata: serde_json::json!({"reason": "backfill"}),
                })
                .await?;
            ids.push(id);
        }

        if ids.is_empty() {
            return Err(WalletError::NoEligibleAssets);
        }
        Ok(ids)
    }

    fn build_call(&self, asset: &AssetInfo, destination: &str, units: u128) -> TransferCall {
        match asset.contract() {
            None => TransferCall::Native {
                to: destination.to_string(),
                value: units,
            },
            Some(contract) => TransferCall::Token {
                contract: contract.to_string(),
                to: destination.to_string(),
                amount: units,
            },
        }
    }

    async fn transfer_gas_cost(
        &self,
        from: &str,
        asset: &AssetInfo,
    ) -> Result<u128, WalletError> {
        let call = self.build_call(asset, from, 1);
        let gas_price = self.chain.gas_price().await?;
        let gas_limit = self.chain.estimate_gas(from, &call).await?;
        Ok(gas_price.saturating_mul(gas_limit))
    }

    async fn submit_pool(
        &self,
        pool: &PoolWallet,
        call: &TransferCall,
    ) -> Result<String, WalletError> {
        // Pool key is decrypted transiently, never stored or returned
        let secret = self.cipher.open(&pool.sealed_key)?;
        let key = signing_key_from_hex(&secret)?;
        let gas_price = self.chain.gas_price().await?;
        let gas_limit = self.chain.estimate_gas(&pool.address, call).await?;
        let nonce = self.nonces.reserve(&pool.address).await?;
        Ok(self.chain.send(&key, call, nonce, gas_price, gas_limit).await?)
    }

    #[allow(clippy::too_many_arguments)]
    async fn reserve_failed_leg(
        &self,
        community_id: &str,
        tenant_id: Option<&str>,
        recipient_id: &str,
        asset: &str,
        amount: &str,
        is_nft: bool,
        contract_address: Option<String>,
        token_id: Option<String>,
    ) -> Option<i64> {
        let result = self
            .escrow
            .create(NewEscrow {
                community_id: community_id.to_string(),
                tenant_id: tenant_id.map(|t| t.to_string()),
                recipient_id: recipient_id.to_string(),
                asset: asset.to_string(),
                amount: amount.to_string(),
                is_nft,
                contract_address,
                token_id,
                metadata: serde_json::json!({"reason": "payout_failure"}),
            })
            .await;
        match result {
            Ok(id) => {
                info!(escrow_id = id, asset, amount, recipient = recipient_id, "escrowed failed payout leg");
                Some(id)
            }
            Err(e) => {
                // Worst case: funds stay in the pool and the audit worker
                // flags the drift
                error!(asset, amount, error = %e, "failed to create escrow for failed leg");
                None
            }
        }
    }

    fn summarize(&self, txs: Vec<LegSuccess>, failures: Vec<LegFailure>) -> PayoutOutcome {
        let summary = PayoutSummary {
            successful: txs.len(),
            failed: failures.len(),
            escrowed: failures.iter().filter(|f| f.escrow_id.is_some()).count(),
        };
        let success = failures.is_empty();
        PayoutOutcome {
            success,
            error: (!success).then_some(ErrorCode::PayoutFailure),
            txs,
            failures,
            summary,
        }
    }

    async fn log_transfer(
        &self,
        sender: &str,
        recipient: &str,
        asset: &str,
        amount: &str,
        tx_hash: &str,
        kind: TxKind,
    ) {
        let entry = TxLogEntry {
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            asset: asset.to_string(),
            amount: amount.to_string(),
            tx_hash: tx_hash.to_string(),
            kind,
        };
        if let Err(e) = self.txlog.append(entry).await {
            error!(error = %e, "failed to append tx log entry");
        }
    }
}
