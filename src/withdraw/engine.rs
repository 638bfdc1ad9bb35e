//! Withdrawal engine: the fee-then-principal state machine.
//!
//! Protocol per attempt:
//! 1. serialize on (requester, asset)
//! 2. reuse a resumable attempt when one exists, charging only the fee
//!    delta for a larger amount and never re-charging for equal or smaller
//! 3. otherwise validate balances, snapshot prices, persist Pending,
//!    collect the fee, then move the principal
//!
//! Every transition is persisted before the next chain call so a crash at
//! any point leaves a record that re-entry can pick up.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::state::WithdrawStatus;
use super::types::{
    AttemptId, WithdrawAttempt, WithdrawOutcome, WithdrawRequest, WithdrawTarget,
};
use crate::assets::{AssetInfo, AssetRegistry};
use crate::chain::{ChainClient, TransferCall};
use crate::error::WalletError;
use crate::fee::FeeSchedule;
use crate::keys::{KeyCipher, signing_key_from_hex};
use crate::locks::KeyedLock;
use crate::money;
use crate::nonce::NonceAllocator;
use crate::price::PriceResolver;
use crate::store::txlog::{TxKind, TxLog, TxLogEntry};
use crate::store::wallets::{MemberWallet, WalletStore};
use crate::store::withdraw::WithdrawStore;

pub struct WithdrawEngine {
    store: Arc<dyn WithdrawStore>,
    wallets: Arc<dyn WalletStore>,
    chain: Arc<dyn ChainClient>,
    registry: Arc<AssetRegistry>,
    prices: Arc<PriceResolver>,
    fees: FeeSchedule,
    cipher: Arc<dyn KeyCipher>,
    nonces: Arc<NonceAllocator>,
    txlog: Arc<dyn TxLog>,
    locks: KeyedLock,
}

impl WithdrawEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn WithdrawStore>,
        wallets: Arc<dyn WalletStore>,
        chain: Arc<dyn ChainClient>,
        registry: Arc<AssetRegistry>,
        prices: Arc<PriceResolver>,
        fees: FeeSchedule,
        cipher: Arc<dyn KeyCipher>,
        nonces: Arc<NonceAllocator>,
        txlog: Arc<dyn TxLog>,
    ) -> Self {
        Self {
            store,
            wallets,
            chain,
            registry,
            prices,
            fees,
            cipher,
            nonces,
            txlog,
            locks: KeyedLock::new(),
        }
    }

    pub async fn withdraw(&self, req: WithdrawRequest) -> Result<WithdrawOutcome, WalletError> {
        let member = self
            .wallets
            .get_member(&req.requester_id)
            .await?
            .ok_or(WalletError::NoWallet)?;

        match &req.target {
            WithdrawTarget::Fungible { asset } => {
                let asset = self.registry.resolve(asset)?.clone();
                let _guard = self
                    .locks
                    .acquire(&format!("{}:{}", req.requester_id, asset.ticker))
                    .await;
                self.withdraw_fungible(&req, &member, &asset).await
            }
            WithdrawTarget::Nft {
                collection,
                token_id,
            } => {
                let collection = self.registry.nft(collection)?.clone();
                let _guard = self
                    .locks
                    .acquire(&format!("{}:{}", req.requester_id, collection.ticker))
                    .await;
                self.withdraw_nft(&req, &member, &collection.ticker, &collection.contract, *token_id)
                    .await
            }
        }
    }

    async fn withdraw_fungible(
        &self,
        req: &WithdrawRequest,
        member: &MemberWallet,
        asset: &AssetInfo,
    ) -> Result<WithdrawOutcome, WalletError> {
        let amount = req
            .amount
            .ok_or_else(|| WalletError::InvalidAmount("amount required".to_string()))?;
        if amount <= Decimal::ZERO {
            return Err(WalletError::InvalidAmount(amount.to_string()));
        }
        let amount_units = money::decimal_to_units(amount, asset.decimals)?;
        if amount_units == 0 {
            return Err(WalletError::InvalidAmount("amount rounds to zero".to_string()));
        }

        if let Some(existing) = self
            .store
            .find_resumable_fungible(&req.requester_id, &asset.ticker)
            .await?
        {
            return self.resume_fungible(req, member, asset, existing, amount).await;
        }

        // Fresh attempt: asset balance first, then fee funding
        let balance = self.asset_balance(&member.address, asset).await?;
        if balance < amount_units {
            return Err(WalletError::InsufficientBalance);
        }

        let native = self.registry.native();
        let native_price = self.prices.price_usd(native).await?;
        let asset_price = if asset.is_native() {
            native_price
        } else {
            self.prices.price_usd(asset).await?
        };

        let fee_native = self
            .fees
            .percentage_fee_native(amount, asset_price, native_price)?;
        let fee_units = money::decimal_to_units(fee_native, native.decimals)?;

        self.check_fee_funding(member, asset, amount_units, fee_units)
            .await?;

        let attempt = WithdrawAttempt {
            id: AttemptId::new(),
            requester_id: req.requester_id.clone(),
            source_address: member.address.clone(),
            destination_address: req.destination.clone(),
            asset: Some(asset.ticker.clone()),
            nft_collection: None,
            nft_token_id: None,
            requested_amount: amount.to_string(),
            fee_native: fee_native.to_string(),
            asset_price_usd: Some(asset_price),
            native_price_usd: Some(native_price),
            status: WithdrawStatus::Pending,
            fee_tx_hash: None,
            transfer_tx_hash: None,
            last_error: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        self.store.insert(&attempt).await?;

        let fee_tx_hash = self.collect_fee(&attempt, member, fee_units).await?;

        self.transfer_principal(
            attempt.id,
            member,
            asset,
            amount,
            fee_native,
            Some(fee_tx_hash),
            &req.destination,
        )
        .await
    }

    /// Re-enter a fee-paid attempt: equal resumes, smaller needs consent,
    /// larger charges the fee delta only.
    async fn resume_fungible(
        &self,
        req: &WithdrawRequest,
        member: &MemberWallet,
        asset: &AssetInfo,
        existing: WithdrawAttempt,
        amount: Decimal,
    ) -> Result<WithdrawOutcome, WalletError> {
        let paid_for: Decimal = existing.requested_amount.parse().map_err(|_| {
            WalletError::Internal(format!(
                "stored amount unparseable on attempt {}",
                existing.id
            ))
        })?;
        let prior_fee: Decimal = existing.fee_native.parse().map_err(|_| {
            WalletError::Internal(format!("stored fee unparseable on attempt {}", existing.id))
        })?;

        info!(
            attempt_id = %existing.id,
            %paid_for,
            requested = %amount,
            "resuming fee-paid withdrawal attempt"
        );

        if amount < paid_for && !req.confirm_reduction {
            return Ok(WithdrawOutcome::ReductionNeedsConfirmation {
                attempt_id: existing.id,
                paid_for_amount: paid_for,
                requested_amount: amount,
            });
        }

        let mut total_fee = prior_fee;
        let mut new_fee_tx: Option<String> = None;

        if amount > paid_for {
            // Only the increase is charged; the already-paid fee stands
            let delta = amount - paid_for;
            let native = self.registry.native();
            let native_price = self.prices.price_usd(native).await?;
            let asset_price = if asset.is_native() {
                native_price
            } else {
                self.prices.price_usd(asset).await?
            };
            let delta_fee = self
                .fees
                .percentage_fee_native(delta, asset_price, native_price)?;
            let delta_units = money::decimal_to_units(delta_fee, native.decimals)?;

            let amount_units = money::decimal_to_units(amount, asset.decimals)?;
            let balance = self.asset_balance(&member.address, asset).await?;
            if balance < amount_units {
                return Err(WalletError::InsufficientBalance);
            }
            self.check_fee_funding(member, asset, amount_units, delta_units)
                .await?;

            if delta_units > 0 {
                let tx_hash = self.send_fee_leg(member, delta_units).await.map_err(|e| {
                    // Existing record untouched: the old amount stays payable
                    warn!(attempt_id = %existing.id, error = %e, "delta fee collection failed");
                    e
                })?;
                self.log_transfer(
                    &member.address,
                    &self.fees.recipient.clone(),
                    &self.registry.native().ticker,
                    &money::format_units(delta_units, self.registry.native().decimals),
                    &tx_hash,
                    TxKind::WithdrawFee,
                )
                .await;
                new_fee_tx = Some(tx_hash);
            }
            total_fee = prior_fee + delta_fee;
        }

        self.store
            .apply_revision(
                existing.id,
                &amount.to_string(),
                &req.destination,
                &total_fee.to_string(),
                new_fee_tx.as_deref(),
            )
            .await?;

        self.transfer_principal(
            existing.id,
            member,
            asset,
            amount,
            total_fee,
            new_fee_tx.or(existing.fee_tx_hash),
            &req.destination,
        )
        .await
    }

    async fn withdraw_nft(
        &self,
        req: &WithdrawRequest,
        member: &MemberWallet,
        collection_ticker: &str,
        contract: &str,
        token_id: u128,
    ) -> Result<WithdrawOutcome, WalletError> {
        let token_id_str = token_id.to_string();

        let existing = self
            .store
            .find_resumable_nft(&req.requester_id, collection_ticker, &token_id_str)
            .await?;

        let owner = self.chain.nft_owner(contract, token_id).await?;
        if owner != member.address.to_lowercase() {
            return Err(WalletError::NotOwner);
        }

        let native = self.registry.native();
        let (attempt_id, fee_native, fee_tx_hash) = match existing {
            Some(attempt) => {
                info!(attempt_id = %attempt.id, "resuming fee-paid NFT withdrawal");
                let fee: Decimal = attempt.fee_native.parse().map_err(|_| {
                    WalletError::Internal(format!("stored fee unparseable on attempt {}", attempt.id))
                })?;
                if attempt.destination_address != req.destination {
                    self.store
                        .apply_revision(
                            attempt.id,
                            &attempt.requested_amount,
                            &req.destination,
                            &attempt.fee_native,
                            None,
                        )
                        .await?;
                }
                (attempt.id, fee, attempt.fee_tx_hash)
            }
            None => {
                // Flat fee, no pricing and no delta logic for NFTs
                let fee_units = self.fees.nft_fee_units(native.decimals)?;
                self.check_native_funding(&member.address, fee_units).await?;

                let attempt = WithdrawAttempt {
                    id: AttemptId::new(),
                    requester_id: req.requester_id.clone(),
                    source_address: member.address.clone(),
                    destination_address: req.destination.clone(),
                    asset: None,
                    nft_collection: Some(collection_ticker.to_string()),
                    nft_token_id: Some(token_id_str.clone()),
                    requested_amount: "1".to_string(),
                    fee_native: self.fees.nft_flat_native.to_string(),
                    asset_price_usd: None,
                    native_price_usd: None,
                    status: WithdrawStatus::Pending,
                    fee_tx_hash: None,
                    transfer_tx_hash: None,
                    last_error: None,
                    created_at: chrono::Utc::now(),
                    updated_at: chrono::Utc::now(),
                };
                self.store.insert(&attempt).await?;

                let tx_hash = self.collect_fee(&attempt, member, fee_units).await?;
                (attempt.id, self.fees.nft_flat_native, Some(tx_hash))
            }
        };

        // Principal: move the NFT itself
        let call = TransferCall::Nft {
            contract: contract.to_string(),
            from: member.address.clone(),
            to: req.destination.clone(),
            token_id,
        };
        match self.submit(member, &call).await {
            Ok(tx_hash) => {
                if !self.store.record_completed(attempt_id, &tx_hash).await? {
                    warn!(attempt_id = %attempt_id, "completion CAS lost, attempt already finalized");
                }
                self.log_transfer(
                    &member.address,
                    &req.destination,
                    collection_ticker,
                    &token_id_str,
                    &tx_hash,
                    TxKind::Withdraw,
                )
                .await;
                Ok(WithdrawOutcome::Completed {
                    attempt_id,
                    amount: Decimal::ONE,
                    fee_native,
                    fee_tx_hash,
                    transfer_tx_hash: tx_hash,
                })
            }
            Err(e) => {
                self.store
                    .record_transfer_failure(attempt_id, &e.to_string())
                    .await?;
                self.nonces.invalidate(&member.address);
                Ok(WithdrawOutcome::TransferFailedFeeRetained {
                    attempt_id,
                    fee_native,
                    fee_tx_hash,
                    error: e.to_string(),
                })
            }
        }
    }

    /// The principal leg shared by fresh and resumed fungible attempts.
    #[allow(clippy::too_many_arguments)]
    async fn transfer_principal(
        &self,
        attempt_id: AttemptId,
        member: &MemberWallet,
        asset: &AssetInfo,
        amount: Decimal,
        fee_native: Decimal,
        fee_tx_hash: Option<String>,
        destination: &str,
    ) -> Result<WithdrawOutcome, WalletError> {
        let amount_units = money::decimal_to_units(amount, asset.decimals)?;

        // Re-validate: the balance may have moved since the fee was paid
        let balance = self.asset_balance(&member.address, asset).await?;
        if balance < amount_units {
            let msg = "insufficient balance at transfer time".to_string();
            self.store.record_transfer_failure(attempt_id, &msg).await?;
            return Ok(WithdrawOutcome::TransferFailedFeeRetained {
                attempt_id,
                fee_native,
                fee_tx_hash,
                error: msg,
            });
        }

        let call = match asset.contract() {
            None => TransferCall::Native {
                to: destination.to_string(),
                value: amount_units,
            },
            Some(contract) => TransferCall::Token {
                contract: contract.to_string(),
                to: destination.to_string(),
                amount: amount_units,
            },
        };

        match self.submit(member, &call).await {
            Ok(tx_hash) => {
                if !self.store.record_completed(attempt_id, &tx_hash).await? {
                    warn!(attempt_id = %attempt_id, "completion CAS lost, attempt already finalized");
                }
                self.log_transfer(
                    &member.address,
                    destination,
                    &asset.ticker,
                    &amount.to_string(),
                    &tx_hash,
                    TxKind::Withdraw,
                )
                .await;
                info!(attempt_id = %attempt_id, %amount, asset = %asset.ticker, tx_hash = %tx_hash, "withdrawal completed");
                Ok(WithdrawOutcome::Completed {
                    attempt_id,
                    amount,
                    fee_native,
                    fee_tx_hash,
                    transfer_tx_hash: tx_hash,
                })
            }
            Err(e) => {
                self.store
                    .record_transfer_failure(attempt_id, &e.to_string())
                    .await?;
                self.nonces.invalidate(&member.address);
                warn!(attempt_id = %attempt_id, error = %e, "principal transfer failed, fee retained");
                Ok(WithdrawOutcome::TransferFailedFeeRetained {
                    attempt_id,
                    fee_native,
                    fee_tx_hash,
                    error: e.to_string(),
                })
            }
        }
    }

    /// Charge the fee on a Pending attempt; any failure finalizes the
    /// attempt as FeeCollectionFailed.
    async fn collect_fee(
        &self,
        attempt: &WithdrawAttempt,
        member: &MemberWallet,
        fee_units: u128,
    ) -> Result<String, WalletError> {
        match self.send_fee_leg(member, fee_units).await {
            Ok(tx_hash) => {
                if !self.store.record_fee_collected(attempt.id, &tx_hash).await? {
                    warn!(attempt_id = %attempt.id, "fee CAS lost, concurrent transition");
                }
                self.log_transfer(
                    &member.address,
                    &self.fees.recipient.clone(),
                    &self.registry.native().ticker,
                    &money::format_units(fee_units, self.registry.native().decimals),
                    &tx_hash,
                    TxKind::WithdrawFee,
                )
                .await;
                Ok(tx_hash)
            }
            Err(e) => {
                if !self
                    .store
                    .record_fee_failure(attempt.id, &e.to_string())
                    .await?
                {
                    warn!(attempt_id = %attempt.id, "fee-failure CAS lost, concurrent transition");
                }
                self.nonces.invalidate(&member.address);
                error!(attempt_id = %attempt.id, error = %e, "fee collection failed, nothing charged");
                Err(e)
            }
        }
    }

    async fn send_fee_leg(
        &self,
        member: &MemberWallet,
        fee_units: u128,
    ) -> Result<String, WalletError> {
        let call = TransferCall::Native {
            to: self.fees.recipient.clone(),
            value: fee_units,
        };
        self.submit(member, &call).await
    }

    /// Sign with the member's transient key and send one transfer.
    async fn submit(&self, member: &MemberWallet, call: &TransferCall) -> Result<String, WalletError> {
        let secret = self.cipher.open(&member.sealed_key)?;
        let key = signing_key_from_hex(&secret)?;
        let gas_price = self.chain.gas_price().await?;
        let gas_limit = self.chain.estimate_gas(&member.address, call).await?;
        let nonce = self.nonces.reserve(&member.address).await?;
        Ok(self.chain.send(&key, call, nonce, gas_price, gas_limit).await?)
    }

    async fn asset_balance(&self, address: &str, asset: &AssetInfo) -> Result<u128, WalletError> {
        match asset.contract() {
            None => Ok(self.chain.native_balance(address).await?),
            Some(contract) => Ok(self.chain.token_balance(contract, address).await?),
        }
    }

    /// Native funds must cover the fee and its gas; for a native-asset
    /// withdrawal the principal amount competes for the same funds.
    async fn check_fee_funding(
        &self,
        member: &MemberWallet,
        asset: &AssetInfo,
        amount_units: u128,
        fee_units: u128,
    ) -> Result<(), WalletError> {
        let reserved_for_amount = if asset.is_native() { amount_units } else { 0 };
        let needed = reserved_for_amount.saturating_add(fee_units);
        self.check_native_funding(&member.address, needed).await
    }

    async fn check_native_funding(&self, address: &str, needed: u128) -> Result<(), WalletError> {
        let gas_price = self.chain.gas_price().await?;
        let fee_call = TransferCall::Native {
            to: self.fees.recipient.clone(),
            value: needed,
        };
        let gas_limit = self.chain.estimate_gas(address, &fee_call).await?;
        let native_balance = self.chain.native_balance(address).await?;
        let total = needed.saturating_add(gas_price.saturating_mul(gas_limit));
        if native_balance < total {
            return Err(WalletError::InsufficientGas);
        }
        Ok(())
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
