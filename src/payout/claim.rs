//! Escrow claims: replay a claimant's reserved payouts to their wallet.

use std::sync::Arc;
use tracing::{info, warn};

use super::engine::PayoutEngine;
use super::types::{AssetSelector, ClaimOutcome, PayoutAmount, PayoutSummary};
use crate::error::{ErrorCode, WalletError};
use crate::store::escrow::{EscrowRecord, EscrowStore};
use crate::store::wallets::WalletStore;

pub struct ClaimResolver {
    engine: Arc<PayoutEngine>,
    escrow: Arc<dyn EscrowStore>,
    wallets: Arc<dyn WalletStore>,
}

impl ClaimResolver {
    pub fn new(
        engine: Arc<PayoutEngine>,
        escrow: Arc<dyn EscrowStore>,
        wallets: Arc<dyn WalletStore>,
    ) -> Self {
        Self {
            engine,
            escrow,
            wallets,
        }
    }

    /// Pay every unclaimed escrow record owed to `claimant_id` into their
    /// member wallet, oldest first. Records whose transfer fails stay
    /// unclaimed and can be retried later.
    pub async fn claim(
        &self,
        community_id: &str,
        tenant_id: Option<&str>,
        claimant_id: &str,
    ) -> Result<ClaimOutcome, WalletError> {
        let member = self
            .wallets
            .get_member(claimant_id)
            .await?
            .ok_or(WalletError::NoWallet)?;

        let records = self
            .escrow
            .unclaimed_for_recipient(community_id, tenant_id, claimant_id)
            .await?;
        if records.is_empty() {
            return Err(WalletError::NoEscrow);
        }

        let mut summary = PayoutSummary::default();
        let mut success_msgs = Vec::new();
        let mut fail_msgs = Vec::new();

        for record in records {
            match self
                .replay_record(community_id, tenant_id, claimant_id, &member.address, &record)
                .await
            {
                Ok(tx_hash) => {
                    // A lost CAS means someone else just claimed it; the
                    // transfer already went out either way
                    if !self.escrow.mark_claimed(record.id).await? {
                        warn!(escrow_id = record.id, "escrow record claimed concurrently");
                    }
                    info!(escrow_id = record.id, asset = %record.asset, tx_hash = %tx_hash, "escrow record claimed");
                    summary.successful += 1;
                    success_msgs.push(format!(
                        "{} {} sent ({})",
                        record.amount, record.asset, tx_hash
                    ));
                }
                Err(e) => {
                    warn!(escrow_id = record.id, asset = %record.asset, error = %e, "escrow claim leg failed");
                    summary.failed += 1;
                    fail_msgs.push(format!("{} {}: {}", record.amount, record.asset, e));
                }
            }
        }

        let success = summary.failed == 0;
        Ok(ClaimOutcome {
            success,
            error: (!success).then_some(ErrorCode::PartialFailure),
            success_msgs,
            fail_msgs,
            summary,
        })
    }

    async fn replay_record(
        &self,
        community_id: &str,
        tenant_id: Option<&str>,
        claimant_id: &str,
        destination: &str,
        record: &EscrowRecord,
    ) -> Result<String, WalletError> {
        let (selector, amount) = if record.is_nft {
            let token_id = record
                .token_id
                .as_deref()
                .and_then(|t| t.parse::<u128>().ok())
                .ok_or_else(|| {
                    WalletError::Internal(format!("escrow {} has no valid token id", record.id))
                })?;
            (
                AssetSelector::Nft {
                    collection: record.asset.clone(),
                    token_id,
                },
                PayoutAmount::All,
            )
        } else {
            let value = record.amount.parse().map_err(|_| {
                WalletError::Internal(format!("escrow {} has a bad amount", record.id))
            })?;
            (
                AssetSelector::One(record.asset.clone()),
                PayoutAmount::Exact(value),
            )
        };

        let outcome = self
            .engine
            .payout(
                community_id,
                tenant_id,
                claimant_id,
                destination,
                &selector,
                amount,
                true,
            )
            .await?;

        match outcome.txs.into_iter().next() {
            Some(leg) if outcome.success => Ok(leg.tx_hash),
            _ => {
                let detail = outcome
                    .failures
                    .first()
                    .map(|f| f.error.clone())
                    .unwrap_or_else(|| "transfer failed".to_string());
                Err(WalletError::Network(detail))
            }
        }
    }
}
