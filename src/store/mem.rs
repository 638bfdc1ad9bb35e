//! In-memory store implementations for tests and local development.
//!
//! Semantics mirror the PostgreSQL stores exactly, including the CAS
//! behavior of claim flips and status transitions.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Mutex;

use super::StoreError;
use super::escrow::{EscrowRecord, EscrowStore, NewEscrow};
use super::txlog::{TxLog, TxLogEntry};
use super::wallets::{MemberWallet, PoolWallet, WalletStore};
use super::withdraw::WithdrawStore;
use crate::withdraw::state::WithdrawStatus;
use crate::withdraw::types::{AttemptId, WithdrawAttempt};

#[derive(Default)]
pub struct MemEscrowStore {
    records: Mutex<Vec<EscrowRecord>>,
    next_id: Mutex<i64>,
}

impl MemEscrowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<EscrowRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl EscrowStore for MemEscrowStore {
    async fn create(&self, escrow: NewEscrow) -> Result<i64, StoreError> {
        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;
        let id = *next_id;
        self.records.lock().unwrap().push(EscrowRecord {
            id,
            community_id: escrow.community_id,
            tenant_id: escrow.tenant_id,
            recipient_id: escrow.recipient_id,
            asset: escrow.asset,
            amount: escrow.amount,
            is_nft: escrow.is_nft,
            contract_address: escrow.contract_address,
            token_id: escrow.token_id,
            claimed: false,
            metadata: escrow.metadata,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn unclaimed_for_asset(
        &self,
        community_id: &str,
        tenant_id: Option<&str>,
        asset: &str,
    ) -> Result<Vec<EscrowRecord>, StoreError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| {
                !r.claimed
                    && r.community_id == community_id
                    && r.tenant_id.as_deref() == tenant_id
                    && r.asset == asset
            })
            .cloned()
            .collect())
    }

    async fn unclaimed_for_recipient(
        &self,
        community_id: &str,
        tenant_id: Option<&str>,
        recipient_id: &str,
    ) -> Result<Vec<EscrowRecord>, StoreError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| {
                !r.claimed
                    && r.community_id == community_id
                    && r.tenant_id.as_deref() == tenant_id
                    && r.recipient_id == recipient_id
            })
            .cloned()
            .collect())
    }

    async fn mark_claimed(&self, id: i64) -> Result<bool, StoreError> {
        let mut records = self.records.lock().unwrap();
        match records.iter_mut().find(|r| r.id == id && !r.claimed) {
            Some(record) => {
                record.claimed = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn reserved_groups(
        &self,
    ) -> Result<Vec<(String, Option<String>, String)>, StoreError> {
        let mut groups: Vec<(String, Option<String>, String)> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| !r.claimed)
            .map(|r| (r.community_id.clone(), r.tenant_id.clone(), r.asset.clone()))
            .collect();
        groups.sort();
        groups.dedup();
        Ok(groups)
    }
}

#[derive(Default)]
pub struct MemWithdrawStore {
    attempts: Mutex<Vec<WithdrawAttempt>>,
}

impl MemWithdrawStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WithdrawStore for MemWithdrawStore {
    async fn insert(&self, attempt: &WithdrawAttempt) -> Result<(), StoreError> {
        self.attempts.lock().unwrap().push(attempt.clone());
        Ok(())
    }

    async fn get(&self, id: AttemptId) -> Result<Option<WithdrawAttempt>, StoreError> {
        Ok(self
            .attempts
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id == id)
            .cloned())
    }

    async fn find_resumable_fungible(
        &self,
        requester_id: &str,
        asset: &str,
    ) -> Result<Option<WithdrawAttempt>, StoreError> {
        Ok(self
            .attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| {
                a.requester_id == requester_id
                    && a.asset.as_deref() == Some(asset)
                    && a.status == WithdrawStatus::FeeCollectedPendingTransfer
            })
            .max_by_key(|a| a.created_at)
            .cloned())
    }

    async fn find_resumable_nft(
        &self,
        requester_id: &str,
        collection: &str,
        token_id: &str,
    ) -> Result<Option<WithdrawAttempt>, StoreError> {
        Ok(self
            .attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| {
                a.requester_id == requester_id
                    && a.nft_collection.as_deref() == Some(collection)
                    && a.nft_token_id.as_deref() == Some(token_id)
                    && a.status == WithdrawStatus::FeeCollectedPendingTransfer
            })
            .max_by_key(|a| a.created_at)
            .cloned())
    }

    async fn record_fee_collected(
        &self,
        id: AttemptId,
        fee_tx_hash: &str,
    ) -> Result<bool, StoreError> {
        let mut attempts = self.attempts.lock().unwrap();
        match attempts
            .iter_mut()
            .find(|a| a.id == id && a.status == WithdrawStatus::Pending)
        {
            Some(attempt) => {
                attempt.status = WithdrawStatus::FeeCollectedPendingTransfer;
                attempt.fee_tx_hash = Some(fee_tx_hash.to_string());
                attempt.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record_fee_failure(&self, id: AttemptId, error: &str) -> Result<bool, StoreError> {
        let mut attempts = self.attempts.lock().unwrap();
        match attempts
            .iter_mut()
            .find(|a| a.id == id && a.status == WithdrawStatus::Pending)
        {
            Some(attempt) => {
                attempt.status = WithdrawStatus::FeeCollectionFailed;
                attempt.last_error = Some(error.to_string());
                attempt.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record_completed(&self, id: AttemptId, tx_hash: &str) -> Result<bool, StoreError> {
        let mut attempts = self.attempts.lock().unwrap();
        match attempts
            .iter_mut()
            .find(|a| a.id == id && a.status == WithdrawStatus::FeeCollectedPendingTransfer)
        {
            Some(attempt) => {
                attempt.status = WithdrawStatus::Completed;
                attempt.transfer_tx_hash = Some(tx_hash.to_string());
                attempt.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record_transfer_failure(&self, id: AttemptId, error: &str) -> Result<(), StoreError> {
        let mut attempts = self.attempts.lock().unwrap();
        if let Some(attempt) = attempts.iter_mut().find(|a| a.id == id) {
            attempt.last_error = Some(error.to_string());
            attempt.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn apply_revision(
        &self,
        id: AttemptId,
        requested_amount: &str,
        destination: &str,
        total_fee_native: &str,
        fee_tx_hash: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut attempts = self.attempts.lock().unwrap();
        if let Some(attempt) = attempts.iter_mut().find(|a| a.id == id) {
            attempt.requested_amount = requested_amount.to_string();
            attempt.destination_address = destination.to_string();
            attempt.fee_native = total_fee_native.to_string();
            if let Some(hash) = fee_tx_hash {
                attempt.fee_tx_hash = Some(hash.to_string());
            }
            attempt.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemWalletStore {
    pools: Mutex<Vec<PoolWallet>>,
    members: Mutex<Vec<MemberWallet>>,
}

impl MemWalletStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WalletStore for MemWalletStore {
    async fn get_pool(
        &self,
        community_id: &str,
        tenant_id: Option<&str>,
    ) -> Result<Option<PoolWallet>, StoreError> {
        Ok(self
            .pools
            .lock()
            .unwrap()
            .iter()
            .find(|w| w.community_id == community_id && w.tenant_id.as_deref() == tenant_id)
            .cloned())
    }

    async fn insert_pool(&self, wallet: &PoolWallet) -> Result<bool, StoreError> {
        let mut pools = self.pools.lock().unwrap();
        if pools
            .iter()
            .any(|w| w.community_id == wallet.community_id && w.tenant_id == wallet.tenant_id)
        {
            return Ok(false);
        }
        pools.push(wallet.clone());
        Ok(true)
    }

    async fn replace_pool(&self, wallet: &PoolWallet) -> Result<(), StoreError> {
        let mut pools = self.pools.lock().unwrap();
        pools.retain(|w| {
            !(w.community_id == wallet.community_id && w.tenant_id == wallet.tenant_id)
        });
        pools.push(wallet.clone());
        Ok(())
    }

    async fn get_member(&self, member_id: &str) -> Result<Option<MemberWallet>, StoreError> {
        Ok(self
            .members
            .lock()
            .unwrap()
            .iter()
            .find(|w| w.member_id == member_id)
            .cloned())
    }

    async fn insert_member(&self, wallet: &MemberWallet) -> Result<bool, StoreError> {
        let mut members = self.members.lock().unwrap();
        if members.iter().any(|w| w.member_id == wallet.member_id) {
            return Ok(false);
        }
        members.push(wallet.clone());
        Ok(true)
    }
}

#[derive(Default)]
pub struct MemTxLog {
    entries: Mutex<Vec<TxLogEntry>>,
}

impl MemTxLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<TxLogEntry> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl TxLog for MemTxLog {
    async fn append(&self, entry: TxLogEntry) -> Result<(), StoreError> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }

    async fn recent(&self, limit: i64) -> Result<Vec<TxLogEntry>, StoreError> {
        let entries = self.entries.lock().unwrap();
        Ok(entries.iter().rev().take(limit as usize).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mem_escrow_claim_cas() {
        let store = MemEscrowStore::new();
        let id = store
            .create(NewEscrow {
                community_id: "guild-1".to_string(),
                tenant_id: None,
                recipient_id: "alice".to_string(),
                asset: "TOK".to_string(),
                amount: "5".to_string(),
                is_nft: false,
                contract_address: None,
                token_id: None,
                metadata: serde_json::Value::Null,
            })
            .await
            .unwrap();

        assert!(store.mark_claimed(id).await.unwrap());
        assert!(!store.mark_claimed(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_mem_resumable_picks_newest() {
        let store = MemWithdrawStore::new();
        let mut first = sample("alice");
        first.status = WithdrawStatus::FeeCollectedPendingTransfer;
        store.insert(&first).await.unwrap();

        let mut second = sample("alice");
        second.status = WithdrawStatus::FeeCollectedPendingTransfer;
        second.created_at = first.created_at + chrono::Duration::seconds(5);
        store.insert(&second).await.unwrap();

        let found = store
            .find_resumable_fungible("alice", "TOK")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, second.id);
    }

    fn sample(requester: &str) -> WithdrawAttempt {
        WithdrawAttempt {
            id: AttemptId::new(),
            requester_id: requester.to_string(),
            source_address: "0xsource".to_string(),
            destination_address: "0xdest".to_string(),
            asset: Some("TOK".to_string()),
            nft_collection: None,
            nft_token_id: None,
            requested_amount: "10".to_string(),
            fee_native: "0.02".to_string(),
            asset_price_usd: None,
            native_price_usd: None,
            status: WithdrawStatus::Pending,
            fee_tx_hash: None,
            transfer_tx_hash: None,
            last_error: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}
