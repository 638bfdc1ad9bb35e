//! Scriptable in-memory chain for tests and local development.
//!
//! Balances and NFT ownership are plain maps; `send` mutates them the way
//! a confirmed transfer would and records a journal entry. Individual
//! assets can be forced to fail to exercise the escrow fallback paths.

use async_trait::async_trait;
use k256::ecdsa::SigningKey;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use super::error::ChainError;
use super::{ChainClient, TransferCall};
use crate::keys::address_of;

#[derive(Debug, Clone)]
pub struct SentTx {
    pub from: String,
    pub call: TransferCall,
    pub nonce: u64,
    pub hash: String,
}

#[derive(Default)]
struct MockState {
    native: HashMap<String, u128>,
    /// (contract, owner) -> balance
    tokens: HashMap<(String, String), u128>,
    /// (contract, token id) -> owner
    nft_owners: HashMap<(String, u128), String>,
    /// Contract addresses (or "native") whose sends fail
    fail: HashSet<String>,
    sent: Vec<SentTx>,
    seq: u64,
}

pub struct MockChain {
    state: Mutex<MockState>,
    pub gas_price: u128,
    pub transfer_gas: u128,
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            gas_price: 25_000_000_000,
            transfer_gas: 21_000,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        // Held only for map access, never across awaits
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_native(&self, address: &str, balance: u128) {
        self.lock()
            .native
            .insert(address.to_lowercase(), balance);
    }

    pub fn set_token(&self, contract: &str, owner: &str, balance: u128) {
        self.lock()
            .tokens
            .insert((contract.to_lowercase(), owner.to_lowercase()), balance);
    }

    pub fn set_nft_owner(&self, contract: &str, token_id: u128, owner: &str) {
        self.lock()
            .nft_owners
            .insert((contract.to_lowercase(), token_id), owner.to_lowercase());
    }

    /// Force every send touching this contract (or "native") to fail.
    pub fn fail_asset(&self, contract_or_native: &str) {
        self.lock().fail.insert(contract_or_native.to_lowercase());
    }

    pub fn clear_failures(&self) {
        self.lock().fail.clear();
    }

    pub fn sent(&self) -> Vec<SentTx> {
        self.lock().sent.clone()
    }

    fn gas_cost(&self) -> u128 {
        self.gas_price * self.transfer_gas
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn native_balance(&self, address: &str) -> Result<u128, ChainError> {
        Ok(*self
            .lock()
            .native
            .get(&address.to_lowercase())
            .unwrap_or(&0))
    }

    async fn token_balance(&self, contract: &str, owner: &str) -> Result<u128, ChainError> {
        Ok(*self
            .lock()
            .tokens
            .get(&(contract.to_lowercase(), owner.to_lowercase()))
            .unwrap_or(&0))
    }

    async fn nft_owner(&self, contract: &str, token_id: u128) -> Result<String, ChainError> {
        self.lock()
            .nft_owners
            .get(&(contract.to_lowercase(), token_id))
            .cloned()
            .ok_or_else(|| ChainError::Rpc(format!("ownerOf reverted for token {}", token_id)))
    }

    async fn gas_price(&self) -> Result<u128, ChainError> {
        Ok(self.gas_price)
    }

    async fn estimate_gas(&self, _from: &str, _call: &TransferCall) -> Result<u128, ChainError> {
        Ok(self.transfer_gas)
    }

    async fn pending_nonce(&self, address: &str) -> Result<u64, ChainError> {
        let state = self.lock();
        let sender = address.to_lowercase();
        Ok(state
            .sent
            .iter()
            .filter(|tx| tx.from == sender)
            .count() as u64)
    }

    async fn send(
        &self,
        key: &SigningKey,
        call: &TransferCall,
        nonce: u64,
        _gas_price: u128,
        _gas_limit: u128,
    ) -> Result<String, ChainError> {
        let sender = address_of(key);
        let gas_cost = self.gas_cost();
        let mut state = self.lock();

        match call {
            TransferCall::Native { to, value } => {
                if state.fail.contains("native") {
                    return Err(ChainError::TxRejected("forced native failure".to_string()));
                }
                let from_balance = *state.native.get(&sender).unwrap_or(&0);
                let needed = value
                    .checked_add(gas_cost)
                    .ok_or_else(|| ChainError::TxRejected("value overflow".to_string()))?;
                if from_balance < needed {
                    return Err(ChainError::TxRejected(
                        "insufficient funds for gas * price + value".to_string(),
                    ));
                }
                state.native.insert(sender.clone(), from_balance - needed);
                let dest = to.to_lowercase();
                let dest_balance = *state.native.get(&dest).unwrap_or(&0);
                state.native.insert(dest, dest_balance + value);
            }
            TransferCall::Token {
                contract,
                to,
                amount,
            } => {
                let contract = contract.to_lowercase();
                if state.fail.contains(&contract) {
                    return Err(ChainError::TxRejected(format!(
                        "forced failure for {}",
                        contract
                    )));
                }
                let from_balance = *state.native.get(&sender).unwrap_or(&0);
                if from_balance < gas_cost {
                    return Err(ChainError::TxRejected("insufficient gas funds".to_string()));
                }
                let token_balance = *state
                    .tokens
                    .get(&(contract.clone(), sender.clone()))
                    .unwrap_or(&0);
                if token_balance < *amount {
                    return Err(ChainError::TxRejected("ERC20 transfer reverted".to_string()));
                }
                state
                    .native
                    .insert(sender.clone(), from_balance - gas_cost);
                state
                    .tokens
                    .insert((contract.clone(), sender.clone()), token_balance - amount);
                let dest = to.to_lowercase();
                let dest_balance = *state.tokens.get(&(contract.clone(), dest.clone())).unwrap_or(&0);
                state.tokens.insert((contract, dest), dest_balance + amount);
            }
            TransferCall::Nft {
                contract,
                from,
                to,
                token_id,
            } => {
                let contract = contract.to_lowercase();
                if state.fail.contains(&contract) {
                    return Err(ChainError::TxRejected(format!(
                        "forced failure for {}",
                        contract
                    )));
                }
                let from_balance = *state.native.get(&sender).unwrap_or(&0);
                if from_balance < gas_cost {
                    return Err(ChainError::TxRejected("insufficient gas funds".to_string()));
                }
                let owner = state
                    .nft_owners
                    .get(&(contract.clone(), *token_id))
                    .cloned();
                if owner.as_deref() != Some(&from.to_lowercase()) {
                    return Err(ChainError::TxRejected(
                        "ERC721 transferFrom reverted: not owner".to_string(),
                    ));
                }
                state.native.insert(sender.clone(), from_balance - gas_cost);
                state
                    .nft_owners
                    .insert((contract, *token_id), to.to_lowercase());
            }
        }

        state.seq += 1;
        let hash = format!("0xmock{:08x}", state.seq);
        state.sent.push(SentTx {
            from: sender,
            call: call.clone(),
            nonce,
            hash: hash.clone(),
        });
        Ok(hash)
    }
}
