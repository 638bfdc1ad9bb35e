//! EVM chain access: balances, gas, and signed transfers.
//!
//! `ChainClient` is the seam between the engines and the node. The real
//! implementation speaks JSON-RPC; a scriptable mock backs the tests.

pub mod error;
#[cfg(feature = "mock-chain")]
pub mod mock;
pub mod rpc;
pub mod tx;

pub use error::ChainError;
#[cfg(feature = "mock-chain")]
pub use mock::MockChain;
pub use rpc::RpcChainClient;

use async_trait::async_trait;
use k256::ecdsa::SigningKey;

/// One transfer to execute on chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferCall {
    /// Plain value transfer of the chain currency
    Native { to: String, value: u128 },
    /// ERC-20 `transfer(to, amount)`
    Token {
        contract: String,
        to: String,
        amount: u128,
    },
    /// ERC-721 `transferFrom(from, to, tokenId)`
    Nft {
        contract: String,
        from: String,
        to: String,
        token_id: u128,
    },
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn native_balance(&self, address: &str) -> Result<u128, ChainError>;

    async fn token_balance(&self, contract: &str, owner: &str) -> Result<u128, ChainError>;

    /// Current owner address of an ERC-721 unit, lower-cased.
    async fn nft_owner(&self, contract: &str, token_id: u128) -> Result<String, ChainError>;

    async fn gas_price(&self) -> Result<u128, ChainError>;

    async fn estimate_gas(&self, from: &str, call: &TransferCall) -> Result<u128, ChainError>;

    /// Pending-inclusive transaction count, the next usable nonce.
    async fn pending_nonce(&self, address: &str) -> Result<u64, ChainError>;

    /// Sign, submit and wait for one confirmation. Returns the tx hash.
    async fn send(
        &self,
        key: &SigningKey,
        call: &TransferCall,
        nonce: u64,
        gas_price: u128,
        gas_limit: u128,
    ) -> Result<String, ChainError>;
}
