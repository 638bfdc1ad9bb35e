//! Per-address nonce allocation.
//!
//! The node is asked for the pending transaction count once per address;
//! after that, consecutive nonces are handed out locally so a batch can be
//! numbered before any submission. A failed submission invalidates the
//! address so the next reservation refetches from the node.

use dashmap::DashMap;
use std::sync::Arc;

use crate::chain::{ChainClient, ChainError};

pub struct NonceAllocator {
    chain: Arc<dyn ChainClient>,
    next: DashMap<String, u64>,
}

impl NonceAllocator {
    pub fn new(chain: Arc<dyn ChainClient>) -> Self {
        Self {
            chain,
            next: DashMap::new(),
        }
    }

    /// Reserve the next nonce for an address.
    pub async fn reserve(&self, address: &str) -> Result<u64, ChainError> {
        self.reserve_batch(address, 1).await
    }

    /// Reserve `count` consecutive nonces, returning the first.
    pub async fn reserve_batch(&self, address: &str, count: u64) -> Result<u64, ChainError> {
        let key = address.to_lowercase();
        if let Some(mut entry) = self.next.get_mut(&key) {
            let start = *entry;
            *entry += count;
            return Ok(start);
        }

        let start = self.chain.pending_nonce(&key).await?;
        // A concurrent fetch may have landed first; the entry wins
        let mut entry = self.next.entry(key).or_insert(start);
        let reserved = *entry;
        *entry += count;
        Ok(reserved)
    }

    /// Drop the local counter after a failed submission so the next
    /// reservation refetches the pending count.
    pub fn invalidate(&self, address: &str) {
        self.next.remove(&address.to_lowercase());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockChain;

    #[tokio::test]
    async fn test_consecutive_reservations() {
        let chain = Arc::new(MockChain::new());
        let allocator = NonceAllocator::new(chain);
        let addr = "0x3535353535353535353535353535353535353535";

        assert_eq!(allocator.reserve(addr).await.unwrap(), 0);
        assert_eq!(allocator.reserve(addr).await.unwrap(), 1);
        assert_eq!(allocator.reserve_batch(addr, 3).await.unwrap(), 2);
        assert_eq!(allocator.reserve(addr).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_invalidate_refetches() {
        let chain = Arc::new(MockChain::new());
        let allocator = NonceAllocator::new(chain);
        let addr = "0x3535353535353535353535353535353535353535";

        assert_eq!(allocator.reserve(addr).await.unwrap(), 0);
        assert_eq!(allocator.reserve(addr).await.unwrap(), 1);
        allocator.invalidate(addr);
        // Mock chain saw no sends, so the pending count is still 0
        assert_eq!(allocator.reserve(addr).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_addresses_are_independent() {
        let chain = Arc::new(MockChain::new());
        let allocator = NonceAllocator::new(chain);

        assert_eq!(allocator.reserve("0xAAAA").await.unwrap(), 0);
        assert_eq!(allocator.reserve("0xaaaa").await.unwrap(), 1);
        assert_eq!(allocator.reserve("0xbbbb").await.unwrap(), 0);
    }
}
