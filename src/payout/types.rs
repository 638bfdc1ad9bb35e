//! Payout request and outcome types.

use rust_decimal::Decimal;

use crate::error::ErrorCode;

/// What to pay out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetSelector {
    /// One fungible asset by ticker
    One(String),
    /// Every registry token except the native asset
    AllFungible,
    /// One NFT unit
    Nft { collection: String, token_id: u128 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutAmount {
    /// The full usable balance per asset
    All,
    /// A fixed amount applied to each selected asset
    Exact(Decimal),
}

#[derive(Debug, Clone)]
pub struct LegSuccess {
    pub asset: String,
    /// Human decimal amount, or the token id for NFT legs
    pub amount: String,
    pub tx_hash: String,
}

#[derive(Debug, Clone)]
pub struct LegFailure {
    pub asset: String,
    pub amount: String,
    pub error: String,
    /// Id of the escrow row created as fallback, when one was
    pub escrow_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PayoutSummary {
    pub successful: usize,
    pub failed: usize,
    pub escrowed: usize,
}

/// Full breakdown of one payout call. `success` is true iff no leg failed.
#[derive(Debug, Clone)]
pub struct PayoutOutcome {
    pub success: bool,
    pub error: Option<ErrorCode>,
    pub txs: Vec<LegSuccess>,
    pub failures: Vec<LegFailure>,
    pub summary: PayoutSummary,
}

impl PayoutOutcome {
    pub fn all_ok(txs: Vec<LegSuccess>) -> Self {
        let summary = PayoutSummary {
            successful: txs.len(),
            failed: 0,
            escrowed: 0,
        };
        Self {
            success: true,
            error: None,
            txs,
            failures: Vec::new(),
            summary,
        }
    }
}

/// Result of replaying a claimant's escrow records.
#[derive(Debug, Clone)]
pub struct ClaimOutcome {
    pub success: bool,
    pub error: Option<ErrorCode>,
    pub success_msgs: Vec<String>,
    pub fail_msgs: Vec<String>,
    pub summary: PayoutSummary,
}
