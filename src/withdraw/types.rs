//! Withdrawal request, record and outcome types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use ulid::Ulid;

use super::state::WithdrawStatus;

/// Unique withdrawal attempt id (ULID: sortable, collision-free)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttemptId(pub Ulid);

impl AttemptId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for AttemptId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AttemptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for AttemptId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// What is being withdrawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WithdrawTarget {
    Fungible { asset: String },
    Nft { collection: String, token_id: u128 },
}

#[derive(Debug, Clone)]
pub struct WithdrawRequest {
    pub requester_id: String,
    pub destination: String,
    pub target: WithdrawTarget,
    /// Required for fungible targets; ignored for NFTs
    pub amount: Option<Decimal>,
    /// Caller consent to resume a paid-for attempt with a smaller amount
    pub confirm_reduction: bool,
}

/// Persisted withdrawal attempt.
#[derive(Debug, Clone)]
pub struct WithdrawAttempt {
    pub id: AttemptId,
    pub requester_id: String,
    pub source_address: String,
    pub destination_address: String,
    /// Ticker for fungible withdrawals
    pub asset: Option<String>,
    pub nft_collection: Option<String>,
    pub nft_token_id: Option<String>,
    /// Human decimal string; "1" for NFTs
    pub requested_amount: String,
    /// Total fee charged so far, native units as a decimal string
    pub fee_native: String,
    /// Price snapshots at fee time; None for NFT attempts
    pub asset_price_usd: Option<Decimal>,
    pub native_price_usd: Option<Decimal>,
    pub status: WithdrawStatus,
    pub fee_tx_hash: Option<String>,
    pub transfer_tx_hash: Option<String>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What the caller gets back from a withdrawal entry.
#[derive(Debug, Clone)]
pub enum WithdrawOutcome {
    Completed {
        attempt_id: AttemptId,
        amount: Decimal,
        fee_native: Decimal,
        fee_tx_hash: Option<String>,
        transfer_tx_hash: String,
    },
    /// Fee was collected (now or earlier) but the principal leg failed.
    /// The attempt stays resumable; the fee is never re-charged.
    TransferFailedFeeRetained {
        attempt_id: AttemptId,
        fee_native: Decimal,
        fee_tx_hash: Option<String>,
        error: String,
    },
    /// A resumable attempt exists for a larger amount; the caller must
    /// confirm before withdrawing less than was paid for.
    ReductionNeedsConfirmation {
        attempt_id: AttemptId,
        paid_for_amount: Decimal,
        requested_amount: Decimal,
    },
}
