//! Withdrawal attempt states.
//!
//! State ids are persisted as SMALLINT. Gaps between ids leave room for
//! intermediate states; negative ids are failures.
//!
//! ```text
//! Pending (0) ──fee tx ok──> FeeCollectedPendingTransfer (10) ──principal ok──> Completed (40)
//!     │                                   │
//!     └──fee tx failed──> FeeCollectionFailed (-10)   (principal failure stays at 10, resumable)
//! ```

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawStatus {
    /// Created, no fee charged yet
    Pending,
    /// Fee leg confirmed; principal not yet transferred. Resumable.
    FeeCollectedPendingTransfer,
    /// Principal transferred, terminal
    Completed,
    /// Fee leg failed; nothing was charged. Terminal.
    FeeCollectionFailed,
}

impl WithdrawStatus {
    pub fn id(&self) -> i16 {
        match self {
            WithdrawStatus::Pending => 0,
            WithdrawStatus::FeeCollectedPendingTransfer => 10,
            WithdrawStatus::Completed => 40,
            WithdrawStatus::FeeCollectionFailed => -10,
        }
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(WithdrawStatus::Pending),
            10 => Some(WithdrawStatus::FeeCollectedPendingTransfer),
            40 => Some(WithdrawStatus::Completed),
            -10 => Some(WithdrawStatus::FeeCollectionFailed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WithdrawStatus::Completed | WithdrawStatus::FeeCollectionFailed
        )
    }
}

impl std::fmt::Display for WithdrawStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WithdrawStatus::Pending => "pending",
            WithdrawStatus::FeeCollectedPendingTransfer => "fee_collected_pending_transfer",
            WithdrawStatus::Completed => "completed",
            WithdrawStatus::FeeCollectionFailed => "fee_collection_failed",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_round_trip() {
        for status in [
            WithdrawStatus::Pending,
            WithdrawStatus::FeeCollectedPendingTransfer,
            WithdrawStatus::Completed,
            WithdrawStatus::FeeCollectionFailed,
        ] {
            assert_eq!(WithdrawStatus::from_id(status.id()), Some(status));
        }
        assert_eq!(WithdrawStatus::from_id(99), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!WithdrawStatus::Pending.is_terminal());
        assert!(!WithdrawStatus::FeeCollectedPendingTransfer.is_terminal());
        assert!(WithdrawStatus::Completed.is_terminal());
        assert!(WithdrawStatus::FeeCollectionFailed.is_terminal());
    }
}
