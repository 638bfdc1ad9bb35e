//! Prize-pool payouts, donations, fan-out and escrow claims.

pub mod claim;
pub mod engine;
pub mod types;

pub use claim::ClaimResolver;
pub use engine::PayoutEngine;
pub use types::{
    AssetSelector, ClaimOutcome, LegFailure, LegSuccess, PayoutAmount, PayoutOutcome,
    PayoutSummary,
};
