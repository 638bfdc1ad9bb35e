//! Two-phase withdrawal protocol: collect the fee, then move the principal.
//!
//! A crash or transfer failure after the fee leg leaves a resumable record;
//! re-entry never charges the fee twice.

pub mod engine;
pub mod state;
pub mod types;

pub use engine::WithdrawEngine;
pub use state::WithdrawStatus;
pub use types::{
    AttemptId, WithdrawAttempt, WithdrawOutcome, WithdrawRequest, WithdrawTarget,
};
