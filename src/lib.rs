//! TipVault - Custodial community wallet core
//!
//! Pool wallets hold community prize funds on an EVM chain; members get
//! custodial wallets of their own. Payouts go out one transfer per asset
//! leg, failed legs become escrow reservations, and withdrawals collect a
//! USD-pegged fee in the native asset before the principal moves.
//!
//! # Modules
//!
//! - [`assets`] - Config-driven asset and NFT collection registry
//! - [`money`] - Base-unit amount parsing and formatting
//! - [`keys`] - Keypair generation and key sealing
//! - [`chain`] - Chain client trait, JSON-RPC client, tx signing
//! - [`price`] - USD price resolution with a TTL cache
//! - [`fee`] - Withdrawal fee schedule
//! - [`store`] - PostgreSQL persistence (wallets, escrow, withdrawals)
//! - [`accounting`] - On-chain balances minus escrow reservations
//! - [`payout`] - Payout engine, donations, fan-out, escrow claims
//! - [`withdraw`] - Two-leg withdrawal protocol with resumable attempts
//! - [`audit`] - Periodic conservation audit

pub mod config;
pub mod error;
pub mod logging;

pub mod assets;
pub mod keys;
pub mod money;

pub mod chain;
pub mod fee;
pub mod price;

pub mod store;

pub mod accounting;
pub mod audit;
pub mod locks;
pub mod nonce;
pub mod payout;
pub mod withdraw;

// Convenient re-exports at crate root
pub use accounting::{Accounting, AssetBalance};
pub use assets::{AssetInfo, AssetRegistry, NftCollection};
pub use audit::ConservationAudit;
pub use config::AppConfig;
pub use error::{ErrorCode, WalletError};
pub use fee::FeeSchedule;
pub use payout::{AssetSelector, ClaimResolver, PayoutAmount, PayoutEngine, PayoutOutcome};
pub use price::PriceResolver;
pub use withdraw::{WithdrawEngine, WithdrawOutcome, WithdrawRequest, WithdrawTarget};
