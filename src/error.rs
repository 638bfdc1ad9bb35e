//! Service-level error taxonomy.
//!
//! Every failure that can reach a client maps to a stable SCREAMING_SNAKE
//! code so the calling layer can shape `{success, error}` responses without
//! inspecting error internals. Transport and node errors are converted at
//! the component boundary; raw chain errors never escape.

use thiserror::Error;

use crate::assets::AssetError;
use crate::chain::ChainError;
use crate::keys::KeyError;
use crate::money::MoneyError;
use crate::price::PriceError;
use crate::store::StoreError;

/// Stable error codes for client responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NoWallet,
    UnknownAsset,
    UnknownCollection,
    InsufficientBalance,
    InsufficientFunds,
    InsufficientGas,
    NetworkError,
    PriceUnavailable,
    NotOwner,
    PayoutFailure,
    PartialFailure,
    NoEscrow,
    NoEligibleAssets,
    WalletAlreadyExists,
    InvalidAmount,
    ServerError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NoWallet => "NO_WALLET",
            ErrorCode::UnknownAsset => "UNKNOWN_TOKEN",
            ErrorCode::UnknownCollection => "UNKNOWN_NFT_COLLECTION",
            ErrorCode::InsufficientBalance => "INSUFFICIENT_BALANCE",
            ErrorCode::InsufficientFunds => "INSUFFICIENT_FUNDS",
            ErrorCode::InsufficientGas => "INSUFFICIENT_GAS",
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::PriceUnavailable => "PRICE_UNAVAILABLE",
            ErrorCode::NotOwner => "NOT_OWNER",
            ErrorCode::PayoutFailure => "PAYOUT_FAILURE",
            ErrorCode::PartialFailure => "PARTIAL_FAILURE",
            ErrorCode::NoEscrow => "NO_ESCROW",
            ErrorCode::NoEligibleAssets => "NO_ELIGIBLE_TOKENS",
            ErrorCode::WalletAlreadyExists => "WALLET_ALREADY_EXISTS",
            ErrorCode::InvalidAmount => "INVALID_AMOUNT",
            ErrorCode::ServerError => "SERVER_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Top-level error for wallet operations.
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("wallet not found")]
    NoWallet,

    #[error("unknown asset: {0}")]
    UnknownAsset(String),

    #[error("unknown NFT collection: {0}")]
    UnknownCollection(String),

    #[error("insufficient asset balance")]
    InsufficientBalance,

    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("insufficient native balance for gas")]
    InsufficientGas,

    #[error("network error: {0}")]
    Network(String),

    #[error("no price available for {0}")]
    PriceUnavailable(String),

    #[error("wallet does not own the unit")]
    NotOwner,

    #[error("no outstanding escrow records")]
    NoEscrow,

    #[error("no eligible assets")]
    NoEligibleAssets,

    #[error("wallet already exists")]
    WalletAlreadyExists,

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl WalletError {
    pub fn code(&self) -> ErrorCode {
        match self {
            WalletError::NoWallet => ErrorCode::NoWallet,
            WalletError::UnknownAsset(_) => ErrorCode::UnknownAsset,
            WalletError::UnknownCollection(_) => ErrorCode::UnknownCollection,
            WalletError::InsufficientBalance => ErrorCode::InsufficientBalance,
            WalletError::InsufficientFunds => ErrorCode::InsufficientFunds,
            WalletError::InsufficientGas => ErrorCode::InsufficientGas,
            WalletError::Network(_) => ErrorCode::NetworkError,
            WalletError::PriceUnavailable(_) => ErrorCode::PriceUnavailable,
            WalletError::NotOwner => ErrorCode::NotOwner,
            WalletError::NoEscrow => ErrorCode::NoEscrow,
            WalletError::NoEligibleAssets => ErrorCode::NoEligibleAssets,
            WalletError::WalletAlreadyExists => ErrorCode::WalletAlreadyExists,
            WalletError::InvalidAmount(_) => ErrorCode::InvalidAmount,
            WalletError::Store(_) | WalletError::Key(_) | WalletError::Internal(_) => {
                ErrorCode::ServerError
            }
        }
    }
}

impl From<AssetError> for WalletError {
    fn from(e: AssetError) -> Self {
        match e {
            AssetError::UnknownAsset(ticker) => WalletError::UnknownAsset(ticker),
            AssetError::UnknownCollection(ticker) => WalletError::UnknownCollection(ticker),
            other => WalletError::Internal(other.to_string()),
        }
    }
}

impl From<ChainError> for WalletError {
    fn from(e: ChainError) -> Self {
        WalletError::Network(e.to_string())
    }
}

impl From<PriceError> for WalletError {
    fn from(e: PriceError) -> Self {
        match e {
            PriceError::Unavailable(asset) => WalletError::PriceUnavailable(asset),
            other => WalletError::PriceUnavailable(other.to_string()),
        }
    }
}

impl From<MoneyError> for WalletError {
    fn from(e: MoneyError) -> Self {
        WalletError::InvalidAmount(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_stable() {
        assert_eq!(ErrorCode::NoWallet.as_str(), "NO_WALLET");
        assert_eq!(ErrorCode::UnknownAsset.as_str(), "UNKNOWN_TOKEN");
        assert_eq!(ErrorCode::PayoutFailure.as_str(), "PAYOUT_FAILURE");
        assert_eq!(ErrorCode::PartialFailure.as_str(), "PARTIAL_FAILURE");
        assert_eq!(ErrorCode::NoEligibleAssets.as_str(), "NO_ELIGIBLE_TOKENS");
    }

    #[test]
    fn test_chain_error_translated_to_network() {
        let e: WalletError = ChainError::Transport("connection refused".into()).into();
        assert_eq!(e.code(), ErrorCode::NetworkError);
    }
}
