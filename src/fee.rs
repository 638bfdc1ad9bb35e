//! Withdrawal fee schedule.
//!
//! Two regimes: fungible withdrawals pay a percentage of the withdrawn
//! value (priced in USD, settled in native units), NFT withdrawals pay a
//! flat native fee. The rate is expressed in basis points so 2% is exact.

use rust_decimal::Decimal;

use crate::error::WalletError;
use crate::money;

pub const BPS_DENOMINATOR: u32 = 10_000;

#[derive(Debug, Clone)]
pub struct FeeSchedule {
    /// Percentage fee in basis points (200 = 2%)
    pub rate_bps: u32,
    /// Flat NFT fee in native units
    pub nft_flat_native: Decimal,
    /// Address the fee transfer is paid to
    pub recipient: String,
}

impl FeeSchedule {
    /// Percentage fee for a fungible withdrawal, in native units.
    ///
    /// fee_native = amount * asset_price_usd * rate / 10_000 / native_price_usd
    pub fn percentage_fee_native(
        &self,
        amount: Decimal,
        asset_price_usd: Decimal,
        native_price_usd: Decimal,
    ) -> Result<Decimal, WalletError> {
        if native_price_usd <= Decimal::ZERO {
            return Err(WalletError::PriceUnavailable("native".to_string()));
        }
        let usd_value = amount
            .checked_mul(asset_price_usd)
            .ok_or_else(|| WalletError::InvalidAmount("fee overflow".to_string()))?;
        let fee_usd = usd_value
            .checked_mul(Decimal::from(self.rate_bps))
            .ok_or_else(|| WalletError::InvalidAmount("fee overflow".to_string()))?
            / Decimal::from(BPS_DENOMINATOR);
        Ok(fee_usd / native_price_usd)
    }

    /// Flat NFT fee in native base units.
    pub fn nft_fee_units(&self, native_decimals: u32) -> Result<u128, WalletError> {
        Ok(money::decimal_to_units(self.nft_flat_native, native_decimals)?)
    }
}
