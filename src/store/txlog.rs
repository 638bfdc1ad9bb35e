//! Transfer audit log.
//!
//! One row per successful on-chain transfer the service initiated.
//! Logging failures are swallowed by callers; an audit row must never
//! fail a transfer that already happened.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use super::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxKind {
    Payout,
    EscrowClaim,
    Donation,
    FanOut,
    WithdrawFee,
    Withdraw,
}

impl TxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxKind::Payout => "PAYOUT",
            TxKind::EscrowClaim => "ESCROW_CLAIM",
            TxKind::Donation => "DONATION",
            TxKind::FanOut => "FAN_OUT",
            TxKind::WithdrawFee => "WITHDRAW_FEE",
            TxKind::Withdraw => "WITHDRAW",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TxLogEntry {
    pub sender: String,
    pub recipient: String,
    pub asset: String,
    /// Human decimal amount, or the token id for NFT transfers
    pub amount: String,
    pub tx_hash: String,
    pub kind: TxKind,
}

#[async_trait]
pub trait TxLog: Send + Sync {
    async fn append(&self, entry: TxLogEntry) -> Result<(), StoreError>;

    async fn recent(&self, limit: i64) -> Result<Vec<TxLogEntry>, StoreError>;
}

pub struct PgTxLog {
    pool: PgPool,
}

impl PgTxLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TxLog for PgTxLog {
    async fn append(&self, entry: TxLogEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO tx_log_tb (sender, recipient, asset, amount, tx_hash, kind)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&entry.sender)
        .bind(&entry.recipient)
        .bind(&entry.asset)
        .bind(&entry.amount)
        .bind(&entry.tx_hash)
        .bind(entry.kind.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent(&self, limit: i64) -> Result<Vec<TxLogEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT sender, recipient, asset, amount, tx_hash, kind
            FROM tx_log_tb
            ORDER BY id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let kind_str: String = row.get("kind");
                let kind = match kind_str.as_str() {
                    "PAYOUT" => TxKind::Payout,
                    "ESCROW_CLAIM" => TxKind::EscrowClaim,
                    "DONATION" => TxKind::Donation,
                    "FAN_OUT" => TxKind::FanOut,
                    "WITHDRAW_FEE" => TxKind::WithdrawFee,
                    "WITHDRAW" => TxKind::Withdraw,
                    other => {
                        return Err(StoreError::Corrupt(format!("unknown tx kind: {}", other)));
                    }
                };
                Ok(TxLogEntry {
                    sender: row.get("sender"),
                    recipient: row.get("recipient"),
                    asset: row.get("asset"),
                    amount: row.get("amount"),
                    tx_hash: row.get("tx_hash"),
                    kind,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_strings() {
        assert_eq!(TxKind::Payout.as_str(), "PAYOUT");
        assert_eq!(TxKind::EscrowClaim.as_str(), "ESCROW_CLAIM");
        assert_eq!(TxKind::WithdrawFee.as_str(), "WITHDRAW_FEE");
    }
}
