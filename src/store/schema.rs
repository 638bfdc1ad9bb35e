//! PostgreSQL schema, owned by the service.
//!
//! Tenant scoping: a NULL tenant_id means the community's default scope.
//! Scope comparisons therefore use IS NOT DISTINCT FROM so NULL matches
//! NULL.

use sqlx::PgPool;

use super::StoreError;

const CREATE_POOL_WALLETS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS pool_wallets_tb (
    id              BIGSERIAL PRIMARY KEY,
    community_id    TEXT NOT NULL,
    tenant_id       TEXT,
    address         TEXT NOT NULL,
    sealed_key      TEXT NOT NULL,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

// Partial unique indexes because UNIQUE treats NULLs as distinct
const CREATE_POOL_WALLETS_SCOPE_IDX: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS pool_wallets_scope_idx
    ON pool_wallets_tb (community_id, tenant_id) WHERE tenant_id IS NOT NULL
"#;

const CREATE_POOL_WALLETS_DEFAULT_SCOPE_IDX: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS pool_wallets_default_scope_idx
    ON pool_wallets_tb (community_id) WHERE tenant_id IS NULL
"#;

const CREATE_MEMBER_WALLETS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS member_wallets_tb (
    member_id       TEXT PRIMARY KEY,
    address         TEXT NOT NULL,
    sealed_key      TEXT NOT NULL,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const CREATE_PRIZE_ESCROWS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS prize_escrows_tb (
    id               BIGSERIAL PRIMARY KEY,
    community_id     TEXT NOT NULL,
    tenant_id        TEXT,
    recipient_id     TEXT NOT NULL,
    asset            TEXT NOT NULL,
    amount           TEXT NOT NULL,
    is_nft           BOOLEAN NOT NULL DEFAULT FALSE,
    contract_address TEXT,
    token_id         TEXT,
    claimed          BOOLEAN NOT NULL DEFAULT FALSE,
    metadata         TEXT,
    created_at       TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const CREATE_PRIZE_ESCROWS_SCOPE_IDX: &str = r#"
CREATE INDEX IF NOT EXISTS prize_escrows_scope_idx
    ON prize_escrows_tb (community_id, tenant_id, asset, claimed)
"#;

const CREATE_PRIZE_ESCROWS_RECIPIENT_IDX: &str = r#"
CREATE INDEX IF NOT EXISTS prize_escrows_recipient_idx
    ON prize_escrows_tb (recipient_id, claimed)
"#;

const CREATE_WITHDRAW_ATTEMPTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS withdraw_attempts_tb (
    id                  TEXT PRIMARY KEY,
    requester_id        TEXT NOT NULL,
    source_address      TEXT NOT NULL,
    destination_address TEXT NOT NULL,
    asset               TEXT,
    nft_collection      TEXT,
    nft_token_id        TEXT,
    requested_amount    TEXT NOT NULL,
    fee_native          TEXT NOT NULL,
    asset_price_usd     TEXT,
    native_price_usd    TEXT,
    status              SMALLINT NOT NULL,
    fee_tx_hash         TEXT,
    transfer_tx_hash    TEXT,
    last_error          TEXT,
    created_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at          TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const CREATE_WITHDRAW_ATTEMPTS_RESUME_IDX: &str = r#"
CREATE INDEX IF NOT EXISTS withdraw_attempts_resume_idx
    ON withdraw_attempts_tb (requester_id, status, created_at DESC)
"#;

const CREATE_TX_LOG_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS tx_log_tb (
    id          BIGSERIAL PRIMARY KEY,
    sender      TEXT NOT NULL,
    recipient   TEXT NOT NULL,
    asset       TEXT NOT NULL,
    amount      TEXT NOT NULL,
    tx_hash     TEXT NOT NULL,
    kind        TEXT NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

pub async fn ensure_schema(pool: &PgPool) -> Result<(), StoreError> {
    tracing::info!("Ensuring PostgreSQL schema...");

    for ddl in [
        CREATE_POOL_WALLETS_TABLE,
        CREATE_POOL_WALLETS_SCOPE_IDX,
        CREATE_POOL_WALLETS_DEFAULT_SCOPE_IDX,
        CREATE_MEMBER_WALLETS_TABLE,
        CREATE_PRIZE_ESCROWS_TABLE,
        CREATE_PRIZE_ESCROWS_SCOPE_IDX,
        CREATE_PRIZE_ESCROWS_RECIPIENT_IDX,
        CREATE_WITHDRAW_ATTEMPTS_TABLE,
        CREATE_WITHDRAW_ATTEMPTS_RESUME_IDX,
        CREATE_TX_LOG_TABLE,
    ] {
        sqlx::query(ddl).execute(pool).await?;
    }

    tracing::info!("PostgreSQL schema ready");
    Ok(())
}
