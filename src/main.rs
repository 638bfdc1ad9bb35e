//! TipVault service daemon.
//!
//! Wires the full stack (chain client, price resolver, PostgreSQL stores,
//! payout and withdrawal engines) and runs the background conservation
//! audit until interrupted. The interactive surface (bot or HTTP layer)
//! embeds the library crate; this binary is the operational worker.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use tipvault::accounting::Accounting;
use tipvault::assets::AssetRegistry;
use tipvault::audit::ConservationAudit;
use tipvault::chain::{ChainClient, RpcChainClient};
use tipvault::config::AppConfig;
use tipvault::fee::FeeSchedule;
use tipvault::keys::{KeyCipher, PassthroughCipher};
use tipvault::logging::init_logging;
use tipvault::nonce::NonceAllocator;
use tipvault::payout::{ClaimResolver, PayoutEngine};
use tipvault::price::PriceResolver;
use tipvault::store::escrow::PgEscrowStore;
use tipvault::store::schema::ensure_schema;
use tipvault::store::txlog::PgTxLog;
use tipvault::store::wallets::PgWalletStore;
use tipvault::store::withdraw::PgWithdrawStore;
use tipvault::withdraw::WithdrawEngine;

/// CoinGecko platform id for the fallback price source.
const COINGECKO_PLATFORM: &str = "avalanche";

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env);
    let _guard = init_logging(&config);
    info!(env = %env, "tipvault starting");

    let registry = Arc::new(AssetRegistry::from_config(&config.registry)?);

    let postgres_url = config
        .postgres_url
        .clone()
        .unwrap_or_else(|| panic!("config {}.yaml has no postgres_url", env));
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&postgres_url)
        .await?;
    ensure_schema(&pool).await?;
    info!("database schema ready");

    let chain: Arc<dyn ChainClient> = Arc::new(RpcChainClient::new(&config.chain)?);
    let prices = Arc::new(PriceResolver::from_config(
        &config.price,
        COINGECKO_PLATFORM.to_string(),
    )?);

    let wallets = Arc::new(PgWalletStore::new(pool.clone()));
    let escrow = Arc::new(PgEscrowStore::new(pool.clone()));
    let withdraws = Arc::new(PgWithdrawStore::new(pool.clone()));
    let txlog = Arc::new(PgTxLog::new(pool));

    // The key cipher is injected; the bundled identity cipher is for
    // local operation only (the binary requires the mock-chain feature)
    let cipher: Arc<dyn KeyCipher> = Arc::new(PassthroughCipher);
    let nonces = Arc::new(NonceAllocator::new(chain.clone()));
    let accounting = Arc::new(Accounting::new(
        chain.clone(),
        escrow.clone(),
        registry.clone(),
    ));

    let fees = FeeSchedule {
        rate_bps: config.fees.withdraw_rate_bps,
        nft_flat_native: Decimal::from_str(&config.fees.nft_flat_fee)
            .unwrap_or_else(|_| panic!("bad nft_flat_fee: {}", config.fees.nft_flat_fee)),
        recipient: config.fees.fee_recipient.clone(),
    };

    let payouts = Arc::new(PayoutEngine::new(
        wallets.clone(),
        escrow.clone(),
        chain.clone(),
        registry.clone(),
        accounting.clone(),
        cipher.clone(),
        nonces.clone(),
        txlog.clone(),
        Duration::from_millis(config.fanout_delay_ms),
    ));
    let _claims = ClaimResolver::new(payouts.clone(), escrow.clone(), wallets.clone());
    let _withdrawals = WithdrawEngine::new(
        withdraws,
        wallets.clone(),
        chain.clone(),
        registry.clone(),
        prices,
        fees,
        cipher,
        nonces,
        txlog,
    );
    info!("engines wired");

    if config.audit.enabled {
        let audit = ConservationAudit::new(
            accounting,
            escrow,
            wallets,
            registry,
            Duration::from_secs(config.audit.interval_secs),
        );
        tokio::spawn(audit.run());
    }

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    Ok(())
}
