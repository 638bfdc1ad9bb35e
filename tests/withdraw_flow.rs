//! End-to-end withdrawal protocol tests on the in-memory stack.
//!
//! Exercises the fee-then-principal protocol: percentage fees priced in
//! USD, fee retention across principal failures, delta-only recharges on
//! resume, and the flat NFT fee.

use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;

use tipvault::assets::{AssetEntry, AssetRegistry, NetworkAssets, NftEntry, RegistryConfig};
use tipvault::chain::{ChainClient, MockChain};
use tipvault::error::WalletError;
use tipvault::fee::FeeSchedule;
use tipvault::keys::PassthroughCipher;
use tipvault::money;
use tipvault::nonce::NonceAllocator;
use tipvault::price::{PriceCache, PriceResolver, StaticSource};
use tipvault::store::mem::{MemTxLog, MemWalletStore, MemWithdrawStore};
use tipvault::store::txlog::TxKind;
use tipvault::store::wallets::{MemberWallet, create_member_wallet};
use tipvault::store::withdraw::WithdrawStore;
use tipvault::withdraw::{
    AttemptId, WithdrawAttempt, WithdrawEngine, WithdrawOutcome, WithdrawRequest, WithdrawStatus,
    WithdrawTarget,
};

const TOK: &str = "0xaaaa00000000000000000000000000000000aaaa";
const ROCK: &str = "0xcccc00000000000000000000000000000000cccc";
const FEE_SINK: &str = "0xfee0000000000000000000000000000000000fee";
const DEST: &str = "0x3535353535353535353535353535353535353535";
const WAVAX: &str = "0xwavax";

struct Harness {
    chain: Arc<MockChain>,
    wallets: Arc<MemWalletStore>,
    store: Arc<MemWithdrawStore>,
    txlog: Arc<MemTxLog>,
    engine: WithdrawEngine,
}

fn registry() -> Arc<AssetRegistry> {
    let config = RegistryConfig {
        network: "testnet".to_string(),
        testnet: NetworkAssets {
            assets: vec![
                AssetEntry {
                    ticker: "AVAX".to_string(),
                    address: "native".to_string(),
                    decimals: 18,
                    price_ref: Some(WAVAX.to_string()),
                },
                AssetEntry {
                    ticker: "TOK".to_string(),
                    address: TOK.to_string(),
                    decimals: 18,
                    price_ref: None,
                },
            ],
            nfts: vec![NftEntry {
                ticker: "ROCK".to_string(),
                address: ROCK.to_string(),
                name: "Rocks".to_string(),
            }],
        },
        mainnet: NetworkAssets::default(),
    };
    Arc::new(AssetRegistry::from_config(&config).unwrap())
}

/// AVAX at $10, TOK at $1, 2% fee, 0.02 flat NFT fee.
fn harness() -> Harness {
    let chain = Arc::new(MockChain::new());
    let wallets = Arc::new(MemWalletStore::new());
    let store = Arc::new(MemWithdrawStore::new());
    let txlog = Arc::new(MemTxLog::new());
    let registry = registry();

    let prices = Arc::new(PriceResolver::new(
        PriceCache::new(std::time::Duration::from_secs(300)),
        Box::new(StaticSource::new([
            (WAVAX.to_string(), Decimal::from(10)),
            (TOK.to_string(), Decimal::ONE),
        ])),
        Box::new(StaticSource::new([])),
        WAVAX.to_string(),
    ));
    let fees = FeeSchedule {
        rate_bps: 200,
        nft_flat_native: Decimal::from_str("0.02").unwrap(),
        recipient: FEE_SINK.to_string(),
    };

    let engine = WithdrawEngine::new(
        store.clone(),
        wallets.clone(),
        chain.clone(),
        registry,
        prices,
        fees,
        Arc::new(PassthroughCipher),
        Arc::new(NonceAllocator::new(chain.clone())),
        txlog.clone(),
    );

    Harness {
        chain,
        wallets,
        store,
        txlog,
        engine,
    }
}

async fn funded_member(h: &Harness, id: &str, tok: &str, native: &str) -> MemberWallet {
    let member = create_member_wallet(&*h.wallets, &PassthroughCipher, id)
        .await
        .unwrap();
    h.chain
        .set_token(TOK, &member.address, money::parse_units(tok, 18).unwrap());
    h.chain
        .set_native(&member.address, money::parse_units(native, 18).unwrap());
    member
}

fn fungible_request(requester: &str, amount: &str) -> WithdrawRequest {
    WithdrawRequest {
        requester_id: requester.to_string(),
        destination: DEST.to_string(),
        target: WithdrawTarget::Fungible {
            asset: "TOK".to_string(),
        },
        amount: Some(Decimal::from_str(amount).unwrap()),
        confirm_reduction: false,
    }
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

#[tokio::test]
async fn test_percentage_fee_collected_then_principal_moves() {
    let h = harness();
    funded_member(&h, "alice", "100", "1").await;

    // 100 TOK at $1, native at $10: fee = 100 * 2% / 10 = 0.2 AVAX
    let outcome = h.engine.withdraw(fungible_request("alice", "100")).await.unwrap();
    match outcome {
        WithdrawOutcome::Completed {
            amount,
            fee_native,
            fee_tx_hash,
            ..
        } => {
            assert_eq!(amount, Decimal::from(100));
            assert_eq!(fee_native, dec("0.2"));
            assert!(fee_tx_hash.is_some());
        }
        other => panic!("expected completion, got {:?}", other),
    }

    assert_eq!(
        h.chain.native_balance(FEE_SINK).await.unwrap(),
        money::parse_units("0.2", 18).unwrap()
    );
    assert_eq!(
        h.chain.token_balance(TOK, DEST).await.unwrap(),
        money::parse_units("100", 18).unwrap()
    );

    let kinds: Vec<TxKind> = h.txlog.all().iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![TxKind::WithdrawFee, TxKind::Withdraw]);
}

#[tokio::test]
async fn test_failed_principal_retains_fee_and_resume_never_recharges() {
    let h = harness();
    funded_member(&h, "alice", "100", "1").await;
    h.chain.fail_asset(TOK);

    let outcome = h.engine.withdraw(fungible_request("alice", "10")).await.unwrap();
    match outcome {
        WithdrawOutcome::TransferFailedFeeRetained { fee_native, .. } => {
            assert_eq!(fee_native, dec("0.02"));
        }
        other => panic!("expected fee-retained failure, got {:?}", other),
    }
    let fee_after_failure = h.chain.native_balance(FEE_SINK).await.unwrap();
    assert_eq!(fee_after_failure, money::parse_units("0.02", 18).unwrap());

    // Retry with the same amount: the attempt resumes, no second fee
    h.chain.clear_failures();
    let outcome = h.engine.withdraw(fungible_request("alice", "10")).await.unwrap();
    match outcome {
        WithdrawOutcome::Completed {
            amount,
            fee_native,
            fee_tx_hash,
            ..
        } => {
            assert_eq!(amount, Decimal::from(10));
            assert_eq!(fee_native, dec("0.02"));
            // The original fee tx is carried through
            assert!(fee_tx_hash.is_some());
        }
        other => panic!("expected completion, got {:?}", other),
    }
    assert_eq!(h.chain.native_balance(FEE_SINK).await.unwrap(), fee_after_failure);
    assert_eq!(
        h.chain.token_balance(TOK, DEST).await.unwrap(),
        money::parse_units("10", 18).unwrap()
    );
}

#[tokio::test]
async fn test_larger_resume_charges_only_the_delta() {
    let h = harness();
    funded_member(&h, "alice", "100", "1").await;
    h.chain.fail_asset(TOK);
    h.engine.withdraw(fungible_request("alice", "10")).await.unwrap();
    h.chain.clear_failures();

    // 10 -> 15: only the 5 TOK increase is charged (0.01 AVAX)
    let outcome = h.engine.withdraw(fungible_request("alice", "15")).await.unwrap();
    match outcome {
        WithdrawOutcome::Completed {
            amount, fee_native, ..
        } => {
            assert_eq!(amount, Decimal::from(15));
            assert_eq!(fee_native, dec("0.03"));
        }
        other => panic!("expected completion, got {:?}", other),
    }
    assert_eq!(
        h.chain.native_balance(FEE_SINK).await.unwrap(),
        money::parse_units("0.03", 18).unwrap()
    );
    assert_eq!(
        h.chain.token_balance(TOK, DEST).await.unwrap(),
        money::parse_units("15", 18).unwrap()
    );
}

#[tokio::test]
async fn test_smaller_resume_requires_consent() {
    let h = harness();
    funded_member(&h, "alice", "100", "1").await;
    h.chain.fail_asset(TOK);
    h.engine.withdraw(fungible_request("alice", "10")).await.unwrap();
    h.chain.clear_failures();

    let outcome = h.engine.withdraw(fungible_request("alice", "5")).await.unwrap();
    match outcome {
        WithdrawOutcome::ReductionNeedsConfirmation {
            paid_for_amount,
            requested_amount,
            ..
        } => {
            assert_eq!(paid_for_amount, Decimal::from(10));
            assert_eq!(requested_amount, Decimal::from(5));
        }
        other => panic!("expected confirmation request, got {:?}", other),
    }
    // Nothing moved while waiting for consent
    assert_eq!(h.chain.token_balance(TOK, DEST).await.unwrap(), 0);

    let mut confirmed = fungible_request("alice", "5");
    confirmed.confirm_reduction = true;
    let outcome = h.engine.withdraw(confirmed).await.unwrap();
    match outcome {
        WithdrawOutcome::Completed {
            amount, fee_native, ..
        } => {
            assert_eq!(amount, Decimal::from(5));
            // The fee already paid for 10 stands; no refund, no recharge
            assert_eq!(fee_native, dec("0.02"));
        }
        other => panic!("expected completion, got {:?}", other),
    }
    assert_eq!(
        h.chain.native_balance(FEE_SINK).await.unwrap(),
        money::parse_units("0.02", 18).unwrap()
    );
}

#[tokio::test]
async fn test_fee_collection_failure_charges_nothing() {
    let h = harness();
    funded_member(&h, "alice", "100", "1").await;
    h.chain.fail_asset("native");

    let err = h
        .engine
        .withdraw(fungible_request("alice", "10"))
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::Network(_)));
    assert_eq!(h.chain.native_balance(FEE_SINK).await.unwrap(), 0);
    assert!(h.chain.sent().is_empty());
    assert!(h.txlog.all().is_empty());
}

#[tokio::test]
async fn test_balance_and_funding_preconditions() {
    let h = harness();
    funded_member(&h, "alice", "100", "1").await;

    let err = h
        .engine
        .withdraw(fungible_request("alice", "1000"))
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::InsufficientBalance));

    let mut no_amount = fungible_request("alice", "1");
    no_amount.amount = None;
    let err = h.engine.withdraw(no_amount).await.unwrap_err();
    assert!(matches!(err, WalletError::InvalidAmount(_)));

    let err = h
        .engine
        .withdraw(fungible_request("nobody", "1"))
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::NoWallet));

    // Token balance is fine but native funds cannot cover the fee leg
    let poor = create_member_wallet(&*h.wallets, &PassthroughCipher, "bob")
        .await
        .unwrap();
    h.chain
        .set_token(TOK, &poor.address, money::parse_units("100", 18).unwrap());
    h.chain.set_native(&poor.address, 1_000);
    let err = h
        .engine
        .withdraw(fungible_request("bob", "10"))
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::InsufficientGas));
}

#[tokio::test]
async fn test_nft_withdraw_pays_flat_fee() {
    let h = harness();
    let member = funded_member(&h, "alice", "0", "1").await;
    h.chain.set_nft_owner(ROCK, 7, &member.address);

    let request = WithdrawRequest {
        requester_id: "alice".to_string(),
        destination: DEST.to_string(),
        target: WithdrawTarget::Nft {
            collection: "ROCK".to_string(),
            token_id: 7,
        },
        amount: None,
        confirm_reduction: false,
    };
    let outcome = h.engine.withdraw(request).await.unwrap();
    match outcome {
        WithdrawOutcome::Completed {
            amount, fee_native, ..
        } => {
            assert_eq!(amount, Decimal::ONE);
            assert_eq!(fee_native, dec("0.02"));
        }
        other => panic!("expected completion, got {:?}", other),
    }
    assert_eq!(h.chain.nft_owner(ROCK, 7).await.unwrap(), DEST);
    assert_eq!(
        h.chain.native_balance(FEE_SINK).await.unwrap(),
        money::parse_units("0.02", 18).unwrap()
    );
}

#[tokio::test]
async fn test_nft_withdraw_rejects_non_owner() {
    let h = harness();
    funded_member(&h, "alice", "0", "1").await;
    h.chain
        .set_nft_owner(ROCK, 9, "0x9999999999999999999999999999999999999999");

    let request = WithdrawRequest {
        requester_id: "alice".to_string(),
        destination: DEST.to_string(),
        target: WithdrawTarget::Nft {
            collection: "ROCK".to_string(),
            token_id: 9,
        },
        amount: None,
        confirm_reduction: false,
    };
    let err = h.engine.withdraw(request).await.unwrap_err();
    assert!(matches!(err, WalletError::NotOwner));
    // Not even the fee is charged when ownership fails upfront
    assert_eq!(h.chain.native_balance(FEE_SINK).await.unwrap(), 0);
}

#[tokio::test]
async fn test_nft_resume_rejects_a_corrupt_stored_fee() {
    let h = harness();
    let member = funded_member(&h, "alice", "0", "1").await;
    h.chain.set_nft_owner(ROCK, 7, &member.address);

    // A resumable record whose fee field does not parse must surface an
    // error instead of substituting the flat fee
    let attempt = WithdrawAttempt {
        id: AttemptId::new(),
        requester_id: "alice".to_string(),
        source_address: member.address.clone(),
        destination_address: DEST.to_string(),
        asset: None,
        nft_collection: Some("ROCK".to_string()),
        nft_token_id: Some("7".to_string()),
        requested_amount: "1".to_string(),
        fee_native: "not-a-number".to_string(),
        asset_price_usd: None,
        native_price_usd: None,
        status: WithdrawStatus::FeeCollectedPendingTransfer,
        fee_tx_hash: Some("0xmock00000001".to_string()),
        transfer_tx_hash: None,
        last_error: None,
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    };
    h.store.insert(&attempt).await.unwrap();

    let request = WithdrawRequest {
        requester_id: "alice".to_string(),
        destination: DEST.to_string(),
        target: WithdrawTarget::Nft {
            collection: "ROCK".to_string(),
            token_id: 7,
        },
        amount: None,
        confirm_reduction: false,
    };
    let err = h.engine.withdraw(request).await.unwrap_err();
    assert!(matches!(err, WalletError::Internal(_)));

    // Nothing moved: no fee charged, the token stays with the member
    assert_eq!(h.chain.native_balance(FEE_SINK).await.unwrap(), 0);
    assert_eq!(h.chain.nft_owner(ROCK, 7).await.unwrap(), member.address);
    assert!(h.chain.sent().is_empty());
}
