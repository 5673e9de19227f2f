//! Property-based integration tests for the ledger.
//!
//! Random sequences of pocket creates, deletes and transfers are applied to
//! an in-memory bank; after every committed operation the account balance
//! must equal the pocket total plus safe-to-spend, and no pocket may go
//! negative.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pocketbook_core::cache::TtlCache;
use pocketbook_core::errors::{Error, GatewayError};
use futures::future::{FutureExt, LocalBoxFuture, TryFutureExt};
use pocketbook_core::ledger::{LedgerServiceTrait, NewPocket};
use pocketbook_core::sync::{BalanceDecision, ProviderKind, SyncServiceTrait};
use pocketbook_core::testing::Fixture;
use pocketbook_core::transfers::{TransferRequest, TransferServiceTrait};
use proptest::prelude::*;

// =============================================================================
// Generators
// =============================================================================

#[derive(Debug, Clone)]
enum Op {
    Create { funding: i64 },
    Delete { index: usize },
    Transfer { from: usize, to: usize, amount: i64 },
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0i64..40_000).prop_map(|funding| Op::Create { funding }),
        (0usize..8).prop_map(|index| Op::Delete { index }),
        (0usize..8, 0usize..8, -100i64..30_000).prop_map(|(from, to, amount)| Op::Transfer { from, to, amount }),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

/// Index 0 is the primary account; pockets follow in creation order.
async fn account_ids(fx: &Fixture) -> Vec<String> {
    let snapshot = fx.ledger.get_snapshot(true).await.unwrap();
    let mut ids = vec![snapshot.primary_id.clone()];
    ids.extend(snapshot.pockets.iter().map(|p| p.id.clone()));
    ids
}

async fn assert_invariant(fx: &Fixture) {
    let snapshot = fx.ledger.verify_invariant().await.unwrap();
    assert_eq!(
        snapshot.account_balance,
        snapshot.pocket_total + snapshot.safe_to_spend
    );
    assert!(snapshot.pockets.iter().all(|p| p.balance >= 0));
    assert!(snapshot.safe_to_spend >= 0);
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_invariant_holds_after_every_operation(
        start in 0i64..100_000,
        ops in proptest::collection::vec(arb_op(), 1..12),
    ) {
        runtime().block_on(async {
            let fx = Fixture::new(start);
            for (n, op) in ops.into_iter().enumerate() {
                let ids = account_ids(&fx).await;
                match op {
                    Op::Create { funding } => {
                        let _ = fx
                            .ledger
                            .create_pocket(NewPocket {
                                name: format!("Pocket {}", n),
                                initial_funding: funding,
                                ..Default::default()
                            })
                            .await;
                    }
                    Op::Delete { index } => {
                        if let Some(id) = ids.get(index) {
                            let _ = fx.ledger.delete_pocket(id).await;
                        }
                    }
                    Op::Transfer { from, to, amount } => {
                        let (Some(from_id), Some(to_id)) = (ids.get(from), ids.get(to)) else {
                            continue;
                        };
                        let _ = fx
                            .transfers
                            .transfer(TransferRequest {
                                from_id: from_id.clone(),
                                to_id: to_id.clone(),
                                amount,
                                note: None,
                            })
                            .await;
                    }
                }
                assert_invariant(&fx).await;
            }
            assert!(fx.ledger.halt_reason().is_none());
        });
    }

    #[test]
    fn prop_create_then_delete_restores_safe_to_spend(
        start in 0i64..100_000,
        fraction in 0.0f64..=1.0,
    ) {
        runtime().block_on(async {
            let fx = Fixture::new(start);
            let before = fx.ledger.get_safe_to_spend(true).await.unwrap();
            let funding = (before as f64 * fraction) as i64;

            let created = fx
                .ledger
                .create_pocket(NewPocket {
                    name: "Round trip".to_string(),
                    initial_funding: funding,
                    ..Default::default()
                })
                .await
                .unwrap();
            let returned = fx.ledger.delete_pocket(&created.value.id).await.unwrap();

            assert_eq!(returned.value, funding);
            assert_eq!(fx.ledger.get_safe_to_spend(true).await.unwrap(), before);
        });
    }
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_transfer_over_safe_to_spend_changes_nothing() {
    let fx = Fixture::new(10_000);
    let pocket = fx
        .ledger
        .create_pocket(NewPocket {
            name: "Savings".to_string(),
            ..Default::default()
        })
        .await
        .unwrap()
        .value;

    let err = fx
        .transfers
        .transfer(TransferRequest {
            from_id: "checking".to_string(),
            to_id: pocket.id.clone(),
            amount: 10_001,
            note: None,
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::InsufficientFunds {
            requested: 10_001,
            available: 10_000
        }
    ));
    assert_eq!(fx.bank.balance_of(&pocket.id), Some(0));
    assert_eq!(fx.ledger.get_safe_to_spend(true).await.unwrap(), 10_000);
    assert_eq!(fx.bank.calls("move_money"), 0);
}

#[tokio::test]
async fn test_pocket_funding_boundary() {
    let exact = Fixture::new(25_000);
    exact
        .ledger
        .create_pocket(NewPocket {
            name: "Exact".to_string(),
            initial_funding: 25_000,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(exact.ledger.get_safe_to_spend(true).await.unwrap(), 0);

    let over = Fixture::new(25_000);
    let err = over
        .ledger
        .create_pocket(NewPocket {
            name: "Over".to_string(),
            initial_funding: 25_001,
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InsufficientFunds { .. }));
}

#[tokio::test]
async fn test_two_cached_reads_cost_one_gateway_call() {
    let fx = Fixture::new(5_000);

    fx.ledger.get_pockets(false).await.unwrap();
    fx.ledger.get_safe_to_spend(false).await.unwrap();

    assert_eq!(fx.bank.calls("fetch_snapshot"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_gets_on_empty_key_fetch_once() {
    let cache: Arc<TtlCache<&'static str, i64>> = Arc::new(TtlCache::new());
    let fetches = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..32 {
        let cache = cache.clone();
        let fetches = fetches.clone();
        handles.push(tokio::spawn(async move {
            cache
                .get("balance", std::time::Duration::from_secs(60), false, move || async move {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                    Ok::<_, GatewayError>(7)
                })
                .await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), 7);
    }
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_interleaved_mutations_keep_the_ledger_consistent() {
    let fx = Fixture::new(100_000);
    let savings = fx
        .ledger
        .create_pocket(NewPocket {
            name: "Savings".to_string(),
            initial_funding: 20_000,
            ..Default::default()
        })
        .await
        .unwrap()
        .value
        .id;
    fx.provider.add_account("card-1", "Visa", -5_000);
    let card = fx
        .sync
        .select_account(ProviderKind::SimpleFin, "card-1")
        .await
        .unwrap();
    fx.sync.fetch_decision_balance(&card.id).await.unwrap();
    fx.sync
        .activate(&card.id, BalanceDecision::SyncToBalance)
        .await
        .unwrap();
    fx.provider.set_balance("card-1", -9_000);
    fx.bank.set_latency(std::time::Duration::from_millis(5));

    let transfer = |from: &str, to: &str, amount: i64| TransferRequest {
        from_id: from.to_string(),
        to_id: to.to_string(),
        amount,
        note: None,
    };
    let mut ops: Vec<LocalBoxFuture<'_, Result<(), Error>>> =
        vec![fx.sync.sync_now(&card.id).map_ok(|_| ()).boxed_local()];
    for n in 0..6 {
        ops.push(
            fx.ledger
                .create_pocket(NewPocket {
                    name: format!("Pocket {}", n),
                    initial_funding: 9_000,
                    ..Default::default()
                })
                .map_ok(|_| ())
                .boxed_local(),
        );
        ops.push(
            fx.transfers
                .transfer(transfer("checking", savings.as_str(), 6_000))
                .map_ok(|_| ())
                .boxed_local(),
        );
        ops.push(
            fx.transfers
                .transfer(transfer(savings.as_str(), "checking", 4_000))
                .map_ok(|_| ())
                .boxed_local(),
        );
    }

    let results = futures::future::join_all(ops).await;
    fx.bank.set_latency(std::time::Duration::ZERO);

    for result in &results {
        if let Err(e) = result {
            assert!(matches!(e, Error::InsufficientFunds { .. }), "unexpected {:?}", e);
        }
    }
    assert!(results.iter().filter(|r| r.is_ok()).count() > 1);
    assert!(fx.ledger.halt_reason().is_none());
    assert_invariant(&fx).await;
    let snapshot = fx.ledger.get_snapshot(true).await.unwrap();
    assert_eq!(snapshot.account_balance, 100_000);
    let card_pocket = fx.sync.get_sync_account(&card.id).unwrap().pocket_id.unwrap();
    assert_eq!(fx.bank.balance_of(&card_pocket), Some(9_000));
}
