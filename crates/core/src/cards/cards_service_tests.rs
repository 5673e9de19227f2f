use crate::cards::{CardServiceTrait, SpendPocketChange};
use crate::changes::Resource;
use crate::errors::{Error, ValidationError};
use crate::events::DomainEvent;
use crate::ledger::{LedgerServiceTrait, NewPocket};
use crate::testing::Fixture;

fn change(user_id: &str, pocket_id: &str) -> SpendPocketChange {
    SpendPocketChange {
        user_id: user_id.to_string(),
        pocket_id: pocket_id.to_string(),
    }
}

async fn with_card() -> (Fixture, String) {
    let fx = Fixture::new(50_000);
    fx.bank.add_debit_card("user-1", "Alex", "4242");
    let pocket = fx
        .ledger
        .create_pocket(NewPocket {
            name: "Groceries".to_string(),
            initial_funding: 10_000,
            ..Default::default()
        })
        .await
        .unwrap();
    (fx, pocket.value.id)
}

#[tokio::test]
async fn test_new_card_spends_from_primary() {
    let (fx, _) = with_card().await;

    let cards = fx.cards.list_cards(false).await.unwrap();

    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].spend_pocket_id, "checking-1");
    assert!(cards[0].spends_from_primary);
    assert_eq!(cards[0].last_four.as_deref(), Some("4242"));
}

#[tokio::test]
async fn test_spend_pocket_change_is_visible_immediately() {
    let (fx, pocket) = with_card().await;
    fx.cards.list_cards(false).await.unwrap();

    let mutation = fx.cards.set_spend_pocket(change("user-1", &pocket)).await.unwrap();

    assert!(mutation.changed.contains(&Resource::Cards));
    assert!(mutation.changed.contains(&Resource::Subaccounts));
    assert_eq!(mutation.value.len(), 1);
    assert_eq!(mutation.value[0].spend_pocket_id, pocket);
    assert_eq!(mutation.value[0].spend_pocket_name, "Groceries");

    let cards = fx.cards.list_cards(false).await.unwrap();
    assert_eq!(cards[0].spend_pocket_id, pocket);
    assert!(fx.events.events().iter().any(|e| matches!(
        e,
        DomainEvent::LedgerChanged { pocket_ids, changed }
            if pocket_ids == &vec![pocket.clone()] && changed.contains(&Resource::Cards)
    )));
}

#[tokio::test]
async fn test_checking_alias_restores_primary_spending() {
    let (fx, pocket) = with_card().await;
    fx.cards.set_spend_pocket(change("user-1", &pocket)).await.unwrap();

    let mutation = fx.cards.set_spend_pocket(change("user-1", "Checking")).await.unwrap();

    assert!(mutation.value[0].spends_from_primary);
    assert_eq!(mutation.value[0].spend_pocket_id, "checking-1");
}

#[tokio::test]
async fn test_deleted_spend_pocket_falls_back_to_primary() {
    let (fx, pocket) = with_card().await;
    fx.cards.set_spend_pocket(change("user-1", &pocket)).await.unwrap();

    fx.ledger.delete_pocket(&pocket).await.unwrap();

    let cards = fx.cards.list_cards(false).await.unwrap();
    assert!(cards[0].spends_from_primary);
}

#[tokio::test]
async fn test_unknown_pocket_or_holder_is_rejected_before_the_bank_call() {
    let (fx, pocket) = with_card().await;

    let err = fx.cards.set_spend_pocket(change("user-1", "pocket-missing")).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    let err = fx.cards.set_spend_pocket(change("user-9", &pocket)).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    let err = fx.cards.set_spend_pocket(change(" ", &pocket)).await.unwrap_err();
    assert!(matches!(err, Error::Validation(ValidationError::MissingField(_))));

    assert_eq!(fx.bank.calls("set_spend_subaccount"), 0);
}

#[tokio::test]
async fn test_halted_ledger_refuses_spend_changes() {
    let (fx, pocket) = with_card().await;
    fx.bank.inject_balance_drift(300);
    fx.ledger.verify_invariant().await.unwrap_err();

    let err = fx.cards.set_spend_pocket(change("user-1", &pocket)).await.unwrap_err();

    assert!(matches!(err, Error::Inconsistency(_)));
    assert_eq!(fx.bank.calls("set_spend_subaccount"), 0);
}
