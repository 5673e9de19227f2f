use chrono::{Duration, NaiveDate};

use crate::bills::{bill_scope, BillServiceTrait, NewBill, ReconciliationRepositoryTrait};
use crate::errors::{Error, GatewayError, ValidationError};
use crate::gateway::TransactionStatus;
use crate::ledger::LedgerServiceTrait;
use crate::testing::Fixture;

fn rent() -> NewBill {
    NewBill {
        name: "Rent".to_string(),
        amount: 150_000,
        frequency: "MONTHLY".to_string(),
        day_of_month: 1,
        match_string: Some("rent".to_string()),
        ..Default::default()
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn test_create_bill_reserves_prorated_catch_up() {
    // 2025-09-16: 15 of the 30 days between Sep 1 and Oct 1 have elapsed.
    let fx = Fixture::new(200_000);

    let created = fx.bills.create_bill(rent()).await.unwrap();

    assert_eq!(created.value.reserved_amount, 75_000);
    assert_eq!(created.value.funding_source, "Checking");
    assert_eq!(created.value.bill.next_due_date, Some(date(2025, 10, 1)));
    assert_eq!(created.value.bill.anchor_date, date(2025, 8, 1));
    let pocket_id = created.value.bill.linked_pocket_id.clone().unwrap();
    assert_eq!(fx.bank.balance_of(&pocket_id), Some(75_000));
    assert_eq!(fx.ledger.get_safe_to_spend(true).await.unwrap(), 125_000);
    assert_eq!(fx.events.count_kind("bills_changed"), 1);
}

#[tokio::test]
async fn test_create_bill_short_on_funds_creates_nothing() {
    let fx = Fixture::new(50_000);

    let err = fx.bills.create_bill(rent()).await.unwrap_err();

    assert!(matches!(
        err,
        Error::InsufficientFunds {
            requested: 75_000,
            available: 50_000
        }
    ));
    assert_eq!(fx.bank.calls("create_bill"), 0);
    assert!(fx.bills.list_bills(true).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_bill_validates_input() {
    let fx = Fixture::new(500_000);

    let cases = [
        NewBill {
            name: " ".to_string(),
            ..rent()
        },
        NewBill { amount: 0, ..rent() },
        NewBill {
            day_of_month: 32,
            ..rent()
        },
        NewBill {
            frequency: "FORTNIGHTLY".to_string(),
            ..rent()
        },
        NewBill {
            variable: true,
            min_amount: Some(10_000),
            max_amount: Some(5_000),
            ..rent()
        },
    ];
    for case in cases {
        let err = fx.bills.create_bill(case).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "unexpected {:?}", err);
    }
    assert_eq!(fx.bank.calls("create_bill"), 0);
}

#[tokio::test]
async fn test_bill_names_are_unique() {
    let fx = Fixture::new(500_000);
    fx.bills.create_bill(rent()).await.unwrap();

    let err = fx
        .bills
        .create_bill(NewBill {
            name: "RENT".to_string(),
            ..rent()
        })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Validation(ValidationError::InvalidInput(_))));
}

#[tokio::test]
async fn test_bill_due_today_reserves_full_amount() {
    let fx = Fixture::at(200_000, date(2025, 9, 1));

    let created = fx.bills.create_bill(rent()).await.unwrap();

    assert_eq!(created.value.reserved_amount, 150_000);
    assert_eq!(created.value.bill.next_due_date, Some(date(2025, 9, 1)));
}

#[tokio::test]
async fn test_delete_bill_returns_reservation() {
    let fx = Fixture::new(200_000);
    let created = fx.bills.create_bill(rent()).await.unwrap();

    let deleted = fx.bills.delete_bill(&created.value.bill.id).await.unwrap();

    assert_eq!(deleted.value, 75_000);
    assert_eq!(fx.ledger.get_safe_to_spend(true).await.unwrap(), 200_000);
    assert!(fx.bills.list_bills(false).await.unwrap().is_empty());
    assert!(fx.ledger.get_pockets(false).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_unknown_bill_is_not_found() {
    let fx = Fixture::new(1_000);

    let err = fx.bills.delete_bill("bill-404").await.unwrap_err();

    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_deleting_bill_pocket_leaves_bill_unfunded() {
    let fx = Fixture::new(200_000);
    let created = fx.bills.create_bill(rent()).await.unwrap();
    let pocket_id = created.value.bill.linked_pocket_id.clone().unwrap();

    let returned = fx.ledger.delete_pocket(&pocket_id).await.unwrap();
    assert_eq!(returned.value, 75_000);

    let bills = fx.bills.list_bills(false).await.unwrap();
    assert_eq!(bills.len(), 1);
    assert!(!bills[0].is_funded());
    assert_eq!(bills[0].reserved, 0);

    // The orphan can still be deleted.
    let deleted = fx.bills.delete_bill(&created.value.bill.id).await.unwrap();
    assert_eq!(deleted.value, 0);
}

#[tokio::test]
async fn test_overview_summarizes_reserves() {
    let fx = Fixture::new(300_000);
    fx.bank.set_funding_source("Everyday Checking");
    fx.bills.create_bill(rent()).await.unwrap();

    let overview = fx.bills.bills_overview(false).await.unwrap();

    assert_eq!(overview.bills.len(), 1);
    let bill = &overview.bills[0];
    assert_eq!(bill.reserved, 75_000);
    assert!((bill.progress - 50.0).abs() < f64::EPSILON);
    // Tomorrow 16 of 30 days have elapsed: 80000 target.
    assert_eq!(bill.estimated_next_funding, 5_000);
    assert_eq!(overview.summary.total_reserved, 75_000);
    assert_eq!(overview.summary.next_funding_date, Some(date(2025, 9, 17)));
    assert_eq!(overview.summary.estimated_funding, 5_000);
    assert_eq!(overview.summary.funding_source, "Everyday Checking");
}

#[tokio::test]
async fn test_list_bills_sorted_by_next_due() {
    let fx = Fixture::new(500_000);
    fx.bills.create_bill(rent()).await.unwrap();
    fx.bills
        .create_bill(NewBill {
            name: "Phone".to_string(),
            amount: 6_000,
            frequency: "MONTHLY".to_string(),
            day_of_month: 20,
            ..Default::default()
        })
        .await
        .unwrap();

    let bills = fx.bills.list_bills(false).await.unwrap();

    let names: Vec<&str> = bills.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["Phone", "Rent"]);
}

#[tokio::test]
async fn test_fund_bills_tops_up_to_linear_target() {
    let fx = Fixture::new(300_000);
    let created = fx.bills.create_bill(rent()).await.unwrap();
    let pocket_id = created.value.bill.linked_pocket_id.clone().unwrap();

    fx.clock.advance(Duration::days(5));
    let report = fx.bills.fund_bills().await.unwrap();

    // 20 of 30 days: 100000 target, 75000 already reserved.
    assert_eq!(report.value.total, 25_000);
    assert_eq!(report.value.funded.len(), 1);
    assert!(!report.value.funded[0].short);
    assert_eq!(fx.bank.balance_of(&pocket_id), Some(100_000));

    let again = fx.bills.fund_bills().await.unwrap();
    assert_eq!(again.value.total, 0);
    assert!(again.changed.is_empty());
}

#[tokio::test]
async fn test_fund_bills_is_limited_by_safe_to_spend() {
    let fx = Fixture::new(80_000);
    fx.bills.create_bill(rent()).await.unwrap();

    fx.clock.advance(Duration::days(5));
    let report = fx.bills.fund_bills().await.unwrap();

    assert_eq!(report.value.total, 5_000);
    assert!(report.value.funded[0].short);
    assert_eq!(fx.ledger.get_safe_to_spend(true).await.unwrap(), 0);
}

#[tokio::test]
async fn test_reconcile_releases_matched_payment_once() {
    let fx = Fixture::new(300_000);
    let created = fx.bills.create_bill(rent()).await.unwrap();
    let pocket_id = created.value.bill.linked_pocket_id.clone().unwrap();
    let today = date(2025, 9, 16);
    fx.bank.push_transaction(
        today,
        -150_000,
        "ACME PROPERTY RENT",
        None,
        TransactionStatus::Posted,
        false,
    );
    fx.bank.push_transaction(
        today,
        -150_000,
        "Rent (pending)",
        None,
        TransactionStatus::Pending,
        false,
    );
    fx.bank.push_transaction(
        today - Duration::days(30),
        -150_000,
        "Old rent",
        None,
        TransactionStatus::Posted,
        true,
    );
    let transactions = fx.gateway.transactions(true).await.unwrap();

    let first = fx.bills.reconcile_transactions(&transactions, None).await.unwrap();
    assert_eq!(first.value.applied.len(), 1);
    assert_eq!(first.value.total_released, 75_000);
    assert_eq!(fx.bank.balance_of(&pocket_id), Some(0));
    assert_eq!(fx.ledger.get_safe_to_spend(true).await.unwrap(), 150_000);

    let second = fx.bills.reconcile_transactions(&transactions, None).await.unwrap();
    assert!(second.value.applied.is_empty());
    assert!(second.changed.is_empty());
}

#[tokio::test]
async fn test_reconcile_limited_to_one_bill_and_cleared_on_delete() {
    let fx = Fixture::new(400_000);
    let rent_bill = fx.bills.create_bill(rent()).await.unwrap().value.bill;
    let other = fx
        .bills
        .create_bill(NewBill {
            name: "Rental car".to_string(),
            amount: 30_000,
            frequency: "MONTHLY".to_string(),
            day_of_month: 1,
            match_string: Some("rent".to_string()),
            ..Default::default()
        })
        .await
        .unwrap()
        .value
        .bill;
    fx.bank.push_transaction(
        date(2025, 9, 16),
        -150_000,
        "Rent",
        None,
        TransactionStatus::Posted,
        false,
    );
    let transactions = fx.gateway.transactions(true).await.unwrap();
    let scope = bill_scope(&rent_bill.id);

    let applied = fx
        .bills
        .reconcile_transactions(&transactions, Some(&rent_bill.id))
        .await
        .unwrap();

    assert_eq!(applied.value.applied.len(), 1);
    assert_eq!(applied.value.applied[0].bill_id, rent_bill.id);
    assert_eq!(fx.reconciliations.list_reconciled(&scope).unwrap().len(), 1);
    assert!(fx
        .reconciliations
        .list_reconciled(&bill_scope(&other.id))
        .unwrap()
        .is_empty());

    fx.bills.delete_bill(&rent_bill.id).await.unwrap();
    assert!(fx.reconciliations.list_reconciled(&scope).unwrap().is_empty());
}

#[tokio::test]
async fn test_reconcile_timeout_after_commit_never_releases_twice() {
    let fx = Fixture::new(300_000);
    let created = fx.bills.create_bill(rent()).await.unwrap();
    let pocket_id = created.value.bill.linked_pocket_id.clone().unwrap();
    fx.bank.push_transaction(
        date(2025, 9, 16),
        -10_000,
        "Rent partial",
        None,
        TransactionStatus::Posted,
        false,
    );
    let transactions = fx.gateway.transactions(true).await.unwrap();

    fx.bank.fail_next_move(GatewayError::timeout("memory-bank"), true);
    let err = fx.bills.reconcile_transactions(&transactions, None).await.unwrap_err();
    assert!(matches!(err, Error::Gateway(GatewayError::Timeout { .. })));
    assert_eq!(fx.bank.balance_of(&pocket_id), Some(65_000));

    let again = fx.bills.reconcile_transactions(&transactions, None).await.unwrap();
    assert!(again.value.applied.is_empty());
    assert_eq!(again.value.total_released, 0);
    assert_eq!(fx.bank.balance_of(&pocket_id), Some(65_000));
}

#[tokio::test]
async fn test_reconcile_rejected_release_is_applied_on_next_run() {
    let fx = Fixture::new(300_000);
    let created = fx.bills.create_bill(rent()).await.unwrap();
    let pocket_id = created.value.bill.linked_pocket_id.clone().unwrap();
    fx.bank.push_transaction(
        date(2025, 9, 16),
        -10_000,
        "Rent partial",
        None,
        TransactionStatus::Posted,
        false,
    );
    let transactions = fx.gateway.transactions(true).await.unwrap();

    fx.bank.fail_next_move(GatewayError::remote("memory-bank", "declined"), false);
    let err = fx.bills.reconcile_transactions(&transactions, None).await.unwrap_err();
    assert!(matches!(err, Error::Gateway(GatewayError::Remote { .. })));
    assert_eq!(fx.bank.balance_of(&pocket_id), Some(75_000));

    let again = fx.bills.reconcile_transactions(&transactions, None).await.unwrap();
    assert_eq!(again.value.total_released, 10_000);
    assert_eq!(fx.bank.balance_of(&pocket_id), Some(65_000));
}
