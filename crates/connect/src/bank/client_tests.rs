use std::sync::{Arc, Mutex};

use axum::{extract::State, routing::post, Json, Router};
use chrono::NaiveDate;
use serde_json::{json, Value};

use pocketbook_core::bills::{BillFrequency, MatchRule};
use pocketbook_core::errors::GatewayError;
use pocketbook_core::gateway::{
    BankGateway, MoveMoneyRequest, NewBillRequest, SpendSubaccountRequest, TransactionStatus,
};

use super::{bill_pocket_note, BankGatewayConfig, GraphQlBankGateway};

/// Requests seen by the fake bank, as (operationName, variables).
type Seen = Arc<Mutex<Vec<(String, Value)>>>;

async fn fake_bank(State(seen): State<Seen>, Json(body): Json<Value>) -> Json<Value> {
    let operation = body["operationName"].as_str().unwrap_or_default().to_string();
    let query = body["query"].as_str().unwrap_or_default().to_string();
    seen.lock().unwrap().push((operation.clone(), body["variables"].clone()));

    let response = match operation.as_str() {
        "CurrentUser" if query.contains("billReserve { bills") => json!({"data": {"currentUser": {"accounts": [{
            "billReserve": {"bills": [{
                "id": "bill-1", "name": "Rent", "amount": 150000, "anchorDate": "2025-08-01",
                "autoAdjustAmount": false, "dayOfMonth": 1, "frequency": "MONTHLY",
                "frequencyInterval": 1, "paused": false, "createdAt": "2025-08-20T00:00:00Z",
                "reassignmentRule": {"match": "rent"}
            }]},
            "subaccounts": [{"id": "sub-rent", "note": bill_pocket_note("Rent")}, {"id": "sub-x", "note": null}]
        }]}}}),
        "CurrentUser" if query.contains("funding") => json!({"data": {"currentUser": {"accounts": [
            {"billReserve": null},
            {"billReserve": {"settings": {"funding": {"subaccount": {"displayName": "Everyday"}}}}}
        ]}}}),
        "CurrentUser" if query.contains("subaccounts") => json!({"data": {"currentUser": {"accounts": [{
            "id": "acct-1", "displayName": "Checking",
            "subaccounts": [
                {"id": "sub-main", "name": "Checking", "overallBalance": 80000, "goal": null},
                {"id": "sub-trip", "name": "Trip", "overallBalance": 20000, "goal": 50000}
            ]
        }]}}}),
        "CurrentUser" => json!({"data": {"currentUser": {"accounts": [
            {"id": "acct-kid", "displayName": "Kid"},
            {"id": "acct-1", "displayName": "Checking"}
        ]}}}),
        "RecentActivity" => json!({"data": {"account": {"id": "acct-1", "cashTransactions": {"edges": [
            {"node": {"id": "t-1", "amount": -150000, "description": "ACME", "occurredAt": "2025-09-01T12:00:00Z",
                      "title": "Rent", "status": "SETTLED", "subaccount": null}}
        ]}}}}),
        "InitiateTransfer" if body["variables"]["input"]["amount"].as_i64() > Some(80000) => {
            json!({"data": {"initiateTransfer": null}, "errors": [{"message": "Insufficient balance"}]})
        }
        "InitiateTransfer" => json!({"data": {"initiateTransfer": {"result": {"id": "xfer-1"}}}}),
        "CreateSubaccount" => json!({"data": {"createSubaccount": {"result": {
            "id": "sub-new", "name": body["variables"]["input"]["name"], "overallBalance":
            body["variables"]["input"]["initialTransferAmount"], "goal": body["variables"]["input"]["targetAmount"],
            "isPrimary": false
        }}}}),
        "DeleteSubaccount" => json!({"data": {"deleteSubaccount": {"result": {"id": body["variables"]["id"]}}}}),
        "CreateBill" => json!({"errors": [{"message": "Bill reserve disabled"}]}),
        "PhysicalCards" => json!({"data": {"currentUser": {"id": "u-1", "family": {"id": "fam-1", "parents": [
            {"id": "u-1", "activePhysicalDebitCard": {"id": "card-1", "color": "BLUE", "status": "ACTIVE",
                "lastFour": "4242", "user": {"id": "u-1", "firstName": "Alex",
                "userSpendConfig": {"id": "cfg-1", "selectedSpendSubaccount": {"id": "sub-trip", "name": "Trip"}}}}},
            {"id": "u-2", "activePhysicalDebitCard": null}
        ]}}}}),
        "SetSpendSubaccount" => json!({"data": {"setSpendSubaccount": {"result": {"id": body["variables"]["input"]["userId"]}}}}),
        "ActivityDetail" if body["variables"]["activityId"] == "t-1" => json!({"data": {"cashTransaction": {
            "id": "t-1", "amount": -4599, "description": null, "externalMemo": "weekly shop",
            "occurredAt": "2025-09-14T18:30:00Z", "status": "SETTLED", "title": "Grocery Market",
            "latestDebitCardTransactionDetail": {"merchantName": "GROCERY MKT 12", "merchantAddress1": "1 Main St",
                "merchantCity": "Portland", "merchantState": "OR", "merchantZip": "97201"}
        }}}),
        "ActivityDetail" => json!({"data": {"cashTransaction": null}}),
        _ => json!({"errors": [{"message": format!("unexpected operation {}", operation)}]}),
    };
    Json(response)
}

async fn spawn_bank() -> (GraphQlBankGateway, Seen) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new().route("/graphql", post(fake_bank)).with_state(seen.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let gateway =
        GraphQlBankGateway::new(BankGatewayConfig::new(format!("http://{}/graphql", addr), "token-123")).unwrap();
    (gateway, seen)
}

fn operations(seen: &Seen) -> Vec<String> {
    seen.lock().unwrap().iter().map(|(op, _)| op.clone()).collect()
}

#[tokio::test]
async fn test_snapshot_sums_subaccounts_and_flags_primary() {
    let (gateway, _) = spawn_bank().await;

    let snapshot = gateway.fetch_snapshot().await.unwrap();

    assert_eq!(snapshot.balance, 100_000);
    assert_eq!(snapshot.primary().map(|p| p.id.as_str()), Some("sub-main"));
    assert_eq!(snapshot.safe_to_spend(), 80_000);
    assert_eq!(snapshot.find("sub-trip").and_then(|p| p.target), Some(50_000));
}

#[tokio::test]
async fn test_transactions_use_the_checking_account() {
    let (gateway, seen) = spawn_bank().await;

    let transactions = gateway.list_transactions(25).await.unwrap();
    gateway.list_transactions(25).await.unwrap();

    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].status, TransactionStatus::Posted);
    assert_eq!(transactions[0].date, NaiveDate::from_ymd_opt(2025, 9, 1).unwrap());

    // The account id is resolved once.
    let ops = operations(&seen);
    assert_eq!(ops.iter().filter(|op| *op == "CurrentUser").count(), 1);
    let (_, variables) = seen.lock().unwrap()[1].clone();
    assert_eq!(variables["accountId"], "acct-1");
    assert_eq!(variables["pageSize"], 25);
}

#[tokio::test]
async fn test_graphql_error_is_a_remote_rejection() {
    let (gateway, _) = spawn_bank().await;

    let err = gateway
        .move_money(MoveMoneyRequest {
            from_id: "sub-main".to_string(),
            to_id: "sub-trip".to_string(),
            amount: 90_000,
            note: "Transfer".to_string(),
        })
        .await
        .unwrap_err();

    assert_eq!(err, GatewayError::remote("bank", "Insufficient balance"));
}

#[tokio::test]
async fn test_bills_join_their_pocket_by_note() {
    let (gateway, _) = spawn_bank().await;

    let bills = gateway.list_bills().await.unwrap();

    assert_eq!(bills.len(), 1);
    assert_eq!(bills[0].pocket_id.as_deref(), Some("sub-rent"));
    assert_eq!(bills[0].frequency, BillFrequency::Monthly);
    assert_eq!(gateway.funding_source_name().await.unwrap(), "Everyday");
}

#[tokio::test]
async fn test_failed_bill_creation_removes_its_pocket() {
    let (gateway, seen) = spawn_bank().await;

    let err = gateway
        .create_bill(NewBillRequest {
            name: "Rent".to_string(),
            amount: 150_000,
            frequency: BillFrequency::Quarterly,
            day_of_month: 1,
            anchor_date: NaiveDate::from_ymd_opt(2025, 8, 1).unwrap(),
            match_rule: Some(MatchRule {
                pattern: "rent".to_string(),
                min_amount: None,
                max_amount: None,
            }),
            variable: false,
            reserve_amount: 75_000,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Remote { .. }));
    let ops = operations(&seen);
    assert!(ops.contains(&"CreateSubaccount".to_string()));
    assert_eq!(ops.last().map(String::as_str), Some("DeleteSubaccount"));

    let seen = seen.lock().unwrap();
    let (_, bill_vars) = seen.iter().find(|(op, _)| op == "CreateBill").unwrap();
    assert_eq!(bill_vars["input"]["frequency"], "MONTHLY");
    assert_eq!(bill_vars["input"]["frequencyInterval"], 3);
    let (_, pocket_vars) = seen.iter().find(|(op, _)| op == "CreateSubaccount").unwrap();
    assert_eq!(pocket_vars["input"]["note"], bill_pocket_note("Rent"));
}

#[test]
fn test_blank_token_is_missing_credentials() {
    let err = GraphQlBankGateway::new(BankGatewayConfig::new("http://localhost/graphql", "  ")).err().unwrap();

    assert!(matches!(
        err,
        pocketbook_core::Error::Gateway(GatewayError::MissingCredentials { .. })
    ));
}

#[tokio::test]
async fn test_cards_list_parents_with_an_active_card() {
    let (gateway, _) = spawn_bank().await;

    let cards = gateway.list_debit_cards().await.unwrap();

    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].user_id, "u-1");
    assert_eq!(cards[0].last_four.as_deref(), Some("4242"));
    assert_eq!(cards[0].spend_subaccount_id.as_deref(), Some("sub-trip"));
}

#[tokio::test]
async fn test_spend_subaccount_mutation_sends_user_and_pocket() {
    let (gateway, seen) = spawn_bank().await;

    gateway
        .set_spend_subaccount(SpendSubaccountRequest {
            user_id: "u-1".to_string(),
            subaccount_id: "sub-trip".to_string(),
        })
        .await
        .unwrap();

    let (op, variables) = seen.lock().unwrap()[0].clone();
    assert_eq!(op, "SetSpendSubaccount");
    assert_eq!(variables["input"]["userId"], "u-1");
    assert_eq!(variables["input"]["selectedSpendSubaccountId"], "sub-trip");
}

#[tokio::test]
async fn test_transaction_detail_maps_merchant_fields() {
    let (gateway, _) = spawn_bank().await;

    let detail = gateway.transaction_detail("t-1").await.unwrap().unwrap();
    assert_eq!(detail.amount, -4_599);
    assert_eq!(detail.memo.as_deref(), Some("weekly shop"));
    let merchant = detail.merchant.unwrap();
    assert_eq!(merchant.name.as_deref(), Some("GROCERY MKT 12"));
    assert_eq!(merchant.zip.as_deref(), Some("97201"));

    assert!(gateway.transaction_detail("t-404").await.unwrap().is_none());
}
