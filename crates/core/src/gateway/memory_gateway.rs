//! In-memory bank used by tests and by the server's demo mode.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate};
use log::debug;

use super::gateway_model::{
    AccountSnapshot, BillRecord, DebitCard, MerchantDetail, MoveMoneyRequest, NewBillRequest,
    NewPocketRequest, SpendSubaccountRequest, Subaccount, Transaction, TransactionDetail,
    TransactionStatus,
};
use super::gateway_traits::{BankGateway, GatewayResult};
use crate::constants::DEFAULT_FUNDING_SOURCE_NAME;
use crate::errors::GatewayError;
use crate::utils::clock::{Clock, SystemClock};

const SERVICE: &str = "memory-bank";

struct BankState {
    subaccounts: Vec<Subaccount>,
    transactions: Vec<Transaction>,
    bills: Vec<BillRecord>,
    cards: Vec<DebitCard>,
    merchants: HashMap<String, MerchantDetail>,
    funding_source: String,
    /// Added to the reported account balance only. Lets tests simulate the
    /// bank disagreeing with its own sub-accounts.
    drift: i64,
    latency: Duration,
    calls: HashMap<&'static str, usize>,
    fail_next: Option<GatewayError>,
    /// Failure for the next `move_money`, and whether the move commits first.
    move_failure: Option<(GatewayError, bool)>,
    next_id: u64,
}

impl BankState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn balance(&self) -> i64 {
        self.subaccounts.iter().map(|s| s.balance).sum::<i64>() + self.drift
    }

    fn primary_mut(&mut self) -> GatewayResult<&mut Subaccount> {
        self.subaccounts
            .iter_mut()
            .find(|s| s.is_primary)
            .ok_or_else(|| GatewayError::remote(SERVICE, "no primary account"))
    }

    fn index_of(&self, id: &str) -> GatewayResult<usize> {
        self.subaccounts
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| GatewayError::remote(SERVICE, format!("unknown subaccount {}", id)))
    }

    fn withdraw_from_primary(&mut self, amount: i64) -> GatewayResult<()> {
        let primary = self.primary_mut()?;
        if primary.balance < amount {
            return Err(GatewayError::remote(SERVICE, "insufficient balance"));
        }
        primary.balance -= amount;
        Ok(())
    }
}

/// A bank that keeps its accounts in memory.
///
/// The account balance is always the sum of the sub-accounts (plus any
/// injected drift). Every call is counted per operation name so tests can
/// assert how often the gateway was actually hit.
pub struct InMemoryBank {
    state: Mutex<BankState>,
    clock: Arc<dyn Clock>,
}

impl InMemoryBank {
    /// A bank with only a primary "Checking" account holding `primary_balance`.
    pub fn new(primary_balance: i64) -> Self {
        Self::with_clock(primary_balance, Arc::new(SystemClock))
    }

    pub fn with_clock(primary_balance: i64, clock: Arc<dyn Clock>) -> Self {
        let primary = Subaccount {
            id: "checking-1".to_string(),
            name: DEFAULT_FUNDING_SOURCE_NAME.to_string(),
            balance: primary_balance,
            target: None,
            is_primary: true,
        };
        Self {
            state: Mutex::new(BankState {
                subaccounts: vec![primary],
                transactions: Vec::new(),
                bills: Vec::new(),
                cards: Vec::new(),
                merchants: HashMap::new(),
                funding_source: DEFAULT_FUNDING_SOURCE_NAME.to_string(),
                drift: 0,
                latency: Duration::ZERO,
                calls: HashMap::new(),
                fail_next: None,
                move_failure: None,
                next_id: 1,
            }),
            clock,
        }
    }

    /// Seeded data for running the server without bank credentials.
    pub fn demo(clock: Arc<dyn Clock>) -> Self {
        let bank = Self::with_clock(325_000, clock.clone());
        bank.add_pocket("Emergency Fund", 150_000, Some(500_000));
        bank.add_pocket("Vacation", 42_500, Some(200_000));
        bank.add_debit_card("user-1", "Alex", "4242");
        let today = clock.today();
        let samples = [
            (0, 245_000, "Payroll", Some("Direct deposit")),
            (-2, -4_599, "Grocery Market", None),
            (-3, -1_250, "Coffee Shop", Some("Card purchase")),
            (-6, -150_000, "Rent Payment", Some("ACH debit")),
            (-9, -8_900, "Electric Company", Some("Utility bill")),
        ];
        for (offset, amount, title, description) in samples {
            bank.push_transaction(
                today + ChronoDuration::days(offset),
                amount,
                title,
                description,
                TransactionStatus::Posted,
                false,
            );
        }
        bank
    }

    fn state(&self) -> GatewayResult<MutexGuard<'_, BankState>> {
        self.state
            .lock()
            .map_err(|_| GatewayError::remote(SERVICE, "bank state poisoned"))
    }

    /// Counts the call, consumes any injected failure and returns the
    /// configured latency.
    fn begin(&self, op: &'static str) -> GatewayResult<Duration> {
        let mut state = self.state()?;
        *state.calls.entry(op).or_insert(0) += 1;
        if let Some(err) = state.fail_next.take() {
            debug!("{}: injected failure on {}", SERVICE, op);
            return Err(err);
        }
        Ok(state.latency)
    }

    async fn enter(&self, op: &'static str) -> GatewayResult<()> {
        let latency = self.begin(op)?;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        Ok(())
    }

    pub fn primary_id(&self) -> String {
        self.state()
            .ok()
            .and_then(|s| s.subaccounts.iter().find(|a| a.is_primary).map(|a| a.id.clone()))
            .unwrap_or_default()
    }

    /// Adds a pocket with money that did not come from the primary account.
    pub fn add_pocket(&self, name: &str, balance: i64, target: Option<i64>) -> String {
        let Ok(mut state) = self.state() else {
            return String::new();
        };
        let id = state.next_id("pocket");
        state.subaccounts.push(Subaccount {
            id: id.clone(),
            name: name.to_string(),
            balance,
            target,
            is_primary: false,
        });
        id
    }

    /// Records an external transaction. Posted transactions move the primary
    /// balance unless `pending_only` is set.
    pub fn push_transaction(
        &self,
        date: NaiveDate,
        amount: i64,
        title: &str,
        description: Option<&str>,
        status: TransactionStatus,
        pending_only: bool,
    ) -> String {
        let Ok(mut state) = self.state() else {
            return String::new();
        };
        let id = state.next_id("tx");
        let primary_id = state
            .subaccounts
            .iter()
            .find(|s| s.is_primary)
            .map(|s| s.id.clone());
        if status == TransactionStatus::Posted && !pending_only {
            if let Ok(primary) = state.primary_mut() {
                primary.balance += amount;
            }
        }
        state.transactions.push(Transaction {
            id: id.clone(),
            date,
            amount,
            title: title.to_string(),
            description: description.map(str::to_string),
            subaccount_id: primary_id,
            status,
        });
        id
    }

    /// Issues an active card spending from the primary account.
    pub fn add_debit_card(&self, user_id: &str, holder: &str, last_four: &str) -> String {
        let Ok(mut state) = self.state() else {
            return String::new();
        };
        let id = state.next_id("card");
        state.cards.push(DebitCard {
            id: id.clone(),
            user_id: user_id.to_string(),
            holder: Some(holder.to_string()),
            last_four: Some(last_four.to_string()),
            color: None,
            status: "ACTIVE".to_string(),
            spend_subaccount_id: None,
        });
        id
    }

    pub fn set_merchant(&self, transaction_id: &str, merchant: MerchantDetail) {
        if let Ok(mut state) = self.state() {
            state.merchants.insert(transaction_id.to_string(), merchant);
        }
    }

    pub fn balance_of(&self, id: &str) -> Option<i64> {
        let state = self.state().ok()?;
        state.subaccounts.iter().find(|s| s.id == id).map(|s| s.balance)
    }

    pub fn set_latency(&self, latency: Duration) {
        if let Ok(mut state) = self.state() {
            state.latency = latency;
        }
    }

    /// The next gateway call (of any kind) fails with `err`.
    pub fn fail_next(&self, err: GatewayError) {
        if let Ok(mut state) = self.state() {
            state.fail_next = Some(err);
        }
    }

    /// The next `move_money` fails with `err`. With `committed` set the money
    /// moves before the error is returned, like a write whose reply was lost.
    pub fn fail_next_move(&self, err: GatewayError, committed: bool) {
        if let Ok(mut state) = self.state() {
            state.move_failure = Some((err, committed));
        }
    }

    pub fn inject_balance_drift(&self, drift: i64) {
        if let Ok(mut state) = self.state() {
            state.drift = drift;
        }
    }

    pub fn set_funding_source(&self, name: &str) {
        if let Ok(mut state) = self.state() {
            state.funding_source = name.to_string();
        }
    }

    /// Number of calls made to the named operation.
    pub fn calls(&self, op: &str) -> usize {
        self.state()
            .ok()
            .and_then(|s| s.calls.get(op).copied())
            .unwrap_or(0)
    }

    pub fn reset_calls(&self) {
        if let Ok(mut state) = self.state() {
            state.calls.clear();
        }
    }
}

#[async_trait]
impl BankGateway for InMemoryBank {
    fn name(&self) -> &str {
        SERVICE
    }

    async fn get_account_balance(&self) -> GatewayResult<i64> {
        self.enter("get_account_balance").await?;
        Ok(self.state()?.balance())
    }

    async fn list_subaccounts(&self) -> GatewayResult<Vec<Subaccount>> {
        self.enter("list_subaccounts").await?;
        Ok(self.state()?.subaccounts.clone())
    }

    async fn fetch_snapshot(&self) -> GatewayResult<AccountSnapshot> {
        self.enter("fetch_snapshot").await?;
        let state = self.state()?;
        Ok(AccountSnapshot {
            balance: state.balance(),
            subaccounts: state.subaccounts.clone(),
            fetched_at: self.clock.now(),
        })
    }

    async fn list_transactions(&self, page_size: usize) -> GatewayResult<Vec<Transaction>> {
        self.enter("list_transactions").await?;
        let state = self.state()?;
        let mut transactions = state.transactions.clone();
        transactions.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.id.cmp(&a.id)));
        transactions.truncate(page_size);
        Ok(transactions)
    }

    async fn move_money(&self, request: MoveMoneyRequest) -> GatewayResult<()> {
        self.enter("move_money").await?;
        let mut state = self.state()?;
        if request.amount <= 0 {
            return Err(GatewayError::remote(SERVICE, "amount must be positive"));
        }
        let from = state.index_of(&request.from_id)?;
        let to = state.index_of(&request.to_id)?;
        if from == to {
            return Err(GatewayError::remote(SERVICE, "cannot transfer to the same account"));
        }
        if state.subaccounts[from].balance < request.amount {
            return Err(GatewayError::remote(SERVICE, "insufficient balance"));
        }
        let failure = state.move_failure.take();
        if let Some((err, false)) = failure {
            return Err(err);
        }
        state.subaccounts[from].balance -= request.amount;
        state.subaccounts[to].balance += request.amount;
        debug!(
            "{}: moved {} from {} to {} ({})",
            SERVICE, request.amount, request.from_id, request.to_id, request.note
        );
        match failure {
            Some((err, _)) => Err(err),
            None => Ok(()),
        }
    }

    async fn create_pocket(&self, request: NewPocketRequest) -> GatewayResult<Subaccount> {
        self.enter("create_pocket").await?;
        let mut state = self.state()?;
        state.withdraw_from_primary(request.initial_funding)?;
        let pocket = Subaccount {
            id: state.next_id("pocket"),
            name: request.name,
            balance: request.initial_funding,
            target: request.target,
            is_primary: false,
        };
        state.subaccounts.push(pocket.clone());
        Ok(pocket)
    }

    async fn delete_pocket(&self, pocket_id: &str) -> GatewayResult<()> {
        self.enter("delete_pocket").await?;
        let mut state = self.state()?;
        let index = state.index_of(pocket_id)?;
        if state.subaccounts[index].is_primary {
            return Err(GatewayError::remote(SERVICE, "cannot delete the primary account"));
        }
        let removed = state.subaccounts.remove(index);
        state.primary_mut()?.balance += removed.balance;
        for bill in state.bills.iter_mut() {
            if bill.pocket_id.as_deref() == Some(pocket_id) {
                bill.pocket_id = None;
            }
        }
        for card in state.cards.iter_mut() {
            if card.spend_subaccount_id.as_deref() == Some(pocket_id) {
                card.spend_subaccount_id = None;
            }
        }
        Ok(())
    }

    async fn list_bills(&self) -> GatewayResult<Vec<BillRecord>> {
        self.enter("list_bills").await?;
        Ok(self.state()?.bills.clone())
    }

    async fn create_bill(&self, request: NewBillRequest) -> GatewayResult<BillRecord> {
        self.enter("create_bill").await?;
        let now = self.clock.now();
        let mut state = self.state()?;
        state.withdraw_from_primary(request.reserve_amount)?;
        let pocket_id = state.next_id("pocket");
        state.subaccounts.push(Subaccount {
            id: pocket_id.clone(),
            name: request.name.clone(),
            balance: request.reserve_amount,
            target: Some(request.amount),
            is_primary: false,
        });
        let bill = BillRecord {
            id: state.next_id("bill"),
            name: request.name,
            amount: request.amount,
            frequency: request.frequency,
            day_of_month: request.day_of_month,
            anchor_date: request.anchor_date,
            match_rule: request.match_rule,
            variable: request.variable,
            pocket_id: Some(pocket_id),
            paused: false,
            created_at: now,
        };
        state.bills.push(bill.clone());
        Ok(bill)
    }

    async fn delete_bill(&self, bill_id: &str) -> GatewayResult<()> {
        self.enter("delete_bill").await?;
        let mut state = self.state()?;
        let before = state.bills.len();
        state.bills.retain(|b| b.id != bill_id);
        if state.bills.len() == before {
            return Err(GatewayError::remote(SERVICE, format!("unknown bill {}", bill_id)));
        }
        Ok(())
    }

    async fn funding_source_name(&self) -> GatewayResult<String> {
        self.enter("funding_source_name").await?;
        Ok(self.state()?.funding_source.clone())
    }

    async fn transaction_detail(&self, transaction_id: &str) -> GatewayResult<Option<TransactionDetail>> {
        self.enter("transaction_detail").await?;
        let state = self.state()?;
        Ok(state
            .transactions
            .iter()
            .find(|t| t.id == transaction_id)
            .map(|t| TransactionDetail {
                id: t.id.clone(),
                amount: t.amount,
                title: t.title.clone(),
                description: t.description.clone(),
                status: t.status,
                occurred_at: t.date.and_hms_opt(12, 0, 0).map(|d| d.and_utc()),
                memo: None,
                merchant: state.merchants.get(&t.id).cloned(),
            }))
    }

    async fn list_debit_cards(&self) -> GatewayResult<Vec<DebitCard>> {
        self.enter("list_debit_cards").await?;
        Ok(self.state()?.cards.clone())
    }

    async fn set_spend_subaccount(&self, request: SpendSubaccountRequest) -> GatewayResult<()> {
        self.enter("set_spend_subaccount").await?;
        let mut state = self.state()?;
        let index = state.index_of(&request.subaccount_id)?;
        let spend = (!state.subaccounts[index].is_primary).then(|| request.subaccount_id.clone());
        let mut updated = 0;
        for card in state.cards.iter_mut().filter(|c| c.user_id == request.user_id) {
            card.spend_subaccount_id = spend.clone();
            updated += 1;
        }
        if updated == 0 {
            return Err(GatewayError::remote(SERVICE, format!("unknown card user {}", request.user_id)));
        }
        Ok(())
    }
}
