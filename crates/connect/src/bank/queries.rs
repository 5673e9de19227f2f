//! GraphQL documents sent to the bank API.

pub const PRIMARY_ACCOUNT: &str = "query CurrentUser { currentUser { accounts { id displayName } } }";

pub const SUBACCOUNTS: &str = "query CurrentUser { currentUser { accounts { id displayName subaccounts { id name overallBalance goal isPrimary note } } } }";

pub const RECENT_ACTIVITY: &str = "query RecentActivity($accountId: ID!, $pageSize: Int = 100) { account: node(id: $accountId) { ... on Account { id cashTransactions(first: $pageSize) { edges { node { id amount description occurredAt title status subaccount { id } } } } } } }";

pub const INITIATE_TRANSFER: &str = "mutation InitiateTransfer($input: InitiateTransferInput!) { initiateTransfer(input: $input) { result { id } } }";

pub const CREATE_SUBACCOUNT: &str = "mutation CreateSubaccount($input: CreateSubaccountInput!) { createSubaccount(input: $input) { result { id name overallBalance goal isPrimary note } } }";

pub const DELETE_SUBACCOUNT: &str = "mutation DeleteSubaccount($id: ID!) { deleteSubaccount(input: { subaccountId: $id }) { result { id } } }";

pub const BILLS: &str = "query CurrentUser { currentUser { accounts { billReserve { bills { id name amount anchorDate autoAdjustAmount dayOfMonth frequency frequencyInterval paused createdAt reassignmentRule { match minAmount maxAmount } } } subaccounts { id note } } } }";

pub const CREATE_BILL: &str = "mutation CreateBill($input: CreateBillInput!) { createBill(input: $input) { result { id name amount anchorDate autoAdjustAmount dayOfMonth frequency frequencyInterval paused createdAt reassignmentRule { match minAmount maxAmount } } } }";

pub const DELETE_BILL: &str = "mutation DeleteBill($id: ID!) { deleteBill(input: { billId: $id }) { result { id } } }";

pub const FUNDING_SOURCE: &str = "query CurrentUser { currentUser { accounts { billReserve { settings { funding { subaccount { displayName } } } } } } }";

pub const PHYSICAL_CARDS: &str = "query PhysicalCards { currentUser { id family { id parents { id activePhysicalDebitCard { id color status lastFour user { id firstName userSpendConfig { id selectedSpendSubaccount { id name } } } } } } } }";

pub const SET_SPEND_SUBACCOUNT: &str = "mutation SetSpendSubaccount($input: SetSpendSubaccountInput!) { setSpendSubaccount(input: $input) { result { id userSpendConfig { id selectedSpendSubaccount { id } } } } }";

pub const ACTIVITY_DETAIL: &str = "query ActivityDetail($activityId: ID!) { cashTransaction: node(id: $activityId) { ... on CashTransaction { id amount description externalMemo occurredAt status title latestDebitCardTransactionDetail { merchantName merchantAddress1 merchantCity merchantState merchantZip } } } }";
