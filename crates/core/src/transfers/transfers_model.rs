use serde::{Deserialize, Serialize};

/// A transfer between two accounts. Either side may be the primary account,
/// addressed by its id or by the alias `checking`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub from_id: String,
    pub to_id: String,
    pub amount: i64,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferReceipt {
    pub from_id: String,
    pub to_id: String,
    pub amount: i64,
    pub note: String,
}
