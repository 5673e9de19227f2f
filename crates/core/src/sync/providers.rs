//! Credit-data provider contract and the registry that picks one per account.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use super::sync_model::{ProviderKind, RemoteAccount, RemoteTransaction};
use crate::errors::{GatewayError, Result};
use crate::gateway::GatewayResult;

/// A source of credit-card balances and transactions.
#[async_trait]
pub trait CreditProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn list_accounts(&self) -> GatewayResult<Vec<RemoteAccount>>;

    /// Current balance in cents, signed as the provider reports it.
    async fn get_balance(&self, account_id: &str) -> GatewayResult<i64>;

    async fn list_transactions(
        &self,
        account_id: &str,
        since: Option<NaiveDate>,
    ) -> GatewayResult<Vec<RemoteTransaction>>;
}

/// Providers available in this process, keyed by kind.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, Arc<dyn CreditProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn CreditProvider>) {
        self.providers.insert(provider.kind(), provider);
    }

    pub fn with(mut self, provider: Arc<dyn CreditProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn get(&self, kind: ProviderKind) -> Result<Arc<dyn CreditProvider>> {
        self.providers.get(&kind).cloned().ok_or_else(|| {
            GatewayError::MissingCredentials {
                service: kind.as_str().to_string(),
            }
            .into()
        })
    }

    pub fn kinds(&self) -> Vec<ProviderKind> {
        let mut kinds: Vec<ProviderKind> = self.providers.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }
}
