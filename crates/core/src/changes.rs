//! Explicit record of which cached resources a mutation touched.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Logical resources exposed to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    AccountBalance,
    Subaccounts,
    Goals,
    Transactions,
    Bills,
    SyncAccounts,
    History,
    Cards,
}

impl Resource {
    /// Everything a money movement can change.
    pub fn balance_bearing() -> BTreeSet<Resource> {
        [
            Resource::AccountBalance,
            Resource::Subaccounts,
            Resource::Goals,
            Resource::Transactions,
        ]
        .into_iter()
        .collect()
    }
}

/// The result of a committed mutation plus the resources it changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mutation<T> {
    pub value: T,
    pub changed: BTreeSet<Resource>,
}

impl<T> Mutation<T> {
    pub fn new(value: T, changed: impl IntoIterator<Item = Resource>) -> Self {
        Self {
            value,
            changed: changed.into_iter().collect(),
        }
    }

    /// A mutation that committed nothing.
    pub fn unchanged(value: T) -> Self {
        Self {
            value,
            changed: BTreeSet::new(),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Mutation<U> {
        Mutation {
            value: f(self.value),
            changed: self.changed,
        }
    }

    pub fn with(mut self, resource: Resource) -> Self {
        self.changed.insert(resource);
        self
    }
}
