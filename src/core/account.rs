use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an account that can hold balances.
///
/// Participants, vaults and the ledger's own custody account are all
/// accounts: the ledger never distinguishes them beyond the role they
/// play in a call.
///
/// # Examples
///
/// ```
/// use collateral_ledger::core::account::AccountId;
///
/// let alice = AccountId::new("alice");
/// let vault = AccountId::new("vault-eth");
/// assert_ne!(alice, vault);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Create a new account identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the string representation of this account.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
