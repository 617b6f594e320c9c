use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a fungible token.
///
/// Both the burnable asset and collateral tokens held by vaults are
/// identified this way.
///
/// # Examples
///
/// ```
/// use collateral_ledger::core::token::TokenId;
///
/// let asset = TokenId::new("SHARE");
/// assert_eq!(asset.as_str(), "SHARE");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(String);

impl TokenId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TokenId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// The fungible asset burned against a vault and re-minted on repayment.
pub type AssetId = TokenId;

/// One kind of value a vault holds and releases on burn.
///
/// `Native` is the platform's own value unit, moved by direct value
/// transfer rather than by allowance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollateralKind {
    Native,
    Token(TokenId),
}

impl CollateralKind {
    pub fn token(id: impl Into<String>) -> Self {
        CollateralKind::Token(TokenId::new(id))
    }

    pub fn is_native(&self) -> bool {
        matches!(self, CollateralKind::Native)
    }
}

impl fmt::Display for CollateralKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollateralKind::Native => write!(f, "native"),
            CollateralKind::Token(id) => write!(f, "{}", id),
        }
    }
}

impl FromStr for CollateralKind {
    type Err = std::convert::Infallible;

    /// `"native"` parses to [`CollateralKind::Native`]; anything else names a token.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "native" => CollateralKind::Native,
            other => CollateralKind::token(other),
        })
    }
}
