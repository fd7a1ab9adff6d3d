//! Token identifiers and the declared token catalog.
//!
//! A *token* (informally: a cube) is an abstract visibility toggle kept in
//! sync across the two devices of a game session.  Tokens are identified by
//! opaque strings such as `"cube_1"`.  The set of valid identifiers is fixed
//! for a session and declared up front in the application configuration —
//! tokens are never created dynamically.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier for one token.
///
/// Uniqueness is scoped to one game session.  The newtype exists so that
/// token ids cannot be confused with other strings (peer names, addresses)
/// at API boundaries; it imposes no syntax of its own — membership in the
/// [`TokenCatalog`] is the only validity check.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(String);

impl TokenId {
    /// Creates a token id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TokenId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TokenId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// The fixed set of token ids declared for one game session.
///
/// Every state change is validated against the catalog: a device never
/// activates a token it does not know about, regardless of what arrives over
/// the wire.  Duplicate declarations collapse (set semantics).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenCatalog {
    tokens: HashSet<TokenId>,
}

impl TokenCatalog {
    /// Builds a catalog from the declared token ids.
    pub fn new(tokens: impl IntoIterator<Item = TokenId>) -> Self {
        Self {
            tokens: tokens.into_iter().collect(),
        }
    }

    /// Returns `true` if `id` is a declared token.
    pub fn contains(&self, id: &TokenId) -> bool {
        self.tokens.contains(id)
    }

    /// Number of declared tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns `true` if no tokens are declared.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Iterates over the declared token ids in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &TokenId> {
        self.tokens.iter()
    }
}
