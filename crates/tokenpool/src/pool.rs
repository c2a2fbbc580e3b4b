//! Token pool: the authoritative set of tokens and their allocation flag.
//!
//! The pool knows nothing about time; expiry is just a stored attribute that
//! the lease manager keeps in step with its timers. It is a plain owned value,
//! serialized by whoever holds it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Opaque token identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(String);

impl TokenId {
    /// A fresh random id.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TokenId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for TokenId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for TokenId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for TokenId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: TokenId,
    /// End of the current grant period.
    pub expiry: DateTime<Utc>,
    pub allocated: bool,
}

impl Token {
    pub fn new(id: TokenId, expiry: DateTime<Utc>) -> Self {
        Self {
            id,
            expiry,
            allocated: false,
        }
    }
}

/// Tokens plus the set of ids that are free to hand out.
///
/// An id is in the available set iff its token exists and is not allocated.
/// The available set keeps insertion order, so `assign` hands out the token
/// that has been free the longest.
#[derive(Debug, Default)]
pub struct TokenPool {
    tokens: HashMap<TokenId, Token>,
    available: IndexSet<TokenId>,
}

impl TokenPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new token as available. The id must not already be present.
    pub fn add(&mut self, mut token: Token) {
        debug_assert!(
            !self.tokens.contains_key(&token.id),
            "duplicate token id {}",
            token.id
        );
        token.allocated = false;
        self.available.insert(token.id.clone());
        self.tokens.insert(token.id.clone(), token);
    }

    /// Take the oldest available token and mark it allocated.
    ///
    /// `None` means the pool is exhausted.
    pub fn assign(&mut self) -> Option<Token> {
        let id = self.available.shift_remove_index(0)?;
        let token = self.tokens.get_mut(&id)?;
        token.allocated = true;
        Some(token.clone())
    }

    /// Mark a token available again. Returns `true` if it was allocated.
    ///
    /// Unknown ids are ignored.
    pub fn unassign(&mut self, id: &TokenId) -> bool {
        let Some(token) = self.tokens.get_mut(id) else {
            return false;
        };
        if !token.allocated {
            return false;
        }
        token.allocated = false;
        self.available.insert(id.clone());
        true
    }

    /// Remove a token entirely. Unknown ids are ignored.
    pub fn delete(&mut self, id: &TokenId) -> Option<Token> {
        let token = self.tokens.remove(id)?;
        self.available.shift_remove(id);
        Some(token)
    }

    pub fn get(&self, id: &TokenId) -> Option<&Token> {
        self.tokens.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &TokenId) -> Option<&mut Token> {
        self.tokens.get_mut(id)
    }

    pub fn contains(&self, id: &TokenId) -> bool {
        self.tokens.contains_key(id)
    }

    pub fn list(&self) -> Vec<Token> {
        self.tokens.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn available(&self) -> usize {
        self.available.len()
    }

    pub fn is_available(&self, id: &TokenId) -> bool {
        self.available.contains(id)
    }
}
