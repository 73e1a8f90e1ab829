//! Token based budget overrides.

use std::collections::HashMap;

/// Maps a client-supplied token to an override budget.
///
/// Returning `0` means "no override", the default budget applies.
pub trait TokenLimitResolver: Send + Sync {
    /// The override budget for `token`, or `0` when there is none.
    fn limit_for(&self, token: &str) -> u64;
}

/// Token budgets parsed from a comma separated list such as `"10,20"`.
///
/// Each entry `n` registers the token `Token{n}` with a budget of `n`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenLimitList {
    limits: HashMap<String, u64>,
}

impl TokenLimitList {
    /// Parse the list. Blank and non-numeric entries are skipped.
    pub fn parse(list: &str) -> Self {
        let limits = list
            .split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .filter_map(|value| {
                let limit = value.parse::<u64>().ok()?;
                Some((format!("Token{}", value), limit))
            })
            .collect();

        Self { limits }
    }

    /// Number of registered tokens.
    pub fn len(&self) -> usize {
        self.limits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limits.is_empty()
    }
}

impl TokenLimitResolver for TokenLimitList {
    fn limit_for(&self, token: &str) -> u64 {
        self.limits.get(token).copied().unwrap_or(0)
    }
}

impl TokenLimitResolver for HashMap<String, u64> {
    fn limit_for(&self, token: &str) -> u64 {
        self.get(token).copied().unwrap_or(0)
    }
}
