//! Core rate limiter implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, trace, warn};

use super::clock::Clock;
use super::state::CounterRecord;
use super::store::StateStore;
use super::sweeper::CleanupSweeper;
use super::tokens::TokenLimitResolver;
use crate::error::StoreError;

/// Tunables for the decision engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterSettings {
    /// Requests allowed per identity when no token override applies
    pub default_budget: u64,
    /// Period of the cleanup sweeper; zero disables it
    pub cleanup_interval: Duration,
    /// How long an identity stays blocked after exceeding its budget
    pub block_duration: Duration,
}

/// The rate decision engine.
///
/// Every decision is a load, decide, persist sequence against the state
/// store, which is the only source of truth. The sequence is not atomic:
/// two concurrent checks for the same identity can both read a count below
/// the budget and both be admitted. Checks for different identities never
/// interfere.
pub struct RateLimiter {
    settings: LimiterSettings,
    tokens: Arc<dyn TokenLimitResolver>,
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    sweeper: Option<CleanupSweeper>,
}

impl RateLimiter {
    /// Create a new rate limiter.
    ///
    /// When `settings.cleanup_interval` is non-zero the cleanup sweeper is
    /// started on the current tokio runtime, so this must then be called
    /// from within one.
    pub fn new(
        settings: LimiterSettings,
        tokens: Arc<dyn TokenLimitResolver>,
        store: Arc<dyn StateStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let sweeper = (!settings.cleanup_interval.is_zero())
            .then(|| CleanupSweeper::spawn(store.clone(), settings.cleanup_interval));

        Self {
            settings,
            tokens,
            store,
            clock,
            sweeper,
        }
    }

    /// Decide whether a request from `identity` with `token` may proceed.
    ///
    /// Store failures never escape: they are logged and the request is denied.
    pub async fn allow(&self, identity: &str, token: &str) -> bool {
        let record = match self.load_record(identity).await {
            Ok(record) => record,
            Err(e) => {
                warn!(identity = %identity, error = %e, "Failed to load rate limit state");
                return false;
            }
        };

        let now = self.clock.now();
        if record.is_blocked(now, self.settings.block_duration) {
            trace!(identity = %identity, blocked_at = record.blocked_at, "Identity is blocked");
            return false;
        }

        let budget = self.effective_budget(token);
        if record.count >= budget {
            debug!(
                identity = %identity,
                budget = budget,
                "Rate limit exceeded, blocking identity"
            );
            if let Err(e) = self.store.save(&record.blocked(now)).await {
                warn!(identity = %identity, error = %e, "Failed to persist blocked state");
            }
            return false;
        }

        if let Err(e) = self.store.save(&record.incremented()).await {
            warn!(identity = %identity, error = %e, "Failed to persist request state");
            return false;
        }

        trace!(
            identity = %identity,
            count = record.count + 1,
            budget = budget,
            "Request admitted"
        );
        true
    }

    /// Stop the cleanup sweeper, if running, and wait for it to exit.
    pub async fn shutdown(&self) {
        if let Some(sweeper) = &self.sweeper {
            sweeper.shutdown().await;
        }
    }

    /// The configured settings.
    pub fn settings(&self) -> LimiterSettings {
        self.settings
    }

    /// Whether a cleanup sweeper was started for this limiter.
    pub fn has_sweeper(&self) -> bool {
        self.sweeper.is_some()
    }

    /// The budget that applies to `token`.
    fn effective_budget(&self, token: &str) -> u64 {
        match self.tokens.limit_for(token) {
            0 => self.settings.default_budget,
            limit => limit,
        }
    }

    /// Load the record for `identity`, creating and persisting a fresh one
    /// on first contact.
    async fn load_record(&self, identity: &str) -> Result<CounterRecord, StoreError> {
        match self.store.get(identity).await {
            Ok(record) => Ok(record),
            Err(e) if e.is_not_found() => {
                let record = CounterRecord::new(identity);
                self.store.save(&record).await?;
                debug!(identity = %identity, "Created rate limit state");
                Ok(record)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl super::backend::Limiter for RateLimiter {
    async fn allow(&self, identity: &str, token: &str) -> bool {
        RateLimiter::allow(self, identity, token).await
    }
}
