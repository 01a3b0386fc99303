//! Authorization of presented values against a rotating secret.
//!
//! The cached current version is always tried first and never costs a
//! remote call. Each cached slot is refreshed at most once per cool-down
//! period, measured from when it was last fetched. Previous and pending
//! versions are only tolerated while current was fetched less than the
//! grace period ago, which is the window around a rotation in which callers
//! may still hold the old value or already hold the new one.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::instrument;

use super::cache::{SecretCache, SecretSnapshot};
use super::error::{AuthError, StoreError};
use super::store::SecretStore;
use super::types::VersionStage;

pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(15);
pub const DEFAULT_COOL_DOWN_PERIOD: Duration = Duration::from_secs(15);

/// Timing rules for the authorizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorizerConfig {
    /// How long after current was last fetched previous and pending versions
    /// are still accepted.
    pub grace_period: Duration,
    /// Minimum time between two fetches of the same cached slot.
    pub cool_down_period: Duration,
}

impl AuthorizerConfig {
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn with_cool_down_period(mut self, cool_down_period: Duration) -> Self {
        self.cool_down_period = cool_down_period;
        self
    }
}

impl Default for AuthorizerConfig {
    fn default() -> Self {
        Self { grace_period: DEFAULT_GRACE_PERIOD, cool_down_period: DEFAULT_COOL_DOWN_PERIOD }
    }
}

/// Result of one authorization attempt.
#[derive(Debug)]
pub struct Authorization {
    pub result: Result<(), AuthError>,
    /// True iff the store was consulted during the attempt.
    pub used_remote_call: bool,
}

impl Authorization {
    fn local(result: Result<(), AuthError>) -> Self {
        Self { result, used_remote_call: false }
    }

    pub fn is_authorized(&self) -> bool {
        self.result.is_ok()
    }
}

#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, secret_id: &str, presented: &str) -> Authorization;
}

/// Authorizer backed by a [`SecretStore`] and a shared [`SecretCache`].
pub struct DefaultAuthorizer {
    store: Arc<dyn SecretStore>,
    cache: Arc<SecretCache>,
    config: AuthorizerConfig,
}

/// Working copy of the cache slots for one authorization.
struct Slots {
    current: SecretSnapshot,
    previous: SecretSnapshot,
    pending: SecretSnapshot,
    remote: bool,
}

impl DefaultAuthorizer {
    pub fn new(store: Arc<dyn SecretStore>, cache: Arc<SecretCache>, config: AuthorizerConfig) -> Self {
        Self { store, cache, config }
    }

    pub fn config(&self) -> &AuthorizerConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<SecretCache> {
        &self.cache
    }

    /// Fetch one stage, stamped with the time of the fetch. A missing version
    /// is an empty snapshot, not an error.
    async fn fetch(&self, secret_id: &str, stage: VersionStage) -> Result<SecretSnapshot, StoreError> {
        match self.store.get_secret_value(secret_id, stage, None).await {
            Ok(fetched) => {
                tracing::debug!(secret_id = %secret_id, stage = %stage, "Refreshed secret version");
                Ok(SecretSnapshot::new(fetched.value, Utc::now()))
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!(secret_id = %secret_id, stage = %stage, "Secret version not found");
                Ok(SecretSnapshot::empty())
            }
            Err(e) => Err(e),
        }
    }

    /// Refresh the slots the timing rules allow and report whether any of
    /// them matches.
    async fn confirm(
        &self,
        secret_id: &str,
        presented: &str,
        now: DateTime<Utc>,
        slots: &mut Slots,
    ) -> Result<bool, StoreError> {
        let cool_down = self.config.cool_down_period;

        if slots.current.older_than(now, cool_down) {
            slots.remote = true;
            slots.current = self.fetch(secret_id, VersionStage::Current).await?;
            if slots.current.matches(presented) {
                return Ok(true);
            }
        }

        if !slots.current.younger_than(now, self.config.grace_period) {
            return Ok(false);
        }

        if slots.previous.older_than(now, cool_down) {
            slots.remote = true;
            slots.previous = self.fetch(secret_id, VersionStage::Previous).await?;
        }
        if slots.previous.matches(presented) {
            tracing::debug!(secret_id = %secret_id, "Accepted previous version within grace period");
            return Ok(true);
        }

        if slots.pending.older_than(now, cool_down) {
            slots.remote = true;
            slots.pending = self.fetch(secret_id, VersionStage::Pending).await?;
        }
        if slots.pending.matches(presented) {
            tracing::debug!(secret_id = %secret_id, "Accepted pending version within grace period");
            return Ok(true);
        }

        Ok(false)
    }
}

#[async_trait]
impl Authorizer for DefaultAuthorizer {
    #[instrument(skip(self, presented))]
    async fn authorize(&self, secret_id: &str, presented: &str) -> Authorization {
        if presented.is_empty() {
            return Authorization::local(Err(AuthError::InvalidInput));
        }
        if self.cache.is_blacklisted(presented) {
            return Authorization::local(Err(AuthError::Unauthorized));
        }

        let view = self.cache.get();
        if view.current.matches(presented) {
            return Authorization::local(Ok(()));
        }

        let mut slots =
            Slots { current: view.current, previous: view.previous, pending: view.pending, remote: false };
        let outcome = self.confirm(secret_id, presented, Utc::now(), &mut slots).await;

        let Slots { current, previous, pending, remote } = slots;
        if remote {
            self.cache.set(current, previous, pending);
        }

        let result = match outcome {
            Ok(true) => Ok(()),
            Ok(false) => {
                self.cache.blacklist(presented);
                tracing::debug!("Rejected value added to blacklist");
                Err(AuthError::Unauthorized)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Secret store unavailable during authorization");
                Err(AuthError::AuthorizationFailed(e))
            }
        };

        Authorization { result, used_remote_call: remote }
    }
}
