//! The lock registry: soft, TTL-bounded locks kept in two score-ordered
//! indexes.
//!
//! - The **type index** (`type:locks:{type}`) lists the ids of locked
//!   resources of one type, scored by when each resource's lock lapses.
//! - The **resource index** (`resource:locks:{type}:{id}`) lists the users
//!   holding one resource, scored by each holder's own expiry.
//!
//! Nothing runs in the background. Each operation first removes every entry
//! scored at or before "now" with a single range delete, then does its work.
//! Each collection also carries a store deadline at its latest expiry, so a
//! resource that is never read again is still reclaimed.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::config::RegistryConfig;
use crate::error::{LockError, LockResult, StoreResult};
use crate::infrastructure::OrderedStore;
use crate::infrastructure_in_memory::InMemoryOrderedStore;
use crate::keys::KeyScheme;
use crate::types::{Holder, ResourceType, SweepReport, Timestamp, identifier};

/// Lowest possible score; sweeps delete everything from here up to now.
const MIN_SCORE: Timestamp = 0;

/// The main entry point. Cheap to share behind an `Arc`; all state lives in
/// the store.
pub struct LockRegistry {
    store: Arc<dyn OrderedStore>,
    clock: Arc<dyn Clock>,
    keys: KeyScheme,
    default_ttl: Duration,
}

impl LockRegistry {
    /// A registry over `store` with the default configuration.
    pub fn new(store: Arc<dyn OrderedStore>) -> Self {
        let config = RegistryConfig::default();
        Self {
            store,
            clock: Arc::new(SystemClock),
            keys: config.key_scheme(),
            default_ttl: config.default_ttl(),
        }
    }

    pub fn with_config(store: Arc<dyn OrderedStore>, config: &RegistryConfig) -> LockResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            clock: Arc::new(SystemClock),
            keys: config.key_scheme(),
            default_ttl: config.default_ttl(),
        })
    }

    /// A registry over a fresh in-memory store. Locks do not outlive the
    /// process.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryOrderedStore::new()))
    }

    /// A registry backed by SQLite at the given path.
    #[cfg(feature = "sqlite")]
    pub fn with_sqlite(path: &str, config: &RegistryConfig) -> LockResult<Self> {
        let store = crate::infrastructure_sqlite::SqliteOrderedStore::open(path)?;
        Self::with_config(Arc::new(store), config)
    }

    /// Replace the time source used for expiry decisions.
    ///
    /// The store reads its own clock for deadlines; give both the same one.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn keys(&self) -> &KeyScheme {
        &self.keys
    }

    /// Register `user_id` as a holder of the resource for the default TTL.
    /// Returns the holder's new expiry.
    pub fn acquire(
        &self,
        resource_type: &ResourceType,
        resource_id: impl Display,
        user_id: impl Display,
    ) -> LockResult<Timestamp> {
        self.acquire_for(resource_type, resource_id, user_id, self.default_ttl)
    }

    /// Register `user_id` as a holder of the resource until `now + ttl`.
    ///
    /// Acquiring again refreshes the holder's expiry. Other holders are left
    /// alone; any number of users may hold the same resource.
    pub fn acquire_for(
        &self,
        resource_type: &ResourceType,
        resource_id: impl Display,
        user_id: impl Display,
        ttl: Duration,
    ) -> LockResult<Timestamp> {
        let resource_id = identifier("resource_id", resource_id)?;
        let user_id = identifier("user_id", user_id)?;
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        if ttl_ms == 0 {
            return Err(LockError::InvalidArgument(
                "ttl must be at least one millisecond".to_string(),
            ));
        }

        let type_key = self.keys.type_key(resource_type);
        let resource_key = self.keys.resource_key(resource_type, &resource_id);

        let now = self.clock.now_ms();
        self.sweep_resource(&type_key, &resource_key, now)?;

        let expiry = now.saturating_add(ttl_ms);
        self.store.upsert(&resource_key, &user_id, expiry)?;
        self.store.set_expiration(&resource_key, expiry)?;

        // The type index entry lapses with the last live holder, which may be
        // earlier than its previous score if the caller shortened their lock.
        let type_score = self
            .store
            .range_with_scores(&resource_key, MIN_SCORE, Timestamp::MAX)?
            .last()
            .map_or(expiry, |(_, latest)| *latest);

        self.store.upsert(&type_key, &resource_id, type_score)?;
        self.store.set_expiration(&type_key, type_score)?;

        debug!(
            resource_type = %resource_type,
            resource_id = %resource_id,
            user_id = %user_id,
            expires_at = expiry,
            "Lock acquired"
        );
        Ok(expiry)
    }

    /// Drop `user_id`'s lock before it expires, e.g. when an editor closes.
    ///
    /// Removes the resource from the type index even if other users still
    /// hold it; their next acquire restores it. Releasing something that is
    /// not held is a no-op.
    pub fn release(
        &self,
        resource_type: &ResourceType,
        resource_id: impl Display,
        user_id: impl Display,
    ) -> LockResult<()> {
        let resource_id = identifier("resource_id", resource_id)?;
        let user_id = identifier("user_id", user_id)?;

        let type_key = self.keys.type_key(resource_type);
        let resource_key = self.keys.resource_key(resource_type, &resource_id);

        self.store.remove(&type_key, &resource_id)?;
        let held = self.store.remove(&resource_key, &user_id)?;

        debug!(
            resource_type = %resource_type,
            resource_id = %resource_id,
            user_id = %user_id,
            held,
            "Lock released"
        );
        Ok(())
    }

    /// Users currently holding the resource, soonest to expire first.
    pub fn holders(
        &self,
        resource_type: &ResourceType,
        resource_id: impl Display,
    ) -> LockResult<Vec<String>> {
        Ok(self
            .holder_entries(resource_type, resource_id)?
            .into_iter()
            .map(|holder| holder.user_id)
            .collect())
    }

    /// Like [`holders`](Self::holders), with each holder's expiry.
    pub fn holder_entries(
        &self,
        resource_type: &ResourceType,
        resource_id: impl Display,
    ) -> LockResult<Vec<Holder>> {
        let resource_id = identifier("resource_id", resource_id)?;
        let type_key = self.keys.type_key(resource_type);
        let resource_key = self.keys.resource_key(resource_type, &resource_id);

        let now = self.clock.now_ms();
        self.sweep_resource(&type_key, &resource_key, now)?;

        Ok(self
            .store
            .range_with_scores(&resource_key, MIN_SCORE, Timestamp::MAX)?
            .into_iter()
            .map(|(user_id, expires_at)| Holder {
                user_id,
                expires_at,
            })
            .collect())
    }

    pub fn is_locked(
        &self,
        resource_type: &ResourceType,
        resource_id: impl Display,
    ) -> LockResult<bool> {
        Ok(!self.holder_entries(resource_type, resource_id)?.is_empty())
    }

    /// Ids of the locked resources of one type, soonest to expire first.
    pub fn locked_resources(&self, resource_type: &ResourceType) -> LockResult<Vec<String>> {
        let type_key = self.keys.type_key(resource_type);

        let now = self.clock.now_ms();
        self.sweep_type(&type_key, now)?;

        Ok(self
            .store
            .range_by_score(&type_key, MIN_SCORE, Timestamp::MAX)?)
    }

    /// When `user_id`'s lock on the resource lapses, or `None` if they do
    /// not hold it.
    pub fn expiry_of(
        &self,
        resource_type: &ResourceType,
        resource_id: impl Display,
        user_id: impl Display,
    ) -> LockResult<Option<Timestamp>> {
        let resource_id = identifier("resource_id", resource_id)?;
        let user_id = identifier("user_id", user_id)?;
        let type_key = self.keys.type_key(resource_type);
        let resource_key = self.keys.resource_key(resource_type, &resource_id);

        let now = self.clock.now_ms();
        self.sweep_resource(&type_key, &resource_key, now)?;

        Ok(self.store.score_of(&resource_key, &user_id)?)
    }

    /// Reap expired entries now instead of on the next access. Sweeps the
    /// type index, plus one resource index when `resource_id` is given.
    pub fn sweep(
        &self,
        resource_type: &ResourceType,
        resource_id: Option<&str>,
    ) -> LockResult<SweepReport> {
        let type_key = self.keys.type_key(resource_type);
        let now = self.clock.now_ms();

        let report = match resource_id {
            Some(resource_id) => {
                let resource_id = identifier("resource_id", resource_id)?;
                let resource_key = self.keys.resource_key(resource_type, &resource_id);
                self.sweep_resource(&type_key, &resource_key, now)?
            }
            None => SweepReport {
                resource_entries: 0,
                type_entries: self.sweep_type(&type_key, now)?,
            },
        };
        Ok(report)
    }

    fn sweep_resource(
        &self,
        type_key: &str,
        resource_key: &str,
        at: Timestamp,
    ) -> StoreResult<SweepReport> {
        let resource_entries = self
            .store
            .remove_range_by_score(resource_key, MIN_SCORE, at)?;
        let type_entries = self.sweep_type(type_key, at)?;
        Ok(SweepReport {
            resource_entries,
            type_entries,
        })
    }

    fn sweep_type(&self, type_key: &str, at: Timestamp) -> StoreResult<usize> {
        let reaped = self.store.remove_range_by_score(type_key, MIN_SCORE, at)?;
        if reaped > 0 {
            debug!(collection = type_key, reaped, "Expired locks swept");
        }
        Ok(reaped)
    }
}

impl Default for LockRegistry {
    fn default() -> Self {
        Self::in_memory()
    }
}
