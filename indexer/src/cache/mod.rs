//! In-memory address to surrogate id map, backed by storage.
//!
//! One cache serves one `(chain, role)` pair. It is read and written from many concurrent
//! transforms, so the map is a lock-striped [`DashMap`]. Ids are assigned by storage only: the
//! cache never invents one, it learns them by querying storage after an insert.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use indexer_resilience::{retry_query, RetryParams, RetryResult};
use tracing::{debug, error, info, warn};

use crate::core::client::database::{DatabaseClient, DatabaseError};
use crate::types::AddressRole;
use crate::utils::metrics::INDEXER_METRICS;

/// What one [`AddressCache::address_solver`] call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolveSummary {
    /// Distinct non-empty addresses asked for
    pub requested: usize,
    pub cached: usize,
    /// Already in storage but missing from the cache
    pub recovered_from_storage: usize,
    /// Newly inserted and resolved
    pub inserted: usize,
    /// Still without an id, only possible through the one-by-one fallback
    pub unresolved: usize,
}

pub struct AddressCache {
    db: Arc<dyn DatabaseClient>,
    chain_name: String,
    role: AddressRole,
    addresses: DashMap<String, i32>,
    high_water_mark: AtomicI32,
}

impl AddressCache {
    pub fn new(db: Arc<dyn DatabaseClient>, chain_name: impl Into<String>, role: AddressRole) -> Self {
        Self {
            db,
            chain_name: chain_name.into(),
            role,
            addresses: DashMap::new(),
            high_water_mark: AtomicI32::new(0),
        }
    }

    pub fn role(&self) -> AddressRole {
        self.role
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Replace the cache contents with every address in storage.
    pub async fn load_addresses(&self) -> Result<usize, DatabaseError> {
        let (stored, max_id) = self.db.get_all_addresses(&self.chain_name, self.role, 0).await?;
        self.addresses.clear();
        let loaded = stored.len();
        self.merge(stored);
        self.high_water_mark.store(max_id, Ordering::Release);

        info!(role = %self.role, chain = %self.chain_name, loaded, max_id, "Address cache loaded");
        Ok(loaded)
    }

    /// Pull only addresses stored since the last load or refresh.
    pub async fn refresh(&self) -> Result<usize, DatabaseError> {
        let since = self.high_water_mark.load(Ordering::Acquire);
        let (stored, max_id) = self.db.get_all_addresses(&self.chain_name, self.role, since).await?;
        let added = stored.len();
        self.merge(stored);
        self.high_water_mark.fetch_max(max_id, Ordering::AcqRel);

        debug!(role = %self.role, since, added, "Address cache refreshed");
        Ok(added)
    }

    /// Make sure every address has a surrogate id.
    ///
    /// Unknown addresses are first looked up in storage, then bulk inserted with `retry`. When
    /// every bulk attempt fails and `allow_one_by_one_fallback` is set, the remaining addresses
    /// are inserted individually and per-address failures are only logged. Without the fallback
    /// the last bulk error is returned.
    pub async fn address_solver(
        &self,
        addresses: &[String],
        retry: &RetryParams,
        allow_one_by_one_fallback: bool,
    ) -> Result<SolveSummary, DatabaseError> {
        let distinct: HashSet<&str> = addresses.iter().map(String::as_str).filter(|a| !a.is_empty()).collect();
        let mut summary = SolveSummary { requested: distinct.len(), ..Default::default() };

        let unknown: Vec<String> =
            distinct.into_iter().filter(|a| !self.addresses.contains_key(*a)).map(str::to_string).collect();
        summary.cached = summary.requested - unknown.len();
        if unknown.is_empty() {
            return Ok(summary);
        }

        // Another writer may have stored some of them already.
        let existing = self.db.find_existing_addresses(&unknown, &self.chain_name, self.role).await?;
        summary.recovered_from_storage = existing.len();
        let missing: Vec<String> = unknown.into_iter().filter(|a| !existing.contains_key(a)).collect();
        self.merge(existing);
        if missing.is_empty() {
            return Ok(summary);
        }

        self.insert_missing(&missing, retry, allow_one_by_one_fallback).await?;

        let assigned = self.db.find_existing_addresses(&missing, &self.chain_name, self.role).await?;
        summary.inserted = assigned.len();
        summary.unresolved = missing.len() - assigned.len();
        self.merge(assigned);

        INDEXER_METRICS.addresses_inserted.add(summary.inserted as u64, &[]);
        if summary.unresolved > 0 {
            warn!(role = %self.role, unresolved = summary.unresolved, "Some addresses are still without an id");
        }
        debug!(role = %self.role, ?summary, "Addresses solved");
        Ok(summary)
    }

    async fn insert_missing(
        &self,
        missing: &[String],
        retry: &RetryParams,
        allow_one_by_one_fallback: bool,
    ) -> Result<(), DatabaseError> {
        let db = &self.db;
        let chain_name = self.chain_name.as_str();
        let role = self.role;

        let error = match retry_query(*retry, move |_| db.insert_addresses(missing, chain_name, role)).await {
            RetryResult::Success(()) => return Ok(()),
            RetryResult::Failure { error, attempts } => {
                error!(role = %role, count = missing.len(), attempts, error = %error, "Bulk address insert failed");
                error
            }
        };

        if !allow_one_by_one_fallback {
            return Err(error);
        }

        warn!(role = %role, count = missing.len(), "Falling back to one-by-one address inserts");
        for address in missing {
            if let Err(e) = db.insert_addresses(std::slice::from_ref(address), chain_name, role).await {
                error!(role = %role, address = %address, error = %e, "Address insert failed");
            }
        }
        Ok(())
    }

    fn merge(&self, resolved: HashMap<String, i32>) {
        for (address, id) in resolved {
            self.addresses.insert(address, id);
        }
    }

    /// Surrogate id of `address`, 0 if it was never resolved.
    pub fn get_address(&self, address: &str) -> i32 {
        self.addresses.get(address).map(|id| *id).unwrap_or(0)
    }

    pub fn get_addresses(&self, addresses: &[String]) -> Vec<i32> {
        addresses.iter().map(|a| self.get_address(a)).collect()
    }
}
