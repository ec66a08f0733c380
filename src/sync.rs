//! Resolution of the active filter set and its synchronization
//!
//! On startup, and whenever the host reports an external address change,
//! the active filters are picked from the first source that has any:
//!
//! 1. the address (`q` query parameters), when at least one token is present
//! 2. saved filters, when the envelope says `present: true` (even if empty)
//! 3. configured defaults
//!
//! After resolution, and after every edit, the address and storage are
//! rewritten from the store, in that order, once store listeners have run.

use crate::address::{AddressSource, AddressSync};
use crate::config::EngineConfig;
use crate::filter::Filter;
use crate::storage::{Persistence, StorageError, StorageSource};
use crate::store::{FilterChange, FilterRef, FilterStore, Subscription};
use serde::Serialize;

/// Where a resolved filter set came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterSource {
    Address,
    Saved,
    Defaults,
}

impl FilterSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterSource::Address => "address",
            FilterSource::Saved => "saved",
            FilterSource::Defaults => "defaults",
        }
    }
}

/// Outcome of one resolution pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub source: FilterSource,
    /// Tokens as read from the winning source, before dedupe
    pub tokens: Vec<String>,
}

/// Owns the filter store and keeps the address and storage in step with it
#[derive(Debug)]
pub struct FilterSync<A, S> {
    store: FilterStore,
    address: AddressSync<A>,
    persistence: Persistence<S>,
    default_filters: Vec<String>,
    resolution: Resolution,
}

impl<A: AddressSource, S: StorageSource> FilterSync<A, S> {
    /// Build the engine and run the initial resolution
    pub fn new(address: A, storage: S, config: &EngineConfig) -> Self {
        let address = AddressSync::new(address, config.query_key.as_str());
        let persistence = Persistence::new(storage, config.storage_key.as_str());
        let resolution = choose(&address, &persistence, &config.default_filters);

        let mut sync = Self {
            store: FilterStore::new(),
            address,
            persistence,
            default_filters: config.default_filters.clone(),
            resolution,
        };
        sync.apply_resolution();
        sync
    }

    /// Pick the active set again from scratch; the address wins when present
    pub fn resolve(&mut self) -> &Resolution {
        self.resolution = choose(&self.address, &self.persistence, &self.default_filters);
        self.apply_resolution();
        &self.resolution
    }

    /// The host navigated to a new location outside the engine
    pub fn on_address_changed(&mut self) -> &Resolution {
        tracing::debug!("address changed externally, resolving filters again");
        self.resolve()
    }

    pub fn resolution(&self) -> &Resolution {
        &self.resolution
    }

    pub fn store(&self) -> &FilterStore {
        &self.store
    }

    pub fn filters(&self) -> &[Filter] {
        self.store.filters()
    }

    pub fn address(&self) -> &A {
        self.address.source()
    }

    /// Mutable access for navigation; follow up with [`FilterSync::on_address_changed`]
    pub fn address_mut(&mut self) -> &mut A {
        self.address.source_mut()
    }

    pub fn storage(&self) -> &S {
        self.persistence.storage()
    }

    pub fn subscribe(&self, listener: impl FnMut(&FilterChange) + 'static) -> Subscription {
        self.store.subscribe(listener)
    }

    /// Add a filter; a token already in the store changes nothing
    pub fn add(&mut self, token: &str) -> bool {
        if !self.store.add(token) {
            return false;
        }
        self.sync_sources();
        true
    }

    /// Remove a filter by raw token or index; an absent one changes nothing
    pub fn remove<'a>(&mut self, target: impl Into<FilterRef<'a>>) -> Option<Filter> {
        let removed = self.store.remove(target)?;
        self.sync_sources();
        Some(removed)
    }

    /// Replace the active set, as the user editing the whole filter bar does
    pub fn replace_all<I, T>(&mut self, tokens: I)
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        self.store.replace_all(tokens);
        self.sync_sources();
    }

    /// Invalidate evaluation results; the token set is unchanged so
    /// neither the address nor storage is rewritten.
    pub fn mark_all_unapplied(&mut self) {
        self.store.mark_all_unapplied();
    }

    pub fn record_evaluation(&mut self, raw: &str, hits: usize) -> bool {
        self.store.record_evaluation(raw, hits)
    }

    /// Drop the saved selection so the next session falls back to defaults
    /// unless the address selects filters.
    pub fn forget_saved(&mut self) -> Result<(), StorageError> {
        self.persistence.clear()
    }

    pub fn into_parts(self) -> (FilterStore, A, S) {
        (
            self.store,
            self.address.into_source(),
            self.persistence.into_storage(),
        )
    }

    fn apply_resolution(&mut self) {
        tracing::debug!(
            source = self.resolution.source.as_str(),
            filters = self.resolution.tokens.len(),
            "resolved filters"
        );
        self.store.replace_all(&self.resolution.tokens);
        self.sync_sources();
    }

    fn sync_sources(&mut self) {
        let tokens = self.store.tokens();
        self.address.write(&tokens);
        if let Err(e) = self.persistence.save(&tokens) {
            tracing::warn!("failed to save filters: {e}");
        }
    }
}

fn choose<A: AddressSource, S: StorageSource>(
    address: &AddressSync<A>,
    persistence: &Persistence<S>,
    defaults: &[String],
) -> Resolution {
    if let Some(tokens) = address.read() {
        return Resolution {
            source: FilterSource::Address,
            tokens,
        };
    }

    match persistence.load() {
        Some(saved) if saved.present => Resolution {
            source: FilterSource::Saved,
            tokens: saved.filters,
        },
        _ => Resolution {
            source: FilterSource::Defaults,
            tokens: defaults.to_vec(),
        },
    }
}
