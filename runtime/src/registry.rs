//! The lifecycle registry: live transactions by name, live components by
//! [`ComponentKey`].
//!
//! Both mappings sit behind a single mutex. Callers get a [`RegistryGuard`]
//! for the duration of one operation and can only create, look up and remove
//! entries through it; the maps themselves are never exposed.
//!
//! # Example
//!
//! ```
//! use apm_bridge_core::ComponentKey;
//! use apm_bridge_runtime::registry::LifecycleRegistry;
//!
//! let registry: LifecycleRegistry<u32, u32> = LifecycleRegistry::new();
//!
//! {
//!     let mut entries = registry.lock();
//!     entries.insert_transaction("checkout".into(), 1);
//!     entries.insert_component(ComponentKey::new("checkout", "payment"), 10);
//! }
//!
//! let mut entries = registry.lock();
//! let taken = entries.take_component(&ComponentKey::new("checkout", "payment"));
//! assert_eq!(taken.map(|(transaction, component)| (*transaction, component)), Some((1, 10)));
//! ```

use apm_bridge_core::ComponentKey;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

struct Entries<T, C> {
    transactions: HashMap<String, T>,
    components: HashMap<ComponentKey, C>,
}

/// Registry of in-flight transaction and component handles.
///
/// `T` is the engine's transaction handle type and `C` its component handle
/// type. Entries never expire; a start without a matching stop stays until the
/// registry is dropped.
pub struct LifecycleRegistry<T, C> {
    entries: Mutex<Entries<T, C>>,
}

impl<T, C> LifecycleRegistry<T, C> {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Entries {
                transactions: HashMap::new(),
                components: HashMap::new(),
            }),
        }
    }

    /// Take exclusive access for one operation.
    ///
    /// A poisoned lock is recovered: every guard operation is a single map
    /// call, so a panic elsewhere cannot leave the maps half-updated.
    pub fn lock(&self) -> RegistryGuard<'_, T, C> {
        RegistryGuard {
            entries: self.entries.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Number of live transactions
    #[must_use]
    pub fn live_transactions(&self) -> usize {
        self.lock().entries.transactions.len()
    }

    /// Number of live components
    #[must_use]
    pub fn live_components(&self) -> usize {
        self.lock().entries.components.len()
    }

    /// Sorted names and keys of everything currently live.
    #[must_use]
    pub fn snapshot(&self) -> RegistrySnapshot {
        let guard = self.lock();
        let mut transactions: Vec<String> = guard.entries.transactions.keys().cloned().collect();
        let mut components: Vec<ComponentKey> = guard.entries.components.keys().cloned().collect();
        drop(guard);

        transactions.sort();
        components.sort();
        RegistrySnapshot {
            transactions,
            components,
        }
    }
}

impl<T, C> Default for LifecycleRegistry<T, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C> fmt::Debug for LifecycleRegistry<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.lock();
        f.debug_struct("LifecycleRegistry")
            .field("transactions.len()", &guard.entries.transactions.len())
            .field("components.len()", &guard.entries.components.len())
            .finish()
    }
}

/// Exclusive access to the registry for the duration of one operation.
pub struct RegistryGuard<'a, T, C> {
    entries: MutexGuard<'a, Entries<T, C>>,
}

impl<T, C> RegistryGuard<'_, T, C> {
    /// Look up a live transaction
    #[must_use]
    pub fn transaction(&self, name: &str) -> Option<&T> {
        self.entries.transactions.get(name)
    }

    /// Store a transaction handle, returning the handle it replaced
    pub fn insert_transaction(&mut self, name: String, handle: T) -> Option<T> {
        self.entries.transactions.insert(name, handle)
    }

    /// Remove a transaction, handing its handle to the caller
    pub fn remove_transaction(&mut self, name: &str) -> Option<T> {
        self.entries.transactions.remove(name)
    }

    /// Look up a live component
    #[must_use]
    pub fn component(&self, key: &ComponentKey) -> Option<&C> {
        self.entries.components.get(key)
    }

    /// Store a component handle, returning the handle it replaced
    pub fn insert_component(&mut self, key: ComponentKey, handle: C) -> Option<C> {
        self.entries.components.insert(key, handle)
    }

    /// Remove a component together with a borrow of its owning transaction.
    ///
    /// Only succeeds when both are live; otherwise nothing is removed.
    pub fn take_component(&mut self, key: &ComponentKey) -> Option<(&T, C)> {
        let entries = &mut *self.entries;
        let transaction = entries.transactions.get(key.transaction())?;
        let component = entries.components.remove(key)?;
        Some((transaction, component))
    }

    /// Remove every component filed under `transaction`, in key order.
    pub fn remove_components_of(&mut self, transaction: &str) -> Vec<(ComponentKey, C)> {
        let mut keys: Vec<ComponentKey> = self
            .entries
            .components
            .keys()
            .filter(|key| key.transaction() == transaction)
            .cloned()
            .collect();
        keys.sort();

        keys.into_iter()
            .filter_map(|key| {
                let handle = self.entries.components.remove(&key)?;
                Some((key, handle))
            })
            .collect()
    }
}

/// Point-in-time view of the registry's keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistrySnapshot {
    /// Live transaction names, sorted
    pub transactions: Vec<String>,
    /// Live component keys, sorted
    pub components: Vec<ComponentKey>,
}

impl RegistrySnapshot {
    /// Whether nothing is live
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty() && self.components.is_empty()
    }
}
