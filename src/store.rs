//! Where the configurations live.
//!
//! The loading code doesn't own the configuration, it puts it into a [`Store`]. The store needs to
//! provide atomic transactions ‒ a reader of the store must see either the whole state before the
//! transaction or the whole state after it, never anything in between. That is what makes the
//! reload safe: the old configuration is deleted and the new one created in the same transaction,
//! so there's never a moment without a configuration or with two of them.
//!
//! [`MemoryStore`] is an in-process implementation. Persistent stores can implement the traits on
//! top of whatever atomic commit they have.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use log::trace;
use parking_lot::Mutex;

use crate::configuration::{ConfigId, Configuration, Entry};
use crate::error::AnyError;
use crate::value::Value;

/// Error of a store operation.
pub type StoreError = AnyError;

/// The view of a store from inside a transaction.
///
/// The changes done through this are visible to the transaction itself right away, but to nobody
/// else until the transaction commits.
pub trait Transaction {
    /// All the configurations, in the order of creation.
    fn configurations(&self) -> Vec<ConfigId>;

    fn get(&self, id: ConfigId) -> Option<Arc<Configuration>>;

    /// Deletes a configuration.
    ///
    /// Deleting one that doesn't exist is an error.
    fn delete(&mut self, id: ConfigId) -> Result<(), StoreError>;

    /// Creates a new configuration out of the entries.
    fn create(&mut self, entries: Vec<Entry>) -> Result<Arc<Configuration>, StoreError>;

    /// Sets one entry of an existing configuration.
    ///
    /// The loading never does this (it replaces the whole configuration), this is for the
    /// application to adjust a value at runtime.
    fn set_entry(&mut self, id: ConfigId, key: String, value: Value) -> Result<(), StoreError>;
}

/// A store with atomic transactions.
pub trait Store {
    /// Runs the body inside a transaction.
    ///
    /// If the body returns an error, nothing it did is applied and the error is returned.
    /// Otherwise, all the changes are published at once.
    ///
    /// The body is called once.
    fn transact(
        &self,
        body: &mut dyn FnMut(&mut dyn Transaction) -> Result<(), StoreError>,
    ) -> Result<(), StoreError>;

    /// The committed configurations, in the order of creation.
    fn configurations(&self) -> Vec<Arc<Configuration>>;
}

impl<S: Store + ?Sized> Store for Arc<S> {
    fn transact(
        &self,
        body: &mut dyn FnMut(&mut dyn Transaction) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        (**self).transact(body)
    }

    fn configurations(&self) -> Vec<Arc<Configuration>> {
        (**self).configurations()
    }
}

/// Returns the current configuration, if any was loaded.
///
/// If the store somehow holds more than one, the first created is returned.
pub fn current<S: Store + ?Sized>(store: &S) -> Option<Arc<Configuration>> {
    store
        .configurations()
        .into_iter()
        .min_by_key(|cfg| cfg.id())
}

/// A store keeping the configurations in memory.
///
/// Readers go through a lock-free snapshot, so reading the configuration is cheap and never waits
/// for a transaction. Transactions are serialized and work on a private copy of the state which is
/// swapped in as a whole on commit.
///
/// # Examples
///
/// ```rust
/// use once_cell::sync::Lazy;
/// use starconfig::{Entry, MemoryStore, Store};
///
/// static STORE: Lazy<MemoryStore> = Lazy::new(MemoryStore::new);
///
/// STORE
///     .transact(&mut |txn| {
///         txn.create(vec![Entry::new("Debug", true)])?;
///         Ok(())
///     })
///     .unwrap();
/// let cfg = starconfig::current(&*STORE).unwrap();
/// assert!(cfg.get_as::<bool>("Debug").unwrap());
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    committed: ArcSwap<Vec<Arc<Configuration>>>,
    writer: Mutex<()>,
    next_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn transact(
        &self,
        body: &mut dyn FnMut(&mut dyn Transaction) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let _writer = self.writer.lock();
        let mut txn = MemoryTransaction {
            staged: Vec::clone(&self.committed.load()),
            next_id: &self.next_id,
        };
        if let Err(e) = body(&mut txn) {
            trace!("Transaction rolled back: {}", e);
            return Err(e);
        }
        self.committed.store(Arc::new(txn.staged));
        trace!("Transaction committed");
        Ok(())
    }

    fn configurations(&self) -> Vec<Arc<Configuration>> {
        Vec::clone(&self.committed.load())
    }
}

struct MemoryTransaction<'a> {
    staged: Vec<Arc<Configuration>>,
    next_id: &'a AtomicU64,
}

impl MemoryTransaction<'_> {
    fn position(&self, id: ConfigId) -> Result<usize, StoreError> {
        self.staged
            .iter()
            .position(|cfg| cfg.id() == id)
            .ok_or_else(|| format!("No configuration {}", id).into())
    }
}

impl Transaction for MemoryTransaction<'_> {
    fn configurations(&self) -> Vec<ConfigId> {
        self.staged.iter().map(|cfg| cfg.id()).collect()
    }

    fn get(&self, id: ConfigId) -> Option<Arc<Configuration>> {
        self.staged.iter().find(|cfg| cfg.id() == id).cloned()
    }

    fn delete(&mut self, id: ConfigId) -> Result<(), StoreError> {
        let pos = self.position(id)?;
        self.staged.remove(pos);
        Ok(())
    }

    fn create(&mut self, entries: Vec<Entry>) -> Result<Arc<Configuration>, StoreError> {
        let id = ConfigId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let cfg = Arc::new(Configuration::new(id, entries));
        self.staged.push(Arc::clone(&cfg));
        Ok(cfg)
    }

    fn set_entry(&mut self, id: ConfigId, key: String, value: Value) -> Result<(), StoreError> {
        let pos = self.position(id)?;
        // Whoever holds the old Arc keeps seeing the old values.
        Arc::make_mut(&mut self.staged[pos]).set(key, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(store: &MemoryStore, entries: Vec<Entry>) -> Arc<Configuration> {
        let mut created = None;
        store
            .transact(&mut |txn| {
                created = Some(txn.create(entries.clone())?);
                Ok(())
            })
            .unwrap();
        created.unwrap()
    }

    #[test]
    fn empty_store() {
        let store = MemoryStore::new();
        assert!(current(&store).is_none());
        assert!(store.configurations().is_empty());
    }

    #[test]
    fn ids_increase() {
        let store = MemoryStore::new();
        let first = create(&store, vec![Entry::new("a", 1)]);
        let second = create(&store, vec![Entry::new("a", 2)]);
        assert!(first.id() < second.id());
        // Both present (nothing deleted them), the older one wins
        assert_eq!(2, store.configurations().len());
        assert_eq!(first.id(), current(&store).unwrap().id());
    }

    #[test]
    fn rollback_on_error() {
        let store = MemoryStore::new();
        let original = create(&store, vec![Entry::new("a", 1)]);
        let result = store.transact(&mut |txn| {
            txn.delete(original.id())?;
            txn.create(vec![Entry::new("a", 2)])?;
            assert_eq!(1, txn.configurations().len());
            Err("Refusing to commit".into())
        });
        assert_eq!("Refusing to commit", result.unwrap_err().to_string());
        let configs = store.configurations();
        assert_eq!(1, configs.len());
        assert_eq!(original, configs[0]);
    }

    #[test]
    fn delete_missing() {
        let store = MemoryStore::new();
        let result = store.transact(&mut |txn| txn.delete(ConfigId(42)));
        assert_eq!("No configuration #42", result.unwrap_err().to_string());
    }

    #[test]
    fn set_entry_copies() {
        let store = MemoryStore::new();
        let old = create(&store, vec![Entry::new("Debug", false)]);
        store
            .transact(&mut |txn| txn.set_entry(old.id(), "Debug".to_owned(), Value::Bool(true)))
            .unwrap();
        assert_eq!(Some(&Value::Bool(false)), old.get("Debug"));
        let new = current(&store).unwrap();
        assert_eq!(old.id(), new.id());
        assert_eq!(Some(&Value::Bool(true)), new.get("Debug"));
    }

    #[test]
    fn shared_through_arc() {
        let store = Arc::new(MemoryStore::new());
        create(&store, vec![Entry::new("a", 1)]);
        assert!(current(&store).is_some());
    }
}
