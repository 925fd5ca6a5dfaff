//! Shared object pool
//!
//! Plugins publish services here during `initialize` and look up the
//! services of their dependencies in `extensions_initialized`. Objects are
//! found by type.

use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

struct PoolEntry {
    type_id: TypeId,
    type_name: &'static str,
    object: Arc<dyn Any + Send + Sync>,
}

/// Thread safe, cheaply cloneable handle to the pool
#[derive(Clone, Default)]
pub struct ObjectPool {
    entries: Arc<RwLock<Vec<PoolEntry>>>,
}

impl ObjectPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish an object
    pub fn add_object<T: Any + Send + Sync>(&self, object: Arc<T>) {
        tracing::trace!("Object pool: adding {}", std::any::type_name::<T>());
        self.entries.write().push(PoolEntry {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            object,
        });
    }

    /// Withdraw a previously published object
    ///
    /// Returns `false` if the object was not in the pool.
    pub fn remove_object<T: Any + Send + Sync>(&self, object: &Arc<T>) -> bool {
        let target = Arc::as_ptr(object) as *const ();
        let mut entries = self.entries.write();
        match entries
            .iter()
            .position(|entry| Arc::as_ptr(&entry.object) as *const () == target)
        {
            Some(position) => {
                entries.remove(position);
                true
            }
            None => false,
        }
    }

    /// First published object of type `T`
    pub fn get_object<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.entries
            .read()
            .iter()
            .find(|entry| entry.type_id == TypeId::of::<T>())
            .and_then(|entry| entry.object.clone().downcast::<T>().ok())
    }

    /// All published objects of type `T`, in publication order
    pub fn get_objects<T: Any + Send + Sync>(&self) -> Vec<Arc<T>> {
        self.entries
            .read()
            .iter()
            .filter(|entry| entry.type_id == TypeId::of::<T>())
            .filter_map(|entry| entry.object.clone().downcast::<T>().ok())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Type names of the objects still in the pool
    pub fn type_names(&self) -> Vec<&'static str> {
        self.entries
            .read()
            .iter()
            .map(|entry| entry.type_name)
            .collect()
    }

    pub(crate) fn clear(&self) {
        self.entries.write().clear();
    }
}

impl fmt::Debug for ObjectPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectPool")
            .field("objects", &self.type_names())
            .finish()
    }
}
