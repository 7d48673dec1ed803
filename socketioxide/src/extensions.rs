//! A per-socket type map, gated behind the `extensions` feature (spec.md's
//! ambient extension point for attaching application state to a socket
//! outside the typed `Data<T>`/middleware path). Grounded on the doc
//! comment in the retrieved `step-finance-socketioxide/socketioxide/src/socket.rs`,
//! which describes `Socket::extensions` as a `DashMap`-backed type map.
//!
//! **Note**: this is not the same data as `http::Request::extensions()`.

use std::any::{Any, TypeId};
use std::sync::Arc;

use dashmap::DashMap;

/// A thread-safe type map keyed by `TypeId`, one value per type.
#[derive(Default)]
pub struct Extensions(DashMap<TypeId, Arc<dyn Any + Send + Sync>>);

impl Extensions {
    pub fn new() -> Self {
        Self(DashMap::new())
    }

    /// Inserts a value, returning the previous one of the same type, if any.
    pub fn insert<T: Send + Sync + 'static>(&self, val: T) -> Option<Arc<T>> {
        self.0
            .insert(TypeId::of::<T>(), Arc::new(val))
            .and_then(|prev| prev.downcast::<T>().ok())
    }

    /// Returns a clone of the stored value of type `T`, if present.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.0.get(&TypeId::of::<T>()).and_then(|v| v.clone().downcast::<T>().ok())
    }

    /// Removes and returns the stored value of type `T`, if present.
    pub fn remove<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.0.remove(&TypeId::of::<T>()).and_then(|(_, v)| v.downcast::<T>().ok())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn stores_one_value_per_type() {
        let ext = Extensions::new();
        ext.insert(42i32);
        ext.insert("hello".to_string());
        assert_eq!(*ext.get::<i32>().unwrap(), 42);
        assert_eq!(*ext.get::<String>().unwrap(), "hello");
    }

    #[test]
    fn insert_overwrites_same_type() {
        let ext = Extensions::new();
        ext.insert(1i32);
        let prev = ext.insert(2i32);
        assert_eq!(*prev.unwrap(), 1);
        assert_eq!(*ext.get::<i32>().unwrap(), 2);
    }

    #[test]
    fn remove_clears_the_slot() {
        let ext = Extensions::new();
        ext.insert(7i32);
        assert!(ext.remove::<i32>().is_some());
        assert!(ext.get::<i32>().is_none());
    }
}
