//! Copy-on-write parameter bag attached to each session.
//!
//! Readers clone an `Arc` of the current map and never block writers for longer
//! than a pointer swap. Writers serialize on a mutex and publish a fresh map.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

pub type ParamValue = Arc<dyn Any + Send + Sync>;

type ParamMap = HashMap<String, ParamValue>;

#[derive(Default)]
pub struct Params {
    writer: Mutex<()>,
    current: RwLock<Arc<ParamMap>>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self) -> Arc<ParamMap> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut ParamMap),
    {
        let _writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let mut next = ParamMap::clone(&self.snapshot());
        f(&mut next);
        let next = Arc::new(next);
        match self.current.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    pub fn set<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
        let key = key.into();
        let value: ParamValue = Arc::new(value);
        self.update(move |map| {
            map.insert(key, value);
        });
    }

    /// Typed lookup; `None` when absent or stored under a different type
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.snapshot().get(key).cloned()?.downcast::<T>().ok()
    }

    pub fn get_raw(&self, key: &str) -> Option<ParamValue> {
        self.snapshot().get(key).cloned()
    }

    pub fn remove(&self, key: &str) -> bool {
        let mut removed = false;
        self.update(|map| removed = map.remove(key).is_some());
        removed
    }

    pub fn contains(&self, key: &str) -> bool {
        self.snapshot().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}
