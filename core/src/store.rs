//! Whole-value document store contract.
//!
//! Every path holds one JSON value. Reads return the whole value, writes replace it,
//! and writing `null` removes the path. There are no partial updates.

use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, PoisonError};

use anyhow::Result;
use serde_json::Value;

pub trait DocumentStore: Send + Sync {
    /// Whole value at `path`, or `None` when nothing is stored there.
    fn read(&self, path: &str) -> Result<Option<Value>>;

    /// Replace the whole value at `path`. `Value::Null` removes it.
    fn write(&self, path: &str, value: &Value) -> Result<()>;

    /// Live feed of the value at `path`. The current value is delivered
    /// immediately, then again after every write to that exact path.
    fn subscribe(&self, path: &str) -> Result<Subscription>;

    /// Every path that currently holds a value, sorted.
    fn paths(&self) -> Result<Vec<String>>;
}

pub struct Subscription {
    path: String,
    rx: Receiver<Option<Value>>,
}

impl Subscription {
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Drain pending deliveries and return the newest one, if any arrived
    /// since the last call.
    pub fn latest(&self) -> Option<Option<Value>> {
        let mut newest = None;
        while let Ok(value) = self.rx.try_recv() {
            newest = Some(value);
        }
        newest
    }
}

/// In-process fan-out of writes to subscribers.
#[derive(Default)]
pub struct Listeners {
    inner: Mutex<Vec<(String, Sender<Option<Value>>)>>,
}

impl Listeners {
    pub fn register(&self, path: &str, current: Option<Value>) -> Subscription {
        let (tx, rx) = mpsc::channel();
        // Receiver is alive here, so the initial send cannot fail.
        let _ = tx.send(current);
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((path.to_string(), tx));
        Subscription {
            path: path.to_string(),
            rx,
        }
    }

    pub fn notify(&self, path: &str, value: Option<&Value>) {
        let mut listeners = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        listeners.retain(|(p, tx)| p != path || tx.send(value.cloned()).is_ok());
    }
}

#[derive(Default)]
pub struct MemoryStore {
    docs: Mutex<BTreeMap<String, Value>>,
    listeners: Listeners,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for MemoryStore {
    fn read(&self, path: &str) -> Result<Option<Value>> {
        let docs = self.docs.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(docs.get(path).cloned())
    }

    fn write(&self, path: &str, value: &Value) -> Result<()> {
        {
            let mut docs = self.docs.lock().unwrap_or_else(PoisonError::into_inner);
            if value.is_null() {
                docs.remove(path);
            } else {
                docs.insert(path.to_string(), value.clone());
            }
        }
        self.listeners
            .notify(path, if value.is_null() { None } else { Some(value) });
        Ok(())
    }

    fn subscribe(&self, path: &str) -> Result<Subscription> {
        let current = self.read(path)?;
        Ok(self.listeners.register(path, current))
    }

    fn paths(&self) -> Result<Vec<String>> {
        let docs = self.docs.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(docs.keys().cloned().collect())
    }
}

/// Every stored path and its value.
pub fn export_tree<S: DocumentStore + ?Sized>(store: &S) -> Result<BTreeMap<String, Value>> {
    let mut tree = BTreeMap::new();
    for path in store.paths()? {
        if let Some(value) = store.read(&path)? {
            tree.insert(path, value);
        }
    }
    Ok(tree)
}

/// Writes each entry of `tree` as a whole value. Returns the number of paths written.
pub fn import_tree<S: DocumentStore + ?Sized>(
    store: &S,
    tree: &BTreeMap<String, Value>,
) -> Result<usize> {
    for (path, value) in tree {
        store.write(path, value)?;
    }
    Ok(tree.len())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicBool, Ordering};

    use anyhow::bail;

    use super::*;

    /// Wraps a `MemoryStore` and records every write.
    #[derive(Default)]
    pub(crate) struct SpyStore {
        pub(crate) inner: MemoryStore,
        writes: Mutex<Vec<String>>,
        fail_reads: AtomicBool,
        fail_writes: AtomicBool,
    }

    impl SpyStore {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn write_count(&self) -> usize {
            self.writes.lock().unwrap().len()
        }

        pub(crate) fn written_paths(&self) -> Vec<String> {
            self.writes.lock().unwrap().clone()
        }

        pub(crate) fn set_fail_reads(&self, fail: bool) {
            self.fail_reads.store(fail, Ordering::SeqCst);
        }

        pub(crate) fn set_fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        /// Seed a value without counting it as a write.
        pub(crate) fn seed(&self, path: &str, value: Value) {
            self.inner.write(path, &value).unwrap();
        }
    }

    impl DocumentStore for SpyStore {
        fn read(&self, path: &str) -> Result<Option<Value>> {
            if self.fail_reads.load(Ordering::SeqCst) {
                bail!("simulated read failure at {path}");
            }
            self.inner.read(path)
        }

        fn write(&self, path: &str, value: &Value) -> Result<()> {
            self.writes.lock().unwrap().push(path.to_string());
            if self.fail_writes.load(Ordering::SeqCst) {
                bail!("simulated write failure at {path}");
            }
            self.inner.write(path, value)
        }

        fn subscribe(&self, path: &str) -> Result<Subscription> {
            if self.fail_reads.load(Ordering::SeqCst) {
                bail!("simulated subscribe failure at {path}");
            }
            self.inner.subscribe(path)
        }

        fn paths(&self) -> Result<Vec<String>> {
            self.inner.paths()
        }
    }
}
