//! Per-CA mutual exclusion.
//!
//! Each CA directory has one scope. An operation takes the scope of every CA
//! it mutates before its first existence check and holds it until its last
//! write. Scopes are always taken in path order, so a parent is locked before
//! any of its children.
//!
//! A scope nobody holds or waits on is dropped the next time any scope is
//! taken, so the registry stays proportional to the CAs in use.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};

/// Held scope of one CA directory.
pub type ScopeGuard = ArcMutexGuard<RawMutex, ()>;

/// Registry of per-path scopes.
#[derive(Debug, Default)]
pub struct LockRegistry {
    scopes: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl LockRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn scope(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut scopes = self.scopes.lock();
        // Only the registry refers to an idle scope.
        scopes.retain(|_, scope| Arc::strong_count(scope) > 1);
        Arc::clone(scopes.entry(path.to_path_buf()).or_default())
    }

    /// Blocks until the scope of `path` is held.
    pub fn lock(&self, path: &Path) -> ScopeGuard {
        self.scope(path).lock_arc()
    }

    /// Takes the scopes of several paths in path order.
    ///
    /// Duplicate paths are locked once.
    pub fn lock_all(&self, paths: &[&Path]) -> Vec<ScopeGuard> {
        let mut ordered: Vec<&Path> = paths.to_vec();
        ordered.sort();
        ordered.dedup();
        ordered.into_iter().map(|path| self.lock(path)).collect()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.scopes.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn same_path_shares_a_scope() {
        let registry = LockRegistry::new();
        let a = registry.scope(Path::new("/pki/roots/a"));
        let b = registry.scope(Path::new("/pki/roots/a"));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn idle_scopes_are_pruned() {
        let registry = LockRegistry::new();
        let held = registry.lock(Path::new("/pki/roots/a"));
        drop(registry.lock(Path::new("/pki/roots/b")));
        drop(registry.lock(Path::new("/pki/roots/c")));
        assert_eq!(registry.len(), 2);

        // a is still held, c went idle when its guard dropped
        let _other = registry.lock(Path::new("/pki/roots/d"));
        assert_eq!(registry.len(), 2);
        drop(held);
        drop(registry.lock(Path::new("/pki/roots/e")));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn held_scope_blocks_try_lock() {
        let registry = LockRegistry::new();
        let path = Path::new("/pki/roots/a");
        let _guard = registry.lock(path);
        assert!(registry.scope(path).try_lock().is_none());
        assert!(registry.scope(Path::new("/pki/roots/b")).try_lock().is_some());
    }

    #[test]
    fn lock_all_orders_and_dedups() {
        let registry = LockRegistry::new();
        let parent = Path::new("/pki/roots/a");
        let child = Path::new("/pki/roots/a/intermed-ca/b");
        let guards = registry.lock_all(&[child, parent, child]);
        assert_eq!(guards.len(), 2);
        assert!(registry.scope(parent).try_lock().is_none());
        assert!(registry.scope(child).try_lock().is_none());
        drop(guards);
        assert!(registry.scope(parent).try_lock().is_some());
    }

    #[test]
    fn scope_serializes_read_modify_write() {
        let registry = Arc::new(LockRegistry::new());
        let counter = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..100 {
                        let _guard = registry.lock(Path::new("/pki/roots/a"));
                        let value = counter.load(Ordering::Relaxed);
                        thread::yield_now();
                        counter.store(value + 1, Ordering::Relaxed);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(counter.load(Ordering::Relaxed), 800);
    }
}
