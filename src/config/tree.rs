//! The single shared configuration tree.
//!
//! Readers take lock-free snapshots through `ArcSwap`. Writers are serialized by
//! one mutex: each write clones the current tree, applies a whole merge to the
//! copy and publishes it, so a reader sees either the tree before a merge or the
//! tree after it.

use super::ConfigTree;
use super::merge::merge_into;
use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug)]
pub struct SharedTree {
    current: ArcSwap<ConfigTree>,
    write_lock: Mutex<()>,
}

impl Default for SharedTree {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedTree {
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(ConfigTree::new()),
            write_lock: Mutex::new(()),
        }
    }

    /// Current tree. Later writes do not affect the returned snapshot.
    pub fn snapshot(&self) -> Arc<ConfigTree> {
        self.current.load_full()
    }

    /// Apply `f` to a copy of the tree and publish the result atomically.
    pub fn update<R>(&self, f: impl FnOnce(&mut ConfigTree) -> R) -> R {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = ConfigTree::clone(&self.current.load());
        let result = f(&mut next);
        self.current.store(Arc::new(next));
        result
    }

    /// Deep-merge `source` over the tree.
    pub fn merge(&self, source: ConfigTree) {
        self.update(|tree| merge_into(tree, source));
    }

    /// Deep-merge `source` unless `cancelled` is set. The flag is checked under
    /// the write lock. Returns whether the merge was applied.
    pub fn merge_unless(&self, cancelled: &AtomicBool, source: ConfigTree) -> bool {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if cancelled.load(Ordering::Acquire) {
            return false;
        }
        let mut next = ConfigTree::clone(&self.current.load());
        merge_into(&mut next, source);
        self.current.store(Arc::new(next));
        true
    }

    /// Replace the whole tree.
    pub fn replace(&self, tree: ConfigTree) {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.current.store(Arc::new(tree));
    }

    /// Wait for any in-flight write to finish.
    pub fn barrier(&self) {
        drop(self.write_lock.lock().unwrap_or_else(PoisonError::into_inner));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn tree(value: Value) -> ConfigTree {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_snapshot_is_stable_across_writes() {
        let shared = SharedTree::new();
        shared.merge(tree(json!({"app": {"version": 1}})));
        let before = shared.snapshot();

        shared.merge(tree(json!({"app": {"version": 2}})));
        assert_eq!(before["app"]["version"], json!(1));
        assert_eq!(shared.snapshot()["app"]["version"], json!(2));
    }

    #[test]
    fn test_merge_unless_cancelled() {
        let shared = SharedTree::new();
        let cancelled = AtomicBool::new(false);
        assert!(shared.merge_unless(&cancelled, tree(json!({"a": 1}))));

        cancelled.store(true, Ordering::Release);
        assert!(!shared.merge_unless(&cancelled, tree(json!({"a": 2}))));
        assert_eq!(shared.snapshot()["a"], json!(1));
    }

    #[test]
    fn test_replace_and_update() {
        let shared = SharedTree::new();
        shared.merge(tree(json!({"a": 1})));
        shared.replace(ConfigTree::new());
        assert!(shared.snapshot().is_empty());

        let len = shared.update(|t| {
            t.insert("b".into(), json!(true));
            t.len()
        });
        assert_eq!(len, 1);
    }

    #[test]
    fn test_concurrent_merges_do_not_lose_keys() {
        let shared = Arc::new(SharedTree::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let shared = Arc::clone(&shared);
                std::thread::spawn(move || {
                    for j in 0..50 {
                        shared.merge(tree(json!({ format!("k{i}"): { format!("n{j}"): j } })));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = shared.snapshot();
        assert_eq!(snapshot.len(), 8);
        for i in 0..8 {
            assert_eq!(snapshot[&format!("k{i}")].as_object().unwrap().len(), 50);
        }
    }
}
