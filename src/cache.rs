//! Two-generation lookup cache.
//!
//! Approximates LRU at O(1) per access with no timestamps or linked-list
//! bookkeeping: a key's residence time is bounded between `L` and `2L`
//! accesses, where `L` is the new-generation size limit.

use std::collections::HashMap;

use serde_json::Value;

/// Key -> decoded value cache with generational eviction.
#[derive(Debug)]
pub struct TwoGenCache {
    new_gen: HashMap<String, Value>,
    old_gen: HashMap<String, Value>,
    limit: usize,
}

impl TwoGenCache {
    /// Create a cache whose new generation holds at most `limit` entries
    /// before rotating.
    pub fn new(limit: usize) -> Self {
        Self {
            new_gen: HashMap::new(),
            old_gen: HashMap::new(),
            limit,
        }
    }

    /// Look up `key`, promoting it from the old generation if found there.
    pub fn get(&mut self, key: &str) -> Option<Value> {
        if let Some(v) = self.new_gen.get(key) {
            return Some(v.clone());
        }
        if let Some(v) = self.old_gen.remove(key) {
            let value = v.clone();
            self.insert_into_new(key.to_owned(), v);
            return Some(value);
        }
        None
    }

    /// Install `value` for `key` into the new generation, as a caller
    /// does after a cache-miss disk fetch.
    pub fn install(&mut self, key: String, value: Value) {
        self.insert_into_new(key, value);
    }

    fn insert_into_new(&mut self, key: String, value: Value) {
        self.new_gen.insert(key, value);
        if self.new_gen.len() >= self.limit {
            self.old_gen = std::mem::take(&mut self.new_gen);
        }
    }

    /// Drop `key` from both generations, as `set`/`delete` must.
    pub fn invalidate(&mut self, key: &str) {
        self.new_gen.remove(key);
        self.old_gen.remove(key);
    }

    /// Drop everything, as `clear`/`vacuum` must.
    pub fn clear(&mut self) {
        self.new_gen.clear();
        self.old_gen.clear();
    }
}
