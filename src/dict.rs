//! The public mapping type: a thin, documented surface over
//! [`FileDict`] providing the standard mapping conveniences (get/set,
//! pop, setdefault, update, iteration views, vacuum).

use std::path::PathBuf;

use serde_json::Value;

use crate::engine::{Durability, FileDict};
use crate::error::{FileDictError, Result};

/// A persistent, crash-safe mapping from string keys to JSON values,
/// backed by a single append-mostly file.
///
/// ```no_run
/// use filedict::Dict;
/// use serde_json::json;
///
/// let mut db = Dict::open("data.fd")?;
/// db.set("a", json!(1))?;
/// assert_eq!(db.get("a")?, json!(1));
/// # Ok::<(), filedict::FileDictError>(())
/// ```
pub struct Dict {
    engine: FileDict,
}

impl Dict {
    /// Open or create the mapping at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            engine: FileDict::open(path)?,
        })
    }

    /// Open or create the mapping at `path`, with an explicit
    /// two-generation cache size.
    pub fn open_with_cache_size(path: impl Into<PathBuf>, cache_size: usize) -> Result<Self> {
        Ok(Self {
            engine: FileDict::open_with_options(path, cache_size, Durability::Sync)?,
        })
    }

    /// Open or create the mapping at `path` in async durability mode:
    /// faster, but a crash mid-write can lose the in-flight update
    /// instead of guaranteeing it rolls back cleanly.
    pub fn open_async(path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            engine: FileDict::open_with_options(path, 1000, Durability::Async)?,
        })
    }

    /// Fetch the value for `key`.
    ///
    /// # Errors
    /// [`FileDictError::KeyNotFound`] if `key` is absent.
    pub fn get(&mut self, key: &str) -> Result<Value> {
        self.engine.get(key)
    }

    /// Fetch the value for `key`, or `default` if `key` is absent.
    ///
    /// # Errors
    /// Any error other than [`FileDictError::KeyNotFound`] (e.g.
    /// [`FileDictError::CorruptRecord`] or an I/O failure) is surfaced
    /// rather than treated as absence.
    pub fn get_or(&mut self, key: &str, default: Value) -> Result<Value> {
        match self.engine.get(key) {
            Ok(value) => Ok(value),
            Err(FileDictError::KeyNotFound) => Ok(default),
            Err(e) => Err(e),
        }
    }

    /// Insert or overwrite `key` with `value`.
    pub fn set(&mut self, key: &str, value: Value) -> Result<()> {
        self.engine.set(key, value)
    }

    /// Remove `key`.
    ///
    /// # Errors
    /// [`FileDictError::KeyNotFound`] if `key` is absent.
    pub fn delete(&mut self, key: &str) -> Result<()> {
        self.engine.delete(key)
    }

    /// Whether `key` maps to a live value.
    pub fn contains(&self, key: &str) -> bool {
        self.engine.contains(key)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.engine.len()
    }

    /// Whether the mapping has no entries.
    pub fn is_empty(&self) -> bool {
        self.engine.is_empty()
    }

    /// Keys currently live. Iteration order is unspecified.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.engine.keys()
    }

    /// All values, read from disk. Order matches file order, not
    /// insertion order, since keys may have been relocated by reuse.
    pub fn values(&mut self) -> Result<Vec<Value>> {
        self.iter().map(|r| r.map(|(_, v)| v)).collect()
    }

    /// All `(key, value)` pairs, read from disk, in file order.
    pub fn items(&mut self) -> Result<Vec<(String, Value)>> {
        self.iter().collect()
    }

    /// Iterate live `(key, value)` pairs in file order. Safe against
    /// interleaved `get`/`set` calls between steps; deleting the key
    /// currently being yielded remains undefined behavior.
    pub fn iter(&mut self) -> crate::engine::Iter<'_> {
        self.engine.iter()
    }

    /// Drop all entries, truncating the file back to its magic header.
    pub fn clear(&mut self) -> Result<()> {
        self.engine.clear()
    }

    /// Insert every pair from `other`, overwriting existing keys.
    pub fn update(&mut self, other: impl IntoIterator<Item = (String, Value)>) -> Result<()> {
        for (key, value) in other {
            self.engine.set(&key, value)?;
        }
        Ok(())
    }

    /// Remove and return the value for `key`.
    ///
    /// # Errors
    /// [`FileDictError::KeyNotFound`] if `key` is absent.
    pub fn pop(&mut self, key: &str) -> Result<Value> {
        let value = self.engine.get(key)?;
        self.engine.delete(key)?;
        Ok(value)
    }

    /// Remove and return the value for `key`, or `default` if absent
    /// (absence is not an error in this form).
    ///
    /// # Errors
    /// Any error other than [`FileDictError::KeyNotFound`] is surfaced
    /// rather than treated as absence.
    pub fn pop_or(&mut self, key: &str, default: Value) -> Result<Value> {
        match self.pop(key) {
            Ok(value) => Ok(value),
            Err(FileDictError::KeyNotFound) => Ok(default),
            Err(e) => Err(e),
        }
    }

    /// Return the current value for `key`, inserting `default` first if
    /// absent.
    pub fn setdefault(&mut self, key: &str, default: Value) -> Result<Value> {
        match self.engine.get(key) {
            Ok(value) => Ok(value),
            Err(FileDictError::KeyNotFound) => {
                self.engine.set(key, default.clone())?;
                Ok(default)
            }
            Err(e) => Err(e),
        }
    }

    /// Rewrite the file dropping all tombstones.
    pub fn vacuum(&mut self) -> Result<()> {
        self.engine.vacuum()
    }

    /// Flush any pending writes to disk.
    pub fn flush(&mut self) -> Result<()> {
        self.engine.flush()
    }

    /// Consume and close the mapping, flushing first.
    pub fn close(self) -> Result<()> {
        self.engine.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn setdefault_does_not_overwrite_existing() {
        let dir = tempdir().unwrap();
        let mut db = Dict::open(dir.path().join("d.fd")).unwrap();
        db.setdefault("key", json!("default")).unwrap();
        assert_eq!(db.get("key").unwrap(), json!("default"));
        db.set("key", json!("value")).unwrap();
        db.setdefault("key", json!("default")).unwrap();
        assert_eq!(db.get("key").unwrap(), json!("value"));
    }

    #[test]
    fn pop_removes_and_returns() {
        let dir = tempdir().unwrap();
        let mut db = Dict::open(dir.path().join("d.fd")).unwrap();
        db.set("key", json!("value")).unwrap();
        assert_eq!(db.pop("key").unwrap(), json!("value"));
        assert!(!db.contains("key"));
        assert_eq!(
            db.pop_or("key", json!("default")).unwrap(),
            json!("default")
        );
    }

    #[test]
    fn get_or_and_pop_or_fall_back_on_missing() {
        let dir = tempdir().unwrap();
        let mut db = Dict::open(dir.path().join("d.fd")).unwrap();
        assert_eq!(
            db.get_or("missing", json!("fallback")).unwrap(),
            json!("fallback")
        );
    }

    #[test]
    fn get_or_and_pop_or_propagate_non_key_not_found_errors() {
        use std::fs;
        use std::io::{Seek, SeekFrom, Write};

        let dir = tempdir().unwrap();
        let path = dir.path().join("corrupt.fd");
        let mut db = Dict::open(&path).unwrap();
        db.set("k", json!("v")).unwrap();

        // The Key Index now points at a valid line. Corrupt that line's
        // bytes on disk directly (bypassing `Dict`, so the in-memory
        // Key Index and cache are unaffected) so the *next* `get` --
        // not recovery -- is what trips over the malformed JSON: the
        // colon separating key and value is overwritten with a byte
        // that breaks parsing without changing the line's length.
        let mut raw = fs::OpenOptions::new().write(true).open(&path).unwrap();
        let bytes = fs::read(&path).unwrap();
        let colon = bytes.iter().position(|&b| b == b':').unwrap();
        raw.seek(SeekFrom::Start(colon as u64)).unwrap();
        raw.write_all(b"#").unwrap();
        drop(raw);

        let err = db.get_or("k", json!("fallback")).unwrap_err();
        assert!(matches!(err, FileDictError::CorruptRecord { .. }));
    }

    #[test]
    fn update_overwrites_existing_and_adds_new() {
        let dir = tempdir().unwrap();
        let mut db = Dict::open(dir.path().join("d.fd")).unwrap();
        db.set("a", json!(1)).unwrap();
        db.update(vec![
            ("a".to_owned(), json!(10)),
            ("b".to_owned(), json!(2)),
        ])
        .unwrap();
        assert_eq!(db.get("a").unwrap(), json!(10));
        assert_eq!(db.get("b").unwrap(), json!(2));
    }

    #[test]
    fn items_and_values_reflect_all_entries() {
        let dir = tempdir().unwrap();
        let mut db = Dict::open(dir.path().join("d.fd")).unwrap();
        db.set("a", json!(1)).unwrap();
        db.set("b", json!(2)).unwrap();
        let mut items = db.items().unwrap();
        items.sort();
        assert_eq!(
            items,
            vec![("a".to_owned(), json!(1)), ("b".to_owned(), json!(2))]
        );
        let mut values = db.values().unwrap();
        values.sort_by_key(|v| v.to_string());
        assert_eq!(values, vec![json!(1), json!(2)]);
    }

    #[test]
    fn clear_truncates_to_empty_mapping() {
        let dir = tempdir().unwrap();
        let mut db = Dict::open(dir.path().join("d.fd")).unwrap();
        db.set("a", json!(1)).unwrap();
        db.clear().unwrap();
        assert!(db.is_empty());
        assert_eq!(db.len(), 0);
    }
}
