//! The ordered-sequence adapter over [`Dict`].
//!
//! Synthetic keys are signed integers encoded as decimal strings: append
//! draws from an ever-increasing counter starting at `0`, and the one
//! kind of insert the format supports cheaply -- at the very front --
//! draws from an ever-decreasing counter starting at `-1`. Sorting those
//! keys numerically ascending therefore always reproduces list order
//! without ever renumbering an existing element.

use std::path::PathBuf;

use serde_json::Value;

use crate::dict::Dict;
use crate::error::{FileDictError, Result};

/// An ordered sequence of JSON values, persisted in the same crash-safe
/// file format as [`Dict`].
pub struct List {
    dict: Dict,
    /// Live synthetic keys, kept sorted ascending; this *is* list order.
    order: Vec<i64>,
    next_append: i64,
    next_prepend: i64,
}

impl List {
    /// Open or create the list at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let dict = Dict::open(path)?;
        let mut order: Vec<i64> = dict.keys().filter_map(|k| k.parse::<i64>().ok()).collect();
        order.sort_unstable();

        let next_append = order
            .iter()
            .copied()
            .filter(|&k| k >= 0)
            .max()
            .map(|m| m + 1)
            .unwrap_or(0);
        let next_prepend = order
            .iter()
            .copied()
            .filter(|&k| k < 0)
            .min()
            .map(|m| m - 1)
            .unwrap_or(-1);

        Ok(Self {
            dict,
            order,
            next_append,
            next_prepend,
        })
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the list has no elements.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Append `value` to the end of the list.
    pub fn append(&mut self, value: Value) -> Result<()> {
        let key = self.next_append;
        self.dict.set(&key.to_string(), value)?;
        self.order.push(key);
        self.next_append += 1;
        Ok(())
    }

    /// Append every value from `values`, in order.
    pub fn extend(&mut self, values: impl IntoIterator<Item = Value>) -> Result<()> {
        for value in values {
            self.append(value)?;
        }
        Ok(())
    }

    /// Insert `value` at position `i`.
    ///
    /// # Errors
    /// [`FileDictError::Unsupported`] unless `i == 0` or `i == len()`:
    /// arbitrary middle insertion is refused because it would otherwise
    /// require renumbering every later element.
    pub fn insert(&mut self, i: usize, value: Value) -> Result<()> {
        if i == self.order.len() {
            return self.append(value);
        }
        if i == 0 {
            let key = self.next_prepend;
            self.dict.set(&key.to_string(), value)?;
            self.order.insert(0, key);
            self.next_prepend -= 1;
            return Ok(());
        }
        Err(FileDictError::Unsupported(
            "List::insert only supports the front (i == 0) or the end (i == len())",
        ))
    }

    /// Fetch the value at position `i`.
    pub fn get(&mut self, i: usize) -> Result<Value> {
        let key = *self.order.get(i).ok_or(FileDictError::KeyNotFound)?;
        self.dict.get(&key.to_string())
    }

    /// Overwrite the value at position `i`, keeping its position.
    pub fn set(&mut self, i: usize, value: Value) -> Result<()> {
        let key = *self.order.get(i).ok_or(FileDictError::KeyNotFound)?;
        self.dict.set(&key.to_string(), value)
    }

    /// Remove and discard the element at position `i`.
    pub fn delete(&mut self, i: usize) -> Result<()> {
        if i >= self.order.len() {
            return Err(FileDictError::KeyNotFound);
        }
        let key = self.order.remove(i);
        self.dict.delete(&key.to_string())
    }

    /// Remove and return the last element.
    pub fn pop(&mut self) -> Result<Value> {
        let key = self.order.pop().ok_or(FileDictError::KeyNotFound)?;
        self.dict.pop(&key.to_string())
    }

    /// Remove and return the element at position `i`.
    pub fn pop_at(&mut self, i: usize) -> Result<Value> {
        if i >= self.order.len() {
            return Err(FileDictError::KeyNotFound);
        }
        let key = self.order.remove(i);
        self.dict.pop(&key.to_string())
    }

    /// Remove the first element equal to `value`.
    ///
    /// # Errors
    /// [`FileDictError::KeyNotFound`] if no element equals `value`.
    pub fn remove(&mut self, value: &Value) -> Result<()> {
        let idx = self.position(value)?.ok_or(FileDictError::KeyNotFound)?;
        self.pop_at(idx)?;
        Ok(())
    }

    /// Whether any element equals `value`.
    pub fn contains(&mut self, value: &Value) -> Result<bool> {
        Ok(self.position(value)?.is_some())
    }

    fn position(&mut self, value: &Value) -> Result<Option<usize>> {
        for idx in 0..self.order.len() {
            let key = self.order[idx];
            if self.dict.get(&key.to_string())? == *value {
                return Ok(Some(idx));
            }
        }
        Ok(None)
    }

    /// Read a contiguous run `[start, end)`, clamped to the list's
    /// bounds (out-of-range indices are truncated rather than erroring).
    pub fn slice(&mut self, start: usize, end: usize) -> Result<Vec<Value>> {
        let end = end.min(self.order.len());
        let start = start.min(end);
        let keys: Vec<i64> = self.order[start..end].to_vec();
        keys.into_iter()
            .map(|key| self.dict.get(&key.to_string()))
            .collect()
    }

    /// Drop every element, truncating the backing file to its header.
    pub fn clear(&mut self) -> Result<()> {
        self.dict.clear()?;
        self.order.clear();
        self.next_append = 0;
        self.next_prepend = -1;
        Ok(())
    }

    /// Iterate elements in list order.
    pub fn iter(&mut self) -> Iter<'_> {
        Iter {
            list: self,
            position: 0,
        }
    }

    /// Flush any pending writes to disk.
    pub fn flush(&mut self) -> Result<()> {
        self.dict.flush()
    }

    /// Consume and close the list, flushing first.
    pub fn close(self) -> Result<()> {
        self.dict.close()
    }
}

/// Iterator over a [`List`]'s elements in order.
pub struct Iter<'a> {
    list: &'a mut List,
    position: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        let key = *self.list.order.get(self.position)?;
        self.position += 1;
        Some(self.list.dict.get(&key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn values(list: &mut List) -> Vec<Value> {
        list.iter().map(|r| r.unwrap()).collect()
    }

    #[test]
    fn append_preserves_order() {
        let dir = tempdir().unwrap();
        let mut list = List::open(dir.path().join("l.fd")).unwrap();
        list.append(json!(1)).unwrap();
        list.append(json!("text")).unwrap();
        assert_eq!(values(&mut list), vec![json!(1), json!("text")]);
    }

    #[test]
    fn delete_shifts_logical_positions_not_keys() {
        let dir = tempdir().unwrap();
        let mut list = List::open(dir.path().join("l.fd")).unwrap();
        list.extend([json!(1), json!(2), json!(3), json!(4), json!(5)])
            .unwrap();
        list.delete(1).unwrap();
        list.delete(2).unwrap();
        assert_eq!(
            values(&mut list),
            vec![json!(1), json!(3), json!(5)]
        );
    }

    #[test]
    fn set_overwrites_in_place() {
        let dir = tempdir().unwrap();
        let mut list = List::open(dir.path().join("l.fd")).unwrap();
        list.extend([json!(1), json!(2), json!(3), json!(4), json!(5)])
            .unwrap();
        list.set(1, json!(true)).unwrap();
        list.set(2, Value::Null).unwrap();
        list.set(3, json!("value")).unwrap();
        assert_eq!(
            values(&mut list),
            vec![json!(1), json!(true), Value::Null, json!("value"), json!(5)]
        );
    }

    #[test]
    fn insert_at_front_is_supported() {
        let dir = tempdir().unwrap();
        let mut list = List::open(dir.path().join("l.fd")).unwrap();
        list.extend([json!(2), json!(3)]).unwrap();
        list.insert(0, json!(1)).unwrap();
        assert_eq!(values(&mut list), vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn insert_in_the_middle_is_unsupported() {
        let dir = tempdir().unwrap();
        let mut list = List::open(dir.path().join("l.fd")).unwrap();
        list.extend([json!(1), json!(2)]).unwrap();
        assert!(matches!(
            list.insert(1, json!("value")).unwrap_err(),
            FileDictError::Unsupported(_)
        ));
    }

    #[test]
    fn slice_reads_a_contiguous_run() {
        let dir = tempdir().unwrap();
        let mut list = List::open(dir.path().join("l.fd")).unwrap();
        list.extend([json!(1), json!(2), json!(3), json!(4), json!(5)])
            .unwrap();
        assert_eq!(
            list.slice(1, 4).unwrap(),
            vec![json!(2), json!(3), json!(4)]
        );
    }

    #[test]
    fn remove_drops_first_matching_value() {
        let dir = tempdir().unwrap();
        let mut list = List::open(dir.path().join("l.fd")).unwrap();
        list.extend([json!(1), json!("2"), json!(3), json!(4)])
            .unwrap();
        list.remove(&json!("2")).unwrap();
        assert_eq!(values(&mut list), vec![json!(1), json!(3), json!(4)]);
    }

    #[test]
    fn pop_without_index_removes_the_last_element() {
        let dir = tempdir().unwrap();
        let mut list = List::open(dir.path().join("l.fd")).unwrap();
        list.extend([json!(1), json!(2), json!(3), json!(4), json!(5)])
            .unwrap();
        assert_eq!(list.pop().unwrap(), json!(5));
        assert_eq!(list.pop_at(1).unwrap(), json!(2));
        assert_eq!(values(&mut list), vec![json!(1), json!(3), json!(4)]);
    }

    #[test]
    fn clear_empties_the_list() {
        let dir = tempdir().unwrap();
        let mut list = List::open(dir.path().join("l.fd")).unwrap();
        list.extend([json!(1), json!(2), json!(3)]).unwrap();
        assert!(!list.is_empty());
        list.clear().unwrap();
        assert!(list.is_empty());
    }

    #[test]
    fn contains_checks_by_value() {
        let dir = tempdir().unwrap();
        let mut list = List::open(dir.path().join("l.fd")).unwrap();
        list.extend([json!("1"), json!("2"), json!("3")]).unwrap();
        assert!(list.contains(&json!("3")).unwrap());
        assert!(!list.contains(&json!("5")).unwrap());
    }

    #[test]
    fn reopen_recovers_order_and_counters() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("l.fd");
        {
            let mut list = List::open(&path).unwrap();
            list.extend([json!(1), json!(2), json!(3)]).unwrap();
            list.insert(0, json!(0)).unwrap();
        }
        let mut list = List::open(&path).unwrap();
        assert_eq!(
            values(&mut list),
            vec![json!(0), json!(1), json!(2), json!(3)]
        );
        list.append(json!(4)).unwrap();
        list.insert(0, json!(-1)).unwrap();
        assert_eq!(
            values(&mut list),
            vec![json!(-1), json!(0), json!(1), json!(2), json!(3), json!(4)]
        );
    }
}
