//! The mutation engine: owns the file descriptor, the Key Index, and the
//! Free-Space Index, and implements the crash-safe set/get/delete
//! protocol and vacuum compaction.
//!
//! Unlike a log-structured store that appends forever and periodically
//! merges whole generations of files, records here are reused in place
//! via the shadow-write/commit-byte trick, and compaction (vacuum)
//! rewrites a single file rather than replacing many.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::cache::TwoGenCache;
use crate::codec::{self, RECORD_LEADER, TOMBSTONE_LEADER};
use crate::error::{FileDictError, Result};
use crate::free_space::{self, FreeSpaceIndex};

/// First bytes of every valid file, before any record or tombstone.
pub const MAGIC_HEADER: &[u8] = b"# FILE-DICT v1\n";

const DEFAULT_CACHE_SIZE: usize = 1000;

/// Whether writes are flushed to disk synchronously between the shadow
/// write and the commit byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Durability {
    /// Full shadow-write + flush + commit-byte + flush protocol.
    /// Guarantees crash-safety per `set`. Default.
    Sync,
    /// Skip the intermediate flushes and write the record in one
    /// sequence. A crash mid-write may leave a torn record, which
    /// recovery treats as a tombstone (losing the update, not the file).
    Async,
}

/// The crash-safe single-file key/value engine described by the format
/// in [`MAGIC_HEADER`].
pub struct FileDict {
    path: PathBuf,
    file: File,
    index: HashMap<String, u64>,
    free: FreeSpaceIndex,
    cache: TwoGenCache,
    file_size: u64,
    durability: Durability,
}

impl FileDict {
    /// Open or create the file at `path` with the default cache size and
    /// synchronous durability.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with_options(path, DEFAULT_CACHE_SIZE, Durability::Sync)
    }

    /// Open or create the file at `path`, tuning the two-generation
    /// cache's new-generation size limit and the durability mode.
    pub fn open_with_options(
        path: impl Into<PathBuf>,
        cache_size: usize,
        durability: Durability,
    ) -> Result<Self> {
        let path = path.into();
        let existed = path.exists();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        let mut index = HashMap::new();
        let mut free = FreeSpaceIndex::new();

        let file_size = if !existed || file.metadata()?.len() == 0 {
            file.set_len(0)?;
            file.seek(SeekFrom::Start(0))?;
            file.write_all(MAGIC_HEADER)?;
            file.sync_all()?;
            MAGIC_HEADER.len() as u64
        } else {
            recover(&mut file, &mut index, &mut free)?
        };

        Ok(Self {
            path,
            file,
            index,
            free,
            cache: TwoGenCache::new(cache_size),
            file_size,
            durability,
        })
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether there are no live records.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Whether `key` maps to a live record.
    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Keys currently live. Iteration order over keys is unspecified.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }

    /// Fetch the value for `key`, consulting the cache first.
    pub fn get(&mut self, key: &str) -> Result<Value> {
        if let Some(value) = self.cache.get(key) {
            return Ok(value);
        }
        let offset = *self.index.get(key).ok_or(FileDictError::KeyNotFound)?;
        let line = self.read_line_at(offset)?;
        let (_, value) = codec::decode(strip_newline(&line), offset)?;
        self.cache.install(key.to_owned(), value.clone());
        Ok(value)
    }

    /// Insert or overwrite `key` with `value`, following the crash-safe
    /// shadow-write protocol.
    pub fn set(&mut self, key: &str, value: Value) -> Result<()> {
        check_size_limits(key, &value)?;
        let line = codec::encode(key, &value)?;
        let size = line.len() as u64;

        let old_offset = self.index.get(key).copied();

        let (off, place) = match self.free.find(size) {
            Some((slot_size, slot_offset)) => (slot_offset, slot_size),
            None => (self.file_size, size),
        };
        let appending = off == self.file_size && place == size;

        self.write_record(off, place, &line)?;

        if appending {
            self.file_size = off + size;
        }

        if let Some(old_off) = old_offset {
            // Retire the previous record only after the new one has
            // committed, so a crash between the two leaves the old
            // value live and the new one (still committed) also live --
            // never both gone.
            self.free_line(old_off)?;
        }

        self.index.insert(key.to_owned(), off);
        self.cache.invalidate(key);
        Ok(())
    }

    /// Remove `key`, turning its record into a tombstone.
    pub fn delete(&mut self, key: &str) -> Result<()> {
        let offset = self.index.remove(key).ok_or(FileDictError::KeyNotFound)?;
        self.free_line(offset)?;
        self.cache.invalidate(key);
        Ok(())
    }

    /// Drop all entries and truncate the file back to just the magic
    /// header.
    pub fn clear(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(MAGIC_HEADER)?;
        if self.durability == Durability::Sync {
            self.file.sync_all()?;
        }
        self.file_size = MAGIC_HEADER.len() as u64;
        self.index.clear();
        self.free.clear();
        self.cache.clear();
        Ok(())
    }

    /// Flush any buffered writes to disk. A no-op in terms of data
    /// already written (this engine never buffers across calls), but
    /// flushes the underlying file descriptor.
    pub fn flush(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Consume and close the engine, flushing first.
    pub fn close(mut self) -> Result<()> {
        self.flush()
    }

    /// Iterate live records in file order. Repositions the file cursor
    /// at the start of every step, so interleaved `get`/`set` calls
    /// between iteration steps never desynchronize it. Removing the key
    /// currently being yielded remains undefined behavior.
    pub fn iter(&mut self) -> Iter<'_> {
        Iter {
            engine: self,
            offset: MAGIC_HEADER.len() as u64,
        }
    }

    /// Rewrite the file dropping all tombstones, preserving the mapping.
    pub fn vacuum(&mut self) -> Result<()> {
        let tmp_path = tmp_path_for(&self.path);
        let mut tmp = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        tmp.write_all(MAGIC_HEADER)?;

        let keys: Vec<String> = self.index.keys().cloned().collect();
        let mut new_index = HashMap::with_capacity(keys.len());
        let mut pos = MAGIC_HEADER.len() as u64;
        for key in keys {
            let offset = self.index[&key];
            let line = self.read_line_at(offset)?;
            tmp.write_all(&line)?;
            new_index.insert(key, pos);
            pos += line.len() as u64;
        }
        tmp.flush()?;
        tmp.sync_all()?;
        drop(tmp);

        fs::rename(&tmp_path, &self.path)?;

        self.file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        self.index = new_index;
        self.free.clear();
        self.cache.clear();
        self.file_size = pos;
        Ok(())
    }

    /// Current on-disk file size in bytes, for tests and diagnostics.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Number of tracked free slots, for tests and diagnostics.
    pub fn free_slot_count(&self) -> usize {
        self.free.len()
    }

    fn read_line_at(&mut self, offset: u64) -> Result<Vec<u8>> {
        self.file.seek(SeekFrom::Start(offset))?;
        let mut reader = BufReader::new(&mut self.file);
        let mut line = Vec::new();
        reader.read_until(b'\n', &mut line)?;
        Ok(line)
    }

    /// Write `line` (size `S`) into a slot of `place` (`P`) bytes at
    /// `offset`.
    ///
    /// In [`Durability::Sync`] mode: shadow-write with the leading byte
    /// masked as `#`, handle any residue left over from a reused slot
    /// (`P > S`), pad over any UTF-8 continuation byte the write left
    /// exposed, flush, then commit by overwriting the leading byte with
    /// `"` and flushing again.
    ///
    /// In [`Durability::Async`] mode: the shadow prefix and intermediate
    /// flushes are skipped and the record is written in one sequence; a
    /// crash mid-write leaves a torn, non-`"`-leading line that recovery
    /// cannot parse and downgrades to a tombstone.
    fn write_record(&mut self, offset: u64, place: u64, line: &[u8]) -> Result<()> {
        let size = line.len() as u64;
        debug_assert!(place >= size);
        let diff = place - size;

        match self.durability {
            Durability::Sync => {
                self.file.seek(SeekFrom::Start(offset))?;
                self.file.write_all(&[TOMBSTONE_LEADER])?;
                self.file.write_all(&line[1..])?;
                if diff > 1 {
                    self.file.write_all(&[TOMBSTONE_LEADER])?;
                    if diff > free_space::MIN_TRACKED_SIZE {
                        self.free.insert(diff, offset + size);
                    }
                }
                // diff == 0: exact fit, nothing left over.
                // diff == 1: the old trailing '\n' becomes a lone,
                // ignorable empty line; no write needed.
                let written_through = offset + size + if diff > 1 { 1 } else { 0 };
                self.pad_continuation_bytes(written_through)?;

                self.file.sync_all()?;
                self.file.seek(SeekFrom::Start(offset))?;
                self.file.write_all(&[RECORD_LEADER])?;
                self.file.sync_all()?;
            }
            Durability::Async => {
                self.file.seek(SeekFrom::Start(offset))?;
                self.file.write_all(line)?;
                if diff > 1 {
                    self.file.write_all(&[TOMBSTONE_LEADER])?;
                    if diff > free_space::MIN_TRACKED_SIZE {
                        self.free.insert(diff, offset + size);
                    }
                }
            }
        }
        Ok(())
    }

    /// Turn the live record at `offset` into a tombstone, padding over
    /// any UTF-8 continuation bytes so the tombstone's leader never
    /// splits a multi-byte character.
    fn free_line(&mut self, offset: u64) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&[TOMBSTONE_LEADER])?;
        let mut size = 1u64;
        size += self.pad_continuation_bytes(offset + 1)?;
        if self.durability == Durability::Sync {
            self.file.sync_all()?;
        }
        // flush happened (or was skipped) above; now read back the
        // untouched remainder of the old line to learn its total length.
        let rest = self.read_line_at(offset + size)?;
        size += rest.len() as u64;
        if size > free_space::MIN_TRACKED_SIZE {
            self.free.insert(size, offset);
        }
        Ok(())
    }

    /// Starting at `offset`, overwrite any run of UTF-8 continuation
    /// bytes (`10xxxxxx`) with `.`, so an in-place write never leaves a
    /// tombstone ending mid-codepoint. Driven by inspecting the byte
    /// that actually follows the last written byte, rather than
    /// inferring from whether the line happened to end in `#`.
    fn pad_continuation_bytes(&mut self, offset: u64) -> Result<u64> {
        let mut written = 0u64;
        loop {
            self.file.seek(SeekFrom::Start(offset + written))?;
            let mut byte = [0u8; 1];
            if self.file.read(&mut byte)? == 0 {
                break;
            }
            if byte[0] & 0b1100_0000 != 0b1000_0000 {
                break;
            }
            self.file.seek(SeekFrom::Start(offset + written))?;
            self.file.write_all(b".")?;
            written += 1;
        }
        Ok(written)
    }
}

fn check_size_limits(key: &str, value: &Value) -> Result<()> {
    let key_json = serde_json::to_vec(key)?;
    if key_json.len() as u64 > u16::MAX as u64 {
        return Err(FileDictError::SizeLimitExceeded(
            "key exceeds 2^16 encoded bytes",
        ));
    }
    let value_json = serde_json::to_vec(value)?;
    if value_json.len() as u64 > u32::MAX as u64 {
        return Err(FileDictError::SizeLimitExceeded(
            "value exceeds 2^32 encoded bytes",
        ));
    }
    Ok(())
}

fn strip_newline(line: &[u8]) -> &[u8] {
    match line.last() {
        Some(b'\n') => &line[..line.len() - 1],
        _ => line,
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Linear scan of the file at open time, rebuilding the Key Index and
/// Free-Space Index. The magic header is consumed first and excluded
/// from the scan, so it is never mistakenly treated as reclaimable free
/// space the way an ordinary `#`-led line would be.
fn recover(
    file: &mut File,
    index: &mut HashMap<String, u64>,
    free: &mut FreeSpaceIndex,
) -> Result<u64> {
    file.seek(SeekFrom::Start(0))?;
    let mut header = vec![0u8; MAGIC_HEADER.len()];
    let read = {
        let mut reader = BufReader::new(&mut *file);
        reader.read(&mut header)?
    };
    if read < MAGIC_HEADER.len() || header != MAGIC_HEADER {
        return Err(FileDictError::CorruptRecord {
            offset: 0,
            reason: "missing or invalid magic header".to_owned(),
        });
    }

    let mut offset = MAGIC_HEADER.len() as u64;
    let mut reader = BufReader::new(file);
    loop {
        let mut line = Vec::new();
        let n = reader.read_until(b'\n', &mut line)?;
        if n == 0 {
            break;
        }
        let len = line.len() as u64;
        let newline_terminated = line.last() == Some(&b'\n');

        if line == b"\n" {
            offset += len;
            continue;
        }

        if line[0] == TOMBSTONE_LEADER {
            if newline_terminated {
                free.push_unsorted(len, offset);
            }
        } else {
            match codec::decode(strip_newline(&line), offset) {
                Ok((key, _value)) => {
                    index.insert(key, offset);
                }
                Err(e) => {
                    log::warn!("degraded to tombstone at offset {offset}: {e}");
                    if newline_terminated {
                        free.push_unsorted(len, offset);
                    }
                }
            }
        }
        offset += len;
    }
    free.sort();
    Ok(offset)
}

/// Iterator over live `(key, value)` pairs in file order.
pub struct Iter<'a> {
    engine: &'a mut FileDict,
    offset: u64,
}

impl<'a> Iterator for Iter<'a> {
    type Item = Result<(String, Value)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.offset >= self.engine.file_size {
                return None;
            }
            let line = match self.engine.read_line_at(self.offset) {
                Ok(line) => line,
                Err(e) => return Some(Err(e)),
            };
            if line.is_empty() {
                return None;
            }
            let start = self.offset;
            self.offset += line.len() as u64;

            if line == b"\n" || line[0] == TOMBSTONE_LEADER {
                continue;
            }
            return Some(codec::decode(strip_newline(&line), start));
        }
    }
}
