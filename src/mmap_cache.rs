//! Content-addressed mmap cache with LRU eviction under bounded fd/byte
//! budgets. The teacher repo has no mmap usage at all (it streams files
//! with plain `File::read`), so this is grounded on `memmap2` usage in the
//! sibling example pack (the dependency this module is built on) combined
//! with the original implementation's `mmc_map`/`mmc_unmap`/`mmc_cleanup`
//! key design: `(device, inode, size, mtime)` identifies a mapping, shared
//! by concurrent requests via refcounting.

use std::collections::HashMap;
use std::fs::File;
use std::os::unix::fs::MetadataExt;
use std::sync::Arc;

use memmap2::Mmap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub device: u64,
    pub inode: u64,
    pub size: u64,
    pub mtime: i64,
}

impl CacheKey {
    pub fn from_metadata(meta: &std::fs::Metadata) -> Self {
        CacheKey { device: meta.dev(), inode: meta.ino(), size: meta.size(), mtime: meta.mtime() }
    }
}

struct Entry {
    mapping: Arc<Mmap>,
    refcount: usize,
    last_atime_millis: u64,
}

pub struct MmapCache {
    entries: HashMap<CacheKey, Entry>,
    desired_max_files: usize,
    desired_max_bytes: u64,
}

impl MmapCache {
    pub fn new(desired_max_files: usize, desired_max_bytes: u64) -> Self {
        MmapCache { entries: HashMap::new(), desired_max_files, desired_max_bytes }
    }

    pub fn live_bytes(&self) -> u64 {
        self.entries.keys().map(|k| k.size).sum()
    }

    pub fn live_files(&self) -> usize {
        self.entries.len()
    }

    /// Maps `file` (whose metadata must match `key`), or returns the
    /// existing shared mapping if one is live for this key. Returns `None`
    /// for zero-length files or on mmap failure, per the design's
    /// documented failure mode.
    pub fn map(&mut self, key: CacheKey, file: &File, now_millis: u64) -> Option<Arc<Mmap>> {
        if key.size == 0 {
            return None;
        }
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.refcount += 1;
            entry.last_atime_millis = now_millis;
            return Some(Arc::clone(&entry.mapping));
        }

        let mapping = unsafe { Mmap::map(file).ok()? };
        let mapping = Arc::new(mapping);
        self.entries.insert(
            key,
            Entry { mapping: Arc::clone(&mapping), refcount: 1, last_atime_millis: now_millis },
        );
        Some(mapping)
    }

    /// Decrements the refcount for `key`. The mapping itself stays resident
    /// (available for immediate reuse, or for `cleanup` to evict later) —
    /// dropping it here would defeat sharing across concurrent requests.
    pub fn unmap(&mut self, key: &CacheKey) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.refcount = entry.refcount.saturating_sub(1);
        }
    }

    /// Evicts unreferenced, least-recently-used entries while either soft
    /// limit is exceeded, and drops any entry whose stat no longer matches
    /// a fresh one (the file changed or was replaced since mapping).
    pub fn cleanup(&mut self, now_stats: impl Fn(&CacheKey) -> Option<std::fs::Metadata>) {
        let stale: Vec<CacheKey> = self
            .entries
            .keys()
            .filter(|k| match now_stats(k) {
                Some(meta) => CacheKey::from_metadata(&meta) != **k,
                None => true,
            })
            .copied()
            .collect();
        for key in stale {
            if self.entries.get(&key).is_some_and(|e| e.refcount == 0) {
                self.entries.remove(&key);
            }
        }

        while self.live_files() > self.desired_max_files || self.live_bytes() > self.desired_max_bytes {
            let victim = self
                .entries
                .iter()
                .filter(|(_, e)| e.refcount == 0)
                .min_by_key(|(_, e)| e.last_atime_millis)
                .map(|(k, _)| *k);
            match victim {
                Some(k) => {
                    self.entries.remove(&k);
                }
                None => break, // everything referenced; soft limit stays exceeded
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn tmp_file(contents: &[u8]) -> (tempfile::NamedTempFile, CacheKey) {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents).unwrap();
        f.flush().unwrap();
        let meta = f.as_file().metadata().unwrap();
        let key = CacheKey::from_metadata(&meta);
        (f, key)
    }

    #[test]
    fn zero_length_file_is_not_mapped() {
        let (f, key) = tmp_file(b"");
        let mut cache = MmapCache::new(10, 1_000_000);
        assert!(cache.map(key, f.as_file(), 0).is_none());
    }

    #[test]
    fn concurrent_requests_share_one_mapping() {
        let (f, key) = tmp_file(b"hello world");
        let mut cache = MmapCache::new(10, 1_000_000);
        let a = cache.map(key, f.as_file(), 0).unwrap();
        let b = cache.map(key, f.as_file(), 1).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.live_files(), 1);
    }

    #[test]
    fn eviction_never_touches_referenced_entry() {
        let (f, key) = tmp_file(b"0123456789");
        let mut cache = MmapCache::new(0, 0);
        let _held = cache.map(key, f.as_file(), 0).unwrap();
        cache.cleanup(|_| None);
        assert_eq!(cache.live_files(), 1);
    }

    #[test]
    fn unreferenced_entry_is_evicted_under_soft_limit() {
        let (f, key) = tmp_file(b"0123456789");
        let mut cache = MmapCache::new(0, 0);
        {
            let _m = cache.map(key, f.as_file(), 0).unwrap();
            cache.unmap(&key);
        }
        cache.cleanup(|k| {
            if *k == key {
                Some(f.as_file().metadata().unwrap())
            } else {
                None
            }
        });
        assert_eq!(cache.live_files(), 0);
    }
}
