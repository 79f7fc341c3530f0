// SPDX-License-Identifier: AGPL-3.0-or-later
// RillDB - Real-Time Vector Search Engine
// Copyright (C) 2026 Sushanth Reddy Vanagala (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! LRU page cache with dirty-page writeback
//!
//! Every read and write of the block files goes through this cache. A frame
//! holds one page; dirty frames are written back when they are evicted and
//! when the owner calls `flush_all` (the sync barrier). Capacity can be
//! altered at runtime, evicting down to the new budget.
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                  PageCache                    │
//! │  (segment, page_no) → Frame{data, dirty, use} │
//! │  miss  → load()  (synchronous I/O)            │
//! │  evict → flush(key, data) when dirty          │
//! └───────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use rilldb_core::Result;

/// Page size used by the block files (64 KiB).
pub const PAGE_SIZE: usize = 64 * 1024;

/// Identifies one page of one segment file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub segment: u32,
    pub page_no: u32,
}

impl PageKey {
    pub fn new(segment: u32, page_no: u32) -> Self {
        Self { segment, page_no }
    }
}

struct Frame {
    data: Vec<u8>,
    dirty: bool,
    last_use: u64,
}

struct CacheInner {
    frames: HashMap<PageKey, Frame>,
    capacity_pages: usize,
    tick: u64,
}

/// Cache statistics
#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
    pub dirty_evictions: AtomicU64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            return 0.0;
        }
        hits as f64 / total as f64
    }
}

/// Shared LRU page cache.
pub struct PageCache {
    inner: Mutex<CacheInner>,
    stats: CacheStats,
    page_size: usize,
}

impl PageCache {
    /// Create a cache with a capacity given in mebibytes.
    pub fn new(capacity_mb: usize) -> Self {
        Self::with_page_size(capacity_mb, PAGE_SIZE)
    }

    pub fn with_page_size(capacity_mb: usize, page_size: usize) -> Self {
        let capacity_pages = (capacity_mb * 1024 * 1024 / page_size).max(1);
        Self {
            inner: Mutex::new(CacheInner {
                frames: HashMap::new(),
                capacity_pages,
                tick: 0,
            }),
            stats: CacheStats::default(),
            page_size,
        }
    }

    /// Copy `out.len()` bytes starting at `offset` within the page.
    ///
    /// `load` materializes the page on a miss; `flush` writes back a dirty
    /// victim if the miss forces an eviction.
    pub fn read_at<L, F>(
        &self,
        key: PageKey,
        offset: usize,
        out: &mut [u8],
        load: L,
        flush: F,
    ) -> Result<()>
    where
        L: FnOnce() -> Result<Vec<u8>>,
        F: FnMut(PageKey, &[u8]) -> Result<()>,
    {
        let mut inner = self.inner.lock();
        self.fault_in(&mut inner, key, load, flush)?;

        let tick = Self::next_tick(&mut inner);
        let frame = inner.frames.get_mut(&key).expect("frame just faulted in");
        frame.last_use = tick;
        let len = out.len();
        out.copy_from_slice(&frame.data[offset..offset + len]);
        Ok(())
    }

    /// Write `bytes` at `offset` within the page and mark the frame dirty.
    pub fn write_at<L, F>(
        &self,
        key: PageKey,
        offset: usize,
        bytes: &[u8],
        load: L,
        flush: F,
    ) -> Result<()>
    where
        L: FnOnce() -> Result<Vec<u8>>,
        F: FnMut(PageKey, &[u8]) -> Result<()>,
    {
        let mut inner = self.inner.lock();
        if offset == 0 && bytes.len() == self.page_size {
            // Full-page overwrite never needs the old contents.
            self.fault_in(&mut inner, key, || Ok(vec![0u8; self.page_size]), flush)?;
        } else {
            self.fault_in(&mut inner, key, load, flush)?;
        }

        let tick = Self::next_tick(&mut inner);
        let frame = inner.frames.get_mut(&key).expect("frame just faulted in");
        frame.last_use = tick;
        frame.data[offset..offset + bytes.len()].copy_from_slice(bytes);
        frame.dirty = true;
        Ok(())
    }

    /// Write back every dirty frame. Frames stay resident.
    pub fn flush_all<F>(&self, mut flush: F) -> Result<()>
    where
        F: FnMut(PageKey, &[u8]) -> Result<()>,
    {
        let mut inner = self.inner.lock();
        for (key, frame) in inner.frames.iter_mut() {
            if frame.dirty {
                flush(*key, &frame.data)?;
                frame.dirty = false;
            }
        }
        Ok(())
    }

    /// Drop frames matching the predicate without writing them back.
    /// Used when the underlying records are being truncated away.
    pub fn discard_if<P>(&self, pred: P)
    where
        P: Fn(PageKey) -> bool,
    {
        let mut inner = self.inner.lock();
        inner.frames.retain(|k, _| !pred(*k));
    }

    /// Change the capacity, evicting down to the new budget.
    pub fn set_capacity_mb<F>(&self, capacity_mb: usize, mut flush: F) -> Result<()>
    where
        F: FnMut(PageKey, &[u8]) -> Result<()>,
    {
        let mut inner = self.inner.lock();
        inner.capacity_pages = (capacity_mb * 1024 * 1024 / self.page_size).max(1);
        while inner.frames.len() > inner.capacity_pages {
            self.evict_one(&mut inner, &mut flush)?;
        }
        Ok(())
    }

    pub fn capacity_mb(&self) -> u32 {
        let inner = self.inner.lock();
        (inner.capacity_pages * self.page_size / (1024 * 1024)) as u32
    }

    pub fn memory_usage(&self) -> usize {
        self.inner.lock().frames.len() * self.page_size
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    fn next_tick(inner: &mut CacheInner) -> u64 {
        inner.tick += 1;
        inner.tick
    }

    fn fault_in<L, F>(
        &self,
        inner: &mut CacheInner,
        key: PageKey,
        load: L,
        mut flush: F,
    ) -> Result<()>
    where
        L: FnOnce() -> Result<Vec<u8>>,
        F: FnMut(PageKey, &[u8]) -> Result<()>,
    {
        if inner.frames.contains_key(&key) {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);

        while inner.frames.len() >= inner.capacity_pages {
            self.evict_one(inner, &mut flush)?;
        }

        let data = load()?;
        debug_assert_eq!(data.len(), self.page_size);
        inner.frames.insert(
            key,
            Frame {
                data,
                dirty: false,
                last_use: 0,
            },
        );
        Ok(())
    }

    fn evict_one<F>(&self, inner: &mut CacheInner, flush: &mut F) -> Result<()>
    where
        F: FnMut(PageKey, &[u8]) -> Result<()>,
    {
        let victim = inner
            .frames
            .iter()
            .min_by_key(|(_, f)| f.last_use)
            .map(|(k, _)| *k);

        let Some(key) = victim else { return Ok(()) };
        let frame = inner.frames.remove(&key).expect("victim present");
        self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        if frame.dirty {
            self.stats.dirty_evictions.fetch_add(1, Ordering::Relaxed);
            flush(key, &frame.data)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PMutex;
    use std::collections::HashMap as Map;

    fn no_flush(_k: PageKey, _d: &[u8]) -> Result<()> {
        Ok(())
    }

    #[test]
    fn test_read_after_write() {
        let cache = PageCache::with_page_size(1, 128);
        let key = PageKey::new(0, 0);

        cache
            .write_at(key, 10, b"hello", || Ok(vec![0u8; 128]), no_flush)
            .unwrap();

        let mut out = [0u8; 5];
        cache
            .read_at(key, 10, &mut out, || panic!("should hit"), no_flush)
            .unwrap();
        assert_eq!(&out, b"hello");
    }

    #[test]
    fn test_eviction_writes_back_dirty() {
        // 2-page cache, 3 distinct pages touched
        let cache = PageCache::with_page_size(1, 512 * 1024);
        let backing: PMutex<Map<PageKey, Vec<u8>>> = PMutex::new(Map::new());

        for page_no in 0..3u32 {
            let key = PageKey::new(0, page_no);
            cache
                .write_at(
                    key,
                    0,
                    &[page_no as u8; 16],
                    || Ok(vec![0u8; 512 * 1024]),
                    |k, d| {
                        backing.lock().insert(k, d.to_vec());
                        Ok(())
                    },
                )
                .unwrap();
        }

        // First page was evicted and flushed
        let flushed = backing.lock();
        let page0 = flushed.get(&PageKey::new(0, 0)).expect("page 0 flushed");
        assert_eq!(&page0[..16], &[0u8; 16]);
        assert!(cache.stats().dirty_evictions.load(Ordering::Relaxed) >= 1);
    }

    #[test]
    fn test_flush_all_clears_dirty() {
        let cache = PageCache::with_page_size(1, 256);
        let key = PageKey::new(1, 2);
        cache
            .write_at(key, 0, &[7u8; 4], || Ok(vec![0u8; 256]), no_flush)
            .unwrap();

        let count = PMutex::new(0usize);
        cache
            .flush_all(|_, _| {
                *count.lock() += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!(*count.lock(), 1);

        // Second flush has nothing to write
        cache
            .flush_all(|_, _| {
                *count.lock() += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!(*count.lock(), 1);
    }

    #[test]
    fn test_discard_skips_writeback() {
        let cache = PageCache::with_page_size(1, 256);
        cache
            .write_at(PageKey::new(0, 5), 0, &[1u8; 4], || Ok(vec![0u8; 256]), no_flush)
            .unwrap();

        cache.discard_if(|k| k.page_no >= 5);
        assert_eq!(cache.memory_usage(), 0);
    }
}
