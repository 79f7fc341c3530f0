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

//! Fixed-width block storage
//!
//! Append-mostly record store for fixed-width rows. Records are packed whole
//! into 64 KiB pages (a record never spans a page), and pages are grouped
//! into per-segment files:
//!
//! ```text
//! <root>/<name>_seg_0.dat   pages 0..P of segment 0
//! <root>/<name>_seg_1.dat   pages 0..P of segment 1
//! <root>/<name>.meta        record count, written on sync
//! ```
//!
//! All page I/O goes through the shared [`PageCache`]; dirty pages are
//! written back on eviction and on `sync`, which is the only durability
//! barrier. After a crash the store reopens at the last synced record count.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};
use parking_lot::RwLock;
use tracing::info;

use rilldb_core::{Result, RillDBError};

use crate::page_cache::{PageCache, PageKey, PAGE_SIZE};

/// Geometry of a block storage instance.
#[derive(Debug, Clone)]
pub struct BlockStorageOptions {
    /// Records per segment file.
    pub segment_size: usize,
    /// Bytes per record; frozen at creation.
    pub fixed_value_bytes: usize,
    /// Upper bound on pages tracked per segment.
    pub seg_block_capacity: usize,
}

impl Default for BlockStorageOptions {
    fn default() -> Self {
        Self {
            segment_size: 500_000,
            fixed_value_bytes: 0,
            seg_block_capacity: 400_000,
        }
    }
}

/// Fixed-width record store over paged segment files.
pub struct BlockStorage {
    root: PathBuf,
    name: String,
    item_length: usize,
    records_per_page: usize,
    records_per_segment: usize,
    cache: PageCache,
    files: RwLock<Vec<Arc<File>>>,
    size: AtomicUsize,
}

impl BlockStorage {
    /// Open (or create) a store under `root`. An existing store resumes at
    /// the record count recorded by its last `sync`.
    pub fn open(
        root: &Path,
        name: &str,
        opts: &BlockStorageOptions,
        cache_mb: usize,
    ) -> Result<Self> {
        if opts.fixed_value_bytes == 0 || opts.fixed_value_bytes > PAGE_SIZE {
            return Err(RillDBError::InvalidArgument(format!(
                "record size {} not in 1..={}",
                opts.fixed_value_bytes, PAGE_SIZE
            )));
        }
        std::fs::create_dir_all(root)?;

        let records_per_page = PAGE_SIZE / opts.fixed_value_bytes;
        let pages_per_segment = opts
            .segment_size
            .div_ceil(records_per_page)
            .min(opts.seg_block_capacity);
        let records_per_segment = pages_per_segment * records_per_page;

        let store = Self {
            root: root.to_path_buf(),
            name: name.to_string(),
            item_length: opts.fixed_value_bytes,
            records_per_page,
            records_per_segment,
            cache: PageCache::new(cache_mb),
            files: RwLock::new(Vec::new()),
            size: AtomicUsize::new(0),
        };

        let size = store.read_meta()?;
        store.size.store(size, Ordering::Release);
        if size > 0 {
            info!(name, size, "block storage reopened");
        }
        Ok(store)
    }

    /// Append one record, returning its docid.
    pub fn add(&self, bytes: &[u8]) -> Result<i64> {
        self.check_record(bytes)?;
        let docid = self.size.fetch_add(1, Ordering::AcqRel);
        self.write_record(docid, bytes)?;
        Ok(docid as i64)
    }

    /// Read one record into an owned buffer.
    pub fn get(&self, docid: i64) -> Result<Vec<u8>> {
        self.check_docid(docid)?;
        let (key, offset) = self.locate(docid as usize);
        let file = self.segment_file(key.segment)?;
        let mut out = vec![0u8; self.item_length];
        self.cache.read_at(
            key,
            offset,
            &mut out,
            || load_page(&file, key.page_no),
            |k, d| self.flush_page(k, d),
        )?;
        Ok(out)
    }

    /// Overwrite one record in place.
    pub fn update(&self, docid: i64, bytes: &[u8]) -> Result<()> {
        self.check_docid(docid)?;
        self.check_record(bytes)?;
        self.write_record(docid as usize, bytes)
    }

    pub fn size(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    /// Drop records `[n, size)`. Only used while loading.
    pub fn truncate(&self, n: usize) -> Result<()> {
        let old = self.size.swap(n, Ordering::AcqRel);
        if n < old {
            // Frames wholly past the boundary hold only dropped records.
            let boundary = if n == 0 {
                None
            } else {
                Some(self.locate(n - 1).0)
            };
            self.cache.discard_if(|k| match boundary {
                None => true,
                Some(b) => {
                    k.segment > b.segment || (k.segment == b.segment && k.page_no > b.page_no)
                }
            });
        }
        self.write_meta(n)
    }

    /// Flush dirty pages and fsync every segment file plus the meta record.
    pub fn sync(&self) -> Result<()> {
        self.cache.flush_all(|k, d| self.flush_page(k, d))?;
        for file in self.files.read().iter() {
            file.sync_all()?;
        }
        self.write_meta(self.size())?;
        Ok(())
    }

    pub fn alter_cache_size(&self, cache_mb: usize) -> Result<()> {
        self.cache
            .set_capacity_mb(cache_mb, |k, d| self.flush_page(k, d))
    }

    pub fn cache_size_mb(&self) -> u32 {
        self.cache.capacity_mb()
    }

    pub fn memory_bytes(&self) -> usize {
        self.cache.memory_usage()
    }

    pub fn item_length(&self) -> usize {
        self.item_length
    }

    fn check_record(&self, bytes: &[u8]) -> Result<()> {
        if bytes.len() != self.item_length {
            return Err(RillDBError::InvalidArgument(format!(
                "record is {} bytes, store expects {}",
                bytes.len(),
                self.item_length
            )));
        }
        Ok(())
    }

    fn check_docid(&self, docid: i64) -> Result<()> {
        if docid < 0 || docid as usize >= self.size() {
            return Err(RillDBError::OutOfRange(format!(
                "docid {} of {}",
                docid,
                self.size()
            )));
        }
        Ok(())
    }

    fn locate(&self, docid: usize) -> (PageKey, usize) {
        let segment = docid / self.records_per_segment;
        let rec = docid % self.records_per_segment;
        let page_no = rec / self.records_per_page;
        let slot = rec % self.records_per_page;
        (
            PageKey::new(segment as u32, page_no as u32),
            slot * self.item_length,
        )
    }

    fn write_record(&self, docid: usize, bytes: &[u8]) -> Result<()> {
        let (key, offset) = self.locate(docid);
        let file = self.segment_file(key.segment)?;
        self.cache.write_at(
            key,
            offset,
            bytes,
            || load_page(&file, key.page_no),
            |k, d| self.flush_page(k, d),
        )
    }

    fn segment_path(&self, segment: u32) -> PathBuf {
        self.root.join(format!("{}_seg_{}.dat", self.name, segment))
    }

    fn segment_file(&self, segment: u32) -> Result<Arc<File>> {
        {
            let files = self.files.read();
            if let Some(f) = files.get(segment as usize) {
                return Ok(f.clone());
            }
        }
        let mut files = self.files.write();
        while files.len() <= segment as usize {
            let path = self.segment_path(files.len() as u32);
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&path)?;
            files.push(Arc::new(file));
        }
        Ok(files[segment as usize].clone())
    }

    fn flush_page(&self, key: PageKey, data: &[u8]) -> Result<()> {
        let file = self.segment_file(key.segment)?;
        file.write_all_at(data, key.page_no as u64 * PAGE_SIZE as u64)?;
        Ok(())
    }

    fn meta_path(&self) -> PathBuf {
        self.root.join(format!("{}.meta", self.name))
    }

    fn read_meta(&self) -> Result<usize> {
        match std::fs::read(self.meta_path()) {
            Ok(bytes) if bytes.len() >= 8 => Ok(LittleEndian::read_u64(&bytes[..8]) as usize),
            Ok(_) => Err(RillDBError::Corrupt("short block storage meta".into())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn write_meta(&self, size: usize) -> Result<()> {
        let mut buf = [0u8; 8];
        LittleEndian::write_u64(&mut buf, size as u64);
        std::fs::write(self.meta_path(), buf)?;
        Ok(())
    }
}

/// Read one page, zero-filling past the end of file. Pages materialize on
/// first writeback, so a fresh page may not exist on disk yet.
pub(crate) fn load_page(file: &File, page_no: u32) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; PAGE_SIZE];
    let base = page_no as u64 * PAGE_SIZE as u64;
    let mut read = 0usize;
    while read < PAGE_SIZE {
        match file.read_at(&mut buf[read..], base + read as u64) {
            Ok(0) => break,
            Ok(n) => read += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(buf)
}
