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

//! Real-time inverted posting store
//!
//! One posting list per coarse bucket, holding parallel arrays of vids and
//! PQ codes:
//!
//! ```text
//! bucket b:  vids  [v₀, v₁, −1, v₃, …]      (−1 = tombstone)
//!            codes [c₀ c₁ c₂ c₃ …]          (code_size bytes each)
//! ```
//!
//! Appends and in-place updates take the bucket's write lock; scans take the
//! read lock for the duration of the scan, so a reader's view of a bucket is
//! stable until the compactor next rewrites that bucket. Compaction runs one
//! bucket per call, eliding tombstoned and deleted entries.

use std::collections::HashMap;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

use rilldb_core::{Result, RillDBError};

#[derive(Default)]
struct Bucket {
    vids: Vec<i64>,
    codes: Vec<u8>,
}

/// Per-bucket posting store with logical deletion and single-bucket
/// compaction.
pub struct RtInvertIndex {
    nlist: usize,
    code_size: usize,
    bucket_initial: usize,
    bucket_max_chunk: usize,
    buckets: Vec<RwLock<Bucket>>,
    /// vid → (bucket, position); tombstoned vids are absent.
    vid_index: DashMap<i64, (u32, u32)>,
    /// Compact when deletions reach 1/`compact_ratio` of all entries.
    compact_ratio: u64,
}

impl RtInvertIndex {
    pub fn new(
        nlist: usize,
        code_size: usize,
        bucket_initial: usize,
        bucket_max_chunk: usize,
    ) -> Self {
        let mut buckets = Vec::with_capacity(nlist);
        buckets.resize_with(nlist, || RwLock::new(Bucket::default()));
        Self {
            nlist,
            code_size,
            bucket_initial,
            bucket_max_chunk,
            buckets,
            vid_index: DashMap::new(),
            compact_ratio: 10,
        }
    }

    pub fn nlist(&self) -> usize {
        self.nlist
    }

    pub fn code_size(&self) -> usize {
        self.code_size
    }

    /// Append per-bucket batches. Atomic per bucket from any reader's
    /// perspective.
    pub fn add_keys(
        &self,
        new_keys: &HashMap<i64, Vec<i64>>,
        new_codes: &HashMap<i64, Vec<u8>>,
    ) -> Result<()> {
        for (&list, vids) in new_keys {
            let codes = new_codes.get(&list).ok_or_else(|| {
                RillDBError::InternalInvariant(format!("bucket {list} has keys but no codes"))
            })?;
            if codes.len() != vids.len() * self.code_size {
                return Err(RillDBError::InternalInvariant(format!(
                    "bucket {list}: {} codes bytes for {} vids",
                    codes.len(),
                    vids.len()
                )));
            }
            if list < 0 || list as usize >= self.nlist {
                return Err(RillDBError::OutOfRange(format!("bucket {list}")));
            }

            let mut bucket = self.buckets[list as usize].write();
            self.reserve(&mut bucket, vids.len());
            let base = bucket.vids.len() as u32;
            bucket.vids.extend_from_slice(vids);
            bucket.codes.extend_from_slice(codes);
            for (i, &vid) in vids.iter().enumerate() {
                self.vid_index.insert(vid, (list as u32, base + i as u32));
            }
        }
        Ok(())
    }

    /// Refresh one vid's code. A vid that moved buckets is tombstoned where
    /// it was and appended to its new bucket.
    pub fn update(&self, list: i64, vid: i64, code: &[u8]) -> Result<()> {
        if code.len() != self.code_size {
            return Err(RillDBError::InternalInvariant(format!(
                "code is {} bytes, index expects {}",
                code.len(),
                self.code_size
            )));
        }

        let old = self.vid_index.get(&vid).map(|e| *e);
        match old {
            Some((old_list, pos)) if i64::from(old_list) == list => {
                let mut bucket = self.buckets[old_list as usize].write();
                let at = pos as usize * self.code_size;
                bucket.codes[at..at + self.code_size].copy_from_slice(code);
                return Ok(());
            }
            Some((old_list, pos)) => {
                let mut bucket = self.buckets[old_list as usize].write();
                bucket.vids[pos as usize] = -1;
                drop(bucket);
                self.vid_index.remove(&vid);
            }
            None => {}
        }

        if list < 0 {
            // Vector fell outside the trained centroids; it stays
            // unreachable until re-added.
            return Ok(());
        }
        if list as usize >= self.nlist {
            return Err(RillDBError::OutOfRange(format!("bucket {list}")));
        }

        let mut bucket = self.buckets[list as usize].write();
        self.reserve(&mut bucket, 1);
        let pos = bucket.vids.len() as u32;
        bucket.vids.push(vid);
        bucket.codes.extend_from_slice(code);
        self.vid_index.insert(vid, (list as u32, pos));
        Ok(())
    }

    /// Run `f` over a bucket's posting arrays under the read lock. The
    /// arrays are stable for the duration of the call.
    pub fn with_list<R>(&self, list: usize, f: impl FnOnce(&[i64], &[u8]) -> R) -> R {
        let bucket = self.buckets[list].read();
        f(&bucket.vids, &bucket.codes)
    }

    pub fn list_len(&self, list: usize) -> usize {
        self.buckets[list].read().vids.len()
    }

    /// Copy out the codes of the given vids, grouped by their bucket.
    /// Used by the small-candidate fast path to skip the bucket walk.
    pub fn retrieve_codes(&self, vids: &[i64]) -> HashMap<usize, (Vec<i64>, Vec<u8>)> {
        let mut grouped: HashMap<usize, Vec<(i64, u32)>> = HashMap::new();
        for &vid in vids {
            if let Some(entry) = self.vid_index.get(&vid) {
                let (list, pos) = *entry;
                grouped.entry(list as usize).or_default().push((vid, pos));
            }
        }

        let mut out = HashMap::with_capacity(grouped.len());
        for (list, entries) in grouped {
            let bucket = self.buckets[list].read();
            let mut vids = Vec::with_capacity(entries.len());
            let mut codes = Vec::with_capacity(entries.len() * self.code_size);
            for (vid, pos) in entries {
                let at = pos as usize * self.code_size;
                if bucket.vids.get(pos as usize) != Some(&vid) {
                    continue; // compacted away between lookup and copy
                }
                vids.push(vid);
                codes.extend_from_slice(&bucket.codes[at..at + self.code_size]);
            }
            out.insert(list, (vids, codes));
        }
        out
    }

    /// Compaction policy: worth compacting once deletions reach 10% of all
    /// posting entries.
    pub fn compactable(&self, delete_num: u64) -> bool {
        let total = self.total_entries() as u64;
        delete_num > 0 && delete_num * self.compact_ratio >= total
    }

    /// Rewrite one bucket, dropping tombstones and entries whose vid fails
    /// `live`. Returns the number of entries reclaimed.
    pub fn compact_bucket(&self, list: usize, live: impl Fn(i64) -> bool) -> usize {
        let mut bucket = self.buckets[list].write();
        let old_len = bucket.vids.len();

        let mut vids = Vec::with_capacity(old_len);
        let mut codes = Vec::with_capacity(old_len * self.code_size);
        for (pos, &vid) in bucket.vids.iter().enumerate() {
            if vid < 0 {
                continue;
            }
            if !live(vid) {
                self.vid_index.remove(&vid);
                continue;
            }
            let at = pos as usize * self.code_size;
            self.vid_index
                .insert(vid, (list as u32, vids.len() as u32));
            vids.push(vid);
            codes.extend_from_slice(&bucket.codes[at..at + self.code_size]);
        }

        let reclaimed = old_len - vids.len();
        bucket.vids = vids;
        bucket.codes = codes;
        reclaimed
    }

    /// Posting entries across all buckets, tombstones included.
    pub fn total_entries(&self) -> usize {
        (0..self.nlist).map(|b| self.list_len(b)).sum()
    }

    pub fn print_bucket_size(&self) {
        for b in 0..self.nlist {
            let len = self.list_len(b);
            if len > 0 {
                debug!(bucket = b, len, "bucket size");
            }
        }
    }

    // Doubling growth up to the chunk cap, then linear chunks.
    fn reserve(&self, bucket: &mut Bucket, extra: usize) {
        let need = bucket.vids.len() + extra;
        let mut cap = bucket.vids.capacity().max(self.bucket_initial);
        while cap < need {
            cap += cap.min(self.bucket_max_chunk);
        }
        if cap > bucket.vids.capacity() {
            bucket.vids.reserve_exact(cap - bucket.vids.len());
            bucket
                .codes
                .reserve_exact(cap * self.code_size - bucket.codes.len());
        }
    }
}
