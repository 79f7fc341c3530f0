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

//! Raw vector store
//!
//! Columnar store of the original float vectors, keyed by a dense vid. A
//! document may own several vectors (`docid2vid` is one-to-many, `vid2docid`
//! many-to-one), and each vid can carry opaque source bytes returned with
//! search results. Overwriting a vector queues its vid for re-indexing;
//! the background driver drains the queue and refreshes the posting lists.

use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;
use smallvec::SmallVec;

use rilldb_core::{Result, RillDBError};

/// Columnar f32 vector store with doc mapping and an update queue.
pub struct RawVectorStore {
    dim: usize,
    data: RwLock<Vec<f32>>,
    vid2docid: RwLock<Vec<i64>>,
    docid2vid: RwLock<Vec<SmallVec<[i64; 1]>>>,
    sources: RwLock<Vec<Vec<u8>>>,
    count: AtomicUsize,
    updated_tx: Sender<i64>,
    updated_rx: Receiver<i64>,
}

impl RawVectorStore {
    pub fn new(dim: usize) -> Self {
        let (updated_tx, updated_rx) = unbounded();
        Self {
            dim,
            data: RwLock::new(Vec::new()),
            vid2docid: RwLock::new(Vec::new()),
            docid2vid: RwLock::new(Vec::new()),
            sources: RwLock::new(Vec::new()),
            count: AtomicUsize::new(0),
            updated_tx,
            updated_rx,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }

    /// Number of vectors visible to readers.
    pub fn vector_num(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Append a vector for `docid`, returning its vid.
    pub fn add(&self, docid: i64, vec: &[f32], source: &[u8]) -> Result<i64> {
        self.check_dim(vec)?;
        if docid < 0 {
            return Err(RillDBError::InvalidArgument(format!("docid {docid}")));
        }

        let vid;
        {
            let mut data = self.data.write();
            let mut v2d = self.vid2docid.write();
            let mut d2v = self.docid2vid.write();
            let mut sources = self.sources.write();

            vid = v2d.len() as i64;
            data.extend_from_slice(vec);
            v2d.push(docid);
            if d2v.len() <= docid as usize {
                d2v.resize_with(docid as usize + 1, SmallVec::new);
            }
            d2v[docid as usize].push(vid);
            sources.push(source.to_vec());
        }
        // Publish after the columns are consistent.
        self.count.store(vid as usize + 1, Ordering::Release);
        Ok(vid)
    }

    /// Copy of one vector.
    pub fn get(&self, vid: i64) -> Result<Vec<f32>> {
        if vid < 0 || vid as usize >= self.vector_num() {
            return Err(RillDBError::OutOfRange(format!(
                "vid {} of {}",
                vid,
                self.vector_num()
            )));
        }
        let data = self.data.read();
        let at = vid as usize * self.dim;
        Ok(data[at..at + self.dim].to_vec())
    }

    /// Row-major copy of vectors `[lo, hi)`.
    pub fn header(&self, lo: usize, hi: usize) -> Vec<f32> {
        let hi = hi.min(self.vector_num());
        if lo >= hi {
            return Vec::new();
        }
        let data = self.data.read();
        data[lo * self.dim..hi * self.dim].to_vec()
    }

    /// Owning docid of a vid, −1 when out of range.
    #[inline]
    pub fn vid2docid(&self, vid: i64) -> i64 {
        if vid < 0 {
            return -1;
        }
        self.vid2docid
            .read()
            .get(vid as usize)
            .copied()
            .unwrap_or(-1)
    }

    /// All vids owned by a document.
    pub fn vids_of_doc(&self, docid: i64) -> SmallVec<[i64; 1]> {
        if docid < 0 {
            return SmallVec::new();
        }
        self.docid2vid
            .read()
            .get(docid as usize)
            .cloned()
            .unwrap_or_default()
    }

    /// Source bytes attached to a vid.
    pub fn source(&self, vid: i64) -> Option<Vec<u8>> {
        if vid < 0 {
            return None;
        }
        self.sources.read().get(vid as usize).cloned()
    }

    /// Overwrite a vector in place and queue the vid for re-indexing.
    pub fn update(&self, vid: i64, vec: &[f32]) -> Result<()> {
        self.check_dim(vec)?;
        if vid < 0 || vid as usize >= self.vector_num() {
            return Err(RillDBError::OutOfRange(format!("vid {vid}")));
        }
        {
            let mut data = self.data.write();
            let at = vid as usize * self.dim;
            data[at..at + self.dim].copy_from_slice(vec);
        }
        let _ = self.updated_tx.send(vid);
        Ok(())
    }

    /// Dequeue up to `max` vids pending re-indexing.
    pub fn drain_updated(&self, max: usize) -> Vec<i64> {
        let mut vids = Vec::new();
        while vids.len() < max {
            match self.updated_rx.try_recv() {
                Ok(vid) => vids.push(vid),
                Err(_) => break,
            }
        }
        vids
    }

    fn check_dim(&self, vec: &[f32]) -> Result<()> {
        if vec.len() != self.dim {
            return Err(RillDBError::InvalidArgument(format!(
                "vector dimension {} does not match store dimension {}",
                vec.len(),
                self.dim
            )));
        }
        Ok(())
    }
}
