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

//! Real-time IVF-PQ index
//!
//! The search engine proper. Vectors stream in continuously; a background
//! driver keeps the posting lists caught up with the raw store, re-encodes
//! updated vectors, and compacts buckets when enough documents have been
//! deleted:
//!
//! ```text
//!         ┌─ ingest gap?  ──► encode + append postings (≤1000 per chunk)
//! driver ─┤─ caught up?   ──► compact one bucket at a time
//!         └─ always       ──► drain updated vids, re-encode (≤20000)
//! ```
//!
//! Search runs coarse probing over `nlist` centroids, an approximate scan of
//! the probed posting lists, an optional exact rescore of the candidates,
//! then dedups multiple vectors of the same document keeping the best hit.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rayon::prelude::*;
use tracing::{debug, info};

use rilldb_core::{DeleteBitmap, EngineCounters, Result, RillDBError};

use crate::distance::Metric;
use crate::heap::KnnHeap;
use crate::pq::PqEncoder;
use crate::rt_invert::RtInvertIndex;
use crate::scanner::{ListScanner, VecFilter};
use crate::store::RawVectorStore;

/// Ingest chunk bound for one driver pass.
const MAX_NUM_PER_INDEX: usize = 1_000;

/// Updated-vid drain bound for one driver pass.
const MAX_UPDATED_PER_ROUND: usize = 20_000;

/// Range results smaller than this skip the bucket walk entirely.
const SMALL_RANGE_FAST_PATH: usize = 50_000;

/// Scan one probed bucket into `heap`, either from the retrieved
/// fast-path codes or from the live posting list.
fn scan_probe(
    rt: &RtInvertIndex,
    fast: Option<&HashMap<usize, (Vec<i64>, Vec<u8>)>>,
    scanner: &mut ListScanner<'_>,
    heap: &mut KnnHeap,
    coarse_dis: f32,
    list: i64,
) {
    if list < 0 {
        return;
    }
    scanner.set_list(list, coarse_dis);
    match fast {
        Some(map) => {
            if let Some((vids, codes)) = map.get(&(list as usize)) {
                scanner.scan_codes(vids, codes, heap);
            }
        }
        None => {
            rt.with_list(list as usize, |vids, codes| {
                if !vids.is_empty() {
                    scanner.scan_codes(vids, codes, heap);
                }
            });
        }
    }
}

// ============================================================================
// Parameters, condition, result
// ============================================================================

#[derive(Debug, Clone)]
pub struct IvfPqParams {
    /// Raw vector dimension in the store.
    pub raw_d: usize,
    /// Index dimension, `d ≥ raw_d`; extra dims are zero-padded.
    pub d: usize,
    pub nlist: usize,
    pub code_size: usize,
    pub nprobe: usize,
    pub metric: Metric,
    pub bucket_initial: usize,
    pub bucket_max_chunk: usize,
    pub training_threshold: usize,
    pub training_sample: usize,
}

impl IvfPqParams {
    pub fn new(
        raw_d: usize,
        d: usize,
        nlist: usize,
        code_size: usize,
        nprobe: usize,
        metric: Metric,
    ) -> Self {
        Self {
            raw_d,
            d,
            nlist,
            code_size,
            nprobe,
            metric,
            bucket_initial: 10_000,
            bucket_max_chunk: 1_280_000,
            training_threshold: 8_192,
            training_sample: 100_000,
        }
    }
}

/// Per-search configuration.
#[derive(Debug, Clone)]
pub struct SearchCondition {
    pub topn: usize,
    /// Interim candidate heap size, clamped up to `topn`.
    pub recall_num: usize,
    pub metric_type: Metric,
    /// Exact rescore of the recalled candidates.
    pub has_rank: bool,
    /// Bypass the IVF-PQ structure and scan every live vector.
    pub use_direct_search: bool,
    pub sort_by_docid: bool,
    /// Inclusive distance bounds; a negative value disables that bound.
    pub min_dist: f32,
    pub max_dist: f32,
    pub parallel_based_on_query: bool,
    pub range_result: Option<Arc<rilldb_core::RangeResult>>,
}

impl Default for SearchCondition {
    fn default() -> Self {
        Self {
            topn: 10,
            recall_num: 50,
            metric_type: Metric::L2,
            has_rank: false,
            use_direct_search: false,
            sort_by_docid: false,
            min_dist: -1.0,
            max_dist: -1.0,
            parallel_based_on_query: false,
            range_result: None,
        }
    }
}

impl SearchCondition {
    fn accepts_dist(&self, dis: f32) -> bool {
        (self.min_dist < 0.0 || dis >= self.min_dist)
            && (self.max_dist < 0.0 || dis <= self.max_dist)
    }

    fn has_dist_bounds(&self) -> bool {
        self.min_dist >= 0.0 || self.max_dist >= 0.0
    }
}

/// Flat per-query result arrays of length `topn`. Empty trailing slots hold
/// docid −1 and distance −1.
#[derive(Debug, Default)]
pub struct SearchResult {
    pub n: usize,
    pub topn: usize,
    pub docids: Vec<i64>,
    pub dists: Vec<f32>,
    pub sources: Vec<Vec<u8>>,
    pub source_lens: Vec<u32>,
    /// Candidate universe size per query (range size, or scanned count).
    pub total: Vec<i32>,
    /// Seek cursor per query; 0 when the query produced results.
    pub idx: Vec<i32>,
}

impl SearchResult {
    pub fn new(n: usize, topn: usize) -> Self {
        Self {
            n,
            topn,
            docids: vec![-1; n * topn],
            dists: vec![-1.0; n * topn],
            sources: vec![Vec::new(); n * topn],
            source_lens: vec![0; n * topn],
            total: vec![0; n],
            idx: vec![-1; n],
        }
    }

    pub fn docids_of(&self, query: usize) -> &[i64] {
        &self.docids[query * self.topn..(query + 1) * self.topn]
    }

    pub fn dists_of(&self, query: usize) -> &[f32] {
        &self.dists[query * self.topn..(query + 1) * self.topn]
    }
}

// ============================================================================
// Index
// ============================================================================

/// IVF-PQ index over a raw vector store.
pub struct IvfPqIndex {
    params: IvfPqParams,
    encoder: RwLock<PqEncoder>,
    is_trained: AtomicBool,
    rt: RtInvertIndex,
    store: Arc<RawVectorStore>,
    bitmap: Arc<DeleteBitmap>,
    counters: Arc<EngineCounters>,
    indexed_vec_count: AtomicUsize,
    compacting: AtomicBool,
    compact_bucket_no: AtomicUsize,
    compacted_total: AtomicUsize,
    updated_total: AtomicUsize,
}

impl IvfPqIndex {
    pub fn new(
        params: IvfPqParams,
        store: Arc<RawVectorStore>,
        bitmap: Arc<DeleteBitmap>,
        counters: Arc<EngineCounters>,
    ) -> Result<Self> {
        if params.d < params.raw_d {
            return Err(RillDBError::InvalidArgument(format!(
                "index dimension {} below raw dimension {}",
                params.d, params.raw_d
            )));
        }
        if store.dimension() != params.raw_d {
            return Err(RillDBError::InvalidArgument(format!(
                "store dimension {} does not match raw dimension {}",
                store.dimension(),
                params.raw_d
            )));
        }
        let encoder = PqEncoder::new(params.d, params.nlist, params.code_size, params.metric)?;
        let rt = RtInvertIndex::new(
            params.nlist,
            params.code_size,
            params.bucket_initial,
            params.bucket_max_chunk,
        );
        Ok(Self {
            params,
            encoder: RwLock::new(encoder),
            is_trained: AtomicBool::new(false),
            rt,
            store,
            bitmap,
            counters,
            indexed_vec_count: AtomicUsize::new(0),
            compacting: AtomicBool::new(false),
            compact_bucket_no: AtomicUsize::new(0),
            compacted_total: AtomicUsize::new(0),
            updated_total: AtomicUsize::new(0),
        })
    }

    pub fn is_trained(&self) -> bool {
        self.is_trained.load(Ordering::Acquire)
    }

    pub fn indexed_vec_count(&self) -> usize {
        self.indexed_vec_count.load(Ordering::Acquire)
    }

    /// Posting entries across all buckets, tombstones included.
    pub fn rt_total_entries(&self) -> usize {
        self.rt.total_entries()
    }

    /// Logically delete a document: set the bitmap and count it once.
    pub fn delete_doc(&self, docid: i64) {
        if self.bitmap.set(docid) {
            self.counters.note_delete();
        }
    }

    // ------------------------------------------------------------------
    // Training
    // ------------------------------------------------------------------

    /// Train the quantizers once over a sample of the raw store.
    pub fn indexing(&self) -> Result<()> {
        if self.is_trained() {
            info!("index already trained, skip");
            return Ok(());
        }
        let total = self.store.vector_num();
        if total < self.params.training_threshold {
            return Err(RillDBError::TrainingInsufficient {
                have: total,
                need: self.params.training_threshold,
            });
        }

        let num = total.min(self.params.training_sample);
        let raw = self.store.header(0, num);
        let xs = self.extend_dims(&raw, num);

        let mut encoder = self.encoder.write();
        encoder.train(num, &xs);
        drop(encoder);

        self.is_trained.store(true, Ordering::Release);
        info!(num, "train succeeded");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Ingest
    // ------------------------------------------------------------------

    /// Encode and append `n` vectors of the index dimension. Vids continue
    /// from the current indexed count; vectors without a centroid are
    /// counted as ignored. Returns how many were added.
    pub fn add(&self, n: usize, xs: &[f32]) -> Result<usize> {
        if !self.is_trained() {
            return Err(RillDBError::NotTrained);
        }
        let d = self.params.d;
        let code_size = self.params.code_size;
        let encoder = self.encoder.read();

        let lists = encoder.coarse.assign_batch(xs);
        let mut codes = vec![0u8; n * code_size];
        for (i, x) in xs.chunks_exact(d).enumerate() {
            encoder.encode(x, lists[i], &mut codes[i * code_size..(i + 1) * code_size]);
        }

        let mut new_keys: HashMap<i64, Vec<i64>> = HashMap::new();
        let mut new_codes: HashMap<i64, Vec<u8>> = HashMap::new();
        let mut vid = self.indexed_vec_count.load(Ordering::Acquire) as i64;
        let mut ignored = 0usize;
        for (i, &list) in lists.iter().enumerate() {
            if list < 0 {
                ignored += 1;
                continue;
            }
            new_keys.entry(list).or_default().push(vid);
            new_codes
                .entry(list)
                .or_default()
                .extend_from_slice(&codes[i * code_size..(i + 1) * code_size]);
            vid += 1;
        }

        self.rt.add_keys(&new_keys, &new_codes)?;
        self.indexed_vec_count.store(vid as usize, Ordering::Release);
        Ok(n - ignored)
    }

    /// Incremental driver, called periodically by a background task.
    ///
    /// Ingests the gap between the raw store and the index in bounded
    /// chunks; at parity it compacts buckets one at a time, yielding back to
    /// ingest as soon as new vectors arrive; and it always drains a bounded
    /// batch of updated vids.
    pub fn add_rt_vecs_to_index(&self) -> Result<()> {
        let total = self.store.vector_num();
        let indexed = self.indexed_vec_count.load(Ordering::Acquire);

        if indexed > total {
            return Err(RillDBError::InternalInvariant(format!(
                "indexed count {indexed} exceeds stored count {total}"
            )));
        } else if indexed == total {
            self.maybe_compact();
        } else if !self.is_trained() {
            debug!(gap = total - indexed, "vectors pending but index untrained");
        } else {
            let mut at = indexed;
            while at < total {
                let count = (total - at).min(MAX_NUM_PER_INDEX);
                let raw = self.store.header(at, at + count);
                let xs = self.extend_dims(&raw, count);
                self.add(count, &xs)?;
                at += count;
            }
        }

        self.add_updated_to_index()
    }

    fn maybe_compact(&self) {
        if !self.compacting.load(Ordering::Acquire) {
            let delete_num = self.counters.delete_num();
            if self.rt.compactable(delete_num) {
                info!(
                    doc_num = self.counters.max_docid(),
                    delete_num, "compaction begins"
                );
                self.rt.print_bucket_size();
                self.compacting.store(true, Ordering::Release);
            }
        }
        if !self.compacting.load(Ordering::Acquire) {
            return;
        }

        while self.compact_bucket_no.load(Ordering::Acquire) < self.params.nlist {
            // Fresh vectors take priority over compaction.
            if self.store.vector_num() > self.indexed_vec_count.load(Ordering::Acquire) {
                break;
            }
            let bucket = self.compact_bucket_no.fetch_add(1, Ordering::AcqRel);
            let reclaimed = self.rt.compact_bucket(bucket, |vid| {
                let docid = self.store.vid2docid(vid);
                docid >= 0 && !self.bitmap.test(docid)
            });
            self.compacted_total.fetch_add(reclaimed, Ordering::AcqRel);
        }

        if self.compact_bucket_no.load(Ordering::Acquire) >= self.params.nlist {
            self.compacting.store(false, Ordering::Release);
            self.compact_bucket_no.store(0, Ordering::Release);
            info!(
                compacted = self.compacted_total.load(Ordering::Acquire),
                "compaction completed"
            );
            self.rt.print_bucket_size();
        }
    }

    fn add_updated_to_index(&self) -> Result<()> {
        let vids = self.store.drain_updated(MAX_UPDATED_PER_ROUND);
        if vids.is_empty() || !self.is_trained() {
            return Ok(());
        }
        let code_size = self.params.code_size;
        let encoder = self.encoder.read();

        for &vid in &vids {
            let raw = self.store.get(vid)?;
            let x = self.extend_dims(&raw, 1);
            let list = encoder.assign(&x);
            let mut code = vec![0u8; code_size];
            encoder.encode(&x, list, &mut code);
            self.rt.update(list, vid, &code)?;
        }

        let total = self.updated_total.fetch_add(vids.len(), Ordering::AcqRel) + vids.len();
        info!(size = vids.len(), total, "updated vectors re-indexed");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------

    /// Search `n` queries packed as a flat `n × raw_d` buffer. The result is
    /// resized to `n × condition.topn`.
    pub fn search(
        &self,
        x: &[f32],
        condition: &SearchCondition,
        result: &mut SearchResult,
    ) -> Result<()> {
        let raw_d = self.params.raw_d;
        if x.is_empty() || x.len() % raw_d != 0 {
            return Err(RillDBError::InvalidArgument(format!(
                "query buffer of {} floats is not a multiple of dimension {raw_d}",
                x.len()
            )));
        }
        if condition.topn == 0 {
            return Err(RillDBError::InvalidArgument("topn is 0".into()));
        }
        let n = x.len() / raw_d;
        let topn = condition.topn;
        *result = SearchResult::new(n, topn);

        let (dists, labels, totals) = if condition.use_direct_search {
            self.search_directly(n, x, condition)
        } else {
            self.search_ivfpq(n, x, condition)?
        };

        // Collapse duplicate docids (several vids per doc) keeping the best
        // hit, attach sources, and pad the tail.
        let metric = condition.metric_type;
        for i in 0..n {
            result.total[i] = totals[i];
            let mut seen: HashMap<i64, usize> = HashMap::new();
            let mut pos = 0usize;
            for j in 0..topn {
                let vid = labels[i * topn + j];
                if vid < 0 {
                    continue;
                }
                let docid = self.store.vid2docid(vid);
                if docid < 0 {
                    continue;
                }
                let dis = dists[i * topn + j];
                match seen.get(&docid) {
                    Some(&slot) => {
                        let at = i * topn + slot;
                        if metric.is_better(dis, result.dists[at]) {
                            result.dists[at] = dis;
                        }
                    }
                    None => {
                        let at = i * topn + pos;
                        result.docids[at] = docid;
                        result.dists[at] = dis;
                        if let Some(source) = self.store.source(vid) {
                            result.source_lens[at] = source.len() as u32;
                            result.sources[at] = source;
                        }
                        seen.insert(docid, pos);
                        pos += 1;
                    }
                }
            }
            if pos > 0 {
                result.idx[i] = 0;
            }
            for p in pos..topn {
                result.docids[i * topn + p] = -1;
                result.dists[i * topn + p] = -1.0;
            }
        }
        Ok(())
    }

    fn search_ivfpq(
        &self,
        n: usize,
        x_raw: &[f32],
        condition: &SearchCondition,
    ) -> Result<(Vec<f32>, Vec<i64>, Vec<i32>)> {
        if !self.is_trained() {
            return Err(RillDBError::NotTrained);
        }
        let raw_d = self.params.raw_d;
        let d = self.params.d;
        let topn = condition.topn;
        let recall = condition.recall_num.max(topn);
        let metric = condition.metric_type;
        let nprobe = self.params.nprobe.min(self.params.nlist).max(1);

        let xq = self.extend_dims(x_raw, n);
        let encoder_guard = self.encoder.read();
        let encoder: &PqEncoder = &encoder_guard;

        let range = condition.range_result.as_deref();
        let ni_total = range.map(|r| r.len() as i32).unwrap_or(-1);

        // A small filtered candidate set skips the posting walk: translate
        // docs to vids and pull their codes directly.
        let fast_codes = match range {
            Some(r) if r.len() < SMALL_RANGE_FAST_PATH => {
                let mut vids = Vec::with_capacity(r.len());
                for &docid in r.to_docs() {
                    if self.bitmap.test(docid) {
                        continue;
                    }
                    vids.extend(self.store.vids_of_doc(docid));
                }
                Some(self.rt.retrieve_codes(&vids))
            }
            _ => None,
        };
        let fast = fast_codes.as_ref();

        let filter = VecFilter {
            bitmap: &self.bitmap,
            store: &self.store,
            range,
        };

        // One query end to end on the calling thread.
        let run_query = |i: usize| -> (Vec<f32>, Vec<i64>) {
            let qi = &xq[i * d..(i + 1) * d];
            let mut scanner = ListScanner::new(metric, encoder, filter);
            scanner.set_query(qi);
            let probes = encoder.coarse.search(qi, nprobe);

            let mut heap = KnnHeap::new(metric, recall);
            for &(coarse_dis, list) in &probes {
                scan_probe(&self.rt, fast, &mut scanner, &mut heap, coarse_dis, list);
            }
            self.finalize_query(&x_raw[i * raw_d..(i + 1) * raw_d], condition, heap)
        };

        // One query fanned out over its probes, thread-local heaps merged.
        let run_query_over_probes = |i: usize| -> (Vec<f32>, Vec<i64>) {
            let qi = &xq[i * d..(i + 1) * d];
            let probes = encoder.coarse.search(qi, nprobe);

            let locals: Vec<KnnHeap> = probes
                .par_iter()
                .map(|&(coarse_dis, list)| {
                    let mut scanner = ListScanner::new(metric, encoder, filter);
                    scanner.set_query(qi);
                    let mut local = KnnHeap::new(metric, recall);
                    scan_probe(&self.rt, fast, &mut scanner, &mut local, coarse_dis, list);
                    local
                })
                .collect();

            let mut heap = KnnHeap::new(metric, recall);
            for local in &locals {
                heap.merge_from(local);
            }
            self.finalize_query(&x_raw[i * raw_d..(i + 1) * raw_d], condition, heap)
        };

        let outs: Vec<(Vec<f32>, Vec<i64>)> = if condition.parallel_based_on_query {
            if n > 1 {
                (0..n).into_par_iter().map(run_query).collect()
            } else {
                (0..n).map(run_query).collect()
            }
        } else {
            (0..n).map(run_query_over_probes).collect()
        };

        Ok(Self::flatten(outs, n, topn, ni_total))
    }

    /// Exact linear scan over every live vector.
    fn search_directly(
        &self,
        n: usize,
        x: &[f32],
        condition: &SearchCondition,
    ) -> (Vec<f32>, Vec<i64>, Vec<i32>) {
        let raw_d = self.params.raw_d;
        let topn = condition.topn;
        let metric = condition.metric_type;
        let range = condition.range_result.as_deref();
        let check_bounds = condition.has_dist_bounds();

        let num = self.store.vector_num();
        let vectors = self.store.header(0, num);

        let scan_slice = |xi: &[f32], lo: usize, hi: usize| -> (KnnHeap, i32) {
            let mut heap = KnnHeap::new(metric, topn);
            let mut count = 0i32;
            for vid in lo..hi {
                let docid = self.store.vid2docid(vid as i64);
                if docid < 0 || self.bitmap.test(docid) {
                    continue;
                }
                if let Some(r) = range {
                    if !r.has(docid) {
                        continue;
                    }
                }
                let dis = metric.distance(xi, &vectors[vid * raw_d..(vid + 1) * raw_d]);
                if check_bounds && !condition.accepts_dist(dis) {
                    continue;
                }
                heap.maybe_push(dis, vid as i64);
                count += 1;
            }
            (heap, count)
        };

        let run_query = |i: usize| -> (Vec<f32>, Vec<i64>, i32) {
            let xi = &x[i * raw_d..(i + 1) * raw_d];
            let (heap, count) = scan_slice(xi, 0, num);
            let (dists, ids) = self.order_output(heap, condition);
            (dists, ids, count)
        };

        // Over vector slices: each chunk scans into its own heap, merged at
        // the join.
        let run_query_over_slices = |i: usize| -> (Vec<f32>, Vec<i64>, i32) {
            let xi = &x[i * raw_d..(i + 1) * raw_d];
            let threads = rayon::current_num_threads().max(1);
            let chunk = num.div_ceil(threads).max(1);

            let parts: Vec<(KnnHeap, i32)> = (0..num)
                .step_by(chunk)
                .collect::<Vec<_>>()
                .par_iter()
                .map(|&lo| scan_slice(xi, lo, (lo + chunk).min(num)))
                .collect();

            let mut heap = KnnHeap::new(metric, topn);
            let mut count = 0i32;
            for (local, c) in &parts {
                heap.merge_from(local);
                count += c;
            }
            let (dists, ids) = self.order_output(heap, condition);
            (dists, ids, count)
        };

        let outs: Vec<(Vec<f32>, Vec<i64>, i32)> = if condition.parallel_based_on_query {
            if n > 1 {
                (0..n).into_par_iter().map(run_query).collect()
            } else {
                (0..n).map(run_query).collect()
            }
        } else {
            (0..n).map(run_query_over_slices).collect()
        };

        let mut dists = vec![-1.0f32; n * topn];
        let mut labels = vec![-1i64; n * topn];
        let mut totals = vec![0i32; n];
        for (i, (ds, ids, count)) in outs.into_iter().enumerate() {
            dists[i * topn..(i + 1) * topn].copy_from_slice(&ds);
            labels[i * topn..(i + 1) * topn].copy_from_slice(&ids);
            totals[i] = count;
        }
        (dists, labels, totals)
    }

    /// Rescore/filter the recall heap down to `topn` and order the output.
    fn finalize_query(
        &self,
        xi_raw: &[f32],
        condition: &SearchCondition,
        heap: KnnHeap,
    ) -> (Vec<f32>, Vec<i64>) {
        let metric = condition.metric_type;
        let mut top = KnnHeap::new(metric, condition.topn);

        if condition.has_rank {
            // Exact metric over the raw dimensions for the recalled set.
            for (_, vid) in heap.into_sorted() {
                if vid < 0 {
                    continue;
                }
                let Ok(vec) = self.store.get(vid) else { continue };
                let dis = metric.distance(xi_raw, &vec);
                if condition.accepts_dist(dis) {
                    top.maybe_push(dis, vid);
                }
            }
        } else {
            for (dis, vid) in heap.into_sorted() {
                if vid < 0 {
                    continue;
                }
                if condition.accepts_dist(dis) {
                    top.maybe_push(dis, vid);
                }
            }
        }

        self.order_output(top, condition)
    }

    /// Heap → output arrays, best first or docid-ascending.
    fn order_output(&self, top: KnnHeap, condition: &SearchCondition) -> (Vec<f32>, Vec<i64>) {
        let mut pairs = top.into_sorted();
        if condition.sort_by_docid {
            pairs.sort_by(|a, b| {
                let da = if a.1 < 0 {
                    i64::MAX
                } else {
                    self.store.vid2docid(a.1)
                };
                let db = if b.1 < 0 {
                    i64::MAX
                } else {
                    self.store.vid2docid(b.1)
                };
                da.cmp(&db)
                    .then(a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
            });
        }
        (
            pairs.iter().map(|p| p.0).collect(),
            pairs.iter().map(|p| p.1).collect(),
        )
    }

    fn flatten(
        outs: Vec<(Vec<f32>, Vec<i64>)>,
        n: usize,
        topn: usize,
        ni_total: i32,
    ) -> (Vec<f32>, Vec<i64>, Vec<i32>) {
        let mut dists = vec![-1.0f32; n * topn];
        let mut labels = vec![-1i64; n * topn];
        for (i, (ds, ids)) in outs.into_iter().enumerate() {
            dists[i * topn..(i + 1) * topn].copy_from_slice(&ds);
            labels[i * topn..(i + 1) * topn].copy_from_slice(&ids);
        }
        (dists, labels, vec![ni_total; n])
    }

    /// Zero-pad raw-dimension vectors up to the index dimension.
    fn extend_dims(&self, src: &[f32], n: usize) -> Vec<f32> {
        let raw_d = self.params.raw_d;
        let d = self.params.d;
        if d == raw_d {
            return src.to_vec();
        }
        let mut out = vec![0.0f32; n * d];
        for i in 0..n {
            out[i * d..i * d + raw_d].copy_from_slice(&src[i * raw_d..(i + 1) * raw_d]);
        }
        out
    }
}
