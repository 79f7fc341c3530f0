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

//! Inverted-list scanner
//!
//! The inner kernel of a bucket scan, owned by one scanning thread. For the
//! current query it holds the PQ lookup table (rebuilt per bucket when codes
//! are residual-encoded), filters deleted and out-of-range candidates, and
//! pushes approximate distances into the caller's heap.

use rilldb_core::{DeleteBitmap, RangeResult};

use crate::distance::{inner_product, Metric};
use crate::heap::KnnHeap;
use crate::pq::{DistanceTable, PqEncoder};
use crate::store::RawVectorStore;

/// Candidate filter shared by every scan of one search call.
#[derive(Clone, Copy)]
pub struct VecFilter<'a> {
    pub bitmap: &'a DeleteBitmap,
    pub store: &'a RawVectorStore,
    pub range: Option<&'a RangeResult>,
}

impl VecFilter<'_> {
    /// Is this vid's document still eligible for results?
    #[inline]
    pub fn pass(&self, vid: i64) -> bool {
        if vid < 0 {
            return false;
        }
        let docid = self.store.vid2docid(vid);
        if docid < 0 || self.bitmap.test(docid) {
            return false;
        }
        match self.range {
            Some(r) => r.has(docid),
            None => true,
        }
    }
}

/// Metric-specialized scanner over `(vid, code)` posting entries.
pub struct ListScanner<'a> {
    metric: Metric,
    encoder: &'a PqEncoder,
    filter: VecFilter<'a>,
    query: Vec<f32>,
    table: Option<DistanceTable>,
    /// Inner-product coarse term for residual codes.
    bias: f32,
}

impl<'a> ListScanner<'a> {
    pub fn new(metric: Metric, encoder: &'a PqEncoder, filter: VecFilter<'a>) -> Self {
        Self {
            metric,
            encoder,
            filter,
            query: Vec::new(),
            table: None,
            bias: 0.0,
        }
    }

    /// Install the current query (index-dimension vector).
    pub fn set_query(&mut self, x: &[f32]) {
        self.query.clear();
        self.query.extend_from_slice(x);
        self.bias = 0.0;
        // Residual L2 tables depend on the bucket; everything else only on
        // the query.
        if self.encoder.by_residual && self.metric == Metric::L2 {
            self.table = None;
        } else {
            self.table = Some(self.encoder.pq.table(self.metric, x));
        }
    }

    /// Point the scanner at a bucket before scanning its entries.
    pub fn set_list(&mut self, list: i64, _coarse_dis: f32) {
        if !self.encoder.by_residual || list < 0 {
            return;
        }
        match self.metric {
            Metric::L2 => {
                let mut residual = vec![0.0f32; self.query.len()];
                self.encoder.coarse.residual(&self.query, list, &mut residual);
                self.table = Some(self.encoder.pq.table(Metric::L2, &residual));
            }
            Metric::InnerProduct => {
                // Codes quantize x − c, so ⟨q, x⟩ ≈ ⟨q, c⟩ + table lookup.
                self.bias = inner_product(&self.query, self.encoder.coarse.centroid(list));
            }
        }
    }

    /// Stream one bucket's entries into the heap. Returns heap updates.
    pub fn scan_codes(&self, vids: &[i64], codes: &[u8], heap: &mut KnnHeap) -> usize {
        let Some(table) = self.table.as_ref() else {
            return 0;
        };
        let code_size = self.encoder.pq.code_size();
        let mut nup = 0;
        for (i, &vid) in vids.iter().enumerate() {
            if !self.filter.pass(vid) {
                continue;
            }
            let code = &codes[i * code_size..(i + 1) * code_size];
            let dis = self.bias + table.lookup(code);
            if heap.maybe_push(dis, vid) {
                nup += 1;
            }
        }
        nup
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rilldb_core::{DeleteBitmap, RangeResult};
    use std::collections::HashMap;

    use crate::rt_invert::RtInvertIndex;

    fn one_hot(dim: usize, at: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; dim];
        v[at] = 1.0;
        v
    }

    struct Fixture {
        encoder: PqEncoder,
        store: RawVectorStore,
        rt: RtInvertIndex,
        bitmap: DeleteBitmap,
    }

    // 256 vectors over 4 distinct directions, one doc per vector.
    fn fixture(metric: Metric) -> Fixture {
        let d = 8;
        let store = RawVectorStore::new(d);
        let mut xs = Vec::new();
        for i in 0..256 {
            let v = one_hot(d, i % 4);
            store.add(i as i64, &v, b"").unwrap();
            xs.extend_from_slice(&v);
        }

        let mut encoder = PqEncoder::new(d, 4, 4, metric).unwrap();
        encoder.train(256, &xs);

        let rt = RtInvertIndex::new(4, 4, 16, 1024);
        let mut keys: HashMap<i64, Vec<i64>> = HashMap::new();
        let mut codes: HashMap<i64, Vec<u8>> = HashMap::new();
        for (vid, x) in xs.chunks_exact(d).enumerate() {
            let list = encoder.assign(x);
            let mut code = vec![0u8; 4];
            encoder.encode(x, list, &mut code);
            keys.entry(list).or_default().push(vid as i64);
            codes.entry(list).or_default().extend_from_slice(&code);
        }
        rt.add_keys(&keys, &codes).unwrap();

        Fixture {
            encoder,
            store,
            rt,
            bitmap: DeleteBitmap::with_capacity(256),
        }
    }

    #[test]
    fn test_scan_finds_exact_direction() {
        let fx = fixture(Metric::L2);
        let filter = VecFilter {
            bitmap: &fx.bitmap,
            store: &fx.store,
            range: None,
        };
        let mut scanner = ListScanner::new(Metric::L2, &fx.encoder, filter);

        let q = one_hot(8, 2);
        scanner.set_query(&q);
        let list = fx.encoder.assign(&q);

        let mut heap = KnnHeap::new(Metric::L2, 4);
        scanner.set_list(list, 0.0);
        let nup = fx
            .rt
            .with_list(list as usize, |vids, codes| scanner.scan_codes(vids, codes, &mut heap));
        assert!(nup > 0);

        let best = heap.into_sorted()[0];
        assert!(best.0 < 1e-4);
        assert_eq!(fx.store.vid2docid(best.1) % 4, 2);
    }

    #[test]
    fn test_scan_skips_deleted() {
        let fx = fixture(Metric::L2);
        // Delete every doc pointing in direction 1
        for docid in 0..256i64 {
            if docid % 4 == 1 {
                fx.bitmap.set(docid);
            }
        }
        let filter = VecFilter {
            bitmap: &fx.bitmap,
            store: &fx.store,
            range: None,
        };
        let mut scanner = ListScanner::new(Metric::L2, &fx.encoder, filter);

        let q = one_hot(8, 1);
        scanner.set_query(&q);
        let list = fx.encoder.assign(&q);
        scanner.set_list(list, 0.0);

        let mut heap = KnnHeap::new(Metric::L2, 8);
        fx.rt
            .with_list(list as usize, |vids, codes| scanner.scan_codes(vids, codes, &mut heap));

        for (_, vid) in heap.into_sorted() {
            if vid >= 0 {
                assert_ne!(fx.store.vid2docid(vid) % 4, 1);
            }
        }
    }

    #[test]
    fn test_scan_honors_range_filter() {
        let fx = fixture(Metric::L2);
        let allowed = RangeResult::from_docids([2, 6, 10]);
        let filter = VecFilter {
            bitmap: &fx.bitmap,
            store: &fx.store,
            range: Some(&allowed),
        };
        let mut scanner = ListScanner::new(Metric::L2, &fx.encoder, filter);

        let q = one_hot(8, 2);
        scanner.set_query(&q);
        let list = fx.encoder.assign(&q);
        scanner.set_list(list, 0.0);

        let mut heap = KnnHeap::new(Metric::L2, 16);
        fx.rt
            .with_list(list as usize, |vids, codes| scanner.scan_codes(vids, codes, &mut heap));

        for (_, vid) in heap.into_sorted() {
            if vid >= 0 {
                assert!(allowed.has(fx.store.vid2docid(vid)));
            }
        }
    }

    #[test]
    fn test_inner_product_scan() {
        let fx = fixture(Metric::InnerProduct);
        let filter = VecFilter {
            bitmap: &fx.bitmap,
            store: &fx.store,
            range: None,
        };
        let mut scanner = ListScanner::new(Metric::InnerProduct, &fx.encoder, filter);

        let q = one_hot(8, 0);
        scanner.set_query(&q);
        let list = fx.encoder.assign(&q);
        scanner.set_list(list, 0.0);

        let mut heap = KnnHeap::new(Metric::InnerProduct, 4);
        fx.rt
            .with_list(list as usize, |vids, codes| scanner.scan_codes(vids, codes, &mut heap));

        let best = heap.into_sorted()[0];
        assert!(best.0 > 0.5);
        assert_eq!(fx.store.vid2docid(best.1) % 4, 0);
    }
}
