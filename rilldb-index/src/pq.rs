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

//! Coarse and product quantization
//!
//! The coarse quantizer assigns vectors to one of `nlist` buckets; the
//! product quantizer compresses each vector (or its residual against the
//! bucket centroid) into `code_size` bytes, one byte per subspace:
//!
//! ```text
//! x (d dims) ── assign ──► bucket b, residual r = x − centroid(b)
//! r ── split into m subspaces of d/m dims ──► [c₀, c₁, …, c_{m−1}]
//!                                      each cⱼ ∈ 0..256
//! ```
//!
//! At query time a per-query table of `m × 256` partial distances turns a
//! code into an approximate distance in `m` lookups.

use rand::rngs::ThreadRng;
use rand::Rng;

use rilldb_core::{Result, RillDBError};

use crate::distance::{inner_product, l2_sqr, Metric};
use crate::heap::KnnHeap;

/// Centroids per subspace; one code byte addresses them all.
pub const KSUB: usize = 256;

const KMEANS_ITER: usize = 10;

// ============================================================================
// k-means
// ============================================================================

/// Lloyd's iterations over flat row-major data, k-means++ seeded.
/// Returns `k * dim` centroids; clusters that empty out keep their previous
/// centroid.
fn kmeans(data: &[f32], dim: usize, k: usize, iters: usize, rng: &mut ThreadRng) -> Vec<f32> {
    let n = data.len() / dim;
    if n == 0 || k == 0 {
        return vec![0.0; k * dim];
    }

    let mut centroids = kmeans_pp_init(data, dim, k, rng);
    let mut assign = vec![usize::MAX; n];

    for _ in 0..iters {
        let mut moved = false;
        for i in 0..n {
            let x = &data[i * dim..(i + 1) * dim];
            let (best, _) = nearest_centroid(x, &centroids, dim, k);
            if assign[i] != best {
                assign[i] = best;
                moved = true;
            }
        }
        if !moved {
            break;
        }

        let mut sums = vec![0.0f64; k * dim];
        let mut counts = vec![0usize; k];
        for i in 0..n {
            let c = assign[i];
            counts[c] += 1;
            for j in 0..dim {
                sums[c * dim + j] += data[i * dim + j] as f64;
            }
        }
        for c in 0..k {
            if counts[c] == 0 {
                continue;
            }
            for j in 0..dim {
                centroids[c * dim + j] = (sums[c * dim + j] / counts[c] as f64) as f32;
            }
        }
    }

    centroids
}

/// D²-weighted seeding. When every remaining point already coincides with a
/// chosen centroid the leftover seeds are drawn uniformly.
fn kmeans_pp_init(data: &[f32], dim: usize, k: usize, rng: &mut ThreadRng) -> Vec<f32> {
    let n = data.len() / dim;
    let mut centroids = Vec::with_capacity(k * dim);

    let first = rng.gen_range(0..n);
    centroids.extend_from_slice(&data[first * dim..(first + 1) * dim]);

    let mut d2 = vec![0.0f32; n];
    for _ in 1..k {
        let chosen = centroids.len() / dim;
        let mut total = 0.0f64;
        for i in 0..n {
            let x = &data[i * dim..(i + 1) * dim];
            let (_, dist) = nearest_centroid(x, &centroids, dim, chosen);
            d2[i] = dist;
            total += dist as f64;
        }

        let pick = if total > 0.0 {
            let mut threshold = rng.gen::<f64>() * total;
            let mut pick = n - 1;
            for (i, &w) in d2.iter().enumerate() {
                threshold -= w as f64;
                if threshold <= 0.0 {
                    pick = i;
                    break;
                }
            }
            pick
        } else {
            rng.gen_range(0..n)
        };
        centroids.extend_from_slice(&data[pick * dim..(pick + 1) * dim]);
    }

    centroids
}

#[inline]
fn nearest_centroid(x: &[f32], centroids: &[f32], dim: usize, k: usize) -> (usize, f32) {
    let mut best = 0;
    let mut best_dist = f32::MAX;
    for c in 0..k {
        let dist = l2_sqr(x, &centroids[c * dim..(c + 1) * dim]);
        if dist < best_dist {
            best_dist = dist;
            best = c;
        }
    }
    (best, best_dist)
}

// ============================================================================
// Coarse quantizer
// ============================================================================

/// Flat `nlist`-centroid quantizer over the index dimension.
pub struct CoarseQuantizer {
    d: usize,
    nlist: usize,
    metric: Metric,
    centroids: Vec<f32>,
    trained: bool,
}

impl CoarseQuantizer {
    pub fn new(d: usize, nlist: usize, metric: Metric) -> Self {
        Self {
            d,
            nlist,
            metric,
            centroids: Vec::new(),
            trained: false,
        }
    }

    pub fn nlist(&self) -> usize {
        self.nlist
    }

    pub fn is_trained(&self) -> bool {
        self.trained
    }

    pub fn train(&mut self, xs: &[f32]) {
        let mut rng = rand::thread_rng();
        self.centroids = kmeans(xs, self.d, self.nlist, KMEANS_ITER, &mut rng);
        self.trained = true;
    }

    /// Bucket of a vector, −1 before training.
    pub fn assign(&self, x: &[f32]) -> i64 {
        if !self.trained {
            return -1;
        }
        let mut best = -1i64;
        let mut best_dist = self.metric.worst();
        for c in 0..self.nlist {
            let dist = self
                .metric
                .distance(x, &self.centroids[c * self.d..(c + 1) * self.d]);
            if self.metric.is_better(dist, best_dist) {
                best_dist = dist;
                best = c as i64;
            }
        }
        best
    }

    pub fn assign_batch(&self, xs: &[f32]) -> Vec<i64> {
        xs.chunks_exact(self.d).map(|x| self.assign(x)).collect()
    }

    /// Top `nprobe` buckets for a query, best first.
    pub fn search(&self, x: &[f32], nprobe: usize) -> Vec<(f32, i64)> {
        if !self.trained {
            return Vec::new();
        }
        let mut heap = KnnHeap::new(self.metric, nprobe.min(self.nlist));
        for c in 0..self.nlist {
            let dist = self
                .metric
                .distance(x, &self.centroids[c * self.d..(c + 1) * self.d]);
            heap.maybe_push(dist, c as i64);
        }
        heap.into_sorted()
            .into_iter()
            .filter(|&(_, id)| id >= 0)
            .collect()
    }

    pub fn centroid(&self, list: i64) -> &[f32] {
        let at = list as usize * self.d;
        &self.centroids[at..at + self.d]
    }

    /// `out = x − centroid(list)`.
    pub fn residual(&self, x: &[f32], list: i64, out: &mut [f32]) {
        let c = self.centroid(list);
        for j in 0..self.d {
            out[j] = x[j] - c[j];
        }
    }
}

// ============================================================================
// Product quantizer
// ============================================================================

/// `m`-subspace product quantizer, 256 centroids per subspace.
pub struct ProductQuantizer {
    d: usize,
    m: usize,
    dsub: usize,
    centroids: Vec<f32>,
    trained: bool,
}

impl ProductQuantizer {
    pub fn new(d: usize, m: usize) -> Result<Self> {
        if m == 0 || d % m != 0 {
            return Err(RillDBError::InvalidArgument(format!(
                "dimension {d} is not divisible into {m} subspaces"
            )));
        }
        Ok(Self {
            d,
            m,
            dsub: d / m,
            centroids: Vec::new(),
            trained: false,
        })
    }

    pub fn code_size(&self) -> usize {
        self.m
    }

    pub fn is_trained(&self) -> bool {
        self.trained
    }

    pub fn train(&mut self, xs: &[f32]) {
        let n = xs.len() / self.d;
        let mut rng = rand::thread_rng();
        let mut centroids = Vec::with_capacity(self.m * KSUB * self.dsub);

        let mut sub = vec![0.0f32; n * self.dsub];
        for j in 0..self.m {
            for i in 0..n {
                let at = i * self.d + j * self.dsub;
                sub[i * self.dsub..(i + 1) * self.dsub].copy_from_slice(&xs[at..at + self.dsub]);
            }
            centroids.extend(kmeans(&sub, self.dsub, KSUB, KMEANS_ITER, &mut rng));
        }

        self.centroids = centroids;
        self.trained = true;
    }

    #[inline]
    fn sub_centroid(&self, j: usize, c: usize) -> &[f32] {
        let at = (j * KSUB + c) * self.dsub;
        &self.centroids[at..at + self.dsub]
    }

    pub fn compute_code(&self, x: &[f32], out: &mut [u8]) {
        debug_assert_eq!(out.len(), self.m);
        for j in 0..self.m {
            let xj = &x[j * self.dsub..(j + 1) * self.dsub];
            let mut best = 0u8;
            let mut best_dist = f32::MAX;
            for c in 0..KSUB {
                let dist = l2_sqr(xj, self.sub_centroid(j, c));
                if dist < best_dist {
                    best_dist = dist;
                    best = c as u8;
                }
            }
            out[j] = best;
        }
    }

    pub fn compute_codes(&self, xs: &[f32], out: &mut [u8]) {
        for (i, x) in xs.chunks_exact(self.d).enumerate() {
            self.compute_code(x, &mut out[i * self.m..(i + 1) * self.m]);
        }
    }

    /// Per-query lookup table: partial distance from every sub-centroid.
    pub fn table(&self, metric: Metric, q: &[f32]) -> DistanceTable {
        let mut tab = vec![0.0f32; self.m * KSUB];
        for j in 0..self.m {
            let qj = &q[j * self.dsub..(j + 1) * self.dsub];
            for c in 0..KSUB {
                tab[j * KSUB + c] = match metric {
                    Metric::L2 => l2_sqr(qj, self.sub_centroid(j, c)),
                    Metric::InnerProduct => inner_product(qj, self.sub_centroid(j, c)),
                };
            }
        }
        DistanceTable { m: self.m, tab }
    }
}

/// Precomputed query-to-subcentroid distances; one lookup per code byte.
pub struct DistanceTable {
    m: usize,
    tab: Vec<f32>,
}

impl DistanceTable {
    #[inline]
    pub fn lookup(&self, code: &[u8]) -> f32 {
        let mut total = 0.0f32;
        for (j, &c) in code.iter().take(self.m).enumerate() {
            total += self.tab[j * KSUB + c as usize];
        }
        total
    }
}

// ============================================================================
// Encoder facade
// ============================================================================

/// Coarse + product quantizer pair used by the index.
///
/// Residual coding is enabled for L2; for inner product the codes quantize
/// the vector directly.
pub struct PqEncoder {
    pub coarse: CoarseQuantizer,
    pub pq: ProductQuantizer,
    pub by_residual: bool,
}

impl PqEncoder {
    pub fn new(d: usize, nlist: usize, code_size: usize, metric: Metric) -> Result<Self> {
        Ok(Self {
            coarse: CoarseQuantizer::new(d, nlist, metric),
            pq: ProductQuantizer::new(d, code_size)?,
            by_residual: metric == Metric::L2,
        })
    }

    pub fn is_trained(&self) -> bool {
        self.coarse.is_trained() && self.pq.is_trained()
    }

    /// Train both quantizers on `n` vectors of the index dimension.
    pub fn train(&mut self, n: usize, xs: &[f32]) {
        let d = xs.len() / n;
        debug_assert_eq!(xs.len(), n * d);
        self.coarse.train(xs);

        if self.by_residual {
            let mut residuals = vec![0.0f32; xs.len()];
            for (i, x) in xs.chunks_exact(d).enumerate() {
                let list = self.coarse.assign(x);
                if list >= 0 {
                    self.coarse
                        .residual(x, list, &mut residuals[i * d..(i + 1) * d]);
                }
            }
            self.pq.train(&residuals);
        } else {
            self.pq.train(xs);
        }
    }

    pub fn assign(&self, x: &[f32]) -> i64 {
        self.coarse.assign(x)
    }

    /// Encode one vector already assigned to `list`.
    pub fn encode(&self, x: &[f32], list: i64, code: &mut [u8]) {
        if self.by_residual && list >= 0 {
            let mut r = vec![0.0f32; x.len()];
            self.coarse.residual(x, list, &mut r);
            self.pq.compute_code(&r, code);
        } else if self.by_residual {
            // No centroid: encode a zero residual.
            self.pq.compute_code(&vec![0.0f32; x.len()], code);
        } else {
            self.pq.compute_code(x, code);
        }
    }
}
