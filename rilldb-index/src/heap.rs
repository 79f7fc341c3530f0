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

//! Fixed-k result heap
//!
//! Keeps the k best candidates seen so far with the current worst at the
//! root, so a scan can reject most candidates with a single comparison
//! against [`KnnHeap::threshold`]. Thread-local heaps from parallel scans
//! merge with [`KnnHeap::merge_from`]; the heap never changes the set of
//! results, only how they were gathered.

use crate::distance::Metric;

/// Bounded best-results heap over `(distance, id)` pairs.
///
/// Slots start at the metric's worst sentinel with id −1, so unfilled
/// positions are recognizable downstream.
#[derive(Debug, Clone)]
pub struct KnnHeap {
    metric: Metric,
    dists: Vec<f32>,
    ids: Vec<i64>,
}

impl KnnHeap {
    pub fn new(metric: Metric, k: usize) -> Self {
        Self {
            metric,
            dists: vec![metric.worst(); k],
            ids: vec![-1; k],
        }
    }

    pub fn k(&self) -> usize {
        self.dists.len()
    }

    /// Current worst kept distance; anything not better than this loses.
    #[inline]
    pub fn threshold(&self) -> f32 {
        self.dists[0]
    }

    /// Offer a candidate. Returns `true` when it displaced the root.
    #[inline]
    pub fn maybe_push(&mut self, dist: f32, id: i64) -> bool {
        if !self.metric.is_better(dist, self.dists[0]) {
            return false;
        }
        self.dists[0] = dist;
        self.ids[0] = id;
        self.sift_down(0);
        true
    }

    /// Fold another heap's contents into this one.
    pub fn merge_from(&mut self, other: &KnnHeap) {
        for (&d, &id) in other.dists.iter().zip(other.ids.iter()) {
            if id >= 0 {
                self.maybe_push(d, id);
            }
        }
    }

    pub fn dists(&self) -> &[f32] {
        &self.dists
    }

    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    /// Drain into `(dist, id)` pairs ordered best first. Sentinel slots
    /// (id −1) sort to the tail.
    pub fn into_sorted(self) -> Vec<(f32, i64)> {
        let metric = self.metric;
        let mut pairs: Vec<(f32, i64)> = self.dists.into_iter().zip(self.ids).collect();
        pairs.sort_by(|a, b| {
            if metric.is_better(a.0, b.0) {
                std::cmp::Ordering::Less
            } else if metric.is_better(b.0, a.0) {
                std::cmp::Ordering::Greater
            } else {
                std::cmp::Ordering::Equal
            }
        });
        pairs
    }

    // Restore the heap property below `root`: a parent is never better
    // than its children.
    fn sift_down(&mut self, root: usize) {
        let n = self.dists.len();
        let mut i = root;
        loop {
            let left = 2 * i + 1;
            if left >= n {
                break;
            }
            let right = left + 1;
            let mut worst = left;
            if right < n && !self.metric.is_better(self.dists[right], self.dists[left]) {
                worst = right;
            }
            if self.metric.is_better(self.dists[i], self.dists[worst]) {
                self.dists.swap(i, worst);
                self.ids.swap(i, worst);
                i = worst;
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2_keeps_smallest() {
        let mut heap = KnnHeap::new(Metric::L2, 3);
        for (d, id) in [(5.0, 0), (1.0, 1), (4.0, 2), (2.0, 3), (3.0, 4)] {
            heap.maybe_push(d, id);
        }
        let sorted = heap.into_sorted();
        let ids: Vec<i64> = sorted.iter().map(|p| p.1).collect();
        assert_eq!(ids, vec![1, 3, 4]);
        assert_eq!(sorted[0].0, 1.0);
    }

    #[test]
    fn test_ip_keeps_largest() {
        let mut heap = KnnHeap::new(Metric::InnerProduct, 2);
        for (d, id) in [(0.1, 0), (0.9, 1), (0.5, 2)] {
            heap.maybe_push(d, id);
        }
        let ids: Vec<i64> = heap.into_sorted().iter().map(|p| p.1).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_unfilled_slots_are_sentinels() {
        let mut heap = KnnHeap::new(Metric::L2, 4);
        heap.maybe_push(1.0, 7);
        let sorted = heap.into_sorted();
        assert_eq!(sorted[0], (1.0, 7));
        for &(d, id) in &sorted[1..] {
            assert_eq!(id, -1);
            assert_eq!(d, f32::INFINITY);
        }
    }

    #[test]
    fn test_merge_equals_sequential() {
        let items: Vec<(f32, i64)> = (0..100).map(|i| ((i * 37 % 101) as f32, i)).collect();

        let mut all = KnnHeap::new(Metric::L2, 10);
        for &(d, id) in &items {
            all.maybe_push(d, id);
        }

        let mut left = KnnHeap::new(Metric::L2, 10);
        let mut right = KnnHeap::new(Metric::L2, 10);
        for &(d, id) in &items[..50] {
            left.maybe_push(d, id);
        }
        for &(d, id) in &items[50..] {
            right.maybe_push(d, id);
        }
        left.merge_from(&right);

        let mut a: Vec<i64> = all.into_sorted().iter().map(|p| p.1).collect();
        let mut b: Vec<i64> = left.into_sorted().iter().map(|p| p.1).collect();
        a.sort_unstable();
        b.sort_unstable();
        assert_eq!(a, b);
    }

    #[test]
    fn test_threshold_tracks_root() {
        let mut heap = KnnHeap::new(Metric::L2, 2);
        assert_eq!(heap.threshold(), f32::INFINITY);
        heap.maybe_push(3.0, 0);
        heap.maybe_push(1.0, 1);
        assert_eq!(heap.threshold(), 3.0);
        assert!(!heap.maybe_push(3.5, 2));
    }
}
