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

//! Distance kernels and metric selection

/// Retrieval metric. Inner product ranks descending, L2 ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Metric {
    InnerProduct,
    #[default]
    L2,
}

impl Metric {
    /// Sentinel no result can beat.
    #[inline]
    pub fn worst(self) -> f32 {
        match self {
            Metric::InnerProduct => f32::NEG_INFINITY,
            Metric::L2 => f32::INFINITY,
        }
    }

    /// Is `a` strictly better than `b` under this metric?
    #[inline]
    pub fn is_better(self, a: f32, b: f32) -> bool {
        match self {
            Metric::InnerProduct => a > b,
            Metric::L2 => a < b,
        }
    }

    /// Score two vectors.
    #[inline]
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::InnerProduct => inner_product(a, b),
            Metric::L2 => l2_sqr(a, b),
        }
    }
}

#[inline]
pub fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(&x, &y)| x * y).sum()
}

#[inline]
pub fn l2_sqr(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| (x - y) * (x - y))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernels() {
        let a = [1.0, 2.0, 3.0];
        let b = [4.0, 5.0, 6.0];

        assert_eq!(inner_product(&a, &b), 32.0);
        assert_eq!(l2_sqr(&a, &b), 27.0);
        assert_eq!(l2_sqr(&a, &a), 0.0);
    }

    #[test]
    fn test_metric_ordering() {
        assert!(Metric::L2.is_better(1.0, 2.0));
        assert!(Metric::InnerProduct.is_better(2.0, 1.0));
        assert!(Metric::L2.is_better(0.0, Metric::L2.worst()));
        assert!(Metric::InnerProduct.is_better(0.0, Metric::InnerProduct.worst()));
    }
}
