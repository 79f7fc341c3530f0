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

//! Primary-key index
//!
//! Concurrent mapping from a derived 64-bit key to the internal docid.
//! External ids of any width collapse to an i64 so the index stays memory-
//! and cache-friendly:
//!
//! - STRING `_id`: xxHash64 (seed 0) of the UTF-8 bytes
//! - scalar `_id`: the first ≤8 little-endian bytes, zero-extended
//!
//! Documents whose derived keys collide are indistinguishable here; callers
//! must ensure external ids are unique.

use std::hash::Hasher;

use dashmap::DashMap;
use twox_hash::XxHash64;

/// Derive the index key for a STRING `_id`.
pub fn derive_string_key(bytes: &[u8]) -> i64 {
    let mut h = XxHash64::with_seed(0);
    h.write(bytes);
    h.finish() as i64
}

/// Derive the index key for a fixed-width scalar `_id`. Values shorter than
/// 8 bytes zero-extend.
pub fn derive_scalar_key(bytes: &[u8]) -> i64 {
    let mut buf = [0u8; 8];
    let n = bytes.len().min(8);
    buf[..n].copy_from_slice(&bytes[..n]);
    i64::from_le_bytes(buf)
}

/// Concurrent key → docid map. Inserts are latest-wins.
#[derive(Debug, Default)]
pub struct KeyIndex {
    map: DashMap<i64, i32>,
}

impl KeyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: i64, docid: i32) {
        self.map.insert(key, docid);
    }

    pub fn find(&self, key: i64) -> Option<i32> {
        self.map.get(&key).map(|v| *v)
    }

    pub fn erase(&self, key: i64) -> bool {
        self.map.remove(&key).is_some()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&self) {
        self.map.clear();
    }
}
