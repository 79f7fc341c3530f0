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

//! Delete bitmap for logical deletion
//!
//! Deleted documents stay in the row store and in the posting lists; search
//! filters them through this bitmap, and posting-list compaction reclaims
//! their entries later. Document ids are dense, so a word-array bitset gives
//! O(1) checks at one bit per document.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

const WORD_BITS: usize = 64;

/// Growable atomic bitset over document ids.
///
/// `test` on a never-set or out-of-range docid is `false`, which makes the
/// bitmap safe to consult for documents added after the bitmap was sized.
pub struct DeleteBitmap {
    words: RwLock<Vec<AtomicU64>>,
}

impl DeleteBitmap {
    /// Create a bitmap with room for `bits` documents. Grows on demand.
    pub fn with_capacity(bits: usize) -> Self {
        let words = bits.div_ceil(WORD_BITS);
        Self {
            words: RwLock::new(Self::zeroed(words)),
        }
    }

    fn zeroed(words: usize) -> Vec<AtomicU64> {
        let mut v = Vec::with_capacity(words);
        v.resize_with(words, || AtomicU64::new(0));
        v
    }

    /// Mark a document deleted. Returns `true` when the bit was newly set.
    pub fn set(&self, docid: i64) -> bool {
        if docid < 0 {
            return false;
        }
        let word = docid as usize / WORD_BITS;
        let mask = 1u64 << (docid as usize % WORD_BITS);

        {
            let words = self.words.read();
            if word < words.len() {
                let prev = words[word].fetch_or(mask, Ordering::AcqRel);
                return prev & mask == 0;
            }
        }

        let mut words = self.words.write();
        if word >= words.len() {
            let grow = (word + 1).max(words.len() * 2);
            words.resize_with(grow, || AtomicU64::new(0));
        }
        let prev = words[word].fetch_or(mask, Ordering::AcqRel);
        prev & mask == 0
    }

    /// Check whether a document is deleted.
    #[inline]
    pub fn test(&self, docid: i64) -> bool {
        if docid < 0 {
            return false;
        }
        let word = docid as usize / WORD_BITS;
        let mask = 1u64 << (docid as usize % WORD_BITS);
        let words = self.words.read();
        match words.get(word) {
            Some(w) => w.load(Ordering::Acquire) & mask != 0,
            None => false,
        }
    }

    /// Number of bits currently addressable without growth.
    pub fn capacity(&self) -> usize {
        self.words.read().len() * WORD_BITS
    }
}
