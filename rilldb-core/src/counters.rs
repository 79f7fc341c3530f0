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

//! Shared engine counters
//!
//! One `EngineCounters` value is created per engine instance and handed to
//! every component that needs the document high-water mark or the logical
//! deletion count. The only writers are the public ingest and delete entry
//! points; everything else (the compaction policy in particular) reads.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Ingest/delete counters shared across the table store and the index.
#[derive(Debug, Default)]
pub struct EngineCounters {
    /// Highest document id committed so far, -1 when empty.
    max_docid: AtomicI64,

    /// Number of logically deleted documents.
    delete_num: AtomicU64,
}

impl EngineCounters {
    pub fn new() -> Self {
        Self {
            max_docid: AtomicI64::new(-1),
            delete_num: AtomicU64::new(0),
        }
    }

    /// Advance the document high-water mark. Keeps the maximum when racing.
    pub fn advance_max_docid(&self, docid: i64) {
        self.max_docid.fetch_max(docid, Ordering::AcqRel);
    }

    pub fn max_docid(&self) -> i64 {
        self.max_docid.load(Ordering::Acquire)
    }

    /// Record one logical deletion, returning the new total.
    pub fn note_delete(&self) -> u64 {
        self.delete_num.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn delete_num(&self) -> u64 {
        self.delete_num.load(Ordering::Acquire)
    }
}
