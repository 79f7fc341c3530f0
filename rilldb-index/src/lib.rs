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

//! RillDB Index
//!
//! Real-time IVF-PQ vector search. Vectors are admitted continuously, can be
//! updated and logically deleted, and posting lists compact in the
//! background while searches keep running.
//!
//! ```text
//! AddVec ─► RawVectorStore ─► IvfPqIndex ─► RtInvertIndex (nlist buckets)
//! Search ─► coarse probe ─► bucket scan (PQ codes) ─► optional exact rescore
//! ```

pub mod distance;
pub mod heap;
pub mod ivfpq;
pub mod pq;
pub mod rt_invert;
pub mod scanner;
pub mod store;

pub use distance::{inner_product, l2_sqr, Metric};
pub use heap::KnnHeap;
pub use ivfpq::{IvfPqIndex, IvfPqParams, SearchCondition, SearchResult};
pub use pq::{CoarseQuantizer, DistanceTable, PqEncoder, ProductQuantizer, KSUB};
pub use rt_invert::RtInvertIndex;
pub use scanner::{ListScanner, VecFilter};
pub use store::RawVectorStore;
