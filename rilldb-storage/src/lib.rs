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

//! RillDB Storage
//!
//! The attribute side of the engine: a fixed-width, append-mostly row store
//! over paged block files, with a side heap for variable-length strings and
//! a primary-key index from external key to internal docid.
//!
//! ```text
//!            ┌────────────── Table ──────────────┐
//!  Add ────► │  KeyIndex  +  row encoder         │
//!            │      │                            │
//!            │      ▼                            │
//!            │  BlockStorage ◄────► StringHeap   │
//!            │        (shared LRU page cache)    │
//!            └───────────────────────────────────┘
//! ```

pub mod block_storage;
pub mod key_index;
pub mod page_cache;
pub mod params;
pub mod string_heap;
pub mod table;

pub use block_storage::{BlockStorage, BlockStorageOptions};
pub use key_index::{derive_scalar_key, derive_string_key, KeyIndex};
pub use page_cache::{PageCache, PageKey, PAGE_SIZE};
pub use params::{IndexMeta, TableParams};
pub use string_heap::{HeapPos, StringHeap};
pub use table::{
    BatchResult, DataType, Doc, FieldInfo, FieldValue, Table, TableInfo, Value, MAX_STRING_LEN,
    STRING_SLOT_SIZE,
};
