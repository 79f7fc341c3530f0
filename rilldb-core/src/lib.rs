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

//! RillDB Core
//!
//! Fundamental types shared by the storage and index crates:
//!
//! - **Errors**: the workspace-wide error enum and `Result` alias
//! - **Counters**: shared ingest/delete counters for the engine
//! - **Delete bitmap**: logical deletion over dense document ids
//! - **Range result**: a precomputed document id set consumed by
//!   filtered search

pub mod bitmap;
pub mod counters;
pub mod error;
pub mod range_result;

pub use bitmap::DeleteBitmap;
pub use counters::EngineCounters;
pub use error::{Result, RillDBError};
pub use range_result::RangeResult;
