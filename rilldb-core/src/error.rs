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

//! Error types for RillDB

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RillDBError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("table already created")]
    AlreadyCreated,

    #[error("schema has no _id field")]
    MissingIdField,

    #[error("duplicate field: {0}")]
    DuplicateField(String),

    #[error("field count {got} does not match schema field count {want}")]
    BadArity { got: usize, want: usize },

    #[error("_id is empty")]
    EmptyKey,

    #[error("string field [{field}] is {len} bytes, limit is {max}")]
    OversizeString {
        field: String,
        len: usize,
        max: usize,
    },

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("out of range: {0}")]
    OutOfRange(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("index is not trained")]
    NotTrained,

    #[error("training needs at least {need} vectors, have {have}")]
    TrainingInsufficient { have: usize, need: usize },

    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),

    #[error("corruption detected: {0}")]
    Corrupt(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, RillDBError>;
