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

//! Table params marker file
//!
//! A lightweight JSON marker written into the table root at creation so a
//! reopened process can recover the row geometry and the index shape
//! without re-deriving them.

use std::path::Path;

use serde::{Deserialize, Serialize};

use rilldb_core::{Result, RillDBError};

use crate::table::FieldInfo;

const PARAMS_FILE: &str = "table_params.json";

/// Index shape recorded alongside the schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexMeta {
    pub nlist: usize,
    pub code_size: usize,
    pub d: usize,
    pub metric: String,
}

/// Everything a reopened table needs to interpret its files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableParams {
    pub item_length: usize,
    pub fields: Vec<FieldInfo>,
    pub index: IndexMeta,
}

impl TableParams {
    pub fn write(&self, root: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| RillDBError::Serialization(e.to_string()))?;
        std::fs::write(root.join(PARAMS_FILE), json)?;
        Ok(())
    }

    pub fn read(root: &Path) -> Result<Self> {
        let bytes = std::fs::read(root.join(PARAMS_FILE))?;
        serde_json::from_slice(&bytes).map_err(|e| RillDBError::Corrupt(e.to_string()))
    }
}
