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

//! Attribute table store
//!
//! Fixed-schema row store for document attributes. Each row is a fixed-width
//! byte tuple; scalar fields are stored little-endian at frozen offsets, and
//! string fields occupy a 10-byte slot pointing into the string heap:
//!
//! ```text
//! row:  ┌──────┬──────┬───────────────────────┬─────┐
//!       │ i32  │ f32  │ block_id,pos,len (10B)│ ... │
//!       └──────┴──────┴───────────┬───────────┘─────┘
//!                                 ▼
//! heap: ┌── block 0 ──┬── block 1 ──┬─ ... ─┐
//!       │ ..bytes..   │ ..bytes..   │       │
//!       └─────────────┴─────────────┴───────┘
//! ```
//!
//! A reserved `_id` field is the primary key. STRING ids are hashed to an
//! i64 for the key index; fixed-width ids use their little-endian bytes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

use byteorder::{ByteOrder, LittleEndian};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use rilldb_core::{Result, RillDBError};

use crate::block_storage::{BlockStorage, BlockStorageOptions};
use crate::key_index::{derive_scalar_key, derive_string_key, KeyIndex};
use crate::params::{IndexMeta, TableParams};
use crate::string_heap::StringHeap;

/// Bytes of a STRING row slot: `block_id: u32, in_block_pos: u32, len: u16`.
pub const STRING_SLOT_SIZE: usize = 10;

/// Longest storable string, bounded by the slot's u16 length.
pub const MAX_STRING_LEN: usize = u16::MAX as usize;

const RESERVED_ID_FIELD: &str = "_id";

// ============================================================================
// Schema types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Int32,
    Int64,
    Float32,
    Float64,
    String,
}

impl DataType {
    /// Width of this type inside a row.
    pub fn size(self) -> usize {
        match self {
            DataType::Int32 | DataType::Float32 => 4,
            DataType::Int64 | DataType::Float64 => 8,
            DataType::String => STRING_SLOT_SIZE,
        }
    }

    pub fn is_string(self) -> bool {
        self == DataType::String
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldInfo {
    pub name: String,
    pub data_type: DataType,
    pub is_index: bool,
}

/// Creation-time description of a table.
#[derive(Debug, Clone)]
pub struct TableInfo {
    pub name: String,
    pub fields: Vec<FieldInfo>,
}

// ============================================================================
// Values and documents
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Str(Vec<u8>),
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Int32(_) => DataType::Int32,
            Value::Int64(_) => DataType::Int64,
            Value::Float32(_) => DataType::Float32,
            Value::Float64(_) => DataType::Float64,
            Value::Str(_) => DataType::String,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldValue {
    pub name: String,
    pub value: Value,
}

impl FieldValue {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// One document: its external key plus a full set of field values.
#[derive(Debug, Clone, Default)]
pub struct Doc {
    pub key: Vec<u8>,
    pub fields: Vec<FieldValue>,
}

/// Per-row outcome of a batch insert. `None` means the row went in clean.
#[derive(Debug, Default)]
pub struct BatchResult {
    results: Vec<Option<String>>,
}

impl BatchResult {
    pub fn new(n: usize) -> Self {
        Self {
            results: vec![None; n],
        }
    }

    pub fn set(&mut self, i: usize, msg: impl Into<String>) {
        self.results[i] = Some(msg.into());
    }

    pub fn ok(&self, i: usize) -> bool {
        self.results[i].is_none()
    }

    pub fn error(&self, i: usize) -> Option<&str> {
        self.results[i].as_deref()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

// ============================================================================
// Table
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdKind {
    Str,
    Scalar,
}

struct FieldMeta {
    info: FieldInfo,
    offset: usize,
}

/// Fixed-schema attribute row store.
pub struct Table {
    root: PathBuf,
    name: String,
    created: bool,
    fields: Vec<FieldMeta>,
    attr_idx: HashMap<String, usize>,
    item_length: usize,
    key_idx: usize,
    id_kind: IdKind,
    storage: Option<BlockStorage>,
    heap: Option<StringHeap>,
    keys: KeyIndex,
    last_docid: AtomicI64,
}

impl Table {
    /// Prepare a table rooted at `<root>/table`. Nothing touches disk until
    /// [`Table::create_table`].
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.join("table"),
            name: String::new(),
            created: false,
            fields: Vec::new(),
            attr_idx: HashMap::new(),
            item_length: 0,
            key_idx: usize::MAX,
            id_kind: IdKind::Scalar,
            storage: None,
            heap: None,
            keys: KeyIndex::new(),
            last_docid: AtomicI64::new(-1),
        }
    }

    /// Register the schema, freeze row offsets, and open the backing files.
    pub fn create_table(&mut self, info: TableInfo, index: IndexMeta) -> Result<()> {
        if self.created {
            return Err(RillDBError::AlreadyCreated);
        }

        for field in &info.fields {
            self.add_field(field)?;
        }
        if self.key_idx == usize::MAX {
            return Err(RillDBError::MissingIdField);
        }

        self.name = info.name;
        std::fs::create_dir_all(&self.root)?;

        let opts = BlockStorageOptions {
            segment_size: 500_000,
            fixed_value_bytes: self.item_length,
            seg_block_capacity: 400_000,
        };
        let cache_mb = 512;
        let str_cache_mb = 512;
        let storage = BlockStorage::open(
            &self.root,
            &format!("{}_table", self.name),
            &opts,
            cache_mb,
        )?;
        let heap = StringHeap::open(&self.root, &format!("{}_string", self.name), str_cache_mb)?;

        TableParams {
            item_length: self.item_length,
            fields: self.fields.iter().map(|f| f.info.clone()).collect(),
            index,
        }
        .write(&self.root)?;

        self.storage = Some(storage);
        self.heap = Some(heap);
        self.created = true;
        info!(
            name = %self.name,
            item_length = self.item_length,
            field_num = self.fields.len(),
            "table created"
        );
        Ok(())
    }

    fn add_field(&mut self, field: &FieldInfo) -> Result<()> {
        if self.attr_idx.contains_key(&field.name) {
            return Err(RillDBError::DuplicateField(field.name.clone()));
        }
        if field.name == RESERVED_ID_FIELD {
            self.key_idx = self.fields.len();
            self.id_kind = if field.data_type.is_string() {
                IdKind::Str
            } else {
                IdKind::Scalar
            };
        }
        self.attr_idx.insert(field.name.clone(), self.fields.len());
        self.fields.push(FieldMeta {
            info: field.clone(),
            offset: self.item_length,
        });
        self.item_length += field.data_type.size();
        Ok(())
    }

    fn derive_key(&self, key: &[u8]) -> i64 {
        match self.id_kind {
            IdKind::Str => derive_string_key(key),
            IdKind::Scalar => derive_scalar_key(key),
        }
    }

    fn storage(&self) -> &BlockStorage {
        self.storage.as_ref().expect("table not created")
    }

    fn heap(&self) -> &StringHeap {
        self.heap.as_ref().expect("table not created")
    }

    // ------------------------------------------------------------------
    // Ingest
    // ------------------------------------------------------------------

    /// Insert one document. `fields` must match the schema positionally.
    pub fn add(&self, key: &[u8], fields: &[FieldValue], docid: i64) -> Result<()> {
        if fields.len() != self.fields.len() {
            return Err(RillDBError::BadArity {
                got: fields.len(),
                want: self.fields.len(),
            });
        }
        if key.is_empty() {
            return Err(RillDBError::EmptyKey);
        }

        self.keys.insert(self.derive_key(key), docid as i32);

        let mut row = vec![0u8; self.item_length];
        self.encode_row(fields, &mut row)?;
        self.storage().add(&row)?;

        if docid % 10_000 == 0 {
            info!(docid, "add item");
        }
        self.last_docid.store(docid, Ordering::Release);
        Ok(())
    }

    /// Insert a batch. Key insertions run in parallel; row encoding is
    /// sequential and appends a row for every entry, recording per-row
    /// failures in `result` without aborting the batch.
    pub fn batch_add(
        &self,
        start: usize,
        batch_size: usize,
        docid: i64,
        docs: &[Doc],
        result: &mut BatchResult,
    ) -> Result<()> {
        let key_failures: Vec<Option<String>> = (0..batch_size)
            .into_par_iter()
            .map(|i| {
                let doc = &docs[start + i];
                if doc.key.is_empty() {
                    return Some("add item error: _id is empty".to_string());
                }
                self.keys.insert(self.derive_key(&doc.key), (docid + i as i64) as i32);
                None
            })
            .collect();

        for (i, failure) in key_failures.into_iter().enumerate() {
            if let Some(msg) = failure {
                warn!(row = i, %msg, "batch add");
                result.set(i, msg);
            }
        }

        for i in 0..batch_size {
            let doc = &docs[start + i];
            let id = docid + i as i64;

            let mut row = vec![0u8; self.item_length];
            match self.encode_row(&doc.fields, &mut row) {
                Ok(()) => {}
                Err(e) => {
                    if result.ok(i) {
                        result.set(i, e.to_string());
                    }
                    // The row still occupies its docid slot.
                    row.fill(0);
                }
            }
            self.storage().add(&row)?;

            if id % 10_000 == 0 {
                info!(docid = id, "add item");
            }
        }

        self.last_docid
            .store(docid + batch_size as i64 - 1, Ordering::Release);
        Ok(())
    }

    /// Partial update. Unknown field names are skipped with a warning.
    pub fn update(&self, fields: &[FieldValue], docid: i64) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut row = self.storage().get(docid)?;

        for field in fields {
            let Some(&field_id) = self.attr_idx.get(&field.name) else {
                warn!(field = %field.name, "update skips unknown field");
                continue;
            };
            self.encode_field(field, field_id, docid, &mut row)?;
        }

        self.storage().update(docid, &row)
    }

    /// Remove the key mapping. Row bytes remain; the caller mirrors the
    /// deletion into the engine's delete bitmap.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.keys.erase(self.derive_key(key));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    pub fn get_docid_by_key(&self, key: &[u8]) -> Result<i32> {
        self.keys.find(self.derive_key(key)).ok_or_else(|| {
            RillDBError::NotFound(format!("key [{}]", String::from_utf8_lossy(key)))
        })
    }

    /// Fetch a document's fields. An empty request list means all fields.
    pub fn get_doc_info(&self, docid: i64, requested: &[String]) -> Result<Doc> {
        let last = self.last_docid.load(Ordering::Acquire);
        if docid < 0 || docid > last {
            return Err(RillDBError::OutOfRange(format!(
                "docid {docid} past last docid {last}"
            )));
        }
        let row = self.storage().get(docid)?;

        let field_ids: Vec<usize> = if requested.is_empty() {
            (0..self.fields.len()).collect()
        } else {
            requested
                .iter()
                .map(|name| {
                    self.attr_idx
                        .get(name)
                        .copied()
                        .ok_or_else(|| RillDBError::UnknownField(name.clone()))
                })
                .collect::<Result<_>>()?
        };

        let mut doc = Doc {
            key: self.raw_value_from_row(&row, self.key_idx)?,
            fields: Vec::with_capacity(field_ids.len()),
        };
        for id in field_ids {
            doc.fields.push(FieldValue {
                name: self.fields[id].info.name.clone(),
                value: self.decode_field(&row, id)?,
            });
        }
        Ok(doc)
    }

    pub fn get_doc_info_by_key(&self, key: &[u8], requested: &[String]) -> Result<Doc> {
        let docid = self.get_docid_by_key(key)?;
        self.get_doc_info(docid as i64, requested)
    }

    /// Raw stored bytes of one field: heap bytes for strings, little-endian
    /// bytes for scalars.
    pub fn get_field_raw_value(&self, docid: i64, field_id: usize) -> Result<Vec<u8>> {
        if field_id >= self.fields.len() {
            return Err(RillDBError::OutOfRange(format!("field id {field_id}")));
        }
        let row = self.storage().get(docid)?;
        self.raw_value_from_row(&row, field_id)
    }

    pub fn get_field_raw_value_by_name(&self, docid: i64, name: &str) -> Result<Vec<u8>> {
        let field_id = self
            .attr_idx
            .get(name)
            .copied()
            .ok_or_else(|| RillDBError::UnknownField(name.to_string()))?;
        self.get_field_raw_value(docid, field_id)
    }

    pub fn get_field_type(&self, name: &str) -> Result<DataType> {
        self.attr_idx
            .get(name)
            .map(|&id| self.fields[id].info.data_type)
            .ok_or_else(|| RillDBError::UnknownField(name.to_string()))
    }

    pub fn attr_types(&self) -> HashMap<String, DataType> {
        self.fields
            .iter()
            .map(|f| (f.info.name.clone(), f.info.data_type))
            .collect()
    }

    pub fn attr_is_index(&self) -> HashMap<String, bool> {
        self.fields
            .iter()
            .map(|f| (f.info.name.clone(), f.info.is_index))
            .collect()
    }

    pub fn attr_idx(&self, name: &str) -> Option<usize> {
        self.attr_idx.get(name).copied()
    }

    pub fn item_length(&self) -> usize {
        self.item_length
    }

    pub fn size(&self) -> usize {
        self.storage().size()
    }

    pub fn last_docid(&self) -> i64 {
        self.last_docid.load(Ordering::Acquire)
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    /// Truncate to `n` rows and rebuild the key index from the `_id` slots.
    pub fn load(&self, n: usize) -> Result<()> {
        let doc_num = self.storage().size();
        self.storage().truncate(n)?;
        info!(doc_num, truncate_to = n, "table load");

        self.last_docid.store(n as i64 - 1, Ordering::Release);
        self.keys.clear();
        for docid in 0..n as i64 {
            let row = self.storage().get(docid)?;
            let raw = self.raw_value_from_row(&row, self.key_idx)?;
            let key = match self.id_kind {
                IdKind::Str => derive_string_key(&raw),
                IdKind::Scalar => derive_scalar_key(&raw),
            };
            self.keys.insert(key, docid as i32);
        }
        info!(doc_num = n, "table load done");
        Ok(())
    }

    pub fn sync(&self) -> Result<()> {
        self.storage().sync()?;
        self.heap().sync()?;
        info!(name = %self.name, doc_num = self.storage().size(), "table sync");
        Ok(())
    }

    pub fn memory_bytes(&self) -> usize {
        self.storage().memory_bytes() + self.heap().memory_bytes() + self.keys.len() * 12
    }

    pub fn alter_cache_size(&self, cache_mb: usize, str_cache_mb: usize) -> Result<()> {
        self.storage().alter_cache_size(cache_mb)?;
        self.heap().alter_cache_size(str_cache_mb)
    }

    pub fn cache_size(&self) -> (u32, u32) {
        (self.storage().cache_size_mb(), self.heap().cache_size_mb())
    }

    // ------------------------------------------------------------------
    // Row codec
    // ------------------------------------------------------------------

    fn encode_row(&self, fields: &[FieldValue], row: &mut [u8]) -> Result<()> {
        if fields.len() != self.fields.len() {
            return Err(RillDBError::BadArity {
                got: fields.len(),
                want: self.fields.len(),
            });
        }
        for (field_id, field) in fields.iter().enumerate() {
            self.encode_field(field, field_id, -1, row)?;
        }
        Ok(())
    }

    fn encode_field(
        &self,
        field: &FieldValue,
        field_id: usize,
        docid: i64,
        row: &mut [u8],
    ) -> Result<()> {
        let meta = &self.fields[field_id];
        let offset = meta.offset;
        let expect = meta.info.data_type;
        if field.value.data_type() != expect {
            return Err(RillDBError::InvalidArgument(format!(
                "field [{}] expects {:?}, got {:?}",
                meta.info.name,
                expect,
                field.value.data_type()
            )));
        }

        match &field.value {
            Value::Int32(v) => row[offset..offset + 4].copy_from_slice(&v.to_le_bytes()),
            Value::Int64(v) => row[offset..offset + 8].copy_from_slice(&v.to_le_bytes()),
            Value::Float32(v) => row[offset..offset + 4].copy_from_slice(&v.to_le_bytes()),
            Value::Float64(v) => row[offset..offset + 8].copy_from_slice(&v.to_le_bytes()),
            Value::Str(bytes) => {
                if bytes.len() > MAX_STRING_LEN {
                    return Err(RillDBError::OversizeString {
                        field: meta.info.name.clone(),
                        len: bytes.len(),
                        max: MAX_STRING_LEN,
                    });
                }
                let pos = if docid >= 0 {
                    self.heap().update(docid, bytes)?
                } else {
                    self.heap().add(bytes)?
                };
                LittleEndian::write_u32(&mut row[offset..offset + 4], pos.block_id);
                LittleEndian::write_u32(&mut row[offset + 4..offset + 8], pos.in_block_pos);
                LittleEndian::write_u16(&mut row[offset + 8..offset + 10], bytes.len() as u16);
            }
        }
        Ok(())
    }

    fn decode_field(&self, row: &[u8], field_id: usize) -> Result<Value> {
        let meta = &self.fields[field_id];
        let offset = meta.offset;
        Ok(match meta.info.data_type {
            DataType::Int32 => {
                Value::Int32(i32::from_le_bytes(row[offset..offset + 4].try_into().unwrap()))
            }
            DataType::Int64 => {
                Value::Int64(i64::from_le_bytes(row[offset..offset + 8].try_into().unwrap()))
            }
            DataType::Float32 => {
                Value::Float32(f32::from_le_bytes(row[offset..offset + 4].try_into().unwrap()))
            }
            DataType::Float64 => {
                Value::Float64(f64::from_le_bytes(row[offset..offset + 8].try_into().unwrap()))
            }
            DataType::String => Value::Str(self.read_string_slot(row, offset)?),
        })
    }

    fn raw_value_from_row(&self, row: &[u8], field_id: usize) -> Result<Vec<u8>> {
        let meta = &self.fields[field_id];
        let offset = meta.offset;
        match meta.info.data_type {
            DataType::String => self.read_string_slot(row, offset),
            dt => Ok(row[offset..offset + dt.size()].to_vec()),
        }
    }

    fn read_string_slot(&self, row: &[u8], offset: usize) -> Result<Vec<u8>> {
        let block_id = LittleEndian::read_u32(&row[offset..offset + 4]);
        let in_block_pos = LittleEndian::read_u32(&row[offset + 4..offset + 8]);
        let len = LittleEndian::read_u16(&row[offset + 8..offset + 10]) as usize;
        self.heap().get(block_id, in_block_pos, len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn string_id_schema() -> TableInfo {
        TableInfo {
            name: "users".into(),
            fields: vec![
                FieldInfo {
                    name: "_id".into(),
                    data_type: DataType::String,
                    is_index: false,
                },
                FieldInfo {
                    name: "age".into(),
                    data_type: DataType::Int32,
                    is_index: true,
                },
            ],
        }
    }

    fn open_table(dir: &TempDir, info: TableInfo) -> Table {
        let mut table = Table::new(dir.path());
        table.create_table(info, IndexMeta::default()).unwrap();
        table
    }

    fn str_field(name: &str, v: &str) -> FieldValue {
        FieldValue::new(name, Value::Str(v.as_bytes().to_vec()))
    }

    #[test]
    fn test_create_twice() {
        let dir = TempDir::new().unwrap();
        let mut table = Table::new(dir.path());
        table
            .create_table(string_id_schema(), IndexMeta::default())
            .unwrap();
        assert!(matches!(
            table.create_table(string_id_schema(), IndexMeta::default()),
            Err(RillDBError::AlreadyCreated)
        ));
    }

    #[test]
    fn test_missing_id_field() {
        let dir = TempDir::new().unwrap();
        let mut table = Table::new(dir.path());
        let info = TableInfo {
            name: "t".into(),
            fields: vec![FieldInfo {
                name: "x".into(),
                data_type: DataType::Int32,
                is_index: false,
            }],
        };
        assert!(matches!(
            table.create_table(info, IndexMeta::default()),
            Err(RillDBError::MissingIdField)
        ));
    }

    #[test]
    fn test_duplicate_field() {
        let dir = TempDir::new().unwrap();
        let mut table = Table::new(dir.path());
        let mut info = string_id_schema();
        info.fields.push(info.fields[1].clone());
        assert!(matches!(
            table.create_table(info, IndexMeta::default()),
            Err(RillDBError::DuplicateField(_))
        ));
    }

    #[test]
    fn test_add_and_get_doc_info() {
        let dir = TempDir::new().unwrap();
        let table = open_table(&dir, string_id_schema());

        table
            .add(
                b"alice",
                &[str_field("_id", "alice"), FieldValue::new("age", Value::Int32(30))],
                0,
            )
            .unwrap();
        table
            .add(
                b"bob",
                &[str_field("_id", "bob"), FieldValue::new("age", Value::Int32(41))],
                1,
            )
            .unwrap();

        let doc = table.get_doc_info_by_key(b"alice", &[]).unwrap();
        assert_eq!(doc.fields[0].value, Value::Str(b"alice".to_vec()));
        assert_eq!(doc.fields[1].value, Value::Int32(30));

        assert_eq!(table.get_docid_by_key(b"bob").unwrap(), 1);
        assert_eq!(table.last_docid(), 1);
    }

    #[test]
    fn test_bad_arity_and_empty_key() {
        let dir = TempDir::new().unwrap();
        let table = open_table(&dir, string_id_schema());

        assert!(matches!(
            table.add(b"k", &[str_field("_id", "k")], 0),
            Err(RillDBError::BadArity { got: 1, want: 2 })
        ));
        assert!(matches!(
            table.add(
                b"",
                &[str_field("_id", ""), FieldValue::new("age", Value::Int32(1))],
                0
            ),
            Err(RillDBError::EmptyKey)
        ));
    }

    #[test]
    fn test_scalar_id_update_strings() {
        let dir = TempDir::new().unwrap();
        let info = TableInfo {
            name: "t".into(),
            fields: vec![
                FieldInfo {
                    name: "_id".into(),
                    data_type: DataType::Int32,
                    is_index: false,
                },
                FieldInfo {
                    name: "tags".into(),
                    data_type: DataType::String,
                    is_index: false,
                },
            ],
        };
        let table = open_table(&dir, info);

        table
            .add(
                &1i32.to_le_bytes(),
                &[FieldValue::new("_id", Value::Int32(1)), str_field("tags", "a")],
                0,
            )
            .unwrap();
        table
            .add(
                &2i32.to_le_bytes(),
                &[FieldValue::new("_id", Value::Int32(2)), str_field("tags", "bcdef")],
                1,
            )
            .unwrap();

        table.update(&[str_field("tags", "zz")], 1).unwrap();

        assert_eq!(table.get_field_raw_value_by_name(1, "tags").unwrap(), b"zz");
        assert_eq!(table.get_field_raw_value_by_name(0, "tags").unwrap(), b"a");
    }

    #[test]
    fn test_update_leaves_other_fields_intact() {
        let dir = TempDir::new().unwrap();
        let info = TableInfo {
            name: "t".into(),
            fields: vec![
                FieldInfo {
                    name: "_id".into(),
                    data_type: DataType::Int64,
                    is_index: false,
                },
                FieldInfo {
                    name: "score".into(),
                    data_type: DataType::Float64,
                    is_index: false,
                },
                FieldInfo {
                    name: "note".into(),
                    data_type: DataType::String,
                    is_index: false,
                },
            ],
        };
        let table = open_table(&dir, info);

        table
            .add(
                &7i64.to_le_bytes(),
                &[
                    FieldValue::new("_id", Value::Int64(7)),
                    FieldValue::new("score", Value::Float64(0.5)),
                    str_field("note", "keep me"),
                ],
                0,
            )
            .unwrap();

        table
            .update(&[FieldValue::new("score", Value::Float64(0.75))], 0)
            .unwrap();

        let doc = table.get_doc_info(0, &[]).unwrap();
        assert_eq!(doc.fields[0].value, Value::Int64(7));
        assert_eq!(doc.fields[1].value, Value::Float64(0.75));
        assert_eq!(doc.fields[2].value, Value::Str(b"keep me".to_vec()));
    }

    #[test]
    fn test_update_unknown_field_is_skipped() {
        let dir = TempDir::new().unwrap();
        let table = open_table(&dir, string_id_schema());
        table
            .add(
                b"k",
                &[str_field("_id", "k"), FieldValue::new("age", Value::Int32(3))],
                0,
            )
            .unwrap();

        // Unknown field must not fail the call or change the row
        table
            .update(
                &[
                    FieldValue::new("nope", Value::Int32(1)),
                    FieldValue::new("age", Value::Int32(4)),
                ],
                0,
            )
            .unwrap();
        let doc = table.get_doc_info(0, &["age".to_string()]).unwrap();
        assert_eq!(doc.fields[0].value, Value::Int32(4));
    }

    #[test]
    fn test_string_roundtrip_lengths() {
        let dir = TempDir::new().unwrap();
        let table = open_table(
            &dir,
            TableInfo {
                name: "t".into(),
                fields: vec![
                    FieldInfo {
                        name: "_id".into(),
                        data_type: DataType::Int32,
                        is_index: false,
                    },
                    FieldInfo {
                        name: "body".into(),
                        data_type: DataType::String,
                        is_index: false,
                    },
                ],
            },
        );

        for (docid, len) in [0usize, 1, 1000, MAX_STRING_LEN].iter().enumerate() {
            let body = vec![b'x'; *len];
            table
                .add(
                    &(docid as i32).to_le_bytes(),
                    &[
                        FieldValue::new("_id", Value::Int32(docid as i32)),
                        FieldValue::new("body", Value::Str(body.clone())),
                    ],
                    docid as i64,
                )
                .unwrap();
            assert_eq!(
                table.get_field_raw_value_by_name(docid as i64, "body").unwrap(),
                body
            );
        }

        // One byte past the slot bound is rejected
        let err = table.add(
            &9i32.to_le_bytes(),
            &[
                FieldValue::new("_id", Value::Int32(9)),
                FieldValue::new("body", Value::Str(vec![0u8; MAX_STRING_LEN + 1])),
            ],
            4,
        );
        assert!(matches!(err, Err(RillDBError::OversizeString { .. })));
    }

    #[test]
    fn test_delete_then_lookup() {
        let dir = TempDir::new().unwrap();
        let table = open_table(&dir, string_id_schema());
        table
            .add(
                b"gone",
                &[str_field("_id", "gone"), FieldValue::new("age", Value::Int32(9))],
                0,
            )
            .unwrap();

        table.delete(b"gone").unwrap();
        assert!(matches!(
            table.get_docid_by_key(b"gone"),
            Err(RillDBError::NotFound(_))
        ));
    }

    #[test]
    fn test_batch_add_records_failures() {
        let dir = TempDir::new().unwrap();
        let table = open_table(&dir, string_id_schema());

        let mut docs = Vec::new();
        for i in 0..5 {
            let key = if i == 2 {
                Vec::new() // empty key fails this row only
            } else {
                format!("k{i}").into_bytes()
            };
            docs.push(Doc {
                fields: vec![
                    FieldValue::new("_id", Value::Str(key.clone())),
                    FieldValue::new("age", Value::Int32(i)),
                ],
                key,
            });
        }

        let mut result = BatchResult::new(5);
        table.batch_add(0, 5, 0, &docs, &mut result).unwrap();

        assert!(result.ok(0));
        assert!(!result.ok(2));
        // Failed rows still consume their docid slot
        assert_eq!(table.size(), 5);
        assert_eq!(table.last_docid(), 4);
        assert_eq!(table.get_docid_by_key(b"k4").unwrap(), 4);
    }

    #[test]
    fn test_sync_load_reopen() {
        let dir = TempDir::new().unwrap();
        let n = 10_000;
        {
            let table = open_table(&dir, string_id_schema());
            for i in 0..n {
                let key = format!("user-{i}");
                table
                    .add(
                        key.as_bytes(),
                        &[
                            str_field("_id", &key),
                            FieldValue::new("age", Value::Int32(i as i32)),
                        ],
                        i as i64,
                    )
                    .unwrap();
            }
            table.sync().unwrap();
            // process "killed" here: no further sync
        }

        let table = open_table(&dir, string_id_schema());
        table.load(n).unwrap();
        assert_eq!(table.size(), n);
        assert_eq!(table.last_docid(), n as i64 - 1);
        for i in (0..n).step_by(499) {
            let key = format!("user-{i}");
            assert_eq!(table.get_docid_by_key(key.as_bytes()).unwrap(), i as i32);
        }
    }

    #[test]
    fn test_load_truncates() {
        let dir = TempDir::new().unwrap();
        let table = open_table(&dir, string_id_schema());
        for i in 0..20 {
            let key = format!("k{i}");
            table
                .add(
                    key.as_bytes(),
                    &[str_field("_id", &key), FieldValue::new("age", Value::Int32(i))],
                    i as i64,
                )
                .unwrap();
        }

        table.load(12).unwrap();
        assert_eq!(table.size(), 12);
        assert_eq!(table.get_docid_by_key(b"k11").unwrap(), 11);
        assert!(table.get_docid_by_key(b"k12").is_err());
        assert!(table.get_doc_info(12, &[]).is_err());
    }

    #[test]
    fn test_schema_accessors() {
        let dir = TempDir::new().unwrap();
        let table = open_table(&dir, string_id_schema());

        assert_eq!(table.get_field_type("age").unwrap(), DataType::Int32);
        assert_eq!(table.attr_idx("age"), Some(1));
        assert_eq!(table.attr_idx("none"), None);
        assert_eq!(table.attr_is_index()["age"], true);
        // _id string slot (10) + i32 (4)
        assert_eq!(table.item_length(), 14);
    }
}
