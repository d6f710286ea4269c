//! Typed, read-only columnar property storage.
//!
//! Columns are loaded once from partition files and never mutated. The
//! variant set is closed: fixed-width numerics, variable-length strings, and
//! low-cardinality dictionary strings, dispatched by a single `match`.

use std::collections::HashMap;

use crate::graph::types::Gid;
use crate::property::types::{DataType, Date, DateTime};
use crate::util::load_array;

/// Variable-length string column: per-row offset and length into a shared
/// byte buffer. Files: `<prefix>_offset`, `<prefix>_length`,
/// `<prefix>_content`.
#[derive(Debug, Default)]
pub struct StringColumn {
    offsets: Vec<u64>,
    lengths: Vec<u16>,
    content: Vec<u8>,
}

impl StringColumn {
    pub fn open(prefix: &str) -> Self {
        Self {
            offsets: load_array(format!("{prefix}_offset")),
            lengths: load_array(format!("{prefix}_length")),
            content: load_array(format!("{prefix}_content")),
        }
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// `None` for an out-of-range row, a truncated content buffer, or
    /// invalid UTF-8.
    pub fn get(&self, idx: usize) -> Option<&str> {
        let offset = *self.offsets.get(idx)? as usize;
        let length = *self.lengths.get(idx)? as usize;
        let bytes = self.content.get(offset..offset + length)?;
        std::str::from_utf8(bytes).ok()
    }
}

/// Low-cardinality string column: per-row u16 code into an owned dictionary
/// column. Files: `<prefix>_index` plus the dictionary under
/// `<prefix>_data`. The name-to-code map is dictionary metadata built by one
/// scan at load time.
#[derive(Debug, Default)]
pub struct LCStringColumn {
    index: Vec<u16>,
    data: StringColumn,
    codes: HashMap<String, u16>,
}

impl LCStringColumn {
    pub fn open(prefix: &str) -> Self {
        let index = load_array(format!("{prefix}_index"));
        let data = StringColumn::open(&format!("{prefix}_data"));
        let mut codes = HashMap::with_capacity(data.len());
        for i in 0..data.len() {
            if let Some(name) = data.get(i) {
                codes.insert(name.to_string(), i as u16);
            }
        }
        Self { index, data, codes }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&str> {
        let code = *self.index.get(idx)?;
        self.data.get(code as usize)
    }

    /// Dictionary code of `name`, if interned.
    pub fn dict_code(&self, name: &str) -> Option<u16> {
        self.codes.get(name).copied()
    }
}

/// Closed column variant selected by the schema's declared [`DataType`].
/// `Null` marks a column whose declared type was unknown: it owns no
/// storage; size queries stay valid, value accessors do not exist for it.
#[derive(Debug)]
pub enum Column {
    Int32(Vec<i32>),
    UInt32(Vec<u32>),
    Int64(Vec<i64>),
    UInt64(Vec<u64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Date(Vec<Date>),
    DateTime(Vec<DateTime>),
    Id(Vec<Gid>),
    String(StringColumn),
    LCString(LCStringColumn),
    Null,
}

impl Column {
    /// Open the storage for one declared field. Numeric columns load the
    /// bare `prefix` file; string variants load their suffixed file set.
    pub fn open(prefix: &str, data_type: DataType) -> Column {
        match data_type {
            DataType::Int32 => Column::Int32(load_array(prefix)),
            DataType::UInt32 => Column::UInt32(load_array(prefix)),
            DataType::Int64 => Column::Int64(load_array(prefix)),
            DataType::UInt64 => Column::UInt64(load_array(prefix)),
            DataType::Float => Column::Float(load_array(prefix)),
            DataType::Double => Column::Double(load_array(prefix)),
            DataType::Date => Column::Date(load_array(prefix)),
            DataType::DateTime => Column::DateTime(load_array(prefix)),
            DataType::Id => Column::Id(load_array(prefix)),
            DataType::String => Column::String(StringColumn::open(prefix)),
            DataType::LCString => Column::LCString(LCStringColumn::open(prefix)),
            DataType::Null => Column::Null,
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Column::Int32(_) => DataType::Int32,
            Column::UInt32(_) => DataType::UInt32,
            Column::Int64(_) => DataType::Int64,
            Column::UInt64(_) => DataType::UInt64,
            Column::Float(_) => DataType::Float,
            Column::Double(_) => DataType::Double,
            Column::Date(_) => DataType::Date,
            Column::DateTime(_) => DataType::DateTime,
            Column::Id(_) => DataType::Id,
            Column::String(_) => DataType::String,
            Column::LCString(_) => DataType::LCString,
            Column::Null => DataType::Null,
        }
    }

    /// Number of stored values. `Null` columns own no storage.
    pub fn len(&self) -> usize {
        match self {
            Column::Int32(v) => v.len(),
            Column::UInt32(v) => v.len(),
            Column::Int64(v) => v.len(),
            Column::UInt64(v) => v.len(),
            Column::Float(v) => v.len(),
            Column::Double(v) => v.len(),
            Column::Date(v) => v.len(),
            Column::DateTime(v) => v.len(),
            Column::Id(v) => v.len(),
            Column::String(c) => c.len(),
            Column::LCString(c) => c.len(),
            Column::Null => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Column::Null)
    }

    // Capability queries: a typed handle, or `None` when the column holds a
    // different type.

    pub fn as_int32(&self) -> Option<&[i32]> {
        match self {
            Column::Int32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_uint32(&self) -> Option<&[u32]> {
        match self {
            Column::UInt32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_int64(&self) -> Option<&[i64]> {
        match self {
            Column::Int64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_uint64(&self) -> Option<&[u64]> {
        match self {
            Column::UInt64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<&[f32]> {
        match self {
            Column::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<&[f64]> {
        match self {
            Column::Double(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&[Date]> {
        match self {
            Column::Date(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<&[DateTime]> {
        match self {
            Column::DateTime(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_id(&self) -> Option<&[Gid]> {
        match self {
            Column::Id(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&StringColumn> {
        match self {
            Column::String(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_lc_string(&self) -> Option<&LCStringColumn> {
        match self {
            Column::LCString(c) => Some(c),
            _ => None,
        }
    }

    /// Row value for either string variant.
    pub fn get_str(&self, idx: usize) -> Option<&str> {
        match self {
            Column::String(c) => c.get(idx),
            Column::LCString(c) => c.get(idx),
            _ => None,
        }
    }
}
