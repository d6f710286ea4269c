//! Property data types.

use tracing::warn;

use crate::util::LeElement;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float,
    Double,
    Date,
    DateTime,
    String,
    LCString,
    Id,
    Null,
}

impl DataType {
    /// Map a schema type name. Unknown names degrade to [`DataType::Null`]
    /// with a logged warning; consumers must tolerate a null-typed column.
    pub fn parse(name: &str) -> DataType {
        match name {
            "Int32" => DataType::Int32,
            "UInt32" => DataType::UInt32,
            "Int64" => DataType::Int64,
            "UInt64" => DataType::UInt64,
            "Float" => DataType::Float,
            "Double" => DataType::Double,
            "Date" => DataType::Date,
            "DateTime" => DataType::DateTime,
            "String" => DataType::String,
            "LCString" => DataType::LCString,
            "ID" => DataType::Id,
            other => {
                warn!(data_type = other, "unsupported data type, mapping to Null");
                DataType::Null
            }
        }
    }
}

/// Days-since-epoch date value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Date(pub i32);

impl Date {
    pub fn to_i32(self) -> i32 {
        self.0
    }
}

/// Milliseconds-since-epoch timestamp value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct DateTime(pub i64);

impl DateTime {
    pub fn to_i64(self) -> i64 {
        self.0
    }
}

impl LeElement for Date {
    const SIZE: usize = 4;

    #[inline]
    fn decode(bytes: &[u8]) -> Self {
        Date(i32::decode(bytes))
    }
}

impl LeElement for DateTime {
    const SIZE: usize = 8;

    #[inline]
    fn decode(bytes: &[u8]) -> Self {
        DateTime(i64::decode(bytes))
    }
}
