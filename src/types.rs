use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// A decoded attribute payload: string keys to dynamically typed values.
///
/// Key iteration order is unspecified. Anything that needs a stable order
/// (flattening, schema inference) must sort keys itself.
pub type AttributeRecord = HashMap<String, Value>;

/// A value decoded from the source data section
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Bytes(Vec<u8>),
    Text(String),
    U16(u16),
    U32(u32),
    I32(i32),
    U64(u64),
    U128(u128),
    F32(f32),
    F64(f64),
    /// Nested record, flattened into `parent_child` columns
    Map(AttributeRecord),
    /// Decoded but not representable as a column
    Array(Vec<Value>),
}

impl Value {
    /// Short name of the value kind, used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Bytes(_) => "bytes",
            Value::Text(_) => "text",
            Value::U16(_) => "uint16",
            Value::U32(_) => "uint32",
            Value::I32(_) => "int32",
            Value::U64(_) => "uint64",
            Value::U128(_) => "uint128",
            Value::F32(_) => "float",
            Value::F64(_) => "double",
            Value::Map(_) => "map",
            Value::Array(_) => "array",
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Bool(b) => serializer.serialize_bool(*b),
            // String columns carry raw bytes; JSON needs valid UTF-8
            Value::Bytes(b) => serializer.serialize_str(&String::from_utf8_lossy(b)),
            Value::Text(s) => serializer.serialize_str(s),
            Value::U16(n) => serializer.serialize_u16(*n),
            Value::U32(n) => serializer.serialize_u32(*n),
            Value::I32(n) => serializer.serialize_i32(*n),
            Value::U64(n) => serializer.serialize_u64(*n),
            // ClickHouse parses quoted UInt128 values
            Value::U128(n) => serializer.collect_str(n),
            Value::F32(n) => serializer.serialize_f32(*n),
            Value::F64(n) => serializer.serialize_f64(*n),
            Value::Map(m) => {
                let sorted: std::collections::BTreeMap<_, _> = m.iter().collect();
                sorted.serialize(serializer)
            }
            Value::Array(a) => a.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

/// Keeps the width of every integer and float kind the data section reports
struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a MaxMind DB data value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Value, E> {
        Ok(Value::Bytes(v.to_vec()))
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Value, E> {
        Ok(Value::Bytes(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::Text(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::Text(v))
    }

    fn visit_u16<E: de::Error>(self, v: u16) -> Result<Value, E> {
        Ok(Value::U16(v))
    }

    fn visit_u32<E: de::Error>(self, v: u32) -> Result<Value, E> {
        Ok(Value::U32(v))
    }

    fn visit_i32<E: de::Error>(self, v: i32) -> Result<Value, E> {
        Ok(Value::I32(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(Value::U64(v))
    }

    fn visit_u128<E: de::Error>(self, v: u128) -> Result<Value, E> {
        Ok(Value::U128(v))
    }

    fn visit_f32<E: de::Error>(self, v: f32) -> Result<Value, E> {
        Ok(Value::F32(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::F64(v))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let mut record = AttributeRecord::with_capacity(map.size_hint().unwrap_or(0).min(64));
        while let Some((key, value)) = map.next_entry::<String, Value>()? {
            record.insert(key, value);
        }
        Ok(Value::Map(record))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(64));
        while let Some(item) = seq.next_element::<Value>()? {
            items.push(item);
        }
        Ok(Value::Array(items))
    }
}

/// Position of a payload inside the source data section.
///
/// Networks that share a payload share an offset, which is what makes
/// offset-keyed deduplication work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Offset(pub u64);

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Column types understood by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColumnKind {
    Boolean,
    String,
    UInt16,
    UInt32,
    Int32,
    UInt64,
    UInt128,
    Float32,
    Float64,
    Date,
}

impl ColumnKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ColumnKind::Boolean => "Boolean",
            ColumnKind::String => "String",
            ColumnKind::UInt16 => "UInt16",
            ColumnKind::UInt32 => "UInt32",
            ColumnKind::Int32 => "Int32",
            ColumnKind::UInt64 => "UInt64",
            ColumnKind::UInt128 => "UInt128",
            ColumnKind::Float32 => "Float32",
            ColumnKind::Float64 => "Float64",
            ColumnKind::Date => "Date",
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Column {
            name: name.into(),
            kind,
        }
    }

    /// Key column of the network table
    pub fn network() -> Self {
        Column::new(NETWORK_COLUMN, ColumnKind::String)
    }

    /// Key column of the value table, and the join column of the network table
    pub fn pointer() -> Self {
        Column::new(POINTER_COLUMN, ColumnKind::UInt64)
    }

    pub fn partition() -> Self {
        Column::new(PARTITION_COLUMN, ColumnKind::Date)
    }
}

pub const NETWORK_COLUMN: &str = "network";
pub const POINTER_COLUMN: &str = "pointer";
pub const PARTITION_COLUMN: &str = "partition";

/// How the ingested data is laid out in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    /// Network table keyed to a deduplicated value table by pointer
    #[default]
    Deduplicated,
    /// One table, attributes repeated on every network row
    Inline,
}

impl std::str::FromStr for Layout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deduplicated" | "dedup" => Ok(Layout::Deduplicated),
            "inline" => Ok(Layout::Inline),
            other => Err(format!("unknown layout '{}' (expected deduplicated or inline)", other)),
        }
    }
}
