//! Dynamic values produced and consumed by compiled codecs

use indexmap::IndexMap;
use std::string::String;
use std::vec::Vec;

/// Ordered field map used for records, bitmasks, and union variants
pub type Map = IndexMap<String, Value>;

/// A dynamically typed value tree
///
/// Decoding always yields the variant matching the schema leaf exactly, so a
/// `uint16` field decodes to [`Value::U16`]. Encoding is more forgiving and
/// accepts any numeric variant whose value fits the target width.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent optional value
    #[default]
    Null,
    /// Boolean value
    Bool(bool),
    /// 8-bit unsigned integer
    U8(u8),
    /// 16-bit unsigned integer
    U16(u16),
    /// 32-bit unsigned integer
    U32(u32),
    /// 8-bit signed integer
    I8(i8),
    /// 16-bit signed integer
    I16(i16),
    /// 32-bit signed integer
    I32(i32),
    /// 32-bit floating point
    F32(f32),
    /// 64-bit floating point
    F64(f64),
    /// Text
    String(String),
    /// Homogeneous sequence
    Array(Vec<Value>),
    /// Ordered record
    Object(Map),
}

impl Value {
    /// Build an object from `(name, value)` pairs, keeping their order
    pub fn object<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Object(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Short name of the variant, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::U8(_) => "u8",
            Value::U16(_) => "u16",
            Value::U32(_) => "u32",
            Value::I8(_) => "i8",
            Value::I16(_) => "i16",
            Value::I32(_) => "i32",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Whether this is `Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Integer value of any integer variant
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::U8(v) => Some(v.into()),
            Value::U16(v) => Some(v.into()),
            Value::U32(v) => Some(v.into()),
            Value::I8(v) => Some(v.into()),
            Value::I16(v) => Some(v.into()),
            Value::I32(v) => Some(v.into()),
            _ => None,
        }
    }

    /// Floating point value of any numeric variant
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::F32(v) => Some(v.into()),
            Value::F64(v) => Some(v),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    /// Boolean value
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(v) => Some(v),
            _ => None,
        }
    }

    /// String slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Array elements
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Object fields
    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Look up an object field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|map| map.get(key))
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    f32 => F32,
    f64 => F64,
    String => String,
    Vec<Value> => Array,
    Map => Object,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.into())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> FromIterator<T> for Value {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Value::Array(iter.into_iter().map(Into::into).collect())
    }
}

#[cfg(feature = "serde")]
mod json {
    use super::{Map, Value};

    impl From<serde_json::Value> for Value {
        fn from(json: serde_json::Value) -> Self {
            match json {
                serde_json::Value::Null => Value::Null,
                serde_json::Value::Bool(b) => Value::Bool(b),
                serde_json::Value::Number(n) => {
                    if let Some(v) = n.as_i64().and_then(|v| i32::try_from(v).ok()) {
                        Value::I32(v)
                    } else if let Some(v) = n.as_u64().and_then(|v| u32::try_from(v).ok()) {
                        Value::U32(v)
                    } else {
                        Value::F64(n.as_f64().unwrap_or(f64::NAN))
                    }
                }
                serde_json::Value::String(s) => Value::String(s),
                serde_json::Value::Array(items) => items.into_iter().map(Value::from).collect(),
                serde_json::Value::Object(fields) => Value::Object(
                    fields
                        .into_iter()
                        .map(|(k, v)| (k, Value::from(v)))
                        .collect::<Map>(),
                ),
            }
        }
    }

    impl From<&Value> for serde_json::Value {
        fn from(value: &Value) -> Self {
            match value {
                Value::Null => serde_json::Value::Null,
                Value::Bool(b) => serde_json::Value::Bool(*b),
                Value::F32(v) => float_to_json((*v).into()),
                Value::F64(v) => float_to_json(*v),
                Value::String(s) => serde_json::Value::String(s.clone()),
                Value::Array(items) => {
                    serde_json::Value::Array(items.iter().map(serde_json::Value::from).collect())
                }
                Value::Object(fields) => serde_json::Value::Object(
                    fields
                        .iter()
                        .map(|(k, v)| (k.clone(), serde_json::Value::from(v)))
                        .collect(),
                ),
                other => other
                    .as_i64()
                    .map_or(serde_json::Value::Null, serde_json::Value::from),
            }
        }
    }

    fn float_to_json(v: f64) -> serde_json::Value {
        serde_json::Number::from_f64(v).map_or(serde_json::Value::Null, serde_json::Value::Number)
    }
}
