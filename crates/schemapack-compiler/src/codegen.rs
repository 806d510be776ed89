//! Procedure generation for SchemaPack schemas
//!
//! Each IR node becomes three closures: one computing the encoded size of a
//! value, one writing it, and one reading it back. Composite nodes capture
//! the closures of their children, so the whole schema compiles to three
//! closure trees built from the same walk. Field order, label tables, and
//! variant indices are captured once here and shared by nothing else, which
//! keeps the three procedures in lockstep.

use crate::ast::LengthPrefix;
use crate::ir::*;
use schemapack::{BufferBuilder, BufferReader, Error, Map, PrimitiveType, Result, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Computes the encoded size of a value
pub type SizeFn = Box<dyn Fn(&Value) -> Result<usize> + Send + Sync>;

/// Appends the encoding of a value
pub type EncodeFn = Box<dyn Fn(&mut BufferBuilder, &Value) -> Result<()> + Send + Sync>;

/// Reads one value
pub type DecodeFn = Box<dyn Fn(&mut BufferReader<'_>) -> Result<Value> + Send + Sync>;

/// The three generated procedures for one schema
pub struct Procedures {
    pub size: SizeFn,
    pub encode: EncodeFn,
    pub decode: DecodeFn,
}

impl fmt::Debug for Procedures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Procedures").finish_non_exhaustive()
    }
}

/// Generate size, encode, and decode procedures from IR
pub fn generate(ir: &IrNode) -> Procedures {
    Procedures {
        size: size_procedure(ir),
        encode: encode_procedure(ir),
        decode: decode_procedure(ir),
    }
}

fn sizer<F>(f: F) -> SizeFn
where
    F: Fn(&Value) -> Result<usize> + Send + Sync + 'static,
{
    Box::new(f)
}

fn encoder<F>(f: F) -> EncodeFn
where
    F: Fn(&mut BufferBuilder, &Value) -> Result<()> + Send + Sync + 'static,
{
    Box::new(f)
}

fn decoder<F>(f: F) -> DecodeFn
where
    F: Fn(&mut BufferReader<'_>) -> Result<Value> + Send + Sync + 'static,
{
    Box::new(f)
}

static NULL: Value = Value::Null;

/// A missing field reads as `Null`
fn field<'v>(map: &'v Map, name: &str) -> &'v Value {
    map.get(name).unwrap_or(&NULL)
}

fn mismatch(expected: impl fmt::Display, value: &Value) -> Error {
    Error::InvalidValue(format!("expected {}, found {}", expected, value.kind()))
}

/// Prefix shape errors with the field they occurred in
fn in_field(name: &str, err: Error) -> Error {
    match err {
        Error::InvalidValue(message) => Error::InvalidValue(format!("{}: {}", name, message)),
        other => other,
    }
}

fn expect_object<'v>(value: &'v Value, expected: &str) -> Result<&'v Map> {
    value.as_object().ok_or_else(|| mismatch(expected, value))
}

/// Integer value of any integer variant, or of a float with no fractional part
fn integral(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0)
            .map(|f| f as i64)
    })
}

fn integer<T: TryFrom<i64>>(value: &Value, ty: PrimitiveType) -> Result<T> {
    let n = integral(value).ok_or_else(|| mismatch(ty, value))?;
    T::try_from(n).map_err(|_| Error::InvalidValue(format!("{} is out of range for {}", n, ty)))
}

fn float(value: &Value, ty: PrimitiveType) -> Result<f64> {
    value.as_f64().ok_or_else(|| mismatch(ty, value))
}

fn array_items(value: &Value, length: LengthPrefix) -> Result<&[Value]> {
    let items = value.as_array().ok_or_else(|| mismatch(length.flag(), value))?;
    if items.len() > length.max_len() {
        return Err(Error::InvalidValue(format!(
            "{} elements do not fit a {} length prefix (max {})",
            items.len(),
            length.flag(),
            length.max_len()
        )));
    }
    Ok(items)
}

/// Resolve the active union variant from the discriminant key
fn select_variant<'v>(
    value: &'v Value,
    discriminant: &str,
    indices: &HashMap<String, u8>,
) -> Result<(u8, &'v Map)> {
    let map = expect_object(value, "type-lookup object")?;
    let tag = match map.get(discriminant) {
        Some(Value::String(tag)) => tag,
        Some(other) => {
            return Err(Error::InvalidValue(format!(
                "discriminant '{}' must be a string, found {}",
                discriminant,
                other.kind()
            )))
        }
        None => {
            return Err(Error::InvalidValue(format!(
                "missing discriminant '{}'",
                discriminant
            )))
        }
    };
    let index = indices
        .get(tag.as_str())
        .ok_or_else(|| Error::TypeNotFound(format!("type-lookup tag '{}'", tag)))?;
    Ok((*index, map))
}

// Size
//
// Sizers look only at what determines the length: string contents, array
// counts, optional presence, and union tags. Leaf values are checked by the
// encoders.

fn size_procedure(node: &IrNode) -> SizeFn {
    match node {
        IrNode::Scalar(ty) => match ty.size() {
            Some(width) => sizer(move |_| Ok(width)),
            None => sizer(|value| {
                let text = value
                    .as_str()
                    .ok_or_else(|| mismatch(PrimitiveType::String, value))?;
                Ok(BufferBuilder::string_size(text))
            }),
        },
        IrNode::Custom { handler, .. } => {
            let handler = Arc::clone(handler);
            sizer(move |value| handler.size(value))
        }
        IrNode::Enum(_) | IrNode::NumberEnum(_) | IrNode::Bitmask(_) => sizer(|_| Ok(1)),
        IrNode::Optional(inner) => {
            let inner = size_procedure(inner);
            sizer(move |value| {
                if value.is_null() {
                    Ok(1)
                } else {
                    Ok(1 + inner(value)?)
                }
            })
        }
        IrNode::Array { element, length } => {
            let length = *length;
            let fixed = element.fixed_size();
            let element = size_procedure(element);
            sizer(move |value| {
                let items = array_items(value, length)?;
                let body = match fixed {
                    Some(width) => items.len() * width,
                    None => items
                        .iter()
                        .map(|item| element(item))
                        .sum::<Result<usize>>()?,
                };
                Ok(length.width() + body)
            })
        }
        IrNode::TypeLookup(lookup) => {
            let discriminant = lookup.discriminant.clone();
            let indices = lookup.indices.clone();
            let variants: Vec<_> = lookup
                .variants
                .iter()
                .map(|variant| field_sizes(&variant.fields))
                .collect();
            sizer(move |value| {
                let (index, map) = select_variant(value, &discriminant, &indices)?;
                Ok(1 + sum_field_sizes(&variants[index as usize], map)?)
            })
        }
        IrNode::Object(fields) => {
            let fields = field_sizes(fields);
            sizer(move |value| sum_field_sizes(&fields, expect_object(value, "object")?))
        }
    }
}

fn field_sizes(fields: &[IrField]) -> Vec<(String, SizeFn)> {
    fields
        .iter()
        .map(|f| (f.name.clone(), size_procedure(&f.node)))
        .collect()
}

fn sum_field_sizes(fields: &[(String, SizeFn)], map: &Map) -> Result<usize> {
    fields
        .iter()
        .map(|(name, size)| size(field(map, name)).map_err(|err| in_field(name, err)))
        .sum()
}

// Encode

fn encode_procedure(node: &IrNode) -> EncodeFn {
    match node {
        IrNode::Scalar(ty) => encode_scalar(*ty),
        IrNode::Custom { handler, .. } => {
            let handler = Arc::clone(handler);
            encoder(move |builder, value| handler.write(value, builder))
        }
        IrNode::Enum(e) => {
            let ordinals = e.ordinals.clone();
            encoder(move |builder, value| {
                let label = value.as_str().ok_or_else(|| mismatch("enum label", value))?;
                let ordinal = ordinals
                    .get(label)
                    .ok_or_else(|| Error::TypeNotFound(format!("enum label '{}'", label)))?;
                builder.write_u8(*ordinal);
                Ok(())
            })
        }
        IrNode::NumberEnum(e) => {
            let ordinals = e.ordinals.clone();
            encoder(move |builder, value| {
                let label = integral(value).ok_or_else(|| mismatch("number-enum label", value))?;
                let ordinal = ordinals.get(&label).ok_or_else(|| {
                    Error::TypeNotFound(format!("number-enum label {}", label))
                })?;
                builder.write_u8(*ordinal);
                Ok(())
            })
        }
        IrNode::Bitmask(mask) => {
            let names = mask.flags.clone();
            encoder(move |builder, value| {
                let map = expect_object(value, "bitmask object")?;
                let flags = names
                    .iter()
                    .map(|name| match field(map, name) {
                        Value::Null => Ok(false),
                        Value::Bool(set) => Ok(*set),
                        other => Err(in_field(name, mismatch("bool", other))),
                    })
                    .collect::<Result<Vec<_>>>()?;
                builder.write_bits(&flags)
            })
        }
        IrNode::Optional(inner) => {
            let inner = encode_procedure(inner);
            encoder(move |builder, value| {
                if value.is_null() {
                    builder.write_bool(false);
                    Ok(())
                } else {
                    builder.write_bool(true);
                    inner(builder, value)
                }
            })
        }
        IrNode::Array { element, length } => {
            let length = *length;
            let element = encode_procedure(element);
            encoder(move |builder, value| {
                let items = array_items(value, length)?;
                match length {
                    LengthPrefix::U8 => builder.write_u8(items.len() as u8),
                    LengthPrefix::U16 => builder.write_u16(items.len() as u16),
                }
                for (index, item) in items.iter().enumerate() {
                    element(builder, item).map_err(|err| in_field(&format!("[{}]", index), err))?;
                }
                Ok(())
            })
        }
        IrNode::TypeLookup(lookup) => {
            let discriminant = lookup.discriminant.clone();
            let indices = lookup.indices.clone();
            let variants: Vec<_> = lookup
                .variants
                .iter()
                .map(|variant| field_encoders(&variant.fields))
                .collect();
            encoder(move |builder, value| {
                let (index, map) = select_variant(value, &discriminant, &indices)?;
                builder.write_u8(index);
                encode_fields(&variants[index as usize], builder, map)
            })
        }
        IrNode::Object(fields) => {
            let fields = field_encoders(fields);
            encoder(move |builder, value| {
                encode_fields(&fields, builder, expect_object(value, "object")?)
            })
        }
    }
}

fn encode_scalar(ty: PrimitiveType) -> EncodeFn {
    match ty {
        PrimitiveType::U8 => encoder(move |builder, value| {
            builder.write_u8(integer(value, ty)?);
            Ok(())
        }),
        PrimitiveType::U16 => encoder(move |builder, value| {
            builder.write_u16(integer(value, ty)?);
            Ok(())
        }),
        PrimitiveType::U32 => encoder(move |builder, value| {
            builder.write_u32(integer(value, ty)?);
            Ok(())
        }),
        PrimitiveType::I8 => encoder(move |builder, value| {
            builder.write_i8(integer(value, ty)?);
            Ok(())
        }),
        PrimitiveType::I16 => encoder(move |builder, value| {
            builder.write_i16(integer(value, ty)?);
            Ok(())
        }),
        PrimitiveType::I32 => encoder(move |builder, value| {
            builder.write_i32(integer(value, ty)?);
            Ok(())
        }),
        PrimitiveType::F32 => encoder(move |builder, value| {
            builder.write_f32(float(value, ty)? as f32);
            Ok(())
        }),
        PrimitiveType::F64 => encoder(move |builder, value| {
            builder.write_f64(float(value, ty)?);
            Ok(())
        }),
        PrimitiveType::Bool => encoder(move |builder, value| {
            builder.write_bool(value.as_bool().ok_or_else(|| mismatch(ty, value))?);
            Ok(())
        }),
        PrimitiveType::String => encoder(move |builder, value| {
            builder.write_string(value.as_str().ok_or_else(|| mismatch(ty, value))?)
        }),
    }
}

fn field_encoders(fields: &[IrField]) -> Vec<(String, EncodeFn)> {
    fields
        .iter()
        .map(|f| (f.name.clone(), encode_procedure(&f.node)))
        .collect()
}

fn encode_fields(
    fields: &[(String, EncodeFn)],
    builder: &mut BufferBuilder,
    map: &Map,
) -> Result<()> {
    for (name, encode) in fields {
        encode(builder, field(map, name)).map_err(|err| in_field(name, err))?;
    }
    Ok(())
}

// Decode

fn decode_procedure(node: &IrNode) -> DecodeFn {
    match node {
        IrNode::Scalar(ty) => decode_scalar(*ty),
        IrNode::Custom { handler, .. } => {
            let handler = Arc::clone(handler);
            decoder(move |reader| handler.read(reader))
        }
        IrNode::Enum(e) => {
            let labels = e.labels.clone();
            decoder(move |reader| {
                let ordinal = reader.read_u8()?;
                labels
                    .get(&ordinal)
                    .map(|label| Value::String(label.clone()))
                    .ok_or_else(|| Error::TypeNotFound(format!("enum ordinal {}", ordinal)))
            })
        }
        IrNode::NumberEnum(e) => {
            let labels = e.labels.clone();
            decoder(move |reader| {
                let ordinal = reader.read_u8()?;
                labels
                    .get(&ordinal)
                    .map(|label| Value::I32(*label))
                    .ok_or_else(|| {
                        Error::TypeNotFound(format!("number-enum ordinal {}", ordinal))
                    })
            })
        }
        IrNode::Bitmask(mask) => {
            let names = mask.flags.clone();
            decoder(move |reader| {
                let bits = reader.read_bits()?;
                if bits.len() != names.len() {
                    return Err(Error::InvalidFormat(format!(
                        "bitmask holds {} flags, schema declares {}",
                        bits.len(),
                        names.len()
                    )));
                }
                Ok(Value::Object(
                    names
                        .iter()
                        .zip(bits)
                        .map(|(name, set)| (name.clone(), Value::Bool(set)))
                        .collect(),
                ))
            })
        }
        IrNode::Optional(inner) => {
            let inner = decode_procedure(inner);
            decoder(move |reader| match reader.read_u8()? {
                0 => Ok(Value::Null),
                1 => inner(reader),
                other => Err(Error::InvalidFormat(format!(
                    "presence byte must be 0 or 1, found {}",
                    other
                ))),
            })
        }
        IrNode::Array { element, length } => {
            let length = *length;
            let element = decode_procedure(element);
            decoder(move |reader| {
                let count = match length {
                    LengthPrefix::U8 => reader.read_u8()? as usize,
                    LengthPrefix::U16 => reader.read_u16()? as usize,
                };
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(element(reader)?);
                }
                Ok(Value::Array(items))
            })
        }
        IrNode::TypeLookup(lookup) => {
            let discriminant = lookup.discriminant.clone();
            let variants: Vec<_> = lookup
                .variants
                .iter()
                .map(|variant| (variant.tag.clone(), field_decoders(&variant.fields)))
                .collect();
            decoder(move |reader| {
                let index = reader.read_u8()?;
                let (tag, fields) = variants.get(index as usize).ok_or_else(|| {
                    Error::TypeNotFound(format!("type-lookup index {}", index))
                })?;
                let mut map = Map::with_capacity(fields.len() + 1);
                map.insert(discriminant.clone(), Value::String(tag.clone()));
                decode_fields(fields, reader, &mut map)?;
                Ok(Value::Object(map))
            })
        }
        IrNode::Object(fields) => {
            let fields = field_decoders(fields);
            decoder(move |reader| {
                let mut map = Map::with_capacity(fields.len());
                decode_fields(&fields, reader, &mut map)?;
                Ok(Value::Object(map))
            })
        }
    }
}

fn decode_scalar(ty: PrimitiveType) -> DecodeFn {
    match ty {
        PrimitiveType::U8 => decoder(|reader| Ok(Value::U8(reader.read_u8()?))),
        PrimitiveType::U16 => decoder(|reader| Ok(Value::U16(reader.read_u16()?))),
        PrimitiveType::U32 => decoder(|reader| Ok(Value::U32(reader.read_u32()?))),
        PrimitiveType::I8 => decoder(|reader| Ok(Value::I8(reader.read_i8()?))),
        PrimitiveType::I16 => decoder(|reader| Ok(Value::I16(reader.read_i16()?))),
        PrimitiveType::I32 => decoder(|reader| Ok(Value::I32(reader.read_i32()?))),
        PrimitiveType::F32 => decoder(|reader| Ok(Value::F32(reader.read_f32()?))),
        PrimitiveType::F64 => decoder(|reader| Ok(Value::F64(reader.read_f64()?))),
        PrimitiveType::Bool => decoder(|reader| Ok(Value::Bool(reader.read_bool()?))),
        PrimitiveType::String => decoder(|reader| Ok(Value::String(reader.read_string()?))),
    }
}

fn field_decoders(fields: &[IrField]) -> Vec<(String, DecodeFn)> {
    fields
        .iter()
        .map(|f| (f.name.clone(), decode_procedure(&f.node)))
        .collect()
}

fn decode_fields(
    fields: &[(String, DecodeFn)],
    reader: &mut BufferReader<'_>,
    map: &mut Map,
) -> Result<()> {
    for (name, decode) in fields {
        map.insert(name.clone(), decode(reader)?);
    }
    Ok(())
}
