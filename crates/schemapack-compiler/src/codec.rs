//! Compiled codecs

use crate::ast::SchemaNode;
use crate::codegen::Procedures;
use crate::ir::{IrNode, IrUtils};
use crate::registry::CustomTypes;
use schemapack::{BufferBuilder, BufferReader, Error, Result, Value};
use std::fmt;

/// Encoder and decoder for one schema
///
/// Built by [`compile`](crate::compile). A codec is immutable and holds no
/// per-call state, so one instance can serve any number of threads.
pub struct Codec {
    schema: SchemaNode,
    procedures: Procedures,
    custom_types: CustomTypes,
    fixed_size: Option<usize>,
}

impl Codec {
    pub(crate) fn new(
        schema: SchemaNode,
        ir: &IrNode,
        procedures: Procedures,
        registry: &CustomTypes,
    ) -> Self {
        // Keep only the handles this schema uses
        let mut custom_types = CustomTypes::new();
        for name in IrUtils::custom_dependencies(ir) {
            if let Some(handler) = registry.get(name) {
                custom_types.insert_shared(name, handler.clone());
            }
        }

        Self {
            schema,
            procedures,
            custom_types,
            fixed_size: ir.fixed_size(),
        }
    }

    /// Number of bytes `encode` will produce for `value`
    ///
    /// Only the parts of `value` that decide the length are checked: object
    /// and array shapes, string contents, optional presence, and union tags.
    /// A wrongly typed leaf still gets a size here and fails in `encode`.
    pub fn size(&self, value: &Value) -> Result<usize> {
        (self.procedures.size)(value)
    }

    /// Encode a value into a buffer of exactly the computed size
    pub fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        let size = self.size(value)?;
        let mut builder = BufferBuilder::exact(size);
        (self.procedures.encode)(&mut builder, value)?;

        let actual = builder.position();
        if actual != size {
            tracing::warn!(expected = size, actual, "encoded size disagrees with size pass");
            return Err(Error::SizeMismatch {
                expected: size,
                actual,
            });
        }

        tracing::trace!(bytes = size, "encoded value");
        Ok(builder.finish())
    }

    /// Append a value to an existing builder
    pub fn encode_into(&self, builder: &mut BufferBuilder, value: &Value) -> Result<()> {
        (self.procedures.encode)(builder, value)
    }

    /// Decode a buffer holding exactly one value
    pub fn decode(&self, data: &[u8]) -> Result<Value> {
        let mut reader = BufferReader::new(data);
        let value = (self.procedures.decode)(&mut reader)?;
        reader.assert_fully_consumed()?;
        tracing::trace!(bytes = data.len(), "decoded value");
        Ok(value)
    }

    /// Decode one value at the reader's position, leaving the rest unread
    pub fn decode_from(&self, reader: &mut BufferReader<'_>) -> Result<Value> {
        (self.procedures.decode)(reader)
    }

    /// Schema this codec was compiled from
    pub fn schema(&self) -> &SchemaNode {
        &self.schema
    }

    /// Custom types captured at compile time
    pub fn custom_types(&self) -> &CustomTypes {
        &self.custom_types
    }

    /// Encoded size shared by every value, when the schema has one
    pub fn fixed_size(&self) -> Option<usize> {
        self.fixed_size
    }
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec")
            .field("schema", &self.schema.kind())
            .field("custom_types", &self.custom_types)
            .field("fixed_size", &self.fixed_size)
            .finish()
    }
}
