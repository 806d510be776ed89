//! Scalar leaf types

/// Scalar leaf types a schema can name directly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    /// 8-bit unsigned integer
    U8,
    /// 16-bit unsigned integer
    U16,
    /// 32-bit unsigned integer
    U32,
    /// 8-bit signed integer
    I8,
    /// 16-bit signed integer
    I16,
    /// 32-bit signed integer
    I32,
    /// 32-bit floating point
    F32,
    /// 64-bit floating point
    F64,
    /// Boolean value, one byte
    Bool,
    /// UTF-16 string with a u16 length prefix
    String,
}

impl PrimitiveType {
    /// All primitive types, in declaration order
    pub const ALL: [PrimitiveType; 10] = [
        PrimitiveType::U8,
        PrimitiveType::U16,
        PrimitiveType::U32,
        PrimitiveType::I8,
        PrimitiveType::I16,
        PrimitiveType::I32,
        PrimitiveType::F32,
        PrimitiveType::F64,
        PrimitiveType::Bool,
        PrimitiveType::String,
    ];

    /// Get the size of this primitive type in bytes, `None` for strings
    pub fn size(self) -> Option<usize> {
        match self {
            PrimitiveType::U8 | PrimitiveType::I8 | PrimitiveType::Bool => Some(1),
            PrimitiveType::U16 | PrimitiveType::I16 => Some(2),
            PrimitiveType::U32 | PrimitiveType::I32 | PrimitiveType::F32 => Some(4),
            PrimitiveType::F64 => Some(8),
            PrimitiveType::String => None,
        }
    }

    /// Name used for this type in schema documents
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveType::U8 => "uint8",
            PrimitiveType::U16 => "uint16",
            PrimitiveType::U32 => "uint32",
            PrimitiveType::I8 => "int8",
            PrimitiveType::I16 => "int16",
            PrimitiveType::I32 => "int32",
            PrimitiveType::F32 => "float32",
            PrimitiveType::F64 => "float64",
            PrimitiveType::Bool => "boolean",
            PrimitiveType::String => "string",
        }
    }

    /// Resolve a schema type name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|ty| ty.name() == name)
    }
}

impl core::fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}
