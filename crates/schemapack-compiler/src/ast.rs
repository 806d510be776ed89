//! Schema model: the tree of nodes describing a message shape

use schemapack::PrimitiveType;
use std::fmt;

/// One node of a schema
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    /// Built-in scalar leaf
    Primitive(PrimitiveType),
    /// Leaf delegated to a registered custom type
    Custom(String),
    /// String labels stored as a one-byte ordinal
    Enum(Vec<EnumVariant>),
    /// Numeric labels stored as a one-byte ordinal
    NumberEnum(Vec<NumberEnumVariant>),
    /// Up to seven named flags packed into one byte
    Bitmask(Vec<BitmaskFlag>),
    /// Presence byte followed by the inner value when present
    Optional(Box<SchemaNode>),
    /// Length-prefixed sequence
    Array {
        /// Element schema
        element: Box<SchemaNode>,
        /// Width of the length prefix
        length: LengthPrefix,
    },
    /// Tagged union: one-byte variant index followed by the variant's fields
    TypeLookup(Vec<LookupVariant>),
    /// Record whose declaration order is its wire order
    Object(Vec<Field>),
}

/// A named field of an object or union variant
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub node: SchemaNode,
}

/// A label of a string enum
#[derive(Debug, Clone, PartialEq)]
pub struct EnumVariant {
    pub name: String,
    pub value: i64,
}

/// A label of a numeric enum
#[derive(Debug, Clone, PartialEq)]
pub struct NumberEnumVariant {
    pub label: i32,
    pub value: i64,
}

/// A named bit of a bitmask
#[derive(Debug, Clone, PartialEq)]
pub struct BitmaskFlag {
    pub name: String,
    pub position: i64,
}

/// One arm of a tagged union
#[derive(Debug, Clone, PartialEq)]
pub struct LookupVariant {
    pub tag: String,
    pub fields: Vec<Field>,
}

/// Width of an array length prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthPrefix {
    U8,
    U16,
}

impl LengthPrefix {
    /// Bytes taken by the prefix
    pub fn width(self) -> usize {
        match self {
            LengthPrefix::U8 => 1,
            LengthPrefix::U16 => 2,
        }
    }

    /// Longest array the prefix can describe
    pub fn max_len(self) -> usize {
        match self {
            LengthPrefix::U8 => u8::MAX as usize,
            LengthPrefix::U16 => u16::MAX as usize,
        }
    }

    /// Flag name used in schema documents
    pub fn flag(self) -> &'static str {
        match self {
            LengthPrefix::U8 => "array-uint8",
            LengthPrefix::U16 => "array-uint16",
        }
    }
}

impl SchemaNode {
    /// Built-in scalar leaf
    pub fn primitive(ty: PrimitiveType) -> Self {
        SchemaNode::Primitive(ty)
    }

    /// Reference to a registered custom type
    pub fn custom(name: impl Into<String>) -> Self {
        SchemaNode::Custom(name.into())
    }

    /// Resolve a type token: built-in names become primitives, anything else
    /// refers to a custom type
    pub fn named(token: &str) -> Self {
        match PrimitiveType::from_name(token) {
            Some(ty) => SchemaNode::Primitive(ty),
            None => SchemaNode::Custom(token.to_string()),
        }
    }

    /// Record with fields in the given order
    pub fn object<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, SchemaNode)>,
    {
        SchemaNode::Object(
            fields
                .into_iter()
                .map(|(name, node)| Field::new(name, node))
                .collect(),
        )
    }

    /// String enum from `(label, ordinal)` pairs
    pub fn enumeration<K, I>(variants: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, i64)>,
    {
        SchemaNode::Enum(
            variants
                .into_iter()
                .map(|(name, value)| EnumVariant {
                    name: name.into(),
                    value,
                })
                .collect(),
        )
    }

    /// Numeric enum from `(label, ordinal)` pairs
    pub fn number_enum<I>(variants: I) -> Self
    where
        I: IntoIterator<Item = (i32, i64)>,
    {
        SchemaNode::NumberEnum(
            variants
                .into_iter()
                .map(|(label, value)| NumberEnumVariant { label, value })
                .collect(),
        )
    }

    /// Bitmask from `(flag, bit position)` pairs
    pub fn bitmask<K, I>(flags: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, i64)>,
    {
        SchemaNode::Bitmask(
            flags
                .into_iter()
                .map(|(name, position)| BitmaskFlag {
                    name: name.into(),
                    position,
                })
                .collect(),
        )
    }

    /// Optional wrapper
    pub fn optional(inner: SchemaNode) -> Self {
        SchemaNode::Optional(Box::new(inner))
    }

    /// Array with a one-byte length prefix
    pub fn array_u8(element: SchemaNode) -> Self {
        SchemaNode::Array {
            element: Box::new(element),
            length: LengthPrefix::U8,
        }
    }

    /// Array with a two-byte length prefix
    pub fn array_u16(element: SchemaNode) -> Self {
        SchemaNode::Array {
            element: Box::new(element),
            length: LengthPrefix::U16,
        }
    }

    /// Tagged union; variant indices follow the given order
    pub fn type_lookup<I>(variants: I) -> Self
    where
        I: IntoIterator<Item = LookupVariant>,
    {
        SchemaNode::TypeLookup(variants.into_iter().collect())
    }

    /// Short name of the node kind
    pub fn kind(&self) -> &'static str {
        match self {
            SchemaNode::Primitive(ty) => ty.name(),
            SchemaNode::Custom(_) => "custom",
            SchemaNode::Enum(_) => "enum",
            SchemaNode::NumberEnum(_) => "number-enum",
            SchemaNode::Bitmask(_) => "bitmask",
            SchemaNode::Optional(_) => "optional",
            SchemaNode::Array { length, .. } => length.flag(),
            SchemaNode::TypeLookup(_) => "type-lookup",
            SchemaNode::Object(_) => "object",
        }
    }

    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        match self {
            SchemaNode::Primitive(ty) => writeln!(f, "{}", ty),
            SchemaNode::Custom(name) => writeln!(f, "custom({})", name),
            SchemaNode::Enum(variants) => {
                let labels: Vec<_> = variants
                    .iter()
                    .map(|v| format!("{}={}", v.name, v.value))
                    .collect();
                writeln!(f, "enum {{{}}}", labels.join(", "))
            }
            SchemaNode::NumberEnum(variants) => {
                let labels: Vec<_> = variants
                    .iter()
                    .map(|v| format!("{}={}", v.label, v.value))
                    .collect();
                writeln!(f, "number-enum {{{}}}", labels.join(", "))
            }
            SchemaNode::Bitmask(flags) => {
                let labels: Vec<_> = flags
                    .iter()
                    .map(|flag| format!("{}@{}", flag.name, flag.position))
                    .collect();
                writeln!(f, "bitmask {{{}}}", labels.join(", "))
            }
            SchemaNode::Optional(inner) => {
                write!(f, "optional ")?;
                inner.fmt_tree(f, depth)
            }
            SchemaNode::Array { element, length } => {
                write!(f, "{} of ", length.flag())?;
                element.fmt_tree(f, depth)
            }
            SchemaNode::TypeLookup(variants) => {
                writeln!(f, "type-lookup")?;
                for (index, variant) in variants.iter().enumerate() {
                    writeln!(f, "{}  [{}] {}", pad, index, variant.tag)?;
                    fmt_fields(f, &variant.fields, depth + 2)?;
                }
                Ok(())
            }
            SchemaNode::Object(fields) => {
                writeln!(f, "object")?;
                fmt_fields(f, fields, depth + 1)
            }
        }
    }
}

fn fmt_fields(f: &mut fmt::Formatter<'_>, fields: &[Field], depth: usize) -> fmt::Result {
    let pad = "  ".repeat(depth);
    for field in fields {
        write!(f, "{}{}: ", pad, field.name)?;
        field.node.fmt_tree(f, depth)?;
    }
    Ok(())
}

/// Indented tree, one node per line
impl fmt::Display for SchemaNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_tree(f, 0)
    }
}

impl From<PrimitiveType> for SchemaNode {
    fn from(ty: PrimitiveType) -> Self {
        SchemaNode::Primitive(ty)
    }
}

impl Field {
    /// Create a new field
    pub fn new(name: impl Into<String>, node: SchemaNode) -> Self {
        Self {
            name: name.into(),
            node,
        }
    }
}

impl LookupVariant {
    /// Create a union arm from its fields, excluding the discriminant
    pub fn new<T, K, I>(tag: T, fields: I) -> Self
    where
        T: Into<String>,
        K: Into<String>,
        I: IntoIterator<Item = (K, SchemaNode)>,
    {
        Self {
            tag: tag.into(),
            fields: fields
                .into_iter()
                .map(|(name, node)| Field::new(name, node))
                .collect(),
        }
    }
}
