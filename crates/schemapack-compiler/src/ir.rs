//! Intermediate representation consumed by code generation
//!
//! Lowering resolves every type token against the custom type registry,
//! turns label lists into lookup tables, and fixes union variant indices.
//! Everything in the IR is already in wire order.

use crate::ast::*;
use crate::registry::{CustomType, CustomTypes};
use crate::{CompileOptions, CompilerError, Result};
use schemapack::PrimitiveType;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Lowered schema node
#[derive(Clone)]
pub enum IrNode {
    Scalar(PrimitiveType),
    Custom {
        name: String,
        handler: Arc<dyn CustomType>,
    },
    Enum(IrEnum),
    NumberEnum(IrNumberEnum),
    Bitmask(IrBitmask),
    Optional(Box<IrNode>),
    Array {
        element: Box<IrNode>,
        length: LengthPrefix,
    },
    TypeLookup(IrTypeLookup),
    Object(Vec<IrField>),
}

/// Lowered field
#[derive(Debug, Clone)]
pub struct IrField {
    pub name: String,
    pub node: IrNode,
}

/// String enum tables
#[derive(Debug, Clone)]
pub struct IrEnum {
    pub ordinals: HashMap<String, u8>,
    pub labels: HashMap<u8, String>,
}

/// Numeric enum tables
#[derive(Debug, Clone)]
pub struct IrNumberEnum {
    pub ordinals: HashMap<i64, u8>,
    pub labels: HashMap<u8, i32>,
}

/// Bitmask flag names ordered by bit position
#[derive(Debug, Clone)]
pub struct IrBitmask {
    pub flags: Vec<String>,
}

/// Tagged union with variants in index order
#[derive(Debug, Clone)]
pub struct IrTypeLookup {
    pub discriminant: String,
    pub variants: Vec<IrVariant>,
    pub indices: HashMap<String, u8>,
}

/// One union arm
#[derive(Debug, Clone)]
pub struct IrVariant {
    pub tag: String,
    pub index: u8,
    pub fields: Vec<IrField>,
}

impl fmt::Debug for IrNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrNode::Scalar(ty) => f.debug_tuple("Scalar").field(ty).finish(),
            IrNode::Custom { name, .. } => f.debug_struct("Custom").field("name", name).finish(),
            IrNode::Enum(e) => f.debug_tuple("Enum").field(e).finish(),
            IrNode::NumberEnum(e) => f.debug_tuple("NumberEnum").field(e).finish(),
            IrNode::Bitmask(b) => f.debug_tuple("Bitmask").field(b).finish(),
            IrNode::Optional(inner) => f.debug_tuple("Optional").field(inner).finish(),
            IrNode::Array { element, length } => f
                .debug_struct("Array")
                .field("element", element)
                .field("length", length)
                .finish(),
            IrNode::TypeLookup(t) => f.debug_tuple("TypeLookup").field(t).finish(),
            IrNode::Object(fields) => f.debug_tuple("Object").field(fields).finish(),
        }
    }
}

/// Convert a validated schema to IR
pub fn lower(
    schema: &SchemaNode,
    custom_types: &CustomTypes,
    options: &CompileOptions,
) -> Result<IrNode> {
    Lowering {
        custom_types,
        options,
    }
    .lower_node(schema)
}

struct Lowering<'a> {
    custom_types: &'a CustomTypes,
    options: &'a CompileOptions,
}

impl Lowering<'_> {
    fn lower_node(&self, node: &SchemaNode) -> Result<IrNode> {
        Ok(match node {
            SchemaNode::Primitive(ty) => match self.custom_types.get(ty.name()) {
                // Registered names shadow the built-in primitives
                Some(handler) => IrNode::Custom {
                    name: ty.name().to_string(),
                    handler: Arc::clone(handler),
                },
                None => IrNode::Scalar(*ty),
            },
            SchemaNode::Custom(name) => {
                let handler = self
                    .custom_types
                    .get(name)
                    .ok_or_else(|| CompilerError::UnknownCustomType(name.clone()))?;
                IrNode::Custom {
                    name: name.clone(),
                    handler: Arc::clone(handler),
                }
            }
            SchemaNode::Enum(variants) => IrNode::Enum(IrEnum {
                ordinals: variants
                    .iter()
                    .map(|v| (v.name.clone(), v.value as u8))
                    .collect(),
                labels: variants
                    .iter()
                    .map(|v| (v.value as u8, v.name.clone()))
                    .collect(),
            }),
            SchemaNode::NumberEnum(variants) => IrNode::NumberEnum(IrNumberEnum {
                ordinals: variants
                    .iter()
                    .map(|v| (v.label as i64, v.value as u8))
                    .collect(),
                labels: variants
                    .iter()
                    .map(|v| (v.value as u8, v.label))
                    .collect(),
            }),
            SchemaNode::Bitmask(flags) => {
                let mut ordered: Vec<_> = flags.iter().collect();
                ordered.sort_by_key(|flag| flag.position);
                IrNode::Bitmask(IrBitmask {
                    flags: ordered.into_iter().map(|flag| flag.name.clone()).collect(),
                })
            }
            SchemaNode::Optional(inner) => IrNode::Optional(Box::new(self.lower_node(inner)?)),
            SchemaNode::Array { element, length } => IrNode::Array {
                element: Box::new(self.lower_node(element)?),
                length: *length,
            },
            SchemaNode::TypeLookup(variants) => {
                let variants = variants
                    .iter()
                    .enumerate()
                    .map(|(index, variant)| {
                        Ok(IrVariant {
                            tag: variant.tag.clone(),
                            index: index as u8,
                            fields: self.lower_fields(&variant.fields)?,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                let indices = variants
                    .iter()
                    .map(|variant| (variant.tag.clone(), variant.index))
                    .collect();
                IrNode::TypeLookup(IrTypeLookup {
                    discriminant: self.options.discriminant.clone(),
                    variants,
                    indices,
                })
            }
            SchemaNode::Object(fields) => IrNode::Object(self.lower_fields(fields)?),
        })
    }

    fn lower_fields(&self, fields: &[Field]) -> Result<Vec<IrField>> {
        fields
            .iter()
            .map(|field| {
                Ok(IrField {
                    name: field.name.clone(),
                    node: self.lower_node(&field.node)?,
                })
            })
            .collect()
    }
}

impl IrNode {
    /// Encoded size shared by every value of this node, if there is one
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            IrNode::Scalar(ty) => ty.size(),
            IrNode::Custom { .. } | IrNode::Optional(_) | IrNode::Array { .. } => None,
            IrNode::Enum(_) | IrNode::NumberEnum(_) | IrNode::Bitmask(_) => Some(1),
            IrNode::TypeLookup(lookup) => {
                let mut sizes = lookup
                    .variants
                    .iter()
                    .map(|variant| IrUtils::fields_fixed_size(&variant.fields));
                let first = sizes.next()??;
                sizes.all(|size| size == Some(first)).then_some(1 + first)
            }
            IrNode::Object(fields) => IrUtils::fields_fixed_size(fields),
        }
    }

    /// Number of nodes in this subtree
    pub fn node_count(&self) -> usize {
        1 + match self {
            IrNode::Scalar(_)
            | IrNode::Custom { .. }
            | IrNode::Enum(_)
            | IrNode::NumberEnum(_)
            | IrNode::Bitmask(_) => 0,
            IrNode::Optional(inner) => inner.node_count(),
            IrNode::Array { element, .. } => element.node_count(),
            IrNode::TypeLookup(lookup) => lookup
                .variants
                .iter()
                .map(|variant| IrUtils::fields_node_count(&variant.fields))
                .sum(),
            IrNode::Object(fields) => IrUtils::fields_node_count(fields),
        }
    }
}

/// Utility functions for working with IR
pub struct IrUtils;

impl IrUtils {
    /// Fixed size of a field list, if every field has one
    pub fn fields_fixed_size(fields: &[IrField]) -> Option<usize> {
        fields.iter().map(|field| field.node.fixed_size()).sum()
    }

    /// Nodes below a field list
    pub fn fields_node_count(fields: &[IrField]) -> usize {
        fields.iter().map(|field| field.node.node_count()).sum()
    }

    /// Names of custom types a subtree depends on, sorted and deduplicated
    pub fn custom_dependencies(node: &IrNode) -> Vec<&str> {
        let mut dependencies = Vec::new();
        Self::collect_custom(node, &mut dependencies);
        dependencies.sort();
        dependencies.dedup();
        dependencies
    }

    fn collect_custom<'a>(node: &'a IrNode, dependencies: &mut Vec<&'a str>) {
        match node {
            IrNode::Custom { name, .. } => dependencies.push(name),
            IrNode::Optional(inner) => Self::collect_custom(inner, dependencies),
            IrNode::Array { element, .. } => Self::collect_custom(element, dependencies),
            IrNode::TypeLookup(lookup) => {
                for variant in &lookup.variants {
                    for field in &variant.fields {
                        Self::collect_custom(&field.node, dependencies);
                    }
                }
            }
            IrNode::Object(fields) => {
                for field in fields {
                    Self::collect_custom(&field.node, dependencies);
                }
            }
            IrNode::Scalar(_) | IrNode::Enum(_) | IrNode::NumberEnum(_) | IrNode::Bitmask(_) => {}
        }
    }
}
