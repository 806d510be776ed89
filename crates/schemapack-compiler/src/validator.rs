//! Validator for schema trees

use crate::ast::*;
use crate::registry::CustomTypes;
use crate::{CompileOptions, CompilerError, Result};
use schemapack::constants::MAX_BITMASK_FLAGS;
use std::collections::HashSet;

/// Most variants a tagged union can index with its one-byte tag
pub const MAX_LOOKUP_VARIANTS: usize = 256;

/// Validate a schema against the registry it will be compiled with
pub fn validate(
    schema: &SchemaNode,
    custom_types: &CustomTypes,
    options: &CompileOptions,
) -> Result<()> {
    let mut validator = SchemaValidator::new(custom_types, options);
    validator.validate_node(schema)
}

/// Schema validation context
struct SchemaValidator<'a> {
    custom_types: &'a CustomTypes,
    discriminant: &'a str,
    path: Vec<String>,
}

impl<'a> SchemaValidator<'a> {
    /// Create a new validator
    fn new(custom_types: &'a CustomTypes, options: &'a CompileOptions) -> Self {
        Self {
            custom_types,
            discriminant: &options.discriminant,
            path: Vec::new(),
        }
    }

    /// Dotted path of the node being checked, for error messages
    fn location(&self) -> String {
        if self.path.is_empty() {
            "<root>".to_string()
        } else {
            self.path.join(".")
        }
    }

    fn error(&self, message: impl std::fmt::Display) -> CompilerError {
        CompilerError::Validation(format!("{} at '{}'", message, self.location()))
    }

    fn validate_node(&mut self, node: &SchemaNode) -> Result<()> {
        match node {
            SchemaNode::Primitive(_) => Ok(()),
            SchemaNode::Custom(name) => {
                if !self.custom_types.contains(name) {
                    return Err(CompilerError::UnknownCustomType(format!(
                        "{} (at '{}')",
                        name,
                        self.location()
                    )));
                }
                Ok(())
            }
            SchemaNode::Enum(variants) => {
                let labels = variants.iter().map(|v| (v.name.clone(), v.value));
                self.validate_ordinals("enum", labels)
            }
            SchemaNode::NumberEnum(variants) => {
                let labels = variants.iter().map(|v| (v.label.to_string(), v.value));
                self.validate_ordinals("number-enum", labels)
            }
            SchemaNode::Bitmask(flags) => self.validate_bitmask(flags),
            SchemaNode::Optional(inner) => {
                // A nested optional cannot tell "absent" from "present but absent"
                if matches!(inner.as_ref(), SchemaNode::Optional(_)) {
                    return Err(self.error("Nested optionals are not allowed"));
                }
                self.validate_node(inner)
            }
            SchemaNode::Array { element, .. } => {
                self.path.push("elements".to_string());
                self.validate_node(element)?;
                self.path.pop();
                Ok(())
            }
            SchemaNode::TypeLookup(variants) => self.validate_type_lookup(variants),
            SchemaNode::Object(fields) => self.validate_fields(fields),
        }
    }

    /// Labels must be unique and ordinals must fit in one byte
    fn validate_ordinals(
        &self,
        kind: &str,
        labels: impl Iterator<Item = (String, i64)>,
    ) -> Result<()> {
        let mut names = HashSet::new();
        let mut ordinals = HashSet::new();

        for (name, value) in labels {
            if !names.insert(name.clone()) {
                return Err(self.error(format!("Duplicate {} label '{}'", kind, name)));
            }
            if !(0..=u8::MAX as i64).contains(&value) {
                return Err(self.error(format!(
                    "{} label '{}' has ordinal {} outside 0..=255",
                    kind, name, value
                )));
            }
            if !ordinals.insert(value) {
                return Err(self.error(format!("Duplicate {} ordinal {}", kind, value)));
            }
        }

        if names.is_empty() {
            return Err(self.error(format!("{} must declare at least one label", kind)));
        }
        Ok(())
    }

    /// Flags must be unique and occupy positions `0..flag_count`
    fn validate_bitmask(&self, flags: &[BitmaskFlag]) -> Result<()> {
        if flags.is_empty() {
            return Err(self.error("bitmask must declare at least one flag"));
        }
        if flags.len() > MAX_BITMASK_FLAGS {
            return Err(self.error(format!(
                "bitmask declares {} flags, at most {} fit beside the marker bit",
                flags.len(),
                MAX_BITMASK_FLAGS
            )));
        }

        let mut names = HashSet::new();
        let mut positions = HashSet::new();
        for flag in flags {
            if !names.insert(flag.name.as_str()) {
                return Err(self.error(format!("Duplicate bitmask flag '{}'", flag.name)));
            }
            if !(0..flags.len() as i64).contains(&flag.position) {
                return Err(self.error(format!(
                    "bitmask flag '{}' has position {}, expected 0..{}",
                    flag.name,
                    flag.position,
                    flags.len()
                )));
            }
            if !positions.insert(flag.position) {
                return Err(self.error(format!(
                    "Duplicate bitmask position {}",
                    flag.position
                )));
            }
        }
        Ok(())
    }

    fn validate_type_lookup(&mut self, variants: &[LookupVariant]) -> Result<()> {
        if variants.is_empty() {
            return Err(self.error("type-lookup must declare at least one variant"));
        }
        if variants.len() > MAX_LOOKUP_VARIANTS {
            return Err(self.error(format!(
                "type-lookup declares {} variants, a one-byte index allows {}",
                variants.len(),
                MAX_LOOKUP_VARIANTS
            )));
        }

        let mut tags = HashSet::new();
        for variant in variants {
            if !tags.insert(variant.tag.as_str()) {
                return Err(self.error(format!("Duplicate type-lookup tag '{}'", variant.tag)));
            }

            self.path.push(variant.tag.clone());
            if variant.fields.iter().any(|f| f.name == self.discriminant) {
                return Err(self.error(format!(
                    "Field '{}' conflicts with the union discriminant",
                    self.discriminant
                )));
            }
            self.validate_fields(&variant.fields)?;
            self.path.pop();
        }
        Ok(())
    }

    fn validate_fields(&mut self, fields: &[Field]) -> Result<()> {
        let mut names = HashSet::new();
        for field in fields {
            if !names.insert(field.name.as_str()) {
                return Err(self.error(format!("Duplicate field name '{}'", field.name)));
            }
            self.path.push(field.name.clone());
            self.validate_node(&field.node)?;
            self.path.pop();
        }
        Ok(())
    }
}
