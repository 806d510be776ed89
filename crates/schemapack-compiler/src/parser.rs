//! Loader for JSON schema documents
//!
//! A document is a JSON value in flag notation:
//!
//! - a string is a type token (`"uint8"`, `"string"`, or a custom type name)
//! - `{"flag": "enum", "laser": 0, "sword": 1}` is a string enum
//! - `{"flag": "number-enum", "10": 0, "20": 1}` is a numeric enum
//! - `{"flag": "bitmask", "up": 0, "down": 1}` is a bitmask
//! - `{"flag": "optional", "element": ...}` is an optional
//! - `{"flag": "array-uint8" | "array-uint16", "elements": ...}` is an array
//! - `{"flag": "type-lookup", "elements": {"tag": {...fields}}}` is a union
//! - any other object is a record, with fields in document order

use crate::ast::*;
use crate::{CompilerError, Result};
use serde_json::{Map, Value as Json};

/// Parse a JSON schema document into a schema tree
pub fn parse(input: &str) -> Result<SchemaNode> {
    let document: Json = serde_json::from_str(input)
        .map_err(|err| CompilerError::Parse(format!("invalid JSON: {}", err)))?;
    parse_value(&document)
}

/// Convert an already parsed JSON document
pub fn parse_value(document: &Json) -> Result<SchemaNode> {
    SchemaParser { path: Vec::new() }.parse_node(document)
}

struct SchemaParser {
    path: Vec<String>,
}

impl SchemaParser {
    fn error(&self, message: impl std::fmt::Display) -> CompilerError {
        let location = if self.path.is_empty() {
            "<root>".to_string()
        } else {
            self.path.join(".")
        };
        CompilerError::Parse(format!("{} at '{}'", message, location))
    }

    fn nested<T>(&mut self, key: &str, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.path.push(key.to_string());
        let result = f(self);
        self.path.pop();
        result
    }

    fn parse_node(&mut self, json: &Json) -> Result<SchemaNode> {
        match json {
            Json::String(token) => Ok(SchemaNode::named(token)),
            Json::Object(map) => match map.get("flag") {
                None => self.parse_record(map).map(SchemaNode::Object),
                Some(Json::String(flag)) => self.parse_flagged(flag, map),
                Some(other) => Err(self.error(format!("flag must be a string, found {}", other))),
            },
            other => Err(self.error(format!(
                "expected a type name or an object, found {}",
                other
            ))),
        }
    }

    fn parse_flagged(&mut self, flag: &str, map: &Map<String, Json>) -> Result<SchemaNode> {
        match flag {
            "enum" => {
                let labels = self.ordinals(map)?;
                Ok(SchemaNode::enumeration(labels))
            }
            "number-enum" => {
                let labels = self
                    .ordinals(map)?
                    .into_iter()
                    .map(|(label, ordinal)| {
                        label
                            .parse::<i32>()
                            .map(|label| (label, ordinal))
                            .map_err(|_| {
                                self.error(format!("number-enum label '{}' is not an i32", label))
                            })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(SchemaNode::number_enum(labels))
            }
            "bitmask" => {
                let flags = self.ordinals(map)?;
                Ok(SchemaNode::bitmask(flags))
            }
            "optional" => {
                let element = self.required(map, "element")?;
                let inner = self.nested("element", |p| p.parse_node(element))?;
                Ok(SchemaNode::optional(inner))
            }
            "array-uint8" | "array-uint16" => {
                let elements = self.required(map, "elements")?;
                let element = self.nested("elements", |p| p.parse_node(elements))?;
                Ok(if flag == "array-uint8" {
                    SchemaNode::array_u8(element)
                } else {
                    SchemaNode::array_u16(element)
                })
            }
            "array-uint32" => Err(self.error("array-uint32 is not supported, use array-uint16")),
            "type-lookup" => {
                let variants = match self.required(map, "elements")? {
                    Json::Object(variants) => variants,
                    other => {
                        return Err(self.error(format!(
                            "type-lookup elements must be an object, found {}",
                            other
                        )))
                    }
                };
                let variants = variants
                    .iter()
                    .map(|(tag, body)| {
                        self.nested(tag, |p| match body {
                            Json::Object(fields) if !fields.contains_key("flag") => {
                                Ok(LookupVariant {
                                    tag: tag.clone(),
                                    fields: p.parse_record(fields)?,
                                })
                            }
                            _ => Err(p.error("type-lookup variant must be a plain object")),
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(SchemaNode::type_lookup(variants))
            }
            other => Err(self.error(format!("unknown flag '{}'", other))),
        }
    }

    fn parse_record(&mut self, map: &Map<String, Json>) -> Result<Vec<Field>> {
        map.iter()
            .map(|(name, json)| {
                let node = self.nested(name, |p| p.parse_node(json))?;
                Ok(Field::new(name.clone(), node))
            })
            .collect()
    }

    /// Every key except `flag` mapped to an integer
    fn ordinals(&self, map: &Map<String, Json>) -> Result<Vec<(String, i64)>> {
        map.iter()
            .filter(|(key, _)| key.as_str() != "flag")
            .map(|(key, json)| {
                json.as_i64()
                    .map(|ordinal| (key.clone(), ordinal))
                    .ok_or_else(|| self.error(format!("'{}' must map to an integer", key)))
            })
            .collect()
    }

    fn required<'j>(&self, map: &'j Map<String, Json>, key: &str) -> Result<&'j Json> {
        map.get(key)
            .ok_or_else(|| self.error(format!("missing '{}'", key)))
    }
}
