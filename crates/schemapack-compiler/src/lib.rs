//! SchemaPack schema compiler
//!
//! Turns a [`SchemaNode`] tree into a [`Codec`]: three procedures (size,
//! encode, decode) derived from one walk over the schema, so they always
//! agree on the wire layout.
//!
//! ```rust
//! use schemapack::Value;
//! use schemapack_compiler::{compile, CustomTypes, SchemaNode};
//! use schemapack::PrimitiveType;
//!
//! let schema = SchemaNode::object([
//!     ("name", SchemaNode::from(PrimitiveType::String)),
//!     ("level", SchemaNode::optional(PrimitiveType::U8.into())),
//! ]);
//! let codec = compile(&schema, &CustomTypes::new())?;
//!
//! let value = Value::object([("name", Value::from("ada")), ("level", Value::U8(3))]);
//! let bytes = codec.encode(&value).unwrap();
//! assert_eq!(bytes.len(), 2 + 3 * 2 + 2);
//! assert_eq!(codec.decode(&bytes).unwrap(), value);
//! # Ok::<(), schemapack_compiler::CompilerError>(())
//! ```

pub mod ast;
pub mod codec;
pub mod codegen;
pub mod ir;
pub mod parser;
pub mod registry;
pub mod validator;

pub use ast::{LengthPrefix, LookupVariant, SchemaNode};
pub use codec::Codec;
pub use parser::parse;
pub use registry::{CustomType, CustomTypes};

use std::path::Path;
use thiserror::Error;

/// Result type for compiler operations
pub type Result<T> = std::result::Result<T, CompilerError>;

/// Errors that can occur while loading or compiling a schema
#[derive(Debug, Error)]
pub enum CompilerError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown custom type: {0}")]
    UnknownCustomType(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {0}")]
    FileNotFound(String),
}

/// Discriminant key injected into decoded tagged unions by default
pub const DEFAULT_DISCRIMINANT: &str = "type";

/// Knobs applied while compiling a schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Key naming the active variant of every type-lookup value
    pub discriminant: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            discriminant: DEFAULT_DISCRIMINANT.to_string(),
        }
    }
}

impl CompileOptions {
    /// Use a different discriminant key
    pub fn with_discriminant(mut self, discriminant: impl Into<String>) -> Self {
        self.discriminant = discriminant.into();
        self
    }
}

/// Compile a schema with default options
pub fn compile(schema: &SchemaNode, custom_types: &CustomTypes) -> Result<Codec> {
    compile_with_options(schema, custom_types, &CompileOptions::default())
}

/// Compile a schema
///
/// Validation failures are reported here, never at encode or decode time.
pub fn compile_with_options(
    schema: &SchemaNode,
    custom_types: &CustomTypes,
    options: &CompileOptions,
) -> Result<Codec> {
    // Validate schema
    validator::validate(schema, custom_types, options)?;

    // Convert to IR
    let ir = ir::lower(schema, custom_types, options)?;

    tracing::debug!(
        nodes = ir.node_count(),
        fixed_size = ?ir.fixed_size(),
        custom_types = ?ir::IrUtils::custom_dependencies(&ir),
        "compiled schema"
    );

    // Generate procedures
    let procedures = codegen::generate(&ir);

    Ok(Codec::new(schema.clone(), &ir, procedures, custom_types))
}

/// Read and parse a JSON schema document
pub fn load<P: AsRef<Path>>(path: P) -> Result<SchemaNode> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => {
            CompilerError::FileNotFound(path.to_string_lossy().to_string())
        }
        _ => CompilerError::Io(err),
    })?;
    parser::parse(&content)
}

/// Load a schema file and compile it
pub fn compile_file<P: AsRef<Path>>(path: P, custom_types: &CustomTypes) -> Result<Codec> {
    let schema = load(path)?;
    compile(&schema, custom_types)
}
