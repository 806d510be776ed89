//! SchemaPack CLI - inspect schemas and encode or decode messages

use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Context, Result};
use schemapack::{PrimitiveType, Value};
use schemapack_compiler::{self as compiler, ast::Field, Codec, CustomTypes, SchemaNode};
use std::fmt::{self, Write as _};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schemapack")]
#[command(about = "SchemaPack schema compiler and binary codec")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Run in verbose mode
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse, validate, and compile a schema
    Check {
        /// JSON schema file
        #[arg(short, long)]
        schema: PathBuf,
    },
    /// Print a schema tree with the wire width of every node
    Inspect {
        /// JSON schema file
        #[arg(short, long)]
        schema: PathBuf,
    },
    /// Check a JSON value against a schema and print its encoded size
    Size {
        /// JSON schema file
        #[arg(short, long)]
        schema: PathBuf,
        /// JSON value file
        #[arg(short = 'j', long)]
        value: PathBuf,
    },
    /// Encode a JSON value to a binary file
    Encode {
        /// JSON schema file
        #[arg(short, long)]
        schema: PathBuf,
        /// JSON value file
        #[arg(short = 'j', long)]
        value: PathBuf,
        /// Output file for the encoded bytes
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Decode a binary file and print it as JSON
    Decode {
        /// JSON schema file
        #[arg(short, long)]
        schema: PathBuf,
        /// Encoded input file
        #[arg(short, long)]
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    match cli.command {
        Commands::Check { schema } => check_schema(&schema),
        Commands::Inspect { schema } => inspect_schema(&schema),
        Commands::Size { schema, value } => print_size(&schema, &value),
        Commands::Encode {
            schema,
            value,
            output,
        } => encode_value(&schema, &value, &output),
        Commands::Decode { schema, input } => decode_file(&schema, &input),
    }
}

/// `RUST_LOG` wins over the verbosity flag
fn init_tracing(verbose: bool) -> Result<()> {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| eyre!("failed to install logger: {}", err))
}

fn load_schema(path: &Path) -> Result<SchemaNode> {
    compiler::load(path).with_context(|| format!("Failed to load schema: {}", path.display()))
}

fn load_codec(path: &Path) -> Result<Codec> {
    let schema = load_schema(path)?;
    compiler::compile(&schema, &CustomTypes::new())
        .with_context(|| format!("Failed to compile schema: {}", path.display()))
}

fn load_value(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read value file: {}", path.display()))?;
    let json: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("Invalid JSON in value file: {}", path.display()))?;
    Ok(Value::from(json))
}

fn check_schema(path: &Path) -> Result<()> {
    let codec = load_codec(path)?;
    tracing::info!(schema = %path.display(), fixed_size = ?codec.fixed_size(), "schema compiled");
    println!("✅ Schema is valid: {}", path.display());
    Ok(())
}

fn inspect_schema(path: &Path) -> Result<()> {
    let schema = load_schema(path)?;
    let codec = compiler::compile(&schema, &CustomTypes::new())
        .with_context(|| format!("Failed to compile schema: {}", path.display()))?;

    let mut out = String::new();
    describe(&schema, 0, &mut out)?;
    print!("{}", out);
    match codec.fixed_size() {
        Some(size) => println!("Encoded size: {} bytes for every value", size),
        None => println!("Encoded size: depends on the value"),
    }
    Ok(())
}

fn print_size(schema: &Path, value: &Path) -> Result<()> {
    let codec = load_codec(schema)?;
    let value = load_value(value)?;
    // Encoding checks every leaf, sizing alone does not
    let data = codec.encode(&value).wrap_err("Value does not match the schema")?;
    println!("{}", data.len());
    Ok(())
}

fn encode_value(schema: &Path, value: &Path, output: &Path) -> Result<()> {
    let codec = load_codec(schema)?;
    let value = load_value(value)?;
    let data = codec.encode(&value).wrap_err("Failed to encode value")?;
    std::fs::write(output, &data)
        .with_context(|| format!("Failed to write output: {}", output.display()))?;
    println!("✅ Wrote {} bytes to {}", data.len(), output.display());
    Ok(())
}

fn decode_file(schema: &Path, input: &Path) -> Result<()> {
    let codec = load_codec(schema)?;
    let data = std::fs::read(input)
        .with_context(|| format!("Failed to read input: {}", input.display()))?;
    let value = codec
        .decode(&data)
        .with_context(|| format!("Failed to decode: {}", input.display()))?;
    let json = serde_json::Value::from(&value);
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

/// Wire width of a primitive, as shown by `inspect`
fn primitive_width(ty: PrimitiveType) -> String {
    match ty.size() {
        Some(1) => "1 byte".to_string(),
        Some(n) => format!("{} bytes", n),
        None => "2 + 2n bytes".to_string(),
    }
}

fn describe(node: &SchemaNode, depth: usize, out: &mut String) -> fmt::Result {
    match node {
        SchemaNode::Primitive(ty) => writeln!(out, "{} ({})", ty, primitive_width(*ty)),
        SchemaNode::Custom(name) => writeln!(out, "{} (custom)", name),
        SchemaNode::Enum(_) => writeln!(out, "enum (1 byte)"),
        SchemaNode::NumberEnum(_) => writeln!(out, "number-enum (1 byte)"),
        SchemaNode::Bitmask(flags) => writeln!(out, "bitmask of {} (1 byte)", flags.len()),
        SchemaNode::Optional(inner) => {
            write!(out, "optional (1 byte +) ")?;
            describe(inner, depth, out)
        }
        SchemaNode::Array { element, length } => {
            write!(out, "{} ({} byte prefix) of ", length.flag(), length.width())?;
            describe(element, depth, out)
        }
        SchemaNode::TypeLookup(variants) => {
            writeln!(out, "type-lookup (1 byte index)")?;
            let pad = "  ".repeat(depth);
            for (index, variant) in variants.iter().enumerate() {
                writeln!(out, "{}  [{}] {}", pad, index, variant.tag)?;
                describe_fields(&variant.fields, depth + 2, out)?;
            }
            Ok(())
        }
        SchemaNode::Object(fields) => {
            writeln!(out, "object")?;
            describe_fields(fields, depth + 1, out)
        }
    }
}

fn describe_fields(fields: &[Field], depth: usize, out: &mut String) -> fmt::Result {
    for field in fields {
        write!(out, "{}{}: ", "  ".repeat(depth), field.name)?;
        describe(&field.node, depth, out)?;
    }
    Ok(())
}
