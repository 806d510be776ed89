//! SchemaPack - binary buffer runtime for schema-compiled codecs
//!
//! This crate provides the runtime components used by codecs produced by
//! `schemapack-compiler`:
//! - [`BufferBuilder`], an append-only writer with an exact-size fast path
//! - [`BufferReader`], a forward-only cursor with bounds-checked reads
//! - [`Value`], the dynamic value tree codecs encode and decode
//! - Error handling shared by every codec
//!
//! All multi-byte numbers are big-endian. Strings are a `u16` count of UTF-16
//! code units followed by the units.
//!
//! # Quick Start
//!
//! ```rust
//! use schemapack::{BufferBuilder, BufferReader};
//!
//! let mut builder = BufferBuilder::new();
//! builder.write_u16(42);
//! builder.write_string("hi")?;
//! let data = builder.finish();
//!
//! let mut reader = BufferReader::new(&data);
//! assert_eq!(reader.read_u16()?, 42);
//! assert_eq!(reader.read_string()?, "hi");
//! reader.assert_fully_consumed()?;
//! # Ok::<(), schemapack::Error>(())
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod builder;
mod errors;
mod primitives;
mod reader;
mod value;

pub use builder::BufferBuilder;
pub use errors::{Error, Result};
pub use primitives::PrimitiveType;
pub use reader::BufferReader;
pub use value::{Map, Value};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        builder::BufferBuilder,
        errors::{Error, Result},
        primitives::PrimitiveType,
        reader::BufferReader,
        value::{Map, Value},
    };
}

/// Core constants for the SchemaPack wire format
pub mod constants {
    /// Initial capacity of a builder in estimate mode
    pub const INITIAL_CAPACITY: usize = 50;

    /// Capacity multiplier applied when an estimate-mode builder overflows
    pub const GROWTH_FACTOR: usize = 4;

    /// Flags that fit in one bitmask byte next to its marker bit
    pub const MAX_BITMASK_FLAGS: usize = 7;
}
