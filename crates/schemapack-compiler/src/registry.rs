//! Registry of user-defined leaf types

use indexmap::IndexMap;
use schemapack::{BufferBuilder, BufferReader, Result, Value};
use std::fmt;
use std::sync::Arc;

/// A leaf type with hand-written read, write, and size procedures
///
/// `size` must return exactly the number of bytes `write` appends for the
/// same value. Codecs check this after every encode.
pub trait CustomType: Send + Sync {
    /// Decode one value
    fn read(&self, reader: &mut BufferReader<'_>) -> Result<Value>;

    /// Encode one value
    fn write(&self, value: &Value, builder: &mut BufferBuilder) -> Result<()>;

    /// Bytes `write` will produce for `value`
    fn size(&self, value: &Value) -> Result<usize>;
}

/// Custom type assembled from three closures
struct FnCustomType<R, W, S> {
    read: R,
    write: W,
    size: S,
}

impl<R, W, S> CustomType for FnCustomType<R, W, S>
where
    R: Fn(&mut BufferReader<'_>) -> Result<Value> + Send + Sync,
    W: Fn(&Value, &mut BufferBuilder) -> Result<()> + Send + Sync,
    S: Fn(&Value) -> Result<usize> + Send + Sync,
{
    fn read(&self, reader: &mut BufferReader<'_>) -> Result<Value> {
        (self.read)(reader)
    }

    fn write(&self, value: &Value, builder: &mut BufferBuilder) -> Result<()> {
        (self.write)(value, builder)
    }

    fn size(&self, value: &Value) -> Result<usize> {
        (self.size)(value)
    }
}

/// Named custom types available to a schema
///
/// A type token in a schema is looked up here before the built-in primitive
/// names, so registering `"string"` replaces the built-in string encoding.
/// Compiled codecs keep their own handles; registering more types afterwards
/// does not affect them.
#[derive(Clone, Default)]
pub struct CustomTypes {
    entries: IndexMap<String, Arc<dyn CustomType>>,
}

impl CustomTypes {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type, replacing any previous entry with the same name
    pub fn register<T>(&mut self, name: impl Into<String>, custom: T) -> &mut Self
    where
        T: CustomType + 'static,
    {
        self.entries.insert(name.into(), Arc::new(custom));
        self
    }

    /// Register a type from read, write, and size closures
    pub fn register_fn<R, W, S>(
        &mut self,
        name: impl Into<String>,
        read: R,
        write: W,
        size: S,
    ) -> &mut Self
    where
        R: Fn(&mut BufferReader<'_>) -> Result<Value> + Send + Sync + 'static,
        W: Fn(&Value, &mut BufferBuilder) -> Result<()> + Send + Sync + 'static,
        S: Fn(&Value) -> Result<usize> + Send + Sync + 'static,
    {
        self.register(name, FnCustomType { read, write, size })
    }

    pub(crate) fn insert_shared(&mut self, name: &str, custom: Arc<dyn CustomType>) {
        self.entries.insert(name.to_string(), custom);
    }

    /// Look up a type by name
    pub fn get(&self, name: &str) -> Option<&Arc<dyn CustomType>> {
        self.entries.get(name)
    }

    /// Whether a type is registered under `name`
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl fmt::Debug for CustomTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}
