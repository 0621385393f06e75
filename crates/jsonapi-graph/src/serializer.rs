//! The codec instance: schema registration, encoding, decoding and errors.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::codec::decode::{DecodeOptions, decode_document};
use crate::codec::encode::{EncodeOptions, Encoder};
use crate::codec::errors::{ErrorInput, serialize_error};
use crate::error::{DecodeError, EncodeError, SchemaError};
use crate::limits::DEFAULT_MAX_DEPTH;
use crate::model::{DeserializedGraph, Document, ErrorDocument};
use crate::schema::{DEFAULT_SCHEMA, Registry, Resolver, SchemaDefinition, SchemaOptions};

/// Codec-wide configuration.
///
/// Links, meta and option values set here are inherited by every schema and
/// overridden by what a schema sets itself.
#[derive(Debug, Clone)]
pub struct CodecOptions {
    pub(crate) defaults: SchemaOptions,
    pub(crate) nest_deserialized_relationships: bool,
    pub(crate) max_depth: usize,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            defaults: SchemaOptions::new(),
            nest_deserialized_relationships: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCodecOptions {
    #[serde(default)]
    nest_deserialized_relationships: bool,
    #[serde(default)]
    max_depth: Option<usize>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl CodecOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses codec options from JSON.
    ///
    /// `nestDeserializedRelationships` and `maxDepth` configure the codec;
    /// every other key is read as codec-wide schema options.
    pub fn from_value(value: &Value) -> Result<Self, SchemaError> {
        let raw: RawCodecOptions = serde_json::from_value(value.clone())
            .map_err(|err| SchemaError::InvalidCodecOptions {
                detail: err.to_string(),
            })?;
        let defaults = SchemaOptions::from_value(&Value::Object(raw.rest))?;

        Ok(Self {
            defaults,
            nest_deserialized_relationships: raw.nest_deserialized_relationships,
            max_depth: raw.max_depth.unwrap_or(DEFAULT_MAX_DEPTH),
        })
    }

    pub fn link(mut self, name: impl Into<String>, resolver: Resolver) -> Self {
        self.defaults = self.defaults.link(name, resolver);
        self
    }

    pub fn meta(mut self, name: impl Into<String>, resolver: Resolver) -> Self {
        self.defaults = self.defaults.meta(name, resolver);
        self
    }

    pub fn top_level_link(mut self, name: impl Into<String>, resolver: Resolver) -> Self {
        self.defaults = self.defaults.top_level_link(name, resolver);
        self
    }

    pub fn top_level_meta(mut self, name: impl Into<String>, resolver: Resolver) -> Self {
        self.defaults = self.defaults.top_level_meta(name, resolver);
        self
    }

    /// Sets a codec-wide option value visible to resolvers.
    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.defaults = self.defaults.option(key, value);
        self
    }

    /// Renders decoded relationship fields as nested records.
    pub fn nest_deserialized_relationships(mut self, nest: bool) -> Self {
        self.nest_deserialized_relationships = nest;
        self
    }

    /// Drops empty members from primary resources and their relationship
    /// objects for every type that does not decide otherwise.
    pub fn minimize_payload(mut self, minimize: bool) -> Self {
        self.defaults = self.defaults.minimize_payload(minimize);
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// A codec instance owning its schema registry.
///
/// # Example
///
/// ```rust
/// use jsonapi_graph::{EncodeOptions, RelationshipSpec, SchemaOptions, Serializer};
/// use serde_json::json;
///
/// # block_on(async {
/// let mut serializer = Serializer::new();
/// serializer
///     .define(
///         "users",
///         SchemaOptions::new()
///             .blacklist(["password"])
///             .relationship("groups", RelationshipSpec::new("groups")),
///     )
///     .unwrap();
/// serializer.define("groups", SchemaOptions::new()).unwrap();
///
/// let data = json!({"id": 1, "name": "tim", "password": "x", "groups": [{"id": 7, "name": "admins"}]});
/// let document = serializer.serialize("users", data, &EncodeOptions::new()).await.unwrap();
/// assert_eq!(document.included.len(), 1);
///
/// let graph = serializer.deserialize(&serde_json::to_value(&document).unwrap()).unwrap();
/// assert_eq!(graph.records("groups").len(), 1);
/// # });
/// # fn block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     futures::executor::block_on(f)
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Serializer {
    registry: Registry,
    defaults: SchemaDefinition,
    nest_deserialized_relationships: bool,
    max_depth: usize,
}

impl Default for Serializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Serializer {
    pub fn new() -> Self {
        Self::with_options(CodecOptions::default())
    }

    pub fn with_options(options: CodecOptions) -> Self {
        Self::with_registry(Registry::new(), options)
    }

    /// Creates a codec over an existing registry.
    pub fn with_registry(registry: Registry, options: CodecOptions) -> Self {
        Self {
            registry,
            defaults: SchemaDefinition::from_options("", DEFAULT_SCHEMA, options.defaults),
            nest_deserialized_relationships: options.nest_deserialized_relationships,
            max_depth: options.max_depth,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Registers the `default` schema of a type.
    pub fn define(&mut self, resource_type: &str, options: SchemaOptions) -> Result<(), SchemaError> {
        self.registry.define(resource_type, DEFAULT_SCHEMA, options)
    }

    /// Registers a named schema of a type.
    pub fn define_schema(
        &mut self,
        resource_type: &str,
        schema: &str,
        options: SchemaOptions,
    ) -> Result<(), SchemaError> {
        self.registry.define(resource_type, schema, options)
    }

    /// Registers a schema from its JSON options.
    pub fn define_value(
        &mut self,
        resource_type: &str,
        schema: &str,
        options: &Value,
    ) -> Result<(), SchemaError> {
        self.registry
            .define(resource_type, schema, SchemaOptions::from_value(options)?)
    }

    /// Encodes `data` with the type's `default` schema.
    pub async fn serialize(
        &self,
        resource_type: &str,
        data: Value,
        options: &EncodeOptions,
    ) -> Result<Document, ErrorDocument> {
        self.serialize_schema(resource_type, DEFAULT_SCHEMA, data, options)
            .await
    }

    /// Encodes `data` with a named schema; failures become an error document.
    pub async fn serialize_schema(
        &self,
        resource_type: &str,
        schema: &str,
        data: Value,
        options: &EncodeOptions,
    ) -> Result<Document, ErrorDocument> {
        self.try_serialize(resource_type, schema, data, options)
            .await
            .map_err(|err| serialize_error(err, None, None))
    }

    /// Encodes `data`, returning the typed error on failure.
    ///
    /// A failing hook surfaces as [`EncodeError::Hook`] holding the caller's
    /// own [`HookError`](crate::error::HookError).
    pub async fn try_serialize(
        &self,
        resource_type: &str,
        schema: &str,
        data: Value,
        options: &EncodeOptions,
    ) -> Result<Document, EncodeError> {
        Encoder::new(&self.registry, &self.defaults, options, self.max_depth)
            .encode(resource_type, schema, data)
            .await
    }

    /// Decodes a document into per-type record collections.
    pub fn deserialize(&self, document: &Value) -> Result<DeserializedGraph, DecodeError> {
        let options = DecodeOptions {
            nest_relationships: self.nest_deserialized_relationships,
        };
        decode_document(document, &self.registry, options)
    }

    /// Builds an error document from any failure.
    pub fn serialize_error(
        &self,
        input: impl Into<ErrorInput>,
        meta: Option<Map<String, Value>>,
        status: Option<u16>,
    ) -> ErrorDocument {
        serialize_error(input, meta, status)
    }
}
