//! jsonapi-graph: Schema-driven codec between nested records and linked
//! resource documents.
//!
//! This crate turns nested JSON records into normalized documents made of
//! typed resources, relationship linkage and a de-duplicated `included`
//! list, and decodes such documents back into per-type record collections.
//!
//! # Overview
//!
//! Each resource type registers one or more named schemas that decide:
//! - **Identity**: which field (or computed selector) yields the id
//! - **Attributes**: blacklist and whitelist paths, with dot notation
//! - **Relationships**: which fields link to other types, and whether their
//!   targets are sideloaded into `included`
//! - **Links and meta**: literal values or resolvers, sync or deferred
//!
//! # Quick Start
//!
//! ```rust
//! use jsonapi_graph::{EncodeOptions, RelationshipSpec, SchemaOptions, Serializer};
//! use serde_json::json;
//!
//! let mut serializer = Serializer::new();
//! serializer
//!     .define(
//!         "books",
//!         SchemaOptions::new().relationship("author", RelationshipSpec::new("authors")),
//!     )
//!     .unwrap();
//! serializer.define("authors", SchemaOptions::new()).unwrap();
//!
//! let record = json!({"id": 1, "title": "Dune", "author": {"id": 7, "name": "Frank Herbert"}});
//! let document =
//!     futures::executor::block_on(serializer.serialize("books", record, &EncodeOptions::new()))
//!         .unwrap();
//! assert_eq!(document.included.len(), 1);
//!
//! let graph = serializer
//!     .deserialize(&serde_json::to_value(&document).unwrap())
//!     .unwrap();
//! assert_eq!(graph.records("authors"), &[json!({"id": "7", "name": "Frank Herbert"})]);
//! ```
//!
//! # Modules
//!
//! - [`serializer`]: The codec instance ([`Serializer`], [`CodecOptions`])
//! - [`schema`]: Schema options, the registry and hooks
//! - [`codec`]: Encoding, decoding and error documents
//! - [`model`]: Document, resource and graph types
//! - [`validate`]: Structural validation of documents and error objects
//! - [`error`]: Error types
//! - [`limits`]: Bounds applied while encoding
//!
//! # Cycles
//!
//! Encoding never expands a resource that is already being expanded higher
//! on the same path, so self-referential records terminate. Decoding tracks
//! visited resources, so cyclic documents terminate too.

pub mod codec;
pub mod error;
pub mod limits;
pub mod model;
pub mod schema;
pub mod serializer;
pub mod util;
pub mod validate;

// Re-export commonly used types at crate root
pub use codec::{DecodeOptions, EncodeOptions, ErrorInput, decode_document, serialize_error};
pub use error::{DecodeError, EncodeError, ErrorCode, HookError, SchemaError};
pub use model::{
    DeserializedGraph, Document, ErrorDocument, ErrorObject, ErrorSource, GraphEntry, Linkage,
    PrimaryData, Relationship, Resource, ResourceIdentifier, ResourceKey,
};
pub use schema::{
    CollectionHook, Hook, IdSelector, Registry, RelationshipSpec, ResolveContext, Resolver,
    ResourceHook, SchemaDefinition, SchemaOptions,
};
pub use serializer::{CodecOptions, Serializer};
pub use validate::{validate_document, validate_error_object};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
