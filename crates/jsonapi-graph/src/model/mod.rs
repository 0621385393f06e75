//! Data model types.
//!
//! This module contains the in-memory shapes exchanged with callers:
//! - Resources, identifiers and relationship linkage
//! - Documents (success and error)
//! - The decoded per-type graph

pub mod document;
pub mod graph;
pub mod resource;

pub use document::{Document, ErrorDocument, ErrorObject, ErrorSource, PrimaryData};
pub use graph::{DeserializedGraph, GraphEntry};
pub use resource::{Linkage, Relationship, Resource, ResourceIdentifier, ResourceKey};
