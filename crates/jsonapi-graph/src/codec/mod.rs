//! Encoding records into resource documents and decoding them back.
//!
//! - [`encode`]: records -> [`Document`](crate::model::Document)
//! - [`decode`]: document -> [`DeserializedGraph`](crate::model::DeserializedGraph)
//! - [`errors`]: arbitrary failures -> [`ErrorDocument`](crate::model::ErrorDocument)

pub mod attributes;
pub mod decode;
pub mod encode;
pub mod errors;
pub mod included;

pub use attributes::{PathFilter, RelationshipMode};
pub use decode::{DecodeOptions, decode_document};
pub use encode::EncodeOptions;
pub use errors::{ErrorInput, serialize_error};
pub use included::merge_included;
