//! Top-level documents.

use serde::ser::{Error as _, SerializeStruct};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::model::{Resource, ResourceKey};

/// Primary data of a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryData {
    #[default]
    Null,
    One(Box<Resource>),
    Many(Vec<Resource>),
}

impl PrimaryData {
    /// Returns the primary resources as a slice (empty for `Null`).
    pub fn as_slice(&self) -> &[Resource] {
        match self {
            PrimaryData::Null => &[],
            PrimaryData::One(resource) => std::slice::from_ref(resource.as_ref()),
            PrimaryData::Many(resources) => resources,
        }
    }

    pub fn keys(&self) -> Vec<ResourceKey> {
        self.as_slice().iter().map(Resource::key).collect()
    }
}

/// A successful resource document.
///
/// With `minimize_payload` set, primary resources are written without empty
/// members, and so are their relationship objects and linkage.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub links: Map<String, Value>,
    pub data: PrimaryData,
    /// Related resources, at most one entry per `(type, id)` and never one
    /// that is also primary data.
    #[serde(default)]
    pub included: Vec<Resource>,
    #[serde(default)]
    pub meta: Map<String, Value>,
    #[serde(skip)]
    pub minimize_payload: bool,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Document", 4)?;
        state.serialize_field("links", &self.links)?;
        if self.minimize_payload {
            let mut data = serde_json::to_value(&self.data).map_err(S::Error::custom)?;
            match &mut data {
                Value::Array(resources) => resources.iter_mut().for_each(minimize_resource),
                resource => minimize_resource(resource),
            }
            state.serialize_field("data", &data)?;
        } else {
            state.serialize_field("data", &self.data)?;
        }
        state.serialize_field("included", &self.included)?;
        state.serialize_field("meta", &self.meta)?;
        state.end()
    }
}

/// Removes members holding an empty object or list.
fn drop_empty(value: &mut Value) {
    if let Value::Object(object) = value {
        object.retain(|_, member| match member {
            Value::Object(inner) => !inner.is_empty(),
            Value::Array(items) => !items.is_empty(),
            _ => true,
        });
    }
}

fn minimize_resource(resource: &mut Value) {
    if let Some(Value::Object(relationships)) = resource.get_mut("relationships") {
        for relationship in relationships.values_mut() {
            match relationship.get_mut("data") {
                Some(Value::Array(linkage)) => linkage.iter_mut().for_each(drop_empty),
                Some(linkage) => drop_empty(linkage),
                None => {}
            }
            drop_empty(relationship);
        }
    }
    drop_empty(resource);
}

/// Pointer to the source of an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pointer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
}

/// A single error object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    /// Unique identifier for this occurrence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// HTTP status, always carried as a string.
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ErrorSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
}

impl ErrorObject {
    /// Returns the status as a number, if it parses.
    pub fn status_code(&self) -> Option<u16> {
        self.status.parse().ok()
    }
}

/// A document carrying errors instead of data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Error)]
#[error("error document with {} error(s)", .errors.len())]
pub struct ErrorDocument {
    pub errors: Vec<ErrorObject>,
    /// Holds `status`: the most frequent status among `errors`.
    #[serde(default)]
    pub meta: Map<String, Value>,
}

impl ErrorDocument {
    /// Returns the aggregated status from `meta.status`.
    pub fn status(&self) -> Option<u16> {
        self.meta
            .get("status")
            .and_then(Value::as_u64)
            .and_then(|status| u16::try_from(status).ok())
    }
}
