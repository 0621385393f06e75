//! Resources and relationship linkage.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identity of a resource within a document: `(type, id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    pub resource_type: String,
    pub id: String,
}

impl ResourceKey {
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource_type, self.id)
    }
}

/// One encoded entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub id: String,
    /// Projected fields; nested objects stay nested.
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub relationships: BTreeMap<String, Relationship>,
    #[serde(default)]
    pub links: Map<String, Value>,
    #[serde(default)]
    pub meta: Map<String, Value>,
}

impl Resource {
    /// Creates a resource with no attributes, relationships, links or meta.
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            attributes: Map::new(),
            relationships: BTreeMap::new(),
            links: Map::new(),
            meta: Map::new(),
        }
    }

    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(self.resource_type.as_str(), self.id.as_str())
    }

    /// Returns the top-level projection used inside relationship linkage.
    pub fn identifier(&self) -> ResourceIdentifier {
        ResourceIdentifier {
            resource_type: self.resource_type.clone(),
            id: self.id.clone(),
            links: self.links.clone(),
            meta: self.meta.clone(),
        }
    }

    /// Merges `other` into `self`, field by field.
    ///
    /// Attributes, relationships, links and meta from `other` overwrite
    /// entries with the same name; everything else is kept.
    pub fn merge(&mut self, other: Resource) {
        self.attributes.extend(other.attributes);
        self.relationships.extend(other.relationships);
        self.links.extend(other.links);
        self.meta.extend(other.meta);
    }
}

/// A relationship pointer: `(type, id)` plus the target's links and meta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub id: String,
    #[serde(default)]
    pub links: Map<String, Value>,
    #[serde(default)]
    pub meta: Map<String, Value>,
}

impl ResourceIdentifier {
    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(self.resource_type.as_str(), self.id.as_str())
    }
}

/// Relationship payload: `null`, a single identifier, or a list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Linkage {
    #[default]
    Null,
    One(ResourceIdentifier),
    Many(Vec<ResourceIdentifier>),
}

impl Linkage {
    /// Returns the identifiers as a slice (empty for `Null`).
    pub fn identifiers(&self) -> &[ResourceIdentifier] {
        match self {
            Linkage::Null => &[],
            Linkage::One(identifier) => std::slice::from_ref(identifier),
            Linkage::Many(identifiers) => identifiers,
        }
    }

    pub fn is_many(&self) -> bool {
        matches!(self, Linkage::Many(_))
    }
}

/// A named relationship on a resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(default)]
    pub data: Linkage,
    #[serde(default)]
    pub links: Map<String, Value>,
    #[serde(default)]
    pub meta: Map<String, Value>,
}

impl Relationship {
    pub fn new(data: Linkage) -> Self {
        Self {
            data,
            links: Map::new(),
            meta: Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resource_wire_shape() {
        let mut resource = Resource::new("users", "1");
        resource.attributes.insert("first".to_string(), json!("tim"));
        resource.relationships.insert(
            "groups".to_string(),
            Relationship::new(Linkage::Many(vec![ResourceIdentifier {
                resource_type: "groups".to_string(),
                id: "admins".to_string(),
                links: Map::new(),
                meta: Map::new(),
            }])),
        );

        let value = serde_json::to_value(&resource).unwrap();
        assert_eq!(value["type"], "users");
        assert_eq!(value["attributes"]["first"], "tim");
        assert_eq!(value["relationships"]["groups"]["data"][0]["id"], "admins");
        assert_eq!(value["links"], json!({}));
    }

    #[test]
    fn test_linkage_null_and_single() {
        let null: Relationship = serde_json::from_value(json!({"data": null})).unwrap();
        assert_eq!(null.data, Linkage::Null);
        assert!(null.data.identifiers().is_empty());

        let one: Relationship =
            serde_json::from_value(json!({"data": {"type": "people", "id": "9"}})).unwrap();
        assert!(!one.data.is_many());
        assert_eq!(one.data.identifiers()[0].key(), ResourceKey::new("people", "9"));
    }

    #[test]
    fn test_merge_last_write_wins() {
        let mut first = Resource::new("books", "1");
        first.attributes.insert("title".to_string(), json!("Draft"));
        first.attributes.insert("isbn".to_string(), json!("978"));

        let mut second = Resource::new("books", "1");
        second.attributes.insert("title".to_string(), json!("Final"));
        second.meta.insert("rank".to_string(), json!(2));

        first.merge(second);
        assert_eq!(first.attributes["title"], "Final");
        assert_eq!(first.attributes["isbn"], "978");
        assert_eq!(first.meta["rank"], 2);
    }
}
