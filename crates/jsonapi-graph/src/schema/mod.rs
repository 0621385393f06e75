//! Per-type schemas: how records of one type become resources.
//!
//! A schema is registered per `(type, schema name)`. Named schemas inherit
//! from the type's `default` schema; see [`SchemaDefinition::merged_over`].

pub mod hook;
pub mod registry;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::error::SchemaError;
use crate::util::deep_merge;

pub use hook::{CollectionHook, Hook, ResolveContext, ResourceHook, Resolver};
pub use registry::Registry;

/// Name of the schema every type falls back to.
pub const DEFAULT_SCHEMA: &str = "default";

/// Field used as the resource id when a schema does not name one.
pub const DEFAULT_ID_FIELD: &str = "id";

/// How the id of a record is found.
#[derive(Clone)]
pub enum IdSelector {
    /// Read from this field (dot paths allowed).
    Field(String),
    /// Computed from the whole record.
    Computed(Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>),
}

impl IdSelector {
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        IdSelector::Computed(Arc::new(f))
    }

    /// Returns the id field name, if the id is read from a field.
    pub fn field(&self) -> Option<&str> {
        match self {
            IdSelector::Field(field) => Some(field),
            IdSelector::Computed(_) => None,
        }
    }

    pub(crate) fn select(&self, record: &Value) -> Option<Value> {
        match self {
            IdSelector::Field(field) => crate::util::get_path(record, field).cloned(),
            IdSelector::Computed(f) => f(record),
        }
    }
}

impl Default for IdSelector {
    fn default() -> Self {
        IdSelector::Field(DEFAULT_ID_FIELD.to_string())
    }
}

impl fmt::Debug for IdSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdSelector::Field(field) => f.debug_tuple("Field").field(field).finish(),
            IdSelector::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// Declaration of one relationship field.
#[derive(Debug, Clone)]
pub struct RelationshipSpec {
    pub target_type: String,
    /// Schema of the target type; `default` when unset.
    pub schema: Option<String>,
    /// Whether related resources are hoisted into `included`.
    pub include: bool,
    /// Resolved against the parent resource.
    pub links: BTreeMap<String, Resolver>,
    /// Resolved against the parent resource.
    pub meta: BTreeMap<String, Resolver>,
}

impl RelationshipSpec {
    pub fn new(target_type: impl Into<String>) -> Self {
        Self {
            target_type: target_type.into(),
            schema: None,
            include: true,
            links: BTreeMap::new(),
            meta: BTreeMap::new(),
        }
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn include(mut self, include: bool) -> Self {
        self.include = include;
        self
    }

    pub fn link(mut self, name: impl Into<String>, resolver: Resolver) -> Self {
        self.links.insert(name.into(), resolver);
        self
    }

    pub fn meta(mut self, name: impl Into<String>, resolver: Resolver) -> Self {
        self.meta.insert(name.into(), resolver);
        self
    }

    pub fn schema_name(&self) -> &str {
        self.schema.as_deref().unwrap_or(DEFAULT_SCHEMA)
    }
}

/// Options for one schema, as supplied at registration.
///
/// Build programmatically, or parse the JSON shape with
/// [`SchemaOptions::from_value`] and attach hooks afterwards.
#[derive(Debug, Clone, Default)]
pub struct SchemaOptions {
    pub(crate) id: Option<IdSelector>,
    pub(crate) blacklist: Vec<String>,
    pub(crate) whitelist: Vec<String>,
    pub(crate) relationships: BTreeMap<String, RelationshipSpec>,
    pub(crate) links: BTreeMap<String, Resolver>,
    pub(crate) meta: BTreeMap<String, Resolver>,
    pub(crate) top_level_links: BTreeMap<String, Resolver>,
    pub(crate) top_level_meta: BTreeMap<String, Resolver>,
    pub(crate) process_resource: Option<ResourceHook>,
    pub(crate) process_collection: Option<CollectionHook>,
    pub(crate) minimize_payload: Option<bool>,
    pub(crate) extra: Map<String, Value>,
}

impl SchemaOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses registration options from JSON.
    ///
    /// Recognized keys: `id`, `blacklist`, `whitelist` (a string or a list of
    /// strings), `relationships` (`{name: {type, schema?, include?, links?,
    /// meta?}}`), `links`, `meta`, `topLevelLinks`, `topLevelMeta`,
    /// `minimizePayload`. Links and meta given here are literals. Every other
    /// key is kept as an option value visible to resolvers.
    pub fn from_value(value: &Value) -> Result<Self, SchemaError> {
        let raw: RawSchemaOptions = serde_json::from_value(value.clone())
            .map_err(|err| SchemaError::MalformedOptions {
                detail: err.to_string(),
            })?;

        let relationships = raw
            .relationships
            .into_iter()
            .map(|(name, rel)| {
                let spec = RelationshipSpec {
                    target_type: rel.target_type,
                    schema: rel.schema,
                    include: rel.include.unwrap_or(true),
                    links: literals(rel.links),
                    meta: literals(rel.meta),
                };
                (name, spec)
            })
            .collect();

        Ok(Self {
            id: raw.id.map(IdSelector::Field),
            blacklist: raw.blacklist,
            whitelist: raw.whitelist,
            relationships,
            links: literals(raw.links),
            meta: literals(raw.meta),
            top_level_links: literals(raw.top_level_links),
            top_level_meta: literals(raw.top_level_meta),
            process_resource: None,
            process_collection: None,
            minimize_payload: raw.minimize_payload,
            extra: raw.extra,
        })
    }

    /// Reads the id from `field`.
    pub fn id(mut self, field: impl Into<String>) -> Self {
        self.id = Some(IdSelector::Field(field.into()));
        self
    }

    /// Computes the id from the whole record.
    pub fn id_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        self.id = Some(IdSelector::computed(f));
        self
    }

    pub fn blacklist<S: Into<String>>(mut self, paths: impl IntoIterator<Item = S>) -> Self {
        self.blacklist.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn whitelist<S: Into<String>>(mut self, paths: impl IntoIterator<Item = S>) -> Self {
        self.whitelist.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn relationship(mut self, name: impl Into<String>, spec: RelationshipSpec) -> Self {
        self.relationships.insert(name.into(), spec);
        self
    }

    pub fn link(mut self, name: impl Into<String>, resolver: Resolver) -> Self {
        self.links.insert(name.into(), resolver);
        self
    }

    pub fn meta(mut self, name: impl Into<String>, resolver: Resolver) -> Self {
        self.meta.insert(name.into(), resolver);
        self
    }

    pub fn top_level_link(mut self, name: impl Into<String>, resolver: Resolver) -> Self {
        self.top_level_links.insert(name.into(), resolver);
        self
    }

    pub fn top_level_meta(mut self, name: impl Into<String>, resolver: Resolver) -> Self {
        self.top_level_meta.insert(name.into(), resolver);
        self
    }

    pub fn process_resource(mut self, hook: ResourceHook) -> Self {
        self.process_resource = Some(hook);
        self
    }

    pub fn process_collection(mut self, hook: CollectionHook) -> Self {
        self.process_collection = Some(hook);
        self
    }

    /// Drops empty members from primary resources and their relationship
    /// objects when the document is written.
    pub fn minimize_payload(mut self, minimize: bool) -> Self {
        self.minimize_payload = Some(minimize);
        self
    }

    /// Sets a pass-through option value visible to resolvers.
    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Checks the options for a given `(type, schema)` registration.
    pub(crate) fn validate(&self, resource_type: &str, schema: &str) -> Result<(), SchemaError> {
        let invalid = |detail: String| SchemaError::InvalidOptions {
            resource_type: resource_type.to_string(),
            schema: schema.to_string(),
            detail,
        };

        if resource_type.is_empty() {
            return Err(invalid("type must not be empty".to_string()));
        }
        if schema.is_empty() {
            return Err(invalid("schema name must not be empty".to_string()));
        }
        if let Some(IdSelector::Field(field)) = &self.id {
            if field.is_empty() {
                return Err(invalid("`id` must not be empty".to_string()));
            }
        }
        for (list, paths) in [("blacklist", &self.blacklist), ("whitelist", &self.whitelist)] {
            if paths.iter().any(String::is_empty) {
                return Err(invalid(format!("`{list}` contains an empty path")));
            }
        }
        for (name, spec) in &self.relationships {
            if name.is_empty() {
                return Err(invalid("relationship name must not be empty".to_string()));
            }
            if spec.target_type.is_empty() {
                return Err(invalid(format!("relationship `{name}` has an empty `type`")));
            }
            if spec.schema.as_deref() == Some("") {
                return Err(invalid(format!("relationship `{name}` has an empty `schema`")));
            }
        }
        Ok(())
    }
}

fn literals(values: Map<String, Value>) -> BTreeMap<String, Resolver> {
    values
        .into_iter()
        .map(|(name, value)| (name, Resolver::Value(value)))
        .collect()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSchemaOptions {
    #[serde(default)]
    id: Option<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    blacklist: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    whitelist: Vec<String>,
    #[serde(default)]
    relationships: BTreeMap<String, RawRelationship>,
    #[serde(default)]
    links: Map<String, Value>,
    #[serde(default)]
    meta: Map<String, Value>,
    #[serde(default)]
    top_level_links: Map<String, Value>,
    #[serde(default)]
    top_level_meta: Map<String, Value>,
    #[serde(default)]
    minimize_payload: Option<bool>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Deserialize)]
struct RawRelationship {
    #[serde(rename = "type")]
    target_type: String,
    #[serde(default)]
    schema: Option<String>,
    #[serde(default)]
    include: Option<bool>,
    #[serde(default)]
    links: Map<String, Value>,
    #[serde(default)]
    meta: Map<String, Value>,
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(path) => vec![path],
        OneOrMany::Many(paths) => paths,
    })
}

/// A registered schema.
#[derive(Debug, Clone)]
pub struct SchemaDefinition {
    pub resource_type: String,
    pub schema_name: String,
    /// `None` means the `id` field.
    pub id: Option<IdSelector>,
    pub blacklist: Vec<String>,
    pub whitelist: Vec<String>,
    pub relationships: BTreeMap<String, RelationshipSpec>,
    pub links: BTreeMap<String, Resolver>,
    pub meta: BTreeMap<String, Resolver>,
    pub top_level_links: BTreeMap<String, Resolver>,
    pub top_level_meta: BTreeMap<String, Resolver>,
    pub process_resource: Option<ResourceHook>,
    pub process_collection: Option<CollectionHook>,
    pub minimize_payload: Option<bool>,
    /// Pass-through option values.
    pub extra: Map<String, Value>,
}

impl SchemaDefinition {
    pub(crate) fn from_options(
        resource_type: impl Into<String>,
        schema_name: impl Into<String>,
        options: SchemaOptions,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            schema_name: schema_name.into(),
            id: options.id,
            blacklist: options.blacklist,
            whitelist: options.whitelist,
            relationships: options.relationships,
            links: options.links,
            meta: options.meta,
            top_level_links: options.top_level_links,
            top_level_meta: options.top_level_meta,
            process_resource: options.process_resource,
            process_collection: options.process_collection,
            minimize_payload: options.minimize_payload,
            extra: options.extra,
        }
    }

    /// Returns the id selector, defaulting to the `id` field.
    pub fn id_selector(&self) -> IdSelector {
        self.id.clone().unwrap_or_default()
    }

    /// Returns the id field name, or `None` when the id is computed.
    pub fn id_field(&self) -> Option<&str> {
        match &self.id {
            None => Some(DEFAULT_ID_FIELD),
            Some(selector) => selector.field(),
        }
    }

    /// Layers `self` over `base`, keeping `self`'s type and schema name.
    ///
    /// Set scalars and hooks replace, non-empty lists replace, and maps merge
    /// key by key with `self` winning.
    pub fn merged_over(&self, base: &SchemaDefinition) -> SchemaDefinition {
        fn layer<V: Clone>(
            base: &BTreeMap<String, V>,
            overlay: &BTreeMap<String, V>,
        ) -> BTreeMap<String, V> {
            let mut merged = base.clone();
            merged.extend(overlay.iter().map(|(k, v)| (k.clone(), v.clone())));
            merged
        }

        fn list(base: &[String], overlay: &[String]) -> Vec<String> {
            if overlay.is_empty() {
                base.to_vec()
            } else {
                overlay.to_vec()
            }
        }

        let mut extra = base.extra.clone();
        deep_merge(&mut extra, &self.extra);

        SchemaDefinition {
            resource_type: self.resource_type.clone(),
            schema_name: self.schema_name.clone(),
            id: self.id.clone().or_else(|| base.id.clone()),
            blacklist: list(&base.blacklist, &self.blacklist),
            whitelist: list(&base.whitelist, &self.whitelist),
            relationships: layer(&base.relationships, &self.relationships),
            links: layer(&base.links, &self.links),
            meta: layer(&base.meta, &self.meta),
            top_level_links: layer(&base.top_level_links, &self.top_level_links),
            top_level_meta: layer(&base.top_level_meta, &self.top_level_meta),
            process_resource: self
                .process_resource
                .clone()
                .or_else(|| base.process_resource.clone()),
            process_collection: self
                .process_collection
                .clone()
                .or_else(|| base.process_collection.clone()),
            minimize_payload: self.minimize_payload.or(base.minimize_payload),
            extra,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_defaults() {
        let options = SchemaOptions::from_value(&json!({
            "id": "_id",
            "blacklist": "email",
            "relationships": {"groups": {"type": "groups"}},
            "requestPath": "/api/users",
            "minimizePayload": true
        }))
        .unwrap();

        assert_eq!(options.minimize_payload, Some(true));
        assert!(!options.extra.contains_key("minimizePayload"));
        assert_eq!(options.blacklist, vec!["email".to_string()]);
        assert!(options.whitelist.is_empty());
        let groups = &options.relationships["groups"];
        assert!(groups.include);
        assert_eq!(groups.schema_name(), DEFAULT_SCHEMA);
        assert_eq!(options.extra["requestPath"], "/api/users");
    }

    #[test]
    fn test_from_value_rejects_bad_shapes() {
        assert!(SchemaOptions::from_value(&json!({"blacklist": [1, 2]})).is_err());
        assert!(SchemaOptions::from_value(&json!({"relationships": {"groups": {}}})).is_err());
        assert!(
            SchemaOptions::from_value(&json!({"relationships": {"g": {"type": "g", "include": "yes"}}}))
                .is_err()
        );
        assert!(matches!(
            SchemaOptions::from_value(&json!("users")),
            Err(SchemaError::MalformedOptions { .. })
        ));
    }

    #[test]
    fn test_validate_relationship_type() {
        let options = SchemaOptions::new().relationship("groups", RelationshipSpec::new(""));
        let err = options.validate("users", DEFAULT_SCHEMA).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidOptions { .. }));
    }

    #[test]
    fn test_merged_over_default() {
        let base = SchemaDefinition::from_options(
            "users",
            DEFAULT_SCHEMA,
            SchemaOptions::new()
                .id("_id")
                .blacklist(["email"])
                .relationship("groups", RelationshipSpec::new("groups"))
                .minimize_payload(true)
                .option("nested", json!({"a": 1, "b": 1})),
        );
        let named = SchemaDefinition::from_options(
            "users",
            "public",
            SchemaOptions::new()
                .whitelist(["first", "last"])
                .relationship("groups", RelationshipSpec::new("groups").include(false))
                .option("nested", json!({"b": 2})),
        );

        let merged = named.merged_over(&base);
        assert_eq!(merged.schema_name, "public");
        assert_eq!(merged.id_field(), Some("_id"));
        assert_eq!(merged.blacklist, vec!["email".to_string()]);
        assert_eq!(merged.whitelist, vec!["first".to_string(), "last".to_string()]);
        assert!(!merged.relationships["groups"].include);
        assert_eq!(merged.extra["nested"], json!({"a": 1, "b": 2}));
        assert_eq!(merged.minimize_payload, Some(true));
    }

    #[test]
    fn test_computed_id_has_no_field() {
        let definition = SchemaDefinition::from_options(
            "users",
            DEFAULT_SCHEMA,
            SchemaOptions::new().id_with(|record| record.get("email").cloned()),
        );
        assert_eq!(definition.id_field(), None);
        assert_eq!(
            definition.id_selector().select(&json!({"email": "a@b.c"})),
            Some(json!("a@b.c"))
        );
    }
}
