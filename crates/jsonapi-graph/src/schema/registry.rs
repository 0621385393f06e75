//! Two-level schema store: `type -> schema name -> definition`.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::SchemaError;
use crate::schema::{DEFAULT_ID_FIELD, DEFAULT_SCHEMA, SchemaDefinition, SchemaOptions};

/// Schemas registered on one codec instance.
///
/// Cloning a registry copies the map; definitions themselves are shared.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    types: FxHashMap<String, FxHashMap<String, Arc<SchemaDefinition>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and stores a schema, replacing any previous definition.
    pub fn define(
        &mut self,
        resource_type: &str,
        schema: &str,
        options: SchemaOptions,
    ) -> Result<(), SchemaError> {
        options.validate(resource_type, schema)?;

        let definition = SchemaDefinition::from_options(resource_type, schema, options);
        debug!(
            resource_type,
            schema,
            relationships = definition.relationships.len(),
            "schema defined"
        );

        self.types
            .entry(resource_type.to_string())
            .or_default()
            .insert(schema.to_string(), Arc::new(definition));
        Ok(())
    }

    /// Returns the stored definition without merging.
    pub fn get(&self, resource_type: &str, schema: &str) -> Option<&Arc<SchemaDefinition>> {
        self.types.get(resource_type)?.get(schema)
    }

    pub fn contains(&self, resource_type: &str, schema: &str) -> bool {
        self.get(resource_type, schema).is_some()
    }

    /// Returns the effective schema for `(type, schema)`.
    ///
    /// A named schema is layered over the type's default schema when one
    /// exists. The requested schema itself must be registered.
    pub fn resolve(
        &self,
        resource_type: &str,
        schema: &str,
    ) -> Result<Arc<SchemaDefinition>, SchemaError> {
        let unknown = || SchemaError::UnknownType {
            resource_type: resource_type.to_string(),
            schema: schema.to_string(),
        };

        let schemas = self.types.get(resource_type).ok_or_else(unknown)?;
        let requested = schemas.get(schema).ok_or_else(unknown)?;

        if schema == DEFAULT_SCHEMA {
            return Ok(Arc::clone(requested));
        }
        match schemas.get(DEFAULT_SCHEMA) {
            Some(base) => Ok(Arc::new(requested.merged_over(base))),
            None => Ok(Arc::clone(requested)),
        }
    }

    /// Id field of the type's default schema, `id` when unknown or computed.
    pub fn id_field(&self, resource_type: &str) -> &str {
        self.get(resource_type, DEFAULT_SCHEMA)
            .and_then(|definition| definition.id_field())
            .unwrap_or(DEFAULT_ID_FIELD)
    }

    /// Whether `relationship` on the type's default schema hoists its targets.
    ///
    /// Unknown types and relationships report `true`.
    pub fn relationship_include(&self, resource_type: &str, relationship: &str) -> bool {
        self.get(resource_type, DEFAULT_SCHEMA)
            .and_then(|definition| definition.relationships.get(relationship))
            .is_none_or(|spec| spec.include)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::RelationshipSpec;

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .define(
                "users",
                DEFAULT_SCHEMA,
                SchemaOptions::new()
                    .id("_id")
                    .blacklist(["email"])
                    .relationship("groups", RelationshipSpec::new("groups")),
            )
            .unwrap();
        registry
            .define("users", "admin", SchemaOptions::new().whitelist(["email"]))
            .unwrap();
        registry
    }

    #[test]
    fn test_resolve_named_over_default() {
        let registry = registry();
        let admin = registry.resolve("users", "admin").unwrap();
        assert_eq!(admin.schema_name, "admin");
        assert_eq!(admin.id_field(), Some("_id"));
        assert!(admin.relationships.contains_key("groups"));
        assert_eq!(admin.whitelist, vec!["email".to_string()]);
    }

    #[test]
    fn test_resolve_unknown_type() {
        let registry = registry();
        let err = registry.resolve("groups", DEFAULT_SCHEMA).unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnknownType {
                resource_type: "groups".to_string(),
                schema: DEFAULT_SCHEMA.to_string(),
            }
        );
        assert!(err.to_string().starts_with("[1002]"));
    }

    #[test]
    fn test_missing_named_schema() {
        let registry = registry();
        let err = registry.resolve("users", "public").unwrap_err();
        assert!(matches!(err, SchemaError::UnknownType { ref schema, .. } if schema == "public"));
    }

    #[test]
    fn test_define_rejects_empty_names() {
        let mut registry = Registry::new();
        assert!(registry.define("", DEFAULT_SCHEMA, SchemaOptions::new()).is_err());
        assert!(registry.define("users", "", SchemaOptions::new()).is_err());
        assert!(!registry.contains("users", DEFAULT_SCHEMA));
    }

    #[test]
    fn test_helpers() {
        let registry = registry();
        assert_eq!(registry.id_field("users"), "_id");
        assert_eq!(registry.id_field("unknown"), "id");
        assert!(registry.relationship_include("users", "groups"));
        assert!(registry.relationship_include("users", "friends"));

        let mut hidden = Registry::new();
        hidden
            .define(
                "users",
                DEFAULT_SCHEMA,
                SchemaOptions::new()
                    .relationship("groups", RelationshipSpec::new("groups").include(false)),
            )
            .unwrap();
        assert!(!hidden.relationship_include("users", "groups"));
    }
}
