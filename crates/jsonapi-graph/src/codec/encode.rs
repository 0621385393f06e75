//! Encoding records into resource documents.
//!
//! Relationship expansion runs on an explicit work stack over a frame arena.
//! Entering a frame runs the resource hook, projects attributes and schedules
//! one child frame per related record; exiting it builds linkage from the
//! finished children and hoists their resources into `included`. Nesting is
//! bounded by `max_depth`, and a resource already on the current path is
//! emitted without expanding its relationships again.

use std::collections::BTreeMap;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::codec::attributes::{PathFilter, RelationshipMode};
use crate::codec::included::merge_included;
use crate::error::EncodeError;
use crate::model::{Document, Linkage, PrimaryData, Relationship, Resource};
use crate::schema::{DEFAULT_ID_FIELD, Registry, ResolveContext, Resolver, SchemaDefinition};
use crate::util::{deep_merge, get_path, set_path};

/// Per-call encoding options.
#[derive(Debug, Clone, Default)]
pub struct EncodeOptions {
    /// Opaque request context, visible to resolvers as the `request` option
    /// at every nesting level.
    pub request: Value,
    /// Option values that override schema and codec values for this call.
    pub extra: Map<String, Value>,
    /// Overrides the schema's `minimize_payload` setting for this call.
    pub minimize_payload: Option<bool>,
}

impl EncodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options carrying a request context.
    pub fn with_request(request: Value) -> Self {
        Self {
            request,
            ..Self::default()
        }
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn minimize_payload(mut self, minimize: bool) -> Self {
        self.minimize_payload = Some(minimize);
        self
    }
}

/// Effective schema plus the option values its resolvers see.
#[derive(Debug)]
struct Scope {
    schema: Arc<SchemaDefinition>,
    options: Arc<Map<String, Value>>,
}

impl Scope {
    fn context(&self, resource: Option<Resource>) -> ResolveContext {
        ResolveContext::new(resource, Arc::clone(&self.options))
    }
}

/// `(type, id, schema)` of a resource on the current path.
type PathKey = (String, String, String);

#[derive(Debug)]
struct Slot {
    name: String,
    include: bool,
    many: bool,
    children: Vec<usize>,
}

#[derive(Debug)]
struct Frame {
    scope: Arc<Scope>,
    depth: usize,
    resource: Option<Resource>,
    path_key: Option<PathKey>,
    slots: Vec<Slot>,
    included: Vec<Resource>,
}

impl Frame {
    fn new(scope: Arc<Scope>, depth: usize) -> Self {
        Self {
            scope,
            depth,
            resource: None,
            path_key: None,
            slots: Vec::new(),
            included: Vec::new(),
        }
    }
}

enum Step {
    Enter(usize, Value),
    Exit(usize),
}

/// Encodes one top-level call.
pub(crate) struct Encoder<'a> {
    registry: &'a Registry,
    defaults: &'a SchemaDefinition,
    options: &'a EncodeOptions,
    max_depth: usize,
    scopes: FxHashMap<(String, String), Arc<Scope>>,
}

impl<'a> Encoder<'a> {
    pub(crate) fn new(
        registry: &'a Registry,
        defaults: &'a SchemaDefinition,
        options: &'a EncodeOptions,
        max_depth: usize,
    ) -> Self {
        Self {
            registry,
            defaults,
            options,
            max_depth,
            scopes: FxHashMap::default(),
        }
    }

    /// Resolves and caches the scope for `(type, schema)`.
    fn scope(&mut self, resource_type: &str, schema_name: &str) -> Result<Arc<Scope>, EncodeError> {
        let key = (resource_type.to_string(), schema_name.to_string());
        if let Some(scope) = self.scopes.get(&key) {
            return Ok(Arc::clone(scope));
        }

        let schema = self
            .registry
            .resolve(resource_type, schema_name)?
            .merged_over(self.defaults);

        let mut options = schema.extra.clone();
        deep_merge(&mut options, &self.options.extra);
        options.insert("request".to_string(), self.options.request.clone());

        let scope = Arc::new(Scope {
            schema: Arc::new(schema),
            options: Arc::new(options),
        });
        self.scopes.insert(key, Arc::clone(&scope));
        Ok(scope)
    }

    pub(crate) async fn encode(
        mut self,
        resource_type: &str,
        schema_name: &str,
        data: Value,
    ) -> Result<Document, EncodeError> {
        let scope = self.scope(resource_type, schema_name)?;
        debug!(resource_type, schema = schema_name, "encode started");

        let mut included = Vec::new();
        let data = match data {
            Value::Null => PrimaryData::Null,
            Value::Array(items) => {
                let items = process_collection(&scope, items).await?;
                let mut resources = Vec::with_capacity(items.len());
                for item in items {
                    let (resource, nested) = self.encode_tree(Arc::clone(&scope), item).await?;
                    resources.push(resource);
                    included.extend(nested);
                }
                PrimaryData::Many(resources)
            }
            record => {
                let (resource, nested) = self.encode_tree(Arc::clone(&scope), record).await?;
                included = nested;
                PrimaryData::One(Box::new(resource))
            }
        };

        let included = merge_included(included, &data.keys());
        let context = scope.context(None);
        let links = resolve_all(&scope.schema.top_level_links, &context).await?;
        let meta = resolve_all(&scope.schema.top_level_meta, &context).await?;

        debug!(
            resource_type,
            resources = data.as_slice().len(),
            included = included.len(),
            "encode finished"
        );

        Ok(Document {
            links,
            data,
            included,
            meta,
            minimize_payload: self
                .options
                .minimize_payload
                .or(scope.schema.minimize_payload)
                .unwrap_or(false),
        })
    }

    /// Encodes one primary record and everything reachable from it.
    async fn encode_tree(
        &mut self,
        scope: Arc<Scope>,
        record: Value,
    ) -> Result<(Resource, Vec<Resource>), EncodeError> {
        let resource_type = scope.schema.resource_type.clone();
        let mut frames = vec![Frame::new(scope, 0)];
        let mut stack = vec![Step::Enter(0, record)];
        let mut on_path: FxHashSet<PathKey> = FxHashSet::default();

        while let Some(step) = stack.pop() {
            match step {
                Step::Enter(index, record) => {
                    let children = self.enter(&mut frames, index, record, &mut on_path).await?;
                    stack.push(Step::Exit(index));
                    stack.extend(
                        children
                            .into_iter()
                            .rev()
                            .map(|(child, record)| Step::Enter(child, record)),
                    );
                }
                Step::Exit(index) => exit(&mut frames, index, &mut on_path).await?,
            }
        }

        let root = &mut frames[0];
        let resource = root.resource.take().ok_or_else(|| EncodeError::InvalidData {
            resource_type,
            detail: "record produced no resource".to_string(),
        })?;
        Ok((resource, std::mem::take(&mut root.included)))
    }

    /// Builds the resource shell for `frames[index]` and schedules its children.
    async fn enter(
        &mut self,
        frames: &mut Vec<Frame>,
        index: usize,
        record: Value,
        on_path: &mut FxHashSet<PathKey>,
    ) -> Result<Vec<(usize, Value)>, EncodeError> {
        let scope = Arc::clone(&frames[index].scope);
        let depth = frames[index].depth;
        let schema = scope.schema.as_ref();
        let resource_type = schema.resource_type.as_str();

        let record = match &schema.process_resource {
            Some(hook) => hook.call(record).await?,
            None => record,
        };
        let record = into_record(schema, record)?;
        let id = resource_id(schema, &record)?;

        if depth > self.max_depth {
            return Err(EncodeError::DepthLimitExceeded {
                resource_type: resource_type.to_string(),
                depth,
                max: self.max_depth,
            });
        }
        trace!(resource_type, id = %id, depth, "resource entered");

        let filter = PathFilter::new(schema);
        let mut resource = Resource::new(resource_type, id.as_str());
        if let Value::Object(fields) = &record {
            resource.attributes = filter.project(fields);
        }

        let path_key = (resource_type.to_string(), id, schema.schema_name.clone());
        let mut children = Vec::new();

        if on_path.contains(&path_key) {
            debug!(
                resource_type,
                id = %path_key.1,
                schema = %path_key.2,
                "resource already on path, relationships not expanded"
            );
        } else {
            for (name, spec) in &schema.relationships {
                let Some(value) = get_path(&record, name) else {
                    continue;
                };
                let include = match filter.relationship(name, spec.include) {
                    RelationshipMode::Stripped => continue,
                    RelationshipMode::Linked { include } => include,
                };

                let target = self.scope(&spec.target_type, spec.schema_name())?;
                let mut slot = Slot {
                    name: name.clone(),
                    include,
                    many: false,
                    children: Vec::new(),
                };

                let related = match value.clone() {
                    Value::Null => Vec::new(),
                    Value::Array(items) => {
                        slot.many = true;
                        process_collection(&target, items).await?
                    }
                    other => vec![other],
                };
                for item in related {
                    let child = frames.len();
                    frames.push(Frame::new(Arc::clone(&target), depth + 1));
                    slot.children.push(child);
                    children.push((child, item));
                }
                frames[index].slots.push(slot);
            }

            on_path.insert(path_key.clone());
            frames[index].path_key = Some(path_key);
        }

        frames[index].resource = Some(resource);
        Ok(children)
    }
}

/// Completes `frames[index]` once all of its children have exited.
async fn exit(
    frames: &mut [Frame],
    index: usize,
    on_path: &mut FxHashSet<PathKey>,
) -> Result<(), EncodeError> {
    let scope = Arc::clone(&frames[index].scope);
    let slots = std::mem::take(&mut frames[index].slots);
    let mut included = std::mem::take(&mut frames[index].included);
    let mut resource = frames[index]
        .resource
        .take()
        .ok_or_else(|| EncodeError::InvalidData {
            resource_type: scope.schema.resource_type.clone(),
            detail: "resource exited before it was entered".to_string(),
        })?;

    for slot in slots {
        let mut identifiers = Vec::with_capacity(slot.children.len());
        for child in slot.children {
            let frame = &mut frames[child];
            let Some(related) = frame.resource.take() else {
                continue;
            };
            identifiers.push(related.identifier());
            let nested = std::mem::take(&mut frame.included);
            if slot.include {
                if !related.attributes.is_empty() {
                    included.push(related);
                }
                included.extend(nested);
            }
        }

        let data = if slot.many {
            Linkage::Many(identifiers)
        } else {
            identifiers.into_iter().next().map_or(Linkage::Null, Linkage::One)
        };
        let mut relationship = Relationship::new(data);

        if let Some(spec) = scope.schema.relationships.get(&slot.name) {
            if !spec.links.is_empty() || !spec.meta.is_empty() {
                let context = scope.context(Some(resource.clone()));
                relationship.links = resolve_all(&spec.links, &context).await?;
                relationship.meta = resolve_all(&spec.meta, &context).await?;
            }
        }
        resource.relationships.insert(slot.name, relationship);
    }

    if !scope.schema.links.is_empty() || !scope.schema.meta.is_empty() {
        let context = scope.context(Some(resource.clone()));
        resource.links = resolve_all(&scope.schema.links, &context).await?;
        resource.meta = resolve_all(&scope.schema.meta, &context).await?;
    }

    let frame = &mut frames[index];
    if let Some(path_key) = frame.path_key.take() {
        on_path.remove(&path_key);
    }
    frame.resource = Some(resource);
    frame.included = included;
    Ok(())
}

async fn process_collection(scope: &Scope, items: Vec<Value>) -> Result<Vec<Value>, EncodeError> {
    match &scope.schema.process_collection {
        Some(hook) => Ok(hook.call((items, scope.context(None))).await?),
        None => Ok(items),
    }
}

/// Runs every resolver, placing results at their (possibly dotted) names.
async fn resolve_all(
    resolvers: &BTreeMap<String, Resolver>,
    context: &ResolveContext,
) -> Result<Map<String, Value>, EncodeError> {
    let mut resolved = Map::new();
    for (name, resolver) in resolvers {
        if let Some(value) = resolver.resolve(context).await? {
            set_path(&mut resolved, name, value);
        }
    }
    Ok(resolved)
}

/// Objects pass through; a bare scalar becomes a one-field id shell.
fn into_record(schema: &SchemaDefinition, record: Value) -> Result<Value, EncodeError> {
    match record {
        Value::Object(_) => Ok(record),
        Value::Array(_) => Err(EncodeError::InvalidData {
            resource_type: schema.resource_type.clone(),
            detail: "expected a record or an id, found an array".to_string(),
        }),
        scalar => {
            let field = schema.id_field().unwrap_or(DEFAULT_ID_FIELD);
            let mut shell = Map::new();
            set_path(&mut shell, field, scalar);
            Ok(Value::Object(shell))
        }
    }
}

fn resource_id(schema: &SchemaDefinition, record: &Value) -> Result<String, EncodeError> {
    let missing = || EncodeError::MissingId {
        resource_type: schema.resource_type.clone(),
        field: schema.id_field().unwrap_or("<computed>").to_string(),
    };

    match schema.id_selector().select(record) {
        Some(Value::String(id)) if !id.is_empty() => Ok(id),
        Some(Value::Number(id)) => Ok(id.to_string()),
        Some(Value::Bool(id)) => Ok(id.to_string()),
        Some(Value::String(_)) | Some(Value::Null) | None => Err(missing()),
        Some(other) => Err(EncodeError::InvalidData {
            resource_type: schema.resource_type.clone(),
            detail: format!("id must be a string or number, found {other}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HookError;
    use crate::limits::DEFAULT_MAX_DEPTH;
    use crate::schema::{CollectionHook, DEFAULT_SCHEMA, Hook, RelationshipSpec, SchemaOptions};
    use serde_json::json;

    fn defaults() -> SchemaDefinition {
        SchemaDefinition::from_options("", DEFAULT_SCHEMA, SchemaOptions::new())
    }

    async fn encode(
        registry: &Registry,
        resource_type: &str,
        data: Value,
        options: &EncodeOptions,
        max_depth: usize,
    ) -> Result<Document, EncodeError> {
        let defaults = defaults();
        Encoder::new(registry, &defaults, options, max_depth)
            .encode(resource_type, DEFAULT_SCHEMA, data)
            .await
    }

    #[tokio::test]
    async fn test_cycle_on_path_is_not_expanded() {
        let mut registry = Registry::new();
        registry
            .define(
                "users",
                DEFAULT_SCHEMA,
                SchemaOptions::new().relationship("friends", RelationshipSpec::new("users")),
            )
            .unwrap();

        let data = json!({
            "id": 1,
            "name": "a",
            "friends": [{
                "id": 2,
                "name": "b",
                "friends": [{"id": 1, "name": "a again", "friends": [{"id": 2}]}]
            }]
        });
        let document = encode(&registry, "users", data, &EncodeOptions::new(), DEFAULT_MAX_DEPTH)
            .await
            .unwrap();

        let root = &document.data.as_slice()[0];
        assert_eq!(root.relationships["friends"].data.identifiers()[0].id, "2");
        assert_eq!(document.included.len(), 1);
        let friend = &document.included[0];
        assert_eq!(friend.id, "2");
        assert_eq!(friend.relationships["friends"].data.identifiers()[0].id, "1");
    }

    #[tokio::test]
    async fn test_depth_limit() {
        let mut registry = Registry::new();
        registry
            .define(
                "nodes",
                DEFAULT_SCHEMA,
                SchemaOptions::new().relationship("child", RelationshipSpec::new("nodes")),
            )
            .unwrap();

        let data = json!({"id": 1, "child": {"id": 2, "child": {"id": 3}}});
        let err = encode(&registry, "nodes", data.clone(), &EncodeOptions::new(), 1)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EncodeError::DepthLimitExceeded { depth: 2, max: 1, .. }
        ));

        assert!(encode(&registry, "nodes", data, &EncodeOptions::new(), 2).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_and_invalid_ids() {
        let mut registry = Registry::new();
        registry
            .define("users", DEFAULT_SCHEMA, SchemaOptions::new().id("_id"))
            .unwrap();

        let err = encode(&registry, "users", json!({"name": "x"}), &EncodeOptions::new(), 8)
            .await
            .unwrap_err();
        assert!(matches!(err, EncodeError::MissingId { ref field, .. } if field == "_id"));

        let err = encode(&registry, "users", json!({"_id": [1]}), &EncodeOptions::new(), 8)
            .await
            .unwrap_err();
        assert!(matches!(err, EncodeError::InvalidData { .. }));

        let err = encode(&registry, "users", json!([[1]]), &EncodeOptions::new(), 8)
            .await
            .unwrap_err();
        assert!(matches!(err, EncodeError::InvalidData { .. }));
    }

    #[tokio::test]
    async fn test_scalar_related_values_become_linkage() {
        let mut registry = Registry::new();
        registry
            .define(
                "books",
                DEFAULT_SCHEMA,
                SchemaOptions::new()
                    .relationship("author", RelationshipSpec::new("authors"))
                    .relationship("editor", RelationshipSpec::new("authors")),
            )
            .unwrap();
        registry
            .define("authors", DEFAULT_SCHEMA, SchemaOptions::new().id("_id"))
            .unwrap();

        let data = json!({"id": "b1", "title": "t", "author": 7, "editor": null});
        let document = encode(&registry, "books", data, &EncodeOptions::new(), 8)
            .await
            .unwrap();

        let book = &document.data.as_slice()[0];
        assert_eq!(book.relationships["author"].data.identifiers()[0].id, "7");
        assert_eq!(book.relationships["editor"].data, Linkage::Null);
        assert!(document.included.is_empty());
    }

    #[tokio::test]
    async fn test_scalar_related_value_with_nested_id_field() {
        let mut registry = Registry::new();
        registry
            .define(
                "books",
                DEFAULT_SCHEMA,
                SchemaOptions::new().relationship("author", RelationshipSpec::new("authors")),
            )
            .unwrap();
        registry
            .define("authors", DEFAULT_SCHEMA, SchemaOptions::new().id("key.id"))
            .unwrap();

        let document = encode(
            &registry,
            "books",
            json!({"id": 1, "author": 7}),
            &EncodeOptions::new(),
            8,
        )
        .await
        .unwrap();
        let book = &document.data.as_slice()[0];
        assert_eq!(book.relationships["author"].data.identifiers()[0].id, "7");
        assert!(document.included.is_empty());

        let document = encode(
            &registry,
            "books",
            json!({"id": 1, "author": {"key": {"id": 7, "kind": "x"}, "name": "a"}}),
            &EncodeOptions::new(),
            8,
        )
        .await
        .unwrap();
        let author = &document.included[0];
        assert_eq!(author.id, "7");
        assert_eq!(Value::Object(author.attributes.clone()), json!({"key": {"kind": "x"}, "name": "a"}));
    }

    #[tokio::test]
    async fn test_minimize_payload_resolution() {
        let mut registry = Registry::new();
        registry
            .define(
                "books",
                DEFAULT_SCHEMA,
                SchemaOptions::new()
                    .minimize_payload(true)
                    .relationship("author", RelationshipSpec::new("authors")),
            )
            .unwrap();
        registry
            .define("authors", DEFAULT_SCHEMA, SchemaOptions::new())
            .unwrap();

        let data = json!({"id": 1, "author": 2});
        let document = encode(&registry, "books", data.clone(), &EncodeOptions::new(), 8)
            .await
            .unwrap();
        assert!(document.minimize_payload);
        let wire = serde_json::to_value(&document).unwrap();
        assert_eq!(
            wire["data"],
            json!({"type": "books", "id": "1", "relationships": {"author": {"data": {"type": "authors", "id": "2"}}}})
        );

        let options = EncodeOptions::new().minimize_payload(false);
        let document = encode(&registry, "books", data, &options, 8).await.unwrap();
        assert!(!document.minimize_payload);
        let wire = serde_json::to_value(&document).unwrap();
        assert_eq!(wire["data"]["attributes"], json!({}));
        assert_eq!(wire["data"]["relationships"]["author"]["links"], json!({}));
    }

    #[tokio::test]
    async fn test_dotted_relationship_and_target_collection_hook() {
        let hook: CollectionHook = CollectionHook::sync(|(items, ctx): (Vec<Value>, ResolveContext)| {
            let limit = ctx.request().get("limit").and_then(Value::as_u64).unwrap_or(10);
            Ok(items.into_iter().take(limit as usize).collect())
        });

        let mut registry = Registry::new();
        registry
            .define(
                "libraries",
                DEFAULT_SCHEMA,
                SchemaOptions::new()
                    .relationship("address.city", RelationshipSpec::new("cities"))
                    .relationship("books", RelationshipSpec::new("books").include(false)),
            )
            .unwrap();
        registry
            .define("cities", DEFAULT_SCHEMA, SchemaOptions::new())
            .unwrap();
        registry
            .define("books", DEFAULT_SCHEMA, SchemaOptions::new().process_collection(hook))
            .unwrap();

        let data = json!({
            "id": 1,
            "address": {"street": "main", "city": {"id": 5, "name": "Sioux Falls"}},
            "books": [{"id": 1, "title": "a"}, {"id": 2, "title": "b"}, {"id": 3, "title": "c"}]
        });
        let options = EncodeOptions::with_request(json!({"limit": 2}));
        let document = encode(&registry, "libraries", data, &options, 8).await.unwrap();

        let library = &document.data.as_slice()[0];
        assert_eq!(
            Value::Object(library.attributes.clone()),
            json!({"address": {"street": "main"}})
        );
        assert_eq!(library.relationships["address.city"].data.identifiers()[0].id, "5");
        assert_eq!(library.relationships["books"].data.identifiers().len(), 2);
        assert_eq!(document.included.len(), 1);
        assert_eq!(document.included[0].resource_type, "cities");
    }

    #[tokio::test]
    async fn test_hook_error_is_kept() {
        let mut registry = Registry::new();
        registry
            .define(
                "users",
                DEFAULT_SCHEMA,
                SchemaOptions::new().process_resource(Hook::deferred(|_record: Value| async {
                    Err(HookError::new("lookup failed").with_status(503))
                })),
            )
            .unwrap();

        let err = encode(&registry, "users", json!({"id": 1}), &EncodeOptions::new(), 8)
            .await
            .unwrap_err();
        match err {
            EncodeError::Hook(hook) => assert_eq!(hook.status(), Some(503)),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_relationship_links_see_parent() {
        let mut registry = Registry::new();
        registry
            .define(
                "users",
                DEFAULT_SCHEMA,
                SchemaOptions::new()
                    .option("baseUrl", "/api")
                    .relationship(
                        "groups",
                        RelationshipSpec::new("groups").link(
                            "related",
                            Resolver::sync(|ctx| {
                                let base = ctx
                                    .option("baseUrl")
                                    .and_then(Value::as_str)
                                    .unwrap_or("")
                                    .to_string();
                                let id = ctx.resource.map(|r| r.id).unwrap_or_default();
                                Ok(Some(json!(format!("{base}/users/{id}/groups"))))
                            }),
                        ),
                    ),
            )
            .unwrap();
        registry
            .define("groups", DEFAULT_SCHEMA, SchemaOptions::new())
            .unwrap();

        let data = json!({"id": 9, "groups": [{"id": 1, "name": "admins"}]});
        let document = encode(&registry, "users", data, &EncodeOptions::new(), 8)
            .await
            .unwrap();

        let user = &document.data.as_slice()[0];
        assert_eq!(user.relationships["groups"].links["related"], "/api/users/9/groups");
    }
}
