//! Decoding resource documents into per-type record collections.
//!
//! Hydration walks the relationship graph depth-first from the primary
//! resources with an explicit stack. Each `(type, id)` is visited at most
//! once, which breaks cycles such as author -> books -> author. Relationship
//! targets are looked up among `included` and primary `data`; a target found
//! nowhere becomes a stub holding only its id.

use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::error::DecodeError;
use crate::model::DeserializedGraph;
use crate::schema::Registry;
use crate::util::set_path;
use crate::validate::validate_document;

/// Options for one decode call.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeOptions {
    /// Render relationship fields as the target's record (one level deep)
    /// instead of an identity object, for relationships with `include` on.
    pub nest_relationships: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Identity {
    Id(String),
    /// A primary resource without an id, keyed by its position in `data`.
    Anonymous(usize),
}

type NodeKey = (String, Identity);

fn resource_type(resource: &Map<String, Value>) -> String {
    resource
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Key of a resource that carries an id; linkage and `included` always do.
fn node_key(resource: &Map<String, Value>) -> Option<NodeKey> {
    let identity = match resource.get("id") {
        Some(Value::String(id)) => Identity::Id(id.clone()),
        Some(Value::Number(id)) => Identity::Id(id.to_string()),
        _ => return None,
    };
    Some((resource_type(resource), identity))
}

/// Key of the primary resource at `position`; id-less ones never merge.
fn primary_key(resource: &Map<String, Value>, position: usize) -> NodeKey {
    node_key(resource).unwrap_or_else(|| (resource_type(resource), Identity::Anonymous(position)))
}

#[derive(Debug)]
struct Edge {
    name: String,
    many: bool,
    targets: Vec<usize>,
}

#[derive(Debug)]
struct Node {
    resource_type: String,
    id: Option<Value>,
    attributes: Map<String, Value>,
    edges: Vec<Edge>,
    hydrated: bool,
}

struct Hydrator<'a> {
    nodes: Vec<Node>,
    index: FxHashMap<NodeKey, usize>,
    lookup: FxHashMap<NodeKey, &'a Map<String, Value>>,
}

impl<'a> Hydrator<'a> {
    /// Indexes full resources; `included` wins over `data` for the same key.
    fn new(primary: &[&'a Map<String, Value>], included: &[&'a Map<String, Value>]) -> Self {
        let mut lookup = FxHashMap::default();
        for &resource in included.iter().chain(primary) {
            if let Some(key) = node_key(resource) {
                lookup.entry(key).or_insert(resource);
            }
        }
        Self {
            nodes: Vec::new(),
            index: FxHashMap::default(),
            lookup,
        }
    }

    fn node(&mut self, key: &NodeKey, id: Option<&Value>) -> usize {
        if let Some(&index) = self.index.get(key) {
            return index;
        }
        let index = self.nodes.len();
        self.nodes.push(Node {
            resource_type: key.0.clone(),
            id: id.cloned(),
            attributes: Map::new(),
            edges: Vec::new(),
            hydrated: false,
        });
        self.index.insert(key.clone(), index);
        index
    }

    fn hydrate(&mut self, primary: &[&'a Map<String, Value>]) {
        // Primary resources come first in their collections, in document order.
        let mut stack: Vec<(NodeKey, &'a Map<String, Value>)> = Vec::with_capacity(primary.len());
        for (position, &resource) in primary.iter().enumerate() {
            let key = primary_key(resource, position);
            self.node(&key, resource.get("id"));
            stack.push((key, resource));
        }
        stack.reverse();

        let mut visited: FxHashSet<NodeKey> = FxHashSet::default();
        while let Some((key, resource)) = stack.pop() {
            if !visited.insert(key.clone()) {
                continue;
            }

            let index = self.node(&key, resource.get("id"));
            let node = &mut self.nodes[index];
            if let Some(Value::Object(attributes)) = resource.get("attributes") {
                node.attributes
                    .extend(attributes.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            node.hydrated = true;
            trace!(resource_type = %key.0, "resource hydrated");

            let Some(Value::Object(relationships)) = resource.get("relationships") else {
                continue;
            };

            let mut pending = Vec::new();
            for (name, relationship) in relationships {
                let (many, references): (bool, Vec<&'a Map<String, Value>>) =
                    match relationship.get("data") {
                        Some(Value::Array(items)) => {
                            (true, items.iter().filter_map(Value::as_object).collect())
                        }
                        Some(Value::Object(item)) => (false, vec![item]),
                        _ => continue,
                    };

                let mut edge = Edge {
                    name: name.clone(),
                    many,
                    targets: Vec::new(),
                };
                for reference in references {
                    let Some(target_key) = node_key(reference) else {
                        continue;
                    };
                    let target = self.node(&target_key, reference.get("id"));

                    let full = self
                        .lookup
                        .get(&target_key)
                        .copied()
                        .or_else(|| reference.contains_key("attributes").then_some(reference));
                    if let Some(full) = full {
                        if !visited.contains(&target_key) {
                            pending.push((target_key.clone(), full));
                        }
                    }

                    if !edge.targets.contains(&target) {
                        edge.targets.push(target);
                    }
                }
                self.nodes[index].edges.push(edge);
            }
            stack.extend(pending.into_iter().rev());
        }
    }

    /// `{ <idField>: id }`, or an empty object for a resource without an id.
    fn identity(&self, node: &Node, registry: &Registry) -> Value {
        let mut record = Map::new();
        if let Some(id) = &node.id {
            set_path(&mut record, registry.id_field(&node.resource_type), id.clone());
        }
        Value::Object(record)
    }

    /// Attributes, id and relationship fields as identity objects.
    fn shallow(&self, node: &Node, registry: &Registry) -> Map<String, Value> {
        let mut record = node.attributes.clone();
        if let Some(id) = &node.id {
            set_path(&mut record, registry.id_field(&node.resource_type), id.clone());
        }
        for edge in &node.edges {
            let value = self.edge_value(edge, |target| self.identity(target, registry));
            set_path(&mut record, &edge.name, value);
        }
        record
    }

    fn edge_value(&self, edge: &Edge, render: impl Fn(&Node) -> Value) -> Value {
        let mut values = edge.targets.iter().map(|&target| render(&self.nodes[target]));
        if edge.many {
            Value::Array(values.collect())
        } else {
            values.next().unwrap_or(Value::Null)
        }
    }

    fn record(&self, node: &Node, registry: &Registry, options: DecodeOptions) -> Value {
        if !node.hydrated {
            return self.identity(node, registry);
        }
        if node.attributes.is_empty() && node.edges.is_empty() {
            if let Some(id) = &node.id {
                return id.clone();
            }
        }

        let mut record = self.shallow(node, registry);
        if options.nest_relationships {
            for edge in &node.edges {
                if !registry.relationship_include(&node.resource_type, &edge.name) {
                    continue;
                }
                let value = self.edge_value(edge, |target| {
                    if target.hydrated {
                        Value::Object(self.shallow(target, registry))
                    } else {
                        self.identity(target, registry)
                    }
                });
                set_path(&mut record, &edge.name, value);
            }
        }
        Value::Object(record)
    }

    fn into_graph(self, registry: &Registry, options: DecodeOptions) -> DeserializedGraph {
        let mut graph = DeserializedGraph::new();
        for node in &self.nodes {
            graph.push(&node.resource_type, self.record(node, registry, options));
        }
        graph
    }
}

/// Validates `document` and flattens it into per-type collections.
///
/// Id fields are named after each type's default schema in `registry`
/// (`id` for unknown types).
pub fn decode_document(
    document: &Value,
    registry: &Registry,
    options: DecodeOptions,
) -> Result<DeserializedGraph, DecodeError> {
    validate_document(document)?;

    let primary: Vec<&Map<String, Value>> = match document.get("data") {
        Some(Value::Object(resource)) => vec![resource],
        Some(Value::Array(resources)) => resources.iter().filter_map(Value::as_object).collect(),
        _ => Vec::new(),
    };
    let included: Vec<&Map<String, Value>> = document
        .get("included")
        .and_then(Value::as_array)
        .map(|resources| resources.iter().filter_map(Value::as_object).collect())
        .unwrap_or_default();
    debug!(
        primary = primary.len(),
        included = included.len(),
        "decode started"
    );

    let mut hydrator = Hydrator::new(&primary, &included);
    hydrator.hydrate(&primary);
    let nodes = hydrator.nodes.len();
    let graph = hydrator.into_graph(registry, options);

    debug!(nodes, types = graph.len(), "decode finished");
    Ok(graph)
}
