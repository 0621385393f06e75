//! Decoded per-type record collections.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

/// Records of one type: a single record until a second one arrives.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GraphEntry {
    One(Value),
    Many(Vec<Value>),
}

impl GraphEntry {
    /// Returns the records as a slice.
    pub fn records(&self) -> &[Value] {
        match self {
            GraphEntry::One(record) => std::slice::from_ref(record),
            GraphEntry::Many(records) => records,
        }
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }

    pub fn as_one(&self) -> Option<&Value> {
        match self {
            GraphEntry::One(record) => Some(record),
            GraphEntry::Many(_) => None,
        }
    }

    pub fn as_many(&self) -> Option<&[Value]> {
        match self {
            GraphEntry::One(_) => None,
            GraphEntry::Many(records) => Some(records),
        }
    }

    fn push(&mut self, record: Value) {
        match self {
            GraphEntry::One(existing) => {
                let first = std::mem::take(existing);
                *self = GraphEntry::Many(vec![first, record]);
            }
            GraphEntry::Many(records) => records.push(record),
        }
    }
}

/// Type-keyed collections produced by decoding a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DeserializedGraph {
    types: BTreeMap<String, GraphEntry>,
}

impl DeserializedGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, resource_type: &str) -> Option<&GraphEntry> {
        self.types.get(resource_type)
    }

    /// Returns the records of a type, or an empty slice.
    pub fn records(&self, resource_type: &str) -> &[Value] {
        self.types
            .get(resource_type)
            .map(GraphEntry::records)
            .unwrap_or(&[])
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Appends a record, promoting a single entry to a list on the second one.
    pub(crate) fn push(&mut self, resource_type: &str, record: Value) {
        match self.types.get_mut(resource_type) {
            Some(entry) => entry.push(record),
            None => {
                self.types
                    .insert(resource_type.to_string(), GraphEntry::One(record));
            }
        }
    }

    /// Converts the graph into a JSON object keyed by type.
    pub fn into_value(self) -> Value {
        Value::Object(
            self.types
                .into_iter()
                .map(|(resource_type, entry)| {
                    let value = match entry {
                        GraphEntry::One(record) => record,
                        GraphEntry::Many(records) => Value::Array(records),
                    };
                    (resource_type, value)
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_promotes_on_second_record() {
        let mut graph = DeserializedGraph::new();
        graph.push("people", json!("2"));
        assert_eq!(graph.get("people").and_then(GraphEntry::as_one), Some(&json!("2")));

        graph.push("people", json!("3"));
        graph.push("people", json!("4"));
        assert_eq!(graph.records("people"), &[json!("2"), json!("3"), json!("4")]);
        assert!(graph.get("people").and_then(GraphEntry::as_many).is_some());
    }

    #[test]
    fn test_into_value() {
        let mut graph = DeserializedGraph::new();
        graph.push("people", json!("12"));
        assert_eq!(graph.clone().into_value(), json!({"people": "12"}));
        assert_eq!(serde_json::to_value(&graph).unwrap(), json!({"people": "12"}));
        assert!(DeserializedGraph::new().into_value().as_object().unwrap().is_empty());
    }
}
