//! Attribute projection and relationship filtering.
//!
//! Paths are dot-joined keys relative to the record root. Rules:
//! - the id field and every declared relationship path are never attributes;
//! - an exact whitelist match is always admitted;
//! - a blacklisted path excludes itself and everything below it;
//! - with a non-empty whitelist, only paths at or below a whitelisted path are
//!   admitted, plus descent into objects that contain one;
//! - nested objects stay nested and are dropped when nothing inside survives.

use serde_json::{Map, Value};

use crate::schema::SchemaDefinition;

/// Borrowed view of the filter rules of one schema.
#[derive(Debug, Clone, Copy)]
pub struct PathFilter<'a> {
    schema: &'a SchemaDefinition,
}

/// What happens to a declared relationship after filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipMode {
    /// Left out of `relationships` entirely and not traversed.
    Stripped,
    /// Linked; `include` says whether targets go to `included`.
    Linked { include: bool },
}

impl<'a> PathFilter<'a> {
    pub fn new(schema: &'a SchemaDefinition) -> Self {
        Self { schema }
    }

    fn blacklisted(&self, path: &str) -> bool {
        self.schema
            .blacklist
            .iter()
            .any(|rule| path == rule || is_below(path, rule))
    }

    fn whitelisted(&self, path: &str) -> bool {
        self.schema.whitelist.iter().any(|rule| path == rule)
    }

    fn reserved(&self, path: &str) -> bool {
        self.schema.id_field() == Some(path) || self.schema.relationships.contains_key(path)
    }

    /// Whether a leaf value at `path` becomes an attribute.
    fn admits_leaf(&self, path: &str) -> bool {
        if self.reserved(path) {
            return false;
        }
        if self.whitelisted(path) {
            return true;
        }
        if self.blacklisted(path) {
            return false;
        }
        self.schema.whitelist.is_empty()
            || self.schema.whitelist.iter().any(|rule| is_below(path, rule))
    }

    /// Whether to look inside an object value at `path`.
    fn admits_descent(&self, path: &str) -> bool {
        if self.reserved(path) {
            return false;
        }
        // An object holding a whitelisted path is opened even when blacklisted.
        if self.schema.whitelist.iter().any(|rule| is_below(rule, path)) {
            return true;
        }
        self.admits_leaf(path)
    }

    /// Decides the fate of a declared relationship by name.
    ///
    /// A whitelisted relationship is always linked and included; a blacklisted
    /// one, or one missing from a non-empty whitelist, is stripped.
    pub fn relationship(&self, name: &str, include: bool) -> RelationshipMode {
        if self.whitelisted(name) {
            return RelationshipMode::Linked { include: true };
        }
        if self.schema.blacklist.iter().any(|rule| rule == name) || !self.schema.whitelist.is_empty()
        {
            return RelationshipMode::Stripped;
        }
        RelationshipMode::Linked { include }
    }

    /// Projects `record` into an attribute map.
    pub fn project(&self, record: &Map<String, Value>) -> Map<String, Value> {
        self.project_at(record, None)
    }

    fn project_at(&self, record: &Map<String, Value>, prefix: Option<&str>) -> Map<String, Value> {
        let mut attributes = Map::new();
        for (key, value) in record {
            let path = match prefix {
                Some(prefix) => format!("{prefix}.{key}"),
                None => key.clone(),
            };

            match value {
                Value::Object(nested) => {
                    if !self.admits_descent(&path) {
                        continue;
                    }
                    let projected = self.project_at(nested, Some(&path));
                    if !projected.is_empty() {
                        attributes.insert(key.clone(), Value::Object(projected));
                    }
                }
                _ => {
                    if self.admits_leaf(&path) {
                        attributes.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        attributes
    }
}

/// `path` lies strictly below `ancestor`.
fn is_below(path: &str, ancestor: &str) -> bool {
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path.as_bytes()[ancestor.len()] == b'.'
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::schema::{DEFAULT_SCHEMA, SchemaOptions};
    use proptest::prelude::*;

    /// (field name, blacklisted, whitelisted)
    fn fields() -> impl Strategy<Value = Vec<(String, bool, bool)>> {
        prop::collection::btree_map("[a-z]{1,8}", (any::<bool>(), any::<bool>()), 1..12).prop_map(
            |fields| {
                fields
                    .into_iter()
                    .filter(|(name, _)| name != "id")
                    .map(|(name, (black, white))| (name, black, white))
                    .collect()
            },
        )
    }

    proptest! {
        /// Whitelist wins on overlap; a non-empty whitelist excludes the rest.
        #[test]
        fn filter_precedence(fields in fields()) {
            let blacklist: Vec<&str> =
                fields.iter().filter(|f| f.1).map(|f| f.0.as_str()).collect();
            let whitelist: Vec<&str> =
                fields.iter().filter(|f| f.2).map(|f| f.0.as_str()).collect();
            let schema = SchemaDefinition::from_options(
                "things",
                DEFAULT_SCHEMA,
                SchemaOptions::new().blacklist(blacklist).whitelist(whitelist.clone()),
            );
            let record: Map<String, Value> = fields
                .iter()
                .map(|(name, _, _)| (name.clone(), Value::Bool(true)))
                .collect();

            let attributes = PathFilter::new(&schema).project(&record);
            for (name, black, white) in &fields {
                let expected = if *white {
                    true
                } else if !whitelist.is_empty() {
                    false
                } else {
                    !black
                };
                prop_assert_eq!(attributes.contains_key(name), expected, "field {}", name);
            }
        }
    }
}
