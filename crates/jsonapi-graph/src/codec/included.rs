//! Deduplication of the `included` side-collection.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::model::{Resource, ResourceKey};

/// Collapses `included` to one resource per `(type, id)`.
///
/// Later occurrences are merged over earlier ones field by field; the merged
/// resource keeps the position of the first occurrence. Resources whose key is
/// in `primary` are removed after merging.
pub fn merge_included(included: Vec<Resource>, primary: &[ResourceKey]) -> Vec<Resource> {
    let mut positions: FxHashMap<ResourceKey, usize> = FxHashMap::default();
    let mut merged: Vec<Resource> = Vec::with_capacity(included.len());

    for resource in included {
        let key = resource.key();
        match positions.get(&key) {
            Some(&index) => merged[index].merge(resource),
            None => {
                positions.insert(key, merged.len());
                merged.push(resource);
            }
        }
    }

    let primary: FxHashSet<&ResourceKey> = primary.iter().collect();
    merged.retain(|resource| !primary.contains(&resource.key()));
    merged
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::Value;

    fn resources() -> impl Strategy<Value = Vec<Resource>> {
        prop::collection::vec(
            (prop::sample::select(vec!["books", "authors"]), 0u8..6, "[a-z]{1,4}", any::<i32>()),
            0..40,
        )
        .prop_map(|items| {
            items
                .into_iter()
                .map(|(resource_type, id, field, value)| {
                    let mut resource = Resource::new(resource_type, id.to_string());
                    resource.attributes.insert(field, Value::from(value));
                    resource
                })
                .collect()
        })
    }

    proptest! {
        /// Every key appears once, carrying the union of contributed fields.
        #[test]
        fn merged_keys_unique(included in resources()) {
            let merged = merge_included(included.clone(), &[]);

            let keys: FxHashSet<ResourceKey> = merged.iter().map(Resource::key).collect();
            prop_assert_eq!(keys.len(), merged.len());

            for resource in &included {
                let target = merged.iter().find(|r| r.key() == resource.key());
                prop_assert!(target.is_some());
                if let Some(target) = target {
                    for field in resource.attributes.keys() {
                        prop_assert!(target.attributes.contains_key(field));
                    }
                }
            }
        }

        /// Primary keys never survive in the included set.
        #[test]
        fn primary_excluded(included in resources(), primary_ids in prop::collection::vec(0u8..6, 0..4)) {
            let primary: Vec<ResourceKey> = primary_ids
                .iter()
                .map(|id| ResourceKey::new("books", id.to_string()))
                .collect();
            let merged = merge_included(included, &primary);
            for resource in &merged {
                prop_assert!(!primary.contains(&resource.key()));
            }
        }
    }
}
