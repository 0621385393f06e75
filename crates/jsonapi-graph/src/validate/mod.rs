//! Structural validation for incoming documents.
//!
//! Decoding validates the whole document before any hydration starts, so a
//! malformed resource deep in `included` rejects the call up front.

use serde_json::{Map, Value};

use crate::error::DecodeError;

const RESOURCE_KEYS: &[&str] = &["id", "type", "attributes", "relationships", "links", "meta"];
const LINKAGE_KEYS: &[&str] = &["id", "type", "attributes", "links", "meta"];
const ERROR_KEYS: &[&str] = &["status", "code", "title", "detail"];

/// Validates the shape of a resource document.
///
/// - the document is an object with a `data` member;
/// - `data` is `null`, a resource object or an array of resource objects;
/// - `included`, when present, is an array of resources with ids;
/// - every relationship `data` is `null`, a linkage object or an array of them.
pub fn validate_document(document: &Value) -> Result<(), DecodeError> {
    let Some(document) = document.as_object() else {
        return Err(DecodeError::InvalidDocument {
            detail: "document must be an object".to_string(),
        });
    };

    let data = document.get("data").ok_or_else(|| DecodeError::InvalidDocument {
        detail: "`data` is required".to_string(),
    })?;
    match data {
        Value::Null => {}
        Value::Object(resource) => validate_resource(resource, "/data", false)?,
        Value::Array(resources) => {
            for (index, resource) in resources.iter().enumerate() {
                let pointer = format!("/data/{index}");
                validate_resource(expect_object(resource, &pointer)?, &pointer, false)?;
            }
        }
        _ => {
            return Err(DecodeError::InvalidDocument {
                detail: "`data` must be null, an object or an array".to_string(),
            });
        }
    }

    match document.get("included") {
        None => {}
        Some(Value::Array(resources)) => {
            for (index, resource) in resources.iter().enumerate() {
                let pointer = format!("/included/{index}");
                validate_resource(expect_object(resource, &pointer)?, &pointer, true)?;
            }
        }
        Some(_) => {
            return Err(DecodeError::InvalidDocument {
                detail: "`included` must be an array".to_string(),
            });
        }
    }

    for member in ["links", "meta"] {
        if document.get(member).is_some_and(|value| !value.is_object()) {
            return Err(DecodeError::InvalidDocument {
                detail: format!("`{member}` must be an object"),
            });
        }
    }
    Ok(())
}

/// Returns true if `value` has the shape of a single error object.
///
/// At least one of `status`, `code`, `title` or `detail` must be present, and
/// each present member must have the right type.
pub fn validate_error_object(value: &Value) -> bool {
    let Some(object) = value.as_object() else {
        return false;
    };
    if !ERROR_KEYS.iter().any(|key| object.contains_key(*key)) {
        return false;
    }

    let string_like = |key: &str| match object.get(key) {
        None | Some(Value::String(_)) => true,
        Some(Value::Number(_)) => key == "status",
        _ => false,
    };
    let object_like = |key: &str| object.get(key).is_none_or(Value::is_object);

    ["id", "status", "code", "title", "detail"].into_iter().all(string_like)
        && ["source", "links", "meta"].into_iter().all(object_like)
}

fn expect_object<'a>(value: &'a Value, pointer: &str) -> Result<&'a Map<String, Value>, DecodeError> {
    value.as_object().ok_or_else(|| DecodeError::InvalidResource {
        pointer: pointer.to_string(),
        detail: "resource must be an object".to_string(),
    })
}

fn invalid_resource(pointer: &str, detail: impl Into<String>) -> DecodeError {
    DecodeError::InvalidResource {
        pointer: pointer.to_string(),
        detail: detail.into(),
    }
}

fn validate_resource(
    resource: &Map<String, Value>,
    pointer: &str,
    id_required: bool,
) -> Result<(), DecodeError> {
    if let Some(key) = resource.keys().find(|key| !RESOURCE_KEYS.contains(&key.as_str())) {
        return Err(invalid_resource(pointer, format!("unknown member `{key}`")));
    }

    match resource.get("type") {
        Some(Value::String(resource_type)) if !resource_type.is_empty() => {}
        Some(_) => return Err(invalid_resource(pointer, "`type` must be a non-empty string")),
        None => return Err(invalid_resource(pointer, "`type` is required")),
    }

    match resource.get("id") {
        Some(Value::String(_) | Value::Number(_)) => {}
        Some(_) => return Err(invalid_resource(pointer, "`id` must be a string or number")),
        None if id_required => return Err(invalid_resource(pointer, "`id` is required")),
        None => {}
    }

    for member in ["attributes", "links", "meta"] {
        if resource.get(member).is_some_and(|value| !value.is_object()) {
            return Err(invalid_resource(pointer, format!("`{member}` must be an object")));
        }
    }

    match resource.get("relationships") {
        None => Ok(()),
        Some(Value::Object(relationships)) => {
            for (name, relationship) in relationships {
                validate_relationship(name, relationship, pointer)?;
            }
            Ok(())
        }
        Some(_) => Err(invalid_resource(pointer, "`relationships` must be an object")),
    }
}

fn validate_relationship(name: &str, relationship: &Value, pointer: &str) -> Result<(), DecodeError> {
    let invalid = |detail: String| DecodeError::InvalidRelationship {
        pointer: format!("{pointer}/relationships/{name}"),
        relationship: name.to_string(),
        detail,
    };

    let valid_name = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.');
    if !valid_name {
        return Err(invalid("invalid relationship name".to_string()));
    }

    let Some(relationship) = relationship.as_object() else {
        return Err(invalid("relationship must be an object".to_string()));
    };

    match relationship.get("data") {
        None | Some(Value::Null) => Ok(()),
        Some(Value::Array(linkage)) => {
            for (index, item) in linkage.iter().enumerate() {
                validate_linkage(item).map_err(|detail| invalid(format!("data[{index}]: {detail}")))?;
            }
            Ok(())
        }
        Some(item) => validate_linkage(item).map_err(invalid),
    }
}

fn validate_linkage(item: &Value) -> Result<(), String> {
    let Some(item) = item.as_object() else {
        return Err("linkage must be an object".to_string());
    };
    if let Some(key) = item.keys().find(|key| !LINKAGE_KEYS.contains(&key.as_str())) {
        return Err(format!("unknown member `{key}`"));
    }
    match item.get("id") {
        Some(Value::String(_) | Value::Number(_)) => {}
        Some(_) => return Err("`id` must be a string or number".to_string()),
        None => return Err("`id` is required".to_string()),
    }
    match item.get("type") {
        Some(Value::String(resource_type)) if !resource_type.is_empty() => {}
        _ => return Err("`type` must be a non-empty string".to_string()),
    }
    for member in ["attributes", "links", "meta"] {
        if item.get(member).is_some_and(|value| !value.is_object()) {
            return Err(format!("`{member}` must be an object"));
        }
    }
    Ok(())
}
