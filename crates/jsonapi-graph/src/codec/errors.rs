//! Normalization of arbitrary failures into error documents.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DecodeError, EncodeError, ErrorCode, HookError, SchemaError};
use crate::model::{ErrorDocument, ErrorObject, ErrorSource};
use crate::validate::validate_error_object;

const DEFAULT_STATUS: u16 = 500;

/// Anything that can be turned into an error document.
#[derive(Debug)]
pub enum ErrorInput {
    /// A bare HTTP status.
    Status(u16),
    /// A message used as the error detail.
    Message(String),
    /// A JSON value: a status number, a message, an error object, an
    /// aggregate `{ "errors": [...] }`, or any other object.
    Json(Value),
    /// Any other error; its `Display` output becomes the detail.
    Error(Box<dyn std::error::Error + Send + Sync>),
    Encode(EncodeError),
    Decode(DecodeError),
    Schema(SchemaError),
    Hook(HookError),
}

impl ErrorInput {
    /// Wraps an arbitrary error value.
    pub fn error<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ErrorInput::Error(Box::new(err))
    }
}

impl From<u16> for ErrorInput {
    fn from(status: u16) -> Self {
        ErrorInput::Status(status)
    }
}

impl From<&str> for ErrorInput {
    fn from(message: &str) -> Self {
        ErrorInput::Message(message.to_string())
    }
}

impl From<String> for ErrorInput {
    fn from(message: String) -> Self {
        ErrorInput::Message(message)
    }
}

impl From<Value> for ErrorInput {
    fn from(value: Value) -> Self {
        ErrorInput::Json(value)
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for ErrorInput {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        ErrorInput::Error(err)
    }
}

impl From<EncodeError> for ErrorInput {
    fn from(err: EncodeError) -> Self {
        ErrorInput::Encode(err)
    }
}

impl From<DecodeError> for ErrorInput {
    fn from(err: DecodeError) -> Self {
        ErrorInput::Decode(err)
    }
}

impl From<SchemaError> for ErrorInput {
    fn from(err: SchemaError) -> Self {
        ErrorInput::Schema(err)
    }
}

impl From<HookError> for ErrorInput {
    fn from(err: HookError) -> Self {
        ErrorInput::Hook(err)
    }
}

/// Builds an error document from `input`.
///
/// `meta` is attached to every error the normalizer creates; `status`
/// replaces the default status of 500 for errors that carry none of their
/// own. The document's `meta.status` is the most frequent status among its
/// errors, the lowest one on a tie.
pub fn serialize_error(
    input: impl Into<ErrorInput>,
    meta: Option<Map<String, Value>>,
    status: Option<u16>,
) -> ErrorDocument {
    let normalizer = Normalizer { meta, status };
    let mut errors = normalizer.normalize(input.into());
    if errors.is_empty() {
        errors.push(normalizer.coded(ErrorCode::Unknown, "no errors were reported".to_string()));
    }

    let mut document_meta = Map::new();
    if let Some(status) = dominant_status(&errors) {
        document_meta.insert("status".to_string(), Value::from(status));
    }
    debug!(errors = errors.len(), status = ?document_meta.get("status"), "error document built");

    ErrorDocument {
        errors,
        meta: document_meta,
    }
}

struct Normalizer {
    meta: Option<Map<String, Value>>,
    status: Option<u16>,
}

impl Normalizer {
    fn default_status(&self) -> u16 {
        self.status.unwrap_or(DEFAULT_STATUS)
    }

    fn created(&self, status: u16, detail: Option<String>) -> ErrorObject {
        ErrorObject {
            id: Some(Uuid::new_v4().to_string()),
            status: status.to_string(),
            detail,
            meta: self.meta.clone(),
            ..ErrorObject::default()
        }
    }

    fn coded(&self, code: ErrorCode, detail: String) -> ErrorObject {
        ErrorObject {
            code: Some(code.code().to_string()),
            title: Some(code.title().to_string()),
            ..self.created(self.status.unwrap_or(code.status()), Some(detail))
        }
    }

    fn normalize(&self, input: ErrorInput) -> Vec<ErrorObject> {
        match input {
            ErrorInput::Status(status) => vec![self.created(status, None)],
            ErrorInput::Message(message) => vec![self.created(self.default_status(), Some(message))],
            ErrorInput::Json(value) => self.normalize_json(value),
            ErrorInput::Error(err) => {
                vec![self.created(self.default_status(), Some(err.to_string()))]
            }
            ErrorInput::Encode(EncodeError::Hook(err)) | ErrorInput::Hook(err) => {
                vec![self.hook(err)]
            }
            ErrorInput::Encode(err) => vec![self.coded(err.code(), err.to_string())],
            ErrorInput::Decode(err) => {
                let pointer = match &err {
                    DecodeError::InvalidDocument { .. } => None,
                    DecodeError::InvalidResource { pointer, .. }
                    | DecodeError::InvalidRelationship { pointer, .. } => Some(pointer.clone()),
                };
                let mut object = self.coded(err.code(), err.to_string());
                object.source = pointer.map(|pointer| ErrorSource {
                    pointer: Some(pointer),
                    parameter: None,
                });
                vec![object]
            }
            ErrorInput::Schema(err) => vec![self.coded(err.code(), err.to_string())],
        }
    }

    fn hook(&self, err: HookError) -> ErrorObject {
        let meta = err.meta().cloned().or_else(|| self.meta.clone());
        ErrorObject {
            code: err.code().map(str::to_string),
            title: err.title().map(str::to_string),
            meta,
            ..self.created(
                err.status().unwrap_or(self.default_status()),
                Some(err.detail().to_string()),
            )
        }
    }

    fn normalize_json(&self, value: Value) -> Vec<ErrorObject> {
        match value {
            Value::Number(number) => {
                let status = number
                    .as_u64()
                    .and_then(|status| u16::try_from(status).ok())
                    .unwrap_or(self.default_status());
                vec![self.created(status, None)]
            }
            Value::String(message) => vec![self.created(self.default_status(), Some(message))],
            Value::Object(mut object) => match object.remove("errors") {
                Some(Value::Array(errors)) => errors
                    .into_iter()
                    .flat_map(|error| self.normalize_json(error))
                    .collect(),
                Some(other) => {
                    object.insert("errors".to_string(), other);
                    vec![self.wrapped(object)]
                }
                None => {
                    let value = Value::Object(object);
                    if validate_error_object(&value) {
                        vec![self.conforming(value)]
                    } else if let Value::Object(object) = value {
                        vec![self.wrapped(object)]
                    } else {
                        Vec::new()
                    }
                }
            },
            other => vec![self.created(self.default_status(), Some(other.to_string()))],
        }
    }

    /// Passes an error object through, coercing status and code to strings.
    fn conforming(&self, value: Value) -> ErrorObject {
        let text = |value: &Value| match value {
            Value::String(text) => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        };
        let object = |value: Option<&Value>| value.and_then(Value::as_object).cloned();

        let status = value
            .get("status")
            .and_then(text)
            .unwrap_or_else(|| self.default_status().to_string());
        let source = value
            .get("source")
            .and_then(|source| serde_json::from_value::<ErrorSource>(source.clone()).ok());

        ErrorObject {
            id: value
                .get("id")
                .and_then(text)
                .or_else(|| Some(Uuid::new_v4().to_string())),
            status,
            code: value.get("code").and_then(text),
            title: value.get("title").and_then(text),
            detail: value.get("detail").and_then(text),
            source,
            links: object(value.get("links")),
            meta: object(value.get("meta")).or_else(|| self.meta.clone()),
        }
    }

    /// Wraps a non-conforming object, using `message` or `error` as detail.
    fn wrapped(&self, object: Map<String, Value>) -> ErrorObject {
        let detail = ["message", "error"]
            .into_iter()
            .find_map(|key| object.get(key).and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| Value::Object(object.clone()).to_string());
        self.created(self.default_status(), Some(detail))
    }
}

fn dominant_status(errors: &[ErrorObject]) -> Option<u16> {
    let mut counts: BTreeMap<u16, usize> = BTreeMap::new();
    for status in errors.iter().filter_map(ErrorObject::status_code) {
        *counts.entry(status).or_default() += 1;
    }

    let mut best: Option<(u16, usize)> = None;
    for (status, count) in counts {
        if best.is_none_or(|(_, best_count)| count > best_count) {
            best = Some((status, count));
        }
    }
    best.map(|(status, _)| status)
}
