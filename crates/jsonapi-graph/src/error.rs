//! Error types for schema registration, encoding and decoding.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;

/// Error codes surfaced in error documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// 1: Unclassified failure
    Unknown,
    /// 1001: A hook or resolver failed or produced an unusable value
    InvalidHook,
    /// 1002: No schema registered for a type
    InvalidType,
    /// 1003: Malformed schema or codec options
    InvalidOptions,
    /// 2001: Record could not be turned into a resource
    InvalidData,
    /// 2002: Relationship nesting exceeded the configured depth
    DepthLimit,
    /// 3001: Document or resource failed structural validation
    InvalidDocument,
    /// 3002: Relationship object failed structural validation
    InvalidRelationship,
}

impl ErrorCode {
    /// Returns the error code string (e.g., "1002").
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::Unknown => "1",
            ErrorCode::InvalidHook => "1001",
            ErrorCode::InvalidType => "1002",
            ErrorCode::InvalidOptions => "1003",
            ErrorCode::InvalidData => "2001",
            ErrorCode::DepthLimit => "2002",
            ErrorCode::InvalidDocument => "3001",
            ErrorCode::InvalidRelationship => "3002",
        }
    }

    /// Returns the HTTP status associated with the code.
    pub fn status(&self) -> u16 {
        match self {
            ErrorCode::InvalidDocument | ErrorCode::InvalidRelationship => 400,
            _ => 500,
        }
    }

    /// Returns the short human-readable title for the code.
    pub fn title(&self) -> &'static str {
        match self {
            ErrorCode::Unknown => "An undefined error occurred",
            ErrorCode::InvalidHook => "Invalid hook",
            ErrorCode::InvalidType => "Invalid `type` specified",
            ErrorCode::InvalidOptions => "Invalid `options` specified",
            ErrorCode::InvalidData => "Invalid data passed to serializer",
            ErrorCode::DepthLimit => "Relationship depth limit exceeded",
            ErrorCode::InvalidDocument => "Invalid document",
            ErrorCode::InvalidRelationship => "Invalid relationship",
        }
    }
}

/// Error while registering or resolving a schema.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("[1003] invalid options for `{resource_type}.{schema}`: {detail}")]
    InvalidOptions {
        resource_type: String,
        schema: String,
        detail: String,
    },

    #[error("[1003] malformed schema options: {detail}")]
    MalformedOptions { detail: String },

    #[error("[1003] invalid codec options: {detail}")]
    InvalidCodecOptions { detail: String },

    #[error("[1002] no type defined for `{resource_type}.{schema}`")]
    UnknownType {
        resource_type: String,
        schema: String,
    },
}

impl SchemaError {
    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            SchemaError::InvalidOptions { .. }
            | SchemaError::MalformedOptions { .. }
            | SchemaError::InvalidCodecOptions { .. } => ErrorCode::InvalidOptions,
            SchemaError::UnknownType { .. } => ErrorCode::InvalidType,
        }
    }
}

/// Error while encoding records into a document.
#[derive(Debug, Clone, Error)]
pub enum EncodeError {
    /// A type or relationship target has no registered schema.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("[2001] missing required `{field}` attribute on `{resource_type}` resource")]
    MissingId { resource_type: String, field: String },

    #[error("[2001] invalid data for `{resource_type}`: {detail}")]
    InvalidData {
        resource_type: String,
        detail: String,
    },

    #[error("[2002] relationship depth {depth} exceeds maximum {max} at `{resource_type}`")]
    DepthLimitExceeded {
        resource_type: String,
        depth: usize,
        max: usize,
    },

    /// A caller-supplied hook or resolver failed; the caller's error is kept as-is.
    #[error(transparent)]
    Hook(#[from] HookError),
}

impl EncodeError {
    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            EncodeError::Schema(err) => err.code(),
            EncodeError::MissingId { .. } | EncodeError::InvalidData { .. } => {
                ErrorCode::InvalidData
            }
            EncodeError::DepthLimitExceeded { .. } => ErrorCode::DepthLimit,
            EncodeError::Hook(_) => ErrorCode::InvalidHook,
        }
    }
}

/// Error while decoding a document.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("[3001] invalid document: {detail}")]
    InvalidDocument { detail: String },

    #[error("[3001] invalid resource at {pointer}: {detail}")]
    InvalidResource { pointer: String, detail: String },

    #[error("[3002] invalid relationship `{relationship}` at {pointer}: {detail}")]
    InvalidRelationship {
        pointer: String,
        relationship: String,
        detail: String,
    },
}

impl DecodeError {
    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            DecodeError::InvalidDocument { .. } | DecodeError::InvalidResource { .. } => {
                ErrorCode::InvalidDocument
            }
            DecodeError::InvalidRelationship { .. } => ErrorCode::InvalidRelationship,
        }
    }
}

/// Failure reported by a caller-supplied hook or resolver.
///
/// The codec never rewrites these: status, code and title set here are what
/// ends up in the error document.
#[derive(Clone)]
pub struct HookError {
    status: Option<u16>,
    code: Option<String>,
    title: Option<String>,
    detail: String,
    meta: Option<Map<String, Value>>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl HookError {
    /// Creates a hook error with the given detail message.
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            status: None,
            code: None,
            title: None,
            detail: detail.into(),
            meta: None,
            source: None,
        }
    }

    /// Wraps an arbitrary error, keeping it reachable through `source()`.
    pub fn from_source<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            detail: err.to_string(),
            source: Some(Arc::new(err)),
            ..Self::new(String::new())
        }
    }

    /// Sets the HTTP status reported for this failure.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets an application-specific error code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Sets the error title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Attaches meta information.
    pub fn with_meta(mut self, meta: Map<String, Value>) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }

    pub fn meta(&self) -> Option<&Map<String, Value>> {
        self.meta.as_ref()
    }

    /// Returns the wrapped source error if it is of type `E`.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        self.source.as_deref()?.downcast_ref::<E>()
    }
}

impl fmt::Debug for HookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookError")
            .field("status", &self.status)
            .field("code", &self.code)
            .field("title", &self.title)
            .field("detail", &self.detail)
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

impl fmt::Display for HookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.detail)
    }
}

impl std::error::Error for HookError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|err| err as &(dyn std::error::Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("upstream unavailable")]
    struct Upstream;

    #[test]
    fn test_error_codes() {
        assert_eq!(ErrorCode::InvalidType.code(), "1002");
        assert_eq!(ErrorCode::InvalidDocument.status(), 400);
        assert_eq!(ErrorCode::InvalidData.status(), 500);
    }

    #[test]
    fn test_messages_carry_code_prefix() {
        let err = EncodeError::MissingId {
            resource_type: "users".to_string(),
            field: "_id".to_string(),
        };
        assert!(err.to_string().starts_with("[2001]"));
        assert_eq!(err.code(), ErrorCode::InvalidData);
    }

    #[test]
    fn test_hook_error_keeps_source() {
        let err = HookError::from_source(Upstream).with_status(503);
        assert_eq!(err.detail(), "upstream unavailable");
        assert_eq!(err.status(), Some(503));
        assert!(err.downcast_ref::<Upstream>().is_some());
        assert!(std::error::Error::source(&err).is_some());

        let encode: EncodeError = err.into();
        assert_eq!(encode.to_string(), "upstream unavailable");
        assert!(matches!(encode, EncodeError::Hook(_)));
    }
}
