//! Error types for schema normalization, tree building, path handling and
//! array mutation.
//!
//! Every fatal condition is a configuration or programming error: they are
//! raised synchronously while normalizing/building, or when a caller hands
//! in a malformed path, and are never retried. Recoverable conditions
//! (JSON-in-string parse failures, template evaluation problems, external
//! `$ref`s) are logged and handled where they occur.

use thiserror::Error;

/// Unified error type for the `form_tree` crate.
#[derive(Error, Debug)]
pub enum FormError {
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("layout error: {0}")]
    Layout(#[from] LayoutError),

    #[error("path error: {0}")]
    Path(#[from] PathError),

    #[error("array error: {0}")]
    Array(#[from] ArrayError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Problems found in the data schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("the form element references the schema key '{0}' but that key does not exist in the schema")]
    UnknownKey(String),

    #[error("invalid 'required' value at '{path}': expected a boolean or an array, found {found}")]
    MalformedRequired { path: String, found: String },

    #[error("array items must be homogeneous ('{path}' declares {count} tuple items)")]
    HeterogeneousItems { path: String, count: usize },

    #[error("'{key}' resolves to the unresolved reference '{reference}'")]
    UnresolvedRef { key: String, reference: String },

    #[error("schema root must be an object, found {0}")]
    InvalidRoot(String),
}

/// Problems found in the layout description.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("unknown element kind '{0}'")]
    UnknownKind(String),

    #[error("element kind '{kind}' produces an input but has no schema key")]
    MissingKey { kind: String },

    #[error("element kind '{kind}' cannot be bound to '{key}' (schema type {schema_type})")]
    IncompatibleKind {
        kind: String,
        key: String,
        schema_type: String,
    },

    #[error("invalid layout entry: {0}")]
    InvalidEntry(String),
}

/// Problems with key-path syntax or prefixed lookups.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("malformed key path '{path}': {reason}")]
    Malformed { path: String, reason: &'static str },

    #[error("key path '{path}' does not start with '{prefix}'")]
    PrefixMismatch { path: String, prefix: String },

    #[error("key path '{0}' still contains an unresolved array level '[]'")]
    Unresolved(String),
}

/// Rejected array mutations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArrayError {
    #[error("node {0} is not an array-kind node")]
    NotAnArray(usize),

    #[error("node {0} does not exist (it may have been deleted)")]
    UnknownNode(usize),

    #[error("index {index} is out of range for an array of {len} items")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("cannot grow beyond maxItems ({max})")]
    MaxItems { max: usize },

    #[error("cannot shrink below minItems ({min})")]
    MinItems { min: usize },
}

/// A specialized `Result` type for form tree operations.
pub type Result<T, E = FormError> = std::result::Result<T, E>;
