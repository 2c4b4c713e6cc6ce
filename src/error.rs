//! Unified error types for idlgen using thiserror
//!
//! Errors fall into three disjoint domains: configuration errors (fatal
//! before any generation starts), per-operation generation errors (reported
//! and skipped), and internal invariant violations (generator defects,
//! always fatal).

use thiserror::Error;

/// Top-level error type
#[derive(Error, Debug)]
pub enum IdlError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("interface description error: {0}")]
    Description(#[from] DescriptionError),

    #[error("internal error while generating '{operation}': {violation}")]
    Internal {
        operation: String,
        violation: InvariantViolation,
    },

    #[error("emission error: {0}")]
    Emit(#[from] EmitError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unknown backend '{0}' (expected native-v2, native-v4 or socket)")]
    UnknownBackend(String),

    #[error("unknown sort policy '{0}' (expected declaration, ascending-size or descending-size)")]
    UnknownSortPolicy(String),

    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Errors in an interface description that prevent reading it at all
#[derive(Error, Debug)]
pub enum DescriptionError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("malformed interface description: {0}")]
    Syntax(#[from] toml::de::Error),

    #[error("interface name must not be empty")]
    MissingName,

    #[error("interface name '{0}' cannot be used as a file name")]
    InvalidName(String),
}

/// A per-operation generation error, tagged with the operation it belongs to
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("operation '{operation}': {kind}")]
pub struct OperationError {
    pub operation: String,
    pub kind: OperationErrorKind,
}

impl OperationError {
    pub fn new(operation: impl Into<String>, kind: OperationErrorKind) -> Self {
        Self {
            operation: operation.into(),
            kind,
        }
    }
}

/// Per-operation generation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperationErrorKind {
    #[error("parameter '{param}' is a resource page, which the {backend} backend cannot transfer")]
    UnsupportedParameterKind { param: String, backend: String },

    #[error("variable tail is ambiguous: '{first}' is implicitly sized but '{second}' follows it")]
    AmbiguousVariableTail { first: String, second: String },

    #[error("{count} resource pages in one message direction (max {max})")]
    TooManyResourcePages { count: usize, max: usize },

    #[error("message needs at least {size} bytes (max {max})")]
    MessageTooLarge { size: u64, max: u32 },

    #[error("parameter '{param}' refers to undefined type '{type_name}'")]
    UnresolvedType { param: String, type_name: String },

    #[error("type '{0}' is defined in terms of itself")]
    RecursiveType(String),

    #[error("parameter '{param}' has an invalid type: {reason}")]
    InvalidParameterType { param: String, reason: String },

    #[error("parameter '{0}' is declared more than once")]
    DuplicateParameter(String),

    #[error("discriminator {base} + {index} does not fit in 32 bits")]
    DiscriminatorOverflow { base: u32, index: usize },

    #[error("discriminator {id} is already used by '{other}'")]
    DuplicateDiscriminator { id: u32, other: String },

    #[error("oneway operations have no reply, so a {0} function cannot be generated")]
    NoReplyForOneway(String),
}

/// Generator defects. Never reported as an ordinary per-operation error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("offset of '{param}' needed as a constant but the cursor is at runtime offset '{var}'")]
    UnresolvedCursor { param: String, var: String },

    #[error("resource slot for '{param}' at {offset}..{end} overlaps {region}")]
    ResourceSlotCollision {
        param: String,
        offset: u32,
        end: u32,
        region: String,
    },

    #[error("cursor at {at} cannot advance {by} bytes")]
    OffsetOverflow { at: u32, by: u32 },

    #[error("parameter '{0}' appears more than once in a wire layout")]
    DuplicatePlacement(String),

    #[error("receive step at position {receive} precedes the send error check at {check}")]
    ReceiveBeforeSendCheck { receive: usize, check: usize },

    #[error("split reply/receive has {0} buffer clears between its invokes (expected 1)")]
    BufferClearCount(usize),

    #[error("{variant} step tree has {found} invoke steps (expected {expected})")]
    InvokeCount {
        variant: String,
        found: usize,
        expected: usize,
    },
}

/// Per-operation failures surfaced by the layout engine and assembler
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerateError {
    #[error(transparent)]
    Operation(#[from] OperationErrorKind),

    #[error(transparent)]
    Internal(#[from] InvariantViolation),
}

/// Emission adapter errors
#[derive(Error, Debug)]
pub enum EmitError {
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("formatting error: {0}")]
    Fmt(#[from] std::fmt::Error),
}
