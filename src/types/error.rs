use thiserror::Error;

use super::ast::NodeId;
use super::position::Point;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    #[error("position start {start} lies after end {end}")]
    Reversed { start: Point, end: Point },
}

/// A broken structural invariant found by [`Ast::check_invariants`](super::Ast::check_invariants).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("node {parent} references missing child {child}")]
    DanglingChild { parent: NodeId, child: NodeId },

    #[error("node {node} has an inconsistent parent link")]
    ParentMismatch { node: NodeId },

    #[error("child {child} is not contained in the position of its parent {parent}")]
    NotContained { parent: NodeId, child: NodeId },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("invalid type identifier '{identifier}'")]
    InvalidIdentifier { identifier: String },

    #[error("unknown type '{identifier}'")]
    UnknownType { identifier: String },

    #[error("invalid content {content:?} for type '{identifier}': {reason}")]
    InvalidContent {
        identifier: String,
        content: String,
        reason: String,
    },

    #[error("malformed serialized value: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("invalid scope JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("scope JSON must be a flat object")]
    NotAnObject,

    #[error("value of '{key}' must be a serialized string")]
    NotAString { key: String },

    #[error("cannot restore '{key}': {source}")]
    Value {
        key: String,
        #[source]
        source: ValueError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("unknown context module '{name}'")]
    UnknownModule { name: String },

    #[error("unknown entity '{key}' in context module '{module}'")]
    UnknownEntity { module: String, key: String },

    #[error("context path '{path}' must have the form Module.entity")]
    InvalidPath { path: String },

    #[error("entity '{key}' in module '{module}' does not support {operation}")]
    Unsupported {
        module: String,
        key: String,
        operation: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("unknown activity '{identifier}'")]
    UnknownActivity { identifier: String },

    #[error("activity '{identifier}' is already registered")]
    DuplicateActivity { identifier: String },

    #[error("activity '{identifier}' is already resolved to {container}")]
    AlreadyResolved {
        identifier: String,
        container: String,
    },

    #[error("no implementation resolved for activity '{identifier}'")]
    NotResolved { identifier: String },

    #[error("provider cannot load implementation '{implementation}': {reason}")]
    Provider {
        implementation: String,
        reason: String,
    },

    #[error("unknown policy '{identifier}'")]
    UnknownPolicy { identifier: String },

    #[error("policy '{identifier}' is already registered")]
    DuplicatePolicy { identifier: String },
}

/// Reasons a policy evaluation could not reach a decision.
///
/// The sandbox turns every one of these into a rejection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("missing policy input '{key}'")]
    MissingInput { key: String },

    #[error("policy input '{key}' has type '{found}', expected '{expected}'")]
    WrongType {
        key: String,
        expected: String,
        found: String,
    },

    #[error("invalid policy input '{key}': {reason}")]
    InvalidInput { key: String, reason: String },

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("policy evaluation panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unknown execution mode '{value}', expected 'single' or 'periodic'")]
    InvalidExecution { value: String },

    #[error("invalid periodic time '{value}'")]
    InvalidPeriod { value: String },

    #[error("node {node} is not a data app")]
    NotADataApp { node: NodeId },
}
