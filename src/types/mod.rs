mod ast;
mod container;
mod context;
mod error;
mod permission;
mod position;
mod report;
mod scope;
mod value;

pub use ast::{Ast, Comparator, LogicalOp, Node, NodeId, NodeKind, NodeRef};
pub use container::ExecutionContainer;
pub use context::{
    ContextSnapshot, Entity, EntityKind, ExecutionContext, Module, JWT_USER_INFORMATION,
    NO_VALUE, OS_USER_INFORMATION, TAGS_MODULE, USERNAME, USERROLES, USER_INFORMATION,
};
pub use error::{
    ConfigError, ContextError, InvariantViolation, PolicyError, PositionError, RegistryError,
    ScopeError, ValueError,
};
pub use permission::{
    normalize_path, Decision, EvaluationCondition, MatchOutcome, MatchingStrategy,
    PermissionType, RequiredPermission, ALL_FILES,
};
pub use position::{Point, Position, Relation};
pub use report::{ActivityFailure, FailureKind, InvocationReport, PermissionRecord, RunReport};
pub use scope::{
    Input, InputScope, Output, OutputScope, PolicyInput, PolicyInputScope, Scope, ScopeKind,
    ERROR_KEY,
};
pub use value::{
    CoreTaxonomy, Instance, PrimitiveKind, TypeIdentifier, TypeTaxonomy,
    PATH_MATCHING_STRATEGIES,
};
