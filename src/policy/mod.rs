//! Usage-control policies and the contract the sandbox evaluates them through.

mod authorization;
mod date;
mod file;
mod tags;
mod text;
mod wildcard;

use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::types::{
    ContextSnapshot, EvaluationCondition, Instance, OutputScope, PolicyError, PolicyInputScope,
};

pub use authorization::{RoleConstraint, UsernameConstraint};
pub use date::{UseNotAfter, UseNotBefore};
pub use file::FileConstraint;
pub use tags::TagConstraint;
pub use text::MaxLength;
pub use wildcard::GrantAll;

/// Ambient facts available to one policy evaluation.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationEnv<'a> {
    pub context: &'a ContextSnapshot,
    pub now: NaiveDateTime,
    /// The activity's output; only set for postconditions.
    pub output: Option<&'a OutputScope>,
}

impl<'a> EvaluationEnv<'a> {
    #[must_use]
    pub fn new(context: &'a ContextSnapshot, now: NaiveDateTime) -> Self {
        Self {
            context,
            now,
            output: None,
        }
    }

    #[must_use]
    pub fn with_output(mut self, output: &'a OutputScope) -> Self {
        self.output = Some(output);
        self
    }
}

/// A stateless usage-control rule attached to activity invocations.
///
/// Implementations report problems through [`PolicyError`]; the evaluation
/// wrappers in [`crate::evaluate`] turn every error into a rejection.
pub trait Policy: Send + Sync {
    /// Stable dotted identifier, e.g. `core.MaxLength`.
    fn identifier(&self) -> &str;

    /// Whether the activity may start.
    ///
    /// # Errors
    ///
    /// Any [`PolicyError`]; callers treat it as `false`.
    fn precondition(
        &self,
        input: &PolicyInputScope,
        env: &EvaluationEnv<'_>,
    ) -> Result<bool, PolicyError>;

    /// Capabilities to grant or forbid while the activity runs.
    ///
    /// # Errors
    ///
    /// Any [`PolicyError`]; callers then forbid everything.
    fn intervention(
        &self,
        _input: &PolicyInputScope,
        _env: &EvaluationEnv<'_>,
    ) -> Result<Vec<EvaluationCondition>, PolicyError> {
        Ok(Vec::new())
    }

    /// Whether the finished run is acceptable.
    ///
    /// # Errors
    ///
    /// Any [`PolicyError`]; callers treat it as `false`.
    fn postcondition(
        &self,
        _input: &PolicyInputScope,
        _env: &EvaluationEnv<'_>,
    ) -> Result<bool, PolicyError> {
        Ok(true)
    }

    /// Identifiers used to correlate results across policies.
    fn provide_id(&self, _input: &PolicyInputScope) -> Vec<String> {
        Vec::new()
    }
}

/// Whether a policy requires or forbids the fact it checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Require,
    Deny,
}

impl Mode {
    /// Apply the mode to whether the fact is present.
    #[must_use]
    pub fn accepts(self, present: bool) -> bool {
        match self {
            Self::Require => present,
            Self::Deny => !present,
        }
    }
}

/// Fetch `key` from `input` and check its declared type.
///
/// # Errors
///
/// [`PolicyError::MissingInput`] or [`PolicyError::WrongType`].
pub fn typed_input<'a>(
    input: &'a PolicyInputScope,
    key: &str,
    expected: &str,
) -> Result<&'a Instance, PolicyError> {
    let value = input.get(key).ok_or_else(|| PolicyError::MissingInput {
        key: key.to_owned(),
    })?;
    if !value.has_type(expected) {
        return Err(PolicyError::WrongType {
            key: key.to_owned(),
            expected: expected.to_owned(),
            found: value.type_identifier().to_string(),
        });
    }
    Ok(value)
}

/// All built-in policies.
#[must_use]
pub fn core_policies() -> Vec<Arc<dyn Policy>> {
    let mut policies: Vec<Arc<dyn Policy>> = vec![
        Arc::new(MaxLength),
        Arc::new(UseNotBefore),
        Arc::new(UseNotAfter),
        Arc::new(GrantAll),
        Arc::new(UsernameConstraint::require()),
        Arc::new(UsernameConstraint::deny()),
        Arc::new(RoleConstraint::require_os()),
        Arc::new(RoleConstraint::deny_os()),
        Arc::new(RoleConstraint::require_jwt()),
        Arc::new(RoleConstraint::deny_jwt()),
        Arc::new(TagConstraint::require()),
        Arc::new(TagConstraint::deny()),
    ];
    policies.extend(
        FileConstraint::all()
            .into_iter()
            .map(|p| Arc::new(p) as Arc<dyn Policy>),
    );
    policies
}
