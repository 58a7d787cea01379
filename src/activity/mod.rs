//! The activity execution contract and the permission guard handed to
//! running activities.

mod builtin;

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

use crate::evaluate::authorize;
use crate::types::{
    Decision, EvaluationCondition, Instance, InputScope, OutputScope, PermissionRecord,
    RequiredPermission,
};

pub use builtin::{core_activities, ExecCmd, PrintToConsole, ReadFile, WriteFile};

/// Unexpected failure raised from inside [`Activity::run`].
#[derive(Debug, Error)]
pub enum ActivityFault {
    #[error("permission denied: {request}")]
    PermissionDenied { request: RequiredPermission },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// A unit of execution with a typed input/output contract.
///
/// Domain problems (missing or mistyped input) are reported as an output
/// carrying the reserved `"error"` key; everything else is an
/// [`ActivityFault`].
pub trait Activity: Send + Sync {
    fn identifier(&self) -> &str;

    /// Execute the activity. Every resource access must be announced to
    /// `guard` first.
    ///
    /// # Errors
    ///
    /// Any [`ActivityFault`] raised while executing.
    fn run(&self, input: &InputScope, guard: &PermissionGuard) -> Result<OutputScope, ActivityFault>;
}

/// Constructor registered for an in-process activity.
pub type ActivityFactory = fn() -> Arc<dyn Activity>;

/// Security manager for one invocation: decides every capability an
/// activity exercises against the aggregated policy conditions.
#[derive(Debug, Default)]
pub struct PermissionGuard {
    conditions: Vec<EvaluationCondition>,
    log: Mutex<Vec<PermissionRecord>>,
}

impl PermissionGuard {
    #[must_use]
    pub fn new(conditions: Vec<EvaluationCondition>) -> Self {
        Self {
            conditions,
            log: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn conditions(&self) -> &[EvaluationCondition] {
        &self.conditions
    }

    /// Ask for a capability.
    ///
    /// # Errors
    ///
    /// [`ActivityFault::PermissionDenied`] when the policies do not allow it.
    pub fn check(&self, request: RequiredPermission) -> Result<(), ActivityFault> {
        let decision = authorize(&self.conditions, &request);
        debug!(%request, ?decision, "capability checked");
        self.log.lock().push(PermissionRecord {
            request: request.clone(),
            decision,
        });
        match decision {
            Decision::Allow => Ok(()),
            Decision::Deny => Err(ActivityFault::PermissionDenied { request }),
        }
    }

    /// Every check made so far, in order.
    #[must_use]
    pub fn into_log(self) -> Vec<PermissionRecord> {
        self.log.into_inner()
    }
}

/// Fetch a typed input, or describe why it is unusable.
///
/// The message is meant for [`OutputScope::failure`].
///
/// # Errors
///
/// A human-readable message naming the key.
pub fn required_input<'a>(
    input: &'a InputScope,
    key: &str,
    expected: &str,
) -> Result<&'a Instance, String> {
    let value = input
        .get(key)
        .ok_or_else(|| format!("missing input '{key}'"))?;
    if value.has_type(expected) {
        Ok(value)
    } else {
        Err(format!(
            "input '{key}' has type '{}', expected '{expected}'",
            value.type_identifier()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MatchingStrategy, PermissionType, TypeIdentifier};

    #[test]
    fn guard_logs_every_check() {
        let guard = PermissionGuard::new(vec![EvaluationCondition::grant(
            PermissionType::ReadFile,
            "/data",
            MatchingStrategy::PathSubdir,
        )]);
        assert!(guard
            .check(RequiredPermission::new(PermissionType::ReadFile, "/data/x"))
            .is_ok());
        let denied = guard
            .check(RequiredPermission::new(PermissionType::ReadFile, "/etc/x"))
            .unwrap_err();
        assert_eq!(denied.to_string(), "permission denied: READ_FILE(/etc/x)");
        let log = guard.into_log();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].decision, Decision::Allow);
        assert_eq!(log[1].decision, Decision::Deny);
    }

    #[test]
    fn required_input_messages() {
        let input = InputScope::new().with("n", Instance::new(TypeIdentifier::core("Text"), "1"));
        assert_eq!(
            required_input(&input, "url", "core.URL").unwrap_err(),
            "missing input 'url'"
        );
        assert_eq!(
            required_input(&input, "n", "core.UnsignedInt").unwrap_err(),
            "input 'n' has type 'core.Text', expected 'core.UnsignedInt'"
        );
    }
}
