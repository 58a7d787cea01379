//! Fail-closed policy evaluation and permission aggregation.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, warn};

use crate::policy::{EvaluationEnv, Policy};
use crate::types::{
    Decision, EvaluationCondition, MatchOutcome, PermissionType, PolicyError, PolicyInputScope,
    RequiredPermission,
};

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

fn guarded<T>(f: impl FnOnce() -> Result<T, PolicyError>) -> Result<T, PolicyError> {
    catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Err(PolicyError::Panicked(panic_message(payload.as_ref()))))
}

/// Run a policy's precondition. Errors and panics count as rejection.
#[must_use]
pub fn accept_precondition(
    policy: &dyn Policy,
    input: &PolicyInputScope,
    env: &EvaluationEnv<'_>,
) -> bool {
    match guarded(|| policy.precondition(input, env)) {
        Ok(accepted) => {
            debug!(policy = policy.identifier(), accepted, "precondition evaluated");
            accepted
        }
        Err(e) => {
            warn!(policy = policy.identifier(), error = %e, "precondition failed closed");
            false
        }
    }
}

/// Collect a policy's intervention. Errors and panics yield a single
/// condition forbidding every capability.
#[must_use]
pub fn evaluate_security_manager_intervention(
    policy: &dyn Policy,
    input: &PolicyInputScope,
    env: &EvaluationEnv<'_>,
) -> Vec<EvaluationCondition> {
    match guarded(|| policy.intervention(input, env)) {
        Ok(conditions) => conditions,
        Err(e) => {
            warn!(policy = policy.identifier(), error = %e, "intervention failed closed");
            vec![EvaluationCondition::deny_all()]
        }
    }
}

/// Run a policy's postcondition. Errors and panics count as rejection.
#[must_use]
pub fn accept_postcondition(
    policy: &dyn Policy,
    input: &PolicyInputScope,
    env: &EvaluationEnv<'_>,
) -> bool {
    match guarded(|| policy.postcondition(input, env)) {
        Ok(accepted) => {
            debug!(policy = policy.identifier(), accepted, "postcondition evaluated");
            accepted
        }
        Err(e) => {
            warn!(policy = policy.identifier(), error = %e, "postcondition failed closed");
            false
        }
    }
}

/// Decide one request against the union of all granted conditions.
///
/// `GrantAll` requests are always denied. Any matching forbid denies;
/// otherwise one matching grant allows; with no match the request is denied.
#[must_use]
pub fn authorize(conditions: &[EvaluationCondition], request: &RequiredPermission) -> Decision {
    if request.permission == PermissionType::GrantAll {
        return Decision::Deny;
    }

    let mut granted = false;
    for condition in conditions {
        match condition.evaluate(request) {
            MatchOutcome::Forbid => {
                debug!(%request, %condition, "forbidden");
                return Decision::Deny;
            }
            MatchOutcome::Grant => granted = true,
            MatchOutcome::NoMatch => {}
        }
    }

    if granted {
        Decision::Allow
    } else {
        debug!(%request, "no condition grants the request");
        Decision::Deny
    }
}
