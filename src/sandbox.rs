//! Per-invocation orchestration of policies around an activity run.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use crate::activity::{ActivityFault, PermissionGuard};
use crate::evaluate::{
    accept_postcondition, accept_precondition, evaluate_security_manager_intervention,
    panic_message,
};
use crate::policy::{EvaluationEnv, Policy};
use crate::registry::{ActivityRegistry, PolicyRegistry};
use crate::types::{
    ActivityFailure, ExecutionContext, FailureKind, InputScope, InvocationReport, OutputScope,
    PermissionRecord, PolicyInputScope, RegistryError, RunReport,
};

/// A policy together with the inputs it is evaluated with.
#[derive(Clone)]
pub struct PolicyBinding {
    pub policy: Arc<dyn Policy>,
    pub input: PolicyInputScope,
}

impl PolicyBinding {
    #[must_use]
    pub fn new(policy: Arc<dyn Policy>, input: PolicyInputScope) -> Self {
        Self { policy, input }
    }

    /// Look `identifier` up in `registry` and attach `input`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::UnknownPolicy`].
    pub fn from_registry(
        registry: &PolicyRegistry,
        identifier: &str,
        input: PolicyInputScope,
    ) -> Result<Self, RegistryError> {
        Ok(Self::new(registry.get(identifier)?, input))
    }

    #[must_use]
    pub fn identifier(&self) -> &str {
        self.policy.identifier()
    }
}

impl fmt::Debug for PolicyBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyBinding")
            .field("policy", &self.policy.identifier())
            .field("input", &self.input)
            .finish()
    }
}

/// One activity call with its input and attached policies.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub activity: String,
    pub input: InputScope,
    pub policies: Vec<PolicyBinding>,
}

impl Invocation {
    #[must_use]
    pub fn new(activity: impl Into<String>, input: InputScope) -> Self {
        Self {
            activity: activity.into(),
            input,
            policies: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn Policy>, input: PolicyInputScope) -> Self {
        self.policies.push(PolicyBinding::new(policy, input));
        self
    }

    #[must_use]
    pub fn with_binding(mut self, binding: PolicyBinding) -> Self {
        self.policies.push(binding);
        self
    }
}

type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// Runs activities from a registry under the policies attached to each call.
#[derive(Clone)]
pub struct Sandbox {
    activities: Arc<ActivityRegistry>,
    context: ExecutionContext,
    clock: Clock,
}

impl Sandbox {
    #[must_use]
    pub fn new(activities: Arc<ActivityRegistry>, context: ExecutionContext) -> Self {
        Self {
            activities,
            context,
            clock: Arc::new(|| chrono::Local::now().naive_local()),
        }
    }

    /// Replace the wall clock used for time-based policies.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Fn() -> NaiveDateTime + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    #[must_use]
    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    #[must_use]
    pub fn activities(&self) -> &ActivityRegistry {
        &self.activities
    }

    /// Evaluate the attached policies and run the activity if they allow it.
    pub fn call_activity(&self, invocation: &Invocation) -> InvocationReport {
        let start = Instant::now();
        let snapshot = self.context.snapshot();
        let env = EvaluationEnv::new(&snapshot, (self.clock)());

        let correlation_ids: Vec<String> = invocation
            .policies
            .iter()
            .flat_map(|b| b.policy.provide_id(&b.input))
            .collect();

        let (outcome, permissions) = self.execute(invocation, &env);
        match &outcome {
            Ok(_) => debug!(activity = %invocation.activity, "invocation succeeded"),
            Err(failure) => warn!(%failure, "invocation failed"),
        }
        InvocationReport::new(
            invocation.activity.clone(),
            outcome,
            correlation_ids,
            permissions,
            start.elapsed(),
        )
    }

    fn execute(
        &self,
        invocation: &Invocation,
        env: &EvaluationEnv<'_>,
    ) -> (Result<OutputScope, ActivityFailure>, Vec<PermissionRecord>) {
        let activity_id = invocation.activity.as_str();
        let fail = |kind: FailureKind, message: String| -> Result<OutputScope, ActivityFailure> {
            Err(ActivityFailure::new(activity_id, kind, message))
        };

        for binding in &invocation.policies {
            if !accept_precondition(binding.policy.as_ref(), &binding.input, env) {
                let message = format!("policy '{}' rejected the invocation", binding.identifier());
                return (fail(FailureKind::PreconditionRejected, message), Vec::new());
            }
        }

        let conditions = invocation
            .policies
            .iter()
            .flat_map(|b| evaluate_security_manager_intervention(b.policy.as_ref(), &b.input, env))
            .collect();
        let guard = PermissionGuard::new(conditions);
        debug!(
            activity = activity_id,
            conditions = guard.conditions().len(),
            "interventions collected"
        );

        let activity = match self.activities.instantiate(activity_id) {
            Ok(activity) => activity,
            Err(e) => return (fail(FailureKind::NotResolved, e.to_string()), Vec::new()),
        };

        let result = catch_unwind(AssertUnwindSafe(|| activity.run(&invocation.input, &guard)));
        let permissions = guard.into_log();
        let output = match result {
            Ok(Ok(output)) => {
                if let Some(message) = output.error() {
                    let message = message.to_owned();
                    return (fail(FailureKind::Domain, message), permissions);
                }
                output
            }
            Ok(Err(fault @ ActivityFault::PermissionDenied { .. })) => {
                return (fail(FailureKind::PermissionDenied, fault.to_string()), permissions);
            }
            Ok(Err(fault)) => return (fail(FailureKind::Fault, fault.to_string()), permissions),
            Err(payload) => {
                let message = format!("panicked: {}", panic_message(payload.as_ref()));
                return (fail(FailureKind::Fault, message), permissions);
            }
        };

        let after = env.with_output(&output);
        for binding in &invocation.policies {
            if !accept_postcondition(binding.policy.as_ref(), &binding.input, &after) {
                let message = format!("policy '{}' rejected the result", binding.identifier());
                return (fail(FailureKind::PostconditionRejected, message), permissions);
            }
        }

        (Ok(output), permissions)
    }

    /// Run `steps` in order, stopping at the first failure.
    ///
    /// Outputs of steps that completed before the failure are kept.
    pub fn run(&self, steps: &[Invocation]) -> RunReport {
        let start = Instant::now();
        info!(steps = steps.len(), "data app run started");

        let mut completed = Vec::with_capacity(steps.len());
        let mut halted = None;
        for step in steps {
            match self.call_activity(step).into_outcome() {
                Ok(output) => completed.push((step.activity.clone(), output)),
                Err(failure) => {
                    halted = Some(failure);
                    break;
                }
            }
        }

        let report = RunReport::new(completed, halted, start.elapsed());
        info!(
            success = report.is_success(),
            completed = report.completed().len(),
            "data app run finished"
        );
        report
    }

    /// Whether every startup policy accepts both its pre- and postcondition.
    #[must_use]
    pub fn validate_startup(&self, bindings: &[PolicyBinding]) -> bool {
        let snapshot = self.context.snapshot();
        let env = EvaluationEnv::new(&snapshot, (self.clock)());
        bindings.iter().all(|b| {
            let accepted = accept_precondition(b.policy.as_ref(), &b.input, &env)
                && accept_postcondition(b.policy.as_ref(), &b.input, &env);
            if !accepted {
                warn!(policy = b.identifier(), "startup policy rejected the data app");
            }
            accepted
        })
    }
}

impl fmt::Debug for Sandbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sandbox")
            .field("activities", &self.activities)
            .finish_non_exhaustive()
    }
}
