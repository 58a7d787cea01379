use std::fmt;
use std::time::Duration;

use thiserror::Error;

use super::permission::{Decision, RequiredPermission};
use super::scope::OutputScope;

/// Why an activity invocation did not produce a usable output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The activity reported an `"error"` output.
    Domain,
    /// The activity failed unexpectedly (I/O, process, panic).
    Fault,
    /// The activity exercised a capability no policy granted.
    PermissionDenied,
    /// No execution strategy is resolved for the activity.
    NotResolved,
    PreconditionRejected,
    PostconditionRejected,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Domain => "domain error",
            Self::Fault => "fault",
            Self::PermissionDenied => "permission denied",
            Self::NotResolved => "not resolved",
            Self::PreconditionRejected => "precondition rejected",
            Self::PostconditionRejected => "postcondition rejected",
        };
        f.write_str(s)
    }
}

/// The single failure path of an activity invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("activity '{activity}' failed ({kind}): {message}")]
pub struct ActivityFailure {
    pub activity: String,
    pub kind: FailureKind,
    pub message: String,
}

impl ActivityFailure {
    pub fn new(activity: impl Into<String>, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            activity: activity.into(),
            kind,
            message: message.into(),
        }
    }
}

/// One capability check performed while an activity ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRecord {
    pub request: RequiredPermission,
    pub decision: Decision,
}

/// Outcome of one activity invocation.
#[derive(Debug, Clone)]
#[must_use]
pub struct InvocationReport {
    activity: String,
    outcome: Result<OutputScope, ActivityFailure>,
    correlation_ids: Vec<String>,
    permissions: Vec<PermissionRecord>,
    duration: Duration,
}

impl InvocationReport {
    pub(crate) fn new(
        activity: String,
        outcome: Result<OutputScope, ActivityFailure>,
        correlation_ids: Vec<String>,
        permissions: Vec<PermissionRecord>,
        duration: Duration,
    ) -> Self {
        Self {
            activity,
            outcome,
            correlation_ids,
            permissions,
            duration,
        }
    }

    #[must_use]
    pub fn activity(&self) -> &str {
        &self.activity
    }

    /// The output, or the failure that stopped the invocation.
    ///
    /// # Errors
    ///
    /// Returns the [`ActivityFailure`] when the invocation failed.
    pub fn outcome(&self) -> Result<&OutputScope, &ActivityFailure> {
        self.outcome.as_ref()
    }

    /// Consume the report, keeping only the outcome.
    ///
    /// # Errors
    ///
    /// Returns the [`ActivityFailure`] when the invocation failed.
    pub fn into_outcome(self) -> Result<OutputScope, ActivityFailure> {
        self.outcome
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Identifiers contributed by the attached policies.
    #[must_use]
    pub fn correlation_ids(&self) -> &[String] {
        &self.correlation_ids
    }

    /// Capability checks in the order the activity made them.
    #[must_use]
    pub fn permissions(&self) -> &[PermissionRecord] {
        &self.permissions
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl fmt::Display for InvocationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Ok(out) => write!(f, "{}: ok ({} outputs)", self.activity, out.len())?,
            Err(failure) => write!(f, "{}: {}", self.activity, failure.kind)?,
        }
        write!(f, ", permissions checked: {}", self.permissions.len())?;
        write!(f, ", duration: {:?}", self.duration)
    }
}

/// Outcome of a sequence of invocations. Outputs of completed steps are kept
/// even when a later step halts the run.
#[derive(Debug, Clone)]
#[must_use]
pub struct RunReport {
    completed: Vec<(String, OutputScope)>,
    halted: Option<ActivityFailure>,
    duration: Duration,
}

impl RunReport {
    pub(crate) fn new(
        completed: Vec<(String, OutputScope)>,
        halted: Option<ActivityFailure>,
        duration: Duration,
    ) -> Self {
        Self {
            completed,
            halted,
            duration,
        }
    }

    #[must_use]
    pub fn completed(&self) -> &[(String, OutputScope)] {
        &self.completed
    }

    #[must_use]
    pub fn halted(&self) -> Option<&ActivityFailure> {
        self.halted.as_ref()
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.halted.is_none()
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.completed.iter().map(|(n, _)| n.as_str()).collect();
        write!(f, "completed: [{}]", names.join(", "))?;
        if let Some(failure) = &self.halted {
            write!(f, ", halted: {failure}")?;
        }
        write!(f, ", duration: {:?}", self.duration)
    }
}
