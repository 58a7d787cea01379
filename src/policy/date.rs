use chrono::NaiveDateTime;

use crate::types::{PolicyError, PolicyInputScope};

use super::{typed_input, EvaluationEnv, Policy};

const TIMESTAMP: &str = "timestamp";

fn timestamp(input: &PolicyInputScope) -> Result<NaiveDateTime, PolicyError> {
    let raw = typed_input(input, TIMESTAMP, "core.LocalDateTime")?;
    raw.read()
        .parse::<NaiveDateTime>()
        .map_err(|e| PolicyError::InvalidInput {
            key: TIMESTAMP.to_owned(),
            reason: e.to_string(),
        })
}

/// Accepts once the evaluation time has reached `timestamp`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UseNotBefore;

impl Policy for UseNotBefore {
    fn identifier(&self) -> &str {
        "core.UseNotBefore"
    }

    fn precondition(
        &self,
        input: &PolicyInputScope,
        env: &EvaluationEnv<'_>,
    ) -> Result<bool, PolicyError> {
        Ok(env.now >= timestamp(input)?)
    }
}

/// Accepts until the evaluation time passes `timestamp`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UseNotAfter;

impl Policy for UseNotAfter {
    fn identifier(&self) -> &str {
        "core.UseNotAfter"
    }

    fn precondition(
        &self,
        input: &PolicyInputScope,
        env: &EvaluationEnv<'_>,
    ) -> Result<bool, PolicyError> {
        Ok(env.now <= timestamp(input)?)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{env, value};
    use super::*;
    use crate::types::ContextSnapshot;

    fn at(ts: &str) -> PolicyInputScope {
        PolicyInputScope::new().with(TIMESTAMP, value("core.LocalDateTime", ts))
    }

    // The test environment evaluates at 2024-06-01T12:00:00.

    #[test]
    fn not_before() {
        let ctx = ContextSnapshot::default();
        assert!(UseNotBefore.precondition(&at("2024-01-01T00:00:00"), &env(&ctx)).unwrap());
        assert!(UseNotBefore.precondition(&at("2024-06-01T12:00:00"), &env(&ctx)).unwrap());
        assert!(!UseNotBefore.precondition(&at("2030-01-01T00:00:00"), &env(&ctx)).unwrap());
    }

    #[test]
    fn not_after() {
        let ctx = ContextSnapshot::default();
        assert!(!UseNotAfter.precondition(&at("2024-01-01T00:00:00"), &env(&ctx)).unwrap());
        assert!(UseNotAfter.precondition(&at("2030-01-01T00:00:00"), &env(&ctx)).unwrap());
    }
}
