use crate::types::{EvaluationCondition, PolicyError, PolicyInputScope};

use super::{EvaluationEnv, Policy};

/// Pass-through policy granting every capability.
#[derive(Debug, Clone, Copy, Default)]
pub struct GrantAll;

impl Policy for GrantAll {
    fn identifier(&self) -> &str {
        "core.GrantAll"
    }

    fn precondition(
        &self,
        _input: &PolicyInputScope,
        _env: &EvaluationEnv<'_>,
    ) -> Result<bool, PolicyError> {
        Ok(true)
    }

    fn intervention(
        &self,
        _input: &PolicyInputScope,
        _env: &EvaluationEnv<'_>,
    ) -> Result<Vec<EvaluationCondition>, PolicyError> {
        Ok(vec![EvaluationCondition::grant_all()])
    }
}
