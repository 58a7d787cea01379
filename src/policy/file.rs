use crate::types::{
    EvaluationCondition, MatchingStrategy, PermissionType, PolicyError, PolicyInputScope,
};

use super::{typed_input, EvaluationEnv, Policy};

const PATH: &str = "path";
const MATCHING_STRATEGY: &str = "matchingStrategy";

/// Grants or forbids one kind of file access below a path.
///
/// Inputs: `path` (`core.Path`) and `matchingStrategy`
/// (`core.PathMatchingStrategy`, `EXACT` or `SUBDIR`).
#[derive(Debug, Clone, Copy)]
pub struct FileConstraint {
    identifier: &'static str,
    permission: PermissionType,
    forbid: bool,
}

impl FileConstraint {
    #[must_use]
    pub const fn new(identifier: &'static str, permission: PermissionType, forbid: bool) -> Self {
        Self {
            identifier,
            permission,
            forbid,
        }
    }

    /// The allow/forbid pair for read, write, execute and delete.
    #[must_use]
    pub fn all() -> Vec<Self> {
        use PermissionType as P;
        vec![
            Self::new("core.AllowFileRead", P::ReadFile, false),
            Self::new("core.ForbidFileRead", P::ReadFile, true),
            Self::new("core.AllowFileWrite", P::WriteFile, false),
            Self::new("core.ForbidFileWrite", P::WriteFile, true),
            Self::new("core.AllowFileExecute", P::ExecuteFile, false),
            Self::new("core.ForbidFileExecute", P::ExecuteFile, true),
            Self::new("core.AllowFileDelete", P::DeleteFile, false),
            Self::new("core.ForbidFileDelete", P::DeleteFile, true),
        ]
    }

    fn condition(&self, input: &PolicyInputScope) -> Result<EvaluationCondition, PolicyError> {
        let path = typed_input(input, PATH, "core.Path")?;
        let strategy = typed_input(input, MATCHING_STRATEGY, "core.PathMatchingStrategy")?;
        let strategy = match strategy.read() {
            "EXACT" => MatchingStrategy::PathExactMatch,
            "SUBDIR" => MatchingStrategy::PathSubdir,
            other => {
                return Err(PolicyError::InvalidInput {
                    key: MATCHING_STRATEGY.to_owned(),
                    reason: format!("unknown strategy {other:?}"),
                })
            }
        };
        Ok(EvaluationCondition::new(
            self.permission,
            path.read(),
            strategy,
            self.forbid,
        ))
    }
}

impl Policy for FileConstraint {
    fn identifier(&self) -> &str {
        self.identifier
    }

    /// Always true; only the intervention reads the inputs.
    fn precondition(
        &self,
        _input: &PolicyInputScope,
        _env: &EvaluationEnv<'_>,
    ) -> Result<bool, PolicyError> {
        Ok(true)
    }

    fn intervention(
        &self,
        input: &PolicyInputScope,
        _env: &EvaluationEnv<'_>,
    ) -> Result<Vec<EvaluationCondition>, PolicyError> {
        Ok(vec![self.condition(input)?])
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{env, value};
    use super::*;
    use crate::evaluate::evaluate_security_manager_intervention;
    use crate::types::ContextSnapshot;

    fn input(path: &str, strategy: &str) -> PolicyInputScope {
        PolicyInputScope::new()
            .with(PATH, value("core.Path", path))
            .with(MATCHING_STRATEGY, value("core.PathMatchingStrategy", strategy))
    }

    #[test]
    fn forbid_variant_negates() {
        let ctx = ContextSnapshot::default();
        let policy = FileConstraint::new("core.ForbidFileWrite", PermissionType::WriteFile, true);
        let conditions = policy.intervention(&input("/etc", "SUBDIR"), &env(&ctx)).unwrap();
        assert_eq!(
            conditions,
            vec![EvaluationCondition::forbid(
                PermissionType::WriteFile,
                "/etc",
                MatchingStrategy::PathSubdir
            )]
        );
    }

    #[test]
    fn exact_strategy_maps_to_path_exact() {
        let ctx = ContextSnapshot::default();
        let policy = FileConstraint::new("core.AllowFileRead", PermissionType::ReadFile, false);
        let conditions = policy.intervention(&input("/a.txt", "EXACT"), &env(&ctx)).unwrap();
        assert_eq!(conditions[0].strategy, MatchingStrategy::PathExactMatch);
        assert!(!conditions[0].negated);
    }

    #[test]
    fn incomplete_input_denies_instead_of_rejecting() {
        let ctx = ContextSnapshot::default();
        let policy = FileConstraint::new("core.AllowFileRead", PermissionType::ReadFile, false);
        let only_path = PolicyInputScope::new().with(PATH, value("core.Path", "/a"));
        assert!(policy.precondition(&only_path, &env(&ctx)).unwrap());
        assert!(policy.intervention(&only_path, &env(&ctx)).is_err());
        assert_eq!(
            evaluate_security_manager_intervention(&policy, &only_path, &env(&ctx)),
            vec![EvaluationCondition::deny_all()]
        );
    }
}
