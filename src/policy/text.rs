use crate::types::{PolicyError, PolicyInputScope};

use super::{typed_input, EvaluationEnv, Policy};

const MAX_LENGTH: &str = "maxLength";
const CONTENT: &str = "content";

/// Accepts content of at most `maxLength` characters.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxLength;

impl Policy for MaxLength {
    fn identifier(&self) -> &str {
        "core.MaxLength"
    }

    fn precondition(
        &self,
        input: &PolicyInputScope,
        _env: &EvaluationEnv<'_>,
    ) -> Result<bool, PolicyError> {
        let max = typed_input(input, MAX_LENGTH, "core.UnsignedInt")?;
        let max: usize = max.read().parse().map_err(|_| PolicyError::InvalidInput {
            key: MAX_LENGTH.to_owned(),
            reason: format!("{:?} is not an unsigned integer", max.read()),
        })?;
        let content = typed_input(input, CONTENT, "core.Text")?;
        Ok(content.read().chars().count() <= max)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{env, value};
    use super::*;
    use crate::types::ContextSnapshot;

    fn input(max: &str, content: &str) -> PolicyInputScope {
        PolicyInputScope::new()
            .with(MAX_LENGTH, value("core.UnsignedInt", max))
            .with(CONTENT, value("core.Text", content))
    }

    #[test]
    fn bound_is_inclusive() {
        let ctx = ContextSnapshot::default();
        assert!(MaxLength.precondition(&input("5", "Lorem"), &env(&ctx)).unwrap());
        assert!(!MaxLength
            .precondition(&input("5", "Lorem ipsum"), &env(&ctx))
            .unwrap());
    }

    #[test]
    fn counts_characters_not_bytes() {
        let ctx = ContextSnapshot::default();
        assert!(MaxLength.precondition(&input("3", "äöü"), &env(&ctx)).unwrap());
    }

    #[test]
    fn missing_content_is_an_error() {
        let ctx = ContextSnapshot::default();
        let partial = PolicyInputScope::new().with(MAX_LENGTH, value("core.UnsignedInt", "5"));
        assert!(matches!(
            MaxLength.precondition(&partial, &env(&ctx)),
            Err(PolicyError::MissingInput { .. })
        ));
    }
}
