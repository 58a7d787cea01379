use crate::types::{PolicyError, PolicyInputScope, TAGS_MODULE};

use super::{typed_input, EvaluationEnv, Mode, Policy};

const TAG: &str = "tag";

/// Requires or forbids a tag on the running Data App.
#[derive(Debug, Clone, Copy)]
pub struct TagConstraint {
    mode: Mode,
}

impl TagConstraint {
    #[must_use]
    pub const fn require() -> Self {
        Self {
            mode: Mode::Require,
        }
    }

    #[must_use]
    pub const fn deny() -> Self {
        Self { mode: Mode::Deny }
    }
}

impl Policy for TagConstraint {
    fn identifier(&self) -> &str {
        match self.mode {
            Mode::Require => "core.RequireTag",
            Mode::Deny => "core.DenyTag",
        }
    }

    fn precondition(
        &self,
        input: &PolicyInputScope,
        env: &EvaluationEnv<'_>,
    ) -> Result<bool, PolicyError> {
        let tag = typed_input(input, TAG, "core.Tag")?;
        let present = env.context.module(TAGS_MODULE)?.contains(tag.read());
        Ok(self.mode.accepts(present))
    }
}
