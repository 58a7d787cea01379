use crate::types::{
    PolicyError, PolicyInputScope, JWT_USER_INFORMATION, OS_USER_INFORMATION, USERNAME,
    USERROLES, USER_INFORMATION,
};

use super::{typed_input, EvaluationEnv, Mode, Policy};

const USERNAME_KEY: &str = "username";
const ROLE_KEY: &str = "role";

/// Requires or forbids a principal name, compared with
/// `UserInformation.username`.
#[derive(Debug, Clone, Copy)]
pub struct UsernameConstraint {
    identifier: &'static str,
    mode: Mode,
}

impl UsernameConstraint {
    #[must_use]
    pub const fn require() -> Self {
        Self {
            identifier: "core.RequireUsername",
            mode: Mode::Require,
        }
    }

    #[must_use]
    pub const fn deny() -> Self {
        Self {
            identifier: "core.DenyUsername",
            mode: Mode::Deny,
        }
    }
}

impl Policy for UsernameConstraint {
    fn identifier(&self) -> &str {
        self.identifier
    }

    fn precondition(
        &self,
        input: &PolicyInputScope,
        env: &EvaluationEnv<'_>,
    ) -> Result<bool, PolicyError> {
        let wanted = typed_input(input, USERNAME_KEY, "core.Username")?;
        let current = env.context.module(USER_INFORMATION)?.entity(USERNAME)?;
        Ok(self.mode.accepts(current.read() == wanted.read()))
    }
}

/// Requires or forbids an active role on one authentication channel.
///
/// Roles are read from the channel module's comma separated `userroles`.
#[derive(Debug, Clone, Copy)]
pub struct RoleConstraint {
    identifier: &'static str,
    module: &'static str,
    mode: Mode,
}

impl RoleConstraint {
    #[must_use]
    pub const fn require_os() -> Self {
        Self {
            identifier: "core.RequireRoleOs",
            module: OS_USER_INFORMATION,
            mode: Mode::Require,
        }
    }

    #[must_use]
    pub const fn deny_os() -> Self {
        Self {
            identifier: "core.DenyRoleOs",
            module: OS_USER_INFORMATION,
            mode: Mode::Deny,
        }
    }

    #[must_use]
    pub const fn require_jwt() -> Self {
        Self {
            identifier: "core.RequireRoleJwt",
            module: JWT_USER_INFORMATION,
            mode: Mode::Require,
        }
    }

    #[must_use]
    pub const fn deny_jwt() -> Self {
        Self {
            identifier: "core.DenyRoleJwt",
            module: JWT_USER_INFORMATION,
            mode: Mode::Deny,
        }
    }
}

impl Policy for RoleConstraint {
    fn identifier(&self) -> &str {
        self.identifier
    }

    fn precondition(
        &self,
        input: &PolicyInputScope,
        env: &EvaluationEnv<'_>,
    ) -> Result<bool, PolicyError> {
        let role = typed_input(input, ROLE_KEY, "core.Userrole")?;
        let roles = env.context.module(self.module)?.entity(USERROLES)?;
        let active = roles
            .read()
            .split(',')
            .map(str::trim)
            .any(|r| !r.is_empty() && r == role.read());
        Ok(self.mode.accepts(active))
    }
}
