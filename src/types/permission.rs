use std::env;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Pattern granting access to every file under path strategies.
pub const ALL_FILES: &str = "<<ALL_FILES>>";

/// Kinds of capability an activity may exercise at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionType {
    /// Matches every capability.
    Wildcard,
    /// Unrestricted access; never granted to a request.
    GrantAll,
    ReadFile,
    WriteFile,
    ExecuteFile,
    DeleteFile,
    ReadLink,
    ConnectSocket,
    ListenSocket,
    AcceptSocket,
    ResolveSocket,
    UrlGet,
    UrlHead,
    UrlPost,
    UrlPut,
    UrlDelete,
    UrlPatch,
    GetEnv,
    ReadProperty,
    WriteProperty,
    ExitProcess,
}

impl PermissionType {
    #[must_use]
    pub fn is_file(self) -> bool {
        matches!(
            self,
            Self::ReadFile | Self::WriteFile | Self::ExecuteFile | Self::DeleteFile | Self::ReadLink
        )
    }
}

impl fmt::Display for PermissionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Wildcard => "WILDCARD",
            Self::GrantAll => "GRANT_ALL",
            Self::ReadFile => "READ_FILE",
            Self::WriteFile => "WRITE_FILE",
            Self::ExecuteFile => "EXECUTE_FILE",
            Self::DeleteFile => "DELETE_FILE",
            Self::ReadLink => "READ_LINK",
            Self::ConnectSocket => "CONNECT_SOCKET",
            Self::ListenSocket => "LISTEN_SOCKET",
            Self::AcceptSocket => "ACCEPT_SOCKET",
            Self::ResolveSocket => "RESOLVE_SOCKET",
            Self::UrlGet => "URL_GET",
            Self::UrlHead => "URL_HEAD",
            Self::UrlPost => "URL_POST",
            Self::UrlPut => "URL_PUT",
            Self::UrlDelete => "URL_DELETE",
            Self::UrlPatch => "URL_PATCH",
            Self::GetEnv => "GET_ENV",
            Self::ReadProperty => "READ_PROPERTY",
            Self::WriteProperty => "WRITE_PROPERTY",
            Self::ExitProcess => "EXIT_PROCESS",
        };
        f.write_str(s)
    }
}

/// How a condition's pattern is compared with a requested attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchingStrategy {
    ExactMatch,
    /// `*` or an empty pattern matches anything; otherwise exact.
    Wildcard,
    PathExactMatch,
    PathSubdir,
}

/// A capability exercised by an activity, reported to the permission guard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequiredPermission {
    pub permission: PermissionType,
    pub attribute: String,
}

impl RequiredPermission {
    pub fn new(permission: PermissionType, attribute: impl Into<String>) -> Self {
        Self {
            permission,
            attribute: attribute.into(),
        }
    }
}

impl fmt::Display for RequiredPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.permission, self.attribute)
    }
}

/// Result of comparing one condition with one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    NoMatch,
    Grant,
    Forbid,
}

/// Aggregated verdict for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Allow,
    Deny,
}

/// One capability a policy asks the security manager to grant or forbid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EvaluationCondition {
    pub permission: PermissionType,
    pub pattern: String,
    pub strategy: MatchingStrategy,
    pub negated: bool,
}

impl EvaluationCondition {
    pub fn new(
        permission: PermissionType,
        pattern: impl Into<String>,
        strategy: MatchingStrategy,
        negated: bool,
    ) -> Self {
        Self {
            permission,
            pattern: pattern.into(),
            strategy,
            negated,
        }
    }

    pub fn grant(
        permission: PermissionType,
        pattern: impl Into<String>,
        strategy: MatchingStrategy,
    ) -> Self {
        Self::new(permission, pattern, strategy, false)
    }

    pub fn forbid(
        permission: PermissionType,
        pattern: impl Into<String>,
        strategy: MatchingStrategy,
    ) -> Self {
        Self::new(permission, pattern, strategy, true)
    }

    /// Blanket grant of every capability.
    #[must_use]
    pub fn grant_all() -> Self {
        Self::grant(PermissionType::Wildcard, "", MatchingStrategy::ExactMatch)
    }

    /// Blanket denial of every capability.
    #[must_use]
    pub fn deny_all() -> Self {
        Self::forbid(PermissionType::Wildcard, "", MatchingStrategy::ExactMatch)
    }

    /// Whether this condition applies to `request`, ignoring `negated`.
    #[must_use]
    pub fn matches(&self, request: &RequiredPermission) -> bool {
        if self.permission == PermissionType::Wildcard {
            return true;
        }
        if self.permission != request.permission {
            return false;
        }
        let (granted, requested) = (self.pattern.as_str(), request.attribute.as_str());
        match self.strategy {
            MatchingStrategy::ExactMatch => granted == requested,
            MatchingStrategy::Wildcard => {
                granted.is_empty() || granted == "*" || granted == requested
            }
            MatchingStrategy::PathExactMatch => {
                granted == ALL_FILES || normalize_path(granted) == normalize_path(requested)
            }
            MatchingStrategy::PathSubdir => {
                granted == ALL_FILES
                    || normalize_path(requested).starts_with(&normalize_path(granted))
            }
        }
    }

    #[must_use]
    pub fn evaluate(&self, request: &RequiredPermission) -> MatchOutcome {
        match (self.matches(request), self.negated) {
            (false, _) => MatchOutcome::NoMatch,
            (true, false) => MatchOutcome::Grant,
            (true, true) => MatchOutcome::Forbid,
        }
    }
}

impl fmt::Display for EvaluationCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {:?}, {:?}, {}]",
            self.permission,
            self.pattern,
            self.strategy,
            if self.negated { "forbid" } else { "grant" }
        )
    }
}

/// Absolute, lexically normalized form of a path using `/` separators.
///
/// Relative paths are resolved against the current directory. `.` and `..`
/// are folded without touching the filesystem.
#[must_use]
pub fn normalize_path(raw: &str) -> PathBuf {
    let unified = raw.replace('\\', "/");
    let path = Path::new(&unified);
    let absolute = if path.has_root() {
        path.to_path_buf()
    } else {
        env::current_dir().map_or_else(|_| path.to_path_buf(), |dir| dir.join(path))
    };

    let mut out = PathBuf::from("/");
    for component in absolute.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    out
}
