use std::fmt;

use serde::{Deserialize, Serialize};

/// How an activity is executed.
///
/// Starts as [`Noop`](Self::Noop) at registration and is replaced exactly
/// once by a resolved strategy. The serialized form carries the
/// `executionContainerType` discriminator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "executionContainerType")]
pub enum ExecutionContainer {
    #[serde(rename = "NOOPExecutionContainer")]
    Noop,

    #[serde(rename = "EmbeddedExecutionContainer")]
    Embedded,

    #[serde(rename = "JavaExecutionContainer")]
    External {
        #[serde(rename = "className")]
        implementation: String,
    },
}

impl ExecutionContainer {
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Noop)
    }

    /// The discriminator value used in the persisted form.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Noop => "NOOPExecutionContainer",
            Self::Embedded => "EmbeddedExecutionContainer",
            Self::External { .. } => "JavaExecutionContainer",
        }
    }
}

impl Default for ExecutionContainer {
    fn default() -> Self {
        Self::Noop
    }
}

impl fmt::Display for ExecutionContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::External { implementation } => {
                write!(f, "{}({implementation})", self.type_name())
            }
            other => f.write_str(other.type_name()),
        }
    }
}
