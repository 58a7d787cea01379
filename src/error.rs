use thiserror::Error;

use crate::types::{
    ConfigError, ContextError, PolicyError, PositionError, RegistryError, ScopeError, ValueError,
};

/// Unified error type covering scopes, contexts, registries and I/O.
///
/// Returned by convenience methods like
/// [`ActivityRegistry::from_json()`](crate::ActivityRegistry::from_json).
#[derive(Debug, Error)]
pub enum DataAppError {
    #[error(transparent)]
    Scope(#[from] ScopeError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Value(#[from] ValueError),

    #[error(transparent)]
    Position(#[from] PositionError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[cfg(feature = "binary-cache")]
    #[error(transparent)]
    Serialize(#[from] crate::serial::SerializeError),

    #[cfg(feature = "binary-cache")]
    #[error(transparent)]
    Deserialize(#[from] crate::serial::DeserializeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_transparently() {
        let err: DataAppError = ContextError::UnknownModule {
            name: "Tags".into(),
        }
        .into();
        assert_eq!(err.to_string(), "unknown context module 'Tags'");

        let json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(matches!(DataAppError::from(json), DataAppError::Json(_)));
    }
}
