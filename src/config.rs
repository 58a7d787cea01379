//! Typed view of a data app's `app { ... }` section.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::types::{
    Ast, ConfigError, ContextError, ExecutionContext, Node, NodeId, NodeKind, TAGS_MODULE,
};

pub const NAMESPACE_KEY: &str = "namespace";
pub const NAME_KEY: &str = "name";
pub const VERSION_KEY: &str = "version";
pub const TAGS_KEY: &str = "tags";
pub const EXECUTION_KEY: &str = "execution";
pub const PERIODIC_TIME_KEY: &str = "periodicTime";
pub const STARTUP_POLICIES_KEY: &str = "startupPolicies";

const DEFAULT_NAMESPACE: &str = "degree";
const DEFAULT_VERSION: &str = "0.0.1-1-SNAPSHOT";

/// Whether the app runs once or repeatedly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Single,
    Periodic,
}

impl std::str::FromStr for ExecutionMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "periodic" => Ok(Self::Periodic),
            _ => Err(ConfigError::InvalidExecution {
                value: s.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataAppConfig {
    pub namespace: String,
    pub name: String,
    pub version: String,
    pub tags: Vec<String>,
    pub execution: ExecutionMode,
    /// Delay between periodic runs; unused for single runs.
    pub periodic_time: u64,
    pub startup_policies: Vec<String>,
    /// Keys this type does not interpret, kept verbatim.
    pub extra: BTreeMap<String, String>,
}

impl Default for DataAppConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_owned(),
            name: format!("DataApp_{}", Uuid::new_v4()),
            version: DEFAULT_VERSION.to_owned(),
            tags: Vec::new(),
            execution: ExecutionMode::Single,
            periodic_time: 0,
            startup_policies: Vec::new(),
            extra: BTreeMap::new(),
        }
    }
}

impl DataAppConfig {
    /// Build from raw key/value pairs, filling in defaults.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] for an unknown execution mode or a non-numeric period.
    pub fn from_map(items: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for (key, value) in items {
            match key.as_str() {
                NAMESPACE_KEY => config.namespace.clone_from(value),
                NAME_KEY => config.name.clone_from(value),
                VERSION_KEY => config.version.clone_from(value),
                TAGS_KEY => config.tags = split_list(value),
                EXECUTION_KEY => config.execution = value.parse()?,
                PERIODIC_TIME_KEY => {
                    config.periodic_time =
                        value
                            .trim()
                            .parse()
                            .map_err(|_| ConfigError::InvalidPeriod {
                                value: value.clone(),
                            })?;
                }
                STARTUP_POLICIES_KEY => config.startup_policies = parse_startup_policies(value),
                _ => {
                    debug!(key = %key, "keeping unrecognized configuration item");
                    config.extra.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(config)
    }

    /// Read the configuration of the data app rooted at `root`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::NotADataApp`] if `root` is not a data app node, or
    /// any error of [`from_map`](Self::from_map).
    pub fn from_ast(ast: &Ast, root: NodeId) -> Result<Self, ConfigError> {
        match ast.get(root).map(Node::kind) {
            Some(NodeKind::DataApp { configuration, .. }) => Self::from_map(configuration),
            _ => Err(ConfigError::NotADataApp { node: root }),
        }
    }

    /// Publish the configured tags into the context's tag module.
    ///
    /// # Errors
    ///
    /// [`ContextError::UnknownModule`] if the context has no tag module.
    pub fn apply_tags(&self, context: &ExecutionContext) -> Result<(), ContextError> {
        context.set_tags(TAGS_MODULE, self.tags.iter().cloned())
    }

    #[must_use]
    pub fn is_periodic(&self) -> bool {
        self.execution == ExecutionMode::Periodic
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Split a comma separated list of startup policy identifiers.
#[must_use]
pub fn parse_startup_policies(list: &str) -> Vec<String> {
    split_list(list)
}
